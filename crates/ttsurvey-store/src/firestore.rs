//! Firestore REST API store.
//!
//! Batches go through `documents:commit`, which applies every write or none.
//! The `timestamp` field of each document is set by the server
//! (`REQUEST_TIME`), never by the client. Reads page through the collection
//! listing endpoint.

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::instrument;
use uuid::Uuid;

use ttsurvey_core::error::StoreError;
use ttsurvey_core::model::{CommentSubmission, Submission};
use ttsurvey_core::traits::SubmissionStore;

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";
const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const PAGE_SIZE: u32 = 300;

pub const SUBMISSIONS_COLLECTION: &str = "submissions";
pub const COMMENTS_COLLECTION: &str = "comments";

/// Firestore-backed document store.
pub struct FirestoreStore {
    project_id: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl FirestoreStore {
    pub fn new(project_id: &str, api_key: &str, base_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            project_id: project_id.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client,
        }
    }

    /// `projects/{p}/databases/(default)/documents`
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, DEFAULT_DATABASE
        )
    }

    fn url(&self, suffix: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&format!(
            "{}/v1/{}{}",
            self.base_url,
            self.documents_root(),
            suffix
        ))
        .map_err(|e| StoreError::Network(format!("invalid store URL: {e}")))?;
        if !self.api_key.is_empty() {
            url.query_pairs_mut().append_pair("key", &self.api_key);
        }
        Ok(url)
    }

    /// A create-only write of `doc` into `collection` with a server timestamp.
    fn write_for<T: Serialize>(&self, collection: &str, doc: &T) -> Result<Value, StoreError> {
        let value = serde_json::to_value(doc).map_err(|e| StoreError::Decode(e.to_string()))?;
        let fields = encode_fields(&value);
        let name = format!(
            "{}/{}/{}",
            self.documents_root(),
            collection,
            Uuid::new_v4().simple()
        );
        Ok(json!({
            "update": { "name": name, "fields": fields },
            "updateTransforms": [
                { "fieldPath": "timestamp", "setToServerValue": "REQUEST_TIME" }
            ],
            "currentDocument": { "exists": false }
        }))
    }

    async fn commit(&self, writes: Vec<Value>) -> Result<(), StoreError> {
        let url = self.url(":commit")?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "writes": writes }))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StoreError> {
        let mut docs = Vec::new();
        let mut skipped = 0usize;
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(&format!("/{collection}"))?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", &PAGE_SIZE.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(map_reqwest_error)?;
            let page: ListResponse = check_status(response)
                .await?
                .json()
                .await
                .map_err(|e| StoreError::Decode(format!("failed to parse listing: {e}")))?;

            for doc in page.documents {
                match decode_fields(&doc.fields).and_then(|v| {
                    serde_json::from_value(v).map_err(|e| StoreError::Decode(e.to_string()))
                }) {
                    Ok(d) => docs.push(d),
                    Err(e) => {
                        tracing::warn!(document = %doc.name, "skipping document: {e}");
                        skipped += 1;
                    }
                }
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(collection, documents = docs.len(), skipped, "listed collection");
        Ok(docs)
    }
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct FirestoreError {
    error: FirestoreErrorBody,
}

#[derive(Deserialize)]
struct FirestoreErrorBody {
    message: String,
}

fn map_reqwest_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout(DEFAULT_TIMEOUT_SECS)
    } else {
        StoreError::Network(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<FirestoreError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(StoreError::Api { status, message })
}

/// JSON object → Firestore `fields` map. `timestamp` is left to the server.
fn encode_fields(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(k, _)| k.as_str() != "timestamp")
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
        _ => Map::new(),
    }
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(_) => json!({ "mapValue": { "fields": encode_fields(value) } }),
    }
}

/// Firestore `fields` map → plain JSON object.
fn decode_fields(fields: &Map<String, Value>) -> Result<Value, StoreError> {
    let mut out = Map::new();
    for (k, v) in fields {
        out.insert(k.clone(), decode_value(v)?);
    }
    Ok(Value::Object(out))
}

fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(StoreError::Decode(format!("not a typed value: {value}")));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "referenceValue" => {
            Ok(inner.clone())
        }
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| StoreError::Decode(format!("bad integerValue {s:?}: {e}"))),
            Value::Number(_) => Ok(inner.clone()),
            other => Err(StoreError::Decode(format!("bad integerValue: {other}"))),
        },
        "arrayValue" => inner
            .get("values")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
            .unwrap_or_else(|| Ok(Vec::new()))
            .map(Value::Array),
        "mapValue" => match inner.get("fields").and_then(Value::as_object) {
            Some(fields) => decode_fields(fields),
            None => Ok(Value::Object(Map::new())),
        },
        other => Err(StoreError::Decode(format!("unsupported value type: {other}"))),
    }
}

#[async_trait]
impl SubmissionStore for FirestoreStore {
    fn name(&self) -> &str {
        "firestore"
    }

    #[instrument(skip(self, records), fields(project = %self.project_id, records = records.len()))]
    async fn submit_batch(&self, records: Vec<Submission>) -> Result<(), StoreError> {
        let writes = records
            .iter()
            .map(|r| self.write_for(SUBMISSIONS_COLLECTION, r))
            .collect::<Result<Vec<_>, _>>()?;
        self.commit(writes).await
    }

    #[instrument(skip(self, comment), fields(project = %self.project_id))]
    async fn submit_comment(&self, comment: CommentSubmission) -> Result<(), StoreError> {
        let write = self.write_for(COMMENTS_COLLECTION, &comment)?;
        self.commit(vec![write]).await
    }

    #[instrument(skip(self), fields(project = %self.project_id))]
    async fn all_submissions(&self) -> Result<Vec<Submission>, StoreError> {
        self.list(SUBMISSIONS_COLLECTION).await
    }

    #[instrument(skip(self), fields(project = %self.project_id))]
    async fn all_comments(&self) -> Result<Vec<CommentSubmission>, StoreError> {
        self.list(COMMENTS_COLLECTION).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttsurvey_core::model::ComparativeSubmission;
    use wiremock::matchers::{
        body_string_contains, method, path, query_param, query_param_is_missing,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS: &str = "/v1/projects/phonikud-user-study/databases/(default)/documents";

    fn record() -> Submission {
        Submission::Comparative(ComparativeSubmission {
            name: "Tester".into(),
            email: "t@example.com".into(),
            sentence_id: "s1".into(),
            model_a: "phonikud_stts2".into(),
            model_b: "piper-phonikud".into(),
            naturalness_cmos: -2,
            accuracy_cmos: 0,
            timestamp: None,
        })
    }

    fn store(server: &MockServer) -> FirestoreStore {
        FirestoreStore::new("phonikud-user-study", "test-key", Some(server.uri()))
    }

    #[test]
    fn typed_value_encoding() {
        let fields = encode_fields(&json!({
            "name": "x",
            "naturalness_cmos": -2,
            "score": 1.5,
            "ok": true,
            "timestamp": "2024-01-01T00:00:00Z"
        }));
        assert_eq!(fields["name"], json!({ "stringValue": "x" }));
        assert_eq!(fields["naturalness_cmos"], json!({ "integerValue": "-2" }));
        assert_eq!(fields["score"], json!({ "doubleValue": 1.5 }));
        assert_eq!(fields["ok"], json!({ "booleanValue": true }));
        assert!(!fields.contains_key("timestamp"));
    }

    #[test]
    fn typed_value_decoding() {
        let fields = json!({
            "email": { "stringValue": "a@b.co" },
            "accuracy": { "integerValue": "4" },
            "timestamp": { "timestampValue": "2024-05-01T10:00:00.123Z" },
            "tags": { "arrayValue": { "values": [{ "stringValue": "x" }] } },
            "empty": { "arrayValue": {} },
            "meta": { "mapValue": { "fields": { "n": { "nullValue": null } } } }
        });
        let decoded = decode_fields(fields.as_object().unwrap()).unwrap();
        assert_eq!(decoded["accuracy"], json!(4));
        assert_eq!(decoded["tags"], json!(["x"]));
        assert_eq!(decoded["empty"], json!([]));
        assert_eq!(decoded["meta"], json!({ "n": null }));
        assert_eq!(decoded["timestamp"], json!("2024-05-01T10:00:00.123Z"));

        assert!(decode_value(&json!({ "geoPointValue": {} })).is_err());
    }

    #[tokio::test]
    async fn batch_is_one_commit() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{DOCS}:commit")))
            .and(query_param("key", "test-key"))
            .and(body_string_contains("\"setToServerValue\":\"REQUEST_TIME\""))
            .and(body_string_contains("\"model_a\":{\"stringValue\":\"phonikud_stts2\"}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "writeResults": [{}] })))
            .expect(1)
            .mount(&server)
            .await;

        store(&server).submit_batch(vec![record()]).await.unwrap();
    }

    #[tokio::test]
    async fn server_errors_are_retryable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{DOCS}:commit")))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": { "code": 503, "message": "The service is currently unavailable.", "status": "UNAVAILABLE" }
            })))
            .mount(&server)
            .await;

        let err = store(&server).submit_batch(vec![record()]).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("currently unavailable"));
    }

    #[tokio::test]
    async fn permission_denied_is_not_retryable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{DOCS}:commit")))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let err = store(&server).submit_batch(vec![record()]).await.unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 403, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn listing_follows_page_tokens() {
        let server = MockServer::start().await;

        let doc = |email: &str| {
            json!({
                "name": format!("projects/p/databases/(default)/documents/submissions/{email}"),
                "fields": {
                    "name": { "stringValue": "Tester" },
                    "email": { "stringValue": email },
                    "sentence_id": { "stringValue": "s1" },
                    "model_a": { "stringValue": "a" },
                    "model_b": { "stringValue": "b" },
                    "naturalness_cmos": { "integerValue": "1" },
                    "accuracy_cmos": { "integerValue": "-1" },
                    "timestamp": { "timestampValue": "2024-05-01T10:00:00Z" }
                }
            })
        };

        Mock::given(method("GET"))
            .and(path(format!("{DOCS}/submissions")))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [doc("a@x.io"), { "name": "broken", "fields": { "name": { "stringValue": "?" } } }],
                "nextPageToken": "page-2"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{DOCS}/submissions")))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [doc("b@x.io")]
            })))
            .mount(&server)
            .await;

        let records = store(&server).all_submissions().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].email(), "b@x.io");
        assert!(records[0].timestamp().is_some());
    }

    #[tokio::test]
    async fn empty_collection() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{DOCS}/comments")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        assert!(store(&server).all_comments().await.unwrap().is_empty());
    }
}
