//! JSON-lines store in a local directory.
//!
//! `submissions.jsonl` and `comments.jsonl` each hold one document per line.
//! A batch is serialized up front and appended with a single write so a
//! failure cannot leave half a sentence on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use ttsurvey_core::error::StoreError;
use ttsurvey_core::model::{CommentSubmission, Submission};
use ttsurvey_core::traits::SubmissionStore;

pub const SUBMISSIONS_FILE: &str = "submissions.jsonl";
pub const COMMENTS_FILE: &str = "comments.jsonl";

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn append<T: Serialize>(&self, file: &str, docs: &[T]) -> Result<(), StoreError> {
        let mut buf = String::new();
        for doc in docs {
            let line =
                serde_json::to_string(doc).map_err(|e| StoreError::Decode(e.to_string()))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))
            .await?;
        f.write_all(buf.as_bytes()).await?;
        f.flush().await?;
        Ok(())
    }

    async fn read_all<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StoreError> {
        let path = self.dir.join(file);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(file = %path.display(), line = i + 1, "skipping record: {e}");
                    skipped += 1;
                }
            }
        }

        tracing::debug!(file = %path.display(), records = records.len(), skipped, "read records");
        Ok(records)
    }
}

#[async_trait]
impl SubmissionStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn submit_batch(&self, mut records: Vec<Submission>) -> Result<(), StoreError> {
        let now = Utc::now();
        for r in &mut records {
            r.set_timestamp(now);
        }
        self.append(SUBMISSIONS_FILE, &records).await?;
        tracing::debug!(dir = %self.dir.display(), records = records.len(), "appended batch");
        Ok(())
    }

    async fn submit_comment(&self, mut comment: CommentSubmission) -> Result<(), StoreError> {
        comment.timestamp = Some(Utc::now());
        self.append(COMMENTS_FILE, std::slice::from_ref(&comment))
            .await
    }

    async fn all_submissions(&self) -> Result<Vec<Submission>, StoreError> {
        self.read_all(SUBMISSIONS_FILE).await
    }

    async fn all_comments(&self) -> Result<Vec<CommentSubmission>, StoreError> {
        self.read_all(COMMENTS_FILE).await
    }
}
