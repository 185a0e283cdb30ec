//! CSV export with fixed column orders.

use std::path::Path;

use anyhow::{Context, Result};

use ttsurvey_core::model::{
    AbsoluteSubmission, CommentSubmission, ComparativeSubmission, Submission,
};
use ttsurvey_core::scheme::RatingScheme;

pub const ABSOLUTE_HEADER: [&str; 7] = [
    "name",
    "email",
    "sentence_id",
    "model",
    "naturalness",
    "accuracy",
    "timestamp",
];

pub const COMPARATIVE_HEADER: [&str; 8] = [
    "name",
    "email",
    "sentence_id",
    "model_a",
    "model_b",
    "naturalness_cmos",
    "accuracy_cmos",
    "timestamp",
];

pub const COMMENTS_HEADER: [&str; 5] = ["name", "email", "comments", "sessionId", "timestamp"];

/// Quote a field if it contains a comma, quote or line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_row<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    let line: Vec<String> = fields.iter().map(|f| escape_field(f.as_ref())).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

fn timestamp(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.to_rfc3339()).unwrap_or_default()
}

pub fn absolute_to_csv(records: &[AbsoluteSubmission]) -> String {
    let mut out = String::new();
    push_row(&mut out, &ABSOLUTE_HEADER);
    for r in records {
        push_row(
            &mut out,
            &[
                r.name.clone(),
                r.email.clone(),
                r.sentence_id.clone(),
                r.model.clone(),
                r.naturalness.to_string(),
                r.accuracy.to_string(),
                timestamp(r.timestamp),
            ],
        );
    }
    out
}

pub fn comparative_to_csv(records: &[ComparativeSubmission]) -> String {
    let mut out = String::new();
    push_row(&mut out, &COMPARATIVE_HEADER);
    for r in records {
        push_row(
            &mut out,
            &[
                r.name.clone(),
                r.email.clone(),
                r.sentence_id.clone(),
                r.model_a.clone(),
                r.model_b.clone(),
                r.naturalness_cmos.to_string(),
                r.accuracy_cmos.to_string(),
                timestamp(r.timestamp),
            ],
        );
    }
    out
}

/// Export the records of one scheme. Records of the other scheme are left
/// out.
pub fn submissions_to_csv(records: &[Submission], scheme: RatingScheme) -> String {
    let (absolute, comparative) = Submission::partition(records);
    match scheme {
        RatingScheme::Absolute => absolute_to_csv(&absolute),
        RatingScheme::Comparative => comparative_to_csv(&comparative),
    }
}

pub fn comments_to_csv(comments: &[CommentSubmission]) -> String {
    let mut out = String::new();
    push_row(&mut out, &COMMENTS_HEADER);
    for c in comments {
        push_row(
            &mut out,
            &[
                c.name.clone(),
                c.email.clone(),
                c.comments.clone(),
                c.session_id.clone(),
                timestamp(c.timestamp),
            ],
        );
    }
    out
}

/// Write CSV content to a file, creating parent directories.
pub fn write_csv(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("failed to write CSV to {}", path.display()))?;
    Ok(())
}
