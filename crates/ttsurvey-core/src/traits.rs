//! Core trait definitions for the document store and the local key/value
//! storage behind the resumable cache.
//!
//! Store backends live in `ttsurvey-store`; the session controller only sees
//! these traits.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{CommentSubmission, Submission};

// ---------------------------------------------------------------------------
// Document store
// ---------------------------------------------------------------------------

/// Append-only document store holding submissions and comments.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Human-readable backend name (e.g. "firestore").
    fn name(&self) -> &str;

    /// Write all records for one sentence as a single atomic batch.
    ///
    /// Either every record is stored or none is. Records are stamped by the
    /// store; any timestamp already set is overwritten.
    async fn submit_batch(&self, records: Vec<Submission>) -> Result<(), StoreError>;

    /// Store a participant comment.
    async fn submit_comment(&self, comment: CommentSubmission) -> Result<(), StoreError>;

    /// Read back every submission.
    async fn all_submissions(&self) -> Result<Vec<Submission>, StoreError>;

    /// Read back every comment.
    async fn all_comments(&self) -> Result<Vec<CommentSubmission>, StoreError>;
}

// ---------------------------------------------------------------------------
// Local key/value storage
// ---------------------------------------------------------------------------

/// String key/value storage used by [`crate::cache::SessionCache`].
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> std::io::Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> std::io::Result<()>;
    fn remove_item(&self, key: &str) -> std::io::Result<()>;
    /// Every key currently stored.
    fn keys(&self) -> std::io::Result<Vec<String>>;
}
