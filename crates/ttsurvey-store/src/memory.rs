//! In-process store for tests and dry runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use ttsurvey_core::error::StoreError;
use ttsurvey_core::model::{CommentSubmission, Submission};
use ttsurvey_core::traits::SubmissionStore;

/// Keeps every document in memory.
///
/// Can be told to reject the next N batch writes, which is how flush failure
/// paths are exercised without a network.
#[derive(Default)]
pub struct MemoryStore {
    submissions: Mutex<Vec<Submission>>,
    comments: Mutex<Vec<CommentSubmission>>,
    /// Sizes of the accepted batches, in order.
    batches: Mutex<Vec<usize>>,
    call_count: AtomicU32,
    failures_left: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with existing submissions.
    pub fn with_submissions(records: Vec<Submission>) -> Self {
        Self {
            submissions: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Reject the next `n` calls to `submit_batch`.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Number of `submit_batch` calls, failed ones included.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    fn take_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn submit_batch(&self, mut records: Vec<Submission>) -> Result<(), StoreError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.take_failure() {
            return Err(StoreError::Rejected("injected failure".into()));
        }

        let now = Utc::now();
        for r in &mut records {
            r.set_timestamp(now);
        }
        self.batches.lock().unwrap().push(records.len());
        self.submissions.lock().unwrap().extend(records);
        Ok(())
    }

    async fn submit_comment(&self, mut comment: CommentSubmission) -> Result<(), StoreError> {
        comment.timestamp = Some(Utc::now());
        self.comments.lock().unwrap().push(comment);
        Ok(())
    }

    async fn all_submissions(&self) -> Result<Vec<Submission>, StoreError> {
        Ok(self.submissions())
    }

    async fn all_comments(&self) -> Result<Vec<CommentSubmission>, StoreError> {
        Ok(self.comments.lock().unwrap().clone())
    }
}
