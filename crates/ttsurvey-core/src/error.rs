//! Error types shared across the workspace.
//!
//! Store errors live here rather than in `ttsurvey-store` so the session
//! controller can decide whether a failed flush is worth retrying without
//! depending on any particular backend.

use thiserror::Error;

/// Language used for participant-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    He,
    En,
}

/// Errors that can occur when talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store returned an error response.
    #[error("store error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("store request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// A stored document could not be decoded.
    #[error("failed to decode document: {0}")]
    Decode(String),

    /// Local file I/O failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store refused the write (used by test doubles).
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Returns `true` if repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::Network(_) | StoreError::Io(_) => true,
            StoreError::Api { status, .. } => *status == 429 || *status >= 500,
            StoreError::Decode(_) | StoreError::Rejected(_) => false,
        }
    }
}

/// Intake form and rating validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must be at least 2 characters")]
    NameTooShort,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("eligibility question was not answered")]
    EligibilityUnanswered,

    #[error("participant is not eligible for this study")]
    NotEligible,

    #[error("missing rating for sentence {sentence_id}")]
    MissingRating { sentence_id: String },
}

impl ValidationError {
    /// Message shown to the participant, never containing internals.
    pub fn user_message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (ValidationError::NameTooShort, Locale::He) => "נא להזין שם בן לפחות 2 תווים",
            (ValidationError::NameTooShort, Locale::En) => {
                "Please enter a name of at least 2 characters"
            }
            (ValidationError::InvalidEmail(_), Locale::He) => "נא להזין כתובת אימייל תקינה",
            (ValidationError::InvalidEmail(_), Locale::En) => "Please enter a valid email address",
            (ValidationError::EligibilityUnanswered, Locale::He) => "נא לענות על השאלה",
            (ValidationError::EligibilityUnanswered, Locale::En) => "Please answer the question",
            (ValidationError::NotEligible, Locale::He) => {
                "מחקר זה מיועד לדוברי עברית שפת אם בלבד."
            }
            (ValidationError::NotEligible, Locale::En) => {
                "This study is intended for native speakers only."
            }
            (ValidationError::MissingRating { .. }, Locale::He) => {
                "נא לדרג את כל הדגימות לפני המעבר למשפט הבא"
            }
            (ValidationError::MissingRating { .. }, Locale::En) => {
                "Please rate every sample before moving on"
            }
        }
    }
}

/// Errors while loading the static sentence list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentenceListError {
    #[error("sentence list is empty")]
    Empty,

    #[error("invalid sentence format at line {line}: {content}")]
    MalformedLine { line: usize, content: String },
}

/// Errors raised by session transitions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A required score for the current sentence is missing or out of range.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The samples of the current sentence have not all been played.
    #[error("sentence {sentence_id} is not ready to advance")]
    NotReady { sentence_id: String },

    /// `retreat()` was called on the first sentence.
    #[error("already at the first sentence")]
    AtFirstSentence,

    /// The session has already been completed.
    #[error("session is already complete")]
    AlreadyComplete,

    /// No shuffles have been generated yet.
    #[error("session has not been started")]
    NotStarted,

    /// A sentence id is not part of this session.
    #[error("unknown sentence: {0}")]
    UnknownSentence(String),

    /// Writing the current sentence to the store failed; nothing moved.
    #[error("failed to submit ratings for {sentence_id}: {source}")]
    Flush {
        sentence_id: String,
        #[source]
        source: StoreError,
    },
}

impl SessionError {
    /// Message shown to the participant.
    pub fn user_message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (SessionError::Flush { .. }, Locale::He) => "שגיאה בשמירת הנתונים. נא לנסות שוב.",
            (SessionError::Flush { .. }, Locale::En) => {
                "Saving your answers failed. Please try again."
            }
            (SessionError::Invalid(e), locale) => e.user_message(locale),
            (SessionError::NotReady { .. }, Locale::He) => {
                "נא להאזין לכל הדגימות לפני המעבר למשפט הבא"
            }
            (SessionError::NotReady { .. }, Locale::En) => {
                "Please listen to every sample before moving on"
            }
            (_, Locale::He) => "שגיאה בטעינת נתונים",
            (_, Locale::En) => "Something went wrong loading the survey",
        }
    }
}

/// Errors writing to the local cache. Loads never surface these.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(StoreError::Timeout(30).is_retryable());
        assert!(StoreError::Network("reset".into()).is_retryable());
        assert!(StoreError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(!StoreError::Api {
            status: 403,
            message: "denied".into()
        }
        .is_retryable());
        assert!(!StoreError::Decode("bad".into()).is_retryable());
    }

    #[test]
    fn user_messages_hide_internals() {
        let err = SessionError::Flush {
            sentence_id: "s1".into(),
            source: StoreError::Network("connection reset by peer".into()),
        };
        assert!(!err.user_message(Locale::En).contains("peer"));
        assert!(err.to_string().contains("connection reset"));
    }
}
