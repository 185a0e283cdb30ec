//! Core data model types for ttsurvey.
//!
//! These are the records a session produces and consumes: the participant
//! profile, the sentences being rated, the per-sentence model shuffles and the
//! submission documents written to the store.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sentence from the static sentence list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub id: String,
    pub text: String,
}

/// The participant taking a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub name: String,
    pub email: String,
    /// Self-declared eligibility (native speaker of the study language).
    pub is_native_speaker: bool,
    pub session_id: String,
    /// Shuffled sentence ids for this session.
    pub sentence_order: Vec<String>,
    /// Optional free-text feedback, added at the end of the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// Per-sentence ordering of the synthesis models.
///
/// Position `i` of `model_order` is presented under [`position_label`]`(i)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelShuffle {
    pub sentence_id: String,
    pub model_order: Vec<String>,
}

impl ModelShuffle {
    /// The model shown under `label`, if any.
    pub fn model_for_label(&self, label: &str) -> Option<&str> {
        self.model_order
            .iter()
            .enumerate()
            .find(|(i, _)| position_label(*i) == label)
            .map(|(_, m)| m.as_str())
    }

    /// Position labels for every model in this shuffle.
    pub fn labels(&self) -> Vec<String> {
        (0..self.model_order.len()).map(position_label).collect()
    }
}

/// Anonymous label for a presentation slot: 0 → "A", 1 → "B", …
pub fn position_label(index: usize) -> String {
    let mut n = index;
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

/// Scores collected for one sentence, or one (sentence, model) pair.
///
/// `model` is `None` in the comparative variant where a single pair of signed
/// scores covers the whole sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub sentence_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naturalness: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<i8>,
}

impl Rating {
    pub fn new(sentence_id: &str, model: Option<&str>) -> Self {
        Self {
            sentence_id: sentence_id.to_string(),
            model: model.map(str::to_string),
            naturalness: None,
            accuracy: None,
        }
    }

    /// Whether this rating is stored under `(sentence_id, model)`.
    pub fn matches(&self, sentence_id: &str, model: Option<&str>) -> bool {
        self.sentence_id == sentence_id && self.model.as_deref() == model
    }

    /// Merge a partial update; fields left `None` in the update are kept.
    pub fn apply(&mut self, update: RatingUpdate) {
        if let Some(n) = update.naturalness {
            self.naturalness = Some(n);
        }
        if let Some(a) = update.accuracy {
            self.accuracy = Some(a);
        }
    }
}

/// Partial update for a [`Rating`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub naturalness: Option<i8>,
    pub accuracy: Option<i8>,
}

impl RatingUpdate {
    pub fn naturalness(value: i8) -> Self {
        Self {
            naturalness: Some(value),
            accuracy: None,
        }
    }

    pub fn accuracy(value: i8) -> Self {
        Self {
            naturalness: None,
            accuracy: Some(value),
        }
    }

    pub fn both(naturalness: i8, accuracy: i8) -> Self {
        Self {
            naturalness: Some(naturalness),
            accuracy: Some(accuracy),
        }
    }
}

/// Everything the progress state machine tracks for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyState {
    pub current_sentence_index: usize,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub model_shuffles: Vec<ModelShuffle>,
    #[serde(default)]
    pub is_complete: bool,
    /// Sentence ids already flushed to the store.
    #[serde(default)]
    pub submitted_sentences: Vec<String>,
    /// Sentence id → position labels whose audio has been played through.
    #[serde(default)]
    pub audio_play_status: BTreeMap<String, BTreeSet<String>>,
}

/// One absolute (MOS-style) rating document: one per (sentence, model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteSubmission {
    pub name: String,
    pub email: String,
    pub sentence_id: String,
    pub model: String,
    /// 1–5
    pub naturalness: i8,
    /// 1–5
    pub accuracy: i8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// One comparative (CMOS) rating document: one per sentence.
///
/// Positive scores mean `model_a` was preferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparativeSubmission {
    pub name: String,
    pub email: String,
    pub sentence_id: String,
    pub model_a: String,
    pub model_b: String,
    /// −3..=3
    pub naturalness_cmos: i8,
    /// −3..=3
    pub accuracy_cmos: i8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A submission document in either study variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Submission {
    Absolute(AbsoluteSubmission),
    Comparative(ComparativeSubmission),
}

impl Submission {
    pub fn name(&self) -> &str {
        match self {
            Submission::Absolute(s) => &s.name,
            Submission::Comparative(s) => &s.name,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Submission::Absolute(s) => &s.email,
            Submission::Comparative(s) => &s.email,
        }
    }

    pub fn sentence_id(&self) -> &str {
        match self {
            Submission::Absolute(s) => &s.sentence_id,
            Submission::Comparative(s) => &s.sentence_id,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Submission::Absolute(s) => s.timestamp,
            Submission::Comparative(s) => s.timestamp,
        }
    }

    /// Stamp the record. Called by stores at write time.
    pub fn set_timestamp(&mut self, at: DateTime<Utc>) {
        match self {
            Submission::Absolute(s) => s.timestamp = Some(at),
            Submission::Comparative(s) => s.timestamp = Some(at),
        }
    }

    /// Split a mixed list into its two variants.
    pub fn partition(
        records: &[Submission],
    ) -> (Vec<AbsoluteSubmission>, Vec<ComparativeSubmission>) {
        let mut absolute = Vec::new();
        let mut comparative = Vec::new();
        for r in records {
            match r {
                Submission::Absolute(s) => absolute.push(s.clone()),
                Submission::Comparative(s) => comparative.push(s.clone()),
            }
        }
        (absolute, comparative)
    }
}

/// A free-text comment left at the end of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentSubmission {
    pub name: String,
    pub email: String,
    pub comments: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}
