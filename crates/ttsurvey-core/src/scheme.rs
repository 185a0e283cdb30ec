//! Rating schemes and readiness policies.
//!
//! A study runs exactly one scheme, chosen at configuration time:
//!
//! - [`RatingScheme::Absolute`]: every model on every sentence gets a 1–5
//!   naturalness and a 1–5 accuracy score; one submission per model.
//! - [`RatingScheme::Comparative`]: two models are played side by side and the
//!   participant gives one signed −3..=3 score per dimension; one submission
//!   per sentence.
//!
//! Whether "all audio played" also gates advancing is a separate, explicit
//! [`ReadinessPolicy`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{
    AbsoluteSubmission, ComparativeSubmission, ModelShuffle, Participant, Submission, SurveyState,
};

/// Valid absolute (MOS) score range.
pub const ABSOLUTE_RANGE: std::ops::RangeInclusive<i8> = 1..=5;
/// Valid comparative (CMOS) score range.
pub const CMOS_RANGE: std::ops::RangeInclusive<i8> = -3..=3;

/// How ratings are collected and turned into submission records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingScheme {
    Absolute,
    Comparative,
}

impl fmt::Display for RatingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingScheme::Absolute => write!(f, "absolute"),
            RatingScheme::Comparative => write!(f, "comparative"),
        }
    }
}

impl FromStr for RatingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "absolute" | "mos" => Ok(RatingScheme::Absolute),
            "comparative" | "cmos" => Ok(RatingScheme::Comparative),
            other => Err(format!("unknown rating scheme: {other}")),
        }
    }
}

/// What must be true before the participant may leave a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessPolicy {
    /// Every required score is present and in range.
    #[default]
    Ratings,
    /// Every sample has been played through at least once.
    Audio,
    /// Both of the above.
    Both,
}

impl FromStr for ReadinessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ratings" => Ok(ReadinessPolicy::Ratings),
            "audio" => Ok(ReadinessPolicy::Audio),
            "both" => Ok(ReadinessPolicy::Both),
            other => Err(format!("unknown readiness policy: {other}")),
        }
    }
}

/// Which score field a prompt refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Naturalness,
    Accuracy,
}

impl Dimension {
    pub const ALL: [Dimension; 2] = [Dimension::Naturalness, Dimension::Accuracy];
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Naturalness => write!(f, "naturalness"),
            Dimension::Accuracy => write!(f, "accuracy"),
        }
    }
}

/// One score the participant must provide for a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredField {
    /// `Some(model)` in the absolute scheme, `None` in the comparative one.
    pub model: Option<String>,
    /// Position label the model is shown under (`A`, `B`, …).
    pub label: Option<String>,
    pub dimension: Dimension,
}

/// The scheme and readiness policy of one study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyDesign {
    pub scheme: RatingScheme,
    #[serde(default)]
    pub readiness: ReadinessPolicy,
    /// Canonical model list. Comparative studies use exactly two.
    pub models: Vec<String>,
}

impl StudyDesign {
    /// Check the design is usable. Called once at startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.models.is_empty() {
            return Err("study must list at least one model".into());
        }
        let mut seen = std::collections::HashSet::new();
        for m in &self.models {
            if !seen.insert(m) {
                return Err(format!("duplicate model: {m}"));
            }
        }
        if self.scheme == RatingScheme::Comparative && self.models.len() != 2 {
            return Err(format!(
                "comparative studies need exactly 2 models, got {}",
                self.models.len()
            ));
        }
        Ok(())
    }

    pub fn score_range(&self) -> std::ops::RangeInclusive<i8> {
        match self.scheme {
            RatingScheme::Absolute => ABSOLUTE_RANGE,
            RatingScheme::Comparative => CMOS_RANGE,
        }
    }

    /// Scores that must be filled in for `shuffle`'s sentence.
    pub fn required_fields(&self, shuffle: &ModelShuffle) -> Vec<RequiredField> {
        match self.scheme {
            RatingScheme::Absolute => shuffle
                .model_order
                .iter()
                .zip(shuffle.labels())
                .flat_map(|(model, label)| {
                    Dimension::ALL.into_iter().map(move |dimension| RequiredField {
                        model: Some(model.clone()),
                        label: Some(label.clone()),
                        dimension,
                    })
                })
                .collect(),
            RatingScheme::Comparative => Dimension::ALL
                .into_iter()
                .map(|dimension| RequiredField {
                    model: None,
                    label: None,
                    dimension,
                })
                .collect(),
        }
    }

    /// Whether every required score for the sentence is present and valid.
    pub fn ratings_complete(&self, state: &SurveyState, shuffle: &ModelShuffle) -> bool {
        let range = self.score_range();
        let valid = |v: Option<i8>| v.is_some_and(|v| range.contains(&v));
        match self.scheme {
            RatingScheme::Absolute => shuffle.model_order.iter().all(|model| {
                state
                    .rating(&shuffle.sentence_id, Some(model))
                    .is_some_and(|r| valid(r.naturalness) && valid(r.accuracy))
            }),
            RatingScheme::Comparative => state
                .rating(&shuffle.sentence_id, None)
                .is_some_and(|r| valid(r.naturalness) && valid(r.accuracy)),
        }
    }

    /// Whether every sample of the sentence has been played through.
    pub fn audio_complete(&self, state: &SurveyState, shuffle: &ModelShuffle) -> bool {
        let played = state.audio_play_status.get(&shuffle.sentence_id);
        shuffle
            .labels()
            .iter()
            .all(|label| played.is_some_and(|p| p.contains(label)))
    }

    /// Whether the readiness policy asks for complete ratings.
    pub fn requires_ratings(&self) -> bool {
        self.readiness != ReadinessPolicy::Audio
    }

    /// Readiness check for the sentence, according to the configured policy.
    pub fn is_ready(&self, state: &SurveyState, shuffle: &ModelShuffle) -> bool {
        match self.readiness {
            ReadinessPolicy::Ratings => self.ratings_complete(state, shuffle),
            ReadinessPolicy::Audio => self.audio_complete(state, shuffle),
            ReadinessPolicy::Both => {
                self.ratings_complete(state, shuffle) && self.audio_complete(state, shuffle)
            }
        }
    }

    /// Build the submission records for one sentence.
    ///
    /// Returns `None` if any required score is missing or out of range, so
    /// an incomplete sentence can never be written. Under the `Audio` policy
    /// a sentence may be ready without this succeeding.
    pub fn to_submissions(
        &self,
        state: &SurveyState,
        participant: &Participant,
        shuffle: &ModelShuffle,
    ) -> Option<Vec<Submission>> {
        if !self.ratings_complete(state, shuffle) {
            return None;
        }
        let sentence_id = &shuffle.sentence_id;
        match self.scheme {
            RatingScheme::Absolute => shuffle
                .model_order
                .iter()
                .map(|model| {
                    let r = state.rating(sentence_id, Some(model))?;
                    Some(Submission::Absolute(AbsoluteSubmission {
                        name: participant.name.clone(),
                        email: participant.email.clone(),
                        sentence_id: sentence_id.clone(),
                        model: model.clone(),
                        naturalness: r.naturalness?,
                        accuracy: r.accuracy?,
                        timestamp: None,
                    }))
                })
                .collect(),
            RatingScheme::Comparative => {
                let r = state.rating(sentence_id, None)?;
                let model_a = shuffle.model_order.first()?;
                let model_b = shuffle.model_order.get(1)?;
                Some(vec![Submission::Comparative(ComparativeSubmission {
                    name: participant.name.clone(),
                    email: participant.email.clone(),
                    sentence_id: sentence_id.clone(),
                    model_a: model_a.clone(),
                    model_b: model_b.clone(),
                    naturalness_cmos: r.naturalness?,
                    accuracy_cmos: r.accuracy?,
                    timestamp: None,
                })])
            }
        }
    }
}
