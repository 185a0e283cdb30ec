//! Pure progress transitions on [`SurveyState`].
//!
//! Nothing here performs I/O. The session controller in [`crate::session`]
//! owns a `SurveyState`, calls these transitions and takes care of flushing
//! and caching around them.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::model::{ModelShuffle, Rating, RatingUpdate, SurveyState};
use crate::shuffle::Shuffles;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No shuffles yet: the participant is still on the intake form.
    Intake,
    /// Rating the sentence at this index of the sentence order.
    InProgress(usize),
    Complete,
}

/// Input events the state machine understands.
///
/// UI callbacks (button clicks, audio `ended` events) are translated into
/// these rather than mutating state directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SurveyEvent {
    RatingChanged {
        sentence_id: String,
        model: Option<String>,
        update: RatingUpdate,
    },
    AudioPlayed {
        sentence_id: String,
        label: String,
    },
    Retreat,
    Complete,
    Reset,
}

impl SurveyState {
    /// Fresh in-progress state for a newly generated session.
    pub fn started(shuffles: &Shuffles) -> Self {
        Self {
            model_shuffles: shuffles.model_shuffles.clone(),
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        if self.is_complete {
            Phase::Complete
        } else if self.model_shuffles.is_empty() {
            Phase::Intake
        } else {
            Phase::InProgress(self.current_sentence_index)
        }
    }

    pub fn rating(&self, sentence_id: &str, model: Option<&str>) -> Option<&Rating> {
        self.ratings.iter().find(|r| r.matches(sentence_id, model))
    }

    /// Upsert score fields for `(sentence_id, model)`. Does not move the index.
    pub fn record_rating(&mut self, sentence_id: &str, model: Option<&str>, update: RatingUpdate) {
        match self.ratings.iter_mut().find(|r| r.matches(sentence_id, model)) {
            Some(existing) => existing.apply(update),
            None => {
                let mut rating = Rating::new(sentence_id, model);
                rating.apply(update);
                self.ratings.push(rating);
            }
        }
    }

    /// Record that the sample under `label` was played through.
    pub fn mark_audio_played(&mut self, sentence_id: &str, label: &str) {
        self.audio_play_status
            .entry(sentence_id.to_string())
            .or_default()
            .insert(label.to_string());
    }

    pub fn is_submitted(&self, sentence_id: &str) -> bool {
        self.submitted_sentences.iter().any(|s| s == sentence_id)
    }

    /// Idempotent: marking twice leaves one entry.
    pub fn mark_submitted(&mut self, sentence_id: &str) {
        if !self.is_submitted(sentence_id) {
            self.submitted_sentences.push(sentence_id.to_string());
        }
    }

    pub fn can_go_previous(&self) -> bool {
        !self.is_complete && self.current_sentence_index > 0
    }

    /// Move back one sentence. Never resubmits anything.
    pub fn retreat(&mut self) -> Result<usize, SessionError> {
        if self.is_complete {
            return Err(SessionError::AlreadyComplete);
        }
        if self.current_sentence_index == 0 {
            return Err(SessionError::AtFirstSentence);
        }
        self.current_sentence_index -= 1;
        Ok(self.current_sentence_index)
    }

    /// Move forward one sentence without any readiness or flush checks.
    ///
    /// Callers go through [`crate::session::SurveySession::advance`].
    pub(crate) fn step_forward(&mut self, total: usize) -> Option<usize> {
        if self.current_sentence_index + 1 >= total {
            self.complete();
            None
        } else {
            self.current_sentence_index += 1;
            Some(self.current_sentence_index)
        }
    }

    pub fn complete(&mut self) {
        self.is_complete = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_last(&self, total: usize) -> bool {
        total > 0 && self.current_sentence_index + 1 >= total
    }

    /// Share of sentences already behind the participant, 0–100.
    pub fn progress_percentage(&self, total: usize) -> u8 {
        if total == 0 {
            return 0;
        }
        if self.is_complete {
            return 100;
        }
        ((self.current_sentence_index * 100) / total).min(100) as u8
    }

    pub fn current_sentence_id<'a>(&self, order: &'a [String]) -> Option<&'a str> {
        order.get(self.current_sentence_index).map(String::as_str)
    }

    pub fn model_shuffle(&self, sentence_id: &str) -> Option<&ModelShuffle> {
        self.model_shuffles
            .iter()
            .find(|m| m.sentence_id == sentence_id)
    }

    /// Apply a UI event.
    pub fn apply(&mut self, event: SurveyEvent) -> Result<(), SessionError> {
        match event {
            SurveyEvent::RatingChanged {
                sentence_id,
                model,
                update,
            } => {
                if self.model_shuffle(&sentence_id).is_none() {
                    return Err(SessionError::UnknownSentence(sentence_id));
                }
                self.record_rating(&sentence_id, model.as_deref(), update);
            }
            SurveyEvent::AudioPlayed { sentence_id, label } => {
                if self.model_shuffle(&sentence_id).is_none() {
                    return Err(SessionError::UnknownSentence(sentence_id));
                }
                self.mark_audio_played(&sentence_id, &label);
            }
            SurveyEvent::Retreat => {
                self.retreat()?;
            }
            SurveyEvent::Complete => self.complete(),
            SurveyEvent::Reset => self.reset(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> SurveyState {
        let shuffles = Shuffles {
            sentence_order: vec!["s1".into(), "s2".into(), "s3".into()],
            model_shuffles: ["s1", "s2", "s3"]
                .iter()
                .map(|s| ModelShuffle {
                    sentence_id: s.to_string(),
                    model_order: vec!["m1".into(), "m2".into()],
                })
                .collect(),
        };
        SurveyState::started(&shuffles)
    }

    #[test]
    fn phases() {
        let mut state = SurveyState::default();
        assert_eq!(state.phase(), Phase::Intake);

        state = started();
        assert_eq!(state.phase(), Phase::InProgress(0));

        state.complete();
        assert_eq!(state.phase(), Phase::Complete);
    }

    #[test]
    fn record_rating_upserts() {
        let mut state = started();
        state.record_rating("s1", Some("m1"), RatingUpdate::naturalness(3));
        state.record_rating("s1", Some("m1"), RatingUpdate::accuracy(5));
        state.record_rating("s1", Some("m2"), RatingUpdate::naturalness(1));

        assert_eq!(state.ratings.len(), 2);
        let r = state.rating("s1", Some("m1")).unwrap();
        assert_eq!((r.naturalness, r.accuracy), (Some(3), Some(5)));
        assert_eq!(state.current_sentence_index, 0);
    }

    #[test]
    fn retreat_bounds() {
        let mut state = started();
        assert!(matches!(state.retreat(), Err(SessionError::AtFirstSentence)));

        state.step_forward(3);
        state.step_forward(3);
        assert_eq!(state.current_sentence_index, 2);
        assert_eq!(state.retreat().unwrap(), 1);
    }

    #[test]
    fn step_forward_completes_at_end() {
        let mut state = started();
        assert_eq!(state.step_forward(3), Some(1));
        assert_eq!(state.step_forward(3), Some(2));
        assert!(state.is_last(3));
        assert_eq!(state.step_forward(3), None);
        assert!(state.is_complete);
        assert_eq!(state.current_sentence_index, 2);
    }

    #[test]
    fn mark_submitted_is_idempotent() {
        let mut state = started();
        state.mark_submitted("s1");
        state.mark_submitted("s1");
        assert_eq!(state.submitted_sentences, vec!["s1".to_string()]);
        assert!(state.is_submitted("s1"));
        assert!(!state.is_submitted("s2"));
    }

    #[test]
    fn complete_is_idempotent_and_reset_clears() {
        let mut state = started();
        state.record_rating("s1", None, RatingUpdate::both(1, 1));
        state.mark_submitted("s1");
        state.complete();
        state.complete();
        assert!(state.is_complete);

        state.reset();
        assert_eq!(state, SurveyState::default());
        assert_eq!(state.phase(), Phase::Intake);
    }

    #[test]
    fn progress_percentage() {
        let mut state = started();
        assert_eq!(state.progress_percentage(3), 0);
        state.step_forward(3);
        assert_eq!(state.progress_percentage(3), 33);
        state.complete();
        assert_eq!(state.progress_percentage(3), 100);
        assert_eq!(SurveyState::default().progress_percentage(0), 0);
    }

    #[test]
    fn events_drive_transitions() {
        let mut state = started();
        state
            .apply(SurveyEvent::RatingChanged {
                sentence_id: "s2".into(),
                model: None,
                update: RatingUpdate::both(2, -1),
            })
            .unwrap();
        state
            .apply(SurveyEvent::AudioPlayed {
                sentence_id: "s2".into(),
                label: "A".into(),
            })
            .unwrap();
        assert!(state.audio_play_status["s2"].contains("A"));
        assert!(state.rating("s2", None).is_some());

        let err = state
            .apply(SurveyEvent::AudioPlayed {
                sentence_id: "nope".into(),
                label: "A".into(),
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownSentence(_)));

        assert!(state.apply(SurveyEvent::Retreat).is_err());
        state.apply(SurveyEvent::Complete).unwrap();
        assert_eq!(state.phase(), Phase::Complete);
        state.apply(SurveyEvent::Reset).unwrap();
        assert_eq!(state.phase(), Phase::Intake);
    }

    #[test]
    fn current_sentence_id_follows_index() {
        let order: Vec<String> = vec!["s3".into(), "s1".into()];
        let mut state = started();
        assert_eq!(state.current_sentence_id(&order), Some("s3"));
        state.step_forward(2);
        assert_eq!(state.current_sentence_id(&order), Some("s1"));
    }
}
