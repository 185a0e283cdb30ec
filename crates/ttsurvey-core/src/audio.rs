//! Audio sample addressing and single-player coordination.

use std::collections::BTreeSet;

use crate::state::SurveyEvent;

/// Default audio file extension.
pub const DEFAULT_AUDIO_EXTENSION: &str = "m4a";

/// Location of the sample for `model` reading `sentence_id`.
///
/// `{base}/{model}/{sentence_id}.{extension}`; a trailing slash on `base` is
/// tolerated.
pub fn audio_path(base: &str, model: &str, sentence_id: &str, extension: &str) -> String {
    let base = base.trim_end_matches('/');
    let extension = extension.trim_start_matches('.');
    if base.is_empty() {
        format!("{model}/{sentence_id}.{extension}")
    } else {
        format!("{base}/{model}/{sentence_id}.{extension}")
    }
}

/// Keeps at most one sample of a sentence playing.
///
/// The coordinator does not play anything itself. The player reports
/// `play`/`pause`/`ended`; the coordinator answers with the labels that must
/// be paused and, on `ended`, the event to feed into the state machine.
#[derive(Debug, Default)]
pub struct PlaybackCoordinator {
    sentence_id: String,
    registered: BTreeSet<String>,
    playing: Option<String>,
}

impl PlaybackCoordinator {
    pub fn new(sentence_id: impl Into<String>) -> Self {
        Self {
            sentence_id: sentence_id.into(),
            ..Self::default()
        }
    }

    pub fn sentence_id(&self) -> &str {
        &self.sentence_id
    }

    /// Register a player for `label`.
    pub fn register(&mut self, label: impl Into<String>) {
        self.registered.insert(label.into());
    }

    /// Switch to a new sentence. Everything registered is forgotten.
    pub fn reset(&mut self, sentence_id: impl Into<String>) {
        self.sentence_id = sentence_id.into();
        self.registered.clear();
        self.playing = None;
    }

    /// `label` started playing. Returns the labels that must be paused.
    pub fn play(&mut self, label: &str) -> Vec<String> {
        self.registered.insert(label.to_string());
        let to_pause = match self.playing.take() {
            Some(previous) if previous != label => vec![previous],
            _ => Vec::new(),
        };
        self.playing = Some(label.to_string());
        to_pause
    }

    pub fn pause(&mut self, label: &str) {
        if self.playing.as_deref() == Some(label) {
            self.playing = None;
        }
    }

    /// `label` played through to the end.
    pub fn ended(&mut self, label: &str) -> SurveyEvent {
        self.pause(label);
        SurveyEvent::AudioPlayed {
            sentence_id: self.sentence_id.clone(),
            label: label.to_string(),
        }
    }

    pub fn playing(&self) -> Option<&str> {
        self.playing.as_deref()
    }

    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.registered.iter().map(String::as_str)
    }
}
