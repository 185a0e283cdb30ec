//! The session controller.
//!
//! [`SurveySession`] owns one participant's profile and progress state and
//! talks to the document store and the local cache on their behalf. Every
//! state change schedules a cache write; leaving a sentence flushes its
//! ratings to the store first and only moves on once the write succeeded.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::cache::{AutoSave, CacheEntry};
use crate::error::{SessionError, StoreError, ValidationError};
use crate::model::{CommentSubmission, ModelShuffle, Participant, RatingUpdate, SurveyState};
use crate::scheme::StudyDesign;
use crate::shuffle::generate_shuffles;
use crate::state::{Phase, SurveyEvent};
use crate::traits::SubmissionStore;
use crate::validation::IntakeForm;

/// Result of a successful [`SurveySession::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved on to the sentence at this index.
    Next(usize),
    /// The last sentence was left; the session is complete.
    Completed,
}

/// Callback for session progress.
pub trait SessionObserver: Send + Sync {
    fn on_flush_start(&self, sentence_id: &str, records: usize);
    fn on_flush_complete(&self, sentence_id: &str, records: usize);
    fn on_flush_error(&self, sentence_id: &str, error: &StoreError);
    fn on_advance(&self, advance: Advance);
}

/// No-op session observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_flush_start(&self, _: &str, _: usize) {}
    fn on_flush_complete(&self, _: &str, _: usize) {}
    fn on_flush_error(&self, _: &str, _: &StoreError) {}
    fn on_advance(&self, _: Advance) {}
}

/// One participant's run through a study.
pub struct SurveySession {
    participant: Participant,
    state: SurveyState,
    design: StudyDesign,
    store: Arc<dyn SubmissionStore>,
    autosave: Option<AutoSave>,
    observer: Arc<dyn SessionObserver>,
}

impl SurveySession {
    /// Validate the intake form and start a new session with a fresh id.
    pub fn start(
        form: &IntakeForm,
        sentence_ids: &[String],
        design: StudyDesign,
        store: Arc<dyn SubmissionStore>,
    ) -> Result<Self, Vec<ValidationError>> {
        let session_id = Uuid::new_v4().to_string();
        Self::start_with_id(&session_id, form, sentence_ids, design, store)
    }

    /// Like [`SurveySession::start`] with a caller-chosen session id.
    ///
    /// The id seeds every shuffle, so the same id always yields the same
    /// presentation order.
    pub fn start_with_id(
        session_id: &str,
        form: &IntakeForm,
        sentence_ids: &[String],
        design: StudyDesign,
        store: Arc<dyn SubmissionStore>,
    ) -> Result<Self, Vec<ValidationError>> {
        form.validate()?;

        let shuffles = generate_shuffles(session_id, sentence_ids, &design.models);
        let participant = Participant {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            is_native_speaker: true,
            session_id: session_id.to_string(),
            sentence_order: shuffles.sentence_order.clone(),
            comments: None,
        };

        tracing::info!(
            session_id,
            sentences = participant.sentence_order.len(),
            scheme = %design.scheme,
            "session started"
        );

        Ok(Self {
            participant,
            state: SurveyState::started(&shuffles),
            design,
            store,
            autosave: None,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Rebuild a session from a cached snapshot.
    pub fn resume(
        entry: CacheEntry,
        design: StudyDesign,
        store: Arc<dyn SubmissionStore>,
    ) -> Result<Self, SessionError> {
        let CacheEntry {
            user_data,
            survey_state,
            ..
        } = entry;

        if survey_state.model_shuffles.is_empty() || user_data.sentence_order.is_empty() {
            return Err(SessionError::NotStarted);
        }
        if let Some(missing) = user_data
            .sentence_order
            .iter()
            .find(|id| survey_state.model_shuffle(id).is_none())
        {
            return Err(SessionError::UnknownSentence(missing.clone()));
        }

        tracing::info!(
            session_id = %user_data.session_id,
            index = survey_state.current_sentence_index,
            submitted = survey_state.submitted_sentences.len(),
            "session resumed from cache"
        );

        Ok(Self {
            participant: user_data,
            state: survey_state,
            design,
            store,
            autosave: None,
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_autosave(mut self, autosave: AutoSave) -> Self {
        self.autosave = Some(autosave);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    // -- accessors ---------------------------------------------------------

    pub fn session_id(&self) -> &str {
        &self.participant.session_id
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn state(&self) -> &SurveyState {
        &self.state
    }

    pub fn design(&self) -> &StudyDesign {
        &self.design
    }

    pub fn sentence_order(&self) -> &[String] {
        &self.participant.sentence_order
    }

    pub fn total(&self) -> usize {
        self.participant.sentence_order.len()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn current_sentence_id(&self) -> Option<&str> {
        self.state.current_sentence_id(&self.participant.sentence_order)
    }

    pub fn current_shuffle(&self) -> Option<&ModelShuffle> {
        self.current_sentence_id()
            .and_then(|id| self.state.model_shuffle(id))
    }

    /// Whether the current sentence may be left.
    pub fn is_ready(&self) -> bool {
        self.current_shuffle()
            .is_some_and(|shuffle| self.design.is_ready(&self.state, shuffle))
    }

    pub fn progress_percentage(&self) -> u8 {
        self.state.progress_percentage(self.total())
    }

    pub fn is_last(&self) -> bool {
        self.state.is_last(self.total())
    }

    /// Snapshot of everything the cache stores.
    pub fn cache_entry(&self) -> CacheEntry {
        CacheEntry::new(self.participant.clone(), self.state.clone())
    }

    // -- transitions -------------------------------------------------------

    /// Apply a UI event and schedule a cache write.
    pub fn apply(&mut self, event: SurveyEvent) -> Result<(), SessionError> {
        self.state.apply(event)?;
        self.touch();
        Ok(())
    }

    pub fn record_rating(
        &mut self,
        sentence_id: &str,
        model: Option<&str>,
        update: RatingUpdate,
    ) -> Result<(), SessionError> {
        self.apply(SurveyEvent::RatingChanged {
            sentence_id: sentence_id.to_string(),
            model: model.map(str::to_string),
            update,
        })
    }

    pub fn audio_played(&mut self, sentence_id: &str, label: &str) -> Result<(), SessionError> {
        self.apply(SurveyEvent::AudioPlayed {
            sentence_id: sentence_id.to_string(),
            label: label.to_string(),
        })
    }

    pub fn retreat(&mut self) -> Result<usize, SessionError> {
        let index = self.state.retreat()?;
        self.touch();
        Ok(index)
    }

    pub fn complete(&mut self) {
        self.state.complete();
        self.touch();
    }

    /// Back to intake. The cached entry for this session is removed.
    pub fn reset(&mut self) {
        self.state.reset();
        if let Some(autosave) = self.autosave.as_mut() {
            autosave.discard();
            autosave.cache().clear(&self.participant.session_id);
        }
    }

    /// Leave the current sentence.
    ///
    /// The sentence must satisfy the readiness policy. If it has not been
    /// submitted yet its records are written in one batch first; a failed
    /// write leaves the index and the submitted set untouched.
    pub async fn advance(&mut self) -> Result<Advance, SessionError> {
        if self.state.is_complete {
            return Err(SessionError::AlreadyComplete);
        }
        let total = self.total();
        let sentence_id = self
            .current_sentence_id()
            .ok_or(SessionError::NotStarted)?
            .to_string();
        let shuffle = self
            .state
            .model_shuffle(&sentence_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSentence(sentence_id.clone()))?;

        if self.design.requires_ratings() && !self.design.ratings_complete(&self.state, &shuffle) {
            return Err(ValidationError::MissingRating { sentence_id }.into());
        }
        if !self.design.is_ready(&self.state, &shuffle) {
            return Err(SessionError::NotReady { sentence_id });
        }

        if !self.state.is_submitted(&sentence_id) {
            self.flush(&shuffle).await?;
        }

        let advance = match self.state.step_forward(total) {
            Some(index) => Advance::Next(index),
            None => Advance::Completed,
        };
        self.observer.on_advance(advance);
        // The submitted set must reach the cache before anything else can
        // happen, or a resumed session would flush this sentence again.
        self.persist_now();
        Ok(advance)
    }

    async fn flush(&mut self, shuffle: &ModelShuffle) -> Result<(), SessionError> {
        let sentence_id = shuffle.sentence_id.as_str();
        let Some(records) = self
            .design
            .to_submissions(&self.state, &self.participant, shuffle)
        else {
            // Only reachable under the audio-only readiness policy.
            tracing::warn!(sentence_id, "ratings incomplete; nothing submitted");
            return Ok(());
        };

        let count = records.len();
        self.observer.on_flush_start(sentence_id, count);

        match self.store.submit_batch(records).await {
            Ok(()) => {
                self.state.mark_submitted(sentence_id);
                tracing::info!(
                    session_id = %self.participant.session_id,
                    sentence_id,
                    records = count,
                    store = self.store.name(),
                    "submitted ratings"
                );
                self.observer.on_flush_complete(sentence_id, count);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(sentence_id, "failed to submit ratings: {e}");
                self.observer.on_flush_error(sentence_id, &e);
                Err(SessionError::Flush {
                    sentence_id: sentence_id.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Store the participant's closing comment. Blank comments are skipped.
    ///
    /// Returns `true` if a comment was written.
    pub async fn submit_comments(&mut self, comments: &str) -> Result<bool, StoreError> {
        let comments = comments.trim();
        if comments.is_empty() {
            return Ok(false);
        }

        self.store
            .submit_comment(CommentSubmission {
                name: self.participant.name.clone(),
                email: self.participant.email.clone(),
                comments: comments.to_string(),
                session_id: self.participant.session_id.clone(),
                timestamp: None,
            })
            .await?;

        self.participant.comments = Some(comments.to_string());
        tracing::info!(session_id = %self.participant.session_id, "comment submitted");
        Ok(true)
    }

    // -- cache -------------------------------------------------------------

    fn touch(&mut self) {
        self.touch_at(Instant::now());
    }

    /// Schedule a cache write of the current snapshot as of `now`.
    pub fn touch_at(&mut self, now: Instant) {
        let entry = self.cache_entry();
        if let Some(autosave) = self.autosave.as_mut() {
            autosave.schedule(entry, now);
        }
    }

    /// Write the pending snapshot if its debounce window has elapsed.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.autosave.as_mut().is_some_and(|a| a.poll(now))
    }

    /// Write the current snapshot immediately.
    ///
    /// Called before exiting while the session is incomplete.
    pub fn persist_now(&mut self) -> bool {
        let entry = self.cache_entry();
        match self.autosave.as_mut() {
            Some(autosave) => {
                autosave.schedule(entry, Instant::now());
                autosave.flush()
            }
            None => false,
        }
    }

    /// Drop the cached entry once the session is over.
    pub fn finish(&mut self) {
        if let Some(autosave) = self.autosave.as_mut() {
            autosave.discard();
            autosave.cache().clear(&self.participant.session_id);
        }
        tracing::debug!(session_id = %self.participant.session_id, "session finished");
    }
}
