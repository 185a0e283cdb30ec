//! The `ttsurvey take` command.
//!
//! Runs one participant session over stdin/stdout. Every required score is
//! asked for in turn. Besides a score, any prompt accepts:
//!
//! - an empty line: keep the current value, if there is one
//! - `p` or `p <label>`: play every sample of the sentence, or one of them
//! - `<`: go back to the previous sentence
//! - `q`: save progress to the local cache and exit
//!
//! End of input and Ctrl-C behave like `q`.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use ttsurvey_core::audio::{audio_path, PlaybackCoordinator};
use ttsurvey_core::cache::{AutoSave, FileStorage, SessionCache};
use ttsurvey_core::error::{Locale, SessionError, StoreError, ValidationError};
use ttsurvey_core::model::RatingUpdate;
use ttsurvey_core::scheme::{Dimension, RatingScheme, RequiredField};
use ttsurvey_core::session::{Advance, SessionObserver, SurveySession};
use ttsurvey_core::validation::IntakeForm;

use super::{open_study, study_sentences};

pub struct TakeArgs {
    pub name: Option<String>,
    pub email: Option<String>,
    pub native: Option<String>,
    pub resume: Option<String>,
    pub resume_latest: bool,
    pub player: Option<String>,
}

/// Console progress observer.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_flush_start(&self, sentence_id: &str, records: usize) {
        eprintln!("  Saving: {sentence_id} ({records} record(s))");
    }

    fn on_flush_complete(&self, sentence_id: &str, _records: usize) {
        eprintln!("  Saved: {sentence_id}");
    }

    fn on_flush_error(&self, sentence_id: &str, error: &StoreError) {
        let hint = if error.is_retryable() { " (retryable)" } else { "" };
        eprintln!("  ERROR: {sentence_id}: {error}{hint}");
    }

    fn on_advance(&self, advance: Advance) {
        if advance == Advance::Completed {
            eprintln!("\nAll sentences rated.");
        }
    }
}

/// Participant-facing strings.
struct Messages {
    locale: Locale,
    name: &'static str,
    email: &'static str,
    native: &'static str,
    sentence: &'static str,
    of: &'static str,
    naturalness: &'static str,
    accuracy: &'static str,
    naturalness_question: &'static str,
    accuracy_question: &'static str,
    cmos_scale: &'static str,
    controls: &'static str,
    invalid_score: &'static str,
    first_sentence: &'static str,
    unknown_sample: &'static str,
    play_all: &'static str,
    retry: &'static str,
    comments: &'static str,
    comments_error: &'static str,
    comments_thanks: &'static str,
    thanks: &'static str,
    saved: &'static str,
}

const HE: Messages = Messages {
    locale: Locale::He,
    name: "שם מלא: ",
    email: "כתובת אימייל: ",
    native: "האם אתה דובר עברית שפת אם? (כן/לא): ",
    sentence: "משפט",
    of: "מתוך",
    naturalness: "טבעיות הדיבור",
    accuracy: "התאמה לטקסט",
    naturalness_question: "איזו הקלטה נשמעת טבעית יותר?",
    accuracy_question: "איזו הקלטה תואמת טוב יותר את הטקסט הכתוב?",
    cmos_scale: "3 = A הרבה יותר טוב, 0 = דומה, -3 = B הרבה יותר טוב",
    controls: "p הפעל, < חזור, q שמור וצא",
    invalid_score: "ציון לא תקין",
    first_sentence: "זהו המשפט הראשון",
    unknown_sample: "אין דגימה כזו",
    play_all: "האזינו לכל הדגימות (p) ואז Enter להמשך",
    retry: "Enter לניסיון חוזר, q לשמירה ויציאה: ",
    comments: "רוצים לשתף אותנו במשהו? (אופציונלי): ",
    comments_error: "שגיאה בשמירת ההערות. נא לנסות שוב.",
    comments_thanks: "תודה על המשוב!",
    thanks: "תודה רבה על השתתפותך!",
    saved: "ההתקדמות נשמרה. להמשך:",
};

const EN: Messages = Messages {
    locale: Locale::En,
    name: "Full name: ",
    email: "Email: ",
    native: "Are you a native speaker? (yes/no): ",
    sentence: "Sentence",
    of: "of",
    naturalness: "naturalness",
    accuracy: "accuracy",
    naturalness_question: "Which recording sounds more natural?",
    accuracy_question: "Which recording matches the written text better?",
    cmos_scale: "3 = A much better, 0 = similar, -3 = B much better",
    controls: "p play, < back, q save and quit",
    invalid_score: "Invalid score",
    first_sentence: "This is the first sentence",
    unknown_sample: "No such sample",
    play_all: "Listen to every sample (p), then press Enter to continue",
    retry: "Press Enter to retry, q to save and quit: ",
    comments: "Anything you would like to share? (optional): ",
    comments_error: "Saving your comment failed. Please try again.",
    comments_thanks: "Thanks for the feedback!",
    thanks: "Thank you for taking part!",
    saved: "Progress saved. To continue:",
};

fn messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::He => &HE,
        Locale::En => &EN,
    }
}

/// Line-oriented terminal I/O.
struct Console<R, W> {
    input: R,
    out: W,
}

impl<R: AsyncBufRead + Unpin, W: Write> Console<R, W> {
    /// Prompt and read one trimmed line. `None` at end of input.
    async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            writeln!(self.out)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Keep,
    Quit,
    Back,
    Play(Option<String>),
    Value(String),
}

fn parse_command(line: &str) -> Command {
    match line {
        "" => Command::Keep,
        "q" | "Q" => Command::Quit,
        "<" => Command::Back,
        "p" | "P" => Command::Play(None),
        other => match other.strip_prefix("p ").or_else(|| other.strip_prefix("P ")) {
            Some(label) => Command::Play(Some(label.trim().to_uppercase())),
            None => Command::Value(other.to_string()),
        },
    }
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" | "כ" | "כן" => Some(true),
        "n" | "no" | "ל" | "לא" => Some(false),
        _ => None,
    }
}

/// Presents samples and reports plays to the session.
struct Player {
    command: Option<String>,
    audio_base: String,
    extension: String,
    coordinator: PlaybackCoordinator,
}

impl Player {
    async fn play<R: AsyncBufRead + Unpin, W: Write>(
        &mut self,
        session: &mut SurveySession,
        label: Option<String>,
        console: &mut Console<R, W>,
        msg: &Messages,
    ) -> Result<()> {
        let Some(shuffle) = session.current_shuffle().cloned() else {
            return Ok(());
        };
        let labels = match label {
            Some(label) => vec![label],
            None => shuffle.labels(),
        };

        for label in labels {
            let Some(model) = shuffle.model_for_label(&label) else {
                console.say(format!("  {}: {label}", msg.unknown_sample))?;
                continue;
            };
            for paused in self.coordinator.play(&label) {
                tracing::debug!(label = %paused, "paused");
            }

            let path = audio_path(&self.audio_base, model, &shuffle.sentence_id, &self.extension);
            match &self.command {
                Some(command) => {
                    console.say(format!("  ▶ {label}"))?;
                    let mut parts = command.split_whitespace();
                    let program = parts.next().context("player command is empty")?;
                    let status = tokio::process::Command::new(program)
                        .args(parts)
                        .arg(&path)
                        .status()
                        .await
                        .with_context(|| format!("failed to run player '{program}'"))?;
                    if !status.success() {
                        tracing::warn!(label = %label, %status, "player exited with an error");
                        self.coordinator.pause(&label);
                        continue;
                    }
                }
                None => console.say(format!("  ▶ {label}  {path}"))?,
            }

            let event = self.coordinator.ended(&label);
            session.apply(event)?;
        }
        Ok(())
    }
}

enum Step {
    Rated,
    Back,
    Quit,
}

enum Outcome {
    Completed,
    Saved,
    Interrupted,
}

pub async fn execute(
    config_path: Option<PathBuf>,
    store: Option<String>,
    args: TakeArgs,
) -> Result<()> {
    let study = open_study(config_path.as_deref(), store.as_deref())?;
    let config = &study.config;
    let design = config.study.design()?;
    let msg = messages(config.study.locale);
    let cache = SessionCache::new(Arc::new(FileStorage::new(config.cache.dir.clone())));
    let mut console = Console {
        input: tokio::io::BufReader::new(tokio::io::stdin()),
        out: std::io::stdout(),
    };

    let sentences = study_sentences(config)?;
    let texts: HashMap<String, String> = sentences
        .iter()
        .map(|s| (s.id.clone(), s.text.clone()))
        .collect();

    let session = if let Some(id) = &args.resume {
        let entry = cache
            .load(id)
            .with_context(|| format!("no cached session '{id}'"))?;
        SurveySession::resume(entry, design, study.store.clone())?
    } else if args.resume_latest {
        let entry = cache
            .latest_incomplete()
            .context("no incomplete session in the cache")?;
        SurveySession::resume(entry, design, study.store.clone())?
    } else {
        let Some(form) = intake(&mut console, &args, config.study.locale).await? else {
            return Ok(());
        };
        let ids: Vec<String> = sentences.iter().map(|s| s.id.clone()).collect();
        SurveySession::start(&form, &ids, design, study.store.clone()).map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!("intake form rejected: {}", messages.join("; "))
        })?
    };
    anyhow::ensure!(
        !session.state().is_complete,
        "session {} is already complete",
        session.session_id()
    );

    let mut session = session
        .with_autosave(AutoSave::new(cache, config.cache.debounce()))
        .with_observer(Arc::new(ConsoleObserver));
    let mut player = Player {
        command: args.player.clone(),
        audio_base: config.study.audio_base.clone(),
        extension: config.study.audio_extension.clone(),
        coordinator: PlaybackCoordinator::default(),
    };

    console.say(format!(
        "{} | {} | session {}",
        config.study.name,
        session.design().scheme,
        session.session_id()
    ))?;

    let outcome = run_until(
        ctrl_c(),
        &mut session,
        &mut console,
        &mut player,
        &texts,
        msg,
    )
    .await?;

    match outcome {
        Outcome::Completed => {
            // Ratings are all stored; Ctrl-C only skips the comment.
            let interrupted = tokio::select! {
                result = closing_comments(&mut session, &mut console, msg) => {
                    result?;
                    false
                }
                () = ctrl_c() => true,
            };
            session.finish();
            console.say(format!("\n{}", msg.thanks))?;
            if interrupted {
                exit_interrupted();
            }
        }
        Outcome::Saved | Outcome::Interrupted => {
            console.say(format!(
                "\n{} ttsurvey take --resume {}",
                msg.saved,
                session.session_id()
            ))?;
            if matches!(outcome, Outcome::Interrupted) {
                exit_interrupted();
            }
        }
    }
    Ok(())
}

/// Exit with the conventional SIGINT status. A stdin read left pending by
/// the interrupted prompt would otherwise block runtime shutdown.
fn exit_interrupted() -> ! {
    let _ = std::io::stdout().flush();
    std::process::exit(130)
}

/// Resolves on Ctrl-C. Never resolves if the signal cannot be watched.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Fill in the intake form from flags and prompts.
///
/// Returns `None` if the participant is not eligible.
async fn intake<R: AsyncBufRead + Unpin, W: Write>(
    console: &mut Console<R, W>,
    args: &TakeArgs,
    locale: Locale,
) -> Result<Option<IntakeForm>> {
    let msg = messages(locale);
    let mut form = IntakeForm {
        name: args.name.clone().unwrap_or_default(),
        email: args.email.clone().unwrap_or_default(),
        is_native_speaker: args.native.as_deref().and_then(parse_yes_no),
    };

    loop {
        let errors = form.field_errors();
        if errors.is_empty() {
            break;
        }
        for error in errors {
            let (prompt, attempted) = match &error {
                ValidationError::NameTooShort => (msg.name, !form.name.is_empty()),
                ValidationError::InvalidEmail(_) => (msg.email, !form.email.is_empty()),
                _ => (msg.native, false),
            };
            if attempted {
                console.say(error.user_message(locale))?;
            }
            let answer = console
                .ask(prompt)
                .await?
                .context("input ended before the intake form was complete")?;
            match error {
                ValidationError::NameTooShort => form.name = answer,
                ValidationError::InvalidEmail(_) => form.email = answer,
                _ => form.is_native_speaker = parse_yes_no(&answer),
            }
        }
    }

    match form.validate() {
        Ok(()) => Ok(Some(form)),
        Err(errors) => {
            for error in &errors {
                console.say(error.user_message(locale))?;
            }
            Ok(None)
        }
    }
}

/// Run the session until it completes, the participant leaves, or
/// `interrupt` resolves. Any exit short of completion writes the cache.
async fn run_until<I, R, W>(
    interrupt: I,
    session: &mut SurveySession,
    console: &mut Console<R, W>,
    player: &mut Player,
    texts: &HashMap<String, String>,
    msg: &Messages,
) -> Result<Outcome>
where
    I: Future<Output = ()>,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let result = tokio::select! {
        result = run(session, console, player, texts, msg) => result,
        () = interrupt => {
            tracing::info!("interrupted");
            Ok(Outcome::Interrupted)
        }
    };
    if !matches!(result, Ok(Outcome::Completed)) && session.persist_now() {
        tracing::debug!(session_id = %session.session_id(), "progress written to cache");
    }
    result
}

async fn run<R: AsyncBufRead + Unpin, W: Write>(
    session: &mut SurveySession,
    console: &mut Console<R, W>,
    player: &mut Player,
    texts: &HashMap<String, String>,
    msg: &Messages,
) -> Result<Outcome> {
    loop {
        let sentence_id = session
            .current_sentence_id()
            .context("session has no current sentence")?
            .to_string();
        show_sentence(session, console, player, texts, msg)?;

        match rate_sentence(session, console, player, &sentence_id, msg).await? {
            Step::Quit => return Ok(Outcome::Saved),
            Step::Back => continue,
            Step::Rated => {}
        }

        loop {
            let result = session.advance().await;
            session.tick(Instant::now());
            match result {
                Ok(Advance::Completed) => return Ok(Outcome::Completed),
                Ok(Advance::Next(_)) => break,
                Err(e @ SessionError::Invalid(_)) => {
                    // Ask for the sentence again.
                    console.say(format!("  {}", e.user_message(msg.locale)))?;
                    break;
                }
                Err(SessionError::NotReady { sentence_id }) => {
                    tracing::debug!(sentence_id = %sentence_id, "not ready to advance");
                    console.say(format!("  {}", msg.play_all))?;
                    let Some(line) = console.ask("> ").await? else {
                        return Ok(Outcome::Saved);
                    };
                    match parse_command(&line) {
                        Command::Quit => return Ok(Outcome::Saved),
                        Command::Back => match session.retreat() {
                            Ok(_) => break,
                            Err(SessionError::AtFirstSentence) => {
                                console.say(msg.first_sentence)?
                            }
                            Err(e) => return Err(e.into()),
                        },
                        Command::Play(label) => player.play(session, label, console, msg).await?,
                        Command::Keep | Command::Value(_) => {}
                    }
                }
                Err(e @ SessionError::Flush { .. }) => {
                    console.say(format!("  {}", e.user_message(msg.locale)))?;
                    match console.ask(msg.retry).await?.as_deref() {
                        None | Some("q") | Some("Q") => return Ok(Outcome::Saved),
                        Some(_) => {}
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn show_sentence<R: AsyncBufRead + Unpin, W: Write>(
    session: &SurveySession,
    console: &mut Console<R, W>,
    player: &mut Player,
    texts: &HashMap<String, String>,
    msg: &Messages,
) -> Result<()> {
    let Some(shuffle) = session.current_shuffle() else {
        return Ok(());
    };
    let index = session.state().current_sentence_index;

    player.coordinator.reset(shuffle.sentence_id.clone());
    for label in shuffle.labels() {
        player.coordinator.register(label);
    }

    console.say(format!(
        "\n{} {} {} {}  ({}%)",
        msg.sentence,
        index + 1,
        msg.of,
        session.total(),
        session.progress_percentage()
    ))?;
    let text = texts
        .get(&shuffle.sentence_id)
        .map(String::as_str)
        .unwrap_or("");
    console.say(format!("  {text}"))?;
    let samples: Vec<&str> = player.coordinator.registered().collect();
    console.say(format!("  [{}]  {}", samples.join(" "), msg.controls))?;
    if session.design().scheme == RatingScheme::Comparative {
        console.say(format!("  {}", msg.cmos_scale))?;
    }
    Ok(())
}

fn current_value(session: &SurveySession, sentence_id: &str, field: &RequiredField) -> Option<i8> {
    let rating = session
        .state()
        .rating(sentence_id, field.model.as_deref())?;
    match field.dimension {
        Dimension::Naturalness => rating.naturalness,
        Dimension::Accuracy => rating.accuracy,
    }
}

fn field_prompt(field: &RequiredField, session: &SurveySession, current: Option<i8>, msg: &Messages) -> String {
    let range = session.design().score_range();
    let name = match (session.design().scheme, field.dimension) {
        (RatingScheme::Absolute, Dimension::Naturalness) => msg.naturalness,
        (RatingScheme::Absolute, Dimension::Accuracy) => msg.accuracy,
        (RatingScheme::Comparative, Dimension::Naturalness) => msg.naturalness_question,
        (RatingScheme::Comparative, Dimension::Accuracy) => msg.accuracy_question,
    };
    let label = field
        .label
        .as_deref()
        .map(|l| format!("[{l}] "))
        .unwrap_or_default();
    let current = current.map(|v| format!(" [{v}]")).unwrap_or_default();
    format!(
        "  {label}{name} ({}..{}){current}: ",
        range.start(),
        range.end()
    )
}

async fn rate_sentence<R: AsyncBufRead + Unpin, W: Write>(
    session: &mut SurveySession,
    console: &mut Console<R, W>,
    player: &mut Player,
    sentence_id: &str,
    msg: &Messages,
) -> Result<Step> {
    let shuffle = session
        .current_shuffle()
        .cloned()
        .context("no model order for the current sentence")?;
    let fields = session.design().required_fields(&shuffle);
    let range = session.design().score_range();

    for field in &fields {
        loop {
            let current = current_value(session, sentence_id, field);
            let prompt = field_prompt(field, session, current, msg);
            let Some(line) = console.ask(&prompt).await? else {
                return Ok(Step::Quit);
            };

            let done = match parse_command(&line) {
                Command::Quit => return Ok(Step::Quit),
                Command::Back => match session.retreat() {
                    Ok(_) => return Ok(Step::Back),
                    Err(SessionError::AtFirstSentence) => {
                        console.say(format!("  {}", msg.first_sentence))?;
                        false
                    }
                    Err(e) => return Err(e.into()),
                },
                Command::Play(label) => {
                    player.play(session, label, console, msg).await?;
                    false
                }
                Command::Keep => {
                    if current.is_none() {
                        console.say(format!("  {}", msg.invalid_score))?;
                    }
                    current.is_some()
                }
                Command::Value(raw) => match raw.parse::<i8>() {
                    Ok(value) if range.contains(&value) => {
                        let update = match field.dimension {
                            Dimension::Naturalness => RatingUpdate::naturalness(value),
                            Dimension::Accuracy => RatingUpdate::accuracy(value),
                        };
                        session.record_rating(sentence_id, field.model.as_deref(), update)?;
                        true
                    }
                    _ => {
                        console.say(format!("  {}: {raw}", msg.invalid_score))?;
                        false
                    }
                },
            };
            session.tick(Instant::now());
            if done {
                break;
            }
        }
    }
    Ok(Step::Rated)
}

async fn closing_comments<R: AsyncBufRead + Unpin, W: Write>(
    session: &mut SurveySession,
    console: &mut Console<R, W>,
    msg: &Messages,
) -> Result<()> {
    loop {
        let Some(line) = console.ask(msg.comments).await? else {
            return Ok(());
        };
        match session.submit_comments(&line).await {
            Ok(true) => {
                console.say(msg.comments_thanks)?;
                return Ok(());
            }
            Ok(false) => return Ok(()),
            Err(e) => {
                tracing::warn!(session_id = %session.session_id(), "failed to submit comment: {e}");
                console.say(msg.comments_error)?;
            }
        }
    }
}
