//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ttsurvey() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("ttsurvey").unwrap()
}

fn study_dir(scheme: &str, readiness: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let config = format!(
        r#"default_store = "local"

[study]
name = "CLI Test"
scheme = "{scheme}"
models = ["m1", "m2"]
readiness = "{readiness}"
sentences = "sentences.csv"
locale = "en"

[cache]
dir = "cache"

[stores.local]
type = "file"
dir = "data"
"#
    );
    std::fs::write(dir.path().join("ttsurvey.toml"), config).unwrap();
    std::fs::write(dir.path().join("sentences.csv"), "s1|one\ns2|two\n").unwrap();
    dir
}

fn lines(path: std::path::PathBuf) -> usize {
    std::fs::read_to_string(path)
        .map(|c| c.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0)
}

fn take_full_session(dir: &TempDir) {
    ttsurvey()
        .current_dir(dir.path())
        .args(["take", "--name", "Dana", "--email", "dana@example.com", "--native", "yes"])
        .write_stdin("4\n5\n3\n4\n2\n2\n5\n4\ngreat study\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Thank you for taking part!"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    ttsurvey()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created ttsurvey.toml"))
        .stdout(predicate::str::contains("Created sentences.csv"));

    assert!(dir.path().join("ttsurvey.toml").exists());
    assert!(dir.path().join("sentences.csv").exists());

    // The generated files pass validation.
    ttsurvey()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 sentences"))
        .stdout(predicate::str::contains("All sentences valid"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    ttsurvey()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    ttsurvey()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn validate_reports_sentence_warnings() {
    let dir = study_dir("absolute", "ratings");
    std::fs::write(dir.path().join("sentences.csv"), "s1|one\ns1|again\n").unwrap();

    ttsurvey()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("duplicate sentence ID: s1"))
        .stdout(predicate::str::contains("1 warning(s) found."));
}

#[test]
fn validate_checks_audio_files() {
    let dir = study_dir("absolute", "ratings");
    std::fs::create_dir_all(dir.path().join("audio/m1")).unwrap();
    std::fs::write(dir.path().join("audio/m1/s1.m4a"), b"").unwrap();

    ttsurvey()
        .current_dir(dir.path())
        .args(["validate", "--check-audio"])
        .assert()
        .success()
        .stdout(predicate::str::contains("missing audio file audio/m2/s1.m4a"))
        .stdout(predicate::str::contains("3 warning(s) found."));
}

#[test]
fn validate_rejects_malformed_sentence_list() {
    let dir = study_dir("absolute", "ratings");
    std::fs::write(dir.path().join("sentences.csv"), "s1|one\nno pipe here\n").unwrap();

    ttsurvey()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn validate_rejects_bad_comparative_design() {
    let dir = study_dir("absolute", "ratings");
    let config = std::fs::read_to_string(dir.path().join("ttsurvey.toml"))
        .unwrap()
        .replace("scheme = \"absolute\"", "scheme = \"comparative\"")
        .replace("[\"m1\", \"m2\"]", "[\"m1\", \"m2\", \"m3\"]");
    std::fs::write(dir.path().join("ttsurvey.toml"), config).unwrap();

    ttsurvey()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("exactly 2 models"));
}

#[test]
fn missing_config_file_fails() {
    ttsurvey()
        .args(["validate", "--config", "no_such_config.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn shuffle_is_deterministic() {
    let dir = study_dir("absolute", "ratings");

    let run = || {
        ttsurvey()
            .current_dir(dir.path())
            .args(["shuffle", "--session", "abc-123", "--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    };
    let first = run();
    assert_eq!(first, run());

    let parsed: serde_json::Value = serde_json::from_slice(&first).unwrap();
    assert_eq!(parsed["sentenceOrder"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["modelShuffles"].as_array().unwrap().len(), 2);

    ttsurvey()
        .current_dir(dir.path())
        .args(["shuffle", "--session", "abc-123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Session: abc-123"));
}

#[test]
fn take_full_session_then_report() {
    let dir = study_dir("absolute", "ratings");
    take_full_session(&dir);

    assert_eq!(lines(dir.path().join("data/submissions.jsonl")), 4);
    assert_eq!(lines(dir.path().join("data/comments.jsonl")), 1);
    // A finished session leaves nothing to resume.
    let cached = std::fs::read_dir(dir.path().join("cache"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(cached, 0);

    ttsurvey()
        .current_dir(dir.path())
        .arg("results")
        .assert()
        .success()
        .stdout(predicate::str::contains("Participants: 1"))
        .stdout(predicate::str::contains("Total ratings: 4"))
        .stdout(predicate::str::contains("m1"))
        .stdout(predicate::str::contains("m2"));

    ttsurvey()
        .current_dir(dir.path())
        .arg("export")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "name,email,sentence_id,model,naturalness,accuracy,timestamp\n",
        ))
        .stdout(predicate::str::contains("Dana,dana@example.com,"));

    ttsurvey()
        .current_dir(dir.path())
        .arg("comments")
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 comments:"))
        .stdout(predicate::str::contains("[1] Dana <dana@example.com>"))
        .stdout(predicate::str::contains("    great study"));

    let html = dir.path().join("out/results.html");
    ttsurvey()
        .current_dir(dir.path())
        .args(["results", "--format", "html", "--output"])
        .arg(&html)
        .assert()
        .success();
    let content = std::fs::read_to_string(&html).unwrap();
    assert!(content.contains("dir=\"rtl\""));
    assert!(content.contains("great study"));
}

#[test]
fn results_json_output() {
    let dir = study_dir("absolute", "ratings");
    take_full_session(&dir);

    let output = ttsurvey()
        .current_dir(dir.path())
        .args(["results", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["study_name"], "CLI Test");
    assert_eq!(report["summary"]["total_ratings"], 4);
    assert_eq!(report["summary"]["model_stats"].as_array().unwrap().len(), 2);
}

#[test]
fn results_on_empty_store() {
    let dir = study_dir("absolute", "ratings");

    ttsurvey()
        .current_dir(dir.path())
        .arg("results")
        .assert()
        .success()
        .stdout(predicate::str::contains("No ratings yet."));
}

#[test]
fn take_quit_then_resume_latest() {
    let dir = study_dir("absolute", "ratings");

    ttsurvey()
        .current_dir(dir.path())
        .args(["take", "--name", "Dana", "--email", "dana@example.com", "--native", "yes"])
        .write_stdin("4\n4\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ttsurvey take --resume"));
    assert_eq!(lines(dir.path().join("data/submissions.jsonl")), 0);

    // The two answered scores are offered as defaults.
    ttsurvey()
        .current_dir(dir.path())
        .args(["take", "--resume-latest"])
        .write_stdin("\n\n4\n4\n4\n4\n4\n4\n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[4]: "))
        .stdout(predicate::str::contains("Thank you for taking part!"));
    assert_eq!(lines(dir.path().join("data/submissions.jsonl")), 4);
    assert_eq!(lines(dir.path().join("data/comments.jsonl")), 0);
}

#[test]
fn resume_unknown_session_fails() {
    let dir = study_dir("absolute", "ratings");

    ttsurvey()
        .current_dir(dir.path())
        .args(["take", "--resume", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no cached session"));
}

#[test]
fn ineligible_participant_is_turned_away() {
    let dir = study_dir("absolute", "ratings");

    ttsurvey()
        .current_dir(dir.path())
        .args(["take", "--name", "Dana", "--email", "dana@example.com", "--native", "no"])
        .assert()
        .success()
        .stdout(predicate::str::contains("native speakers only"));
    assert_eq!(lines(dir.path().join("data/submissions.jsonl")), 0);
}

#[test]
fn comparative_session_and_analysis() {
    let dir = study_dir("comparative", "ratings");

    ttsurvey()
        .current_dir(dir.path())
        .args(["take", "--name", "Dana", "--email", "dana@example.com", "--native", "yes"])
        .write_stdin("2\n1\n2\n1\n\n")
        .assert()
        .success();
    assert_eq!(lines(dir.path().join("data/submissions.jsonl")), 2);

    ttsurvey()
        .current_dir(dir.path())
        .args(["analyze", "--reference", "m1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 total ratings from 1 participants."))
        .stdout(predicate::str::contains("=== CMOS Analysis ==="))
        .stdout(predicate::str::contains("Complete participants: 1"));

    ttsurvey()
        .current_dir(dir.path())
        .args(["export", "--scheme", "cmos"])
        .assert()
        .success()
        .stdout(predicate::str::contains("model_a,model_b,naturalness_cmos"));
}

#[test]
fn unknown_format_fails() {
    let dir = study_dir("absolute", "ratings");

    ttsurvey()
        .current_dir(dir.path())
        .args(["results", "--format", "pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn help_output() {
    ttsurvey()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Listening-test sessions"));
}

#[test]
fn version_output() {
    ttsurvey()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ttsurvey"));
}
