//! Results report types with JSON persistence.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ttsurvey_core::model::{CommentSubmission, Submission};
use ttsurvey_core::scheme::RatingScheme;
use ttsurvey_core::statistics::{
    calculate_cmos_stats, filter_complete_participants, normalize_cmos, per_sentence_breakdown,
    summarize, CmosStats, Preference, SentenceBreakdown, StudySummary,
};

/// A snapshot of a study's results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub study_name: String,
    pub scheme: RatingScheme,
    pub summary: StudySummary,
    /// Comments, newest first.
    #[serde(default)]
    pub comments: Vec<CommentSubmission>,
}

impl ResultsReport {
    pub fn build(
        study_name: &str,
        scheme: RatingScheme,
        records: &[Submission],
        mut comments: Vec<CommentSubmission>,
    ) -> Self {
        sort_newest_first(&mut comments);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            study_name: study_name.to_string(),
            scheme,
            summary: summarize(records),
            comments,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ResultsReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}

/// Newest first; comments without a timestamp go last.
pub fn sort_newest_first(comments: &mut [CommentSubmission]) {
    comments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Comparative results re-oriented around a reference model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmosAnalysis {
    pub reference: String,
    /// The model the reference was compared against, if unambiguous.
    pub other: Option<String>,
    pub expected_sentences: usize,
    /// Participants (distinct emails) before filtering.
    pub total_participants: usize,
    pub total_ratings: usize,
    /// Participants with exactly `expected_sentences` ratings.
    pub complete_participants: usize,
    pub stats: Option<CmosStats>,
    pub naturalness: Option<Preference>,
    pub accuracy: Option<Preference>,
    pub per_sentence: Vec<SentenceBreakdown>,
}

/// Keep complete participants, flip signs so positive favours `reference`,
/// then summarize.
pub fn analyze_cmos(records: &[Submission], reference: &str, expected: usize) -> CmosAnalysis {
    let emails = |rs: &[Submission]| rs.iter().map(Submission::email).collect::<HashSet<_>>().len();

    let complete = filter_complete_participants(records, expected);
    let (_, comparative) = Submission::partition(&complete);
    let normalized = normalize_cmos(&comparative, reference);

    let others: HashSet<&str> = normalized.iter().map(|r| r.model_b.as_str()).collect();
    let other = match others.len() {
        1 => others.into_iter().next().map(str::to_string),
        _ => None,
    };

    let stats = calculate_cmos_stats(&normalized);
    CmosAnalysis {
        reference: reference.to_string(),
        other,
        expected_sentences: expected,
        total_participants: emails(records),
        total_ratings: records.len(),
        complete_participants: emails(&complete),
        naturalness: stats.as_ref().map(|s| Preference::from_mean(s.mean_naturalness)),
        accuracy: stats.as_ref().map(|s| Preference::from_mean(s.mean_accuracy)),
        stats,
        per_sentence: per_sentence_breakdown(&normalized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ttsurvey_core::model::ComparativeSubmission;

    fn cmp(email: &str, sentence: &str, a: &str, b: &str, n: i8, acc: i8) -> Submission {
        Submission::Comparative(ComparativeSubmission {
            name: "P".into(),
            email: email.into(),
            sentence_id: sentence.into(),
            model_a: a.into(),
            model_b: b.into(),
            naturalness_cmos: n,
            accuracy_cmos: acc,
            timestamp: None,
        })
    }

    fn comment(name: &str, day: u32) -> CommentSubmission {
        CommentSubmission {
            name: name.into(),
            email: format!("{name}@x.io"),
            comments: "ok".into(),
            session_id: name.into(),
            timestamp: Some(Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap()),
        }
    }

    #[test]
    fn report_json_round_trip() {
        let records = vec![cmp("a@x.io", "s1", "m1", "m2", 1, 1)];
        let report = ResultsReport::build(
            "Study",
            RatingScheme::Comparative,
            &records,
            vec![comment("old", 1), comment("new", 9)],
        );
        assert_eq!(report.comments[0].name, "new");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("results.json");
        report.save_json(&path).unwrap();
        let loaded = ResultsReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.summary.total_ratings, 1);
        assert!(loaded.summary.cmos.is_some());
    }

    #[test]
    fn comments_without_timestamp_sort_last() {
        let mut comments = vec![
            CommentSubmission {
                timestamp: None,
                ..comment("none", 1)
            },
            comment("early", 2),
            comment("late", 3),
        ];
        sort_newest_first(&mut comments);
        let names: Vec<_> = comments.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["late", "early", "none"]);
    }

    #[test]
    fn cmos_analysis_filters_and_normalizes() {
        let records = vec![
            // complete: two sentences
            cmp("a@x.io", "s1", "ours", "theirs", 2, 1),
            cmp("a@x.io", "s2", "theirs", "ours", -2, -1),
            cmp("b@x.io", "s1", "theirs", "ours", 1, 0),
            cmp("b@x.io", "s2", "ours", "theirs", 0, 1),
            // incomplete: dropped
            cmp("c@x.io", "s1", "ours", "theirs", -3, -3),
        ];
        let analysis = analyze_cmos(&records, "ours", 2);
        assert_eq!(analysis.total_participants, 3);
        assert_eq!(analysis.complete_participants, 2);
        assert_eq!(analysis.other.as_deref(), Some("theirs"));

        let stats = analysis.stats.unwrap();
        assert_eq!(stats.count, 4);
        // normalized naturalness: 2, 2, -1, 0
        assert!((stats.mean_naturalness - 0.75).abs() < 1e-9);
        assert_eq!(analysis.naturalness, Some(Preference::Reference));
        assert_eq!(analysis.per_sentence.len(), 2);
    }

    #[test]
    fn cmos_analysis_with_nobody_complete() {
        let records = vec![cmp("a@x.io", "s1", "ours", "theirs", 2, 1)];
        let analysis = analyze_cmos(&records, "ours", 5);
        assert_eq!(analysis.complete_participants, 0);
        assert!(analysis.stats.is_none());
        assert!(analysis.naturalness.is_none());
    }
}
