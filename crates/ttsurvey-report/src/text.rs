//! Plain-text summaries for the terminal.

use std::fmt::Write;

use ttsurvey_core::model::CommentSubmission;
use ttsurvey_core::statistics::Preference;

use crate::report::{sort_newest_first, CmosAnalysis};

/// Numbered comment listing, newest first.
pub fn format_comments(comments: &[CommentSubmission]) -> String {
    if comments.is_empty() {
        return "No comments found.\n".to_string();
    }

    let mut sorted = comments.to_vec();
    sort_newest_first(&mut sorted);

    let mut out = String::new();
    let _ = writeln!(out, "Found {} comments:\n", sorted.len());
    for (i, c) in sorted.iter().enumerate() {
        let _ = writeln!(out, "[{}] {} <{}>", i + 1, c.name, c.email);
        if let Some(ts) = c.timestamp {
            let _ = writeln!(out, "    {}", ts.to_rfc3339());
        }
        out.push_str("    ---\n");
        let mut lines = c.comments.lines().peekable();
        if lines.peek().is_none() {
            out.push_str("    \n");
        }
        for line in lines {
            let _ = writeln!(out, "    {line}");
        }
        out.push('\n');
    }
    out
}

fn verdict(preference: Preference, reference: &str, other: &str) -> String {
    match preference {
        Preference::Reference => format!("→ {reference} is better"),
        Preference::Other => format!("→ {other} is better"),
        Preference::Tie => "→ models are similar".to_string(),
    }
}

/// Comparative analysis report.
pub fn format_cmos_analysis(analysis: &CmosAnalysis) -> String {
    let reference = analysis.reference.as_str();
    let other = analysis.other.as_deref().unwrap_or("other model");

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Found {} total ratings from {} participants.",
        analysis.total_ratings, analysis.total_participants
    );

    let Some(stats) = &analysis.stats else {
        let _ = writeln!(
            out,
            "No participants completed all {} sentences.",
            analysis.expected_sentences
        );
        return out;
    };

    out.push('\n');
    out.push_str("=== CMOS Analysis ===\n");
    let _ = writeln!(
        out,
        "Scale: positive = {reference} better, negative = {other} better"
    );
    let _ = writeln!(
        out,
        "Expected sentences per participant: {}",
        analysis.expected_sentences
    );
    let _ = writeln!(out, "Complete participants: {}", analysis.complete_participants);
    let _ = writeln!(out, "Total ratings: {}", stats.count);
    out.push('\n');

    let _ = writeln!(
        out,
        "Naturalness:  {:+.3}  (95% CI ±{:.3})  {}",
        stats.mean_naturalness,
        stats.ci_naturalness,
        verdict(Preference::from_mean(stats.mean_naturalness), reference, other)
    );
    let _ = writeln!(
        out,
        "Accuracy:     {:+.3}  (95% CI ±{:.3})  {}",
        stats.mean_accuracy,
        stats.ci_accuracy,
        verdict(Preference::from_mean(stats.mean_accuracy), reference, other)
    );
    out.push('\n');

    out.push_str("Per-sentence breakdown:\n");
    let _ = writeln!(
        out,
        "{:<16} {:>10} {:>6} {:>10} {:>6}",
        "sentence_id", "nat mean", "n", "acc mean", "n"
    );
    for row in &analysis.per_sentence {
        let _ = writeln!(
            out,
            "{:<16} {:>+10.3} {:>6} {:>+10.3} {:>6}",
            row.sentence_id, row.mean_naturalness, row.count, row.mean_accuracy, row.count
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::analyze_cmos;
    use chrono::{TimeZone, Utc};
    use ttsurvey_core::model::{ComparativeSubmission, Submission};

    #[test]
    fn comments_listing() {
        let comments = vec![
            CommentSubmission {
                name: "Old".into(),
                email: "old@x.io".into(),
                comments: "first line\nsecond line".into(),
                session_id: "a".into(),
                timestamp: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            },
            CommentSubmission {
                name: "New".into(),
                email: "new@x.io".into(),
                comments: "".into(),
                session_id: "b".into(),
                timestamp: Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()),
            },
        ];
        let text = format_comments(&comments);
        assert!(text.starts_with("Found 2 comments:"));
        let new_pos = text.find("[1] New <new@x.io>").unwrap();
        let old_pos = text.find("[2] Old <old@x.io>").unwrap();
        assert!(new_pos < old_pos);
        assert!(text.contains("    second line\n"));

        assert_eq!(format_comments(&[]), "No comments found.\n");
    }

    #[test]
    fn cmos_report_names_the_winner() {
        let records: Vec<Submission> = ["a@x.io", "b@x.io"]
            .iter()
            .map(|email| {
                Submission::Comparative(ComparativeSubmission {
                    name: "P".into(),
                    email: email.to_string(),
                    sentence_id: "s1".into(),
                    model_a: "phonikud_stts2".into(),
                    model_b: "roboshaul_nakdimon".into(),
                    naturalness_cmos: 2,
                    accuracy_cmos: 0,
                    timestamp: None,
                })
            })
            .collect();
        let analysis = analyze_cmos(&records, "phonikud_stts2", 1);
        let text = format_cmos_analysis(&analysis);
        assert!(text.contains("=== CMOS Analysis ==="));
        assert!(text.contains("Naturalness:  +2.000"));
        assert!(text.contains("→ phonikud_stts2 is better"));
        assert!(text.contains("→ models are similar"));
        assert!(text.contains("negative = roboshaul_nakdimon better"));
    }

    #[test]
    fn cmos_report_without_complete_participants() {
        let analysis = analyze_cmos(&[], "x", 3);
        let text = format_cmos_analysis(&analysis);
        assert!(text.contains("No participants completed all 3 sentences."));
    }
}
