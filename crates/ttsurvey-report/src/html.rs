//! HTML results page.
//!
//! Produces a self-contained, right-to-left HTML file with all CSS inlined.

use std::path::Path;

use anyhow::Result;

use ttsurvey_core::statistics::ModelStats;

use crate::report::ResultsReport;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate the results page for a report.
pub fn generate_html(report: &ResultsReport) -> String {
    let summary = &report.summary;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"he\" dir=\"rtl\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>תוצאות — {}</title>\n",
        html_escape(&report.study_name)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str("<h1>תוצאות מחקר הערכת TTS</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\"><strong>{}</strong> | {} | {}</p>\n",
        html_escape(&report.study_name),
        report.scheme,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    html.push_str("<section class=\"cards\">\n");
    html.push_str(&format!(
        "<div class=\"card\"><div class=\"value\">{}</div><div class=\"label\">משתתפים</div></div>\n",
        summary.unique_participants
    ));
    html.push_str(&format!(
        "<div class=\"card\"><div class=\"value\">{}</div><div class=\"label\">דירוגים כוללים</div></div>\n",
        summary.total_ratings
    ));
    html.push_str("</section>\n");

    if !summary.model_stats.is_empty() {
        html.push_str("<section>\n<h2>דירוג מוחלט</h2>\n");
        html.push_str(&model_table(&summary.model_stats));
        html.push_str("</section>\n");
    }

    if let Some(cmos) = &summary.cmos {
        html.push_str("<section>\n<h2>השוואה (CMOS)</h2>\n");
        html.push_str("<table>\n<thead><tr><th>מדד</th><th>ממוצע</th><th>רווח סמך 95%</th></tr></thead>\n<tbody>\n");
        html.push_str(&format!(
            "<tr><td>טבעיות</td><td class=\"num\">{:+.3}</td><td class=\"num\">±{:.3}</td></tr>\n",
            cmos.mean_naturalness, cmos.ci_naturalness
        ));
        html.push_str(&format!(
            "<tr><td>דיוק</td><td class=\"num\">{:+.3}</td><td class=\"num\">±{:.3}</td></tr>\n",
            cmos.mean_accuracy, cmos.ci_accuracy
        ));
        html.push_str("</tbody></table>\n");
        html.push_str(&format!("<p class=\"meta\">n = {}</p>\n", cmos.count));
        html.push_str("</section>\n");
    }

    if summary.total_ratings == 0 {
        html.push_str("<p class=\"empty\">אין עדיין דירוגים.</p>\n");
    }

    if !report.comments.is_empty() {
        html.push_str("<section class=\"comments\">\n<h2>הערות משתתפים</h2>\n");
        for c in &report.comments {
            html.push_str("<article>\n");
            html.push_str(&format!(
                "<div class=\"who\">{} &lt;{}&gt;</div>\n",
                html_escape(&c.name),
                html_escape(&c.email)
            ));
            if let Some(ts) = c.timestamp {
                html.push_str(&format!(
                    "<div class=\"meta\">{}</div>\n",
                    ts.format("%Y-%m-%d %H:%M")
                ));
            }
            html.push_str(&format!("<p>{}</p>\n", html_escape(&c.comments)));
            html.push_str("</article>\n");
        }
        html.push_str("</section>\n");
    }

    html.push_str("</body>\n</html>");
    html
}

fn model_table(stats: &[ModelStats]) -> String {
    let mut table = String::new();
    table.push_str("<table>\n");
    table.push_str("<thead><tr><th>מודל</th><th>מספר דירוגים</th><th>ממוצע טבעיות</th><th>ממוצע דיוק</th><th>שגיאת תקן טבעיות</th><th>שגיאת תקן דיוק</th></tr></thead>\n");
    table.push_str("<tbody>\n");
    for s in stats {
        table.push_str(&format!(
            "<tr><td class=\"model\">{}</td><td class=\"num\">{}</td><td class=\"num\">{:.2}</td><td class=\"num\">{:.2}</td><td class=\"num\">{:.3}</td><td class=\"num\">{:.3}</td></tr>\n",
            html_escape(&s.model),
            s.count,
            s.mean_naturalness,
            s.mean_accuracy,
            s.stderr_naturalness,
            s.stderr_accuracy,
        ));
    }
    table.push_str("</tbody></table>\n");
    table
}

/// Write the results page to a file.
pub fn write_html_report(report: &ResultsReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

const CSS: &str = r#"
:root { --bg: #f8fafc; --fg: #0f172a; --card: #f1f5f9; --border: #e2e8f0; --muted: #64748b; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #0f172a; --fg: #f8fafc; --card: #1e293b; --border: #334155; --muted: #94a3b8; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Arial Hebrew', sans-serif; margin: 0 auto; padding: 2rem; max-width: 72rem; background: var(--bg); color: var(--fg); }
h1 { text-align: center; }
h2 { margin-top: 2rem; }
.meta { color: var(--muted); }
.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(12rem, 1fr)); gap: 1rem; }
.card { background: var(--card); border-radius: 8px; padding: 1rem; text-align: center; }
.card .value { font-size: 2rem; font-weight: bold; }
.card .label { color: var(--muted); font-size: 0.9rem; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: right; }
th { background: var(--border); }
td.num { text-align: center; font-variant-numeric: tabular-nums; }
td.model { direction: ltr; font-weight: 600; }
.comments article { border-bottom: 1px solid var(--border); padding: 0.75rem 0; }
.comments .who { font-weight: 600; }
.comments p { white-space: pre-wrap; margin: 0.5rem 0 0; }
.empty { text-align: center; color: var(--muted); }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use ttsurvey_core::model::{AbsoluteSubmission, CommentSubmission, Submission};
    use ttsurvey_core::scheme::RatingScheme;

    fn make_test_report() -> ResultsReport {
        let records = vec![
            Submission::Absolute(AbsoluteSubmission {
                name: "P".into(),
                email: "p@x.io".into(),
                sentence_id: "s1".into(),
                model: "phonikud_stts2".into(),
                naturalness: 5,
                accuracy: 4,
                timestamp: None,
            }),
            Submission::Absolute(AbsoluteSubmission {
                name: "Q".into(),
                email: "q@x.io".into(),
                sentence_id: "s1".into(),
                model: "phonikud_stts2".into(),
                naturalness: 3,
                accuracy: 4,
                timestamp: None,
            }),
        ];
        let comments = vec![CommentSubmission {
            name: "<script>".into(),
            email: "q@x.io".into(),
            comments: "קול טבעי מאוד".into(),
            session_id: "s".into(),
            timestamp: None,
        }];
        ResultsReport::build("Test Study", RatingScheme::Absolute, &records, comments)
    }

    #[test]
    fn html_report_contains_required_elements() {
        let html = generate_html(&make_test_report());

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("dir=\"rtl\""));
        assert!(html.contains("phonikud_stts2"));
        assert!(html.contains("Test Study"));
        assert!(html.contains("<td class=\"num\">4.00</td>"));
        assert!(html.contains("קול טבעי מאוד"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = ResultsReport::build("Empty", RatingScheme::Comparative, &[], vec![]);
        let html = generate_html(&report);
        assert!(html.contains("אין עדיין דירוגים"));
        assert!(html.contains(">0</div>"));
    }

    #[test]
    fn html_report_write_to_file() {
        let report = make_test_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.html");

        write_html_report(&report, &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
