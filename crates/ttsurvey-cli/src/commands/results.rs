//! The `ttsurvey results` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use ttsurvey_report::html::write_html_report;
use ttsurvey_report::ResultsReport;

use super::{emit, open_study};

pub async fn execute(
    config_path: Option<PathBuf>,
    store: Option<String>,
    format: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let study = open_study(config_path.as_deref(), store.as_deref())?;
    let records = study
        .store
        .all_submissions()
        .await
        .context("failed to read submissions")?;
    let comments = study
        .store
        .all_comments()
        .await
        .context("failed to read comments")?;

    let report = ResultsReport::build(
        &study.config.study.name,
        study.config.study.scheme,
        &records,
        comments,
    );

    match format.as_str() {
        "table" => emit(&summary_table(&report), output.as_ref())?,
        "json" => match output {
            Some(path) => {
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            None => println!("{}", serde_json::to_string_pretty(&report)?),
        },
        "html" => {
            let path = output.unwrap_or_else(|| {
                let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
                PathBuf::from(format!("results-{timestamp}.html"))
            });
            write_html_report(&report, &path)?;
            eprintln!("HTML report: {}", path.display());
        }
        other => anyhow::bail!("unknown format: '{other}' (expected table, json or html)"),
    }

    Ok(())
}

fn summary_table(report: &ResultsReport) -> String {
    let summary = &report.summary;
    let mut out = format!(
        "{} ({})\nParticipants: {}\nTotal ratings: {}\n",
        report.study_name, report.scheme, summary.unique_participants, summary.total_ratings
    );

    if summary.total_ratings == 0 {
        out.push_str("No ratings yet.\n");
        return out;
    }

    if !summary.model_stats.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![
            "Model",
            "Ratings",
            "Naturalness",
            "Accuracy",
            "SE naturalness",
            "SE accuracy",
        ]);
        for s in &summary.model_stats {
            table.add_row(vec![
                Cell::new(&s.model),
                Cell::new(s.count),
                Cell::new(format!("{:.2}", s.mean_naturalness)),
                Cell::new(format!("{:.2}", s.mean_accuracy)),
                Cell::new(format!("{:.3}", s.stderr_naturalness)),
                Cell::new(format!("{:.3}", s.stderr_accuracy)),
            ]);
        }
        out.push_str(&format!("\n{table}\n"));
    }

    if let Some(cmos) = &summary.cmos {
        let mut table = Table::new();
        table.set_header(vec!["Dimension", "Mean CMOS", "95% CI", "n"]);
        table.add_row(vec![
            Cell::new("naturalness"),
            Cell::new(format!("{:+.3}", cmos.mean_naturalness)),
            Cell::new(format!("±{:.3}", cmos.ci_naturalness)),
            Cell::new(cmos.count),
        ]);
        table.add_row(vec![
            Cell::new("accuracy"),
            Cell::new(format!("{:+.3}", cmos.mean_accuracy)),
            Cell::new(format!("±{:.3}", cmos.ci_accuracy)),
            Cell::new(cmos.count),
        ]);
        out.push_str(&format!("\n{table}\n"));
    }

    out
}
