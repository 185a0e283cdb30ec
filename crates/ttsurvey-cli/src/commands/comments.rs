//! The `ttsurvey comments` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use ttsurvey_report::csv::{comments_to_csv, write_csv};
use ttsurvey_report::report::sort_newest_first;
use ttsurvey_report::text::format_comments;

use super::{emit, open_study};

pub async fn execute(
    config_path: Option<PathBuf>,
    store: Option<String>,
    format: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let study = open_study(config_path.as_deref(), store.as_deref())?;
    let mut comments = study
        .store
        .all_comments()
        .await
        .context("failed to read comments")?;

    match format.as_str() {
        "text" => emit(&format_comments(&comments), output.as_ref())?,
        "csv" => {
            sort_newest_first(&mut comments);
            let csv = comments_to_csv(&comments);
            match output {
                Some(path) => {
                    write_csv(&csv, &path)?;
                    eprintln!("Exported {} comment(s) to {}", comments.len(), path.display());
                }
                None => print!("{csv}"),
            }
        }
        other => anyhow::bail!("unknown format: '{other}' (expected text or csv)"),
    }

    Ok(())
}
