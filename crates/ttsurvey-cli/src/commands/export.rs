//! The `ttsurvey export` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use ttsurvey_core::model::Submission;
use ttsurvey_core::scheme::RatingScheme;
use ttsurvey_report::csv::{submissions_to_csv, write_csv};

use super::open_study;

pub async fn execute(
    config_path: Option<PathBuf>,
    store: Option<String>,
    scheme: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let study = open_study(config_path.as_deref(), store.as_deref())?;
    let scheme = match scheme {
        Some(s) => s.parse::<RatingScheme>().map_err(anyhow::Error::msg)?,
        None => study.config.study.scheme,
    };

    let records = study
        .store
        .all_submissions()
        .await
        .context("failed to read submissions")?;
    let csv = submissions_to_csv(&records, scheme);
    let (absolute, comparative) = Submission::partition(&records);
    let count = match scheme {
        RatingScheme::Absolute => absolute.len(),
        RatingScheme::Comparative => comparative.len(),
    };

    match output {
        Some(path) => {
            write_csv(&csv, &path)?;
            eprintln!("Exported {count} {scheme} record(s) to {}", path.display());
        }
        None => print!("{csv}"),
    }

    Ok(())
}
