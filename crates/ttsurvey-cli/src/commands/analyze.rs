//! The `ttsurvey analyze` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use ttsurvey_core::scheme::RatingScheme;
use ttsurvey_report::analyze_cmos;
use ttsurvey_report::text::format_cmos_analysis;

use super::{open_study, study_sentences};

pub async fn execute(
    config_path: Option<PathBuf>,
    store: Option<String>,
    reference: Option<String>,
    expected: Option<usize>,
    format: String,
) -> Result<()> {
    let study = open_study(config_path.as_deref(), store.as_deref())?;
    let design = study.config.study.design()?;

    if design.scheme != RatingScheme::Comparative {
        eprintln!(
            "Warning: study '{}' uses the {} scheme; only comparative records are analyzed.",
            study.config.study.name, design.scheme
        );
    }

    let reference = match reference {
        Some(r) => r,
        None => design
            .models
            .first()
            .cloned()
            .context("no reference model given and none configured")?,
    };
    if !design.models.contains(&reference) {
        eprintln!("Warning: '{reference}' is not one of the configured models");
    }

    let expected = match expected {
        Some(n) => n,
        None => study_sentences(&study.config)?.len(),
    };

    let records = study
        .store
        .all_submissions()
        .await
        .context("failed to read submissions")?;
    let analysis = analyze_cmos(&records, &reference, expected);

    match format.as_str() {
        "text" => print!("{}", format_cmos_analysis(&analysis)),
        "json" => println!("{}", serde_json::to_string_pretty(&analysis)?),
        other => anyhow::bail!("unknown format: '{other}' (expected text or json)"),
    }

    Ok(())
}
