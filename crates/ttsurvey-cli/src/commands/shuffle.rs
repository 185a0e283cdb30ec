//! The `ttsurvey shuffle` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use ttsurvey_core::model::position_label;
use ttsurvey_core::shuffle::generate_shuffles;
use ttsurvey_store::config::load_config_from;

use super::study_sentences;

pub fn execute(config_path: Option<PathBuf>, session: Option<String>, format: String) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let design = config.study.design()?;
    let sentences = study_sentences(&config)?;
    let ids: Vec<String> = sentences.iter().map(|s| s.id.clone()).collect();

    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let shuffles = generate_shuffles(&session_id, &ids, &design.models);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&shuffles)?),
        "table" => {
            let mut table = Table::new();
            let mut header = vec!["#".to_string(), "Sentence".to_string()];
            header.extend((0..design.models.len()).map(position_label));
            table.set_header(header);

            for (i, shuffle) in shuffles.model_shuffles.iter().enumerate() {
                let mut row = vec![Cell::new(i + 1), Cell::new(&shuffle.sentence_id)];
                row.extend(shuffle.model_order.iter().map(Cell::new));
                table.add_row(row);
            }

            println!("Session: {session_id}");
            println!("{table}");
        }
        other => anyhow::bail!("unknown format: '{other}' (expected table or json)"),
    }

    Ok(())
}
