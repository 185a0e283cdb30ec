pub mod analyze;
pub mod comments;
pub mod export;
pub mod init;
pub mod results;
pub mod shuffle;
pub mod take;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use ttsurvey_core::model::Sentence;
use ttsurvey_core::sentences::load_sentences;
use ttsurvey_core::traits::SubmissionStore;
use ttsurvey_store::config::{load_config_from, SurveyConfig};
use ttsurvey_store::create_store;

/// Config plus the store selected for this invocation.
pub struct Study {
    pub config: SurveyConfig,
    pub store: Arc<dyn SubmissionStore>,
}

pub fn open_study(config_path: Option<&Path>, store: Option<&str>) -> Result<Study> {
    let config = load_config_from(config_path)?;
    let (name, store_config) = config.store_config(store)?;
    let store = create_store(&name, &store_config)?;
    Ok(Study { config, store })
}

pub fn study_sentences(config: &SurveyConfig) -> Result<Vec<Sentence>> {
    load_sentences(&config.study.sentences, config.study.sentence_limit)
        .with_context(|| format!("study '{}'", config.study.name))
}

/// Write `content` to `output`, or print it to stdout.
pub fn emit(content: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Written to: {}", path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}
