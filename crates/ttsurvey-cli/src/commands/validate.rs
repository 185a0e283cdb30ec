//! The `ttsurvey validate` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use ttsurvey_core::audio::audio_path;
use ttsurvey_core::sentences::validate_sentences;
use ttsurvey_store::config::{load_config_from, CacheConfig, StudyConfig};
use ttsurvey_store::create_store;

use super::study_sentences;

#[derive(Serialize)]
struct EffectiveConfig<'a> {
    study: &'a StudyConfig,
    cache: &'a CacheConfig,
}

pub fn execute(
    config_path: Option<PathBuf>,
    store: Option<String>,
    check_audio: bool,
    print_config: bool,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let design = config.study.design()?;
    let (store_name, store_config) = config.store_config(store.as_deref())?;
    create_store(&store_name, &store_config)?;

    if print_config {
        let effective = EffectiveConfig {
            study: &config.study,
            cache: &config.cache,
        };
        println!("{}", toml::to_string_pretty(&effective)?);
    }

    let sentences = study_sentences(&config)?;
    println!(
        "Study: {} ({} scheme, {} models, {} sentences, store '{}')",
        config.study.name,
        design.scheme,
        design.models.len(),
        sentences.len(),
        store_name
    );

    let mut total_warnings = 0;

    for w in validate_sentences(&sentences) {
        println!("  [{}] WARNING: {}", w.sentence_id, w.message);
        total_warnings += 1;
    }

    if check_audio {
        if config.study.audio_base.contains("://") {
            println!("  Audio base is a URL; skipping file checks.");
        } else {
            for sentence in &sentences {
                for model in &design.models {
                    let path = audio_path(
                        &config.study.audio_base,
                        model,
                        &sentence.id,
                        &config.study.audio_extension,
                    );
                    if !Path::new(&path).exists() {
                        println!("  [{}] WARNING: missing audio file {path}", sentence.id);
                        total_warnings += 1;
                    }
                }
            }
        }
    }

    if total_warnings == 0 {
        println!("All sentences valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
