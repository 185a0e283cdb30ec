//! Study configuration and store factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ttsurvey_core::audio::DEFAULT_AUDIO_EXTENSION;
use ttsurvey_core::error::Locale;
use ttsurvey_core::scheme::{RatingScheme, ReadinessPolicy, StudyDesign};
use ttsurvey_core::traits::SubmissionStore;

use crate::file::FileStore;
use crate::firestore::FirestoreStore;
use crate::memory::MemoryStore;

/// Configuration for a single document store.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    File {
        #[serde(default = "default_data_dir")]
        dir: PathBuf,
    },
    Firestore {
        project_id: String,
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Memory => f.debug_struct("Memory").finish(),
            StoreConfig::File { dir } => f.debug_struct("File").field("dir", dir).finish(),
            StoreConfig::Firestore {
                project_id,
                api_key: _,
                base_url,
            } => f
                .debug_struct("Firestore")
                .field("project_id", project_id)
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./ttsurvey-data")
}

/// The `[study]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_study_name")]
    pub name: String,
    #[serde(default = "default_scheme")]
    pub scheme: RatingScheme,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default)]
    pub readiness: ReadinessPolicy,
    /// Pipe-delimited sentence list.
    #[serde(default = "default_sentences")]
    pub sentences: PathBuf,
    /// Keep only the first N sentences.
    #[serde(default)]
    pub sentence_limit: Option<usize>,
    #[serde(default = "default_audio_base")]
    pub audio_base: String,
    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,
    #[serde(default)]
    pub locale: Locale,
}

fn default_study_name() -> String {
    "Hebrew TTS listening test".to_string()
}
fn default_scheme() -> RatingScheme {
    RatingScheme::Absolute
}
fn default_models() -> Vec<String> {
    [
        "phonikud_stts2",
        "roboshaul_nakdimon",
        "gemini_unvocalized",
        "piper-phonikud",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}
fn default_sentences() -> PathBuf {
    PathBuf::from("sentences.csv")
}
fn default_audio_base() -> String {
    "audio".to_string()
}
fn default_audio_extension() -> String {
    DEFAULT_AUDIO_EXTENSION.to_string()
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            name: default_study_name(),
            scheme: default_scheme(),
            models: default_models(),
            readiness: ReadinessPolicy::default(),
            sentences: default_sentences(),
            sentence_limit: None,
            audio_base: default_audio_base(),
            audio_extension: default_audio_extension(),
            locale: Locale::default(),
        }
    }
}

impl StudyConfig {
    /// The validated study design.
    pub fn design(&self) -> Result<StudyDesign> {
        let design = StudyDesign {
            scheme: self.scheme,
            readiness: self.readiness,
            models: self.models.clone(),
        };
        design
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid study configuration: {e}"))?;
        Ok(design)
    }
}

/// The `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.ttsurvey-cache")
}
fn default_debounce_ms() -> u64 {
    500
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl CacheConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Top-level ttsurvey configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Store configurations keyed by name.
    #[serde(default)]
    pub stores: HashMap<String, StoreConfig>,
    /// Store used when none is named on the command line.
    #[serde(default)]
    pub default_store: Option<String>,
}

impl SurveyConfig {
    /// Look up a store by name, falling back to `default_store`.
    ///
    /// With no stores configured at all, a file store in `./ttsurvey-data`
    /// is used.
    pub fn store_config(&self, name: Option<&str>) -> Result<(String, StoreConfig)> {
        let name = name.or(self.default_store.as_deref());

        match name {
            Some(name) => self
                .stores
                .get(name)
                .cloned()
                .map(|c| (name.to_string(), c))
                .with_context(|| format!("store '{name}' is not configured")),
            None if self.stores.len() == 1 => {
                let (name, config) = self
                    .stores
                    .iter()
                    .next()
                    .context("store table is empty")?;
                Ok((name.clone(), config.clone()))
            }
            None if self.stores.is_empty() => Ok((
                "file".to_string(),
                StoreConfig::File {
                    dir: default_data_dir(),
                },
            )),
            None => anyhow::bail!(
                "several stores are configured; set default_store or pass --store"
            ),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Memory => StoreConfig::Memory,
        StoreConfig::File { dir } => StoreConfig::File {
            dir: PathBuf::from(resolve_env_vars(&dir.to_string_lossy())),
        },
        StoreConfig::Firestore {
            project_id,
            api_key,
            base_url,
        } => StoreConfig::Firestore {
            project_id: resolve_env_vars(project_id),
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `ttsurvey.toml` in the current directory
/// 2. `~/.config/ttsurvey/config.toml`
///
/// Environment variable override: `TTSURVEY_FIRESTORE_API_KEY`.
pub fn load_config() -> Result<SurveyConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
///
/// Relative paths inside the file resolve against the file's directory.
pub fn load_config_from(path: Option<&Path>) -> Result<SurveyConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("ttsurvey.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let mut config = toml::from_str::<SurveyConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                config.rebase(base);
            }
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => SurveyConfig::default(),
    };

    // Apply env var overrides
    if let Ok(key) = std::env::var("TTSURVEY_FIRESTORE_API_KEY") {
        for store in config.stores.values_mut() {
            if let StoreConfig::Firestore { api_key, .. } = store {
                *api_key = key.clone();
            }
        }
    }

    // Resolve env vars in all store configs
    let resolved: HashMap<String, StoreConfig> = config
        .stores
        .iter()
        .map(|(k, v)| (k.clone(), resolve_store_config(v)))
        .collect();
    config.stores = resolved;

    Ok(config)
}

impl SurveyConfig {
    fn rebase(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.study.sentences);
        rebase(&mut self.cache.dir);
        for store in self.stores.values_mut() {
            if let StoreConfig::File { dir } = store {
                rebase(dir);
            }
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("ttsurvey"))
}

/// Create a store instance from its configuration.
pub fn create_store(name: &str, config: &StoreConfig) -> Result<Arc<dyn SubmissionStore>> {
    tracing::debug!(store = name, "creating store: {config:?}");
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::File { dir } => Ok(Arc::new(FileStore::new(dir.clone()))),
        StoreConfig::Firestore {
            project_id,
            api_key,
            base_url,
        } => {
            if project_id.is_empty() {
                anyhow::bail!("store '{name}': firestore project_id is empty");
            }
            Ok(Arc::new(FirestoreStore::new(
                project_id,
                api_key,
                base_url.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_TTSURVEY_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_TTSURVEY_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_TTSURVEY_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("unterminated ${"), "unterminated ${");
        std::env::remove_var("_TTSURVEY_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = SurveyConfig::default();
        assert_eq!(config.study.scheme, RatingScheme::Absolute);
        assert_eq!(config.study.models.len(), 4);
        assert_eq!(config.cache.debounce(), Duration::from_millis(500));
        assert!(config.study.design().is_ok());

        let (name, store) = config.store_config(None).unwrap();
        assert_eq!(name, "file");
        assert!(matches!(store, StoreConfig::File { .. }));
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
default_store = "firestore"

[study]
name = "Phonikud CMOS"
scheme = "comparative"
models = ["phonikud_stts2", "piper-phonikud"]
readiness = "both"
sentence_limit = 20
locale = "en"

[cache]
debounce_ms = 250

[stores.firestore]
type = "firestore"
project_id = "phonikud-user-study"
api_key = "secret"

[stores.local]
type = "file"
dir = "/tmp/ttsurvey"

[stores.scratch]
type = "memory"
"#;
        let config: SurveyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.stores.len(), 3);
        assert_eq!(config.study.scheme, RatingScheme::Comparative);
        assert_eq!(config.study.readiness, ReadinessPolicy::Both);
        assert_eq!(config.study.locale, Locale::En);
        assert_eq!(config.study.audio_extension, "m4a");
        assert_eq!(config.cache.debounce_ms, 250);

        let (name, store) = config.store_config(None).unwrap();
        assert_eq!(name, "firestore");
        assert!(format!("{store:?}").contains("***"));
        assert!(!format!("{store:?}").contains("secret"));

        assert!(config.store_config(Some("local")).is_ok());
        assert!(config.store_config(Some("nope")).is_err());
    }

    #[test]
    fn comparative_needs_two_models() {
        let study = StudyConfig {
            scheme: RatingScheme::Comparative,
            ..StudyConfig::default()
        };
        let err = study.design().unwrap_err();
        assert!(err.to_string().contains("exactly 2 models"));
    }

    #[test]
    fn ambiguous_store_selection() {
        let mut config = SurveyConfig::default();
        config.stores.insert("a".into(), StoreConfig::Memory);
        assert_eq!(config.store_config(None).unwrap().0, "a");
        config.stores.insert("b".into(), StoreConfig::Memory);
        assert!(config.store_config(None).is_err());
    }

    #[test]
    fn load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ttsurvey.toml");
        std::fs::write(
            &path,
            "[study]\nsentences = \"data/sentences.csv\"\n\n[stores.local]\ntype = \"file\"\ndir = \"out\"\n",
        )
        .unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.study.sentences, dir.path().join("data/sentences.csv"));
        match &config.stores["local"] {
            StoreConfig::File { dir: out } => assert_eq!(out, &dir.path().join("out")),
            other => panic!("unexpected store: {other:?}"),
        }
        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[tokio::test]
    async fn create_each_store_kind() {
        let dir = tempfile::tempdir().unwrap();
        let memory = create_store("m", &StoreConfig::Memory).unwrap();
        assert_eq!(memory.name(), "memory");
        let file = create_store(
            "f",
            &StoreConfig::File {
                dir: dir.path().to_path_buf(),
            },
        )
        .unwrap();
        assert_eq!(file.name(), "file");
        assert!(create_store(
            "fs",
            &StoreConfig::Firestore {
                project_id: String::new(),
                api_key: String::new(),
                base_url: None,
            }
        )
        .is_err());
    }
}
