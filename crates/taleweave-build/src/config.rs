//! Configuration for the taleweave-build pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

/// Top-level build configuration.
///
/// Loaded from the `[build]` section of `taleweave.toml` or from
/// `TALEWEAVE_BUILD__` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Record sources, merged in the order listed.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// JSON object of identifier → summary text.
    #[serde(default)]
    pub summaries_path: Option<PathBuf>,

    /// JSON object of identifier → feature vector.
    #[serde(default)]
    pub embeddings_path: Option<PathBuf>,

    /// Feature dimension D.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Use the built-in feature-hashing embedder when no precomputed
    /// vectors are configured.
    #[serde(default = "default_true")]
    pub hashing_embedder: bool,

    /// Abort on a missing embedding instead of dropping the entity.
    #[serde(default)]
    pub strict_embeddings: bool,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_ledger_dir")]
    pub ledger_dir: PathBuf,

    #[serde(default = "default_max_fetches")]
    pub max_concurrent_fetches: usize,

    #[serde(default = "default_max_embeddings")]
    pub max_concurrent_embeddings: usize,
}

/// One JSON record source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Name used in logs and the run ledger. Defaults to the file stem.
    #[serde(default)]
    pub name: Option<String>,

    pub path: PathBuf,

    /// Tag written to each entity's `source_genre` property
    /// (e.g. "ATU_Folklore", "Game_Mechanic").
    #[serde(default)]
    pub genre: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SourceConfig {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            path: path.into(),
            genre: None,
            enabled: true,
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("source")
                .to_string()
        })
    }
}

fn default_embedding_dim() -> usize {
    384
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from("./ledger")
}

fn default_max_fetches() -> usize {
    4
}

fn default_max_embeddings() -> usize {
    8
}

fn default_true() -> bool {
    true
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            summaries_path: None,
            embeddings_path: None,
            embedding_dim: default_embedding_dim(),
            hashing_embedder: true,
            strict_embeddings: false,
            output_dir: default_output_dir(),
            ledger_dir: default_ledger_dir(),
            max_concurrent_fetches: default_max_fetches(),
            max_concurrent_embeddings: default_max_embeddings(),
        }
    }
}

impl BuildConfig {
    /// Load `[build]` from `{file_prefix}.toml` (optional) and the environment.
    ///
    /// A missing `[build]` section yields the defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("TALEWEAVE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| BuildError::Config(e.to_string()))?;

        match cfg.get::<BuildConfig>("build") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => Ok(BuildConfig::default()),
            Err(e) => Err(BuildError::Config(e.to_string())),
        }
    }

    /// Enabled sources in configured order.
    pub fn active_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(BuildError::Config("embedding_dim must be positive".into()));
        }
        if self.max_concurrent_fetches == 0 || self.max_concurrent_embeddings == 0 {
            return Err(BuildError::Config(
                "concurrency limits must be at least 1".into(),
            ));
        }
        if self.embeddings_path.is_none() && !self.hashing_embedder {
            return Err(BuildError::Config(
                "no embedding source: set embeddings_path or enable hashing_embedder".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = BuildConfig::default();
        assert_eq!(config.embedding_dim, 384);
        assert_eq!(config.output_dir, PathBuf::from("./output"));
        assert_eq!(config.max_concurrent_fetches, 4);
        assert_eq!(config.max_concurrent_embeddings, 8);
        assert!(!config.strict_embeddings);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("taleweave");
        fs::write(
            prefix.with_extension("toml"),
            r#"
[build]
embedding_dim = 16
strict_embeddings = true

[[build.sources]]
path = "data/folklore.json"
genre = "ATU_Folklore"

[[build.sources]]
name = "games"
path = "data/games.json"
enabled = false
"#,
        )
        .unwrap();

        let config = BuildConfig::load(prefix.to_str().unwrap()).unwrap();

        assert_eq!(config.embedding_dim, 16);
        assert!(config.strict_embeddings);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].display_name(), "folklore");
        assert_eq!(config.sources[0].genre.as_deref(), Some("ATU_Folklore"));
        assert_eq!(config.active_sources().count(), 1);
        assert_eq!(config.ledger_dir, PathBuf::from("./ledger"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = BuildConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.embedding_dim, 384);
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let config = BuildConfig {
            embedding_dim: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BuildError::Config(_))));
    }
}
