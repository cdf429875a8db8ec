use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RankError, Result};

const CONFIG_DIR_NAME: &str = "contrib-rank";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub trending: TrendingConfig,
}

impl Config {
    /// Defaults, then the global file (or the explicit one instead), then env.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit_path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with a caller-supplied environment.
    pub fn load_with<F>(explicit_path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| lookup("CRANK_CONFIG").map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(RankError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else if let Some(global) = Self::load_global()? {
            config.merge_patch(global);
        }

        config.apply_env_overrides(&lookup)?;
        config.validate()?;

        Ok(config)
    }

    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join("config.toml"))
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        match Self::global_path() {
            Some(path) => Self::load_patch(&path),
            None => Ok(None),
        }
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| RankError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| RankError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.backend {
            self.backend.merge(patch);
        }
        if let Some(patch) = patch.search {
            self.search.merge(patch);
        }
        if let Some(patch) = patch.trending {
            self.trending.merge(patch);
        }
    }

    fn apply_env_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env_string(lookup, "CRANK_BACKEND") {
            self.backend.strategy = value;
        }
        if let Some(value) =
            env_string(lookup, "CRANK_DATABASE_URL").or_else(|| env_string(lookup, "DATABASE_URL"))
        {
            self.backend.database_url = Some(value);
        }
        if let Some(value) = env_string(lookup, "CRANK_SQLITE_PATH") {
            self.backend.sqlite_path = Some(value);
        }
        if let Some(value) = env_bool(lookup, "CRANK_FALLBACK") {
            self.backend.fallback = value;
        }

        if let Some(value) = env_parse::<usize, _>(lookup, "CRANK_EMBEDDING_DIMS")? {
            self.search.embedding_dims = value;
        }
        if let Some(value) = env_parse::<f64, _>(lookup, "CRANK_TEXT_WEIGHT")? {
            self.search.text_weight = value;
        }
        if let Some(value) = env_parse::<f64, _>(lookup, "CRANK_VECTOR_WEIGHT")? {
            self.search.vector_weight = value;
        }
        if let Some(value) = env_parse::<f64, _>(lookup, "CRANK_THRESHOLD")? {
            self.search.threshold = value;
        }
        if let Some(value) = env_parse::<i64, _>(lookup, "CRANK_LIMIT")? {
            self.search.limit = value;
        }

        if let Some(value) = env_parse::<u32, _>(lookup, "CRANK_TRENDING_WINDOW_HOURS")? {
            self.trending.window_hours = value;
        }
        if let Some(value) = env_parse::<i64, _>(lookup, "CRANK_TRENDING_MIN_ENGAGEMENT")? {
            self.trending.min_engagement = value;
        }

        Ok(())
    }

    /// Structural checks only. Weights and limits are validated per call.
    fn validate(&self) -> Result<()> {
        if self.search.embedding_dims == 0 {
            return Err(RankError::Config(
                "search.embedding_dims must be positive".to_string(),
            ));
        }
        if self.trending.window_hours == 0 {
            return Err(RankError::Config(
                "trending.window_hours must be positive".to_string(),
            ));
        }
        self.backend.strategy.parse::<crate::storage::StrategyPreference>()?;
        Ok(())
    }

    /// Copy safe to print: credentials in the database URL are masked.
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        out.backend.database_url = out.backend.database_url.as_deref().map(redact_url);
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// auto | postgres | sqlite | mock
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub database_url: Option<String>,
    /// Unset means a private in-memory database.
    #[serde(default)]
    pub sqlite_path: Option<String>,
    #[serde(default)]
    pub fallback: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            strategy: "auto".to_string(),
            database_url: None,
            sqlite_path: None,
            fallback: true,
        }
    }
}

impl BackendConfig {
    fn merge(&mut self, patch: BackendPatch) {
        if let Some(value) = patch.strategy {
            self.strategy = value;
        }
        if let Some(value) = patch.database_url {
            self.database_url = Some(value);
        }
        if let Some(value) = patch.sqlite_path {
            self.sqlite_path = Some(value);
        }
        if let Some(value) = patch.fallback {
            self.fallback = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub embedding_dims: usize,
    #[serde(default)]
    pub text_weight: f64,
    #[serde(default)]
    pub vector_weight: f64,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub limit: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            embedding_dims: 384,
            text_weight: 0.5,
            vector_weight: 0.5,
            threshold: 0.3,
            limit: 20,
        }
    }
}

impl SearchConfig {
    fn merge(&mut self, patch: SearchPatch) {
        if let Some(value) = patch.embedding_dims {
            self.embedding_dims = value;
        }
        if let Some(value) = patch.text_weight {
            self.text_weight = value;
        }
        if let Some(value) = patch.vector_weight {
            self.vector_weight = value;
        }
        if let Some(value) = patch.threshold {
            self.threshold = value;
        }
        if let Some(value) = patch.limit {
            self.limit = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingConfig {
    #[serde(default)]
    pub window_hours: u32,
    #[serde(default)]
    pub min_engagement: i64,
    #[serde(default)]
    pub limit: i64,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            window_hours: 168,
            min_engagement: 5,
            limit: 10,
        }
    }
}

impl TrendingConfig {
    fn merge(&mut self, patch: TrendingPatch) {
        if let Some(value) = patch.window_hours {
            self.window_hours = value;
        }
        if let Some(value) = patch.min_engagement {
            self.min_engagement = value;
        }
        if let Some(value) = patch.limit {
            self.limit = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    pub backend: Option<BackendPatch>,
    pub search: Option<SearchPatch>,
    pub trending: Option<TrendingPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BackendPatch {
    pub strategy: Option<String>,
    pub database_url: Option<String>,
    pub sqlite_path: Option<String>,
    pub fallback: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SearchPatch {
    pub embedding_dims: Option<usize>,
    pub text_weight: Option<f64>,
    pub vector_weight: Option<f64>,
    pub threshold: Option<f64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TrendingPatch {
    pub window_hours: Option<u32>,
    pub min_engagement: Option<i64>,
    pub limit: Option<i64>,
}

fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://***@{}", &url[..scheme_end], &rest[at + 1..]),
        None => url.to_string(),
    }
}

fn env_string<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn env_bool<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    env_string(lookup, key).map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env_string(lookup, key) {
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|err| {
            RankError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        None => Ok(None),
    }
}
