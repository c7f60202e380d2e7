use std::fs;
use std::path::{Path, PathBuf};

use dirs::home_dir;
use log::info;
use serde::{Deserialize, Serialize};

use crate::models::enums::{Dialect, PlannerTier, SortPreference};
use crate::query_ast::SynthesisDefaults;

const CONFIG_FILE: &str = "config.json";

/// Explicit compiler settings, passed into every entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompilerConfig {
    pub dialect: Dialect,
    pub default_sort: SortPreference,
    pub default_limit: Option<u64>,
    pub tier: PlannerTier,
    pub typed_date_literals: bool,
    pub debug_dir: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Tsql,
            default_sort: SortPreference::Default,
            default_limit: None,
            tier: PlannerTier::Full,
            typed_date_literals: true,
            debug_dir: None,
        }
    }
}

impl CompilerConfig {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Defaults overridden by `.env` and the `PLANSMITH_*` variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// `~/.plansmith/config.json` when present, then environment overrides.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        let path = data_dir().join(CONFIG_FILE);
        let mut config = match fs::read_to_string(&path) {
            Ok(content) => match Self::from_json(&content) {
                Ok(c) => {
                    info!("Loaded compiler config from {}", path.display());
                    c
                }
                Err(e) => {
                    log::warn!("Ignoring invalid config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Applies overrides from `lookup`. Unparseable values are logged and skipped.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PLANSMITH_DIALECT") {
            match v.parse() {
                Ok(d) => self.dialect = d,
                Err(e) => log::warn!("PLANSMITH_DIALECT: {}", e),
            }
        }
        if let Some(v) = lookup("PLANSMITH_DEFAULT_LIMIT") {
            match v.trim().parse::<u64>() {
                Ok(0) => self.default_limit = None,
                Ok(n) => self.default_limit = Some(n),
                Err(e) => log::warn!("PLANSMITH_DEFAULT_LIMIT '{}': {}", v, e),
            }
        }
        if let Some(v) = lookup("PLANSMITH_DEFAULT_SORT") {
            match v.parse() {
                Ok(s) => self.default_sort = s,
                Err(e) => log::warn!("PLANSMITH_DEFAULT_SORT: {}", e),
            }
        }
        if let Some(v) = lookup("PLANSMITH_TIER") {
            match v.parse() {
                Ok(t) => self.tier = t,
                Err(e) => log::warn!("PLANSMITH_TIER: {}", e),
            }
        }
        if let Some(v) = lookup("PLANSMITH_DEBUG_DIR")
            && !v.trim().is_empty()
        {
            self.debug_dir = Some(resolve_dir(Path::new(v.trim())));
        }
    }

    pub fn synthesis_defaults(&self) -> SynthesisDefaults {
        SynthesisDefaults {
            sort: self.default_sort,
            limit: self.default_limit,
            typed_date_literals: self.typed_date_literals,
        }
    }
}

/// `~/.plansmith`, or the working directory when there is no home.
pub fn data_dir() -> PathBuf {
    if let Some(mut hd) = home_dir() {
        hd.push(".plansmith");
        return hd;
    }
    PathBuf::from(".")
}

fn resolve_dir(path: &Path) -> PathBuf {
    if path.is_absolute() { path.to_path_buf() } else { data_dir().join(path) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PLANSMITH_DIALECT", "sqlite"),
            ("PLANSMITH_DEFAULT_LIMIT", "250"),
            ("PLANSMITH_DEFAULT_SORT", "desc"),
            ("PLANSMITH_TIER", "minimal"),
            ("PLANSMITH_DEBUG_DIR", "/tmp/plansmith-debug"),
        ]);
        let mut config = CompilerConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.dialect, Dialect::Sqlite);
        assert_eq!(config.default_limit, Some(250));
        assert_eq!(config.default_sort, SortPreference::Descending);
        assert_eq!(config.tier, PlannerTier::Minimal);
        assert_eq!(config.debug_dir, Some(PathBuf::from("/tmp/plansmith-debug")));
    }

    #[test]
    fn bad_env_values_keep_defaults() {
        let mut config = CompilerConfig::default();
        config.apply_env(|k| (k == "PLANSMITH_DIALECT" || k == "PLANSMITH_DEFAULT_LIMIT").then(|| "oracle".to_string()));
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn json_fills_missing_fields() {
        let config = CompilerConfig::from_json(r#"{"dialect": "postgres", "default_limit": 10}"#).unwrap();
        assert_eq!(config.dialect, Dialect::Postgres);
        assert!(config.typed_date_literals);
        assert_eq!(config.synthesis_defaults().limit, Some(10));
    }
}
