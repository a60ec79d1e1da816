use crate::filter::{Filter, FilterError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

static LUA_IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid lua identifier regex")
});

const LUA_KEYWORDS: [&str; 22] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Filter name '{0}' is not a valid Lua identifier")]
    InvalidName(String),
    #[error("Filter '{name}' is invalid: {source}")]
    InvalidFilter {
        name: String,
        #[source]
        source: FilterError,
    },
}

/// A set of named filters compiled together for one tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Tag selector the stages apply to
    pub tag: String,
    /// Drop matching records instead of keeping them
    pub exclude: bool,
    /// Filter expressions keyed by the Lua variable receiving their result
    pub filters: BTreeMap<String, String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            tag: "*".to_string(),
            exclude: false,
            filters: BTreeMap::new(),
        }
    }
}

impl JobConfig {
    /// Parse every filter, checking that each name can be used as a Lua local
    pub fn compile_filters(&self) -> Result<BTreeMap<String, Filter>, ConfigError> {
        self.filters
            .iter()
            .map(|(name, text)| {
                if !is_lua_identifier(name) {
                    return Err(ConfigError::InvalidName(name.clone()));
                }
                let filter = Filter::new(text).map_err(|source| ConfigError::InvalidFilter {
                    name: name.clone(),
                    source,
                })?;
                Ok((name.clone(), filter))
            })
            .collect()
    }
}

pub fn is_lua_identifier(name: &str) -> bool {
    LUA_IDENTIFIER_RE.is_match(name) && !LUA_KEYWORDS.contains(&name)
}

pub fn load_config_from_path(path: &Path) -> Result<JobConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    toml::from_str::<JobConfig>(&raw).map_err(|source| ConfigError::Parse {
        path: path_display,
        source,
    })
}
