//! Versioned scorer configuration.
//!
//! Keyword sets, marker terms, the top-K window, the fallback rule table,
//! and the optional display floor all live in one JSON artifact. The
//! built-in artifact is compiled into the binary; deployments can load an
//! override with [`ScorerConfig::from_path`].

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::FallbackRule;

/// The built-in configuration artifact.
pub const BUILTIN_CONFIG: &str = include_str!("../config/scorer.v1.json");

/// Highest configuration format version this build understands.
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config version {0} (max {max})", max = CONFIG_VERSION)]
    UnsupportedVersion(u32),

    #[error("top_k must be at least 1")]
    ZeroTopK,

    #[error("keyword set '{0}' is empty")]
    EmptyKeywordSet(&'static str),

    #[error("keyword {0:?} appears in both the ai and real sets")]
    OverlappingKeyword(String),

    #[error("{side} marker {marker:?} contains keyword {keyword:?} and can never reach the fallback stage")]
    ShadowedMarker {
        side: &'static str,
        marker: String,
        keyword: String,
    },

    #[error("rule '{rule}' has invalid score pair ({ai}, {real})")]
    InvalidRuleScores { rule: String, ai: f64, real: f64 },

    #[error("confidence floor {0} outside [0, 1]")]
    InvalidFloor(f64),

    #[error("failed to compile keyword matcher: {0}")]
    Matcher(#[from] aho_corasick::BuildError),
}

/// The two curated keyword sets used by the keyword stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSet {
    pub ai: Vec<String>,
    pub real: Vec<String>,
}

/// Marker terms inspected in the joined top-K labels by the fallback stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSet {
    pub artificial: Vec<String>,
    pub natural: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub version: u32,
    pub keywords: KeywordSet,
    pub markers: MarkerSet,
    /// Number of leading predictions examined by the fallback stage.
    pub top_k: usize,
    /// Fallback rules, evaluated in order; first match wins.
    pub rules: Vec<FallbackRule>,
    /// Minimum confidence shown to users. Does not change the computed score.
    #[serde(default)]
    pub confidence_floor: Option<f64>,
}

impl ScorerConfig {
    /// Parse and validate a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        if self.top_k == 0 {
            return Err(ConfigError::ZeroTopK);
        }
        if is_blank(&self.keywords.ai) {
            return Err(ConfigError::EmptyKeywordSet("ai"));
        }
        if is_blank(&self.keywords.real) {
            return Err(ConfigError::EmptyKeywordSet("real"));
        }

        let ai: HashSet<String> = self
            .keywords
            .ai
            .iter()
            .map(|k| k.trim().to_lowercase())
            .collect();
        if let Some(dup) = self
            .keywords
            .real
            .iter()
            .map(|k| k.trim().to_lowercase())
            .find(|k| ai.contains(k))
        {
            return Err(ConfigError::OverlappingKeyword(dup));
        }

        // Any label containing a shadowed marker also contains the keyword,
        // so the keyword stage always decides first.
        let keywords: Vec<String> = self
            .keywords
            .ai
            .iter()
            .chain(&self.keywords.real)
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let markers = [
            ("artificial", &self.markers.artificial),
            ("natural", &self.markers.natural),
        ];
        for (side, set) in markers {
            for marker in set.iter().map(|m| m.trim().to_lowercase()) {
                if let Some(keyword) = keywords.iter().find(|k| marker.contains(k.as_str())) {
                    return Err(ConfigError::ShadowedMarker {
                        side,
                        marker,
                        keyword: keyword.clone(),
                    });
                }
            }
        }

        for rule in &self.rules {
            let ok = |v: f64| v.is_finite() && v >= 0.0;
            if !ok(rule.ai) || !ok(rule.real) {
                return Err(ConfigError::InvalidRuleScores {
                    rule: rule.name.clone(),
                    ai: rule.ai,
                    real: rule.real,
                });
            }
        }

        if let Some(floor) = self.confidence_floor
            && !(0.0..=1.0).contains(&floor)
        {
            return Err(ConfigError::InvalidFloor(floor));
        }

        Ok(())
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self::from_json(BUILTIN_CONFIG).expect("built-in scorer config is valid")
    }
}

fn is_blank(set: &[String]) -> bool {
    set.iter().all(|k| k.trim().is_empty())
}
