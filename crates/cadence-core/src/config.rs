//! Controller configuration: JSON file + `CADENCE_*` environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{CadenceError, Result};

/// Env override: `CADENCE_MAX_NEW_TOKENS` (usize) replaces `max_new_tokens`.
pub const ENV_MAX_NEW_TOKENS: &str = "CADENCE_MAX_NEW_TOKENS";
/// Env override: `CADENCE_UNKNOWN_DISPLAY` (`empty` | `marker`).
pub const ENV_UNKNOWN_DISPLAY: &str = "CADENCE_UNKNOWN_DISPLAY";

/// How `detokenize` renders an id the vocabulary does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownDisplay {
    /// Drop the id from visible output.
    #[default]
    Empty,
    /// Emit `UnknownDisplay::MARKER`.
    Marker,
}

impl UnknownDisplay {
    pub const MARKER: &'static str = "<unk>";
}

impl FromStr for UnknownDisplay {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "marker" => Ok(Self::Marker),
            other => Err(format!("unknown display policy {other:?} (expected empty|marker)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Upper bound on delivered tokens per request.
    pub max_new_tokens: usize,

    /// Fallback id for out-of-vocabulary words when no unknown token is found.
    pub unknown_id: i32,

    pub unknown_display: UnknownDisplay,

    /// With `max_new_tokens == 0`, still issue the prefill call (nothing is delivered).
    pub prefill_on_zero_budget: bool,

    /// Special-token names, tried in order.
    pub bos_candidates: Vec<String>,
    pub eos_candidates: Vec<String>,
    pub unk_candidates: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 100,
            unknown_id: 2, // <unk> in most sentencepiece-style vocabularies
            unknown_display: UnknownDisplay::Empty,
            prefill_on_zero_budget: true,
            bos_candidates: vec!["<bos>".into(), "<s>".into()],
            eos_candidates: vec!["<eos>".into(), "</s>".into()],
            unk_candidates: vec!["<unk>".into()],
        }
    }
}

impl ControllerConfig {
    /// Parse a JSON config; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| CadenceError::Config(format!("invalid config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CadenceError::Config(format!("cannot read {}: {e}", path.display())))?;
        let cfg = Self::from_json_str(&text)?;
        tracing::info!("⚙️ [config] loaded {}", path.display());
        Ok(cfg)
    }

    /// Apply `CADENCE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Unparseable values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_NEW_TOKENS) {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.max_new_tokens = n,
                Err(e) => tracing::warn!("⚠️ [config] ignoring {ENV_MAX_NEW_TOKENS}={raw:?}: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_UNKNOWN_DISPLAY) {
            match raw.parse::<UnknownDisplay>() {
                Ok(d) => self.unknown_display = d,
                Err(e) => tracing::warn!("⚠️ [config] ignoring {ENV_UNKNOWN_DISPLAY}: {e}"),
            }
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.unknown_id < 0 {
            return Err(CadenceError::Config(format!(
                "unknown_id must be non-negative, got {}",
                self.unknown_id
            )));
        }
        Ok(())
    }
}
