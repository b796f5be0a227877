//! Linker configuration, loaded from TOML.
//!
//! ```toml
//! rules = ["same_family", "same_row"]
//!
//! [thresholds]
//! noop_epsilon = 1e-9
//! warn_delta = 0.02
//! crit_delta = 0.10
//! overlay_severity = "warn"
//! ```

use crate::atom::Severity;
use crate::error::ParadoxError;
use crate::linker::rule_by_name;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_RULE: &str = "same_family";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    /// Deltas at or below this magnitude are treated as no change.
    #[serde(default = "default_noop_epsilon")]
    pub noop_epsilon: f64,
    #[serde(default = "default_warn_delta")]
    pub warn_delta: f64,
    #[serde(default = "default_crit_delta")]
    pub crit_delta: f64,
    #[serde(default = "default_overlay_severity")]
    pub overlay_severity: Severity,
}

fn default_noop_epsilon() -> f64 {
    1e-9
}

fn default_warn_delta() -> f64 {
    0.02
}

fn default_crit_delta() -> f64 {
    0.10
}

fn default_overlay_severity() -> Severity {
    Severity::Warn
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            noop_epsilon: default_noop_epsilon(),
            warn_delta: default_warn_delta(),
            crit_delta: default_crit_delta(),
            overlay_severity: default_overlay_severity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkerConfig {
    /// Link rules, applied in order; the first rule linking a pair names it.
    #[serde(default = "default_rules")]
    pub rules: Vec<String>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

fn default_rules() -> Vec<String> {
    vec![DEFAULT_RULE.to_string()]
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            thresholds: Thresholds::default(),
        }
    }
}

impl LinkerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ParadoxError> {
        let config: Self = toml::from_str(text).map_err(|e| ParadoxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParadoxError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ParadoxError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ParadoxError> {
        if self.rules.is_empty() {
            return Err(ParadoxError::Config("`rules` must not be empty".into()));
        }
        for name in &self.rules {
            if rule_by_name(name).is_none() {
                return Err(ParadoxError::Config(format!("unknown link rule `{name}`")));
            }
        }
        let t = &self.thresholds;
        for (name, value) in [
            ("noop_epsilon", t.noop_epsilon),
            ("warn_delta", t.warn_delta),
            ("crit_delta", t.crit_delta),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ParadoxError::Config(format!(
                    "thresholds.{name} must be a finite, non-negative number"
                )));
            }
        }
        if t.warn_delta > t.crit_delta {
            return Err(ParadoxError::Config(format!(
                "thresholds.warn_delta ({}) exceeds thresholds.crit_delta ({})",
                t.warn_delta, t.crit_delta
            )));
        }
        Ok(())
    }

    /// Severity of a metric change of magnitude `|delta|`.
    pub fn metric_severity(&self, delta: f64) -> Severity {
        let magnitude = delta.abs();
        if magnitude >= self.thresholds.crit_delta {
            Severity::Crit
        } else if magnitude >= self.thresholds.warn_delta {
            Severity::Warn
        } else {
            Severity::Info
        }
    }
}
