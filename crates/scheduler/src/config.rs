// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scheduler configuration loaded from TOML files or constructed
//! programmatically.
//!
//! # TOML Format
//! ```toml
//! default_timeout_ms = 0
//! default_min_threshold = 1
//! measure_latency = true
//! latency_window = 128
//! ```

use crate::error::SchedulerError;
use std::path::Path;
use std::time::Duration;

/// Defaults applied to every network group at registration. Per-group
/// values can be changed afterwards with `set_timeout` / `set_threshold`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SchedulerConfig {
    /// Default switch timeout in milliseconds; `0` means "wait
    /// indefinitely on the threshold".
    #[serde(default)]
    pub default_timeout_ms: u64,
    /// Default minimum pending frames before a group is threshold-ready.
    #[serde(default = "default_threshold")]
    pub default_min_threshold: u32,
    /// Whether each group gets a latency meter.
    #[serde(default = "default_true")]
    pub measure_latency: bool,
    /// Timestamp window capacity of each latency meter.
    #[serde(default = "default_window")]
    pub latency_window: usize,
}

fn default_threshold() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_window() -> usize {
    128
}

impl SchedulerConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SchedulerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::InvalidArgument(format!(
                "cannot read config '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| SchedulerError::InvalidArgument(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, SchedulerError> {
        toml::to_string_pretty(self)
            .map_err(|e| SchedulerError::InvalidArgument(format!("TOML serialise error: {e}")))
    }

    /// The default switch timeout as a [`Duration`].
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    fn validate(&self) -> Result<(), SchedulerError> {
        if self.default_min_threshold == 0 {
            return Err(SchedulerError::InvalidArgument(
                "default_min_threshold must be at least 1".into(),
            ));
        }
        if self.measure_latency && self.latency_window == 0 {
            return Err(SchedulerError::InvalidArgument(
                "latency_window must be at least 1 when latency is measured".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 0,
            default_min_threshold: 1,
            measure_latency: true,
            latency_window: 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = SchedulerConfig::default();
        assert_eq!(c.default_timeout(), Duration::ZERO);
        assert_eq!(c.default_min_threshold, 1);
        assert!(c.measure_latency);
        assert_eq!(c.latency_window, 128);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
default_timeout_ms = 50
default_min_threshold = 4
measure_latency = false
"#;
        let c = SchedulerConfig::from_toml(toml).unwrap();
        assert_eq!(c.default_timeout(), Duration::from_millis(50));
        assert_eq!(c.default_min_threshold, 4);
        assert!(!c.measure_latency);
        // Omitted fields fall back to defaults.
        assert_eq!(c.latency_window, 128);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let toml = "default_min_threshold = 0";
        assert!(matches!(
            SchedulerConfig::from_toml(toml),
            Err(SchedulerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_zero_window_rejected_when_measuring() {
        let toml = "latency_window = 0";
        assert!(SchedulerConfig::from_toml(toml).is_err());

        let toml = "latency_window = 0\nmeasure_latency = false";
        assert!(SchedulerConfig::from_toml(toml).is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let c = SchedulerConfig {
            default_timeout_ms: 25,
            default_min_threshold: 2,
            measure_latency: true,
            latency_window: 64,
        };
        let toml = c.to_toml().unwrap();
        let back = SchedulerConfig::from_toml(&toml).unwrap();
        assert_eq!(back.default_timeout_ms, c.default_timeout_ms);
        assert_eq!(back.default_min_threshold, c.default_min_threshold);
        assert_eq!(back.latency_window, c.latency_window);
    }
}
