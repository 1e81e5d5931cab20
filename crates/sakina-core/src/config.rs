//! Runtime configuration.
//!
//! `CoreConfig::load()` layers defaults, an optional TOML file and `SAKINA__*`
//! environment overrides. Risk weights live here so the scoring table can be
//! tuned without touching the matcher code.

use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_high_factor_weight() -> u32 {
    3
}
fn default_moderate_factor_weight() -> u32 {
    1
}
fn default_moderate_threshold() -> u32 {
    2
}
fn default_high_threshold() -> u32 {
    4
}
fn default_imminent_threshold() -> u32 {
    6
}

/// Weights and thresholds for the suicide-risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_high_factor_weight")]
    pub high_factor_weight: u32,
    #[serde(default = "default_moderate_factor_weight")]
    pub moderate_factor_weight: u32,
    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: u32,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: u32,
    #[serde(default = "default_imminent_threshold")]
    pub imminent_threshold: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_factor_weight: default_high_factor_weight(),
            moderate_factor_weight: default_moderate_factor_weight(),
            moderate_threshold: default_moderate_threshold(),
            high_threshold: default_high_threshold(),
            imminent_threshold: default_imminent_threshold(),
        }
    }
}

/// Gateway + core settings. Env: `SAKINA__PORT`, `SAKINA__RISK__HIGH_THRESHOLD`, ...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    /// Persona every new connection starts on.
    #[serde(default = "default_persona")]
    pub default_persona: String,
    #[serde(default)]
    pub risk: RiskConfig,
}

fn default_persona() -> String {
    "general".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_name: "Sakina Therapist Voice".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8003,
            default_persona: default_persona(),
            risk: RiskConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Load config from file and environment. Precedence: env > `SAKINA_CONFIG` file (default `config/sakina`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("SAKINA_CONFIG").unwrap_or_else(|_| "config/sakina".to_string());
        Self::load_from(Path::new(&config_path))
    }

    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("app_name", "Sakina Therapist Voice")?
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8003_i64)?
            .set_default("default_persona", "general")?;

        // `config/sakina` resolves to `config/sakina.toml` through `with_name`.
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder.add_source(config::File::with_name(&path.to_string_lossy()).required(false))
        };

        builder
            .add_source(config::Environment::with_prefix("SAKINA").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_risk_defaults_match_scoring_table() {
        let risk = RiskConfig::default();
        assert_eq!(risk.high_factor_weight, 3);
        assert_eq!(risk.moderate_factor_weight, 1);
        assert_eq!(
            (risk.moderate_threshold, risk.high_threshold, risk.imminent_threshold),
            (2, 4, 6)
        );
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 9100\n[risk]\nimminent_threshold = 7").unwrap();

        let cfg = CoreConfig::load_from(file.path()).unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.risk.imminent_threshold, 7);
        assert_eq!(cfg.risk.high_threshold, 4);
        assert_eq!(cfg.default_persona, "general");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = CoreConfig::load_from(Path::new("/nonexistent/sakina.toml")).unwrap();
        assert_eq!(cfg.port, 8003);
        assert_eq!(cfg.risk, RiskConfig::default());
    }
}
