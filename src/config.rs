use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::requirements::{RequiredFieldSet, MERCHANT_REQUIRED_FIELDS};

/// Main configuration structure for merchant evaluation
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MerchantEvalConfig {
    /// Evaluation workflow settings
    pub evaluation: EvaluationConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// How long the default evaluator takes to finish
    pub delay_ms: u64,
    /// Heartbeat interval while an evaluation runs (0 disables it)
    pub heartbeat_interval_ms: u64,
    /// Fail an evaluation that has not finished after this long
    pub timeout_ms: Option<u64>,
    /// Attributes that must be non-blank
    pub required_fields: Vec<String>,
    /// Finished runs kept for status lookups
    pub history_limit: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            delay_ms: 6000,
            heartbeat_interval_ms: 2000,
            timeout_ms: Some(60_000),
            required_fields: MERCHANT_REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
            history_limit: 32,
        }
    }
}

impl EvaluationConfig {
    pub fn required_field_set(&self) -> RequiredFieldSet {
        RequiredFieldSet::new(self.required_fields.iter().cloned())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level / filter directive
    pub log_level: String,
    /// Emit JSON instead of human-readable lines
    pub json_logs: bool,
    /// Log metric counters on shutdown
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
            metrics_enabled: true,
        }
    }
}

impl MerchantEvalConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (merchant-eval.toml, .merchant-eval-rc)
    /// 3. Environment variables (prefixed with MERCHANT_EVAL_)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`load`](Self::load) but resolves config files relative to `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        let toml_path = dir.join("merchant-eval.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".merchant-eval-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("MERCHANT_EVAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<MerchantEvalConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = MerchantEvalConfig::load_env_file();
        MerchantEvalConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static MerchantEvalConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_merchant_form() {
        let config = MerchantEvalConfig::default();
        assert_eq!(config.evaluation.delay_ms, 6000);
        assert_eq!(config.evaluation.heartbeat_interval_ms, 2000);
        assert_eq!(config.evaluation.required_field_set().len(), 5);
        assert_eq!(config.evaluation.timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("merchant-eval.toml"),
            "[evaluation]\ndelay_ms = 250\nrequired_fields = [\"merchantName\", \"contactEmail\"]\n",
        )
        .unwrap();

        let config = MerchantEvalConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.evaluation.delay_ms, 250);
        assert_eq!(
            config.evaluation.required_fields,
            vec!["merchantName".to_string(), "contactEmail".to_string()]
        );
        // Untouched keys keep their defaults
        assert_eq!(config.evaluation.heartbeat_interval_ms, 2000);
        assert!(config.observability.json_logs);
    }

    #[test]
    fn test_save_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MerchantEvalConfig::default();
        config.evaluation.history_limit = 4;
        config.observability.json_logs = false;
        config.save_to_file(dir.path().join("merchant-eval.toml")).unwrap();

        let loaded = MerchantEvalConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.evaluation.history_limit, 4);
        assert!(!loaded.observability.json_logs);
    }
}
