//! Figment-based loader for `KernelConfig`.
//!
//! Grounded on the teacher's `infrastructure::config::loader::ConfigLoader`
//! (same defaults -> YAML -> env precedence chain, `figment` crate),
//! retargeted from the teacher's flat `Config` to the kernel's
//! `KernelConfig` tree and validated against the kernel's own invariants
//! (SLO targets in range, budget positive, breaker thresholds sane)
//! instead of the teacher's agent-count/MCP-server checks.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::KernelConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("orchestrator.max_concurrent_tasks must be at least 1")]
    InvalidMaxConcurrentTasks,

    #[error("cache.semantic_similarity_threshold must be in [0, 1], got {0}")]
    InvalidSimilarityThreshold(f32),

    #[error("budget.daily_budget_usd must be positive")]
    InvalidBudget,

    #[error("slo.availability_target must be in (0, 1], got {0}")]
    InvalidAvailabilityTarget(f64),

    #[error(
        "slo.fast_burn_window_secs ({0}) must be less than slo.slow_burn_window_secs ({1})"
    )]
    InvalidBurnWindows(u64, u64),

    #[error("breaker.error_rate_threshold must be in (0, 1], got {0}")]
    InvalidErrorRateThreshold(f64),

    #[error("no providers configured")]
    NoProviders,
}

/// Loads `KernelConfig` with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with the kernel's standard precedence:
    /// 1. Programmatic defaults (`KernelConfig::default()`)
    /// 2. `.amas-kernel/config.yaml` (project config)
    /// 3. `.amas-kernel/local.yaml` (optional local overrides)
    /// 4. `AMAS_` prefixed environment variables, highest priority
    pub fn load() -> Result<KernelConfig> {
        let config: KernelConfig = Figment::new()
            .merge(Serialized::defaults(KernelConfig::default()))
            .merge(Yaml::file(".amas-kernel/config.yaml"))
            .merge(Yaml::file(".amas-kernel/local.yaml"))
            .merge(Env::prefixed("AMAS_").split("__"))
            .extract()
            .context("failed to extract KernelConfig from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping environment
    /// overrides. Used by tests and the demo binary's `--config` flag.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<KernelConfig> {
        let config: KernelConfig = Figment::new()
            .merge(Serialized::defaults(KernelConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &KernelConfig) -> Result<(), ConfigError> {
        if config.orchestrator.max_concurrent_tasks == 0 {
            return Err(ConfigError::InvalidMaxConcurrentTasks);
        }

        let threshold = config.cache.semantic_similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidSimilarityThreshold(threshold));
        }

        if config.budget.daily_budget_usd <= 0.0 {
            return Err(ConfigError::InvalidBudget);
        }

        let availability = config.slo.availability_target;
        if !(0.0..=1.0).contains(&availability) || availability == 0.0 {
            return Err(ConfigError::InvalidAvailabilityTarget(availability));
        }

        if config.slo.fast_burn_window_secs >= config.slo.slow_burn_window_secs {
            return Err(ConfigError::InvalidBurnWindows(
                config.slo.fast_burn_window_secs,
                config.slo.slow_burn_window_secs,
            ));
        }

        let error_rate = config.breaker.error_rate_threshold;
        if !(0.0..=1.0).contains(&error_rate) || error_rate == 0.0 {
            return Err(ConfigError::InvalidErrorRateThreshold(error_rate));
        }

        if config.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::ProviderConfigEntry;

    fn with_one_provider() -> KernelConfig {
        let mut config = KernelConfig::default();
        config.providers.insert(
            "demo".to_string(),
            ProviderConfigEntry {
                priority: 1,
                timeout_secs: 30,
                max_retries: 3,
                rate_limit_per_minute: 60,
                enabled: true,
                capabilities: vec!["general".to_string()],
                cost_in: 0.001,
                cost_out: 0.002,
                validation: Default::default(),
            },
        );
        config
    }

    #[test]
    fn default_config_with_a_provider_is_valid() {
        let config = with_one_provider();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn rejects_empty_provider_map() {
        let config = KernelConfig::default();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::NoProviders)));
    }

    #[test]
    fn rejects_zero_max_concurrent_tasks() {
        let mut config = with_one_provider();
        config.orchestrator.max_concurrent_tasks = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConcurrentTasks)
        ));
    }

    #[test]
    fn rejects_out_of_range_similarity_threshold() {
        let mut config = with_one_provider();
        config.cache.semantic_similarity_threshold = 1.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidSimilarityThreshold(_))
        ));
    }

    #[test]
    fn rejects_burn_windows_out_of_order() {
        let mut config = with_one_provider();
        config.slo.fast_burn_window_secs = 10_000;
        config.slo.slow_burn_window_secs = 1_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBurnWindows(10_000, 1_000))
        ));
    }

    #[test]
    fn yaml_overrides_merge_over_defaults() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "orchestrator:\n  max_concurrent_tasks: 128\nbudget:\n  daily_budget_usd: 200.0").unwrap();
        file.flush().unwrap();

        let config: KernelConfig = Figment::new()
            .merge(Serialized::defaults(KernelConfig::default()))
            .merge(Yaml::file(file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.orchestrator.max_concurrent_tasks, 128);
        assert!((config.budget.daily_budget_usd - 200.0).abs() < f64::EPSILON);
        assert_eq!(config.orchestrator.max_concurrent_steps_per_task, 8);
    }
}
