//! Configuration management for the AsthmaShield inference service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with ASTHMA__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Environmental data provider configuration
    pub weather: WeatherConfig,

    /// Model artifact configuration
    pub model: ModelConfig,

    /// Retry and caching policy for environmental fetches
    pub fetch: FetchConfig,

    /// Explanation engine configuration
    pub explanation: ExplanationConfig,

    /// Advice composition configuration
    pub advice: AdviceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    /// OpenWeatherMap API base URL
    pub api_endpoint: String,

    /// OpenWeatherMap API key
    pub api_key: String,

    /// Pollen index used when the provider reports none
    pub default_pollen_level: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Path to the trained model artifact (JSON)
    pub artifact_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// First backoff delay in milliseconds, doubled on each retry
    pub backoff_base_ms: u64,

    /// Upper bound on any single backoff delay
    pub backoff_max_ms: u64,

    /// Serve the last good snapshot when every attempt fails
    pub fallback_to_cache: bool,

    /// Oldest cached snapshot that may still be served
    pub cache_max_age_secs: u64,
}

/// Which attribution modes to compute per request
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationMode {
    Additive,
    Surrogate,
    Both,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExplanationConfig {
    /// Which attributions to compute
    pub mode: ExplanationMode,

    /// CPU budget for one explanation, in milliseconds
    pub budget_ms: u64,

    /// Seed used when the caller does not supply one
    pub seed: u64,

    /// Permutations per background row for sampled Shapley values
    pub permutations: usize,

    /// Perturbations per surrogate run
    pub surrogate_samples: usize,

    /// Independent surrogate runs used for the fidelity check
    pub surrogate_runs: usize,

    /// Perturbations are clamped to this many training standard deviations
    pub perturbation_radius: f64,

    /// Width of the exponential proximity kernel
    pub kernel_width: f64,

    /// Ridge penalty for the surrogate fit
    pub ridge: f64,

    /// Minimum fraction of runs whose surrogate label must match the model
    pub fidelity_threshold: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdviceConfig {
    /// Contributing features quoted in advice text
    pub top_features: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("ASTHMA_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("weather.api_endpoint", "https://api.openweathermap.org/data/2.5")?
            .set_default("weather.api_key", "")?
            .set_default("weather.default_pollen_level", 50.0)?
            .set_default("model.artifact_path", "artifacts/asthma_risk_forest.json")?
            .set_default("fetch.timeout_ms", 5000)?
            .set_default("fetch.max_retries", 2)?
            .set_default("fetch.backoff_base_ms", 200)?
            .set_default("fetch.backoff_max_ms", 2000)?
            .set_default("fetch.fallback_to_cache", false)?
            .set_default("fetch.cache_max_age_secs", 1800)?
            .set_default("explanation.mode", "both")?
            .set_default("explanation.budget_ms", 750)?
            .set_default("explanation.seed", 42)?
            .set_default("explanation.permutations", 32)?
            .set_default("explanation.surrogate_samples", 500)?
            .set_default("explanation.surrogate_runs", 5)?
            .set_default("explanation.perturbation_radius", 3.0)?
            .set_default("explanation.kernel_width", 0.75 * (shared::FEATURE_COUNT as f64).sqrt())?
            .set_default("explanation.ridge", 1.0)?
            .set_default("explanation.fidelity_threshold", 0.8)?
            .set_default("advice.top_features", 3)?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (ASTHMA__ prefix)
            .add_source(
                Environment::with_prefix("ASTHMA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            weather: WeatherConfig::default(),
            model: ModelConfig::default(),
            fetch: FetchConfig::default(),
            explanation: ExplanationConfig::default(),
            advice: AdviceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://api.openweathermap.org/data/2.5".to_string(),
            api_key: String::new(),
            default_pollen_level: 50.0,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: "artifacts/asthma_risk_forest.json".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_retries: 2,
            backoff_base_ms: 200,
            backoff_max_ms: 2000,
            fallback_to_cache: false,
            cache_max_age_secs: 1800,
        }
    }
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            mode: ExplanationMode::Both,
            budget_ms: 750,
            seed: 42,
            permutations: 32,
            surrogate_samples: 500,
            surrogate_runs: 5,
            perturbation_radius: 3.0,
            kernel_width: 0.75 * (shared::FEATURE_COUNT as f64).sqrt(),
            ridge: 1.0,
            fidelity_threshold: 0.8,
        }
    }
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            top_features: shared::DEFAULT_TOP_FEATURES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_uses_code_defaults() {
        let config = Config::load().unwrap();
        assert_eq!(config.fetch.max_retries, 2);
        assert_eq!(config.explanation.mode, ExplanationMode::Both);
        assert_eq!(config.advice.top_features, 3);
        assert!((config.explanation.kernel_width - ExplanationConfig::default().kernel_width).abs() < 1e-12);
    }

    #[test]
    fn test_mode_names() {
        let mode: ExplanationMode = serde_json::from_str("\"surrogate\"").unwrap();
        assert_eq!(mode, ExplanationMode::Surrogate);
    }
}
