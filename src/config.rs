use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_RATING_SYSTEM: &str = "numerical";
pub const DEFAULT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_ITERATIONS: usize = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;
pub const DEFAULT_MEMORY_SIZE: usize = 2;

const ENV_PREFIX: &str = "PROMPT_OPTIMIZER_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Failed to save config: {0}")]
    Write(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// A caller-defined rubric dimension echoed into every assessment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub description: String,
}

impl MetricSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Settings for a single optimization run.
///
/// `rating_system` stays a free string: an unknown value is only reported
/// when convergence is evaluated, and the run keeps going.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub rating_system: String,
    /// Fraction of the 0-20 scale required by the numerical rating system.
    pub threshold: f64,
    pub iterations: usize,
    /// Total assessment attempts per iteration, including the first.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// How many trailing history entries are replayed into each request.
    pub memory_size: usize,
    pub custom_metrics: Vec<MetricSpec>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            rating_system: DEFAULT_RATING_SYSTEM.to_string(),
            threshold: DEFAULT_THRESHOLD,
            iterations: DEFAULT_ITERATIONS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            memory_size: DEFAULT_MEMORY_SIZE,
            custom_metrics: Vec::new(),
        }
    }
}

impl OptimizerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config: OptimizerConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.rating_system = normalize_rating_system(&config.rating_system);
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Write(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, json).map_err(|e| ConfigError::Write(e.to_string()))
    }

    /// Defaults overlaid with `PROMPT_OPTIMIZER_*` variables (a `.env` file
    /// is honoured).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(value) = var("RATING_SYSTEM") {
            self.rating_system = normalize_rating_system(&value);
        }
        if let Some(value) = var("THRESHOLD") {
            self.threshold = parse_field("threshold", &value)?;
        }
        if let Some(value) = var("ITERATIONS") {
            self.iterations = parse_field("iterations", &value)?;
        }
        if let Some(value) = var("MAX_RETRIES") {
            self.max_retries = parse_field("max_retries", &value)?;
        }
        if let Some(value) = var("RETRY_DELAY_MS") {
            self.retry_delay_ms = parse_field("retry_delay_ms", &value)?;
        }
        if let Some(value) = var("MEMORY_SIZE") {
            self.memory_size = parse_field("memory_size", &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "threshold",
                reason: format!("must be in (0, 1], got {}", self.threshold),
            });
        }
        if self.iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "iterations",
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                reason: "must be >= 1".to_string(),
            });
        }
        if let Some(metric) = self.custom_metrics.iter().find(|m| m.name.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "custom_metrics",
                reason: format!("metric with empty name ('{}')", metric.description),
            });
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Settings for the concurrent batch executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Base settings; each item overrides threshold and custom metrics.
    pub optimizer: OptimizerConfig,
    pub rate_per_interval: u32,
    pub interval_ms: u64,
    pub burst: u32,
    pub max_concurrency: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerConfig::default(),
            rate_per_interval: 1,
            interval_ms: 1000,
            burst: 1,
            max_concurrency: None,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_per_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "rate_per_interval",
                reason: "must be > 0".to_string(),
            });
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_concurrency",
                reason: "must be > 0 when set".to_string(),
            });
        }
        Ok(())
    }
}

pub fn normalize_rating_system(input: &str) -> String {
    input.trim().to_lowercase()
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        reason: format!("'{}': {}", value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = OptimizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rating_system, "numerical");
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert!(BatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_threshold = OptimizerConfig {
            threshold: 0.0,
            ..Default::default()
        };
        assert!(bad_threshold.validate().is_err());

        let too_high = OptimizerConfig {
            threshold: 1.5,
            ..Default::default()
        };
        assert!(too_high.validate().is_err());

        let no_iterations = OptimizerConfig {
            iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            no_iterations.validate(),
            Err(ConfigError::Invalid { field: "iterations", .. })
        ));

        let no_attempts = OptimizerConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(no_attempts.validate().is_err());
    }

    #[test]
    fn test_unknown_rating_system_is_not_a_construction_error() {
        let config = OptimizerConfig {
            rating_system: "stars".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PROMPT_OPTIMIZER_RATING_SYSTEM", " Letter "),
            ("PROMPT_OPTIMIZER_ITERATIONS", "9"),
            ("PROMPT_OPTIMIZER_MEMORY_SIZE", ""),
        ]
        .into_iter()
        .collect();

        let mut config = OptimizerConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.rating_system, "letter");
        assert_eq!(config.iterations, 9);
        assert_eq!(config.memory_size, DEFAULT_MEMORY_SIZE);
    }

    #[test]
    fn test_override_parse_error() {
        let mut config = OptimizerConfig::default();
        let err = config
            .apply_overrides(|k| (k == "PROMPT_OPTIMIZER_THRESHOLD").then(|| "high".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "threshold", .. }));
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let path = std::env::temp_dir().join(format!("prompt-opt-{}.json", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            r#"{"threshold": 0.9, "custom_metrics": [{"name": "Tone", "description": "Friendly"}]}"#,
        )
        .unwrap();

        let config = OptimizerConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(config.threshold, 0.9);
        assert_eq!(config.iterations, DEFAULT_ITERATIONS);
        assert_eq!(config.custom_metrics, vec![MetricSpec::new("Tone", "Friendly")]);
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("prompt-opt-{}.json", uuid::Uuid::new_v4()));
        let config = OptimizerConfig {
            rating_system: "letter".to_string(),
            memory_size: 4,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = OptimizerConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = OptimizerConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
