//! Engine configuration: invocation limits, cost rates, and scoring constants.
//!
//! Everything tunable about an analysis run lives here as an explicit struct
//! with compiled defaults. Defaults are resolved in the following order
//! (later wins):
//!
//! 1. Compiled defaults ([`EngineConfig::default`])
//! 2. Environment variables (`FOLLOWGRAPH_*`), via [`EngineConfig::from_env`]
//! 3. Programmatic overrides through the `with_*` builders
//!
//! The scoring constants in [`ScoringConfig`] are deliberate knobs rather
//! than magic numbers: segments with different purchase cadences want
//! different recency windows and monetary targets.
//!
//! # Example
//!
//! ```rust
//! use followgraph::config::EngineConfig;
//! use std::time::Duration;
//!
//! let config = EngineConfig::default()
//!     .with_stage_timeout(Duration::from_secs(4))
//!     .with_max_retries(1);
//! assert!(config.validate().is_ok());
//! ```

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while resolving or validating configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// Environment variable parsing error.
    #[error("failed to parse environment variable {key}: {message}")]
    #[diagnostic(code(followgraph::config::env_parse))]
    EnvParse {
        /// Environment variable key.
        key: String,
        /// Error message.
        message: String,
    },

    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    #[diagnostic(
        code(followgraph::config::validation),
        help("Check the documented ranges on EngineConfig and ScoringConfig fields.")
    )]
    Validation(String),
}

/// Per-token pricing used for cost estimates on remote stage invocations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    /// USD per 1000 prompt tokens.
    pub input_per_1k: f64,
    /// USD per 1000 completion tokens.
    pub output_per_1k: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            input_per_1k: 0.0008,
            output_per_1k: 0.0032,
        }
    }
}

impl CostRates {
    /// Estimated USD cost for one invocation.
    #[must_use]
    pub fn estimate(&self, tokens_in: u64, tokens_out: u64) -> f64 {
        (tokens_in as f64 / 1000.0) * self.input_per_1k
            + (tokens_out as f64 / 1000.0) * self.output_per_1k
    }
}

/// Constants behind the RFM and churn formulas.
///
/// Weights are normalized: the three RFM weights must sum to 1.0, as must
/// the three churn weights. [`EngineConfig::validate`] enforces this.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Days after which recency contributes nothing (linear falloff to 0).
    pub recency_window_days: f64,
    /// Points of frequency score granted per lifetime order, capped at 100.
    pub frequency_points_per_order: f64,
    /// Lifetime spend (in currency units) that maps to a full monetary score.
    pub monetary_target: f64,
    /// Weight of the recency component in the RFM blend.
    pub recency_weight: f64,
    /// Weight of the frequency component in the RFM blend.
    pub frequency_weight: f64,
    /// Weight of the monetary component in the RFM blend.
    pub monetary_weight: f64,

    /// Days of silence after which the churn recency term saturates at 1.
    pub churn_silence_days: f64,
    /// Average order value scale in the churn value term `1 / (1 + aov/scale)`.
    pub churn_aov_scale: f64,
    /// Weight of the silence term in the churn blend.
    pub churn_recency_weight: f64,
    /// Weight of the inverse-frequency term in the churn blend.
    pub churn_frequency_weight: f64,
    /// Weight of the inverse-value term in the churn blend.
    pub churn_value_weight: f64,

    /// Churn risk assigned to customers with no order history.
    pub default_churn_risk: f64,
    /// Churn above this raises urgency (and lowers priority by one band).
    pub churn_high_threshold: f64,
    /// Churn below this relaxes urgency (and raises priority by one band).
    pub churn_low_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            recency_window_days: 90.0,
            frequency_points_per_order: 20.0,
            monetary_target: 1000.0,
            recency_weight: 0.3,
            frequency_weight: 0.3,
            monetary_weight: 0.4,

            churn_silence_days: 60.0,
            churn_aov_scale: 10.0,
            churn_recency_weight: 0.5,
            churn_frequency_weight: 0.3,
            churn_value_weight: 0.2,

            default_churn_risk: 1.0,
            churn_high_threshold: 0.7,
            churn_low_threshold: 0.3,
        }
    }
}

/// Declarative sink selection for the engine's event bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkConfig {
    /// Human-readable rendering to stdout.
    StdOut,
    /// In-memory retention, mostly for tests and inspection.
    Memory,
}

/// Event bus wiring the engine builds for each run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBusConfig {
    pub sinks: Vec<SinkConfig>,
}

impl EventBusConfig {
    #[must_use]
    pub fn with_stdout_only() -> Self {
        Self {
            sinks: vec![SinkConfig::StdOut],
        }
    }

    #[must_use]
    pub fn add_sink(mut self, sink: SinkConfig) -> Self {
        if !self.sinks.contains(&sink) {
            self.sinks.push(sink);
        }
        self
    }

    /// Materialize an [`EventBus`](crate::event_bus::EventBus) from this configuration.
    #[must_use]
    pub fn build_event_bus(&self) -> crate::event_bus::EventBus {
        use crate::event_bus::{EventSink, MemorySink, StdOutSink};

        let sinks: Vec<Box<dyn EventSink>> = self
            .sinks
            .iter()
            .map(|sink| match sink {
                SinkConfig::StdOut => Box::new(StdOutSink::default()) as Box<dyn EventSink>,
                SinkConfig::Memory => Box::new(MemorySink::new()) as Box<dyn EventSink>,
            })
            .collect();
        crate::event_bus::EventBus::with_sinks(sinks)
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::with_stdout_only()
    }
}

/// Top-level engine configuration.
///
/// One instance configures everything a run needs: remote invocation limits,
/// pricing, scoring constants, queue sizing, and event bus wiring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wall-clock budget for a single remote stage attempt.
    ///
    /// A timed-out attempt is never retried; the stage falls back immediately.
    #[serde(with = "duration_ms")]
    pub stage_timeout: Duration,
    /// Retries allowed after the first attempt for retryable failures
    /// (transport errors and schema violations).
    pub max_retries: u32,
    /// Sampling temperature for remote invocations. Analysis runs stay low.
    pub temperature: f64,
    /// Completion token budget per remote invocation.
    pub max_tokens: u64,
    /// Pricing used for cost estimates.
    pub cost: CostRates,
    /// Constants behind the RFM and churn formulas.
    pub scoring: ScoringConfig,
    /// Maximum number of customers in a daily follow-up queue.
    pub queue_limit: usize,
    /// Maximum stages running concurrently within one superstep.
    pub concurrency_limit: usize,
    /// Event bus sink wiring for engine-managed runs.
    pub event_bus: EventBusConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(8),
            max_retries: 2,
            temperature: 0.2,
            max_tokens: 2048,
            cost: CostRates::default(),
            scoring: ScoringConfig::default(),
            queue_limit: 5,
            concurrency_limit: 4,
            event_bus: EventBusConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Resolve a configuration from compiled defaults plus `FOLLOWGRAPH_*`
    /// environment variables.
    ///
    /// Recognized variables:
    /// - `FOLLOWGRAPH_STAGE_TIMEOUT_MS`
    /// - `FOLLOWGRAPH_MAX_RETRIES`
    /// - `FOLLOWGRAPH_TEMPERATURE`
    /// - `FOLLOWGRAPH_MAX_TOKENS`
    /// - `FOLLOWGRAPH_QUEUE_LIMIT`
    /// - `FOLLOWGRAPH_CONCURRENCY_LIMIT`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvParse`] for unparseable variables and
    /// [`ConfigError::Validation`] when the resolved configuration is out
    /// of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Some(ms) = read_env("FOLLOWGRAPH_STAGE_TIMEOUT_MS")? {
            config.stage_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = read_env("FOLLOWGRAPH_MAX_RETRIES")? {
            config.max_retries = retries;
        }
        if let Some(temperature) = read_env("FOLLOWGRAPH_TEMPERATURE")? {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = read_env("FOLLOWGRAPH_MAX_TOKENS")? {
            config.max_tokens = max_tokens;
        }
        if let Some(queue_limit) = read_env("FOLLOWGRAPH_QUEUE_LIMIT")? {
            config.queue_limit = queue_limit;
        }
        if let Some(concurrency_limit) = read_env("FOLLOWGRAPH_CONCURRENCY_LIMIT")? {
            config.concurrency_limit = concurrency_limit;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration against its documented ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first field out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stage_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "stage_timeout must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=0.3).contains(&self.temperature) {
            return Err(ConfigError::Validation(format!(
                "temperature {} outside analysis range 0.0..=0.3",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.queue_limit == 0 {
            return Err(ConfigError::Validation(
                "queue_limit must be at least 1".to_string(),
            ));
        }
        if self.concurrency_limit == 0 {
            return Err(ConfigError::Validation(
                "concurrency_limit must be at least 1".to_string(),
            ));
        }

        let scoring = &self.scoring;
        let rfm_sum = scoring.recency_weight + scoring.frequency_weight + scoring.monetary_weight;
        if (rfm_sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::Validation(format!(
                "RFM weights must sum to 1.0, got {rfm_sum}"
            )));
        }
        let churn_sum = scoring.churn_recency_weight
            + scoring.churn_frequency_weight
            + scoring.churn_value_weight;
        if (churn_sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::Validation(format!(
                "churn weights must sum to 1.0, got {churn_sum}"
            )));
        }
        if !(0.0..=1.0).contains(&scoring.default_churn_risk) {
            return Err(ConfigError::Validation(format!(
                "default_churn_risk {} outside 0.0..=1.0",
                scoring.default_churn_risk
            )));
        }
        if scoring.churn_low_threshold >= scoring.churn_high_threshold {
            return Err(ConfigError::Validation(format!(
                "churn_low_threshold {} must be below churn_high_threshold {}",
                scoring.churn_low_threshold, scoring.churn_high_threshold
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = queue_limit;
        self
    }

    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBusConfig) -> Self {
        self.event_bus = event_bus;
        self
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::EnvParse {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_hot_temperature() {
        let mut config = EngineConfig::default();
        config.temperature = 0.9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(msg)) if msg.contains("temperature")
        ));
    }

    #[test]
    fn rejects_unbalanced_rfm_weights() {
        let mut config = EngineConfig::default();
        config.scoring.recency_weight = 0.9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(msg)) if msg.contains("RFM weights")
        ));
    }

    #[test]
    fn cost_estimate_sums_both_directions() {
        let rates = CostRates::default();
        let cost = rates.estimate(1000, 1000);
        assert!((cost - 0.004).abs() < 1e-12);
    }

    #[test]
    fn zero_queue_limit_rejected() {
        let config = EngineConfig::default().with_queue_limit(0);
        assert!(config.validate().is_err());
    }
}
