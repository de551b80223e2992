//! Engine configuration, guard limits, and environment overrides.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{CredError, CredResult};

// Engine defaults
pub const DEFAULT_ALPHA: f64 = 0.05;
pub const DEFAULT_MAX_ITERATIONS: usize = 255;
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 1e-7;
pub const DEFAULT_WORKERS: usize = 4;

// Guards
pub const MAX_ITERATIONS_CAP: usize = 100_000;
pub const MAX_WORKERS: usize = 64;
pub const MAX_INTERVALS: usize = 1_000_000;

// Environment overrides
pub const ENV_ALPHA: &str = "CREDFLOW_ALPHA";
pub const ENV_MAX_ITERATIONS: &str = "CREDFLOW_MAX_ITERATIONS";
pub const ENV_CONVERGENCE_THRESHOLD: &str = "CREDFLOW_CONVERGENCE_THRESHOLD";
pub const ENV_WORKERS: &str = "CREDFLOW_WORKERS";

pub fn clamp_int(value: i64, minimum: i64, maximum: i64) -> i64 {
    value.max(minimum).min(maximum)
}

pub fn clamp_iterations(value: i64) -> usize {
    clamp_int(value, 1, MAX_ITERATIONS_CAP as i64) as usize
}

pub fn clamp_workers(value: i64) -> usize {
    clamp_int(value, 1, MAX_WORKERS as i64) as usize
}

/// Parameters of a cred computation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredConfig {
    /// Probability of returning to the seed distribution at every step.
    pub alpha: f64,
    pub max_iterations: usize,
    /// Bound on the L1 change between iterates, relative to the minted total.
    pub convergence_threshold: f64,
    /// Threads used by the timeline to score intervals in parallel.
    pub workers: usize,
}

impl Default for CredConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
            workers: DEFAULT_WORKERS,
        }
    }
}

fn parse_override<T: FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring invalid value {raw:?} for {name}");
            None
        }
    }
}

impl CredConfig {
    /// Defaults with any `CREDFLOW_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up by variable name. Unparseable values are
    /// ignored; numeric values are clamped to the guard limits.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(alpha) = parse_override::<f64>(ENV_ALPHA, lookup(ENV_ALPHA)) {
            self.alpha = alpha;
        }
        if let Some(iterations) = parse_override::<i64>(ENV_MAX_ITERATIONS, lookup(ENV_MAX_ITERATIONS)) {
            self.max_iterations = clamp_iterations(iterations);
        }
        if let Some(threshold) =
            parse_override::<f64>(ENV_CONVERGENCE_THRESHOLD, lookup(ENV_CONVERGENCE_THRESHOLD))
        {
            self.convergence_threshold = threshold;
        }
        if let Some(workers) = parse_override::<i64>(ENV_WORKERS, lookup(ENV_WORKERS)) {
            self.workers = clamp_workers(workers);
        }
        self
    }

    pub fn validate(&self) -> CredResult<()> {
        if !(0.0..1.0).contains(&self.alpha) {
            return Err(CredError::InvalidConfig(format!(
                "alpha must be in [0, 1), got {}",
                self.alpha
            )));
        }
        if self.max_iterations == 0 || self.max_iterations > MAX_ITERATIONS_CAP {
            return Err(CredError::InvalidConfig(format!(
                "max_iterations must be in [1, {MAX_ITERATIONS_CAP}], got {}",
                self.max_iterations
            )));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold <= 0.0 {
            return Err(CredError::InvalidConfig(format!(
                "convergence_threshold must be positive, got {}",
                self.convergence_threshold
            )));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(CredError::InvalidConfig(format!(
                "workers must be in [1, {MAX_WORKERS}], got {}",
                self.workers
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        CredConfig::default().validate().unwrap();
    }

    #[test]
    fn overrides_are_parsed_and_clamped() {
        let config = CredConfig::default().with_overrides(lookup(&[
            (ENV_ALPHA, "0.2"),
            (ENV_MAX_ITERATIONS, "10000000"),
            (ENV_CONVERGENCE_THRESHOLD, " 1e-9 "),
            (ENV_WORKERS, "0"),
        ]));
        assert_eq!(config.alpha, 0.2);
        assert_eq!(config.max_iterations, MAX_ITERATIONS_CAP);
        assert_eq!(config.convergence_threshold, 1e-9);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let config = CredConfig::default().with_overrides(lookup(&[(ENV_ALPHA, "lots")]));
        assert_eq!(config, CredConfig::default());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let bad = [
            CredConfig { alpha: 1.0, ..CredConfig::default() },
            CredConfig { alpha: -0.1, ..CredConfig::default() },
            CredConfig { max_iterations: 0, ..CredConfig::default() },
            CredConfig { convergence_threshold: 0.0, ..CredConfig::default() },
            CredConfig { workers: 0, ..CredConfig::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(CredError::InvalidConfig(_))));
        }
    }

    #[test]
    fn clamp_helpers() {
        assert_eq!(clamp_int(5, 1, 3), 3);
        assert_eq!(clamp_iterations(-4), 1);
        assert_eq!(clamp_workers(8), 8);
    }
}
