use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

use crate::{
    error::{Error, Result},
    matrix::{FillPolicy, checked_area},
    producer::GrowthPolicy,
    workload::MultiplyMode,
};

/// Startup parameters for a run.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// workers = 8
/// initial_size = 64
/// size_ceiling = 2048
///
/// [fill]
/// kind = "random"
/// seed = 42
/// max = 9
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of worker threads, and the barrier's participant count.
    pub workers: usize,
    /// Size of the first round's matrices.
    pub initial_size: usize,
    /// Size multiplier applied between rounds.
    pub growth_factor: usize,
    /// Largest size the producer may generate.
    pub size_ceiling: Option<usize>,
    /// Stop cleanly after this many rounds.
    pub max_rounds: Option<u64>,
    /// Fail the run if a round's workers have not all finished within this many milliseconds.
    pub round_timeout_ms: Option<u64>,
    /// How the producer fills each round's operands. Also used for round 1.
    pub fill: FillPolicy,
    /// Whether each worker multiplies on its own thread or across the rayon pool.
    pub workload: MultiplyMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: 4,
            initial_size: 10,
            growth_factor: 2,
            size_ceiling: None,
            max_rounds: None,
            round_timeout_ms: None,
            fill: FillPolicy::default(),
            workload: MultiplyMode::default(),
        }
    }
}

impl Config {
    /// Parses a configuration from TOML text. Missing keys keep their
    /// defaults and unknown keys are rejected.
    ///
    /// The result is not validated; call [`Config::validate`] before use.
    ///
    /// # Examples
    ///
    /// ```
    /// use synched_rounds::Config;
    ///
    /// let config = Config::from_toml_str("workers = 2\ngrowth_factor = 3").unwrap();
    /// assert_eq!(config.workers, 2);
    /// assert_eq!(config.growth_factor, 3);
    /// assert_eq!(config.initial_size, 10);
    /// assert!(Config::from_toml_str("threads = 2").is_err());
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML file. See [`Config::from_toml_str`].
    ///
    /// Fails with [`Error::Io`] if the file cannot be read.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Checks every value that would make a run misbehave. Must pass before any
    /// thread is spawned.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.initial_size == 0 {
            return Err(Error::Config("initial_size must be at least 1".into()));
        }
        if checked_area(self.initial_size).is_none() {
            return Err(Error::Config(format!(
                "initial_size {} is too large: its square overflows usize",
                self.initial_size
            )));
        }
        if self.growth_factor == 0 {
            return Err(Error::Config("growth_factor must be at least 1".into()));
        }
        if let Some(ceiling) = self.size_ceiling {
            if ceiling < self.initial_size {
                return Err(Error::Config(format!(
                    "size_ceiling {} is below initial_size {}",
                    ceiling, self.initial_size
                )));
            }
        }
        if self.max_rounds == Some(0) {
            return Err(Error::Config("max_rounds must be at least 1".into()));
        }
        if self.round_timeout_ms == Some(0) {
            return Err(Error::Config("round_timeout_ms must be at least 1".into()));
        }
        if let FillPolicy::Random { max, .. } = self.fill {
            if max < 0 {
                return Err(Error::Config(format!("random fill max {} is negative", max)));
            }
        }
        Ok(())
    }

    /// The producer's growth policy: `growth_factor` bounded by `size_ceiling`.
    #[inline]
    pub fn growth(&self) -> GrowthPolicy {
        GrowthPolicy {
            factor: self.growth_factor,
            ceiling: self.size_ceiling,
        }
    }

    #[inline]
    pub fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout_ms.map(Duration::from_millis)
    }
}
