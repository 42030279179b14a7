//! Simulation settings.

use crate::error::{SdeError, SdeResult};
use crate::euler::Scheme;
use crate::shocks::validate_rho;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Shape and scheme of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of steps T; the chain has T + 1 nodes
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    /// Number of Monte Carlo paths
    #[serde(default = "default_n_paths")]
    pub n_paths: usize,
    /// Discretization scheme
    #[serde(default)]
    pub scheme: Scheme,
    /// Seed for [`SimulationConfig::rng`]; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            n_paths: default_n_paths(),
            scheme: Scheme::default(),
            seed: None,
        }
    }
}

fn default_horizon() -> usize {
    252 // one year of daily steps
}

fn default_n_paths() -> usize {
    10_000
}

impl SimulationConfig {
    pub fn new(horizon: usize, n_paths: usize) -> Self {
        Self {
            horizon,
            n_paths,
            ..Self::default()
        }
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> SdeResult<()> {
        validate_horizon(self.horizon)?;
        validate_paths(self.n_paths)
    }

    /// Generator for shock draws, seeded from `seed` when present.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Correlation between an auxiliary chain and the chain it drives.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrelationConfig {
    #[serde(default)]
    pub rho: f64,
}

impl CorrelationConfig {
    pub fn new(rho: f64) -> Self {
        Self { rho }
    }

    pub fn validate(&self) -> SdeResult<()> {
        validate_rho(self.rho)
    }
}

pub(crate) fn validate_horizon(horizon: usize) -> SdeResult<()> {
    if horizon == 0 {
        return Err(SdeError::invalid_parameter(
            "horizon",
            0.0,
            "must be at least 1",
        ));
    }
    Ok(())
}

pub(crate) fn validate_paths(n_paths: usize) -> SdeResult<()> {
    if n_paths == 0 {
        return Err(SdeError::invalid_parameter(
            "n_paths",
            0.0,
            "must be at least 1",
        ));
    }
    Ok(())
}
