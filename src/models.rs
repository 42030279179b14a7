//! Ready-made drift and volatility functions
//!
//! Each model reads its parameters by name from the wrapper's bindings:
//!
//! | Model               | Value                      | Parameters         |
//! |---------------------|----------------------------|--------------------|
//! | [`Zero`]            | 0                          |                    |
//! | [`Constant`]        | c                          | user-chosen name   |
//! | [`ProportionalDrift`] | μ S                      | `mu`               |
//! | [`ProportionalVol`] | σ S                        | `sigma`            |
//! | [`LogNormalDrift`]  | μ - σ²/2                   | `mu`, `sigma`      |
//! | [`MeanReverting`]   | κ (θ - x)                  | `kappa`, `theta`   |
//! | [`SquareRootVol`]   | ξ √max(x, 0)               | `xi`               |
//! | [`HestonAssetDrift`] | μ S                       | `mu`               |
//! | [`HestonAssetVol`]  | √max(v, 0) S               | companion value v  |
//!
//! Pairing them with a scheme gives the usual models:
//! - GBM under arithmetic Euler: `ProportionalDrift` + `ProportionalVol`
//! - GBM under log-Euler: `LogNormalDrift` + `Constant::new("sigma")`
//! - Ornstein-Uhlenbeck: `MeanReverting` + `Constant::new("sigma")`
//! - CIR variance: `MeanReverting` + `SquareRootVol` (full truncation)
//! - Heston asset on a CIR companion: `HestonAssetDrift` + `HestonAssetVol`

use crate::fparam::{ModelFn, ParamValues};

/// Identically zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zero;

impl ModelFn for Zero {
    fn call(&self, _state: f64, _t: usize, _aux: Option<f64>, _params: &ParamValues<'_>) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        "Zero"
    }
}

/// Returns the parameter bound under `name`.
#[derive(Debug, Clone)]
pub struct Constant {
    name: String,
}

impl Constant {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ModelFn for Constant {
    fn call(&self, _state: f64, _t: usize, _aux: Option<f64>, params: &ParamValues<'_>) -> f64 {
        params.value(&self.name)
    }

    fn required_params(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }

    fn name(&self) -> &str {
        "Constant"
    }
}

/// μ S
#[derive(Debug, Clone, Copy, Default)]
pub struct ProportionalDrift;

impl ModelFn for ProportionalDrift {
    fn call(&self, state: f64, _t: usize, _aux: Option<f64>, params: &ParamValues<'_>) -> f64 {
        params.value("mu") * state
    }

    fn required_params(&self) -> Vec<&str> {
        vec!["mu"]
    }

    fn name(&self) -> &str {
        "ProportionalDrift"
    }
}

/// σ S
#[derive(Debug, Clone, Copy, Default)]
pub struct ProportionalVol;

impl ModelFn for ProportionalVol {
    fn call(&self, state: f64, _t: usize, _aux: Option<f64>, params: &ParamValues<'_>) -> f64 {
        params.value("sigma") * state
    }

    fn required_params(&self) -> Vec<&str> {
        vec!["sigma"]
    }

    fn name(&self) -> &str {
        "ProportionalVol"
    }
}

/// Log-space GBM drift μ - σ²/2, for use with the log-Euler scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNormalDrift;

impl ModelFn for LogNormalDrift {
    fn call(&self, _state: f64, _t: usize, _aux: Option<f64>, params: &ParamValues<'_>) -> f64 {
        let sigma = params.value("sigma");
        params.value("mu") - 0.5 * sigma * sigma
    }

    fn required_params(&self) -> Vec<&str> {
        vec!["mu", "sigma"]
    }

    fn name(&self) -> &str {
        "LogNormalDrift"
    }
}

/// κ (θ - x)
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanReverting;

impl ModelFn for MeanReverting {
    fn call(&self, state: f64, _t: usize, _aux: Option<f64>, params: &ParamValues<'_>) -> f64 {
        params.value("kappa") * (params.value("theta") - state)
    }

    fn required_params(&self) -> Vec<&str> {
        vec!["kappa", "theta"]
    }

    fn name(&self) -> &str {
        "MeanReverting"
    }
}

/// ξ √max(x, 0). Negative states are truncated to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquareRootVol;

impl ModelFn for SquareRootVol {
    fn call(&self, state: f64, _t: usize, _aux: Option<f64>, params: &ParamValues<'_>) -> f64 {
        params.value("xi") * state.max(0.0).sqrt()
    }

    fn required_params(&self) -> Vec<&str> {
        vec!["xi"]
    }

    fn name(&self) -> &str {
        "SquareRootVol"
    }
}

/// μ S on a stochastic-volatility chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct HestonAssetDrift;

impl ModelFn for HestonAssetDrift {
    fn call(&self, state: f64, _t: usize, _aux: Option<f64>, params: &ParamValues<'_>) -> f64 {
        params.value("mu") * state
    }

    fn required_params(&self) -> Vec<&str> {
        vec!["mu"]
    }

    fn name(&self) -> &str {
        "HestonAssetDrift"
    }
}

/// √max(v, 0) S where v is the companion variance.
#[derive(Debug, Clone, Copy, Default)]
pub struct HestonAssetVol;

impl ModelFn for HestonAssetVol {
    fn call(&self, state: f64, _t: usize, aux: Option<f64>, _params: &ParamValues<'_>) -> f64 {
        aux.map_or(f64::NAN, |v| v.max(0.0).sqrt() * state)
    }

    fn requires_aux(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "HestonAssetVol"
    }
}
