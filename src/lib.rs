//! # Lazy SDE Simulation
//!
//! Euler-type Monte Carlo simulation of stochastic differential equations on
//! top of a lazy, dirty-flag parameter graph.
//!
//! Every scalar of a model (initial value, step size, drift and volatility
//! parameters) is a node of a [`ParamGraph`]. A simulation strings `T`
//! discretization nodes after the initial value and evaluates the chain once
//! per Monte Carlo path. When a parameter changes, only the nodes that read
//! it (directly or through their predecessors) are marked dirty, and they are
//! recomputed on the next evaluation rather than at mutation time. This makes
//! repeated reruns with bumped parameters cheap, as in calibration loops.
//!
//! ## Modules
//!
//! - [`param`] - parameter graph, constants and dirty-flag propagation
//! - [`fparam`] - drift/volatility functions bound to named parameters
//! - [`models`] - ready-made drift and volatility functions
//! - [`euler`] - Euler, log-Euler and stochastic-volatility steps
//! - [`simulation`] - single-factor Monte Carlo driver
//! - [`stoch_vol`] - correlated two-factor driver
//! - [`shocks`] - standard-normal shock matrices and correlation
//! - [`monte_carlo`] - payoff estimates over simulated values
//! - [`config`] - simulation settings
//!
//! ## Example
//!
//! ```rust
//! use lazy_sde::models::{Constant, LogNormalDrift};
//! use lazy_sde::{EulerSimulation, FParam, ParamGraph, Scheme, SimulationConfig};
//!
//! let mut graph = ParamGraph::new();
//! let s0 = graph.constant(100.0);
//! let dt = graph.constant(1.0 / 252.0);
//! let mu = graph.constant(0.05);
//! let sigma = graph.constant(0.2);
//!
//! let drift = FParam::new(LogNormalDrift, [("mu", mu), ("sigma", sigma)]).unwrap();
//! let vol = FParam::new(Constant::new("sigma"), [("sigma", sigma)]).unwrap();
//!
//! let config = SimulationConfig::new(252, 1_000)
//!     .with_scheme(Scheme::LogEuler)
//!     .with_seed(42);
//! let mut rng = config.rng();
//! let mut sim = EulerSimulation::new(graph, drift, vol, s0, dt, &config, &mut rng).unwrap();
//! sim.run_all().unwrap();
//!
//! // Bump the volatility and rerun on the same shocks
//! sim.set_param(sigma, 0.25).unwrap();
//! sim.run_all().unwrap();
//! assert!(sim.terminal_values().iter().all(|&s| s > 0.0));
//! ```

pub mod config;
pub mod error;
pub mod euler;
pub mod fparam;
pub mod models;
pub mod monte_carlo;
pub mod param;
pub mod shocks;
pub mod simulation;
pub mod stoch_vol;

pub use config::{CorrelationConfig, SimulationConfig};
pub use error::{SdeError, SdeResult};
pub use euler::{EulerStep, Scheme};
pub use fparam::{FParam, ModelFn, ParamValues};
pub use param::{NodeId, ParamGraph};
pub use shocks::ShockSource;
pub use simulation::EulerSimulation;
pub use stoch_vol::StochVolSimulation;
