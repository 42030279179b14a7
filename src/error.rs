//! Error types for the parameter graph and simulation drivers

use crate::param::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdeError {
    #[error("Invalid parameter '{name}' = {value}: {constraint}")]
    InvalidParameter {
        name: String,
        value: f64,
        constraint: String,
    },

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Node {0} is a constant, not a discretization step")]
    NotAStep(NodeId),

    #[error("Node {0} is a discretization step, not a constant")]
    NotAConstant(NodeId),

    #[error("Function '{function}' requires parameter '{name}' which is not bound")]
    MissingParameter { function: String, name: String },

    #[error("Stochastic-volatility step at t = {t} has no companion node")]
    MissingCompanion { t: usize },

    #[error("Function '{function}' reads a companion value but the scheme provides none")]
    AuxiliaryRequired { function: String },

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Registering {dependent} as a dependent of {upstream} would create a cycle")]
    Cycle { upstream: NodeId, dependent: NodeId },
}

pub type SdeResult<T> = Result<T, SdeError>;

impl SdeError {
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: f64,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            value,
            constraint: constraint.into(),
        }
    }

    pub fn missing_parameter(function: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingParameter {
            function: function.into(),
            name: name.into(),
        }
    }

    /// True for errors raised while validating construction inputs.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Cycle { .. })
    }
}
