//! Domain errors of the model layer.

use thiserror::Error;

/// Errors raised by the simulator, the calculator and the sweep driver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A parameter lies outside its declared domain.
    #[error("invalid {name}: {reason}")]
    InvalidConfig { name: &'static str, reason: String },

    /// A parameter makes a `1/x` term undefined.
    #[error("singular {name} at {value}")]
    SingularParameter { name: &'static str, value: f64 },

    /// A distribution rejected its parameters.
    #[error("failed to construct {dist} distribution: {reason}")]
    Sampling { dist: &'static str, reason: String },
}

impl ModelError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name,
            reason: reason.into(),
        }
    }

    pub fn sampling(dist: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Sampling {
            dist,
            reason: err.to_string(),
        }
    }
}
