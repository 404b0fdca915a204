use thiserror::Error;

/// Failures of a whole run. A trial running out of money is not one of these;
/// it is recorded on its `TrialResult`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error(
        "correlation matrix is not positive definite (diagonal term {diagonal:.4}); check the correlation coefficients for contradictions"
    )]
    NonPositiveDefiniteCorrelation { diagonal: f64 },
    #[error("simulation cancelled")]
    Cancelled,
}

impl SimulationError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
