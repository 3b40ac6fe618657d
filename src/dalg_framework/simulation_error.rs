use anyhow::Error as AnyError;
use thiserror::Error;

use crate::guards::guard::GuardError;

pub const NO_TRACES_POSSIBLE: &str = "no traces are possible with the current model and configuration; check, for instance, whether the minimum trace length exceeds the length of every trace the model allows";

/// Reasons for a run to end without all requested logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("cannot simulate with guard `{guard}`: {reason}")]
    MalformedGuard { guard: String, reason: String },

    #[error("{reason}")]
    NoTracesPossible { reason: String },

    #[error("no traces could be generated with the current model and configuration")]
    NoTracesFound,
}

impl SimulationError {
    pub fn no_traces_possible() -> Self {
        Self::NoTracesPossible {
            reason: NO_TRACES_POSSIBLE.to_string(),
        }
    }
}

impl From<GuardError> for SimulationError {
    fn from(value: GuardError) -> Self {
        Self::MalformedGuard {
            guard: value.get_guard().to_string(),
            reason: value.to_string(),
        }
    }
}

/**
 * Turns a guard failure somewhere in the chain of the error into the run-level error that aborts
 * the run; other errors are returned as they are.
 */
pub fn escalate_guard_error(error: AnyError) -> AnyError {
    match error.downcast_ref::<GuardError>() {
        Some(guard_error) => {
            log::error!("{}", guard_error);
            SimulationError::from(guard_error.clone()).into()
        }
        None => error,
    }
}
