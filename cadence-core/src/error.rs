//! Error types for the engine.
//!
//! Setup errors stop a run before the first step. Arithmetic faults stop a run
//! mid-way and carry the last committed state. Risk adjustments are not errors
//! at all; they are reported as `RiskEvent`s.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::engine::state::RunResult;

/// Failures detected before the loop starts. The run never begins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetupError {
    #[error("malformed time of day '{0}' (expected HH:MM)")]
    MalformedTimeOfDay(String),

    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("cannot register task '{0}': registration closes when the run starts")]
    RegistrationClosed(String),

    #[error("bar universe is empty")]
    EmptyUniverse,

    #[error("asset '{0}' has no bars")]
    EmptySeries(String),

    #[error("asset '{asset}': bars are not strictly ascending at {timestamp}")]
    UnorderedBars {
        asset: String,
        timestamp: NaiveDateTime,
    },

    #[error("asset '{asset}': invalid bar at {timestamp}: {reason}")]
    InvalidBar {
        asset: String,
        timestamp: NaiveDateTime,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Unrecoverable numeric failure during a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArithmeticFault {
    #[error("total equity {equity} at {timestamp} is not positive; weights cannot be converted to quantities")]
    NonPositiveEquity {
        timestamp: NaiveDateTime,
        equity: f64,
    },

    #[error("non-finite {what} at {timestamp}")]
    NonFinite {
        timestamp: NaiveDateTime,
        what: String,
    },
}

/// Top-level error returned by `run_backtest`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    /// The run stopped on a fault. `partial` holds everything committed
    /// before the faulting step.
    #[error("run aborted: {fault}")]
    Fault {
        fault: ArithmeticFault,
        partial: Box<RunResult>,
    },
}

impl EngineError {
    pub fn is_setup(&self) -> bool {
        matches!(self, EngineError::Setup(_))
    }

    /// The partial result of a faulted run.
    pub fn partial(&self) -> Option<&RunResult> {
        match self {
            EngineError::Fault { partial, .. } => Some(partial),
            EngineError::Setup(_) => None,
        }
    }
}
