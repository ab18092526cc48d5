use thiserror::Error;

use crate::relay::RelayKind;
use crate::stage::{Failure, FailureKind, Stage, StageKind};

pub type Result<T, E = CeremonyError> = std::result::Result<T, E>;

/// Errors returned synchronously by [`CeremonyController`](crate::controller::CeremonyController)
/// operations.
///
/// Backend failures do not surface here: they move the ceremony into
/// [`Stage::Failed`] where the operator can inspect the reason and `retry()`.
/// A front end that gives up on a failed stage reports it by converting the
/// [`Failure`] into [`CeremonyError::DeviceRejected`] or [`CeremonyError::TransportError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CeremonyError {
    #[error("{kind} value is empty")]
    MalformedRelayInput { kind: RelayKind },

    #[error("device rejected {stage}: {reason}")]
    DeviceRejected { stage: StageKind, reason: String },

    #[error("transport error during {stage}: {reason}")]
    TransportError { stage: StageKind, reason: String },

    /// A completeness guard was violated. Reaching this is a controller bug.
    #[error("cannot enter {stage} with {collected} of {required} values collected")]
    IncompleteCeremony {
        stage: StageKind,
        collected: usize,
        required: usize,
    },

    /// Every slot of the round not held for the local device is already filled.
    #[error("round already holds {collected} of {required} values, no room for another")]
    RoundFull { collected: usize, required: usize },

    #[error("role is already selected for this ceremony")]
    RoleAlreadySelected,

    #[error("no ceremony session, select a role first")]
    NoSession,

    #[error("cannot {operation} while {stage}")]
    InvalidOperation {
        operation: &'static str,
        stage: Stage,
    },

    #[error("retry is only possible from a failed stage, ceremony is {0}")]
    NotFailed(Stage),

    #[error("no backend request is pending")]
    NothingPending,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<&Failure> for CeremonyError {
    fn from(failure: &Failure) -> Self {
        let stage = failure.stage;
        let reason = failure.reason.clone();
        match failure.kind {
            FailureKind::DeviceRejected => CeremonyError::DeviceRejected { stage, reason },
            FailureKind::TransportError => CeremonyError::TransportError { stage, reason },
        }
    }
}
