//! Ceremony stages and backend outcomes.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::BackendError;

/// Position of a ceremony in the signing state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    SelectingRole,
    ParticipantAwaitingTransaction,
    CoordinatorHasTransaction,
    ReviewingTransaction,
    CreatingCommitment,
    CoordinatorCollectingCommitments,
    CreatingPackage,
    AwaitingPackage,
    CreatingSignatureShare,
    CoordinatorCollectingShares,
    Aggregating,
    /// The aggregate-and-broadcast request is in flight.
    Broadcasting,
    AwaitingBroadcastConfirmation,
    Done { confirmation: String },
    Failed(Failure),
    Cancelled,
}

impl Stage {
    /// `Done` and `Cancelled` end the ceremony; nothing moves out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done { .. } | Stage::Cancelled)
    }

    /// The backend operation this stage performs, if any.
    pub fn backend_stage(&self) -> Option<StageKind> {
        match self {
            Stage::ReviewingTransaction => Some(StageKind::Review),
            Stage::CreatingCommitment => Some(StageKind::Commitment),
            Stage::CreatingPackage => Some(StageKind::Package),
            Stage::CreatingSignatureShare => Some(StageKind::SignatureShare),
            Stage::Aggregating | Stage::Broadcasting => Some(StageKind::Aggregation),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::SelectingRole => write!(f, "selecting role"),
            Stage::ParticipantAwaitingTransaction => write!(f, "awaiting transaction"),
            Stage::CoordinatorHasTransaction => write!(f, "holding transaction"),
            Stage::ReviewingTransaction => write!(f, "reviewing transaction"),
            Stage::CreatingCommitment => write!(f, "creating commitment"),
            Stage::CoordinatorCollectingCommitments => write!(f, "collecting commitments"),
            Stage::CreatingPackage => write!(f, "creating signing package"),
            Stage::AwaitingPackage => write!(f, "awaiting signing package"),
            Stage::CreatingSignatureShare => write!(f, "creating signature share"),
            Stage::CoordinatorCollectingShares => write!(f, "collecting signature shares"),
            Stage::Aggregating => write!(f, "aggregating"),
            Stage::Broadcasting => write!(f, "broadcasting"),
            Stage::AwaitingBroadcastConfirmation => write!(f, "awaiting broadcast confirmation"),
            Stage::Done { confirmation } => write!(f, "done ({})", confirmation),
            Stage::Failed(failure) => write!(f, "failed: {}", failure),
            Stage::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Stages that call out to the signing backend and can therefore fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Review,
    Commitment,
    Package,
    SignatureShare,
    Aggregation,
}

impl StageKind {
    /// Stage to re-enter when retrying a failure of this kind.
    pub fn entry_stage(self) -> Stage {
        match self {
            StageKind::Review => Stage::ReviewingTransaction,
            StageKind::Commitment => Stage::CreatingCommitment,
            StageKind::Package => Stage::CreatingPackage,
            StageKind::SignatureShare => Stage::CreatingSignatureShare,
            StageKind::Aggregation => Stage::Aggregating,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Review => "review",
            StageKind::Commitment => "commitment",
            StageKind::Package => "signing package",
            StageKind::SignatureShare => "signature share",
            StageKind::Aggregation => "aggregation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    DeviceRejected,
    TransportError,
}

/// Why a backend stage failed. Kept on [`Stage::Failed`] until retried or cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub stage: StageKind,
    pub kind: FailureKind,
    pub reason: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Outcome of a backend request as fed back into the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageResult {
    /// The device has not answered yet, typically waiting on a human.
    Pending,
    Success(String),
    Rejected(String),
    TransportError(String),
}

impl From<Result<String, BackendError>> for StageResult {
    fn from(result: Result<String, BackendError>) -> Self {
        match result {
            Ok(payload) => StageResult::Success(payload),
            Err(BackendError::Rejected(reason)) => StageResult::Rejected(reason),
            Err(BackendError::Transport(reason)) => StageResult::TransportError(reason),
        }
    }
}
