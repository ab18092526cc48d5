//! The signing device seen from the ceremony.
//!
//! Commitments, packages, shares and the final signature are produced by the device
//! behind this trait. The controller treats every value as opaque text.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::{StageKind, StageResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The device, or the human holding it, declined.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The request never produced an answer. Safe to repeat.
    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait SigningBackend: Send + Sync {
    /// Show the transaction on the device for approval, returning its identifier.
    async fn review_transaction(&self, unsigned_tx: &str) -> Result<String, BackendError>;

    async fn create_signing_commitment(&self, transaction_id: &str)
        -> Result<String, BackendError>;

    async fn create_signing_package(
        &self,
        unsigned_tx: &str,
        commitments: &[String],
    ) -> Result<String, BackendError>;

    async fn create_signature_share(
        &self,
        signing_package: &str,
        unsigned_tx: &str,
    ) -> Result<String, BackendError>;

    /// Combine the shares into the final signature and broadcast the signed
    /// transaction, returning the broadcast confirmation.
    async fn aggregate_and_broadcast(
        &self,
        signing_package: &str,
        signature_shares: &[String],
    ) -> Result<String, BackendError>;
}

/// A backend call the controller wants made, with every input it needs.
///
/// Built from session state alone, so issuing the same request twice is harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendRequest {
    ReviewTransaction {
        unsigned_tx: String,
    },
    CreateSigningCommitment {
        transaction_id: String,
    },
    CreateSigningPackage {
        unsigned_tx: String,
        commitments: Vec<String>,
    },
    CreateSignatureShare {
        signing_package: String,
        unsigned_tx: String,
    },
    AggregateAndBroadcast {
        signing_package: String,
        signature_shares: Vec<String>,
    },
}

impl BackendRequest {
    pub fn stage(&self) -> StageKind {
        match self {
            BackendRequest::ReviewTransaction { .. } => StageKind::Review,
            BackendRequest::CreateSigningCommitment { .. } => StageKind::Commitment,
            BackendRequest::CreateSigningPackage { .. } => StageKind::Package,
            BackendRequest::CreateSignatureShare { .. } => StageKind::SignatureShare,
            BackendRequest::AggregateAndBroadcast { .. } => StageKind::Aggregation,
        }
    }

    pub async fn execute<B: SigningBackend + ?Sized>(&self, backend: &B) -> StageResult {
        let result = match self {
            BackendRequest::ReviewTransaction { unsigned_tx } => {
                backend.review_transaction(unsigned_tx).await
            }
            BackendRequest::CreateSigningCommitment { transaction_id } => {
                backend.create_signing_commitment(transaction_id).await
            }
            BackendRequest::CreateSigningPackage {
                unsigned_tx,
                commitments,
            } => backend.create_signing_package(unsigned_tx, commitments).await,
            BackendRequest::CreateSignatureShare {
                signing_package,
                unsigned_tx,
            } => {
                backend
                    .create_signature_share(signing_package, unsigned_tx)
                    .await
            }
            BackendRequest::AggregateAndBroadcast {
                signing_package,
                signature_shares,
            } => {
                backend
                    .aggregate_and_broadcast(signing_package, signature_shares)
                    .await
            }
        };
        StageResult::from(result)
    }
}
