//! State of a single signing ceremony.
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, CollectionUpdate};
use crate::error::Result;
use crate::role::{Role, RoleState};

/// Everything a ceremony has learned so far.
///
/// Owned by exactly one [`CeremonyController`](crate::controller::CeremonyController)
/// and dropped when the ceremony ends. Values are never cleared on failure, so a
/// retry sees exactly what the failed attempt saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonySession {
    role: RoleState,
    unsigned_transaction: Option<String>,
    transaction_id: Option<String>,
    local_commitment: Option<String>,
    signing_package: Option<String>,
    local_signature_share: Option<String>,
}

impl CeremonySession {
    pub(crate) fn new(role: RoleState, unsigned_transaction: Option<String>) -> Self {
        CeremonySession {
            role,
            unsigned_transaction,
            transaction_id: None,
            local_commitment: None,
            signing_package: None,
            local_signature_share: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role.role()
    }

    pub fn is_signer(&self) -> bool {
        self.role.is_signer()
    }

    pub fn unsigned_transaction(&self) -> Option<&str> {
        self.unsigned_transaction.as_deref()
    }

    /// Identifier the device assigned during review, used by operators to make
    /// sure every machine is signing the same transaction.
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn local_commitment(&self) -> Option<&str> {
        self.local_commitment.as_deref()
    }

    pub fn signing_package(&self) -> Option<&str> {
        self.signing_package.as_deref()
    }

    pub fn local_signature_share(&self) -> Option<&str> {
        self.local_signature_share.as_deref()
    }

    /// Commitments gathered so far. `None` for participants.
    pub fn commitments(&self) -> Option<&Collection> {
        match &self.role {
            RoleState::Coordinator { commitments, .. } => Some(commitments),
            RoleState::Participant => None,
        }
    }

    /// Signature shares gathered so far. `None` for participants.
    pub fn shares(&self) -> Option<&Collection> {
        match &self.role {
            RoleState::Coordinator { shares, .. } => Some(shares),
            RoleState::Participant => None,
        }
    }

    pub(crate) fn set_unsigned_transaction(&mut self, transaction: String) {
        self.unsigned_transaction = Some(transaction);
    }

    pub(crate) fn set_transaction_id(&mut self, transaction_id: String) {
        self.transaction_id = Some(transaction_id);
    }

    pub(crate) fn set_signing_package(&mut self, package: String) {
        self.signing_package = Some(package);
    }

    /// Store the local commitment and, for a signing coordinator, count it into the
    /// slot its collection holds for it.
    pub(crate) fn set_local_commitment(&mut self, commitment: String) -> Option<CollectionUpdate> {
        self.local_commitment = Some(commitment.clone());
        match &mut self.role {
            RoleState::Coordinator { commitments, .. } => Some(commitments.record_local(commitment)),
            RoleState::Participant => None,
        }
    }

    pub(crate) fn set_local_signature_share(&mut self, share: String) -> Option<CollectionUpdate> {
        self.local_signature_share = Some(share.clone());
        match &mut self.role {
            RoleState::Coordinator { shares, .. } => Some(shares.record_local(share)),
            RoleState::Participant => None,
        }
    }

    /// Record a commitment relayed from a participant. `None` for participants.
    pub(crate) fn record_commitment(&mut self, commitment: String) -> Option<Result<CollectionUpdate>> {
        match &mut self.role {
            RoleState::Coordinator { commitments, .. } => Some(commitments.record(commitment)),
            RoleState::Participant => None,
        }
    }

    pub(crate) fn record_share(&mut self, share: String) -> Option<Result<CollectionUpdate>> {
        match &mut self.role {
            RoleState::Coordinator { shares, .. } => Some(shares.record(share)),
            RoleState::Participant => None,
        }
    }
}
