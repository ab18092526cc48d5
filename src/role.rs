//! Role selection.
//!
//! The role is fixed when a ceremony starts. Changing it means starting a new ceremony.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::config::CeremonyConfig;
use crate::error::Result;
use crate::relay::{RelayKind, RelayMessage};
use crate::session::CeremonySession;
use crate::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Coordinator,
    Participant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => f.write_str("coordinator"),
            Role::Participant => f.write_str("participant"),
        }
    }
}

/// The operator's choice at the start of a ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSelection {
    /// The coordinator already holds the unsigned transaction it wants signed.
    Coordinator { unsigned_transaction: String },
    /// A participant receives the transaction later through the relay.
    Participant,
}

/// Role-specific ceremony state. Only the coordinator accumulates values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleState {
    Coordinator {
        is_signer: bool,
        commitments: Collection,
        shares: Collection,
    },
    Participant,
}

impl RoleState {
    pub fn role(&self) -> Role {
        match self {
            RoleState::Coordinator { .. } => Role::Coordinator,
            RoleState::Participant => Role::Participant,
        }
    }

    /// Whether this side's device produces a commitment and a signature share.
    pub fn is_signer(&self) -> bool {
        match self {
            RoleState::Coordinator { is_signer, .. } => *is_signer,
            RoleState::Participant => true,
        }
    }
}

/// Resolve an operator's choice into a fresh session and the stage it starts in.
///
/// Pure: nothing outside the returned values is touched.
pub fn select_role(
    selection: RoleSelection,
    config: &CeremonyConfig,
) -> Result<(CeremonySession, Stage)> {
    config.validate()?;
    match selection {
        RoleSelection::Coordinator {
            unsigned_transaction,
        } => {
            let transaction = RelayMessage::parse(RelayKind::Transaction, &unsigned_transaction)?;
            let collection = || {
                if config.coordinator_is_signer {
                    Collection::with_local_slot(config.required_signers)
                } else {
                    Collection::new(config.required_signers)
                }
            };
            let role = RoleState::Coordinator {
                is_signer: config.coordinator_is_signer,
                commitments: collection(),
                shares: collection(),
            };
            Ok((
                CeremonySession::new(role, Some(transaction.payload)),
                Stage::CoordinatorHasTransaction,
            ))
        }
        RoleSelection::Participant => Ok((
            CeremonySession::new(RoleState::Participant, None),
            Stage::ParticipantAwaitingTransaction,
        )),
    }
}
