//! Values carried between machines by the operator.
//!
//! Nothing here is authenticated. A relayed value is only checked for shape; whether
//! it is actually valid is up to the signing backend, which will reject it or fail the
//! stage that consumes it.
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CeremonyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayKind {
    Transaction,
    Commitment,
    Package,
    Share,
    BroadcastConfirmation,
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayKind::Transaction => "unsigned transaction",
            RelayKind::Commitment => "commitment",
            RelayKind::Package => "signing package",
            RelayKind::Share => "signature share",
            RelayKind::BroadcastConfirmation => "broadcast confirmation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub kind: RelayKind,
    pub payload: String,
}

impl RelayMessage {
    pub fn new(kind: RelayKind, payload: impl Into<String>) -> Self {
        RelayMessage {
            kind,
            payload: payload.into(),
        }
    }

    /// Validate an operator-entered value.
    ///
    /// Surrounding whitespace is stripped since terminal pastes tend to carry a
    /// trailing newline. An empty result is rejected before it can reach the backend.
    pub fn parse(kind: RelayKind, raw: &str) -> Result<Self> {
        let payload = raw.trim();
        if payload.is_empty() {
            warn!(%kind, "rejected empty relay input");
            return Err(CeremonyError::MalformedRelayInput { kind });
        }
        Ok(RelayMessage::new(kind, payload))
    }
}

impl fmt::Display for RelayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_blank_values() {
        for raw in ["", "   ", "\n", "\t\r\n"] {
            assert_eq!(
                RelayMessage::parse(RelayKind::Package, raw),
                Err(CeremonyError::MalformedRelayInput {
                    kind: RelayKind::Package
                })
            );
        }
    }

    #[test]
    fn strips_paste_whitespace() {
        let message = RelayMessage::parse(RelayKind::Commitment, "  C1\n").unwrap();
        assert_eq!(message.payload, "C1");
        assert_eq!(message.kind, RelayKind::Commitment);
    }
}
