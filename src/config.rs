use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CeremonyError, Result};

/// Ceremony parameters shared by both roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CeremonyConfig {
    /// Number of commitments, and later signature shares, the coordinator must
    /// hold before it may build the signing package or aggregate.
    pub required_signers: usize,
    /// Whether the coordinator's own device contributes a commitment and share.
    /// When `false` the coordinator only aggregates, and `required_signers`
    /// counts participants alone.
    pub coordinator_is_signer: bool,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        CeremonyConfig {
            required_signers: 2,
            coordinator_is_signer: true,
        }
    }
}

impl CeremonyConfig {
    pub fn new(required_signers: usize, coordinator_is_signer: bool) -> Self {
        CeremonyConfig {
            required_signers,
            coordinator_is_signer,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.required_signers < 2 {
            return Err(CeremonyError::InvalidConfig(format!(
                "a threshold ceremony needs at least 2 signers, got {}",
                self.required_signers
            )));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: CeremonyConfig = serde_json::from_str(json)
            .map_err(|e| CeremonyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CeremonyError::InvalidConfig(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}
