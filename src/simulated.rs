//! A software stand-in for a hardware signing device.
//!
//! Produces deterministic hex values from its inputs so several simulated devices
//! can run a full ceremony against each other. It signs nothing; every value is a
//! SHA-256 digest. Faults can be queued per stage to rehearse rejections and
//! transport errors.
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::backend::{BackendError, SigningBackend};
use crate::stage::StageKind;

pub struct SimulatedDevice {
    name: String,
    faults: Mutex<HashMap<StageKind, VecDeque<BackendError>>>,
    calls: Mutex<Vec<StageKind>>,
}

impl SimulatedDevice {
    pub fn new(name: impl Into<String>) -> Self {
        SimulatedDevice {
            name: name.into(),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make the next call for `stage` fail with `error`. Queued faults are used in order.
    pub fn fail_next(&self, stage: StageKind, error: BackendError) {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(stage)
            .or_default()
            .push_back(error);
    }

    /// Every call made so far, in order, including failed ones.
    pub fn calls(&self) -> Vec<StageKind> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn enter(&self, stage: StageKind) -> Result<(), BackendError> {
        debug!(device = %self.name, %stage, "simulated device call");
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(stage);
        let queued = self
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get_mut(&stage)
            .and_then(VecDeque::pop_front);
        match queued {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Hash `parts` under a domain `label`, length-prefixing each part.
fn digest(label: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Arrival order of relayed values carries no meaning, so sort before hashing.
fn sorted(values: &[String]) -> Vec<&str> {
    let mut values: Vec<&str> = values.iter().map(String::as_str).collect();
    values.sort_unstable();
    values
}

#[async_trait]
impl SigningBackend for SimulatedDevice {
    async fn review_transaction(&self, unsigned_tx: &str) -> Result<String, BackendError> {
        self.enter(StageKind::Review)?;
        let mut transaction_id = digest("ceremony/txid", &[unsigned_tx]);
        transaction_id.truncate(16);
        Ok(transaction_id)
    }

    async fn create_signing_commitment(
        &self,
        transaction_id: &str,
    ) -> Result<String, BackendError> {
        self.enter(StageKind::Commitment)?;
        Ok(digest("ceremony/commitment", &[self.name.as_str(), transaction_id]))
    }

    async fn create_signing_package(
        &self,
        unsigned_tx: &str,
        commitments: &[String],
    ) -> Result<String, BackendError> {
        self.enter(StageKind::Package)?;
        if commitments.is_empty() {
            return Err(BackendError::Rejected("no commitments supplied".into()));
        }
        let mut parts = vec![unsigned_tx];
        parts.extend(sorted(commitments));
        Ok(digest("ceremony/package", &parts))
    }

    async fn create_signature_share(
        &self,
        signing_package: &str,
        unsigned_tx: &str,
    ) -> Result<String, BackendError> {
        self.enter(StageKind::SignatureShare)?;
        Ok(digest(
            "ceremony/share",
            &[self.name.as_str(), signing_package, unsigned_tx],
        ))
    }

    async fn aggregate_and_broadcast(
        &self,
        signing_package: &str,
        signature_shares: &[String],
    ) -> Result<String, BackendError> {
        self.enter(StageKind::Aggregation)?;
        if signature_shares.is_empty() {
            return Err(BackendError::Rejected("no signature shares supplied".into()));
        }
        let mut parts = vec![signing_package];
        parts.extend(sorted(signature_shares));
        Ok(format!("broadcast:{}", digest("ceremony/signature", &parts)))
    }
}
