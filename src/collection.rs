//! Order-preserving, de-duplicating accumulation of per-signer values.
use serde::{Deserialize, Serialize};

use crate::error::{CeremonyError, Result};

/// Outcome of a [`Collection::record`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionUpdate {
    /// `false` when the exact value was already present.
    pub accepted: bool,
    pub collected: usize,
    pub required: usize,
}

impl CollectionUpdate {
    pub fn is_complete(&self) -> bool {
        self.collected >= self.required
    }
}

/// Values gathered from signers for one protocol round.
///
/// Arrival order is kept for auditing; it has no bearing on the protocol. A slot can
/// be held back for the local device so relayed values arriving early never take
/// its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    values: Vec<String>,
    required: usize,
    reserved: usize,
}

impl Collection {
    pub fn new(required: usize) -> Self {
        Collection {
            values: Vec::with_capacity(required),
            required,
            reserved: 0,
        }
    }

    /// A collection with one slot held for the local device's own value.
    pub fn with_local_slot(required: usize) -> Self {
        Collection {
            reserved: 1,
            ..Collection::new(required)
        }
    }

    /// Append a relayed `value` unless an identical value was already recorded.
    ///
    /// Fails with [`CeremonyError::RoundFull`] when every slot not held for the
    /// local device is taken.
    pub fn record(&mut self, value: String) -> Result<CollectionUpdate> {
        if self.contains(&value) {
            return Ok(self.update(false));
        }
        if self.open_slots() == 0 {
            return Err(CeremonyError::RoundFull {
                collected: self.values.len(),
                required: self.required,
            });
        }
        self.values.push(value);
        Ok(self.update(true))
    }

    /// Record the local device's own value into its held slot.
    ///
    /// The hold is released even when the value turns out to be a duplicate.
    pub fn record_local(&mut self, value: String) -> CollectionUpdate {
        self.reserved = self.reserved.saturating_sub(1);
        if self.contains(&value) {
            return self.update(false);
        }
        debug_assert!(
            self.values.len() < self.required,
            "recording into a complete collection"
        );
        self.values.push(value);
        self.update(true)
    }

    /// Slots still available to relayed values.
    pub fn open_slots(&self) -> usize {
        self.required
            .saturating_sub(self.values.len())
            .saturating_sub(self.reserved)
    }

    fn update(&self, accepted: bool) -> CollectionUpdate {
        CollectionUpdate {
            accepted,
            collected: self.values.len(),
            required: self.required,
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn required(&self) -> usize {
        self.required
    }

    pub fn is_complete(&self) -> bool {
        self.values.len() >= self.required
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}
