//! Threshold signing ceremonies over manual relay
//!
//! ## Description
//!
//! This crate coordinates a two-round threshold signature (commitments, then
//! signature shares) between hardware signing devices that sit on separate machines
//! and never talk to each other directly. An operator copies each value off one
//! screen and pastes it into another.
//!
//! The crate does no cryptography. Every commitment, package, share and signature
//! comes from a [`SigningBackend`] and is handled as opaque text. What the crate does
//! own is sequencing: no package is built before every commitment is in, no
//! aggregation happens before every share is in, and a device that declines or
//! drops off mid-ceremony leaves the gathered state intact for a retry.
//!
//! ## Roles
//!
//! The coordinator holds the unsigned transaction, collects commitments, builds the
//! signing package, collects shares and broadcasts. A participant receives the
//! transaction and package by relay and returns its commitment and share. The
//! coordinator's own device may sign as well (the default) or act purely as an
//! aggregator, see [`CeremonyConfig::coordinator_is_signer`].
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run() -> ceremony::Result<()> {
//! use ceremony::{CeremonyConfig, CeremonyController, RoleSelection, SimulatedDevice};
//!
//! let device = SimulatedDevice::new("coordinator");
//! let mut controller = CeremonyController::new(CeremonyConfig::default())?;
//! controller.select_role(RoleSelection::Coordinator {
//!     unsigned_transaction: "0200000001...".into(),
//! })?;
//! controller.drive(&device).await?;
//! // relay the transaction, then paste each participant's commitment
//! controller.record_participant_commitment("...")?;
//! controller.drive(&device).await?;
//! # Ok(())
//! # }
//! ```
//!
//! > ⚠ Relayed values are not authenticated here. Their validity is only ever
//! established by the device accepting or rejecting them.

pub mod backend;
pub mod collection;
pub mod config;
pub mod controller;
pub mod error;
pub mod relay;
pub mod role;
pub mod session;
pub mod simulated;
pub mod stage;

pub use backend::{BackendError, BackendRequest, SigningBackend};
pub use config::CeremonyConfig;
pub use controller::{CeremonyController, CeremonyStatus, RelayOutcome};
pub use error::{CeremonyError, Result};
pub use relay::{RelayKind, RelayMessage};
pub use role::{Role, RoleSelection};
pub use session::CeremonySession;
pub use simulated::SimulatedDevice;
pub use stage::{Failure, FailureKind, Stage, StageKind, StageResult};
