//! Ceremony controller
//!
//! One state machine drives both roles. The controller never talks to the device
//! itself: [`CeremonyController::poll_request`] hands out the next backend call and
//! [`CeremonyController::complete`] takes its outcome back, so a device that sits
//! waiting for a human can be awaited, cancelled around, or driven by hand.
//! [`CeremonyController::drive`] runs the two against a [`SigningBackend`].
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{BackendRequest, SigningBackend};
use crate::collection::CollectionUpdate;
use crate::config::CeremonyConfig;
use crate::error::{CeremonyError, Result};
use crate::relay::{RelayKind, RelayMessage};
use crate::role::{self, Role, RoleSelection};
use crate::session::CeremonySession;
use crate::stage::{Failure, FailureKind, Stage, StageKind, StageResult};

/// What happened to a value the operator entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayOutcome {
    Accepted,
    /// The exact value had already been recorded.
    Duplicate,
    /// The ceremony has ended; the value was dropped.
    Ignored,
}

/// Snapshot of a ceremony for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyStatus {
    pub role: Option<Role>,
    pub stage: Stage,
    pub pending: bool,
    pub transaction_id: Option<String>,
    pub collected_commitments: Option<usize>,
    pub collected_shares: Option<usize>,
    pub required_signers: usize,
    pub outgoing: Option<RelayMessage>,
}

#[derive(Debug)]
pub struct CeremonyController {
    config: CeremonyConfig,
    stage: Stage,
    session: Option<CeremonySession>,
    pending: Option<StageKind>,
}

impl CeremonyController {
    pub fn new(config: CeremonyConfig) -> Result<Self> {
        config.validate()?;
        Ok(CeremonyController {
            config,
            stage: Stage::SelectingRole,
            session: None,
            pending: None,
        })
    }

    pub fn config(&self) -> &CeremonyConfig {
        &self.config
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn session(&self) -> Option<&CeremonySession> {
        self.session.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(CeremonySession::role)
    }

    /// Whether a backend request has been handed out and not yet answered.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn select_role(&mut self, selection: RoleSelection) -> Result<()> {
        if self.stage.is_terminal() {
            return Ok(());
        }
        if self.session.is_some() {
            return Err(CeremonyError::RoleAlreadySelected);
        }
        let (session, stage) = role::select_role(selection, &self.config)?;
        info!(role = %session.role(), "ceremony started");
        self.session = Some(session);
        self.transition(stage)
    }

    /// Participant: accept the unsigned transaction relayed by the coordinator.
    pub fn submit_transaction(&mut self, raw: &str) -> Result<RelayOutcome> {
        if self.stage.is_terminal() {
            return Ok(RelayOutcome::Ignored);
        }
        self.expect_stage(Stage::ParticipantAwaitingTransaction, "submit a transaction")?;
        let transaction = RelayMessage::parse(RelayKind::Transaction, raw)?;
        self.session_mut()?
            .set_unsigned_transaction(transaction.payload);
        self.transition(Stage::ReviewingTransaction)?;
        Ok(RelayOutcome::Accepted)
    }

    /// Coordinator: record a commitment relayed from a participant.
    ///
    /// Accepted any time during the commitment round, including while the device
    /// is still reviewing or producing the coordinator's own commitment. Identical
    /// values are recorded once. Once the round is complete and the coordinator's
    /// own commitment is in, the ceremony moves on to building the signing package.
    pub fn record_participant_commitment(&mut self, raw: &str) -> Result<RelayOutcome> {
        if self.stage.is_terminal() {
            return Ok(RelayOutcome::Ignored);
        }
        self.expect_round(RelayKind::Commitment, "record a commitment")?;
        let commitment = RelayMessage::parse(RelayKind::Commitment, raw)?;
        let update = self
            .session_mut()?
            .record_commitment(commitment.payload)
            .transpose()?;
        self.settle_collection(RelayKind::Commitment, update)
    }

    /// Participant: accept the signing package relayed by the coordinator.
    pub fn submit_signing_package(&mut self, raw: &str) -> Result<RelayOutcome> {
        if self.stage.is_terminal() {
            return Ok(RelayOutcome::Ignored);
        }
        self.expect_stage(Stage::AwaitingPackage, "submit a signing package")?;
        let package = RelayMessage::parse(RelayKind::Package, raw)?;
        self.session_mut()?.set_signing_package(package.payload);
        self.transition(Stage::CreatingSignatureShare)?;
        Ok(RelayOutcome::Accepted)
    }

    /// Coordinator: record a signature share relayed from a participant.
    ///
    /// Accepted from the moment the signing package exists.
    pub fn record_participant_share(&mut self, raw: &str) -> Result<RelayOutcome> {
        if self.stage.is_terminal() {
            return Ok(RelayOutcome::Ignored);
        }
        self.expect_round(RelayKind::Share, "record a signature share")?;
        let share = RelayMessage::parse(RelayKind::Share, raw)?;
        let update = self.session_mut()?.record_share(share.payload).transpose()?;
        self.settle_collection(RelayKind::Share, update)
    }

    /// Participant: finish once the coordinator relays the broadcast confirmation.
    pub fn acknowledge_broadcast(&mut self, raw: &str) -> Result<RelayOutcome> {
        if self.stage.is_terminal() {
            return Ok(RelayOutcome::Ignored);
        }
        self.expect_stage(
            Stage::AwaitingBroadcastConfirmation,
            "acknowledge the broadcast",
        )?;
        let confirmation = RelayMessage::parse(RelayKind::BroadcastConfirmation, raw)?;
        self.finish(confirmation.payload);
        Ok(RelayOutcome::Accepted)
    }

    /// Hand out the backend call for the current stage.
    ///
    /// Returns `None` while a request is already outstanding, while waiting on the
    /// operator, after a failure and once the ceremony has ended.
    pub fn poll_request(&mut self) -> Result<Option<BackendRequest>> {
        if self.stage.is_terminal() || self.pending.is_some() {
            return Ok(None);
        }
        if self.stage == Stage::CoordinatorHasTransaction {
            self.transition(Stage::ReviewingTransaction)?;
        }
        let kind = match self.stage.backend_stage() {
            Some(kind) => kind,
            None => return Ok(None),
        };
        self.check_guard(&self.stage)?;

        let request = self.build_request(kind)?;
        if self.stage == Stage::Aggregating {
            self.transition(Stage::Broadcasting)?;
        }
        debug!(stage = %kind, "issuing backend request");
        self.pending = Some(kind);
        Ok(Some(request))
    }

    /// Feed back the outcome of the request handed out by [`Self::poll_request`].
    ///
    /// Answers arriving after the ceremony ended are dropped.
    pub fn complete(&mut self, result: StageResult) -> Result<()> {
        if self.stage.is_terminal() {
            debug!("ignoring backend result for a finished ceremony");
            return Ok(());
        }
        let kind = match self.pending {
            Some(kind) => kind,
            None => return Err(CeremonyError::NothingPending),
        };
        match result {
            StageResult::Pending => Ok(()),
            StageResult::Success(payload) if payload.trim().is_empty() => {
                self.pending = None;
                self.fail(
                    kind,
                    FailureKind::TransportError,
                    format!("device returned an empty {}", kind),
                );
                Ok(())
            }
            StageResult::Success(payload) => {
                self.pending = None;
                self.apply_success(kind, payload)
            }
            StageResult::Rejected(reason) => {
                self.pending = None;
                self.fail(kind, FailureKind::DeviceRejected, reason);
                Ok(())
            }
            StageResult::TransportError(reason) => {
                self.pending = None;
                self.fail(kind, FailureKind::TransportError, reason);
                Ok(())
            }
        }
    }

    /// Go back into the stage that failed. Collected values are untouched.
    pub fn retry(&mut self) -> Result<()> {
        if self.stage.is_terminal() {
            return Ok(());
        }
        let failed = match &self.stage {
            Stage::Failed(failure) => failure.stage,
            other => return Err(CeremonyError::NotFailed(other.clone())),
        };
        info!(stage = %failed, "retrying");
        self.transition(failed.entry_stage())
    }

    /// Abandon the ceremony. Issues no backend calls; a device still waiting on a
    /// human is left to time out on its own.
    pub fn cancel(&mut self) {
        if self.stage.is_terminal() {
            return;
        }
        info!(stage = %self.stage, "ceremony cancelled");
        self.stage = Stage::Cancelled;
        self.session = None;
        self.pending = None;
    }

    /// Run backend requests until the ceremony needs the operator or ends.
    pub async fn drive<B: SigningBackend + ?Sized>(&mut self, backend: &B) -> Result<Stage> {
        while let Some(request) = self.poll_request()? {
            let result = request.execute(backend).await;
            self.complete(result)?;
        }
        Ok(self.stage.clone())
    }

    /// The value the operator should copy to the other machines right now.
    pub fn outgoing_relay(&self) -> Option<RelayMessage> {
        if let Stage::Done { confirmation } = &self.stage {
            return Some(RelayMessage::new(
                RelayKind::BroadcastConfirmation,
                confirmation.clone(),
            ));
        }
        let session = self.session.as_ref()?;
        match session.role() {
            Role::Coordinator => session
                .signing_package()
                .map(|package| RelayMessage::new(RelayKind::Package, package))
                .or_else(|| {
                    session
                        .unsigned_transaction()
                        .map(|tx| RelayMessage::new(RelayKind::Transaction, tx))
                }),
            Role::Participant => session
                .local_signature_share()
                .map(|share| RelayMessage::new(RelayKind::Share, share))
                .or_else(|| {
                    session
                        .local_commitment()
                        .map(|commitment| RelayMessage::new(RelayKind::Commitment, commitment))
                }),
        }
    }

    pub fn status(&self) -> CeremonyStatus {
        let session = self.session.as_ref();
        CeremonyStatus {
            role: self.role(),
            stage: self.stage.clone(),
            pending: self.is_pending(),
            transaction_id: session.and_then(|s| s.transaction_id()).map(str::to_owned),
            collected_commitments: session.and_then(|s| s.commitments()).map(|c| c.len()),
            collected_shares: session.and_then(|s| s.shares()).map(|c| c.len()),
            required_signers: self.config.required_signers,
            outgoing: self.outgoing_relay(),
        }
    }

    fn apply_success(&mut self, kind: StageKind, payload: String) -> Result<()> {
        let session = self.session_mut()?;
        let is_signer = session.is_signer();
        let role = session.role();
        match kind {
            StageKind::Review => {
                info!(transaction_id = %payload, "transaction approved on device");
                session.set_transaction_id(payload);
                match (role, is_signer) {
                    (Role::Coordinator, false) => {
                        self.transition(Stage::CoordinatorCollectingCommitments)?;
                        self.advance_if_complete()
                    }
                    _ => self.transition(Stage::CreatingCommitment),
                }
            }
            StageKind::Commitment => {
                let update = session.set_local_commitment(payload);
                match role {
                    Role::Participant => self.transition(Stage::AwaitingPackage),
                    Role::Coordinator => {
                        self.transition(Stage::CoordinatorCollectingCommitments)?;
                        self.settle_collection(RelayKind::Commitment, update)
                            .map(|_| ())
                    }
                }
            }
            StageKind::Package => {
                session.set_signing_package(payload);
                if is_signer {
                    self.transition(Stage::CreatingSignatureShare)
                } else {
                    self.transition(Stage::CoordinatorCollectingShares)
                }
            }
            StageKind::SignatureShare => {
                let update = session.set_local_signature_share(payload);
                match role {
                    Role::Participant => self.transition(Stage::AwaitingBroadcastConfirmation),
                    Role::Coordinator => {
                        self.transition(Stage::CoordinatorCollectingShares)?;
                        self.settle_collection(RelayKind::Share, update)
                            .map(|_| ())
                    }
                }
            }
            StageKind::Aggregation => {
                self.finish(payload);
                Ok(())
            }
        }
    }

    fn settle_collection(
        &mut self,
        kind: RelayKind,
        update: Option<CollectionUpdate>,
    ) -> Result<RelayOutcome> {
        let update = match update {
            Some(update) => update,
            None => {
                return Err(CeremonyError::InvalidOperation {
                    operation: "collect relayed values",
                    stage: self.stage.clone(),
                })
            }
        };
        if !update.accepted {
            debug!(%kind, collected = update.collected, "duplicate value ignored");
            return Ok(RelayOutcome::Duplicate);
        }
        info!(
            %kind,
            collected = update.collected,
            required = update.required,
            "recorded relayed value"
        );
        self.advance_if_complete()?;
        Ok(RelayOutcome::Accepted)
    }

    /// Leave a collecting stage once its round is complete. Values recorded while
    /// the device is busy only count once the ceremony reaches that stage.
    fn advance_if_complete(&mut self) -> Result<()> {
        let session = match &self.session {
            Some(session) => session,
            None => return Ok(()),
        };
        let (collection, next) = match self.stage {
            Stage::CoordinatorCollectingCommitments => {
                (session.commitments(), Stage::CreatingPackage)
            }
            Stage::CoordinatorCollectingShares => (session.shares(), Stage::Aggregating),
            _ => return Ok(()),
        };
        if collection.is_some_and(|c| c.is_complete()) {
            self.transition(next)?;
        }
        Ok(())
    }

    fn build_request(&self, kind: StageKind) -> Result<BackendRequest> {
        let session = self.session.as_ref().ok_or(CeremonyError::NoSession)?;
        let missing = || CeremonyError::InvalidOperation {
            operation: "build a backend request",
            stage: self.stage.clone(),
        };
        let unsigned_tx = session.unsigned_transaction().ok_or_else(missing)?;
        let request = match kind {
            StageKind::Review => BackendRequest::ReviewTransaction {
                unsigned_tx: unsigned_tx.to_owned(),
            },
            StageKind::Commitment => BackendRequest::CreateSigningCommitment {
                transaction_id: session.transaction_id().ok_or_else(missing)?.to_owned(),
            },
            StageKind::Package => BackendRequest::CreateSigningPackage {
                unsigned_tx: unsigned_tx.to_owned(),
                commitments: session.commitments().ok_or_else(missing)?.values().to_vec(),
            },
            StageKind::SignatureShare => BackendRequest::CreateSignatureShare {
                signing_package: session.signing_package().ok_or_else(missing)?.to_owned(),
                unsigned_tx: unsigned_tx.to_owned(),
            },
            StageKind::Aggregation => BackendRequest::AggregateAndBroadcast {
                signing_package: session.signing_package().ok_or_else(missing)?.to_owned(),
                signature_shares: session.shares().ok_or_else(missing)?.values().to_vec(),
            },
        };
        Ok(request)
    }

    /// Refuse to enter package creation or aggregation with an incomplete round.
    ///
    /// Every public path checks completeness first, so an error here is a bug.
    fn check_guard(&self, next: &Stage) -> Result<()> {
        let (kind, collection) = match next {
            Stage::CreatingPackage => (
                StageKind::Package,
                self.session.as_ref().and_then(|s| s.commitments()),
            ),
            Stage::Aggregating | Stage::Broadcasting => (
                StageKind::Aggregation,
                self.session.as_ref().and_then(|s| s.shares()),
            ),
            _ => return Ok(()),
        };
        match collection {
            Some(collection) if collection.is_complete() => Ok(()),
            collection => {
                let collected = collection.map_or(0, |c| c.len());
                debug_assert!(false, "{} entered with {} values", kind, collected);
                Err(CeremonyError::IncompleteCeremony {
                    stage: kind,
                    collected,
                    required: self.config.required_signers,
                })
            }
        }
    }

    fn transition(&mut self, next: Stage) -> Result<()> {
        self.check_guard(&next)?;
        info!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
        Ok(())
    }

    fn fail(&mut self, stage: StageKind, kind: FailureKind, reason: String) {
        warn!(%stage, ?kind, %reason, "stage failed");
        self.stage = Stage::Failed(Failure {
            stage,
            kind,
            reason,
        });
    }

    fn finish(&mut self, confirmation: String) {
        info!(%confirmation, "ceremony complete");
        self.stage = Stage::Done { confirmation };
        self.session = None;
        self.pending = None;
    }

    fn expect_stage(&self, expected: Stage, operation: &'static str) -> Result<()> {
        if self.session.is_none() {
            return Err(CeremonyError::NoSession);
        }
        if self.stage != expected {
            return Err(CeremonyError::InvalidOperation {
                operation,
                stage: self.stage.clone(),
            });
        }
        Ok(())
    }

    /// Coordinator only: is the round that `kind` belongs to still open?
    fn expect_round(&self, kind: RelayKind, operation: &'static str) -> Result<()> {
        if self.session.is_none() {
            return Err(CeremonyError::NoSession);
        }
        let open = self.role() == Some(Role::Coordinator)
            && match (kind, &self.stage) {
                (
                    RelayKind::Commitment,
                    Stage::CoordinatorHasTransaction
                    | Stage::ReviewingTransaction
                    | Stage::CreatingCommitment
                    | Stage::CoordinatorCollectingCommitments,
                ) => true,
                (
                    RelayKind::Share,
                    Stage::CreatingSignatureShare | Stage::CoordinatorCollectingShares,
                ) => true,
                (RelayKind::Commitment, Stage::Failed(failure)) => {
                    matches!(failure.stage, StageKind::Review | StageKind::Commitment)
                }
                (RelayKind::Share, Stage::Failed(failure)) => {
                    failure.stage == StageKind::SignatureShare
                }
                _ => false,
            };
        if !open {
            return Err(CeremonyError::InvalidOperation {
                operation,
                stage: self.stage.clone(),
            });
        }
        Ok(())
    }

    fn session_mut(&mut self) -> Result<&mut CeremonySession> {
        self.session.as_mut().ok_or(CeremonyError::NoSession)
    }
}
