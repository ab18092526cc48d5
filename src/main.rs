use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use ceremony::{
    CeremonyConfig, CeremonyController, CeremonyError, RelayMessage, RelayOutcome,
    RoleSelection, SimulatedDevice, Stage,
};

/// Run one side of a threshold signing ceremony in the terminal.
///
/// Values to hand to the other machines are printed; values received from them are
/// pasted back in. Type `cancel` at any prompt to abandon the ceremony.
#[derive(Parser, Debug)]
#[command(name = "ceremony", version)]
struct Cli {
    /// JSON file with ceremony parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Commitments and shares required before the coordinator proceeds
    #[arg(long)]
    required_signers: Option<usize>,

    /// Coordinator only aggregates and does not sign with its own device
    #[arg(long)]
    aggregator_only: bool,

    /// Name of the simulated signing device
    #[arg(long, default_value = "local-device")]
    device: String,

    #[command(subcommand)]
    role: RoleCommand,
}

#[derive(Subcommand, Debug)]
enum RoleCommand {
    /// Coordinate signing of an unsigned transaction
    Coordinate { transaction: String },
    /// Take part in a ceremony run by someone else
    Participate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let device = SimulatedDevice::new(cli.device.clone());
    let mut controller = CeremonyController::new(config)?;

    let selection = match cli.role {
        RoleCommand::Coordinate { transaction } => RoleSelection::Coordinator {
            unsigned_transaction: transaction,
        },
        RoleCommand::Participate => RoleSelection::Participant,
    };
    controller.select_role(selection)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut announced = Announced::default();
    loop {
        let stage = controller.drive(&device).await?;
        for line in announced.update(&controller) {
            println!("{}", line);
        }

        let prompt = match &stage {
            Stage::Done { confirmation } => {
                println!("ceremony complete: {}", confirmation);
                return Ok(());
            }
            Stage::Cancelled => {
                println!("ceremony cancelled");
                return Ok(());
            }
            Stage::Failed(failure) => format!("{}, retry? [y/N]", CeremonyError::from(failure)),
            Stage::ParticipantAwaitingTransaction => "paste the unsigned transaction".to_string(),
            Stage::AwaitingPackage => "paste the signing package".to_string(),
            Stage::AwaitingBroadcastConfirmation => "paste the broadcast confirmation".to_string(),
            Stage::CoordinatorCollectingCommitments => {
                let status = controller.status();
                format!(
                    "paste a participant commitment ({}/{})",
                    status.collected_commitments.unwrap_or_default(),
                    status.required_signers
                )
            }
            Stage::CoordinatorCollectingShares => {
                let status = controller.status();
                format!(
                    "paste a participant signature share ({}/{})",
                    status.collected_shares.unwrap_or_default(),
                    status.required_signers
                )
            }
            other => anyhow::bail!("ceremony stalled while {}", other),
        };

        println!("{}:", prompt);
        let line = lines
            .next_line()
            .await
            .context("reading operator input")?
            .unwrap_or_else(|| "cancel".to_string());
        if line.trim() == "cancel" {
            controller.cancel();
            continue;
        }

        let outcome = match &stage {
            Stage::Failed(failure) => {
                if line.trim().eq_ignore_ascii_case("y") {
                    controller.retry()?;
                    continue;
                }
                controller.cancel();
                return Err(CeremonyError::from(failure).into());
            }
            Stage::ParticipantAwaitingTransaction => controller.submit_transaction(&line),
            Stage::AwaitingPackage => controller.submit_signing_package(&line),
            Stage::AwaitingBroadcastConfirmation => controller.acknowledge_broadcast(&line),
            Stage::CoordinatorCollectingCommitments => {
                controller.record_participant_commitment(&line)
            }
            Stage::CoordinatorCollectingShares => controller.record_participant_share(&line),
            _ => continue,
        };
        match outcome {
            Ok(RelayOutcome::Duplicate) => println!("already recorded"),
            Ok(_) => {}
            Err(
                err @ (CeremonyError::MalformedRelayInput { .. } | CeremonyError::RoundFull { .. }),
            ) => warn!("{}", err),
            Err(err) => return Err(err.into()),
        }
    }
}

/// What the operator has already been shown, so each value is printed once.
#[derive(Default)]
struct Announced {
    transaction_id: Option<String>,
    relay: Option<RelayMessage>,
}

impl Announced {
    /// Lines to print for anything that changed since the last prompt.
    fn update(&mut self, controller: &CeremonyController) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(id) = controller.session().and_then(|s| s.transaction_id()) {
            if self.transaction_id.as_deref() != Some(id) {
                lines.push(format!(
                    "transaction id: {} (confirm it matches on every machine)",
                    id
                ));
                self.transaction_id = Some(id.to_owned());
            }
        }
        if let Some(outgoing) = controller.outgoing_relay() {
            if self.relay.as_ref() != Some(&outgoing) {
                lines.push(format!("relay this {}:\n{}", outgoing.kind, outgoing.payload));
                self.relay = Some(outgoing);
            }
        }
        lines
    }
}

fn load_config(cli: &Cli) -> Result<CeremonyConfig> {
    let mut config = match &cli.config {
        Some(path) => CeremonyConfig::load(path)?,
        None => CeremonyConfig::default(),
    };
    if let Some(required_signers) = cli.required_signers {
        config.required_signers = required_signers;
    }
    if cli.aggregator_only {
        config.coordinator_is_signer = false;
    }
    config.validate()?;
    Ok(config)
}
