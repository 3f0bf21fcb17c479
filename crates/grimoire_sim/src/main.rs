// SPDX-License-Identifier: MIT OR Apache-2.0
//! Grimoire cast simulator
//!
//! Replays a session file: a predicting client casts on its own timeline,
//! requests cross a latent link to an authoritative server, and verdicts come
//! back to reconcile the client's mana. The run is summarized as JSON.

mod play;
mod session;
mod transport;

use clap::Parser;
use play::Simulation;
use session::{Session, SessionError};
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use transport::LinkError;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "grimoire_sim", version, about = "Replay a spell casting session")]
struct Cli {
    /// Session file (RON)
    session: PathBuf,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    report: Option<PathBuf>,

    /// Feed frames of this many milliseconds through the fixed-step loop
    /// instead of stepping straight to the end
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    frame_ms: Option<u64>,

    /// Override the interpreter RNG seed
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Error)]
enum SimError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("Failed to encode report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

fn run(cli: &Cli) -> Result<(), SimError> {
    let mut session = Session::load(&cli.session)?;
    if let Some(seed) = cli.seed {
        session.config.rng_seed = Some(seed);
    }

    let mut simulation = Simulation::new(&session)?;
    let duration = f64::from(session.duration);
    match cli.frame_ms {
        Some(ms) => {
            let frame = ms as f64 / 1000.0;
            while simulation.elapsed() < duration {
                simulation.update(frame)?;
            }
        }
        None => simulation.run_for(duration)?,
    }

    let report = simulation.report();
    tracing::info!(
        "Session '{}' finished after {} ticks: client mana {:.1}, server mana {:.1}",
        report.session,
        report.ticks,
        report.client_mana,
        report.server_mana
    );

    let json = serde_json::to_string_pretty(&report)?;
    match &cli.report {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("grimoire_sim=info,grimoire_caster=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting Grimoire sim v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&cli) {
        tracing::error!("Simulation failed: {e}");
        std::process::exit(1);
    }
}
