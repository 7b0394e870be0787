use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use ticket_market::{config_file, Simulation};
use ticket_market_proto::{SimulationConfig, TerminationMode};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
/// Simulate vendors and customers trading through a bounded ticket pool.
struct Opts {
    /// Load a previously saved configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save the effective configuration to this file before running
    #[arg(long, value_name = "PATH")]
    save: Option<PathBuf>,

    /// Total number of tickets the vendors release between them
    #[arg(long)]
    total_tickets: Option<i64>,

    /// Maximum number of tickets the pool holds at once
    #[arg(long)]
    max_capacity: Option<i64>,

    /// Seconds each vendor waits between releases
    #[arg(long)]
    release_rate: Option<f64>,

    /// Seconds each customer waits between purchases
    #[arg(long)]
    retrieval_rate: Option<f64>,

    /// Number of vendor tasks
    #[arg(long)]
    vendors: Option<i64>,

    /// Number of customer tasks
    #[arg(long)]
    customers: Option<i64>,

    /// When customers stop: after `totalTickets` purchase attempts (legacy) or once the pool
    /// can never supply another ticket (strict)
    #[arg(long, value_enum, value_name = "MODE")]
    termination_mode: Option<ModeArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    Legacy,
    Strict,
}

impl From<ModeArg> for TerminationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Legacy => TerminationMode::Legacy,
            ModeArg::Strict => TerminationMode::Strict,
        }
    }
}

impl Opts {
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(v) = self.total_tickets {
            config.total_tickets = v;
        }
        if let Some(v) = self.max_capacity {
            config.max_ticket_capacity = v;
        }
        if let Some(v) = self.release_rate {
            config.ticket_release_rate = v;
        }
        if let Some(v) = self.retrieval_rate {
            config.customer_retrieval_rate = v;
        }
        if let Some(v) = self.vendors {
            config.vendor_count = v;
        }
        if let Some(v) = self.customers {
            config.customer_count = v;
        }
        if let Some(mode) = self.termination_mode {
            config.termination_mode = mode.into();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Opts::parse();

    let mut config = match &opts.config {
        Some(path) => config_file::load(path).await?,
        None => SimulationConfig::default(),
    };
    opts.apply(&mut config);

    let simulation = Simulation::new(config)?;
    info!("configuration successful: {:?}", simulation.config());

    if let Some(path) = &opts.save {
        config_file::save(path, simulation.config()).await?;
    }

    let cancel = simulation.cancellation_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received, cancelling all tasks");
                cancel.cancel();
            }
            Err(e) => error!("failed to listen for ctrl_c: {}", e),
        }
    });

    let report = simulation.run().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
