mod cli;
mod config;

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command, ServerKind};
use config::Config;
use proksi_anonymity::Classifier;
use proksi_geolocation::Geolocator;
use proksi_mitm::{MitmServer, RcgenCa};
use proksi_registry::NotifyRegistry;
use proksi_scorer::BatchHttpsScorer;
use proksi_session::SessionManager;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let cli = Cli::parse();

    init_tracing();

    let exit_code = match cli.command {
        Command::Version => {
            println!("proksi {VERSION}");
            0
        }
        Command::Server {
            kind: ServerKind::Mitm { bind, port, config },
        } => match run_mitm(bind, port, config) {
            Ok(()) => 0,
            Err(e) => {
                error!(error = %e, "fatal error, exiting");
                1
            }
        },
    };

    std::process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Harvester(#[from] proksi_harvest::HarvesterError),
    #[error(transparent)]
    Scorer(#[from] proksi_scorer::ScorerError),
    #[error(transparent)]
    Ca(#[from] proksi_mitm::CaError),
    #[error(transparent)]
    Mitm(#[from] proksi_mitm::MitmError),
    #[error("failed to build tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Wires every component together and blocks forever serving the
/// always-MITM front door — fatal only on configuration or listener-bind
/// failure, matching spec §7's propagation policy (transient per-endpoint
/// errors never kill a loop).
fn run_mitm(bind: std::net::IpAddr, port: u16, config_path: PathBuf) -> Result<(), RunError> {
    let runtime = tokio::runtime::Runtime::new().map_err(RunError::Runtime)?;
    runtime.block_on(run_mitm_async(bind, port, config_path))
}

async fn run_mitm_async(
    bind: std::net::IpAddr,
    port: u16,
    config_path: PathBuf,
) -> Result<(), RunError> {
    let config = Config::load(&config_path)?;

    let registry = Arc::new(NotifyRegistry::new());
    let (dedup_tx, dedup_rx) = proksi_dedup::channel();

    let harvester_configs = config.load_harvesters()?;
    let mut harvesters = Vec::with_capacity(harvester_configs.len());
    for harvester_config in harvester_configs {
        let harvester = proksi_harvest::Harvester::new(harvester_config, dedup_tx.clone())?;
        harvesters.push(Arc::new(harvester));
    }
    info!(count = harvesters.len(), "loaded harvester configs");

    let scorer = BatchHttpsScorer::new(config.scorer_hosts.clone())?;
    let classifier = Classifier::new(config.anonymity_echo_url.clone());
    let geolocator = Geolocator::with_rate_limit(
        config.geolocation_url.clone(),
        NonZeroU32::new(config.geolocation_rate_per_minute).unwrap_or(NonZeroU32::new(40).unwrap()),
    );

    let scheduler = Arc::new(proksi_scheduler::Scheduler::new(
        Arc::clone(&registry),
        scorer,
        classifier,
        geolocator,
        harvesters,
        config.scheduler.to_scheduler_config(),
    ));
    tokio::spawn(scheduler.run(dedup_rx));

    let sessions = SessionManager::attach(&registry, proksi_balance::Strategy::WeightedRoundRobin);
    let ca = Arc::new(RcgenCa::generate()?);
    let mitm = Arc::new(MitmServer::new(ca, sessions));

    let bind_addr = SocketAddr::new(bind, port);
    info!(%bind_addr, "starting proksi mitm server");
    mitm.serve(bind_addr).await?;
    Ok(())
}
