//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Binary entrypoint for the R-VEN participant daemon."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prometheus::Registry;
use r_ven_common::config::{DecisionPolicy, VenConfig};
use r_ven_common::logging::init_tracing;
use r_ven_core::{
    render_metrics, EventReconciler, LifecycleSettings, LifecycleSummary, ReportSet,
    StaticDecision, TokioScheduler, VenLifecycle, VenMetrics,
};
use r_ven_msg::{OptType, Transport};
use r_ven_net::HttpTransport;
#[cfg(feature = "simulator")]
use r_ven_testharness::SimulatedVtn;
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    version = concat!("R-VEN ", env!("CARGO_PKG_VERSION")),
    about = "R-VEN demand-response participant",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Override the idle delay between lifecycle steps"
    )]
    idle_delay_secs: Option<u64>,

    #[arg(long, help = "Print Prometheus metrics when the lifecycle ends")]
    dump_metrics: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run one lifecycle against the configured coordinator")]
    Run,
    #[cfg(feature = "simulator")]
    #[command(about = "Run one lifecycle against the in-process simulated coordinator")]
    Simulate,
    #[command(about = "Load, validate and print the effective configuration")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/ven.toml"));
    candidates.push(PathBuf::from("configs/ven.example.toml"));

    let load_started = Instant::now();
    let loaded = VenConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(secs) = cli.idle_delay_secs {
        config.lifecycle.idle_delay = Duration::from_secs(secs);
    }

    let command = cli.command.unwrap_or(Commands::Run);
    if let Commands::CheckConfig = command {
        let rendered =
            toml::to_string_pretty(&config).context("failed to render configuration")?;
        println!("# source: {}\n{}", loaded.source.display(), rendered);
        return Ok(());
    }

    init_tracing("r-vend", &config.logging)?;
    info!(
        config_path = %loaded.source.display(),
        load_ms = load_started.elapsed().as_millis() as u64,
        "configuration loaded"
    );

    let transport = coordinator(&command, &config)?;

    let registry = Registry::new();
    let metrics = VenMetrics::register(&registry)?;
    let summary = run_lifecycle(&config, transport, metrics).await;

    if cli.dump_metrics {
        print!("{}", render_metrics(&registry)?);
    }
    if let Some(summary) = summary? {
        render_summary(&summary);
    }
    Ok(())
}

fn coordinator(command: &Commands, config: &VenConfig) -> Result<Arc<dyn Transport>> {
    #[cfg(feature = "simulator")]
    if let Commands::Simulate = command {
        info!("using in-process simulated coordinator");
        return Ok(Arc::new(SimulatedVtn::default()));
    }
    #[cfg(not(feature = "simulator"))]
    let _ = command;

    let url = config.vtn_url()?;
    info!(vtn_url = %url, "using http coordinator");
    Ok(Arc::new(HttpTransport::new(url, config.vtn.request_timeout)?))
}

async fn run_lifecycle(
    config: &VenConfig,
    transport: Arc<dyn Transport>,
    metrics: VenMetrics,
) -> Result<Option<LifecycleSummary>> {
    let decision = match config.decisions.default_opt {
        DecisionPolicy::OptIn => OptType::OptIn,
        DecisionPolicy::OptOut => OptType::OptOut,
    };
    let reconciler =
        EventReconciler::new(Arc::new(StaticDecision(decision))).with_metrics(metrics.clone());
    let mut lifecycle = VenLifecycle::new(
        LifecycleSettings::from_config(config),
        transport,
        Arc::new(TokioScheduler),
        reconciler,
        ReportSet::from_config(&config.reports),
    )
    .with_metrics(metrics);

    tokio::select! {
        outcome = lifecycle.run() => {
            let summary = outcome.context("participant lifecycle failed")?;
            Ok(Some(summary))
        }
        interrupted = signal::ctrl_c() => {
            interrupted?;
            warn!("ctrl-c received; abandoning lifecycle");
            Ok(None)
        }
    }
}

fn render_summary(summary: &LifecycleSummary) {
    let registration = summary
        .registration
        .as_ref()
        .and_then(|r| r.registration_id.as_deref())
        .unwrap_or("none");
    println!(
        "Final state: {}\nRegistration: {}\nEvents received: {}\nResponses sent: {}\nReports registered: {}\nReadings sent: {}",
        summary.final_state,
        registration,
        summary.events_received,
        summary.responses_sent,
        summary.reports_registered,
        summary.readings_sent
    );
}
