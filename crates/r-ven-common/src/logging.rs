//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the participant runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "R_VEN_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Writer guards for the daemon's lifetime: (stdout, rolling file).
static GUARDS: OnceCell<(WorkerGuard, WorkerGuard)> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console rendering of participant logs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Install the participant subscriber: console output in `config.format`
/// plus `<directory>/<service>.log.<date>` in JSON.
pub fn init_tracing(service: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!("unable to create log directory {}", config.directory.display())
    })?;

    let (console, console_guard) = tracing_appender::non_blocking(std::io::stdout());
    let (file, file_guard) =
        tracing_appender::non_blocking(rolling::daily(&config.directory, format!("{service}.log")));
    let _ = GUARDS.set((console_guard, file_guard));

    let layers = vec![console_layer(config.format, console), json_layer(file)];
    tracing_subscriber::registry()
        .with(layers)
        .with(participant_filter())
        .try_init()
        .ok();

    info!(service, log_dir = %config.directory.display(), format = ?config.format, "tracing initialised");
    Ok(())
}

fn console_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    let layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.boxed(),
    }
}

fn json_layer(writer: NonBlocking) -> BoxedLayer {
    fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(writer)
        .boxed()
}

/// `R_VEN_LOG`, then `RUST_LOG`, then `info`.
fn participant_filter() -> EnvFilter {
    let directive = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .unwrap_or_else(|_| DEFAULT_DIRECTIVE.to_owned());
    EnvFilter::try_new(&directive).unwrap_or_else(|err| {
        eprintln!("ignoring log directive '{directive}' ({err}); using {DEFAULT_DIRECTIVE}");
        EnvFilter::new(DEFAULT_DIRECTIVE)
    })
}
