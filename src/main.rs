//! edge-ingress
//!
//! # Architecture Overview
//!
//! ```text
//!   model file / orchestrator          template file
//!            │                               │
//!            ▼                               ▼
//!   ┌─────────────────┐  render   ┌─────────────────────┐
//!   │ EdgeController  │◀──────────│ TemplateSlot        │◀── TemplateReloader ◀── FileWatcher
//!   │  (update lock)  │           └─────────────────────┘
//!   └───────┬─────────┘
//!           │ changed?                    ┌──────────────────────┐
//!           ├── ChangeGate ── persist ──▶ │ /etc/Caddyfile       │
//!           │                             └──────────────────────┘
//!           └── SIGUSR1 ───────────────▶  supervised edge process ◀── ProcessSupervisor
//!                                                   ▲
//!   tcp_passthrough → PassthroughTable → SNI listener (L4)      HealthMonitor (GET /healthz)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use edge_ingress::config::loader::default_settings;
use edge_ingress::config::{load_settings, ControllerSettings, FileWatcher};
use edge_ingress::controller::{EdgeController, ModelFeed};
use edge_ingress::error::ControllerError;
use edge_ingress::health::{HealthMonitor, HealthProbe};
use edge_ingress::lifecycle::{wait_for_termination, Shutdown};
use edge_ingress::observability::{logging, metrics};
use edge_ingress::passthrough::{PassthroughProxy, PassthroughTable};
use edge_ingress::process::{ProcessSpec, ProcessSupervisor};
use edge_ingress::template::{CompiledTemplate, TemplateReloader, TemplateSlot};

/// Grace period between SIGTERM and SIGKILL for the edge process.
const STOP_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "edge-ingress")]
#[command(about = "Ingress controller backend supervising a Caddy edge server", long_about = None)]
struct Cli {
    /// Controller settings (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Desired-state model (JSON), re-applied whenever it changes.
    #[arg(short, long)]
    model: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => load_settings(path),
        None => default_settings(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            logging::init_logging("info");
            tracing::error!(error = %e, "Invalid settings");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&settings.observability.log_level);

    match run(cli, settings).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Controller failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, settings: ControllerSettings) -> Result<(), ControllerError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-ingress starting");
    tracing::info!(
        template = %settings.paths.template,
        config = %settings.paths.config,
        binary = %settings.paths.binary,
        "Configuration loaded"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let template_path = PathBuf::from(&settings.paths.template);
    let slot = TemplateSlot::new(CompiledTemplate::compile(&template_path)?);

    let supervisor = ProcessSupervisor::start(ProcessSpec::edge(&settings.paths, &settings.process))?;

    let table = PassthroughTable::new();
    let controller = Arc::new(EdgeController::new(
        &settings,
        slot.clone(),
        supervisor.clone(),
        table.clone(),
    ));
    let class = controller.resolve_ingress_class(settings.ingress_class.as_deref());
    tracing::info!(ingress_class = %class, "Controller ready");

    let shutdown = Shutdown::new();
    let debounce = Duration::from_millis(settings.watcher.debounce_ms);

    let (template_watcher, template_changes) = FileWatcher::new(&template_path, debounce);
    let _template_guard = template_watcher.run()?;
    tokio::spawn(TemplateReloader::new(slot, &template_path).run(template_changes, shutdown.subscribe()));

    let _model_guard = match &cli.model {
        Some(path) => {
            let feed = ModelFeed::new(path);
            match feed.apply(&controller).await {
                Ok(outcome) => tracing::info!(path = %path.display(), outcome = ?outcome, "Initial model applied"),
                Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to apply initial model"),
            }

            let (model_watcher, model_changes) = FileWatcher::new(path, debounce);
            let guard = model_watcher.run()?;
            tokio::spawn(feed.run(Arc::clone(&controller), model_changes, shutdown.subscribe()));
            Some(guard)
        }
        None => None,
    };

    if settings.passthrough.enabled {
        let proxy = PassthroughProxy::bind(&settings.passthrough, table)
            .await
            .map_err(ControllerError::Listener)?;
        tokio::spawn(proxy.run(shutdown.subscribe()));
    }

    if settings.health.enabled {
        let monitor = HealthMonitor::new(
            HealthProbe::new(&settings.health),
            Duration::from_secs(settings.health.interval_secs),
        );
        tokio::spawn(monitor.run(shutdown.subscribe()));
    }

    let result = tokio::select! {
        signal = wait_for_termination() => signal.map(|_| ()).map_err(ControllerError::SignalHandlers),
        fatal = supervisor.fatal() => Err(ControllerError::Supervision(fatal)),
    };

    shutdown.trigger();
    supervisor.stop(STOP_GRACE).await;
    result
}
