//! fieldtrace-daemon entrypoint.
//!
//! Boots the tracking agent: logging, storage, config, ledger, remote
//! client, then hands control to the lifecycle controller and re-evaluates
//! readiness on a periodic tick (the daemon's equivalent of the app
//! regaining focus).

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fieldtrace_core::permissions::PlatformGate;
use fieldtrace_core::remote::RemoteClient;
use fieldtrace_core::session::SessionStore;
use fieldtrace_core::storage::StorageConfig;
use fieldtrace_core::{device, AgentConfig};
use fieldtrace_daemon::background::TaskRunner;
use fieldtrace_daemon::ledger::Ledger;
use fieldtrace_daemon::lifecycle::LifecycleController;
use fieldtrace_daemon::record::{SupersededSignal, TrackerContext, TrackerCounters};
use fieldtrace_daemon::source::PositionFile;

const REFRESH_INTERVAL_SECS: u64 = 15;

fn main() {
    init_logging();

    let storage = StorageConfig::default();
    if let Err(err) = fs_err::create_dir_all(storage.root()) {
        error!(error = %err, "Failed to create storage root");
        std::process::exit(1);
    }

    let config = AgentConfig::load(&storage);
    info!(
        base_url = %config.base_url,
        foreground_interval_secs = config.foreground_interval_secs,
        background_interval_secs = config.background_interval_secs,
        "Agent config loaded"
    );

    let ledger = match Ledger::new(storage.ledger_db()) {
        Ok(ledger) => ledger,
        Err(err) => {
            error!(error = %err, "Failed to initialize position ledger");
            std::process::exit(1);
        }
    };

    let ctx = TrackerContext {
        session_store: SessionStore::new(storage.clone()),
        ledger: Arc::new(ledger),
        shipper: Arc::new(RemoteClient::new(&config)),
        device: device::collect(),
        counters: Arc::new(TrackerCounters::default()),
        superseded: Arc::new(SupersededSignal::default()),
        distance_filter_m: config.distance_filter_m,
        last_recorded: Arc::new(std::sync::Mutex::new(None)),
    };

    let position_file = storage.position_file();
    let make_source = Box::new(move || {
        Box::new(PositionFile::new(position_file.clone()))
            as Box<dyn fieldtrace_daemon::source::LocationSource>
    });

    let mut controller = LifecycleController::new(
        &config,
        Box::new(PlatformGate::new(storage)),
        Arc::new(TaskRunner::new()),
        ctx,
        make_source,
    );

    info!("fieldtrace daemon started");
    controller.initialize();

    loop {
        thread::sleep(Duration::from_secs(REFRESH_INTERVAL_SECS));
        controller.refresh();
    }
}

fn init_logging() {
    let debug_enabled = env::var("FIELDTRACE_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
