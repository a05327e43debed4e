//! File logging for the CLI.
//!
//! The CLI prints results to stdout; diagnostics go to a daily-rolled log
//! file under the storage root so a failed login on a device in the field
//! can be investigated after the fact.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use fieldtrace_core::StorageConfig;

/// Initializes file logging. The returned guard must stay alive for the
/// duration of the process or buffered log lines are lost.
pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let log_dir = storage.log_dir();
    if fs_err::create_dir_all(&log_dir).is_err() {
        return None;
    }

    let appender = tracing_appender::rolling::daily(log_dir, "fieldtrace.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}
