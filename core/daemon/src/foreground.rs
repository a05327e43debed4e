//! Foreground tracker.
//!
//! An active subscription to continuous position updates while the app is in
//! the foreground: a worker thread polls the location source on a fixed
//! cadence and pushes each delivery through the record-and-ship path.
//! Stopping the subscription joins the worker, so no fix is delivered after
//! `stop` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use fieldtrace_protocol::TrackingType;

use crate::record::{record_and_ship, TrackerContext};
use crate::source::LocationSource;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handle to a live foreground subscription.
pub struct ForegroundSubscription {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ForegroundSubscription {
    pub fn is_live(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
            && self
                .handle
                .as_ref()
                .map(|handle| !handle.is_finished())
                .unwrap_or(false)
    }

    /// Cancels the subscription and waits for the worker to exit. No further
    /// fixes are delivered after this returns.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Foreground tracker worker panicked");
            }
        }
        info!("Foreground tracking stopped");
    }
}

impl Drop for ForegroundSubscription {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Starts the foreground subscription. The first delivery happens
/// immediately; subsequent deliveries follow the configured interval.
pub fn start(
    interval: Duration,
    mut source: Box<dyn LocationSource>,
    ctx: TrackerContext,
) -> ForegroundSubscription {
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);

    let handle = thread::spawn(move || {
        info!("Foreground tracking started");
        while !worker_stop.load(Ordering::SeqCst) {
            match source.poll() {
                Ok(position) => record_and_ship(&ctx, TrackingType::Foreground, position),
                Err(err) => warn!(error = %err, "Foreground position poll failed"),
            }
            sleep_interruptible(&worker_stop, interval);
        }
    });

    ForegroundSubscription {
        stop,
        handle: Some(handle),
    }
}

fn sleep_interruptible(stop: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep(STOP_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::test_support::{context, logged_in, ScriptedShipper};
    use crate::source::Position;
    use tempfile::TempDir;

    struct StaticSource {
        latitude: f64,
        longitude: f64,
    }

    impl LocationSource for StaticSource {
        fn poll(&mut self) -> Result<Position, String> {
            Ok(Position {
                latitude: self.latitude,
                longitude: self.longitude,
                timestamp: None,
            })
        }
    }

    struct FailingSource;

    impl LocationSource for FailingSource {
        fn poll(&mut self) -> Result<Position, String> {
            Err("location hardware unavailable".to_string())
        }
    }

    fn wait_until(mut check: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("Timed out waiting for tracker condition");
    }

    #[test]
    fn delivers_fixes_until_stopped() {
        let dir = TempDir::new().expect("temp dir");
        let shipper = Arc::new(ScriptedShipper::accepting());
        let ctx = context(&dir, shipper.clone());
        logged_in(&ctx);

        let subscription = start(
            Duration::from_millis(20),
            Box::new(StaticSource {
                latitude: 37.422,
                longitude: -122.084,
            }),
            ctx.clone(),
        );

        wait_until(|| shipper.ship_count() >= 2);
        assert!(subscription.is_live());
        subscription.stop();

        let count_after_stop = shipper.ship_count();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(shipper.ship_count(), count_after_stop);

        let rows = ctx.ledger.select_all().expect("select");
        assert!(rows.iter().all(|fix| fix.latitude == 37.422));
    }

    #[test]
    fn source_errors_do_not_kill_the_subscription() {
        let dir = TempDir::new().expect("temp dir");
        let shipper = Arc::new(ScriptedShipper::accepting());
        let ctx = context(&dir, shipper.clone());
        logged_in(&ctx);

        let subscription = start(Duration::from_millis(10), Box::new(FailingSource), ctx);
        thread::sleep(Duration::from_millis(60));
        assert!(subscription.is_live());
        subscription.stop();
        assert_eq!(shipper.ship_count(), 0);
    }

    #[test]
    fn incomplete_session_ticks_drop_instead_of_shipping() {
        let dir = TempDir::new().expect("temp dir");
        let shipper = Arc::new(ScriptedShipper::accepting());
        let ctx = context(&dir, shipper.clone());
        // No session saved.

        let subscription = start(
            Duration::from_millis(10),
            Box::new(StaticSource {
                latitude: 1.0,
                longitude: 2.0,
            }),
            ctx.clone(),
        );

        wait_until(|| ctx.counters.dropped() >= 2);
        subscription.stop();
        assert_eq!(shipper.ship_count(), 0);
    }
}
