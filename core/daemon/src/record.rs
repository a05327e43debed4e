//! The single record-and-ship path.
//!
//! Both trackers funnel every observed position through `record_and_ship`:
//! re-read the persisted identity, build an immutable fix, append it to the
//! local ledger, ship it to the remote store. Fire-and-forget: a failed ship
//! is logged and dropped, the next delivery is attempted independently, and
//! nothing is queued for retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, warn};

use fieldtrace_core::remote::FixShipper;
use fieldtrace_core::session::SessionStore;
use fieldtrace_protocol::{DeviceInfo, LocationFix, TrackingType};

use crate::ledger::Ledger;
use crate::source::Position;

/// Observable tracker counters, used by the status surface and by tests of
/// the incomplete-session invariant.
#[derive(Debug, Default)]
pub struct TrackerCounters {
    shipped: AtomicU64,
    dropped: AtomicU64,
}

impl TrackerCounters {
    pub fn record_shipped(&self) {
        self.shipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn shipped(&self) -> u64 {
        self.shipped.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Pending duplicate-session signal, tagged with the auth token it was
/// raised under. A ship still in flight during teardown may report the old
/// session superseded after logout already ran; the tag keeps that straggler
/// from forcing a logout of the next session.
#[derive(Debug, Default)]
pub struct SupersededSignal {
    token: Mutex<Option<String>>,
}

impl SupersededSignal {
    pub fn raise(&self, auth_token: &str) {
        *self.token.lock().expect("superseded signal lock") = Some(auth_token.to_string());
    }

    /// Takes the pending signal. Returns true only when it was raised under
    /// the given token; a signal for any other (dead) session is discarded.
    pub fn consume_for(&self, auth_token: &str) -> bool {
        let mut token = self.token.lock().expect("superseded signal lock");
        matches!(token.take(), Some(raised) if raised == auth_token)
    }

    pub fn clear(&self) {
        self.token.lock().expect("superseded signal lock").take();
    }
}

/// Everything a tracker needs to turn a raw position into a recorded,
/// shipped fix. Cheap to clone; trackers on different threads share the
/// underlying stores.
#[derive(Clone)]
pub struct TrackerContext {
    pub session_store: SessionStore,
    pub ledger: Arc<Ledger>,
    pub shipper: Arc<dyn FixShipper>,
    pub device: DeviceInfo,
    pub counters: Arc<TrackerCounters>,
    /// Raised by any ship call that comes back `duplicate_session`; the
    /// lifecycle controller consumes it exactly once.
    pub superseded: Arc<SupersededSignal>,
    /// Minimum movement in meters before a fix is delivered. 0 disables the
    /// filter; deliveries are then time-based only.
    pub distance_filter_m: f64,
    /// Coordinates of the last recorded fix, shared by both trackers.
    pub last_recorded: Arc<Mutex<Option<(f64, f64)>>>,
}

/// Records and ships one observed position.
///
/// The identity is re-read from persistent storage on every call — never
/// from memory — so an invocation in a restarted process still attributes
/// fixes correctly. An incomplete identity drops the fix before any network
/// or ledger side effect.
pub fn record_and_ship(ctx: &TrackerContext, tracking_type: TrackingType, position: Position) {
    let session = match ctx.session_store.load() {
        Some(session) => session,
        None => {
            ctx.counters.record_dropped();
            debug!(tracking_type = %tracking_type, "No complete session; dropping fix");
            return;
        }
    };

    if ctx.distance_filter_m > 0.0 {
        let mut last = ctx.last_recorded.lock().expect("last recorded lock");
        if let Some(previous) = *last {
            let moved = distance_m(previous, (position.latitude, position.longitude));
            if moved < ctx.distance_filter_m {
                debug!(moved_m = moved, "Movement below distance filter; skipping fix");
                return;
            }
        }
        *last = Some((position.latitude, position.longitude));
    }

    let captured_at = position.timestamp.unwrap_or_else(Utc::now);
    let fix = LocationFix::new(
        tracking_type,
        &session,
        position.latitude,
        position.longitude,
        captured_at,
        ctx.device.clone(),
    );

    if let Err(err) = ctx.ledger.insert(&fix) {
        warn!(error = %err, "Failed to mirror fix into local ledger");
    }

    let receipt = ctx.shipper.ship(&fix);
    if receipt.accepted {
        ctx.counters.record_shipped();
    } else if !receipt.duplicate_session {
        warn!(tracking_type = %tracking_type, "Fix not accepted by remote store; dropped");
    }

    if receipt.duplicate_session {
        warn!("Remote store reports this session was superseded by a newer login");
        ctx.superseded.raise(&session.auth_token);
    }
}

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine great-circle distance between two (lat, lng) pairs, in meters.
fn distance_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let half_dlat = (lat2 - lat1) / 2.0;
    let half_dlng = (lng2 - lng1) / 2.0;
    let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlng.sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use fieldtrace_core::storage::StorageConfig;
    use fieldtrace_protocol::{Session, ShipReceipt};
    use tempfile::TempDir;

    /// Shipper that records every fix and answers from a script.
    pub struct ScriptedShipper {
        pub shipped: Mutex<Vec<LocationFix>>,
        pub receipts: Mutex<Vec<ShipReceipt>>,
    }

    impl ScriptedShipper {
        pub fn accepting() -> Self {
            Self {
                shipped: Mutex::new(Vec::new()),
                receipts: Mutex::new(Vec::new()),
            }
        }

        pub fn with_receipts(receipts: Vec<ShipReceipt>) -> Self {
            Self {
                shipped: Mutex::new(Vec::new()),
                receipts: Mutex::new(receipts),
            }
        }

        pub fn ship_count(&self) -> usize {
            self.shipped.lock().expect("shipped lock").len()
        }
    }

    impl FixShipper for ScriptedShipper {
        fn ship(&self, fix: &LocationFix) -> ShipReceipt {
            self.shipped.lock().expect("shipped lock").push(fix.clone());
            self.receipts
                .lock()
                .expect("receipts lock")
                .pop()
                .unwrap_or_else(ShipReceipt::accepted)
        }
    }

    pub fn context(dir: &TempDir, shipper: Arc<dyn FixShipper>) -> TrackerContext {
        let storage = StorageConfig::with_root(dir.path().to_path_buf());
        let ledger = Ledger::new(storage.ledger_db()).expect("ledger init");
        TrackerContext {
            session_store: SessionStore::new(storage),
            ledger: Arc::new(ledger),
            shipper,
            device: DeviceInfo::default(),
            counters: Arc::new(TrackerCounters::default()),
            superseded: Arc::new(SupersededSignal::default()),
            distance_filter_m: 0.0,
            last_recorded: Arc::new(Mutex::new(None)),
        }
    }

    pub fn logged_in(ctx: &TrackerContext) {
        ctx.session_store
            .save(&Session {
                auth_token: "cookie".to_string(),
                user_id: "42".to_string(),
                user_name: "Ada Lovelace".to_string(),
            })
            .expect("save session");
    }

    pub fn position(latitude: f64, longitude: f64) -> Position {
        Position {
            latitude,
            longitude,
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use fieldtrace_protocol::ShipReceipt;
    use tempfile::TempDir;

    #[test]
    fn incomplete_session_drops_without_network_call() {
        let dir = TempDir::new().expect("temp dir");
        let shipper = Arc::new(ScriptedShipper::accepting());
        let ctx = context(&dir, shipper.clone());

        record_and_ship(&ctx, TrackingType::Foreground, position(1.0, 2.0));

        assert_eq!(ctx.counters.dropped(), 1);
        assert_eq!(shipper.ship_count(), 0);
        assert_eq!(ctx.ledger.count().expect("count"), 0);
    }

    #[test]
    fn complete_session_records_and_ships() {
        let dir = TempDir::new().expect("temp dir");
        let shipper = Arc::new(ScriptedShipper::accepting());
        let ctx = context(&dir, shipper.clone());
        logged_in(&ctx);

        record_and_ship(&ctx, TrackingType::Foreground, position(37.422, -122.084));

        assert_eq!(ctx.counters.shipped(), 1);
        assert_eq!(shipper.ship_count(), 1);
        let rows = ctx.ledger.select_all().expect("select");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].latitude, 37.422);
        assert_eq!(rows[0].user_name, "Ada Lovelace");
    }

    #[test]
    fn duplicate_session_receipt_raises_superseded_flag() {
        let dir = TempDir::new().expect("temp dir");
        let shipper = Arc::new(ScriptedShipper::with_receipts(vec![
            ShipReceipt::superseded(),
        ]));
        let ctx = context(&dir, shipper);
        logged_in(&ctx);

        record_and_ship(&ctx, TrackingType::Background, position(1.0, 2.0));

        // The signal is tagged with the token of the session that shipped.
        assert!(ctx.superseded.consume_for("cookie"));
        assert_eq!(ctx.counters.shipped(), 0);
    }

    #[test]
    fn superseded_signal_for_another_session_is_discarded() {
        let signal = SupersededSignal::default();
        signal.raise("stale-cookie");
        assert!(!signal.consume_for("fresh-cookie"));
        // Consuming discards a mismatched signal entirely.
        assert!(!signal.consume_for("stale-cookie"));
    }

    #[test]
    fn movement_below_distance_filter_is_skipped() {
        let dir = TempDir::new().expect("temp dir");
        let shipper = Arc::new(ScriptedShipper::accepting());
        let mut ctx = context(&dir, shipper.clone());
        ctx.distance_filter_m = 25.0;
        logged_in(&ctx);

        record_and_ship(&ctx, TrackingType::Foreground, position(37.4220, -122.0840));
        // About a meter away, under the 25m threshold.
        record_and_ship(&ctx, TrackingType::Foreground, position(37.42201, -122.08401));
        // About 111m north of the last recorded fix.
        record_and_ship(&ctx, TrackingType::Foreground, position(37.4230, -122.0840));

        assert_eq!(shipper.ship_count(), 2);
        assert_eq!(ctx.ledger.count().expect("count"), 2);
    }

    #[test]
    fn haversine_distance_is_roughly_metric() {
        // One degree of longitude on the equator is about 111.2km.
        let d = distance_m((0.0, 0.0), (0.0, 1.0));
        assert!((d - 111_195.0).abs() < 200.0);
    }

    #[test]
    fn rejected_ship_still_mirrors_into_ledger() {
        let dir = TempDir::new().expect("temp dir");
        let shipper = Arc::new(ScriptedShipper::with_receipts(vec![ShipReceipt::rejected()]));
        let ctx = context(&dir, shipper);
        logged_in(&ctx);

        record_and_ship(&ctx, TrackingType::Foreground, position(1.0, 2.0));

        // The ledger is a durable mirror even when the remote drops the fix.
        assert_eq!(ctx.ledger.count().expect("count"), 1);
        assert_eq!(ctx.counters.shipped(), 0);
    }
}
