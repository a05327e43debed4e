//! Tracking lifecycle controller.
//!
//! The only component with meaningful state transitions. It decides which
//! trackers run from the permission readiness tuple, re-evaluates on every
//! refresh (app regained focus), and owns the two teardown paths: explicit
//! logout and the forced logout raised when the remote store reports this
//! session superseded by a newer login.
//!
//! Re-entrancy rule: starting an already-started tracker is a no-op, checked
//! against the tracker's own live state (the subscription handle, the
//! runner's registration table) rather than a local flag. This is what keeps
//! a double start from double-shipping every fix.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use fieldtrace_core::permissions::PermissionGate;
use fieldtrace_core::AgentConfig;
use fieldtrace_protocol::{TrackerState, TrackingStatus, BACKGROUND_TASK_NAME};

use crate::background::{self, TaskRunner};
use crate::foreground::{self, ForegroundSubscription};
use crate::record::TrackerContext;
use crate::source::LocationSource;

pub type SourceFactory = Box<dyn Fn() -> Box<dyn LocationSource> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    AwaitingPermission,
    ForegroundOnly,
    BackgroundOnly,
    FullyActive,
    Stopped,
}

pub struct LifecycleController {
    state: LifecycleState,
    gate: Box<dyn PermissionGate>,
    runner: Arc<TaskRunner>,
    ctx: TrackerContext,
    foreground: Option<ForegroundSubscription>,
    make_source: SourceFactory,
    foreground_interval: Duration,
    background_interval: Duration,
    services_enabled: bool,
    forced_logouts: u64,
}

impl LifecycleController {
    pub fn new(
        config: &AgentConfig,
        gate: Box<dyn PermissionGate>,
        runner: Arc<TaskRunner>,
        ctx: TrackerContext,
        make_source: SourceFactory,
    ) -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            gate,
            runner,
            ctx,
            foreground: None,
            make_source,
            foreground_interval: Duration::from_secs(config.foreground_interval_secs),
            background_interval: Duration::from_secs(config.background_interval_secs),
            services_enabled: false,
            forced_logouts: 0,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn forced_logout_count(&self) -> u64 {
        self.forced_logouts
    }

    /// Runs the permission check and starts whatever tracking the readiness
    /// tuple allows. Called once on mount.
    pub fn initialize(&mut self) {
        self.state = LifecycleState::AwaitingPermission;
        self.evaluate();
    }

    /// Re-evaluates readiness; called whenever the app regains focus and on
    /// the daemon's periodic tick. Consumes a pending superseded signal
    /// exactly once, regardless of how many ship calls raised it, and only
    /// when it was raised under the session that is still live.
    pub fn refresh(&mut self) {
        let session = match self.ctx.session_store.load() {
            Some(session) => session,
            None => {
                // A signal can only apply to a live session; one raised by a
                // straggling ship after logout dies here.
                self.ctx.superseded.clear();
                if self.state != LifecycleState::Stopped {
                    info!("No authenticated session; stopping trackers");
                    self.teardown();
                    self.state = LifecycleState::Stopped;
                }
                return;
            }
        };

        if self.ctx.superseded.consume_for(&session.auth_token) {
            self.forced_logouts += 1;
            warn!("Forcing logout: session superseded by a newer login");
            self.logout();
            return;
        }

        self.evaluate();
    }

    /// Explicit logout: unsubscribe the foreground tracker, stop the
    /// background task, clear the session. All three identity fields
    /// disappear together.
    pub fn logout(&mut self) {
        self.teardown();
        if let Err(err) = self.ctx.session_store.clear() {
            warn!(error = %err, "Failed to clear session on logout");
        }
        // Any signal still pending belongs to the session just cleared.
        self.ctx.superseded.clear();
        self.state = LifecycleState::Stopped;
        info!("Logged out; tracking torn down");
    }

    pub fn status(&self) -> TrackingStatus {
        TrackingStatus {
            services_enabled: self.services_enabled,
            foreground: if self.foreground_live() {
                TrackerState::Active
            } else {
                TrackerState::Inactive
            },
            background: if self.runner.is_registered(BACKGROUND_TASK_NAME) {
                TrackerState::Active
            } else {
                TrackerState::Inactive
            },
        }
    }

    fn evaluate(&mut self) {
        let readiness = self.gate.check_readiness();
        self.services_enabled = readiness.services_enabled;

        if readiness.services_enabled && readiness.foreground_granted {
            self.start_foreground();
        }

        if readiness.services_enabled && readiness.background_granted {
            let result = background::ensure_started(
                &self.runner,
                self.background_interval,
                (self.make_source)(),
                self.ctx.clone(),
            );
            if let Err(err) = result {
                warn!(error = %err, "Could not start background tracking");
            }
        }

        let foreground = self.foreground_live();
        let background = self.runner.is_registered(BACKGROUND_TASK_NAME);
        self.state = match (foreground, background) {
            (true, true) => LifecycleState::FullyActive,
            (true, false) => LifecycleState::ForegroundOnly,
            (false, true) => LifecycleState::BackgroundOnly,
            (false, false) => LifecycleState::Stopped,
        };
    }

    fn start_foreground(&mut self) {
        if self.foreground_live() {
            return;
        }
        let subscription = foreground::start(
            self.foreground_interval,
            (self.make_source)(),
            self.ctx.clone(),
        );
        self.foreground = Some(subscription);
    }

    fn foreground_live(&self) -> bool {
        self.foreground
            .as_ref()
            .map(|subscription| subscription.is_live())
            .unwrap_or(false)
    }

    fn teardown(&mut self) {
        if let Some(subscription) = self.foreground.take() {
            subscription.stop();
        }
        background::stop(&self.runner);
    }
}
