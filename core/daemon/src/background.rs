//! Background tracker and its named task runner.
//!
//! The runner stands in for the OS background scheduler: tasks are
//! registered under a name, invoked on a cadence independently of the rest
//! of the agent, and deregistered by name. Registration is idempotent by
//! querying the runner's own state — never a local flag — which is what
//! prevents duplicate registrations from double-shipping every fix.
//!
//! Each invocation delivers a batch of positions (only the first is
//! consumed) or an error condition. Errors are logged and the invocation
//! returns without side effects; the task stays registered. The session is
//! re-read from persistent storage inside every invocation, so a process
//! restart between registration and delivery cannot strand fixes without
//! their user association.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use fieldtrace_protocol::{TrackingType, BACKGROUND_TASK_NAME};

use crate::record::{record_and_ship, TrackerContext};
use crate::source::{LocationSource, Position};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A delivery from the scheduler: a batch of positions or an error.
pub type Delivery = Result<Vec<Position>, String>;

type TaskHandler = Box<dyn FnMut(Delivery) + Send>;

struct RunningTask {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Named-task scheduler. One runner per daemon; both the lifecycle
/// controller and the tracker query it for registration state.
#[derive(Default)]
pub struct TaskRunner {
    tasks: Mutex<HashMap<String, RunningTask>>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a task is currently registered under this name. Finished
    /// workers are pruned so a crashed task does not read as registered.
    pub fn is_registered(&self, name: &str) -> bool {
        let mut tasks = self.tasks.lock().expect("task registry lock");
        if let Some(task) = tasks.get(name) {
            if task.handle.is_finished() {
                tasks.remove(name);
                return false;
            }
            return true;
        }
        false
    }

    /// Registers a named task. Fails if the name is already taken; callers
    /// are expected to query `is_registered` first.
    pub fn register(
        &self,
        name: &str,
        interval: Duration,
        mut source: Box<dyn LocationSource>,
        mut handler: TaskHandler,
    ) -> Result<(), String> {
        let mut tasks = self.tasks.lock().expect("task registry lock");
        if let Some(existing) = tasks.get(name) {
            if !existing.handle.is_finished() {
                return Err(format!("Task already registered: {}", name));
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let task_name = name.to_string();

        let handle = thread::spawn(move || {
            debug!(task = %task_name, "Background task worker started");
            while !worker_stop.load(Ordering::SeqCst) {
                let delivery = source.poll().map(|position| vec![position]);
                handler(delivery);
                sleep_interruptible(&worker_stop, interval);
            }
            debug!(task = %task_name, "Background task worker exiting");
        });

        tasks.insert(name.to_string(), RunningTask { stop, handle });
        Ok(())
    }

    /// Deregisters a named task. An invocation already in flight is allowed
    /// to complete; the worker exits at its next stop check. Returns whether
    /// a task was actually deregistered.
    pub fn deregister(&self, name: &str) -> bool {
        let mut tasks = self.tasks.lock().expect("task registry lock");
        match tasks.remove(name) {
            Some(task) => {
                task.stop.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn registered_count(&self) -> usize {
        let mut tasks = self.tasks.lock().expect("task registry lock");
        tasks.retain(|_, task| !task.handle.is_finished());
        tasks.len()
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

/// Starts background tracking if it is not already running. Returns whether
/// a new registration happened.
pub fn ensure_started(
    runner: &TaskRunner,
    interval: Duration,
    source: Box<dyn LocationSource>,
    ctx: TrackerContext,
) -> Result<bool, String> {
    if runner.is_registered(BACKGROUND_TASK_NAME) {
        debug!("Background tracking already active");
        return Ok(false);
    }

    runner.register(
        BACKGROUND_TASK_NAME,
        interval,
        source,
        Box::new(move |delivery| handle_invocation(&ctx, delivery)),
    )?;
    info!("Background tracking started");
    Ok(true)
}

/// Stops background tracking if it is running. Idempotent.
pub fn stop(runner: &TaskRunner) -> bool {
    if runner.deregister(BACKGROUND_TASK_NAME) {
        info!("Background tracking stopped");
        true
    } else {
        debug!("Background tracking was not active");
        false
    }
}

/// One background invocation: consume the first position of the batch and
/// push it through the record-and-ship path.
pub fn handle_invocation(ctx: &TrackerContext, delivery: Delivery) {
    let positions = match delivery {
        Ok(positions) => positions,
        Err(err) => {
            warn!(error = %err, "Background task delivered an error");
            return;
        }
    };

    let position = match positions.into_iter().next() {
        Some(position) => position,
        None => {
            warn!("No location data received in background task");
            return;
        }
    };

    record_and_ship(ctx, TrackingType::Background, position);
}
