// Fixed-rate transmit loop
//
// Each tick: if the link is live, drain dirty commands and send them, then
// sleep for whatever is left of the period. A tick that runs long is logged
// and the next one starts immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{info, warn};

use crate::config::LOOP_HZ;
use crate::error::{ActuatorError, Result};
use crate::link::Transmit;
use crate::table::CommandTable;

fn period_for(hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(hz))
}

/// Run flag and period, shared between the loop and its owner
#[derive(Debug)]
pub struct LoopState {
    running: AtomicBool,
    period_nanos: AtomicU64,
    // Cuts the between-tick sleep short on stop
    wake: Notify,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            period_nanos: AtomicU64::new(period_for(LOOP_HZ).as_nanos() as u64),
            wake: Notify::new(),
        }
    }
}

impl LoopState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Clear the run flag and wake the loop if it is sleeping
    pub fn request_stop(&self) {
        self.set_running(false);
        // notify_one stores a permit when the loop is not waiting yet
        self.wake.notify_one();
    }

    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.period_nanos.load(Ordering::Acquire))
    }

    /// 0 Hz has no finite period and leaves the current one in place
    pub fn set_frequency(&self, hz: u32) -> Result<()> {
        if hz == 0 {
            return Err(ActuatorError::InvalidFrequency(hz));
        }
        self.period_nanos
            .store(period_for(hz).as_nanos() as u64, Ordering::Release);
        Ok(())
    }
}

/// Cloneable way to stop the loop from any task or thread
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<LoopState>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.state.request_stop();
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

/// Owner of the background loop task
///
/// Idle until `start`; running until the flag is cleared; never restarted.
pub struct Scheduler {
    state: Arc<LoopState>,
    started: bool,
    worker: Option<JoinHandle<()>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(LoopState::default()),
            started: false,
            worker: None,
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Spawn the loop. A scheduler runs once; restarting is an error.
    pub fn start<T: Transmit>(&mut self, table: Arc<CommandTable>, link: Arc<T>) -> Result<()> {
        if self.started {
            return Err(ActuatorError::AlreadyStarted);
        }
        self.started = true;
        self.state.set_running(true);
        self.worker = Some(tokio::spawn(run_loop(table, Arc::clone(&self.state), link)));
        Ok(())
    }

    /// Ask the loop to finish; a sleeping loop wakes immediately
    pub fn stop(&self) {
        self.state.request_stop();
    }

    /// Stop and wait for the loop, aborting it if it outlives `limit`
    pub async fn join(&mut self, limit: Duration) {
        self.stop();
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        match timeout(limit, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Scheduler task failed: {}", e),
            Err(_) => {
                warn!("Scheduler did not stop within {:?}, aborting", limit);
                worker.abort();
            }
        }
    }
}

async fn run_loop<T: Transmit>(table: Arc<CommandTable>, state: Arc<LoopState>, link: Arc<T>) {
    info!(
        "Scheduler started: {:.2}ms period",
        state.period().as_secs_f64() * 1000.0
    );

    while state.is_running() {
        let tick_start = Instant::now();

        if link.is_live() {
            for command in table.drain_dirty() {
                if let Err(e) = link.transmit(&command).await {
                    warn!("Failed to send command for robot {}: {}", command.id, e);
                }
            }
        }

        let elapsed = tick_start.elapsed();
        if !state.is_running() {
            break;
        }

        let period = state.period();
        match period.checked_sub(elapsed) {
            Some(rest) => {
                tokio::select! {
                    _ = sleep(rest) => {}
                    _ = state.wake.notified() => {}
                }
            }
            None => warn!(
                "Tick overran its {:?} period by {:?}",
                period,
                elapsed - period
            ),
        }
    }

    info!("Scheduler stopped");
}
