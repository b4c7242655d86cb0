// src/scanner/monitor.rs
use crate::market::clock::MarketSchedule;
use crate::scanner::orchestrator::Scanner;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long `stop` waits for the loop to wind down before aborting it.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
    /// Cancelled, waiting for an in-flight scan to finish.
    Stopping,
}

struct MonitorTask {
    cancel: watch::Sender<bool>,
    /// Taken by `stop` while it waits for the loop to exit.
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl MonitorTask {
    fn state(&self) -> MonitorState {
        match &self.handle {
            None => MonitorState::Stopping,
            Some(handle) if !handle.is_finished() => MonitorState::Running,
            Some(_) => MonitorState::Stopped,
        }
    }
}

/// Background scheduler that scans on a fixed cadence while the market is open.
pub struct Monitor {
    scanner: Arc<Scanner>,
    schedule: Arc<dyn MarketSchedule>,
    task: Mutex<Option<MonitorTask>>,
}

impl Monitor {
    pub fn new(scanner: Arc<Scanner>, schedule: Arc<dyn MarketSchedule>) -> Self {
        Self {
            scanner,
            schedule,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> MonitorState {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(MonitorState::Stopped, MonitorTask::state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Spawn the monitor loop. Returns `false` without side effects if a loop
    /// is running or still stopping. Must be called from within a tokio runtime.
    pub fn start(&self, interval: Duration) -> bool {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = task.as_ref() {
            match existing.state() {
                MonitorState::Running => {
                    log::warn!("Monitoring already running every {:?}; ignoring start", existing.interval);
                    return false;
                }
                MonitorState::Stopping => {
                    log::warn!("Monitoring is still stopping; ignoring start");
                    return false;
                }
                MonitorState::Stopped => {}
            }
        }

        let (cancel, cancelled) = watch::channel(false);
        let handle = tokio::spawn(monitor_loop(
            self.scanner.clone(),
            self.schedule.clone(),
            interval,
            cancelled,
        ));

        *task = Some(MonitorTask {
            cancel,
            handle: Some(handle),
            interval,
        });
        log::info!("Started monitoring with {}s interval", interval.as_secs());
        true
    }

    /// Cancel the loop and wait (bounded by [`STOP_TIMEOUT`]) for it to exit.
    ///
    /// Once this returns no new scan will be started by the monitor. The
    /// monitor reports [`MonitorState::Stopping`] until then. Returns `false`
    /// if the monitor was not running or another `stop` is already waiting.
    pub async fn stop(&self) -> bool {
        let mut handle = {
            let mut slot = self.task.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(task) = slot.as_mut() else {
                return false;
            };
            let Some(handle) = task.handle.take() else {
                return false;
            };
            // The loop may already have exited and dropped its receiver.
            let _ = task.cancel.send(true);
            handle
        };
        let _clear = ClearSlot(&self.task);

        match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Monitor loop ended abnormally: {}", e),
            Err(_) => {
                log::warn!("Monitor loop did not stop within {:?}; aborting", STOP_TIMEOUT);
                handle.abort();
            }
        }

        log::info!("Stopped monitoring");
        true
    }
}

/// Empties the task slot when `stop` finishes, or when its future is dropped
/// mid-wait.
struct ClearSlot<'a>(&'a Mutex<Option<MonitorTask>>);

impl Drop for ClearSlot<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

async fn monitor_loop(
    scanner: Arc<Scanner>,
    schedule: Arc<dyn MarketSchedule>,
    interval: Duration,
    mut cancelled: watch::Receiver<bool>,
) {
    loop {
        if *cancelled.borrow() {
            break;
        }

        if schedule.is_open(scanner.now()) {
            // Own task, so a panic mid-scan surfaces as a JoinError instead of
            // taking the loop down with it.
            let task_scanner = scanner.clone();
            match tokio::spawn(async move { task_scanner.run_scan().await }).await {
                Ok(Ok(results)) => log::debug!("Scheduled scan found {} stocks", results.len()),
                Ok(Err(e)) => log::error!("Scheduled scan failed: {}", e),
                Err(e) => log::error!("Scheduled scan aborted unexpectedly: {}", e),
            }
        } else {
            log::info!("Market is closed");
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = cancelled.changed() => {
                if changed.is_err() || *cancelled.borrow() {
                    break;
                }
            }
        }
    }

    log::debug!("Monitor loop exited");
}
