//! Backend availability polling.
//!
//! `Unknown -> Checking -> Healthy | Unhealthy`. A healthy backend is probed
//! again after the regular interval, an unhealthy one after the shorter retry
//! back-off. Polling only runs between [`HealthMonitor::start`] and
//! [`HealthMonitor::stop`], which the widget ties to its window being open.

use crate::api::HealthProbe;
use crate::config::HealthSettings;
use crate::db::models::{now_millis, HealthStatus};
use crate::events::{EventBus, WidgetEvent};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub last_check: Option<i64>,
}

impl HealthSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    pub fn is_checking(&self) -> bool {
        self.status == HealthStatus::Checking
    }
}

/// Holds the in-flight flag for one probe and releases it when dropped, so a
/// probe cancelled mid-flight does not block the ones after it.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Shared {
    probe: Arc<dyn HealthProbe>,
    settings: HealthSettings,
    snapshot: Mutex<HealthSnapshot>,
    in_flight: AtomicBool,
    events: EventBus,
}

impl Shared {
    fn snapshot(&self) -> MutexGuard<'_, HealthSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, status: HealthStatus, checked: bool) {
        let snapshot = {
            let mut snapshot = self.snapshot();
            snapshot.status = status;
            if checked {
                snapshot.last_check = Some(now_millis());
            }
            *snapshot
        };
        self.events.emit(WidgetEvent::HealthChanged {
            status: snapshot.status,
            checked_at: snapshot.last_check,
        });
    }

    /// Run one probe. Returns `None` when another probe was already running
    /// and `force` is not set.
    async fn check(&self, force: bool) -> Option<HealthStatus> {
        let busy = self.in_flight.swap(true, Ordering::SeqCst);
        if busy && !force {
            tracing::debug!("health check already in flight; skipping");
            return None;
        }
        let _guard = InFlight(&self.in_flight);

        self.publish(HealthStatus::Checking, false);
        let timeout = self.settings.probe_timeout;
        let healthy = match tokio::time::timeout(timeout, self.probe.probe()).await {
            Ok(healthy) => healthy,
            Err(_) => {
                tracing::warn!("API health check timed out after {:?}", timeout);
                false
            }
        };
        let status = if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        self.publish(status, true);
        Some(status)
    }
}

pub struct HealthMonitor {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>, settings: HealthSettings, events: EventBus) -> Self {
        Self {
            shared: Arc::new(Shared {
                probe,
                settings,
                snapshot: Mutex::new(HealthSnapshot::default()),
                in_flight: AtomicBool::new(false),
                events,
            }),
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin polling, starting with an immediate probe. Must be called from
    /// within a tokio runtime. Calling it while already running does nothing.
    pub fn start(&self) {
        let mut task = self.task();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let shared = self.shared.clone();
        *task = Some(tokio::spawn(async move {
            loop {
                let status = match shared.check(false).await {
                    Some(status) => status,
                    None => shared.snapshot().status,
                };
                let delay = if status == HealthStatus::Healthy {
                    shared.settings.interval
                } else {
                    shared.settings.retry_delay
                };
                tokio::time::sleep(delay).await;
            }
        }));
        tracing::debug!("health monitoring started");
    }

    /// Cancel polling and any pending retry.
    pub fn stop(&self) {
        if let Some(task) = self.task().take() {
            task.abort();
            // The aborted task only drops its guard once the runtime reaps it.
            self.shared.in_flight.store(false, Ordering::SeqCst);
            tracing::debug!("health monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Probe now, even if a scheduled probe is in flight.
    pub async fn refresh(&self) -> HealthStatus {
        match self.shared.check(true).await {
            Some(status) => status,
            None => self.snapshot().status,
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        *self.shared.snapshot()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
