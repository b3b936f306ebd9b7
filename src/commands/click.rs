//! Click → move → settle → refresh loop.
//!
//! Phases run `Idle → Moving → Settling → Idle`. The settle wait is a tokio
//! timer task, so the caller's event loop keeps running while the camera
//! travels. Clicks arriving outside `Idle` are rejected rather than queued,
//! because a state read taken mid-move would report a stale orientation.
//!
//! Every accepted click owns the controller through its request id until it
//! settles or is cancelled; a timer whose id no longer matches does nothing.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::algorithm::targeting::{target_pixel, TargetPlan, TargetingError};
use crate::camera::port::CameraPort;
use crate::models::config::TargetingConfig;
use crate::models::orientation::PixelPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickPhase {
    Idle,
    Moving,
    Settling { until: Instant },
}

impl ClickPhase {
    pub fn is_idle(self) -> bool {
        matches!(self, ClickPhase::Idle)
    }

    fn label(self) -> &'static str {
        match self {
            ClickPhase::Idle => "idle",
            ClickPhase::Moving => "moving",
            ClickPhase::Settling { .. } => "settling",
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("camera is busy ({state}); wait for it to settle")]
    Busy { state: &'static str },
    #[error(transparent)]
    Targeting(#[from] TargetingError),
}

/// Result of one accepted click.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickOutcome {
    pub request_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub plan: TargetPlan,
}

/// Invoked once the settle timer fires, typically to refresh the snapshot.
pub type SettledCallback = Arc<dyn Fn(&ClickOutcome) + Send + Sync>;

/// Bookkeeping guarded by one lock so phase changes and ownership checks
/// cannot interleave.
struct Shared {
    /// Click currently owning the controller.
    request: Option<Uuid>,
    settle_task: Option<JoinHandle<()>>,
}

struct Inner {
    shared: Mutex<Shared>,
    /// Written only while `shared` is locked.
    phase: watch::Sender<ClickPhase>,
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        // A panicking callback must not wedge the controller in a non-idle phase.
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn phase(&self) -> ClickPhase {
        *self.phase.borrow()
    }

    /// Returns to `Idle` if `request_id` still owns the controller.
    fn release(&self, shared: &mut Shared, request_id: Uuid) -> bool {
        if shared.request != Some(request_id) {
            return false;
        }
        shared.request = None;
        shared.settle_task = None;
        self.phase.send_replace(ClickPhase::Idle);
        true
    }
}

pub struct ClickController<P> {
    camera: Arc<P>,
    config: TargetingConfig,
    auto_refresh: bool,
    on_settled: Option<SettledCallback>,
    inner: Arc<Inner>,
}

impl<P> ClickController<P>
where
    P: CameraPort + Send + Sync + 'static,
{
    pub fn new(camera: Arc<P>, config: TargetingConfig) -> Self {
        let (phase, _) = watch::channel(ClickPhase::Idle);
        Self {
            camera,
            config,
            auto_refresh: true,
            on_settled: None,
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    request: None,
                    settle_task: None,
                }),
                phase,
            }),
        }
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    pub fn on_settled(mut self, callback: SettledCallback) -> Self {
        self.on_settled = Some(callback);
        self
    }

    pub fn camera(&self) -> &Arc<P> {
        &self.camera
    }

    pub fn phase(&self) -> ClickPhase {
        self.inner.phase()
    }

    /// Targets `point` on a `width`x`height` image.
    ///
    /// Returns as soon as the move is issued; the controller stays in
    /// `Settling` until the estimated settle time elapses.
    pub async fn handle_click(
        &self,
        point: PixelPoint,
        width: u32,
        height: u32,
    ) -> Result<ClickOutcome, ControllerError> {
        let request_id = Uuid::new_v4();
        {
            let mut shared = self.inner.lock();
            let phase = self.inner.phase();
            if !phase.is_idle() {
                return Err(ControllerError::Busy {
                    state: phase.label(),
                });
            }
            shared.request = Some(request_id);
            self.inner.phase.send_replace(ClickPhase::Moving);
        }

        let issued_at = Utc::now();
        log::info!(
            "handle_click: id={request_id} click=({:.1}, {:.1}) image={width}x{height}",
            point.x,
            point.y
        );

        let plan = match target_pixel(self.camera.as_ref(), point, width, height, &self.config).await
        {
            Ok(plan) => plan,
            Err(err) => {
                log::warn!("handle_click: id={request_id} failed: {err}");
                let mut shared = self.inner.lock();
                self.inner.release(&mut shared, request_id);
                return Err(err.into());
            }
        };

        let outcome = ClickOutcome {
            request_id,
            issued_at,
            plan,
        };
        self.start_settle(outcome.clone());
        Ok(outcome)
    }

    /// Drops a pending settle wait and returns to `Idle` without firing the
    /// settled callback. The camera itself keeps moving.
    ///
    /// A click still in `Moving` cannot be cancelled; returns whether a
    /// settle wait was dropped.
    pub fn cancel(&self) -> bool {
        let mut shared = self.inner.lock();
        if !matches!(self.inner.phase(), ClickPhase::Settling { .. }) {
            return false;
        }
        let Some(request_id) = shared.request else {
            return false;
        };
        if let Some(task) = shared.settle_task.take() {
            task.abort();
        }
        self.inner.release(&mut shared, request_id);
        log::info!("cancel: id={request_id} settle wait aborted");
        true
    }

    /// Resolves once the controller is `Idle`, whether through settling,
    /// cancellation or a failed click.
    pub async fn wait_idle(&self) {
        let mut phase = self.inner.phase.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = phase.wait_for(|phase| phase.is_idle()).await;
    }

    fn start_settle(&self, outcome: ClickOutcome) {
        let settle = outcome.plan.settle.as_duration();
        let until = Instant::now() + settle;
        let inner = Arc::clone(&self.inner);
        let callback = if self.auto_refresh {
            self.on_settled.clone()
        } else {
            None
        };

        let mut shared = self.inner.lock();
        if shared.request != Some(outcome.request_id) {
            return;
        }
        self.inner.phase.send_replace(ClickPhase::Settling { until });
        shared.settle_task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(until).await;
            let released = {
                let mut shared = inner.lock();
                inner.release(&mut shared, outcome.request_id)
            };
            if !released {
                return;
            }
            log::info!(
                "settle: id={} done after {} ms",
                outcome.request_id,
                outcome.plan.settle.millis
            );
            if let Some(callback) = callback {
                callback(&outcome);
            }
        }));
    }
}
