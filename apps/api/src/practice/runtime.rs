//! Async wrapper that wires a `SessionController` to its tick schedule.
//!
//! The controller itself is synchronous apart from device acquisition and
//! finalization. `SessionHandle` serializes access through a tokio mutex and
//! re-arms or drops the schedule around each transition.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::SessionError;
use crate::practice::models::{Response, Scorecard, SessionStatus};
use crate::practice::recording::{acquire_within, CAPTURE_ACQUIRE_TIMEOUT};
use crate::practice::session::{
    FinalizeOutcome, SessionController, SessionView, Step, TickEffect,
};
use crate::practice::timer::TickSchedule;

/// Result of a navigation request. `completion` is set when the call (or an
/// earlier one) finalized the session.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub step: Step,
    pub session: SessionView,
    pub completion: Option<FinalizeOutcome>,
}

#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    user_id: Uuid,
    inner: Arc<Mutex<SessionController>>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub fn new(controller: SessionController) -> Self {
        Self {
            id: controller.id(),
            user_id: controller.user_id(),
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.lock().await.status()
    }

    pub async fn view(&self) -> SessionView {
        self.inner.lock().await.view()
    }

    pub async fn scorecard(&self) -> Option<Scorecard> {
        self.inner.lock().await.scorecard().cloned()
    }

    /// Starts the session and its tick schedule. Returns the device notice, if any.
    ///
    /// The capture device is acquired with the session unlocked: the timer
    /// runs and answers are accepted while the permission prompt is open.
    pub async fn start(&self, record: bool) -> Result<(SessionView, Option<String>), SessionError> {
        let device = {
            let mut controller = self.inner.lock().await;
            controller.start()?;
            self.arm(&mut controller);
            if !record || controller.status() != SessionStatus::InProgress {
                return Ok((controller.view(), None));
            }
            controller.capture_device()
        };

        let acquired = acquire_within(device.as_ref(), CAPTURE_ACQUIRE_TIMEOUT).await;

        let mut controller = self.inner.lock().await;
        let notice = controller.attach_capture(acquired);
        Ok((controller.view(), notice))
    }

    pub async fn pause(&self) -> Result<SessionView, SessionError> {
        let mut controller = self.inner.lock().await;
        controller.pause()?;
        Ok(controller.view())
    }

    pub async fn resume(&self) -> Result<SessionView, SessionError> {
        let mut controller = self.inner.lock().await;
        controller.resume()?;
        self.arm(&mut controller);
        Ok(controller.view())
    }

    pub async fn advance(&self) -> Result<NavigationResult, SessionError> {
        let mut controller = self.inner.lock().await;
        let step = controller.advance()?;
        let completion = if controller.status() == SessionStatus::Completed {
            Some(controller.finalize().await?)
        } else {
            None
        };
        Ok(NavigationResult {
            step,
            session: controller.view(),
            completion,
        })
    }

    pub async fn retreat(&self) -> Result<NavigationResult, SessionError> {
        let mut controller = self.inner.lock().await;
        let step = controller.retreat()?;
        Ok(NavigationResult {
            step,
            session: controller.view(),
            completion: None,
        })
    }

    pub async fn jump_to(&self, index: usize) -> Result<NavigationResult, SessionError> {
        let mut controller = self.inner.lock().await;
        let step = controller.jump_to(index)?;
        Ok(NavigationResult {
            step,
            session: controller.view(),
            completion: None,
        })
    }

    pub async fn set_answer(&self, question_id: &str, text: &str) -> Result<Response, SessionError> {
        self.inner.lock().await.set_answer(question_id, text)
    }

    pub async fn get_answer(&self, question_id: &str) -> String {
        self.inner.lock().await.get_answer(question_id).to_string()
    }

    pub async fn toggle_audio(&self) -> Result<SessionView, SessionError> {
        let mut controller = self.inner.lock().await;
        controller.toggle_audio()?;
        Ok(controller.view())
    }

    pub async fn toggle_video(&self) -> Result<SessionView, SessionError> {
        let mut controller = self.inner.lock().await;
        controller.toggle_video()?;
        Ok(controller.view())
    }

    /// Forced completion; returns the (possibly cached) outcome.
    pub async fn finish(&self) -> Result<FinalizeOutcome, SessionError> {
        self.inner.lock().await.finalize().await
    }

    pub async fn exit(&self) -> Result<SessionView, SessionError> {
        let mut controller = self.inner.lock().await;
        controller.exit()?;
        Ok(controller.view())
    }

    fn arm(&self, controller: &mut SessionController) {
        if controller.status() != SessionStatus::InProgress || controller.is_ticking() {
            return;
        }
        let schedule = spawn_ticker(Arc::downgrade(&self.inner), controller.tick_period());
        controller.attach_schedule(schedule);
    }
}

/// Drives `SessionController::tick` once per period. Finalizes the session
/// when the last question expires, then stops.
fn spawn_ticker(session: Weak<Mutex<SessionController>>, period: Duration) -> TickSchedule {
    TickSchedule::spawn(period, move || {
        let session = session.clone();
        async move {
            let Some(session) = session.upgrade() else {
                return ControlFlow::Break(());
            };
            let mut controller = session.lock().await;

            match controller.tick() {
                Ok(TickEffect::Expired(Step::Completed)) => {
                    debug!("Last question expired for session {}", controller.id());
                    if let Err(e) = controller.finalize().await {
                        warn!("Finalize after expiry failed for {}: {e}", controller.id());
                    }
                    ControlFlow::Break(())
                }
                Ok(_) => ControlFlow::Continue(()),
                Err(e) => {
                    debug!("Ticker stopping for session {}: {e}", controller.id());
                    ControlFlow::Break(())
                }
            }
        }
    })
}
