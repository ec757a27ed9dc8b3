//! In-memory registry of live practice sessions.
//!
//! Policy: one live session per user. A user whose current session is
//! Configuring, InProgress or Paused cannot open another one until it is
//! finished or exited. Terminal sessions stay readable (for the scorecard)
//! until the user's next session replaces them.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::practice::runtime::SessionHandle;
use crate::practice::session::SessionController;

#[derive(Default)]
struct Slots {
    sessions: HashMap<Uuid, SessionHandle>,
    by_user: HashMap<Uuid, Uuid>,
}

#[derive(Default)]
pub struct SessionRegistry {
    slots: RwLock<Slots>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: Uuid) -> Option<SessionHandle> {
        self.slots.read().await.sessions.get(&session_id).cloned()
    }

    /// Fails with `SessionConflict` when the user already has a live session.
    pub async fn ensure_can_open(&self, user_id: Uuid) -> Result<(), AppError> {
        match self.current_for(user_id).await {
            Some(existing) => reject_if_live(&existing).await,
            None => Ok(()),
        }
    }

    /// Registers a freshly configured session, replacing the user's terminal one.
    ///
    /// The existing session's status is read with no registry lock held, since
    /// reading it may wait for that session's finalize. The slot is then
    /// re-checked under the write lock and the check repeats if it changed.
    pub async fn insert(&self, controller: SessionController) -> Result<SessionHandle, AppError> {
        let handle = SessionHandle::new(controller);
        let user_id = handle.user_id();

        loop {
            let existing = self.current_for(user_id).await;
            if let Some(existing) = &existing {
                reject_if_live(existing).await?;
            }

            let mut slots = self.slots.write().await;
            if slots.by_user.get(&user_id).copied() != existing.as_ref().map(SessionHandle::id) {
                continue;
            }

            if let Some(previous) = slots.by_user.insert(user_id, handle.id()) {
                slots.sessions.remove(&previous);
                info!("Evicted finished session {previous} for user {user_id}");
            }
            slots.sessions.insert(handle.id(), handle.clone());
            return Ok(handle);
        }
    }

    /// Drops a session from memory, e.g. after it was exited.
    pub async fn remove(&self, session_id: Uuid) -> Option<SessionHandle> {
        let mut slots = self.slots.write().await;
        let handle = slots.sessions.remove(&session_id)?;
        if slots.by_user.get(&handle.user_id()) == Some(&session_id) {
            slots.by_user.remove(&handle.user_id());
        }
        Some(handle)
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.sessions.len()
    }

    /// Clone of the user's current handle; the read guard ends here.
    async fn current_for(&self, user_id: Uuid) -> Option<SessionHandle> {
        let slots = self.slots.read().await;
        slots
            .by_user
            .get(&user_id)
            .and_then(|id| slots.sessions.get(id))
            .cloned()
    }
}

/// Terminal statuses never become live again, so a terminal answer stays valid.
async fn reject_if_live(existing: &SessionHandle) -> Result<(), AppError> {
    if existing.status().await.is_terminal() {
        Ok(())
    } else {
        Err(AppError::SessionConflict(existing.id()))
    }
}
