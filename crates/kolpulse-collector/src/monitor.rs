use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Cancellation tokens for the running per-event monitoring loops.
///
/// Every event token is a child of one root token, so [`Self::shutdown`]
/// stops all loops at once. Stopping an event cancels its token; the loop
/// observes the cancellation at its next await point and exits.
#[derive(Debug, Default)]
pub struct Monitors {
    root: CancellationToken,
    events: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl Monitors {
    fn events(&self) -> MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a fresh token for `event_id`, cancelling any previous one.
    pub fn register(&self, event_id: Uuid) -> CancellationToken {
        let token = self.root.child_token();
        if let Some(previous) = self.events().insert(event_id, token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancels the loop for `event_id`. Returns whether one was running.
    pub fn stop(&self, event_id: Uuid) -> bool {
        match self.events().remove(&event_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_running(&self, event_id: Uuid) -> bool {
        self.events()
            .get(&event_id)
            .is_some_and(|t| !t.is_cancelled())
    }

    #[must_use]
    pub fn running(&self) -> Vec<Uuid> {
        self.events()
            .iter()
            .filter(|(_, t)| !t.is_cancelled())
            .map(|(id, _)| *id)
            .collect()
    }

    /// The parent of every event token; cancelled by [`Self::shutdown`].
    #[must_use]
    pub fn root(&self) -> &CancellationToken {
        &self.root
    }

    pub fn shutdown(&self) {
        self.root.cancel();
        self.events().clear();
    }
}
