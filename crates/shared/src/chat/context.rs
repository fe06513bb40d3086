use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// The session a conversation writes into.
///
/// Unset until the first send of a new chat creates a session. The inner
/// lock is held for the whole creation call so a second send that arrives
/// meanwhile waits and then reuses the id instead of creating another row.
#[derive(Debug, Default)]
pub struct SessionContext {
    current: Mutex<Option<Uuid>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_id(&self) -> Option<Uuid> {
        *self.current.lock().await
    }

    pub async fn bind(&self, session_id: Uuid) {
        *self.current.lock().await = Some(session_id);
    }

    pub async fn reset(&self) {
        *self.current.lock().await = None;
    }

    pub(crate) async fn claim(&self) -> MutexGuard<'_, Option<Uuid>> {
        self.current.lock().await
    }
}
