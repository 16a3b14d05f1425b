use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::Identity;

/// Holds the signed-in identity, or nothing.
#[derive(Clone)]
pub struct SessionStore {
    user: Arc<watch::Sender<Option<Identity>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (user, _) = watch::channel(None);
        Self {
            user: Arc::new(user),
        }
    }

    pub fn set_user(&self, identity: Identity) {
        debug!(user_id = %identity.id, "Session set");
        self.user.send_replace(Some(identity));
    }

    pub fn clear_user(&self) {
        debug!("Session cleared");
        self.user.send_replace(None);
    }

    pub fn current(&self) -> Option<Identity> {
        self.user.borrow().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.user.borrow().as_ref().map(|identity| identity.id.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.user.subscribe()
    }

    /// Mirrors an auth state-change subscription into this store until the
    /// sender goes away. The receiver's current value is applied at once.
    pub fn track(&self, mut changes: watch::Receiver<Option<Identity>>) -> JoinHandle<()> {
        self.apply(changes.borrow_and_update().clone());
        let store = self.clone();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let identity = changes.borrow_and_update().clone();
                store.apply(identity);
            }
        })
    }

    fn apply(&self, identity: Option<Identity>) {
        match identity {
            Some(identity) => self.set_user(identity),
            None => self.clear_user(),
        }
    }
}
