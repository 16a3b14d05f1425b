//! Seams between the client core and whatever hosts auth, data and the
//! change feed.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::warn;

use crate::models::{ChangeEvent, Identity, NewTask, Task, TaskPatch};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailTaken,
    #[error("unsupported oauth provider: {0}")]
    UnsupportedProvider(String),
    #[error("row not found")]
    NotFound,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("remote unavailable: {0}")]
    Unavailable(String),
}

impl From<argon2::password_hash::Error> for RemoteError {
    fn from(err: argon2::password_hash::Error) -> Self {
        RemoteError::Hashing(err.to_string())
    }
}

#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn get_session(&self) -> Result<Option<Identity>, RemoteError>;

    /// Yields the identity (or `None`) on every sign-in, sign-up and sign-out.
    fn on_auth_state_change(&self) -> watch::Receiver<Option<Identity>>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, RemoteError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Identity, RemoteError>;

    /// Returns the provider URL the browser should be sent to.
    async fn sign_in_with_oauth(&self, provider: &str) -> Result<String, RemoteError>;

    async fn sign_out(&self) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait TodoTable: Send + Sync {
    async fn select(&self) -> Result<Vec<Task>, RemoteError>;
    async fn insert(&self, task: NewTask) -> Result<Task, RemoteError>;
    async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, RemoteError>;
    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self) -> Subscription;

    /// Identifier stamped on change events caused by this client's writes.
    fn client_id(&self) -> &str;
}

/// A change-feed receiver, optionally narrowed to one user's rows.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    audience: Audience,
}

enum Audience {
    Everyone,
    User(String),
    // Whoever is signed in when the event arrives.
    Session(watch::Receiver<Option<Identity>>),
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<ChangeEvent>, user_id: Option<String>) -> Self {
        let audience = match user_id {
            Some(user_id) => Audience::User(user_id),
            None => Audience::Everyone,
        };
        Self { rx, audience }
    }

    /// Narrows the feed to the rows of the identity `session` currently
    /// holds. Nothing is visible while it holds `None`.
    pub fn following(
        rx: broadcast::Receiver<ChangeEvent>,
        session: watch::Receiver<Option<Identity>>,
    ) -> Self {
        Self {
            rx,
            audience: Audience::Session(session),
        }
    }

    /// Next visible event, or `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.visible(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change feed lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn visible(&self, event: &ChangeEvent) -> bool {
        let owner = event.user_id();
        match &self.audience {
            Audience::Everyone => true,
            Audience::User(user_id) => owner == Some(user_id.as_str()),
            Audience::Session(session) => session
                .borrow()
                .as_ref()
                .is_some_and(|identity| owner == Some(identity.id.as_str())),
        }
    }
}
