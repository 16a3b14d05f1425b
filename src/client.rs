use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::backend::Backend;
use crate::models::{Identity, NewTask, Session, Task, TaskPatch};
use crate::remote::{AuthClient, ChangeFeed, RemoteError, Subscription, TodoTable};

/// In-process handle onto a [`Backend`], holding one browser's session.
pub struct Client {
    backend: Backend,
    client_id: String,
    token: Mutex<Option<String>>,
    auth_state: watch::Sender<Option<Identity>>,
}

impl Client {
    pub fn new(backend: Backend) -> Self {
        let (auth_state, _) = watch::channel(None);
        Self {
            backend,
            client_id: Uuid::new_v4().to_string(),
            token: Mutex::new(None),
            auth_state,
        }
    }

    pub fn session_token(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn store_session(&self, identity: &Identity, session: Session) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.id);
        self.auth_state.send_replace(Some(identity.clone()));
    }

    fn current_identity(&self) -> Result<Option<Identity>, RemoteError> {
        match self.session_token() {
            Some(token) => self.backend.identity_for(&token),
            None => Ok(None),
        }
    }

    fn user_id(&self) -> Result<String, RemoteError> {
        self.current_identity()?
            .map(|identity| identity.id)
            .ok_or(RemoteError::Unauthenticated)
    }
}

#[async_trait]
impl AuthClient for Client {
    async fn get_session(&self) -> Result<Option<Identity>, RemoteError> {
        self.current_identity()
    }

    fn on_auth_state_change(&self) -> watch::Receiver<Option<Identity>> {
        self.auth_state.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, RemoteError> {
        let (identity, session) = self.backend.sign_in(email, password)?;
        self.store_session(&identity, session);
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Identity, RemoteError> {
        let (identity, session) = self.backend.sign_up(email, password, username)?;
        self.store_session(&identity, session);
        Ok(identity)
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> Result<String, RemoteError> {
        self.backend.oauth_authorize_url(provider)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        if let Some(token) = self.session_token() {
            self.backend.sign_out(&token)?;
        }
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.auth_state.send_replace(None);
        Ok(())
    }
}

#[async_trait]
impl TodoTable for Client {
    async fn select(&self) -> Result<Vec<Task>, RemoteError> {
        self.backend.list_tasks(&self.user_id()?)
    }

    async fn insert(&self, task: NewTask) -> Result<Task, RemoteError> {
        let user_id = self.user_id()?;
        if task.user_id != user_id {
            return Err(RemoteError::Unauthenticated);
        }
        self.backend
            .insert_task(&user_id, &task.task, Some(&self.client_id))
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, RemoteError> {
        self.backend
            .update_task(&self.user_id()?, id, &patch, Some(&self.client_id))
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.backend
            .delete_task(&self.user_id()?, id, Some(&self.client_id))
    }
}

impl ChangeFeed for Client {
    fn subscribe(&self) -> Subscription {
        Subscription::following(self.backend.subscribe(), self.auth_state.subscribe())
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }
}
