use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::auth::{
    generate_session_id, generate_token, hash_password, unix_now, verify_password,
    SESSION_TTL_SECS,
};
use crate::db::{self, DbPool};
use crate::models::{ChangeEvent, Identity, Session, Task, TaskPatch};
use crate::remote::RemoteError;

const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct OAuthProvider {
    pub name: String,
    pub client_id: String,
    pub authorize_url: Url,
}

/// The hosted side: accounts, sessions, the `todos` table and its change feed.
#[derive(Clone)]
pub struct Backend {
    db: DbPool,
    changes: broadcast::Sender<ChangeEvent>,
    providers: Arc<Vec<OAuthProvider>>,
    public_url: Arc<String>,
}

impl Backend {
    pub fn new(db: DbPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            db,
            changes,
            providers: Arc::new(Vec::new()),
            public_url: Arc::new(String::new()),
        }
    }

    pub fn with_oauth(mut self, providers: Vec<OAuthProvider>, public_url: &str) -> Self {
        self.providers = Arc::new(providers);
        self.public_url = Arc::new(public_url.trim_end_matches('/').to_string());
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<(Identity, Session), RemoteError> {
        let email = normalize_email(email);
        if db::user_by_email(&self.db, &email)?.is_some() {
            return Err(RemoteError::EmailTaken);
        }

        let identity = Identity {
            id: Uuid::new_v4().to_string(),
            email,
            username: username.trim().to_string(),
        };
        let hash = hash_password(password)?;
        db::insert_user(&self.db, &identity, &hash)?;
        info!(user_id = %identity.id, "User signed up");

        let session = self.open_session(&identity)?;
        Ok((identity, session))
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<(Identity, Session), RemoteError> {
        let user = db::user_by_email(&self.db, &normalize_email(email))?
            .ok_or(RemoteError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(RemoteError::InvalidCredentials);
        }

        let session = self.open_session(&user.identity)?;
        info!(user_id = %user.identity.id, "User signed in");
        Ok((user.identity, session))
    }

    fn open_session(&self, identity: &Identity) -> Result<Session, RemoteError> {
        let now = unix_now();
        let session = Session {
            id: generate_session_id(),
            user_id: identity.id.clone(),
            created_at: now,
            expires_at: now + SESSION_TTL_SECS,
        };
        db::create_session(&self.db, &session)?;
        Ok(session)
    }

    /// Identity behind a session token, if the session exists and is unexpired.
    pub fn identity_for(&self, token: &str) -> Result<Option<Identity>, RemoteError> {
        match db::get_session(&self.db, token)? {
            Some(session) if session.expires_at > unix_now() => {
                Ok(db::identity_by_id(&self.db, &session.user_id)?)
            }
            _ => Ok(None),
        }
    }

    pub fn sign_out(&self, token: &str) -> Result<(), RemoteError> {
        if db::delete_session(&self.db, token)? {
            info!("User signed out");
        }
        Ok(())
    }

    pub fn cleanup_expired_sessions(&self) -> Result<usize, RemoteError> {
        Ok(db::cleanup_expired_sessions(&self.db, unix_now())?)
    }

    pub fn oauth_authorize_url(&self, provider: &str) -> Result<String, RemoteError> {
        let config = self
            .providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(provider))
            .ok_or_else(|| RemoteError::UnsupportedProvider(provider.to_string()))?;

        let mut url = config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &format!("{}/todos", self.public_url))
            .append_pair("state", &generate_token());
        Ok(url.into())
    }

    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, RemoteError> {
        Ok(db::list_tasks(&self.db, user_id)?)
    }

    pub fn insert_task(
        &self,
        user_id: &str,
        text: &str,
        origin: Option<&str>,
    ) -> Result<Task, RemoteError> {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            task: text.to_string(),
            is_complete: false,
        };
        db::insert_task(&self.db, &task)?;
        info!(id = %task.id, task = %task.task, "Created todo");

        self.publish(ChangeEvent::insert(task.clone(), origin.map(str::to_string)));
        Ok(task)
    }

    pub fn update_task(
        &self,
        user_id: &str,
        id: &str,
        patch: &TaskPatch,
        origin: Option<&str>,
    ) -> Result<Task, RemoteError> {
        let old = self.owned_task(user_id, id)?;
        let new = db::update_task(&self.db, id, patch)?.ok_or(RemoteError::NotFound)?;
        info!(id = %new.id, is_complete = new.is_complete, "Updated todo");

        self.publish(ChangeEvent::update(old, new.clone(), origin.map(str::to_string)));
        Ok(new)
    }

    pub fn delete_task(
        &self,
        user_id: &str,
        id: &str,
        origin: Option<&str>,
    ) -> Result<(), RemoteError> {
        let old = self.owned_task(user_id, id)?;
        if !db::delete_task(&self.db, id)? {
            return Err(RemoteError::NotFound);
        }
        info!(id, "Deleted todo");

        self.publish(ChangeEvent::delete(old, origin.map(str::to_string)));
        Ok(())
    }

    // Rows belonging to someone else are indistinguishable from missing ones.
    fn owned_task(&self, user_id: &str, id: &str) -> Result<Task, RemoteError> {
        match db::get_task(&self.db, id)? {
            Some(task) if task.user_id == user_id => Ok(task),
            _ => Err(RemoteError::NotFound),
        }
    }

    fn publish(&self, event: ChangeEvent) {
        match self.changes.send(event) {
            Ok(count) => debug!(count, "Change event delivered"),
            Err(_) => debug!("No change feed subscribers"),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeKind;

    fn backend() -> Backend {
        Backend::new(db::open_in_memory().unwrap())
    }

    #[test]
    fn sign_up_then_sign_in() {
        let backend = backend();
        let (created, session) = backend
            .sign_up("Alice@Example.com ", "secret1", "alice")
            .unwrap();
        assert_eq!(created.email, "alice@example.com");
        assert_eq!(
            backend.identity_for(&session.id).unwrap(),
            Some(created.clone())
        );

        let (signed_in, _) = backend.sign_in("alice@example.com", "secret1").unwrap();
        assert_eq!(signed_in, created);

        assert!(matches!(
            backend.sign_in("alice@example.com", "wrong-password"),
            Err(RemoteError::InvalidCredentials)
        ));
        assert!(matches!(
            backend.sign_up("alice@example.com", "secret1", "alice2"),
            Err(RemoteError::EmailTaken)
        ));
    }

    #[test]
    fn sign_out_invalidates_session() {
        let backend = backend();
        let (_, session) = backend.sign_up("bob@example.com", "secret1", "bob").unwrap();
        backend.sign_out(&session.id).unwrap();
        assert_eq!(backend.identity_for(&session.id).unwrap(), None);
    }

    #[test]
    fn writes_publish_tagged_events() {
        let backend = backend();
        let (user, _) = backend.sign_up("carol@example.com", "secret1", "carol").unwrap();
        let mut rx = backend.subscribe();

        let task = backend.insert_task(&user.id, "buy milk", Some("c1")).unwrap();
        backend
            .update_task(&user.id, &task.id, &TaskPatch::text("buy oat milk"), None)
            .unwrap();
        backend.delete_task(&user.id, &task.id, Some("c1")).unwrap();

        let insert = rx.try_recv().unwrap();
        assert_eq!(insert.event_type, ChangeKind::Insert);
        assert_eq!(insert.origin.as_deref(), Some("c1"));

        let update = rx.try_recv().unwrap();
        assert_eq!(update.event_type, ChangeKind::Update);
        assert_eq!(update.old.unwrap().task, "buy milk");
        assert_eq!(update.new.unwrap().task, "buy oat milk");
        assert_eq!(update.origin, None);

        let delete = rx.try_recv().unwrap();
        assert_eq!(delete.event_type, ChangeKind::Delete);
        assert_eq!(delete.old.unwrap().id, task.id);
    }

    #[test]
    fn foreign_rows_behave_as_missing() {
        let backend = backend();
        let (owner, _) = backend.sign_up("dan@example.com", "secret1", "dan").unwrap();
        let (intruder, _) = backend.sign_up("eve@example.com", "secret1", "eve").unwrap();
        let task = backend.insert_task(&owner.id, "private", None).unwrap();

        assert!(backend.list_tasks(&intruder.id).unwrap().is_empty());
        assert!(matches!(
            backend.update_task(&intruder.id, &task.id, &TaskPatch::text("mine"), None),
            Err(RemoteError::NotFound)
        ));
        assert!(matches!(
            backend.delete_task(&intruder.id, &task.id, None),
            Err(RemoteError::NotFound)
        ));
        assert_eq!(backend.list_tasks(&owner.id).unwrap()[0].task, "private");
    }

    #[test]
    fn oauth_url_carries_client_and_redirect() {
        let provider = OAuthProvider {
            name: "github".to_string(),
            client_id: "abc123".to_string(),
            authorize_url: Url::parse("https://github.com/login/oauth/authorize").unwrap(),
        };
        let backend = backend().with_oauth(vec![provider], "https://todo.example.com/");

        let url = Url::parse(&backend.oauth_authorize_url("GitHub").unwrap()).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".to_string(), "abc123".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "https://todo.example.com/todos".to_string()
        )));

        assert!(matches!(
            backend.oauth_authorize_url("gitlab"),
            Err(RemoteError::UnsupportedProvider(_))
        ));
    }
}
