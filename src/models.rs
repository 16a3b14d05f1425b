use serde::{Deserialize, Serialize};

/// The signed-in user as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub task: String,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub user_id: String,
    pub task: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub task: Option<String>,
    pub is_complete: Option<bool>,
}

impl TaskPatch {
    pub fn text(task: impl Into<String>) -> Self {
        Self {
            task: Some(task.into()),
            is_complete: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level notification from the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "eventType")]
    pub event_type: ChangeKind,
    pub new: Option<Task>,
    pub old: Option<Task>,
    /// Client id of the writer, when the write came through a known client.
    pub origin: Option<String>,
}

impl ChangeEvent {
    pub fn insert(task: Task, origin: Option<String>) -> Self {
        Self {
            event_type: ChangeKind::Insert,
            new: Some(task),
            old: None,
            origin,
        }
    }

    pub fn update(old: Task, new: Task, origin: Option<String>) -> Self {
        Self {
            event_type: ChangeKind::Update,
            new: Some(new),
            old: Some(old),
            origin,
        }
    }

    pub fn delete(old: Task, origin: Option<String>) -> Self {
        Self {
            event_type: ChangeKind::Delete,
            new: None,
            old: Some(old),
            origin,
        }
    }

    /// Owner of the affected row.
    pub fn user_id(&self) -> Option<&str> {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .map(|t| t.user_id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub task: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<Identity>,
}
