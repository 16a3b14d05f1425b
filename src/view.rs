//! The to-do list view: optimistic mutations against the local stores,
//! persisted through the remote collaborators and rolled back on failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::models::{NewTask, Task, TaskPatch};
use crate::remote::{AuthClient, RemoteError, TodoTable};
use crate::store::{SessionStore, TodoStore};
use crate::validate::{self, FieldErrors};

pub const ROOT_PATH: &str = "/";
const PLACEHOLDER_PREFIX: &str = "local-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The remote write succeeded and the local state was reconciled.
    Committed,
    /// The remote write failed and the optimistic change was undone.
    RolledBack,
    /// A newer mutation of the same task was issued while this one was in
    /// flight, so its result was ignored.
    Stale,
    /// Nothing was attempted.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutOutcome {
    Redirect(&'static str),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub id: String,
    pub task: String,
}

pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

// Book-keeping for the mutations of one task that are still in flight.
struct Ticket {
    latest: u64,
    in_flight: usize,
    // Last text the server is known to hold.
    baseline: String,
    rolled_back: bool,
}

enum Settle {
    Latest { baseline: String },
    Stale { reapply: bool },
}

pub struct TodoView {
    session: SessionStore,
    todos: TodoStore,
    auth: Arc<dyn AuthClient>,
    table: Arc<dyn TodoTable>,
    editing: Mutex<Option<EditDraft>>,
    tickets: Mutex<HashMap<String, Ticket>>,
    next_seq: AtomicU64,
    next_placeholder: AtomicU64,
}

impl TodoView {
    pub fn new(
        session: SessionStore,
        todos: TodoStore,
        auth: Arc<dyn AuthClient>,
        table: Arc<dyn TodoTable>,
    ) -> Self {
        Self {
            session,
            todos,
            auth,
            table,
            editing: Mutex::new(None),
            tickets: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            next_placeholder: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn todos(&self) -> &TodoStore {
        &self.todos
    }

    /// Fills the session store from the auth collaborator.
    pub async fn restore_session(&self) -> Result<(), RemoteError> {
        match self.auth.get_session().await? {
            Some(identity) => self.session.set_user(identity),
            None => self.session.clear_user(),
        }
        Ok(())
    }

    /// Full fetch; replaces the collection on success.
    pub async fn load(&self) -> Result<(), RemoteError> {
        let todos = self.table.select().await.map_err(|err| {
            warn!(error = %err, "Loading todos failed");
            err
        })?;
        info!(count = todos.len(), "Loaded todos");
        self.todos.set_todos(todos);
        Ok(())
    }

    pub fn can_modify(&self, task: &Task) -> bool {
        !is_placeholder(&task.id)
            && self.session.user_id().as_deref() == Some(task.user_id.as_str())
    }

    pub async fn create(&self, text: &str) -> MutationOutcome {
        let Some(user_id) = self.session.user_id() else {
            warn!("Create attempted without a session");
            return MutationOutcome::Skipped;
        };

        let placeholder = Task {
            id: self.placeholder_id(),
            user_id: user_id.clone(),
            task: text.to_string(),
            is_complete: false,
        };
        let placeholder_id = placeholder.id.clone();
        self.todos.add_todo(placeholder);

        let new = NewTask {
            user_id,
            task: text.to_string(),
        };
        match self.table.insert(new).await {
            Ok(stored) => {
                debug!(placeholder = %placeholder_id, id = %stored.id, "Insert confirmed");
                self.todos.confirm_todo(&placeholder_id, stored);
                MutationOutcome::Committed
            }
            Err(err) => {
                warn!(placeholder = %placeholder_id, error = %err, "Insert failed, rolling back");
                self.todos.delete_todo(&placeholder_id);
                MutationOutcome::RolledBack
            }
        }
    }

    pub async fn update(&self, id: &str, text: &str) -> MutationOutcome {
        if is_placeholder(id) {
            return MutationOutcome::Skipped;
        }
        let Some(current) = self.todos.get(id) else {
            return MutationOutcome::Skipped;
        };

        let seq = self.begin(id, &current.task);
        self.todos.update_todo(id, text);

        let result = self.table.update(id, TaskPatch::text(text)).await;
        let confirmed = result.as_ref().ok().map(|task| task.task.clone());

        match self.settle(id, seq, result.is_ok(), confirmed.as_deref()) {
            Settle::Stale { reapply } => {
                debug!(id, seq, "Discarding stale update completion");
                if let (true, Some(text)) = (reapply, &confirmed) {
                    self.todos.update_todo(id, text);
                }
                MutationOutcome::Stale
            }
            Settle::Latest { .. } if result.is_ok() => {
                self.finish_edit(id);
                MutationOutcome::Committed
            }
            Settle::Latest { baseline } => {
                if let Err(err) = &result {
                    warn!(id, error = %err, "Update failed, rolling back");
                }
                self.todos.update_todo(id, &baseline);
                MutationOutcome::RolledBack
            }
        }
    }

    pub async fn delete(&self, id: &str) -> MutationOutcome {
        if is_placeholder(id) {
            return MutationOutcome::Skipped;
        }
        let Some(current) = self.todos.get(id) else {
            return MutationOutcome::Skipped;
        };

        let mut snapshot = self.todos.snapshot();
        let seq = self.begin(id, &current.task);
        self.todos.delete_todo(id);

        let result = self.table.delete(id).await;

        let baseline = match self.settle(id, seq, result.is_ok(), None) {
            Settle::Stale { .. } => {
                debug!(id, seq, "Discarding stale delete completion");
                return MutationOutcome::Stale;
            }
            Settle::Latest { baseline } => baseline,
        };
        match result {
            Ok(()) => MutationOutcome::Committed,
            Err(err) => {
                warn!(id, error = %err, "Delete failed, restoring snapshot");
                // The snapshot may carry text of an edit still in flight.
                for task in snapshot.iter_mut().filter(|t| t.id == id) {
                    task.task = baseline.clone();
                }
                self.todos.set_todos(snapshot);
                MutationOutcome::RolledBack
            }
        }
    }

    pub async fn sign_out(&self) -> SignOutOutcome {
        match self.auth.sign_out().await {
            Ok(()) => {
                self.session.clear_user();
                *self.draft() = None;
                SignOutOutcome::Redirect(ROOT_PATH)
            }
            Err(err) => {
                warn!(error = %err, "Sign-out failed");
                SignOutOutcome::Failed
            }
        }
    }

    /// Selects a task for editing. Only the owner's settled tasks qualify.
    pub fn begin_edit(&self, id: &str) -> bool {
        match self.todos.get(id) {
            Some(task) if self.can_modify(&task) => {
                *self.draft() = Some(EditDraft {
                    id: task.id,
                    task: task.task,
                });
                true
            }
            _ => false,
        }
    }

    pub fn set_draft(&self, text: &str) {
        if let Some(draft) = self.draft().as_mut() {
            draft.task = text.to_string();
        }
    }

    pub fn cancel_edit(&self) {
        *self.draft() = None;
    }

    pub fn editing(&self) -> Option<EditDraft> {
        self.draft().clone()
    }

    /// Shared submit handler of the task form: saves the pending edit if
    /// there is one, otherwise creates a task from `input`.
    pub async fn submit(&self, input: &str) -> Result<MutationOutcome, FieldErrors> {
        if let Some(draft) = self.editing() {
            if draft.id.is_empty() || draft.task.is_empty() {
                return Ok(MutationOutcome::Skipped);
            }
            let unchanged = self
                .todos
                .get(&draft.id)
                .is_some_and(|task| task.task == draft.task);
            if unchanged {
                self.cancel_edit();
                return Ok(MutationOutcome::Skipped);
            }
            return Ok(self.update(&draft.id, &draft.task).await);
        }

        validate::task(input)?;
        Ok(self.create(input).await)
    }

    fn draft(&self) -> MutexGuard<'_, Option<EditDraft>> {
        self.editing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_edit(&self, id: &str) {
        let mut draft = self.draft();
        if draft.as_ref().is_some_and(|d| d.id == id) {
            *draft = None;
        }
    }

    fn placeholder_id(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let n = self.next_placeholder.fetch_add(1, Ordering::Relaxed);
        format!("{PLACEHOLDER_PREFIX}{millis}-{n}")
    }

    fn tickets(&self) -> MutexGuard<'_, HashMap<String, Ticket>> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, id: &str, current_text: &str) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut tickets = self.tickets();
        let ticket = tickets.entry(id.to_string()).or_insert_with(|| Ticket {
            latest: seq,
            in_flight: 0,
            baseline: current_text.to_string(),
            rolled_back: false,
        });
        ticket.latest = seq;
        ticket.in_flight += 1;
        seq
    }

    // Records the completion of mutation `seq` on `id`. `confirmed` is the
    // text the server now holds, when known.
    fn settle(&self, id: &str, seq: u64, succeeded: bool, confirmed: Option<&str>) -> Settle {
        let mut tickets = self.tickets();
        let Some(ticket) = tickets.get_mut(id) else {
            return Settle::Stale { reapply: false };
        };
        if let Some(text) = confirmed {
            ticket.baseline = text.to_string();
        }
        ticket.in_flight -= 1;

        let settle = if ticket.latest == seq {
            ticket.rolled_back = !succeeded;
            Settle::Latest {
                baseline: ticket.baseline.clone(),
            }
        } else {
            // An older write that lands after the newest one was rolled back
            // is what the server holds now.
            Settle::Stale {
                reapply: ticket.rolled_back && confirmed.is_some(),
            }
        };
        if ticket.in_flight == 0 {
            tickets.remove(id);
        }
        settle
    }
}
