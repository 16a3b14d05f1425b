use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::{ChangeEvent, ChangeKind};
use crate::remote::Subscription;
use crate::store::TodoStore;

/// Applies change-feed events to a [`TodoStore`].
///
/// Events stamped with this reconciler's own client id are skipped: the view
/// already applied them optimistically and swapped in the server id on
/// confirmation. Everything else is applied as-is, so an insert whose id is
/// already present appends a second entry.
#[derive(Clone)]
pub struct Reconciler {
    store: TodoStore,
    client_id: Option<String>,
}

impl Reconciler {
    pub fn new(store: TodoStore, client_id: Option<String>) -> Self {
        Self { store, client_id }
    }

    /// Returns `false` when the event was suppressed or carried no row.
    pub fn apply(&self, event: &ChangeEvent) -> bool {
        if self.client_id.is_some() && event.origin == self.client_id {
            debug!(kind = ?event.event_type, "Skipping self-originated change");
            return false;
        }

        match (event.event_type, &event.new, &event.old) {
            (ChangeKind::Insert, Some(new), _) => self.store.add_todo(new.clone()),
            (ChangeKind::Update, Some(new), _) => self.store.update_todo(&new.id, &new.task),
            (ChangeKind::Delete, _, Some(old)) => self.store.delete_todo(&old.id),
            _ => return false,
        }
        true
    }

    pub async fn run(self, mut subscription: Subscription) {
        while let Some(event) = subscription.next().await {
            self.apply(&event);
        }
        info!("Change feed closed");
    }

    pub fn spawn(self, subscription: Subscription) -> JoinHandle<()> {
        tokio::spawn(self.run(subscription))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;
    use tokio::sync::broadcast;

    fn task(id: &str, text: &str) -> Task {
        Task {
            id: id.to_string(),
            user_id: "u1".to_string(),
            task: text.to_string(),
            is_complete: false,
        }
    }

    #[test]
    fn dispatches_by_kind() {
        let store = TodoStore::new();
        let reconciler = Reconciler::new(store.clone(), Some("me".to_string()));

        assert!(reconciler.apply(&ChangeEvent::insert(task("1", "buy milk"), None)));
        assert!(reconciler.apply(&ChangeEvent::update(
            task("1", "buy milk"),
            task("1", "buy oat milk"),
            Some("other".to_string()),
        )));
        assert_eq!(store.get("1").unwrap().task, "buy oat milk");

        assert!(reconciler.apply(&ChangeEvent::delete(task("1", "buy oat milk"), None)));
        assert!(store.is_empty());
    }

    #[test]
    fn foreign_insert_of_known_id_duplicates() {
        let store = TodoStore::new();
        store.add_todo(task("1", "buy milk"));
        let reconciler = Reconciler::new(store.clone(), Some("me".to_string()));

        reconciler.apply(&ChangeEvent::insert(
            task("1", "buy milk"),
            Some("someone-else".to_string()),
        ));
        assert_eq!(store.snapshot().iter().filter(|t| t.id == "1").count(), 2);
    }

    #[test]
    fn own_echo_is_suppressed() {
        let store = TodoStore::new();
        store.add_todo(task("1", "buy milk"));
        let reconciler = Reconciler::new(store.clone(), Some("me".to_string()));

        assert!(!reconciler.apply(&ChangeEvent::insert(
            task("1", "buy milk"),
            Some("me".to_string()),
        )));
        assert_eq!(store.snapshot().iter().filter(|t| t.id == "1").count(), 1);
    }

    #[test]
    fn anonymous_reconciler_applies_everything() {
        let store = TodoStore::new();
        let reconciler = Reconciler::new(store.clone(), None);
        reconciler.apply(&ChangeEvent::insert(task("1", "a"), None));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn malformed_events_are_ignored() {
        let store = TodoStore::new();
        let reconciler = Reconciler::new(store.clone(), None);
        let event = ChangeEvent {
            event_type: ChangeKind::Delete,
            new: Some(task("1", "a")),
            old: None,
            origin: None,
        };
        assert!(!reconciler.apply(&event));
    }

    #[tokio::test]
    async fn spawned_loop_drains_until_closed() {
        let (tx, rx) = broadcast::channel(16);
        let store = TodoStore::new();
        let handle =
            Reconciler::new(store.clone(), None).spawn(Subscription::new(rx, None));

        tx.send(ChangeEvent::insert(task("1", "a"), None)).unwrap();
        tx.send(ChangeEvent::insert(task("2", "b"), None)).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(store.len(), 2);
    }
}
