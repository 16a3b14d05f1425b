use std::sync::Arc;

use tokio::sync::watch;

use crate::models::Task;

/// Ordered task collection. Every operation is total: unknown ids are
/// ignored and ids are not checked for uniqueness.
#[derive(Clone)]
pub struct TodoStore {
    todos: Arc<watch::Sender<Vec<Task>>>,
}

impl Default for TodoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TodoStore {
    pub fn new() -> Self {
        let (todos, _) = watch::channel(Vec::new());
        Self {
            todos: Arc::new(todos),
        }
    }

    pub fn set_todos(&self, todos: Vec<Task>) {
        self.todos.send_replace(todos);
    }

    pub fn add_todo(&self, task: Task) {
        self.todos.send_modify(|todos| todos.push(task));
    }

    pub fn update_todo(&self, id: &str, text: &str) {
        self.todos.send_if_modified(|todos| {
            let mut modified = false;
            for todo in todos.iter_mut().filter(|t| t.id == id) {
                todo.task = text.to_string();
                modified = true;
            }
            modified
        });
    }

    pub fn delete_todo(&self, id: &str) {
        self.todos.send_if_modified(|todos| {
            let before = todos.len();
            todos.retain(|t| t.id != id);
            todos.len() != before
        });
    }

    /// Swaps a pending placeholder for the record the server stored,
    /// keeping its position.
    pub fn confirm_todo(&self, placeholder_id: &str, task: Task) {
        self.todos.send_if_modified(|todos| {
            match todos.iter_mut().find(|t| t.id == placeholder_id) {
                Some(slot) => {
                    *slot = task;
                    true
                }
                None => false,
            }
        });
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.todos.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.todos.borrow().iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.todos.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.todos.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, text: &str) -> Task {
        Task {
            id: id.to_string(),
            user_id: "u1".to_string(),
            task: text.to_string(),
            is_complete: false,
        }
    }

    enum Op {
        Add(Task),
        Update(&'static str, &'static str),
        Delete(&'static str),
    }

    fn reduce(mut todos: Vec<Task>, op: &Op) -> Vec<Task> {
        match op {
            Op::Add(t) => todos.push(t.clone()),
            Op::Update(id, text) => todos
                .iter_mut()
                .filter(|t| t.id == *id)
                .for_each(|t| t.task = text.to_string()),
            Op::Delete(id) => todos.retain(|t| t.id != *id),
        }
        todos
    }

    #[test]
    fn store_matches_reducer_fold() {
        let ops = vec![
            Op::Add(task("1", "buy milk")),
            Op::Add(task("2", "walk dog")),
            Op::Update("1", "buy oat milk"),
            Op::Update("missing", "ignored"),
            Op::Add(task("3", "call mom")),
            Op::Delete("2"),
            Op::Delete("missing"),
            Op::Add(task("1", "duplicate id")),
            Op::Update("1", "both change"),
        ];

        let store = TodoStore::new();
        let mut expected = Vec::new();
        for op in &ops {
            match op {
                Op::Add(t) => store.add_todo(t.clone()),
                Op::Update(id, text) => store.update_todo(id, text),
                Op::Delete(id) => store.delete_todo(id),
            }
            expected = reduce(expected, op);
            assert_eq!(store.snapshot(), expected);
        }
        assert_eq!(store.snapshot().iter().filter(|t| t.id == "1").count(), 2);
    }

    #[test]
    fn add_update_delete_leaves_empty() {
        let store = TodoStore::new();
        store.add_todo(task("1", "buy milk"));
        store.update_todo("1", "buy oat milk");
        assert_eq!(store.get("1").unwrap().task, "buy oat milk");
        store.delete_todo("1");
        assert!(store.is_empty());
    }

    #[test]
    fn set_todos_replaces_everything() {
        let store = TodoStore::new();
        store.add_todo(task("1", "old"));
        store.set_todos(vec![task("a", "x"), task("b", "y")]);
        assert_eq!(store.len(), 2);
        assert!(store.get("1").is_none());
    }

    #[test]
    fn confirm_keeps_position() {
        let store = TodoStore::new();
        store.add_todo(task("a", "first"));
        store.add_todo(task("local-1", "pending"));
        store.add_todo(task("c", "third"));

        store.confirm_todo("local-1", task("server-9", "pending"));
        let ids: Vec<_> = store.snapshot().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["a", "server-9", "c"]);

        store.confirm_todo("local-404", task("server-10", "nothing"));
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn noop_mutations_do_not_notify() {
        let store = TodoStore::new();
        let mut rx = store.subscribe();

        store.update_todo("missing", "x");
        store.delete_todo("missing");
        assert!(!rx.has_changed().unwrap());

        store.add_todo(task("1", "buy milk"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
