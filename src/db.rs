use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, Result, Row};

use crate::models::{Identity, Session, Task, TaskPatch};

pub type DbPool = Arc<Mutex<Connection>>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT UNIQUE NOT NULL,
        username TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at INTEGER DEFAULT (strftime('%s', 'now'))
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at INTEGER DEFAULT (strftime('%s', 'now')),
        expires_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS todos (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        task TEXT NOT NULL,
        is_complete INTEGER DEFAULT 0,
        created_at INTEGER DEFAULT (strftime('%s', 'now'))
    );

    CREATE INDEX IF NOT EXISTS todos_user_id ON todos(user_id);
";

pub fn open_db(path: impl AsRef<Path>) -> Result<DbPool> {
    let conn = Connection::open(path)?;
    migrate(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn open_in_memory() -> Result<DbPool> {
    let conn = Connection::open_in_memory()?;
    migrate(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)
}

fn lock(pool: &DbPool) -> MutexGuard<'_, Connection> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct UserRow {
    pub identity: Identity,
    pub password_hash: String,
}

// User operations
pub fn insert_user(pool: &DbPool, identity: &Identity, password_hash: &str) -> Result<()> {
    let conn = lock(pool);
    conn.execute(
        "INSERT INTO users (id, email, username, password_hash) VALUES (?1, ?2, ?3, ?4)",
        (&identity.id, &identity.email, &identity.username, password_hash),
    )?;
    Ok(())
}

pub fn user_by_email(pool: &DbPool, email: &str) -> Result<Option<UserRow>> {
    let conn = lock(pool);
    let mut stmt =
        conn.prepare("SELECT id, email, username, password_hash FROM users WHERE email = ?1")?;
    let mut rows = stmt.query([email])?;

    if let Some(row) = rows.next()? {
        Ok(Some(UserRow {
            identity: Identity {
                id: row.get(0)?,
                email: row.get(1)?,
                username: row.get(2)?,
            },
            password_hash: row.get(3)?,
        }))
    } else {
        Ok(None)
    }
}

pub fn identity_by_id(pool: &DbPool, id: &str) -> Result<Option<Identity>> {
    let conn = lock(pool);
    let mut stmt = conn.prepare("SELECT id, email, username FROM users WHERE id = ?1")?;
    let mut rows = stmt.query([id])?;

    if let Some(row) = rows.next()? {
        Ok(Some(Identity {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
        }))
    } else {
        Ok(None)
    }
}

// Session operations
pub fn create_session(pool: &DbPool, session: &Session) -> Result<()> {
    let conn = lock(pool);
    conn.execute(
        "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        (
            &session.id,
            &session.user_id,
            session.created_at,
            session.expires_at,
        ),
    )?;
    Ok(())
}

pub fn get_session(pool: &DbPool, id: &str) -> Result<Option<Session>> {
    let conn = lock(pool);
    let mut stmt =
        conn.prepare("SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?1")?;
    let mut rows = stmt.query([id])?;

    if let Some(row) = rows.next()? {
        Ok(Some(Session {
            id: row.get(0)?,
            user_id: row.get(1)?,
            created_at: row.get(2)?,
            expires_at: row.get(3)?,
        }))
    } else {
        Ok(None)
    }
}

pub fn delete_session(pool: &DbPool, id: &str) -> Result<bool> {
    let conn = lock(pool);
    let rows = conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
    Ok(rows > 0)
}

pub fn cleanup_expired_sessions(pool: &DbPool, now: i64) -> Result<usize> {
    let conn = lock(pool);
    conn.execute("DELETE FROM sessions WHERE expires_at < ?1", [now])
}

// Todo operations
fn task_from_row(row: &Row<'_>) -> Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task: row.get(2)?,
        is_complete: row.get::<_, i32>(3)? != 0,
    })
}

pub fn insert_task(pool: &DbPool, task: &Task) -> Result<()> {
    let conn = lock(pool);
    conn.execute(
        "INSERT INTO todos (id, user_id, task, is_complete) VALUES (?1, ?2, ?3, ?4)",
        (&task.id, &task.user_id, &task.task, task.is_complete as i32),
    )?;
    Ok(())
}

pub fn list_tasks(pool: &DbPool, user_id: &str) -> Result<Vec<Task>> {
    let conn = lock(pool);
    let mut stmt = conn.prepare(
        "SELECT id, user_id, task, is_complete FROM todos WHERE user_id = ?1 ORDER BY rowid ASC",
    )?;
    let tasks = stmt
        .query_map([user_id], task_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(tasks)
}

pub fn get_task(pool: &DbPool, id: &str) -> Result<Option<Task>> {
    let conn = lock(pool);
    get_task_internal(&conn, id)
}

fn get_task_internal(conn: &Connection, id: &str) -> Result<Option<Task>> {
    let mut stmt =
        conn.prepare("SELECT id, user_id, task, is_complete FROM todos WHERE id = ?1")?;
    let mut rows = stmt.query([id])?;

    if let Some(row) = rows.next()? {
        Ok(Some(task_from_row(row)?))
    } else {
        Ok(None)
    }
}

pub fn update_task(pool: &DbPool, id: &str, patch: &TaskPatch) -> Result<Option<Task>> {
    let conn = lock(pool);

    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(t) = &patch.task {
        updates.push("task = ?");
        params.push(Box::new(t.clone()));
    }
    if let Some(c) = patch.is_complete {
        updates.push("is_complete = ?");
        params.push(Box::new(c as i32));
    }

    if updates.is_empty() {
        return get_task_internal(&conn, id);
    }

    params.push(Box::new(id.to_string()));
    let query = format!("UPDATE todos SET {} WHERE id = ?", updates.join(", "));

    let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    conn.execute(&query, params_refs.as_slice())?;

    get_task_internal(&conn, id)
}

pub fn delete_task(pool: &DbPool, id: &str) -> Result<bool> {
    let conn = lock(pool);
    let rows = conn.execute("DELETE FROM todos WHERE id = ?1", [id])?;
    Ok(rows > 0)
}
