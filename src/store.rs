use crate::model::{
    format_timestamp, now, DateKey, DateKeyError, NewTodo, Todo, TodoId, TodoPatch,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    InvalidDateKey(#[from] DateKeyError),
    #[error("invalid timestamp {0:?} in todo {1}")]
    InvalidTimestamp(String, TodoId),
    #[error("todo text must not be empty")]
    EmptyText,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam for todos. Lookups that miss return `Ok(None)` / `Ok(false)`.
pub trait TodoStore {
    fn list_by_date(&self, key: &DateKey) -> StoreResult<Vec<Todo>>;
    fn list_all(&self) -> StoreResult<Vec<Todo>>;
    fn get(&self, id: TodoId) -> StoreResult<Option<Todo>>;
    fn create(&mut self, todo: NewTodo) -> StoreResult<Todo>;
    fn update(&mut self, id: TodoId, patch: &TodoPatch) -> StoreResult<Option<Todo>>;
    fn delete(&mut self, id: TodoId) -> StoreResult<bool>;

    fn toggle_complete(&mut self, id: TodoId) -> StoreResult<Option<Todo>> {
        let Some(todo) = self.get(id)? else {
            return Ok(None);
        };
        let completed_at = if todo.completed_at.is_some() {
            None
        } else {
            Some(now())
        };
        self.update(
            id,
            &TodoPatch {
                completed_at: Some(completed_at),
                ..Default::default()
            },
        )
    }

    /// Loads several buckets at once; every requested key is present in the result.
    fn list_range(&self, keys: &[DateKey]) -> StoreResult<BTreeMap<DateKey, Vec<Todo>>> {
        let mut out = BTreeMap::new();
        for key in keys {
            out.insert(*key, self.list_by_date(key)?);
        }
        Ok(out)
    }
}

pub struct SqliteStore {
    conn: Connection,
}

const SELECT_COLUMNS: &str = "SELECT id, text, completed_at, assigned_date, created_at FROM todos";

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        debug!(path = %path.display(), "opening todo database");
        Self::with_connection(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                completed_at TEXT,
                assigned_date TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_todos_assigned_date ON todos(assigned_date);",
        )?;
        Ok(SqliteStore { conn })
    }

    fn query(&self, sql: &str, param: Option<String>) -> StoreResult<Vec<Todo>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = match param {
            Some(p) => stmt.query_map(params![p], RawTodo::from_row)?,
            None => stmt.query_map([], RawTodo::from_row)?,
        };
        let mut todos = Vec::new();
        for raw in rows {
            todos.push(raw?.into_todo()?);
        }
        Ok(todos)
    }
}

impl TodoStore for SqliteStore {
    fn list_by_date(&self, key: &DateKey) -> StoreResult<Vec<Todo>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE assigned_date = ?1 ORDER BY created_at ASC, id ASC"),
            Some(key.to_string()),
        )
    }

    fn list_all(&self) -> StoreResult<Vec<Todo>> {
        self.query(
            &format!("{SELECT_COLUMNS} ORDER BY created_at ASC, id ASC"),
            None,
        )
    }

    fn get(&self, id: TodoId) -> StoreResult<Option<Todo>> {
        let raw = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                RawTodo::from_row,
            )
            .optional()?;
        raw.map(RawTodo::into_todo).transpose()
    }

    fn create(&mut self, todo: NewTodo) -> StoreResult<Todo> {
        if todo.text.trim().is_empty() {
            return Err(StoreError::EmptyText);
        }
        let mut created = Todo {
            id: 0,
            text: todo.text,
            completed_at: todo.completed_at,
            assigned_date: todo.assigned_date,
            created_at: todo.created_at,
        };
        created.truncate_timestamps();
        self.conn.execute(
            "INSERT INTO todos (text, completed_at, assigned_date, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                created.text,
                created.completed_at.as_ref().map(format_timestamp),
                created.assigned_date.map(|k| k.to_string()),
                format_timestamp(&created.created_at),
            ],
        )?;
        created.id = self.conn.last_insert_rowid();
        debug!(id = created.id, "created todo");
        Ok(created)
    }

    fn update(&mut self, id: TodoId, patch: &TodoPatch) -> StoreResult<Option<Todo>> {
        let Some(mut todo) = self.get(id)? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(todo));
        }
        if matches!(&patch.text, Some(t) if t.trim().is_empty()) {
            return Err(StoreError::EmptyText);
        }
        patch.apply(&mut todo);
        todo.truncate_timestamps();
        self.conn.execute(
            "UPDATE todos SET text = ?1, completed_at = ?2, assigned_date = ?3 WHERE id = ?4",
            params![
                todo.text,
                todo.completed_at.as_ref().map(format_timestamp),
                todo.assigned_date.map(|k| k.to_string()),
                id,
            ],
        )?;
        debug!(id, "updated todo");
        Ok(Some(todo))
    }

    fn delete(&mut self, id: TodoId) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM todos WHERE id = ?1", params![id])?;
        debug!(id, changed, "deleted todo");
        Ok(changed > 0)
    }
}

struct RawTodo {
    id: TodoId,
    text: String,
    completed_at: Option<String>,
    assigned_date: Option<String>,
    created_at: String,
}

impl RawTodo {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawTodo {
            id: row.get(0)?,
            text: row.get(1)?,
            completed_at: row.get(2)?,
            assigned_date: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_todo(self) -> StoreResult<Todo> {
        let id = self.id;
        let parse_ts = |raw: String| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| StoreError::InvalidTimestamp(raw, id))
        };
        Ok(Todo {
            id,
            text: self.text,
            completed_at: self.completed_at.map(parse_ts).transpose()?,
            assigned_date: self
                .assigned_date
                .map(|raw| raw.parse::<DateKey>())
                .transpose()?,
            created_at: parse_ts(self.created_at)?,
        })
    }
}

/// Non-persistent store with the same ordering rules as the database.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    todos: BTreeMap<TodoId, Todo>,
    next_id: TodoId,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            todos: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn sorted<'a>(&self, todos: impl Iterator<Item = &'a Todo>) -> Vec<Todo> {
        let mut out: Vec<Todo> = todos.cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }
}

#[cfg(test)]
impl TodoStore for MemoryStore {
    fn list_by_date(&self, key: &DateKey) -> StoreResult<Vec<Todo>> {
        Ok(self.sorted(
            self.todos
                .values()
                .filter(|t| t.assigned_date.as_ref() == Some(key)),
        ))
    }

    fn list_all(&self) -> StoreResult<Vec<Todo>> {
        Ok(self.sorted(self.todos.values()))
    }

    fn get(&self, id: TodoId) -> StoreResult<Option<Todo>> {
        Ok(self.todos.get(&id).cloned())
    }

    fn create(&mut self, todo: NewTodo) -> StoreResult<Todo> {
        if todo.text.trim().is_empty() {
            return Err(StoreError::EmptyText);
        }
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        let mut created = Todo {
            id,
            text: todo.text,
            completed_at: todo.completed_at,
            assigned_date: todo.assigned_date,
            created_at: todo.created_at,
        };
        created.truncate_timestamps();
        self.todos.insert(id, created.clone());
        Ok(created)
    }

    fn update(&mut self, id: TodoId, patch: &TodoPatch) -> StoreResult<Option<Todo>> {
        if matches!(&patch.text, Some(t) if t.trim().is_empty()) {
            return Err(StoreError::EmptyText);
        }
        Ok(self.todos.get_mut(&id).map(|todo| {
            patch.apply(todo);
            todo.truncate_timestamps();
            todo.clone()
        }))
    }

    fn delete(&mut self, id: TodoId) -> StoreResult<bool> {
        Ok(self.todos.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn monday() -> DateKey {
        DateKey::Date(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap())
    }

    fn new_todo(text: &str, key: DateKey, minute: u32) -> NewTodo {
        NewTodo {
            text: text.into(),
            completed_at: None,
            assigned_date: Some(key),
            created_at: Utc.with_ymd_and_hms(2024, 6, 10, 8, minute, 0).unwrap(),
        }
    }

    fn exercise_store(store: &mut dyn TodoStore) {
        let late = store.create(new_todo("late", monday(), 30)).unwrap();
        let early = store.create(new_todo("early", monday(), 5)).unwrap();
        let someday = store.create(new_todo("learn rust", DateKey::Someday, 1)).unwrap();
        assert_ne!(late.id, early.id);
        assert_ne!(early.id, someday.id);

        let texts: Vec<String> = store
            .list_by_date(&monday())
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["early".to_string(), "late".to_string()]);
        assert_eq!(store.list_by_date(&DateKey::Someday).unwrap().len(), 1);
        assert_eq!(store.list_all().unwrap().len(), 3);

        let moved = store
            .update(
                late.id,
                &TodoPatch {
                    assigned_date: Some(Some(DateKey::Someday)),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(moved.assigned_date, Some(DateKey::Someday));
        assert_eq!(moved.created_at, late.created_at);
        assert_eq!(store.list_by_date(&monday()).unwrap().len(), 1);

        assert!(store.delete(early.id).unwrap());
        assert!(!store.delete(early.id).unwrap());
        assert_eq!(store.get(early.id).unwrap(), None);
        assert_eq!(store.update(early.id, &TodoPatch::default()).unwrap(), None);
        assert_eq!(store.toggle_complete(early.id).unwrap(), None);
    }

    #[test]
    fn sqlite_store_crud_and_ordering() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        exercise_store(&mut store);
    }

    #[test]
    fn memory_store_crud_and_ordering() {
        let mut store = MemoryStore::new();
        exercise_store(&mut store);
    }

    #[test]
    fn toggle_complete_round_trips_without_touching_other_fields() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let original = store.create(new_todo("stretch", monday(), 0)).unwrap();

        let done = store.toggle_complete(original.id).unwrap().unwrap();
        assert!(done.completed_at.is_some());
        assert_eq!(done.text, original.text);
        assert_eq!(done.assigned_date, original.assigned_date);
        assert_eq!(done.created_at, original.created_at);

        let undone = store.toggle_complete(original.id).unwrap().unwrap();
        assert_eq!(undone, original);
        assert_eq!(store.get(original.id).unwrap(), Some(original));
    }

    fn assert_returned_records_match_stored(store: &mut dyn TodoStore) {
        let created = store
            .create(NewTodo::new("renew passport", Some(DateKey::Someday)))
            .unwrap();
        assert_eq!(store.get(created.id).unwrap(), Some(created.clone()));
        assert_eq!(
            store.list_by_date(&DateKey::Someday).unwrap(),
            vec![created.clone()]
        );

        let done = store.toggle_complete(created.id).unwrap().unwrap();
        assert_eq!(store.get(created.id).unwrap(), Some(done));

        let mut precise = new_todo("precise", monday(), 0);
        precise.created_at = precise.created_at + Duration::nanoseconds(218_110_130);
        let created = store.create(precise).unwrap();
        assert_eq!(created.created_at.timestamp_subsec_millis(), 218);
        assert_eq!(store.get(created.id).unwrap(), Some(created));
    }

    #[test]
    fn sqlite_store_returns_what_it_stored() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_returned_records_match_stored(&mut store);
    }

    #[test]
    fn memory_store_returns_what_it_stored() {
        let mut store = MemoryStore::new();
        assert_returned_records_match_stored(&mut store);
    }

    #[test]
    fn empty_text_is_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let err = store.create(new_todo("   ", monday(), 0)).unwrap_err();
        assert!(matches!(err, StoreError::EmptyText));
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn empty_patch_returns_current_record() {
        let mut store = MemoryStore::new();
        let todo = store.create(new_todo("call mum", monday(), 0)).unwrap();
        assert_eq!(
            store.update(todo.id, &TodoPatch::default()).unwrap(),
            Some(todo)
        );
    }

    #[test]
    fn list_range_contains_every_key() {
        let mut store = MemoryStore::new();
        store.create(new_todo("one", monday(), 0)).unwrap();
        let tuesday = DateKey::Date(NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());
        let range = store
            .list_range(&[monday(), tuesday, DateKey::Someday])
            .unwrap();
        assert_eq!(range.len(), 3);
        assert_eq!(range[&monday()].len(), 1);
        assert!(range[&tuesday].is_empty());
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.sqlite");
        let id = {
            let mut store = SqliteStore::open(&path).unwrap();
            let created = store.create(new_todo("water plants", monday(), 0)).unwrap();
            store.toggle_complete(created.id).unwrap();
            created.id
        };
        let store = SqliteStore::open(&path).unwrap();
        let todo = store.get(id).unwrap().unwrap();
        assert_eq!(todo.text, "water plants");
        assert!(todo.is_completed());
    }

    #[test]
    fn ids_are_unique_across_columns() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for (i, key) in [monday(), DateKey::Someday, monday()].iter().enumerate() {
            let mut todo = new_todo("x", *key, 0);
            todo.created_at = todo.created_at + Duration::seconds(i as i64);
            ids.push(store.create(todo).unwrap().id);
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}
