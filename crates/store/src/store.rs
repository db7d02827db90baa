//! SQLite-backed document store

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::document::Document;
use crate::error::{StoreError, StoreResult};

/// Shared handle to the document database.
///
/// Cloning is cheap; all clones use the same connection.
#[derive(Clone)]
pub struct DocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentStore {
    /// Open (or create) a store at the given database path
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                owner_id TEXT,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (collection, id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_owner
             ON documents(collection, owner_id)",
            [],
        )?;

        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Insert a new document. Fails if the id already exists in its collection.
    pub fn insert<T: Document>(&self, doc: &T) -> StoreResult<()> {
        let conn = self.lock()?;
        insert_into(&conn, doc)
    }

    /// Insert a new document unless another document in the collection has
    /// the same value at top-level `field`. The check and the insert happen
    /// in one transaction.
    pub fn insert_unique<T: Document>(&self, doc: &T, field: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let taken: bool = tx.query_row(
            "SELECT EXISTS (
                SELECT 1 FROM documents
                WHERE collection = ?1 AND json_extract(body, ?2) = ?3
            )",
            params![T::COLLECTION, json_path(field), value],
            |row| row.get(0),
        )?;

        if taken {
            return Err(StoreError::Conflict {
                collection: T::COLLECTION,
                field: field.to_string(),
            });
        }

        insert_into(&tx, doc)?;
        tx.commit()?;
        Ok(())
    }

    /// Insert or replace a document, keeping its original position
    pub fn save<T: Document>(&self, doc: &T) -> StoreResult<()> {
        let body = serde_json::to_string(doc)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO documents (collection, id, owner_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(collection, id) DO UPDATE SET
                owner_id = excluded.owner_id,
                body = excluded.body",
            params![
                T::COLLECTION,
                doc.id(),
                doc.owner_id(),
                body,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(())
    }

    /// Read-modify-write one document under an immediate transaction.
    ///
    /// `apply` sees the stored document and may reject the change by
    /// returning an error, in which case nothing is written. Returns
    /// `Ok(None)` when the document does not exist. `apply` must not call
    /// back into the store.
    pub fn update<T, E, F>(&self, id: &str, apply: F) -> Result<Option<T>, E>
    where
        T: Document,
        E: From<StoreError>,
        F: FnOnce(&mut T) -> Result<(), E>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![T::COLLECTION, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)?;

        let Some(body) = body else {
            return Ok(None);
        };

        let mut doc: T = serde_json::from_str(&body).map_err(StoreError::from)?;
        apply(&mut doc)?;

        let body = serde_json::to_string(&doc).map_err(StoreError::from)?;
        tx.execute(
            "UPDATE documents SET owner_id = ?3, body = ?4 WHERE collection = ?1 AND id = ?2",
            params![T::COLLECTION, id, doc.owner_id(), body],
        )
        .map_err(StoreError::from)?;
        tx.commit().map_err(StoreError::from)?;

        Ok(Some(doc))
    }

    /// Get a document by id
    pub fn get<T: Document>(&self, id: &str) -> StoreResult<Option<T>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![T::COLLECTION, id],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// All documents owned by `owner_id`, in insertion order
    pub fn find_by_owner<T: Document>(&self, owner_id: &str) -> StoreResult<Vec<T>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT body FROM documents
             WHERE collection = ?1 AND owner_id = ?2
             ORDER BY seq",
        )?;

        let bodies = stmt
            .query_map(params![T::COLLECTION, owner_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        decode_all(bodies)
    }

    /// All documents in the collection, in insertion order
    pub fn find_all<T: Document>(&self) -> StoreResult<Vec<T>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT body FROM documents WHERE collection = ?1 ORDER BY seq",
        )?;

        let bodies = stmt
            .query_map(params![T::COLLECTION], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        decode_all(bodies)
    }

    /// All documents in the collection matching `pred`, in insertion order
    pub fn find_where<T, F>(&self, pred: F) -> StoreResult<Vec<T>>
    where
        T: Document,
        F: Fn(&T) -> bool,
    {
        Ok(self.find_all::<T>()?.into_iter().filter(|d| pred(d)).collect())
    }

    /// Documents whose top-level `field` equals `value`, in insertion order
    pub fn find_by_field<T: Document>(&self, field: &str, value: &str) -> StoreResult<Vec<T>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT body FROM documents
             WHERE collection = ?1 AND json_extract(body, ?2) = ?3
             ORDER BY seq",
        )?;

        let bodies = stmt
            .query_map(params![T::COLLECTION, json_path(field), value], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        decode_all(bodies)
    }

    /// Delete a document. Returns true if it existed.
    pub fn delete<T: Document>(&self, id: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![T::COLLECTION, id],
        )?;
        Ok(affected > 0)
    }

    pub fn count_by_owner<T: Document>(&self, owner_id: &str) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1 AND owner_id = ?2",
            params![T::COLLECTION, owner_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn insert_into<T: Document>(conn: &Connection, doc: &T) -> StoreResult<()> {
    let body = serde_json::to_string(doc)?;
    let result = conn.execute(
        "INSERT INTO documents (collection, id, owner_id, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            T::COLLECTION,
            doc.id(),
            doc.owner_id(),
            body,
            Utc::now().to_rfc3339()
        ],
    );

    match result {
        Ok(_) => {
            tracing::debug!(collection = T::COLLECTION, id = doc.id(), "Document inserted");
            Ok(())
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(StoreError::Duplicate {
                collection: T::COLLECTION,
                id: doc.id().to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn json_path(field: &str) -> String {
    format!("$.{}", field)
}

fn decode_all<T: Document>(bodies: Vec<String>) -> StoreResult<Vec<T>> {
    bodies
        .iter()
        .map(|body| serde_json::from_str(body).map_err(StoreError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        owner: String,
        text: String,
    }

    impl Document for Note {
        const COLLECTION: &'static str = "notes";

        fn id(&self) -> &str {
            &self.id
        }

        fn owner_id(&self) -> Option<&str> {
            Some(&self.owner)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        id: String,
    }

    impl Document for Tag {
        const COLLECTION: &'static str = "tags";

        fn id(&self) -> &str {
            &self.id
        }

        fn owner_id(&self) -> Option<&str> {
            None
        }
    }

    fn note(id: &str, owner: &str, text: &str) -> Note {
        Note {
            id: id.to_string(),
            owner: owner.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert(&note("n1", "alice", "hello")).unwrap();

        let loaded: Note = store.get("n1").unwrap().unwrap();
        assert_eq!(loaded.text, "hello");
        assert!(store.get::<Note>("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert(&note("n1", "alice", "a")).unwrap();

        let result = store.insert(&note("n1", "alice", "b"));
        assert!(matches!(
            result,
            Err(StoreError::Duplicate { collection: "notes", .. })
        ));
    }

    #[test]
    fn test_same_id_different_collections() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert(&note("x", "alice", "a")).unwrap();
        store.insert(&Tag { id: "x".to_string() }).unwrap();

        assert!(store.get::<Tag>("x").unwrap().is_some());
        assert_eq!(store.find_all::<Note>().unwrap().len(), 1);
    }

    #[test]
    fn test_save_upserts_in_place() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert(&note("n1", "alice", "first")).unwrap();
        store.insert(&note("n2", "alice", "second")).unwrap();

        store.save(&note("n1", "alice", "edited")).unwrap();
        store.save(&note("n3", "alice", "third")).unwrap();

        let notes: Vec<Note> = store.find_by_owner("alice").unwrap();
        let texts: Vec<&str> = notes.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["edited", "second", "third"]);
    }

    #[test]
    fn test_find_by_owner_and_count() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert(&note("n1", "alice", "a")).unwrap();
        store.insert(&note("n2", "bob", "b")).unwrap();
        store.insert(&note("n3", "alice", "c")).unwrap();

        let alice: Vec<Note> = store.find_by_owner("alice").unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(store.count_by_owner::<Note>("alice").unwrap(), 2);
        assert_eq!(store.count_by_owner::<Note>("carol").unwrap(), 0);
    }

    #[test]
    fn test_find_where_and_delete() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert(&note("n1", "alice", "keep")).unwrap();
        store.insert(&note("n2", "alice", "drop")).unwrap();

        let found: Vec<Note> = store.find_where(|n: &Note| n.text == "drop").unwrap();
        assert_eq!(found.len(), 1);

        assert!(store.delete::<Note>("n2").unwrap());
        assert!(!store.delete::<Note>("n2").unwrap());
        assert_eq!(store.find_all::<Note>().unwrap().len(), 1);
    }

    #[test]
    fn test_update_applies_and_persists() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert(&note("n1", "alice", "draft")).unwrap();

        let updated = store
            .update::<Note, StoreError, _>("n1", |n| {
                n.text.push_str(" v2");
                Ok(())
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.text, "draft v2");
        assert_eq!(store.get::<Note>("n1").unwrap().unwrap().text, "draft v2");

        let missing = store
            .update::<Note, StoreError, _>("missing", |_| Ok(()))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_update_rejection_writes_nothing() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert(&note("n1", "alice", "original")).unwrap();

        let result = store.update::<Note, StoreError, _>("n1", |n| {
            n.text = "changed".to_string();
            Err(StoreError::LockPoisoned)
        });
        assert!(result.is_err());
        assert_eq!(store.get::<Note>("n1").unwrap().unwrap().text, "original");
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert(&note("n1", "alice", "")).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = store.clone();
                scope.spawn(move || {
                    for _ in 0..25 {
                        store
                            .update::<Note, StoreError, _>("n1", |n| {
                                n.text.push_str(&worker.to_string());
                                Ok(())
                            })
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(store.get::<Note>("n1").unwrap().unwrap().text.len(), 100);
    }

    #[test]
    fn test_find_by_field() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert(&note("n1", "alice", "x")).unwrap();
        store.insert(&note("n2", "bob", "y")).unwrap();
        store.insert(&note("n3", "carol", "x")).unwrap();

        let found: Vec<Note> = store.find_by_field("text", "x").unwrap();
        let ids: Vec<&str> = found.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n3"]);
        assert!(store.find_by_field::<Note>("text", "z").unwrap().is_empty());
    }

    #[test]
    fn test_insert_unique() {
        let store = DocumentStore::in_memory().unwrap();
        store.insert_unique(&note("n1", "alice", "same"), "text", "same").unwrap();

        let result = store.insert_unique(&note("n2", "bob", "same"), "text", "same");
        assert!(matches!(result, Err(StoreError::Conflict { collection: "notes", .. })));
        assert!(store.get::<Note>("n2").unwrap().is_none());

        // Other collections do not conflict
        store.insert_unique(&Tag { id: "same".to_string() }, "id", "same").unwrap();
    }

    #[test]
    fn test_insert_unique_under_contention() {
        let store = DocumentStore::in_memory().unwrap();

        let accepted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let store = store.clone();
                    scope.spawn(move || {
                        store
                            .insert_unique(&note(&format!("n{}", i), "alice", "one"), "text", "one")
                            .is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(accepted, 1);
        assert_eq!(store.find_all::<Note>().unwrap().len(), 1);
    }

    #[test]
    fn test_persists_across_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("billpay.db");

        {
            let store = DocumentStore::open(&path).unwrap();
            store.insert(&note("n1", "alice", "durable")).unwrap();
        }

        let store = DocumentStore::open(&path).unwrap();
        let loaded: Note = store.get("n1").unwrap().unwrap();
        assert_eq!(loaded.text, "durable");
    }
}
