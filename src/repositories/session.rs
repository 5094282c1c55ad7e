use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::models::session::SessionRecord;

/// Failures of the session backing store.
///
/// Absence is not an error: [`SessionStore::fetch`] returns `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Insert hit an existing id. Ids are minted server-side, so this is a bug, not a retry.
    #[error("session {0} already exists")]
    Duplicate(Uuid),

    /// Update targeted an id with no record.
    #[error("session {0} does not exist")]
    Missing(Uuid),

    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session store timed out during {0}")]
    Timeout(&'static str),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Durable id → record storage for sessions. Every operation touches one record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Looks a record up by id.
    async fn fetch(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError>;

    /// Writes a new record. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn insert(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Overwrites `email` and `modified` of an existing record.
    /// Fails with [`StoreError::Missing`] rather than inserting.
    async fn update(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Removes a record. Removing an absent id succeeds.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Maps a `sessions` row to a `SessionRecord`.
fn row_to_record(row: &Row) -> Result<SessionRecord, StoreError> {
    Ok(SessionRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        created: row.try_get("created")?,
        modified: row.try_get("modified")?,
    })
}

/// Sessions kept in the Postgres `sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: Pool,
    op_timeout: Duration,
}

impl PgSessionStore {
    /// Creates a store over `pool`; each operation is abandoned after `op_timeout`.
    pub fn new(pool: Pool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| {
                tracing::error!("⏱️ Session store {} exceeded {:?}", op, self.op_timeout);
                StoreError::Timeout(op)
            })?
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        self.bounded("fetch", async {
            let client = self.pool.get().await?;
            let row = client
                .query_opt(
                    r#"
                    SELECT id, email, created, modified
                    FROM sessions
                    WHERE id = $1
                    "#,
                    &[&id],
                )
                .await?;
            row.map(|r| row_to_record(&r)).transpose()
        })
        .await
    }

    async fn insert(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.bounded("insert", async {
            let client = self.pool.get().await?;
            let inserted = client
                .execute(
                    r#"
                    INSERT INTO sessions (id, email, created, modified)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                    &[&record.id, &record.email, &record.created, &record.modified],
                )
                .await?;
            if inserted == 0 {
                return Err(StoreError::Duplicate(record.id));
            }
            Ok(())
        })
        .await
    }

    async fn update(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.bounded("update", async {
            let client = self.pool.get().await?;
            let updated = client
                .execute(
                    r#"
                    UPDATE sessions
                    SET email = $1, modified = $2
                    WHERE id = $3
                    "#,
                    &[&record.email, &record.modified, &record.id],
                )
                .await?;
            if updated == 0 {
                return Err(StoreError::Missing(record.id));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.bounded("delete", async {
            let client = self.pool.get().await?;
            client
                .execute("DELETE FROM sessions WHERE id = $1", &[&id])
                .await?;
            Ok::<(), StoreError>(())
        })
        .await
    }
}

/// Sessions held in process memory. Same contract as [`PgSessionStore`], single node only.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<RwLock<HashMap<Uuid, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.records.read().await.contains_key(&id)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn insert(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let existing = records
            .get_mut(&record.id)
            .ok_or(StoreError::Missing(record.id))?;
        existing.email = record.email.clone();
        existing.modified = record.modified;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.records.write().await.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(email: &str) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: Uuid::now_v7(),
            email: email.to_string(),
            created: now,
            modified: now,
        }
    }

    #[tokio::test]
    async fn fetch_returns_inserted_record_unchanged() {
        let store = MemorySessionStore::new();
        let rec = record("a@b.com");
        store.insert(&rec).await.unwrap();
        assert_eq!(store.fetch(rec.id).await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn fetch_of_unknown_id_is_absent_not_error() {
        let store = MemorySessionStore::new();
        assert_eq!(store.fetch(Uuid::now_v7()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_insert_is_refused() {
        let store = MemorySessionStore::new();
        let rec = record("");
        store.insert(&rec).await.unwrap();
        assert!(matches!(store.insert(&rec).await, Err(StoreError::Duplicate(id)) if id == rec.id));
    }

    #[tokio::test]
    async fn update_never_upserts() {
        let store = MemorySessionStore::new();
        let rec = record("");
        assert!(matches!(store.update(&rec).await, Err(StoreError::Missing(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn update_keeps_created() {
        let store = MemorySessionStore::new();
        let rec = record("");
        store.insert(&rec).await.unwrap();

        let mut changed = rec.clone();
        changed.email = "a@b.com".to_string();
        changed.created = rec.created + chrono::Duration::days(1);
        changed.modified = rec.modified + chrono::Duration::seconds(1);
        store.update(&changed).await.unwrap();

        let stored = store.fetch(rec.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "a@b.com");
        assert_eq!(stored.created, rec.created);
        assert_eq!(stored.modified, changed.modified);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemorySessionStore::new();
        let rec = record("");
        store.insert(&rec).await.unwrap();
        store.delete(rec.id).await.unwrap();
        store.delete(rec.id).await.unwrap();
        assert_eq!(store.fetch(rec.id).await.unwrap(), None);
    }
}
