use std::{
    path::Path,
    sync::{Arc, Mutex as StdMutex},
};

use anyhow::anyhow;
use rusqlite::{Connection, params};
use serde_json::Value;
use tokio::task::spawn_blocking;

use super::{AuditError, AuditRecord, AuditStore, AuditTable, SharedAuditStore, now_rfc3339};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS audit_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    tbl TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    body TEXT NOT NULL
);
"#;

#[derive(Clone)]
pub struct SqliteAuditStore {
    conn: Arc<StdMutex<Connection>>,
}

pub fn sqlite_store(path: impl AsRef<Path>) -> anyhow::Result<SharedAuditStore> {
    Ok(Arc::new(SqliteAuditStore::open(path)?))
}

impl SqliteAuditStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let conn = Connection::open(path).map_err(internal)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(internal)?;
        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, func: F) -> Result<T, AuditError>
    where
        F: FnOnce(&Connection) -> Result<T, AuditError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| AuditError::Internal(anyhow!("audit connection lock poisoned")))?;
            func(&guard)
        })
        .await
        .map_err(|err| AuditError::Internal(err.into()))?
    }
}

#[async_trait::async_trait]
impl AuditStore for SqliteAuditStore {
    async fn append(&self, table: AuditTable, body: Value) -> Result<u64, AuditError> {
        let body = serde_json::to_string(&body).map_err(internal)?;
        let recorded_at = now_rfc3339();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO audit_log (tbl, recorded_at, body) VALUES (?1, ?2, ?3)",
                params![table.as_str(), recorded_at, body],
            )
            .map_err(internal)?;
            Ok(conn.last_insert_rowid().max(0) as u64)
        })
        .await
    }

    async fn records(&self, table: AuditTable) -> Result<Vec<AuditRecord>, AuditError> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT seq, recorded_at, body FROM audit_log WHERE tbl = ?1 ORDER BY seq")
                .map_err(internal)?;
            let rows = stmt
                .query_map(params![table.as_str()], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(internal)?;

            let mut records = Vec::new();
            for row in rows {
                let (seq, recorded_at, body) = row.map_err(internal)?;
                records.push(AuditRecord {
                    seq: seq.max(0) as u64,
                    table,
                    recorded_at,
                    body: serde_json::from_str(&body).map_err(internal)?,
                });
            }
            Ok(records)
        })
        .await
    }
}

fn internal<E>(err: E) -> AuditError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AuditError::Internal(err.into())
}
