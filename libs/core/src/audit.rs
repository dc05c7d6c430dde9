//! Append-only audit log of raw inbound payloads and outbound results.
//!
//! Records are keyed by insertion order only. Callers treat every write as
//! best effort: a failed append is logged and the invocation carries on.
//!
//! [`InMemoryAuditStore`] only keeps the most recent records and nothing
//! outside the process can read it; the SQLite store is the durable,
//! inspectable log.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::Mutex;

#[cfg(feature = "store_sqlite")]
pub mod sqlite;

/// Records kept by [`InMemoryAuditStore`] before the oldest are evicted.
pub const MAX_AUDIT_HISTORY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditTable {
    /// Raw inbound callback bodies.
    Requests,
    /// Outbound message bodies, send results and failure notes.
    Contents,
}

impl AuditTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditTable::Requests => "requests",
            AuditTable::Contents => "contents",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub seq: u64,
    pub table: AuditTable,
    pub recorded_at: String,
    pub body: Value,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Appends `body` to `table` and returns the assigned sequence number.
    async fn append(&self, table: AuditTable, body: Value) -> Result<u64, AuditError>;

    /// Returns the records of `table` in insertion order.
    async fn records(&self, table: AuditTable) -> Result<Vec<AuditRecord>, AuditError>;
}

pub type SharedAuditStore = Arc<dyn AuditStore>;

/// Bounded ring of the latest records across both tables. Sequence numbers
/// keep counting up after the oldest entries are evicted.
pub struct InMemoryAuditStore {
    capacity: usize,
    inner: Mutex<Ring>,
}

struct Ring {
    records: VecDeque<AuditRecord>,
    next_seq: u64,
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::with_capacity(MAX_AUDIT_HISTORY)
    }
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Ring {
                records: VecDeque::new(),
                next_seq: 1,
            }),
        }
    }

    pub fn shared() -> SharedAuditStore {
        Arc::new(Self::new())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.records.is_empty()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, table: AuditTable, body: Value) -> Result<u64, AuditError> {
        let mut guard = self.inner.lock().await;
        let seq = guard.next_seq;
        guard.next_seq = seq.saturating_add(1);
        if guard.records.len() >= self.capacity {
            guard.records.pop_front();
        }
        guard.records.push_back(AuditRecord {
            seq,
            table,
            recorded_at: now_rfc3339(),
            body,
        });
        Ok(seq)
    }

    async fn records(&self, table: AuditTable) -> Result<Vec<AuditRecord>, AuditError> {
        let guard = self.inner.lock().await;
        Ok(guard
            .records
            .iter()
            .filter(|r| r.table == table)
            .cloned()
            .collect())
    }
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".into())
}
