//! Core types for the Feishu group greeter.
//!
//! The crate is split along the three things a webhook invocation touches:
//! the inbound [`event`] payload, the outbound [`message`] body and the
//! [`feishu`] REST client that authenticates and delivers it. Every step is
//! recorded in the append-only [`audit`] log.

pub mod audit;
pub mod event;
pub mod feishu;
pub mod message;

pub use audit::{
    AuditError, AuditRecord, AuditStore, AuditTable, InMemoryAuditStore, MAX_AUDIT_HISTORY,
    SharedAuditStore,
};
#[cfg(feature = "store_sqlite")]
pub use audit::sqlite::{SqliteAuditStore, sqlite_store};
pub use event::{InboundEvent, MEMBER_ADDED_EVENT};
pub use feishu::{
    AppCredentials, DEFAULT_API_BASE, FeishuClient, FeishuError, FeishuTokenFetcher,
    MessageSender, SendOutcome, StaticToken, TokenSource,
};
pub use message::{OutboundMessage, mention_tags, mention_text, welcome_card};
