//! Status change audit trail
//!
//! ```text
//! QueueManager ── broadcast ──► EventRouter ── mpsc (blocking send) ──► AuditWorker ──► AuditSink
//! ```
//!
//! Only `StatusChanged` events produce records. The router never drops
//! events on this channel.

pub mod sink;
pub mod types;
pub mod worker;

pub use sink::{AuditError, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use types::AuditRecord;
pub use worker::AuditWorker;
