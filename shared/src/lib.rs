//! Shared types for the waitlist service
//!
//! Domain and wire types used by the server and by any client crate:
//! waitlist entries, queue events and snapshots, and the unified error
//! envelope.

pub mod error;
pub mod util;
pub mod waitlist;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
