//! Server configuration, state, background tasks and event routing
//!
//! - [`Config`] - environment-driven configuration
//! - [`ServerState`] - shared components
//! - [`Server`] - HTTP server
//! - [`EventRouter`] - queue event fan-out
//! - [`BackgroundTasks`] - task registry

pub mod config;
pub mod error;
pub mod event_router;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use error::{Result, ServerError};
pub use event_router::{EventChannels, EventRouter};
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
