//! Waitlist Server - restaurant waitlist queue engine
//!
//! # Architecture
//!
//! ```text
//!  HTTP (axum) ──► QueueManager ──► EntryStore (redb)
//!                       │
//!                       └── broadcast ──► EventRouter
//!                                           ├──► AuditWorker
//!                                           ├──► NotificationHook ──► NotificationSender
//!                                           └──► PropagationGateway ──► SSE / poll viewers
//!
//!  ReminderScheduler (periodic) ──► NotificationHook
//! ```
//!
//! # Modules
//!
//! ```text
//! waitlist-server/src/
//! ├── core/       # config, state, server, tasks, event routing
//! ├── waitlist/   # store, ETA, queue engine, propagation gateway
//! ├── notify/     # senders, templates, hook, reminders
//! ├── audit/      # status change audit trail
//! ├── api/        # HTTP routes and handlers
//! └── utils/      # logging, extractors
//! ```

pub mod api;
pub mod audit;
pub mod core;
pub mod notify;
pub mod utils;
pub mod waitlist;

pub use core::{Config, Server, ServerState};
pub use notify::{NotificationHook, NotificationSender};
pub use utils::logger::{init_logger, init_logger_with_file};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCode};
pub use waitlist::{PropagationGateway, QueueError, QueueManager};

/// Load `.env` and start logging
///
/// Returns the log file guard, which must outlive the server.
pub fn setup_environment(
    config: &Config,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = config.log_dir();
    init_logger_with_file(
        Some(&config.log_level),
        config.is_production(),
        Some(log_dir.as_path()),
    )
}
