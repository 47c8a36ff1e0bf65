//! Waitlist queue: persistence, ordering engine, ETA and change propagation
//!
//! ```text
//! waitlist/
//! ├── storage.rs   # redb entry store, version CAS, waiting batch
//! ├── eta.rs       # position x average turn time
//! ├── manager/     # QueueManager commands and queries
//! └── gateway.rs   # snapshot publication for viewers
//! ```

pub mod eta;
pub mod gateway;
pub mod manager;
pub mod storage;

pub use eta::{FixedTurnTime, TurnTimeSource};
pub use gateway::{PropagationGateway, RefreshOutcome};
pub use manager::{QueueError, QueueManager, QueueResult, retry_on_conflict};
pub use storage::{EntryStore, StorageError, StoreStats};
