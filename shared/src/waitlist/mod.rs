//! Waitlist domain types shared by the server and its viewers

pub mod entry;
pub mod event;
pub mod snapshot;
pub mod validation;

pub use entry::{EntrySource, EntryView, UnknownStatus, WaitlistEntry, WaitlistStatus};
pub use event::{QueueEvent, QueueEventKind};
pub use snapshot::{QueueSnapshot, SnapshotPoll};
pub use validation::{
    FieldViolation, GuestIntake, MAX_GUEST_NAME_LEN, MAX_MESSAGE_LEN, MAX_PHONE_LEN,
    ValidationErrors, check_required_text,
};
