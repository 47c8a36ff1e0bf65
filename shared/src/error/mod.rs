//! Error envelope shared by the server and its clients
//!
//! Every failure crosses the wire as an [`ApiResponse`] whose `code` is an
//! [`ErrorCode`]. The HTTP status is derived from the code.
//!
//! ```
//! use shared::error::{ApiResponse, AppError, ErrorCode};
//!
//! let err = AppError::new(ErrorCode::EntryNotFound).with_detail("entryId", 42);
//! let response = ApiResponse::<()>::from(err);
//! assert_eq!(response.code, 4001);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, UnknownErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
