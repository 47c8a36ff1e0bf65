use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Which part of the service produced an error, by code range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Request,
    Waitlist,
    Notification,
    System,
}

impl ErrorCategory {
    pub fn from_code(code: u16) -> Self {
        match code {
            4000..5000 => Self::Waitlist,
            5000..6000 => Self::Notification,
            9000.. => Self::System,
            _ => Self::Request,
        }
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
