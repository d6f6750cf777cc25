use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Read-only current-user fields supplied by the surrounding authentication
/// layer, used to seed draft header defaults. A context without a usable
/// display name is malformed and aborts wizard construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub department: String,
    pub display_name: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session context carries no user display name")]
    MissingDisplayName,
}

impl SessionContext {
    pub fn new(
        department: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let display_name = display_name.into().trim().to_string();
        if display_name.is_empty() {
            return Err(SessionError::MissingDisplayName);
        }
        Ok(Self { department: department.into().trim().to_string(), display_name })
    }
}
