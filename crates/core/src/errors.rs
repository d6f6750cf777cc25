use thiserror::Error;

use crate::draft::ledger::{LedgerError, ValidationError};
use crate::draft::numbering::ReservationError;
use crate::draft::quotes::UploadError;
use crate::session::SessionError;
use crate::wizard::engine::WizardTransitionError;

/// Failure reported by an external persistence collaborator (quote store or
/// requisition save). Local state is not rolled back; the user may retry.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("rejected by the backend: {0}")]
    Rejected(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Reservation(#[from] ReservationError),
    #[error(transparent)]
    WizardTransition(#[from] WizardTransitionError),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("session context is unusable: {0}")]
    Session(String),
}

impl From<ValidationError> for ApplicationError {
    fn from(value: ValidationError) -> Self {
        Self::Domain(DomainError::Validation(value))
    }
}

impl From<LedgerError> for ApplicationError {
    fn from(value: LedgerError) -> Self {
        Self::Domain(DomainError::Ledger(value))
    }
}

impl From<UploadError> for ApplicationError {
    fn from(value: UploadError) -> Self {
        Self::Domain(DomainError::Upload(value))
    }
}

impl From<ReservationError> for ApplicationError {
    fn from(value: ReservationError) -> Self {
        Self::Domain(DomainError::Reservation(value))
    }
}

impl From<WizardTransitionError> for ApplicationError {
    fn from(value: WizardTransitionError) -> Self {
        Self::Domain(DomainError::WizardTransition(value))
    }
}

impl From<SessionError> for ApplicationError {
    fn from(value: SessionError) -> Self {
        Self::Session(value.to_string())
    }
}

impl ApplicationError {
    /// User-safe message for the surrounding UI; field-level detail stays in
    /// the typed variants.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::Validation(_)) | Self::Domain(DomainError::Ledger(_)) => {
                "Complete the highlighted fields and try again."
            }
            Self::Domain(DomainError::Upload(_)) => {
                "The quote could not be attached. Check the file and the selected items."
            }
            Self::Domain(DomainError::Reservation(_)) => {
                "A requisition number could not be reserved. Please retry."
            }
            Self::Domain(DomainError::WizardTransition(_)) => {
                "Complete the current step before continuing."
            }
            Self::Persistence(_) => "The change could not be saved. Please retry.",
            Self::Session(_) => "Your session is no longer valid. Sign in again.",
        }
    }

    /// Whether the operation that produced this error may simply be retried
    /// without changing any input first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Domain(DomainError::Reservation(_)))
    }
}
