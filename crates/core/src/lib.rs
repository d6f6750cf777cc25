pub mod catalog;
pub mod config;
pub mod draft;
pub mod errors;
pub mod session;
pub mod wizard;

pub use catalog::cascade::{CacheKey, CascadeCache, FetchToken};
pub use catalog::resolver::{CatalogResolver, CatalogSource, SourceError};
pub use catalog::{CatalogDomain, CatalogEntry, EntryId};
pub use draft::header::{DraftHeader, HEADER_DOMAINS};
pub use draft::ledger::{
    DraftItem, DraftItemPatch, DraftLedger, ItemView, LedgerError, LocalItemId, NewDraftItem,
    ServerItemId, ValidationError,
};
pub use draft::numbering::{NumberingReservation, ReservationError, NUMBERING_QUERIES};
pub use draft::quotes::{
    PendingUpload, Quote, QuoteBinder, QuoteId, QuoteStore, UploadCandidate, UploadError,
    MAX_UPLOAD_BYTES,
};
pub use draft::{PersistedRequisition, RequisitionId, RequisitionPersistence};
pub use errors::{ApplicationError, DomainError, PersistenceError};
pub use session::{SessionContext, SessionError};
pub use wizard::controller::{WizardController, WizardSnapshot};
pub use wizard::engine::{LinearWizard, WizardDefinition, WizardEngine, WizardTransitionError};
pub use wizard::states::{TransitionOutcome, WizardContext, WizardEvent, WizardStep};
