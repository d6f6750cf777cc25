pub mod header;
pub mod ledger;
pub mod numbering;
pub mod quotes;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::draft::header::DraftHeader;
use crate::draft::ledger::{DraftItem, ServerItemId};
use crate::errors::PersistenceError;

/// Identity of a persisted requisition, assigned by the backend at save time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequisitionId(pub String);

impl fmt::Display for RequisitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful save: the backend's identifiers for the requisition
/// and for each submitted item, in submission order. The number is
/// authoritative and may differ from the soft reservation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedRequisition {
    pub id: RequisitionId,
    pub number: String,
    pub item_ids: Vec<ServerItemId>,
}

/// Opaque save operation owned by the backend. On success the caller promotes
/// each draft item with its assigned server identity.
#[async_trait]
pub trait RequisitionPersistence: Send + Sync {
    async fn save(
        &self,
        header: &DraftHeader,
        items: &[DraftItem],
    ) -> Result<PersistedRequisition, PersistenceError>;
}
