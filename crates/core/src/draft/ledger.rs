use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::cascade::{CacheKey, CascadeCache};
use crate::catalog::{CatalogDomain, EntryId};

/// Identity minted locally when a line item is drafted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalItemId(pub Uuid);

/// Identity assigned by the persistence collaborator once the draft is saved.
/// Until it exists the item cannot be cross-referenced by quotes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerItemId(pub String);

impl fmt::Display for LocalItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ServerItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field `{field}` is missing")]
    MissingField { field: &'static str },
    #[error("quantity must be a finite number greater than zero")]
    InvalidQuantity,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no draft item with local id `{0}`")]
    UnknownItem(LocalItemId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DraftItem {
    pub local_id: LocalItemId,
    pub server_id: Option<ServerItemId>,
    pub product_id: EntryId,
    pub quantity: f64,
    pub unit_id: EntryId,
    pub description_id: EntryId,
    pub estimated_unit_cost: Option<Decimal>,
}

impl DraftItem {
    /// quantity × unit cost, rounded to 2 decimal places; absent without a cost.
    pub fn estimated_total(&self) -> Option<Decimal> {
        let cost = self.estimated_unit_cost?;
        let quantity = Decimal::from_f64_retain(self.quantity)?;
        Some((cost * quantity).round_dp(2))
    }
}

/// Candidate line item as captured by the Items step. All selection fields are
/// optional here; validation decides what is admissible.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewDraftItem {
    pub product_id: Option<EntryId>,
    pub quantity: Option<f64>,
    pub unit_id: Option<EntryId>,
    pub description_id: Option<EntryId>,
    pub estimated_unit_cost: Option<Decimal>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DraftItemPatch {
    pub product_id: Option<EntryId>,
    pub quantity: Option<f64>,
    pub unit_id: Option<EntryId>,
    pub description_id: Option<EntryId>,
    pub estimated_unit_cost: Option<Option<Decimal>>,
}

/// Read-only projection of one ledger row with ids resolved back to labels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemView {
    pub local_id: LocalItemId,
    pub server_id: Option<ServerItemId>,
    pub product: String,
    pub quantity: f64,
    pub unit: String,
    pub description: String,
    pub estimated_unit_cost: Option<Decimal>,
    pub estimated_total: Option<Decimal>,
}

#[derive(Debug, Default)]
pub struct DraftLedger {
    items: Vec<DraftItem>,
}

impl DraftLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[DraftItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, local_id: &LocalItemId) -> Option<&DraftItem> {
        self.items.iter().find(|item| &item.local_id == local_id)
    }

    /// Validates and appends a new line item. Rejections identify the first
    /// missing or invalid field and leave the ledger untouched.
    pub fn add(&mut self, draft: NewDraftItem) -> Result<LocalItemId, ValidationError> {
        let product_id =
            draft.product_id.ok_or(ValidationError::MissingField { field: "product" })?;
        let quantity = validate_quantity(draft.quantity)?;
        let unit_id = draft.unit_id.ok_or(ValidationError::MissingField { field: "unit" })?;
        let description_id =
            draft.description_id.ok_or(ValidationError::MissingField { field: "description" })?;

        let local_id = LocalItemId(Uuid::new_v4());
        self.items.push(DraftItem {
            local_id: local_id.clone(),
            server_id: None,
            product_id,
            quantity,
            unit_id,
            description_id,
            estimated_unit_cost: draft.estimated_unit_cost,
        });
        Ok(local_id)
    }

    /// Applies a patch to an existing item. Changing the product clears the
    /// description (it was only meaningful under the old product), so a product
    /// change must carry a replacement description or the patch is rejected.
    /// Validation failures leave the stored item unchanged.
    pub fn update(
        &mut self,
        local_id: &LocalItemId,
        patch: DraftItemPatch,
    ) -> Result<(), LedgerError> {
        let position = self
            .items
            .iter()
            .position(|item| &item.local_id == local_id)
            .ok_or_else(|| LedgerError::UnknownItem(local_id.clone()))?;

        let mut candidate = self.items[position].clone();
        let product_changed =
            patch.product_id.as_ref().is_some_and(|product| product != &candidate.product_id);

        if let Some(product_id) = patch.product_id {
            candidate.product_id = product_id;
        }
        if product_changed {
            candidate.description_id = match patch.description_id.clone() {
                Some(description_id) => description_id,
                None => {
                    return Err(ValidationError::MissingField { field: "description" }.into());
                }
            };
        } else if let Some(description_id) = patch.description_id {
            candidate.description_id = description_id;
        }
        if let Some(quantity) = patch.quantity {
            candidate.quantity = validate_quantity(Some(quantity))?;
        }
        if let Some(unit_id) = patch.unit_id {
            candidate.unit_id = unit_id;
        }
        if let Some(estimated_unit_cost) = patch.estimated_unit_cost {
            candidate.estimated_unit_cost = estimated_unit_cost;
        }

        self.items[position] = candidate;
        Ok(())
    }

    /// Unconditional removal; server-side confirmation belongs to the
    /// persistence collaborator. Returns whether an item was removed.
    pub fn remove(&mut self, local_id: &LocalItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.local_id != local_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Promotion event: the persistence collaborator reported success and
    /// assigned this item its server identity.
    pub fn promote(
        &mut self,
        local_id: &LocalItemId,
        server_id: ServerItemId,
    ) -> Result<(), LedgerError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| &item.local_id == local_id)
            .ok_or_else(|| LedgerError::UnknownItem(local_id.clone()))?;
        item.server_id = Some(server_id);
        Ok(())
    }

    /// Read-only display projection: ids resolved to labels through the cascade
    /// cache, falling back to the raw id when a label is not cached. Does not
    /// mutate cache state.
    pub fn display(&self, cache: &CascadeCache) -> Vec<ItemView> {
        let products = CacheKey::Domain(CatalogDomain::Product);
        let units = CacheKey::Domain(CatalogDomain::UnitOfMeasure);

        self.items
            .iter()
            .map(|item| {
                let descriptions =
                    CacheKey::Scoped(CatalogDomain::ItemDescription, item.product_id.clone());
                ItemView {
                    local_id: item.local_id.clone(),
                    server_id: item.server_id.clone(),
                    product: label_or_id(cache, &products, &item.product_id),
                    quantity: item.quantity,
                    unit: label_or_id(cache, &units, &item.unit_id),
                    description: label_or_id(cache, &descriptions, &item.description_id),
                    estimated_unit_cost: item.estimated_unit_cost,
                    estimated_total: item.estimated_total(),
                }
            })
            .collect()
    }
}

fn label_or_id(cache: &CascadeCache, key: &CacheKey, id: &EntryId) -> String {
    cache.label_for(key, id).map(str::to_string).unwrap_or_else(|| id.0.clone())
}

fn validate_quantity(quantity: Option<f64>) -> Result<f64, ValidationError> {
    let quantity = quantity.ok_or(ValidationError::MissingField { field: "quantity" })?;
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(ValidationError::InvalidQuantity);
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{DraftItemPatch, DraftLedger, NewDraftItem, ServerItemId, ValidationError};
    use crate::catalog::cascade::{CacheKey, CascadeCache};
    use crate::catalog::{CatalogDomain, CatalogEntry, EntryId};

    fn draft(product: &str, quantity: f64, unit: &str, description: &str) -> NewDraftItem {
        NewDraftItem {
            product_id: Some(EntryId(product.to_string())),
            quantity: Some(quantity),
            unit_id: Some(EntryId(unit.to_string())),
            description_id: Some(EntryId(description.to_string())),
            estimated_unit_cost: None,
        }
    }

    #[test]
    fn add_accepts_a_complete_item() {
        let mut ledger = DraftLedger::new();
        let local_id = ledger.add(draft("p1", 1.0, "u1", "d1")).expect("valid item");

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(&local_id).map(|item| item.quantity), Some(1.0));
        assert!(ledger.get(&local_id).expect("stored item").server_id.is_none());
    }

    #[test]
    fn add_accepts_arbitrarily_large_positive_quantities() {
        let mut ledger = DraftLedger::new();
        ledger.add(draft("p1", 1.0e12, "u1", "d1")).expect("large quantity is fine");
    }

    #[test]
    fn add_rejects_non_positive_and_non_numeric_quantities() {
        let mut ledger = DraftLedger::new();

        for bad in [0.0, -4.0, f64::NAN, f64::INFINITY] {
            let error = ledger.add(draft("p1", bad, "u1", "d1")).expect_err("must reject");
            assert_eq!(error, ValidationError::InvalidQuantity);
        }
        assert!(ledger.is_empty(), "rejections must not mutate the ledger");
    }

    #[test]
    fn add_identifies_the_missing_field() {
        let mut ledger = DraftLedger::new();

        let mut missing_product = draft("p1", 2.0, "u1", "d1");
        missing_product.product_id = None;
        assert_eq!(
            ledger.add(missing_product),
            Err(ValidationError::MissingField { field: "product" })
        );

        let mut missing_description = draft("p1", 2.0, "u1", "d1");
        missing_description.description_id = None;
        assert_eq!(
            ledger.add(missing_description),
            Err(ValidationError::MissingField { field: "description" })
        );

        let mut missing_unit = draft("p1", 2.0, "u1", "d1");
        missing_unit.unit_id = None;
        assert_eq!(ledger.add(missing_unit), Err(ValidationError::MissingField { field: "unit" }));
    }

    #[test]
    fn update_rejection_leaves_the_item_untouched() {
        let mut ledger = DraftLedger::new();
        let local_id = ledger.add(draft("p1", 3.0, "u1", "d1")).expect("valid item");

        let error = ledger
            .update(
                &local_id,
                DraftItemPatch { quantity: Some(-1.0), ..DraftItemPatch::default() },
            )
            .expect_err("negative quantity must be rejected");

        assert!(matches!(error, super::LedgerError::Validation(ValidationError::InvalidQuantity)));
        assert_eq!(ledger.get(&local_id).map(|item| item.quantity), Some(3.0));
    }

    #[test]
    fn changing_the_product_requires_a_replacement_description() {
        let mut ledger = DraftLedger::new();
        let local_id = ledger.add(draft("p1", 3.0, "u1", "d1")).expect("valid item");

        let rejected = ledger.update(
            &local_id,
            DraftItemPatch {
                product_id: Some(EntryId("p2".to_string())),
                ..DraftItemPatch::default()
            },
        );
        assert!(rejected.is_err(), "old description is meaningless under the new product");
        assert_eq!(
            ledger.get(&local_id).map(|item| item.description_id.clone()),
            Some(EntryId("d1".to_string()))
        );

        ledger
            .update(
                &local_id,
                DraftItemPatch {
                    product_id: Some(EntryId("p2".to_string())),
                    description_id: Some(EntryId("d7".to_string())),
                    ..DraftItemPatch::default()
                },
            )
            .expect("product change with replacement description");
        let item = ledger.get(&local_id).expect("stored item");
        assert_eq!(item.product_id, EntryId("p2".to_string()));
        assert_eq!(item.description_id, EntryId("d7".to_string()));
    }

    #[test]
    fn remove_is_unconditional() {
        let mut ledger = DraftLedger::new();
        let local_id = ledger.add(draft("p1", 3.0, "u1", "d1")).expect("valid item");

        assert!(ledger.remove(&local_id));
        assert!(!ledger.remove(&local_id));
        assert!(ledger.is_empty());
    }

    #[test]
    fn promote_assigns_the_server_identity() {
        let mut ledger = DraftLedger::new();
        let local_id = ledger.add(draft("p1", 3.0, "u1", "d1")).expect("valid item");

        ledger.promote(&local_id, ServerItemId("41".to_string())).expect("known item");

        assert_eq!(
            ledger.get(&local_id).and_then(|item| item.server_id.clone()),
            Some(ServerItemId("41".to_string()))
        );
    }

    #[test]
    fn display_resolves_labels_and_falls_back_to_raw_ids() {
        let mut cache = CascadeCache::new();
        let products = CacheKey::Domain(CatalogDomain::Product);
        let token = cache.begin_reload(products.clone());
        cache.complete(
            &products,
            token,
            vec![CatalogEntry {
                id: EntryId("p1".to_string()),
                label: "21101 - Papelería".to_string(),
                unit_cost: None,
            }],
        );

        let mut ledger = DraftLedger::new();
        let mut item = draft("p1", 2.0, "u1", "d1");
        item.estimated_unit_cost = Some(Decimal::new(1050, 2));
        ledger.add(item).expect("valid item");

        let views = ledger.display(&cache);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].product, "21101 - Papelería");
        assert_eq!(views[0].unit, "u1", "uncached unit falls back to its id");
        assert_eq!(views[0].estimated_total, Some(Decimal::new(2100, 2)));
    }
}
