use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::cascade::{CacheKey, CascadeCache, FetchToken};
use crate::catalog::resolver::{CatalogResolver, CatalogSource};
use crate::catalog::{CatalogDomain, CatalogEntry, EntryId};
use crate::draft::header::{DraftHeader, HEADER_DOMAINS};
use crate::draft::ledger::{
    DraftItem, DraftItemPatch, DraftLedger, ItemView, LedgerError, LocalItemId, NewDraftItem,
    ServerItemId, ValidationError,
};
use crate::draft::numbering::{NumberingReservation, ReservationError};
use crate::draft::quotes::{
    PendingUpload, Quote, QuoteBinder, QuoteId, QuoteStore, UploadCandidate, UploadError,
};
use crate::draft::{PersistedRequisition, RequisitionId, RequisitionPersistence};
use crate::errors::ApplicationError;
use crate::session::SessionContext;
use crate::wizard::engine::{LinearWizard, WizardEngine, WizardTransitionError};
use crate::wizard::states::{TransitionOutcome, WizardContext, WizardEvent, WizardStep};

/// One wizard session's draft, exclusively owned and mutated by the
/// controller. Nothing here is shared across sessions or stored globally.
#[derive(Debug)]
struct WizardState {
    step: WizardStep,
    header: DraftHeader,
    ledger: DraftLedger,
    binder: QuoteBinder,
    item_entry: NewDraftItem,
    requisition_number: Option<String>,
    requisition_id: Option<RequisitionId>,
}

/// Read-only projection of the wizard for the surrounding UI.
#[derive(Clone, Debug, Serialize)]
pub struct WizardSnapshot {
    pub step: WizardStep,
    pub header: DraftHeader,
    pub items: Vec<ItemView>,
    pub quotes: Vec<Quote>,
    pub requisition_number: Option<String>,
}

/// Coordinates the catalog resolver, cascade cache, draft ledger, and quote
/// binder through the linear wizard, gating each transition on its
/// invariants.
pub struct WizardController<S> {
    engine: WizardEngine<LinearWizard>,
    resolver: CatalogResolver<S>,
    cache: CascadeCache,
    session: SessionContext,
    state: WizardState,
}

impl<S> WizardController<S>
where
    S: CatalogSource,
{
    pub fn new(session: SessionContext, resolver: CatalogResolver<S>) -> Self {
        let engine = WizardEngine::default();
        let header = DraftHeader::seeded(&session, Utc::now().date_naive());
        let state = WizardState {
            step: engine.initial_step(),
            header,
            ledger: DraftLedger::new(),
            binder: QuoteBinder::new(),
            item_entry: NewDraftItem::default(),
            requisition_number: None,
            requisition_id: None,
        };
        Self { engine, resolver, cache: CascadeCache::new(), session, state }
    }

    pub fn step(&self) -> WizardStep {
        self.state.step
    }

    pub fn header(&self) -> &DraftHeader {
        &self.state.header
    }

    pub fn items(&self) -> &[DraftItem] {
        self.state.ledger.items()
    }

    pub fn item_entry(&self) -> &NewDraftItem {
        &self.state.item_entry
    }

    pub fn requisition_number(&self) -> Option<&str> {
        self.state.requisition_number.as_deref()
    }

    pub fn requisition_id(&self) -> Option<&RequisitionId> {
        self.state.requisition_id.as_ref()
    }

    pub fn quotes(&self) -> Vec<Quote> {
        self.state.binder.quotes()
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            step: self.state.step,
            header: self.state.header.clone(),
            items: self.state.ledger.display(&self.cache),
            quotes: self.state.binder.quotes(),
            requisition_number: self.state.requisition_number.clone(),
        }
    }

    // ---- catalog access -------------------------------------------------

    /// Resolved options for an unscoped domain, for rendering selects.
    pub fn options(&self, domain: CatalogDomain) -> &[CatalogEntry] {
        self.cache.entries(&CacheKey::Domain(domain))
    }

    /// Description options scoped to the item entry's current product; empty
    /// until a product is selected and its reload has completed.
    pub fn description_options(&self) -> &[CatalogEntry] {
        match &self.state.item_entry.product_id {
            Some(product) => self
                .cache
                .entries(&CacheKey::Scoped(CatalogDomain::ItemDescription, product.clone())),
            None => &[],
        }
    }

    /// Resolves every header-step catalog. Once the Department catalog is in,
    /// the session's department text is matched against it to preselect the
    /// requester's department.
    pub async fn load_header_catalogs(&mut self) {
        for domain in HEADER_DOMAINS {
            self.reload_domain(*domain).await;
        }
        let departments = self.cache.entries(&CacheKey::Domain(CatalogDomain::Department));
        self.state.header.resolve_department(departments);
    }

    /// Resolves the Items-step catalogs (products and units of measure).
    pub async fn load_item_catalogs(&mut self) {
        self.reload_domain(CatalogDomain::Product).await;
        self.reload_domain(CatalogDomain::UnitOfMeasure).await;
    }

    async fn reload_domain(&mut self, domain: CatalogDomain) {
        let key = CacheKey::Domain(domain);
        let token = self.cache.begin_reload(key.clone());
        let entries = self.resolver.resolve(domain).await;
        self.cache.complete(&key, token, entries);
    }

    // ---- header step ----------------------------------------------------

    pub fn set_header_selection(&mut self, domain: CatalogDomain, value: Option<EntryId>) -> bool {
        self.state.header.set_selection(domain, value)
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.state.header.reason = reason.into();
    }

    pub fn set_observations(&mut self, observations: Option<String>) {
        self.state.header.observations =
            observations.filter(|remarks| !remarks.trim().is_empty());
    }

    // ---- item entry and cascade -----------------------------------------

    /// Synchronous half of a product change: clears the dependent selection
    /// and its cached options, records the new product, and mints the reload
    /// token. The caller resolves the options and applies them with
    /// [`apply_description_options`]; results from superseded tokens are
    /// discarded there.
    pub fn begin_product_selection(
        &mut self,
        product: Option<EntryId>,
    ) -> Option<(CacheKey, FetchToken)> {
        if let Some(previous) = self.state.item_entry.product_id.take() {
            self.cache
                .invalidate(&CacheKey::Scoped(CatalogDomain::ItemDescription, previous));
        }
        self.state.item_entry = NewDraftItem { product_id: product.clone(), ..NewDraftItem::default() };

        let product = product?;
        let key = CacheKey::Scoped(CatalogDomain::ItemDescription, product);
        let token = self.cache.begin_reload(key.clone());
        Some((key, token))
    }

    /// Applies a completed description reload; stale tokens are dropped and
    /// the visible option set is left untouched.
    pub fn apply_description_options(
        &mut self,
        key: &CacheKey,
        token: FetchToken,
        entries: Vec<CatalogEntry>,
    ) -> bool {
        self.cache.complete(key, token, entries)
    }

    /// Product change with the resolve performed inline. UI hosts that need to
    /// interleave selections drive [`begin_product_selection`] and
    /// [`apply_description_options`] directly.
    pub async fn select_product(&mut self, product: Option<EntryId>) {
        let Some((key, token)) = self.begin_product_selection(product) else {
            return;
        };
        let entries = match &key {
            CacheKey::Scoped(domain, scope) => {
                self.resolver.resolve_scoped(*domain, Some(scope)).await
            }
            CacheKey::Domain(domain) => self.resolver.resolve(*domain).await,
        };
        self.apply_description_options(&key, token, entries);
    }

    /// Selects a description from the set scoped to the current product and
    /// inherits its estimated unit cost. Identities outside the current scope
    /// are refused, which keeps the description/product invariant intact.
    pub fn select_description(&mut self, description: Option<EntryId>) -> bool {
        let Some(description) = description else {
            self.state.item_entry.description_id = None;
            self.state.item_entry.estimated_unit_cost = None;
            return true;
        };
        let Some(option) =
            self.description_options().iter().find(|entry| entry.id == description)
        else {
            return false;
        };
        let unit_cost = option.unit_cost;
        self.state.item_entry.description_id = Some(description);
        self.state.item_entry.estimated_unit_cost = unit_cost;
        true
    }

    pub fn set_item_quantity(&mut self, quantity: Option<f64>) {
        self.state.item_entry.quantity = quantity;
    }

    pub fn set_item_unit(&mut self, unit: Option<EntryId>) {
        self.state.item_entry.unit_id = unit;
    }

    /// quantity × estimated unit cost for the entry being captured.
    pub fn item_entry_total(&self) -> Option<Decimal> {
        let cost = self.state.item_entry.estimated_unit_cost?;
        let quantity = Decimal::from_f64_retain(self.state.item_entry.quantity?)?;
        Some((cost * quantity).round_dp(2))
    }

    /// Moves the captured entry into the ledger. On success the entry form and
    /// its description options are cleared for the next capture; on rejection
    /// everything stays as typed.
    pub fn add_item(&mut self) -> Result<LocalItemId, ValidationError> {
        let local_id = self.state.ledger.add(self.state.item_entry.clone())?;
        if let Some(product) = self.state.item_entry.product_id.take() {
            self.cache
                .invalidate(&CacheKey::Scoped(CatalogDomain::ItemDescription, product));
        }
        self.state.item_entry = NewDraftItem::default();
        Ok(local_id)
    }

    pub fn update_item(
        &mut self,
        local_id: &LocalItemId,
        patch: DraftItemPatch,
    ) -> Result<(), LedgerError> {
        self.state.ledger.update(local_id, patch)
    }

    pub fn remove_item(&mut self, local_id: &LocalItemId) -> bool {
        self.state.ledger.remove(local_id)
    }

    pub fn item_views(&self) -> Vec<ItemView> {
        self.state.ledger.display(&self.cache)
    }

    // ---- numbering -------------------------------------------------------

    /// Computes the provisional display number. The reservation is soft: a
    /// concurrent session may compute the same number, and the save assigns
    /// the authoritative one.
    pub async fn reserve_number(&mut self) -> Result<String, ReservationError> {
        let number = NumberingReservation::reserve(self.resolver.source()).await?;
        info!(
            event_name = "wizard.number_reserved",
            number = %number,
            "provisional requisition number reserved"
        );
        self.state.requisition_number = Some(number.clone());
        Ok(number)
    }

    // ---- transitions -----------------------------------------------------

    fn context(&self) -> WizardContext {
        WizardContext {
            missing_header_fields: self
                .state
                .header
                .missing_required_fields()
                .into_iter()
                .map(str::to_string)
                .collect(),
            item_count: self.state.ledger.len(),
            reservation_present: self.state.requisition_number.is_some(),
        }
    }

    /// The error that would block `event` right now, if any; used by the UI to
    /// render inline guidance without attempting the transition.
    pub fn blocking_error(&self, event: WizardEvent) -> Option<WizardTransitionError> {
        self.engine.apply(self.state.step, event, &self.context()).err()
    }

    /// Applies a wizard event. A failed guard leaves the step unchanged; a
    /// reset reseeds the header from the session context, empties the ledger,
    /// and clears the reservation, leaving already-persisted quotes alone.
    pub fn advance(
        &mut self,
        event: WizardEvent,
    ) -> Result<TransitionOutcome, WizardTransitionError> {
        let outcome = self.engine.apply(self.state.step, event, &self.context())?;
        self.state.step = outcome.to;
        if event == WizardEvent::ResetRequested {
            self.perform_reset();
        }
        debug!(
            event_name = "wizard.transition_applied",
            from = ?outcome.from,
            to = ?outcome.to,
            "wizard step advanced"
        );
        Ok(outcome)
    }

    fn perform_reset(&mut self) {
        self.state.header = DraftHeader::seeded(&self.session, Utc::now().date_naive());
        let departments = self.cache.entries(&CacheKey::Domain(CatalogDomain::Department));
        self.state.header.resolve_department(departments);
        self.state.ledger.clear();
        self.state.item_entry = NewDraftItem::default();
        self.state.requisition_number = None;
    }

    // ---- persistence and quotes -----------------------------------------

    /// Saves the draft through the persistence collaborator and promotes each
    /// item with its server-assigned identity. The backend's requisition
    /// number replaces the soft reservation.
    pub async fn save_draft<P>(
        &mut self,
        persistence: &P,
    ) -> Result<PersistedRequisition, ApplicationError>
    where
        P: RequisitionPersistence,
    {
        let persisted =
            persistence.save(&self.state.header, self.state.ledger.items()).await?;

        let local_ids: Vec<LocalItemId> = self
            .state
            .ledger
            .items()
            .iter()
            .map(|item| item.local_id.clone())
            .collect();
        if local_ids.len() != persisted.item_ids.len() {
            warn!(
                event_name = "wizard.promotion_count_mismatch",
                local = local_ids.len(),
                server = persisted.item_ids.len(),
                "backend returned a different item count; promoting pairwise"
            );
        }
        for (local_id, server_id) in local_ids.iter().zip(persisted.item_ids.iter()) {
            self.state.ledger.promote(local_id, server_id.clone())?;
        }

        self.state.requisition_id = Some(persisted.id.clone());
        self.state.requisition_number = Some(persisted.number.clone());
        info!(
            event_name = "wizard.draft_persisted",
            requisition = %persisted.id,
            number = %persisted.number,
            "draft saved and items promoted"
        );
        Ok(persisted)
    }

    pub fn eligible_quote_items(&self) -> Vec<DraftItem> {
        self.state.binder.eligible_items(&self.state.ledger)
    }

    pub fn stage_quote_upload(
        &self,
        file: UploadCandidate,
        selection: Vec<ServerItemId>,
    ) -> Result<PendingUpload, UploadError> {
        self.state.binder.stage_upload(&self.state.ledger, file, selection)
    }

    pub async fn commit_quote_upload<Q>(
        &self,
        store: &Q,
        upload: PendingUpload,
    ) -> Result<QuoteId, ApplicationError>
    where
        Q: QuoteStore,
    {
        let requisition = self.persisted_requisition()?;
        self.state.binder.commit_upload(store, requisition, upload).await
    }

    pub async fn remove_quote<Q>(
        &self,
        store: &Q,
        quote: &QuoteId,
    ) -> Result<(), ApplicationError>
    where
        Q: QuoteStore,
    {
        let requisition = self.persisted_requisition()?;
        self.state.binder.remove_quote(store, requisition, quote).await
    }

    pub async fn resync_quotes<Q>(&self, store: &Q) -> Result<(), ApplicationError>
    where
        Q: QuoteStore,
    {
        let requisition = self.persisted_requisition()?;
        self.state.binder.resync(store, requisition).await
    }

    fn persisted_requisition(&self) -> Result<&RequisitionId, ApplicationError> {
        self.state
            .requisition_id
            .as_ref()
            .ok_or_else(|| ApplicationError::from(UploadError::SaveDraftFirst))
    }
}
