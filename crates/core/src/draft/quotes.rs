use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::draft::ledger::{DraftItem, DraftLedger, ServerItemId};
use crate::draft::RequisitionId;
use crate::errors::{ApplicationError, PersistenceError};

/// Fixed upload ceiling: 50 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl std::fmt::Display for QuoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An uploaded quote document as reported by the quote store. The store is the
/// source of truth; the binder never trusts its own optimistic copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub file_url: Option<String>,
    pub original_name: String,
    pub size_bytes: u64,
    pub items: BTreeSet<ServerItemId>,
}

/// File picked for upload, by reference; content stays with the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadCandidate {
    pub file_ref: String,
    pub original_name: String,
    pub size_bytes: u64,
}

/// A validated upload waiting to be committed.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingUpload {
    pub file: UploadCandidate,
    pub items: Vec<ServerItemId>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("there are no draft items to quote against")]
    NoItems,
    #[error("no items are quotable yet; save the draft so items receive server identities")]
    SaveDraftFirst,
    #[error("every item is already covered by a quote")]
    NothingEligible,
    #[error("only PDF files can be attached as quotes")]
    NotAPdf,
    #[error("file is {size_bytes} bytes; the ceiling is {limit_bytes} bytes")]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },
    #[error("select at least one item for this quote")]
    EmptySelection,
    #[error("selected item `{item}` is not part of this draft")]
    UnknownSelection { item: ServerItemId },
    #[error("item `{item}` is already covered by quote `{quote}`")]
    AlreadyQuoted { item: ServerItemId, quote: QuoteId },
    #[error("another upload is already in flight")]
    UploadInFlight,
}

/// External quote store, scoped to one persisted requisition.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn list(&self, requisition: &RequisitionId) -> Result<Vec<Quote>, PersistenceError>;
    async fn create(
        &self,
        requisition: &RequisitionId,
        upload: &PendingUpload,
    ) -> Result<Quote, PersistenceError>;
    async fn delete(
        &self,
        requisition: &RequisitionId,
        quote: &QuoteId,
    ) -> Result<(), PersistenceError>;
}

/// Associates uploaded quote documents with ledger items and enforces the
/// eligibility and exclusivity invariants: only persisted items can be quoted,
/// and a server identity belongs to at most one quote at a time.
#[derive(Debug, Default)]
pub struct QuoteBinder {
    quotes: Mutex<Vec<Quote>>,
    upload_busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl QuoteBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quotes(&self) -> Vec<Quote> {
        self.quotes_lock().clone()
    }

    pub fn quote_covering(&self, item: &ServerItemId) -> Option<QuoteId> {
        self.quotes_lock()
            .iter()
            .find(|quote| quote.items.contains(item))
            .map(|quote| quote.id.clone())
    }

    /// Items that can still be attached to a quote: persisted (server identity
    /// assigned) and not yet referenced by any existing quote.
    pub fn eligible_items(&self, ledger: &DraftLedger) -> Vec<DraftItem> {
        let quotes = self.quotes_lock();
        ledger
            .items()
            .iter()
            .filter(|item| match &item.server_id {
                Some(server_id) => !quotes.iter().any(|quote| quote.items.contains(server_id)),
                None => false,
            })
            .cloned()
            .collect()
    }

    /// Validates a file and an item selection into a pending upload without
    /// touching any state. Selections referencing ineligible identities are
    /// rejected, not silently filtered.
    pub fn stage_upload(
        &self,
        ledger: &DraftLedger,
        file: UploadCandidate,
        selection: Vec<ServerItemId>,
    ) -> Result<PendingUpload, UploadError> {
        if ledger.is_empty() {
            return Err(UploadError::NoItems);
        }

        let eligible = self.eligible_items(ledger);
        if eligible.is_empty() {
            if ledger.items().iter().any(|item| item.server_id.is_none()) {
                return Err(UploadError::SaveDraftFirst);
            }
            return Err(UploadError::NothingEligible);
        }

        if !is_pdf_name(&file.original_name) {
            return Err(UploadError::NotAPdf);
        }
        if file.size_bytes > MAX_UPLOAD_BYTES {
            return Err(UploadError::FileTooLarge {
                size_bytes: file.size_bytes,
                limit_bytes: MAX_UPLOAD_BYTES,
            });
        }
        if selection.is_empty() {
            return Err(UploadError::EmptySelection);
        }

        let eligible_ids: BTreeSet<ServerItemId> =
            eligible.iter().filter_map(|item| item.server_id.clone()).collect();
        let mut items = BTreeSet::new();
        for item in selection {
            if eligible_ids.contains(&item) {
                items.insert(item);
                continue;
            }
            if let Some(quote) = self.quote_covering(&item) {
                return Err(UploadError::AlreadyQuoted { item, quote });
            }
            return Err(UploadError::UnknownSelection { item });
        }

        Ok(PendingUpload { file, items: items.into_iter().collect() })
    }

    /// Commits a staged upload to the store. At most one upload may be in
    /// flight; a concurrent invocation is rejected synchronously, not queued.
    /// On success the quote list is refetched from the store.
    pub async fn commit_upload<S>(
        &self,
        store: &S,
        requisition: &RequisitionId,
        upload: PendingUpload,
    ) -> Result<QuoteId, ApplicationError>
    where
        S: QuoteStore,
    {
        if self.upload_busy.swap(true, Ordering::SeqCst) {
            return Err(UploadError::UploadInFlight.into());
        }
        let _busy = BusyGuard(&self.upload_busy);

        debug!(
            event_name = "quotes.upload_started",
            requisition = %requisition,
            file = %upload.file.original_name,
            item_count = upload.items.len(),
            "committing quote upload"
        );
        let created = store.create(requisition, &upload).await.map_err(|error| {
            warn!(
                event_name = "quotes.upload_rejected",
                requisition = %requisition,
                error = %error,
                "quote upload rejected by store"
            );
            ApplicationError::from(error)
        })?;
        let quote_id = created.id.clone();

        self.resync(store, requisition).await?;
        Ok(quote_id)
    }

    /// Deletes a quote and then unconditionally resynchronizes from the store,
    /// so a server-side failure is observed instead of being masked by a
    /// local-only removal.
    pub async fn remove_quote<S>(
        &self,
        store: &S,
        requisition: &RequisitionId,
        quote: &QuoteId,
    ) -> Result<(), ApplicationError>
    where
        S: QuoteStore,
    {
        let deleted = store.delete(requisition, quote).await;
        let resynced = self.resync(store, requisition).await;

        deleted.map_err(ApplicationError::from)?;
        resynced
    }

    /// Replaces the local quote view with the store's ground truth.
    pub async fn resync<S>(
        &self,
        store: &S,
        requisition: &RequisitionId,
    ) -> Result<(), ApplicationError>
    where
        S: QuoteStore,
    {
        let quotes = store.list(requisition).await.map_err(ApplicationError::from)?;
        *self.quotes_lock() = quotes;
        Ok(())
    }

    pub fn clear(&self) {
        self.quotes_lock().clear();
    }

    fn quotes_lock(&self) -> MutexGuard<'_, Vec<Quote>> {
        match self.quotes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn is_pdf_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use tokio::sync::{Notify, RwLock};

    use super::{
        PendingUpload, Quote, QuoteBinder, QuoteId, QuoteStore, UploadCandidate, UploadError,
        MAX_UPLOAD_BYTES,
    };
    use crate::catalog::EntryId;
    use crate::draft::ledger::{DraftLedger, NewDraftItem, ServerItemId};
    use crate::draft::RequisitionId;
    use crate::errors::{ApplicationError, DomainError, PersistenceError};

    #[derive(Default)]
    struct InMemoryQuoteStore {
        quotes: RwLock<Vec<Quote>>,
        fail_delete: bool,
        create_gate: Option<Arc<Notify>>,
    }

    #[async_trait::async_trait]
    impl QuoteStore for InMemoryQuoteStore {
        async fn list(&self, _requisition: &RequisitionId) -> Result<Vec<Quote>, PersistenceError> {
            Ok(self.quotes.read().await.clone())
        }

        async fn create(
            &self,
            _requisition: &RequisitionId,
            upload: &PendingUpload,
        ) -> Result<Quote, PersistenceError> {
            if let Some(gate) = &self.create_gate {
                gate.notified().await;
            }
            let mut quotes = self.quotes.write().await;
            let quote = Quote {
                id: QuoteId(format!("q{}", quotes.len() + 1)),
                file_url: None,
                original_name: upload.file.original_name.clone(),
                size_bytes: upload.file.size_bytes,
                items: upload.items.iter().cloned().collect(),
            };
            quotes.push(quote.clone());
            Ok(quote)
        }

        async fn delete(
            &self,
            _requisition: &RequisitionId,
            quote: &QuoteId,
        ) -> Result<(), PersistenceError> {
            if self.fail_delete {
                return Err(PersistenceError::Rejected("quote is referenced".to_string()));
            }
            self.quotes.write().await.retain(|existing| &existing.id != quote);
            Ok(())
        }
    }

    fn requisition() -> RequisitionId {
        RequisitionId("77".to_string())
    }

    fn pdf(name: &str) -> UploadCandidate {
        UploadCandidate { file_ref: format!("/tmp/{name}"), original_name: name.to_string(), size_bytes: 4096 }
    }

    fn ledger_with(items: &[(&str, Option<&str>)]) -> DraftLedger {
        let mut ledger = DraftLedger::new();
        for (index, (product, server_id)) in items.iter().enumerate() {
            let local_id = ledger
                .add(NewDraftItem {
                    product_id: Some(EntryId(product.to_string())),
                    quantity: Some(1.0),
                    unit_id: Some(EntryId("u1".to_string())),
                    description_id: Some(EntryId(format!("d{index}"))),
                    estimated_unit_cost: None,
                })
                .expect("valid item");
            if let Some(server_id) = server_id {
                ledger
                    .promote(&local_id, ServerItemId(server_id.to_string()))
                    .expect("known item");
            }
        }
        ledger
    }

    fn existing_quote(id: &str, items: &[&str]) -> Quote {
        Quote {
            id: QuoteId(id.to_string()),
            file_url: None,
            original_name: "previo.pdf".to_string(),
            size_bytes: 1024,
            items: items.iter().map(|item| ServerItemId(item.to_string())).collect::<BTreeSet<_>>(),
        }
    }

    #[tokio::test]
    async fn eligible_items_exclude_unpersisted_and_already_quoted_items() {
        let binder = QuoteBinder::new();
        let store = InMemoryQuoteStore {
            quotes: RwLock::new(vec![existing_quote("q1", &["10"])]),
            ..InMemoryQuoteStore::default()
        };
        binder.resync(&store, &requisition()).await.expect("resync");

        let ledger = ledger_with(&[("p1", Some("10")), ("p2", Some("11")), ("p3", None)]);
        let eligible = binder.eligible_items(&ledger);

        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].server_id, Some(ServerItemId("11".to_string())));
    }

    #[tokio::test]
    async fn stage_upload_rejects_non_pdf_and_oversized_files() {
        let binder = QuoteBinder::new();
        let ledger = ledger_with(&[("p1", Some("10"))]);

        let error = binder
            .stage_upload(&ledger, pdf("cotizacion.docx"), vec![ServerItemId("10".to_string())])
            .expect_err("extension check");
        assert_eq!(error, UploadError::NotAPdf);

        let mut oversized = pdf("cotizacion.pdf");
        oversized.size_bytes = MAX_UPLOAD_BYTES + 1;
        let error = binder
            .stage_upload(&ledger, oversized, vec![ServerItemId("10".to_string())])
            .expect_err("size ceiling");
        assert!(matches!(error, UploadError::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn stage_upload_requires_an_explicit_selection_when_scoping_is_possible() {
        let binder = QuoteBinder::new();
        let ledger = ledger_with(&[("p1", Some("10"))]);

        let error = binder
            .stage_upload(&ledger, pdf("cotizacion.pdf"), Vec::new())
            .expect_err("unscoped upload");
        assert_eq!(error, UploadError::EmptySelection);
    }

    #[tokio::test]
    async fn stage_upload_signals_save_first_when_no_item_has_a_server_identity() {
        let binder = QuoteBinder::new();
        let ledger = ledger_with(&[("p1", None), ("p2", None)]);

        let error = binder
            .stage_upload(&ledger, pdf("cotizacion.pdf"), Vec::new())
            .expect_err("nothing persisted yet");
        assert_eq!(error, UploadError::SaveDraftFirst);
    }

    #[tokio::test]
    async fn stage_upload_rejects_ineligible_selections_instead_of_filtering_them() {
        let binder = QuoteBinder::new();
        let store = InMemoryQuoteStore {
            quotes: RwLock::new(vec![existing_quote("q1", &["10"])]),
            ..InMemoryQuoteStore::default()
        };
        binder.resync(&store, &requisition()).await.expect("resync");
        let ledger = ledger_with(&[("p1", Some("10")), ("p2", Some("11"))]);

        let already = binder
            .stage_upload(
                &ledger,
                pdf("cotizacion.pdf"),
                vec![ServerItemId("11".to_string()), ServerItemId("10".to_string())],
            )
            .expect_err("item 10 already quoted");
        assert_eq!(
            already,
            UploadError::AlreadyQuoted {
                item: ServerItemId("10".to_string()),
                quote: QuoteId("q1".to_string()),
            }
        );

        let unknown = binder
            .stage_upload(&ledger, pdf("cotizacion.pdf"), vec![ServerItemId("99".to_string())])
            .expect_err("identity outside the draft");
        assert_eq!(unknown, UploadError::UnknownSelection { item: ServerItemId("99".to_string()) });
    }

    #[tokio::test]
    async fn commit_refreshes_the_quote_view_from_the_store() {
        let binder = QuoteBinder::new();
        let store = InMemoryQuoteStore::default();
        let ledger = ledger_with(&[("p1", Some("10"))]);

        let upload = binder
            .stage_upload(&ledger, pdf("cotizacion.pdf"), vec![ServerItemId("10".to_string())])
            .expect("staged upload");
        let quote_id =
            binder.commit_upload(&store, &requisition(), upload).await.expect("committed");

        let quotes = binder.quotes();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].id, quote_id);
        assert!(quotes[0].items.contains(&ServerItemId("10".to_string())));
    }

    #[tokio::test]
    async fn a_second_commit_while_one_is_in_flight_is_rejected_not_queued() {
        let gate = Arc::new(Notify::new());
        let binder = Arc::new(QuoteBinder::new());
        let store = Arc::new(InMemoryQuoteStore {
            create_gate: Some(gate.clone()),
            ..InMemoryQuoteStore::default()
        });
        let ledger = ledger_with(&[("p1", Some("10")), ("p2", Some("11"))]);

        let first = binder
            .stage_upload(&ledger, pdf("a.pdf"), vec![ServerItemId("10".to_string())])
            .expect("staged");
        let second = binder
            .stage_upload(&ledger, pdf("b.pdf"), vec![ServerItemId("11".to_string())])
            .expect("staged");

        let in_flight = {
            let binder = binder.clone();
            let store = store.clone();
            tokio::spawn(async move { binder.commit_upload(&*store, &requisition(), first).await })
        };
        // Let the first commit reach the store and park on the gate.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        let rejection = binder
            .commit_upload(&*store, &requisition(), second)
            .await
            .expect_err("second upload must be rejected while busy");
        assert!(matches!(
            rejection,
            ApplicationError::Domain(DomainError::Upload(UploadError::UploadInFlight))
        ));

        gate.notify_one();
        in_flight.await.expect("task").expect("first upload completes");
        assert_eq!(binder.quotes().len(), 1, "only the first upload went through");
    }

    #[tokio::test]
    async fn removing_a_quote_resyncs_even_when_the_delete_fails_server_side() {
        let binder = QuoteBinder::new();
        let store = InMemoryQuoteStore {
            quotes: RwLock::new(vec![existing_quote("q1", &["10"])]),
            fail_delete: true,
            ..InMemoryQuoteStore::default()
        };
        binder.resync(&store, &requisition()).await.expect("resync");

        let error = binder
            .remove_quote(&store, &requisition(), &QuoteId("q1".to_string()))
            .await
            .expect_err("delete fails server-side");
        assert!(matches!(error, ApplicationError::Persistence(_)));

        // The failed delete must not look like a success locally.
        assert_eq!(binder.quotes().len(), 1);
    }

    #[tokio::test]
    async fn removing_a_quote_frees_its_items_for_requoting() {
        let binder = QuoteBinder::new();
        let store = InMemoryQuoteStore {
            quotes: RwLock::new(vec![existing_quote("q1", &["10"])]),
            ..InMemoryQuoteStore::default()
        };
        binder.resync(&store, &requisition()).await.expect("resync");
        let ledger = ledger_with(&[("p1", Some("10"))]);
        assert!(binder.eligible_items(&ledger).is_empty());

        binder
            .remove_quote(&store, &requisition(), &QuoteId("q1".to_string()))
            .await
            .expect("delete succeeds");

        assert_eq!(binder.eligible_items(&ledger).len(), 1);
    }
}
