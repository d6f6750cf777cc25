use std::collections::HashMap;

use tracing::debug;

use crate::catalog::{CatalogDomain, CatalogEntry, EntryId};

/// Cache key for one resolved option set: either a whole domain or a domain
/// scoped by the parent entry it was resolved under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Domain(CatalogDomain),
    Scoped(CatalogDomain, EntryId),
}

/// Monotonic generation token minted per reload. A completion is applied only
/// while its token is still the active one for the key, so the option set
/// always reflects the most recently issued request, never the most recently
/// arrived response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchToken(u64);

#[derive(Default)]
pub struct CascadeCache {
    entries: HashMap<CacheKey, Vec<CatalogEntry>>,
    active: HashMap<CacheKey, FetchToken>,
    next_token: u64,
}

impl CascadeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronously clears the key's cached entries and mints a fresh token
    /// that supersedes any still-outstanding reload of the same key.
    pub fn begin_reload(&mut self, key: CacheKey) -> FetchToken {
        self.next_token += 1;
        let token = FetchToken(self.next_token);
        self.entries.remove(&key);
        self.active.insert(key, token);
        token
    }

    /// Applies a completed reload if its token is still active for the key.
    /// Stale completions are discarded silently; returns whether the result
    /// was applied.
    pub fn complete(
        &mut self,
        key: &CacheKey,
        token: FetchToken,
        entries: Vec<CatalogEntry>,
    ) -> bool {
        if self.active.get(key) != Some(&token) {
            debug!(
                event_name = "cascade.stale_result_discarded",
                key = ?key,
                "discarding out-of-order catalog result"
            );
            return false;
        }
        self.active.remove(key);
        self.entries.insert(key.clone(), entries);
        true
    }

    pub fn entries(&self, key: &CacheKey) -> &[CatalogEntry] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn label_for(&self, key: &CacheKey, id: &EntryId) -> Option<&str> {
        self.entries
            .get(key)?
            .iter()
            .find(|entry| &entry.id == id)
            .map(|entry| entry.label.as_str())
    }

    pub fn find(&self, key: &CacheKey, id: &EntryId) -> Option<&CatalogEntry> {
        self.entries.get(key)?.iter().find(|entry| &entry.id == id)
    }

    /// Drops the key's entries and invalidates any outstanding reload of it.
    pub fn invalidate(&mut self, key: &CacheKey) {
        self.entries.remove(key);
        self.active.remove(key);
    }

    /// Drops every scoped option set of the domain, e.g. all per-product
    /// description sets when the product catalog itself is reloaded.
    pub fn invalidate_scoped(&mut self, domain: CatalogDomain) {
        self.entries.retain(|key, _| !matches!(key, CacheKey::Scoped(d, _) if *d == domain));
        self.active.retain(|key, _| !matches!(key, CacheKey::Scoped(d, _) if *d == domain));
    }
}
