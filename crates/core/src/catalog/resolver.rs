use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{
    entry_from_record, normalize_collection, CatalogDomain, CatalogEntry, EntryId,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("endpoint answered with status {status}")]
    Status { status: u16 },
    #[error("response body was not decodable as JSON: {0}")]
    Decode(String),
}

/// Read-only access to the backend's catalog endpoints. Implementations fetch
/// one endpoint and hand back the raw JSON payload; interpretation stays here.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self, endpoint: &str) -> Result<Value, SourceError>;
}

pub struct CatalogResolver<S> {
    source: S,
}

impl<S> CatalogResolver<S>
where
    S: CatalogSource,
{
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn resolve(&self, domain: CatalogDomain) -> Vec<CatalogEntry> {
        self.resolve_scoped(domain, None).await
    }

    /// Probes the domain's candidates in declared order and accepts the first
    /// one that normalizes to a non-empty entry list. Individual candidate
    /// failures are swallowed; exhausting every candidate yields an empty
    /// sequence, which callers must treat as "unavailable" rather than fatal.
    pub async fn resolve_scoped(
        &self,
        domain: CatalogDomain,
        scope: Option<&EntryId>,
    ) -> Vec<CatalogEntry> {
        for endpoint in domain.candidate_endpoints(scope) {
            let payload = match self.source.fetch(&endpoint).await {
                Ok(payload) => payload,
                Err(error) => {
                    debug!(
                        event_name = "catalog.candidate_failed",
                        domain = %domain,
                        endpoint = %endpoint,
                        error = %error,
                        "candidate endpoint failed, trying next"
                    );
                    continue;
                }
            };

            let Some(records) = normalize_collection(&payload) else {
                debug!(
                    event_name = "catalog.candidate_shape_rejected",
                    domain = %domain,
                    endpoint = %endpoint,
                    "candidate response had an unrecognized shape, trying next"
                );
                continue;
            };

            let entries: Vec<CatalogEntry> = records.iter().filter_map(entry_from_record).collect();
            if entries.is_empty() {
                continue;
            }

            debug!(
                event_name = "catalog.resolved",
                domain = %domain,
                endpoint = %endpoint,
                entry_count = entries.len(),
                "catalog domain resolved"
            );
            return entries;
        }

        warn!(
            event_name = "catalog.resolution_exhausted",
            domain = %domain,
            "every candidate endpoint failed or returned empty"
        );
        Vec::new()
    }
}
