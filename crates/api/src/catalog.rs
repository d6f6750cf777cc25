use async_trait::async_trait;
use serde_json::Value;

use reqdraft_core::{CatalogSource, SourceError};

use crate::client::ApiClient;

/// The backend itself is the catalog source: every candidate endpoint the
/// resolver probes, and every numbering query, goes through one GET.
#[async_trait]
impl CatalogSource for ApiClient {
    async fn fetch(&self, endpoint: &str) -> Result<Value, SourceError> {
        self.get_json(endpoint).await
    }
}
