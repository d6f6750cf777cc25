use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use reqdraft_core::catalog::normalize_collection;
use reqdraft_core::{
    PendingUpload, PersistenceError, Quote, QuoteId, QuoteStore, RequisitionId, ServerItemId,
    SourceError,
};

use crate::client::ApiClient;

/// Quote store backed by the backend's nested quotes resource:
/// `/requisitions/{id}/quotes/`.
pub struct HttpQuoteStore {
    client: Arc<ApiClient>,
}

impl HttpQuoteStore {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    fn collection_endpoint(requisition: &RequisitionId) -> String {
        format!("/requisitions/{requisition}/quotes/")
    }

    fn member_endpoint(requisition: &RequisitionId, quote: &QuoteId) -> String {
        format!("/requisitions/{requisition}/quotes/{quote}/")
    }
}

#[async_trait]
impl QuoteStore for HttpQuoteStore {
    async fn list(&self, requisition: &RequisitionId) -> Result<Vec<Quote>, PersistenceError> {
        let payload = self
            .client
            .get_json(&Self::collection_endpoint(requisition))
            .await
            .map_err(read_failure)?;
        Ok(parse_quotes(&payload))
    }

    async fn create(
        &self,
        requisition: &RequisitionId,
        upload: &PendingUpload,
    ) -> Result<Quote, PersistenceError> {
        let bytes = tokio::fs::read(&upload.file.file_ref).await.map_err(|error| {
            PersistenceError::Transport(format!(
                "could not read `{}`: {error}",
                upload.file.file_ref
            ))
        })?;

        let file_part = Part::bytes(bytes)
            .file_name(upload.file.original_name.clone())
            .mime_str("application/pdf")
            .map_err(|error| PersistenceError::Transport(error.to_string()))?;
        let mut form = Form::new().part("file", file_part);
        // item_ids is repeated so the backend can read it as a list.
        for item in &upload.items {
            form = form.text("item_ids", item.0.clone());
        }

        let payload =
            self.client.post_multipart(&Self::collection_endpoint(requisition), form).await?;
        parse_quote(&payload).ok_or_else(|| {
            PersistenceError::Rejected("quote response carried no identifier".to_string())
        })
    }

    async fn delete(
        &self,
        requisition: &RequisitionId,
        quote: &QuoteId,
    ) -> Result<(), PersistenceError> {
        self.client.delete(&Self::member_endpoint(requisition, quote)).await
    }
}

fn read_failure(error: SourceError) -> PersistenceError {
    match error {
        SourceError::Transport(message) | SourceError::Decode(message) => {
            PersistenceError::Transport(message)
        }
        SourceError::Status { status } => PersistenceError::Rejected(format!("status {status}")),
    }
}

fn parse_quotes(payload: &Value) -> Vec<Quote> {
    normalize_collection(payload)
        .unwrap_or_default()
        .iter()
        .filter_map(parse_quote)
        .collect()
}

fn parse_quote(record: &Value) -> Option<Quote> {
    let id = scalar_string(record.get("id")?)?;
    let items: BTreeSet<ServerItemId> = record
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(scalar_string))
                .map(ServerItemId)
                .collect()
        })
        .unwrap_or_default();

    Some(Quote {
        id: QuoteId(id.clone()),
        file_url: record.get("file_url").and_then(Value::as_str).map(str::to_string),
        original_name: record
            .get("original_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("quote-{id}.pdf")),
        size_bytes: record.get("size_bytes").and_then(Value::as_u64).unwrap_or(0),
        items,
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}
