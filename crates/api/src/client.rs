use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use reqdraft_core::config::ApiConfig;
use reqdraft_core::{PersistenceError, SourceError};

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("failed to construct the http client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Thin wrapper over `reqwest::Client` that joins endpoints onto the
/// configured base URL and attaches the bearer token when one is configured.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    auth_token: Option<SecretString>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ApiClientError::Build)?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim_start_matches('/');
        format!("{}/{}", self.base_url, endpoint)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// GET returning decoded JSON; read-side errors use the catalog source
    /// taxonomy so the resolver can swallow them per candidate.
    pub async fn get_json(&self, endpoint: &str) -> Result<Value, SourceError> {
        let url = self.endpoint_url(endpoint);
        debug!(event_name = "api.get", url = %url, "fetching");
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|error| SourceError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { status: status.as_u16() });
        }

        response
            .json::<Value>()
            .await
            .map_err(|error| SourceError::Decode(error.to_string()))
    }

    pub async fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<Value, PersistenceError> {
        let url = self.endpoint_url(endpoint);
        debug!(event_name = "api.post", url = %url, "posting");
        let response = self
            .authorized(self.http.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|error| PersistenceError::Transport(error.to_string()))?;
        decode_write_response(response).await
    }

    pub async fn post_multipart(
        &self,
        endpoint: &str,
        form: Form,
    ) -> Result<Value, PersistenceError> {
        let url = self.endpoint_url(endpoint);
        debug!(event_name = "api.post_multipart", url = %url, "uploading");
        let response = self
            .authorized(self.http.post(&url))
            .multipart(form)
            .send()
            .await
            .map_err(|error| PersistenceError::Transport(error.to_string()))?;
        decode_write_response(response).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<(), PersistenceError> {
        let url = self.endpoint_url(endpoint);
        debug!(event_name = "api.delete", url = %url, "deleting");
        let response = self
            .authorized(self.http.delete(&url))
            .send()
            .await
            .map_err(|error| PersistenceError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Rejected(rejection_message(status.as_u16(), &detail)));
        }
        Ok(())
    }
}

async fn decode_write_response(response: Response) -> Result<Value, PersistenceError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(PersistenceError::Rejected(rejection_message(status.as_u16(), &detail)));
    }
    response
        .json::<Value>()
        .await
        .map_err(|error| PersistenceError::Transport(error.to_string()))
}

fn rejection_message(status: u16, detail: &str) -> String {
    let detail = detail.trim();
    if detail.is_empty() {
        format!("status {status}")
    } else {
        format!("status {status}: {detail}")
    }
}

#[cfg(test)]
mod tests {
    use reqdraft_core::config::ApiConfig;

    use super::{rejection_message, ApiClient};

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: base_url.to_string(),
            auth_token: None,
            timeout_secs: 5,
        })
        .expect("client builds")
    }

    #[test]
    fn endpoint_joining_tolerates_slashes_on_both_sides() {
        let client = client("http://backend.local/api/");
        assert_eq!(
            client.endpoint_url("/catalogs/products/"),
            "http://backend.local/api/catalogs/products/"
        );
        assert_eq!(
            client.endpoint_url("catalogs/products/"),
            "http://backend.local/api/catalogs/products/"
        );
    }

    #[test]
    fn rejection_messages_carry_status_and_optional_detail() {
        assert_eq!(rejection_message(403, ""), "status 403");
        assert_eq!(
            rejection_message(400, "{\"quantity\": \"required\"}"),
            "status 400: {\"quantity\": \"required\"}"
        );
    }
}
