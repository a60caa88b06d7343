use serde_json::Value as JsonValue;
use url::Url;

use super::{Envelope, Gateway, GraphqlRequest, Operation, Variables};
use crate::config::ClientConfig;
use crate::error::Error;

/// reqwest-backed [`Gateway`] posting JSON to one endpoint.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    endpoint: Url,
    http: reqwest::Client,
}

impl HttpGateway {
    /// Build a gateway for the configured endpoint and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            http,
        })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Checks HTTP status; returns the response on success or a transport error
    /// carrying the server's first GraphQL error message when it sent one.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Envelope>(&body)
            .ok()
            .and_then(|envelope| envelope.first_error().map(str::to_owned))
            .unwrap_or(body);
        tracing::warn!(operation, status, detail = %detail, "Gateway returned error status");
        Err(Error::Transport {
            operation,
            status: Some(status),
            detail,
        })
    }
}

impl Gateway for HttpGateway {
    async fn execute(
        &self,
        operation: &Operation,
        variables: Variables,
    ) -> Result<JsonValue, Error> {
        let name = operation.name;
        let body = GraphqlRequest::new(operation, &variables);

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(operation = name, error = %e, "Gateway unreachable");
                Error::Transport {
                    operation: name,
                    status: None,
                    detail: "Cannot connect to the server. Please check your network.".into(),
                }
            })?;

        let response = Self::ensure_success(response, name).await?;
        let envelope: Envelope = response.json().await.map_err(|e| Error::Transport {
            operation: name,
            status: None,
            detail: format!("malformed response: {e}"),
        })?;
        envelope.into_data(name)
    }
}
