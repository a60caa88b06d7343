//! GraphQL-over-HTTP gateway: the single remote endpoint behind every call.

#[cfg(feature = "http")]
mod http;

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Error;

#[cfg(feature = "http")]
pub use http::HttpGateway;

/// Variables sent alongside an operation.
pub type Variables = serde_json::Map<String, JsonValue>;

/// A named GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Operation name, also the key used in error reports.
    pub name: &'static str,
    /// Full GraphQL document text.
    pub document: &'static str,
}

/// Anything that can run an [`Operation`] and hand back its `data` object.
///
/// Implementations must map a non-empty `errors` list to [`Error::Gateway`]
/// with the first message, and an unreachable endpoint, non-2xx status or
/// undecodable body to [`Error::Transport`]. [`Envelope::into_data`] does the
/// first half for you.
pub trait Gateway: Send + Sync + 'static {
    fn execute(
        &self,
        operation: &Operation,
        variables: Variables,
    ) -> impl Future<Output = Result<JsonValue, Error>> + Send;
}

/// Request body as sent on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest<'a> {
    pub query: &'a str,
    pub operation_name: &'a str,
    pub variables: &'a Variables,
}

impl<'a> GraphqlRequest<'a> {
    #[must_use]
    pub fn new(operation: &'a Operation, variables: &'a Variables) -> Self {
        Self {
            query: operation.document,
            operation_name: operation.name,
            variables,
        }
    }
}

/// One entry of the response `errors` list.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

/// Response body as received on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub data: Option<JsonValue>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}

impl Envelope {
    /// First error message, if the gateway reported any.
    #[must_use]
    pub fn first_error(&self) -> Option<&str> {
        self.errors
            .as_deref()
            .and_then(|errors| errors.first())
            .map(|e| e.message.as_str())
    }

    /// Unwrap the `data` object, surfacing the first error if any.
    ///
    /// # Errors
    ///
    /// [`Error::Gateway`] when `errors` is non-empty, [`Error::Transport`] when
    /// `data` is missing.
    pub fn into_data(self, operation: &'static str) -> Result<JsonValue, Error> {
        if let Some(message) = self.first_error() {
            return Err(Error::Gateway(message.to_owned()));
        }
        match self.data {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(Error::Transport {
                operation,
                status: None,
                detail: "response carried neither data nor errors".into(),
            }),
        }
    }
}
