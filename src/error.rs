/// Errors surfaced to callers of this crate.
///
/// Every variant carries a human-readable message suitable for display.
/// Match on the variant to decide how to react: retry on [`Error::Transport`],
/// start the password-reset flow on [`Error::CredentialExpired`], and so on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The gateway rejected the supplied credentials.
    #[error("{0}")]
    Authentication(String),

    /// Credentials were valid but the password has expired.
    ///
    /// `email` identifies the account so a reset can start without asking again.
    #[error("{message}")]
    CredentialExpired {
        message: String,
        email: Option<String>,
    },

    /// The endpoint was unreachable, answered with a non-2xx status, or sent
    /// something that is not a GraphQL envelope.
    #[error("Transport error during {operation}: {detail}")]
    Transport {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    /// Local persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The gateway answered with a non-empty `errors` list.
    #[error("{0}")]
    Gateway(String),

    /// A business operation answered `success: false`.
    #[error("{0}")]
    Rejected(String),

    /// Another login is already in flight.
    #[error("A login is already in progress")]
    Busy,

    /// The operation needs a logged-in user.
    #[error("Not logged in")]
    NotLoggedIn,

    /// An order was submitted without any items.
    #[error("Please select at least one item to order")]
    EmptyOrder,

    /// The item is not on the menu the order was drafted against.
    #[error("Item is not on the menu: {0}")]
    UnknownItem(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Verification code must be 6 characters")]
    InvalidResetCode,

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether retrying the same call unchanged may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Storage(_) | Self::Busy)
    }

    pub(crate) fn storage(e: impl std::fmt::Display) -> Self {
        Self::Storage(e.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport {
            operation: "request",
            status: e.status().map(|s| s.as_u16()),
            detail: e.to_string(),
        }
    }
}
