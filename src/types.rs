use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};

/// Server-assigned account identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Server-assigned order identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct OrderId(pub i64);

/// Account role. Anything the server sends other than `"ADMIN"` is a customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Admin => "ADMIN",
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("ADMIN") {
            Self::Admin
        } else {
            Self::Customer
        }
    }
}

impl From<Role> for String {
    fn from(r: Role) -> Self {
        r.as_str().to_owned()
    }
}

/// Service tier gating which menu a customer sees.
///
/// Values the client does not know are kept verbatim in [`Tier::Other`] so
/// they survive a round-trip through storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tier {
    #[default]
    Pending,
    Saver,
    Premium,
    Other(String),
}

impl Tier {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Saver => "SAVER",
            Self::Premium => "PREMIUM",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Tier {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => Self::Pending,
            "SAVER" => Self::Saver,
            "PREMIUM" => Self::Premium,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for Tier {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<Tier> for String {
    fn from(t: Tier) -> Self {
        match t {
            Tier::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

/// User record as returned by the gateway and cached locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub tier: Tier,
}

impl User {
    /// Create a customer in the `PENDING` tier.
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            display_name: None,
            email: None,
            role: Role::Customer,
            tier: Tier::Pending,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Name to greet the user with: display name if set, else username.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Whether the controller has finished restoring from storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadingState {
    #[default]
    Initializing,
    Idle,
}

/// A logged-in user together with its credential token.
///
/// The two only ever exist together, which is why they share one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub(crate) token: String,
    pub(crate) user: User,
}

impl ActiveSession {
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }
}

/// Client-local view of who is logged in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub(crate) loading_state: LoadingState,
    pub(crate) active: Option<ActiveSession>,
}

impl Session {
    /// A session that finished loading, optionally with a logged-in user.
    ///
    /// Mostly useful for feeding [`derive_route`](crate::derive_route) in tests
    /// and previews; the controller builds its own.
    #[must_use]
    pub fn idle(active: Option<(String, User)>) -> Self {
        Self {
            loading_state: LoadingState::Idle,
            active: active.map(|(token, user)| ActiveSession { token, user }),
        }
    }

    #[must_use]
    pub fn loading_state(&self) -> LoadingState {
        self.loading_state
    }

    #[must_use]
    pub fn credential_token(&self) -> Option<&str> {
        self.active.as_ref().map(ActiveSession::token)
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.active.as_ref().map(ActiveSession::user)
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.active.is_some()
    }
}
