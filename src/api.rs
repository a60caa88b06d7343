use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};

use crate::error::Error;
use crate::gateway::{Gateway, Operation, Variables};
use crate::order::Order;
use crate::types::{Tier, User, UserId};
use crate::validation::{Email, ResetCode};

pub(crate) const LOGIN: Operation = Operation {
    name: "LoginUser",
    document: "mutation LoginUser($loginIdentifier: String!, $password: String!) {
  loginUser(loginIdentifier: $loginIdentifier, password: $password) {
    success
    message
    passwordExpired
    user { id username displayName email role tier }
  }
}",
};

pub(crate) const CHECK_STATUS: Operation = Operation {
    name: "CheckStatus",
    document: "query CheckStatus($userId: Int!) {
  checkMyStatus(userId: $userId) { id tier }
}",
};

pub(crate) const REQUEST_PASSWORD_RESET: Operation = Operation {
    name: "RequestPasswordReset",
    document: "mutation RequestPasswordReset($email: String!) {
  requestPasswordReset(email: $email) { success message }
}",
};

pub(crate) const VERIFY_RESET_TOKEN: Operation = Operation {
    name: "VerifyResetToken",
    document: "mutation VerifyResetToken($token: String!) {
  verifyResetToken(token: $token) { success message }
}",
};

pub(crate) const RESET_PASSWORD: Operation = Operation {
    name: "ResetPassword",
    document: "mutation ResetPassword($token: String!, $newPassword: String!) {
  resetPassword(token: $token, newPassword: $newPassword) { success message }
}",
};

pub(crate) const REGISTER_CUSTOMER: Operation = Operation {
    name: "RegisterCustomer",
    document: "mutation RegisterCustomer($username: String!, $email: String!, $password: String!) {
  registerCustomer(username: $username, email: $email, password: $password) {
    success
    message
    user { id username displayName email role tier }
  }
}",
};

pub(crate) const CREATE_ORDER: Operation = Operation {
    name: "CreateOrder",
    document: "mutation CreateOrder($userId: Int!, $itemNames: [String!]!) {
  createOrder(userId: $userId, itemNames: $itemNames) { id items }
}",
};

pub(crate) const ASSIGN_TIER: Operation = Operation {
    name: "AssignTier",
    document: "mutation AssignTier($userId: Int!, $tierName: String!) {
  assignTier(userId: $userId, tierName: $tierName) { id tier }
}",
};

/// Result of a login attempt, before the session layer interprets it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct LoginOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub password_expired: bool,
    #[serde(default)]
    pub user: Option<User>,
}

/// `{ success, message }` answer of the password-reset operations.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl StatusResponse {
    fn into_result(self) -> Result<String, Error> {
        if self.success {
            Ok(self.message)
        } else {
            Err(Error::Rejected(self.message))
        }
    }
}

/// Current tier of an account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct TierStatus {
    pub id: UserId,
    pub tier: Tier,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    user: Option<User>,
}

/// Typed calls for every operation the client consumes.
#[derive(Debug, Clone)]
pub struct ApiClient<G> {
    gateway: G,
}

impl<G: Gateway> ApiClient<G> {
    #[must_use]
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Raw login exchange. The session controller turns the outcome into a
    /// session or an error; call this directly only to probe credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] or [`Error::Gateway`] from the gateway.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<LoginOutcome, Error> {
        self.call(
            &LOGIN,
            "loginUser",
            json!({"loginIdentifier": identifier, "password": secret}),
        )
        .await
    }

    /// Current tier of `user_id`; `None` if the server no longer knows the account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] or [`Error::Gateway`] from the gateway.
    pub async fn check_status(&self, user_id: UserId) -> Result<Option<TierStatus>, Error> {
        self.call(&CHECK_STATUS, "checkMyStatus", json!({"userId": user_id}))
            .await
    }

    /// Ask the server to email a reset code. Returns the server's message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] when the server answers `success: false`.
    pub async fn request_password_reset(&self, email: &Email) -> Result<String, Error> {
        let response: StatusResponse = self
            .call(
                &REQUEST_PASSWORD_RESET,
                "requestPasswordReset",
                json!({"email": email.as_str()}),
            )
            .await?;
        response.into_result()
    }

    /// Check an emailed reset code before asking for the new password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] for an unknown or expired code.
    pub async fn verify_reset_token(&self, code: &ResetCode) -> Result<String, Error> {
        let response: StatusResponse = self
            .call(
                &VERIFY_RESET_TOKEN,
                "verifyResetToken",
                json!({"token": code.as_str()}),
            )
            .await?;
        response.into_result()
    }

    /// Set a new password using a verified reset code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the code expired or the password is too weak.
    pub async fn reset_password(
        &self,
        code: &ResetCode,
        new_secret: &str,
    ) -> Result<String, Error> {
        let response: StatusResponse = self
            .call(
                &RESET_PASSWORD,
                "resetPassword",
                json!({"token": code.as_str(), "newPassword": new_secret}),
            )
            .await?;
        response.into_result()
    }

    /// Create a customer account. New accounts start in the `PENDING` tier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] when the username or email is taken or the
    /// password is too weak.
    pub async fn register_account(
        &self,
        username: &str,
        email: &Email,
        secret: &str,
    ) -> Result<User, Error> {
        let response: RegisterResponse = self
            .call(
                &REGISTER_CUSTOMER,
                "registerCustomer",
                json!({"username": username, "email": email.as_str(), "password": secret}),
            )
            .await?;
        if !response.success {
            return Err(Error::Rejected(response.message));
        }
        response.user.ok_or_else(|| malformed(&REGISTER_CUSTOMER, "missing user"))
    }

    /// Place an order of `"item-quantity"` strings for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Gateway`] if the server refuses the order.
    pub async fn create_order(&self, user_id: UserId, items: &[String]) -> Result<Order, Error> {
        self.call(
            &CREATE_ORDER,
            "createOrder",
            json!({"userId": user_id, "itemNames": items}),
        )
        .await
    }

    /// Admin only: move `user_id` to `tier`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Gateway`] for an invalid tier name and
    /// [`Error::Rejected`] if the user does not exist.
    pub async fn assign_tier(&self, user_id: UserId, tier: &Tier) -> Result<TierStatus, Error> {
        let status: Option<TierStatus> = self
            .call(
                &ASSIGN_TIER,
                "assignTier",
                json!({"userId": user_id, "tierName": tier.as_str()}),
            )
            .await?;
        status.ok_or_else(|| Error::Rejected(format!("User {user_id} not found")))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &Operation,
        field: &str,
        variables: JsonValue,
    ) -> Result<T, Error> {
        let variables = match variables {
            JsonValue::Object(map) => map,
            _ => Variables::new(),
        };
        let mut data = self.gateway.execute(operation, variables).await?;
        let value = data.get_mut(field).map(JsonValue::take).unwrap_or_default();
        serde_json::from_value(value).map_err(|e| malformed(operation, e))
    }
}

fn malformed(operation: &Operation, detail: impl std::fmt::Display) -> Error {
    Error::Transport {
        operation: operation.name,
        status: None,
        detail: format!("malformed response: {detail}"),
    }
}
