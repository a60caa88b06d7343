//! Local form checks run before a round-trip to the gateway.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Minimum password length the server accepts.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Length of the emailed password-reset code.
pub const RESET_CODE_LEN: usize = 6;

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern compiles"));

/// Email address containing the basic `local@domain.tld` shape.
///
/// Holding an `Email` proves the shape is right; the server still decides
/// whether the account exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for Email {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let s = s.trim().to_owned();
        if is_valid_email(&s) {
            Ok(Self(s))
        } else {
            Err(Error::InvalidEmail(s))
        }
    }
}

impl From<Email> for String {
    fn from(e: Email) -> Self {
        e.0
    }
}

/// Six-character reset code, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResetCode(String);

impl ResetCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResetCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ResetCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.chars().count() == RESET_CODE_LEN {
            Ok(Self(code.to_uppercase()))
        } else {
            Err(Error::InvalidResetCode)
        }
    }
}

/// Whether `s` contains a `\S+@\S+\.\S+` match anywhere. Not anchored.
#[must_use]
pub fn is_valid_email(s: &str) -> bool {
    EMAIL_SHAPE.is_match(s)
}

/// Mirrors the server's complexity rule: at least 8 characters with a lower
/// case letter, an upper case letter and a digit.
#[must_use]
pub fn is_strong_password(s: &str) -> bool {
    s.chars().count() >= MIN_PASSWORD_LEN
        && s.chars().any(|c| c.is_ascii_lowercase())
        && s.chars().any(|c| c.is_ascii_uppercase())
        && s.chars().any(|c| c.is_ascii_digit())
}

/// Confirm-password check done before submitting a new password.
///
/// # Errors
///
/// Returns [`Error::Rejected`] if the passwords differ or are empty.
pub fn check_passwords_match(password: &str, confirmation: &str) -> Result<(), Error> {
    if password != confirmation {
        return Err(Error::Rejected("Passwords do not match.".into()));
    }
    if password.is_empty() {
        return Err(Error::Rejected("Please enter a new password.".into()));
    }
    Ok(())
}
