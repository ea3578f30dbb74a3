//! Request and response payloads of the `web` module, and the validated types they parse into.

use chrono::{DateTime, Utc};
use lazy_regex::regex_is_match;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ###################################
// ->   STRUCTS
// ###################################
/// Deserializable Signup
/// A signup that can be Deserialized but can have an invalid email
#[derive(Debug, Deserialize)]
pub struct DeserSignup {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
}

impl SignupResponse {
    pub fn joined() -> Self {
        Self {
            success: true,
            message: "Successfully joined the waitlist!".to_string(),
        }
    }
}

/// Validated email: trimmed, lowercased and shaped like `local@domain.tld`.
/// The check is purely syntactic; deliverability is never verified.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub struct NormalizedEmail(String);

impl AsRef<str> for NormalizedEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl NormalizedEmail {
    pub fn parse<S>(value: S) -> Result<Self, DataParsingError>
    where
        S: AsRef<str>,
    {
        let value = value.as_ref().trim();

        if regex_is_match!(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$", value) {
            Ok(Self(value.to_lowercase()))
        } else {
            Err(DataParsingError::EmailInvalid)
        }
    }
}

impl TryFrom<DeserSignup> for NormalizedEmail {
    type Error = DataParsingError;

    fn try_from(value: DeserSignup) -> Result<Self, Self::Error> {
        Self::parse(value.email)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusCheckCreate {
    pub client_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct StatusCheck {
    pub id: Uuid,
    pub client_name: String,
    pub timestamp: DateTime<Utc>,
}

impl From<StatusCheckCreate> for StatusCheck {
    fn from(value: StatusCheckCreate) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_name: value.client_name,
            timestamp: Utc::now(),
        }
    }
}

// ###################################
// ->   ERROR
// ###################################
#[derive(Debug, thiserror::Error)]
pub enum DataParsingError {
    #[error("Invalid email address")]
    EmailInvalid,
}
