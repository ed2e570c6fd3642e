//! User identity and account records.
//!
//! A user document is keyed by the identity-provider subject, so [`UserId`]
//! is an opaque non-empty string rather than a UUID the backend mints
//! itself. Email addresses are normalised to lowercase on construction so
//! case-insensitive directory lookups reduce to equality filters.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ports::Document;
use crate::domain::{Error, Role};

/// Name of the users collection in the document store.
pub const USERS_COLLECTION: &str = "users";

/// Validation errors returned by the user value-object constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    /// User id was missing or blank once trimmed.
    EmptyId,
    /// User id contained surrounding whitespace.
    UntrimmedId,
    /// Email address was blank once trimmed.
    EmptyEmail,
    /// Email address did not look like `local@domain`.
    InvalidEmail,
    /// Display name was blank once trimmed.
    EmptyDisplayName,
}

impl fmt::Display for UserValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "user id must not be empty"),
            Self::UntrimmedId => write!(f, "user id must not contain surrounding whitespace"),
            Self::EmptyEmail => write!(f, "email must not be empty"),
            Self::InvalidEmail => write!(f, "email must contain a local part and a domain"),
            Self::EmptyDisplayName => write!(f, "display name must not be empty"),
        }
    }
}

impl std::error::Error for UserValidationError {}

/// Stable user identifier equal to the identity-provider subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate and construct a [`UserId`].
    pub fn new(id: impl Into<String>) -> Result<Self, UserValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(UserValidationError::EmptyId);
        }
        if id.trim() != id {
            return Err(UserValidationError::UntrimmedId);
        }
        Ok(Self(id))
    }

    /// Generate a random identifier, useful for tests and fixtures.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl TryFrom<String> for UserId {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Lowercased email address.
///
/// ## Invariants
/// - Trimmed, non-empty, lowercase, and shaped like `local@domain`.
///
/// # Examples
/// ```
/// use campushub_backend::domain::EmailAddress;
///
/// let email = EmailAddress::new("Dean@Campus.EDU").unwrap();
/// assert_eq!(email.as_ref(), "dean@campus.edu");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate, trim, and lowercase an email address.
    pub fn new(email: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let normalized = email.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(UserValidationError::EmptyEmail);
        }
        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(UserValidationError::InvalidEmail);
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(UserValidationError::InvalidEmail);
        }
        Ok(Self(normalized))
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Human readable display name for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate and construct a [`DisplayName`] from owned input.
    pub fn new(display_name: impl Into<String>) -> Result<Self, UserValidationError> {
        let display_name = display_name.into();
        if display_name.trim().is_empty() {
            return Err(UserValidationError::EmptyDisplayName);
        }
        Ok(Self(display_name.trim().to_owned()))
    }

    /// Construct from form input, falling back to the signup default.
    pub fn or_default(display_name: &str) -> Self {
        Self::new(display_name).unwrap_or_else(|_| Self("User".to_owned()))
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<DisplayName> for String {
    fn from(value: DisplayName) -> Self {
        value.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Persisted account record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Identity-provider subject, immutable for the account's lifetime.
    pub id: UserId,
    /// Unique, lowercased contact address.
    pub email: EmailAddress,
    /// Display name chosen at signup.
    pub name: DisplayName,
    /// Normalised role; see [`Role::normalize`].
    pub role: Role,
    /// Store-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Decode a stored user document.
    ///
    /// The role field is normalised leniently rather than rejected, because
    /// role lookups must stay available even for hand-edited documents.
    pub fn from_document(doc: &Document) -> Result<Self, Error> {
        let id = UserId::new(doc.id.as_ref())
            .map_err(|err| Error::internal(format!("malformed user document id: {err}")))?;
        let email_raw = doc
            .fields
            .get("email")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::internal("user document is missing an email field"))?;
        let email = EmailAddress::new(email_raw)
            .map_err(|err| Error::internal(format!("malformed user email: {err}")))?;
        let name = doc
            .fields
            .get("name")
            .and_then(Value::as_str)
            .map_or_else(|| DisplayName::or_default(""), DisplayName::or_default);
        let role = Role::normalize(doc.fields.get("role").and_then(Value::as_str));
        Ok(Self {
            id,
            email,
            name,
            role,
            created_at: doc.created_at,
        })
    }
}
