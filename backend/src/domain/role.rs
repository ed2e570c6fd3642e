//! Campus roles and their normalisation.
//!
//! Role strings arrive from two untrusted boundaries: documents read back
//! from the store and form input relayed by an admin. Both pass through
//! [`Role::normalize`] so nothing duck-typed survives past this module.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of roles recognised by the workflow engine.
///
/// ## Invariants
/// - Unknown or missing role values coerce to [`Role::Student`], never to a
///   privileged role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Default role for every new account.
    Student,
    /// Posts announcements, opportunities, and resources.
    Faculty,
    /// Handles assigned grievances in addition to posting rights.
    Authority,
    /// Full access, including assignment and role management.
    Admin,
}

impl Role {
    /// Normalise an untrusted role value, case-insensitively.
    ///
    /// `None` and unrecognised values fall back to [`Role::Student`]; the
    /// fallback for unexpected non-empty values is logged because it usually
    /// indicates a hand-edited user document.
    ///
    /// # Examples
    /// ```
    /// use campushub_backend::domain::Role;
    ///
    /// assert_eq!(Role::normalize(Some("ADMIN")), Role::Admin);
    /// assert_eq!(Role::normalize(Some("Admin")), Role::Admin);
    /// assert_eq!(Role::normalize(None), Role::Student);
    /// assert_eq!(Role::normalize(Some("wizard")), Role::Student);
    /// ```
    pub fn normalize(value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return Self::Student;
        };
        match raw.trim().to_lowercase().as_str() {
            "admin" => Self::Admin,
            "authority" => Self::Authority,
            "faculty" => Self::Faculty,
            "student" | "" => Self::Student,
            other => {
                tracing::warn!(value = other, "unrecognised role value, defaulting to student");
                Self::Student
            }
        }
    }

    /// Stable lowercase name used in stored documents.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Faculty => "faculty",
            Self::Authority => "authority",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
