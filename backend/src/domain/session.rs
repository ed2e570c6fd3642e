//! Authenticated principals and the session object threaded through every
//! workflow call.
//!
//! Workflow services never read ambient global state: the identity resolver
//! produces a [`Session`] once per authentication event and callers pass it
//! explicitly, which keeps the services testable in isolation.

use serde::{Deserialize, Serialize};

use crate::domain::{EmailAddress, Role, UserId};

/// Identity issued by the identity provider: a stable subject plus email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable subject identifier.
    pub id: UserId,
    /// Account email as reported by the provider.
    pub email: EmailAddress,
}

impl Principal {
    /// Bundle a subject and email into a principal.
    pub const fn new(id: UserId, email: EmailAddress) -> Self {
        Self { id, email }
    }
}

/// Resolved caller identity: principal plus persisted role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    user_id: UserId,
    email: EmailAddress,
    role: Role,
}

impl Session {
    /// Construct a session from its parts.
    pub const fn new(user_id: UserId, email: EmailAddress, role: Role) -> Self {
        Self {
            user_id,
            email,
            role,
        }
    }

    /// Construct a session for a principal with an already-resolved role.
    pub fn for_principal(principal: Principal, role: Role) -> Self {
        Self::new(principal.id, principal.email, role)
    }

    /// The caller's stable user id.
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The caller's email address.
    pub const fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// The caller's normalised role.
    pub const fn role(&self) -> Role {
        self.role
    }
}
