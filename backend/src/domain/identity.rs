//! The identity resolver: maps authenticated principals onto persisted
//! role records.
//!
//! Role lookup is the one place in the crate that swallows a store error:
//! a failed read degrades to the `student` role instead of blocking the
//! session, because locking every user out of the hub is worse than
//! temporarily under-privileging a handler.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::domain::ports::{CollectionPath, DocumentId, DocumentStore, StoreError, Transaction};
use crate::domain::storage::{document_fields, map_store_error};
use crate::domain::user::USERS_COLLECTION;
use crate::domain::{DisplayName, EmailAddress, Error, Principal, Role, Session};

/// Resolves principals to sessions and provisions user records.
pub struct IdentityService<S> {
    store: Arc<S>,
}

impl<S> IdentityService<S> {
    /// Create a resolver over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> Clone for IdentityService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewUserDoc<'a> {
    email: &'a EmailAddress,
    name: &'a DisplayName,
    role: Role,
}

impl<S: DocumentStore> IdentityService<S> {
    fn users() -> CollectionPath {
        CollectionPath::root(USERS_COLLECTION)
    }

    /// Resolve a principal to a session, degrading to the `student` role
    /// when the user record is absent or unreadable.
    pub async fn resolve_session(&self, principal: &Principal) -> Session {
        let id = DocumentId::new(principal.id.as_ref());
        let role = match self.store.get(&Self::users(), &id).await {
            Ok(Some(doc)) => Role::normalize(doc.fields.get("role").and_then(Value::as_str)),
            Ok(None) => {
                warn!(user_id = %principal.id, "no user record for principal, defaulting role to student");
                Role::Student
            }
            Err(error) => {
                warn!(user_id = %principal.id, error = %error, "role lookup failed, defaulting role to student");
                Role::Student
            }
        };
        Session::for_principal(principal.clone(), role)
    }

    /// Provision a user record at signup.
    ///
    /// The record is always created with role `student`; there is
    /// deliberately no way for the caller to request another role here.
    pub async fn sign_up(
        &self,
        principal: &Principal,
        display_name: &str,
    ) -> Result<Session, Error> {
        self.ensure_user_record(principal, &DisplayName::or_default(display_name))
            .await?;
        Ok(self.resolve_session(principal).await)
    }

    /// Lazily provision a record for a principal signing in without one,
    /// such as an account migrated from before the hub kept user documents.
    pub async fn ensure_user(&self, principal: &Principal) -> Result<Session, Error> {
        self.ensure_user_record(principal, &DisplayName::or_default(""))
            .await?;
        Ok(self.resolve_session(principal).await)
    }

    async fn ensure_user_record(
        &self,
        principal: &Principal,
        name: &DisplayName,
    ) -> Result<(), Error> {
        let fields = document_fields(&NewUserDoc {
            email: &principal.email,
            name,
            role: Role::Student,
        })?;
        let transaction = Transaction::new().create(
            Self::users(),
            DocumentId::new(principal.id.as_ref()),
            fields,
        );
        match self.store.transact(transaction).await {
            Ok(_) => Ok(()),
            // The record already exists, possibly because a concurrent
            // sign-in won the race. Either way the account is provisioned.
            Err(StoreError::UniqueConstraint { .. }) => Ok(()),
            Err(error) => Err(map_store_error(error)),
        }
    }
}
