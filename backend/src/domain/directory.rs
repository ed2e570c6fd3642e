//! Directory lookup: resolving emails to accounts and managing roles.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::domain::policy::{Action, authorize};
use crate::domain::ports::{
    CollectionPath, Direction, DocumentId, DocumentStore, Query, Transaction,
};
use crate::domain::storage::map_store_error;
use crate::domain::user::USERS_COLLECTION;
use crate::domain::{EmailAddress, Error, Role, Session, User};

/// Number of accounts returned by the admin panel listing.
const USER_LISTING_LIMIT: usize = 50;

/// Email-keyed account lookups and admin role management.
pub struct DirectoryService<S> {
    store: Arc<S>,
}

impl<S> DirectoryService<S> {
    /// Create a directory over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> Clone for DirectoryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> DirectoryService<S> {
    fn users() -> CollectionPath {
        CollectionPath::root(USERS_COLLECTION)
    }

    /// All accounts registered under an email, earliest-created first.
    ///
    /// Emails are stored lowercased and [`EmailAddress`] lowercases on
    /// construction, so the case-insensitive match is a plain equality
    /// filter. Duplicates are a data anomaly but are still all returned so
    /// callers can apply changes to every match.
    pub async fn find_by_email(&self, email: &EmailAddress) -> Result<Vec<User>, Error> {
        let query = Query::collection(Self::users())
            .with_filter("email", email.as_ref())
            .ordered_by_created_at(Direction::Ascending);
        let docs = self.store.find(&query).await.map_err(map_store_error)?;
        docs.iter().map(User::from_document).collect()
    }

    /// Change the role stored for every account under an email.
    ///
    /// Returns the number of updated records. All matches are patched in
    /// one atomic transaction so a duplicate-account anomaly can never end
    /// up with mixed roles.
    pub async fn change_role(
        &self,
        session: &Session,
        email: &EmailAddress,
        role: Role,
    ) -> Result<usize, Error> {
        authorize(session, Action::ChangeUserRole)?;
        let matches = self.find_by_email(email).await?;
        if matches.is_empty() {
            return Err(Error::not_found(format!(
                "no user found with email {email}; ask them to sign in once first"
            )));
        }

        let mut transaction = Transaction::new();
        for user in &matches {
            let mut patch = Map::new();
            patch.insert(
                "role".to_owned(),
                Value::String(role.as_str().to_owned()),
            );
            transaction = transaction.update(
                Self::users(),
                DocumentId::new(user.id.as_ref()),
                patch,
            );
        }
        self.store
            .transact(transaction)
            .await
            .map_err(map_store_error)?;
        Ok(matches.len())
    }

    /// The first page of accounts for the admin panel, email ascending.
    pub async fn list_users(&self, session: &Session) -> Result<Vec<User>, Error> {
        authorize(session, Action::ListUsers)?;
        let query = Query::collection(Self::users())
            .ordered_by("email", Direction::Ascending)
            .with_limit(USER_LISTING_LIMIT);
        let docs = self.store.find(&query).await.map_err(map_store_error)?;
        docs.iter().map(User::from_document).collect()
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ports::MockDocumentStore;
    use crate::domain::UserId;

    fn admin_session() -> Session {
        Session::new(
            UserId::random(),
            EmailAddress::new("admin@x.edu").expect("fixture email"),
            Role::Admin,
        )
    }

    fn student_session() -> Session {
        Session::new(
            UserId::random(),
            EmailAddress::new("student@x.edu").expect("fixture email"),
            Role::Student,
        )
    }

    #[tokio::test]
    async fn change_role_requires_admin_and_touches_nothing_on_deny() {
        let store = MockDocumentStore::new();
        let service = DirectoryService::new(Arc::new(store));
        let email = EmailAddress::new("target@x.edu").expect("fixture email");

        let err = service
            .change_role(&student_session(), &email, Role::Faculty)
            .await
            .expect_err("students may not change roles");
        assert_eq!(err.code(), crate::domain::ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn change_role_reports_unknown_emails() {
        let mut store = MockDocumentStore::new();
        store.expect_find().times(1).return_once(|_| Ok(Vec::new()));

        let service = DirectoryService::new(Arc::new(store));
        let email = EmailAddress::new("ghost@x.edu").expect("fixture email");
        let err = service
            .change_role(&admin_session(), &email, Role::Authority)
            .await
            .expect_err("unknown email must fail");
        assert_eq!(err.code(), crate::domain::ErrorCode::NotFound);
        assert!(err.message().contains("sign in once"));
    }

    #[tokio::test]
    async fn listing_is_admin_only() {
        let store = MockDocumentStore::new();
        let service = DirectoryService::new(Arc::new(store));
        let err = service
            .list_users(&student_session())
            .await
            .expect_err("students may not list users");
        assert_eq!(err.code(), crate::domain::ErrorCode::Forbidden);
    }
}
