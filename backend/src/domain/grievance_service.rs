//! The grievance workflow: intake, assignment, and the status timeline.
//!
//! Status changes are written together with their timeline entry in one
//! transaction, so the grievance's `status` field and the newest entry's
//! `newStatus` can never disagree.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::grievances::{
    GRIEVANCES_COLLECTION, Grievance, GrievanceCategory, GrievanceDraft, GrievanceStatus,
    GrievanceUpdate, updates_collection,
};
use crate::domain::policy::{Action, GrievanceScope, authorize};
use crate::domain::ports::{
    CollectionPath, Direction, DocumentId, DocumentStore, Query, StoreError, Subscription,
    Transaction,
};
use crate::domain::storage::{document_fields, map_store_error};
use crate::domain::user::USERS_COLLECTION;
use crate::domain::{EmailAddress, Error, Session, User, UserId};

/// Runs the grievance workflow over the document store.
pub struct GrievanceService<S> {
    store: Arc<S>,
}

impl<S> GrievanceService<S> {
    /// Create a workflow over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> Clone for GrievanceService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewGrievanceDoc<'a> {
    title: &'a str,
    category: GrievanceCategory,
    description: &'a str,
    created_by: &'a UserId,
    created_by_email: &'a EmailAddress,
    status: GrievanceStatus,
    assigned_to: Option<&'a UserId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimelineEntryDoc<'a> {
    by: &'a UserId,
    comment: &'a str,
    new_status: GrievanceStatus,
}

impl<S: DocumentStore> GrievanceService<S> {
    fn grievances() -> CollectionPath {
        CollectionPath::root(GRIEVANCES_COLLECTION)
    }

    /// File a new grievance on behalf of the session's user.
    ///
    /// Every role may file; the record starts `submitted` and unassigned,
    /// with no timeline entry until a handler acts on it.
    pub async fn create(
        &self,
        session: &Session,
        draft: &GrievanceDraft,
    ) -> Result<DocumentId, Error> {
        authorize(session, Action::CreateGrievance)?;
        let fields = document_fields(&NewGrievanceDoc {
            title: draft.title(),
            category: draft.category(),
            description: draft.description(),
            created_by: session.user_id(),
            created_by_email: session.email(),
            status: GrievanceStatus::Submitted,
            assigned_to: None,
        })?;
        self.store
            .insert(&Self::grievances(), fields)
            .await
            .map_err(map_store_error)
    }

    /// Fetch one grievance, visible to its creator, its assignee, and any
    /// role permitted to view the inbox.
    pub async fn fetch(&self, session: &Session, id: &DocumentId) -> Result<Grievance, Error> {
        let doc = self
            .store
            .get(&Self::grievances(), id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("grievance {id} not found")))?;
        let grievance = Grievance::from_document(&doc)?;
        let is_creator = grievance.created_by == *session.user_id();
        let is_assignee = grievance.assigned_to.as_ref() == Some(session.user_id());
        if is_creator || is_assignee || authorize(session, Action::ViewGrievanceInbox).is_ok() {
            Ok(grievance)
        } else {
            Err(Error::forbidden("grievance belongs to another user"))
        }
    }

    /// The grievance's timeline, oldest entry first.
    pub async fn timeline(
        &self,
        session: &Session,
        id: &DocumentId,
    ) -> Result<Vec<GrievanceUpdate>, Error> {
        // Reuses fetch so timeline visibility matches record visibility.
        self.fetch(session, id).await?;
        let query = Query::collection(updates_collection(id))
            .ordered_by_created_at(Direction::Ascending);
        let docs = self.store.find(&query).await.map_err(map_store_error)?;
        docs.iter().map(GrievanceUpdate::from_document).collect()
    }

    /// Move a grievance to a new status, appending the timeline entry that
    /// records who did it and why.
    pub async fn append_update(
        &self,
        session: &Session,
        id: &DocumentId,
        comment: &str,
        new_status: GrievanceStatus,
    ) -> Result<(), Error> {
        authorize(session, Action::UpdateGrievanceStatus)?;
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(Error::invalid_request("comment must not be empty"));
        }

        let entry = document_fields(&TimelineEntryDoc {
            by: session.user_id(),
            comment,
            new_status,
        })?;
        let mut patch = Map::new();
        patch.insert(
            "status".to_owned(),
            Value::String(new_status.as_str().to_owned()),
        );
        let transaction = Transaction::new()
            .expect_exists(Self::grievances(), id.clone())
            .insert(updates_collection(id), entry)
            .update(Self::grievances(), id.clone(), patch);
        match self.store.transact(transaction).await {
            Ok(_) => Ok(()),
            Err(StoreError::MissingDocument { .. }) => {
                Err(Error::not_found(format!("grievance {id} not found")))
            }
            Err(error) => Err(map_store_error(error)),
        }
    }

    /// Assign a grievance to the handler registered under an email.
    ///
    /// When several accounts share the email, the earliest-created one is
    /// assigned. An unknown email leaves the record untouched.
    pub async fn assign(
        &self,
        session: &Session,
        id: &DocumentId,
        handler_email: &EmailAddress,
    ) -> Result<(), Error> {
        authorize(session, Action::AssignGrievance)?;
        let grievance = self.fetch(session, id).await?;
        let handler = self.earliest_account(handler_email).await?.ok_or_else(|| {
            Error::not_found(format!(
                "no user found with email {handler_email}; ask them to sign in once first"
            ))
        })?;

        let entry = document_fields(&TimelineEntryDoc {
            by: session.user_id(),
            comment: &format!("assigned to {handler_email}"),
            new_status: grievance.status,
        })?;
        let mut patch = Map::new();
        patch.insert(
            "assignedTo".to_owned(),
            Value::String(handler.id.as_ref().to_owned()),
        );
        let transaction = Transaction::new()
            .expect_exists(Self::grievances(), id.clone())
            .insert(updates_collection(id), entry)
            .update(Self::grievances(), id.clone(), patch);
        match self.store.transact(transaction).await {
            Ok(_) => Ok(()),
            Err(StoreError::MissingDocument { .. }) => {
                Err(Error::not_found(format!("grievance {id} not found")))
            }
            Err(error) => Err(map_store_error(error)),
        }
    }

    /// Live view of the caller's own grievances, newest first.
    pub async fn watch_mine(&self, session: &Session) -> Result<Subscription, Error> {
        let query = Self::scope_query(&GrievanceScope::mine(session));
        self.store.subscribe(&query).await.map_err(map_store_error)
    }

    /// Live view of the handler inbox, newest first. Admins see every
    /// grievance; authorities see those assigned to them.
    pub async fn watch_inbox(&self, session: &Session) -> Result<Subscription, Error> {
        let scope = GrievanceScope::inbox(session)?;
        let query = Self::scope_query(&scope);
        self.store.subscribe(&query).await.map_err(map_store_error)
    }

    fn scope_query(scope: &GrievanceScope) -> Query {
        let query = Query::collection(Self::grievances());
        let query = match scope {
            GrievanceScope::Mine(user_id) => query.with_filter("createdBy", user_id.as_ref()),
            GrievanceScope::AssignedTo(user_id) => {
                query.with_filter("assignedTo", user_id.as_ref())
            }
            GrievanceScope::All => query,
        };
        query.ordered_by_created_at(Direction::Descending)
    }

    async fn earliest_account(&self, email: &EmailAddress) -> Result<Option<User>, Error> {
        let query = Query::collection(CollectionPath::root(USERS_COLLECTION))
            .with_filter("email", email.as_ref())
            .ordered_by_created_at(Direction::Ascending)
            .with_limit(1);
        let docs = self.store.find(&query).await.map_err(map_store_error)?;
        docs.first().map(User::from_document).transpose()
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::grievances::GrievanceCategory;
    use crate::domain::ports::{Document, MockDocumentStore, WriteOp};
    use crate::domain::Role;
    use chrono::Utc;

    fn session(role: Role) -> Session {
        Session::new(
            UserId::new("actor-1").expect("fixture id"),
            EmailAddress::new("actor@x.edu").expect("fixture email"),
            role,
        )
    }

    fn draft() -> GrievanceDraft {
        GrievanceDraft::new("Broken AC", GrievanceCategory::Hostel, "Room 114 has no cooling")
            .expect("valid draft")
    }

    fn grievance_doc(status: &str) -> Document {
        let fields = serde_json::json!({
            "title": "Broken AC",
            "category": "Hostel",
            "description": "Room 114 has no cooling",
            "createdBy": "student-1",
            "createdByEmail": "student@x.edu",
            "status": status,
            "assignedTo": null,
        });
        let Value::Object(fields) = fields else {
            unreachable!("fixture is an object");
        };
        Document {
            id: DocumentId::new("g1"),
            created_at: Utc::now(),
            fields,
        }
    }

    #[tokio::test]
    async fn create_writes_a_submitted_unassigned_record() {
        let mut store = MockDocumentStore::new();
        store
            .expect_insert()
            .withf(|collection, fields| {
                collection.as_str() == "grievances"
                    && fields.get("status") == Some(&Value::String("submitted".to_owned()))
                    && fields.get("assignedTo") == Some(&Value::Null)
                    && fields.get("createdBy") == Some(&Value::String("actor-1".to_owned()))
            })
            .times(1)
            .return_once(|_, _| Ok(DocumentId::new("g1")));

        let service = GrievanceService::new(Arc::new(store));
        let id = service
            .create(&session(Role::Student), &draft())
            .await
            .expect("creation succeeds");
        assert_eq!(id, DocumentId::new("g1"));
    }

    #[tokio::test]
    async fn append_update_is_denied_to_students_without_touching_the_store() {
        let store = MockDocumentStore::new();
        let service = GrievanceService::new(Arc::new(store));
        let err = service
            .append_update(
                &session(Role::Student),
                &DocumentId::new("g1"),
                "looking into it",
                GrievanceStatus::InReview,
            )
            .await
            .expect_err("students may not update status");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn append_update_commits_entry_and_status_together() {
        let mut store = MockDocumentStore::new();
        store
            .expect_transact()
            .withf(|transaction| {
                matches!(
                    transaction.ops(),
                    [
                        WriteOp::ExpectExists { .. },
                        WriteOp::Insert { collection, fields },
                        WriteOp::Update { patch, .. },
                    ]
                    if collection.as_str() == "grievances/g1/updates"
                        && fields.get("newStatus")
                            == Some(&Value::String("in_review".to_owned()))
                        && patch.get("status") == Some(&Value::String("in_review".to_owned()))
                )
            })
            .times(1)
            .return_once(|_| Ok(Vec::new()));

        let service = GrievanceService::new(Arc::new(store));
        service
            .append_update(
                &session(Role::Authority),
                &DocumentId::new("g1"),
                "looking into it",
                GrievanceStatus::InReview,
            )
            .await
            .expect("update succeeds");
    }

    #[tokio::test]
    async fn append_update_rejects_blank_comments() {
        let store = MockDocumentStore::new();
        let service = GrievanceService::new(Arc::new(store));
        let err = service
            .append_update(
                &session(Role::Admin),
                &DocumentId::new("g1"),
                "   ",
                GrievanceStatus::Resolved,
            )
            .await
            .expect_err("blank comments must fail");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn assign_with_unknown_email_fails_without_writing() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .times(1)
            .return_once(|_, _| Ok(Some(grievance_doc("submitted"))));
        store.expect_find().times(1).return_once(|_| Ok(Vec::new()));

        let service = GrievanceService::new(Arc::new(store));
        let err = service
            .assign(
                &session(Role::Admin),
                &DocumentId::new("g1"),
                &EmailAddress::new("ghost@x.edu").expect("fixture email"),
            )
            .await
            .expect_err("unknown handler must fail");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(err.message().contains("sign in once"));
    }

    #[tokio::test]
    async fn assign_records_an_informational_entry_at_the_current_status() {
        let handler = serde_json::json!({
            "email": "authority@x.edu",
            "name": "Dr Rao",
            "role": "authority",
        });
        let Value::Object(handler_fields) = handler else {
            unreachable!("fixture is an object");
        };
        let handler_doc = Document {
            id: DocumentId::new("auth-1"),
            created_at: Utc::now(),
            fields: handler_fields,
        };

        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .times(1)
            .return_once(|_, _| Ok(Some(grievance_doc("in_review"))));
        store
            .expect_find()
            .times(1)
            .return_once(move |_| Ok(vec![handler_doc]));
        store
            .expect_transact()
            .withf(|transaction| {
                matches!(
                    transaction.ops(),
                    [
                        WriteOp::ExpectExists { .. },
                        WriteOp::Insert { fields, .. },
                        WriteOp::Update { patch, .. },
                    ]
                    if fields.get("newStatus")
                        == Some(&Value::String("in_review".to_owned()))
                        && fields.get("comment")
                            == Some(&Value::String("assigned to authority@x.edu".to_owned()))
                        && patch.get("assignedTo")
                            == Some(&Value::String("auth-1".to_owned()))
                )
            })
            .times(1)
            .return_once(|_| Ok(Vec::new()));

        let service = GrievanceService::new(Arc::new(store));
        service
            .assign(
                &session(Role::Admin),
                &DocumentId::new("g1"),
                &EmailAddress::new("authority@x.edu").expect("fixture email"),
            )
            .await
            .expect("assignment succeeds");
    }

    #[tokio::test]
    async fn inbox_for_an_authority_filters_on_assignment() {
        let mut store = MockDocumentStore::new();
        store
            .expect_subscribe()
            .withf(|query| {
                query.filters.len() == 1
                    && query.filters[0].field == "assignedTo"
                    && query.filters[0].value == Value::String("actor-1".to_owned())
            })
            .times(1)
            .return_once(|_| {
                let (sender, receiver) = tokio::sync::watch::channel(Vec::new());
                Ok(Subscription::new(receiver, move || drop(sender)))
            });

        let service = GrievanceService::new(Arc::new(store));
        service
            .watch_inbox(&session(Role::Authority))
            .await
            .expect("authority has an inbox");
    }
}
