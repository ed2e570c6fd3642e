//! The opportunity workflow: postings, applications, and review status.
//!
//! The one-application-per-student rule is enforced inside the insert
//! transaction, so two racing submissions can never both land.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::opportunities::{
    ApplicationStatus, OPPORTUNITIES_COLLECTION, Opportunity, OpportunityDraft,
    applications_collection,
};
use crate::domain::policy::{Action, authorize};
use crate::domain::ports::{
    CollectionPath, Direction, DocumentId, DocumentStore, FieldFilter, Query, StoreError,
    Subscription, Transaction,
};
use crate::domain::storage::{document_fields, map_store_error};
use crate::domain::{EmailAddress, Error, Session, TagList, UserId};

/// Runs the opportunity workflow over the document store.
pub struct OpportunityService<S> {
    store: Arc<S>,
}

impl<S> OpportunityService<S> {
    /// Create a workflow over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> Clone for OpportunityService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewOpportunityDoc<'a> {
    title: &'a str,
    description: &'a str,
    deadline: Option<&'a str>,
    tags: &'a TagList,
    posted_by: &'a UserId,
    posted_by_email: &'a EmailAddress,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewApplicationDoc<'a> {
    student_id: &'a UserId,
    student_email: &'a EmailAddress,
    note: &'a str,
    status: ApplicationStatus,
}

impl<S: DocumentStore> OpportunityService<S> {
    fn opportunities() -> CollectionPath {
        CollectionPath::root(OPPORTUNITIES_COLLECTION)
    }

    /// Publish a new opportunity posting.
    pub async fn post(
        &self,
        session: &Session,
        draft: &OpportunityDraft,
    ) -> Result<DocumentId, Error> {
        authorize(session, Action::PostOpportunity)?;
        let fields = document_fields(&NewOpportunityDoc {
            title: draft.title(),
            description: draft.description(),
            deadline: draft.deadline(),
            tags: draft.tags(),
            posted_by: session.user_id(),
            posted_by_email: session.email(),
        })?;
        self.store
            .insert(&Self::opportunities(), fields)
            .await
            .map_err(map_store_error)
    }

    /// Fetch one posting. Postings are visible to every signed-in user.
    pub async fn fetch(&self, id: &DocumentId) -> Result<Opportunity, Error> {
        let doc = self
            .store
            .get(&Self::opportunities(), id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("opportunity {id} not found")))?;
        Opportunity::from_document(&doc)
    }

    /// Submit an application to a posting.
    ///
    /// The duplicate check and the insert commit atomically: of any number
    /// of concurrent submissions by the same student, exactly one succeeds
    /// and the rest fail with `Conflict`.
    pub async fn apply(
        &self,
        session: &Session,
        opportunity_id: &DocumentId,
        note: &str,
    ) -> Result<DocumentId, Error> {
        authorize(session, Action::ApplyToOpportunity)?;
        let note = note.trim();
        if note.is_empty() {
            return Err(Error::invalid_request("note must not be empty"));
        }
        let fields = document_fields(&NewApplicationDoc {
            student_id: session.user_id(),
            student_email: session.email(),
            note,
            status: ApplicationStatus::Applied,
        })?;
        let applications = applications_collection(opportunity_id);
        let transaction = Transaction::new()
            .expect_exists(Self::opportunities(), opportunity_id.clone())
            .expect_absent(
                applications.clone(),
                vec![FieldFilter::equals(
                    "studentId",
                    session.user_id().as_ref(),
                )],
            )
            .insert(applications, fields);
        match self.store.transact(transaction).await {
            Ok(ids) => ids
                .into_iter()
                .next()
                .ok_or_else(|| Error::internal("transaction returned no inserted id")),
            Err(StoreError::UniqueConstraint { .. }) => Err(Error::conflict(
                "you have already applied to this opportunity",
            )),
            Err(StoreError::MissingDocument { .. }) => Err(Error::not_found(format!(
                "opportunity {opportunity_id} not found"
            ))),
            Err(error) => Err(map_store_error(error)),
        }
    }

    /// Move an application to a new review status, stamping `updatedAt`.
    pub async fn set_status(
        &self,
        session: &Session,
        opportunity_id: &DocumentId,
        application_id: &DocumentId,
        status: ApplicationStatus,
    ) -> Result<(), Error> {
        authorize(session, Action::ChangeApplicationStatus)?;
        let mut patch = Map::new();
        patch.insert(
            "status".to_owned(),
            Value::String(status.as_str().to_owned()),
        );
        patch.insert(
            "updatedAt".to_owned(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        match self
            .store
            .update(&applications_collection(opportunity_id), application_id, patch)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::MissingDocument { .. }) => Err(Error::not_found(format!(
                "application {application_id} not found"
            ))),
            Err(error) => Err(map_store_error(error)),
        }
    }

    /// Live view of every posting, newest first.
    pub async fn watch_all(&self) -> Result<Subscription, Error> {
        let query =
            Query::collection(Self::opportunities()).ordered_by_created_at(Direction::Descending);
        self.store.subscribe(&query).await.map_err(map_store_error)
    }

    /// Live view of a posting's applications for its reviewers, newest
    /// first.
    pub async fn watch_applications(
        &self,
        session: &Session,
        opportunity_id: &DocumentId,
    ) -> Result<Subscription, Error> {
        authorize(session, Action::ChangeApplicationStatus)?;
        let query = Query::collection(applications_collection(opportunity_id))
            .ordered_by_created_at(Direction::Descending);
        self.store.subscribe(&query).await.map_err(map_store_error)
    }

    /// Live view of the caller's own application to a posting, if any.
    pub async fn watch_my_application(
        &self,
        session: &Session,
        opportunity_id: &DocumentId,
    ) -> Result<Subscription, Error> {
        let query = Query::collection(applications_collection(opportunity_id))
            .with_filter("studentId", session.user_id().as_ref())
            .with_limit(1);
        self.store.subscribe(&query).await.map_err(map_store_error)
    }
}
