//! The bulletin board: posting announcements and resources, plus the live
//! feeds every signed-in user reads.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::bulletins::{
    ANNOUNCEMENTS_COLLECTION, AnnouncementDraft, CourseCode, LinkUrl, RESOURCES_COLLECTION,
    ResourceDraft, ResourceType,
};
use crate::domain::policy::{Action, authorize};
use crate::domain::ports::{
    CollectionPath, Direction, DocumentId, DocumentStore, Query, Subscription,
};
use crate::domain::storage::{document_fields, map_store_error};
use crate::domain::{EmailAddress, Error, Session, TagList, UserId};

/// Posts to and watches the bulletin board collections.
pub struct BulletinService<S> {
    store: Arc<S>,
}

impl<S> BulletinService<S> {
    /// Create a bulletin board over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> Clone for BulletinService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewAnnouncementDoc<'a> {
    title: &'a str,
    body: &'a str,
    tags: &'a TagList,
    pinned: bool,
    link_url: Option<&'a LinkUrl>,
    posted_by: &'a UserId,
    posted_by_email: &'a EmailAddress,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewResourceDoc<'a> {
    title: &'a str,
    course_code: &'a CourseCode,
    #[serde(rename = "type")]
    kind: ResourceType,
    description: &'a str,
    is_file: bool,
    link_url: &'a LinkUrl,
    uploaded_by: &'a UserId,
    uploaded_by_email: &'a EmailAddress,
}

impl<S: DocumentStore> BulletinService<S> {
    fn announcements() -> CollectionPath {
        CollectionPath::root(ANNOUNCEMENTS_COLLECTION)
    }

    fn resources() -> CollectionPath {
        CollectionPath::root(RESOURCES_COLLECTION)
    }

    /// Publish an announcement to the board.
    pub async fn post_announcement(
        &self,
        session: &Session,
        draft: &AnnouncementDraft,
    ) -> Result<DocumentId, Error> {
        authorize(session, Action::PostAnnouncement)?;
        let fields = document_fields(&NewAnnouncementDoc {
            title: draft.title(),
            body: draft.body(),
            tags: draft.tags(),
            pinned: draft.pinned(),
            link_url: draft.link_url(),
            posted_by: session.user_id(),
            posted_by_email: session.email(),
        })?;
        self.store
            .insert(&Self::announcements(), fields)
            .await
            .map_err(map_store_error)
    }

    /// Publish a link-backed course resource.
    pub async fn post_resource(
        &self,
        session: &Session,
        draft: &ResourceDraft,
    ) -> Result<DocumentId, Error> {
        authorize(session, Action::PostResource)?;
        let fields = document_fields(&NewResourceDoc {
            title: draft.title(),
            course_code: draft.course_code(),
            kind: draft.kind(),
            description: draft.description(),
            // Link-backed only here; stored-file uploads arrive through a
            // separate ingestion path and set this true.
            is_file: false,
            link_url: draft.link_url(),
            uploaded_by: session.user_id(),
            uploaded_by_email: session.email(),
        })?;
        self.store
            .insert(&Self::resources(), fields)
            .await
            .map_err(map_store_error)
    }

    /// Live feed of announcements, newest first.
    pub async fn watch_announcements(&self) -> Result<Subscription, Error> {
        let query =
            Query::collection(Self::announcements()).ordered_by_created_at(Direction::Descending);
        self.store.subscribe(&query).await.map_err(map_store_error)
    }

    /// Live feed of resources, newest first.
    pub async fn watch_resources(&self) -> Result<Subscription, Error> {
        let query =
            Query::collection(Self::resources()).ordered_by_created_at(Direction::Descending);
        self.store.subscribe(&query).await.map_err(map_store_error)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::MockDocumentStore;
    use crate::domain::Role;
    use serde_json::Value;

    fn session(role: Role) -> Session {
        Session::new(
            UserId::new("poster-1").expect("fixture id"),
            EmailAddress::new("poster@x.edu").expect("fixture email"),
            role,
        )
    }

    #[tokio::test]
    async fn students_may_not_post_announcements() {
        let store = MockDocumentStore::new();
        let service = BulletinService::new(Arc::new(store));
        let draft = AnnouncementDraft::new("Exam schedule", "Posted below", TagList::default(), false, None)
            .expect("valid draft");
        let err = service
            .post_announcement(&session(Role::Student), &draft)
            .await
            .expect_err("students may not post");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn announcements_record_the_poster() {
        let mut store = MockDocumentStore::new();
        store
            .expect_insert()
            .withf(|collection, fields| {
                collection.as_str() == "announcements"
                    && fields.get("postedBy") == Some(&Value::String("poster-1".to_owned()))
                    && fields.get("pinned") == Some(&Value::Bool(true))
                    && fields.get("linkUrl") == Some(&Value::Null)
            })
            .times(1)
            .return_once(|_, _| Ok(DocumentId::new("ann-1")));

        let service = BulletinService::new(Arc::new(store));
        let draft = AnnouncementDraft::new("Exam schedule", "Posted below", TagList::default(), true, None)
            .expect("valid draft");
        service
            .post_announcement(&session(Role::Faculty), &draft)
            .await
            .expect("posting succeeds");
    }

    #[tokio::test]
    async fn resources_are_stored_as_links_with_the_type_field() {
        let mut store = MockDocumentStore::new();
        store
            .expect_insert()
            .withf(|collection, fields| {
                collection.as_str() == "resources"
                    && fields.get("isFile") == Some(&Value::Bool(false))
                    && fields.get("type") == Some(&Value::String("Slides".to_owned()))
                    && fields.get("courseCode") == Some(&Value::String("CS201".to_owned()))
            })
            .times(1)
            .return_once(|_, _| Ok(DocumentId::new("res-1")));

        let service = BulletinService::new(Arc::new(store));
        let draft = ResourceDraft::new(
            "Week 3 deck",
            "cs201",
            ResourceType::Slides,
            "",
            "https://slides.example.edu/w3",
        )
        .expect("valid draft");
        service
            .post_resource(&session(Role::Faculty), &draft)
            .await
            .expect("posting succeeds");
    }

    #[tokio::test]
    async fn feeds_read_newest_first() {
        let mut store = MockDocumentStore::new();
        store
            .expect_subscribe()
            .withf(|query| {
                query.collection.as_str() == "announcements"
                    && query.order_by.as_ref().is_some_and(|order| {
                        order.field == "createdAt" && order.direction == Direction::Descending
                    })
            })
            .times(1)
            .return_once(|_| {
                let (sender, receiver) = tokio::sync::watch::channel(Vec::new());
                Ok(Subscription::new(receiver, move || drop(sender)))
            });

        let service = BulletinService::new(Arc::new(store));
        service
            .watch_announcements()
            .await
            .expect("subscription opens");
    }
}
