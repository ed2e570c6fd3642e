//! Driven port for the shared document store.
//!
//! The store is the only shared mutable resource in the system. The port
//! mirrors the capabilities the workflows rely on: keyed reads, filtered
//! queries, single writes, atomic multi-write transactions, and cancellable
//! live subscriptions. Adapters assign creation timestamps server-side and
//! keep them strictly monotonic per write so `createdAt` is a total order.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::watch;

use super::define_port_error;

/// Field name under which adapters expose the server-assigned creation
/// timestamp when a document is converted to a JSON value.
pub const CREATED_AT_FIELD: &str = "createdAt";

define_port_error! {
    /// Errors raised by document store adapters.
    pub enum StoreError {
        /// The store could not be reached or the transport failed.
        Unavailable { message: String } => "document store unavailable: {message}",
        /// A query or write failed during execution.
        Query { message: String } => "document store query failed: {message}",
        /// A stored payload could not be decoded.
        Serialisation { message: String } => "document could not be decoded: {message}",
        /// A uniqueness precondition failed inside a transaction.
        UniqueConstraint { message: String } => "uniqueness constraint violated: {message}",
        /// A referenced document does not exist.
        MissingDocument { message: String } => "referenced document missing: {message}",
    }
}

/// Slash-separated path naming a collection, possibly nested under a
/// document (`grievances/{id}/updates`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// A top-level collection.
    pub fn root(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// A subcollection of one document in a top-level collection.
    pub fn nested(parent: &str, id: &DocumentId, name: &str) -> Self {
        Self(format!("{parent}/{}/{name}", id.as_ref()))
    }

    /// The full path as stored.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque document identifier, store-generated unless supplied by a
/// `Create` operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// A document snapshot: identifier, server-assigned creation timestamp,
/// and the stored fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Identifier within the collection.
    pub id: DocumentId,
    /// Server-assigned creation timestamp, monotonic per write.
    pub created_at: DateTime<Utc>,
    /// Stored field values.
    pub fields: Map<String, Value>,
}

impl Document {
    /// The fields as a JSON object with `createdAt` injected, suitable for
    /// deserialising into a domain record.
    pub fn to_value(&self) -> Value {
        let mut fields = self.fields.clone();
        fields.insert(
            CREATED_AT_FIELD.to_owned(),
            Value::String(self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        Value::Object(fields)
    }
}

/// Equality filter on a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Field name within the stored document.
    pub field: String,
    /// Value the field must equal exactly.
    pub value: Value,
}

impl FieldFilter {
    /// Build an equality filter.
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Oldest or smallest first.
    Ascending,
    /// Newest or largest first.
    Descending,
}

/// Ordering clause applied after filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Field to order on; `createdAt` orders on the server timestamp.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

/// A filtered, optionally ordered and limited read over one collection.
///
/// # Examples
/// ```
/// use campushub_backend::domain::ports::{CollectionPath, Direction, Query};
///
/// let query = Query::collection(CollectionPath::root("grievances"))
///     .with_filter("createdBy", "uid-1")
///     .ordered_by_created_at(Direction::Descending);
/// assert_eq!(query.filters.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Collection to read.
    pub collection: CollectionPath,
    /// Conjunction of equality filters.
    pub filters: Vec<FieldFilter>,
    /// Optional ordering clause.
    pub order_by: Option<OrderBy>,
    /// Optional maximum number of documents.
    pub limit: Option<usize>,
}

impl Query {
    /// An unfiltered query over a collection.
    pub const fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Add an equality filter.
    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter::equals(field, value));
        self
    }

    /// Order by an arbitrary field.
    #[must_use]
    pub fn ordered_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Order by the server-assigned creation timestamp.
    #[must_use]
    pub fn ordered_by_created_at(self, direction: Direction) -> Self {
        self.ordered_by(CREATED_AT_FIELD, direction)
    }

    /// Cap the number of returned documents.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One operation inside an atomic transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert with a store-generated id.
    Insert {
        /// Target collection.
        collection: CollectionPath,
        /// Field values to store.
        fields: Map<String, Value>,
    },
    /// Insert at a caller-chosen id, failing with `UniqueConstraint` if a
    /// document already exists there.
    Create {
        /// Target collection.
        collection: CollectionPath,
        /// Caller-chosen identifier.
        id: DocumentId,
        /// Field values to store.
        fields: Map<String, Value>,
    },
    /// Merge a partial patch into an existing document, failing with
    /// `MissingDocument` if it is absent.
    Update {
        /// Target collection.
        collection: CollectionPath,
        /// Identifier of the document to patch.
        id: DocumentId,
        /// Fields to overwrite; `null` values are stored as nulls.
        patch: Map<String, Value>,
    },
    /// Abort with `MissingDocument` unless the document exists.
    ExpectExists {
        /// Target collection.
        collection: CollectionPath,
        /// Identifier that must be present.
        id: DocumentId,
    },
    /// Abort with `UniqueConstraint` if any document matches the filters.
    ExpectAbsent {
        /// Target collection.
        collection: CollectionPath,
        /// Conjunction of equality filters that must match nothing.
        filters: Vec<FieldFilter>,
    },
}

/// An ordered list of operations applied all-or-nothing.
///
/// `transact` returns the ids of `Insert` and `Create` operations in the
/// order they appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    ops: Vec<WriteOp>,
}

impl Transaction {
    /// An empty transaction.
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Append an insert with a store-generated id.
    #[must_use]
    pub fn insert(mut self, collection: CollectionPath, fields: Map<String, Value>) -> Self {
        self.ops.push(WriteOp::Insert { collection, fields });
        self
    }

    /// Append a create-if-absent at a caller-chosen id.
    #[must_use]
    pub fn create(
        mut self,
        collection: CollectionPath,
        id: DocumentId,
        fields: Map<String, Value>,
    ) -> Self {
        self.ops.push(WriteOp::Create {
            collection,
            id,
            fields,
        });
        self
    }

    /// Append a partial update of an existing document.
    #[must_use]
    pub fn update(
        mut self,
        collection: CollectionPath,
        id: DocumentId,
        patch: Map<String, Value>,
    ) -> Self {
        self.ops.push(WriteOp::Update {
            collection,
            id,
            patch,
        });
        self
    }

    /// Append an existence precondition.
    #[must_use]
    pub fn expect_exists(mut self, collection: CollectionPath, id: DocumentId) -> Self {
        self.ops.push(WriteOp::ExpectExists { collection, id });
        self
    }

    /// Append an absence precondition.
    #[must_use]
    pub fn expect_absent(
        mut self,
        collection: CollectionPath,
        filters: Vec<FieldFilter>,
    ) -> Self {
        self.ops.push(WriteOp::ExpectAbsent {
            collection,
            filters,
        });
        self
    }

    /// The operations in application order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consume the transaction, yielding its operations.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Ordered view of the documents matching a subscribed query.
pub type Snapshot = Vec<Document>;

/// Live handle on a subscribed query.
///
/// Dropping the handle (or calling [`Subscription::cancel`]) releases the
/// adapter-side listener; no further snapshots are delivered afterwards.
pub struct Subscription {
    receiver: watch::Receiver<Snapshot>,
    canceller: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Build a subscription around a watch channel and a cancel hook.
    pub fn new(
        receiver: watch::Receiver<Snapshot>,
        canceller: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            canceller: Some(Box::new(canceller)),
        }
    }

    /// The most recently delivered snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next snapshot. Returns `None` once the adapter side has
    /// shut down and no further updates can arrive.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Release the listener eagerly instead of waiting for drop.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.canceller.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.canceller.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("documents", &self.receiver.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Abstract document store consumed by every workflow service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document by id.
    async fn get(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError>;

    /// Run a filtered query and return the matching documents in order.
    async fn find(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Insert a document with a store-generated id.
    async fn insert(
        &self,
        collection: &CollectionPath,
        fields: Map<String, Value>,
    ) -> Result<DocumentId, StoreError>;

    /// Merge a partial patch into an existing document.
    async fn update(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Apply a transaction atomically, returning ids of inserted documents.
    async fn transact(&self, transaction: Transaction) -> Result<Vec<DocumentId>, StoreError>;

    /// Open a live subscription on a query.
    async fn subscribe(&self, query: &Query) -> Result<Subscription, StoreError>;
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn nested_paths_render_parent_and_child() {
        let path = CollectionPath::nested("grievances", &DocumentId::new("g1"), "updates");
        assert_eq!(path.as_str(), "grievances/g1/updates");
    }

    #[test]
    fn document_value_injects_created_at() {
        let created_at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("timestamp");
        let mut fields = Map::new();
        fields.insert("title".to_owned(), Value::String("Broken AC".to_owned()));
        let doc = Document {
            id: DocumentId::new("g1"),
            created_at,
            fields,
        };
        let value = doc.to_value();
        assert_eq!(value["title"], "Broken AC");
        assert_eq!(value[CREATED_AT_FIELD], "2025-06-01T12:00:00.000000Z");
    }

    #[test]
    fn transactions_record_ops_in_order() {
        let grievances = CollectionPath::root("grievances");
        let tx = Transaction::new()
            .expect_exists(grievances.clone(), DocumentId::new("g1"))
            .insert(
                CollectionPath::nested("grievances", &DocumentId::new("g1"), "updates"),
                Map::new(),
            )
            .update(grievances, DocumentId::new("g1"), Map::new());
        assert_eq!(tx.ops().len(), 3);
        assert!(matches!(tx.ops()[0], WriteOp::ExpectExists { .. }));
        assert!(matches!(tx.ops()[2], WriteOp::Update { .. }));
    }
}
