//! In-memory document store adapter.
//!
//! Backs the workflow services in tests and single-process deployments.
//! Writes go through a single mutex, transactions commit against a staged
//! copy of the collections, and creation timestamps are strictly monotonic
//! so `createdAt` orders documents totally even within one microsecond.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::domain::ports::{
    CREATED_AT_FIELD, CollectionPath, Direction, Document, DocumentId, DocumentStore, FieldFilter,
    Query, Snapshot, StoreError, Subscription, Transaction, WriteOp,
};

#[derive(Debug, Clone)]
struct StoredDoc {
    created_at: DateTime<Utc>,
    seq: u64,
    fields: Map<String, Value>,
}

type Collections = BTreeMap<CollectionPath, BTreeMap<DocumentId, StoredDoc>>;

struct Listener {
    id: u64,
    query: Query,
    sender: watch::Sender<Snapshot>,
}

struct State {
    collections: Collections,
    seq: u64,
    last_created_at: DateTime<Utc>,
    listeners: Vec<Listener>,
    next_listener_id: u64,
}

impl State {
    fn new() -> Self {
        Self {
            collections: Collections::new(),
            seq: 0,
            last_created_at: DateTime::<Utc>::MIN_UTC,
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    /// Next (timestamp, sequence) pair. The timestamp never repeats: when
    /// the clock has not advanced past the previous write, it is nudged
    /// forward by one microsecond.
    fn next_created(&mut self) -> (DateTime<Utc>, u64) {
        let mut now = Utc::now();
        if now <= self.last_created_at {
            now = self.last_created_at + Duration::microseconds(1);
        }
        self.last_created_at = now;
        self.seq += 1;
        (now, self.seq)
    }
}

/// [`DocumentStore`] over process memory.
pub struct MemoryDocumentStore {
    state: Arc<Mutex<State>>,
}

impl MemoryDocumentStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::new())),
        }
    }

    fn lock(state: &Arc<Mutex<State>>) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind, so the
        // poisoned state is still usable.
        state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn apply(
        state: &mut State,
        staged: &mut Collections,
        op: WriteOp,
        inserted: &mut Vec<DocumentId>,
        touched: &mut BTreeSet<CollectionPath>,
    ) -> Result<(), StoreError> {
        match op {
            WriteOp::Insert { collection, fields } => {
                let (created_at, seq) = state.next_created();
                let id = DocumentId::random();
                staged.entry(collection.clone()).or_default().insert(
                    id.clone(),
                    StoredDoc {
                        created_at,
                        seq,
                        fields,
                    },
                );
                inserted.push(id);
                touched.insert(collection);
            }
            WriteOp::Create {
                collection,
                id,
                fields,
            } => {
                let docs = staged.entry(collection.clone()).or_default();
                if docs.contains_key(&id) {
                    return Err(StoreError::unique_constraint(format!(
                        "{collection}/{id} already exists"
                    )));
                }
                let (created_at, seq) = state.next_created();
                docs.insert(
                    id.clone(),
                    StoredDoc {
                        created_at,
                        seq,
                        fields,
                    },
                );
                inserted.push(id);
                touched.insert(collection);
            }
            WriteOp::Update {
                collection,
                id,
                patch,
            } => {
                let doc = staged
                    .get_mut(&collection)
                    .and_then(|docs| docs.get_mut(&id))
                    .ok_or_else(|| {
                        StoreError::missing_document(format!("{collection}/{id}"))
                    })?;
                for (field, value) in patch {
                    doc.fields.insert(field, value);
                }
                touched.insert(collection);
            }
            WriteOp::ExpectExists { collection, id } => {
                let present = staged
                    .get(&collection)
                    .is_some_and(|docs| docs.contains_key(&id));
                if !present {
                    return Err(StoreError::missing_document(format!("{collection}/{id}")));
                }
            }
            WriteOp::ExpectAbsent {
                collection,
                filters,
            } => {
                let conflict = staged.get(&collection).is_some_and(|docs| {
                    docs.values().any(|doc| matches_filters(doc, &filters))
                });
                if conflict {
                    return Err(StoreError::unique_constraint(format!(
                        "a matching document already exists in {collection}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn notify(state: &State, touched: &BTreeSet<CollectionPath>) {
        for listener in &state.listeners {
            if !touched.contains(&listener.query.collection) {
                continue;
            }
            let snapshot = run_query(&state.collections, &listener.query);
            listener.sender.send_if_modified(|current| {
                if *current == snapshot {
                    false
                } else {
                    *current = snapshot;
                    true
                }
            });
        }
    }

    fn commit(
        state: &mut State,
        transaction: Transaction,
    ) -> Result<Vec<DocumentId>, StoreError> {
        let mut staged = state.collections.clone();
        let mut inserted = Vec::new();
        let mut touched = BTreeSet::new();
        for op in transaction.into_ops() {
            Self::apply(state, &mut staged, op, &mut inserted, &mut touched)?;
        }
        state.collections = staged;
        Self::notify(state, &touched);
        Ok(inserted)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filters(doc: &StoredDoc, filters: &[FieldFilter]) -> bool {
    filters
        .iter()
        .all(|filter| doc.fields.get(&filter.field) == Some(&filter.value))
}

/// Order JSON values the way the query layer sorts non-timestamp fields:
/// by type first (null, bool, number, string, the rest), then by value.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        (Value::Number(left), Value::Number(right)) => left
            .as_f64()
            .unwrap_or(f64::NAN)
            .total_cmp(&right.as_f64().unwrap_or(f64::NAN)),
        (Value::String(left), Value::String(right)) => left.cmp(right),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn run_query(collections: &Collections, query: &Query) -> Snapshot {
    let Some(docs) = collections.get(&query.collection) else {
        return Snapshot::new();
    };
    let mut matched: Vec<(&DocumentId, &StoredDoc)> = docs
        .iter()
        .filter(|(_, doc)| matches_filters(doc, &query.filters))
        .collect();
    if let Some(order) = &query.order_by {
        if order.field == CREATED_AT_FIELD {
            matched.sort_by_key(|(_, doc)| (doc.created_at, doc.seq));
        } else {
            matched.sort_by(|(_, left), (_, right)| {
                compare_values(
                    left.fields.get(&order.field).unwrap_or(&Value::Null),
                    right.fields.get(&order.field).unwrap_or(&Value::Null),
                )
            });
        }
        if order.direction == Direction::Descending {
            matched.reverse();
        }
    }
    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }
    matched
        .into_iter()
        .map(|(id, doc)| Document {
            id: id.clone(),
            created_at: doc.created_at,
            fields: doc.fields.clone(),
        })
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let state = Self::lock(&self.state);
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|doc| Document {
                id: id.clone(),
                created_at: doc.created_at,
                fields: doc.fields.clone(),
            }))
    }

    async fn find(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let state = Self::lock(&self.state);
        Ok(run_query(&state.collections, query))
    }

    async fn insert(
        &self,
        collection: &CollectionPath,
        fields: Map<String, Value>,
    ) -> Result<DocumentId, StoreError> {
        let mut state = Self::lock(&self.state);
        let transaction = Transaction::new().insert(collection.clone(), fields);
        let ids = Self::commit(&mut state, transaction)?;
        ids.into_iter()
            .next()
            .ok_or_else(|| StoreError::query("insert yielded no id"))
    }

    async fn update(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut state = Self::lock(&self.state);
        let transaction = Transaction::new().update(collection.clone(), id.clone(), patch);
        Self::commit(&mut state, transaction).map(|_| ())
    }

    async fn transact(&self, transaction: Transaction) -> Result<Vec<DocumentId>, StoreError> {
        let mut state = Self::lock(&self.state);
        Self::commit(&mut state, transaction)
    }

    async fn subscribe(&self, query: &Query) -> Result<Subscription, StoreError> {
        let mut state = Self::lock(&self.state);
        let snapshot = run_query(&state.collections, query);
        let (sender, receiver) = watch::channel(snapshot);
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push(Listener {
            id,
            query: query.clone(),
            sender,
        });

        let handle = Arc::clone(&self.state);
        Ok(Subscription::new(receiver, move || {
            let mut state = Self::lock(&handle);
            state.listeners.retain(|listener| listener.id != id);
        }))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect()
    }

    fn titles(snapshot: &Snapshot) -> Vec<String> {
        snapshot
            .iter()
            .filter_map(|doc| doc.fields.get("title").and_then(Value::as_str))
            .map(str::to_owned)
            .collect()
    }

    #[tokio::test]
    async fn created_at_is_strictly_monotonic() {
        let store = MemoryDocumentStore::new();
        let collection = CollectionPath::root("grievances");
        for i in 0..5 {
            store
                .insert(&collection, fields(&[("title", Value::from(format!("g{i}")))]))
                .await
                .expect("insert succeeds");
        }

        let query =
            Query::collection(collection).ordered_by_created_at(Direction::Ascending);
        let docs = store.find(&query).await.expect("query succeeds");
        assert_eq!(titles(&docs), ["g0", "g1", "g2", "g3", "g4"]);
        for pair in docs.windows(2) {
            assert!(pair[0].created_at < pair[1].created_at);
        }
    }

    #[tokio::test]
    async fn failed_transactions_leave_no_trace() {
        let store = MemoryDocumentStore::new();
        let collection = CollectionPath::root("grievances");
        let transaction = Transaction::new()
            .insert(collection.clone(), fields(&[("title", Value::from("g"))]))
            .update(
                collection.clone(),
                DocumentId::new("missing"),
                Map::new(),
            );
        let err = store
            .transact(transaction)
            .await
            .expect_err("update of a missing document must abort");
        assert!(matches!(err, StoreError::MissingDocument { .. }));

        let docs = store
            .find(&Query::collection(collection))
            .await
            .expect("query succeeds");
        assert!(docs.is_empty(), "the insert must have been rolled back");
    }

    #[tokio::test]
    async fn create_rejects_an_occupied_id() {
        let store = MemoryDocumentStore::new();
        let collection = CollectionPath::root("users");
        let create = |fields| {
            Transaction::new().create(collection.clone(), DocumentId::new("uid-1"), fields)
        };
        store
            .transact(create(fields(&[("role", Value::from("student"))])))
            .await
            .expect("first create succeeds");
        let err = store
            .transact(create(fields(&[("role", Value::from("admin"))])))
            .await
            .expect_err("second create must fail");
        assert!(matches!(err, StoreError::UniqueConstraint { .. }));

        let doc = store
            .get(&collection, &DocumentId::new("uid-1"))
            .await
            .expect("get succeeds")
            .expect("document exists");
        assert_eq!(doc.fields.get("role"), Some(&Value::from("student")));
    }

    #[tokio::test]
    async fn expect_absent_guards_against_duplicates() {
        let store = MemoryDocumentStore::new();
        let collection = CollectionPath::root("opportunities/o1/applications");
        let apply = || {
            Transaction::new()
                .expect_absent(
                    collection.clone(),
                    vec![FieldFilter::equals("studentId", "s1")],
                )
                .insert(collection.clone(), fields(&[("studentId", Value::from("s1"))]))
        };
        store.transact(apply()).await.expect("first application lands");
        let err = store
            .transact(apply())
            .await
            .expect_err("duplicate must fail");
        assert!(matches!(err, StoreError::UniqueConstraint { .. }));
    }

    #[tokio::test]
    async fn ordering_by_a_field_and_limiting() {
        let store = MemoryDocumentStore::new();
        let collection = CollectionPath::root("users");
        for email in ["carol@x.edu", "alice@x.edu", "bob@x.edu"] {
            store
                .insert(
                    &collection,
                    fields(&[("email", Value::from(email)), ("title", Value::from(email))]),
                )
                .await
                .expect("insert succeeds");
        }

        let query = Query::collection(collection)
            .ordered_by("email", Direction::Ascending)
            .with_limit(2);
        let docs = store.find(&query).await.expect("query succeeds");
        assert_eq!(titles(&docs), ["alice@x.edu", "bob@x.edu"]);
    }

    #[tokio::test]
    async fn subscriptions_deliver_matching_writes_only() {
        let store = MemoryDocumentStore::new();
        let collection = CollectionPath::root("grievances");
        let query = Query::collection(collection.clone())
            .with_filter("createdBy", "s1")
            .ordered_by_created_at(Direction::Descending);
        let mut subscription = store.subscribe(&query).await.expect("subscribe succeeds");
        assert!(subscription.snapshot().is_empty());

        store
            .insert(
                &collection,
                fields(&[("createdBy", Value::from("s2")), ("title", Value::from("other"))]),
            )
            .await
            .expect("insert succeeds");
        store
            .insert(
                &collection,
                fields(&[("createdBy", Value::from("s1")), ("title", Value::from("mine"))]),
            )
            .await
            .expect("insert succeeds");

        let snapshot = subscription.changed().await.expect("update arrives");
        assert_eq!(titles(&snapshot), ["mine"]);
    }

    #[tokio::test]
    async fn dropping_a_subscription_releases_its_listener() {
        let store = MemoryDocumentStore::new();
        let query = Query::collection(CollectionPath::root("announcements"));
        let subscription = store.subscribe(&query).await.expect("subscribe succeeds");
        assert_eq!(MemoryDocumentStore::lock(&store.state).listeners.len(), 1);

        drop(subscription);
        assert!(MemoryDocumentStore::lock(&store.state).listeners.is_empty());
    }
}
