//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod document_store;
mod identity_provider;

#[cfg(test)]
pub use document_store::MockDocumentStore;
pub use document_store::{
    CREATED_AT_FIELD, CollectionPath, Direction, Document, DocumentId, DocumentStore, FieldFilter,
    OrderBy, Query, Snapshot, StoreError, Subscription, Transaction, WriteOp,
};
#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
pub use identity_provider::{FixtureIdentityProvider, IdentityProvider, IdentityProviderError};
