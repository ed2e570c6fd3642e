//! Campus hub backend: a role-gated workflow engine over a document store.
//!
//! The crate is organised hexagonally. [`domain`] holds the entities, the
//! role policy, and the workflow services; [`domain::ports`] defines the
//! driven ports (document store, identity provider); [`outbound`] provides
//! the in-process document-store adapter used by tests and local tooling.

pub mod domain;
pub mod outbound;
pub mod telemetry;
