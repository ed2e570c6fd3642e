//! Support for moving domain records across the document-store boundary.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::Error;
use crate::domain::ports::StoreError;

/// Serialise a record into store fields.
///
/// The record must serialise to a JSON object; anything else indicates a
/// programming error in the calling service.
pub(crate) fn document_fields<T: Serialize>(record: &T) -> Result<Map<String, Value>, Error> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::internal("document payload must be a JSON object")),
        Err(err) => Err(Error::internal(format!(
            "failed to serialise document payload: {err}"
        ))),
    }
}

/// Default mapping from store errors to domain errors.
///
/// Transport messages are preserved verbatim to aid debugging. Services
/// override the `UniqueConstraint` and `MissingDocument` cases where a more
/// specific message is known.
pub(crate) fn map_store_error(error: StoreError) -> Error {
    match error {
        StoreError::Unavailable { message } => {
            Error::service_unavailable(format!("document store unavailable: {message}"))
        }
        StoreError::Query { message } => {
            Error::internal(format!("document store error: {message}"))
        }
        StoreError::Serialisation { message } => {
            Error::internal(format!("document decode failed: {message}"))
        }
        StoreError::UniqueConstraint { message } => Error::conflict(message),
        StoreError::MissingDocument { message } => Error::not_found(message),
    }
}
