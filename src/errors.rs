use mongodb::error::{Error as DriverError, ErrorKind, WriteError, WriteFailure};
use thiserror::Error;

/// Text the server puts at the start of every unique-index violation.
pub const DUPLICATE_KEY_MARKER: &str = "E11000 duplicate key error";

/// Server error code for a unique-index violation.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Failed to connect to {uri}: {source}")]
    Connect {
        uri: String,
        #[source]
        source: DriverError,
    },
    #[error("Duplicate key in collection `{collection}`: {source}")]
    DuplicateKey {
        collection: String,
        #[source]
        source: DriverError,
    },
    #[error("Failed to decode record from `{collection}`: {source}")]
    Decode {
        collection: String,
        #[source]
        source: DriverError,
    },
    #[error("Update on `{0}` has no fields to set")]
    EmptyUpdate(String),
    #[error("Failed to encode record: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
    #[error("{op} on `{collection}` failed: {source}")]
    Operation {
        op: &'static str,
        collection: String,
        #[source]
        source: DriverError,
    },
}

impl StoreError {
    /// Classifies a driver error raised by `op` against `collection`.
    pub fn from_driver(op: &'static str, collection: &str, source: DriverError) -> Self {
        let collection = collection.to_string();

        if is_duplicate_key(&source) {
            StoreError::DuplicateKey { collection, source }
        } else if matches!(*source.kind, ErrorKind::BsonDeserialization(_)) {
            StoreError::Decode { collection, source }
        } else {
            StoreError::Operation {
                op,
                collection,
                source,
            }
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

/// Reports whether a driver error is a unique-index violation, by message
/// text or by write error code.
pub fn is_duplicate_key(err: &DriverError) -> bool {
    if message_indicates_duplicate(&err.to_string()) {
        return true;
    }

    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code, .. }))
            if *code == DUPLICATE_KEY_CODE
    )
}

pub fn message_indicates_duplicate(message: &str) -> bool {
    message.contains(DUPLICATE_KEY_MARKER)
}
