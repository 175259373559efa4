use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failures of the MongoDB record store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The client could not be built from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the initial ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Attempts made.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// Periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index creation failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A unique index rejected the write.
    #[error("duplicate {key}")]
    DuplicateKey {
        /// Name of the violated key.
        key: &'static str,
    },
    /// A guarded update found the document changed since it was read.
    #[error("stale write on {key}")]
    StaleWrite {
        /// Name of the guarded field.
        key: &'static str,
    },
    /// A value could not be encoded as BSON.
    #[error("failed to encode {field} for `{collection}`")]
    Encode {
        /// Field being encoded.
        field: &'static str,
        /// Collection name.
        collection: &'static str,
        /// Encoder error.
        #[source]
        source: mongodb::bson::error::Error,
    },
    /// Any other read or write failure.
    #[error("failed to {operation} in `{collection}`")]
    Operation {
        /// What was attempted.
        operation: &'static str,
        /// Collection name.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A stored identifier is not a valid UUID.
    #[error("corrupt identifier in `{collection}`")]
    CorruptId {
        /// Collection name.
        collection: &'static str,
        /// Parse error.
        #[source]
        source: uuid::Error,
    },
}

impl MongoDaoError {
    /// Wrap a driver error raised while running `operation` on `collection`.
    pub fn operation(operation: &'static str, collection: &'static str, source: MongoError) -> Self {
        MongoDaoError::Operation {
            operation,
            collection,
            source,
        }
    }
}

/// Whether `err` is a unique-index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}
