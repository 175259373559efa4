mod config;
mod connection;
mod error;
mod models;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoRecordStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::DuplicateKey { key } => StorageError::Conflict { key },
            MongoDaoError::StaleWrite { key } => StorageError::StaleWrite { key },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
