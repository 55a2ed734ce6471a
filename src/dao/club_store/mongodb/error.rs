use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB club store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("invalid club database URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("could not build a MongoDB client for the club database")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("club database did not answer after {attempts} ping(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("club database health ping failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("could not create index `{index}` on `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save `{id}` into `{collection}`")]
    Save {
        collection: &'static str,
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to {action} the commit journal")]
    Journal {
        action: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load collection `{collection}`")]
    Load {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
}
