//! Addon host errors

use cq_core::BoxError;
use cq_storage::StorageError;
use thiserror::Error;

/// Addon host errors
#[derive(Debug, Error)]
pub enum AddonError {
    #[error("Invalid addon metadata: {0}")]
    InvalidMetadata(String),

    #[error("An initialiser for module {0} is already registered")]
    DuplicateModule(String),

    #[error("No initialiser registered for module {0}")]
    UnknownModule(String),

    #[error("Module {0} supports a single instance and already has one")]
    SingleInstanceOnly(String),

    #[error("Addon instance not found: {0}")]
    UnknownInstance(String),

    #[error("Module {module} failed to create instance {instance_id}")]
    Initialisation {
        module: String,
        instance_id: String,
        #[source]
        source: BoxError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type AddonResult<T> = Result<T, AddonError>;
