//! Consequences Storage
//!
//! JSON persistence in the `.storage/` directory, with versioning for
//! migrations. The only store kept there today is the [`AddonStore`], which
//! remembers every addon instance and the data it saved.

pub mod addon_store;
pub mod storage;

pub use addon_store::{AddonRecord, AddonStore, AddonStoreData};
pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult, STORAGE_DIR};
