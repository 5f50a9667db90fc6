//! Addon Store
//!
//! Persists one record per addon instance: which module created it, the name
//! and inputs the user gave it, and the last data the instance asked to save.
//! Every mutation rewrites the whole file.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cq_core::UserInputValue;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::storage::{Storable, Storage, StorageError, StorageResult};

/// Storage key for addon records
pub const STORAGE_KEY: &str = "consequences.addons";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// A stored addon instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonRecord {
    /// Unique id of the instance
    pub instance_id: String,

    /// Name of the module whose initialiser created the instance
    pub module_name: String,

    /// Name shown to the user
    pub display_name: String,

    /// Inputs the user provided when creating the instance
    #[serde(default)]
    pub user_provided_inputs: Vec<UserInputValue>,

    /// Data last saved by the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_data: Option<serde_json::Value>,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl AddonRecord {
    pub fn new(
        instance_id: impl Into<String>,
        module_name: impl Into<String>,
        display_name: impl Into<String>,
        user_provided_inputs: Vec<UserInputValue>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            module_name: module_name.into(),
            display_name: display_name.into(),
            user_provided_inputs,
            saved_data: None,
            created_at: Utc::now(),
        }
    }
}

/// Addon store data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddonStoreData {
    pub addons: Vec<AddonRecord>,
}

impl Storable for AddonStoreData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Addon Store
///
/// Records are kept in memory as `Arc<AddonRecord>` and written through to
/// storage on every change.
pub struct AddonStore {
    /// Storage backend
    storage: Arc<Storage>,

    /// instance_id -> record
    by_id: DashMap<String, Arc<AddonRecord>>,

    /// Serializes writes of the storage file
    write_lock: Mutex<()>,
}

impl AddonStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            by_id: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Load records from storage, replacing the in-memory ones
    pub async fn load(&self) -> StorageResult<()> {
        self.by_id.clear();

        if let Some(storage_file) = self.storage.load::<AddonStoreData>().await? {
            info!(
                count = storage_file.data.addons.len(),
                version = storage_file.version,
                minor_version = storage_file.minor_version,
                "Loading addon records from storage"
            );

            for record in storage_file.data.addons {
                self.by_id
                    .insert(record.instance_id.clone(), Arc::new(record));
            }
        }
        Ok(())
    }

    /// Every stored record, oldest first
    pub fn retrieve_all_addons(&self) -> Vec<Arc<AddonRecord>> {
        let mut records: Vec<_> = self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.instance_id.cmp(&b.instance_id))
        });
        records
    }

    pub fn get(&self, instance_id: &str) -> Option<Arc<AddonRecord>> {
        self.by_id.get(instance_id).map(|r| Arc::clone(r.value()))
    }

    /// Whether an instance of `module_name` is stored
    pub fn has_module(&self, module_name: &str) -> bool {
        self.by_id.iter().any(|r| r.module_name == module_name)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Store a new record
    pub async fn create_addon(&self, record: AddonRecord) -> StorageResult<Arc<AddonRecord>> {
        let record = Arc::new(record);
        match self.by_id.entry(record.instance_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StorageError::DuplicateAddon(record.instance_id.clone()));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&record));
            }
        }

        info!(
            instance_id = %record.instance_id,
            module_name = %record.module_name,
            "Created addon record"
        );
        self.save().await?;
        Ok(record)
    }

    /// Replace the saved data of an instance
    pub async fn save_addon_data(
        &self,
        instance_id: &str,
        data: serde_json::Value,
    ) -> StorageResult<()> {
        {
            let mut entry = self
                .by_id
                .get_mut(instance_id)
                .ok_or_else(|| StorageError::UnknownAddon(instance_id.to_string()))?;
            let mut record = (**entry).clone();
            record.saved_data = Some(data);
            *entry = Arc::new(record);
        }

        debug!(instance_id, "Saved addon data");
        self.save().await
    }

    /// Delete a record
    pub async fn remove_addon(&self, instance_id: &str) -> StorageResult<Arc<AddonRecord>> {
        let (_, record) = self
            .by_id
            .remove(instance_id)
            .ok_or_else(|| StorageError::UnknownAddon(instance_id.to_string()))?;

        info!(instance_id, "Removed addon record");
        self.save().await?;
        Ok(record)
    }

    async fn save(&self) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let data = AddonStoreData {
            addons: self
                .retrieve_all_addons()
                .iter()
                .map(|r| (**r).clone())
                .collect(),
        };

        self.storage.save(&data).await?;
        debug!(count = data.addons.len(), "Saved addon records");
        Ok(())
    }
}
