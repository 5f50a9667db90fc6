//! Addon capability traits

use std::sync::Arc;

use async_trait::async_trait;
use cq_core::{BoxError, EventRecord};
use cq_engine::Chain;
use cq_storage::{AddonStore, StorageResult};

use crate::metadata::{AddonMetadata, InstanceMetadata};

/// A running addon instance
pub trait Addon: Send + Sync {
    fn metadata(&self) -> &InstanceMetadata;

    /// Chains wired by this instance
    fn chains(&self) -> Vec<Chain>;

    /// Events this instance raises
    fn events(&self) -> Vec<EventRecord> {
        Vec::new()
    }
}

/// Creates instances of one addon module
#[async_trait]
pub trait AddonInitialiser: Send + Sync {
    fn metadata(&self) -> &AddonMetadata;

    /// Create a new instance
    ///
    /// `saved_data` is the last value passed to `save_data` for this
    /// instance, or `None` if it never saved anything.
    async fn create_instance(
        &self,
        metadata: InstanceMetadata,
        save_data: SaveData,
        saved_data: Option<serde_json::Value>,
    ) -> Result<Arc<dyn Addon>, BoxError>;
}

/// Persists data on behalf of one instance
#[derive(Clone)]
pub struct SaveData {
    instance_id: String,
    store: Arc<AddonStore>,
}

impl SaveData {
    pub(crate) fn new(instance_id: impl Into<String>, store: Arc<AddonStore>) -> Self {
        Self {
            instance_id: instance_id.into(),
            store,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Replace the saved data of the instance
    pub async fn save(&self, data: serde_json::Value) -> StorageResult<()> {
        self.store.save_addon_data(&self.instance_id, data).await
    }
}

impl std::fmt::Debug for SaveData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveData")
            .field("instance_id", &self.instance_id)
            .finish()
    }
}
