//! Addon Host
//!
//! Manages the lifecycle of addon instances.

use std::sync::Arc;

use cq_core::UserInputValue;
use cq_engine::ChainDispatcher;
use cq_storage::{AddonRecord, AddonStore};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::addon::{Addon, AddonInitialiser, SaveData};
use crate::error::{AddonError, AddonResult};
use crate::metadata::{AddonMetadata, InstanceMetadata};

/// Addon Host
///
/// Manages:
/// - Initialisers, keyed by module name
/// - Instance creation, restoration and removal
/// - Persistence of instance records
/// - Registration of each instance's chains and events with the dispatcher
pub struct AddonHost {
    /// Persistent instance records
    store: Arc<AddonStore>,

    /// Dispatcher receiving each instance's chains
    dispatcher: Arc<ChainDispatcher>,

    /// module_name -> initialiser
    initialisers: DashMap<String, Arc<dyn AddonInitialiser>>,

    /// instance_id -> running instance
    instances: DashMap<String, Arc<dyn Addon>>,

    /// Serializes creation and removal
    lifecycle_lock: Mutex<()>,
}

impl AddonHost {
    pub fn new(store: Arc<AddonStore>, dispatcher: Arc<ChainDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            initialisers: DashMap::new(),
            instances: DashMap::new(),
            lifecycle_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<AddonStore> {
        &self.store
    }

    /// Register the initialiser of a module
    pub fn register_initialiser(
        &self,
        module_name: impl Into<String>,
        initialiser: Arc<dyn AddonInitialiser>,
    ) -> AddonResult<()> {
        let module_name = module_name.into();
        initialiser.metadata().validate()?;

        if self.initialisers.contains_key(&module_name) {
            return Err(AddonError::DuplicateModule(module_name));
        }

        debug!(module_name = %module_name, "Registered addon initialiser");
        self.initialisers.insert(module_name, initialiser);
        Ok(())
    }

    /// Metadata of every registered module
    pub fn available_addons(&self) -> Vec<(String, AddonMetadata)> {
        let mut addons: Vec<_> = self
            .initialisers
            .iter()
            .map(|r| (r.key().clone(), r.value().metadata().clone()))
            .collect();
        addons.sort_by(|a, b| a.0.cmp(&b.0));
        addons
    }

    pub fn instance(&self, instance_id: &str) -> Option<Arc<dyn Addon>> {
        self.instances.get(instance_id).map(|r| Arc::clone(r.value()))
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Create, persist and start a new instance of `module_name`
    pub async fn create_addon(
        &self,
        module_name: &str,
        display_name: impl Into<String>,
        inputs: Vec<UserInputValue>,
    ) -> AddonResult<Arc<dyn Addon>> {
        let _lock = self.lifecycle_lock.lock().await;

        let initialiser = self.initialiser(module_name)?;
        if !initialiser.metadata().supports_multiple_instances && self.store.has_module(module_name)
        {
            return Err(AddonError::SingleInstanceOnly(module_name.to_string()));
        }

        let record = AddonRecord::new(
            ulid::Ulid::new().to_string(),
            module_name,
            display_name,
            inputs,
        );
        let record = self.store.create_addon(record).await?;

        match self.instantiate(&initialiser, &record, None).await {
            Ok(addon) => {
                info!(
                    instance_id = %record.instance_id,
                    module_name,
                    display_name = %record.display_name,
                    "Created addon instance"
                );
                Ok(addon)
            }
            Err(e) => {
                warn!(
                    instance_id = %record.instance_id,
                    module_name,
                    error = %e,
                    "Discarding record of failed addon instance"
                );
                self.store.remove_addon(&record.instance_id).await?;
                Err(e)
            }
        }
    }

    /// Recreate every stored instance with its saved data
    ///
    /// Records of unknown modules and instances that fail to start are
    /// skipped and kept in storage. Returns the number of instances started.
    pub async fn restore_all(&self) -> AddonResult<usize> {
        let _lock = self.lifecycle_lock.lock().await;
        self.store.load().await?;

        let mut restored = 0;
        for record in self.store.retrieve_all_addons() {
            if self.instances.contains_key(&record.instance_id) {
                continue;
            }

            let Some(initialiser) = self.initialisers.get(&record.module_name).map(|r| r.clone())
            else {
                warn!(
                    instance_id = %record.instance_id,
                    module_name = %record.module_name,
                    "No initialiser for stored addon, skipping"
                );
                continue;
            };

            match self
                .instantiate(&initialiser, &record, record.saved_data.clone())
                .await
            {
                Ok(_) => restored += 1,
                Err(e) => error!(
                    instance_id = %record.instance_id,
                    error = %e,
                    "Failed to restore addon instance"
                ),
            }
        }

        info!(restored, "Restored addon instances");
        Ok(restored)
    }

    /// Stop an instance and delete its record
    pub async fn remove_addon(&self, instance_id: &str) -> AddonResult<()> {
        let _lock = self.lifecycle_lock.lock().await;

        if self.store.get(instance_id).is_none() {
            return Err(AddonError::UnknownInstance(instance_id.to_string()));
        }

        let chains = self.dispatcher.unregister_owner(instance_id);
        self.instances.remove(instance_id);
        self.store.remove_addon(instance_id).await?;

        info!(instance_id, chains, "Removed addon instance");
        Ok(())
    }

    fn initialiser(&self, module_name: &str) -> AddonResult<Arc<dyn AddonInitialiser>> {
        self.initialisers
            .get(module_name)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| AddonError::UnknownModule(module_name.to_string()))
    }

    async fn instantiate(
        &self,
        initialiser: &Arc<dyn AddonInitialiser>,
        record: &AddonRecord,
        saved_data: Option<serde_json::Value>,
    ) -> AddonResult<Arc<dyn Addon>> {
        let metadata = InstanceMetadata {
            instance_id: record.instance_id.clone(),
            module_name: record.module_name.clone(),
            display_name: record.display_name.clone(),
            inputs: record.user_provided_inputs.clone(),
        };
        let save_data = SaveData::new(&record.instance_id, self.store.clone());

        let addon = initialiser
            .create_instance(metadata, save_data, saved_data)
            .await
            .map_err(|source| AddonError::Initialisation {
                module: record.module_name.clone(),
                instance_id: record.instance_id.clone(),
                source,
            })?;

        for event in addon.events() {
            self.dispatcher
                .register_owned_event(&record.instance_id, event);
        }
        for chain in addon.chains() {
            self.dispatcher
                .register_chain(chain.with_owner(&record.instance_id));
        }

        self.instances
            .insert(record.instance_id.clone(), Arc::clone(&addon));
        Ok(addon)
    }
}
