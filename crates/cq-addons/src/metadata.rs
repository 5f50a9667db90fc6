//! Addon metadata

use cq_core::UserInputValue;
use serde::{Deserialize, Serialize};

use crate::error::{AddonError, AddonResult};

/// What an initialiser advertises before any instance exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonMetadata {
    /// User-friendly display name
    pub name: String,

    /// User-friendly description
    pub description: String,

    /// Whether more than one instance may be created
    pub supports_multiple_instances: bool,
}

impl AddonMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            supports_multiple_instances: false,
        }
    }

    pub fn with_multiple_instances(mut self) -> Self {
        self.supports_multiple_instances = true;
        self
    }

    /// Check the metadata is usable
    pub fn validate(&self) -> AddonResult<()> {
        if self.name.trim().is_empty() {
            return Err(AddonError::InvalidMetadata("name must not be empty".into()));
        }
        Ok(())
    }
}

/// Metadata handed to one addon instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMetadata {
    pub instance_id: String,
    pub module_name: String,
    pub display_name: String,

    /// Inputs the user provided when creating the instance
    #[serde(default)]
    pub inputs: Vec<UserInputValue>,
}
