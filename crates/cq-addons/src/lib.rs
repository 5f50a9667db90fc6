//! Addons
//!
//! This crate provides the boundary between the host and addon modules.
//! Each module registers an [`AddonInitialiser`]; the [`AddonHost`] creates
//! instances from it, persists their records and hands their chains to the
//! chain dispatcher.
//!
//! # Key Types
//!
//! - [`AddonMetadata`] - What a module advertises before any instance exists
//! - [`AddonInitialiser`] - Creates instances of one module
//! - [`Addon`] - A running instance exposing chains and events
//! - [`SaveData`] - Persists data on behalf of one instance
//! - [`AddonHost`] - Manager for all instances
//!
//! # Storage
//!
//! Instance records are persisted in `.storage/consequences.addons`.

pub mod addon;
pub mod error;
pub mod host;
pub mod metadata;

pub use addon::{Addon, AddonInitialiser, SaveData};
pub use error::{AddonError, AddonResult};
pub use host::AddonHost;
pub use metadata::{AddonMetadata, InstanceMetadata};
