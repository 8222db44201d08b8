//! In-memory keychain and object store plugins
//!
//! Suitable for development and tests. Data is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CactusPlugin, KeychainPlugin, ObjectStorePlugin, PluginCapability};
use crate::error::Result;

pub const KEYCHAIN_MEMORY_PACKAGE_NAME: &str = "cactus-plugin-keychain-memory";
pub const OBJECT_STORE_MEMORY_PACKAGE_NAME: &str = "cactus-plugin-object-store-memory";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeychainMemoryOptions {
    pub instance_id: String,
    pub keychain_id: String,
}

/// Keychain backed by a hash map
#[derive(Debug)]
pub struct PluginKeychainMemory {
    instance_id: String,
    keychain_id: String,
    backend: RwLock<HashMap<String, String>>,
}

impl PluginKeychainMemory {
    pub fn new(options: KeychainMemoryOptions) -> Self {
        Self {
            instance_id: options.instance_id,
            keychain_id: options.keychain_id,
            backend: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries currently held
    pub fn key_count(&self) -> usize {
        self.backend.read().len()
    }
}

impl CactusPlugin for PluginKeychainMemory {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn package_name(&self) -> &str {
        KEYCHAIN_MEMORY_PACKAGE_NAME
    }

    fn capabilities(self: Arc<Self>) -> Vec<PluginCapability> {
        vec![PluginCapability::Keychain(self)]
    }
}

#[async_trait]
impl KeychainPlugin for PluginKeychainMemory {
    fn keychain_id(&self) -> &str {
        &self.keychain_id
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.backend.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        debug!(keychain_id = %self.keychain_id, key = %key, "Storing keychain entry");
        self.backend.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.backend.read().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.backend.write().remove(key).is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStoreMemoryOptions {
    pub instance_id: String,
}

/// Object store backed by a hash map
#[derive(Debug)]
pub struct PluginObjectStoreMemory {
    instance_id: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl PluginObjectStoreMemory {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }
}

impl From<ObjectStoreMemoryOptions> for PluginObjectStoreMemory {
    fn from(options: ObjectStoreMemoryOptions) -> Self {
        Self::new(options.instance_id)
    }
}

impl CactusPlugin for PluginObjectStoreMemory {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn package_name(&self) -> &str {
        OBJECT_STORE_MEMORY_PACKAGE_NAME
    }

    fn capabilities(self: Arc<Self>) -> Vec<PluginCapability> {
        vec![PluginCapability::ObjectStore(self)]
    }
}

#[async_trait]
impl ObjectStorePlugin for PluginObjectStoreMemory {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.objects.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().contains_key(key))
    }
}
