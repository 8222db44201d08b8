//! Plugin Registry
//!
//! In-memory catalogue of plugin instances, shared by every request handler.
//! Entries are only ever appended. Duplicate instance ids are tolerated but
//! unique lookups return the first entry added under that id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::{
    CactusPlugin, CapabilityKind, ConsortiumPlugin, KeychainPlugin, LedgerConnectorPlugin,
    ObjectStorePlugin, PluginCapability, WebServicePlugin,
};
use crate::checks::non_blank_string;
use crate::error::{CactusError, Result};

/// A plugin together with the capabilities it declared when added
#[derive(Clone)]
pub struct RegisteredPlugin {
    plugin: Arc<dyn CactusPlugin>,
    capabilities: Vec<PluginCapability>,
}

impl RegisteredPlugin {
    pub fn instance_id(&self) -> &str {
        self.plugin.instance_id()
    }

    pub fn package_name(&self) -> &str {
        self.plugin.package_name()
    }

    pub fn plugin(&self) -> &Arc<dyn CactusPlugin> {
        &self.plugin
    }

    pub fn capabilities(&self) -> &[PluginCapability] {
        &self.capabilities
    }

    pub fn has_capability(&self, kind: CapabilityKind) -> bool {
        self.capabilities.iter().any(|c| c.kind() == kind)
    }

    pub fn as_keychain(&self) -> Option<Arc<dyn KeychainPlugin>> {
        self.capabilities.iter().find_map(|c| match c {
            PluginCapability::Keychain(k) => Some(k.clone()),
            _ => None,
        })
    }

    pub fn as_ledger_connector(&self) -> Option<Arc<dyn LedgerConnectorPlugin>> {
        self.capabilities.iter().find_map(|c| match c {
            PluginCapability::LedgerConnector(l) => Some(l.clone()),
            _ => None,
        })
    }

    pub fn as_web_service(&self) -> Option<Arc<dyn WebServicePlugin>> {
        self.capabilities.iter().find_map(|c| match c {
            PluginCapability::WebService(w) => Some(w.clone()),
            _ => None,
        })
    }

    pub fn as_object_store(&self) -> Option<Arc<dyn ObjectStorePlugin>> {
        self.capabilities.iter().find_map(|c| match c {
            PluginCapability::ObjectStore(o) => Some(o.clone()),
            _ => None,
        })
    }

    pub fn as_consortium(&self) -> Option<Arc<dyn ConsortiumPlugin>> {
        self.capabilities.iter().find_map(|c| match c {
            PluginCapability::Consortium(c) => Some(c.clone()),
            _ => None,
        })
    }
}

impl std::fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("instance_id", &self.instance_id())
            .field("package_name", &self.package_name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    plugins: Vec<RegisteredPlugin>,
    by_id: HashMap<String, usize>,
}

/// Plugin Registry
///
/// Cheap to clone; clones share the same catalogue.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `plugins`, in order
    pub fn with_plugins<I>(plugins: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn CactusPlugin>>,
    {
        let registry = Self::new();
        for plugin in plugins {
            registry.add(plugin);
        }
        registry
    }

    /// Add a plugin
    pub fn add(&self, plugin: Arc<dyn CactusPlugin>) {
        let capabilities = plugin.clone().capabilities();
        let instance_id = plugin.instance_id().to_string();
        let entry = RegisteredPlugin {
            plugin,
            capabilities,
        };

        let mut inner = self.inner.write();
        let index = inner.plugins.len();
        if inner.by_id.contains_key(&instance_id) {
            warn!(instance_id = %instance_id, "Duplicate plugin instance id, lookups keep the first");
        } else {
            inner.by_id.insert(instance_id.clone(), index);
        }
        info!(
            instance_id = %instance_id,
            package_name = %entry.package_name(),
            capabilities = ?entry.capabilities,
            "Registered plugin"
        );
        inner.plugins.push(entry);
    }

    /// Number of registered plugins, duplicates included
    pub fn len(&self) -> usize {
        self.inner.read().plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every entry, in insertion order
    pub fn get_plugins(&self) -> Vec<RegisteredPlugin> {
        self.inner.read().plugins.clone()
    }

    /// Look up a plugin by instance id.
    ///
    /// An empty result means absent. A blank id is an error.
    pub fn find_one_by_id(&self, instance_id: &str) -> Result<Option<RegisteredPlugin>> {
        non_blank_string(instance_id, "instanceId")?;
        let inner = self.inner.read();
        Ok(inner
            .by_id
            .get(instance_id)
            .map(|&index| inner.plugins[index].clone()))
    }

    /// Look up a plugin by instance id, failing with `NotFound` when absent
    pub fn get_one_by_id(&self, instance_id: &str) -> Result<RegisteredPlugin> {
        self.find_one_by_id(instance_id)?.ok_or_else(|| {
            CactusError::NotFound(format!("No plugin with instance id {:?}", instance_id))
        })
    }

    /// Look up a keychain by its keychain id.
    ///
    /// Blank ids fail with `InvalidArgument`, unmatched ids with `NotFound`.
    pub fn find_one_by_keychain_id(&self, keychain_id: &str) -> Result<Arc<dyn KeychainPlugin>> {
        non_blank_string(keychain_id, "keychainId")?;
        self.get_keychains()
            .into_iter()
            .find(|k| k.keychain_id() == keychain_id)
            .ok_or_else(|| {
                CactusError::NotFound(format!("No keychain with keychain id {:?}", keychain_id))
            })
    }

    /// Entries declaring `kind`
    pub fn find_many_by_capability(&self, kind: CapabilityKind) -> Vec<RegisteredPlugin> {
        self.inner
            .read()
            .plugins
            .iter()
            .filter(|p| p.has_capability(kind))
            .cloned()
            .collect()
    }

    pub fn get_keychains(&self) -> Vec<Arc<dyn KeychainPlugin>> {
        self.find_many_by_capability(CapabilityKind::Keychain)
            .iter()
            .filter_map(RegisteredPlugin::as_keychain)
            .collect()
    }

    pub fn get_web_services(&self) -> Vec<Arc<dyn WebServicePlugin>> {
        self.find_many_by_capability(CapabilityKind::WebService)
            .iter()
            .filter_map(RegisteredPlugin::as_web_service)
            .collect()
    }

    pub fn get_ledger_connectors(&self) -> Vec<Arc<dyn LedgerConnectorPlugin>> {
        self.find_many_by_capability(CapabilityKind::LedgerConnector)
            .iter()
            .filter_map(RegisteredPlugin::as_ledger_connector)
            .collect()
    }

    /// Object store registered under `instance_id`
    pub fn get_object_store(&self, instance_id: &str) -> Result<Arc<dyn ObjectStorePlugin>> {
        self.get_one_by_id(instance_id)?
            .as_object_store()
            .ok_or_else(|| {
                CactusError::NotFound(format!(
                    "Plugin {:?} is not an object store",
                    instance_id
                ))
            })
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.inner.read().plugins)
            .finish()
    }
}
