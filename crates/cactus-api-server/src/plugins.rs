//! Plugin instantiation from configuration
//!
//! Each import names a built-in package and carries that package's
//! constructor options. Unknown packages fail startup.

use std::sync::Arc;

use cactus_core::checks::non_blank_string;
use cactus_core::plugin::memory::{
    KeychainMemoryOptions, ObjectStoreMemoryOptions, PluginKeychainMemory,
    PluginObjectStoreMemory, KEYCHAIN_MEMORY_PACKAGE_NAME, OBJECT_STORE_MEMORY_PACKAGE_NAME,
};
use cactus_core::{CactusPlugin, PluginRegistry};
use cactus_plugin_consortium_manual::{ConsortiumManualOptions, PluginConsortiumManual};
use cactus_plugin_odap_hermes::{OdapGateway, OdapGatewayOptions};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::PluginImport;
use crate::error::ConfigError;

/// Packages this server knows how to create
pub const BUILT_IN_PACKAGES: [&str; 4] = [
    KEYCHAIN_MEMORY_PACKAGE_NAME,
    OBJECT_STORE_MEMORY_PACKAGE_NAME,
    cactus_plugin_consortium_manual::PACKAGE_NAME,
    cactus_plugin_odap_hermes::PACKAGE_NAME,
];

fn options<T: DeserializeOwned>(import: &PluginImport) -> Result<T, ConfigError> {
    serde_json::from_value(import.options.clone()).map_err(|e| plugin_error(import, e))
}

fn plugin_error(import: &PluginImport, reason: impl ToString) -> ConfigError {
    ConfigError::Plugin {
        package_name: import.package_name.clone(),
        reason: reason.to_string(),
    }
}

/// Create the plugin an import describes.
///
/// `registry` is handed to plugins that look up collaborators at runtime.
pub fn instantiate_plugin(
    import: &PluginImport,
    registry: &PluginRegistry,
) -> Result<Arc<dyn CactusPlugin>, ConfigError> {
    let plugin: Arc<dyn CactusPlugin> = match import.package_name.as_str() {
        KEYCHAIN_MEMORY_PACKAGE_NAME => {
            let opts: KeychainMemoryOptions = options(import)?;
            non_blank_string(&opts.keychain_id, "keychainId").map_err(|e| plugin_error(import, e))?;
            Arc::new(PluginKeychainMemory::new(opts))
        }
        OBJECT_STORE_MEMORY_PACKAGE_NAME => {
            Arc::new(PluginObjectStoreMemory::from(options::<ObjectStoreMemoryOptions>(import)?))
        }
        cactus_plugin_consortium_manual::PACKAGE_NAME => {
            let opts: ConsortiumManualOptions = options(import)?;
            Arc::new(PluginConsortiumManual::new(opts).map_err(|e| plugin_error(import, e))?)
        }
        cactus_plugin_odap_hermes::PACKAGE_NAME => {
            let opts: OdapGatewayOptions = options(import)?;
            Arc::new(
                OdapGateway::new(opts, Some(registry.clone()))
                    .map_err(|e| plugin_error(import, e))?,
            )
        }
        other => return Err(ConfigError::UnknownPackage(other.to_string())),
    };

    non_blank_string(plugin.instance_id(), "instanceId").map_err(|e| plugin_error(import, e))?;
    Ok(plugin)
}

/// Create every import and register it, in order
pub fn build_registry(
    imports: &[PluginImport],
    registry: &PluginRegistry,
) -> Result<(), ConfigError> {
    for import in imports {
        let plugin = instantiate_plugin(import, registry)?;
        info!(
            package_name = %import.package_name,
            instance_id = %plugin.instance_id(),
            "Instantiated plugin from configuration"
        );
        registry.add(plugin);
    }
    Ok(())
}
