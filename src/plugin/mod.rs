//! Statically registered plugins (providers and visualizers)
//!
//! Plugins are trait objects registered under a stable string id. Each one
//! declares its option schema and the ids it depends on; the registry
//! resolves a load order and refuses to start on missing or circular
//! dependencies.

pub mod registry;
pub mod schema;

pub use registry::{PluginRegistry, PluginRegistryBuilder, RegistryError};
pub use schema::{OptionKind, OptionSpec, check_against_schema};

use serde_json::Value;

use crate::config::ConfigError;

/// Capabilities shared by every registered plugin
pub trait Plugin: Send + Sync {
    /// Stable registry key
    fn id(&self) -> &str;

    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Ids of plugins that must load before this one
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Declared options with types, defaults and descriptions
    fn option_schema(&self) -> Vec<OptionSpec> {
        Vec::new()
    }

    /// Validate a raw option bag before it is used
    ///
    /// The default checks keys and value types against [`Plugin::option_schema`].
    fn check_options(&self, raw: &Value) -> Result<(), ConfigError> {
        check_against_schema(&self.option_schema(), raw)
    }
}
