use std::collections::BTreeMap;
use std::fmt;

use sh_scene::PluginDesc;

use crate::error::{SimError, SimResult};
use crate::record::RecordSystem;
use crate::system::System;

/// Builds a system from its scene declaration.
pub type SystemConstructor = Box<dyn Fn(&PluginDesc) -> SimResult<Box<dyn System>> + Send + Sync>;

/// Maps plugin names found in scene files to system constructors.
pub struct SystemRegistry {
    constructors: BTreeMap<String, SystemConstructor>,
}

impl Default for SystemRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl SystemRegistry {
    /// A registry with no entries.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// A registry with the built-in systems (`record`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(RecordSystem::PLUGIN_NAME, |plugin| {
            Ok(Box::new(RecordSystem::from_plugin(plugin)?) as Box<dyn System>)
        });
        registry
    }

    /// Register or replace a constructor.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: impl Fn(&PluginDesc) -> SimResult<Box<dyn System>> + Send + Sync + 'static,
    ) {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Whether a constructor exists for this plugin name.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered plugin names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Instantiate the system declared by `plugin`.
    pub fn create(&self, plugin: &PluginDesc) -> SimResult<Box<dyn System>> {
        let constructor = self
            .constructors
            .get(&plugin.name)
            .ok_or_else(|| SimError::UnknownPlugin(plugin.name.clone()))?;
        constructor(plugin)
    }
}

impl fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.constructors.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sh_scene::ParamValue;

    #[test]
    fn builtins_include_record() {
        let registry = SystemRegistry::default();
        assert!(registry.contains("record"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["record"]);
    }

    #[test]
    fn create_record_from_plugin() {
        let registry = SystemRegistry::with_builtins();
        let plugin =
            PluginDesc::new("record").with_param("path", ParamValue::String("/tmp/x".into()));
        let system = registry.create(&plugin).unwrap();
        assert_eq!(system.name(), "record");
        assert!(system.as_any().downcast_ref::<RecordSystem>().is_some());
    }

    #[test]
    fn unknown_plugin_is_an_error() {
        let registry = SystemRegistry::empty();
        let err = registry.create(&PluginDesc::new("wind")).unwrap_err();
        assert_eq!(err.to_string(), "unknown plugin \"wind\"");
    }
}
