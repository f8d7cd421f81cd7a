//! Plugin registry with dependency-ordered loading

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::Plugin;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Plugin '{0}' registered twice")]
    Duplicate(String),

    #[error("Plugin '{plugin}' depends on unregistered '{dependency}'")]
    MissingDependency { plugin: String, dependency: String },

    #[error("Circular plugin dependency among: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Unknown plugin '{0}'")]
    Unknown(String),
}

/// Collects plugins before ordering them
pub struct PluginRegistryBuilder<P: ?Sized + Plugin> {
    plugins: Vec<Arc<P>>,
}

impl<P: ?Sized + Plugin> Default for PluginRegistryBuilder<P> {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }
}

impl<P: ?Sized + Plugin> PluginRegistryBuilder<P> {
    #[must_use]
    pub fn register(mut self, plugin: Arc<P>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Validate dependencies and compute the load order
    ///
    /// # Errors
    ///
    /// Duplicate ids, dependencies on unregistered ids and cycles.
    pub fn build(self) -> Result<PluginRegistry<P>, RegistryError> {
        let mut plugins: HashMap<String, Arc<P>> = HashMap::with_capacity(self.plugins.len());
        for plugin in self.plugins {
            let id = plugin.id().to_string();
            if plugins.insert(id.clone(), plugin).is_some() {
                return Err(RegistryError::Duplicate(id));
            }
        }

        // Kahn's algorithm; BTree collections keep the order deterministic
        let mut in_degree: BTreeMap<String, usize> = BTreeMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for (id, plugin) in &plugins {
            let deps: BTreeSet<String> = plugin.dependencies().into_iter().collect();
            for dep in &deps {
                if !plugins.contains_key(dep) {
                    return Err(RegistryError::MissingDependency {
                        plugin: id.clone(),
                        dependency: dep.clone(),
                    });
                }
                dependents.entry(dep.clone()).or_default().push(id.clone());
            }
            in_degree.insert(id.clone(), deps.len());
        }

        let mut ready: BTreeSet<String> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| id.clone())
            .collect();
        let mut order = Vec::with_capacity(plugins.len());
        while let Some(id) = ready.pop_first() {
            for dependent in dependents.get(&id).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(dependent.clone());
                    }
                }
            }
            order.push(id);
        }

        if order.len() != plugins.len() {
            let stuck: Vec<String> = in_degree
                .into_iter()
                .filter(|(_, d)| *d > 0)
                .map(|(id, _)| id)
                .collect();
            return Err(RegistryError::DependencyCycle(stuck));
        }

        log::info!("Loaded plugins in order: {}", order.join(" -> "));
        Ok(PluginRegistry { plugins, order })
    }
}

/// Immutable capability table keyed by plugin id
pub struct PluginRegistry<P: ?Sized + Plugin> {
    plugins: HashMap<String, Arc<P>>,
    order: Vec<String>,
}

impl<P: ?Sized + Plugin> Clone for PluginRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            plugins: self.plugins.clone(),
            order: self.order.clone(),
        }
    }
}

impl<P: ?Sized + Plugin> PluginRegistry<P> {
    #[must_use]
    pub fn builder() -> PluginRegistryBuilder<P> {
        PluginRegistryBuilder::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<P>> {
        self.plugins.get(id).cloned()
    }

    pub fn require(&self, id: &str) -> Result<Arc<P>, RegistryError> {
        self.get(id)
            .ok_or_else(|| RegistryError::Unknown(id.to_string()))
    }

    /// Ids in dependency order
    #[must_use]
    pub fn load_order(&self) -> &[String] {
        &self.order
    }

    /// Plugins in dependency order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<P>> {
        self.order.iter().filter_map(|id| self.plugins.get(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        id: &'static str,
        deps: Vec<&'static str>,
    }

    impl Plugin for Stub {
        fn id(&self) -> &str {
            self.id
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.iter().map(ToString::to_string).collect()
        }
    }

    fn stub(id: &'static str, deps: &[&'static str]) -> Arc<dyn Plugin> {
        Arc::new(Stub {
            id,
            deps: deps.to_vec(),
        })
    }

    #[test]
    fn test_dependencies_load_first() {
        let registry = PluginRegistry::<dyn Plugin>::builder()
            .register(stub("heat", &["base"]))
            .register(stub("base", &[]))
            .register(stub("pie", &["base", "heat"]))
            .build()
            .unwrap();
        assert_eq!(registry.load_order(), &["base", "heat", "pie"]);
        assert!(registry.require("pie").is_ok());
        assert_eq!(
            registry.require("nope").err(),
            Some(RegistryError::Unknown("nope".into()))
        );
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let err = PluginRegistry::<dyn Plugin>::builder()
            .register(stub("heat", &["base"]))
            .build()
            .err();
        assert_eq!(
            err,
            Some(RegistryError::MissingDependency {
                plugin: "heat".into(),
                dependency: "base".into()
            })
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let err = PluginRegistry::<dyn Plugin>::builder()
            .register(stub("a", &["b"]))
            .register(stub("b", &["a"]))
            .register(stub("c", &[]))
            .build()
            .err();
        assert_eq!(
            err,
            Some(RegistryError::DependencyCycle(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = PluginRegistry::<dyn Plugin>::builder()
            .register(stub("a", &[]))
            .register(stub("a", &[]))
            .build()
            .err();
        assert_eq!(err, Some(RegistryError::Duplicate("a".into())));
    }
}
