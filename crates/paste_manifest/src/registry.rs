//! The per-content-type mapping from module name to module.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::graph::DependencyGraph;
use crate::module::{Module, ModuleSnapshot, Version};

/// One step of a content type's load order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortedEntry {
    /// Logical module name.
    pub name: String,
    /// Location of the compiled artifact.
    pub compiled_path: PathBuf,
    /// Module version at the time of sorting.
    pub version: Version,
}

/// A module found by [`Registry::lookup`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved<'a> {
    /// The current entry, live or tombstoned.
    Live(&'a Module),
    /// An archived snapshot of an older version.
    Archived(&'a ModuleSnapshot),
}

impl Resolved<'_> {
    /// The compiled artifact of the resolved version.
    pub fn compiled_path(&self) -> Option<&PathBuf> {
        match self {
            Resolved::Live(module) => module.compiled_path.as_ref(),
            Resolved::Archived(snapshot) => snapshot.compiled_path.as_ref(),
        }
    }

    /// The resolved version.
    pub fn version(&self) -> Version {
        match self {
            Resolved::Live(module) => module.version,
            Resolved::Archived(snapshot) => snapshot.version,
        }
    }
}

/// Modules of one content type, keyed by logical name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Registry {
    modules: BTreeMap<String, Module>,
}

impl Registry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// The entry for `name`, live or tombstoned.
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Mutable access to the entry for `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.get_mut(name)
    }

    /// Inserts a module under its own name, returning the entry it replaced.
    pub fn insert(&mut self, module: Module) -> Option<Module> {
        self.modules.insert(module.name.clone(), module)
    }

    /// Purges an entry outright.
    pub fn remove(&mut self, name: &str) -> Option<Module> {
        self.modules.remove(name)
    }

    /// Returns `true` if an entry, live or tombstoned, exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Module names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Finds a module by name, optionally at a specific version.
    ///
    /// Without a version the current entry is returned even if it is a
    /// tombstone. With a version, the current entry answers when its version
    /// matches; otherwise the archived history is searched.
    pub fn lookup(&self, name: &str, version: Option<Version>) -> Option<Resolved<'_>> {
        let module = self.modules.get(name)?;
        match version {
            None => Some(Resolved::Live(module)),
            Some(version) if version == module.version => Some(Resolved::Live(module)),
            Some(version) => module
                .version_history
                .iter()
                .rev()
                .find(|snapshot| snapshot.version == version)
                .map(Resolved::Archived),
        }
    }

    /// Orders the live modules and closes their dependency sets.
    ///
    /// Tombstones take no part. Dependency names that do not resolve to a live
    /// module are logged and left out of every closure. Returns the load order
    /// of live modules that have a compiled artifact.
    pub fn resolve(&mut self) -> Vec<SortedEntry> {
        let graph = DependencyGraph::new(
            self.modules
                .values()
                .filter(|module| !module.is_removed())
                .map(|module| (module.name.clone(), module.dependencies.clone())),
        );
        let order = graph.topological_order().flat();

        let live: BTreeSet<String> = self
            .modules
            .values()
            .filter(|module| !module.is_removed())
            .map(|module| module.name.clone())
            .collect();

        for name in order.iter().rev() {
            let Some(module) = self.modules.get_mut(name).filter(|m| !m.is_removed()) else {
                error!(name = %name, "unresolved dependency, no module declares this name");
                continue;
            };
            let closure = graph
                .transitive_dependencies(name)
                .into_iter()
                .filter(|dep| live.contains(dep));
            module.set_dependencies(closure);
        }

        order
            .iter()
            .filter_map(|name| {
                let module = self.modules.get(name).filter(|m| !m.is_removed())?;
                Some(SortedEntry {
                    name: module.name.clone(),
                    compiled_path: module.compiled_path.clone()?,
                    version: module.version,
                })
            })
            .collect()
    }

    /// Repairs every module after deserialization.
    pub(crate) fn sanitize(&mut self) {
        for module in self.modules.values_mut() {
            module.sanitize();
        }
    }
}

impl IntoIterator for Registry {
    type Item = Module;
    type IntoIter = std::collections::btree_map::IntoValues<String, Module>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.into_values()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Module;
    type IntoIter = std::collections::btree_map::Values<'a, String, Module>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.values()
    }
}
