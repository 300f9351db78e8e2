//! The manifest store: per-content-type registries, reconciliation, persistence.
//!
//! A build pass scans every configured root, primes each declared module
//! against the previous registry, then reconciles: entries whose names were
//! not seen are tombstoned (versioning) or purged with their artifacts (no
//! versioning). Finally every registry is resolved into a sorted load order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;

use paste_common::{ContentHash, ContentType};
use paste_config::Env;
use tracing::{debug, error, info, warn};
use xxhash_rust::xxh3::Xxh3;

use crate::context::BuildContext;
use crate::error::{LoadError, ManifestError};
use crate::module::{Module, Version};
use crate::primer::{remove_artifact, BuildFailure, PrimeOutcome, Primer};
use crate::registry::{Registry, Resolved, SortedEntry};
use crate::scan::scan_root;
use crate::store::{self, StoredManifest};

static EMPTY_REGISTRY: Registry = Registry::new();

/// Every module of every content type, plus the sorted load orders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    registries: BTreeMap<ContentType, Registry>,
    sorted: BTreeMap<ContentType, Vec<SortedEntry>>,
}

/// A borrowed view of one content type's part of the manifest.
#[derive(Clone, Copy, Debug)]
pub struct ContentTypeManifest<'a> {
    /// The content type viewed.
    pub content_type: ContentType,
    /// Its modules.
    pub registry: &'a Registry,
    /// Its load order.
    pub sorted: &'a [SortedEntry],
}

impl<'a> ContentTypeManifest<'a> {
    /// Finds a module, optionally at an archived version.
    pub fn lookup(&self, name: &str, version: Option<Version>) -> Option<Resolved<'a>> {
        self.registry.lookup(name, version)
    }

    /// What a page needs to load `name`: its dependencies and the module
    /// itself, in load order.
    pub fn load_order_for(&self, name: &str) -> Vec<&'a SortedEntry> {
        let Some(module) = self.registry.get(name) else {
            return Vec::new();
        };
        self.sorted
            .iter()
            .filter(|entry| entry.name == name || module.dependencies.contains(&entry.name))
            .collect()
    }
}

/// What a build pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Modules compiled (or taken from source in compile mode).
    pub primed: usize,
    /// Modules whose previous artifact was reused.
    pub reused: usize,
    /// Sources without a module declaration.
    pub skipped: Vec<PathBuf>,
    /// Sources that could not be primed.
    pub failed: Vec<BuildFailure>,
    /// Modules tombstoned in this pass.
    pub tombstoned: Vec<(ContentType, String)>,
    /// Modules purged in this pass, artifacts included.
    pub purged: Vec<(ContentType, String)>,
}

impl BuildReport {
    /// Returns `true` if no source failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} primed, {} reused, {} skipped, {} failed, {} tombstoned, {} purged",
            self.primed,
            self.reused,
            self.skipped.len(),
            self.failed.len(),
            self.tombstoned.len(),
            self.purged.len()
        )
    }
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a full scan and decision pass, then reconciles and sorts.
    ///
    /// Per-module problems never abort the pass; they are logged and
    /// collected in the returned report.
    pub fn build(&mut self, ctx: &BuildContext<'_>) -> BuildReport {
        let env = ctx.env;
        let mut report = BuildReport::default();
        let previous = std::mem::take(&mut self.registries);
        let mut seen: BTreeMap<ContentType, BTreeSet<String>> = BTreeMap::new();
        let mut superseded: Vec<Module> = Vec::new();

        for (content_type, root) in &env.content_type_paths {
            let content_type = *content_type;
            let primer = Primer::for_content_type(content_type);
            let existing = previous.get(&content_type).unwrap_or(&EMPTY_REGISTRY);
            let seen = seen.entry(content_type).or_default();
            let registry = self.registries.entry(content_type).or_default();

            let scan = scan_root(env, content_type, root);
            for (path, e) in scan.unreadable {
                report.failed.push(BuildFailure {
                    content_type,
                    name: None,
                    source_path: env.relative(&path),
                    reason: e.to_string(),
                });
            }

            for file in &scan.files {
                let (declaration, prepared) = primer.declare(&file.contents);
                if let Some(name) = &declaration.name {
                    if seen.contains(name) {
                        warn!(
                            name = %name,
                            source = %file.source_path.display(),
                            "duplicate module name, keeping the first declaration"
                        );
                        report.failed.push(BuildFailure {
                            content_type,
                            name: Some(name.clone()),
                            source_path: file.source_path.clone(),
                            reason: format!("module name '{name}' is already declared"),
                        });
                        continue;
                    }
                }

                match primer.prime_declared(ctx, file, &declaration, &prepared, existing) {
                    PrimeOutcome::Primed(module) => {
                        report.primed += 1;
                        if !env.versioning {
                            if let Some(prev) = existing.get(&module.name) {
                                if prev.compiled_path != module.compiled_path {
                                    superseded.push(prev.clone());
                                }
                            }
                        }
                        seen.insert(module.name.clone());
                        registry.insert(module);
                    }
                    PrimeOutcome::Reused(module) => {
                        report.reused += 1;
                        seen.insert(module.name.clone());
                        registry.insert(module);
                    }
                    PrimeOutcome::Skipped { source_path } => report.skipped.push(source_path),
                    PrimeOutcome::Failed(failure) => {
                        // The previous entry keeps serving its last good artifact.
                        if let Some(name) = &failure.name {
                            seen.insert(name.clone());
                            if let Some(prev) = existing.get(name) {
                                registry.insert(prev.clone());
                            }
                        }
                        report.failed.push(failure);
                    }
                }
            }
        }

        for (content_type, old) in previous {
            let seen = seen.get(&content_type);
            for module in old {
                if seen.is_some_and(|names| names.contains(&module.name)) {
                    continue;
                }
                if let Some(purged) = self.clean_unprimed(env, content_type, module, &mut report) {
                    superseded.push(purged);
                }
            }
        }

        self.remove_unused_artifacts(env, superseded);
        self.sort_all();
        info!(%report, "build pass complete");
        report
    }

    /// Tombstones a module whose source vanished; without versioning, purges it.
    ///
    /// Returns the purged module, whose artifact is still on disk.
    fn clean_unprimed(
        &mut self,
        env: &Env,
        content_type: ContentType,
        mut module: Module,
        report: &mut BuildReport,
    ) -> Option<Module> {
        let was_live = !module.is_removed();
        module.remove();
        if env.versioning {
            if was_live {
                info!(name = %module.name, version = %module.version, "source removed, module tombstoned");
                report.tombstoned.push((content_type, module.name.clone()));
            }
            self.registries.entry(content_type).or_default().insert(module);
            None
        } else {
            info!(name = %module.name, "source removed, module purged");
            report.purged.push((content_type, module.name.clone()));
            Some(module)
        }
    }

    /// Deletes the artifacts of superseded and purged modules.
    ///
    /// Artifact names carry no module name, so a path can pass from one
    /// module to another within a pass; paths still held by any entry stay.
    fn remove_unused_artifacts(&self, env: &Env, stale: Vec<Module>) {
        if stale.is_empty() {
            return;
        }
        let in_use: BTreeSet<PathBuf> = self
            .registries
            .values()
            .flat_map(Registry::iter)
            .filter_map(|module| module.abs_compiled_path(env))
            .collect();
        for module in &stale {
            match module.abs_compiled_path(env) {
                Some(path) if in_use.contains(&path) => {
                    debug!(name = %module.name, path = %path.display(), "artifact still in use, keeping");
                }
                _ => {
                    remove_artifact(env, module);
                }
            }
        }
    }

    /// Recomputes the load order of every content type.
    pub fn sort_all(&mut self) {
        self.sorted = self
            .registries
            .iter_mut()
            .map(|(content_type, registry)| (*content_type, registry.resolve()))
            .collect();
    }

    /// A borrowed view of one content type. Unknown content types are empty.
    pub fn content_type(&self, content_type: ContentType) -> ContentTypeManifest<'_> {
        ContentTypeManifest {
            content_type,
            registry: self.registry(content_type).unwrap_or(&EMPTY_REGISTRY),
            sorted: self.sorted(content_type),
        }
    }

    /// The registry of one content type, if any module of it was ever built.
    pub fn registry(&self, content_type: ContentType) -> Option<&Registry> {
        self.registries.get(&content_type)
    }

    /// The load order of one content type.
    pub fn sorted(&self, content_type: ContentType) -> &[SortedEntry] {
        self.sorted.get(&content_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// All registries by content type.
    pub fn registries(&self) -> impl Iterator<Item = (ContentType, &Registry)> {
        self.registries.iter().map(|(ct, registry)| (*ct, registry))
    }

    /// Total number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.registries.values().map(Registry::len).sum()
    }

    /// Returns `true` if no content type has any entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identity of the manifest contents: equal manifests have equal fingerprints.
    pub fn fingerprint(&self) -> ContentHash {
        let mut hasher = Xxh3::new();
        self.registries.hash(&mut hasher);
        self.sorted.hash(&mut hasher);
        ContentHash::from_u128(hasher.digest128())
    }

    /// Reads the persisted manifest. Compile mode never reads it.
    pub fn load(env: &Env) -> Result<Self, LoadError> {
        if env.compile_mode {
            return Err(LoadError::CompileMode);
        }
        let stored = store::read(&env.manifest_path())?;
        Ok(Self {
            registries: stored.registries,
            sorted: stored.sorted,
        })
    }

    /// Reads the persisted manifest, or starts empty if there is none or it is unusable.
    pub fn load_or_default(env: &Env) -> Self {
        match Self::load(env) {
            Ok(manifest) => {
                debug!(path = %env.manifest_path().display(), modules = manifest.len(), "loaded manifest");
                manifest
            }
            Err(e) if e.is_absent() => {
                debug!(reason = %e, "no persisted manifest");
                Self::new()
            }
            Err(e) => {
                error!(error = %e, "error loading manifest, starting from scratch");
                Self::new()
            }
        }
    }

    /// Serving entry point: the persisted manifest as-is, or a freshly built
    /// one when nothing usable is persisted.
    pub fn load_or_build(ctx: &BuildContext<'_>) -> Self {
        match Self::load(ctx.env) {
            Ok(manifest) => manifest,
            Err(e) => {
                if e.is_absent() {
                    debug!(reason = %e, "building manifest from scratch");
                } else {
                    error!(error = %e, "error loading manifest, building from scratch");
                }
                let mut manifest = Self::new();
                manifest.build(ctx);
                manifest
            }
        }
    }

    /// Persists the manifest to its derived location.
    pub fn save(&self, env: &Env) -> Result<(), ManifestError> {
        let path = env.manifest_path();
        let stored = StoredManifest {
            registries: self.registries.clone(),
            sorted: self.sorted.clone(),
        };
        store::write(&path, &stored)?;
        debug!(path = %path.display(), modules = self.len(), "saved manifest");
        Ok(())
    }
}
