//! The versioned, content-addressed record of one source asset.
//!
//! A [`Module`] is created from a scanned source file, named by its
//! declaration, primed (compiled or reused), and carried across builds in the
//! persisted manifest. When its compiled output changes under versioning it
//! archives a [`ModuleSnapshot`] of the previous state; when its source
//! disappears it becomes a tombstone.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::UNIX_EPOCH;

use paste_common::{ContentHash, ContentType};
use paste_config::Env;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Matches the version segment of a compiled artifact file name.
static ARTIFACT_VERSION_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.v(?P<version>[^.]+(?:\.[^.]+)?)\.min\.[A-Za-z0-9]+$")
        .expect("valid artifact version regex")
});

/// A module version. Starts at 1 and only ever grows by one.
///
/// Displayed as `<n>.0`, the form used in compiled artifact names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u32);

impl Version {
    /// The version every new module starts at.
    pub const DEFAULT: Version = Version(1);

    /// Creates a version, rejecting zero.
    pub fn new(value: u32) -> Option<Self> {
        (value >= 1).then_some(Self(value))
    }

    /// The numeric value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// The version after this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Parses `"2"` or `"2.0"`. Fractional parts other than zero are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let (major, fraction) = match s.split_once('.') {
            Some((major, fraction)) => (major, Some(fraction)),
            None => (s, None),
        };
        if let Some(fraction) = fraction {
            if fraction.is_empty() || !fraction.bytes().all(|b| b == b'0') {
                return None;
            }
        }
        major.parse().ok().and_then(Self::new)
    }

    /// Replaces an invalid stored version with [`Version::DEFAULT`], logging a warning.
    pub fn sanitized(self, source: &Path) -> Self {
        if self.0 == 0 {
            warn!(source = %source.display(), "bad version 0.0 in manifest, using 1.0");
            Self::DEFAULT
        } else {
            self
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.0", self.0)
    }
}

/// An archived state of a module, recorded when its version is bumped.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    /// Source path relative to the app root.
    pub source_path: PathBuf,
    /// Hash of the source text at the time.
    pub source_checksum: ContentHash,
    /// Logical module name.
    pub name: String,
    /// Dependency names, sorted.
    pub dependencies: BTreeSet<String>,
    /// Modification time of the compiled artifact, in Unix seconds.
    pub last_modified: Option<u64>,
    /// Hash of the compiled artifact.
    pub compiled_checksum: Option<ContentHash>,
    /// Location of the compiled artifact.
    pub compiled_path: Option<PathBuf>,
    /// Size of the compiled artifact in bytes.
    pub byte_size: Option<u64>,
    /// The version this snapshot was taken at.
    pub version: Version,
    /// Version at which the module was removed, if it had been.
    pub version_removed: Option<Version>,
}

/// One source asset and its compiled counterpart, tracked across builds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Module {
    /// Source path relative to the app root.
    pub source_path: PathBuf,
    /// Hash of the source text.
    pub source_checksum: ContentHash,
    /// Logical module name, unique within its content type.
    pub name: String,
    /// Dependency names. Transitively closed once the manifest is resolved.
    pub dependencies: BTreeSet<String>,
    /// Modification time of the compiled artifact, in Unix seconds.
    pub last_modified: Option<u64>,
    /// Hash of the compiled artifact.
    pub compiled_checksum: Option<ContentHash>,
    /// Location of the compiled artifact, relative to the app root when it lies within it.
    pub compiled_path: Option<PathBuf>,
    /// Size of the compiled artifact in bytes.
    pub byte_size: Option<u64>,
    /// Current version.
    pub version: Version,
    /// Prior snapshots, oldest first.
    pub version_history: Vec<ModuleSnapshot>,
    /// Set once the source disappeared: the version the module was removed at.
    pub version_removed: Option<Version>,
}

impl Module {
    /// Creates an unprimed module at the default version.
    ///
    /// A dependency on the module's own name is dropped.
    pub fn new(
        source_path: impl Into<PathBuf>,
        source_checksum: ContentHash,
        name: impl Into<String>,
        dependencies: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut module = Self {
            source_path: source_path.into(),
            source_checksum,
            name: name.into(),
            dependencies: BTreeSet::new(),
            last_modified: None,
            compiled_checksum: None,
            compiled_path: None,
            byte_size: None,
            version: Version::DEFAULT,
            version_history: Vec::new(),
            version_removed: None,
        };
        module.set_dependencies(dependencies);
        module
    }

    /// Replaces the dependency set, dropping any self-reference.
    pub fn set_dependencies(&mut self, dependencies: impl IntoIterator<Item = String>) {
        self.dependencies = dependencies
            .into_iter()
            .filter(|dep| *dep != self.name)
            .collect();
    }

    /// The content type implied by the source file extension.
    pub fn content_type(&self) -> Option<ContentType> {
        ContentType::from_path(&self.source_path)
    }

    /// Returns `true` once the module has been tombstoned.
    pub fn is_removed(&self) -> bool {
        self.version_removed.is_some()
    }

    /// Returns `true` if the module is live and has a compiled artifact.
    pub fn is_primed(&self) -> bool {
        self.compiled_path.is_some() && !self.is_removed()
    }

    /// Absolute location of the compiled artifact.
    pub fn abs_compiled_path(&self, env: &Env) -> Option<PathBuf> {
        self.compiled_path.as_deref().map(|p| env.absolute(p))
    }

    /// Returns `true` if the compiled artifact is this module's own source file.
    ///
    /// This is the case for modules primed in compile mode; such artifacts must
    /// never be deleted.
    pub fn serves_source(&self) -> bool {
        self.compiled_path.as_deref() == Some(self.source_path.as_path())
    }

    /// Copies version, history, and timestamps forward from an unchanged predecessor.
    ///
    /// The module is live again afterwards, even if the predecessor was a tombstone.
    pub fn coalesce(&mut self, existing: &Module) {
        self.version = existing.version;
        self.version_history = existing.version_history.clone();
        self.last_modified = existing.last_modified;
        self.version_removed = None;
    }

    /// Reuses the predecessor's compiled artifact reference verbatim.
    pub fn adopt_artifact(&mut self, existing: &Module) {
        self.compiled_path = existing.compiled_path.clone();
        self.compiled_checksum = existing.compiled_checksum;
        self.byte_size = existing.byte_size;
    }

    /// Increments the version and archives the predecessor's full state.
    pub fn bump_version(&mut self, existing: &Module) {
        self.version = self.version.next();
        self.version_history.push(existing.snapshot());
    }

    /// Marks the module as removed at its current version. Idempotent.
    pub fn remove(&mut self) {
        if self.version_removed.is_none() {
            self.version_removed = Some(self.version);
        }
    }

    /// The archived form of the current state.
    pub fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot {
            source_path: self.source_path.clone(),
            source_checksum: self.source_checksum,
            name: self.name.clone(),
            dependencies: self.dependencies.clone(),
            last_modified: self.last_modified,
            compiled_checksum: self.compiled_checksum,
            compiled_path: self.compiled_path.clone(),
            byte_size: self.byte_size,
            version: self.version,
            version_removed: self.version_removed,
        }
    }

    /// Records compiled content that lives at an explicit location.
    pub fn set_compiled(&mut self, checksum: ContentHash, byte_size: u64, path: PathBuf) {
        self.compiled_checksum = Some(checksum);
        self.byte_size = Some(byte_size);
        self.compiled_path = Some(path);
    }

    /// File name of the compiled artifact for the given compiled checksum.
    ///
    /// `app.js` at version 2 becomes `app.<checksum>.v2.0.min.js`.
    pub fn artifact_file_name(&self, checksum: &ContentHash) -> Option<String> {
        let content_type = self.content_type()?;
        let stem = self.source_path.file_stem()?.to_str()?;
        Some(format!(
            "{stem}.{checksum}.v{}.min.{}",
            self.version,
            content_type.extension()
        ))
    }

    /// Absolute location of the compiled artifact for the given compiled checksum:
    /// `<output root>/<source dir>/<build prefix>/<artifact file name>`.
    pub fn artifact_path(&self, env: &Env, checksum: &ContentHash) -> Option<PathBuf> {
        let file_name = self.artifact_file_name(checksum)?;
        let source_dir = self.source_path.parent().unwrap_or_else(|| Path::new(""));
        Some(
            env.output_root()
                .join(source_dir)
                .join(&env.build_prefix)
                .join(file_name),
        )
    }

    /// Recovers the version encoded in the compiled artifact name.
    ///
    /// Returns `None` when there is no artifact or the name carries no version
    /// segment. A malformed segment is logged and also yields `None`.
    pub fn version_from_path(&self) -> Option<Version> {
        let path = self.compiled_path.as_deref()?;
        let file_name = path.file_name()?.to_str()?;
        let captures = ARTIFACT_VERSION_EXPR.captures(file_name)?;
        let raw = &captures["version"];
        let version = Version::parse(raw);
        if version.is_none() {
            warn!(
                path = %path.display(),
                value = raw,
                "attempting to use a bad version from artifact name"
            );
        }
        version
    }

    /// Reads the modification time of the compiled artifact.
    pub fn refresh_last_modified(&mut self, env: &Env) {
        self.last_modified = self
            .abs_compiled_path(env)
            .and_then(|path| std::fs::metadata(path).ok())
            .and_then(|meta| meta.modified().ok())
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_secs());
    }

    /// Repairs fields that cannot be trusted after deserialization.
    pub(crate) fn sanitize(&mut self) {
        self.version = self.version.sanitized(&self.source_path);
        let name = self.name.clone();
        self.dependencies.retain(|dep| *dep != name);
    }
}
