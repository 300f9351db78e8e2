//! The resolved, read-only pipeline environment.

use paste_common::ContentType;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File extension of the persisted manifest blob.
const MANIFEST_EXT: &str = "manifest";

/// An external compressor command with unexpanded placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressorCommand {
    /// The program to execute.
    pub program: String,
    /// Argument templates.
    pub args: Vec<String>,
}

/// The configuration every build pass reads, with all paths made absolute.
///
/// Constructed once by [`resolve_env`](crate::resolve_env) (or [`Env::new`] in
/// tests) and passed explicitly to every operation; it is never mutated
/// during a pass.
#[derive(Debug, Clone)]
pub struct Env {
    /// Base directory all relative module paths resolve against.
    pub app_root: PathBuf,
    /// Source roots to scan, in configuration order.
    pub content_type_paths: Vec<(ContentType, PathBuf)>,
    /// Serve raw sources: no minification, no versioning, no manifest reads.
    pub compile_mode: bool,
    /// Optional override root for compiled output and the manifest blob.
    pub build_area: Option<PathBuf>,
    /// Subdirectory for compiled artifacts and the manifest blob name.
    pub build_prefix: String,
    /// Retain superseded artifacts and tombstones.
    pub versioning: bool,
    /// Directory names skipped during scanning. Always contains `build_prefix`.
    pub excluded_dirs: Vec<String>,
    /// URI prefix of the serving layer.
    pub root_uri: String,
    /// Compressor commands per content type.
    pub compressors: BTreeMap<ContentType, CompressorCommand>,
    /// Log filter from the configuration file.
    pub log_filter: Option<String>,
}

impl Env {
    /// Creates an environment rooted at `app_root` with default settings:
    /// versioning on, compile mode off, `_build` prefix, no source roots.
    pub fn new(app_root: impl Into<PathBuf>) -> Self {
        let build_prefix = "_build".to_string();
        Self {
            app_root: app_root.into(),
            content_type_paths: Vec::new(),
            compile_mode: false,
            build_area: None,
            excluded_dirs: vec![build_prefix.clone()],
            build_prefix,
            versioning: true,
            root_uri: "/paste/".to_string(),
            compressors: BTreeMap::new(),
            log_filter: None,
        }
    }

    /// Registers a source root, resolving relative paths against the app root.
    pub fn with_path(mut self, content_type: ContentType, dir: impl AsRef<Path>) -> Self {
        let dir = self.app_root.join(dir);
        self.content_type_paths.push((content_type, dir));
        self
    }

    /// Root under which compiled artifacts and the manifest blob live.
    pub fn output_root(&self) -> &Path {
        self.build_area.as_deref().unwrap_or(&self.app_root)
    }

    /// Location of the persisted manifest blob.
    pub fn manifest_path(&self) -> PathBuf {
        self.output_root()
            .join(format!("{}.{MANIFEST_EXT}", self.build_prefix))
    }

    /// Every registered source root, used as include/load paths by stylesheet compilers.
    pub fn load_paths(&self) -> Vec<PathBuf> {
        self.content_type_paths
            .iter()
            .map(|(_, path)| path.clone())
            .collect()
    }

    /// Returns `true` if a directory with this name must not be scanned.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        name == self.build_prefix || self.excluded_dirs.iter().any(|d| d == name)
    }

    /// Absolute form of a path stored relative to the app root.
    ///
    /// Absolute inputs are returned unchanged.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        self.app_root.join(path)
    }

    /// Path relative to the app root, or the path itself when it lies outside.
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.app_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
