//! Configuration types deserialized from `paste.toml`.

use paste_common::ContentType;
use serde::Deserialize;
use std::collections::BTreeMap;

/// The top-level configuration parsed from `paste.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct PasteConfig {
    /// Pipeline-wide settings.
    #[serde(default)]
    pub paste: PasteSection,
    /// Source roots to scan, one entry per (content type, directory) pair.
    #[serde(default)]
    pub paths: Vec<ContentTypePath>,
    /// External compressor commands, keyed by content type name.
    #[serde(default)]
    pub compressors: BTreeMap<String, CompressorConfig>,
    /// Log filter settings for the CLI.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings in the `[paste]` table.
#[derive(Debug, Deserialize)]
pub struct PasteSection {
    /// Application root all relative paths resolve against, relative to the config file.
    #[serde(default = "default_app_root")]
    pub app_root: String,
    /// Subdirectory for compiled artifacts and the manifest blob name.
    #[serde(default = "default_build_prefix")]
    pub build_prefix: String,
    /// Optional override root for compiled output and the manifest blob.
    #[serde(default)]
    pub build_area: Option<String>,
    /// Serve raw sources: no minification, no version bookkeeping.
    #[serde(default)]
    pub compile_mode: bool,
    /// Retain superseded artifacts and tombstones for old URLs.
    #[serde(default = "default_true")]
    pub versioning: bool,
    /// Directory names skipped while scanning.
    #[serde(default)]
    pub excluded_dirs: Vec<String>,
    /// URI prefix the serving layer mounts compiled assets under.
    #[serde(default = "default_root_uri")]
    pub root_uri: String,
}

impl Default for PasteSection {
    fn default() -> Self {
        Self {
            app_root: default_app_root(),
            build_prefix: default_build_prefix(),
            build_area: None,
            compile_mode: false,
            versioning: true,
            excluded_dirs: Vec::new(),
            root_uri: default_root_uri(),
        }
    }
}

/// A single `[[paths]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentTypePath {
    /// The content type of the sources under `dir`.
    pub content_type: ContentType,
    /// Directory to scan, relative to the application root.
    pub dir: String,
}

/// An external compressor invocation for one content type.
///
/// `args` may contain the placeholders `{compilation_level}` and `{load_path}`.
/// An argument containing `{load_path}` is repeated once per source root.
#[derive(Debug, Clone, Deserialize)]
pub struct CompressorConfig {
    /// The program to execute.
    pub program: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Logging settings.
#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive string, used when `RUST_LOG` is unset.
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_app_root() -> String {
    ".".to_string()
}

fn default_build_prefix() -> String {
    "_build".to_string()
}

fn default_root_uri() -> String {
    "/paste/".to_string()
}

fn default_true() -> bool {
    true
}
