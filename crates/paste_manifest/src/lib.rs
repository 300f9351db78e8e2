//! Manifest and incremental build engine for the paste asset pipeline.
//!
//! Discovers JavaScript, SCSS, and CSS source modules, extracts their
//! declared names and dependencies, decides per module whether a prior
//! compiled artifact can be reused or must be rebuilt (bumping its version
//! when the compiled output changes), resolves a deterministic load order
//! with transitively closed dependency sets, and persists the whole manifest
//! so the next build is incremental.

#![warn(missing_docs)]

pub mod compressor;
pub mod context;
pub mod declaration;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod module;
pub mod primer;
pub mod registry;
pub mod scan;
pub mod store;

pub use compressor::{CommandCompressor, CompressRequest, Compressor};
pub use context::BuildContext;
pub use declaration::{CompilationLevel, Declaration};
pub use error::{CompileError, LoadError, ManifestError};
pub use graph::{DependencyGraph, TopoOrder};
pub use manifest::{BuildReport, ContentTypeManifest, Manifest};
pub use module::{Module, ModuleSnapshot, Version};
pub use primer::{BuildFailure, PrimeOutcome, Primer};
pub use registry::{Registry, Resolved, SortedEntry};
pub use scan::{ScanResult, SourceFile};
