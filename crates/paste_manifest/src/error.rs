//! Error types for manifest building, compression, and persistence.

use std::path::PathBuf;

/// Errors raised by manifest operations that the caller must handle.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// An I/O error occurred while reading or writing a file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest could not be encoded.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

/// Reasons a persisted manifest could not be loaded.
///
/// Every variant is recoverable: the caller logs it and rebuilds the
/// manifest from a full scan.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Compile mode never reads a persisted manifest.
    #[error("manifest loading is disabled in compile mode")]
    CompileMode,

    /// No manifest has been persisted yet.
    #[error("no manifest at {path}")]
    NotFound {
        /// Where the manifest was expected.
        path: PathBuf,
    },

    /// The manifest file exists but could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Io {
        /// The manifest path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The blob has a truncated, unreadable, or foreign header.
    #[error("invalid manifest header in {path}: {reason}")]
    InvalidHeader {
        /// The manifest path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The blob was written by an incompatible format version.
    #[error("manifest format version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The manifest path.
        path: PathBuf,
        /// The format version this build understands.
        expected: u32,
        /// The format version found in the file.
        actual: u32,
    },

    /// The payload does not match the checksum recorded in the header.
    #[error("manifest checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The manifest path.
        path: PathBuf,
        /// The checksum from the header.
        expected: String,
        /// The checksum of the payload on disk.
        actual: String,
    },

    /// The payload could not be decoded.
    #[error("failed to parse manifest {path}: {reason}")]
    Parse {
        /// The manifest path.
        path: PathBuf,
        /// Description of the decode failure.
        reason: String,
    },
}

impl LoadError {
    /// Returns `true` for the expected "nothing to load" cases, which are not
    /// worth an error-level log line.
    pub fn is_absent(&self) -> bool {
        matches!(self, LoadError::CompileMode | LoadError::NotFound { .. })
    }
}

/// Failures of the external compressor capability.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// No compressor command is configured for the content type.
    #[error("no compressor configured for {content_type}")]
    NotConfigured {
        /// The content type lacking a compressor.
        content_type: paste_common::ContentType,
    },

    /// The compressor process could not be started or driven.
    #[error("failed to run compressor '{program}': {source}")]
    Spawn {
        /// The program that failed to run.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The compressor exited unsuccessfully.
    #[error("compressor '{program}' exited with {status}: {stderr}")]
    Failed {
        /// The program that failed.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The compressor produced no output.
    #[error("compressor produced empty output")]
    EmptyOutput,
}
