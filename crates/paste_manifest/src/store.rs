//! Binary persistence of the manifest.
//!
//! The blob is a 4-byte little-endian header length, a bincode-encoded
//! [`ManifestHeader`], and a bincode-encoded payload. The header carries
//! magic bytes, the format version, and a checksum of the payload so that a
//! truncated, foreign, or stale file is rejected before decoding.

use std::collections::BTreeMap;
use std::path::Path;

use paste_common::{ContentHash, ContentType};
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, ManifestError};
use crate::registry::{Registry, SortedEntry};

/// Magic bytes identifying a persisted manifest.
const MANIFEST_MAGIC: [u8; 4] = *b"PSTE";

/// Current manifest format version. Increment on breaking changes to the
/// header or any persisted type.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Header prepended to every persisted manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestHeader {
    /// Magic bytes: must be `b"PSTE"`.
    pub magic: [u8; 4],
    /// Manifest format version.
    pub format_version: u32,
    /// Content hash of the payload.
    pub checksum: ContentHash,
}

/// The persisted body of a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoredManifest {
    pub registries: BTreeMap<ContentType, Registry>,
    pub sorted: BTreeMap<ContentType, Vec<SortedEntry>>,
}

/// Encodes a manifest body into a complete blob.
pub(crate) fn encode(manifest: &StoredManifest) -> Result<Vec<u8>, ManifestError> {
    let payload = bincode::serde::encode_to_vec(manifest, bincode::config::standard())
        .map_err(|e| ManifestError::Serialization {
            reason: e.to_string(),
        })?;

    let header = ManifestHeader {
        magic: MANIFEST_MAGIC,
        format_version: MANIFEST_FORMAT_VERSION,
        checksum: ContentHash::from_bytes(&payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| ManifestError::Serialization {
            reason: e.to_string(),
        })?;

    // 4-byte header length (little-endian) + header + payload
    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

/// Validates and decodes a blob read from `path`.
pub(crate) fn decode(path: &Path, raw: &[u8]) -> Result<StoredManifest, LoadError> {
    let invalid = |reason: &str| LoadError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let Some((len_bytes, rest)) = raw.split_first_chunk::<4>() else {
        return Err(invalid("file shorter than the header length prefix"));
    };
    let header_len = u32::from_le_bytes(*len_bytes) as usize;
    if rest.len() < header_len {
        return Err(invalid("truncated header"));
    }
    let (header_bytes, payload) = rest.split_at(header_len);

    let header: ManifestHeader =
        bincode::serde::decode_from_slice(header_bytes, bincode::config::standard())
            .map_err(|e| invalid(&e.to_string()))?
            .0;

    if header.magic != MANIFEST_MAGIC {
        return Err(invalid("missing magic bytes"));
    }
    if header.format_version != MANIFEST_FORMAT_VERSION {
        return Err(LoadError::VersionMismatch {
            path: path.to_path_buf(),
            expected: MANIFEST_FORMAT_VERSION,
            actual: header.format_version,
        });
    }

    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(LoadError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }

    let mut manifest: StoredManifest =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| LoadError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .0;
    for registry in manifest.registries.values_mut() {
        registry.sanitize();
    }
    Ok(manifest)
}

/// Reads and decodes the blob at `path`.
pub(crate) fn read(path: &Path) -> Result<StoredManifest, LoadError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(LoadError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    decode(path, &raw)
}

/// Encodes and writes the blob to `path`, creating parent directories.
pub(crate) fn write(path: &Path, manifest: &StoredManifest) -> Result<(), ManifestError> {
    let blob = encode(manifest)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ManifestError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, blob).map_err(|e| ManifestError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Module, Version};
    use std::path::PathBuf;

    fn sample() -> StoredManifest {
        let mut old = Module::new(
            "static/js/app.js",
            ContentHash::from_bytes(b"v1"),
            "app",
            ["lib".to_string(), "core".to_string()],
        );
        old.set_compiled(
            ContentHash::from_bytes(b"out1"),
            4,
            PathBuf::from("static/js/_build/app.a.v1.0.min.js"),
        );
        let mut module = old.clone();
        module.source_checksum = ContentHash::from_bytes(b"v2");
        module.bump_version(&old);
        module.last_modified = Some(1_700_000_000);

        let mut registry = Registry::new();
        registry.insert(module.clone());
        let mut stored = StoredManifest::default();
        stored.sorted.insert(
            ContentType::JavaScript,
            vec![SortedEntry {
                name: "app".to_string(),
                compiled_path: module.compiled_path.clone().unwrap(),
                version: module.version,
            }],
        );
        stored.registries.insert(ContentType::JavaScript, registry);
        stored
    }

    #[test]
    fn roundtrip_preserves_every_field() {
        let stored = sample();
        let blob = encode(&stored).unwrap();
        let decoded = decode(Path::new("m"), &blob).unwrap();
        assert_eq!(decoded.registries, stored.registries);
        assert_eq!(decoded.sorted, stored.sorted);

        let app = decoded.registries[&ContentType::JavaScript].get("app").unwrap();
        assert_eq!(
            app.dependencies.iter().collect::<Vec<_>>(),
            vec!["core", "lib"]
        );
        assert_eq!(app.version, Version::new(2).unwrap());
        assert_eq!(app.version_history.len(), 1);
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/_build.manifest");
        write(&path, &sample()).unwrap();
        let read_back = read(&path).unwrap();
        assert_eq!(read_back.registries, sample().registries);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read(&dir.path().join("none.manifest")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
        assert!(err.is_absent());
    }

    #[test]
    fn short_file_is_invalid() {
        let err = decode(Path::new("m"), &[1, 0]).unwrap_err();
        assert!(matches!(err, LoadError::InvalidHeader { .. }));

        let err = decode(Path::new("m"), &[200, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, LoadError::InvalidHeader { .. }));
    }

    #[test]
    fn foreign_magic_is_invalid() {
        let mut blob = encode(&sample()).unwrap();
        // The magic bytes follow the length prefix directly.
        blob[4] = b'X';
        let err = decode(Path::new("m"), &blob).unwrap_err();
        assert!(matches!(err, LoadError::InvalidHeader { .. }));
    }

    #[test]
    fn other_format_version_is_rejected() {
        let payload = bincode::serde::encode_to_vec(&sample(), bincode::config::standard()).unwrap();
        let header = ManifestHeader {
            magic: MANIFEST_MAGIC,
            format_version: MANIFEST_FORMAT_VERSION + 1,
            checksum: ContentHash::from_bytes(&payload),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let mut blob = (header_bytes.len() as u32).to_le_bytes().to_vec();
        blob.extend_from_slice(&header_bytes);
        blob.extend_from_slice(&payload);

        let err = decode(Path::new("m"), &blob).unwrap_err();
        assert!(matches!(
            err,
            LoadError::VersionMismatch { expected: 1, actual: 2, .. }
        ));
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut blob = encode(&sample()).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        let err = decode(Path::new("m"), &blob).unwrap_err();
        assert!(matches!(err, LoadError::ChecksumMismatch { .. }));
    }

    #[test]
    fn zero_version_is_sanitized_on_load() {
        let mut stored = sample();
        let registry = stored.registries.get_mut(&ContentType::JavaScript).unwrap();
        let app = registry.get_mut("app").unwrap();
        // Serde bypasses `Version::new`, so a zero can only come from disk.
        app.version = bincode::serde::decode_from_slice(&[0u8], bincode::config::standard())
            .unwrap()
            .0;
        let blob = encode(&stored).unwrap();
        let decoded = decode(Path::new("m"), &blob).unwrap();
        let app = decoded.registries[&ContentType::JavaScript].get("app").unwrap();
        assert_eq!(app.version, Version::DEFAULT);
    }
}
