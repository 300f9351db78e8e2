//! Source discovery: walking content-type roots and reading module sources.

use std::path::{Path, PathBuf};

use paste_common::{ContentHash, ContentType};
use paste_config::Env;
use tracing::{debug, warn};

/// A source file found under a content-type root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Source path relative to the app root.
    pub source_path: PathBuf,
    /// The source text. Invalid UTF-8 is replaced, the checksum is not affected.
    pub contents: String,
    /// Hash of the raw source bytes.
    pub checksum: ContentHash,
}

impl SourceFile {
    /// Builds a source record from raw bytes.
    pub fn from_bytes(source_path: impl Into<PathBuf>, bytes: &[u8]) -> Self {
        Self {
            source_path: source_path.into(),
            contents: String::from_utf8_lossy(bytes).into_owned(),
            checksum: ContentHash::from_bytes(bytes),
        }
    }
}

/// The outcome of scanning one root.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Readable sources, sorted by path.
    pub files: Vec<SourceFile>,
    /// Files or directories that could not be read.
    pub unreadable: Vec<(PathBuf, std::io::Error)>,
}

/// Recursively collects sources of `content_type` under `root`.
///
/// Directories named in the environment's exclusion list (which always
/// includes the build prefix) are skipped. A missing root yields an empty
/// result.
pub fn scan_root(env: &Env, content_type: ContentType, root: &Path) -> ScanResult {
    let mut result = ScanResult::default();
    if !root.is_dir() {
        warn!(root = %root.display(), %content_type, "source root is not a directory");
        return result;
    }

    let mut paths = Vec::new();
    walk_dir(env, root, content_type.extension(), &mut paths, &mut result.unreadable);
    paths.sort();

    for path in paths {
        match std::fs::read(&path) {
            Ok(bytes) => result.files.push(SourceFile::from_bytes(env.relative(&path), &bytes)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "error reading source file");
                result.unreadable.push((path, e));
            }
        }
    }
    debug!(
        root = %root.display(),
        %content_type,
        files = result.files.len(),
        "scanned source root"
    );
    result
}

/// Recursively walks a directory collecting files with the given extension.
///
/// Symlinked files are collected; symlinked directories are not descended into.
fn walk_dir(
    env: &Env,
    dir: &Path,
    extension: &str,
    files: &mut Vec<PathBuf>,
    unreadable: &mut Vec<(PathBuf, std::io::Error)>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "error listing directory");
            unreadable.push((dir.to_path_buf(), e));
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        // Linked directories are never followed.
        if file_type.is_symlink() && path.is_dir() {
            debug!(dir = %path.display(), "skipping symlinked directory");
            continue;
        }
        if file_type.is_dir() {
            let excluded = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| env.is_excluded_dir(name));
            if !excluded {
                walk_dir(env, &path, extension, files, unreadable);
            }
        } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn collects_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let env = Env::new(dir.path());
        write(dir.path(), "js/b.js", "b");
        write(dir.path(), "js/a.js", "a");
        write(dir.path(), "js/nested/c.js", "c");
        write(dir.path(), "js/style.css", "x");

        let result = scan_root(&env, ContentType::JavaScript, &dir.path().join("js"));
        let paths: Vec<_> = result.files.iter().map(|f| f.source_path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("js/a.js"),
                PathBuf::from("js/b.js"),
                PathBuf::from("js/nested/c.js"),
            ]
        );
        assert!(result.unreadable.is_empty());
    }

    #[test]
    fn skips_build_prefix_and_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = Env::new(dir.path());
        env.excluded_dirs.push("node_modules".to_string());
        write(dir.path(), "js/app.js", "app");
        write(dir.path(), "js/_build/app.abc.v1.0.min.js", "min");
        write(dir.path(), "js/node_modules/dep.js", "dep");

        let result = scan_root(&env, ContentType::JavaScript, &dir.path().join("js"));
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].source_path, PathBuf::from("js/app.js"));
    }

    #[test]
    fn checksum_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let env = Env::new(dir.path());
        write(dir.path(), "css/a.css", ".a{}");
        let first = scan_root(&env, ContentType::Css, &dir.path().join("css"));
        write(dir.path(), "css/a.css", ".a{color:red}");
        let second = scan_root(&env, ContentType::Css, &dir.path().join("css"));
        assert_ne!(first.files[0].checksum, second.files[0].checksum);
        assert_eq!(second.files[0].contents, ".a{color:red}");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_loop_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let env = Env::new(dir.path());
        write(dir.path(), "js/a.js", "a");
        write(dir.path(), "shared/b.js", "b");
        std::os::unix::fs::symlink(dir.path().join("js"), dir.path().join("js/loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("shared/b.js"), dir.path().join("js/b.js")).unwrap();

        let result = scan_root(&env, ContentType::JavaScript, &dir.path().join("js"));
        let paths: Vec<_> = result.files.iter().map(|f| f.source_path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("js/a.js"), PathBuf::from("js/b.js")]);
        assert!(result.unreadable.is_empty());
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let env = Env::new(dir.path());
        let result = scan_root(&env, ContentType::Scss, &dir.path().join("nope"));
        assert!(result.files.is_empty());
        assert!(result.unreadable.is_empty());
    }
}
