//! Environment resolution: turning a parsed configuration into an [`Env`].

use crate::env::{CompressorCommand, Env};
use crate::error::ConfigError;
use crate::types::PasteConfig;
use paste_common::ContentType;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Resolves a parsed configuration against the directory containing `paste.toml`.
///
/// The app root is resolved against `project_dir`; source roots and the build
/// area are resolved against the app root. The build prefix is always added to
/// the excluded directory names so compiled output is never rescanned.
pub fn resolve_env(config: &PasteConfig, project_dir: &Path) -> Result<Env, ConfigError> {
    let section = &config.paste;
    let app_root = normalize(&project_dir.join(&section.app_root));

    let content_type_paths = config
        .paths
        .iter()
        .map(|entry| (entry.content_type, normalize(&app_root.join(&entry.dir))))
        .collect();

    let build_area = section
        .build_area
        .as_ref()
        .map(|area| normalize(&app_root.join(area)));

    let mut excluded_dirs = section.excluded_dirs.clone();
    if !excluded_dirs.contains(&section.build_prefix) {
        excluded_dirs.push(section.build_prefix.clone());
    }

    let mut compressors = BTreeMap::new();
    for (key, compressor) in &config.compressors {
        let content_type: ContentType = key
            .parse()
            .map_err(|e: paste_common::ParseContentTypeError| {
                ConfigError::ValidationError(e.to_string())
            })?;
        compressors.insert(
            content_type,
            CompressorCommand {
                program: compressor.program.clone(),
                args: compressor.args.clone(),
            },
        );
    }

    Ok(Env {
        app_root,
        content_type_paths,
        compile_mode: section.compile_mode,
        build_area,
        build_prefix: section.build_prefix.clone(),
        versioning: section.versioning,
        excluded_dirs,
        root_uri: section.root_uri.clone(),
        compressors,
        log_filter: config.logging.filter.clone(),
    })
}

/// Lexically removes `.` components and folds `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn resolves_paths_against_app_root() {
        let toml = r#"
[paste]
app_root = "app"
build_area = "../out"

[[paths]]
content_type = "javascript"
dir = "./static/js"
"#;
        let config = load_config_from_str(toml).unwrap();
        let env = resolve_env(&config, Path::new("/srv/project")).unwrap();
        assert_eq!(env.app_root, PathBuf::from("/srv/project/app"));
        assert_eq!(env.build_area, Some(PathBuf::from("/srv/project/out")));
        assert_eq!(
            env.content_type_paths,
            vec![(
                ContentType::JavaScript,
                PathBuf::from("/srv/project/app/static/js")
            )]
        );
    }

    #[test]
    fn build_prefix_always_excluded() {
        let toml = r#"
[paste]
build_prefix = "_out"
excluded_dirs = ["node_modules"]
"#;
        let config = load_config_from_str(toml).unwrap();
        let env = resolve_env(&config, Path::new("/srv")).unwrap();
        assert_eq!(env.excluded_dirs, vec!["node_modules", "_out"]);
        assert!(env.is_excluded_dir("_out"));
    }

    #[test]
    fn default_app_root_is_project_dir() {
        let config = load_config_from_str("").unwrap();
        let env = resolve_env(&config, Path::new("/srv/project")).unwrap();
        assert_eq!(env.app_root, PathBuf::from("/srv/project"));
        assert_eq!(env.output_root(), Path::new("/srv/project"));
    }

    #[test]
    fn compressors_keyed_by_content_type() {
        let toml = r#"
[compressors.js]
program = "closure-compiler"
args = ["--compilation_level", "{compilation_level}"]
"#;
        let config = load_config_from_str(toml).unwrap();
        let env = resolve_env(&config, Path::new("/srv")).unwrap();
        let cmd = &env.compressors[&ContentType::JavaScript];
        assert_eq!(cmd.program, "closure-compiler");
        assert_eq!(cmd.args[1], "{compilation_level}");
    }

    #[test]
    fn normalize_folds_components() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}
