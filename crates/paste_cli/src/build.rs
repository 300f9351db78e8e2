//! `paste build`: incremental build of every configured source root.
//!
//! Loads the previous manifest (fresh in compile mode), primes every scanned
//! source, reconciles removed modules, and saves the result.

use paste_config::Env;
use paste_manifest::{BuildContext, BuildReport, CommandCompressor, Manifest};

use crate::{BuildArgs, GlobalArgs};

/// Runs the `paste build` command.
///
/// Returns exit code 0 when every source primed, 1 when any failed.
pub fn run(args: &BuildArgs, env: &Env, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let compressor = CommandCompressor::from_env(env);
    let ctx = BuildContext::new(env, &compressor);

    if !global.quiet {
        eprintln!("   Building {}", env.app_root.display());
        if env.compile_mode {
            eprintln!("       Mode compile (serving sources)");
        }
    }

    let mut manifest = if env.compile_mode {
        Manifest::new()
    } else {
        Manifest::load_or_default(env)
    };
    let report = manifest.build(&ctx);

    render_failures(&report);

    if !args.no_save && !env.compile_mode {
        manifest.save(env)?;
        if !global.quiet {
            eprintln!("     Saved {}", env.manifest_path().display());
        }
    }

    if !global.quiet {
        print_summary(&report, global.verbose);
    }

    Ok(if report.is_success() { 0 } else { 1 })
}

/// Prints one line per failed source to stderr.
fn render_failures(report: &BuildReport) {
    for failure in &report.failed {
        match failure.name {
            Some(ref name) => eprintln!(
                "error[{}]: {} ({}): {}",
                failure.content_type,
                name,
                failure.source_path.display(),
                failure.reason
            ),
            None => eprintln!(
                "error[{}]: {}: {}",
                failure.content_type,
                failure.source_path.display(),
                failure.reason
            ),
        }
    }
}

fn print_summary(report: &BuildReport, verbose: bool) {
    if verbose {
        for path in &report.skipped {
            eprintln!("   Skipped {} (no module declaration)", path.display());
        }
        for (content_type, name) in &report.tombstoned {
            eprintln!("   Removed {content_type} {name}");
        }
        for (content_type, name) in &report.purged {
            eprintln!("    Purged {content_type} {name}");
        }
    }
    let status = if report.is_success() { "Finished" } else { "  Failed" };
    eprintln!("  {status} {report}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use paste_common::ContentType;
    use paste_config::CompressorCommand;
    use std::fs;
    use tempfile::TempDir;

    fn quiet() -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            config: None,
            compile_mode: false,
            no_versioning: false,
        }
    }

    fn project() -> (TempDir, Env) {
        let tmp = TempDir::new().unwrap();
        let js = tmp.path().join("static/js");
        fs::create_dir_all(&js).unwrap();
        fs::write(js.join("main.js"), "/** @module app.main */\nvar x = 1;\n").unwrap();
        let mut env = Env::new(tmp.path()).with_path(ContentType::JavaScript, "static/js");
        env.compressors.insert(
            ContentType::JavaScript,
            CompressorCommand {
                program: "cat".to_string(),
                args: Vec::new(),
            },
        );
        (tmp, env)
    }

    #[test]
    fn build_saves_manifest() {
        let (_tmp, env) = project();
        let code = run(&BuildArgs { no_save: false }, &env, &quiet()).unwrap();
        assert_eq!(code, 0);
        assert!(env.manifest_path().exists());

        let manifest = Manifest::load(&env).unwrap();
        assert!(manifest.registry(ContentType::JavaScript).unwrap().contains("app.main"));
    }

    #[test]
    fn build_no_save_leaves_no_manifest() {
        let (_tmp, env) = project();
        let code = run(&BuildArgs { no_save: true }, &env, &quiet()).unwrap();
        assert_eq!(code, 0);
        assert!(!env.manifest_path().exists());
    }

    #[test]
    fn missing_compressor_fails_build() {
        let (_tmp, mut env) = project();
        env.compressors.clear();
        let code = run(&BuildArgs { no_save: false }, &env, &quiet()).unwrap();
        assert_eq!(code, 1);
        assert!(env.manifest_path().exists());
    }

    #[test]
    fn compile_mode_never_saves() {
        let (_tmp, mut env) = project();
        env.compile_mode = true;
        let code = run(&BuildArgs { no_save: false }, &env, &quiet()).unwrap();
        assert_eq!(code, 0);
        assert!(!env.manifest_path().exists());
    }
}
