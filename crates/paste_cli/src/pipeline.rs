//! Shared setup for CLI commands.
//!
//! Locates the project, loads and resolves `paste.toml`, applies the global
//! flag overrides, and installs the tracing subscriber.

use std::path::{Path, PathBuf};

use paste_config::{Env, CONFIG_FILE};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `paste.toml`.
///
/// Returns the directory containing `paste.toml`, or an error if none is found.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Locates the configuration file from global CLI args.
///
/// If `--config` is specified it is used directly (a directory means
/// `<dir>/paste.toml`). Otherwise walks up from the current directory.
pub fn resolve_config_path(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    match global.config {
        Some(ref config_path) => {
            let path = cwd.join(config_path);
            if path.is_dir() {
                Ok(path.join(CONFIG_FILE))
            } else {
                Ok(path)
            }
        }
        None => Ok(find_project_root(&cwd)?.join(CONFIG_FILE)),
    }
}

/// Loads the configuration at `config_path` and resolves it into an [`Env`],
/// applying the global flag overrides.
pub fn load_env(config_path: &Path, global: &GlobalArgs) -> Result<Env, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(config_path)
        .map_err(|e| format!("failed to read {}: {e}", config_path.display()))?;
    let config = paste_config::load_config_from_str(&content)?;
    let project_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let mut env = paste_config::resolve_env(&config, project_dir)?;

    if global.compile_mode {
        env.compile_mode = true;
    }
    if global.no_versioning {
        env.versioning = false;
    }
    Ok(env)
}

/// Picks the log filter: `RUST_LOG` wins, then the configured filter, then a
/// level derived from `--verbose`/`--quiet`.
pub fn log_filter(config_filter: Option<&str>, global: &GlobalArgs) -> String {
    if let Ok(filter) = std::env::var("RUST_LOG") {
        return filter;
    }
    if let Some(filter) = config_filter {
        return filter.to_string();
    }
    let level = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "info"
    };
    level.to_string()
}

/// Installs the global tracing subscriber: human-readable, to stderr, with targets.
pub fn init_logging(filter: &str) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_ansi(std::env::var_os("NO_COLOR").is_none()),
        )
        .with(EnvFilter::new(filter))
        .init();
}

/// Everything a command needs before it runs: the resolved environment with
/// logging already initialized.
pub fn prepare(global: &GlobalArgs) -> Result<Env, Box<dyn std::error::Error>> {
    let config_path = resolve_config_path(global)?;
    let env = load_env(&config_path, global)?;
    init_logging(&log_filter(env.log_filter.as_deref(), global));
    debug!(config = %config_path.display(), app_root = %env.app_root.display(), "loaded configuration");
    Ok(env)
}
