//! Paste CLI: the command-line interface for the paste asset pipeline.
//!
//! Provides `paste build` for incremental builds of the configured asset
//! roots, and `paste order`, `paste show`, `paste lookup`, and
//! `paste fingerprint` for inspecting the resulting manifest.

#![warn(missing_docs)]

mod build;
mod inspect;
mod pipeline;

use std::process;

use clap::{Parser, Subcommand};
use paste_common::ContentType;

/// Paste: incremental JavaScript and stylesheet builds.
#[derive(Parser, Debug)]
#[command(name = "paste", version, about = "Paste asset pipeline")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `paste.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Serve raw sources: skip compression and versioning.
    #[arg(long, global = true)]
    pub compile_mode: bool,

    /// Keep only the current version of each artifact.
    #[arg(long, global = true)]
    pub no_versioning: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan, compile what changed, and save the manifest.
    Build(BuildArgs),
    /// Print the load order of one content type.
    Order(OrderArgs),
    /// Print the modules of the manifest.
    Show(ShowArgs),
    /// Resolve a module, optionally at an archived version.
    Lookup(LookupArgs),
    /// Print the manifest fingerprint.
    Fingerprint,
}

/// Arguments for the `paste build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Build without writing the manifest.
    #[arg(long)]
    pub no_save: bool,
}

/// Arguments for the `paste order` subcommand.
#[derive(Parser, Debug)]
pub struct OrderArgs {
    /// Content type to print (`javascript`, `scss`, or `css`).
    pub content_type: ContentType,
}

/// Arguments for the `paste show` subcommand.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Restrict output to one content type.
    pub content_type: Option<ContentType>,

    /// Print machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `paste lookup` subcommand.
#[derive(Parser, Debug)]
pub struct LookupArgs {
    /// Content type of the module.
    pub content_type: ContentType,

    /// Logical module name.
    pub name: String,

    /// Version to resolve (e.g. `2` or `2.0`). Defaults to the current one.
    #[arg(long)]
    pub at: Option<String>,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
    /// Force compile mode on.
    pub compile_mode: bool,
    /// Force versioning off.
    pub no_versioning: bool,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
        compile_mode: cli.compile_mode,
        no_versioning: cli.no_versioning,
    };

    let result = pipeline::prepare(&global).and_then(|env| match cli.command {
        Command::Build(ref args) => build::run(args, &env, &global),
        Command::Order(ref args) => inspect::order(args, &env),
        Command::Show(ref args) => inspect::show(args, &env),
        Command::Lookup(ref args) => inspect::lookup(args, &env),
        Command::Fingerprint => inspect::fingerprint(&env),
    });

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
