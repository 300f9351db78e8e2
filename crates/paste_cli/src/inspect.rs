//! Read-only manifest commands: `paste order`, `paste show`, `paste lookup`,
//! and `paste fingerprint`.
//!
//! Each command takes the persisted manifest as-is, building one from scratch
//! only when nothing usable is persisted (always, in compile mode).

use std::path::Path;

use paste_common::ContentType;
use paste_config::Env;
use paste_manifest::{BuildContext, CommandCompressor, Manifest, Module, Resolved, Version};
use serde_json::json;

use crate::{LookupArgs, OrderArgs, ShowArgs};

/// Loads the manifest the way a serving process would.
fn serving_manifest(env: &Env) -> Manifest {
    let compressor = CommandCompressor::from_env(env);
    let ctx = BuildContext::new(env, &compressor);
    Manifest::load_or_build(&ctx)
}

/// Public URI of a compiled artifact.
fn uri_for(env: &Env, compiled_path: &Path) -> String {
    let path = compiled_path.to_string_lossy().replace('\\', "/");
    format!(
        "{}/{}",
        env.root_uri.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Runs `paste order`: one line per module in load order.
pub fn order(args: &OrderArgs, env: &Env) -> Result<i32, Box<dyn std::error::Error>> {
    let manifest = serving_manifest(env);
    for entry in manifest.sorted(args.content_type) {
        println!(
            "{}\t{}\t{}",
            entry.name,
            entry.version,
            uri_for(env, &entry.compiled_path)
        );
    }
    Ok(0)
}

/// Runs `paste show`: every module, as text or JSON.
pub fn show(args: &ShowArgs, env: &Env) -> Result<i32, Box<dyn std::error::Error>> {
    let manifest = serving_manifest(env);
    let content_types: Vec<ContentType> = match args.content_type {
        Some(content_type) => vec![content_type],
        None => ContentType::ALL.to_vec(),
    };

    if args.json {
        let mut root = serde_json::Map::new();
        for content_type in content_types {
            let view = manifest.content_type(content_type);
            let modules: Vec<_> = view
                .registry
                .iter()
                .map(|module| module_json(env, module))
                .collect();
            let order: Vec<_> = view.sorted.iter().map(|entry| entry.name.as_str()).collect();
            root.insert(
                content_type.key().to_string(),
                json!({ "modules": modules, "order": order }),
            );
        }
        root.insert(
            "fingerprint".to_string(),
            json!(manifest.fingerprint().to_string()),
        );
        println!("{}", serde_json::to_string_pretty(&root)?);
        return Ok(0);
    }

    for content_type in content_types {
        let view = manifest.content_type(content_type);
        if view.registry.is_empty() {
            continue;
        }
        println!("[{content_type}]");
        for module in view.registry.iter() {
            print_module(env, module);
        }
    }
    Ok(0)
}

fn module_json(env: &Env, module: &Module) -> serde_json::Value {
    json!({
        "name": module.name,
        "version": module.version.to_string(),
        "removed": module.version_removed.map(|v| v.to_string()),
        "source_path": module.source_path.display().to_string(),
        "source_checksum": module.source_checksum.to_string(),
        "compiled_path": module.compiled_path.as_ref().map(|p| p.display().to_string()),
        "compiled_checksum": module.compiled_checksum.map(|c| c.to_string()),
        "uri": module.compiled_path.as_ref().map(|p| uri_for(env, p)),
        "byte_size": module.byte_size,
        "last_modified": module.last_modified,
        "dependencies": module.dependencies,
        "history": module
            .version_history
            .iter()
            .map(|snapshot| snapshot.version.to_string())
            .collect::<Vec<_>>(),
    })
}

fn print_module(env: &Env, module: &Module) {
    let status = match module.version_removed {
        Some(removed) => format!(" (removed at {removed})"),
        None => String::new(),
    };
    println!("  {} v{}{}", module.name, module.version, status);
    println!("    source   {}", module.source_path.display());
    if let Some(ref compiled) = module.compiled_path {
        println!("    artifact {}", uri_for(env, compiled));
    }
    if !module.dependencies.is_empty() {
        let deps: Vec<_> = module.dependencies.iter().map(String::as_str).collect();
        println!("    requires {}", deps.join(", "));
    }
    if !module.version_history.is_empty() {
        let history: Vec<_> = module
            .version_history
            .iter()
            .map(|snapshot| snapshot.version.to_string())
            .collect();
        println!("    history  {}", history.join(", "));
    }
}

/// Runs `paste lookup`: resolves one module and prints its load order.
///
/// Returns exit code 1 when the module (or the requested version) is unknown.
pub fn lookup(args: &LookupArgs, env: &Env) -> Result<i32, Box<dyn std::error::Error>> {
    let version = match args.at {
        Some(ref raw) => Some(Version::parse(raw).ok_or_else(|| format!("invalid version '{raw}'"))?),
        None => None,
    };

    let manifest = serving_manifest(env);
    let view = manifest.content_type(args.content_type);
    let Some(resolved) = view.lookup(&args.name, version) else {
        match version {
            Some(version) => eprintln!(
                "error: no {} module '{}' at version {version}",
                args.content_type, args.name
            ),
            None => eprintln!("error: no {} module '{}'", args.content_type, args.name),
        }
        return Ok(1);
    };

    let state = match resolved {
        Resolved::Live(module) if module.is_removed() => "removed",
        Resolved::Live(_) => "current",
        Resolved::Archived(_) => "archived",
    };
    println!("{} v{} ({state})", args.name, resolved.version());
    match resolved.compiled_path() {
        Some(path) => println!("{}", uri_for(env, path)),
        None => println!("(no artifact)"),
    }

    if matches!(resolved, Resolved::Live(module) if !module.is_removed()) {
        for entry in view.load_order_for(&args.name) {
            println!("  {}", uri_for(env, &entry.compiled_path));
        }
    }
    Ok(0)
}

/// Runs `paste fingerprint`: prints the manifest identity hash.
pub fn fingerprint(env: &Env) -> Result<i32, Box<dyn std::error::Error>> {
    let manifest = serving_manifest(env);
    println!("{}", manifest.fingerprint());
    Ok(0)
}
