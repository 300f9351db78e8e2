//! The build decision policy: reuse, recompile, version bump, artifact storage.
//!
//! A [`Primer`] turns one scanned source into a primed [`Module`], consulting
//! the previous registry entry of the same name. The content type decides how
//! declarations are parsed and how the source is prepared for compilation;
//! the decision logic itself is shared. Artifacts a primed module no longer
//! points at are deleted by the manifest once the whole pass is known.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use paste_common::{ContentHash, ContentType};
use paste_config::Env;
use tracing::{debug, info, warn};

use crate::compressor::CompressRequest;
use crate::context::BuildContext;
use crate::declaration::{
    parse_javascript, parse_stylesheet, strip_stylesheet_declarations, CompilationLevel,
    Declaration,
};
use crate::error::CompileError;
use crate::module::Module;
use crate::registry::Registry;
use crate::scan::SourceFile;

/// Builds modules of one content type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primer {
    /// JSDoc-declared JavaScript.
    JavaScript,
    /// SCSS with stripped pseudo-declarations, compiled against all load paths.
    Scss,
    /// CSS with stripped pseudo-declarations.
    Css,
}

/// A source that could not be primed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildFailure {
    /// Content type of the source.
    pub content_type: ContentType,
    /// Declared module name, when the source got far enough to declare one.
    pub name: Option<String>,
    /// Source path relative to the app root.
    pub source_path: PathBuf,
    /// Human-readable cause.
    pub reason: String,
}

/// What priming one source produced.
#[derive(Debug)]
pub enum PrimeOutcome {
    /// Source unchanged: the previous artifact was adopted without compiling.
    Reused(Module),
    /// Compiled (or taken verbatim in compile mode).
    Primed(Module),
    /// The source declares no module name.
    Skipped {
        /// Source path relative to the app root.
        source_path: PathBuf,
    },
    /// Compilation or artifact storage failed; nothing usable was produced.
    Failed(BuildFailure),
}

impl Primer {
    /// The primer responsible for a content type.
    pub fn for_content_type(content_type: ContentType) -> Self {
        match content_type {
            ContentType::JavaScript => Primer::JavaScript,
            ContentType::Scss => Primer::Scss,
            ContentType::Css => Primer::Css,
        }
    }

    /// The content type this primer builds.
    pub fn content_type(self) -> ContentType {
        match self {
            Primer::JavaScript => ContentType::JavaScript,
            Primer::Scss => ContentType::Scss,
            Primer::Css => ContentType::Css,
        }
    }

    /// Parses the declaration and returns the text to compile.
    pub fn declare(self, source: &str) -> (Declaration, Cow<'_, str>) {
        match self {
            Primer::JavaScript => (parse_javascript(source), Cow::Borrowed(source)),
            Primer::Scss | Primer::Css => {
                let (declaration, stripped) = parse_stylesheet(source);
                (declaration, Cow::Owned(stripped))
            }
        }
    }

    /// Primes one scanned source against the previous registry of its content type.
    pub fn prime(self, ctx: &BuildContext<'_>, file: &SourceFile, registry: &Registry) -> PrimeOutcome {
        let (declaration, prepared) = self.declare(&file.contents);
        self.prime_declared(ctx, file, &declaration, &prepared, registry)
    }

    /// Primes a source whose declaration was already parsed by [`Primer::declare`].
    pub fn prime_declared(
        self,
        ctx: &BuildContext<'_>,
        file: &SourceFile,
        declaration: &Declaration,
        prepared: &str,
        registry: &Registry,
    ) -> PrimeOutcome {
        let Some(name) = declaration.name.clone() else {
            debug!(source = %file.source_path.display(), "no module declaration, skipping");
            return PrimeOutcome::Skipped {
                source_path: file.source_path.clone(),
            };
        };

        let mut module = Module::new(
            file.source_path.clone(),
            file.checksum,
            name,
            declaration.dependencies.iter().cloned(),
        );
        let existing = registry.get(&module.name);

        if ctx.env.compile_mode {
            return self.prime_from_source(ctx.env, module, prepared, existing);
        }

        if let Some(existing) = existing {
            if existing.source_checksum == module.source_checksum && artifact_exists(ctx.env, existing) {
                debug!(name = %module.name, version = %existing.version, "source unchanged, reusing artifact");
                module.adopt_artifact(existing);
                module.coalesce(existing);
                return PrimeOutcome::Reused(module);
            }
        }

        let compiled = match self.compile(ctx, &module, prepared, &declaration.compilation_level) {
            Ok(compiled) => compiled,
            Err(e) => {
                warn!(name = %module.name, source = %module.source_path.display(), error = %e, "compilation failed");
                return PrimeOutcome::Failed(self.failure(&module, e.to_string()));
            }
        };
        let checksum = ContentHash::from_bytes(&compiled);

        if let Some(existing) = existing {
            module.coalesce(existing);
            module.version = existing.version_from_path().unwrap_or(existing.version);
            if existing.compiled_checksum == Some(checksum) {
                debug!(name = %module.name, "compiled output unchanged, keeping version");
            } else if ctx.env.versioning {
                module.bump_version(existing);
                info!(name = %module.name, version = %module.version, "compiled output changed, bumped version");
            }
        }

        let Some(path) = module.artifact_path(ctx.env, &checksum) else {
            return PrimeOutcome::Failed(self.failure(&module, "source path has no usable file name".to_string()));
        };
        if let Err(e) = write_artifact(&path, &compiled) {
            warn!(path = %path.display(), error = %e, "error writing compiled artifact");
            return PrimeOutcome::Failed(self.failure(&module, format!("{}: {e}", path.display())));
        }
        module.set_compiled(checksum, compiled.len() as u64, ctx.env.relative(&path));
        module.refresh_last_modified(ctx.env);
        PrimeOutcome::Primed(module)
    }

    /// Compile mode: the prepared source is the artifact. No versioning, no files written.
    fn prime_from_source(self, env: &Env, mut module: Module, prepared: &str, existing: Option<&Module>) -> PrimeOutcome {
        if let Some(existing) = existing {
            module.coalesce(existing);
        }
        let source_path = module.source_path.clone();
        module.set_compiled(
            ContentHash::from_bytes(prepared.as_bytes()),
            prepared.len() as u64,
            source_path,
        );
        module.refresh_last_modified(env);
        PrimeOutcome::Primed(module)
    }

    /// Runs the compressor, then checks stylesheet output for surviving declarations.
    fn compile(
        self,
        ctx: &BuildContext<'_>,
        module: &Module,
        prepared: &str,
        level: &CompilationLevel,
    ) -> Result<Vec<u8>, CompileError> {
        let stylesheet = self.content_type().is_stylesheet();
        let request = CompressRequest {
            content_type: self.content_type(),
            source_path: &module.source_path,
            source: prepared,
            compilation_level: level,
            load_paths: if stylesheet { ctx.load_paths() } else { &[] },
        };
        let compiled = ctx.compressor.compress(&request)?;
        if !stylesheet {
            return Ok(compiled);
        }

        let text = String::from_utf8_lossy(&compiled);
        let stripped = strip_stylesheet_declarations(&text);
        let before = ContentHash::from_bytes(&compiled);
        let after = ContentHash::from_bytes(stripped.as_bytes());
        if before == after {
            return Ok(compiled);
        }
        warn!(
            name = %module.name,
            "module declarations survived compilation, check for malformed or circular declarations"
        );
        if stripped.trim().is_empty() {
            return Err(CompileError::EmptyOutput);
        }
        Ok(stripped.into_owned().into_bytes())
    }

    fn failure(self, module: &Module, reason: String) -> BuildFailure {
        BuildFailure {
            content_type: self.content_type(),
            name: Some(module.name.clone()),
            source_path: module.source_path.clone(),
            reason,
        }
    }
}

/// Returns `true` if the module's compiled artifact is on disk with its recorded size.
fn artifact_exists(env: &Env, module: &Module) -> bool {
    let Some(path) = module.abs_compiled_path(env) else {
        return false;
    };
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => module.byte_size.map_or(true, |size| size == meta.len()),
        _ => false,
    }
}

/// Writes compiled content unless an intact file already sits at the
/// content-addressed path.
///
/// The content goes to a sibling temp file first and is renamed into place,
/// so an interrupted write never leaves a truncated artifact behind.
fn write_artifact(path: &Path, compiled: &[u8]) -> std::io::Result<()> {
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.is_file() && meta.len() == compiled.len() as u64 {
            return Ok(());
        }
        warn!(path = %path.display(), "artifact size mismatch, rewriting");
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, compiled)?;
    std::fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp_path);
    })
}

/// Deletes a module's compiled artifact. Never touches a source file served directly.
///
/// Returns `true` if a file was removed.
pub(crate) fn remove_artifact(env: &Env, module: &Module) -> bool {
    if module.serves_source() {
        return false;
    }
    let Some(path) = module.abs_compiled_path(env) else {
        return false;
    };
    match std::fs::remove_file(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale artifact");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "error removing stale artifact");
            false
        }
    }
}
