//! The external compiler/minifier capability.
//!
//! The build policy never transforms sources itself. It hands prepared source
//! text to a [`Compressor`], which for production use is a
//! [`CommandCompressor`] running the programs configured in `paste.toml`.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use paste_common::ContentType;
use paste_config::{CompressorCommand, Env};
use tracing::debug;

use crate::declaration::CompilationLevel;
use crate::error::CompileError;

/// Placeholder replaced by the module's JavaScript compilation level.
const LEVEL_PLACEHOLDER: &str = "{compilation_level}";

/// Placeholder that repeats its argument once per load path.
const LOAD_PATH_PLACEHOLDER: &str = "{load_path}";

/// Everything a compressor needs to compile one module.
#[derive(Debug)]
pub struct CompressRequest<'a> {
    /// The module's content type.
    pub content_type: ContentType,
    /// Source path relative to the app root, for diagnostics.
    pub source_path: &'a Path,
    /// Prepared source text (declarations already stripped for stylesheets).
    pub source: &'a str,
    /// Requested optimization level (JavaScript only).
    pub compilation_level: &'a CompilationLevel,
    /// Include/load paths for stylesheet compilers.
    pub load_paths: &'a [PathBuf],
}

/// Compiles and minifies prepared source text.
pub trait Compressor {
    /// Returns the compiled bytes. Empty output is reported as
    /// [`CompileError::EmptyOutput`], never as `Ok`.
    fn compress(&self, request: &CompressRequest<'_>) -> Result<Vec<u8>, CompileError>;
}

/// Runs a configured external program per content type, feeding the source
/// on stdin and reading the compiled result from stdout.
#[derive(Debug, Clone, Default)]
pub struct CommandCompressor {
    commands: BTreeMap<ContentType, CompressorCommand>,
}

impl CommandCompressor {
    /// Creates a compressor from explicit commands.
    pub fn new(commands: BTreeMap<ContentType, CompressorCommand>) -> Self {
        Self { commands }
    }

    /// Creates a compressor from the commands configured in the environment.
    pub fn from_env(env: &Env) -> Self {
        Self::new(env.compressors.clone())
    }

    /// Expands argument placeholders for one request.
    fn expand_args(command: &CompressorCommand, request: &CompressRequest<'_>) -> Vec<String> {
        let mut args = Vec::with_capacity(command.args.len());
        for template in &command.args {
            if template.contains(LOAD_PATH_PLACEHOLDER) {
                for load_path in request.load_paths {
                    let load_path = load_path.display().to_string();
                    args.push(template.replace(LOAD_PATH_PLACEHOLDER, &load_path));
                }
            } else {
                args.push(template.replace(LEVEL_PLACEHOLDER, request.compilation_level.as_str()));
            }
        }
        args
    }
}

impl Compressor for CommandCompressor {
    fn compress(&self, request: &CompressRequest<'_>) -> Result<Vec<u8>, CompileError> {
        let command = self
            .commands
            .get(&request.content_type)
            .ok_or(CompileError::NotConfigured {
                content_type: request.content_type,
            })?;
        let args = Self::expand_args(command, request);
        debug!(
            program = %command.program,
            source = %request.source_path.display(),
            "running compressor"
        );

        let spawn_error = |source| CompileError::Spawn {
            program: command.program.clone(),
            source,
        };
        let mut child = Command::new(&command.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Feed stdin from a helper thread so a large output cannot fill the
        // stdout pipe while we are still writing.
        let output = std::thread::scope(|scope| {
            let stdin = child.stdin.take();
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(request.source.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            // A program may exit without reading all of its input.
            let written = match writer.join() {
                Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                Ok(result) => result,
                Err(_) => Err(std::io::Error::other("stdin writer panicked")),
            };
            output.and_then(|output| written.map(|()| output))
        })
        .map_err(spawn_error)?;

        if !output.status.success() {
            return Err(CompileError::Failed {
                program: command.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(CompileError::EmptyOutput);
        }
        Ok(output.stdout)
    }
}
