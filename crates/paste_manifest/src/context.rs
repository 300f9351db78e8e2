//! The explicit context every build operation runs against.

use std::path::PathBuf;

use paste_config::Env;

use crate::compressor::Compressor;

/// Read-only inputs of a build pass: the environment and the compiler capability.
///
/// Constructed once by the caller and passed by reference to every operation.
pub struct BuildContext<'a> {
    /// The resolved configuration.
    pub env: &'a Env,
    /// The compiler/minifier used on the recompile path.
    pub compressor: &'a dyn Compressor,
    load_paths: Vec<PathBuf>,
}

impl<'a> BuildContext<'a> {
    /// Creates a context for one or more build passes.
    pub fn new(env: &'a Env, compressor: &'a dyn Compressor) -> Self {
        Self {
            env,
            compressor,
            load_paths: env.load_paths(),
        }
    }

    /// Every registered source root, passed to stylesheet compilers.
    pub fn load_paths(&self) -> &[PathBuf] {
        &self.load_paths
    }
}
