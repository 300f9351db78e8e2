//! Extraction of module names and dependencies from source text.
//!
//! JavaScript declares modules in JSDoc-style block comments:
//!
//! ```text
//! /**
//!  * @module app/main
//!  * @requires app/util
//!  * @compilation_level ADVANCED_OPTIMIZATIONS
//!  */
//! ```
//!
//! Stylesheets use pseudo at-rules that are stripped before compilation:
//!
//! ```text
//! @module "theme/base";
//! @requires "theme/colors";
//! ```
//!
//! Slash-delimited names are normalized to dot-delimited logical names.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static JS_COMMENT_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)/\*\*.*?@(?:module|require).*?\*/").expect("valid js comment regex")
});

static JSDOC_MODULE_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?P<kind>module|requires)[ \t]+(?P<name>[\w./$-]+)")
        .expect("valid jsdoc module regex")
});

static COMPILATION_LEVEL_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@compilation_level[ \t]+(?P<value>\w+)").expect("valid compilation level regex")
});

static STYLESHEET_DECLARATION_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@(?P<kind>module|requires)\s+"(?P<name>[^"\n]+?)";"#)
        .expect("valid stylesheet declaration regex")
});

/// JavaScript optimization level passed to the compressor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompilationLevel(String);

impl CompilationLevel {
    /// The level used when a module does not ask for one.
    pub const SIMPLE: &'static str = "SIMPLE_OPTIMIZATIONS";

    /// Wraps an explicit level.
    pub fn new(level: impl Into<String>) -> Self {
        Self(level.into())
    }

    /// The level as passed on the command line.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CompilationLevel {
    fn default() -> Self {
        Self(Self::SIMPLE.to_string())
    }
}

impl fmt::Display for CompilationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a source file says about itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Declaration {
    /// The declared logical name. Sources without one are not modules.
    pub name: Option<String>,
    /// Declared direct dependencies.
    pub dependencies: BTreeSet<String>,
    /// Requested JavaScript optimization level.
    pub compilation_level: CompilationLevel,
}

fn logical_name(raw: &str) -> String {
    raw.trim().replace('/', ".")
}

/// Parses `@module`, `@requires`, and `@compilation_level` out of JSDoc blocks.
///
/// Only `/** ... */` blocks mentioning `@module` or `@require` are inspected.
/// The last `@module` wins; the first `@compilation_level` in a block wins.
pub fn parse_javascript(source: &str) -> Declaration {
    let mut declaration = Declaration::default();
    for block in JS_COMMENT_EXPR.find_iter(source) {
        let block = block.as_str();
        if let Some(level) = COMPILATION_LEVEL_EXPR.captures(block) {
            declaration.compilation_level = CompilationLevel::new(&level["value"]);
        }
        for entry in JSDOC_MODULE_EXPR.captures_iter(block) {
            let name = logical_name(&entry["name"]);
            if &entry["kind"] == "requires" {
                declaration.dependencies.insert(name);
            } else {
                declaration.name = Some(name);
            }
        }
    }
    declaration
}

/// Parses `@module "..."` / `@requires "..."` statements and strips them.
///
/// Returns the declaration and the source text with every statement removed;
/// the stripped text is what gets compiled.
pub fn parse_stylesheet(source: &str) -> (Declaration, String) {
    let mut declaration = Declaration::default();
    let stripped = STYLESHEET_DECLARATION_EXPR.replace_all(source, |caps: &Captures<'_>| {
        let name = logical_name(&caps["name"]);
        if !name.is_empty() {
            if &caps["kind"] == "requires" {
                declaration.dependencies.insert(name);
            } else {
                declaration.name = Some(name);
            }
        }
        ""
    });
    let stripped = stripped.into_owned();
    (declaration, stripped)
}

/// Removes stylesheet declaration statements without collecting them.
pub fn strip_stylesheet_declarations(text: &str) -> Cow<'_, str> {
    STYLESHEET_DECLARATION_EXPR.replace_all(text, "")
}
