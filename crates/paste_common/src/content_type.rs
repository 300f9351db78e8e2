//! The asset content types the pipeline builds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A category of source asset with its own roots, declaration syntax, and compiler.
///
/// The set is closed: the pipeline handles exactly JavaScript, SCSS, and CSS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// JavaScript sources (`.js`), declared through JSDoc-style comments.
    #[serde(alias = "js")]
    JavaScript,
    /// SCSS stylesheets (`.scss`).
    Scss,
    /// Plain CSS stylesheets (`.css`).
    Css,
}

/// Error returned when a string does not name a known content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContentTypeError(String);

impl fmt::Display for ParseContentTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown content type '{}'", self.0)
    }
}

impl std::error::Error for ParseContentTypeError {}

impl ContentType {
    /// Every content type, in manifest order.
    pub const ALL: [ContentType; 3] = [ContentType::JavaScript, ContentType::Scss, ContentType::Css];

    /// The file extension (without the dot) of sources of this type.
    pub fn extension(self) -> &'static str {
        match self {
            ContentType::JavaScript => "js",
            ContentType::Scss => "scss",
            ContentType::Css => "css",
        }
    }

    /// The stable key used in configuration and serialized manifests.
    pub fn key(self) -> &'static str {
        match self {
            ContentType::JavaScript => "javascript",
            ContentType::Scss => "scss",
            ContentType::Css => "css",
        }
    }

    /// Returns `true` for the stylesheet types, which share declaration syntax.
    pub fn is_stylesheet(self) -> bool {
        matches!(self, ContentType::Scss | ContentType::Css)
    }

    /// Detects the content type of a file from its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL.into_iter().find(|ct| ct.extension() == ext)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ContentType {
    type Err = ParseContentTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "javascript" | "js" => Ok(ContentType::JavaScript),
            "scss" => Ok(ContentType::Scss),
            "css" => Ok(ContentType::Css),
            _ => Err(ParseContentTypeError(s.to_string())),
        }
    }
}
