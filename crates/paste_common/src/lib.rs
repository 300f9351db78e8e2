//! Shared foundational types used across the paste asset pipeline.
//!
//! This crate provides content hashing for change detection and
//! content-addressed artifact naming, and the closed set of asset content
//! types the pipeline knows how to build.

#![warn(missing_docs)]

pub mod content_type;
pub mod hash;

pub use content_type::{ContentType, ParseContentTypeError};
pub use hash::ContentHash;
