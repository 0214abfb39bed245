//! # site_collect
//!
//! A pluggable article collection engine. Site adapters list article stubs
//! for a content tag, then complete each stub from its detail page:
//! sanitized HTML content, tags, and images downloaded into a local store.
//!
//! ## Architecture
//!
//! 1. **Registry**: adapters are registered by name and built on lookup
//! 2. **Listing**: an adapter turns a tag and page into stubs
//! 3. **Detail**: pages are read through the [`snapshot`] cache, images go
//!    through the [`image`] pipeline, content is rewritten by [`render`]
//! 4. **Output**: batches are written as JSON and images can be handed to
//!    a publishing site

pub mod adapter;
pub mod adapters;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod image;
pub mod models;
pub mod outputs;
pub mod publish;
pub mod registry;
pub mod render;
pub mod snapshot;
pub mod utils;

pub use error::{Error, Result};
