//! Error taxonomy shared by adapters, the snapshot cache and the image pipeline.
//!
//! Failures fall into three groups:
//!
//! - **Contract errors** returned by adapters: [`Error::UndefinedTag`],
//!   [`Error::UndefinedArticleHref`], [`Error::ArticleTooShort`]
//! - **Image errors** raised by the image pipeline and recovered locally by
//!   adapters (the offending element is dropped): [`Error::NotScheme`],
//!   [`Error::InvalidImage`], [`Error::NotFile`]
//! - **I/O errors**: [`Error::FetchFailed`], [`Error::ParseFailed`],
//!   [`Error::FilesystemFailed`]
//!
//! Everything returns [`Result<T>`].

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The adapter has no listing template for the requested tag.
    #[error("undefined tag")]
    UndefinedTag,

    /// A detail fetch was requested for a stub with an empty `href`.
    #[error("undefined article href")]
    UndefinedArticleHref,

    /// Extracted plain text fell below the adapter's minimum length.
    #[error("article too short: {chars} chars, minimum {min}")]
    ArticleTooShort { chars: usize, min: usize },

    /// Image URL scheme is not http(s).
    #[error("not scheme: {0}")]
    NotScheme(String),

    /// A host rule rejected the image URL.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The image URL resolved to the bare image root.
    #[error("not file: {0}")]
    NotFile(String),

    /// Network or transport failure, including non-success HTTP status.
    #[error("fetch failed: {0}")]
    FetchFailed(#[from] reqwest::Error),

    /// Malformed HTML, JSON, URL or encoded payload.
    #[error("parse failed: {0}")]
    ParseFailed(String),

    /// Directory creation, file creation or file I/O failed.
    #[error("filesystem failed at {}: {source}", path.display())]
    FilesystemFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No publishing site with this id is configured.
    #[error("undefined site: {0}")]
    UndefinedSite(u32),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wraps an I/O error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FilesystemFailed {
            path: path.into(),
            source,
        }
    }

    /// True for failures that adapters recover from by dropping the image element.
    ///
    /// Every error the image pipeline can produce qualifies; the distinction
    /// only matters for logging.
    pub fn is_image_failure(&self) -> bool {
        matches!(
            self,
            Self::NotScheme(_) | Self::InvalidImage(_) | Self::NotFile(_)
        )
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        match e {
            url::ParseError::RelativeUrlWithoutBase => Self::NotScheme(e.to_string()),
            other => Self::ParseFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::ParseFailed(e.to_string())
    }
}
