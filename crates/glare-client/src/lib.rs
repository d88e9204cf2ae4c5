//! Client library for the Glare artifact repository HTTP API.
//!
//! This crate turns artifact operations (create, list, update, tag, upload and
//! download blobs, schema introspection) into HTTP requests and turns the
//! responses back into structured results. The [`ArtifactController`] is the
//! entry point; it composes the JSON-Patch builder ([`patch`]), the paginated
//! listing iterator ([`pagination`]) and the checksummed blob reader
//! ([`blob`]) on top of a [`Transport`], normally the ureq-backed
//! [`HttpClient`].

pub mod artifacts;
pub mod blob;
pub mod config;
pub mod http;
pub mod pagination;
pub mod patch;
pub mod types;

pub use artifacts::{ArtifactController, ListOptions, DEFAULT_PAGE_SIZE};
pub use blob::BlobReader;
pub use config::ClientConfig;
pub use http::{BlobResponse, HttpClient, Method, Transport};
pub use pagination::ArtifactPages;
pub use patch::{build_patch, PatchOperation};
pub use types::{Artifact, ArtifactStatus, BlobProperty, ExternalLocation, Visibility};

use thiserror::Error;

/// Content type of a JSON-Patch request body.
pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

/// Content type marking a blob upload as an external location reference.
pub const LOCATION_CONTENT_TYPE: &str = "application/vnd+openstack.glare-custom-location+json";

/// Content type used for blob uploads when the caller does not pick one.
pub const DEFAULT_BLOB_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum GlareError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("error communicating with {endpoint}: {source}")]
    Communication {
        endpoint: String,
        #[source]
        source: ureq::Error,
    },
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("authentication failed, please try again: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("corrupt blob download: checksum was {actual}, expected {expected}")]
    Integrity { actual: String, expected: String },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

impl GlareError {
    /// Wrap this error in an `io::Error` so it can travel through `Read`.
    pub fn into_io(self) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, self)
    }
}

// Blob readers report integrity failures through `io::Error`; unwrap them
// back into the typed variant instead of burying them under `Io`.
impl From<std::io::Error> for GlareError {
    fn from(err: std::io::Error) -> Self {
        let carries_glare = err
            .get_ref()
            .is_some_and(|inner| inner.is::<GlareError>());
        if !carries_glare {
            return GlareError::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<GlareError>()) {
            Some(Ok(inner)) => *inner,
            _ => GlareError::Io(std::io::Error::other("blob stream failed")),
        }
    }
}
