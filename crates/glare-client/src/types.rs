//! Artifact payload shapes.
//!
//! Artifacts are schema-less on the client: the service validates fields per
//! type, so an artifact is kept as an ordered JSON object. Only the few shapes
//! the client itself produces or inspects get typed structs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// An artifact as returned by the service: attribute name to JSON value,
/// in server order.
pub type Artifact = Map<String, Value>;

/// Read a string attribute, treating absence and non-strings alike.
pub fn attr_str<'a>(artifact: &'a Artifact, key: &str) -> &'a str {
    artifact.get(key).and_then(Value::as_str).unwrap_or("")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Drafted,
    Active,
    Deactivated,
    Deleted,
}

impl ArtifactStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drafted => "drafted",
            Self::Active => "active",
            Self::Deactivated => "deactivated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata the service keeps about a blob field. The bytes themselves are
/// streamed separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default)]
    pub external: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl BlobProperty {
    /// Extract the blob metadata stored under `property`. A `dict/key` path
    /// addresses an entry of a blob dictionary.
    pub fn from_artifact(artifact: &Artifact, property: &str) -> Option<Self> {
        let value = match property.split_once('/') {
            Some((dict, key)) => artifact.get(dict)?.get(key)?,
            None => artifact.get(property)?,
        };
        if value.is_null() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// Descriptor registered when a blob lives in an external store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLocation {
    pub url: String,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

impl ExternalLocation {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            ..Self::default()
        }
    }
}
