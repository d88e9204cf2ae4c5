//! Artifact operations against the Glare API.

use crate::blob::BlobReader;
use crate::http::{Method, Transport};
use crate::pagination::{page_items, ArtifactPages};
use crate::patch::build_patch;
use crate::types::{attr_str, Artifact, ArtifactStatus, Visibility};
use crate::{GlareError, DEFAULT_BLOB_CONTENT_TYPE, JSON_PATCH_CONTENT_TYPE, LOCATION_CONTENT_TYPE};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Read;
use tracing::{debug, info};
use url::{form_urlencoded, Url};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

const SORT_DIRECTIONS: [&str; 2] = ["asc", "desc"];

/// Service path built from `segments`, each one percent-encoded so ids and
/// names cannot smuggle `/`, `?` or `#` into the request.
fn service_path<'a, I>(segments: I) -> Result<String, GlareError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = Url::parse("http://glare.invalid/")
        .map_err(|e| GlareError::InvalidEndpoint(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| GlareError::InvalidEndpoint("base URL cannot carry a path".to_owned()))?
        .clear()
        .extend(segments);
    Ok(url.path().to_owned())
}

/// Path of a blob property. `dict/key` addresses one entry of a blob dict.
fn blob_path(
    type_name: &str,
    artifact_id: &str,
    blob_property: &str,
) -> Result<String, GlareError> {
    service_path(
        ["artifacts", type_name, artifact_id]
            .into_iter()
            .chain(blob_property.split('/')),
    )
}

/// Query options for [`ArtifactController::list`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Equality filters; a key may repeat.
    pub filters: Vec<(String, String)>,
    /// Comma-separated `key[:asc|desc]` list.
    pub sort: Option<String>,
    /// Overall cap on the number of artifacts returned.
    pub limit: Option<usize>,
    pub page_size: Option<usize>,
    /// Id of the last artifact of a previous listing.
    pub marker: Option<String>,
}

impl ListOptions {
    #[must_use]
    pub fn filter(mut self, key: &str, value: &str) -> Self {
        self.filters.push((key.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: &str) -> Self {
        self.sort = Some(sort.to_owned());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn marker(mut self, marker: &str) -> Self {
        self.marker = Some(marker.to_owned());
        self
    }
}

/// Check every `key[:dir]` segment of a sort expression.
pub fn validate_sort(sort: &str) -> Result<(), GlareError> {
    for segment in sort.trim().split(',') {
        if let Some((_, dir)) = segment.split_once(':') {
            if !dir.is_empty() && !SORT_DIRECTIONS.contains(&dir) {
                return Err(GlareError::BadRequest(format!(
                    "Invalid sort direction: {dir}. It must be one of the following: {}.",
                    SORT_DIRECTIONS.join(", ")
                )));
            }
        }
    }
    Ok(())
}

/// Entry point for artifact operations.
///
/// Every operation takes an optional type name that overrides the
/// controller default. When neither is set the operation fails with
/// [`GlareError::BadRequest`] before touching the network.
pub struct ArtifactController<T: Transport> {
    transport: T,
    type_name: Option<String>,
}

impl<T: Transport> ArtifactController<T> {
    pub fn new(transport: T, type_name: Option<&str>) -> Self {
        Self {
            transport,
            type_name: type_name.map(str::to_owned),
        }
    }

    fn resolve_type<'a>(&'a self, type_name: Option<&'a str>) -> Result<&'a str, GlareError> {
        type_name
            .or(self.type_name.as_deref())
            .ok_or_else(|| GlareError::BadRequest("Type name must be specified".to_owned()))
    }

    fn as_artifact(value: Value) -> Result<Artifact, GlareError> {
        match value {
            Value::Object(map) => Ok(map),
            other => Err(GlareError::Serialization(format!(
                "expected an artifact object, got {other}"
            ))),
        }
    }

    /// Create an artifact. `version` defaults to `0.0.0`; `attrs` carries any
    /// further initial attributes.
    pub fn create(
        &self,
        name: &str,
        version: Option<&str>,
        attrs: Map<String, Value>,
        type_name: Option<&str>,
    ) -> Result<Artifact, GlareError> {
        let type_name = self.resolve_type(type_name)?;
        let mut body = attrs;
        body.insert("name".to_owned(), Value::from(name));
        body.insert("version".to_owned(), Value::from(version.unwrap_or("0.0.0")));
        let payload =
            serde_json::to_vec(&body).map_err(|e| GlareError::Serialization(e.to_string()))?;
        let created = self.transport.json_request(
            Method::Post,
            &service_path(["artifacts", type_name])?,
            Some("application/json"),
            Some(&payload),
        )?;
        let created = Self::as_artifact(created)?;
        info!("created {type_name} artifact {}", attr_str(&created, "id"));
        Ok(created)
    }

    pub fn get(&self, artifact_id: &str, type_name: Option<&str>) -> Result<Artifact, GlareError> {
        let type_name = self.resolve_type(type_name)?;
        let body = self
            .transport
            .get(&service_path(["artifacts", type_name, artifact_id])?)?;
        Self::as_artifact(body)
    }

    /// Resolve `name` and `version` (default `latest`) to exactly one
    /// artifact. Zero or several matches are a `BadRequest`; the latter lists
    /// every candidate so the caller can pick an id.
    pub fn get_by_name(
        &self,
        name: &str,
        version: Option<&str>,
        type_name: Option<&str>,
    ) -> Result<Artifact, GlareError> {
        let type_name = self.resolve_type(type_name)?;
        let version = version.unwrap_or("latest");
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("version", version)
            .append_pair("name", name)
            .finish();
        let body = self
            .transport
            .get(&format!("{}?{query}", service_path(["artifacts", type_name])?))?;
        let mut arts = page_items(&body, type_name)?;
        match arts.len() {
            0 => Err(GlareError::BadRequest(format!(
                "Artifact with name={name} and version={version} not found."
            ))),
            1 => Ok(arts.remove(0)),
            _ => {
                let candidates: Vec<String> = arts
                    .iter()
                    .map(|a| {
                        let mut line = format!(
                            "Artifact: {}, owner: {}, visibility: {}",
                            attr_str(a, "id"),
                            attr_str(a, "owner"),
                            attr_str(a, "visibility")
                        );
                        if type_name == "all" {
                            line.push_str(&format!(", type: {}", attr_str(a, "type_name")));
                        }
                        line
                    })
                    .collect();
                Err(GlareError::BadRequest(format!(
                    "There are more than one artifact with name={name} and version={version}. \
                     Please provide the concrete id from the list:\n{}",
                    candidates.join("\n")
                )))
            }
        }
    }

    /// List artifacts lazily. The sort expression is validated up front; no
    /// request is made until the returned iterator is pulled.
    pub fn list(
        &self,
        options: &ListOptions,
        type_name: Option<&str>,
    ) -> Result<ArtifactPages<&T>, GlareError> {
        let type_name = self.resolve_type(type_name)?;
        if let Some(ref sort) = options.sort {
            validate_sort(sort)?;
        }
        let page_size = options
            .page_size
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &options.filters {
            query.append_pair(key, value);
        }
        query.append_pair("limit", &page_size.to_string());
        if let Some(ref marker) = options.marker {
            query.append_pair("marker", marker);
        }
        if let Some(ref sort) = options.sort {
            query.append_pair("sort", sort.trim());
        }
        let url = format!(
            "{}?{}",
            service_path(["artifacts", type_name])?,
            query.finish()
        );
        debug!("listing {type_name}: page_size={page_size} limit={:?}", options.limit);
        Ok(ArtifactPages::new(
            &self.transport,
            type_name,
            url,
            page_size,
            options.limit,
        ))
    }

    /// Apply a partial update. Names in `remove_props` are cleared, entries
    /// of `updates` are set. When there is nothing to change no PATCH is sent
    /// and the current artifact is returned.
    pub fn update<S: AsRef<str>>(
        &self,
        artifact_id: &str,
        remove_props: &[S],
        updates: &Map<String, Value>,
        type_name: Option<&str>,
    ) -> Result<Artifact, GlareError> {
        let type_name = self.resolve_type(type_name)?;
        let ops = build_patch(remove_props, updates);
        if ops.is_empty() {
            debug!("empty patch for {artifact_id}, fetching current state");
            return self.get(artifact_id, Some(type_name));
        }
        let payload =
            serde_json::to_vec(&ops).map_err(|e| GlareError::Serialization(e.to_string()))?;
        let body = self.transport.json_request(
            Method::Patch,
            &service_path(["artifacts", type_name, artifact_id])?,
            Some(JSON_PATCH_CONTENT_TYPE),
            Some(&payload),
        )?;
        Self::as_artifact(body)
    }

    fn set_field(
        &self,
        artifact_id: &str,
        field: &str,
        value: &str,
        type_name: Option<&str>,
    ) -> Result<Artifact, GlareError> {
        let mut updates = Map::new();
        updates.insert(field.to_owned(), Value::from(value));
        self.update::<&str>(artifact_id, &[], &updates, type_name)
    }

    pub fn activate(&self, artifact_id: &str, type_name: Option<&str>) -> Result<Artifact, GlareError> {
        self.set_field(artifact_id, "status", ArtifactStatus::Active.as_str(), type_name)
    }

    pub fn deactivate(&self, artifact_id: &str, type_name: Option<&str>) -> Result<Artifact, GlareError> {
        self.set_field(artifact_id, "status", ArtifactStatus::Deactivated.as_str(), type_name)
    }

    pub fn reactivate(&self, artifact_id: &str, type_name: Option<&str>) -> Result<Artifact, GlareError> {
        self.set_field(artifact_id, "status", ArtifactStatus::Active.as_str(), type_name)
    }

    pub fn publish(&self, artifact_id: &str, type_name: Option<&str>) -> Result<Artifact, GlareError> {
        self.set_field(artifact_id, "visibility", Visibility::Public.as_str(), type_name)
    }

    pub fn delete(&self, artifact_id: &str, type_name: Option<&str>) -> Result<(), GlareError> {
        let type_name = self.resolve_type(type_name)?;
        self.transport
            .delete(&service_path(["artifacts", type_name, artifact_id])?)?;
        info!("deleted {type_name} artifact {artifact_id}");
        Ok(())
    }

    // Tags are read, edited locally and written back whole. A concurrent
    // writer between the GET and the PATCH loses its change.
    fn current_tags(artifact: &Artifact) -> Vec<Value> {
        artifact
            .get("tags")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    fn write_tags(
        &self,
        artifact_id: &str,
        tags: Vec<Value>,
        type_name: &str,
    ) -> Result<Artifact, GlareError> {
        let mut updates = Map::new();
        updates.insert("tags".to_owned(), Value::Array(tags));
        self.update::<&str>(artifact_id, &[], &updates, Some(type_name))
    }

    /// Add `tag`. Already tagged artifacts come back unchanged, without a PATCH.
    pub fn add_tag(
        &self,
        artifact_id: &str,
        tag: &str,
        type_name: Option<&str>,
    ) -> Result<Artifact, GlareError> {
        let type_name = self.resolve_type(type_name)?;
        let artifact = self.get(artifact_id, Some(type_name))?;
        let mut tags = Self::current_tags(&artifact);
        if tags.iter().any(|t| t.as_str() == Some(tag)) {
            return Ok(artifact);
        }
        tags.push(Value::from(tag));
        self.write_tags(artifact_id, tags, type_name)
    }

    /// Remove `tag`. Removing an absent tag returns the artifact unchanged.
    pub fn remove_tag(
        &self,
        artifact_id: &str,
        tag: &str,
        type_name: Option<&str>,
    ) -> Result<Artifact, GlareError> {
        let type_name = self.resolve_type(type_name)?;
        let artifact = self.get(artifact_id, Some(type_name))?;
        let mut tags = Self::current_tags(&artifact);
        let Some(pos) = tags.iter().position(|t| t.as_str() == Some(tag)) else {
            return Ok(artifact);
        };
        tags.remove(pos);
        self.write_tags(artifact_id, tags, type_name)
    }

    /// Stream `data` into a blob property with one PUT.
    pub fn upload_blob(
        &self,
        artifact_id: &str,
        blob_property: &str,
        data: &mut dyn Read,
        content_length: Option<u64>,
        content_type: Option<&str>,
        type_name: Option<&str>,
    ) -> Result<(), GlareError> {
        let type_name = self.resolve_type(type_name)?;
        let content_type = content_type.unwrap_or(DEFAULT_BLOB_CONTENT_TYPE);
        self.transport.put_stream(
            &blob_path(type_name, artifact_id, blob_property)?,
            content_type,
            content_length,
            data,
        )?;
        info!("uploaded {blob_property} of {type_name} artifact {artifact_id}");
        Ok(())
    }

    /// Point a blob property at data held in an external store.
    pub fn add_external_location<L: Serialize + ?Sized>(
        &self,
        artifact_id: &str,
        blob_property: &str,
        location: &L,
        type_name: Option<&str>,
    ) -> Result<(), GlareError> {
        let type_name = self.resolve_type(type_name)?;
        let payload = serde_json::to_vec(location)
            .map_err(|_| GlareError::BadRequest("json is malformed.".to_owned()))?;
        self.transport.json_request(
            Method::Put,
            &blob_path(type_name, artifact_id, blob_property)?,
            Some(LOCATION_CONTENT_TYPE),
            Some(&payload),
        )?;
        Ok(())
    }

    pub fn remove_external_location(
        &self,
        artifact_id: &str,
        blob_property: &str,
        type_name: Option<&str>,
    ) -> Result<(), GlareError> {
        let type_name = self.resolve_type(type_name)?;
        self.transport
            .delete(&blob_path(type_name, artifact_id, blob_property)?)
    }

    /// Open a blob for reading. With `verify` the MD5 declared by the service
    /// is checked once the stream is exhausted.
    pub fn download_blob(
        &self,
        artifact_id: &str,
        blob_property: &str,
        verify: bool,
        type_name: Option<&str>,
    ) -> Result<BlobReader, GlareError> {
        let type_name = self.resolve_type(type_name)?;
        let reader = BlobReader::open(
            &self.transport,
            &blob_path(type_name, artifact_id, blob_property)?,
        )?;
        Ok(if verify {
            reader
        } else {
            reader.without_verification()
        })
    }

    /// Names and versions of every type the service knows.
    pub fn type_list(&self) -> Result<Vec<(String, String)>, GlareError> {
        let body = self.transport.get("/schemas")?;
        let schemas = body
            .get("schemas")
            .and_then(Value::as_object)
            .ok_or_else(|| GlareError::Serialization("response lacks 'schemas'".to_owned()))?;
        Ok(schemas
            .iter()
            .map(|(name, schema)| {
                let version = match schema.get("version") {
                    Some(Value::String(v)) => v.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                (name.clone(), version)
            })
            .collect())
    }

    pub fn type_schema(&self, type_name: Option<&str>) -> Result<Value, GlareError> {
        let type_name = self.resolve_type(type_name)?;
        let mut body = self.transport.get(&service_path(["schemas", type_name])?)?;
        body.get_mut("schemas")
            .and_then(|s| s.get_mut(type_name))
            .map(Value::take)
            .ok_or_else(|| {
                GlareError::Serialization(format!("response lacks the schema of {type_name}"))
            })
    }
}
