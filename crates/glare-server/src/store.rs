//! In-memory artifact store behind the reference server.

use crate::schemas::{self, TypeDef};
use chrono::{SecondsFormat, Utc};
use md5::{Digest, Md5};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info};
use url::form_urlencoded;

pub type Artifact = Map<String, Value>;

/// Page size when a listing does not name one.
pub const DEFAULT_LIMIT: usize = 25;
pub const MAX_LIMIT: usize = 1000;

const STATUSES: [&str; 4] = ["drafted", "active", "deactivated", "deleted"];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    UnsupportedMediaType(String),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::UnsupportedMediaType(_) => 415,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "Bad Request",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "Not Found",
            Self::Conflict(_) => "Conflict",
            Self::UnsupportedMediaType(_) => "Unsupported Media Type",
        }
    }
}

/// Parsed query string of a listing request.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filters: Vec<(String, String)>,
    /// `(key, descending)` pairs, most significant first.
    pub sort: Vec<(String, bool)>,
    pub limit: usize,
    pub marker: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: Vec::new(),
            limit: DEFAULT_LIMIT,
            marker: None,
        }
    }
}

impl ListQuery {
    pub fn parse(query: &str) -> Result<Self, ApiError> {
        let mut parsed = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "limit" => {
                    let limit: usize = value
                        .parse()
                        .map_err(|_| ApiError::BadRequest(format!("invalid limit '{value}'")))?;
                    parsed.limit = limit.min(MAX_LIMIT);
                }
                "marker" => parsed.marker = Some(value.into_owned()),
                "sort" => parsed.sort = parse_sort(&value)?,
                _ => parsed.filters.push((key.into_owned(), value.into_owned())),
            }
        }
        Ok(parsed)
    }
}

fn parse_sort(sort: &str) -> Result<Vec<(String, bool)>, ApiError> {
    let mut keys = Vec::new();
    for segment in sort.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, dir) = segment.split_once(':').unwrap_or((segment, ""));
        let descending = match dir {
            "" | "asc" => false,
            "desc" => true,
            other => {
                return Err(ApiError::BadRequest(format!(
                    "invalid sort direction '{other}'"
                )))
            }
        };
        keys.push((key.to_owned(), descending));
    }
    Ok(keys)
}

/// One page of a listing.
#[derive(Debug)]
pub struct Page {
    pub items: Vec<Artifact>,
    /// Marker for the following page, present only while items remain.
    pub next_marker: Option<String>,
}

#[derive(Debug)]
pub enum BlobContent {
    Stored {
        data: Vec<u8>,
        md5: String,
        content_type: String,
    },
    External {
        url: String,
        md5: Option<String>,
    },
}

#[derive(Default)]
struct State {
    artifacts: Vec<Artifact>,
    blobs: HashMap<String, Vec<u8>>,
    statics: HashMap<String, Vec<u8>>,
}

/// Artifacts, blob bytes and a handful of static files, all held in memory.
///
/// Static files stand in for an external object store: they are served
/// without authentication under `/static/{name}`.
pub struct Store {
    state: RwLock<State>,
    token: Option<String>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Store {
    /// With a token set, every API request must present it in `X-Auth-Token`.
    pub fn new(token: Option<String>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            token,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn check_token(&self, presented: Option<&str>) -> Result<(), ApiError> {
        match self.token {
            Some(ref expected) if presented != Some(expected.as_str()) => Err(
                ApiError::Unauthorized("missing or invalid X-Auth-Token".to_owned()),
            ),
            _ => Ok(()),
        }
    }

    pub fn artifact_count(&self) -> usize {
        self.read().artifacts.len()
    }

    pub fn put_static(&self, name: &str, data: &[u8]) {
        self.write().statics.insert(name.to_owned(), data.to_vec());
    }

    pub fn get_static(&self, name: &str) -> Option<Vec<u8>> {
        self.read().statics.get(name).cloned()
    }

    pub fn create(&self, type_name: &str, owner: &str, body: Value) -> Result<Artifact, ApiError> {
        let def = lookup_type(type_name)?;
        if def.is_all() {
            return Err(ApiError::BadRequest(
                "artifacts cannot be created with type 'all'".to_owned(),
            ));
        }
        let Value::Object(fields) = body else {
            return Err(ApiError::BadRequest(
                "artifact body must be a JSON object".to_owned(),
            ));
        };

        let now = timestamp();
        let mut artifact = Map::new();
        artifact.insert("id".to_owned(), json!(uuid::Uuid::new_v4().to_string()));
        artifact.insert("name".to_owned(), Value::Null);
        artifact.insert("version".to_owned(), json!("0.0.0"));
        artifact.insert("owner".to_owned(), json!(owner));
        artifact.insert("visibility".to_owned(), json!("private"));
        artifact.insert("status".to_owned(), json!("drafted"));
        artifact.insert("tags".to_owned(), json!([]));
        artifact.insert("metadata".to_owned(), json!({}));
        artifact.insert("description".to_owned(), Value::Null);
        artifact.insert("type_name".to_owned(), json!(def.name));
        artifact.insert("created_at".to_owned(), json!(now));
        artifact.insert("updated_at".to_owned(), json!(now));
        artifact.insert("activated_at".to_owned(), Value::Null);
        for (field, _) in def.fields {
            let empty = if def.is_dict(field) { json!({}) } else { Value::Null };
            artifact.insert((*field).to_owned(), empty);
        }
        for blob in def.blobs {
            artifact.insert((*blob).to_owned(), Value::Null);
        }
        for dict in def.blob_dicts {
            artifact.insert((*dict).to_owned(), json!({}));
        }

        for (field, value) in fields {
            if matches!(field.as_str(), "status" | "visibility") {
                return Err(ApiError::Forbidden(format!(
                    "field '{field}' cannot be set at creation"
                )));
            }
            if !def.is_writable(&field) {
                return Err(unwritable(def, &field));
            }
            let value = normalize(def, &field, value)?;
            artifact.insert(field, value);
        }
        if artifact.get("name").is_none_or(Value::is_null) {
            return Err(ApiError::BadRequest("name is required".to_owned()));
        }

        let mut state = self.write();
        ensure_unique(&state.artifacts, &artifact, None)?;
        info!(
            "created {} artifact {} ({} {})",
            def.name,
            str_field(&artifact, "id"),
            str_field(&artifact, "name"),
            str_field(&artifact, "version")
        );
        state.artifacts.push(artifact.clone());
        Ok(artifact)
    }

    pub fn get(&self, type_name: &str, id: &str) -> Result<Artifact, ApiError> {
        let def = lookup_type(type_name)?;
        let state = self.read();
        let idx = position(&state.artifacts, def, id)?;
        Ok(state.artifacts[idx].clone())
    }

    pub fn list(&self, type_name: &str, query: &ListQuery) -> Result<Page, ApiError> {
        let def = lookup_type(type_name)?;
        for (key, _) in &query.filters {
            if !def.is_known(key) {
                return Err(ApiError::BadRequest(format!(
                    "cannot filter by unknown field '{key}'"
                )));
            }
        }
        let latest_only = query
            .filters
            .iter()
            .any(|(k, v)| k == "version" && v == "latest");

        let state = self.read();
        let mut items: Vec<&Artifact> = state
            .artifacts
            .iter()
            .filter(|a| def.is_all() || str_field(a, "type_name") == def.name)
            .filter(|a| {
                query.filters.iter().all(|(k, v)| {
                    (k == "version" && v == "latest") || matches_filter(a, k, v)
                })
            })
            .collect();
        if latest_only {
            items = keep_latest(items);
        }
        if !query.sort.is_empty() {
            items.sort_by(|a, b| compare_by(a, b, &query.sort));
        }
        if let Some(ref marker) = query.marker {
            let pos = items
                .iter()
                .position(|a| str_field(a, "id") == marker)
                .ok_or_else(|| ApiError::BadRequest(format!("marker {marker} not found")))?;
            items.drain(..=pos);
        }

        let more = items.len() > query.limit;
        items.truncate(query.limit);
        let next_marker = if more {
            items.last().map(|a| str_field(a, "id").to_owned())
        } else {
            None
        };
        debug!(
            "listed {} {} artifacts, more={more}",
            items.len(),
            def.name
        );
        Ok(Page {
            items: items.into_iter().cloned().collect(),
            next_marker,
        })
    }

    /// Apply a JSON-Patch document atomically.
    pub fn patch(&self, type_name: &str, id: &str, ops: &Value) -> Result<Artifact, ApiError> {
        let def = lookup_type(type_name)?;
        let ops = ops
            .as_array()
            .ok_or_else(|| ApiError::BadRequest("patch must be a JSON array".to_owned()))?;

        let mut state = self.write();
        let idx = position(&state.artifacts, def, id)?;
        let current = &state.artifacts[idx];
        let art_def = artifact_type(current)?;
        let mut updated = current.clone();
        for op in ops {
            apply_op(art_def, &mut updated, op)?;
        }

        let now = timestamp();
        check_transition(current, &mut updated, &now)?;
        ensure_unique(&state.artifacts, &updated, Some(idx))?;
        updated.insert("updated_at".to_owned(), json!(now));
        debug!("patched {} artifact {id} with {} ops", art_def.name, ops.len());
        state.artifacts[idx] = updated.clone();
        Ok(updated)
    }

    pub fn delete(&self, type_name: &str, id: &str) -> Result<(), ApiError> {
        let def = lookup_type(type_name)?;
        let mut state = self.write();
        let idx = position(&state.artifacts, def, id)?;
        state.artifacts.remove(idx);
        let prefix = format!("{id}/");
        state.blobs.retain(|key, _| !key.starts_with(&prefix));
        info!("deleted artifact {id}");
        Ok(())
    }

    pub fn put_blob(
        &self,
        type_name: &str,
        id: &str,
        blob_path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<Artifact, ApiError> {
        let md5 = hex(&Md5::digest(&data));
        let meta = json!({
            "status": "active",
            "external": false,
            "url": format!("/artifacts/{type_name}/{id}/{blob_path}"),
            "md5": md5,
            "sha1": null,
            "sha256": null,
            "content_type": content_type,
            "size": data.len(),
        });
        let size = data.len();
        let artifact = self.set_blob(type_name, id, blob_path, meta, Some(data))?;
        info!("stored {size} bytes in {blob_path} of artifact {id}");
        Ok(artifact)
    }

    pub fn put_location(
        &self,
        type_name: &str,
        id: &str,
        blob_path: &str,
        location: &Value,
    ) -> Result<Artifact, ApiError> {
        let url = location
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .ok_or_else(|| {
                ApiError::BadRequest("location must carry an http(s) 'url'".to_owned())
            })?;
        let checksum = |name: &str| location.get(name).cloned().unwrap_or(Value::Null);
        let meta = json!({
            "status": "active",
            "external": true,
            "url": url,
            "md5": checksum("md5"),
            "sha1": checksum("sha1"),
            "sha256": checksum("sha256"),
            "content_type": null,
            "size": null,
        });
        self.set_blob(type_name, id, blob_path, meta, None)
    }

    fn set_blob(
        &self,
        type_name: &str,
        id: &str,
        blob_path: &str,
        meta: Value,
        data: Option<Vec<u8>>,
    ) -> Result<Artifact, ApiError> {
        let def = lookup_type(type_name)?;
        let mut state = self.write();
        let idx = position(&state.artifacts, def, id)?;
        let artifact = &mut state.artifacts[idx];
        let art_def = artifact_type(artifact)?;
        let (field, key) = blob_field(art_def, blob_path)?;
        if matches!(str_field(artifact, "status"), "deactivated" | "deleted") {
            return Err(ApiError::Forbidden(format!(
                "artifact {id} is {}",
                str_field(artifact, "status")
            )));
        }
        if blob_meta(artifact, field, key).is_some() {
            return Err(ApiError::Conflict(format!(
                "blob {blob_path} already has data"
            )));
        }
        match key {
            None => {
                artifact.insert(field.to_owned(), meta);
            }
            Some(key) => {
                let dict = artifact.entry(field).or_insert_with(|| json!({}));
                if !dict.is_object() {
                    *dict = json!({});
                }
                if let Some(map) = dict.as_object_mut() {
                    map.insert(key.to_owned(), meta);
                }
            }
        }
        artifact.insert("updated_at".to_owned(), json!(timestamp()));
        let snapshot = artifact.clone();
        if let Some(data) = data {
            state.blobs.insert(format!("{id}/{blob_path}"), data);
        }
        Ok(snapshot)
    }

    pub fn get_blob(
        &self,
        type_name: &str,
        id: &str,
        blob_path: &str,
    ) -> Result<BlobContent, ApiError> {
        let def = lookup_type(type_name)?;
        let state = self.read();
        let idx = position(&state.artifacts, def, id)?;
        let artifact = &state.artifacts[idx];
        let (field, key) = blob_field(artifact_type(artifact)?, blob_path)?;
        let meta = blob_meta(artifact, field, key)
            .ok_or_else(|| ApiError::NotFound(format!("blob {blob_path} has no data")))?;
        let md5 = meta.get("md5").and_then(Value::as_str).map(str::to_owned);
        if meta.get("external").and_then(Value::as_bool) == Some(true) {
            let url = meta
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            return Ok(BlobContent::External { url, md5 });
        }
        let data = state
            .blobs
            .get(&format!("{id}/{blob_path}"))
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("blob {blob_path} has no data")))?;
        Ok(BlobContent::Stored {
            data,
            md5: md5.unwrap_or_default(),
            content_type: meta
                .get("content_type")
                .and_then(Value::as_str)
                .unwrap_or("application/octet-stream")
                .to_owned(),
        })
    }

    pub fn delete_location(
        &self,
        type_name: &str,
        id: &str,
        blob_path: &str,
    ) -> Result<Artifact, ApiError> {
        let def = lookup_type(type_name)?;
        let mut state = self.write();
        let idx = position(&state.artifacts, def, id)?;
        let artifact = &mut state.artifacts[idx];
        let (field, key) = blob_field(artifact_type(artifact)?, blob_path)?;
        let external = blob_meta(artifact, field, key)
            .and_then(|m| m.get("external"))
            .and_then(Value::as_bool);
        match external {
            None => {
                return Err(ApiError::NotFound(format!(
                    "blob {blob_path} has no data"
                )))
            }
            Some(false) => {
                return Err(ApiError::BadRequest(format!(
                    "blob {blob_path} is not an external location"
                )))
            }
            Some(true) => {}
        }
        match key {
            None => {
                artifact.insert(field.to_owned(), Value::Null);
            }
            Some(key) => {
                if let Some(map) = artifact.get_mut(field).and_then(Value::as_object_mut) {
                    map.remove(key);
                }
            }
        }
        artifact.insert("updated_at".to_owned(), json!(timestamp()));
        info!("removed external location {blob_path} of artifact {id}");
        Ok(artifact.clone())
    }
}

fn lookup_type(name: &str) -> Result<&'static TypeDef, ApiError> {
    schemas::find(name)
        .ok_or_else(|| ApiError::NotFound(format!("unknown artifact type '{name}'")))
}

fn artifact_type(artifact: &Artifact) -> Result<&'static TypeDef, ApiError> {
    lookup_type(str_field(artifact, "type_name"))
}

fn position(artifacts: &[Artifact], def: &TypeDef, id: &str) -> Result<usize, ApiError> {
    artifacts
        .iter()
        .position(|a| {
            str_field(a, "id") == id && (def.is_all() || str_field(a, "type_name") == def.name)
        })
        .ok_or_else(|| ApiError::NotFound(format!("artifact {id} not found")))
}

fn str_field<'a>(artifact: &'a Artifact, key: &str) -> &'a str {
    artifact.get(key).and_then(Value::as_str).unwrap_or("")
}

fn unwritable(def: &TypeDef, field: &str) -> ApiError {
    if def.is_known(field) {
        ApiError::Forbidden(format!("field '{field}' is read only"))
    } else {
        ApiError::BadRequest(format!("unknown field '{field}' for type {}", def.name))
    }
}

fn ensure_unique(
    artifacts: &[Artifact],
    candidate: &Artifact,
    skip: Option<usize>,
) -> Result<(), ApiError> {
    let same = |a: &Artifact| {
        ["type_name", "name", "version", "owner"]
            .iter()
            .all(|k| a.get(*k) == candidate.get(*k))
    };
    let clash = artifacts
        .iter()
        .enumerate()
        .any(|(i, a)| Some(i) != skip && same(a));
    if clash {
        return Err(ApiError::Conflict(format!(
            "artifact with name={} and version={} already exists",
            str_field(candidate, "name"),
            str_field(candidate, "version")
        )));
    }
    Ok(())
}

fn normalize(def: &TypeDef, field: &str, value: Value) -> Result<Value, ApiError> {
    match field {
        "name" => match value {
            Value::String(ref s) if !s.is_empty() => Ok(value),
            _ => Err(ApiError::BadRequest(
                "name must be a non-empty string".to_owned(),
            )),
        },
        "version" => match value {
            Value::String(_) => Ok(value),
            _ => Err(ApiError::BadRequest("version must be a string".to_owned())),
        },
        "visibility" => match value.as_str() {
            Some("private" | "public") => Ok(value),
            _ => Err(ApiError::BadRequest(format!("invalid visibility {value}"))),
        },
        "status" => match value.as_str() {
            Some(s) if STATUSES.contains(&s) => Ok(value),
            _ => Err(ApiError::BadRequest(format!("invalid status {value}"))),
        },
        "tags" => {
            let tags = match value {
                Value::Null => Vec::new(),
                Value::Array(items) => items,
                _ => {
                    return Err(ApiError::BadRequest(
                        "tags must be a list of strings".to_owned(),
                    ))
                }
            };
            let mut unique: Vec<Value> = Vec::with_capacity(tags.len());
            for tag in tags {
                if !tag.is_string() {
                    return Err(ApiError::BadRequest(
                        "tags must be a list of strings".to_owned(),
                    ));
                }
                if !unique.contains(&tag) {
                    unique.push(tag);
                }
            }
            Ok(Value::Array(unique))
        }
        _ if def.is_dict(field) => match value {
            Value::Null | Value::Object(_) => Ok(value),
            _ => Err(ApiError::BadRequest(format!("{field} must be a dictionary"))),
        },
        _ => Ok(value),
    }
}

fn apply_op(def: &TypeDef, artifact: &mut Artifact, op: &Value) -> Result<(), ApiError> {
    let name = op
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("patch operation lacks 'op'".to_owned()))?;
    let path = op
        .get("path")
        .and_then(Value::as_str)
        .and_then(|p| p.strip_prefix('/'))
        .ok_or_else(|| ApiError::BadRequest("patch operation lacks a '/path'".to_owned()))?;
    let (field, key) = match path.split_once('/') {
        Some((field, key)) => (field, Some(key)),
        None => (path, None),
    };
    if !def.is_writable(field) {
        return Err(unwritable(def, field));
    }
    let value = || {
        op.get("value")
            .cloned()
            .ok_or_else(|| ApiError::BadRequest(format!("patch of /{path} lacks 'value'")))
    };

    match (name, key) {
        ("add" | "replace", None) => {
            let value = normalize(def, field, value()?)?;
            artifact.insert(field.to_owned(), value);
        }
        ("add" | "replace", Some(key)) => {
            if !def.is_dict(field) {
                return Err(ApiError::BadRequest(format!("{field} is not a dictionary")));
            }
            let value = value()?;
            let dict = artifact.entry(field).or_insert_with(|| json!({}));
            if !dict.is_object() {
                *dict = json!({});
            }
            if let Some(map) = dict.as_object_mut() {
                map.insert(key.to_owned(), value);
            }
        }
        ("remove", Some(key)) => {
            let removed = artifact
                .get_mut(field)
                .and_then(Value::as_object_mut)
                .and_then(|map| map.remove(key));
            if removed.is_none() {
                return Err(ApiError::BadRequest(format!("no such key /{path}")));
            }
        }
        ("remove", None) => {
            return Err(ApiError::BadRequest(format!(
                "top-level field '{field}' cannot be removed, replace it with null"
            )))
        }
        (other, _) => {
            return Err(ApiError::BadRequest(format!(
                "unsupported patch operation '{other}'"
            )))
        }
    }
    Ok(())
}

fn check_transition(before: &Artifact, after: &mut Artifact, now: &str) -> Result<(), ApiError> {
    let old = str_field(before, "status");
    let new = str_field(after, "status").to_owned();
    if old != new {
        let allowed = matches!(
            (old, new.as_str()),
            ("drafted", "active") | ("active", "deactivated") | ("deactivated", "active")
        );
        if !allowed {
            return Err(ApiError::BadRequest(format!(
                "cannot change status from {old} to {new}"
            )));
        }
        if new == "active" && before.get("activated_at").is_none_or(Value::is_null) {
            after.insert("activated_at".to_owned(), json!(now));
        }
    }

    let old_vis = str_field(before, "visibility");
    let new_vis = str_field(after, "visibility");
    if old_vis != new_vis {
        if old_vis == "public" {
            return Err(ApiError::Forbidden(
                "public artifacts cannot be made private".to_owned(),
            ));
        }
        if str_field(after, "status") != "active" {
            return Err(ApiError::BadRequest(
                "only active artifacts can be published".to_owned(),
            ));
        }
    }
    Ok(())
}

fn blob_field<'a>(
    def: &TypeDef,
    blob_path: &'a str,
) -> Result<(&'a str, Option<&'a str>), ApiError> {
    match blob_path.split_once('/') {
        Some((dict, key)) if def.is_blob_dict(dict) && !key.is_empty() && !key.contains('/') => {
            Ok((dict, Some(key)))
        }
        None if def.is_blob(blob_path) => Ok((blob_path, None)),
        _ => Err(ApiError::BadRequest(format!(
            "{blob_path} is not a blob field of type {}",
            def.name
        ))),
    }
}

fn blob_meta<'a>(artifact: &'a Artifact, field: &str, key: Option<&str>) -> Option<&'a Value> {
    let value = match key {
        None => artifact.get(field)?,
        Some(key) => artifact.get(field)?.get(key)?,
    };
    (!value.is_null()).then_some(value)
}

fn matches_filter(artifact: &Artifact, key: &str, wanted: &str) -> bool {
    let wanted = wanted.strip_prefix("eq:").unwrap_or(wanted);
    match artifact.get(key) {
        Some(Value::String(s)) => s == wanted,
        Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(wanted)),
        Some(Value::Number(n)) => n.to_string() == wanted,
        Some(Value::Bool(b)) => b.to_string() == wanted,
        _ => false,
    }
}

fn version_key(version: &str) -> Vec<u64> {
    version
        .split(['.', '-', '+'])
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

/// Keep, per name, only the artifacts carrying the highest version.
fn keep_latest(items: Vec<&Artifact>) -> Vec<&Artifact> {
    let mut best: HashMap<&str, Vec<u64>> = HashMap::new();
    for a in &items {
        let key = version_key(str_field(a, "version"));
        best.entry(str_field(a, "name"))
            .and_modify(|v| {
                if key > *v {
                    v.clone_from(&key);
                }
            })
            .or_insert(key);
    }
    items
        .into_iter()
        .filter(|a| {
            best.get(str_field(a, "name")) == Some(&version_key(str_field(a, "version")))
        })
        .collect()
}

fn compare_values(key: &str, a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) if key == "version" => {
            version_key(x).cmp(&version_key(y))
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn compare_by(a: &Artifact, b: &Artifact, sort: &[(String, bool)]) -> Ordering {
    for (key, descending) in sort {
        let ord = compare_values(key, a.get(key), b.get(key));
        let ord = if *descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(32), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
