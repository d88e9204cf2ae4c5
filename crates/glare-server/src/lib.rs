//! Reference HTTP server for the Glare artifact API.
//!
//! Serves the artifact, blob, location and schema routes the client speaks,
//! backed by an in-memory [`Store`]. Static files registered on the store are
//! served unauthenticated under `/static/{name}` and stand in for an external
//! object store when testing blob redirects.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

pub mod schemas;
pub mod store;

pub use store::{ApiError, BlobContent, ListQuery, Store};

use percent_encoding::percent_decode_str;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, info, warn};
use url::form_urlencoded;

pub const AUTH_HEADER: &str = "X-Auth-Token";
pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";
pub const LOCATION_CONTENT_TYPE: &str = "application/vnd+openstack.glare-custom-location+json";

enum Reply {
    Json(u16, Value),
    Empty(u16),
    Blob {
        data: Vec<u8>,
        md5: Option<String>,
        content_type: String,
    },
    Redirect {
        location: String,
        md5: Option<String>,
    },
}

impl From<ApiError> for Reply {
    fn from(err: ApiError) -> Self {
        let status = err.status();
        Reply::Json(
            status,
            json!({
                "code": status,
                "title": err.title(),
                "description": err.to_string(),
            }),
        )
    }
}

fn request_header(req: &Request, name: &'static str) -> Option<String> {
    req.headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_owned())
}

fn read_body(req: &mut Request) -> Result<Vec<u8>, ApiError> {
    let mut body = Vec::new();
    req.as_reader()
        .read_to_end(&mut body)
        .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?;
    Ok(body)
}

fn read_json(req: &mut Request) -> Result<Value, ApiError> {
    let body = read_body(req)?;
    serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed JSON body: {e}")))
}

fn content_type(req: &Request) -> String {
    request_header(req, "Content-Type")
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_owned())
        .unwrap_or_default()
}

/// Link to the page after `marker`, keeping every other query parameter.
fn next_link(type_name: &str, query: &str, marker: &str) -> String {
    let mut next = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key != "marker" {
            next.append_pair(&key, &value);
        }
    }
    next.append_pair("marker", marker);
    format!("/artifacts/{type_name}?{}", next.finish())
}

fn list_artifacts(store: &Store, type_name: &str, query: &str) -> Result<Reply, ApiError> {
    let page = store.list(type_name, &ListQuery::parse(query)?)?;
    let mut body = Map::new();
    body.insert(
        type_name.to_owned(),
        Value::Array(page.items.into_iter().map(Value::Object).collect()),
    );
    body.insert(
        "first".to_owned(),
        json!(format!("/artifacts/{type_name}?{query}")),
    );
    if let Some(ref marker) = page.next_marker {
        body.insert("next".to_owned(), json!(next_link(type_name, query, marker)));
    }
    Ok(Reply::Json(200, Value::Object(body)))
}

fn route(
    store: &Store,
    req: &mut Request,
    method: &Method,
    segments: &[&str],
    query: &str,
) -> Result<Reply, ApiError> {
    match (method, segments) {
        (Method::Get, ["static", name]) => {
            let data = store
                .get_static(name)
                .ok_or_else(|| ApiError::NotFound(format!("no static file {name}")))?;
            return Ok(Reply::Blob {
                data,
                md5: None,
                content_type: "application/octet-stream".to_owned(),
            });
        }
        _ => {}
    }

    let token = request_header(req, AUTH_HEADER);
    store.check_token(token.as_deref())?;
    let owner = token.as_deref().unwrap_or("anonymous");

    match (method, segments) {
        (Method::Get, ["schemas"]) => Ok(Reply::Json(200, schemas::all_schemas())),
        (Method::Get, ["schemas", type_name]) => {
            let def = schemas::find(type_name).ok_or_else(|| {
                ApiError::NotFound(format!("unknown artifact type '{type_name}'"))
            })?;
            let mut schemas = Map::new();
            schemas.insert((*type_name).to_owned(), def.schema());
            Ok(Reply::Json(200, json!({ "schemas": schemas })))
        }
        (Method::Get, ["artifacts", type_name]) => list_artifacts(store, type_name, query),
        (Method::Post, ["artifacts", type_name]) => {
            let body = read_json(req)?;
            let artifact = store.create(type_name, owner, body)?;
            Ok(Reply::Json(201, Value::Object(artifact)))
        }
        (Method::Get, ["artifacts", type_name, id]) => {
            Ok(Reply::Json(200, Value::Object(store.get(type_name, id)?)))
        }
        (Method::Patch, ["artifacts", type_name, id]) => {
            if content_type(req) != JSON_PATCH_CONTENT_TYPE {
                return Err(ApiError::UnsupportedMediaType(format!(
                    "updates require Content-Type {JSON_PATCH_CONTENT_TYPE}"
                )));
            }
            let ops = read_json(req)?;
            Ok(Reply::Json(
                200,
                Value::Object(store.patch(type_name, id, &ops)?),
            ))
        }
        (Method::Delete, ["artifacts", type_name, id]) => {
            store.delete(type_name, id)?;
            Ok(Reply::Empty(204))
        }
        (_, ["artifacts", type_name, id, blob @ ..]) if matches!(blob.len(), 1 | 2) => {
            let blob_path = blob.join("/");
            blob_route(store, req, method, type_name, id, &blob_path)
        }
        _ => Err(ApiError::NotFound(format!(
            "no route for {method} /{}",
            segments.join("/")
        ))),
    }
}

fn blob_route(
    store: &Store,
    req: &mut Request,
    method: &Method,
    type_name: &str,
    id: &str,
    blob_path: &str,
) -> Result<Reply, ApiError> {
    match method {
        Method::Put if content_type(req) == LOCATION_CONTENT_TYPE => {
            let location = read_json(req)?;
            let artifact = store.put_location(type_name, id, blob_path, &location)?;
            Ok(Reply::Json(200, Value::Object(artifact)))
        }
        Method::Put => {
            let ct = match content_type(req) {
                ct if ct.is_empty() => "application/octet-stream".to_owned(),
                ct => ct,
            };
            let data = read_body(req)?;
            let artifact = store.put_blob(type_name, id, blob_path, &ct, data)?;
            Ok(Reply::Json(200, Value::Object(artifact)))
        }
        Method::Get => Ok(match store.get_blob(type_name, id, blob_path)? {
            BlobContent::Stored {
                data,
                md5,
                content_type,
            } => Reply::Blob {
                data,
                md5: Some(md5),
                content_type,
            },
            BlobContent::External { url, md5 } => Reply::Redirect { location: url, md5 },
        }),
        Method::Delete => {
            let artifact = store.delete_location(type_name, id, blob_path)?;
            Ok(Reply::Json(200, Value::Object(artifact)))
        }
        _ => Err(ApiError::NotFound(format!(
            "no route for {method} on blob {blob_path}"
        ))),
    }
}

fn respond(req: Request, reply: Reply) {
    let (status, data, headers) = match reply {
        Reply::Json(status, body) => (
            status,
            serde_json::to_vec(&body).unwrap_or_default(),
            vec![("Content-Type", "application/json".to_owned())],
        ),
        Reply::Empty(status) => (status, Vec::new(), Vec::new()),
        Reply::Blob {
            data,
            md5,
            content_type,
        } => {
            let mut headers = vec![("Content-Type", content_type)];
            if let Some(md5) = md5 {
                headers.push(("Content-MD5", md5));
            }
            (200, data, headers)
        }
        Reply::Redirect { location, md5 } => {
            let mut headers = vec![("Location", location)];
            if let Some(md5) = md5 {
                headers.push(("Content-MD5", md5));
            }
            (302, Vec::new(), headers)
        }
    };
    let mut response = Response::from_data(data).with_status_code(StatusCode(status));
    for (name, value) in headers {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => response.add_header(header),
            Err(()) => warn!("dropping unrepresentable {name} header"),
        }
    }
    let _ = req.respond(response);
}

/// Non-empty path segments with percent-escapes decoded.
fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect()
}

/// Handle a single HTTP request, dispatching to the appropriate route handler.
pub fn handle_request(store: &Store, mut req: Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
    let decoded = path_segments(path);
    let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();
    let reply = match route(store, &mut req, &method, &segments, query) {
        Ok(reply) => reply,
        Err(err) => {
            debug!("{method} {path} -> {} {err}", err.status());
            Reply::from(err)
        }
    };
    respond(req, reply);
}

/// Start the server loop, blocking the current thread.
pub fn run_server(
    store: &Arc<Store>,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Server::http(addr)?;
    info!("listening on {addr}");
    for request in server.incoming_requests() {
        handle_request(store, request);
    }
    Ok(())
}

/// A test helper that starts a glare-server on a random port in a background thread.
///
/// The server listens on `127.0.0.1:{port}`. Drop the `TestServer` to stop
/// the server (via `Server::unblock`).
pub struct TestServer {
    pub url: String,
    pub store: Arc<Store>,
    server: Arc<Server>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    /// Start an open test server. Binds to `127.0.0.1:0` (random port).
    pub fn start() -> Self {
        Self::with_token(None)
    }

    /// Start a test server that insists on `token` in `X-Auth-Token`.
    pub fn with_token(token: Option<&str>) -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let store = Arc::new(Store::new(token.map(str::to_owned)));
        let srv = Arc::clone(&server);
        let st = Arc::clone(&store);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&st, request);
            }
        });

        Self {
            url,
            store,
            server,
            handle: Some(handle),
        }
    }

    /// Register `data` as a static file and return its absolute URL.
    pub fn put_static(&self, name: &str, data: &[u8]) -> String {
        self.store.put_static(name, data);
        format!("{}/static/{name}", self.url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
