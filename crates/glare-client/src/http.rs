use crate::{ClientConfig, GlareError};
use serde_json::Value;
use std::fmt;
use std::io::Read;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("glare-client/", env!("CARGO_PKG_VERSION"));
const AUTH_HEADER: &str = "X-Auth-Token";

type HttpResponse = ureq::http::Response<ureq::Body>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw, not yet consumed blob response.
///
/// Redirects are not followed for blob downloads; a 301/302 comes back here
/// with `location` set so the caller decides how to reach the external store.
pub struct BlobResponse {
    pub status: u16,
    pub content_md5: Option<String>,
    pub content_length: Option<u64>,
    pub location: Option<String>,
    pub body: Box<dyn Read>,
}

impl BlobResponse {
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302)
    }
}

impl fmt::Debug for BlobResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobResponse")
            .field("status", &self.status)
            .field("content_md5", &self.content_md5)
            .field("content_length", &self.content_length)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// The HTTP operations the artifact controller needs from the service.
pub trait Transport {
    /// Issue a request with an optional JSON body and decode the JSON reply.
    /// Empty replies decode to `Value::Null`.
    fn json_request(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<Value, GlareError>;

    /// Stream `body` to `path` with a single PUT.
    fn put_stream(
        &self,
        path: &str,
        content_type: &str,
        content_length: Option<u64>,
        body: &mut dyn Read,
    ) -> Result<(), GlareError>;

    /// GET a blob from the service without following redirects.
    fn get_blob(&self, path: &str) -> Result<BlobResponse, GlareError>;

    /// GET an absolute URL outside the service. No credentials are sent.
    fn get_external(&self, url: &str) -> Result<BlobResponse, GlareError>;

    fn get(&self, path: &str) -> Result<Value, GlareError> {
        self.json_request(Method::Get, path, None, None)
    }

    fn delete(&self, path: &str) -> Result<(), GlareError> {
        self.json_request(Method::Delete, path, None, None)
            .map(drop)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn json_request(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<Value, GlareError> {
        (**self).json_request(method, path, content_type, body)
    }

    fn put_stream(
        &self,
        path: &str,
        content_type: &str,
        content_length: Option<u64>,
        body: &mut dyn Read,
    ) -> Result<(), GlareError> {
        (**self).put_stream(path, content_type, content_length, body)
    }

    fn get_blob(&self, path: &str) -> Result<BlobResponse, GlareError> {
        (**self).get_blob(path)
    }

    fn get_external(&self, url: &str) -> Result<BlobResponse, GlareError> {
        (**self).get_external(url)
    }
}

/// Blocking HTTP transport for the Glare API.
///
/// Every service request carries `X-Auth-Token` when a token is configured.
/// Redirects of ordinary requests are followed once, and only when they stay
/// under the configured endpoint.
pub struct HttpClient {
    config: ClientConfig,
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .timeout_global(config.timeout())
            .build();
        let agent = ureq::Agent::new_with_config(agent_config);
        Self { config, agent }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Resolve a service path (or an absolute URL under the endpoint).
    pub fn url_for(&self, path: &str) -> Result<String, GlareError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return self
                .under_endpoint(path)
                .ok_or_else(|| GlareError::InvalidEndpoint(format!("prohibited endpoint {path}")));
        }
        if path.starts_with('/') {
            Ok(format!("{}{path}", self.config.endpoint))
        } else {
            Ok(format!("{}/{path}", self.config.endpoint))
        }
    }

    /// Rebuild `absolute` on the configured endpoint when it names the same
    /// origin and a path at or below the endpoint's own path.
    fn under_endpoint(&self, absolute: &str) -> Option<String> {
        let base = Url::parse(&self.config.endpoint).ok()?;
        let target = Url::parse(absolute).ok()?;
        let same_origin = target.scheme() == base.scheme()
            && target.host_str() == base.host_str()
            && target.port_or_known_default() == base.port_or_known_default()
            && target.username().is_empty()
            && target.password().is_none();
        if !same_origin {
            return None;
        }
        let rest = target
            .path()
            .strip_prefix(base.path().trim_end_matches('/'))?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        let mut url = format!("{}{rest}", self.config.endpoint);
        if let Some(query) = target.query() {
            url.push('?');
            url.push_str(query);
        }
        Some(url)
    }

    fn decorate<B>(
        &self,
        mut req: ureq::RequestBuilder<B>,
        authenticated: bool,
        content_type: Option<&str>,
    ) -> ureq::RequestBuilder<B> {
        req = req.header("User-Agent", USER_AGENT);
        if authenticated {
            if let Some(ref token) = self.config.auth_token {
                req = req.header(AUTH_HEADER, token);
            }
        }
        if let Some(ct) = content_type {
            req = req.header("Content-Type", ct);
        }
        req
    }

    fn log_curl_request(&self, method: Method, url: &str, content_type: Option<&str>) {
        let mut curl = format!("curl -i -X {method} -H 'User-Agent: {USER_AGENT}'");
        if self.config.auth_token.is_some() {
            curl.push_str(&format!(" -H '{AUTH_HEADER}: ***'"));
        }
        if let Some(ct) = content_type {
            curl.push_str(&format!(" -H 'Content-Type: {ct}'"));
        }
        debug!("{curl} {url}");
    }

    fn execute(
        &self,
        method: Method,
        url: &str,
        content_type: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, GlareError> {
        self.log_curl_request(method, url, content_type);
        let body = body.unwrap_or_default();
        let result = match method {
            Method::Get => self.decorate(self.agent.get(url), true, content_type).call(),
            Method::Delete => self
                .decorate(self.agent.delete(url), true, content_type)
                .call(),
            Method::Post => self
                .decorate(self.agent.post(url), true, content_type)
                .send(body),
            Method::Put => self
                .decorate(self.agent.put(url), true, content_type)
                .send(body),
            Method::Patch => self
                .decorate(self.agent.patch(url), true, content_type)
                .send(body),
        };
        result.map_err(|e| self.transport_error(url, e))
    }

    fn transport_error(&self, url: &str, err: ureq::Error) -> GlareError {
        match err {
            ureq::Error::HostNotFound => {
                GlareError::InvalidEndpoint(format!("error finding address for {url}"))
            }
            source => GlareError::Communication {
                endpoint: self.config.endpoint.clone(),
                source,
            },
        }
    }

    /// Execute a request, following one redirect inside the endpoint.
    fn execute_following(
        &self,
        method: Method,
        url: &str,
        content_type: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, GlareError> {
        let mut url = url.to_owned();
        let mut redirected = false;
        loop {
            let resp = self.execute(method, &url, content_type, body)?;
            let status = resp.status().as_u16();
            debug!("{method} {url} -> HTTP {status}");
            if matches!(status, 301 | 302 | 305) && !redirected {
                let location = header(&resp, "location").ok_or_else(|| {
                    GlareError::InvalidEndpoint(format!("location not returned with {status}"))
                })?;
                url = self.under_endpoint(&location).ok_or_else(|| {
                    GlareError::InvalidEndpoint(format!("prohibited endpoint redirect {location}"))
                })?;
                redirected = true;
                continue;
            }
            return check_status(resp, &url);
        }
    }
}

impl Transport for HttpClient {
    fn json_request(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<Value, GlareError> {
        let url = self.url_for(path)?;
        let resp = self.execute_following(method, &url, content_type, body)?;
        let is_json = header(&resp, "content-type").is_some_and(|ct| ct.contains("json"));
        let bytes = read_body(resp)?;
        parse_json_body(&bytes, is_json)
    }

    fn put_stream(
        &self,
        path: &str,
        content_type: &str,
        content_length: Option<u64>,
        body: &mut dyn Read,
    ) -> Result<(), GlareError> {
        let url = self.url_for(path)?;
        self.log_curl_request(Method::Put, &url, Some(content_type));
        let mut req = self.decorate(self.agent.put(&url), true, Some(content_type));
        if let Some(len) = content_length {
            req = req.header("Content-Length", &len.to_string());
        }
        let resp = req
            .send(ureq::SendBody::from_reader(body))
            .map_err(|e| self.transport_error(&url, e))?;
        debug!("PUT {url} -> HTTP {}", resp.status().as_u16());
        check_status(resp, &url).map(drop)
    }

    fn get_blob(&self, path: &str) -> Result<BlobResponse, GlareError> {
        let url = self.url_for(path)?;
        self.log_curl_request(Method::Get, &url, None);
        let resp = self
            .decorate(self.agent.get(&url), true, None)
            .header("Accept", "*/*")
            .call()
            .map_err(|e| self.transport_error(&url, e))?;
        let status = resp.status().as_u16();
        debug!("GET {url} -> HTTP {status}");
        if matches!(status, 301 | 302) {
            return Ok(into_blob_response(resp));
        }
        check_status(resp, &url).map(into_blob_response)
    }

    fn get_external(&self, url: &str) -> Result<BlobResponse, GlareError> {
        // Identity encoding keeps the body length known to the caller.
        debug!("GET {url} (external, unauthenticated)");
        let resp = self
            .decorate(self.agent.get(url), false, None)
            .header("Accept-Encoding", "identity")
            .call()
            .map_err(|e| self.transport_error(url, e))?;
        debug!("GET {url} -> HTTP {}", resp.status().as_u16());
        check_status(resp, url).map(into_blob_response)
    }
}

fn header(resp: &HttpResponse, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn read_body(resp: HttpResponse) -> Result<Vec<u8>, GlareError> {
    let mut body = Vec::new();
    resp.into_body().into_reader().read_to_end(&mut body)?;
    Ok(body)
}

fn into_blob_response(resp: HttpResponse) -> BlobResponse {
    BlobResponse {
        status: resp.status().as_u16(),
        content_md5: header(&resp, "content-md5"),
        content_length: header(&resp, "content-length").and_then(|v| v.parse().ok()),
        location: header(&resp, "location"),
        body: Box::new(resp.into_body().into_reader()),
    }
}

fn check_status(resp: HttpResponse, url: &str) -> Result<HttpResponse, GlareError> {
    let status = resp.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(resp);
    }
    let body = read_body(resp).unwrap_or_default();
    Err(error_from_status(status, &body, url))
}

/// Map an unsuccessful status and its body to the error taxonomy.
pub(crate) fn error_from_status(status: u16, body: &[u8], url: &str) -> GlareError {
    let message = error_message(body);
    match status {
        401 => GlareError::Unauthorized(message),
        404 => GlareError::NotFound(if message.is_empty() {
            url.to_owned()
        } else {
            message
        }),
        _ => GlareError::Http { status, message },
    }
}

fn error_message(body: &[u8]) -> String {
    if let Ok(Value::Object(obj)) = serde_json::from_slice::<Value>(body) {
        for key in ["description", "message", "title"] {
            if let Some(msg) = obj.get(key).and_then(Value::as_str) {
                return msg.to_owned();
            }
        }
    }
    String::from_utf8_lossy(body).trim().to_owned()
}

fn parse_json_body(bytes: &[u8], is_json: bool) -> Result<Value, GlareError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(e) if is_json => Err(GlareError::Serialization(format!(
            "malformed JSON response: {e}"
        ))),
        Err(_) => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::ArtifactPages;
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    /// A captured HTTP request for header inspection.
    #[derive(Debug, Clone)]
    struct CapturedRequest {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    #[derive(Clone)]
    struct Canned {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    struct MockServer {
        addr: String,
        _handle: std::thread::JoinHandle<()>,
        routes: Arc<Mutex<HashMap<String, Canned>>>,
        requests: Arc<Mutex<Vec<CapturedRequest>>>,
    }

    impl MockServer {
        fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = format!("http://{}", listener.local_addr().unwrap());
            let routes: Arc<Mutex<HashMap<String, Canned>>> =
                Arc::new(Mutex::new(HashMap::new()));
            let requests: Arc<Mutex<Vec<CapturedRequest>>> = Arc::new(Mutex::new(Vec::new()));

            let routes_clone = Arc::clone(&routes);
            let requests_clone = Arc::clone(&requests);
            let handle = std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { break };
                    let routes = Arc::clone(&routes_clone);
                    let reqs = Arc::clone(&requests_clone);

                    std::thread::spawn(move || {
                        let mut reader = BufReader::new(stream.try_clone().unwrap());
                        let mut request_line = String::new();
                        if reader.read_line(&mut request_line).is_err() {
                            return;
                        }
                        let parts: Vec<&str> = request_line.trim().splitn(3, ' ').collect();
                        if parts.len() < 2 {
                            return;
                        }
                        let method = parts[0].to_owned();
                        let path = parts[1].to_owned();

                        let mut content_length: usize = 0;
                        let mut headers = HashMap::new();
                        loop {
                            let mut line = String::new();
                            if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                                break;
                            }
                            if let Some((k, v)) = line.trim().split_once(": ") {
                                headers.insert(k.to_lowercase(), v.to_owned());
                            }
                            let lower = line.to_lowercase();
                            if let Some(val) = lower.strip_prefix("content-length: ") {
                                content_length = val.trim().parse().unwrap_or(0);
                            }
                        }

                        let mut body = vec![0u8; content_length];
                        if content_length > 0 {
                            let _ = reader.read_exact(&mut body);
                        }

                        reqs.lock().unwrap().push(CapturedRequest {
                            method,
                            path: path.clone(),
                            headers,
                            body,
                        });

                        let canned = routes.lock().unwrap().get(&path).cloned().unwrap_or(Canned {
                            status: 404,
                            headers: Vec::new(),
                            body: b"not found".to_vec(),
                        });
                        let mut head = format!("HTTP/1.1 {} Mock\r\n", canned.status);
                        for (k, v) in &canned.headers {
                            head.push_str(&format!("{k}: {v}\r\n"));
                        }
                        head.push_str(&format!(
                            "Content-Length: {}\r\nConnection: close\r\n\r\n",
                            canned.body.len()
                        ));
                        let _ = stream.write_all(head.as_bytes());
                        let _ = stream.write_all(&canned.body);
                        let _ = stream.flush();
                    });
                }
            });

            MockServer {
                addr,
                _handle: handle,
                routes,
                requests,
            }
        }

        fn route(&self, path: &str, status: u16, headers: &[(&str, &str)], body: &[u8]) {
            self.routes.lock().unwrap().insert(
                path.to_owned(),
                Canned {
                    status,
                    headers: headers
                        .iter()
                        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                        .collect(),
                    body: body.to_vec(),
                },
            );
        }

        fn json_route(&self, path: &str, status: u16, body: &Value) {
            self.route(
                path,
                status,
                &[("Content-Type", "application/json")],
                body.to_string().as_bytes(),
            );
        }

        fn captured_requests(&self) -> Vec<CapturedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn test_client(url: &str) -> HttpClient {
        HttpClient::new(ClientConfig::new(url))
    }

    fn test_client_with_auth(url: &str, token: &str) -> HttpClient {
        HttpClient::new(ClientConfig::new(url).with_token(token))
    }

    #[test]
    fn http_get_parses_json_body() {
        let server = MockServer::start();
        server.json_route(
            "/artifacts/images/abc",
            200,
            &serde_json::json!({"id": "abc", "name": "art"}),
        );
        let client = test_client(&server.addr);
        let body = client.get("/artifacts/images/abc").unwrap();
        assert_eq!(body["name"], "art");
    }

    #[test]
    fn http_auth_token_sent_as_x_auth_token() {
        let server = MockServer::start();
        server.json_route("/schemas", 200, &serde_json::json!({"schemas": {}}));
        let client = test_client_with_auth(&server.addr, "secret-token-42");
        client.get("/schemas").unwrap();

        let reqs = server.captured_requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(
            reqs[0].headers.get("x-auth-token"),
            Some(&"secret-token-42".to_owned())
        );
        assert!(reqs[0]
            .headers
            .get("user-agent")
            .is_some_and(|ua| ua.starts_with("glare-client/")));
    }

    #[test]
    fn http_no_auth_header_without_token() {
        let server = MockServer::start();
        server.json_route("/schemas", 200, &serde_json::json!({"schemas": {}}));
        let client = test_client(&server.addr);
        client.get("/schemas").unwrap();

        let reqs = server.captured_requests();
        assert!(
            !reqs[0].headers.contains_key("x-auth-token"),
            "no auth token configured, X-Auth-Token must not be sent"
        );
    }

    #[test]
    fn http_patch_sends_body_and_content_type() {
        let server = MockServer::start();
        server.json_route("/artifacts/images/abc", 200, &serde_json::json!({"id": "abc"}));
        let client = test_client(&server.addr);
        let body = br#"[{"op":"add","path":"/name","value":"x"}]"#;
        client
            .json_request(
                Method::Patch,
                "/artifacts/images/abc",
                Some("application/json-patch+json"),
                Some(body),
            )
            .unwrap();

        let reqs = server.captured_requests();
        assert_eq!(reqs[0].method, "PATCH");
        assert_eq!(
            reqs[0].headers.get("content-type"),
            Some(&"application/json-patch+json".to_owned())
        );
        assert_eq!(reqs[0].body, body);
    }

    #[test]
    fn http_empty_body_decodes_to_null() {
        let server = MockServer::start();
        server.route("/artifacts/images/abc", 204, &[], b"");
        let client = test_client(&server.addr);
        let body = client
            .json_request(Method::Delete, "/artifacts/images/abc", None, None)
            .unwrap();
        assert!(body.is_null());
    }

    #[test]
    fn http_401_is_unauthorized() {
        let server = MockServer::start();
        server.route("/schemas", 401, &[], b"token expired");
        let client = test_client(&server.addr);
        let err = client.get("/schemas").unwrap_err();
        match err {
            GlareError::Unauthorized(msg) => assert!(msg.contains("token expired")),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn http_404_is_not_found() {
        let server = MockServer::start();
        let client = test_client(&server.addr);
        let err = client.get("/artifacts/images/missing").unwrap_err();
        assert!(matches!(err, GlareError::NotFound(_)));
    }

    #[test]
    fn http_error_message_taken_from_json_description() {
        let server = MockServer::start();
        server.json_route(
            "/artifacts/images",
            409,
            &serde_json::json!({"title": "Conflict", "description": "artifact exists"}),
        );
        let client = test_client(&server.addr);
        let err = client
            .json_request(Method::Post, "/artifacts/images", None, Some(b"{}"))
            .unwrap_err();
        match err {
            GlareError::Http { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "artifact exists");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn http_malformed_json_reply_is_serialization_error() {
        let server = MockServer::start();
        server.route(
            "/schemas",
            200,
            &[("Content-Type", "application/json")],
            b"{not json",
        );
        let client = test_client(&server.addr);
        let err = client.get("/schemas").unwrap_err();
        assert!(matches!(err, GlareError::Serialization(_)));
    }

    #[test]
    fn http_redirect_inside_endpoint_followed_once() {
        let server = MockServer::start();
        let target = format!("{}/schemas/images", server.addr);
        server.route("/schemas/image", 302, &[("Location", &target)], b"");
        server.json_route(
            "/schemas/images",
            200,
            &serde_json::json!({"schemas": {"images": {}}}),
        );
        let client = test_client_with_auth(&server.addr, "tok");
        let body = client.get("/schemas/image").unwrap();
        assert!(body["schemas"]["images"].is_object());

        let reqs = server.captured_requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].path, "/schemas/images");
    }

    #[test]
    fn http_redirect_outside_endpoint_is_prohibited() {
        let server = MockServer::start();
        server.route(
            "/schemas",
            301,
            &[("Location", "http://elsewhere.example.com/schemas")],
            b"",
        );
        let client = test_client(&server.addr);
        let err = client.get("/schemas").unwrap_err();
        assert!(matches!(err, GlareError::InvalidEndpoint(_)));
    }

    #[test]
    fn http_redirect_to_lookalike_origin_is_prohibited() {
        let server = MockServer::start();
        let other = MockServer::start();
        let lookalike = format!("{}.evil.example/schemas", server.addr);
        let other_port = format!("{}/schemas", other.addr);
        server.route("/schemas", 302, &[("Location", &lookalike)], b"");
        server.route("/schemas/images", 302, &[("Location", &other_port)], b"");
        let client = test_client_with_auth(&server.addr, "internal-secret");

        for path in ["/schemas", "/schemas/images"] {
            let err = client.get(path).unwrap_err();
            assert!(matches!(err, GlareError::InvalidEndpoint(_)), "{path}: {err:?}");
        }
        assert_eq!(server.captured_requests().len(), 2);
        assert!(other.captured_requests().is_empty());
    }

    #[test]
    fn http_redirect_without_location_is_invalid_endpoint() {
        let server = MockServer::start();
        server.route("/schemas", 302, &[], b"");
        let client = test_client(&server.addr);
        let err = client.get("/schemas").unwrap_err();
        assert!(matches!(err, GlareError::InvalidEndpoint(_)));
    }

    #[test]
    fn http_get_blob_does_not_follow_redirect() {
        let server = MockServer::start();
        server.route(
            "/artifacts/images/abc/image",
            302,
            &[("Location", "http://store.example.com/blob"), ("Content-MD5", "d41d8cd98f00b204e9800998ecf8427e")],
            b"",
        );
        let client = test_client(&server.addr);
        let resp = client.get_blob("/artifacts/images/abc/image").unwrap();
        assert!(resp.is_redirect());
        assert_eq!(resp.location.as_deref(), Some("http://store.example.com/blob"));
        assert_eq!(
            resp.content_md5.as_deref(),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
        assert_eq!(server.captured_requests().len(), 1);
    }

    #[test]
    fn http_get_blob_streams_body_with_headers() {
        let server = MockServer::start();
        server.route(
            "/artifacts/images/abc/image",
            200,
            &[("Content-Type", "application/octet-stream"), ("Content-MD5", "8d777f385d3dfec8815d20f7496026dc")],
            b"data",
        );
        let client = test_client_with_auth(&server.addr, "tok");
        let mut resp = client.get_blob("/artifacts/images/abc/image").unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_length, Some(4));
        let mut bytes = Vec::new();
        resp.body.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"data");

        let reqs = server.captured_requests();
        assert_eq!(reqs[0].headers.get("accept"), Some(&"*/*".to_owned()));
        assert_eq!(reqs[0].headers.get("x-auth-token"), Some(&"tok".to_owned()));
    }

    #[test]
    fn http_get_external_sends_no_credentials() {
        let server = MockServer::start();
        server.route("/external/blob", 200, &[], b"external-bytes");
        let client = test_client_with_auth(&server.addr, "internal-secret");
        let url = format!("{}/external/blob", server.addr);
        let mut resp = client.get_external(&url).unwrap();
        let mut bytes = Vec::new();
        resp.body.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"external-bytes");

        let reqs = server.captured_requests();
        assert!(
            !reqs[0].headers.contains_key("x-auth-token"),
            "external store must never see the service token"
        );
        assert_eq!(
            reqs[0].headers.get("accept-encoding"),
            Some(&"identity".to_owned())
        );
    }

    #[test]
    fn http_put_stream_sends_bytes_and_length() {
        let server = MockServer::start();
        server.route("/artifacts/images/abc/image", 200, &[], b"");
        let client = test_client(&server.addr);
        let mut source: &[u8] = b"blob-bytes";
        client
            .put_stream(
                "/artifacts/images/abc/image",
                "application/test",
                Some(10),
                &mut source,
            )
            .unwrap();

        let reqs = server.captured_requests();
        assert_eq!(reqs[0].method, "PUT");
        assert_eq!(
            reqs[0].headers.get("content-type"),
            Some(&"application/test".to_owned())
        );
        assert_eq!(reqs[0].body, b"blob-bytes");
    }

    #[test]
    fn http_connection_refused_is_communication_error() {
        let client = test_client("http://127.0.0.1:1");
        let err = client.get("/schemas").unwrap_err();
        assert!(matches!(err, GlareError::Communication { .. }));
    }

    #[test]
    fn url_for_accepts_absolute_url_under_endpoint() {
        let client = test_client("http://glare.local:9494");
        assert_eq!(
            client
                .url_for("http://glare.local:9494/artifacts/images?marker=x")
                .unwrap(),
            "http://glare.local:9494/artifacts/images?marker=x"
        );
        assert_eq!(
            client.url_for("artifacts/images").unwrap(),
            "http://glare.local:9494/artifacts/images"
        );
        assert!(client.url_for("http://other.host/artifacts").is_err());
    }

    #[test]
    fn url_for_rejects_lookalike_hosts_and_ports() {
        let client = test_client("http://glare.local:9494");
        for url in [
            "http://glare.local:9494.attacker.net/artifacts/images",
            "http://glare.local:94945/artifacts/images",
            "http://glare.local:9495/artifacts/images",
            "https://glare.local:9494/artifacts/images",
            "http://glare.local.attacker.net:9494/artifacts/images",
            "http://user@glare.local:9494/artifacts/images",
        ] {
            assert!(
                matches!(client.url_for(url), Err(GlareError::InvalidEndpoint(_))),
                "{url} must be rejected"
            );
        }
    }

    #[test]
    fn url_for_keeps_endpoint_path_boundary() {
        let client = test_client("https://cloud.example/glare/");
        assert_eq!(
            client
                .url_for("https://cloud.example:443/glare/artifacts/images?limit=2")
                .unwrap(),
            "https://cloud.example/glare/artifacts/images?limit=2"
        );
        assert!(client.url_for("https://cloud.example/glare").is_ok());
        assert!(client
            .url_for("https://cloud.example/glarex/artifacts/images")
            .is_err());
        assert!(client.url_for("https://cloud.example/artifacts").is_err());
    }

    #[test]
    fn next_link_off_endpoint_ends_listing_without_request() {
        let server = MockServer::start();
        let other = MockServer::start();
        server.json_route(
            "/artifacts/images?limit=1",
            200,
            &serde_json::json!({
                "images": [{"id": "a"}],
                "next": format!("{}/artifacts/images?marker=a", other.addr),
            }),
        );
        let client = test_client_with_auth(&server.addr, "internal-secret");
        let mut pages = ArtifactPages::new(
            &client,
            "images",
            "/artifacts/images?limit=1".to_owned(),
            1,
            None,
        );

        assert_eq!(pages.next().unwrap().unwrap()["id"], "a");
        assert!(matches!(
            pages.next(),
            Some(Err(GlareError::InvalidEndpoint(_)))
        ));
        assert!(pages.next().is_none());
        assert!(other.captured_requests().is_empty());
    }

    #[test]
    fn method_display_is_uppercase() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }
}
