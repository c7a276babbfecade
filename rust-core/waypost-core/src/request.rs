//! # HTTP Request
//!
//! Request identity and parameter sources consumed by the router.
//!
//! The query string is parsed eagerly. The `form` and `files` sources stand in
//! for whatever the HTTP runtime decoded from a POST body; the hyper adapter
//! fills `form` for url-encoded POST bodies, other runtimes set them directly.

use crate::error::{Error, Result};
use crate::form::{parse_urlencoded, parse_urlencoded_bytes};
use crate::multipart::UploadedFile;
use crate::negotiate::Negotiator;
use crate::router::Method;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::warn;

/// `application/x-www-form-urlencoded`
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// `multipart/form-data`
pub const MULTIPART_FORM: &str = "multipart/form-data";

/// Inbound HTTP request as seen by the router
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Raw query string (e.g., "page=1&limit=10")
    query_string: Option<String>,
    /// Parsed query parameters
    query_params: HashMap<String, String>,
    /// Form fields decoded by the runtime
    form_params: HashMap<String, String>,
    /// Uploads decoded by the runtime
    files: HashMap<String, UploadedFile>,
    /// Request headers
    headers: HeaderMap,
    /// Request body
    body: Bytes,
    /// Peer address, when known
    remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Create a request from its parts
    ///
    /// `uri` may carry a query string. Headers that are not valid HTTP header
    /// names or values are dropped.
    pub fn new<I, K, V>(method: Method, uri: &str, headers: I, body: Option<Bytes>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let (path, query_string) = match uri.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (uri.to_string(), None),
        };

        let mut request = Self {
            method,
            path,
            query_params: query_string.as_deref().map(parse_urlencoded).unwrap_or_default(),
            query_string,
            form_params: HashMap::new(),
            files: HashMap::new(),
            headers: HeaderMap::new(),
            body: body.unwrap_or_default(),
            remote_addr: None,
        };
        for (k, v) in headers {
            request.set_header(k.as_ref(), v.as_ref());
        }
        request
    }

    /// Create from a hyper request with a body size limit
    ///
    /// Url-encoded POST bodies are decoded into the form source.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedMethod` for methods the router does not know,
    /// `Error::PayloadTooLarge` when the declared or actual body exceeds
    /// `max_body_size`, and `Error::BodyRead` when the body stream fails.
    pub async fn from_hyper<B>(req: hyper::Request<B>, max_body_size: usize) -> Result<Self>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let method: Method = req.method().as_str().parse()?;

        let uri = req.uri();
        let path = uri.path().to_string();
        let query_string = uri.query().map(String::from);
        let headers = req.headers().clone();

        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(actual) = declared.filter(|len| *len > max_body_size) {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual,
            });
        }

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(error = %e, path = %path, "Failed to read request body");
                return Err(Error::BodyRead {
                    reason: e.to_string(),
                });
            }
        };
        if body.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: body.len(),
            });
        }

        let mut request = Self {
            method,
            path,
            query_params: query_string.as_deref().map(parse_urlencoded).unwrap_or_default(),
            query_string,
            form_params: HashMap::new(),
            files: HashMap::new(),
            headers,
            body,
            remote_addr: None,
        };
        if request.method == Method::Post && request.negotiator().is_content_type(FORM_URLENCODED, false) {
            request.form_params = parse_urlencoded_bytes(&request.body);
        }
        Ok(request)
    }

    /// Set the runtime-decoded form fields
    #[must_use]
    pub fn with_form(mut self, form: HashMap<String, String>) -> Self {
        self.form_params = form;
        self
    }

    /// Set the runtime-decoded uploads
    #[must_use]
    pub fn with_files(mut self, files: HashMap<String, UploadedFile>) -> Self {
        self.files = files;
        self
    }

    /// Record the peer address
    #[must_use]
    pub const fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Negotiator over this request's `Content-Type` and `Accept`
    #[must_use]
    pub fn negotiator(&self) -> Negotiator {
        Negotiator::new(
            self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            self.headers.get(ACCEPT).and_then(|v| v.to_str().ok()),
        )
    }

    /// Get query parameters
    #[must_use]
    pub const fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Get runtime-decoded form fields
    #[must_use]
    pub const fn form_map(&self) -> &HashMap<String, String> {
        &self.form_params
    }

    /// Get runtime-decoded uploads
    #[must_use]
    pub const fn files(&self) -> &HashMap<String, UploadedFile> {
        &self.files
    }

    /// Query and form parameters merged, form values winning
    #[must_use]
    pub fn merged_params(&self) -> HashMap<String, String> {
        let mut merged = self.query_params.clone();
        merged.extend(self.form_params.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Get the request body as string (UTF-8)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Peer address, when known
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    #[test]
    fn test_new_splits_query() {
        let req = Request::new(Method::Get, "/search?q=rust+lang&page=2", [("Accept", "text/html")], None);
        assert_eq!(req.path, "/search");
        assert_eq!(req.query_string(), Some("q=rust+lang&page=2"));
        assert_eq!(req.query_map().get("q"), Some(&"rust lang".to_string()));
        assert_eq!(req.header("accept"), Some("text/html"));
    }

    #[test]
    fn test_merged_params_form_wins() {
        let form = HashMap::from([("a".to_string(), "form".to_string())]);
        let req = Request::new(Method::Post, "/x?a=query&b=2", Vec::<(&str, &str)>::new(), None).with_form(form);
        let merged = req.merged_params();
        assert_eq!(merged.get("a"), Some(&"form".to_string()));
        assert_eq!(merged.get("b"), Some(&"2".to_string()));
    }

    #[test]
    fn test_invalid_header_dropped() {
        let req = Request::new(Method::Get, "/", [("bad header", "x")], None);
        assert!(req.header("bad header").is_none());
    }

    #[test]
    fn test_from_hyper_decodes_form_post() {
        let req = hyper::Request::builder()
            .method("POST")
            .uri("/login?next=%2Fhome")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from("user=ann&pass=secret")))
            .unwrap();

        let req = tokio_test::block_on(Request::from_hyper(req, 1024)).unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.query_map().get("next"), Some(&"/home".to_string()));
        assert_eq!(req.form_map().get("user"), Some(&"ann".to_string()));
    }

    #[test]
    fn test_from_hyper_rejects_large_body() {
        let req = hyper::Request::builder()
            .method("PUT")
            .uri("/upload")
            .body(Full::new(Bytes::from(vec![b'x'; 64])))
            .unwrap();

        let result = tokio_test::block_on(Request::from_hyper(req, 16));
        assert!(matches!(result, Err(Error::PayloadTooLarge { limit: 16, actual: 64 })));
    }

    struct BrokenBody;

    impl hyper::body::Body for BrokenBody {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<std::result::Result<hyper::body::Frame<Self::Data>, Self::Error>>> {
            std::task::Poll::Ready(Some(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))))
        }
    }

    #[test]
    fn test_from_hyper_body_read_failure() {
        let req = hyper::Request::builder()
            .method("PUT")
            .uri("/profile")
            .header("content-type", "application/json")
            .body(BrokenBody)
            .unwrap();

        let result = tokio_test::block_on(Request::from_hyper(req, 1024));
        assert!(matches!(result, Err(Error::BodyRead { ref reason }) if reason.contains("connection reset")));
    }

    #[test]
    fn test_from_hyper_unknown_method() {
        let req = hyper::Request::builder()
            .method("BREW")
            .uri("/pot")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let result = tokio_test::block_on(Request::from_hyper(req, 16));
        assert!(matches!(result, Err(Error::UnsupportedMethod { .. })));
    }
}
