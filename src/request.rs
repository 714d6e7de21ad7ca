//! Incoming HTTP request type.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, request::Parts};

/// An incoming HTTP request with its body fully read.
///
/// Cloning is cheap: the head sits behind an `Arc` and the body is a
/// reference-counted [`Bytes`]. The panic-recovery layer keeps a clone so it
/// can report the method and URL of a request whose handler blew up.
#[derive(Clone, Debug)]
pub struct Request {
    head: Arc<Parts>,
    body: Bytes,
}

impl Request {
    pub fn new(head: Parts, body: Bytes) -> Self {
        Self { head: Arc::new(head), body }
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        Self::new(head, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_ignores_case() {
        let req: Request = http::Request::builder()
            .method(Method::POST)
            .uri("/users?page=2")
            .header("Content-Type", "application/json")
            .body(Bytes::from_static(b"{}"))
            .unwrap()
            .into();

        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("x-missing"), None);
        assert_eq!(req.path(), "/users");
        assert_eq!(req.uri().to_string(), "/users?page=2");
        assert_eq!(req.body(), b"{}");
    }

    #[test]
    fn test_clone_shares_body() {
        let req: Request = http::Request::new(Bytes::from_static(b"payload")).into();
        let copy = req.clone();
        assert_eq!(copy.body().as_ptr(), req.body().as_ptr());
    }
}
