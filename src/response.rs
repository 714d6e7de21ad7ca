//! Handler-side response values.
//!
//! Handlers may write to their [`Writer`](crate::Writer) piecemeal, but most
//! just have one status, a few headers and a body. Build a [`Response`] and
//! [`send`](Response::send) it; that is the entire job description.

use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderValue, StatusCode};

use crate::error::Error;
use crate::sink::ResponseSink;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Csv,          // text/csv
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
    Yaml,         // application/yaml
}

impl ContentType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
            Self::Yaml        => "application/yaml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// A complete response, ready to be sent onto a sink.
///
/// ```rust
/// use http::StatusCode;
/// use veil::{ContentType, Response};
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .bytes(ContentType::Xml, b"<ok/>".to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    body: Vec<u8>,
    headers: Vec<(HeaderName, HeaderValue)>,
    status: StatusCode,
}

impl Response {
    /// `200 OK` with `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().bytes(ContentType::Json, body)
    }

    /// `200 OK` with `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Vec::new(), headers: Vec::new(), status: code }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK, invalid: None }
    }

    /// Writes headers, status and body onto `sink`, in that order.
    ///
    /// Repeated header names are all sent.
    pub fn send(self, sink: &dyn ResponseSink) -> Result<(), Error> {
        for (name, value) in self.headers {
            sink.append_header(name, value);
        }
        sink.set_status(self.status);
        if !self.body.is_empty() {
            sink.write(&self.body)?;
        }
        Ok(())
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method, so the content type is always set;
/// an explicit `content-type` header overrides the typed one. Invalid header
/// names or values are dropped by [`header`](Self::header) with a warning;
/// use [`try_header`](Self::try_header) to get the error instead.
pub struct ResponseBuilder {
    headers: Vec<(HeaderName, HeaderValue)>,
    status: StatusCode,
    invalid: Option<String>,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        match parse_header(name, value) {
            Ok(header) => self.headers.push(header),
            Err(_) => self.invalid = Some(name.to_owned()),
        }
        self
    }

    pub fn try_header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        self.headers.push(parse_header(name, value)?);
        Ok(self)
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish(ContentType::Json, body)
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text, body.into().into_bytes())
    }

    /// Terminate with a typed body. Use this for XML, YAML, HTML, binary, etc.
    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.finish(content_type, body)
    }

    /// Terminate with no body (e.g. `204 No Content`, `301 Moved Permanently`).
    pub fn no_body(self) -> Response {
        self.warn_invalid();
        Response { body: Vec::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.warn_invalid();
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        if !self.headers.iter().any(|(name, _)| name == CONTENT_TYPE) {
            headers.push((CONTENT_TYPE, HeaderValue::from_static(content_type.as_str())));
        }
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }

    fn warn_invalid(&self) {
        if let Some(name) = &self.invalid {
            tracing::warn!(header = %name, "dropping invalid response header");
        }
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), Error> {
    match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
        (Ok(name), Ok(value)) => Ok((name, value)),
        _ => Err(Error::InvalidHeader(name.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::HttpSink;

    #[test]
    fn test_send_sets_headers_status_body() {
        let sink = HttpSink::new();
        Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/99")
            .json(br#"{"id":"99"}"#.to_vec())
            .send(&sink)
            .unwrap();

        let res = sink.take_response();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(res.headers()["location"], "/users/99");
    }

    #[test]
    fn test_invalid_header_is_dropped() {
        let sink = HttpSink::new();
        Response::builder()
            .header("bad header", "x")
            .text("ok")
            .send(&sink)
            .unwrap();
        let res = sink.take_response();
        assert_eq!(res.headers().len(), 1);
    }

    #[test]
    fn test_try_header_reports_invalid_name() {
        let err = Response::builder().try_header("bad header", "x").err();
        assert!(matches!(err, Some(Error::InvalidHeader(name)) if name == "bad header"));
    }

    #[test]
    fn test_repeated_headers_are_all_sent() {
        let sink = HttpSink::new();
        Response::builder()
            .header("set-cookie", "a=1")
            .header("set-cookie", "b=2")
            .header("content-type", "text/csv")
            .text("ok")
            .send(&sink)
            .unwrap();

        let res = sink.take_response();
        let cookies: Vec<_> = res.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        assert_eq!(res.headers().get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(res.headers()[CONTENT_TYPE], "text/csv");
    }

    #[test]
    fn test_status_only_writes_no_body() {
        let sink = HttpSink::new();
        Response::status(StatusCode::NO_CONTENT).send(&sink).unwrap();
        assert_eq!(sink.status(), Some(StatusCode::NO_CONTENT));
    }
}
