//! Response sinks: where handlers write status, headers and body bytes.
//!
//! A handler never builds a response value and returns it. It receives a
//! [`Writer`] and pushes into it, the way a socket-backed writer works: the
//! status goes first and is decided once, bytes follow. That shape is what
//! lets the middleware in [`crate::middleware`] sit between the handler and
//! the transport and decide, after the fact, what the client actually sees.
//!
//! ```text
//! handler ──write──▶ Interceptor (hook) ──▶ HttpSink ──take_response──▶ hyper
//! ```

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::Error;

/// Destination for one response.
///
/// Every method takes `&self`: a handler may hand clones of its [`Writer`] to
/// several tasks, so implementations serialize internally.
pub trait ResponseSink: Send + Sync {
    /// Sets the status code. Only the first call has any effect.
    fn set_status(&self, status: StatusCode);

    /// Sets a header, replacing any earlier values of `name`. Headers set
    /// after the status was sent are ignored by transport sinks.
    fn insert_header(&self, name: HeaderName, value: HeaderValue);

    /// Adds a header value, keeping earlier values of `name` (`set-cookie`).
    fn append_header(&self, name: HeaderName, value: HeaderValue);

    /// Appends body bytes, implicitly sending `200 OK` if no status was set.
    fn write(&self, buf: &[u8]) -> Result<usize, Error>;

    /// Whether a status has been sent (explicitly or by a first write).
    fn written(&self) -> bool;
}

/// Shared handle to a response sink, handed to every handler.
pub type Writer = Arc<dyn ResponseSink>;

impl<S: ResponseSink + ?Sized> ResponseSink for Arc<S> {
    fn set_status(&self, status: StatusCode) { (**self).set_status(status) }
    fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        (**self).insert_header(name, value)
    }
    fn append_header(&self, name: HeaderName, value: HeaderValue) {
        (**self).append_header(name, value)
    }
    fn write(&self, buf: &[u8]) -> Result<usize, Error> { (**self).write(buf) }
    fn written(&self) -> bool { (**self).written() }
}

// ── HttpSink ──────────────────────────────────────────────────────────────────

/// The transport end of the chain: accumulates one response for hyper.
///
/// Behaves like a real connection writer. The first status wins and every
/// later one is dropped with a warning. Headers are frozen once the status
/// is out. A write without a prior status sends `200 OK`.
#[derive(Default)]
pub struct HttpSink {
    state: Mutex<HttpState>,
}

#[derive(Default)]
struct HttpState {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl HttpSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status sent so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.state.lock().status
    }

    /// Drains the sink into a hyper-compatible response.
    ///
    /// A sink nothing was ever written to yields an empty `200 OK`, which is
    /// what a transport sends for a handler that returned silently.
    pub fn take_response(&self) -> http::Response<Full<Bytes>> {
        let mut state = self.state.lock();
        let body = std::mem::take(&mut state.body).freeze();
        let mut res = http::Response::new(Full::new(body));
        *res.status_mut() = state.status.take().unwrap_or(StatusCode::OK);
        *res.headers_mut() = std::mem::take(&mut state.headers);
        res
    }
}

impl ResponseSink for HttpSink {
    fn set_status(&self, status: StatusCode) {
        let mut state = self.state.lock();
        match state.status {
            Some(sent) => warn!(sent = sent.as_u16(), ignored = status.as_u16(), "superfluous set_status call"),
            None => state.status = Some(status),
        }
    }

    fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        let mut state = self.state.lock();
        if state.status.is_none() {
            state.headers.insert(name, value);
        }
    }

    fn append_header(&self, name: HeaderName, value: HeaderValue) {
        let mut state = self.state.lock();
        if state.status.is_none() {
            state.headers.append(name, value);
        }
    }

    fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        let mut state = self.state.lock();
        state.status.get_or_insert(StatusCode::OK);
        state.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn written(&self) -> bool {
        self.state.lock().status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONTENT_TYPE, SET_COOKIE};

    #[test]
    fn test_first_status_wins() {
        let sink = HttpSink::new();
        sink.set_status(StatusCode::CREATED);
        sink.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(sink.take_response().status(), StatusCode::CREATED);
    }

    #[test]
    fn test_write_implies_ok() {
        let sink = HttpSink::new();
        assert!(!sink.written());
        sink.write(b"hi").unwrap();
        assert!(sink.written());
        sink.set_status(StatusCode::NOT_FOUND);
        assert_eq!(sink.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_headers_frozen_after_status() {
        let sink = HttpSink::new();
        sink.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        sink.set_status(StatusCode::OK);
        sink.insert_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let res = sink.take_response();
        assert_eq!(res.headers()[CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn test_append_keeps_repeated_headers() {
        let sink = HttpSink::new();
        sink.append_header(SET_COOKIE, HeaderValue::from_static("a=1"));
        sink.append_header(SET_COOKIE, HeaderValue::from_static("b=2"));
        sink.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let res = sink.take_response();
        let cookies: Vec<_> = res.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
    }

    #[test]
    fn test_untouched_sink_is_empty_ok() {
        let res = HttpSink::new().take_response();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().is_empty());
    }
}
