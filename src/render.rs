//! Error payloads and the renderers that encode them onto a sink.

use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use serde::Serialize;

use crate::error::Error;
use crate::sink::ResponseSink;

/// The body a client receives in place of a failed handler's output.
///
/// Serializes as `{"message": …, "error": "Internal Server Error", "status": 500}`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
    /// Reason phrase of `status`, e.g. `"Bad Gateway"`.
    pub error: String,
    pub status: u16,
}

impl ErrorPayload {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: status.canonical_reason().unwrap_or("Unknown Status").to_owned(),
            status: status.as_u16(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Encodes an [`ErrorPayload`] as a complete response.
///
/// Implementations set the content type, then the payload's status, then
/// write the body. They must work on a sink nothing has been written to.
pub trait Renderer: Send + Sync {
    fn render_error(&self, sink: &dyn ResponseSink, payload: &ErrorPayload) -> Result<(), Error>;
}

/// `application/json` renderer. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render_error(&self, sink: &dyn ResponseSink, payload: &ErrorPayload) -> Result<(), Error> {
        let body = serde_json::to_vec(payload)?;
        sink.insert_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        sink.set_status(payload.status_code());
        sink.write(&body)?;
        Ok(())
    }
}

/// `text/plain` renderer: the body is the message alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render_error(&self, sink: &dyn ResponseSink, payload: &ErrorPayload) -> Result<(), Error> {
        sink.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        sink.set_status(payload.status_code());
        sink.write(payload.message.as_bytes())?;
        Ok(())
    }
}
