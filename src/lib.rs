//! # veil
//!
//! Response interception, server-fault redaction and panic recovery for
//! hyper services. A handler's internals never reach the client by accident.
//!
//! ## The contract
//!
//! Handlers write into a [`Writer`]. Between the handler and the transport
//! sits an [`Interceptor`](middleware::Interceptor) that latches the first
//! status, counts bytes and, depending on its [`Hook`](middleware::Hook),
//! forwards, mirrors or holds back what the handler writes.
//!
//! On top of it, two layers decide what the client finally sees:
//!
//! - **Redaction**: a `5xx` written by the handler is logged with its original
//!   body, then replaced by a generic `{message, error, status}` payload.
//!   Anything below `500` goes out untouched.
//! - **Recovery**: a panic, whatever it panicked with, becomes a `500` with the
//!   panic's message. The request task survives.
//!
//! Routing, body decoding, TLS and process lifecycle are not veil's business.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use veil::{Pipeline, Request, Response, Writer, handler_fn};
//!
//! async fn create_user(req: Request, w: Writer) {
//!     if req.body().is_empty() {
//!         let _ = Response::status(StatusCode::BAD_REQUEST).send(&w);
//!         return;
//!     }
//!     // A failure here is logged in full and the client sees only
//!     // {"message":"Internal Server Error", …}.
//!     let _ = Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(br#"{"id":"99"}"#.to_vec())
//!         .send(&w);
//! }
//!
//! # async fn run() -> Result<(), veil::Error> {
//! let _service = Pipeline::builder(handler_fn(create_user)).build()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod handler;
mod log;
mod render;
mod request;
mod response;
mod service;
mod sink;

pub mod middleware;
pub mod testing;

pub use config::{Config, DEFAULT_ERROR_MESSAGE};
pub use error::Error;
pub use handler::{BoxFuture, FnHandler, Handler, handler_fn};
pub use log::{Field, FieldValue, Level, Logger, TracingLogger};
pub use render::{ErrorPayload, JsonRenderer, Renderer, TextRenderer};
pub use request::Request;
pub use response::{ContentType, Response, ResponseBuilder};
pub use service::{Pipeline, PipelineBuilder, Service};
pub use sink::{HttpSink, ResponseSink, Writer};
