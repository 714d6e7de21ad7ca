//! Per-request pipeline and the hyper-facing service.
//!
//! [`Pipeline::builder`] assembles the standard stack around a handler:
//!
//! ```text
//! Recovery → ErrorRedaction → handler
//! ```
//!
//! and [`Service`] drives it once per request against a fresh [`HttpSink`].
//! Accepting connections, routing and shutdown stay with the caller; plug
//! [`Service::serve`] into `hyper::service::service_fn` and you are done:
//!
//! ```rust,ignore
//! let svc = service.clone();
//! let hyper_svc = hyper::service::service_fn(move |req| {
//!     let svc = svc.clone();
//!     async move { svc.serve(req).await }
//! });
//! ```

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use tracing::warn;

use crate::config::Config;
use crate::error::Error;
use crate::handler::Handler;
use crate::log::{Field, Level, Logger};
use crate::middleware::{
    Collaborators, ErrorRedaction, Hook, Interceptor, PanicCallback, RecoveredPanic, Recovery,
    RedactCallback,
};
use crate::render::Renderer;
use crate::request::Request;
use crate::sink::HttpSink;

/// Entry point for building a [`Service`].
pub struct Pipeline;

impl Pipeline {
    pub fn builder<H: Handler>(handler: H) -> PipelineBuilder<H> {
        PipelineBuilder {
            handler,
            config: Config::default(),
            collab: Collaborators::default(),
            on_panic: None,
            on_redact: None,
        }
    }
}

/// Fluent builder for the standard middleware stack.
pub struct PipelineBuilder<H> {
    handler: H,
    config: Config,
    collab: Collaborators,
    on_panic: Option<PanicCallback>,
    on_redact: Option<RedactCallback>,
}

impl<H: Handler> PipelineBuilder<H> {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.collab = self.collab.renderer(renderer);
        self
    }

    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.collab = self.collab.logger(logger);
        self
    }

    pub fn on_panic(mut self, f: impl Fn(&Request, &RecoveredPanic) + Send + Sync + 'static) -> Self {
        self.on_panic = Some(Arc::new(f));
        self
    }

    pub fn on_redact(mut self, f: impl Fn(StatusCode, &[u8]) + Send + Sync + 'static) -> Self {
        self.on_redact = Some(Arc::new(f));
        self
    }

    /// Validates the config and wires the stack.
    pub fn build(self) -> Result<Service, Error> {
        self.config.validate()?;
        let redaction = ErrorRedaction::with_parts(
            self.handler,
            Arc::new(self.config),
            self.collab.clone(),
            self.on_redact,
        );
        let logger = Arc::clone(&self.collab.logger);
        let recovery = Recovery::with_parts(redaction, self.collab, self.on_panic);
        Ok(Service { handler: Arc::new(recovery), logger })
    }
}

/// A built pipeline. Cheap to clone; share one per server.
#[derive(Clone)]
pub struct Service {
    handler: Arc<dyn Handler>,
    logger: Arc<dyn Logger>,
}

impl Service {
    /// Runs the pipeline once for `req` and returns what the client gets.
    ///
    /// The outermost layer is a `Forward` interceptor whose snapshot feeds a
    /// single `info` access-log record per request, sent to the pipeline's
    /// [`Logger`].
    pub async fn handle(&self, req: Request) -> http::Response<Full<Bytes>> {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.path().to_owned();

        let sink = Arc::new(HttpSink::new());
        let meter = Arc::new(Interceptor::new(sink.clone(), Hook::Forward));
        self.handler.call(req, meter.clone()).await;

        let snapshot = meter.snapshot();
        let elapsed_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.logger.log(
            Level::Info,
            "request completed",
            &[
                Field::str("method", method.as_str()),
                Field::str("path", &path),
                Field::int("status", snapshot.status.unwrap_or(StatusCode::OK).as_u16()),
                Field::int("bytes", i64::try_from(snapshot.bytes).unwrap_or(i64::MAX)),
                Field::int("elapsed_ms", elapsed_ms),
            ],
        );
        sink.take_response()
    }

    /// hyper adapter: reads the body, then [`handle`](Self::handle)s it.
    ///
    /// The error type is [`Infallible`]: a body that cannot be read becomes a
    /// bare `400 Bad Request` and everything else is handled by the pipeline.
    pub async fn serve<B>(&self, req: http::Request<B>) -> Result<http::Response<Full<Bytes>>, Infallible>
    where
        B: hyper::body::Body,
        B::Error: Display,
    {
        let (head, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(path = %head.uri.path(), "read request body: {e}");
                let mut res = http::Response::new(Full::new(Bytes::new()));
                *res.status_mut() = StatusCode::BAD_REQUEST;
                return Ok(res);
            }
        };
        Ok(self.handle(Request::new(head, body)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::sink::{ResponseSink, Writer};
    use crate::testing::{Recorded, RecordingLogger};

    #[tokio::test]
    async fn test_build_rejects_bad_threshold() {
        let handler = handler_fn(|_, _w: Writer| async move {});
        let config = Config { server_fault_threshold: 499, ..Config::default() };
        let err = Pipeline::builder(handler).config(config).build().err();
        assert!(matches!(err, Some(Error::Threshold(499))));
    }

    #[tokio::test]
    async fn test_serve_collects_body() {
        let service = Pipeline::builder(handler_fn(|req: Request, w: Writer| async move {
            w.write(req.body()).unwrap();
        }))
        .build()
        .unwrap();

        let req = http::Request::new(Full::new(Bytes::from_static(b"echo")));
        let res = service.serve(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"echo");
    }

    #[tokio::test]
    async fn test_access_log_goes_to_configured_logger() {
        let logger = RecordingLogger::new();
        let service = Pipeline::builder(handler_fn(|_, w: Writer| async move {
            w.set_status(StatusCode::NOT_FOUND);
            w.write(b"missing").unwrap();
        }))
        .logger(logger.clone())
        .build()
        .unwrap();

        let req: Request = http::Request::builder()
            .method("DELETE")
            .uri("/users/7")
            .body(Bytes::new())
            .unwrap()
            .into();
        service.handle(req).await;

        let records = logger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Info);
        assert_eq!(records[0].message, "request completed");
        assert_eq!(records[0].field("method"), Some(Recorded::Str("DELETE".into())));
        assert_eq!(records[0].field("path"), Some(Recorded::Str("/users/7".into())));
        assert_eq!(records[0].field("status"), Some(Recorded::Int(404)));
        assert_eq!(records[0].field("bytes"), Some(Recorded::Int(7)));
    }
}
