//! Server-fault redaction.
//!
//! [`ErrorRedaction`] runs its inner handler against a `Hijack` interceptor,
//! so nothing the handler writes reaches the client while it runs. Once the
//! handler returns the captured status decides:
//!
//! - below the threshold: the captured headers, status and body are replayed
//!   onto the real sink untouched;
//! - at or above it: the status and original body are logged at error
//!   level, and a generic [`ErrorPayload`] is rendered in their place.
//!
//! If the renderer itself fails, the failure is logged and nothing further is
//! written. The client then gets whatever the transport sends for an
//! untouched response, an empty `200 OK` for [`HttpSink`](crate::HttpSink).
//! Escalating would risk a render loop, so this is left as is.
//!
//! If the handler unwinds, the interceptor is still sealed. A captured server
//! fault is logged and handed to the callback as usual, but nothing is written
//! to the real sink and the panic continues to the recovery layer above, which
//! owns the response.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;

use http::StatusCode;

use crate::config::Config;
use crate::handler::{BoxFuture, Handler};
use crate::log::{Field, Level, Logger};
use crate::middleware::intercept::{Hook, Interceptor};
use crate::middleware::Collaborators;
use crate::render::ErrorPayload;
use crate::request::Request;
use crate::sink::{ResponseSink, Writer};

/// Called with the status and original body of every redacted response.
pub type RedactCallback = Arc<dyn Fn(StatusCode, &[u8]) + Send + Sync>;

pub struct ErrorRedaction<H> {
    next: H,
    config: Arc<Config>,
    collab: Collaborators,
    on_redact: Option<RedactCallback>,
}

impl<H: Handler> ErrorRedaction<H> {
    /// Redacts with the default config, JSON renderer and `tracing` logger.
    pub fn new(next: H) -> Self {
        Self {
            next,
            config: Arc::new(Config::default()),
            collab: Collaborators::default(),
            on_redact: None,
        }
    }

    /// Replaces the config. An out-of-range threshold is rejected.
    pub fn config(mut self, config: Config) -> Result<Self, crate::Error> {
        config.validate()?;
        self.config = Arc::new(config);
        Ok(self)
    }

    pub fn collaborators(mut self, collab: Collaborators) -> Self {
        self.collab = collab;
        self
    }

    pub fn on_redact(mut self, f: impl Fn(StatusCode, &[u8]) + Send + Sync + 'static) -> Self {
        self.on_redact = Some(Arc::new(f));
        self
    }

    pub(crate) fn with_parts(
        next: H,
        config: Arc<Config>,
        collab: Collaborators,
        on_redact: Option<RedactCallback>,
    ) -> Self {
        Self { next, config, collab, on_redact }
    }
}

impl<H: Handler> Handler for ErrorRedaction<H> {
    fn call(&self, req: Request, w: Writer) -> BoxFuture {
        let interceptor = Arc::new(Interceptor::new(w.clone(), Hook::Hijack));
        let fut = self.next.call(req, interceptor.clone());

        let decision = Decision {
            config: Arc::clone(&self.config),
            collab: self.collab.clone(),
            on_redact: self.on_redact.clone(),
        };
        Box::pin(async move {
            if let Err(payload) = AssertUnwindSafe(fut).catch_unwind().await {
                decision.abandon(&interceptor);
                panic::resume_unwind(payload);
            }
            decision.apply(&interceptor, &*w);
        })
    }
}

struct Decision {
    config: Arc<Config>,
    collab: Collaborators,
    on_redact: Option<RedactCallback>,
}

impl Decision {
    fn apply(&self, interceptor: &Interceptor, real: &dyn ResponseSink) {
        let captured = interceptor.seal();
        let logger = &*self.collab.logger;

        let status = match captured.status {
            Some(status) if self.is_fault(status) => status,
            _ => {
                if let Err(e) = captured.replay(real) {
                    log_failure(logger, "replay captured response failed", &e);
                }
                return;
            }
        };

        self.report(status, &captured.body);
        let payload = ErrorPayload::new(status, self.config.default_error_message.as_str());
        if let Err(e) = self.collab.renderer.render_error(real, &payload) {
            log_failure(logger, "render redacted error failed", &e);
        }
    }

    /// Unwind path: seals and reports a captured server fault, writes nothing.
    fn abandon(&self, interceptor: &Interceptor) {
        let captured = interceptor.seal();
        if let Some(status) = captured.status.filter(|s| self.is_fault(*s)) {
            self.report(status, &captured.body);
        }
    }

    fn is_fault(&self, status: StatusCode) -> bool {
        status.as_u16() >= self.config.server_fault_threshold
    }

    fn report(&self, status: StatusCode, body: &[u8]) {
        self.collab.logger.log(
            Level::Error,
            "redacted server fault response",
            &[Field::int("status", status.as_u16()), Field::bytes("response", body)],
        );
        if let Some(on_redact) = &self.on_redact {
            on_redact(status, body);
        }
    }
}

fn log_failure(logger: &dyn Logger, message: &str, e: &crate::Error) {
    let text = e.to_string();
    logger.log(Level::Error, message, &[Field::str("error", &text)]);
}

#[cfg(test)]
mod tests {
    use http::header::CONTENT_TYPE;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;

    use super::*;
    use crate::handler::handler_fn;
    use crate::render::Renderer;
    use crate::sink::HttpSink;
    use crate::testing::{Recorded, RecordingLogger};

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render_error(&self, _: &dyn ResponseSink, _: &ErrorPayload) -> Result<(), crate::Error> {
            Err(crate::Error::Released)
        }
    }

    fn request() -> Request {
        http::Request::new(bytes::Bytes::new()).into()
    }

    async fn run<H: Handler>(filter: &ErrorRedaction<H>) -> (StatusCode, Vec<u8>) {
        let sink = Arc::new(HttpSink::new());
        filter.call(request(), sink.clone()).await;
        let res = sink.take_response();
        let status = res.status();
        let body = res.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    #[tokio::test]
    async fn test_client_fault_passes_through() {
        let logger = RecordingLogger::new();
        let filter = ErrorRedaction::new(handler_fn(|_, w: Writer| async move {
            w.set_status(StatusCode::NOT_FOUND);
            w.write(b"no such user").unwrap();
        }))
        .collaborators(Collaborators::default().logger(logger.clone()));

        let (status, body) = run(&filter).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, b"no such user");
        assert!(logger.records().is_empty());
    }

    #[tokio::test]
    async fn test_captured_headers_survive_pass_through() {
        let filter = ErrorRedaction::new(handler_fn(|_, w: Writer| async move {
            crate::Response::text("plain").send(&w).unwrap();
        }));
        let sink = Arc::new(HttpSink::new());
        filter.call(request(), sink.clone()).await;
        let res = sink.take_response();
        assert_eq!(res.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn test_bad_gateway_is_redacted_with_its_status() {
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        let filter = ErrorRedaction::new(handler_fn(|_, w: Writer| async move {
            w.set_status(StatusCode::BAD_GATEWAY);
            w.write(b"upstream 10.0.0.7 refused").unwrap();
        }))
        .on_redact(move |status, body| *seen2.lock() = Some((status, body.to_vec())));

        let (status, body) = run(&filter).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Internal Server Error");
        assert_eq!(json["error"], "Bad Gateway");
        assert_eq!(json["status"], 502);
        assert_eq!(
            *seen.lock(),
            Some((StatusCode::BAD_GATEWAY, b"upstream 10.0.0.7 refused".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_render_failure_leaves_sink_untouched() {
        let logger = RecordingLogger::new();
        let filter = ErrorRedaction::new(handler_fn(|_, w: Writer| async move {
            w.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        }))
        .collaborators(Collaborators::new(FailingRenderer, logger.clone()));

        let sink = Arc::new(HttpSink::new());
        filter.call(request(), sink.clone()).await;
        assert!(!sink.written());

        let messages: Vec<_> = logger.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, ["redacted server fault response", "render redacted error failed"]);
    }

    #[tokio::test]
    async fn test_unwinding_handler_still_logs_captured_fault() {
        let logger = RecordingLogger::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let filter = ErrorRedaction::new(handler_fn(|_, w: Writer| async move {
            w.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            w.write(b"pool exhausted at db-3").unwrap();
            panic!("worker gave up");
        }))
        .collaborators(Collaborators::default().logger(logger.clone()))
        .on_redact(move |status, body| seen2.lock().push((status, body.to_vec())));

        let sink = Arc::new(HttpSink::new());
        let outcome = AssertUnwindSafe(filter.call(request(), sink.clone())).catch_unwind().await;
        assert!(outcome.is_err());
        assert!(!sink.written());

        let records = logger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "redacted server fault response");
        assert_eq!(records[0].field("status"), Some(Recorded::Int(500)));
        assert_eq!(
            records[0].field("response"),
            Some(Recorded::Bytes(b"pool exhausted at db-3".to_vec()))
        );
        assert_eq!(
            *seen.lock(),
            [(StatusCode::INTERNAL_SERVER_ERROR, b"pool exhausted at db-3".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_unwinding_handler_below_threshold_logs_nothing() {
        let logger = RecordingLogger::new();
        let filter = ErrorRedaction::new(handler_fn(|_, w: Writer| async move {
            w.write(b"partial").unwrap();
            panic!("halfway");
        }))
        .collaborators(Collaborators::default().logger(logger.clone()));

        let sink = Arc::new(HttpSink::new());
        let outcome = AssertUnwindSafe(filter.call(request(), sink.clone())).catch_unwind().await;
        assert!(outcome.is_err());
        assert!(!sink.written());
        assert!(logger.records().is_empty());
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let filter = ErrorRedaction::new(handler_fn(|_, w: Writer| async move {
            w.set_status(StatusCode::NOT_IMPLEMENTED);
            w.write(b"todo").unwrap();
        }))
        .config(Config { server_fault_threshold: 502, ..Config::default() })
        .unwrap();

        let (status, body) = run(&filter).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body, b"todo");
    }

    #[tokio::test]
    async fn test_silent_handler_sends_nothing() {
        let filter = ErrorRedaction::new(handler_fn(|_, _w: Writer| async move {}));
        let sink = Arc::new(HttpSink::new());
        filter.call(request(), sink.clone()).await;
        assert!(!sink.written());
    }

    #[tokio::test]
    async fn test_late_write_after_decision_is_rejected() {
        let stash: Arc<Mutex<Option<Writer>>> = Arc::new(Mutex::new(None));
        let stash2 = stash.clone();
        let filter = ErrorRedaction::new(handler_fn(move |_, w: Writer| {
            let stash = stash2.clone();
            async move {
                w.write(b"early").unwrap();
                *stash.lock() = Some(w);
            }
        }));

        let (status, body) = run(&filter).await;
        assert_eq!((status, body.as_slice()), (StatusCode::OK, &b"early"[..]));

        let late = stash.lock().take().unwrap();
        assert!(matches!(late.write(b"late"), Err(crate::Error::Released)));
    }
}
