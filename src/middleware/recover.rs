//! Panic recovery.
//!
//! [`Recovery`] polls its inner handler inside `catch_unwind`. A panic never
//! escapes the request task: the payload is classified once into a
//! [`RecoveredPanic`], reported to the logger and the optional callback, and
//! answered with a `500` [`ErrorPayload`] carrying the panic's message.
//!
//! ```text
//! Running ──return──▶ Completed
//!    │
//!  panic
//!    ▼
//! Panicked ──classify, log, render──▶ Recovered
//! ```
//!
//! The panic is never re-raised and the handler is never retried.
//!
//! Rendering assumes nothing reached the client yet, which holds when an
//! [`ErrorRedaction`](crate::middleware::ErrorRedaction) sits below. Directly
//! over a forwarding sink, a handler that already sent its status and part
//! of its body keeps both: the status cannot change, and the error body is
//! appended to the partial one. This is logged at warn level and left as is.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use http::StatusCode;

use crate::handler::{BoxFuture, Handler};
use crate::log::{Field, Level};
use crate::middleware::Collaborators;
use crate::render::ErrorPayload;
use crate::request::Request;
use crate::sink::{ResponseSink, Writer};

/// Called with the originating request and the normalized panic. Must not panic.
pub type PanicCallback = Arc<dyn Fn(&Request, &RecoveredPanic) + Send + Sync>;

// ── RecoveredPanic ────────────────────────────────────────────────────────────

/// Shape of the value a handler panicked with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PanicKind {
    /// An error value (`Box<dyn Error + Send + Sync>`, `std::io::Error`).
    Error,
    /// A `&'static str` or `String`, as produced by `panic!("…")`.
    Text,
    /// Anything else. Primitive numbers, `bool` and `char` keep their
    /// textual form; opaque payloads get a placeholder message.
    Other,
}

/// An arbitrary panic payload normalized into an error.
pub struct RecoveredPanic {
    kind: PanicKind,
    message: String,
    source: Option<Box<dyn StdError + Send + Sync>>,
    backtrace: Option<Backtrace>,
}

impl RecoveredPanic {
    /// Classifies a payload as returned by `catch_unwind`.
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<Box<dyn StdError + Send + Sync>>() {
            Ok(err) => return Self::from_error(*err),
            Err(payload) => payload,
        };
        let payload = match payload.downcast::<std::io::Error>() {
            Ok(err) => return Self::from_error(err),
            Err(payload) => payload,
        };
        if let Some(text) = payload.downcast_ref::<&'static str>() {
            return Self::text(PanicKind::Text, (*text).to_owned());
        }
        if let Some(text) = payload.downcast_ref::<String>() {
            return Self::text(PanicKind::Text, text.clone());
        }
        let message = display_primitive(&*payload)
            .unwrap_or_else(|| "panic with a non-displayable payload".to_owned());
        Self::text(PanicKind::Other, message)
    }

    fn from_error(err: Box<dyn StdError + Send + Sync>) -> Self {
        Self {
            kind: PanicKind::Error,
            message: err.to_string(),
            source: Some(err),
            backtrace: Some(Backtrace::capture()),
        }
    }

    fn text(kind: PanicKind, message: String) -> Self {
        Self { kind, message, source: None, backtrace: None }
    }

    pub fn kind(&self) -> PanicKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Stack captured at recovery for error payloads, when `RUST_BACKTRACE`
    /// enables capture.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_ref().filter(|bt| bt.status() == BacktraceStatus::Captured)
    }
}

fn display_primitive(payload: &(dyn Any + Send)) -> Option<String> {
    macro_rules! try_display {
        ($($t:ty),*) => {
            $(
                if let Some(v) = payload.downcast_ref::<$t>() {
                    return Some(v.to_string());
                }
            )*
        };
    }
    try_display!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char);
    None
}

impl fmt::Debug for RecoveredPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveredPanic")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RecoveredPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for RecoveredPanic {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

// ── Recovery ──────────────────────────────────────────────────────────────────

pub struct Recovery<H> {
    next: Arc<H>,
    collab: Collaborators,
    on_panic: Option<PanicCallback>,
}

impl<H: Handler> Recovery<H> {
    pub fn new(next: H) -> Self {
        Self { next: Arc::new(next), collab: Collaborators::default(), on_panic: None }
    }

    pub fn collaborators(mut self, collab: Collaborators) -> Self {
        self.collab = collab;
        self
    }

    pub fn on_panic(mut self, f: impl Fn(&Request, &RecoveredPanic) + Send + Sync + 'static) -> Self {
        self.on_panic = Some(Arc::new(f));
        self
    }

    pub(crate) fn with_parts(next: H, collab: Collaborators, on_panic: Option<PanicCallback>) -> Self {
        Self { next: Arc::new(next), collab, on_panic }
    }
}

impl<H: Handler> Handler for Recovery<H> {
    fn call(&self, req: Request, w: Writer) -> BoxFuture {
        let next = Arc::clone(&self.next);
        let collab = self.collab.clone();
        let on_panic = self.on_panic.clone();

        Box::pin(async move {
            // The inner call happens inside the protected region so a handler
            // that panics before producing its future is caught too.
            let protected = AssertUnwindSafe(async {
                next.call(req.clone(), w.clone()).await;
            });
            let Err(payload) = protected.catch_unwind().await else {
                return;
            };

            let panic = RecoveredPanic::from_payload(payload);
            report(&collab, &req, &panic);
            if let Some(on_panic) = &on_panic {
                on_panic(&req, &panic);
            }

            if w.written() {
                collab.logger.log(
                    Level::Warn,
                    "response already started, appending error body",
                    &[Field::str("request-url", &req.uri().to_string())],
                );
            }
            let payload = ErrorPayload::new(StatusCode::INTERNAL_SERVER_ERROR, panic.message());
            if let Err(e) = collab.renderer.render_error(&*w, &payload) {
                let text = e.to_string();
                collab.logger.log(Level::Error, "render panic response failed", &[Field::str("error", &text)]);
            }
        })
    }
}

fn report(collab: &Collaborators, req: &Request, panic: &RecoveredPanic) {
    let url = req.uri().to_string();
    let stack = panic.backtrace().map(ToString::to_string);
    let mut fields = vec![
        Field::str("error", panic.message()),
        Field::str("request-method", req.method().as_str()),
        Field::str("request-url", &url),
    ];
    if let Some(stack) = &stack {
        fields.push(Field::str("stack", stack));
    }
    collab.logger.log(Level::Error, "recovered from panic", &fields);
}
