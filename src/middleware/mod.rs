//! Middleware layer.
//!
//! Middleware wraps a [`Handler`](crate::Handler) and stands between it and
//! the real response sink. Everything here is built on one primitive, the
//! [`Interceptor`], configured with one of three [`Hook`]s:
//!
//! - [`Recovery`] turns a panicking handler into a `500` error payload.
//! - [`ErrorRedaction`] hijacks the handler's output and, for server faults,
//!   logs the original and sends a generic error instead.
//! - [`Tap`] mirrors the output to an observer after the fact.
//!
//! The usual stack, which [`Pipeline`](crate::Pipeline) assembles for you:
//!
//! ```text
//! Recovery → ErrorRedaction → handler
//! ```
//!
//! Both error-producing layers render through the same [`Collaborators`]: a
//! [`Renderer`] for the client-facing body and a [`Logger`] for operators.

use std::sync::Arc;

use crate::log::{Logger, TracingLogger};
use crate::render::{JsonRenderer, Renderer};

pub mod intercept;
pub mod recover;
pub mod redact;
pub mod tap;

pub use intercept::{Captured, Hook, Interceptor, Snapshot};
pub use recover::{PanicCallback, PanicKind, RecoveredPanic, Recovery};
pub use redact::{ErrorRedaction, RedactCallback};
pub use tap::{Tap, TapObserver};

/// The renderer and logger a middleware reports through.
///
/// Defaults to [`JsonRenderer`] and [`TracingLogger`].
#[derive(Clone)]
pub struct Collaborators {
    pub renderer: Arc<dyn Renderer>,
    pub logger: Arc<dyn Logger>,
}

impl Collaborators {
    pub fn new(renderer: impl Renderer + 'static, logger: impl Logger + 'static) -> Self {
        Self { renderer: Arc::new(renderer), logger: Arc::new(logger) }
    }

    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(JsonRenderer, TracingLogger)
    }
}
