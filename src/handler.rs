//! Handler trait and type erasure.
//!
//! # What a handler is
//!
//! A handler receives the [`Request`] and a [`Writer`] and pushes its
//! response into the writer. It returns nothing: whatever it wrote *is* the
//! response, unless a middleware above it decides otherwise.
//!
//! Plain async functions become handlers through [`handler_fn`]; middleware
//! such as [`Recovery`](crate::middleware::Recovery) implement [`Handler`]
//! themselves and wrap another handler, so layers nest by value:
//!
//! ```text
//! async fn create(req: Request, w: Writer) { … }     ← user writes this
//!        ↓ handler_fn(create)
//! FnHandler(create)                                  ← Handler impl
//!        ↓ ErrorRedaction::new(…), Recovery::new(…)
//! Recovery<ErrorRedaction<FnHandler<_>>>             ← still a Handler
//!        ↓ handler.call(req, writer) at request time
//! Box::pin(async { … create(req, w).await … })       ← BoxFuture
//! ```
//!
//! The per-request cost is one boxed future per layer, negligible next to
//! network I/O.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::sink::Writer;

/// A heap-allocated, type-erased future driven to completion per request.
///
/// `Send + 'static` let tokio move the future across worker threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Anything that can serve one request into a [`Writer`].
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request, w: Writer) -> BoxFuture;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn call(&self, req: Request, w: Writer) -> BoxFuture {
        (**self).call(req, w)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn call(&self, req: Request, w: Writer) -> BoxFuture {
        (**self).call(req, w)
    }
}

/// Wraps an async function or closure as a [`Handler`].
///
/// ```rust
/// use veil::{Request, Writer, handler_fn};
///
/// let hello = handler_fn(|_req: Request, w: Writer| async move {
///     let _ = w.write(b"hello");
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request, Writer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    FnHandler(f)
}

/// Newtype bridging a concrete function `F` to the [`Handler`] trait.
#[derive(Clone)]
pub struct FnHandler<F>(F);

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request, Writer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, req: Request, w: Writer) -> BoxFuture {
        Box::pin((self.0)(req, w))
    }
}
