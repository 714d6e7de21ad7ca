//! Response tap: observe what a handler sent without holding it back.

use std::sync::Arc;

use crate::handler::{BoxFuture, Handler};
use crate::middleware::intercept::{Hook, Interceptor, Snapshot};
use crate::request::Request;
use crate::sink::Writer;

/// Called once the handler returns, with its request, snapshot and full body.
pub type TapObserver = Arc<dyn Fn(&Request, Snapshot, &[u8]) + Send + Sync>;

/// Runs the inner handler against a `Mirror` interceptor.
///
/// The client receives every byte as it is written; the observer gets a copy
/// afterwards. Useful for audit trails and response-size accounting.
pub struct Tap<H> {
    next: H,
    observer: TapObserver,
}

impl<H: Handler> Tap<H> {
    pub fn new(next: H, observer: impl Fn(&Request, Snapshot, &[u8]) + Send + Sync + 'static) -> Self {
        Self { next, observer: Arc::new(observer) }
    }
}

impl<H: Handler> Handler for Tap<H> {
    fn call(&self, req: Request, w: Writer) -> BoxFuture {
        let interceptor = Arc::new(Interceptor::new(w, Hook::Mirror));
        let fut = self.next.call(req.clone(), interceptor.clone());
        let observer = Arc::clone(&self.observer);

        Box::pin(async move {
            fut.await;
            let captured = interceptor.seal();
            observer(&req, interceptor.snapshot(), &captured.body);
        })
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use parking_lot::Mutex;

    use super::*;
    use crate::handler::handler_fn;
    use crate::sink::{HttpSink, ResponseSink};

    #[tokio::test]
    async fn test_observer_sees_streamed_body() {
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        let tap = Tap::new(
            handler_fn(|_, w: Writer| async move {
                w.set_status(StatusCode::CREATED);
                w.write(b"cre").unwrap();
                w.write(b"ated").unwrap();
            }),
            move |req, snap, body| *seen2.lock() = Some((req.path().to_owned(), snap, body.to_vec())),
        );

        let sink = Arc::new(HttpSink::new());
        let req: Request = http::Request::builder()
            .uri("/users")
            .body(bytes::Bytes::new())
            .unwrap()
            .into();
        tap.call(req, sink.clone()).await;

        assert_eq!(sink.status(), Some(StatusCode::CREATED));
        let (path, snap, body) = seen.lock().take().unwrap();
        assert_eq!(path, "/users");
        assert_eq!(snap, Snapshot { status: Some(StatusCode::CREATED), bytes: 7 });
        assert_eq!(body, b"created");
    }
}
