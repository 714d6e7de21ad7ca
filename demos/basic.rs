//! Minimal veil example: three endpoints behind the standard pipeline.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users         → 201, handler body
//!   curl -i http://localhost:3000/report        → 500, generic message (original in the log)
//!   curl -i http://localhost:3000/crash         → 500, panic recovered

use std::net::SocketAddr;

use http::StatusCode;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use veil::{Config, Pipeline, Request, Response, ResponseSink, Writer, handler_fn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::var("VEIL_CONFIG") {
        Ok(path) => Config::load(path)?,
        Err(_) => Config::default(),
    };

    let service = Pipeline::builder(handler_fn(app))
        .config(config)
        .on_panic(|req, panic| error!(path = %req.path(), kind = ?panic.kind(), "handler panicked"))
        .build()?;

    let addr: SocketAddr = "127.0.0.1:3000".parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "veil demo listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let service = service.clone();
                async move { service.serve(req).await }
            });
            if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), svc)
                .await
            {
                error!(%peer, "connection error: {e}");
            }
        });
    }
}

// Routing is out of scope for veil; a match on the path stands in for it.
async fn app(req: Request, w: Writer) {
    match req.path() {
        "/users" => {
            let _ = Response::builder()
                .status(StatusCode::CREATED)
                .header("location", "/users/99")
                .json(br#"{"id":"99","name":"new_user"}"#.to_vec())
                .send(&w);
        }
        "/report" => {
            w.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            let _ = w.write(b"query failed: relation \"reports_2024\" does not exist");
        }
        "/crash" => panic!("index out of range while rendering report"),
        _ => {
            let _ = Response::status(StatusCode::NOT_FOUND).send(&w);
        }
    }
}
