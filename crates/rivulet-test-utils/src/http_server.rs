//! Shared async HTTP test server helpers.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use tokio::net::TcpListener;
use url::Url;

/// Lightweight HTTP test server wrapper.
pub struct TestHttpServer {
    base_url: Url,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestHttpServer {
    /// Spawn `router` on a random localhost port.
    ///
    /// # Panics
    ///
    /// Panics if listener bind or URL parsing fails.
    pub async fn new(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test HTTP listener");
        let addr = listener
            .local_addr()
            .expect("read test listener local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });

        tokio::spawn(async move {
            server.await.expect("run test HTTP server");
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}")).expect("parse base URL"),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Join path to server base URL.
    ///
    /// # Panics
    ///
    /// Panics if URL join fails.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("join server URL path")
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

/// Router serving `body` at `path`, honouring `Range: bytes=a-b` with 206.
pub fn range_router(path: &str, body: Bytes) -> Router {
    Router::new()
        .route(path, get(serve_range))
        .with_state(body)
}

/// Router serving `body` at `path` that ignores `Range` and always answers
/// `200` with the whole body.
pub fn whole_body_router(path: &str, body: Bytes) -> Router {
    Router::new()
        .route(path, get(serve_whole))
        .with_state(body)
}

async fn serve_whole(State(body): State<Bytes>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_LENGTH, body.len().to_string())],
        body,
    )
        .into_response()
}

async fn serve_range(State(body): State<Bytes>, headers: HeaderMap) -> Response {
    let total = body.len();
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .map(str::to_owned);

    let Some(range) = range else {
        return (
            StatusCode::OK,
            [(header::CONTENT_LENGTH, total.to_string())],
            body,
        )
            .into_response();
    };

    let (start, end) = range.split_once('-').unwrap_or((range.as_str(), ""));
    let start = start.parse::<usize>().unwrap_or(0);
    let end = end
        .parse::<usize>()
        .map_or(total, |end| (end + 1).min(total));
    if start >= end {
        return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
    }

    tracing::debug!(start, end, total, "serving range");
    (
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_LENGTH, (end - start).to_string()),
            (
                header::CONTENT_RANGE,
                format!("bytes {start}-{}/{total}", end - 1),
            ),
        ],
        body.slice(start..end),
    )
        .into_response()
}
