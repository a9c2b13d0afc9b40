#![forbid(unsafe_code)]
#![expect(
    clippy::unwrap_used,
    reason = "unwraps are acceptable in test utilities"
)]

//! Shared test utilities for the rivulet workspace.

pub mod http_server;
pub mod observer;
pub mod peer;

pub use http_server::{TestHttpServer, range_router, whole_body_router};
pub use observer::{ObservedCall, RecordingObserver};
pub use peer::{MockPeerEngine, MockPeerProvider, PeerControl};

/// Install a test-writer subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rivulet_loader=debug".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}
