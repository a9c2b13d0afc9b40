// Common fixtures and utilities for integration tests

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use rivulet_events::{Event, EventBus};
use rivulet_loader::{
    LoaderConfig, LoaderHandle, LoaderStatus, PeerTransportFactory, SessionSlot, TransportLoader,
};
use rivulet_test_utils::{MockPeerProvider, PeerControl, RecordingObserver};
use tokio::sync::broadcast;

pub type PeerLoader = TransportLoader<PeerTransportFactory<MockPeerProvider>>;

pub const SOURCE_URL: &str = "https://cdn.example.com/live/stream.flv";

/// Peer loader wired to `control`, with a recording observer attached.
///
/// Without an explicit slot the loader gets a private one, so tests running
/// in parallel never share the process-wide peer slot.
pub fn peer_loader(
    control: &PeerControl,
    config: LoaderConfig,
    observer: RecordingObserver,
) -> (PeerLoader, Arc<RecordingObserver>) {
    rivulet_test_utils::init_tracing();
    let config = match config.slot {
        Some(_) => config,
        None => config.with_slot(SessionSlot::new()),
    };
    let observer = Arc::new(observer);
    let loader = TransportLoader::new(PeerTransportFactory::new(control.provider()), config)
        .with_observer(observer.clone());
    (loader, observer)
}

/// Deterministic payload: byte `i` is `i % 251`.
pub fn pattern(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}

pub fn chunk(len: usize) -> Bytes {
    Bytes::from(vec![0xAB; len])
}

/// Poll until `loader` reaches a status matching `done`.
pub async fn wait_for_status<F>(loader: &LoaderHandle, done: F)
where
    F: Fn(LoaderStatus) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(loader.status()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("loader stuck in {}", loader.status()));
}

pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn bus() -> (EventBus, broadcast::Receiver<Event>) {
    let bus = EventBus::new(256);
    let rx = bus.subscribe();
    (bus, rx)
}

pub fn assert_contiguous(calls: &[(usize, u64, u64)]) {
    let mut expected = 0;
    for &(len, start, received) in calls {
        assert_eq!(start, expected, "chunk starts where the previous ended");
        assert_eq!(received, start + len as u64);
        expected = received;
    }
}
