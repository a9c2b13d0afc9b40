//! HTTP backend against a local axum server, and peer-to-HTTP fallback.

use std::{sync::Arc, time::Duration};

use rivulet_loader::{
    BaseLoader, ByteRange, DataSource, HttpTransportFactory, LoaderConfig, LoaderErrorKind,
    LoaderStatus, RollbackRequest, StateChange, TransportLoader,
};
use rivulet_test_utils::{
    PeerControl, RecordingObserver, TestHttpServer, range_router, whole_body_router,
};
use rstest::rstest;
use serde_json::json;
use tokio::sync::mpsc;

use crate::common::{assert_contiguous, pattern, peer_loader, wait_for_status};

const BODY_LEN: usize = 256 * 1024;

fn http_loader(
    config: LoaderConfig,
) -> (TransportLoader<HttpTransportFactory>, Arc<RecordingObserver>) {
    rivulet_test_utils::init_tracing();
    let observer = Arc::new(RecordingObserver::handling_errors());
    let loader = TransportLoader::new(HttpTransportFactory::default(), config)
        .with_observer(observer.clone());
    (loader, observer)
}

#[rstest]
#[case::whole(None, 0)]
#[case::tail(Some(ByteRange::from_start(100_000)), 100_000)]
#[case::window(Some(ByteRange::new(4096, Some(8191))), 4096)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streams_requested_range(#[case] range: Option<ByteRange>, #[case] from: usize) {
    let body = pattern(BODY_LEN);
    let server = TestHttpServer::new(range_router("/video.flv", body.clone())).await;
    let (mut loader, observer) = http_loader(LoaderConfig::new());
    assert!(loader.needs_stash_buffer());

    loader
        .open(DataSource::from(server.url("/video.flv")), range)
        .unwrap();
    wait_for_status(&loader.handle(), |s| s.is_terminal()).await;

    let end = range
        .and_then(|r| r.to)
        .map_or(BODY_LEN, |to| to as usize + 1);
    let expected = body.slice(from..end);
    assert_eq!(loader.status(), LoaderStatus::Complete);
    assert_eq!(observer.data(), expected);
    assert_eq!(observer.content_lengths(), vec![expected.len() as u64]);
    assert_eq!(
        observer.completions(),
        vec![(from as u64, expected.len() as u64)]
    );
    assert_contiguous(&observer.data_calls());
}

#[rstest]
#[case::tail(ByteRange::from_start(1000), 1000, BODY_LEN)]
#[case::window(ByteRange::new(4096, Some(8191)), 4096, 8192)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_ignoring_range_still_delivers_requested_bytes(
    #[case] range: ByteRange,
    #[case] from: usize,
    #[case] end: usize,
) {
    let body = pattern(BODY_LEN);
    let server = TestHttpServer::new(whole_body_router("/video.flv", body.clone())).await;
    let (mut loader, observer) = http_loader(LoaderConfig::new());

    loader
        .open(DataSource::from(server.url("/video.flv")), Some(range))
        .unwrap();
    wait_for_status(&loader.handle(), |s| s.is_terminal()).await;

    let expected = body.slice(from..end);
    assert_eq!(loader.status(), LoaderStatus::Complete);
    assert!(observer.errors().is_empty());
    assert_eq!(observer.data(), expected);
    assert_eq!(observer.content_lengths(), vec![expected.len() as u64]);
    assert_eq!(
        observer.completions(),
        vec![(from as u64, expected.len() as u64)]
    );
    assert_contiguous(&observer.data_calls());
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn range_past_end_of_whole_body_is_unsatisfiable() {
    let server = TestHttpServer::new(whole_body_router("/video.flv", pattern(512))).await;
    let (mut loader, observer) = http_loader(LoaderConfig::new());

    loader
        .open(
            DataSource::from(server.url("/video.flv")),
            Some(ByteRange::from_start(512)),
        )
        .unwrap();
    wait_for_status(&loader.handle(), |s| s.is_terminal()).await;

    assert_eq!(loader.status(), LoaderStatus::Error);
    assert!(observer.data_calls().is_empty());
    let errors = observer.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, LoaderErrorKind::HttpStatusCodeInvalid);
    assert_eq!(errors[0].1.code, 416);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_resource_reports_http_status() {
    let server = TestHttpServer::new(range_router("/video.flv", pattern(16))).await;
    let (mut loader, observer) = http_loader(LoaderConfig::new());

    loader
        .open(DataSource::from(server.url("/missing.flv")), None)
        .unwrap();
    wait_for_status(&loader.handle(), |s| s.is_terminal()).await;

    assert_eq!(loader.status(), LoaderStatus::Error);
    let errors = observer.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, LoaderErrorKind::HttpStatusCodeInvalid);
    assert_eq!(errors[0].1.code, 404);
    assert_eq!(errors[0].1.msg, "Not Found");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abort_stops_delivery() {
    let server = TestHttpServer::new(range_router("/video.flv", pattern(BODY_LEN))).await;
    let (mut loader, observer) = http_loader(LoaderConfig::new());
    observer.abort_after(1, loader.handle());

    loader
        .open(DataSource::from(server.url("/video.flv")), None)
        .unwrap();
    wait_for_status(&loader.handle(), |s| s.is_terminal()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(loader.status(), LoaderStatus::Complete);
    assert_eq!(observer.data_calls().len(), 1);
    assert!(observer.completions().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn destroy_silences_in_flight_fetch() {
    let server = TestHttpServer::new(range_router("/video.flv", pattern(BODY_LEN))).await;
    let (mut loader, observer) = http_loader(LoaderConfig::new());

    loader
        .open(DataSource::from(server.url("/video.flv")), None)
        .unwrap();
    loader.destroy();
    let seen = observer.calls().len();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(observer.calls().len(), seen);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn custom_headers_from_transport_options() {
    use axum::{Router, http::HeaderMap, routing::get};

    let router = Router::new().route(
        "/auth.flv",
        get(|headers: HeaderMap| async move {
            match headers.get("x-token").and_then(|v| v.to_str().ok()) {
                Some("secret") => (axum::http::StatusCode::OK, "ok"),
                _ => (axum::http::StatusCode::FORBIDDEN, "no"),
            }
        }),
    );
    let server = TestHttpServer::new(router).await;
    let (mut loader, observer) = http_loader(
        LoaderConfig::new().with_transport_options(json!({ "headers": { "x-token": "secret" } })),
    );

    loader
        .open(DataSource::from(server.url("/auth.flv")), None)
        .unwrap();
    wait_for_status(&loader.handle(), |s| s.is_terminal()).await;

    assert_eq!(loader.status(), LoaderStatus::Complete);
    assert_eq!(&observer.data()[..], b"ok");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rollback_resumes_over_http_without_gaps() {
    let body = pattern(BODY_LEN);
    let server = TestHttpServer::new(range_router("/video.flv", body.clone())).await;
    let url = server.url("/video.flv");

    let (tx, mut rx) = mpsc::unbounded_channel::<RollbackRequest>();
    let control = PeerControl::new();
    let (mut peer, peer_obs) = peer_loader(
        &control,
        LoaderConfig::new().with_rollback(move |req: RollbackRequest| {
            let _ = tx.send(req);
        }),
        RecordingObserver::handling_errors(),
    );
    peer.open(DataSource::from(url.clone()), None).unwrap();

    control
        .send(StateChange::receive_buffer(body.slice(0..40_000)))
        .unwrap();
    control
        .send(StateChange::receive_buffer(body.slice(40_000..65_536)))
        .unwrap();
    control.send(StateChange::rollback(None)).unwrap();

    let request = rx.recv().await.unwrap();
    peer.destroy();
    assert_eq!(control.live(), 0);

    let (mut http, http_obs) = http_loader(LoaderConfig::new());
    http.open(request.source.clone().unwrap(), Some(request.resume_range()))
        .unwrap();
    wait_for_status(&http.handle(), |s| s.is_terminal()).await;

    let mut assembled = peer_obs.data().to_vec();
    assembled.extend_from_slice(&http_obs.data());
    assert_eq!(assembled, body.to_vec());
    assert_eq!(http_obs.completions(), vec![(65_536, (BODY_LEN - 65_536) as u64)]);
}
