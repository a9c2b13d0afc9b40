//! Rollback routing: hook path, state-change path, latching.

use std::sync::Arc;

use rivulet_events::{Event, LoaderEvent};
use rivulet_loader::{
    BaseLoader, ByteRange, DataSource, LoaderConfig, PlayerRef, RollbackRequest, RollbackTrigger,
    StateChange,
};
use rivulet_platform::Mutex;
use rivulet_test_utils::{PeerControl, RecordingObserver};
use rstest::{fixture, rstest};

use crate::common::{PeerLoader, SOURCE_URL, bus, chunk, drain, peer_loader};

type Seen = Arc<Mutex<Vec<RollbackRequest>>>;

#[fixture]
fn control() -> PeerControl {
    PeerControl::new()
}

fn with_rollback(control: &PeerControl, config: LoaderConfig) -> (PeerLoader, Seen) {
    let seen: Seen = Arc::default();
    let sink = Arc::clone(&seen);
    let config = config.with_rollback(move |req: RollbackRequest| sink.lock().push(req));
    let (loader, _observer) = peer_loader(control, config, RecordingObserver::handling_errors());
    (loader, seen)
}

#[rstest]
fn state_change_reaches_handler(control: PeerControl) {
    let player = PlayerRef::new(42_u64);
    let (mut loader, seen) = with_rollback(&control, LoaderConfig::new());
    loader.open(DataSource::new(SOURCE_URL), None).unwrap();

    control.send(StateChange::receive_buffer(chunk(300))).unwrap();
    control
        .send(StateChange::rollback(Some(player.clone())))
        .unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.trigger, RollbackTrigger::StateChange);
    assert!(request.player.as_ref().unwrap().ptr_eq(&player));
    assert_eq!(request.source, Some(DataSource::new(SOURCE_URL)));
    assert_eq!(request.received_length, 300);
    assert_eq!(request.content_length, Some(300));
    assert_eq!(request.resume_range(), ByteRange::from_start(300));
}

#[rstest]
fn bound_hook_replaces_state_change_path(control: PeerControl) {
    control.accept_rollback_hook(true);
    let (mut loader, seen) = with_rollback(&control, LoaderConfig::new());
    loader.open(DataSource::new(SOURCE_URL), None).unwrap();
    assert!(control.has_hook(1));

    control.send(StateChange::rollback(None)).unwrap();
    assert!(seen.lock().is_empty());

    control.fire_rollback(None);
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(seen.lock()[0].trigger, RollbackTrigger::Hook);
}

#[rstest]
fn hook_not_offered_without_handler(control: PeerControl) {
    control.accept_rollback_hook(true);
    let (mut loader, _observer) = peer_loader(
        &control,
        LoaderConfig::new(),
        RecordingObserver::handling_errors(),
    );
    loader.open(DataSource::new(SOURCE_URL), None).unwrap();

    assert!(!control.has_hook(1));
    control.send(StateChange::rollback(None)).unwrap();
}

#[rstest]
fn one_rollback_per_session(control: PeerControl) {
    let (mut loader, seen) = with_rollback(&control, LoaderConfig::new());
    loader.open(DataSource::new(SOURCE_URL), None).unwrap();

    control.send(StateChange::rollback(None)).unwrap();
    control.send(StateChange::rollback(None)).unwrap();
    assert_eq!(seen.lock().len(), 1);

    loader
        .open(DataSource::new(SOURCE_URL), Some(ByteRange::from_start(0)))
        .unwrap();
    control.send(StateChange::rollback(None)).unwrap();
    assert_eq!(seen.lock().len(), 2);
}

#[rstest]
fn resume_offset_follows_the_session_range(control: PeerControl) {
    let (mut loader, seen) = with_rollback(&control, LoaderConfig::new());
    loader.open(DataSource::new(SOURCE_URL), None).unwrap();
    control.send(StateChange::receive_buffer(chunk(1000))).unwrap();

    loader
        .open(DataSource::new(SOURCE_URL), Some(ByteRange::from_start(5000)))
        .unwrap();
    control.send(StateChange::receive_buffer(chunk(200))).unwrap();
    control.send(StateChange::rollback(None)).unwrap();

    let seen = seen.lock();
    assert_eq!(seen[0].resume_from, 5200);
    assert_eq!(seen[0].received_length, 1200);
}

#[rstest]
fn no_rollback_after_destroy(control: PeerControl) {
    control.accept_rollback_hook(true);
    let (mut loader, seen) = with_rollback(&control, LoaderConfig::new());
    loader.open(DataSource::new(SOURCE_URL), None).unwrap();
    loader.destroy();

    control.fire_rollback(None);
    control.send(StateChange::rollback(None)).unwrap();
    assert!(seen.lock().is_empty());
}

#[rstest]
fn rollback_is_published(control: PeerControl) {
    let (bus, mut rx) = bus();
    let (mut loader, _seen) = with_rollback(&control, LoaderConfig::new().with_events(bus));
    loader.open(DataSource::new(SOURCE_URL), None).unwrap();
    control.send(StateChange::receive_buffer(chunk(16))).unwrap();
    control.send(StateChange::rollback(None)).unwrap();

    assert!(drain(&mut rx).contains(&Event::Loader(LoaderEvent::RollbackRequested {
        trigger: RollbackTrigger::StateChange,
        received_length: 16,
    })));
}
