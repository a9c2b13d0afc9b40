//! One live session per slot.

use rivulet_events::{Event, SessionEvent};
use rivulet_loader::{
    BaseLoader, DataSource, LoaderConfig, LoaderStatus, PeerTransportFactory, SessionSlot,
    StateChange, TransportFactory, TransportLoader,
};
use rivulet_test_utils::{PeerControl, RecordingObserver};
use rstest::rstest;

use crate::common::{SOURCE_URL, bus, chunk, drain, peer_loader};

#[rstest]
fn second_loader_preempts_first() {
    let control = PeerControl::new();
    let slot = SessionSlot::new();
    let (bus, mut rx) = bus();
    let config = LoaderConfig::new().with_slot(slot.clone()).with_events(bus);

    let (mut first, first_obs) =
        peer_loader(&control, config.clone(), RecordingObserver::handling_errors());
    let (mut second, second_obs) =
        peer_loader(&control, config, RecordingObserver::handling_errors());

    first.open(DataSource::new(SOURCE_URL), None).unwrap();
    control.send_to(1, StateChange::receive_buffer(chunk(10))).unwrap();
    second.open(DataSource::new(SOURCE_URL), None).unwrap();

    assert_eq!(control.log(), vec!["create#1", "load#1", "destroy#1", "create#2", "load#2"]);
    assert_eq!(first.status(), LoaderStatus::Idle);
    assert!(!first.holds_slot());
    assert!(second.holds_slot());

    control.send_to(1, StateChange::receive_buffer(chunk(10))).unwrap();
    control.send_to(2, StateChange::receive_buffer(chunk(20))).unwrap();
    assert_eq!(first_obs.data_calls(), vec![(10, 0, 10)]);
    assert_eq!(second_obs.data_calls(), vec![(20, 0, 20)]);

    assert!(
        drain(&mut rx)
            .iter()
            .any(|e| matches!(e, Event::Session(SessionEvent::Preempted { backend: "p2p", .. })))
    );
}

#[rstest]
fn preempted_loader_can_reopen() {
    let control = PeerControl::new();
    let config = LoaderConfig::new().with_slot(SessionSlot::new());
    let (mut first, _a) =
        peer_loader(&control, config.clone(), RecordingObserver::handling_errors());
    let (mut second, _b) = peer_loader(&control, config, RecordingObserver::handling_errors());

    first.open(DataSource::new(SOURCE_URL), None).unwrap();
    second.open(DataSource::new(SOURCE_URL), None).unwrap();
    first.open(DataSource::new(SOURCE_URL), None).unwrap();

    assert_eq!(first.status(), LoaderStatus::Buffering);
    assert_eq!(second.status(), LoaderStatus::Idle);
    assert_eq!(control.live(), 1);
}

#[rstest]
fn stale_destroy_keeps_new_holder() {
    let control = PeerControl::new();
    let slot = SessionSlot::new();
    let config = LoaderConfig::new().with_slot(slot.clone());
    let (mut first, _a) =
        peer_loader(&control, config.clone(), RecordingObserver::handling_errors());
    let (mut second, _b) = peer_loader(&control, config, RecordingObserver::handling_errors());

    first.open(DataSource::new(SOURCE_URL), None).unwrap();
    second.open(DataSource::new(SOURCE_URL), None).unwrap();
    first.destroy();

    assert!(second.holds_slot());
    assert!(slot.is_occupied());
    assert_eq!(control.destroyed(), 1);

    second.destroy();
    assert!(!slot.is_occupied());
    assert_eq!(control.live(), 0);
}

#[rstest]
fn private_slots_do_not_interfere() {
    let control = PeerControl::new();
    let (mut first, _a) = peer_loader(
        &control,
        LoaderConfig::new().with_slot(SessionSlot::new()),
        RecordingObserver::handling_errors(),
    );
    let (mut second, _b) = peer_loader(
        &control,
        LoaderConfig::new().with_slot(SessionSlot::new()),
        RecordingObserver::handling_errors(),
    );

    first.open(DataSource::new(SOURCE_URL), None).unwrap();
    second.open(DataSource::new(SOURCE_URL), None).unwrap();

    assert_eq!(control.live(), 2);
    assert!(first.holds_slot() && second.holds_slot());
}

#[rstest]
fn global_slot_serializes_across_configs() {
    let control = PeerControl::new();
    let (mut first, _a) = peer_loader(
        &control,
        LoaderConfig::new().with_slot(SessionSlot::global("p2p-integration")),
        RecordingObserver::handling_errors(),
    );
    let (mut second, _b) = peer_loader(
        &control,
        LoaderConfig::new().with_slot(SessionSlot::global("p2p-integration")),
        RecordingObserver::handling_errors(),
    );

    first.open(DataSource::new(SOURCE_URL), None).unwrap();
    second.open(DataSource::new(SOURCE_URL), None).unwrap();

    assert_eq!(control.live(), 1);
    assert!(!first.holds_slot());
}

// The only test in this binary that leaves the peer slot to the backend.
#[rstest]
fn default_config_peers_share_the_process_slot() {
    let control = PeerControl::new();
    let factory = PeerTransportFactory::new(control.provider());
    assert!(factory.default_slot().ptr_eq(&SessionSlot::global("p2p")));

    let mut first = TransportLoader::new(factory, LoaderConfig::new());
    let mut second =
        TransportLoader::new(PeerTransportFactory::new(control.provider()), LoaderConfig::new());

    first.open(DataSource::new(SOURCE_URL), None).unwrap();
    second.open(DataSource::new(SOURCE_URL), None).unwrap();

    assert_eq!(control.live(), 1);
    assert!(!first.holds_slot());
    assert!(second.holds_slot());
    assert_eq!(first.status(), LoaderStatus::Idle);

    second.destroy();
    assert!(!SessionSlot::global("p2p").is_occupied());
}
