//! Integration tests for status-panel host-testable logic.
//!
//! These drive the public API the way the firmware tasks do: a sync
//! session against a mock hub, its events fed into the screen manager,
//! and the retained snapshot carried across a simulated power cycle.

use std::cell::{Cell, RefCell};

use embassy_futures::block_on;
use embassy_sync::mutex::Mutex;
use embassy_time::Duration;

use status_panel::ble::adv_parser::contains_service_uuid;
use status_panel::ble::codec;
use status_panel::ble::session::SyncSession;
use status_panel::ble::{Characteristic, GattClient, Link, SERVICE_UUID16};
use status_panel::clock::{Clock, DateTime};
use status_panel::outbox::{AudioMode, DeliveryStatus, OutboxSignal, PartyEnd, PendingWrite};
use status_panel::power_logic::{sleep_duration, wake_events, WakeReason};
use status_panel::state::{DeviceStore, Retained, SharedStore};
use status_panel::timers::{TimerId, Timers};
use status_panel::touch::TouchPanel;
use status_panel::ui::manager::ScreenManager;
use status_panel::ui::{Display, Frame, ScreenId};
use status_panel::{BleError, CharError, Error, Event, EventQueue, EventSink};

// ═══════════════════════════════════════════════════════════════════════════
// Mock collaborators
// ═══════════════════════════════════════════════════════════════════════════

struct ManualClock(Cell<Option<DateTime>>);

impl ManualClock {
    fn at(hour: u8, minute: u8) -> Self {
        Self(Cell::new(DateTime::new(2024, 6, 15, hour, minute, 0)))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Option<DateTime> {
        self.0.get()
    }
    fn set(&self, time: DateTime) {
        self.0.set(Some(time));
    }
}

#[derive(Default)]
struct RecordingSink(RefCell<Vec<Event>>);

impl RecordingSink {
    fn take(&self) -> Vec<Event> {
        self.0.borrow_mut().drain(..).collect()
    }
}

impl EventSink for RecordingSink {
    async fn post(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }
}

#[derive(Default)]
struct RecordingTimers(Vec<(TimerId, Option<Duration>)>);

impl RecordingTimers {
    fn armed(&self, id: TimerId) -> usize {
        self.0.iter().filter(|(t, d)| *t == id && d.is_some()).count()
    }
}

impl Timers for RecordingTimers {
    fn arm(&mut self, id: TimerId, after: Duration) {
        self.0.push((id, Some(after)));
    }
    fn disarm(&mut self, id: TimerId) {
        self.0.push((id, None));
    }
}

#[derive(Default)]
struct NullDisplay {
    last: Option<Frame>,
    shown: usize,
}

impl Display for NullDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), Error> {
        self.last = Some(frame.clone());
        self.shown += 1;
        Ok(())
    }
}

#[derive(Clone)]
struct MockHub {
    values: Vec<(Characteristic, Vec<u8>)>,
    writes: std::rc::Rc<RefCell<Vec<(Characteristic, Vec<u8>)>>>,
}

impl MockHub {
    fn new() -> Self {
        let values: Vec<(Characteristic, &[u8])> = vec![
            (Characteristic::Clock, &[0xE8, 0x07, 0x06, 0x0F, 0x0A, 0x1E, 0x00]),
            (Characteristic::Temperature, &[0xFA, 0x00]),
            (Characteristic::Humidity, &[0x70, 0x17]),
            (Characteristic::Windows, &[0, 0, 1, 2, 0, 0, 0, 0, 0, 0]),
            (Characteristic::Garbage, &[2, 3]),
        ];
        Self {
            values: values.into_iter().map(|(c, v)| (c, v.to_vec())).collect(),
            writes: Default::default(),
        }
    }

    fn reads_of(&self, ch: Characteristic) -> bool {
        self.values.iter().any(|(c, _)| *c == ch)
    }
}

impl GattClient for MockHub {
    async fn read(&mut self, ch: Characteristic, buf: &mut [u8]) -> Result<usize, CharError> {
        let (_, v) = self
            .values
            .iter()
            .find(|(c, _)| *c == ch)
            .ok_or(CharError::NotFound)?;
        buf[..v.len()].copy_from_slice(v);
        Ok(v.len())
    }

    async fn write(&mut self, ch: Characteristic, data: &[u8]) -> Result<(), CharError> {
        self.writes.borrow_mut().push((ch, data.to_vec()));
        Ok(())
    }
}

/// Hands out one connection per `connect`, or fails when empty.
struct MockLink(Vec<MockHub>);

impl Link for MockLink {
    type Client = MockHub;

    async fn connect(&mut self) -> Result<MockHub, BleError> {
        self.0.pop().ok_or(BleError::ServiceNotFound)
    }
}

fn new_store() -> SharedStore {
    Mutex::new(DeviceStore::new())
}

// ═══════════════════════════════════════════════════════════════════════════
// Wire encodings
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn characteristic_values_decode() {
    assert_eq!(codec::decode_temperature(&[0xFA, 0x00]).0, 250);
    assert_eq!(codec::decode_temperature(&[0x38, 0xFF]).0, -200);
    assert_eq!(codec::decode_humidity(&[0x70, 0x17]), 60);
    assert_eq!(
        codec::decode_clock(&[0xE8, 0x07, 0x06, 0x0F, 0x0A, 0x1E, 0x00]),
        DateTime::new(2024, 6, 15, 10, 30, 0)
    );
}

#[test]
fn party_mode_is_written_as_hh_mm() {
    let write = PendingWrite::PartyMode(PartyEnd::from_tenths(45));
    assert_eq!(write.encode().as_slice(), b"04:30");
    assert_eq!(PendingWrite::Audio(AudioMode::Off).encode().as_slice(), b"off");
}

#[test]
fn advertisement_carries_service_uuid() {
    let adv = [0x02, 0x01, 0x06, 0x03, 0x03, 0x00, 0x0A];
    assert!(contains_service_uuid(&adv, SERVICE_UUID16));
    assert!(!contains_service_uuid(&adv[..3], SERVICE_UUID16));
}

// ═══════════════════════════════════════════════════════════════════════════
// Sync session + screen manager
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn audio_request_is_delivered_by_next_sync() {
    let store = new_store();
    let clock = ManualClock::at(9, 0);
    let mut ui = ScreenManager::new(NullDisplay::default(), RecordingTimers::default(), &clock, &store);

    block_on(ui.dispatch(Event::ScreenMain));
    block_on(ui.dispatch(Event::Key2));
    block_on(ui.dispatch(Event::Key1));
    assert_eq!(ui.active(), ScreenId::Audio);
    assert_eq!(
        block_on(store.lock()).outbox().status(Characteristic::Audio),
        DeliveryStatus::Pending
    );

    let hub = MockHub::new();
    let writes = hub.writes.clone();
    let sink = RecordingSink::default();
    let session = SyncSession::new(&store, &clock, &sink);
    let report = block_on(session.run(&mut MockLink(vec![hub]))).unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(writes.borrow().as_slice(), &[(Characteristic::Audio, b"on".to_vec())]);

    let events = sink.take();
    assert_eq!(events.iter().filter(|e| **e == Event::DataSent).count(), 1);
    assert_eq!(events.last(), Some(&Event::ConnectionFinished));

    for event in events {
        block_on(ui.dispatch(event));
    }
    let frame = ui.display().last.clone().unwrap();
    assert_eq!(frame.body[1].as_str(), "OK");
}

#[test]
fn request_after_sync_is_delivered_in_same_wake() {
    let store = new_store();
    let clock = ManualClock::at(9, 0);
    let ready = OutboxSignal::new();
    let mut ui = ScreenManager::new(NullDisplay::default(), RecordingTimers::default(), &clock, &store)
        .with_outbox_signal(&ready);
    let sink = RecordingSink::default();
    let session = SyncSession::new(&store, &clock, &sink);

    // The wake's sync has already passed its flush step.
    block_on(ui.dispatch(Event::ScreenEntry));
    block_on(session.run(&mut MockLink(vec![MockHub::new()]))).unwrap();
    for event in sink.take() {
        block_on(ui.dispatch(event));
    }
    block_on(ui.dispatch(Event::Key2));
    assert_eq!(ui.active(), ScreenId::Audio);
    assert!(ready.try_take().is_none());
    block_on(ui.dispatch(Event::Key0));
    assert_eq!(ui.display().last.as_ref().unwrap().body[1].as_str(), "Sending data");
    assert!(ready.try_take().is_some());

    let hub = MockHub::new();
    let writes = hub.writes.clone();
    assert_eq!(block_on(session.deliver(&mut MockLink(vec![hub]))), Ok(1));
    assert_eq!(writes.borrow().as_slice(), &[(Characteristic::Audio, b"off".to_vec())]);

    let events = sink.take();
    assert_eq!(events, vec![Event::DataSent]);
    block_on(ui.dispatch(Event::DataSent));
    assert_eq!(ui.display().last.as_ref().unwrap().body[1].as_str(), "OK");
}

#[test]
fn repeated_requests_deliver_only_the_latest() {
    let store = new_store();
    let clock = ManualClock::at(20, 0);
    let mut ui = ScreenManager::new(NullDisplay::default(), RecordingTimers::default(), &clock, &store);

    block_on(ui.dispatch(Event::ScreenHeating));
    block_on(ui.dispatch(Event::Confirm));
    block_on(ui.dispatch(Event::Plus));
    block_on(ui.dispatch(Event::Confirm));

    let hub = MockHub::new();
    let writes = hub.writes.clone();
    let sink = RecordingSink::default();
    block_on(SyncSession::new(&store, &clock, &sink).run(&mut MockLink(vec![hub]))).unwrap();
    assert_eq!(
        writes.borrow().as_slice(),
        &[(Characteristic::PartyMode, b"01:00".to_vec())]
    );

    // Nothing left to send on the following connection.
    let hub = MockHub::new();
    let writes = hub.writes.clone();
    block_on(SyncSession::new(&store, &clock, &sink).run(&mut MockLink(vec![hub]))).unwrap();
    assert!(writes.borrow().is_empty());
}

#[test]
fn failed_connection_keeps_outbox_and_arms_sleep() {
    let store = new_store();
    let clock = ManualClock::at(9, 0);
    block_on(store.lock()).request(PendingWrite::Audio(AudioMode::Off));

    let sink = RecordingSink::default();
    let result = block_on(SyncSession::new(&store, &clock, &sink).run(&mut MockLink(Vec::new())));
    assert_eq!(result.unwrap_err(), BleError::ServiceNotFound);
    assert_eq!(sink.take(), vec![Event::ConnectionFailed]);
    assert_eq!(
        block_on(store.lock()).outbox().status(Characteristic::Audio),
        DeliveryStatus::Pending
    );

    let mut ui = ScreenManager::new(NullDisplay::default(), RecordingTimers::default(), &clock, &store);
    block_on(ui.dispatch(Event::ScreenMain));
    block_on(ui.dispatch(Event::ConnectionFailed));
    assert_eq!(ui.timers().armed(TimerId::Sleep), 1);
}

#[test]
fn garbage_is_read_once_per_day() {
    let store = new_store();
    let clock = ManualClock::at(14, 0);
    let sink = RecordingSink::default();
    let session = SyncSession::new(&store, &clock, &sink);

    let first = block_on(session.run(&mut MockLink(vec![MockHub::new()]))).unwrap();
    assert!(first.garbage_read);
    assert_eq!(block_on(store.lock()).device().garbage.days, 3);

    // Hub clock says 10:30, not midnight.
    let second = block_on(session.run(&mut MockLink(vec![MockHub::new()]))).unwrap();
    assert!(!second.garbage_read);
}

#[test]
fn missing_characteristics_keep_previous_values() {
    let store = new_store();
    let clock = ManualClock::at(9, 0);
    let sink = RecordingSink::default();
    let session = SyncSession::new(&store, &clock, &sink);
    block_on(session.run(&mut MockLink(vec![MockHub::new()]))).unwrap();

    let mut sparse = MockHub::new();
    sparse.values.retain(|(c, _)| *c == Characteristic::Clock);
    assert!(!sparse.reads_of(Characteristic::Temperature));
    let report = block_on(session.run(&mut MockLink(vec![sparse]))).unwrap();
    assert!(report.fields_skipped > 0);

    let guard = block_on(store.lock());
    assert_eq!(guard.device().temperature.map(|t| t.0), Some(250));
    assert_eq!(guard.device().humidity, Some(60));
}

// ═══════════════════════════════════════════════════════════════════════════
// Dispatch properties
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn back_and_timeout_always_land_on_main() {
    let requests = [
        Event::ScreenEntry,
        Event::ScreenMain,
        Event::ScreenAudio,
        Event::ScreenHeating,
        Event::ScreenAbsent,
    ];
    for request in requests {
        for closing in [Event::Back, Event::UserTimeout] {
            let store = new_store();
            let clock = ManualClock::at(12, 0);
            let mut ui =
                ScreenManager::new(NullDisplay::default(), RecordingTimers::default(), &clock, &store);
            block_on(ui.dispatch(request));
            ui.timers_mut().0.clear();

            block_on(ui.dispatch(closing));
            assert_eq!(ui.active(), ScreenId::Main);
            assert_eq!(ui.timers().armed(TimerId::Sleep), 1);
        }
    }
}

#[test]
fn touch_wake_routes_waking_key() {
    let store = new_store();
    let clock = ManualClock::at(7, 15);
    let mut ui = ScreenManager::new(NullDisplay::default(), RecordingTimers::default(), &clock, &store);

    for event in wake_events(WakeReason::Touch(3)) {
        block_on(ui.dispatch(event));
    }
    assert_eq!(ui.active(), ScreenId::Absent);
    assert_eq!(ui.display().shown, 1);
}

#[test]
fn queue_overflow_is_counted() {
    let queue = EventQueue::new();
    for _ in 0..4 {
        assert!(queue.try_send(Event::Redraw));
    }
    assert!(!queue.try_send(Event::Key0));
    assert!(!block_on(queue.send(Event::Key1)));
    assert_eq!(queue.dropped(), 2);
    assert_eq!(queue.try_next(), Some(Event::Redraw));
}

#[test]
fn touch_glitch_does_not_repeat_press() {
    let mut panel = TouchPanel::new();
    let touched = [200, 200, 20, 200];
    let released = [200; 4];

    let presses = panel.update(&touched, 0);
    assert_eq!(presses.len(), 1);
    assert!(panel.update(&released, 10).is_empty());
    assert!(panel.update(&touched, 20).is_empty());
    let release = panel.update(&released, 60);
    assert_eq!(release.len(), 1);
    assert!(!release[0].pressed);
}

// ═══════════════════════════════════════════════════════════════════════════
// Power cycle
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn snapshot_survives_power_cycle() {
    let store = new_store();
    let clock = ManualClock::at(18, 45);
    let sink = RecordingSink::default();
    block_on(SyncSession::new(&store, &clock, &sink).run(&mut MockLink(vec![MockHub::new()]))).unwrap();
    block_on(store.lock()).request(PendingWrite::Audio(AudioMode::On));

    let mut buf = [0u8; 128];
    let len = block_on(store.lock()).retained(clock.now()).encode(&mut buf).unwrap();

    let restored = Retained::decode_or_default(&buf[..len]);
    let rebooted = new_store();
    block_on(rebooted.lock()).restore(restored.clone());
    let guard = block_on(rebooted.lock());
    assert_eq!(guard.device().garbage.days, 3);
    assert_eq!(guard.outbox().pending().as_slice(), &[PendingWrite::Audio(AudioMode::On)]);
    assert!(!guard.is_dirty());
    assert_eq!(restored.clock, clock.now());
}

#[test]
fn sleep_length_follows_hub_clock() {
    // 10:30 from the hub selects the 10 o'clock slot (5 min).
    let store = new_store();
    let clock = ManualClock(Cell::new(None));
    assert_eq!(sleep_duration(clock.now()), Duration::from_secs(600));

    let sink = RecordingSink::default();
    block_on(SyncSession::new(&store, &clock, &sink).run(&mut MockLink(vec![MockHub::new()]))).unwrap();
    assert_eq!(sleep_duration(clock.now()), Duration::from_secs(300));
}
