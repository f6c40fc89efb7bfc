//! Event dispatch loop (screen manager).
//!
//! Single consumer of the event queue. Screen requests, `Back` and
//! `UserTimeout` are handled here; everything else goes to the active
//! screen, whose actions are applied in order. Follow-up events a
//! screen raises (softkey translation) are handled right away from a
//! local queue, never re-posted, so the loop cannot block on its own
//! full queue.

use embassy_time::Duration;
use heapless::Deque;

use crate::clock::Clock;
use crate::config::{
    FINAL_REDRAW_DELAY_MS, FOLLOW_UP_DEPTH, IDLE_TIMEOUT_MS, REDRAW_DELAY_MS, SLEEP_TIMEOUT_MS,
};
use crate::event::{Event, EventQueue};
use crate::fmt::{debug, info, warn};
use crate::outbox::{OutboxSignal, OUTBOX_READY};
use crate::state::SharedStore;
use crate::timers::{TimerId, Timers};
use crate::ui::screens::{Action, Actions, Screen, View};
use crate::ui::{Display, ScreenId};

type FollowUps = Deque<Event, FOLLOW_UP_DEPTH>;

pub struct ScreenManager<'a, D: Display, T: Timers, C: Clock> {
    active: Screen,
    display: D,
    timers: T,
    clock: &'a C,
    store: &'a SharedStore,
    outbox_ready: &'a OutboxSignal,
    /// Presentations still owed by the current multi-pass render.
    redraws_left: u8,
}

impl<'a, D: Display, T: Timers, C: Clock> ScreenManager<'a, D, T, C> {
    /// Starts on the invisible entry screen; the boot code posts the
    /// landing screen request.
    pub fn new(display: D, timers: T, clock: &'a C, store: &'a SharedStore) -> Self {
        Self {
            active: Screen::Entry,
            display,
            timers,
            clock,
            store,
            outbox_ready: &OUTBOX_READY,
            redraws_left: 0,
        }
    }

    /// Raise `signal` instead of `OUTBOX_READY` when a write is queued.
    pub fn with_outbox_signal(mut self, signal: &'a OutboxSignal) -> Self {
        self.outbox_ready = signal;
        self
    }

    pub fn active(&self) -> ScreenId {
        self.active.id()
    }

    pub fn screen(&self) -> &Screen {
        &self.active
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    /// Drain `queue` forever.
    pub async fn run(&mut self, queue: &EventQueue) -> ! {
        info!("Dispatch loop started");
        loop {
            if let Some(event) = queue.next().await {
                self.dispatch(event).await;
            }
        }
    }

    /// Handle one event and all follow-ups it raises.
    pub async fn dispatch(&mut self, event: Event) {
        let mut follow_ups = FollowUps::new();
        let _ = follow_ups.push_back(event);

        while let Some(event) = follow_ups.pop_front() {
            debug!("dispatch {:?} on {:?}", event, self.active.id());

            if let Some(target) = Screen::for_request(event) {
                self.request_screen(target, &mut follow_ups).await;
            } else if matches!(event, Event::Back | Event::UserTimeout) {
                self.request_screen(Screen::Main, &mut follow_ups).await;
                self.timers.arm(TimerId::Sleep, ms(SLEEP_TIMEOUT_MS));
            } else {
                let actions = self.active.handle(event);
                self.apply(actions, &mut follow_ups).await;
            }

            if event.is_key() {
                self.timers.arm(TimerId::Idle, ms(IDLE_TIMEOUT_MS));
            }
        }
    }

    /// Deactivate the current screen and activate `target`, even when
    /// it is the same screen.
    async fn request_screen(&mut self, target: Screen, follow_ups: &mut FollowUps) {
        info!("Screen {:?} -> {:?}", self.active.id(), target.id());

        let actions = self.active.deactivate();
        self.apply(actions, follow_ups).await;

        self.active = target;
        self.redraws_left = 0;
        let actions = self.active.activate(self.clock.now());
        self.apply(actions, follow_ups).await;
    }

    async fn apply(&mut self, actions: Actions, follow_ups: &mut FollowUps) {
        for action in actions {
            match action {
                Action::Dispatch(event) => {
                    if follow_ups.push_back(event).is_err() {
                        warn!("Follow-up {:?} dropped", event);
                    }
                }
                Action::Render { passes } => self.start_render(passes).await,
                Action::Repeat => self.repeat_render().await,
                Action::Request(write) => {
                    info!("Outbox: {:?}", write);
                    self.store.lock().await.request(write);
                    self.outbox_ready.signal(());
                }
                Action::ArmSleep => self.timers.arm(TimerId::Sleep, ms(SLEEP_TIMEOUT_MS)),
                Action::DisarmSleep => self.timers.disarm(TimerId::Sleep),
            }
        }
    }

    async fn start_render(&mut self, passes: u8) {
        if passes == 0 {
            return;
        }
        self.render().await;
        self.redraws_left = passes - 1;
        if self.redraws_left == 0 {
            self.timers.disarm(TimerId::Redraw);
        } else {
            self.schedule_redraw();
        }
    }

    async fn repeat_render(&mut self) {
        self.render().await;
        if self.redraws_left > 0 {
            self.redraws_left -= 1;
            if self.redraws_left > 0 {
                self.schedule_redraw();
            }
        }
    }

    /// The last repeat waits longer than the ones before it.
    fn schedule_redraw(&mut self) {
        let delay = if self.redraws_left == 1 {
            FINAL_REDRAW_DELAY_MS
        } else {
            REDRAW_DELAY_MS
        };
        self.timers.arm(TimerId::Redraw, ms(delay));
    }

    async fn render(&mut self) {
        if !self.active.renders() {
            return;
        }
        // Clone under the lock, render without it.
        let (device, outbox) = {
            let store = self.store.lock().await;
            (store.device().clone(), store.outbox().clone())
        };
        let view = View {
            device: &device,
            outbox: &outbox,
            now: self.clock.now(),
        };
        let frame = self.active.frame(&view);
        if let Err(e) = self.display.show(&frame) {
            warn!("Display update failed: {:?}", e);
        }
    }
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DateTime;
    use crate::error::Error;
    use crate::outbox::{AudioMode, PendingWrite};
    use crate::state::DeviceStore;
    use crate::ui::Frame;
    use core::cell::Cell;
    use embassy_futures::block_on;
    use embassy_sync::mutex::Mutex;
    use std::vec::Vec;

    #[derive(Default)]
    struct RecordingDisplay {
        frames: Vec<Frame>,
    }

    impl Display for RecordingDisplay {
        fn show(&mut self, frame: &Frame) -> Result<(), Error> {
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingTimers {
        log: Vec<(TimerId, Option<Duration>)>,
    }

    impl RecordingTimers {
        fn armed(&self, id: TimerId) -> usize {
            self.log.iter().filter(|(t, d)| *t == id && d.is_some()).count()
        }
    }

    impl Timers for RecordingTimers {
        fn arm(&mut self, id: TimerId, after: Duration) {
            self.log.push((id, Some(after)));
        }
        fn disarm(&mut self, id: TimerId) {
            self.log.push((id, None));
        }
    }

    struct FixedClock(Cell<Option<DateTime>>);

    impl Clock for FixedClock {
        fn now(&self) -> Option<DateTime> {
            self.0.get()
        }
        fn set(&self, time: DateTime) {
            self.0.set(Some(time));
        }
    }

    fn fixtures() -> (SharedStore, FixedClock) {
        (
            Mutex::new(DeviceStore::new()),
            FixedClock(Cell::new(DateTime::new(2024, 6, 15, 10, 30, 0))),
        )
    }

    #[test]
    fn starts_on_entry_and_switches_on_request() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        assert_eq!(m.active(), ScreenId::Entry);

        block_on(m.dispatch(Event::ScreenMain));
        assert_eq!(m.active(), ScreenId::Main);
        assert_eq!(m.display().frames.len(), 1);
        assert_eq!(
            m.timers().log.as_slice(),
            &[(TimerId::Redraw, Some(ms(FINAL_REDRAW_DELAY_MS)))]
        );
    }

    #[test]
    fn key_is_translated_and_handled_synchronously() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenMain));

        block_on(m.dispatch(Event::Key2));
        assert_eq!(m.active(), ScreenId::Audio);
        // Leaving Main disarms the sleep timer; the key re-arms idle.
        assert!(m.timers().log.contains(&(TimerId::Sleep, None)));
        assert_eq!(m.timers().armed(TimerId::Idle), 1);
    }

    #[test]
    fn unbound_key_only_rearms_idle() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenMain));
        let frames = m.display().frames.len();

        block_on(m.dispatch(Event::Key1));
        assert_eq!(m.active(), ScreenId::Main);
        assert_eq!(m.display().frames.len(), frames);
        assert_eq!(m.timers().armed(TimerId::Idle), 1);
    }

    #[test]
    fn entry_routes_waking_key_without_rendering() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenEntry));
        assert!(m.display().frames.is_empty());

        block_on(m.dispatch(Event::Key0));
        assert_eq!(m.active(), ScreenId::Heating);
        assert_eq!(m.display().frames[0].headline.as_str(), "Heating");
    }

    #[test]
    fn redraw_schedule_presents_exactly_n_times() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenMain));
        m.timers_mut().log.clear();
        let before = m.display().frames.len();

        block_on(m.start_render(4));
        // Play the timer task: one Redraw per arm, until nothing is armed.
        let mut delays = Vec::new();
        while let Some((TimerId::Redraw, Some(after))) = m.timers_mut().log.pop() {
            delays.push(after.as_millis());
            block_on(m.dispatch(Event::Redraw));
        }
        assert_eq!(delays, [REDRAW_DELAY_MS, REDRAW_DELAY_MS, FINAL_REDRAW_DELAY_MS]);
        assert_eq!(m.display().frames.len() - before, 4);
    }

    #[test]
    fn redraw_delays_grow_before_final_pass() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenMain));
        m.timers_mut().log.clear();

        block_on(m.start_render(3));
        block_on(m.dispatch(Event::Redraw));
        block_on(m.dispatch(Event::Redraw));
        assert_eq!(
            m.timers().log.as_slice(),
            &[
                (TimerId::Redraw, Some(ms(REDRAW_DELAY_MS))),
                (TimerId::Redraw, Some(ms(FINAL_REDRAW_DELAY_MS))),
            ]
        );

        // A stray redraw after the schedule presents once more and stops.
        block_on(m.dispatch(Event::Redraw));
        assert_eq!(m.timers().armed(TimerId::Redraw), 2);
    }

    #[test]
    fn back_from_every_screen_lands_on_main_and_arms_sleep_once() {
        for request in [
            Event::ScreenEntry,
            Event::ScreenMain,
            Event::ScreenAudio,
            Event::ScreenHeating,
            Event::ScreenAbsent,
        ] {
            for closing in [Event::Back, Event::UserTimeout] {
                let (store, clock) = fixtures();
                let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
                block_on(m.dispatch(request));
                m.timers_mut().log.clear();

                block_on(m.dispatch(closing));
                assert_eq!(m.active(), ScreenId::Main, "{:?} then {:?}", request, closing);
                assert_eq!(m.timers().armed(TimerId::Sleep), 1, "{:?} then {:?}", request, closing);
            }
        }
    }

    #[test]
    fn softkey_back_also_arms_idle() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenAbsent));
        m.timers_mut().log.clear();

        block_on(m.dispatch(Event::Key3));
        assert_eq!(m.active(), ScreenId::Main);
        assert_eq!(m.timers().armed(TimerId::Sleep), 1);
        assert_eq!(m.timers().armed(TimerId::Idle), 1);
    }

    #[test]
    fn screen_requests_reach_the_outbox() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenAudio));
        block_on(m.dispatch(Event::Key1));

        let pending = block_on(store.lock()).outbox().pending();
        assert_eq!(pending.as_slice(), &[PendingWrite::Audio(AudioMode::On)]);
        let last = m.display().frames.last().unwrap();
        assert_eq!(last.body[1].as_str(), "Sending data");
    }

    #[test]
    fn requesting_active_screen_renders_it_again() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenMain));
        assert_eq!(m.display().frames[0].headline_right.as_str(), "10:30");

        clock.set(DateTime::new(2024, 6, 15, 11, 0, 0).unwrap());
        block_on(m.dispatch(Event::ScreenMain));
        assert_eq!(m.active(), ScreenId::Main);
        assert_eq!(m.display().frames.len(), 2);
        assert_eq!(m.display().frames[1].headline_right.as_str(), "11:00");
        assert_eq!(m.timers().armed(TimerId::Redraw), 2);
    }

    #[test]
    fn back_on_main_refreshes_and_arms_sleep() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenMain));
        m.timers_mut().log.clear();

        block_on(m.dispatch(Event::UserTimeout));
        assert_eq!(m.display().frames.len(), 2);
        // Main's deactivation disarms sleep before it is armed again.
        assert_eq!(
            m.timers().log.first(),
            Some(&(TimerId::Sleep, None))
        );
        assert_eq!(
            m.timers().log.last(),
            Some(&(TimerId::Sleep, Some(ms(SLEEP_TIMEOUT_MS))))
        );
    }

    #[test]
    fn queued_write_raises_outbox_signal() {
        let (store, clock) = fixtures();
        let ready = OutboxSignal::new();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store)
            .with_outbox_signal(&ready);
        block_on(m.dispatch(Event::ScreenAudio));
        assert!(!ready.signaled());

        block_on(m.dispatch(Event::Key1));
        assert!(ready.signaled());
    }

    #[test]
    fn heating_resets_from_clock_on_each_activation() {
        let (store, clock) = fixtures();
        clock.set(DateTime::new(2024, 6, 15, 1, 10, 0).unwrap());
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenHeating));
        block_on(m.dispatch(Event::Plus));
        block_on(m.dispatch(Event::Back));
        block_on(m.dispatch(Event::ScreenHeating));
        let body = &m.display().frames.last().unwrap().body;
        assert_eq!(body[1].as_str(), "02:00");
    }

    #[test]
    fn main_redraws_once_on_sync_and_arms_sleep() {
        let (store, clock) = fixtures();
        let mut m = ScreenManager::new(RecordingDisplay::default(), RecordingTimers::default(), &clock, &store);
        block_on(m.dispatch(Event::ScreenMain));
        let frames = m.display().frames.len();
        m.timers_mut().log.clear();

        block_on(m.dispatch(Event::ConnectionFinished));
        assert_eq!(m.display().frames.len(), frames + 1);
        assert_eq!(m.timers().armed(TimerId::Sleep), 1);
        assert_eq!(m.timers().armed(TimerId::Redraw), 0);
    }
}
