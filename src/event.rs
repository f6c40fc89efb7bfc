//! Events and the bounded queue feeding the dispatch loop.
//!
//! Every producer (sync task, touch task, timer tasks, power task) posts
//! into one `EventQueue`; the dispatch loop is its only consumer.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_timeout, Duration};

use crate::config::{EVENT_POST_TIMEOUT_MS, EVENT_QUEUE_CAPACITY, EVENT_RECEIVE_TIMEOUT_MS};
use crate::fmt::{debug, warn};

/// Everything the screen state machine reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    // Softkeys, left to right
    Key0,
    Key1,
    Key2,
    Key3,

    // Screen requests
    ScreenEntry,
    ScreenMain,
    ScreenAudio,
    ScreenHeating,
    ScreenAbsent,

    // Lifecycle
    ConnectionFinished,
    ConnectionFailed,
    DataSent,
    Redraw,
    UserTimeout,
    TimeUpdate,
    Temperature,
    Humidity,
    Window,

    // Screen actions
    Confirm,
    Plus,
    Minus,
    On,
    Off,
    Home,
    Absent,
    Back,
}

impl Event {
    /// Key event for softkey `index`, if there is such a key.
    pub const fn key(index: usize) -> Option<Event> {
        match index {
            0 => Some(Event::Key0),
            1 => Some(Event::Key1),
            2 => Some(Event::Key2),
            3 => Some(Event::Key3),
            _ => None,
        }
    }

    /// Softkey index of a key event.
    pub const fn key_index(self) -> Option<usize> {
        match self {
            Event::Key0 => Some(0),
            Event::Key1 => Some(1),
            Event::Key2 => Some(2),
            Event::Key3 => Some(3),
            _ => None,
        }
    }

    pub const fn is_key(self) -> bool {
        self.key_index().is_some()
    }
}

/// Anything events can be posted to.
///
/// The sync session is generic over this so it can be driven against a
/// recording sink in tests.
pub trait EventSink {
    async fn post(&self, event: Event);
}

/// Bounded multi-producer / single-consumer event queue.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAPACITY>,
    dropped: AtomicU32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Post an event, waiting at most `EVENT_POST_TIMEOUT_MS` for room.
    ///
    /// Returns `false` if the event was dropped.
    pub async fn send(&self, event: Event) -> bool {
        let timeout = Duration::from_millis(EVENT_POST_TIMEOUT_MS);
        match with_timeout(timeout, self.channel.send(event)).await {
            Ok(()) => true,
            Err(_) => {
                self.record_drop(event);
                false
            }
        }
    }

    /// Post without waiting. Used from contexts that must not block.
    pub fn try_send(&self, event: Event) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                self.record_drop(event);
                false
            }
        }
    }

    /// Wait up to `EVENT_RECEIVE_TIMEOUT_MS` for the next event.
    pub async fn next(&self) -> Option<Event> {
        let timeout = Duration::from_millis(EVENT_RECEIVE_TIMEOUT_MS);
        with_timeout(timeout, self.channel.receive()).await.ok()
    }

    pub fn try_next(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    /// Number of events dropped on a full queue since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    fn record_drop(&self, event: Event) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!("Event queue full, dropped {:?} ({} total)", event, total);
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventQueue {
    async fn post(&self, event: Event) {
        debug!("post {:?}", event);
        self.send(event).await;
    }
}

/// The application event queue.
pub static EVENTS: EventQueue = EventQueue::new();
