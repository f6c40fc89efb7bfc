//! Pure power policy: how long to sleep and where to land after a wake.

use embassy_time::Duration;
use heapless::Vec;

use crate::clock::DateTime;
use crate::config::SYNC_INTERVAL_MINUTES;
use crate::event::Event;

/// Why the panel is (re)starting its UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeReason {
    PowerOn,
    /// Scheduled sync interval elapsed.
    Timer,
    /// A softkey was touched while asleep.
    Touch(u8),
}

/// Minutes until the next automatic sync for the given local hour.
///
/// An unknown time uses the table's fallback entry.
pub fn sync_interval_minutes(hour: Option<u8>) -> u8 {
    let index = match hour {
        Some(h) if (h as usize) < 24 => h as usize,
        _ => SYNC_INTERVAL_MINUTES.len() - 1,
    };
    SYNC_INTERVAL_MINUTES[index]
}

/// Sleep duration before the next automatic sync.
pub fn sleep_duration(now: Option<DateTime>) -> Duration {
    Duration::from_secs(sync_interval_minutes(now.map(|t| t.hour)) as u64 * 60)
}

/// Screen request posted after waking.
///
/// A touch wake lands on the invisible entry screen so the waking key
/// is routed like a softkey press on Main.
pub const fn landing_screen(reason: WakeReason) -> Event {
    match reason {
        WakeReason::Touch(_) => Event::ScreenEntry,
        WakeReason::PowerOn | WakeReason::Timer => Event::ScreenMain,
    }
}

/// Events posted once the panel is awake again: the landing screen,
/// then the waking key for a touch wake.
pub fn wake_events(reason: WakeReason) -> Vec<Event, 2> {
    let mut events = Vec::new();
    let _ = events.push(landing_screen(reason));
    if let WakeReason::Touch(button) = reason {
        if let Some(key) = Event::key(button as usize) {
            let _ = events.push(key);
        }
    }
    events
}
