//! One-shot software timers.
//!
//! Three independent timers, each an embassy task waiting on its own
//! command signal:
//!
//! - **Idle** - re-armed on every key press, expiry posts `UserTimeout`.
//! - **Sleep** - armed after a sync outcome or a return to Main, expiry
//!   requests power-down.
//! - **Redraw** - drives multi-pass renders, expiry posts `Redraw`.
//!
//! Signals keep only the latest command, so arming again replaces the
//! pending expiry instead of stacking a second one.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};

use crate::fmt::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerId {
    Idle,
    Sleep,
    Redraw,
}

/// What the dispatch loop needs from the timer subsystem.
pub trait Timers {
    /// Start `id`, cancelling any pending expiry.
    fn arm(&mut self, id: TimerId, after: Duration);

    fn disarm(&mut self, id: TimerId);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerCommand {
    Arm(Duration),
    Disarm,
}

pub type TimerSignal = Signal<CriticalSectionRawMutex, TimerCommand>;

pub static IDLE_TIMER: TimerSignal = Signal::new();
pub static SLEEP_TIMER: TimerSignal = Signal::new();
pub static REDRAW_TIMER: TimerSignal = Signal::new();

pub fn signal_for(id: TimerId) -> &'static TimerSignal {
    match id {
        TimerId::Idle => &IDLE_TIMER,
        TimerId::Sleep => &SLEEP_TIMER,
        TimerId::Redraw => &REDRAW_TIMER,
    }
}

/// `Timers` backed by the static timer signals.
#[derive(Clone, Copy, Default)]
pub struct SignalTimers;

impl Timers for SignalTimers {
    fn arm(&mut self, id: TimerId, after: Duration) {
        debug!("arm {:?} {} ms", id, after.as_millis());
        signal_for(id).signal(TimerCommand::Arm(after));
    }

    fn disarm(&mut self, id: TimerId) {
        debug!("disarm {:?}", id);
        signal_for(id).signal(TimerCommand::Disarm);
    }
}

/// Wait until the timer controlled by `command` expires.
///
/// Idles while disarmed; a new `Arm` restarts the countdown.
pub async fn expired(command: &TimerSignal) {
    let mut armed: Option<Duration> = None;
    loop {
        let after = match armed.take() {
            Some(after) => after,
            None => match command.wait().await {
                TimerCommand::Arm(after) => after,
                TimerCommand::Disarm => continue,
            },
        };
        match select(Timer::after(after), command.wait()).await {
            Either::First(()) => return,
            Either::Second(TimerCommand::Arm(next)) => armed = Some(next),
            Either::Second(TimerCommand::Disarm) => {}
        }
    }
}
