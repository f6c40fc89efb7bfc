//! Sleep / wake control for battery operation.
//!
//! The nRF52840 cannot wake from System OFF on an RTC alarm, so the
//! panel sleeps in System ON: the power task persists the retained
//! state, then parks until the sync interval elapses or the touch task
//! reports a touch. Everything else is idle in between, so the CPU sits
//! in WFE with only the RTC and the slow touch poll running.
//!
//! nRF52840 power modes:
//! - System ON: Normal operation (~3.5 mA with BLE active)
//! - System ON Idle: CPU sleeping, RTC running (~2 µA plus peripherals)
//! - System OFF: Deep sleep, wake on GPIO/NFC/reset only (~0.3 µA)

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use embedded_storage_async::nor_flash::NorFlash;

use crate::clock::Clock;
use crate::event::EventSink;
use crate::fmt::info;
use crate::power_logic::{sleep_duration, wake_events, WakeReason};
use crate::state::SharedStore;
use crate::storage;

static POWER_DOWN: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static WAKE: Signal<CriticalSectionRawMutex, WakeReason> = Signal::new();
static ASLEEP: AtomicBool = AtomicBool::new(false);

/// Raised after every wake (and at boot) to start a sync session.
pub static SYNC_REQUEST: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Sleep timer expired.
pub fn request_power_down() {
    POWER_DOWN.signal(());
}

/// End the current sleep early. Ignored while awake.
pub fn wake(reason: WakeReason) {
    if is_asleep() {
        WAKE.signal(reason);
    }
}

pub fn is_asleep() -> bool {
    ASLEEP.load(Ordering::Acquire)
}

/// Power task body: persist, sleep, wake, land on a screen, sync.
pub async fn run<F, C, E>(mut flash: F, store: &SharedStore, clock: &C, events: &E) -> !
where
    F: NorFlash,
    C: Clock,
    E: EventSink,
{
    loop {
        POWER_DOWN.wait().await;
        storage::save(&mut flash, store, clock).await;

        let duration = sleep_duration(clock.now());
        info!("Power: sleeping {} s", duration.as_secs());
        WAKE.reset();
        ASLEEP.store(true, Ordering::Release);

        let reason = match select(Timer::after(duration), WAKE.wait()).await {
            Either::First(()) => WakeReason::Timer,
            Either::Second(reason) => reason,
        };

        ASLEEP.store(false, Ordering::Release);
        // A sleep timer that fired while we slept is stale.
        POWER_DOWN.reset();
        info!("Power: wake {:?}", reason);

        for event in wake_events(reason) {
            events.post(event).await;
        }
        SYNC_REQUEST.signal(());
    }
}
