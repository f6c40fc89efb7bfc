//! status-panel firmware entry point (nRF52840 + S140 SoftDevice).
//!
//! Hardware:
//! - SSD1306 128×64 OLED on TWIM0: SDA P0.26, SCL P0.27
//! - Four capacitive pads on SAADC AIN0..AIN3 (P0.02..P0.05)
//! - Retained snapshot in internal flash through the SoftDevice
//!
//! Tasks:
//! - `softdevice_task`: SoftDevice event pump
//! - `dispatch_task`: the screen manager, sole consumer of `EVENTS`
//! - `touch_task`: pad sampling and debouncing
//! - `idle_timer_task` / `sleep_timer_task` / `redraw_timer_task`
//! - `sync_task`: one sync session per `SYNC_REQUEST`, one outbox
//!   delivery per `OUTBOX_READY`
//! - `power_task`: persist, sleep, wake

#![no_std]
#![no_main]

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::peripherals::TWISPI0;
use embassy_nrf::saadc::{self, ChannelConfig, Saadc};
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, peripherals};
use nrf_softdevice::{raw, Flash, Softdevice};
use {defmt_rtt as _, panic_probe as _};

use status_panel::ble::central::SoftdeviceLink;
use status_panel::ble::session::SyncSession;
use status_panel::clock::SystemClock;
use status_panel::event::{EventSink, EVENTS};
use status_panel::outbox::OUTBOX_READY;
use status_panel::power;
use status_panel::power_logic::{landing_screen, WakeReason};
use status_panel::state::STORE;
use status_panel::storage;
use status_panel::timers::{self, SignalTimers, IDLE_TIMER, REDRAW_TIMER, SLEEP_TIMER};
use status_panel::ui::buttons::{self, SaadcSampler};
use status_panel::ui::display::OledDisplay;
use status_panel::ui::manager::ScreenManager;
use status_panel::Event;

bind_interrupts!(struct Irqs {
    SAADC => saadc::InterruptHandler;
    TWISPI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

static CLOCK: SystemClock = SystemClock::new();

type PanelDisplay = OledDisplay<Twim<'static, TWISPI0>>;

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn dispatch_task(display: PanelDisplay) -> ! {
    let mut manager = ScreenManager::new(display, SignalTimers, &CLOCK, &STORE);
    manager.run(&EVENTS).await
}

#[embassy_executor::task]
async fn touch_task(sampler: SaadcSampler<'static>) -> ! {
    buttons::run(sampler, &EVENTS).await
}

#[embassy_executor::task]
async fn idle_timer_task() -> ! {
    loop {
        timers::expired(&IDLE_TIMER).await;
        EVENTS.post(Event::UserTimeout).await;
    }
}

#[embassy_executor::task]
async fn sleep_timer_task() -> ! {
    loop {
        timers::expired(&SLEEP_TIMER).await;
        power::request_power_down();
    }
}

#[embassy_executor::task]
async fn redraw_timer_task() -> ! {
    loop {
        timers::expired(&REDRAW_TIMER).await;
        EVENTS.post(Event::Redraw).await;
    }
}

#[embassy_executor::task]
async fn sync_task(sd: &'static Softdevice) -> ! {
    let mut link = SoftdeviceLink::new(sd);
    let session = SyncSession::new(&STORE, &CLOCK, &EVENTS);
    loop {
        match select(power::SYNC_REQUEST.wait(), OUTBOX_READY.wait()).await {
            Either::First(()) => {
                if let Err(e) = session.run(&mut link).await {
                    warn!("Sync failed: {:?}", e);
                }
            }
            Either::Second(()) => {
                if let Err(e) = session.deliver(&mut link).await {
                    warn!("Delivery failed, kept for next sync: {:?}", e);
                }
            }
        }
    }
}

#[embassy_executor::task]
async fn power_task(flash: Flash) -> ! {
    power::run(flash, &STORE, &CLOCK, &EVENTS).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("status-panel starting");

    // The SoftDevice reserves priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);
    interrupt::SAADC.set_priority(Priority::P3);
    interrupt::TWISPI0.set_priority(Priority::P3);

    let sd_config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 23 }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 0,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        ..Default::default()
    };
    let sd: &'static Softdevice = Softdevice::enable(&sd_config);
    unwrap!(spawner.spawn(softdevice_task(sd)));

    let mut flash = Flash::take(sd);
    storage::load(&mut flash, &STORE, &CLOCK).await;

    let i2c = Twim::new(
        p.TWISPI0,
        Irqs,
        p.P0_26,
        p.P0_27,
        twim::Config::default(),
    );
    let display = OledDisplay::new(i2c);

    let adc = Saadc::new(
        p.SAADC,
        Irqs,
        saadc::Config::default(),
        [
            ChannelConfig::single_ended(p.P0_02),
            ChannelConfig::single_ended(p.P0_03),
            ChannelConfig::single_ended(p.P0_04),
            ChannelConfig::single_ended(p.P0_05),
        ],
    );
    let sampler = SaadcSampler::new(adc);
    sampler.calibrate().await;

    unwrap!(spawner.spawn(dispatch_task(display)));
    unwrap!(spawner.spawn(touch_task(sampler)));
    unwrap!(spawner.spawn(idle_timer_task()));
    unwrap!(spawner.spawn(sleep_timer_task()));
    unwrap!(spawner.spawn(redraw_timer_task()));
    unwrap!(spawner.spawn(power_task(flash)));
    unwrap!(spawner.spawn(sync_task(sd)));

    EVENTS.post(landing_screen(WakeReason::PowerOn)).await;
    power::SYNC_REQUEST.signal(());
}
