//! Capacitive softkey input.
//!
//! Four pads below the display are sampled through the SAADC (one
//! single-ended channel per pad, AIN0..AIN3). A touched pad reads low.
//! The task polls every `TOUCH_POLL_MS`, runs the samples through the
//! `TouchPanel` debouncer and posts `KeyN` for every confirmed press.
//!
//! While the panel sleeps the poll slows down and the first touched pad
//! wakes the power task instead. That press is injected into the
//! debouncer so the finger still resting on the pad is not reported a
//! second time; the power task replays it as a key event after waking.

use embassy_nrf::saadc::Saadc;
use embassy_time::{Duration, Instant, Timer};

use crate::config::{SOFTKEY_COUNT, TOUCH_POLL_MS, TOUCH_SLEEP_POLL_MS};
use crate::event::{Event, EventSink};
use crate::fmt::{debug, info};
use crate::power;
use crate::power_logic::WakeReason;
use crate::touch::{TouchPanel, TouchSampler};

/// SAADC with one channel per pad.
pub struct SaadcSampler<'d> {
    adc: Saadc<'d, SOFTKEY_COUNT>,
}

impl<'d> SaadcSampler<'d> {
    pub fn new(adc: Saadc<'d, SOFTKEY_COUNT>) -> Self {
        Self { adc }
    }

    pub async fn calibrate(&self) {
        self.adc.calibrate().await;
    }
}

impl TouchSampler for SaadcSampler<'_> {
    async fn sample(&mut self) -> [u16; SOFTKEY_COUNT] {
        let mut buf = [0i16; SOFTKEY_COUNT];
        self.adc.sample(&mut buf).await;
        // Single-ended readings dip slightly below zero near ground.
        buf.map(|v| v.max(0) as u16)
    }
}

/// Touch polling loop.
pub async fn run(mut sampler: impl TouchSampler, events: &impl EventSink) -> ! {
    let mut panel = TouchPanel::new();

    loop {
        let samples = sampler.sample().await;
        let now = Instant::now().as_millis();

        if power::is_asleep() {
            if let Some(button) = panel.first_touched(&samples) {
                panel.inject(button, now);
                info!("Touch wake on key {}", button);
                power::wake(WakeReason::Touch(button));
            }
            Timer::after(Duration::from_millis(TOUCH_SLEEP_POLL_MS)).await;
            continue;
        }

        for transition in panel.update(&samples, now) {
            debug!("Touch {:?}", transition);
            if !transition.pressed {
                continue;
            }
            if let Some(key) = Event::key(transition.button as usize) {
                events.post(key).await;
            }
        }

        Timer::after(Duration::from_millis(TOUCH_POLL_MS)).await;
    }
}
