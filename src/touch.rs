//! Capacitive softkey debouncing.
//!
//! A pad reads *touched* while its raw level is below the pad's
//! threshold. Presses are reported on the first touched sample; a
//! release only once the pad has read untouched for longer than
//! `TOUCH_SETTLE_MS`, so short dropouts while a finger rests on the pad
//! do not produce release/press pairs.

use heapless::Vec;

use crate::config::{SOFTKEY_COUNT, TOUCH_SETTLE_MS, TOUCH_THRESHOLDS};

/// A confirmed state change of one softkey.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub button: u8,
    pub pressed: bool,
}

/// Debounce state of one pad.
#[derive(Clone, Copy, Debug)]
pub struct TouchDebouncer {
    button: u8,
    threshold: u16,
    touched: bool,
    /// Time of the last sample that read touched.
    last_touch_ms: u64,
}

impl TouchDebouncer {
    pub const fn new(button: u8, threshold: u16) -> Self {
        Self {
            button,
            threshold,
            touched: false,
            last_touch_ms: 0,
        }
    }

    pub const fn is_touched(&self) -> bool {
        self.touched
    }

    /// Raw level reads as a touch.
    pub const fn reads_touched(&self, raw: u16) -> bool {
        raw < self.threshold
    }

    /// Feed one raw sample taken at `now_ms`.
    pub fn update(&mut self, raw: u16, now_ms: u64) -> Option<Transition> {
        if self.reads_touched(raw) {
            self.last_touch_ms = now_ms;
            if !self.touched {
                self.touched = true;
                return Some(self.transition());
            }
        } else if self.touched && now_ms.saturating_sub(self.last_touch_ms) > TOUCH_SETTLE_MS {
            self.touched = false;
            return Some(self.transition());
        }
        None
    }

    /// Force a press, e.g. for the touch that woke the panel.
    ///
    /// Returns the press transition unless the pad was already pressed.
    pub fn inject(&mut self, now_ms: u64) -> Option<Transition> {
        self.last_touch_ms = now_ms;
        if self.touched {
            return None;
        }
        self.touched = true;
        Some(self.transition())
    }

    fn transition(&self) -> Transition {
        Transition {
            button: self.button,
            pressed: self.touched,
        }
    }
}

/// All four softkey pads.
pub struct TouchPanel {
    pads: [TouchDebouncer; SOFTKEY_COUNT],
}

impl TouchPanel {
    pub fn new() -> Self {
        Self {
            pads: core::array::from_fn(|i| TouchDebouncer::new(i as u8, TOUCH_THRESHOLDS[i])),
        }
    }

    /// Feed one sample per pad and collect confirmed transitions.
    pub fn update(
        &mut self,
        samples: &[u16; SOFTKEY_COUNT],
        now_ms: u64,
    ) -> Vec<Transition, SOFTKEY_COUNT> {
        let mut out = Vec::new();
        for (pad, &raw) in self.pads.iter_mut().zip(samples.iter()) {
            if let Some(t) = pad.update(raw, now_ms) {
                let _ = out.push(t);
            }
        }
        out
    }

    /// First pad whose raw sample reads touched, without debouncing.
    pub fn first_touched(&self, samples: &[u16; SOFTKEY_COUNT]) -> Option<u8> {
        self.pads
            .iter()
            .zip(samples.iter())
            .position(|(pad, &raw)| pad.reads_touched(raw))
            .map(|i| i as u8)
    }

    pub fn inject(&mut self, button: u8, now_ms: u64) -> Option<Transition> {
        self.pads.get_mut(button as usize)?.inject(now_ms)
    }
}

impl Default for TouchPanel {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw level source for the pads (SAADC on target).
pub trait TouchSampler {
    async fn sample(&mut self) -> [u16; SOFTKEY_COUNT];
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOUCHED: u16 = 20;
    const RELEASED: u16 = 200;

    #[test]
    fn press_is_reported_immediately() {
        let mut pad = TouchDebouncer::new(2, 65);
        assert_eq!(pad.update(RELEASED, 0), None);
        assert_eq!(
            pad.update(TOUCHED, 10),
            Some(Transition {
                button: 2,
                pressed: true
            })
        );
        assert_eq!(pad.update(TOUCHED, 20), None);
    }

    #[test]
    fn release_waits_for_settle_time() {
        let mut pad = TouchDebouncer::new(0, 60);
        pad.update(TOUCHED, 0);
        assert_eq!(pad.update(RELEASED, 10), None);
        assert_eq!(pad.update(RELEASED, 20), None);
        assert_eq!(pad.update(RELEASED, 30), None);
        assert_eq!(
            pad.update(RELEASED, 40),
            Some(Transition {
                button: 0,
                pressed: false
            })
        );
        assert!(!pad.is_touched());
    }

    #[test]
    fn short_release_glitch_is_swallowed() {
        let mut pad = TouchDebouncer::new(1, 60);
        assert!(pad.update(TOUCHED, 0).is_some());
        // 20 ms dropout while the finger stays on the pad.
        assert_eq!(pad.update(RELEASED, 10), None);
        assert_eq!(pad.update(RELEASED, 20), None);
        assert_eq!(pad.update(TOUCHED, 30), None);
        assert_eq!(pad.update(RELEASED, 40), None);
        assert_eq!(pad.update(TOUCHED, 50), None);
        assert!(pad.is_touched());
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut pad = TouchDebouncer::new(3, 70);
        assert_eq!(pad.update(70, 0), None);
        assert!(pad.update(69, 10).unwrap().pressed);
    }

    #[test]
    fn inject_forces_single_press() {
        let mut pad = TouchDebouncer::new(3, 70);
        assert!(pad.inject(0).unwrap().pressed);
        assert_eq!(pad.inject(5), None);
        // Finger still on the pad: no second press.
        assert_eq!(pad.update(TOUCHED, 10), None);
    }

    #[test]
    fn panel_uses_per_pad_thresholds() {
        let mut panel = TouchPanel::new();
        let samples = [62, 62, 62, 62];
        let transitions = panel.update(&samples, 0);
        let pressed: Vec<u8, 4> = transitions.iter().map(|t| t.button).collect();
        assert_eq!(pressed.as_slice(), &[2, 3]);
        assert_eq!(panel.first_touched(&[100, 59, 0, 0]), Some(1));
        assert_eq!(panel.first_touched(&[100, 100, 100, 100]), None);
    }
}
