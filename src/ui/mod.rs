//! User interface subsystem - screens, dispatch loop and display.
//!
//! The dispatch loop (`manager.rs`) is the single consumer of the event
//! queue. It owns the active `Screen` (`screens.rs`), applies the
//! actions a screen returns and renders `Frame`s through the `Display`
//! trait (`display.rs` draws them with embedded-graphics).
//!
//! ## Components
//!
//! - **Display**: SSD1306 128×64 OLED via I²C, one headline row, six
//!   body rows and a softkey row
//! - **Softkeys**: 4 capacitive pads below the display (`buttons.rs`)

#[cfg(feature = "embedded")]
pub mod buttons;
pub mod display;
pub mod manager;
pub mod screens;

use heapless::{String, Vec};

use crate::config::SOFTKEY_COUNT;
use crate::error::Error;
use crate::event::Event;

/// Characters per text row (128 px / 5 px glyphs).
pub const LINE_LEN: usize = 25;

/// Text rows between headline and softkeys.
pub const BODY_LINES: usize = 6;

pub type Line = String<LINE_LEN>;

/// Screen identity, for logging and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScreenId {
    Entry,
    Main,
    Audio,
    Heating,
    Absent,
}

/// Softkey icons. Rendered as short labels on the OLED.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Icon {
    Heating,
    Audio,
    Presence,
    On,
    Off,
    Minus,
    Plus,
    Confirm,
    Away,
    Home,
    Back,
}

impl Icon {
    pub const fn label(self) -> &'static str {
        match self {
            Icon::Heating => "Heat",
            Icon::Audio => "Audio",
            Icon::Presence => "Pres",
            Icon::On => "On",
            Icon::Off => "Off",
            Icon::Minus => "-",
            Icon::Plus => "+",
            Icon::Confirm => "OK",
            Icon::Away => "Away",
            Icon::Home => "Home",
            Icon::Back => "Back",
        }
    }
}

/// One softkey slot: what it shows and which event a press raises.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Softkey {
    pub icon: Icon,
    pub event: Event,
}

pub type Softkeys = [Option<Softkey>; SOFTKEY_COUNT];

/// Complete content of one screen render.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub headline: Line,
    /// Right-aligned part of the headline (the time on Main).
    pub headline_right: String<8>,
    pub body: Vec<Line, BODY_LINES>,
    pub softkeys: [Option<Icon>; SOFTKEY_COUNT],
}

impl Frame {
    /// Append a body row, truncated to the row width. Extra rows are dropped.
    pub fn push_line(&mut self, text: &str) {
        let mut line = Line::new();
        for c in text.chars() {
            if line.push(c).is_err() {
                break;
            }
        }
        let _ = self.body.push(line);
    }
}

/// Physical display driver.
pub trait Display {
    /// Draw `frame` and push it to the panel.
    fn show(&mut self, frame: &Frame) -> Result<(), Error>;
}
