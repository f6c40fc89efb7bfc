//! The five screens and their event handlers.
//!
//! Screens never touch the display, the timers or the store directly.
//! `handle`, `activate` and `deactivate` return `Action`s that the
//! dispatch loop carries out, which keeps every transition testable
//! without hardware.

use core::fmt::Write as _;

use heapless::Vec;

use crate::ble::Characteristic;
use crate::clock::DateTime;
use crate::config::ACTIVATION_RENDER_PASSES;
use crate::event::Event;
use crate::outbox::{AudioMode, DeliveryStatus, Outbox, PartyEnd, PendingWrite, Presence};
use crate::state::{Celsius, Departure, DeviceState};
use crate::ui::{Frame, Icon, Line, ScreenId, Softkey, Softkeys};

/// Party-mode end time step, in tens-of-minutes units.
pub const HEATING_STEP: u8 = 5;
/// Latest selectable end time (06:00).
pub const HEATING_MAX: u8 = 60;
/// Default end time (00:30).
pub const HEATING_DEFAULT: u8 = 5;

/// Most window-open rooms listed on Main.
const MAX_OPEN_ROOMS: usize = 3;

// ═══════════════════════════════════════════════════════════════════════════
// Softkey tables
// ═══════════════════════════════════════════════════════════════════════════

const fn key(icon: Icon, event: Event) -> Option<Softkey> {
    Some(Softkey { icon, event })
}

/// Entry and Main. Slot 1 is free.
static ROOT_KEYS: Softkeys = [
    key(Icon::Heating, Event::ScreenHeating),
    None,
    key(Icon::Audio, Event::ScreenAudio),
    key(Icon::Presence, Event::ScreenAbsent),
];

static AUDIO_KEYS: Softkeys = [
    key(Icon::Off, Event::Off),
    key(Icon::On, Event::On),
    None,
    key(Icon::Back, Event::Back),
];

static HEATING_KEYS: Softkeys = [
    key(Icon::Minus, Event::Minus),
    key(Icon::Plus, Event::Plus),
    key(Icon::Confirm, Event::Confirm),
    key(Icon::Back, Event::Back),
];

static ABSENT_KEYS: Softkeys = [
    key(Icon::Away, Event::Absent),
    key(Icon::Home, Event::Home),
    None,
    key(Icon::Back, Event::Back),
];

// ═══════════════════════════════════════════════════════════════════════════
// Actions
// ═══════════════════════════════════════════════════════════════════════════

/// Side effects requested by a screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Handle a follow-up event right after this one.
    Dispatch(Event),
    /// Render now and `passes - 1` more times on the redraw timer.
    Render { passes: u8 },
    /// Present the current frame again (redraw timer fired).
    Repeat,
    /// Queue a write for the next sync.
    Request(PendingWrite),
    ArmSleep,
    DisarmSleep,
}

pub type Actions = Vec<Action, 4>;

fn push(actions: &mut Actions, action: Action) {
    let _ = actions.push(action);
}

// ═══════════════════════════════════════════════════════════════════════════
// Screens
// ═══════════════════════════════════════════════════════════════════════════

/// Party-mode end time being edited on the heating screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeatingEdit {
    /// End time in tens of minutes: `v/10` hours, `(v%10)*6` minutes.
    pub party_until: u8,
    /// Confirmed and waiting for (or done with) delivery.
    pub confirmed: bool,
}

impl HeatingEdit {
    /// Default end time, or the next full hour during the night.
    pub fn starting_at(now: Option<DateTime>) -> Self {
        let party_until = match now {
            Some(t) if t.hour < 6 => (t.hour + 1) * 10,
            _ => HEATING_DEFAULT,
        };
        Self {
            party_until,
            confirmed: false,
        }
    }

    /// Returns `false` at the upper limit.
    pub fn plus(&mut self) -> bool {
        if self.party_until >= HEATING_MAX {
            return false;
        }
        self.party_until = (self.party_until + HEATING_STEP).min(HEATING_MAX);
        true
    }

    /// Returns `false` at zero.
    pub fn minus(&mut self) -> bool {
        if self.party_until == 0 {
            return false;
        }
        self.party_until = self.party_until.saturating_sub(HEATING_STEP);
        true
    }

    pub fn end(&self) -> PartyEnd {
        PartyEnd::from_tenths(self.party_until)
    }
}

/// Data a screen renders from.
pub struct View<'a> {
    pub device: &'a DeviceState,
    pub outbox: &'a Outbox,
    pub now: Option<DateTime>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Screen {
    /// Invisible screen after a touch wake; routes the waking key.
    Entry,
    Main,
    Audio,
    Heating(HeatingEdit),
    Absent,
}

impl Screen {
    /// Screen named by a screen-request event.
    pub fn for_request(event: Event) -> Option<Screen> {
        match event {
            Event::ScreenEntry => Some(Screen::Entry),
            Event::ScreenMain => Some(Screen::Main),
            Event::ScreenAudio => Some(Screen::Audio),
            Event::ScreenHeating => Some(Screen::Heating(HeatingEdit::starting_at(None))),
            Event::ScreenAbsent => Some(Screen::Absent),
            _ => None,
        }
    }

    pub fn id(&self) -> ScreenId {
        match self {
            Screen::Entry => ScreenId::Entry,
            Screen::Main => ScreenId::Main,
            Screen::Audio => ScreenId::Audio,
            Screen::Heating(_) => ScreenId::Heating,
            Screen::Absent => ScreenId::Absent,
        }
    }

    pub fn renders(&self) -> bool {
        !matches!(self, Screen::Entry)
    }

    pub fn softkeys(&self) -> &'static Softkeys {
        match self {
            Screen::Entry | Screen::Main => &ROOT_KEYS,
            Screen::Audio => &AUDIO_KEYS,
            Screen::Heating(_) => &HEATING_KEYS,
            Screen::Absent => &ABSENT_KEYS,
        }
    }

    pub fn activate(&mut self, now: Option<DateTime>) -> Actions {
        let mut actions = Actions::new();
        if let Screen::Heating(edit) = self {
            *edit = HeatingEdit::starting_at(now);
        }
        if self.renders() {
            push(
                &mut actions,
                Action::Render {
                    passes: ACTIVATION_RENDER_PASSES,
                },
            );
        }
        actions
    }

    pub fn deactivate(&mut self) -> Actions {
        let mut actions = Actions::new();
        if let Screen::Main = self {
            push(&mut actions, Action::DisarmSleep);
        }
        actions
    }

    /// Shared softkey / redraw handling, then the screen's own reaction.
    pub fn handle(&mut self, event: Event) -> Actions {
        let mut actions = Actions::new();

        if let Some(index) = event.key_index() {
            if let Some(softkey) = self.softkeys()[index] {
                push(&mut actions, Action::Dispatch(softkey.event));
            }
        } else if event == Event::Redraw && self.renders() {
            push(&mut actions, Action::Repeat);
        }

        match self {
            Screen::Entry => match event {
                Event::ConnectionFinished | Event::ConnectionFailed => {
                    push(&mut actions, Action::ArmSleep)
                }
                _ => {}
            },
            Screen::Main => match event {
                Event::ConnectionFinished => {
                    push(&mut actions, Action::Render { passes: 1 });
                    push(&mut actions, Action::ArmSleep);
                }
                Event::ConnectionFailed => push(&mut actions, Action::ArmSleep),
                _ => {}
            },
            Screen::Audio => {
                let mode = match event {
                    Event::On => Some(AudioMode::On),
                    Event::Off => Some(AudioMode::Off),
                    _ => None,
                };
                if let Some(mode) = mode {
                    push(&mut actions, Action::Request(PendingWrite::Audio(mode)));
                    push(&mut actions, Action::Render { passes: 1 });
                } else if event == Event::DataSent {
                    push(&mut actions, Action::Render { passes: 1 });
                }
            }
            Screen::Absent => {
                let presence = match event {
                    Event::Home => Some(Presence::Home),
                    Event::Absent => Some(Presence::Absent),
                    _ => None,
                };
                if let Some(presence) = presence {
                    push(&mut actions, Action::Request(PendingWrite::Presence(presence)));
                    push(&mut actions, Action::Render { passes: 1 });
                } else if event == Event::DataSent {
                    push(&mut actions, Action::Render { passes: 1 });
                }
            }
            Screen::Heating(edit) => match event {
                Event::Plus => {
                    if edit.plus() {
                        push(&mut actions, Action::Render { passes: 1 });
                    }
                }
                Event::Minus => {
                    if edit.minus() {
                        push(&mut actions, Action::Render { passes: 1 });
                    }
                }
                Event::Confirm => {
                    edit.confirmed = true;
                    push(&mut actions, Action::Request(PendingWrite::PartyMode(edit.end())));
                    push(&mut actions, Action::Render { passes: 2 });
                }
                Event::DataSent => push(&mut actions, Action::Render { passes: 1 }),
                _ => {}
            },
        }

        actions
    }

    /// Headline, body and softkeys for the current data.
    pub fn frame(&self, view: &View<'_>) -> Frame {
        let mut frame = Frame {
            softkeys: self.softkeys().map(|k| k.map(|k| k.icon)),
            ..Frame::default()
        };

        match self {
            Screen::Entry => {}
            Screen::Main => main_frame(&mut frame, view),
            Screen::Audio => {
                let _ = frame.headline.push_str("Audio");
                if let Some(mode) = view.outbox.audio.value {
                    let mut line = Line::new();
                    let _ = write!(line, "Amplifier {}", mode.as_str());
                    let _ = frame.body.push(line);
                }
                push_status(&mut frame, view.outbox.status(Characteristic::Audio));
            }
            Screen::Absent => {
                let _ = frame.headline.push_str("Presence");
                if let Some(presence) = view.outbox.presence.value {
                    let mut line = Line::new();
                    let _ = write!(line, "Mode {}", presence.as_str());
                    let _ = frame.body.push(line);
                }
                push_status(&mut frame, view.outbox.status(Characteristic::Presence));
            }
            Screen::Heating(edit) => {
                let _ = frame.headline.push_str("Heating");
                if edit.confirmed {
                    push_status(&mut frame, view.outbox.status(Characteristic::PartyMode));
                } else {
                    frame.push_line("Heat until");
                    frame.push_line(edit.end().format().as_str());
                }
            }
        }
        frame
    }
}

fn push_status(frame: &mut Frame, status: DeliveryStatus) {
    match status {
        DeliveryStatus::Idle => {}
        DeliveryStatus::Pending => frame.push_line("Sending data"),
        DeliveryStatus::Delivered => frame.push_line("OK"),
    }
}

fn main_frame(frame: &mut Frame, view: &View<'_>) {
    match view.now {
        Some(t) => {
            let _ = write!(frame.headline, "{:02}.{:02}.{:04}", t.day, t.month, t.year);
            let _ = write!(frame.headline_right, "{:02}:{:02}", t.hour, t.minute);
        }
        None => {
            let _ = frame.headline.push_str("--.--.----");
            let _ = frame.headline_right.push_str("--:--");
        }
    }

    let d = view.device;
    let _ = frame.body.push(climate_line("In", d.temperature, d.humidity));
    let _ = frame
        .body
        .push(climate_line("Out", d.outdoor_temperature, d.outdoor_humidity));
    for departure in &d.departures {
        let _ = frame.body.push(departure_line(departure));
    }
    let _ = frame.body.push(window_line(d));
    if d.garbage.is_synced() {
        let mut line = Line::new();
        let _ = write!(
            line,
            "{} {} {}",
            d.garbage.category.label(),
            d.garbage.days,
            d.garbage.day_unit()
        );
        let _ = frame.body.push(line);
    }
}

fn climate_line(label: &str, temperature: Option<Celsius>, humidity: Option<u8>) -> Line {
    let mut line = Line::new();
    let _ = write!(line, "{:<4}", label);
    let _ = match temperature {
        Some(t) => write!(line, "{}C ", t),
        None => write!(line, "--.-C "),
    };
    let _ = match humidity {
        Some(h) => write!(line, "{}%", h),
        None => write!(line, "--%"),
    };
    line
}

fn departure_line(d: &Departure) -> Line {
    let mut line = Line::new();
    let _ = write!(
        line,
        "{:02}:{:02}-{:02}:{:02} L{}",
        d.departure / 60,
        d.departure % 60,
        d.arrival / 60,
        d.arrival % 60,
        d.line
    );
    line
}

fn window_line(device: &DeviceState) -> Line {
    let mut line = Line::new();
    let _ = line.push_str("Win");
    let mut open = device.open_rooms().peekable();
    if open.peek().is_none() {
        let _ = line.push_str(" OK");
    }
    for room in open.take(MAX_OPEN_ROOMS) {
        let _ = line.push(' ');
        let _ = line.push_str(room.short_name());
    }
    line
}
