//! status-panel - battery-powered BLE status panel for nRF52840.
//!
//! The panel wakes on a schedule (or a touch), connects to the home hub
//! as a BLE central, reads sensor and schedule values into a retained
//! device store, delivers pending user requests, and shows everything on
//! a small display driven by four capacitive softkeys.
//!
//! ```text
//!  touch task ─┐                       ┌─> Screen (Entry/Main/Audio/Heating/Absent)
//!  timer tasks ─┼─> EventQueue (4) ─> ScreenManager ─> Display
//!  sync task ──┘                       └─> DeviceStore.outbox
//!       │                                        ^
//!       └── SyncSession ── Link / GattClient ────┘ (reads, flushes outbox)
//! ```
//!
//! Everything except the hardware glue (`power`, `storage`,
//! `ble::central`, `ui::buttons`, the OLED driver) builds on the host,
//! so `cargo test` exercises the codecs, the store, the screens, the
//! dispatch loop and the sync session against mock collaborators.
//!
//! The embedded binary (`main.rs`) is built with `cargo firmware`, which
//! turns on `embedded` and leaves the default `log` feature off.

#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

pub(crate) mod fmt;

pub mod ble;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod outbox;
pub mod power_logic;
pub mod state;
pub mod timers;
pub mod touch;
pub mod ui;

#[cfg(feature = "embedded")]
pub mod power;
#[cfg(feature = "embedded")]
pub mod storage;

pub use error::{BleError, CharError, Error};
pub use event::{Event, EventQueue, EventSink, EVENTS};
pub use state::{DeviceState, DeviceStore, SharedStore, STORE};
