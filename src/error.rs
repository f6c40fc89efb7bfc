//! Unified error type for the status panel.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // BLE
    /// The sync session failed before any data was read.
    Ble(BleError),

    // Storage
    /// The retained snapshot could not be encoded or decoded.
    Snapshot,

    // UI / Display
    /// I²C transaction to the display failed.
    Display,
}

/// Session-fatal BLE failures (keeps the enum `Copy`-friendly).
///
/// Any of these ends the sync session and surfaces as a single
/// connection-failed event; nothing retries automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// The scan window closed without seeing the hub.
    ScanTimeout,
    /// Scan could not start.
    ScanFailed,
    /// Connection attempt failed.
    ConnectFailed,
    /// The hub does not expose the panel service.
    ServiceNotFound,
}

/// Per-characteristic failures. Never fatal to a session: the field
/// is skipped and keeps its previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CharError {
    /// The service has no such characteristic.
    NotFound,
    /// The value was shorter than its wire layout.
    Short,
    /// The read or write itself failed.
    Io,
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}

impl From<postcard::Error> for Error {
    fn from(_: postcard::Error) -> Self {
        Error::Snapshot
    }
}
