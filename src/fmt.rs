//! Logging macros: `defmt` on target, the `log` facade on the host,
//! nothing when neither feature is enabled.
//!
//! Format strings must stay within the common subset of both backends
//! (`{}` and `{:?}` only).

#![allow(unused_macros, unused_imports)]

#[cfg(feature = "defmt")]
pub(crate) use defmt::{debug, error, info, warn};

#[cfg(all(feature = "log", not(feature = "defmt")))]
pub(crate) use log::{debug, error, info, warn};

#[cfg(not(any(feature = "log", feature = "defmt")))]
mod noop {
    macro_rules! debug {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! info {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! warn {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! error {
        ($($arg:tt)*) => {{}};
    }

    pub(crate) use {debug, error, info, warn};
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
pub(crate) use noop::{debug, error, info, warn};
