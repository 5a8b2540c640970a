//! # sdcard-i2c-bridge
//!
//! > Drive the files on an SD card from the other end of an I2C bus.
//!
//! This crate is the protocol engine for a small microcontroller that sits
//! on an I2C bus as a target device and owns an SD card. The bus controller
//! sends single-byte commands (set a filename, write, append, read, list a
//! directory, query the volume, set the clock, ...) and the engine turns
//! them into calls on a [`Filesystem`] you provide.
//!
//! It is `#![no_std]` and does not use `alloc`. All of the state lives in one
//! [`ProtocolEngine`] that you construct once and then feed with bus events,
//! usually from the I2C interrupt handler. Every event is handled to
//! completion without blocking on anything but the filesystem itself.
//!
//! ## Using the crate
//!
//! You will need something that implements the [`Filesystem`] trait. The
//! engine never calls back into the bus; it just answers each event with an
//! ACK, a NACK or a response byte.
//!
//! ```rust
//! use sdcard_i2c_bridge::{BusEvent, Clock, Filesystem, NoIndicator, ProtocolEngine, Reply};
//!
//! fn example<FS: Filesystem>(fs: FS, clock: &Clock) {
//!     let mut engine = ProtocolEngine::new(fs, clock, NoIndicator);
//!     // The controller asks whether "LOG.TXT" exists.
//!     engine.handle(BusEvent::AddressWrite);
//!     for b in b"FLOG.TXT" {
//!         engine.handle(BusEvent::Written(*b));
//!     }
//!     engine.handle(BusEvent::Stop);
//!     engine.handle(BusEvent::AddressWrite);
//!     engine.handle(BusEvent::Written(b'E'));
//!     engine.handle(BusEvent::AddressRead);
//!     if let Reply::Byte(found) = engine.handle(BusEvent::ReadRequested) {
//!         println!("exists: {}", found);
//!     }
//!     engine.handle(BusEvent::Stop);
//! }
//! ```
//!
//! ## Features
//!
//! * `log`: Enabled by default. Generates log messages using the `log` crate.
//! * `defmt-log`: By turning off the default features and enabling the
//!   `defmt-log` feature you can configure this crate to log messages over defmt
//!   instead.
//!
//! You cannot enable both the `log` feature and the `defmt-log` feature.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate hex_literal;

// ****************************************************************************
//
// Imports
//
// ****************************************************************************

pub mod clock;
pub mod command;
pub mod engine;
pub mod filename;
pub mod filesystem;
pub mod indicator;
pub mod listing;
pub mod response;

#[doc(inline)]
pub use clock::{Clock, TimeSource, Timestamp, BOOT_EPOCH};

#[doc(inline)]
pub use command::Command;

#[doc(inline)]
pub use engine::{BusEvent, ProtocolEngine, Reply};

#[doc(inline)]
pub use filename::{EntryName, FilenameBuffer};

#[doc(inline)]
pub use filesystem::{CardType, DirEntry, FatType, Filesystem, OpenMode, VolumeInfo};

#[doc(inline)]
pub use indicator::{NoIndicator, PinIndicator, Status, StatusIndicator};

#[cfg(all(feature = "defmt-log", feature = "log"))]
compile_error!("Cannot enable both log and defmt-log");

#[cfg(feature = "log")]
use log::{debug, trace, warn};

#[cfg(feature = "defmt-log")]
use defmt::{debug, trace, warn};

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::debug! but does nothing at all
macro_rules! debug {
    ($($arg:tt)+) => {};
}

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::trace! but does nothing at all
macro_rules! trace {
    ($($arg:tt)+) => {};
}

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::warn! but does nothing at all
macro_rules! warn {
    ($($arg:tt)+) => {};
}

// ****************************************************************************
//
// Public Types
//
// ****************************************************************************

/// The 7-bit bus address the engine answers to unless told otherwise.
pub const DEFAULT_ADDRESS: u8 = 0x55;

/// All the ways a single bus event can fail inside the engine.
///
/// None of these are fatal. The engine logs them and turns them into a NACK
/// (for written bytes) or a failure byte (for read requests).
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone)]
pub enum Error<E>
where
    E: core::fmt::Debug,
{
    /// The underlying filesystem threw an error.
    Filesystem(E),
    /// The filename buffer is already holding the longest name we allow.
    FilenameFull,
    /// The stored filename is not valid UTF-8, so can't be used as a path.
    FilenameNotUtf8,
    /// All six clock bytes have already arrived.
    ClockBufferFull,
    /// The active command doesn't take any payload.
    UnexpectedPayload,
}

impl<E> Error<E>
where
    E: core::fmt::Debug,
{
    /// A short description, suitable for logging.
    ///
    /// This doesn't need `E` to be printable, which matters for `defmt`.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Filesystem(_) => "filesystem error",
            Error::FilenameFull => "filename too long",
            Error::FilenameNotUtf8 => "filename is not UTF-8",
            Error::ClockBufferFull => "too many clock bytes",
            Error::UnexpectedPayload => "command takes no payload",
        }
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
