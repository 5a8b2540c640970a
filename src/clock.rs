//! The wall clock used to stamp files.
//!
//! The bus controller can set the clock with the `C` command. The filesystem
//! reads it back through [`TimeSource`] whenever it creates or modifies a
//! file. Both traits and the [`Timestamp`] type are the ones `embedded-sdmmc`
//! uses, so a `&Clock` can be handed straight to its `VolumeManager`.

use core::cell::Cell;

#[doc(inline)]
pub use embedded_sdmmc::{TimeSource, Timestamp};

/// Number of bytes in a clock-set payload: YY MM DD HH MM SS.
pub const CLOCK_SET_LEN: usize = 6;

/// The time the clock shows until someone sets it: 2000-01-01 00:00:00.
pub const BOOT_EPOCH: Timestamp = Timestamp {
    year_since_1970: 30,
    zero_indexed_month: 0,
    zero_indexed_day: 0,
    hours: 0,
    minutes: 0,
    seconds: 0,
};

/// Decode the six bytes of a clock-set payload.
///
/// The bytes are plain binary (not BCD). The year is two digits: below 80
/// means 20xx, otherwise 19xx. FAT can't store anything before 1980, so
/// those years are refused.
pub fn decode_wire(bytes: &[u8; CLOCK_SET_LEN]) -> Result<Timestamp, &'static str> {
    let [yy, month, day, hours, minutes, seconds] = *bytes;
    let year = if yy < 80 {
        2000 + u16::from(yy)
    } else {
        1900 + u16::from(yy)
    };
    if year < 1980 {
        return Err("Bad year");
    }
    Timestamp::from_calendar(year, month, day, hours, minutes, seconds)
}

/// The one clock in the system.
///
/// Shared by reference between the protocol engine (which sets it) and the
/// filesystem (which reads it). Everything runs in a single execution
/// context, so a `Cell` is all the interior mutability we need. That also
/// means a `Clock` can't live in a plain `static`; if the engine is driven
/// from an interrupt handler, give the clock a `'static` home with
/// `static_cell`:
///
/// ```rust
/// use sdcard_i2c_bridge::Clock;
/// use static_cell::StaticCell;
///
/// static CLOCK: StaticCell<Clock> = StaticCell::new();
///
/// let clock: &'static Clock = CLOCK.init(Clock::new());
/// assert_eq!(clock.now(), sdcard_i2c_bridge::clock::BOOT_EPOCH);
/// ```
#[derive(Debug)]
pub struct Clock {
    now: Cell<Timestamp>,
}

impl Clock {
    /// Create a clock showing [`BOOT_EPOCH`].
    pub const fn new() -> Clock {
        Clock::with_time(BOOT_EPOCH)
    }

    /// Create a clock showing the given time.
    pub const fn with_time(now: Timestamp) -> Clock {
        Clock {
            now: Cell::new(now),
        }
    }

    /// What time the clock currently shows.
    pub fn now(&self) -> Timestamp {
        self.now.get()
    }

    /// Set the clock.
    pub fn set(&self, now: Timestamp) {
        self.now.set(now);
    }
}

impl Default for Clock {
    fn default() -> Clock {
        Clock::new()
    }
}

impl TimeSource for Clock {
    fn get_timestamp(&self) -> Timestamp {
        self.now()
    }
}

impl TimeSource for &Clock {
    fn get_timestamp(&self) -> Timestamp {
        self.now()
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
