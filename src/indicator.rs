//! Coarse status reporting, usually on a pair of LEDs.

use embedded_hal::digital::OutputPin;

/// What the engine is telling the outside world.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    /// Waiting for the next transaction.
    Idle,
    /// A filesystem operation is in progress.
    Busy,
    /// The last operation worked.
    Success,
    /// The last operation failed.
    Error,
}

/// Something that can show a [`Status`].
///
/// This is best effort. Implementations should swallow their own errors
/// because the engine has no way to act on them.
pub trait StatusIndicator {
    /// Show this status until told otherwise.
    fn show(&mut self, status: Status);
}

impl<T> StatusIndicator for &mut T
where
    T: StatusIndicator,
{
    fn show(&mut self, status: Status) {
        (**self).show(status)
    }
}

/// An indicator that shows nothing.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn show(&mut self, _status: Status) {}
}

/// Drives an "ok" pin and an "error" pin, both active high.
///
/// * Idle: both off
/// * Busy or Success: ok on
/// * Error: error on
#[derive(Debug)]
pub struct PinIndicator<OK, ERR> {
    ok: OK,
    err: ERR,
}

impl<OK, ERR> PinIndicator<OK, ERR>
where
    OK: OutputPin,
    ERR: OutputPin,
{
    /// Take ownership of the two pins and switch them both off.
    pub fn new(ok: OK, err: ERR) -> PinIndicator<OK, ERR> {
        let mut indicator = PinIndicator { ok, err };
        indicator.show(Status::Idle);
        indicator
    }

    /// Give the pins back.
    pub fn free(self) -> (OK, ERR) {
        (self.ok, self.err)
    }
}

impl<OK, ERR> StatusIndicator for PinIndicator<OK, ERR>
where
    OK: OutputPin,
    ERR: OutputPin,
{
    fn show(&mut self, status: Status) {
        let (ok, err) = match status {
            Status::Idle => (false, false),
            Status::Busy | Status::Success => (true, false),
            Status::Error => (false, true),
        };
        let _ = self.ok.set_state(ok.into());
        let _ = self.err.set_state(err.into());
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
