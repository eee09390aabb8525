//! Interface for fast single-pin GPIO access.
//!
//! To ensure fast performance, a [`FastPin`] resolves its port's input register,
//! output register and the pin's bit mask once, when it's constructed. Reading the
//! pin's logic level dereferences the cached input register, and changing its
//! output state writes the cached output register directly, without looking up
//! the port or bit mask again.
//!
//! ## Platforms
//!
//! A [`FastPin`] borrows a [`Platform`], which maps logical pin numbers onto
//! ports and bit masks, hands out the memory-mapped registers of each port, and
//! implements the generic (slower) routines used to change a pin's mode or to
//! initialize its output state.
//!
//! [`GpioMem`] controls the BCM283x GPIO peripheral found on the Raspberry Pi by
//! mapping `/dev/gpiomem`. [`SimGpio`] is an in-memory register file laid out like
//! an AVR microcontroller, which is used to test code without any hardware attached.
//!
//! ## Construction
//!
//! [`FastPin::new`] only caches the register pointers and bit mask.
//! [`FastPin::with_mode`] additionally configures the pin's mode, and
//! [`FastPin::with_mode_and_level`] also sets the initial output state through
//! the platform's generic write routine, which performs any additional
//! initialization the platform requires, such as disabling PWM on the pin.
//!
//! Constructing a `FastPin` for a pin number the platform doesn't expose is
//! considered a programming error, and panics. Use [`FastPin::try_new`] if the pin
//! number isn't known at compile time.
//!
//! ## Busy-waiting
//!
//! [`FastPin::wait_high`], [`FastPin::wait_low`], [`FastPin::wait_rising_edge`] and
//! [`FastPin::wait_falling_edge`] spin on the input register until the requested
//! level or edge is observed. They never sleep or yield, and block indefinitely if
//! the pin doesn't change. [`FastPin::wait_for_level`] and [`FastPin::wait_for_edge`]
//! accept an optional timeout.
//!
//! ## Examples
//!
//! ```
//! use fastpin::gpio::sim::SimGpio;
//! use fastpin::gpio::{FastPin, Level, Mode};
//!
//! let gpio = SimGpio::uno();
//! let mut led = FastPin::with_mode_and_level(&gpio, 13, Mode::Output, Level::Low);
//!
//! led.set();
//! assert!(led.is_high());
//! led.pulse_low();
//! assert_eq!(led.read(), Level::High);
//! ```
//!
//! [`FastPin`]: struct.FastPin.html
//! [`FastPin::new`]: struct.FastPin.html#method.new
//! [`FastPin::try_new`]: struct.FastPin.html#method.try_new
//! [`FastPin::with_mode`]: struct.FastPin.html#method.with_mode
//! [`FastPin::with_mode_and_level`]: struct.FastPin.html#method.with_mode_and_level
//! [`FastPin::wait_high`]: struct.FastPin.html#method.wait_high
//! [`FastPin::wait_low`]: struct.FastPin.html#method.wait_low
//! [`FastPin::wait_rising_edge`]: struct.FastPin.html#method.wait_rising_edge
//! [`FastPin::wait_falling_edge`]: struct.FastPin.html#method.wait_falling_edge
//! [`FastPin::wait_for_level`]: struct.FastPin.html#method.wait_for_level
//! [`FastPin::wait_for_edge`]: struct.FastPin.html#method.wait_for_edge
//! [`Platform`]: trait.Platform.html
//! [`GpioMem`]: struct.GpioMem.html
//! [`SimGpio`]: sim/struct.SimGpio.html

use std::error;
use std::fmt;
use std::io;
use std::ops::Not;
use std::result;

#[cfg(any(feature = "embedded-hal", feature = "embedded-hal-0"))]
mod hal;
mod mem;
mod pin;
mod platform;
mod register;
pub mod sim;

pub use self::mem::GpioMem;
pub use self::pin::FastPin;
pub use self::platform::{Platform, Port};
pub use self::register::{OutputRegister, Register, Word};

/// Errors that can occur when accessing the GPIO peripheral.
#[derive(Debug)]
pub enum Error {
    /// Pin is not available.
    ///
    /// The platform doesn't map the specified pin number onto any of its ports.
    PinNotAvailable(u8),
    /// Permission denied when opening `/dev/gpiomem` for read/write access.
    ///
    /// Make sure the current user is a member of the `gpio` group.
    PermissionDenied(String),
    /// I/O error.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::PinNotAvailable(pin) => write!(f, "Pin {} is not available", pin),
            Error::PermissionDenied(ref path) => write!(f, "Permission denied: {}", path),
            Error::Io(ref err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Result type returned from methods that can have `fastpin::gpio::Error`s.
pub type Result<T> = result::Result<T, Error>;

/// Pin modes.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Mode {
    /// Input, with the built-in pull-up resistor disabled.
    Input,
    /// Output, driven by the pin's output register.
    Output,
    /// Input, with the built-in pull-up resistor enabled.
    InputPullUp,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Mode::Input => write!(f, "In"),
            Mode::Output => write!(f, "Out"),
            Mode::InputPullUp => write!(f, "InPullUp"),
        }
    }
}

/// Pin logic levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum Level {
    Low = 0,
    High = 1,
}

impl From<bool> for Level {
    fn from(e: bool) -> Level {
        if e {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<u8> for Level {
    fn from(value: u8) -> Self {
        if value == 0 {
            Level::Low
        } else {
            Level::High
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Level::Low => write!(f, "Low"),
            Level::High => write!(f, "High"),
        }
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Edge conditions for [`FastPin::wait_for_edge`].
///
/// [`FastPin::wait_for_edge`]: struct.FastPin.html#method.wait_for_edge
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Trigger {
    /// A transition from [`Low`] to [`High`].
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    /// [`High`]: enum.Level.html#variant.High
    RisingEdge,
    /// A transition from [`High`] to [`Low`].
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    /// [`High`]: enum.Level.html#variant.High
    FallingEdge,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Trigger::RisingEdge => write!(f, "RisingEdge"),
            Trigger::FallingEdge => write!(f, "FallingEdge"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_conversions() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert_eq!(Level::from(0u8), Level::Low);
        assert_eq!(Level::from(0x80u8), Level::High);
        assert_eq!(!Level::Low, Level::High);
        assert_eq!(!Level::High, Level::Low);
    }

    #[test]
    fn error_display() {
        assert_eq!(Error::PinNotAvailable(42).to_string(), "Pin 42 is not available");
        assert_eq!(
            Error::PermissionDenied(String::from("/dev/gpiomem")).to_string(),
            "Permission denied: /dev/gpiomem"
        );
    }
}
