use std::fmt;

use super::{Level, Mode, OutputRegister, Register, Word};

/// Identifies one of a platform's GPIO ports.
///
/// A port groups the pins that share an input and output register. The index
/// is only meaningful to the `Platform` that returned it.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub struct Port(pub u8);

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Port {}", self.0)
    }
}

/// Describes how a hardware platform exposes its GPIO pins.
///
/// `FastPin` calls [`port`], [`bit_mask`], [`input_register`] and [`output_register`]
/// once, during construction, and caches the results. [`set_mode`] and [`write`] are
/// the platform's generic routines, which may be considerably slower than accessing
/// the registers directly, but perform any additional work the platform requires.
///
/// Implementations must return registers that remain valid for as long as the
/// `Platform` itself is alive.
///
/// [`port`]: #tymethod.port
/// [`bit_mask`]: #tymethod.bit_mask
/// [`input_register`]: #tymethod.input_register
/// [`output_register`]: #tymethod.output_register
/// [`set_mode`]: #tymethod.set_mode
/// [`write`]: #tymethod.write
pub trait Platform {
    /// Width of the platform's port registers.
    type Word: Word;

    /// Returns the port hosting `pin`, or `None` if `pin` isn't a valid GPIO pin.
    fn port(&self, pin: u8) -> Option<Port>;

    /// Returns the mask selecting `pin` within its port's registers.
    ///
    /// Exactly one bit must be set. Only called for pins that have a port.
    fn bit_mask(&self, pin: u8) -> Self::Word;

    /// Returns the register reflecting the logic level of every pin in `port`.
    fn input_register(&self, port: Port) -> Register<Self::Word>;

    /// Returns the register(s) controlling the output state of every pin in `port`.
    fn output_register(&self, port: Port) -> OutputRegister<Self::Word>;

    /// Configures the mode of `pin`.
    fn set_mode(&self, pin: u8, mode: Mode);

    /// Sets the output state of `pin`, including any additional initialization
    /// the platform performs for the pin.
    fn write(&self, pin: u8, level: Level);

    /// Reads the logic level of `pin`.
    fn read(&self, pin: u8) -> Level;
}
