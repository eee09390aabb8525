// Copyright (c) 2017-2019 Rene van der Meer
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
// THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use std::fmt;
use std::hint;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use super::{Error, Level, Mode, OutputRegister, Platform, Register, Result, Trigger, Word};

/// GPIO pin with cached register pointers.
///
/// `FastPin`s are constructed with [`new`], [`with_mode`] or [`with_mode_and_level`].
/// During construction, the pin's port is resolved to its input and output registers,
/// and the pin number to a bit mask. All other methods, apart from [`set_mode`], access
/// the cached registers directly.
///
/// A `FastPin` doesn't keep track of the pin's mode. Depending on the mode, some methods
/// may not have any effect. For instance, calling [`set`] won't change the pin's logic
/// level when its mode is set to [`Input`].
///
/// Changing the output state of a pin on a platform with an output latch, such as an
/// AVR microcontroller, performs a read-modify-write of the port's register. This isn't
/// atomic. If another `FastPin` on the same port, or an interrupt handler, modifies the
/// register at the same time, one of the updates can be lost.
///
/// The `embedded-hal` [`digital::InputPin`], [`digital::OutputPin`] and
/// [`digital::StatefulOutputPin`] trait implementations for `FastPin` can be enabled
/// by specifying the optional `hal` feature in the dependency declaration for the
/// `fastpin` crate.
///
/// [`new`]: #method.new
/// [`with_mode`]: #method.with_mode
/// [`with_mode_and_level`]: #method.with_mode_and_level
/// [`set_mode`]: #method.set_mode
/// [`set`]: #method.set
/// [`Input`]: enum.Mode.html#variant.Input
/// [`digital::InputPin`]: https://docs.rs/embedded-hal/1/embedded_hal/digital/trait.InputPin.html
/// [`digital::OutputPin`]: https://docs.rs/embedded-hal/1/embedded_hal/digital/trait.OutputPin.html
/// [`digital::StatefulOutputPin`]: https://docs.rs/embedded-hal/1/embedded_hal/digital/trait.StatefulOutputPin.html
pub struct FastPin<'a, P: Platform> {
    platform: &'a P,
    pin: u8,
    mask: P::Word,
    input: Register<P::Word>,
    output: OutputRegister<P::Word>,
}

impl<'a, P: Platform> FastPin<'a, P> {
    /// Constructs a `FastPin` for the specified pin number.
    ///
    /// Caches the pin's input register, output register and bit mask. The pin's
    /// mode and output state are left unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `platform` doesn't expose a GPIO pin with the specified number.
    /// Use [`try_new`] to handle invalid pin numbers.
    ///
    /// [`try_new`]: #method.try_new
    pub fn new(platform: &'a P, pin: u8) -> FastPin<'a, P> {
        match FastPin::try_new(platform, pin) {
            Ok(fast_pin) => fast_pin,
            Err(err) => panic!("{}", err),
        }
    }

    /// Constructs a `FastPin` for the specified pin number.
    ///
    /// Returns `Err(`[`Error::PinNotAvailable`]`)` if `platform` doesn't expose a GPIO
    /// pin with the specified number.
    ///
    /// [`Error::PinNotAvailable`]: enum.Error.html#variant.PinNotAvailable
    pub fn try_new(platform: &'a P, pin: u8) -> Result<FastPin<'a, P>> {
        let port = match platform.port(pin) {
            Some(port) => port,
            None => {
                warn!("Pin {} doesn't map to a GPIO port", pin);
                return Err(Error::PinNotAvailable(pin));
            }
        };

        let mask = platform.bit_mask(pin);
        debug_assert_eq!(
            Word::count_ones(mask),
            1,
            "bit mask {:#x} for pin {} must have exactly one bit set",
            mask,
            pin
        );

        let input = platform.input_register(port);
        let output = platform.output_register(port);

        debug!("Pin {} resolved to {} with bit mask {:#x}", pin, port, mask);

        Ok(FastPin {
            platform,
            pin,
            mask,
            input,
            output,
        })
    }

    /// Constructs a `FastPin` for the specified pin number, and sets its mode.
    ///
    /// # Panics
    ///
    /// Panics if `platform` doesn't expose a GPIO pin with the specified number.
    pub fn with_mode(platform: &'a P, pin: u8, mode: Mode) -> FastPin<'a, P> {
        let mut fast_pin = FastPin::new(platform, pin);
        fast_pin.set_mode(mode);

        fast_pin
    }

    /// Constructs a `FastPin` for the specified pin number, sets its mode and,
    /// if `mode` is [`Output`], its initial output state.
    ///
    /// The output state is set through the platform's generic write routine rather
    /// than the cached output register, so any additional initialization the platform
    /// performs for the pin, such as disabling PWM, is done once here.
    ///
    /// # Panics
    ///
    /// Panics if `platform` doesn't expose a GPIO pin with the specified number.
    ///
    /// [`Output`]: enum.Mode.html#variant.Output
    pub fn with_mode_and_level(
        platform: &'a P,
        pin: u8,
        mode: Mode,
        level: Level,
    ) -> FastPin<'a, P> {
        let fast_pin = FastPin::with_mode(platform, pin, mode);

        if mode == Mode::Output {
            platform.write(pin, level);
        }

        fast_pin
    }

    /// Returns the pin number.
    #[inline]
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Returns the mask selecting the pin within its port's registers.
    #[inline]
    pub fn bit_mask(&self) -> P::Word {
        self.mask
    }

    /// Sets the pin's mode through the platform's generic mode routine.
    ///
    /// The cached registers aren't affected.
    pub fn set_mode(&mut self, mode: Mode) {
        trace!("Pin {} mode set to {}", self.pin, mode);

        self.platform.set_mode(self.pin, mode);
    }

    /// Reads the pin's logic level.
    #[inline(always)]
    pub fn read(&self) -> Level {
        if self.input.read() & self.mask == P::Word::ZERO {
            Level::Low
        } else {
            Level::High
        }
    }

    /// Reads the pin's logic level, and returns `true` if it's set to [`Low`].
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    #[inline(always)]
    pub fn is_low(&self) -> bool {
        self.input.read() & self.mask == P::Word::ZERO
    }

    /// Reads the pin's logic level, and returns `true` if it's set to [`High`].
    ///
    /// [`High`]: enum.Level.html#variant.High
    #[inline(always)]
    pub fn is_high(&self) -> bool {
        !self.is_low()
    }

    /// Returns `true` if the pin's output state is set to [`High`].
    ///
    /// Platforms without a readable output latch report the pin's logic level instead.
    ///
    /// [`High`]: enum.Level.html#variant.High
    #[inline]
    pub fn is_set_high(&self) -> bool {
        match self.output {
            OutputRegister::Latch(ref reg) => reg.read() & self.mask != P::Word::ZERO,
            OutputRegister::SetClear { .. } => self.is_high(),
        }
    }

    /// Returns `true` if the pin's output state is set to [`Low`].
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    #[inline]
    pub fn is_set_low(&self) -> bool {
        !self.is_set_high()
    }

    /// Sets the pin's output state.
    #[inline(always)]
    pub fn write(&mut self, level: Level) {
        match level {
            Level::Low => self.clear(),
            Level::High => self.set(),
        }
    }

    /// Sets the pin's output state to [`High`].
    ///
    /// [`High`]: enum.Level.html#variant.High
    #[inline(always)]
    pub fn set(&mut self) {
        self.output.set(self.mask);
    }

    /// Sets the pin's output state to [`Low`].
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    #[inline(always)]
    pub fn clear(&mut self) {
        self.output.clear(self.mask);
    }

    /// Toggles the pin's output state between [`Low`] and [`High`].
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    /// [`High`]: enum.Level.html#variant.High
    #[inline]
    pub fn toggle(&mut self) {
        if self.is_low() {
            self.set();
        } else {
            self.clear();
        }
    }

    /// Produces the shortest possible [`High`] pulse.
    ///
    /// The pin must currently be [`Low`]. Otherwise, this results in a short
    /// [`Low`] glitch instead. Debug builds check the pin's level first.
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    /// [`High`]: enum.Level.html#variant.High
    #[inline]
    pub fn pulse_high(&mut self) {
        debug_assert!(self.is_low(), "pin {} must be low to pulse high", self.pin);

        self.set();
        self.clear();
    }

    /// Produces the shortest possible [`Low`] pulse.
    ///
    /// The pin must currently be [`High`]. Otherwise, this results in a short
    /// [`High`] glitch instead. Debug builds check the pin's level first.
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    /// [`High`]: enum.Level.html#variant.High
    #[inline]
    pub fn pulse_low(&mut self) {
        debug_assert!(self.is_high(), "pin {} must be high to pulse low", self.pin);

        self.clear();
        self.set();
    }

    /// Busy-waits until the pin's logic level is [`High`].
    ///
    /// Returns immediately if the pin is already [`High`]. Blocks indefinitely if
    /// the level never changes.
    ///
    /// [`High`]: enum.Level.html#variant.High
    #[inline]
    pub fn wait_high(&self) {
        while self.is_low() {
            hint::spin_loop();
        }
    }

    /// Busy-waits until the pin's logic level is [`Low`].
    ///
    /// Returns immediately if the pin is already [`Low`]. Blocks indefinitely if
    /// the level never changes.
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    #[inline]
    pub fn wait_low(&self) {
        while self.is_high() {
            hint::spin_loop();
        }
    }

    /// Busy-waits for a transition from [`Low`] to [`High`].
    ///
    /// This detects an edge, not a level. If the pin is [`High`] when called,
    /// it first has to go [`Low`] before the rising edge is detected.
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    /// [`High`]: enum.Level.html#variant.High
    #[inline]
    pub fn wait_rising_edge(&self) {
        self.wait_low();
        self.wait_high();
    }

    /// Busy-waits for a transition from [`High`] to [`Low`].
    ///
    /// This detects an edge, not a level. If the pin is [`Low`] when called,
    /// it first has to go [`High`] before the falling edge is detected.
    ///
    /// [`Low`]: enum.Level.html#variant.Low
    /// [`High`]: enum.Level.html#variant.High
    #[inline]
    pub fn wait_falling_edge(&self) {
        self.wait_high();
        self.wait_low();
    }

    /// Busy-waits until the pin's logic level matches `level`, or until a timeout occurs.
    ///
    /// `timeout` can be set to `None` to wait indefinitely.
    ///
    /// Returns `true` if `level` was observed, or `false` if the timeout elapsed first.
    pub fn wait_for_level(&self, level: Level, timeout: Option<Duration>) -> bool {
        self.spin_until(level, deadline(timeout))
    }

    /// Busy-waits for the specified edge, or until a timeout occurs.
    ///
    /// The timeout applies to the edge as a whole, including the wait for the
    /// opposite level that has to precede it. `timeout` can be set to `None` to
    /// wait indefinitely.
    ///
    /// Returns `true` if the edge was observed, or `false` if the timeout elapsed first.
    pub fn wait_for_edge(&self, trigger: Trigger, timeout: Option<Duration>) -> bool {
        let deadline = deadline(timeout);

        match trigger {
            Trigger::RisingEdge => {
                self.spin_until(Level::Low, deadline) && self.spin_until(Level::High, deadline)
            }
            Trigger::FallingEdge => {
                self.spin_until(Level::High, deadline) && self.spin_until(Level::Low, deadline)
            }
        }
    }

    fn spin_until(&self, level: Level, deadline: Option<Instant>) -> bool {
        let deadline = match deadline {
            Some(deadline) => deadline,
            None => {
                while self.read() != level {
                    hint::spin_loop();
                }

                return true;
            }
        };

        loop {
            if self.read() == level {
                return true;
            }

            if Instant::now() >= deadline {
                return false;
            }

            hint::spin_loop();
        }
    }
}

// A timeout too large to represent as an Instant waits indefinitely.
fn deadline(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|timeout| Instant::now().checked_add(timeout))
}

impl<'a, P: Platform> fmt::Debug for FastPin<'a, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastPin")
            .field("pin", &self.pin)
            .field("mask", &format_args!("{:#x}", self.mask))
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

impl<'a, P: Platform> PartialEq for FastPin<'a, P> {
    fn eq(&self, other: &FastPin<'a, P>) -> bool {
        self.pin == other.pin && self.input == other.input
    }
}

impl<'a, P: Platform> Eq for FastPin<'a, P> {}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::gpio::sim::{SimGpio, PORT_B, PORT_C, PORT_D};

    #[test]
    fn caches_port_registers_and_mask() {
        let gpio = SimGpio::uno();

        let led = FastPin::new(&gpio, 13);
        assert_eq!(led.pin(), 13);
        assert_eq!(led.bit_mask(), 0b0010_0000);
        assert_eq!(led.input, gpio.input_register(PORT_B));
        assert_eq!(led.output, gpio.output_register(PORT_B));

        let rx = FastPin::new(&gpio, 0);
        assert_eq!(rx.bit_mask(), 0b0000_0001);
        assert_eq!(rx.input, gpio.input_register(PORT_D));

        let a5 = FastPin::new(&gpio, 19);
        assert_eq!(a5.bit_mask(), 0b0010_0000);
        assert_eq!(a5.input, gpio.input_register(PORT_C));
    }

    #[test]
    fn try_new_rejects_invalid_pin() {
        let gpio = SimGpio::uno();

        match FastPin::try_new(&gpio, 20) {
            Err(Error::PinNotAvailable(20)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "Pin 200 is not available")]
    fn new_panics_on_invalid_pin() {
        let gpio = SimGpio::uno();

        FastPin::new(&gpio, 200);
    }

    #[test]
    fn matches_generic_read_and_write() {
        let gpio = SimGpio::uno();

        for pin in 0..20 {
            let mut fast_pin = FastPin::with_mode(&gpio, pin, Mode::Output);

            fast_pin.write(Level::High);
            assert_eq!(gpio.read(pin), Level::High, "pin {}", pin);
            fast_pin.write(Level::Low);
            assert_eq!(gpio.read(pin), Level::Low, "pin {}", pin);

            gpio.write(pin, Level::High);
            assert_eq!(fast_pin.read(), Level::High, "pin {}", pin);
            gpio.write(pin, Level::Low);
            assert_eq!(fast_pin.read(), Level::Low, "pin {}", pin);
        }
    }

    #[test]
    fn only_touches_own_bit() {
        let gpio = SimGpio::uno();
        gpio.drive(8, Level::High);
        gpio.drive(12, Level::High);

        let mut pin = FastPin::with_mode(&gpio, 10, Mode::Output);
        pin.set();
        assert_eq!(gpio.port_value(PORT_B), 0b0001_0101);
        pin.clear();
        assert_eq!(gpio.port_value(PORT_B), 0b0001_0001);
    }

    #[test]
    fn is_high_and_is_low_are_negations() {
        let gpio = SimGpio::uno();
        let pin = FastPin::new(&gpio, 4);

        for value in 0..=u8::MAX {
            gpio.set_port_value(PORT_D, value);
            assert_ne!(pin.is_high(), pin.is_low(), "port value {:#010b}", value);
            assert_eq!(pin.is_high(), value & 0b0001_0000 != 0);
            assert_eq!(pin.read() == Level::High, pin.is_high());
        }
    }

    #[test]
    fn with_mode_and_level_initializes_output() {
        let gpio = SimGpio::uno();
        gpio.attach_pwm(9);

        let pin = FastPin::with_mode_and_level(&gpio, 9, Mode::Output, Level::High);
        assert_eq!(gpio.mode(9), Mode::Output);
        assert!(!gpio.pwm_attached(9));
        assert!(pin.is_high());
    }

    #[test]
    fn with_mode_and_level_ignores_level_for_inputs() {
        let gpio = SimGpio::uno();
        gpio.attach_pwm(11);

        let pin = FastPin::with_mode_and_level(&gpio, 11, Mode::Input, Level::High);
        assert_eq!(gpio.mode(11), Mode::Input);
        assert!(gpio.pwm_attached(11));
        assert!(pin.is_low());
    }

    #[test]
    fn set_mode_delegates_to_platform() {
        let gpio = SimGpio::uno();
        let mut pin = FastPin::new(&gpio, 2);
        let input = pin.input;

        pin.set_mode(Mode::InputPullUp);
        assert_eq!(gpio.mode(2), Mode::InputPullUp);
        assert!(pin.is_high());

        pin.set_mode(Mode::Output);
        assert_eq!(gpio.mode(2), Mode::Output);
        assert_eq!(pin.input, input);
    }

    #[test]
    fn pulses_end_in_opposite_state() {
        let gpio = SimGpio::uno();
        let mut pin = FastPin::with_mode_and_level(&gpio, 7, Mode::Output, Level::Low);

        pin.pulse_high();
        assert_eq!(pin.read(), Level::Low);

        pin.set();
        pin.pulse_low();
        assert_eq!(pin.read(), Level::High);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "must be low to pulse high")]
    fn pulse_high_checks_precondition() {
        let gpio = SimGpio::uno();
        let mut pin = FastPin::with_mode_and_level(&gpio, 7, Mode::Output, Level::High);

        pin.pulse_high();
    }

    #[test]
    fn toggle_inverts_output() {
        let gpio = SimGpio::uno();
        let mut pin = FastPin::with_mode_and_level(&gpio, 5, Mode::Output, Level::Low);

        pin.toggle();
        assert!(pin.is_high());
        pin.toggle();
        assert!(pin.is_low());
    }

    #[test]
    fn waits_return_immediately_at_level() {
        let gpio = SimGpio::uno();
        let pin = FastPin::new(&gpio, 3);

        gpio.drive(3, Level::High);
        pin.wait_high();
        assert!(pin.wait_for_level(Level::High, Some(Duration::ZERO)));

        gpio.drive(3, Level::Low);
        pin.wait_low();
        assert!(pin.wait_for_level(Level::Low, Some(Duration::ZERO)));
    }

    #[test]
    fn wait_for_level_times_out() {
        let gpio = SimGpio::uno();
        let pin = FastPin::new(&gpio, 3);

        let start = Instant::now();
        assert!(!pin.wait_for_level(Level::High, Some(Duration::from_millis(20))));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_for_edge_needs_opposite_level_first() {
        let gpio = SimGpio::uno();
        let pin = FastPin::new(&gpio, 3);

        // Already high, so a rising edge requires a low first.
        gpio.drive(3, Level::High);
        assert!(!pin.wait_for_edge(Trigger::RisingEdge, Some(Duration::from_millis(10))));
        assert!(!pin.wait_for_edge(Trigger::FallingEdge, Some(Duration::from_millis(10))));
    }

    #[test]
    fn wait_high_unblocks_on_external_change() {
        let gpio = SimGpio::uno();
        let pin = FastPin::new(&gpio, 6);

        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(10));
                gpio.drive(6, Level::High);
            });

            pin.wait_high();
        });

        assert!(pin.is_high());
    }

    #[test]
    fn wait_for_edge_observes_transition() {
        let gpio = SimGpio::uno();
        let pin = FastPin::new(&gpio, 6);
        gpio.drive(6, Level::High);

        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(10));
                gpio.drive(6, Level::Low);
            });

            assert!(pin.wait_for_edge(Trigger::FallingEdge, Some(Duration::from_secs(5))));
        });
    }
}
