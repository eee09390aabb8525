//! Simulated GPIO platform.
//!
//! [`SimGpio`] keeps an AVR style register file in memory, so code using
//! [`FastPin`] can be exercised without any hardware attached. Each port has a
//! single 8-bit cell that serves as both its input and its output register, which
//! means a pin reads back whatever level it's driving. Two pin numbers mapped onto
//! the same port bit behave as if they were physically wired together.
//!
//! [`SimGpio`]: struct.SimGpio.html
//! [`FastPin`]: ../struct.FastPin.html

use std::ptr::NonNull;
use std::sync::atomic::AtomicU8;
use std::sync::Mutex;

use super::{Level, Mode, OutputRegister, Platform, Port, Register};

/// Port B on the Arduino Uno, hosting pins 8-13.
pub const PORT_B: Port = Port(0);
/// Port C on the Arduino Uno, hosting pins 14-19 (A0-A5).
pub const PORT_C: Port = Port(1);
/// Port D on the Arduino Uno, hosting pins 0-7.
pub const PORT_D: Port = Port(2);

// Pins connected to a timer output compare unit on the ATmega328P.
const UNO_PWM_PINS: [u8; 6] = [3, 5, 6, 9, 10, 11];

#[derive(Debug)]
struct PinState {
    mode: Mode,
    pwm: bool,
}

/// Simulated GPIO platform with 8-bit ports.
#[derive(Debug)]
pub struct SimGpio {
    map: Vec<Option<(Port, u8)>>,
    ports: Box<[AtomicU8]>,
    pins: Mutex<Vec<PinState>>,
    pwm_pins: Vec<u8>,
}

impl SimGpio {
    /// Constructs a `SimGpio` with a custom pin map.
    ///
    /// Each entry maps the pin number equal to its index onto a port and bit
    /// (0-7). `None` entries, and pin numbers past the end of `map`, aren't GPIO
    /// pins. Pins can be attached to a simulated PWM signal with [`attach_pwm`].
    ///
    /// # Panics
    ///
    /// Panics if a bit index is larger than 7.
    ///
    /// [`attach_pwm`]: #method.attach_pwm
    pub fn new(map: Vec<Option<(Port, u8)>>) -> SimGpio {
        assert!(
            map.iter().flatten().all(|&(_, bit)| bit < 8),
            "bit index must be in the range 0-7"
        );

        let port_count = map
            .iter()
            .flatten()
            .map(|&(port, _)| usize::from(port.0) + 1)
            .max()
            .unwrap_or(0);

        let ports = (0..port_count).map(|_| AtomicU8::new(0)).collect();
        let pins = (0..map.len())
            .map(|_| PinState {
                mode: Mode::Input,
                pwm: false,
            })
            .collect();
        let pwm_pins = map
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_some())
            .filter_map(|(pin, _)| u8::try_from(pin).ok())
            .collect();

        SimGpio {
            map,
            ports,
            pins: Mutex::new(pins),
            pwm_pins,
        }
    }

    /// Constructs a `SimGpio` laid out like an Arduino Uno.
    ///
    /// Pins 0-7 map onto bits 0-7 of [`PORT_D`], pins 8-13 onto bits 0-5 of
    /// [`PORT_B`], and pins 14-19 (A0-A5) onto bits 0-5 of [`PORT_C`]. Only pins
    /// 3, 5, 6, 9, 10 and 11 support PWM.
    ///
    /// [`PORT_B`]: constant.PORT_B.html
    /// [`PORT_C`]: constant.PORT_C.html
    /// [`PORT_D`]: constant.PORT_D.html
    pub fn uno() -> SimGpio {
        let map = (0..8)
            .map(|bit| Some((PORT_D, bit)))
            .chain((0..6).map(|bit| Some((PORT_B, bit))))
            .chain((0..6).map(|bit| Some((PORT_C, bit))))
            .collect();

        let mut gpio = SimGpio::new(map);
        gpio.pwm_pins = UNO_PWM_PINS.to_vec();

        gpio
    }

    /// Wires pin `b` to pin `a`, so both pin numbers refer to the same line.
    ///
    /// # Panics
    ///
    /// Panics if either pin isn't a GPIO pin.
    pub fn bridge(mut self, a: u8, b: u8) -> SimGpio {
        let line = self.line(a);
        let _ = self.line(b);
        self.map[usize::from(b)] = Some(line);

        self
    }

    /// Returns the current mode of `pin`.
    ///
    /// # Panics
    ///
    /// Panics if `pin` isn't a GPIO pin.
    pub fn mode(&self, pin: u8) -> Mode {
        let _ = self.line(pin);

        self.pin_states()[usize::from(pin)].mode
    }

    /// Attaches a simulated PWM signal to `pin`.
    ///
    /// Returns `false` if `pin` doesn't support PWM.
    pub fn attach_pwm(&self, pin: u8) -> bool {
        if !self.pwm_pins.contains(&pin) {
            return false;
        }

        self.pin_states()[usize::from(pin)].pwm = true;

        true
    }

    /// Returns `true` if a simulated PWM signal is attached to `pin`.
    pub fn pwm_attached(&self, pin: u8) -> bool {
        self.pin_states()
            .get(usize::from(pin))
            .map_or(false, |state| state.pwm)
    }

    /// Drives the line connected to `pin` from outside the microcontroller.
    ///
    /// # Panics
    ///
    /// Panics if `pin` isn't a GPIO pin.
    pub fn drive(&self, pin: u8, level: Level) {
        let (port, bit) = self.line(pin);
        let reg = self.register(port);

        match level {
            Level::Low => reg.clear_bits(1 << bit),
            Level::High => reg.set_bits(1 << bit),
        }
    }

    /// Returns the contents of `port`'s register.
    pub fn port_value(&self, port: Port) -> u8 {
        self.register(port).read()
    }

    /// Overwrites the contents of `port`'s register.
    pub fn set_port_value(&self, port: Port, value: u8) {
        self.register(port).write(value);
    }

    fn line(&self, pin: u8) -> (Port, u8) {
        match self.map.get(usize::from(pin)) {
            Some(Some(line)) => *line,
            _ => panic!("Pin {} is not available", pin),
        }
    }

    fn register(&self, port: Port) -> Register<u8> {
        let cell = &self.ports[usize::from(port.0)];

        // The cell lives as long as self, and AtomicU8 allows writes through a shared reference.
        unsafe { Register::from_ptr(NonNull::new_unchecked(cell.as_ptr())) }
    }

    fn pin_states(&self) -> std::sync::MutexGuard<'_, Vec<PinState>> {
        // Pin state stays consistent even if a panic poisoned the lock.
        self.pins.lock().unwrap_or_else(|err| err.into_inner())
    }

    // Returns true if another pin wired to the same line is configured as an output.
    fn line_driven_by_other(&self, pin: u8, states: &[PinState]) -> bool {
        let line = self.map[usize::from(pin)];

        self.map
            .iter()
            .enumerate()
            .any(|(other, &other_line)| {
                other != usize::from(pin)
                    && other_line == line
                    && states[other].mode == Mode::Output
            })
    }
}

impl Platform for SimGpio {
    type Word = u8;

    fn port(&self, pin: u8) -> Option<Port> {
        self.map
            .get(usize::from(pin))
            .and_then(|line| line.map(|(port, _)| port))
    }

    fn bit_mask(&self, pin: u8) -> u8 {
        1 << self.line(pin).1
    }

    fn input_register(&self, port: Port) -> Register<u8> {
        self.register(port)
    }

    fn output_register(&self, port: Port) -> OutputRegister<u8> {
        OutputRegister::Latch(self.register(port))
    }

    fn set_mode(&self, pin: u8, mode: Mode) {
        let (port, bit) = self.line(pin);
        let reg = self.register(port);
        let mut states = self.pin_states();

        // Like the AVR, switching to an input enables or disables the pull-up
        // through the output latch, unless another pin drives the line.
        match mode {
            Mode::Output => {}
            Mode::Input if !self.line_driven_by_other(pin, &states) => reg.clear_bits(1 << bit),
            Mode::InputPullUp if !self.line_driven_by_other(pin, &states) => {
                reg.set_bits(1 << bit)
            }
            _ => {}
        }

        states[usize::from(pin)].mode = mode;
    }

    fn write(&self, pin: u8, level: Level) {
        let (port, bit) = self.line(pin);

        self.pin_states()[usize::from(pin)].pwm = false;

        let reg = self.register(port);
        match level {
            Level::Low => reg.clear_bits(1 << bit),
            Level::High => reg.set_bits(1 << bit),
        }
    }

    fn read(&self, pin: u8) -> Level {
        let (port, bit) = self.line(pin);

        Level::from((self.register(port).read() >> bit) & 0b1)
    }
}
