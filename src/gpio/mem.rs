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
use std::fs::OpenOptions;
use std::hint;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use libc::{self, c_void, size_t, MAP_FAILED, MAP_SHARED, O_SYNC, PROT_READ, PROT_WRITE};
use log::debug;

use super::{Error, Level, Mode, OutputRegister, Platform, Port, Register, Result};

const PATH_DEV_GPIOMEM: &str = "/dev/gpiomem";

// The BCM2835 has 41 32-bit registers related to the GPIO (datasheet @ 6.1).
const GPIO_MEM_REGISTERS: usize = 41;
const GPIO_MEM_SIZE: usize = GPIO_MEM_REGISTERS * std::mem::size_of::<u32>();

// Maximum GPIO pins on the BCM2835. The actual number of pins
// exposed through the Pi's GPIO header depends on the model.
const GPIO_LINES: u8 = 54;
// Pins are grouped into banks of 32, and each bank is a port.
const GPIO_BANKS: u8 = 2;

const GPFSEL0: usize = 0x00;
const GPSET0: usize = 0x1c / std::mem::size_of::<u32>();
const GPCLR0: usize = 0x28 / std::mem::size_of::<u32>();
const GPLEV0: usize = 0x34 / std::mem::size_of::<u32>();
const GPPUD: usize = 0x94 / std::mem::size_of::<u32>();
const GPPUDCLK0: usize = 0x98 / std::mem::size_of::<u32>();

const FSEL_INPUT: u32 = 0b000;
const FSEL_OUTPUT: u32 = 0b001;

const PUD_OFF: u32 = 0b00;
const PUD_UP: u32 = 0b10;

/// Provides access to the BCM283x GPIO peripheral found on the Raspberry Pi.
///
/// The GPIO registers are memory-mapped through `/dev/gpiomem`, which is accessible
/// to members of the `gpio` group on Raspberry Pi OS. Pins are addressed by their BCM
/// GPIO numbers. Each bank of 32 pins forms a port. Output states are changed through
/// the write-only `GPSETn`/`GPCLRn` registers, which don't require a read-modify-write.
///
/// The [`Platform`] methods panic when they're called with a pin number above 53
/// or a port other than 0 or 1.
///
/// [`Platform`]: trait.Platform.html
pub struct GpioMem {
    mem_ptr: *mut u32,
    locks: [AtomicBool; GPIO_MEM_REGISTERS],
}

impl fmt::Debug for GpioMem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpioMem")
            .field("mem_ptr", &self.mem_ptr)
            .field("locks", &format_args!("{{ .. }}"))
            .finish()
    }
}

impl GpioMem {
    /// Memory-maps the GPIO registers through `/dev/gpiomem`.
    pub fn open() -> Result<GpioMem> {
        let mem_ptr = match Self::map_devgpiomem() {
            Ok(ptr) => ptr,
            Err(ref e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(Error::PermissionDenied(String::from(PATH_DEV_GPIOMEM)));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        debug!("Mapped {} at {:p}", PATH_DEV_GPIOMEM, mem_ptr);

        Ok(GpioMem::from_ptr(mem_ptr))
    }

    fn from_ptr(mem_ptr: *mut u32) -> GpioMem {
        GpioMem {
            mem_ptr,
            locks: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    fn map_devgpiomem() -> io::Result<*mut u32> {
        // Open /dev/gpiomem with read/write/sync flags. This might fail if
        // /dev/gpiomem doesn't exist, or /dev/gpiomem doesn't have the
        // appropriate permissions, or the current user is not a member of
        // the gpio group.
        let gpiomem_file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_SYNC)
            .open(PATH_DEV_GPIOMEM)?;

        // Memory-map /dev/gpiomem at offset 0
        let gpiomem_ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                GPIO_MEM_SIZE,
                PROT_READ | PROT_WRITE,
                MAP_SHARED,
                gpiomem_file.as_raw_fd(),
                0,
            )
        };

        if gpiomem_ptr == MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(gpiomem_ptr as *mut u32)
    }

    #[inline(always)]
    fn register(&self, offset: usize) -> Register<u32> {
        assert!(offset < GPIO_MEM_REGISTERS);

        // mem_ptr points to a live mapping of GPIO_MEM_REGISTERS words until self is dropped.
        unsafe { Register::from_ptr(NonNull::new_unchecked(self.mem_ptr.add(offset))) }
    }

    fn check_pin(pin: u8) {
        if pin >= GPIO_LINES {
            panic!("{}", Error::PinNotAvailable(pin));
        }
    }

    fn check_port(port: Port) {
        assert!(port.0 < GPIO_BANKS, "{} is not available", port);
    }

    fn lock(&self, offset: usize) {
        while self.locks[offset]
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            hint::spin_loop();
        }
    }

    fn unlock(&self, offset: usize) {
        self.locks[offset].store(false, Ordering::SeqCst);
    }

    fn set_function(&self, pin: u8, fsel: u32) {
        let offset = GPFSEL0 + pin as usize / 10;
        let shift = (pin % 10) * 3;
        let reg = self.register(offset);

        self.lock(offset);
        reg.write((reg.read() & !(0b111 << shift)) | (fsel << shift));
        self.unlock(offset);
    }

    fn set_pullupdown(&self, pin: u8, pud: u32) {
        let offset = GPPUDCLK0 + pin as usize / 32;
        let shift = pin % 32;
        let pud_reg = self.register(GPPUD);
        let clk_reg = self.register(offset);

        self.lock(GPPUD);
        self.lock(offset);

        // Set the control signal in GPPUD.
        let reg_value = pud_reg.read();
        pud_reg.write((reg_value & !0b11) | (pud & 0b11));

        // The datasheet mentions waiting at least 150 cycles for set-up and hold, but
        // doesn't state which clock is used. This is likely the VPU clock (see
        // https://www.raspberrypi.org/forums/viewtopic.php?f=72&t=163352). At either
        // 250MHz or 400MHz, a 5µs delay + overhead is more than adequate.

        // Set-up time for the control signal.
        thread::sleep(Duration::new(0, 5000)); // >= 5µs

        // Clock the control signal into the selected pin.
        clk_reg.write(1 << shift);

        // Hold time for the control signal.
        thread::sleep(Duration::new(0, 5000)); // >= 5µs

        // Remove the control signal and clock.
        pud_reg.write(reg_value & !0b11);
        clk_reg.write(0);

        self.unlock(offset);
        self.unlock(GPPUD);
    }
}

impl Platform for GpioMem {
    type Word = u32;

    fn port(&self, pin: u8) -> Option<Port> {
        if pin < GPIO_LINES {
            Some(Port(pin / 32))
        } else {
            None
        }
    }

    fn bit_mask(&self, pin: u8) -> u32 {
        1 << (pin % 32)
    }

    fn input_register(&self, port: Port) -> Register<u32> {
        Self::check_port(port);

        self.register(GPLEV0 + port.0 as usize)
    }

    fn output_register(&self, port: Port) -> OutputRegister<u32> {
        Self::check_port(port);

        OutputRegister::SetClear {
            set: self.register(GPSET0 + port.0 as usize),
            clear: self.register(GPCLR0 + port.0 as usize),
        }
    }

    fn set_mode(&self, pin: u8, mode: Mode) {
        Self::check_pin(pin);

        match mode {
            Mode::Input => {
                self.set_function(pin, FSEL_INPUT);
                self.set_pullupdown(pin, PUD_OFF);
            }
            Mode::InputPullUp => {
                self.set_function(pin, FSEL_INPUT);
                self.set_pullupdown(pin, PUD_UP);
            }
            Mode::Output => {
                self.set_pullupdown(pin, PUD_OFF);
                self.set_function(pin, FSEL_OUTPUT);
            }
        }
    }

    fn write(&self, pin: u8, level: Level) {
        Self::check_pin(pin);

        let offset = match level {
            Level::Low => GPCLR0,
            Level::High => GPSET0,
        };

        self.register(offset + pin as usize / 32).write(1 << (pin % 32));
    }

    fn read(&self, pin: u8) -> Level {
        Self::check_pin(pin);

        let reg_value = self.register(GPLEV0 + pin as usize / 32).read();

        Level::from(((reg_value >> (pin % 32)) & 0b1) as u8)
    }
}

impl Drop for GpioMem {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.mem_ptr as *mut c_void, GPIO_MEM_SIZE as size_t);
        }
    }
}

// Required because of the raw pointer to our memory-mapped file
unsafe impl Send for GpioMem {}
unsafe impl Sync for GpioMem {}

#[cfg(test)]
mod tests {
    use libc::{MAP_ANONYMOUS, MAP_PRIVATE};

    use super::*;
    use crate::gpio::FastPin;

    // Maps zeroed anonymous memory in place of /dev/gpiomem.
    fn anonymous() -> GpioMem {
        let mem_ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                GPIO_MEM_SIZE,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        assert_ne!(mem_ptr, MAP_FAILED);

        GpioMem::from_ptr(mem_ptr as *mut u32)
    }

    #[test]
    fn banks_and_masks() {
        let gpio = anonymous();

        assert_eq!(gpio.port(0), Some(Port(0)));
        assert_eq!(gpio.port(31), Some(Port(0)));
        assert_eq!(gpio.port(32), Some(Port(1)));
        assert_eq!(gpio.port(53), Some(Port(1)));
        assert_eq!(gpio.port(54), None);
        assert_eq!(gpio.bit_mask(33), 1 << 1);
    }

    #[test]
    fn fast_pin_uses_set_and_clear_registers() {
        let gpio = anonymous();
        let mut pin = FastPin::new(&gpio, 35);

        pin.set();
        assert_eq!(gpio.register(GPSET0 + 1).read(), 1 << 3);
        assert_eq!(gpio.register(GPSET0).read(), 0);

        pin.clear();
        assert_eq!(gpio.register(GPCLR0 + 1).read(), 1 << 3);

        gpio.register(GPLEV0 + 1).write(1 << 3);
        assert_eq!(pin.read(), Level::High);
        assert_eq!(gpio.read(35), Level::High);
        gpio.register(GPLEV0 + 1).write(!(1 << 3));
        assert!(pin.is_low());
    }

    #[test]
    fn set_mode_updates_function_select() {
        let gpio = anonymous();
        gpio.register(GPFSEL0 + 2).write(0xffff_ffff);

        gpio.set_mode(23, Mode::Output);
        assert_eq!(gpio.register(GPFSEL0 + 2).read(), 0xffff_ffff & !(0b110 << 9));

        gpio.set_mode(23, Mode::InputPullUp);
        assert_eq!(gpio.register(GPFSEL0 + 2).read(), 0xffff_ffff & !(0b111 << 9));
        // The pull-up control signal and clock are removed afterwards.
        assert_eq!(gpio.register(GPPUD).read() & 0b11, 0);
        assert_eq!(gpio.register(GPPUDCLK0).read(), 0);
    }

    #[test]
    #[should_panic(expected = "Pin 100 is not available")]
    fn write_rejects_invalid_pin() {
        let gpio = anonymous();

        // Bank 3 would land on GPCLR0 and drive GPIO 4 low.
        gpio.write(100, Level::High);
    }

    #[test]
    #[should_panic(expected = "Pin 255 is not available")]
    fn set_mode_rejects_invalid_pin() {
        let gpio = anonymous();

        gpio.set_mode(255, Mode::Output);
    }

    #[test]
    #[should_panic(expected = "Port 2 is not available")]
    fn output_register_rejects_invalid_port() {
        let gpio = anonymous();

        let _ = gpio.output_register(Port(2));
    }

    #[test]
    fn invalid_pin_leaves_registers_untouched() {
        let gpio = anonymous();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            gpio.write(100, Level::High)
        }));
        assert!(result.is_err());
        assert_eq!(gpio.register(GPCLR0).read(), 0);
        assert_eq!(gpio.register(GPSET0 + 1).read(), 0);
    }
}
