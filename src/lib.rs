//! fastpin provides fast access to a single digital I/O line by resolving the
//! pin's input register, output register and bit mask once, when the pin is
//! constructed, instead of on every read or write.
//!
//! A [`FastPin`] borrows a [`Platform`], which describes how the hosting
//! hardware maps logical pin numbers onto memory-mapped port registers, and
//! provides the generic (slower) mode and write routines. Two platforms are
//! included: [`GpioMem`] for the BCM283x GPIO peripheral on a Raspberry Pi,
//! accessed through `/dev/gpiomem`, and [`SimGpio`], an in-memory AVR style
//! register file used for testing and host-side development.
//!
//! The library can be used in conjunction with a variety of platform-agnostic
//! drivers through its `embedded-hal` trait implementations, enabled with the
//! `hal` feature. Both `embedded-hal` v0.2 and v1.0 are supported.
//!
//! [`FastPin`]: gpio/struct.FastPin.html
//! [`Platform`]: gpio/trait.Platform.html
//! [`GpioMem`]: gpio/struct.GpioMem.html
//! [`SimGpio`]: gpio/sim/struct.SimGpio.html

// Used by rustdoc to link other crates to fastpin's docs
#![doc(html_root_url = "https://docs.rs/fastpin/0.1.0")]

pub mod gpio;
