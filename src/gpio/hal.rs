use core::convert::Infallible;

#[cfg(feature = "embedded-hal")]
use embedded_hal::digital::{
    ErrorType, InputPin as InputPinHal, OutputPin as OutputPinHal,
    StatefulOutputPin as StatefulOutputPinHal,
};

use super::{FastPin, Platform};

/// `ErrorType` trait implementation for `embedded-hal` v1.0.0.
#[cfg(feature = "embedded-hal")]
impl<'a, P: Platform> ErrorType for FastPin<'a, P> {
    type Error = Infallible;
}

/// `InputPin` trait implementation for `embedded-hal` v1.0.0.
#[cfg(feature = "embedded-hal")]
impl<'a, P: Platform> InputPinHal for FastPin<'a, P> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(FastPin::is_high(self))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(FastPin::is_low(self))
    }
}

/// `OutputPin` trait implementation for `embedded-hal` v1.0.0.
#[cfg(feature = "embedded-hal")]
impl<'a, P: Platform> OutputPinHal for FastPin<'a, P> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        FastPin::clear(self);

        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        FastPin::set(self);

        Ok(())
    }
}

/// `StatefulOutputPin` trait implementation for `embedded-hal` v1.0.0.
#[cfg(feature = "embedded-hal")]
impl<'a, P: Platform> StatefulOutputPinHal for FastPin<'a, P> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(FastPin::is_set_high(self))
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(FastPin::is_set_low(self))
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        FastPin::toggle(self);

        Ok(())
    }
}

/// `OutputPin` trait implementation for `embedded-hal` v0.2.7.
#[cfg(feature = "embedded-hal-0")]
impl<'a, P: Platform> embedded_hal_0::digital::v2::OutputPin for FastPin<'a, P> {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        FastPin::clear(self);

        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        FastPin::set(self);

        Ok(())
    }
}
