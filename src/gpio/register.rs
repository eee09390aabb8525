use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::ptr::{self, NonNull};

/// Integer width of a platform's port registers.
///
/// Implemented for `u8`, `u16`, `u32` and `u64`.
pub trait Word:
    Copy
    + Eq
    + fmt::Debug
    + fmt::LowerHex
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + Not<Output = Self>
    + Send
    + Sync
    + 'static
{
    const ZERO: Self;

    /// Returns a word with only bit `bit` set.
    fn bit(bit: u32) -> Self;

    fn count_ones(self) -> u32;
}

macro_rules! impl_word {
    ($($ty:ty),*) => {
        $(
            impl Word for $ty {
                const ZERO: Self = 0;

                #[inline(always)]
                fn bit(bit: u32) -> Self {
                    1 << bit
                }

                #[inline(always)]
                fn count_ones(self) -> u32 {
                    <$ty>::count_ones(self)
                }
            }
        )*
    };
}

impl_word!(u8, u16, u32, u64);

/// A memory-mapped hardware register.
///
/// All accesses are volatile. A `Register` is a plain address: copies refer to
/// the same location, and nothing prevents other code (or an interrupt handler)
/// from modifying it concurrently.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Register<W: Word> {
    ptr: NonNull<W>,
}

impl<W: Word> Register<W> {
    /// Constructs a `Register` for the specified address.
    ///
    /// # Safety
    ///
    /// `ptr` must be properly aligned, and valid for volatile reads and writes
    /// for as long as the `Register` (or any copy of it) is used.
    #[inline]
    pub const unsafe fn from_ptr(ptr: NonNull<W>) -> Register<W> {
        Register { ptr }
    }

    /// Returns the register's address.
    #[inline]
    pub fn as_ptr(&self) -> *mut W {
        self.ptr.as_ptr()
    }

    #[inline(always)]
    pub fn read(&self) -> W {
        unsafe { ptr::read_volatile(self.ptr.as_ptr()) }
    }

    #[inline(always)]
    pub fn write(&self, value: W) {
        unsafe { ptr::write_volatile(self.ptr.as_ptr(), value) }
    }

    /// Reads the register, ORs in `mask`, and writes the result back.
    ///
    /// The read-modify-write sequence isn't atomic.
    #[inline(always)]
    pub fn set_bits(&self, mask: W) {
        self.write(self.read() | mask);
    }

    /// Reads the register, clears the bits in `mask`, and writes the result back.
    ///
    /// The read-modify-write sequence isn't atomic.
    #[inline(always)]
    pub fn clear_bits(&self, mask: W) {
        self.write(self.read() & !mask);
    }
}

impl<W: Word> fmt::Debug for Register<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Register({:p})", self.ptr)
    }
}

// Required because of the raw pointer to a memory-mapped location
unsafe impl<W: Word> Send for Register<W> {}
unsafe impl<W: Word> Sync for Register<W> {}

/// The register(s) controlling the output state of a port.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputRegister<W: Word> {
    /// A readable output latch. Pins are driven high or low with a
    /// read-modify-write of the pin's bit.
    Latch(Register<W>),
    /// Separate write-only registers, where writing a 1 bit drives the
    /// corresponding pin high (`set`) or low (`clear`), and 0 bits are ignored.
    SetClear { set: Register<W>, clear: Register<W> },
}

impl<W: Word> OutputRegister<W> {
    #[inline(always)]
    pub(crate) fn set(&self, mask: W) {
        match *self {
            OutputRegister::Latch(ref reg) => reg.set_bits(mask),
            OutputRegister::SetClear { ref set, .. } => set.write(mask),
        }
    }

    #[inline(always)]
    pub(crate) fn clear(&self, mask: W) {
        match *self {
            OutputRegister::Latch(ref reg) => reg.clear_bits(mask),
            OutputRegister::SetClear { ref clear, .. } => clear.write(mask),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_read_modify_write() {
        let mut cell: u8 = 0b1000_0001;
        let reg = unsafe { Register::from_ptr(NonNull::from(&mut cell)) };
        let out = OutputRegister::Latch(reg);

        out.set(0b0001_0000);
        assert_eq!(reg.read(), 0b1001_0001);
        out.clear(0b1000_0000);
        assert_eq!(reg.read(), 0b0001_0001);
        out.clear(0b0100_0000);
        assert_eq!(reg.read(), 0b0001_0001);
    }

    #[test]
    fn set_clear_writes_mask_only() {
        let mut cells: [u32; 2] = [0xffff_ffff, 0xffff_ffff];
        let base = cells.as_mut_ptr();
        let (set, clear) = unsafe {
            (
                Register::from_ptr(NonNull::new_unchecked(base)),
                Register::from_ptr(NonNull::new_unchecked(base.add(1))),
            )
        };
        let out = OutputRegister::SetClear { set, clear };

        out.set(1 << 4);
        assert_eq!(set.read(), 1 << 4);
        assert_eq!(clear.read(), 0xffff_ffff);
        out.clear(1 << 7);
        assert_eq!(clear.read(), 1 << 7);
    }

    #[test]
    fn word_bits() {
        assert_eq!(<u8 as Word>::bit(5), 0b0010_0000);
        assert_eq!(<u32 as Word>::bit(31), 0x8000_0000);
        assert_eq!(Word::count_ones(0b0100u16), 1);
        assert_eq!(<u64 as Word>::ZERO, 0);
    }
}
