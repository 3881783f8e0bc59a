//! Internal flash programming
//!
//! [`FlashSession`] owns the flash controller and tracks which programming
//! functions (erase, program, verify, ...) are currently open. Write
//! protection is lifted when the first function opens and restored when
//! the last one closes, so interleaved users never lock each other out.

mod region;
mod session;

use core::fmt;

use tether_hal::FlashFault;

pub use region::FlashRegion;
pub use session::FlashSession;

/// Programming granularity in bytes
pub const WORD_SIZE: usize = 8;

/// Identifies one user of the flash session
///
/// Each slot owns one bit of the session's lock mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FunctionSlot(u8);

impl FunctionSlot {
    /// Sector erase
    pub const ERASE: Self = Self(1);
    /// Page program
    pub const PROGRAM: Self = Self(2);
    /// Read-back verification
    pub const VERIFY: Self = Self(3);

    /// Highest valid slot number
    pub const MAX: u8 = 31;

    /// Create a slot, returning `None` above [`FunctionSlot::MAX`]
    pub const fn new(slot: u8) -> Option<Self> {
        if slot > Self::MAX {
            None
        } else {
            Some(Self(slot))
        }
    }

    /// Slot number
    pub const fn index(self) -> u8 {
        self.0
    }

    const fn mask(self) -> u32 {
        1 << self.0
    }
}

/// Flash programming errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// The controller failed to erase a sector
    EraseFailed { sector: u32, fault: FlashFault },
    /// The controller failed to program the word at `address`
    ///
    /// Words before it remain programmed.
    ProgramFailed { address: u32, fault: FlashFault },
    /// Data length is not a multiple of [`WORD_SIZE`]; nothing was written
    UnalignedLength { len: usize },
    /// Address lies outside the flash region
    OutOfRange { address: u32 },
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::EraseFailed { sector, fault } => {
                write!(f, "erase of sector {} failed: {}", sector, fault)
            }
            FlashError::ProgramFailed { address, fault } => {
                write!(f, "program at {:#010x} failed: {}", address, fault)
            }
            FlashError::UnalignedLength { len } => {
                write!(f, "length {} is not a multiple of {}", len, WORD_SIZE)
            }
            FlashError::OutOfRange { address } => {
                write!(f, "address {:#010x} outside flash region", address)
            }
        }
    }
}
