//! Flash controller abstractions
//!
//! Register-level primitives for an internal, page-organized flash with
//! double-word programming. Sequencing, alignment and session bookkeeping
//! live in `tether-core`.

/// Errors reported by the flash controller status register
///
/// Each variant corresponds to one error flag. Implementations report the
/// first flag found and clear all of them before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashFault {
    /// Target page is write protected
    WriteProtected,
    /// Address not aligned to the programming width
    Alignment,
    /// Operation issued out of sequence (e.g. while locked)
    Sequence,
    /// Target location was not erased
    Programming,
    /// Programming size mismatch
    Size,
    /// Operation failed for an unspecified reason
    Operation,
    /// Controller stayed busy
    Busy,
}

impl core::fmt::Display for FlashFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            FlashFault::WriteProtected => "write protected",
            FlashFault::Alignment => "alignment error",
            FlashFault::Sequence => "sequence error",
            FlashFault::Programming => "programming error",
            FlashFault::Size => "size error",
            FlashFault::Operation => "operation error",
            FlashFault::Busy => "controller busy",
        };
        f.write_str(msg)
    }
}

/// Flash controller
///
/// Every operation waits for the controller to go idle before returning,
/// so a successful return means the data is committed.
pub trait FlashController {
    /// Disable write protection on the control register
    ///
    /// Must tolerate being called while already unlocked.
    fn unlock(&mut self);

    /// Re-enable write protection
    fn lock(&mut self);

    /// Erase a single page
    ///
    /// `page` counts from the start of the programmable region handed to
    /// the flash session, not from the flash base. Implementations whose
    /// region starts above the base add their own page offset.
    fn erase_page(&mut self, page: u32) -> Result<(), FlashFault>;

    /// Program one 64-bit word at a double-word aligned address
    fn program_double_word(&mut self, address: u32, word: u64) -> Result<(), FlashFault>;
}
