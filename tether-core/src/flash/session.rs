//! Reference-counted flash programming session

use tether_hal::FlashController;

use super::{FlashError, FlashRegion, FunctionSlot, WORD_SIZE};

/// Erase and program access to a [`FlashRegion`]
///
/// Write protection is disabled while at least one [`FunctionSlot`] is open:
///
/// ```text
/// init(ERASE)      0b0010  unlock
/// init(PROGRAM)    0b0110
/// uninit(ERASE)    0b0100
/// uninit(PROGRAM)  0b0000  lock
/// ```
///
/// Erase and program assume the caller holds an open slot; the controller
/// reports a fault otherwise.
pub struct FlashSession<F> {
    flash: F,
    region: FlashRegion,
    open: u32,
}

impl<F: FlashController> FlashSession<F> {
    /// Take ownership of the controller; protection is assumed to be on
    pub const fn new(flash: F, region: FlashRegion) -> Self {
        Self {
            flash,
            region,
            open: 0,
        }
    }

    /// Open `slot`, lifting write protection if it is the first one
    ///
    /// `address` and `clock` are part of the programming protocol and unused
    /// here. Opening an already open slot changes nothing.
    pub fn init(&mut self, address: u32, clock: u32, slot: FunctionSlot) {
        let _ = (address, clock);
        let was_locked = self.open == 0;
        self.open |= slot.mask();
        if was_locked {
            debug!("flash: unlock (slot {})", slot.index());
            self.flash.unlock();
        }
    }

    /// Close `slot`, restoring write protection if it was the last one
    ///
    /// Closing a slot that is not open changes nothing.
    pub fn uninit(&mut self, slot: FunctionSlot) {
        if self.open & slot.mask() == 0 {
            return;
        }
        self.open &= !slot.mask();
        if self.open == 0 {
            debug!("flash: lock (slot {})", slot.index());
            self.flash.lock();
        }
    }

    /// Check whether write protection is currently lifted
    pub fn is_unlocked(&self) -> bool {
        self.open != 0
    }

    /// Bitmask of open slots
    pub fn open_slots(&self) -> u32 {
        self.open
    }

    pub fn region(&self) -> &FlashRegion {
        &self.region
    }

    /// Borrow the controller
    pub fn controller(&self) -> &F {
        &self.flash
    }

    /// Erase the sector containing `address`
    pub fn erase_sector(&mut self, address: u32) -> Result<(), FlashError> {
        let sector = self
            .region
            .sector_index(address)
            .ok_or(FlashError::OutOfRange { address })?;

        self.flash.erase_page(sector).map_err(|fault| {
            warn!("flash: erase of sector {} failed", sector);
            FlashError::EraseFailed { sector, fault }
        })
    }

    /// Program `data` starting at `address`, one double-word at a time
    ///
    /// `data.len()` must be a multiple of [`WORD_SIZE`]. Words are read as
    /// little-endian. On failure, every word before the reported address is
    /// already committed.
    pub fn program_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        if data.len() % WORD_SIZE != 0 {
            return Err(FlashError::UnalignedLength { len: data.len() });
        }
        debug_assert!(self.region.contains(address, data.len()));

        let mut target = address;
        for chunk in data.chunks_exact(WORD_SIZE) {
            let mut bytes = [0u8; WORD_SIZE];
            bytes.copy_from_slice(chunk);

            self.flash
                .program_double_word(target, u64::from_le_bytes(bytes))
                .map_err(|fault| {
                    warn!("flash: program at {:#x} failed", target);
                    FlashError::ProgramFailed {
                        address: target,
                        fault,
                    }
                })?;
            target = target.wrapping_add(WORD_SIZE as u32);
        }

        trace!("flash: programmed {} bytes at {:#x}", data.len(), address);
        Ok(())
    }

    /// Give the controller back
    pub fn release(self) -> F {
        self.flash
    }
}
