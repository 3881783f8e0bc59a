//! In-memory peripherals for host-side testing
//!
//! [`MockSerial`] models the data registers and interrupt enables of a UART,
//! [`MockFlash`] models a page-erasable flash array with a lock bit and the
//! usual programming error checks.

use core::cell::{Cell, RefCell};

use heapless::Vec;

use crate::flash::{FlashController, FlashFault};
use crate::uart::{FrameFormat, Interrupt, SerialFault, SerialPeripheral};

/// Capacity of the mock transmit line capture
pub const MOCK_LINE_CAPACITY: usize = 2048;

/// Mock UART
///
/// Bytes placed on the receive line with [`MockSerial::receive`] show up as a
/// pending receive interrupt until read. The transmit register is always
/// empty, so an armed transmit interrupt is always pending; written bytes are
/// captured for inspection.
#[derive(Debug, Default)]
pub struct MockSerial {
    enabled: Cell<bool>,
    rx_armed: Cell<bool>,
    tx_armed: Cell<bool>,
    rx_data: Cell<Option<u8>>,
    format: Cell<Option<FrameFormat>>,
    configure_fault: Cell<Option<SerialFault>>,
    configure_calls: Cell<usize>,
    line: RefCell<Vec<u8, MOCK_LINE_CAPACITY>>,
}

impl MockSerial {
    /// Create a disabled mock UART with nothing on the line
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a byte in the receive data register
    ///
    /// An unread byte is overwritten, as on a real overrun.
    pub fn receive(&self, byte: u8) {
        self.rx_data.set(Some(byte));
    }

    /// Bytes written to the transmit register so far
    pub fn transmitted(&self) -> Vec<u8, MOCK_LINE_CAPACITY> {
        self.line.borrow().clone()
    }

    /// Clear the transmit capture
    pub fn clear_transmitted(&self) {
        self.line.borrow_mut().clear();
    }

    /// Check whether an interrupt source is armed
    pub fn is_listening(&self, interrupt: Interrupt) -> bool {
        match interrupt {
            Interrupt::RxReady => self.rx_armed.get(),
            Interrupt::TxReady => self.tx_armed.get(),
        }
    }

    /// Check whether clock, pins and interrupt line are enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Last frame format accepted by [`SerialPeripheral::configure`]
    pub fn format(&self) -> Option<FrameFormat> {
        self.format.get()
    }

    /// Number of calls to [`SerialPeripheral::configure`], failed ones included
    pub fn configure_calls(&self) -> usize {
        self.configure_calls.get()
    }

    /// Make the next [`SerialPeripheral::configure`] call fail
    pub fn fail_next_configure(&self, fault: SerialFault) {
        self.configure_fault.set(Some(fault));
    }
}

impl SerialPeripheral for MockSerial {
    fn enable(&self) {
        self.enabled.set(true);
    }

    fn disable(&self) {
        self.enabled.set(false);
        self.rx_armed.set(false);
        self.tx_armed.set(false);
    }

    fn configure(&self, format: &FrameFormat) -> Result<(), SerialFault> {
        self.configure_calls.set(self.configure_calls.get() + 1);
        if let Some(fault) = self.configure_fault.take() {
            return Err(fault);
        }
        self.rx_armed.set(false);
        self.tx_armed.set(false);
        self.format.set(Some(*format));
        Ok(())
    }

    fn listen(&self, interrupt: Interrupt) {
        match interrupt {
            Interrupt::RxReady => self.rx_armed.set(true),
            Interrupt::TxReady => self.tx_armed.set(true),
        }
    }

    fn unlisten(&self, interrupt: Interrupt) {
        match interrupt {
            Interrupt::RxReady => self.rx_armed.set(false),
            Interrupt::TxReady => self.tx_armed.set(false),
        }
    }

    fn is_pending(&self, interrupt: Interrupt) -> bool {
        match interrupt {
            Interrupt::RxReady => self.rx_armed.get() && self.rx_data.get().is_some(),
            Interrupt::TxReady => self.tx_armed.get(),
        }
    }

    fn read_byte(&self) -> u8 {
        self.rx_data.take().unwrap_or(0)
    }

    fn write_byte(&self, byte: u8) {
        // A full capture drops bytes; tests size their traffic below it.
        let _ = self.line.borrow_mut().push(byte);
    }
}

/// Mock internal flash
///
/// `SIZE` bytes starting at `base`, organized in pages of `page_size` bytes.
/// Erased bytes read as `0xFF`. The controller starts locked; erase and
/// program fail with [`FlashFault::Sequence`] while locked, program checks
/// double-word alignment and that the target was erased.
#[derive(Debug)]
pub struct MockFlash<const SIZE: usize> {
    base: u32,
    page_size: u32,
    memory: [u8; SIZE],
    locked: bool,
    unlock_calls: usize,
    lock_calls: usize,
    erased_pages: Vec<u32, 64>,
    words_programmed: usize,
    erase_fault: Option<(u32, FlashFault)>,
    program_fault: Option<(u32, FlashFault)>,
}

impl<const SIZE: usize> MockFlash<SIZE> {
    /// Create a locked, fully erased flash array
    pub fn new(base: u32, page_size: u32) -> Self {
        Self {
            base,
            page_size,
            memory: [0xFF; SIZE],
            locked: true,
            unlock_calls: 0,
            lock_calls: 0,
            erased_pages: Vec::new(),
            words_programmed: 0,
            erase_fault: None,
            program_fault: None,
        }
    }

    /// Read back `len` bytes at an absolute address
    pub fn contents(&self, address: u32, len: usize) -> &[u8] {
        let offset = (address - self.base) as usize;
        &self.memory[offset..offset + len]
    }

    /// Check whether write protection is enabled
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Number of [`FlashController::unlock`] calls
    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls
    }

    /// Number of [`FlashController::lock`] calls
    pub fn lock_calls(&self) -> usize {
        self.lock_calls
    }

    /// Page indices erased so far, in order
    pub fn erased_pages(&self) -> &[u32] {
        &self.erased_pages
    }

    /// Number of successfully programmed double-words
    pub fn words_programmed(&self) -> usize {
        self.words_programmed
    }

    /// Make erasing `page` fail with `fault`
    pub fn fail_erase(&mut self, page: u32, fault: FlashFault) {
        self.erase_fault = Some((page, fault));
    }

    /// Make programming the double-word at `address` fail with `fault`
    pub fn fail_program(&mut self, address: u32, fault: FlashFault) {
        self.program_fault = Some((address, fault));
    }

    fn offset(&self, address: u32, len: usize) -> Option<usize> {
        let offset = address.checked_sub(self.base)? as usize;
        (offset + len <= SIZE).then_some(offset)
    }
}

impl<const SIZE: usize> FlashController for MockFlash<SIZE> {
    fn unlock(&mut self) {
        self.unlock_calls += 1;
        self.locked = false;
    }

    fn lock(&mut self) {
        self.lock_calls += 1;
        self.locked = true;
    }

    fn erase_page(&mut self, page: u32) -> Result<(), FlashFault> {
        if self.locked {
            return Err(FlashFault::Sequence);
        }
        if let Some((failing, fault)) = self.erase_fault {
            if failing == page {
                return Err(fault);
            }
        }
        let start = self.base + page * self.page_size;
        let offset = self
            .offset(start, self.page_size as usize)
            .ok_or(FlashFault::Operation)?;
        self.memory[offset..offset + self.page_size as usize].fill(0xFF);
        let _ = self.erased_pages.push(page);
        Ok(())
    }

    fn program_double_word(&mut self, address: u32, word: u64) -> Result<(), FlashFault> {
        if self.locked {
            return Err(FlashFault::Sequence);
        }
        if address % 8 != 0 {
            return Err(FlashFault::Alignment);
        }
        if let Some((failing, fault)) = self.program_fault {
            if failing == address {
                return Err(fault);
            }
        }
        let offset = self.offset(address, 8).ok_or(FlashFault::Operation)?;
        let target = &mut self.memory[offset..offset + 8];
        if target.iter().any(|&b| b != 0xFF) {
            return Err(FlashFault::Programming);
        }
        target.copy_from_slice(&word.to_le_bytes());
        self.words_programmed += 1;
        Ok(())
    }
}
