//! UART peripheral abstractions
//!
//! The transport owns buffering and interrupt policy; the peripheral only
//! exposes the register-level primitives needed to drive it.

/// Interrupt sources of the serial peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    /// Receive data register holds a byte
    RxReady,
    /// Transmit data register can accept a byte
    TxReady,
}

/// Errors reported when programming the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialFault {
    /// Baud rate cannot be derived from the kernel clock
    Baudrate,
    /// Peripheral refused the configuration
    Peripheral,
}

impl core::fmt::Display for SerialFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SerialFault::Baudrate => write!(f, "baud rate not achievable"),
            SerialFault::Peripheral => write!(f, "peripheral rejected configuration"),
        }
    }
}

/// Serial peripheral driven from both thread and interrupt context
///
/// All methods take `&self`: a register block is shared between the
/// foreground and the interrupt handler, and each access is a single
/// register read or read-modify-write. Implementations must make
/// [`listen`](Self::listen) and [`unlisten`](Self::unlisten) idempotent.
pub trait SerialPeripheral {
    /// Enable the peripheral clock, route the pins and unmask the
    /// interrupt line
    fn enable(&self);

    /// Mask the interrupt line, stop the clock and release the pins
    fn disable(&self);

    /// Program a new frame format
    ///
    /// The peripheral is disabled while the format is applied and
    /// re-enabled afterwards with both interrupt sources disarmed.
    fn configure(&self, format: &FrameFormat) -> Result<(), SerialFault>;

    /// Arm an interrupt source
    fn listen(&self, interrupt: Interrupt);

    /// Disarm an interrupt source
    fn unlisten(&self, interrupt: Interrupt);

    /// Check whether the status flag behind an interrupt source is set
    fn is_pending(&self, interrupt: Interrupt) -> bool;

    /// Read the receive data register
    ///
    /// Reading clears the receive-ready flag.
    fn read_byte(&self) -> u8;

    /// Write the transmit data register
    fn write_byte(&self, byte: u8);
}

/// Frame format as programmed into the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameFormat {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Bits per character including the parity bit
    pub word_length: WordLength,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            baudrate: 9600,
            word_length: WordLength::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

/// Number of bits per character on the wire, parity included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordLength {
    Eight,
    Nine,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    OneAndHalf,
    Two,
}
