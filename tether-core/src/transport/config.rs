//! Transport configuration and validation

use core::fmt;

use tether_hal::uart::{self, FrameFormat, WordLength};
use tether_hal::SerialFault;

/// Number of data bits per character, as requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
    Sixteen,
}

/// Parity mode, as requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    OneAndHalf,
    Two,
}

/// Hardware flow control mode
///
/// Accepted on input for compatibility, but the transport has no RTS/CTS
/// lines and always runs without flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowControl {
    None,
    Rts,
    Cts,
    RtsCts,
}

/// Serial line parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Data bits per character
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Flow control mode
    pub flow_control: FlowControl,
}

impl TransportConfig {
    /// Configuration in effect before the host sets one: 9600 8N1
    pub const DEFAULT: Self = Self {
        baudrate: 9600,
        data_bits: DataBits::Eight,
        parity: Parity::None,
        stop_bits: StopBits::One,
        flow_control: FlowControl::None,
    };

    /// Validate every field and derive the peripheral frame format
    ///
    /// Fields are checked in order (data bits, parity, stop bits, baud rate)
    /// and the first unsupported one is reported. Flow control is ignored.
    pub fn frame_format(&self) -> Result<FrameFormat, TransportError> {
        if self.data_bits != DataBits::Eight {
            return Err(TransportError::ConfigurationRejected(ConfigField::DataBits));
        }

        // The peripheral counts the parity bit as part of the word
        let (parity, word_length) = match self.parity {
            Parity::None => (uart::Parity::None, WordLength::Eight),
            Parity::Even => (uart::Parity::Even, WordLength::Nine),
            // Odd parity widens the word as well so all 8 data bits survive
            Parity::Odd => (uart::Parity::Odd, WordLength::Nine),
            Parity::Mark | Parity::Space => {
                return Err(TransportError::ConfigurationRejected(ConfigField::Parity))
            }
        };

        let stop_bits = match self.stop_bits {
            StopBits::One => uart::StopBits::One,
            StopBits::OneAndHalf => uart::StopBits::OneAndHalf,
            StopBits::Two => uart::StopBits::Two,
        };

        if self.baudrate == 0 {
            return Err(TransportError::ConfigurationRejected(ConfigField::Baudrate));
        }

        Ok(FrameFormat {
            baudrate: self.baudrate,
            word_length,
            parity,
            stop_bits,
        })
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration field that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigField {
    Baudrate,
    DataBits,
    Parity,
    StopBits,
}

/// Errors returned by transport operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// A configuration field is not supported; nothing was changed
    ConfigurationRejected(ConfigField),
    /// The peripheral refused a validated configuration
    Peripheral(SerialFault),
    /// Operation not supported by this peripheral
    Unsupported,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConfigurationRejected(field) => {
                write!(f, "unsupported {:?} setting", field)
            }
            TransportError::Peripheral(fault) => write!(f, "peripheral error: {}", fault),
            TransportError::Unsupported => write!(f, "operation not supported"),
        }
    }
}
