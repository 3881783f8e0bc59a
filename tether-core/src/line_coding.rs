//! USB CDC line coding
//!
//! The host sets the virtual COM port parameters with a 7-byte
//! `SET_LINE_CODING` payload and reads them back with `GET_LINE_CODING`:
//!
//! ```text
//! ┌────────────┬─────────────┬─────────────┬───────────┐
//! │ dwDTERate  │ bCharFormat │ bParityType │ bDataBits │
//! │ 4B (LE)    │ 1B          │ 1B          │ 1B        │
//! └────────────┴─────────────┴─────────────┴───────────┘
//! ```
//!
//! Decoding only rejects codes the CDC class does not define; whether the
//! transport supports a setting is decided by
//! [`Transport::set_configuration`](crate::transport::Transport::set_configuration).

use core::fmt;

use crate::transport::{DataBits, FlowControl, Parity, StopBits, TransportConfig};

/// Size of the line coding structure in bytes
pub const LINE_CODING_SIZE: usize = 7;

/// Errors from decoding a line coding payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineCodingError {
    /// Payload shorter than [`LINE_CODING_SIZE`]
    Truncated,
    /// Unknown `bCharFormat` value
    StopBits(u8),
    /// Unknown `bParityType` value
    Parity(u8),
    /// Unknown `bDataBits` value
    DataBits(u8),
}

impl fmt::Display for LineCodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineCodingError::Truncated => write!(f, "line coding payload truncated"),
            LineCodingError::StopBits(code) => write!(f, "invalid stop bits code {}", code),
            LineCodingError::Parity(code) => write!(f, "invalid parity code {}", code),
            LineCodingError::DataBits(code) => write!(f, "invalid data bits {}", code),
        }
    }
}

/// Decode a `SET_LINE_CODING` payload
///
/// Extra trailing bytes are ignored. Flow control is not part of CDC line
/// coding and is always [`FlowControl::None`].
pub fn decode(payload: &[u8]) -> Result<TransportConfig, LineCodingError> {
    let bytes: &[u8; LINE_CODING_SIZE] = payload
        .get(..LINE_CODING_SIZE)
        .and_then(|head| head.try_into().ok())
        .ok_or(LineCodingError::Truncated)?;

    let baudrate = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

    let stop_bits = match bytes[4] {
        0 => StopBits::One,
        1 => StopBits::OneAndHalf,
        2 => StopBits::Two,
        code => return Err(LineCodingError::StopBits(code)),
    };

    let parity = match bytes[5] {
        0 => Parity::None,
        1 => Parity::Odd,
        2 => Parity::Even,
        3 => Parity::Mark,
        4 => Parity::Space,
        code => return Err(LineCodingError::Parity(code)),
    };

    let data_bits = match bytes[6] {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        16 => DataBits::Sixteen,
        code => return Err(LineCodingError::DataBits(code)),
    };

    Ok(TransportConfig {
        baudrate,
        data_bits,
        parity,
        stop_bits,
        flow_control: FlowControl::None,
    })
}

/// Encode a configuration as a `GET_LINE_CODING` payload
pub fn encode(config: &TransportConfig) -> [u8; LINE_CODING_SIZE] {
    let mut out = [0u8; LINE_CODING_SIZE];
    out[..4].copy_from_slice(&config.baudrate.to_le_bytes());
    out[4] = match config.stop_bits {
        StopBits::One => 0,
        StopBits::OneAndHalf => 1,
        StopBits::Two => 2,
    };
    out[5] = match config.parity {
        Parity::None => 0,
        Parity::Odd => 1,
        Parity::Even => 2,
        Parity::Mark => 3,
        Parity::Space => 4,
    };
    out[6] = match config.data_bits {
        DataBits::Five => 5,
        DataBits::Six => 6,
        DataBits::Seven => 7,
        DataBits::Eight => 8,
        DataBits::Sixteen => 16,
    };
    out
}
