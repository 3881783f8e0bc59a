//! Board-agnostic core of the Tether interface firmware
//!
//! Two independent components, both driven through the `tether-hal` traits:
//!
//! - [`transport`] - interrupt-driven buffered serial transport for the
//!   virtual COM port, built on the lock-free [`ring`] buffers
//! - [`flash`] - reference-counted flash programming session with
//!   sector erase and double-word programming
//!
//! [`line_coding`] converts USB CDC line coding requests into transport
//! configurations.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod flash;
pub mod line_coding;
pub mod ring;
pub mod transport;

pub use flash::{FlashError, FlashRegion, FlashSession, FunctionSlot};
pub use ring::RingBuffer;
pub use transport::{SerialEvent, Transport, TransportConfig, TransportError};
