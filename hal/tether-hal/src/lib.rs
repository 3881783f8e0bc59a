//! Tether Hardware Abstraction Layer
//!
//! This crate defines the narrow hardware capabilities the Tether core
//! drives. Chip-specific HALs implement them on top of their register
//! blocks, so the transport and flash logic in `tether-core` stays
//! board-agnostic and testable on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Interface firmware (CDC, MSC, CMSIS)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  tether-core (transport, flash session) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  tether-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  chip HAL     │       │  mock (host)  │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::SerialPeripheral`] - Interrupt-driven byte peripheral
//! - [`flash::FlashController`] - Sector-erasable, double-word programmable flash

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod uart;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export key traits at crate root for convenience
pub use flash::{FlashController, FlashFault};
pub use uart::{FrameFormat, Interrupt, SerialFault, SerialPeripheral};
