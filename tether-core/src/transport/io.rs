//! `embedded-io` integration
//!
//! Lets protocol code written against `embedded_io::{Read, Write}` use the
//! transport directly. The transport itself never blocks, so `read`, `write`
//! and `flush` spin until the interrupt handler has made progress; use
//! [`ReadReady`]/[`WriteReady`] to avoid spinning.

use core::convert::Infallible;

use embedded_io::{ErrorType, Read, ReadReady, Write, WriteReady};
use tether_hal::SerialPeripheral;

use super::Transport;

impl<P: SerialPeripheral, const N: usize> ErrorType for &Transport<P, N> {
    type Error = Infallible;
}

impl<P: SerialPeripheral, const N: usize> Read for &Transport<P, N> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.dequeue(buf);
            if n > 0 {
                return Ok(n);
            }
            core::hint::spin_loop();
        }
    }
}

impl<P: SerialPeripheral, const N: usize> ReadReady for &Transport<P, N> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_available() > 0)
    }
}

impl<P: SerialPeripheral, const N: usize> Write for &Transport<P, N> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.enqueue(buf);
            if n > 0 {
                return Ok(n);
            }
            core::hint::spin_loop();
        }
    }

    /// Wait until the outbound ring is empty
    ///
    /// The last byte may still be in the peripheral's shift register.
    fn flush(&mut self) -> Result<(), Self::Error> {
        while self.write_free_space() < N {
            core::hint::spin_loop();
        }
        Ok(())
    }
}

impl<P: SerialPeripheral, const N: usize> WriteReady for &Transport<P, N> {
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.write_free_space() > 0)
    }
}
