//! Interrupt-driven buffered serial transport
//!
//! Bytes move between the UART and two [`RingBuffer`]s: the inbound ring is
//! filled by the interrupt handler and drained by [`Transport::dequeue`], the
//! outbound ring is filled by [`Transport::enqueue`] and drained by the
//! interrupt handler. Neither side ever blocks.
//!
//! # Execution contexts
//!
//! A `Transport` is meant to live in a `static` on a single-core MCU:
//!
//! ```text
//!  thread mode                          UART interrupt
//!  ───────────                          ──────────────
//!  enqueue ──► [ outbound ring ] ──► on_interrupt ──► TDR
//!  dequeue ◄── [ inbound ring  ] ◄── on_interrupt ◄── RDR
//! ```
//!
//! Every method except [`Transport::on_interrupt`] belongs to thread mode.
//! When the inbound ring is about to overflow, the interrupt handler writes
//! [`OVERFLOW_NOTICE`] into it so the host sees the loss in the data stream.

#![allow(unsafe_code)]

mod config;
mod io;

use core::cell::Cell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use tether_hal::{Interrupt, SerialPeripheral};

use crate::ring::RingBuffer;

pub use config::{
    ConfigField, DataBits, FlowControl, Parity, StopBits, TransportConfig, TransportError,
};

/// Default capacity of each ring
pub const BUFFER_SIZE: usize = 512;

/// Text injected into the inbound stream when it overflows
pub const OVERFLOW_NOTICE: &[u8] = b"<DAPLink:Overflow>\n";

/// Notification raised from interrupt context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialEvent {
    /// A received byte was queued
    RxData,
    /// The inbound ring filled up and the overflow notice was queued
    RxOverflow,
    /// The outbound ring ran empty and the transmit interrupt was disarmed
    TxDrained,
}

/// Receiver of [`SerialEvent`]s
///
/// Called from interrupt context; implementations must not block.
pub trait EventSink {
    fn signal(&mut self, event: SerialEvent);
}

/// Ignore all events
impl EventSink for () {
    fn signal(&mut self, _event: SerialEvent) {}
}

impl<F: FnMut(SerialEvent)> EventSink for F {
    fn signal(&mut self, event: SerialEvent) {
        self(event)
    }
}

/// Modem control line requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemControl {
    RtsClear,
    RtsSet,
    DtrClear,
    DtrSet,
}

/// Modem status lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModemStatus {
    pub cts: bool,
    pub dsr: bool,
    pub dcd: bool,
    pub ri: bool,
}

/// Buffered, non-blocking serial transport over a [`SerialPeripheral`]
pub struct Transport<P, const N: usize = BUFFER_SIZE> {
    serial: P,
    rx: RingBuffer<N>,
    tx: RingBuffer<N>,
    config: CriticalSectionMutex<Cell<TransportConfig>>,
}

impl<P: SerialPeripheral, const N: usize> Transport<P, N> {
    const NOTICE_FITS: () = assert!(
        OVERFLOW_NOTICE.len() < N,
        "ring too small for overflow notice"
    );

    /// Create a transport around a peripheral
    ///
    /// The peripheral is not touched until [`initialize`](Self::initialize).
    ///
    /// # Safety
    ///
    /// The rings are handed over between contexts without locking. The caller
    /// must guarantee that [`on_interrupt`](Self::on_interrupt) is only ever
    /// running in one execution context (the peripheral's interrupt handler),
    /// that all other methods are only ever running in one other execution
    /// context (thread mode), and that the interrupt handler cannot be
    /// preempted by thread mode, as on a single-core MCU.
    pub const unsafe fn new(serial: P) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NOTICE_FITS;

        Self {
            serial,
            rx: RingBuffer::new(),
            tx: RingBuffer::new(),
            config: CriticalSectionMutex::new(Cell::new(TransportConfig::DEFAULT)),
        }
    }

    /// Access the underlying peripheral
    pub fn peripheral(&self) -> &P {
        &self.serial
    }

    /// Reset the rings and enable clock, pins and interrupt line
    ///
    /// Safe to call repeatedly. Reception starts once a configuration has
    /// been set.
    pub fn initialize(&self) {
        self.reset();
        self.serial.enable();
        debug!("transport initialized");
    }

    /// Disarm interrupts, disable the peripheral and clear the rings
    pub fn uninitialize(&self) {
        self.reset();
        self.serial.disable();
        debug!("transport uninitialized");
    }

    /// Disarm both interrupt sources and clear both rings
    pub fn reset(&self) {
        self.serial.unlisten(Interrupt::TxReady);
        self.serial.unlisten(Interrupt::RxReady);

        // SAFETY: with both sources disarmed the interrupt handler neither
        // produces into `rx` nor consumes from `tx`, and thread mode is
        // executing this call rather than any other ring operation.
        unsafe {
            self.rx.reset();
            self.tx.reset();
        }
    }

    /// Validate and apply a new line configuration
    ///
    /// On a rejected field nothing is touched: the peripheral, the rings and
    /// the stored configuration stay as they were. Otherwise the transport is
    /// reset, so no byte received or queued under the old settings survives.
    pub fn set_configuration(&self, config: &TransportConfig) -> Result<(), TransportError> {
        let format = config.frame_format().map_err(|err| {
            warn!("configuration rejected: {}", err);
            err
        })?;

        self.reset();
        self.serial.configure(&format).map_err(|fault| {
            error!("peripheral refused configuration: {}", fault);
            TransportError::Peripheral(fault)
        })?;
        self.serial.listen(Interrupt::RxReady);

        let accepted = TransportConfig {
            flow_control: FlowControl::None,
            ..*config
        };
        self.config.lock(|cell| cell.set(accepted));
        debug!("transport configured: {} baud", accepted.baudrate);
        Ok(())
    }

    /// Last accepted configuration
    ///
    /// Flow control is always reported as [`FlowControl::None`].
    pub fn configuration(&self) -> TransportConfig {
        self.config.lock(|cell| cell.get())
    }

    /// Spare capacity of the outbound ring
    pub fn write_free_space(&self) -> usize {
        self.tx.free()
    }

    /// Number of received bytes waiting in the inbound ring
    pub fn read_available(&self) -> usize {
        self.rx.len()
    }

    /// Queue bytes for transmission
    ///
    /// Copies as much of `data` as fits and returns the number of bytes
    /// queued, then arms the transmit interrupt.
    pub fn enqueue(&self, data: &[u8]) -> usize {
        // SAFETY: thread mode is the only producer of the outbound ring.
        let written = unsafe { self.tx.producer() }.write(data);
        self.serial.listen(Interrupt::TxReady);
        if written < data.len() {
            trace!("outbound ring full, {} of {} bytes queued", written, data.len());
        }
        written
    }

    /// Take up to `buf.len()` received bytes
    ///
    /// Returns the number of bytes copied, possibly zero.
    pub fn dequeue(&self, buf: &mut [u8]) -> usize {
        // SAFETY: thread mode is the only consumer of the inbound ring.
        unsafe { self.rx.consumer() }.read(buf)
    }

    /// Service the peripheral interrupt
    ///
    /// Moves at most one byte in each direction. Call this from the UART
    /// interrupt handler.
    pub fn on_interrupt<S: EventSink + ?Sized>(&self, sink: &mut S) {
        if self.serial.is_pending(Interrupt::RxReady) {
            let byte = self.serial.read_byte();

            // SAFETY: the interrupt handler is the only producer of the
            // inbound ring.
            let mut rx = unsafe { self.rx.producer() };
            let free = rx.free();
            if free > OVERFLOW_NOTICE.len() {
                rx.push(byte);
                sink.signal(SerialEvent::RxData);
            } else if free == OVERFLOW_NOTICE.len() {
                // The notice takes the last free bytes; the incoming byte is lost.
                rx.write(OVERFLOW_NOTICE);
                warn!("inbound ring overflow");
                sink.signal(SerialEvent::RxOverflow);
            }
            // Below that the notice is already queued and the byte is dropped.
        }

        if self.serial.is_pending(Interrupt::TxReady) {
            // SAFETY: the interrupt handler is the only consumer of the
            // outbound ring.
            match unsafe { self.tx.consumer() }.pop() {
                Some(byte) => self.serial.write_byte(byte),
                None => {
                    self.serial.unlisten(Interrupt::TxReady);
                    sink.signal(SerialEvent::TxDrained);
                }
            }
        }
    }

    /// Update the host's DTR/RTS state
    ///
    /// The peripheral has no modem lines, so the request is ignored.
    pub fn set_control_line_state(&self, lines: u16) {
        trace!("control line state {=u16:#x} ignored", lines);
    }

    /// Full-duplex exchange
    pub fn transfer(&self, _out: &[u8], _in: &mut [u8]) -> Result<usize, TransportError> {
        Err(TransportError::Unsupported)
    }

    /// Drive a modem control line
    pub fn set_modem_control(&self, _control: ModemControl) -> Result<(), TransportError> {
        Err(TransportError::Unsupported)
    }

    /// Read the modem status lines, all inactive on this peripheral
    pub fn modem_status(&self) -> ModemStatus {
        ModemStatus::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tether_hal::mock::MockSerial;
    use tether_hal::SerialFault;

    fn transport<const N: usize>() -> Transport<MockSerial, N> {
        // SAFETY: tests drive both sides from a single thread.
        let transport = unsafe { Transport::new(MockSerial::new()) };
        transport.initialize();
        transport
            .set_configuration(&TransportConfig::DEFAULT)
            .unwrap();
        transport
    }

    fn receive<const N: usize>(transport: &Transport<MockSerial, N>, bytes: &[u8]) {
        for &byte in bytes {
            transport.peripheral().receive(byte);
            transport.on_interrupt(&mut ());
        }
    }

    /// Run the transmit interrupt until it disarms itself
    fn drain<const N: usize>(transport: &Transport<MockSerial, N>) -> Vec<u8> {
        while transport.peripheral().is_listening(Interrupt::TxReady) {
            transport.on_interrupt(&mut ());
        }
        let sent = transport.peripheral().transmitted().to_vec();
        transport.peripheral().clear_transmitted();
        sent
    }

    #[test]
    fn test_initialize_enables_peripheral() {
        // SAFETY: single-threaded test.
        let transport: Transport<MockSerial> = unsafe { Transport::new(MockSerial::new()) };
        transport.initialize();
        transport.initialize();

        assert!(transport.peripheral().is_enabled());
        assert_eq!(transport.write_free_space(), BUFFER_SIZE);
        assert_eq!(transport.read_available(), 0);
        assert!(!transport.peripheral().is_listening(Interrupt::RxReady));
    }

    #[test]
    fn test_enqueue_arms_transmit_and_drains_in_order() {
        let transport = transport::<512>();
        assert_eq!(transport.enqueue(b"hello "), 6);
        assert_eq!(transport.enqueue(b"world"), 5);
        assert!(transport.peripheral().is_listening(Interrupt::TxReady));
        assert_eq!(transport.write_free_space(), 512 - 11);

        assert_eq!(drain(&transport), b"hello world");
        assert_eq!(transport.write_free_space(), 512);
        assert!(!transport.peripheral().is_listening(Interrupt::TxReady));
    }

    #[test]
    fn test_empty_outbound_disarms_and_signals() {
        let transport = transport::<512>();
        transport.enqueue(b"A");

        let mut events: Vec<SerialEvent> = Vec::new();
        let mut sink = |event: SerialEvent| events.push(event);
        transport.on_interrupt(&mut sink);
        transport.on_interrupt(&mut sink);

        assert_eq!(events, [SerialEvent::TxDrained]);
        assert_eq!(transport.peripheral().transmitted().as_slice(), b"A");
        assert!(!transport.peripheral().is_listening(Interrupt::TxReady));
    }

    #[test]
    fn test_enqueue_truncates_when_full() {
        let transport = transport::<512>();
        let data = [0x55u8; 600];
        assert_eq!(transport.enqueue(&data), 512);
        assert_eq!(transport.write_free_space(), 0);
        assert_eq!(transport.enqueue(b"more"), 0);
        assert_eq!(drain(&transport).len(), 512);
    }

    #[test]
    fn test_received_bytes_dequeued_in_order() {
        let transport = transport::<512>();
        receive(&transport, b"abcdef");
        assert_eq!(transport.read_available(), 6);

        let mut buf = [0u8; 4];
        assert_eq!(transport.dequeue(&mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(transport.dequeue(&mut buf), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(transport.dequeue(&mut buf), 0);
    }

    #[test]
    fn test_overflow_notice_replaces_last_byte() {
        let transport = transport::<512>();
        let fill = 512 - OVERFLOW_NOTICE.len();
        let payload: Vec<u8> = (0..fill).map(|i| (i % 251) as u8).collect();
        receive(&transport, &payload);
        assert_eq!(transport.read_available(), fill);

        let mut events: Vec<SerialEvent> = Vec::new();
        transport.peripheral().receive(b'X');
        transport.on_interrupt(&mut |event: SerialEvent| events.push(event));
        assert_eq!(events, [SerialEvent::RxOverflow]);
        assert_eq!(transport.read_available(), 512);

        let mut out = [0u8; 512];
        assert_eq!(transport.dequeue(&mut out), 512);
        assert_eq!(&out[..fill], payload.as_slice());
        assert_eq!(&out[fill..], OVERFLOW_NOTICE);
    }

    #[test]
    fn test_overflow_notice_wraps_intact() {
        let fill = 32 - OVERFLOW_NOTICE.len();
        for offset in 0..32 {
            let transport = transport::<32>();
            receive(&transport, &vec![0xEE; offset]);
            let mut skip = [0u8; 32];
            assert_eq!(transport.dequeue(&mut skip), offset);

            let payload: Vec<u8> = (0..fill as u8).collect();
            receive(&transport, &payload);
            receive(&transport, b"X");
            assert_eq!(transport.read_available(), 32);

            let mut out = [0u8; 32];
            assert_eq!(transport.dequeue(&mut out), 32);
            assert_eq!(&out[..fill], payload.as_slice(), "offset {}", offset);
            assert_eq!(&out[fill..], OVERFLOW_NOTICE, "offset {}", offset);
        }
    }

    #[test]
    fn test_bytes_after_notice_dropped_silently() {
        let transport = transport::<512>();
        receive(&transport, &[0u8; 512 - 19]);
        receive(&transport, b"XYZ");
        assert_eq!(transport.read_available(), 512);

        // Room for a few bytes again, still below the notice size
        let mut out = [0u8; 5];
        transport.dequeue(&mut out);
        let mut events: Vec<SerialEvent> = Vec::new();
        transport.peripheral().receive(b'Q');
        transport.on_interrupt(&mut |event: SerialEvent| events.push(event));
        assert!(events.is_empty());
        assert_eq!(transport.read_available(), 507);

        let mut rest = [0u8; 512];
        let n = transport.dequeue(&mut rest);
        assert_eq!(&rest[n - OVERFLOW_NOTICE.len()..n], OVERFLOW_NOTICE);
    }

    #[test]
    fn test_set_configuration_round_trips() {
        let transport = transport::<512>();
        let cfg = TransportConfig {
            baudrate: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            flow_control: FlowControl::None,
        };
        transport.set_configuration(&cfg).unwrap();

        assert_eq!(transport.configuration(), cfg);
        let format = transport.peripheral().format().unwrap();
        assert_eq!(format.baudrate, 115_200);
        assert_eq!(format.word_length, tether_hal::uart::WordLength::Nine);
        assert!(transport.peripheral().is_listening(Interrupt::RxReady));
    }

    #[test]
    fn test_flow_control_reported_as_none() {
        let transport = transport::<512>();
        let cfg = TransportConfig {
            flow_control: FlowControl::RtsCts,
            ..TransportConfig::DEFAULT
        };
        transport.set_configuration(&cfg).unwrap();
        assert_eq!(transport.configuration().flow_control, FlowControl::None);
    }

    #[test]
    fn test_rejected_configuration_changes_nothing() {
        let transport = transport::<512>();
        let previous = transport.configuration();
        receive(&transport, b"keep");
        transport.enqueue(b"pending");
        let calls = transport.peripheral().configure_calls();

        let cfg = TransportConfig {
            baudrate: 57_600,
            parity: Parity::Mark,
            ..TransportConfig::DEFAULT
        };
        assert_eq!(
            transport.set_configuration(&cfg),
            Err(TransportError::ConfigurationRejected(ConfigField::Parity))
        );

        assert_eq!(transport.configuration(), previous);
        assert_eq!(transport.peripheral().configure_calls(), calls);
        assert_eq!(transport.read_available(), 4);
        assert!(transport.peripheral().is_listening(Interrupt::RxReady));
        assert!(transport.peripheral().is_listening(Interrupt::TxReady));
        assert_eq!(drain(&transport), b"pending");
    }

    #[test]
    fn test_peripheral_failure_keeps_previous_configuration() {
        let transport = transport::<512>();
        transport.peripheral().fail_next_configure(SerialFault::Baudrate);

        let cfg = TransportConfig {
            baudrate: 3_000_000,
            ..TransportConfig::DEFAULT
        };
        assert_eq!(
            transport.set_configuration(&cfg),
            Err(TransportError::Peripheral(SerialFault::Baudrate))
        );
        assert_eq!(transport.configuration(), TransportConfig::DEFAULT);
        assert!(!transport.peripheral().is_listening(Interrupt::RxReady));
    }

    #[test]
    fn test_reconfiguration_discards_stale_bytes() {
        let transport = transport::<512>();
        receive(&transport, b"old");
        transport.enqueue(b"stale");

        transport.set_configuration(&TransportConfig::DEFAULT).unwrap();
        assert_eq!(transport.read_available(), 0);
        assert_eq!(transport.write_free_space(), 512);
        assert!(drain(&transport).is_empty());
    }

    #[test]
    fn test_reset_disarms_and_clears() {
        let transport = transport::<512>();
        receive(&transport, b"in");
        transport.enqueue(b"out");

        transport.reset();
        assert!(!transport.peripheral().is_listening(Interrupt::RxReady));
        assert!(!transport.peripheral().is_listening(Interrupt::TxReady));
        assert_eq!(transport.read_available(), 0);
        assert_eq!(transport.write_free_space(), 512);
    }

    #[test]
    fn test_reinitialize_recovers() {
        let transport = transport::<512>();
        transport.enqueue(b"lost");
        transport.uninitialize();
        assert!(!transport.peripheral().is_enabled());
        assert_eq!(transport.write_free_space(), 512);

        transport.initialize();
        transport.set_configuration(&TransportConfig::DEFAULT).unwrap();
        receive(&transport, b"ok");
        transport.enqueue(b"back");
        let mut buf = [0u8; 2];
        assert_eq!(transport.dequeue(&mut buf), 2);
        assert_eq!(&buf, b"ok");
        assert_eq!(drain(&transport), b"back");
    }

    #[test]
    fn test_unsupported_operations() {
        let transport = transport::<512>();
        let mut buf = [0u8; 4];
        assert_eq!(
            transport.transfer(b"ping", &mut buf),
            Err(TransportError::Unsupported)
        );
        assert_eq!(
            transport.set_modem_control(ModemControl::DtrSet),
            Err(TransportError::Unsupported)
        );
        transport.set_control_line_state(0x3);
        assert_eq!(transport.modem_status(), ModemStatus::default());
    }

    proptest! {
        /// Everything accepted by enqueue reaches the wire exactly once, in order
        #[test]
        fn prop_outbound_no_loss(
            ops in proptest::collection::vec(
                (proptest::collection::vec(any::<u8>(), 0..48), 0usize..80),
                0..24,
            )
        ) {
            let transport = transport::<64>();
            let mut accepted = Vec::new();

            for (chunk, interrupts) in ops {
                let n = transport.enqueue(&chunk);
                accepted.extend_from_slice(&chunk[..n]);
                for _ in 0..interrupts {
                    transport.on_interrupt(&mut ());
                }
            }

            prop_assert_eq!(drain(&transport), accepted);
        }

        /// Below the overflow threshold every received byte is delivered in order
        #[test]
        fn prop_inbound_order_preserved(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 0..16)
        ) {
            let transport = transport::<64>();
            let mut expected = Vec::new();
            let mut delivered = Vec::new();
            let threshold = 64 - OVERFLOW_NOTICE.len();

            for chunk in chunks {
                let room = threshold - transport.read_available();
                let take = chunk.len().min(room);
                receive(&transport, &chunk[..take]);
                expected.extend_from_slice(&chunk[..take]);

                let mut buf = [0u8; 16];
                let n = transport.dequeue(&mut buf);
                delivered.extend_from_slice(&buf[..n]);
            }

            let mut buf = [0u8; 64];
            let n = transport.dequeue(&mut buf);
            delivered.extend_from_slice(&buf[..n]);
            prop_assert_eq!(delivered, expected);
        }
    }
}
