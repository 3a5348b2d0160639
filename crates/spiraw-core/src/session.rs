//! Bus session
//!
//! A [`BusSession`] owns one opened adapter port and enforces the SPI
//! transaction lifecycle:
//!
//! ```text
//! open() ──> Ready ──start()──> InTransaction ──stop()──> Ready ... ──close()──> Closed
//! ```
//!
//! `write` and `read` are only accepted inside a transaction. `close` is
//! idempotent and also runs on drop, so the port is released exactly once.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use crate::adapter::{
    AdapterPort, AuxPin, BitOrder, OpenParams, SpiAdapter, SpiMode, DEFAULT_CLOCK_HZ,
};
use crate::error::{Error, Result};
use crate::frame::HexBytes;

/// Transaction state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Open, chip select deasserted
    Ready,
    /// Chip select asserted
    InTransaction,
    /// Port released; terminal
    Closed,
}

/// Which writes are logged as hex diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteTrace {
    /// Never
    Off,
    /// Only the first write of the session
    #[default]
    First,
    /// Every write
    Every,
}

/// Writes longer than this are truncated in diagnostics
const TRACE_LIMIT: usize = 64;

/// A raw SPI bus session over one adapter port
pub struct BusSession<P: AdapterPort> {
    port: Option<P>,
    mode: SpiMode,
    clock_hz: u32,
    description: String,
    state: SessionState,
    write_trace: WriteTrace,
    first_write_reported: bool,
}

impl<P: AdapterPort> BusSession<P> {
    /// Open `adapter` as an SPI master
    ///
    /// `speed_hz == 0` selects [`DEFAULT_CLOCK_HZ`]. `mode` must be 0-3;
    /// an invalid mode is rejected before the adapter is touched. The
    /// write-protect and hold lines are driven high so the target operates
    /// normally.
    pub fn open<A>(adapter: A, speed_hz: u32, mode: u8) -> Result<Self>
    where
        A: SpiAdapter<Port = P>,
    {
        let mode = SpiMode::try_from(mode)?;
        let clock_hz = if speed_hz == 0 {
            DEFAULT_CLOCK_HZ
        } else {
            speed_hz
        };

        let params = OpenParams {
            mode,
            clock_hz,
            bit_order: BitOrder::MsbFirst,
        };
        log::debug!("Opening adapter: {} at {} Hz, MSB first", mode, clock_hz);
        let port = adapter.open(&params)?;

        let mut session = Self {
            description: port.description().to_string(),
            clock_hz: port.clock_hz(),
            port: Some(port),
            mode,
            state: SessionState::Ready,
            write_trace: WriteTrace::default(),
            first_write_reported: false,
        };

        if session.clock_hz != clock_hz {
            log::info!(
                "Requested {} Hz, adapter negotiated {} Hz",
                clock_hz,
                session.clock_hz
            );
        }

        // On failure the session is dropped, which releases the port
        session.init_aux_pins()?;

        Ok(session)
    }

    fn init_aux_pins(&mut self) -> Result<()> {
        let port = self.port_mut()?;
        for pin in AuxPin::ALL {
            log::debug!("Driving {} high", pin.name());
            port.pin_high(pin)?;
        }
        Ok(())
    }

    fn port_mut(&mut self) -> Result<&mut P> {
        self.port.as_mut().ok_or(Error::SessionClosed)
    }

    fn require(&self, wanted: SessionState) -> Result<()> {
        match (self.state, wanted) {
            (SessionState::Closed, _) => Err(Error::SessionClosed),
            (current, wanted) if current == wanted => Ok(()),
            (SessionState::InTransaction, _) => Err(Error::AlreadyInTransaction),
            _ => Err(Error::NotInTransaction),
        }
    }

    /// Bus mode fixed at construction
    pub fn mode(&self) -> SpiMode {
        self.mode
    }

    /// Clock negotiated by the adapter, in Hz
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Adapter description read back at open
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the port is still held
    pub fn is_open(&self) -> bool {
        self.state != SessionState::Closed
    }

    /// Select which writes are logged as hex diagnostics
    pub fn set_write_trace(&mut self, trace: WriteTrace) {
        self.write_trace = trace;
    }

    /// Assert chip select, starting a transaction
    ///
    /// Fails with [`Error::AlreadyInTransaction`] if one is already open;
    /// the bus is left untouched in that case.
    pub fn start(&mut self) -> Result<()> {
        self.require(SessionState::Ready)?;
        self.port_mut()?.assert_select()?;
        self.state = SessionState::InTransaction;
        Ok(())
    }

    /// Deassert chip select, ending the transaction
    pub fn stop(&mut self) -> Result<()> {
        self.require(SessionState::InTransaction)?;
        self.port_mut()?.deassert_select()?;
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Clock out `data` verbatim
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.require(SessionState::InTransaction)?;
        self.trace_write(data);
        self.port_mut()?.write(data)
    }

    fn trace_write(&mut self, data: &[u8]) {
        let report = match self.write_trace {
            WriteTrace::Off => false,
            WriteTrace::First => !self.first_write_reported,
            WriteTrace::Every => true,
        };
        if !report {
            return;
        }
        self.first_write_reported = true;

        let shown = &data[..data.len().min(TRACE_LIMIT)];
        let ellipsis = if shown.len() < data.len() { " ..." } else { "" };
        log::debug!(
            "Writing {} bytes: {}{}",
            data.len(),
            HexBytes(shown),
            ellipsis
        );
    }

    /// Clock in exactly `count` bytes
    pub fn read(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    /// Clock in exactly `buf.len()` bytes into `buf`
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.require(SessionState::InTransaction)?;
        self.port_mut()?.read(buf)
    }

    /// Run `f` inside one Start/Stop bracket
    ///
    /// Stop is attempted even when `f` fails; the error from `f` wins.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.start()?;
        let result = f(self);
        let stopped = self.stop();
        let value = result?;
        stopped?;
        Ok(value)
    }

    /// End any open transaction and release the adapter
    ///
    /// Calling this on a closed session is a no-op. If deasserting chip
    /// select fails the port is still released and the first error is
    /// returned.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut port) = self.port.take() else {
            return Ok(());
        };

        let mut result = Ok(());
        if self.state == SessionState::InTransaction {
            if let Err(e) = port.deassert_select() {
                log::warn!("Failed to deassert chip select on close: {}", e);
                result = Err(e);
            }
        }
        self.state = SessionState::Closed;

        log::debug!("Closing adapter: {}", self.description);
        let closed = port.close();
        result.and(closed)
    }
}

impl<P: AdapterPort> Drop for BusSession<P> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close session on drop: {}", e);
        }
    }
}

impl<P: AdapterPort> core::fmt::Debug for BusSession<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BusSession")
            .field("description", &self.description)
            .field("mode", &self.mode)
            .field("clock_hz", &self.clock_hz)
            .field("state", &self.state)
            .finish()
    }
}
