//! Adapter trait definitions
//!
//! An adapter is split in two halves:
//! - [`SpiAdapter`] is the un-opened engine. `open` consumes it, so an
//!   adapter value can be opened at most once.
//! - [`AdapterPort`] is the opened handle. It is owned by exactly one bus
//!   session and released through [`AdapterPort::close`].

use alloc::boxed::Box;
use core::fmt;

use crate::error::{Error, Result};

/// Clock rate used when the caller does not request one (15 MHz)
///
/// This is the maximum rated frequency of the supported adapters.
pub const DEFAULT_CLOCK_HZ: u32 = 15_000_000;

/// SPI clock polarity and phase mode
///
/// | Mode | CPOL | CPHA | Description |
/// |------|------|------|-------------|
/// | 0    | 0    | 0    | Clock idle low, sample on rising edge |
/// | 1    | 0    | 1    | Clock idle low, sample on falling edge |
/// | 2    | 1    | 0    | Clock idle high, sample on falling edge |
/// | 3    | 1    | 1    | Clock idle high, sample on rising edge |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// CPOL=0, CPHA=1
    Mode1,
    /// CPOL=1, CPHA=0
    Mode2,
    /// CPOL=1, CPHA=1
    Mode3,
}

impl SpiMode {
    /// All modes, in numeric order
    pub const ALL: [SpiMode; 4] = [Self::Mode0, Self::Mode1, Self::Mode2, Self::Mode3];

    /// Clock polarity: true = idle high
    pub fn cpol(self) -> bool {
        matches!(self, Self::Mode2 | Self::Mode3)
    }

    /// Clock phase: true = sample on second edge
    pub fn cpha(self) -> bool {
        matches!(self, Self::Mode1 | Self::Mode3)
    }

    /// Numeric mode (0-3)
    pub fn number(self) -> u8 {
        match self {
            Self::Mode0 => 0,
            Self::Mode1 => 1,
            Self::Mode2 => 2,
            Self::Mode3 => 3,
        }
    }
}

impl TryFrom<u8> for SpiMode {
    type Error = Error;

    fn try_from(mode: u8) -> Result<Self> {
        match mode {
            0 => Ok(Self::Mode0),
            1 => Ok(Self::Mode1),
            2 => Ok(Self::Mode2),
            3 => Ok(Self::Mode3),
            other => Err(Error::InvalidMode(other)),
        }
    }
}

impl fmt::Display for SpiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SPI mode {}", self.number())
    }
}

/// Order in which bits are shifted onto the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    /// Most significant bit first (standard SPI)
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// Auxiliary flash control lines driven by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxPin {
    /// Write-protect (WP#), active low
    WriteProtect,
    /// Hold (HOLD#), active low
    Hold,
}

impl AuxPin {
    /// Both auxiliary pins
    pub const ALL: [AuxPin; 2] = [Self::WriteProtect, Self::Hold];

    /// Short signal name
    pub fn name(self) -> &'static str {
        match self {
            Self::WriteProtect => "WP",
            Self::Hold => "HOLD",
        }
    }
}

/// Parameters passed to [`SpiAdapter::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenParams {
    /// Bus mode
    pub mode: SpiMode,
    /// Requested clock in Hz (the adapter may negotiate a different one)
    pub clock_hz: u32,
    /// Bit order
    pub bit_order: BitOrder,
}

/// An un-opened synchronous-serial engine
///
/// Opening consumes the adapter, so a port can only be obtained once per
/// adapter value.
pub trait SpiAdapter {
    /// Handle type produced by a successful open
    type Port: AdapterPort;

    /// Open the engine in SPI master mode
    ///
    /// Failures are reported as adapter-class errors and are not retried.
    fn open(self, params: &OpenParams) -> Result<Self::Port>;
}

/// An opened adapter handle
///
/// All calls block until complete. Chip select is active low; asserting
/// it starts an SPI transaction.
pub trait AdapterPort {
    /// Human-readable description of the adapter
    fn description(&self) -> &str;

    /// Clock actually negotiated with the hardware, in Hz
    fn clock_hz(&self) -> u32;

    /// Drive an auxiliary pin high
    fn pin_high(&mut self, pin: AuxPin) -> Result<()>;

    /// Drive an auxiliary pin low
    fn pin_low(&mut self, pin: AuxPin) -> Result<()>;

    /// Assert chip select (drive CS low)
    fn assert_select(&mut self) -> Result<()>;

    /// Deassert chip select (drive CS high)
    fn deassert_select(&mut self) -> Result<()>;

    /// Clock out `data` verbatim
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Clock in exactly `buf.len()` bytes while holding the output line idle
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Release the hardware
    ///
    /// Callers must not use the port afterwards.
    fn close(&mut self) -> Result<()>;
}

/// Type-erased port, for callers that pick an adapter at runtime
pub type BoxedPort = Box<dyn AdapterPort>;

impl AdapterPort for BoxedPort {
    fn description(&self) -> &str {
        (**self).description()
    }

    fn clock_hz(&self) -> u32 {
        (**self).clock_hz()
    }

    fn pin_high(&mut self, pin: AuxPin) -> Result<()> {
        (**self).pin_high(pin)
    }

    fn pin_low(&mut self, pin: AuxPin) -> Result<()> {
        (**self).pin_low(pin)
    }

    fn assert_select(&mut self) -> Result<()> {
        (**self).assert_select()
    }

    fn deassert_select(&mut self) -> Result<()> {
        (**self).deassert_select()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Adapter wrapper whose port is a [`BoxedPort`]
///
/// Lets code that selects a backend by name produce a single session type:
///
/// ```ignore
/// let session: BusSession<BoxedPort> = BusSession::open(Boxed(adapter), 0, 0)?;
/// ```
#[derive(Debug)]
pub struct Boxed<A>(pub A);

impl<A> SpiAdapter for Boxed<A>
where
    A: SpiAdapter,
    A::Port: 'static,
{
    type Port = BoxedPort;

    fn open(self, params: &OpenParams) -> Result<BoxedPort> {
        let port = self.0.open(params)?;
        Ok(Box::new(port))
    }
}

/// Information about an adapter backend
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// Name of the adapter
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Description
    pub description: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_number() {
        for (n, mode) in SpiMode::ALL.iter().enumerate() {
            assert_eq!(SpiMode::try_from(n as u8), Ok(*mode));
            assert_eq!(mode.number(), n as u8);
        }
        assert_eq!(SpiMode::try_from(4), Err(Error::InvalidMode(4)));
        assert_eq!(SpiMode::try_from(255), Err(Error::InvalidMode(255)));
    }

    #[test]
    fn test_modes_are_distinct() {
        let pairs: alloc::vec::Vec<(bool, bool)> =
            SpiMode::ALL.iter().map(|m| (m.cpol(), m.cpha())).collect();
        for (i, a) in pairs.iter().enumerate() {
            for b in &pairs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
