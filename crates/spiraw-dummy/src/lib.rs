//! spiraw-dummy - In-memory loop-back adapter
//!
//! This crate provides an adapter that behaves like an SPI bus with MOSI
//! wired to MISO: every byte written inside a transaction is returned by
//! the following reads, after an optional number of idle bytes that model
//! the pipeline latency of real adapters. It's useful for testing and for
//! dry runs of the CLI without hardware.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use spiraw_core::adapter::{AdapterPort, AuxPin, OpenParams, SpiAdapter};
use spiraw_core::error::{Error, Result};

/// Highest clock the loop-back pretends to support
pub const MAX_CLOCK_HZ: u32 = 30_000_000;

/// Configuration for the loop-back adapter
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Idle bytes returned before the echo starts
    pub latency: usize,
    /// Value returned when nothing is pending
    pub idle: u8,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            latency: 0,
            idle: 0xFF,
        }
    }
}

impl LoopbackConfig {
    /// Parse `latency=<bytes>` and `idle=<byte>` options
    pub fn from_options(options: &[(&str, &str)]) -> core::result::Result<Self, String> {
        let mut config = Self::default();

        for (key, value) in options {
            match *key {
                "latency" => {
                    config.latency = value
                        .parse()
                        .map_err(|_| format!("Invalid latency '{}'", value))?;
                }
                "idle" => {
                    config.idle = parse_byte(value)
                        .ok_or_else(|| format!("Invalid idle byte '{}'", value))?;
                }
                _ => {
                    log::warn!("Unknown dummy option: {}={}", key, value);
                }
            }
        }

        Ok(config)
    }
}

fn parse_byte(s: &str) -> Option<u8> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Counters shared between an adapter and the port it opens
#[derive(Debug, Default)]
pub struct LoopbackStats {
    opens: AtomicUsize,
    closes: AtomicUsize,
    transactions: AtomicUsize,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
}

impl LoopbackStats {
    /// Times the adapter was opened
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Times the port was closed
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Chip-select assertions
    pub fn transactions(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }

    /// Bytes clocked out
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::SeqCst)
    }

    /// Bytes clocked in
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::SeqCst)
    }
}

/// Un-opened loop-back adapter
#[derive(Debug, Default)]
pub struct Loopback {
    config: LoopbackConfig,
    stats: Arc<LoopbackStats>,
}

impl Loopback {
    /// Create a loop-back adapter with the given configuration
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            stats: Arc::default(),
        }
    }

    /// Create a loop-back adapter with no latency
    pub fn new_default() -> Self {
        Self::new(LoopbackConfig::default())
    }

    /// Counters that stay readable after the adapter is consumed
    pub fn stats(&self) -> Arc<LoopbackStats> {
        Arc::clone(&self.stats)
    }
}

impl SpiAdapter for Loopback {
    type Port = LoopbackPort;

    fn open(self, params: &OpenParams) -> Result<LoopbackPort> {
        if params.clock_hz == 0 {
            return Err(Error::AdapterConfigFailed);
        }

        let clock_hz = params.clock_hz.min(MAX_CLOCK_HZ);
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        log::info!(
            "Opened loop-back adapter ({}, {} Hz, latency {} bytes)",
            params.mode,
            clock_hz,
            self.config.latency
        );

        Ok(LoopbackPort {
            description: format!("Loop-back adapter ({})", params.mode),
            config: self.config,
            stats: self.stats,
            clock_hz,
            selected: false,
            wp_high: false,
            hold_high: false,
            pending: VecDeque::new(),
        })
    }
}

/// Opened loop-back port
#[derive(Debug)]
pub struct LoopbackPort {
    description: String,
    config: LoopbackConfig,
    stats: Arc<LoopbackStats>,
    clock_hz: u32,
    selected: bool,
    wp_high: bool,
    hold_high: bool,
    pending: VecDeque<u8>,
}

impl LoopbackPort {
    /// Whether chip select is currently asserted
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Current level of an auxiliary pin (true = high)
    pub fn pin_level(&self, pin: AuxPin) -> bool {
        match pin {
            AuxPin::WriteProtect => self.wp_high,
            AuxPin::Hold => self.hold_high,
        }
    }

    fn set_pin(&mut self, pin: AuxPin, high: bool) {
        match pin {
            AuxPin::WriteProtect => self.wp_high = high,
            AuxPin::Hold => self.hold_high = high,
        }
    }
}

impl AdapterPort for LoopbackPort {
    fn description(&self) -> &str {
        &self.description
    }

    fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    fn pin_high(&mut self, pin: AuxPin) -> Result<()> {
        self.set_pin(pin, true);
        Ok(())
    }

    fn pin_low(&mut self, pin: AuxPin) -> Result<()> {
        self.set_pin(pin, false);
        Ok(())
    }

    fn assert_select(&mut self) -> Result<()> {
        self.selected = true;
        self.pending.clear();
        self.pending
            .extend(core::iter::repeat(self.config.idle).take(self.config.latency));
        self.stats.transactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn deassert_select(&mut self) -> Result<()> {
        self.selected = false;
        self.pending.clear();
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        // Without chip select the target ignores the bus
        if self.selected {
            self.pending.extend(data.iter().copied());
        }
        self.stats
            .bytes_written
            .fetch_add(data.len() as u64, Ordering::SeqCst);
        log::trace!("Loop-back wrote {} bytes", data.len());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        for byte in buf.iter_mut() {
            *byte = self.pending.pop_front().unwrap_or(self.config.idle);
        }
        self.stats
            .bytes_read
            .fetch_add(buf.len() as u64, Ordering::SeqCst);
        log::trace!("Loop-back read {} bytes", buf.len());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        log::debug!("Closed loop-back adapter");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use spiraw_core::adapter::{Boxed, BoxedPort, DEFAULT_CLOCK_HZ};
    use spiraw_core::session::BusSession;
    use spiraw_core::selftest;

    #[test]
    fn test_open_at_default_clock() {
        let adapter = Loopback::new_default();
        let stats = adapter.stats();
        let session = BusSession::open(adapter, 0, 0).unwrap();
        assert_eq!(session.clock_hz(), DEFAULT_CLOCK_HZ);
        assert!(!session.description().is_empty());
        assert_eq!(stats.opens(), 1);
    }

    #[test]
    fn test_clock_is_capped() {
        let session = BusSession::open(Loopback::new_default(), 100_000_000, 1).unwrap();
        assert_eq!(session.clock_hz(), MAX_CLOCK_HZ);
    }

    #[test]
    fn test_echo_within_transaction() {
        let mut session = BusSession::open(Loopback::new_default(), 0, 0).unwrap();
        session.start().unwrap();
        session.write(&[1, 2, 3]).unwrap();
        assert_eq!(session.read(5).unwrap(), [1, 2, 3, 0xFF, 0xFF]);
        session.stop().unwrap();

        // Nothing carries over into the next transaction
        session.start().unwrap();
        assert_eq!(session.read(2).unwrap(), [0xFF, 0xFF]);
        session.stop().unwrap();
    }

    #[test]
    fn test_latency_and_idle_byte() {
        let config = LoopbackConfig {
            latency: 2,
            idle: 0x00,
        };
        let mut session = BusSession::open(Loopback::new(config), 0, 0).unwrap();
        session.start().unwrap();
        session.write(&[0xAB]).unwrap();
        assert_eq!(session.read(4).unwrap(), [0x00, 0x00, 0xAB, 0x00]);
        session.stop().unwrap();
    }

    #[test]
    fn test_selftest_passes_with_latency() {
        let config = LoopbackConfig {
            latency: 8,
            ..LoopbackConfig::default()
        };
        let mut session = BusSession::open(Loopback::new(config), 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(1234);
        let report = selftest::run(&mut session, 20, &mut rng).unwrap();
        assert_eq!(report.passed(), 20);
        assert_eq!(report.mismatches().count(), 0);
    }

    #[test]
    fn test_boxed_session_closes_once() {
        let adapter = Loopback::new_default();
        let stats = adapter.stats();
        let mut session: BusSession<BoxedPort> = BusSession::open(Boxed(adapter), 0, 2).unwrap();
        session.start().unwrap();
        session.write(b"hello").unwrap();
        session.close().unwrap();
        session.close().unwrap();
        drop(session);
        assert_eq!(stats.closes(), 1);
        assert_eq!(stats.bytes_written(), 5);
        assert_eq!(stats.transactions(), 1);
    }

    #[test]
    fn test_aux_pins_driven_high() {
        let adapter = Loopback::new_default();
        let params = OpenParams {
            mode: spiraw_core::adapter::SpiMode::Mode0,
            clock_hz: 1_000_000,
            bit_order: spiraw_core::adapter::BitOrder::MsbFirst,
        };
        let mut port = adapter.open(&params).unwrap();
        assert!(!port.pin_level(AuxPin::WriteProtect));
        port.pin_high(AuxPin::WriteProtect).unwrap();
        port.pin_high(AuxPin::Hold).unwrap();
        assert!(port.pin_level(AuxPin::WriteProtect));
        assert!(port.pin_level(AuxPin::Hold));
        port.pin_low(AuxPin::Hold).unwrap();
        assert!(!port.pin_level(AuxPin::Hold));
    }

    #[test]
    fn test_echo_only_while_selected() {
        let adapter = Loopback::new_default();
        let params = OpenParams {
            mode: spiraw_core::adapter::SpiMode::Mode0,
            clock_hz: 1_000_000,
            bit_order: spiraw_core::adapter::BitOrder::MsbFirst,
        };
        let mut port = adapter.open(&params).unwrap();
        assert!(!port.is_selected());

        port.write(&[1, 2]).unwrap();
        port.assert_select().unwrap();
        assert!(port.is_selected());
        port.write(&[3, 4]).unwrap();
        let mut buf = [0u8; 3];
        port.read(&mut buf).unwrap();
        assert_eq!(buf, [3, 4, 0xFF]);

        port.deassert_select().unwrap();
        assert!(!port.is_selected());
    }

    #[test]
    fn test_parse_options() {
        let config = LoopbackConfig::from_options(&[("latency", "12"), ("idle", "0x5a")]).unwrap();
        assert_eq!(config.latency, 12);
        assert_eq!(config.idle, 0x5A);
        assert!(LoopbackConfig::from_options(&[("latency", "many")]).is_err());
        assert!(LoopbackConfig::from_options(&[("idle", "256")]).is_err());
    }
}
