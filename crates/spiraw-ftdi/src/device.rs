//! FTDI MPSSE device handling using libftdi1

use std::io::{Read, Write};
use std::time::Duration;

use ftdi::{find_by_vid_pid, BitMode, Interface};
use spiraw_core::adapter::{AdapterPort, AuxPin, BitOrder, OpenParams, SpiAdapter, SpiMode};
use spiraw_core::Error as CoreError;

use crate::error::{FtdiError, Result};
use crate::protocol::*;

/// Polls of an empty receive buffer before a read is declared stalled
const MAX_IDLE_POLLS: u32 = 10_000;

/// Configuration for an FTDI adapter
#[derive(Debug, Clone)]
pub struct FtdiConfig {
    /// Device type
    pub device_type: FtdiDeviceType,
    /// Channel/interface
    pub interface: FtdiInterface,
    /// GPIOL line wired to the flash WP# pin
    pub wp: LowPins,
    /// GPIOL line wired to the flash HOLD# pin
    pub hold: LowPins,
}

impl Default for FtdiConfig {
    fn default() -> Self {
        Self::for_device(FtdiDeviceType::default())
    }
}

impl FtdiConfig {
    /// Create a configuration for a specific device type
    ///
    /// WP and HOLD take the first two GPIOL lines the board leaves free.
    pub fn for_device(device_type: FtdiDeviceType) -> Self {
        let mut free = device_type.free_gpiols();
        let wp = free.next().unwrap_or(LowPins::GPIOL0);
        let hold = free.next().unwrap_or(LowPins::GPIOL1);
        Self {
            device_type,
            interface: FtdiInterface::A,
            wp,
            hold,
        }
    }

    /// Set the interface/channel
    pub fn interface(mut self, interface: FtdiInterface) -> Result<Self> {
        if interface.index() >= self.device_type.channel_count() {
            return Err(FtdiError::InvalidChannel(format!(
                "{} only has {} channel(s)",
                self.device_type.name(),
                self.device_type.channel_count()
            )));
        }
        self.interface = interface;
        Ok(self)
    }

    fn aux_mask(&self, pin: AuxPin) -> LowPins {
        match pin {
            AuxPin::WriteProtect => self.wp,
            AuxPin::Hold => self.hold,
        }
    }

    /// Check the auxiliary pin assignment against the board wiring
    fn validate(&self) -> Result<()> {
        if self.wp == self.hold {
            return Err(FtdiError::InvalidParameter(
                "WP and HOLD must use different GPIOL lines".to_string(),
            ));
        }
        let reserved = self.device_type.default_pindir() & LowPins::GPIOL;
        for pin in [self.wp, self.hold] {
            if reserved.intersects(pin) {
                return Err(FtdiError::InvalidParameter(format!(
                    "{:?} is reserved on {}",
                    pin,
                    self.device_type.name()
                )));
            }
        }
        Ok(())
    }
}

/// Low-byte pin levels and directions
///
/// Every change is pushed to the adapter as one SET_BITS_LOW command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PinState {
    value: LowPins,
    dir: LowPins,
    cs_bits: LowPins,
}

impl PinState {
    /// Idle state: chip select deasserted, clock at its idle level
    fn idle(config: &FtdiConfig, mode: SpiMode) -> Self {
        let cs_bits = config.device_type.default_cs_bits();
        Self {
            value: cs_bits | idle_clock(mode),
            dir: config.device_type.default_pindir(),
            cs_bits,
        }
    }

    fn drive(&mut self, mask: LowPins, high: bool) {
        self.dir |= mask;
        self.value.set(mask, high);
    }

    fn select(&mut self, asserted: bool) {
        self.value.set(self.cs_bits, !asserted);
    }

    fn command(&self) -> [u8; 3] {
        [SET_BITS_LOW, self.value.bits(), self.dir.bits()]
    }
}

/// An un-opened FTDI adapter
#[derive(Debug, Clone, Default)]
pub struct FtdiAdapter {
    config: FtdiConfig,
}

impl FtdiAdapter {
    /// Create an adapter from a configuration
    pub fn new(config: FtdiConfig) -> Self {
        Self { config }
    }

    /// The configuration this adapter will open with
    pub fn config(&self) -> &FtdiConfig {
        &self.config
    }
}

impl SpiAdapter for FtdiAdapter {
    type Port = FtdiPort;

    fn open(self, params: &OpenParams) -> spiraw_core::Result<FtdiPort> {
        FtdiPort::open(self.config, params)
    }
}

/// An opened FTDI MPSSE channel
pub struct FtdiPort {
    device: Option<ftdi::Device>,
    config: FtdiConfig,
    pins: PinState,
    opcodes: TransferOpcodes,
    clock_hz: u32,
    description: String,
}

impl FtdiPort {
    fn open(config: FtdiConfig, params: &OpenParams) -> spiraw_core::Result<Self> {
        config
            .validate()
            .map_err(|e| e.into_core(CoreError::AdapterConfigFailed))?;

        log::info!(
            "Opening FTDI {} channel {}",
            config.device_type.name(),
            config.interface.letter()
        );

        let device = Self::open_device(&config)
            .map_err(|e| e.into_core(CoreError::AdapterOpenFailed))?;

        let divisor = divisor_for(params.clock_hz);
        let mut port = FtdiPort {
            device: Some(device),
            pins: PinState::idle(&config, params.mode),
            opcodes: transfer_opcodes(params.mode, params.bit_order),
            clock_hz: clock_for_divisor(divisor),
            description: format!(
                "FTDI {} channel {}",
                config.device_type.name(),
                config.interface.letter()
            ),
            config,
        };

        // Dropping `port` on failure releases the pins and closes the device
        port.init_mpsse(divisor)
            .map_err(|e| e.into_core(CoreError::AdapterConfigFailed))?;

        log::info!(
            "FTDI configured for {} at {} Hz ({})",
            params.mode,
            port.clock_hz,
            match params.bit_order {
                BitOrder::MsbFirst => "MSB first",
                BitOrder::LsbFirst => "LSB first",
            }
        );

        Ok(port)
    }

    fn open_device(config: &FtdiConfig) -> Result<ftdi::Device> {
        let interface = match config.interface {
            FtdiInterface::A => Interface::A,
            FtdiInterface::B => Interface::B,
            FtdiInterface::C => Interface::C,
            FtdiInterface::D => Interface::D,
        };

        let vid = config.device_type.vendor_id();
        let pid = config.device_type.product_id();

        log::debug!("Looking for FTDI device VID={:04X} PID={:04X}", vid, pid);

        let mut device = find_by_vid_pid(vid, pid)
            .interface(interface)
            .open()
            .map_err(|e| FtdiError::OpenFailed(e.to_string()))?;

        device
            .usb_reset()
            .map_err(|e| FtdiError::ConfigFailed(format!("USB reset failed: {}", e)))?;

        // 2ms latency keeps small reads responsive
        device
            .set_latency_timer(2)
            .map_err(|e| FtdiError::ConfigFailed(format!("Set latency timer failed: {}", e)))?;

        device
            .set_bitmode(0x00, BitMode::Mpsse)
            .map_err(|e| FtdiError::ConfigFailed(format!("Set MPSSE mode failed: {}", e)))?;

        Ok(device)
    }

    /// Program clocking, loopback and the idle pin state
    fn init_mpsse(&mut self, divisor: u16) -> Result<()> {
        let mut buf = Vec::with_capacity(16);

        buf.push(DIS_DIV_5);
        buf.push(CLK_NO_ADAPTIVE);
        buf.push(DIS_3_PHASE);

        log::debug!(
            "Setting clock divisor to {} (SPI clock: {} Hz)",
            divisor,
            self.clock_hz
        );
        buf.push(TCK_DIVISOR);
        buf.extend_from_slice(&divisor.to_le_bytes());

        buf.push(LOOPBACK_END);

        log::debug!(
            "Setting data bits: value=0x{:02X} pindir=0x{:02X}",
            self.pins.value.bits(),
            self.pins.dir.bits()
        );
        buf.extend_from_slice(&self.pins.command());

        self.send(&buf)
    }

    fn device(&mut self) -> Result<&mut ftdi::Device> {
        self.device.as_mut().ok_or(FtdiError::Closed)
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.device()?
            .write_all(data)
            .map_err(|e| FtdiError::TransferFailed(format!("Write failed: {}", e)))?;
        log::trace!("Sent {} bytes", data.len());
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<()> {
        let device = self.device()?;
        let mut total = 0;
        let mut idle_polls = 0;

        while total < buf.len() {
            match device.read(&mut buf[total..]) {
                Ok(0) => {
                    idle_polls += 1;
                    if idle_polls > MAX_IDLE_POLLS {
                        return Err(FtdiError::TransferFailed(format!(
                            "Read stalled after {} of {} bytes",
                            total,
                            buf.len()
                        )));
                    }
                    std::thread::sleep(Duration::from_micros(100));
                }
                Ok(n) => {
                    total += n;
                    idle_polls = 0;
                }
                Err(e) => {
                    return Err(FtdiError::TransferFailed(format!("Read failed: {}", e)));
                }
            }
        }

        log::trace!("Received {} bytes", total);
        Ok(())
    }

    fn update_pins(&mut self) -> spiraw_core::Result<()> {
        let cmd = self.pins.command();
        self.send(&cmd)
            .map_err(|e| e.into_core(CoreError::PinControlFailed))
    }

    /// Release I/O pins (set all as inputs)
    fn release_pins(&mut self) -> Result<()> {
        self.send(&[SET_BITS_LOW, 0x00, 0x00])
    }
}

impl AdapterPort for FtdiPort {
    fn description(&self) -> &str {
        &self.description
    }

    fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    fn pin_high(&mut self, pin: AuxPin) -> spiraw_core::Result<()> {
        let mask = self.config.aux_mask(pin);
        self.pins.drive(mask, true);
        self.update_pins()
    }

    fn pin_low(&mut self, pin: AuxPin) -> spiraw_core::Result<()> {
        let mask = self.config.aux_mask(pin);
        self.pins.drive(mask, false);
        self.update_pins()
    }

    fn assert_select(&mut self) -> spiraw_core::Result<()> {
        self.pins.select(true);
        self.update_pins()
    }

    fn deassert_select(&mut self) -> spiraw_core::Result<()> {
        self.pins.select(false);
        self.update_pins()
    }

    fn write(&mut self, data: &[u8]) -> spiraw_core::Result<()> {
        let mut buf = Vec::with_capacity(FTDI_HW_BUFFER_SIZE);
        for chunk in data.chunks(MAX_TRANSFER) {
            buf.clear();
            buf.push(self.opcodes.write);
            buf.extend_from_slice(&encode_len(chunk.len()));
            buf.extend_from_slice(chunk);
            self.send(&buf)
                .map_err(|e| e.into_core(CoreError::TransferFailed))?;
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> spiraw_core::Result<()> {
        for chunk in buf.chunks_mut(MAX_TRANSFER) {
            let len = encode_len(chunk.len());
            let cmd = [self.opcodes.read, len[0], len[1], SEND_IMMEDIATE];
            self.send(&cmd)
                .and_then(|()| self.recv(chunk))
                .map_err(|e| e.into_core(CoreError::TransferFailed))?;
        }
        Ok(())
    }

    fn close(&mut self) -> spiraw_core::Result<()> {
        if self.device.is_none() {
            return Ok(());
        }
        let released = self.release_pins();
        // Dropping the handle closes the USB device
        self.device = None;
        log::debug!("Closed {}", self.description);
        released.map_err(|e| e.into_core(CoreError::CloseFailed))
    }
}

impl Drop for FtdiPort {
    fn drop(&mut self) {
        if self.device.is_some() {
            if let Err(e) = self.release_pins() {
                log::warn!("Failed to release FTDI pins: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for FtdiPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtdiPort")
            .field("description", &self.description)
            .field("clock_hz", &self.clock_hz)
            .field("open", &self.device.is_some())
            .finish()
    }
}

/// Information about a connected FTDI device
#[derive(Debug, Clone)]
pub struct FtdiDeviceInfo {
    /// USB bus number
    pub bus: u8,
    /// USB device address
    pub address: u8,
    /// Vendor ID
    pub vendor_id: u16,
    /// Product ID
    pub product_id: u16,
    /// Vendor name
    pub vendor_name: &'static str,
    /// Device name
    pub device_name: &'static str,
}

impl std::fmt::Display for FtdiDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({:04X}:{:04X}) at bus {} address {}",
            self.vendor_name,
            self.device_name,
            self.vendor_id,
            self.product_id,
            self.bus,
            self.address
        )
    }
}

/// List connected FTDI devices the backend knows how to drive
pub fn list_devices() -> Result<Vec<FtdiDeviceInfo>> {
    let mut devices = Vec::new();

    for dev in nusb::list_devices()? {
        let vid = dev.vendor_id();
        let pid = dev.product_id();

        if let Some(info) = get_device_info(vid, pid) {
            devices.push(FtdiDeviceInfo {
                bus: dev.bus_number(),
                address: dev.device_address(),
                vendor_id: vid,
                product_id: pid,
                vendor_name: info.vendor_name,
                device_name: info.device_name,
            });
        }
    }

    Ok(devices)
}

/// Parse adapter options into an FTDI configuration
///
/// Recognized keys: `type`, `port` (alias `channel`), `wp`, `hold`.
pub fn parse_options(options: &[(&str, &str)]) -> Result<FtdiConfig> {
    let mut config = FtdiConfig::default();
    let mut interface = None;
    let mut wp = None;
    let mut hold = None;

    for (key, value) in options {
        match *key {
            "type" => {
                let device_type = FtdiDeviceType::parse(value).ok_or_else(|| {
                    FtdiError::InvalidDeviceType(format!(
                        "Unknown device type '{}'. Valid types: 2232h, 4232h, 232h, c232hm, \
                         4233h, tumpa, jtagkey, busblaster",
                        value
                    ))
                })?;
                config = FtdiConfig::for_device(device_type);
            }
            "port" | "channel" => {
                let mut chars = value.chars();
                let letter = match (chars.next(), chars.next()) {
                    (Some(c), None) => FtdiInterface::from_char(c),
                    _ => None,
                };
                interface = Some(letter.ok_or_else(|| {
                    FtdiError::InvalidChannel(format!(
                        "Invalid channel '{}': must be A, B, C, or D",
                        value
                    ))
                })?);
            }
            "wp" | "hold" => {
                let pin = LowPins::parse_gpiol(value).ok_or_else(|| {
                    FtdiError::InvalidParameter(format!(
                        "Invalid {} pin '{}': must be gpiol0-gpiol3",
                        key, value
                    ))
                })?;
                if *key == "wp" {
                    wp = Some(pin);
                } else {
                    hold = Some(pin);
                }
            }
            _ => {
                log::warn!("Unknown FTDI option: {}={}", key, value);
            }
        }
    }

    // Applied after `type` so option order does not matter
    if let Some(interface) = interface {
        config = config.interface(interface)?;
    }
    if let Some(wp) = wp {
        config.wp = wp;
    }
    if let Some(hold) = hold {
        config.hold = hold;
    }
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FtdiConfig::default();
        assert_eq!(config.device_type, FtdiDeviceType::Ft232H);
        assert_eq!(config.interface, FtdiInterface::A);
        assert_eq!(config.wp, LowPins::GPIOL0);
        assert_eq!(config.hold, LowPins::GPIOL1);
    }

    #[test]
    fn test_parse_options() {
        let config =
            parse_options(&[("port", "b"), ("type", "2232h"), ("hold", "gpiol3")]).unwrap();
        assert_eq!(config.device_type, FtdiDeviceType::Ft2232H);
        assert_eq!(config.interface, FtdiInterface::B);
        assert_eq!(config.wp, LowPins::GPIOL0);
        assert_eq!(config.hold, LowPins::GPIOL3);
    }

    #[test]
    fn test_parse_options_rejects_bad_values() {
        assert!(matches!(
            parse_options(&[("type", "ft9000")]),
            Err(FtdiError::InvalidDeviceType(_))
        ));
        assert!(matches!(
            parse_options(&[("port", "B")]),
            Err(FtdiError::InvalidChannel(_))
        ));
        assert!(matches!(
            parse_options(&[("port", "AB")]),
            Err(FtdiError::InvalidChannel(_))
        ));
        assert!(matches!(
            parse_options(&[("wp", "gpiol1")]),
            Err(FtdiError::InvalidParameter(_))
        ));
        assert!(matches!(
            parse_options(&[("type", "jtagkey"), ("wp", "gpiol0")]),
            Err(FtdiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_adapter_keeps_parsed_config() {
        let config = parse_options(&[("type", "4232h"), ("port", "D")]).unwrap();
        let adapter = FtdiAdapter::new(config);
        assert_eq!(adapter.config().device_type, FtdiDeviceType::Ft4232H);
        assert_eq!(adapter.config().interface, FtdiInterface::D);
        assert_eq!(FtdiAdapter::default().config().interface, FtdiInterface::A);
    }

    #[test]
    fn test_jtagkey_aux_pins_avoid_output_enable() {
        let config = FtdiConfig::for_device(FtdiDeviceType::JtagKey);
        assert_eq!(config.wp, LowPins::GPIOL1);
        assert_eq!(config.hold, LowPins::GPIOL2);
    }

    #[test]
    fn test_pin_state_idle_levels() {
        let config = FtdiConfig::default();
        let mode0 = PinState::idle(&config, SpiMode::Mode0);
        assert_eq!(mode0.command(), [SET_BITS_LOW, 0x08, 0x0B]);

        let mode3 = PinState::idle(&config, SpiMode::Mode3);
        assert_eq!(mode3.command(), [SET_BITS_LOW, 0x09, 0x0B]);
    }

    #[test]
    fn test_pin_state_select_and_aux() {
        let config = FtdiConfig::default();
        let mut pins = PinState::idle(&config, SpiMode::Mode0);

        pins.drive(config.aux_mask(AuxPin::WriteProtect), true);
        pins.drive(config.aux_mask(AuxPin::Hold), true);
        assert_eq!(pins.command(), [SET_BITS_LOW, 0x38, 0x3B]);

        pins.select(true);
        assert_eq!(pins.command(), [SET_BITS_LOW, 0x30, 0x3B]);

        pins.drive(config.aux_mask(AuxPin::Hold), false);
        pins.select(false);
        assert_eq!(pins.command(), [SET_BITS_LOW, 0x18, 0x3B]);
    }

    #[test]
    fn test_jtagkey_select_toggles_output_enable() {
        let config = FtdiConfig::for_device(FtdiDeviceType::JtagKey);
        let mut pins = PinState::idle(&config, SpiMode::Mode0);
        assert_eq!(pins.value, LowPins::CS | LowPins::GPIOL0);
        pins.select(true);
        assert_eq!(pins.value, LowPins::empty());
    }
}
