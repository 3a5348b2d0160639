//! FTDI MPSSE protocol constants and pure helpers
//!
//! Opcode values follow FTDI application note AN_108.

use bitflags::bitflags;
use spiraw_core::adapter::{BitOrder, SpiMode};

// ============================================================================
// USB VID/PID constants
// ============================================================================

/// FTDI vendor ID
pub const FTDI_VID: u16 = 0x0403;

/// FT2232H product ID (dual channel)
pub const FTDI_FT2232H_PID: u16 = 0x6010;

/// FT4232H product ID (quad channel)
pub const FTDI_FT4232H_PID: u16 = 0x6011;

/// FT232H product ID (single channel, also used by the C232HM cable)
pub const FTDI_FT232H_PID: u16 = 0x6014;

/// FT4233H product ID (quad channel)
pub const FTDI_FT4233H_PID: u16 = 0x6041;

/// TIAO TUMPA product ID
pub const TIAO_TUMPA_PID: u16 = 0x8A98;

/// Amontec JTAGkey product ID
pub const AMONTEC_JTAGKEY_PID: u16 = 0xCFF8;

// ============================================================================
// MPSSE commands
// ============================================================================

/// Clock bytes out
pub const MPSSE_DO_WRITE: u8 = 0x10;

/// Clock bytes in
pub const MPSSE_DO_READ: u8 = 0x20;

/// Shift data out on the falling clock edge
pub const MPSSE_WRITE_NEG: u8 = 0x01;

/// Sample data in on the falling clock edge
pub const MPSSE_READ_NEG: u8 = 0x04;

/// LSB first
pub const MPSSE_LSB: u8 = 0x08;

/// Set data bits low byte (value, direction)
pub const SET_BITS_LOW: u8 = 0x80;

/// Disable internal TDI/TDO loopback
pub const LOOPBACK_END: u8 = 0x85;

/// Set clock divisor
pub const TCK_DIVISOR: u8 = 0x86;

/// Flush the read buffer back to the host
pub const SEND_IMMEDIATE: u8 = 0x87;

/// Disable divide-by-5 prescaler (60 MHz master clock)
pub const DIS_DIV_5: u8 = 0x8A;

/// Disable 3-phase data clocking
pub const DIS_3_PHASE: u8 = 0x8D;

/// Disable adaptive clocking
pub const CLK_NO_ADAPTIVE: u8 = 0x97;

// ============================================================================
// Clocking and buffers
// ============================================================================

/// Master clock of 'H' devices with the divide-by-5 prescaler disabled
pub const BASE_CLOCK_HZ: u32 = 60_000_000;

/// Fastest SPI clock the MPSSE can produce (divisor value 0)
pub const MAX_CLOCK_HZ: u32 = BASE_CLOCK_HZ / 2;

/// Largest length one MPSSE transfer command can encode
pub const MAX_TRANSFER: usize = 65536;

/// FTDI hardware buffer size in bytes
pub const FTDI_HW_BUFFER_SIZE: usize = 4096;

bitflags! {
    /// Low-byte (ADBUS) pin assignments in MPSSE mode
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LowPins: u8 {
        /// TCK/SK: SPI clock
        const SK = 1 << 0;
        /// TDI/DO: MOSI
        const DO = 1 << 1;
        /// TDO/DI: MISO
        const DI = 1 << 2;
        /// TMS/CS: chip select
        const CS = 1 << 3;
        /// GPIOL0
        const GPIOL0 = 1 << 4;
        /// GPIOL1
        const GPIOL1 = 1 << 5;
        /// GPIOL2
        const GPIOL2 = 1 << 6;
        /// GPIOL3
        const GPIOL3 = 1 << 7;

        /// All general purpose lines
        const GPIOL = Self::GPIOL0.bits() | Self::GPIOL1.bits()
            | Self::GPIOL2.bits() | Self::GPIOL3.bits();
    }
}

impl LowPins {
    /// The GPIOL line with index `n` (0-3)
    pub fn gpiol(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::GPIOL0),
            1 => Some(Self::GPIOL1),
            2 => Some(Self::GPIOL2),
            3 => Some(Self::GPIOL3),
            _ => None,
        }
    }

    /// Parse `gpiol0`..`gpiol3` (case-insensitive)
    pub fn parse_gpiol(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        let index = lower.strip_prefix("gpiol")?.parse().ok()?;
        Self::gpiol(index)
    }
}

/// Chip select asserted / deasserted state of the default wiring
pub const DEFAULT_CS_BITS: LowPins = LowPins::CS;

/// Default pin direction (SK, DO, CS as outputs)
pub const DEFAULT_PINDIR: LowPins = LowPins::SK.union(LowPins::DO).union(LowPins::CS);

// ============================================================================
// Supported device types
// ============================================================================

/// Supported FTDI device types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtdiDeviceType {
    /// FT2232H (dual channel)
    Ft2232H,
    /// FT4232H (quad channel)
    Ft4232H,
    /// FT232H (single channel), including the C232HM MPSSE cable
    #[default]
    Ft232H,
    /// FT4233H (quad channel)
    Ft4233H,
    /// TIAO TUMPA
    Tumpa,
    /// Amontec JTAGkey
    JtagKey,
    /// Bus Blaster
    BusBlaster,
}

impl FtdiDeviceType {
    /// Get the vendor ID for this device type
    pub fn vendor_id(&self) -> u16 {
        FTDI_VID
    }

    /// Get the product ID for this device type
    pub fn product_id(&self) -> u16 {
        match self {
            Self::Ft2232H | Self::BusBlaster => FTDI_FT2232H_PID,
            Self::Ft4232H => FTDI_FT4232H_PID,
            Self::Ft232H => FTDI_FT232H_PID,
            Self::Ft4233H => FTDI_FT4233H_PID,
            Self::Tumpa => TIAO_TUMPA_PID,
            Self::JtagKey => AMONTEC_JTAGKEY_PID,
        }
    }

    /// Get the number of channels for this device type
    pub fn channel_count(&self) -> u8 {
        match self {
            Self::Ft232H => 1,
            Self::Ft2232H | Self::Tumpa | Self::JtagKey | Self::BusBlaster => 2,
            Self::Ft4232H | Self::Ft4233H => 4,
        }
    }

    /// Pins toggled together as chip select
    pub fn default_cs_bits(&self) -> LowPins {
        match self {
            // JTAGkey needs OE (GPIOL0) toggled together with CS
            Self::JtagKey | Self::BusBlaster => LowPins::CS | LowPins::GPIOL0,
            _ => DEFAULT_CS_BITS,
        }
    }

    /// Pins driven as outputs from the start
    pub fn default_pindir(&self) -> LowPins {
        match self {
            Self::JtagKey | Self::BusBlaster => DEFAULT_PINDIR | LowPins::GPIOL0,
            _ => DEFAULT_PINDIR,
        }
    }

    /// GPIOL lines not reserved by the board wiring
    pub fn free_gpiols(&self) -> impl Iterator<Item = LowPins> {
        let reserved = self.default_pindir() & LowPins::GPIOL;
        (0..4)
            .filter_map(LowPins::gpiol)
            .filter(move |pin| !reserved.contains(*pin))
    }

    /// Parse device type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "2232h" | "ft2232h" => Some(Self::Ft2232H),
            "4232h" | "ft4232h" => Some(Self::Ft4232H),
            "232h" | "ft232h" | "c232hm" => Some(Self::Ft232H),
            "4233h" | "ft4233h" => Some(Self::Ft4233H),
            "tumpa" => Some(Self::Tumpa),
            "jtagkey" => Some(Self::JtagKey),
            "busblaster" => Some(Self::BusBlaster),
            _ => None,
        }
    }

    /// Get the name of this device type
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ft2232H => "FT2232H",
            Self::Ft4232H => "FT4232H",
            Self::Ft232H => "FT232H",
            Self::Ft4233H => "FT4233H",
            Self::Tumpa => "TUMPA",
            Self::JtagKey => "JTAGkey",
            Self::BusBlaster => "Bus Blaster",
        }
    }
}

/// FTDI interface/channel selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtdiInterface {
    /// Channel A (default)
    #[default]
    A,
    /// Channel B
    B,
    /// Channel C
    C,
    /// Channel D
    D,
}

impl FtdiInterface {
    /// Parse interface from character
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            _ => None,
        }
    }

    /// Get the interface index (0-3)
    pub fn index(&self) -> u8 {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }

    /// Get the channel letter
    pub fn letter(&self) -> char {
        (b'A' + self.index()) as char
    }
}

/// Supported FTDI devices for enumeration
pub struct SupportedDevice {
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
    /// Vendor name
    pub vendor_name: &'static str,
    /// Device name
    pub device_name: &'static str,
}

/// List of all supported FTDI devices
pub const SUPPORTED_DEVICES: &[SupportedDevice] = &[
    SupportedDevice {
        vendor_id: FTDI_VID,
        product_id: FTDI_FT2232H_PID,
        vendor_name: "FTDI",
        device_name: "FT2232H",
    },
    SupportedDevice {
        vendor_id: FTDI_VID,
        product_id: FTDI_FT4232H_PID,
        vendor_name: "FTDI",
        device_name: "FT4232H",
    },
    SupportedDevice {
        vendor_id: FTDI_VID,
        product_id: FTDI_FT232H_PID,
        vendor_name: "FTDI",
        device_name: "FT232H / C232HM",
    },
    SupportedDevice {
        vendor_id: FTDI_VID,
        product_id: FTDI_FT4233H_PID,
        vendor_name: "FTDI",
        device_name: "FT4233H",
    },
    SupportedDevice {
        vendor_id: FTDI_VID,
        product_id: TIAO_TUMPA_PID,
        vendor_name: "TIAO",
        device_name: "USB Multi-Protocol Adapter",
    },
    SupportedDevice {
        vendor_id: FTDI_VID,
        product_id: AMONTEC_JTAGKEY_PID,
        vendor_name: "Amontec",
        device_name: "JTAGkey",
    },
];

/// Get device info for a VID/PID pair
pub fn get_device_info(vid: u16, pid: u16) -> Option<&'static SupportedDevice> {
    SUPPORTED_DEVICES
        .iter()
        .find(|d| d.vendor_id == vid && d.product_id == pid)
}

// ============================================================================
// Mode and clock helpers
// ============================================================================

/// MPSSE opcodes for clocking bytes out and in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOpcodes {
    /// Write-only byte transfer
    pub write: u8,
    /// Read-only byte transfer
    pub read: u8,
}

/// Opcodes that shift and sample on the edges required by `mode`
///
/// MPSSE edge flags are physical; the idle clock level (CPOL) is set
/// separately through the SK pin state:
/// - Mode 0 / 3: data changes on falling SK, sampled on rising SK
/// - Mode 1 / 2: data changes on rising SK, sampled on falling SK
pub fn transfer_opcodes(mode: SpiMode, bit_order: BitOrder) -> TransferOpcodes {
    let lsb = match bit_order {
        BitOrder::MsbFirst => 0,
        BitOrder::LsbFirst => MPSSE_LSB,
    };

    match mode {
        SpiMode::Mode0 | SpiMode::Mode3 => TransferOpcodes {
            write: MPSSE_DO_WRITE | MPSSE_WRITE_NEG | lsb,
            read: MPSSE_DO_READ | lsb,
        },
        SpiMode::Mode1 | SpiMode::Mode2 => TransferOpcodes {
            write: MPSSE_DO_WRITE | lsb,
            read: MPSSE_DO_READ | MPSSE_READ_NEG | lsb,
        },
    }
}

/// Level of SK while the bus is idle
pub fn idle_clock(mode: SpiMode) -> LowPins {
    if mode.cpol() {
        LowPins::SK
    } else {
        LowPins::empty()
    }
}

/// Divisor value for the fastest clock not above `hz`
///
/// SPI clock = 60 MHz / ((1 + divisor) * 2).
pub fn divisor_for(hz: u32) -> u16 {
    let hz = hz.max(1);
    let steps = MAX_CLOCK_HZ.div_ceil(hz);
    (steps - 1).min(u16::MAX as u32) as u16
}

/// SPI clock produced by a divisor value
pub fn clock_for_divisor(divisor: u16) -> u32 {
    MAX_CLOCK_HZ / (divisor as u32 + 1)
}

/// Encode a transfer length into the 2-byte MPSSE length field (len-1, little-endian)
pub fn encode_len(len: usize) -> [u8; 2] {
    let v = (len - 1) as u16;
    [v as u8, (v >> 8) as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisor_for_common_clocks() {
        assert_eq!(divisor_for(30_000_000), 0);
        assert_eq!(divisor_for(15_000_000), 1);
        assert_eq!(divisor_for(10_000_000), 2);
        assert_eq!(divisor_for(1_000_000), 29);
        assert_eq!(clock_for_divisor(divisor_for(15_000_000)), 15_000_000);
    }

    #[test]
    fn test_negotiated_clock_never_exceeds_request() {
        for hz in [7_000_000, 12_345_678, 400_000, 100_000_000] {
            let actual = clock_for_divisor(divisor_for(hz));
            assert!(actual <= hz.min(MAX_CLOCK_HZ));
        }
        assert_eq!(clock_for_divisor(divisor_for(7_000_000)), 6_000_000);
        // Below the slowest reachable clock the divisor saturates
        assert_eq!(divisor_for(1), u16::MAX);
    }

    #[test]
    fn test_each_mode_gets_distinct_setup() {
        let setups: Vec<(TransferOpcodes, LowPins)> = SpiMode::ALL
            .iter()
            .map(|m| (transfer_opcodes(*m, BitOrder::MsbFirst), idle_clock(*m)))
            .collect();
        for (i, a) in setups.iter().enumerate() {
            for b in &setups[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_mode0_opcodes() {
        let ops = transfer_opcodes(SpiMode::Mode0, BitOrder::MsbFirst);
        assert_eq!(ops.write, 0x11);
        assert_eq!(ops.read, 0x20);
        assert_eq!(idle_clock(SpiMode::Mode0), LowPins::empty());
        assert_eq!(idle_clock(SpiMode::Mode2), LowPins::SK);

        let lsb = transfer_opcodes(SpiMode::Mode0, BitOrder::LsbFirst);
        assert_eq!(lsb.write, 0x19);
    }

    #[test]
    fn test_encode_len() {
        assert_eq!(encode_len(1), [0x00, 0x00]);
        assert_eq!(encode_len(256), [0xFF, 0x00]);
        assert_eq!(encode_len(MAX_TRANSFER), [0xFF, 0xFF]);
    }

    #[test]
    fn test_parse_gpiol() {
        assert_eq!(LowPins::parse_gpiol("gpiol0"), Some(LowPins::GPIOL0));
        assert_eq!(LowPins::parse_gpiol("GPIOL3"), Some(LowPins::GPIOL3));
        assert_eq!(LowPins::parse_gpiol("gpiol4"), None);
        assert_eq!(LowPins::parse_gpiol("cs"), None);
    }

    #[test]
    fn test_free_gpiols_skip_reserved() {
        let free: Vec<LowPins> = FtdiDeviceType::JtagKey.free_gpiols().collect();
        assert_eq!(free, [LowPins::GPIOL1, LowPins::GPIOL2, LowPins::GPIOL3]);
        let free: Vec<LowPins> = FtdiDeviceType::Ft232H.free_gpiols().collect();
        assert_eq!(free.len(), 4);
    }

    #[test]
    fn test_device_type_parse() {
        assert_eq!(FtdiDeviceType::parse("c232hm"), Some(FtdiDeviceType::Ft232H));
        assert_eq!(FtdiDeviceType::parse("FT2232H"), Some(FtdiDeviceType::Ft2232H));
        assert_eq!(FtdiDeviceType::parse("nope"), None);
        assert_eq!(FtdiInterface::B.letter(), 'B');
    }
}
