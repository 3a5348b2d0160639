//! spiraw-ftdi - FTDI MPSSE adapter backend
//!
//! Drives an SPI bus through the MPSSE engine of FTDI 'H' series chips
//! (FT232H, FT2232H, FT4232H, FT4233H and boards built on them, including
//! the C232HM cable).
//!
//! # Example
//!
//! ```no_run
//! use spiraw_core::session::BusSession;
//! use spiraw_ftdi::{FtdiAdapter, FtdiConfig, FtdiDeviceType};
//!
//! let adapter = FtdiAdapter::new(FtdiConfig::for_device(FtdiDeviceType::Ft232H));
//! let mut session = BusSession::open(adapter, 0, 0)?;
//! session.transaction(|s| s.write(&[0x9F]))?;
//! session.close()?;
//! # Ok::<(), spiraw_core::Error>(())
//! ```
//!
//! # Adapter Options
//!
//! - `type=<device>` - Device type (232h, c232hm, 2232h, 4232h, 4233h,
//!   tumpa, jtagkey, busblaster; default: 232h)
//! - `port=<A|B|C|D>` - Channel to use (default: A)
//! - `wp=<gpiolN>` - GPIOL line wired to WP# (default: first free line)
//! - `hold=<gpiolN>` - GPIOL line wired to HOLD# (default: next free line)
//!
//! # SPI Clock Speed
//!
//! The SPI clock is derived from the 60 MHz master clock:
//!
//! ```text
//! SPI_clock = 60 MHz / ((1 + divisor) * 2)
//! ```
//!
//! The fastest clock not above the requested one is chosen.
//!
//! | Divisor | SPI Clock |
//! |---------|-----------|
//! | 0       | 30 MHz    |
//! | 1       | 15 MHz    |
//! | 2       | 10 MHz    |
//! | 4       | 6 MHz     |
//! | 29      | 1 MHz     |

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
mod device;
#[cfg(feature = "std")]
mod error;

#[cfg(feature = "std")]
mod protocol;

#[cfg(feature = "std")]
pub use device::{list_devices, parse_options, FtdiAdapter, FtdiConfig, FtdiDeviceInfo, FtdiPort};
#[cfg(feature = "std")]
pub use error::{FtdiError, Result};
#[cfg(feature = "std")]
pub use protocol::{FtdiDeviceType, FtdiInterface, LowPins, SUPPORTED_DEVICES};
