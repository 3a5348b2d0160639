//! spiraw-core - Raw SPI bus sessions over bit-banging adapters
//!
//! This crate provides the protocol side of driving a raw SPI bus through a
//! USB-attached synchronous-serial engine (such as an FTDI MPSSE). The
//! adapter itself is consumed through the [`adapter::SpiAdapter`] and
//! [`adapter::AdapterPort`] traits, so tests and dry runs can substitute a
//! loop-back implementation.
//!
//! It is `no_std` compatible but requires an allocator.
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for [`Error`]
//!
//! # Example
//!
//! ```ignore
//! use spiraw_core::session::BusSession;
//! use spiraw_core::selftest;
//!
//! fn check<A: spiraw_core::adapter::SpiAdapter>(adapter: A) -> spiraw_core::Result<()> {
//!     let mut session = BusSession::open(adapter, 0, 0)?;
//!     println!("{} initialized at {} hertz", session.description(), session.clock_hz());
//!
//!     let report = selftest::run(&mut session, 100, &mut rand::thread_rng())?;
//!     println!("{} of {} frames matched", report.passed(), report.len());
//!
//!     session.close()
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod adapter;
pub mod cancel;
pub mod clock;
pub mod error;
pub mod frame;
pub mod selftest;
pub mod session;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorKind, Result};
