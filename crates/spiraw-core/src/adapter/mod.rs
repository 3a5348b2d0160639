//! Adapter capability traits
//!
//! This module defines the interface a synchronous-serial engine must
//! provide so a [`BusSession`](crate::session::BusSession) can drive a raw
//! SPI bus through it.

mod traits;

pub use traits::*;
