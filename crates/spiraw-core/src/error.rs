//! Error types for spiraw-core
//!
//! This module provides a no_std compatible error type shared by the bus
//! session, the frame codec and adapter implementations.

use core::fmt;

/// Broad error classes, used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or contradictory input (invalid mode, frame size out of range)
    Usage,
    /// Failure at the hardware boundary; fatal and never retried
    Adapter,
    /// Operation invoked in the wrong session state
    State,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Usage errors
    /// SPI mode outside 0..=3
    InvalidMode(u8),
    /// Self-test frame size outside the supported range
    InvalidFrameSize(usize),

    // Adapter errors
    /// The adapter could not be opened
    AdapterOpenFailed,
    /// The adapter opened but could not be configured (mode, clock, pins)
    AdapterConfigFailed,
    /// A byte transfer failed or returned short
    TransferFailed,
    /// Driving an auxiliary pin or chip select failed
    PinControlFailed,
    /// Releasing the adapter failed
    CloseFailed,

    // State errors
    /// Write/Read/Stop called outside a transaction
    NotInTransaction,
    /// Start called while a transaction is already open
    AlreadyInTransaction,
    /// The session has already been closed
    SessionClosed,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMode(_) | Self::InvalidFrameSize(_) => ErrorKind::Usage,
            Self::AdapterOpenFailed
            | Self::AdapterConfigFailed
            | Self::TransferFailed
            | Self::PinControlFailed
            | Self::CloseFailed => ErrorKind::Adapter,
            Self::NotInTransaction | Self::AlreadyInTransaction | Self::SessionClosed => {
                ErrorKind::State
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage => write!(f, "usage error"),
            Self::Adapter => write!(f, "adapter error"),
            Self::State => write!(f, "state error"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMode(mode) => write!(f, "invalid SPI mode {} (expected 0-3)", mode),
            Self::InvalidFrameSize(size) => write!(f, "invalid frame size {}", size),
            Self::AdapterOpenFailed => write!(f, "failed to open adapter"),
            Self::AdapterConfigFailed => write!(f, "failed to configure adapter"),
            Self::TransferFailed => write!(f, "SPI transfer failed"),
            Self::PinControlFailed => write!(f, "pin control failed"),
            Self::CloseFailed => write!(f, "failed to close adapter"),
            Self::NotInTransaction => write!(f, "no transaction in progress"),
            Self::AlreadyInTransaction => write!(f, "transaction already in progress"),
            Self::SessionClosed => write!(f, "session is closed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
