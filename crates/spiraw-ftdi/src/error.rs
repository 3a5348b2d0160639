//! Error types for the FTDI backend

use spiraw_core::Error as CoreError;
use thiserror::Error;

/// Result type for FTDI operations
pub type Result<T> = std::result::Result<T, FtdiError>;

/// Errors that can occur during FTDI operations
#[derive(Debug, Error)]
pub enum FtdiError {
    /// Failed to open device
    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    /// Failed to configure device
    #[error("Failed to configure device: {0}")]
    ConfigFailed(String),

    /// USB transfer failed
    #[error("USB transfer failed: {0}")]
    TransferFailed(String),

    /// The port was already closed
    #[error("Port is closed")]
    Closed,

    /// Invalid device type
    #[error("Invalid device type: {0}")]
    InvalidDeviceType(String),

    /// Invalid channel/port specification
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// USB enumeration error
    #[error("USB error: {0}")]
    Usb(String),
}

impl From<nusb::Error> for FtdiError {
    fn from(e: nusb::Error) -> Self {
        FtdiError::Usb(e.to_string())
    }
}

impl FtdiError {
    /// Log the detailed error and collapse it into the backend-neutral error
    pub(crate) fn into_core(self, kind: CoreError) -> CoreError {
        log::error!("FTDI: {}", self);
        kind
    }
}
