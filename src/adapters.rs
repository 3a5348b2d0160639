//! Adapter registration and dispatch
//!
//! Adapters are selected with a `name[:key=value,...]` string. Each backend
//! parses its own keys; unknown keys are warned about and ignored.

use std::collections::HashMap;

use spiraw_core::adapter::{AdapterInfo, BoxedPort};
use spiraw_core::session::BusSession;

use crate::error::{AppError, Result};

/// Parsed adapter parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterParams {
    /// Adapter name as given
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl AdapterParams {
    /// Parameters as borrowed pairs, the form backends parse
    pub fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse an adapter string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
pub fn parse_adapter_params(s: &str) -> Result<AdapterParams> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    if name.is_empty() {
        return Err(AppError::Usage("empty adapter name".to_string()));
    }

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(AppError::Usage(format!(
                    "Invalid adapter parameter format: '{}' (expected key=value)",
                    opt
                )));
            }
        }
    }

    Ok(AdapterParams {
        name: name.to_string(),
        params,
    })
}

/// Information about all adapters enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_adapters() -> Vec<AdapterInfo> {
    let mut adapters = Vec::new();

    #[cfg(feature = "ftdi")]
    adapters.push(AdapterInfo {
        name: "ftdi",
        aliases: &["mpsse", "c232hm"],
        description: "FTDI MPSSE adapter (FT232H/FT2232H/FT4232H) (type=<dev>,port=<A-D>,wp=<gpiolN>,hold=<gpiolN>)",
    });

    #[cfg(feature = "dummy")]
    adapters.push(AdapterInfo {
        name: "dummy",
        aliases: &["loopback"],
        description: "In-memory loop-back bus for testing (latency=<bytes>,idle=<byte>)",
    });

    adapters
}

/// Open the named adapter and bring up a bus session on it
///
/// `speed_hz` of 0 selects the default clock.
pub fn open_session(adapter: &str, speed_hz: u32, mode: u8) -> Result<BusSession<BoxedPort>> {
    let params = parse_adapter_params(adapter)?;

    match params.name.as_str() {
        #[cfg(feature = "ftdi")]
        "ftdi" | "mpsse" | "c232hm" => open_ftdi(&params, speed_hz, mode),

        #[cfg(feature = "dummy")]
        "dummy" | "loopback" => open_dummy(&params, speed_hz, mode),

        _ => Err(AppError::Usage(format!(
            "Unknown adapter: {} (use --list-adapters)",
            params.name
        ))),
    }
}

#[cfg(feature = "ftdi")]
fn open_ftdi(params: &AdapterParams, speed_hz: u32, mode: u8) -> Result<BusSession<BoxedPort>> {
    use spiraw_core::adapter::Boxed;
    use spiraw_ftdi::{parse_options, FtdiAdapter};

    log::info!("Opening FTDI adapter...");

    let config = parse_options(&params.options())
        .map_err(|e| AppError::Adapter(format!("Invalid FTDI parameters: {}", e)))?;

    BusSession::open(Boxed(FtdiAdapter::new(config)), speed_hz, mode).map_err(|e| {
        if e.kind() == spiraw_core::ErrorKind::Adapter {
            log::error!(
                "Make sure the device is connected and you have permissions. \
                 You may need to unbind the kernel ftdi_sio driver."
            );
        }
        e.into()
    })
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &AdapterParams, speed_hz: u32, mode: u8) -> Result<BusSession<BoxedPort>> {
    use spiraw_core::adapter::Boxed;
    use spiraw_dummy::{Loopback, LoopbackConfig};

    let config = LoopbackConfig::from_options(&params.options())
        .map_err(|e| AppError::Adapter(format!("Invalid dummy parameters: {}", e)))?;

    Ok(BusSession::open(
        Boxed(Loopback::new(config)),
        speed_hz,
        mode,
    )?)
}
