//! Raw write/read transfer command

use std::fs;
use std::path::Path;

use spiraw_core::adapter::AdapterPort;
use spiraw_core::session::BusSession;

use crate::error::{AppError, Result};

/// Write a file and/or read into a file inside one chip-select bracket
///
/// The write, if any, goes first. The read file is only created once the
/// transaction has completed.
pub fn run<P: AdapterPort>(
    session: &mut BusSession<P>,
    write: Option<&Path>,
    read: Option<(&Path, usize)>,
) -> Result<()> {
    let data = match write {
        Some(path) => {
            let data = fs::read(path).map_err(|e| AppError::io(path, e))?;
            log::info!("Loaded {} bytes from {}", data.len(), path.display());
            Some(data)
        }
        None => None,
    };

    let captured = session.transaction(|s| {
        if let Some(data) = &data {
            s.write(data)?;
        }
        match read {
            Some((_, size)) => s.read(size).map(Some),
            None => Ok(None),
        }
    })?;

    if let (Some(path), Some(data)) = (write, &data) {
        println!("Wrote {} bytes from {}", data.len(), path.display());
    }

    if let (Some((path, _)), Some(bytes)) = (read, captured) {
        fs::write(path, &bytes).map_err(|e| AppError::io(path, e))?;
        println!("Read {} bytes into {}", bytes.len(), path.display());
    }

    Ok(())
}
