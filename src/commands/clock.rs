//! Continuous clocking command

use spiraw_core::adapter::AdapterPort;
use spiraw_core::clock::{self, DEFAULT_PATTERN};
use spiraw_core::session::BusSession;

use crate::error::Result;
use crate::interrupt;

/// Clock `count` bytes, or keep clocking until Ctrl-C when `count` is None
pub fn run<P: AdapterPort>(session: &mut BusSession<P>, count: Option<usize>) -> Result<()> {
    let stats = match count {
        Some(count) => clock::clock_bytes(session, count)?,
        None => {
            let cancel = interrupt::cancel_on_interrupt()?;
            println!("Clocking with chip select asserted, press Ctrl-C to stop");
            clock::clock_until_cancelled(session, DEFAULT_PATTERN, &cancel)?
        }
    };

    println!("Clocked {} bytes", stats.bytes);
    Ok(())
}
