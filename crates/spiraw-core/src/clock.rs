//! Continuous bus clocking
//!
//! Keeps the clock running with chip select asserted, for scope probing or
//! for targets that need a free-running clock. Either a fixed number of
//! bytes is clocked, or a pattern is written repeatedly until a
//! [`CancelToken`] fires.

use alloc::vec;

use crate::adapter::AdapterPort;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::session::BusSession;

/// Byte clocked by [`clock_bytes`] (`'U'`, alternating bits)
pub const IDLE_PATTERN_BYTE: u8 = 0x55;

/// Pattern written repeatedly by [`clock_until_cancelled`] unless overridden
pub const DEFAULT_PATTERN: &[u8] = b"some random string to keep sending";

/// What a clocking run put on the bus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockStats {
    /// Write calls issued
    pub writes: u64,
    /// Bytes clocked out
    pub bytes: u64,
}

/// Clock exactly `count` bytes of [`IDLE_PATTERN_BYTE`] in one transaction
pub fn clock_bytes<P: AdapterPort>(session: &mut BusSession<P>, count: usize) -> Result<ClockStats> {
    let data = vec![IDLE_PATTERN_BYTE; count];
    session.transaction(|s| s.write(&data))?;
    Ok(ClockStats {
        writes: 1,
        bytes: count as u64,
    })
}

/// Write `pattern` repeatedly with chip select asserted until `cancel` fires
///
/// The token is checked before every write. Chip select is deasserted on
/// the way out whether the loop ended through cancellation or an adapter
/// error, leaving the session in the Ready state.
pub fn clock_until_cancelled<P: AdapterPort>(
    session: &mut BusSession<P>,
    pattern: &[u8],
    cancel: &CancelToken,
) -> Result<ClockStats> {
    let mut stats = ClockStats::default();

    session.transaction(|s| {
        while !cancel.is_cancelled() {
            s.write(pattern)?;
            stats.writes += 1;
            stats.bytes += pattern.len() as u64;
        }
        Ok(())
    })?;

    log::info!(
        "Clocking stopped after {} writes ({} bytes)",
        stats.writes,
        stats.bytes
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::session::SessionState;
    use crate::testing::{Call, MockAdapter};

    #[test]
    fn test_clock_bytes() {
        let adapter = MockAdapter::echo();
        let log = adapter.log();
        let mut session = BusSession::open(adapter, 0, 0).unwrap();
        let stats = clock_bytes(&mut session, 16).unwrap();
        assert_eq!(stats.bytes, 16);
        assert!(log.calls().contains(&Call::Write(vec![b'U'; 16])));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_cancel_between_writes() {
        let token = CancelToken::new();
        let adapter = MockAdapter::echo().with_cancel_after(3, token.clone());
        let log = adapter.log();
        let mut session = BusSession::open(adapter, 0, 0).unwrap();

        let stats = clock_until_cancelled(&mut session, DEFAULT_PATTERN, &token).unwrap();
        assert_eq!(stats.writes, 3);
        assert_eq!(stats.bytes, 3 * DEFAULT_PATTERN.len() as u64);
        assert_eq!(log.write_count(), 3);
        assert_eq!(session.state(), SessionState::Ready);

        session.close().unwrap();
        assert_eq!(log.close_count(), 1);
    }

    #[test]
    fn test_cancel_before_first_write() {
        let token = CancelToken::new();
        token.cancel();
        let adapter = MockAdapter::echo();
        let log = adapter.log();
        let mut session = BusSession::open(adapter, 0, 0).unwrap();

        let stats = clock_until_cancelled(&mut session, b"x", &token).unwrap();
        assert_eq!(stats, ClockStats::default());
        assert_eq!(log.write_count(), 0);
        let calls = log.calls();
        assert!(calls.contains(&Call::AssertSelect));
        assert!(calls.contains(&Call::DeassertSelect));
    }

    #[test]
    fn test_write_error_still_deasserts() {
        let token = CancelToken::new();
        let adapter = MockAdapter::echo().with_failing_write_after(2);
        let log = adapter.log();
        let mut session = BusSession::open(adapter, 0, 0).unwrap();

        let err = clock_until_cancelled(&mut session, b"abc", &token).unwrap_err();
        assert_eq!(err, Error::TransferFailed);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(log.calls().last(), Some(&Call::DeassertSelect));
    }
}
