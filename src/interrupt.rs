//! Ctrl-C handling
//!
//! SIGINT only sets a [`CancelToken`]; long-running commands poll it and
//! shut the bus down on their own.

use std::sync::OnceLock;

use spiraw_core::cancel::CancelToken;

use crate::error::Result;

static CANCEL: OnceLock<CancelToken> = OnceLock::new();

/// Token cancelled by the next SIGINT
///
/// Every call returns the same token.
pub fn cancel_on_interrupt() -> Result<CancelToken> {
    let token = CANCEL.get_or_init(CancelToken::new).clone();
    install()?;
    Ok(token)
}

#[cfg(unix)]
extern "C" fn on_sigint(_sig: nix::libc::c_int) {
    // Only an atomic store happens here
    if let Some(token) = CANCEL.get() {
        token.cancel();
    }
}

#[cfg(unix)]
fn install() -> Result<()> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only touches an initialized OnceLock and an atomic
    unsafe { sigaction(Signal::SIGINT, &action) }
        .map_err(|e| crate::error::AppError::Interrupt(e.to_string()))?;
    log::debug!("SIGINT handler installed");
    Ok(())
}

#[cfg(not(unix))]
fn install() -> Result<()> {
    log::warn!("Interrupt handling is not supported on this platform");
    Ok(())
}
