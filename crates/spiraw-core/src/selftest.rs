//! Round-trip self-test
//!
//! Each iteration sends one random-sized [`Frame`] inside a single
//! transaction, reads back `size + READBACK_MARGIN` bytes and checks that
//! the frame appears intact in the readback. With the bus wired in
//! loop-back (MOSI to MISO) or with counterpart firmware echoing frames,
//! every iteration should match.
//!
//! Mismatches are recorded and the loop continues; only adapter errors
//! abort it.

use alloc::vec::Vec;

use rand::Rng;

use crate::adapter::AdapterPort;
use crate::error::Result;
use crate::frame::{locate, Frame, HexBytes, MAX_FRAME_SIZE, MIN_FRAME_SIZE};
use crate::session::BusSession;

/// Outcome of one self-test iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Zero-based iteration number
    pub iteration: usize,
    /// Frame that was sent
    pub expected: Frame,
    /// Slice extracted from the readback at `read_index`
    pub observed: Vec<u8>,
    /// Offset of the size prefix in the readback, if found
    pub read_index: Option<usize>,
    /// Everything that was clocked in
    pub readback: Vec<u8>,
    /// Whether `observed` equals the frame
    pub matched: bool,
}

impl ValidationResult {
    /// Compare a readback against the frame that produced it
    pub fn check(iteration: usize, expected: Frame, readback: Vec<u8>) -> Self {
        let read_index = locate(&readback, &expected.prefix());
        let observed = match read_index {
            Some(start) => {
                let end = (start + expected.size()).min(readback.len());
                readback[start..end].to_vec()
            }
            None => Vec::new(),
        };
        let matched = observed == expected.as_bytes();

        Self {
            iteration,
            expected,
            observed,
            read_index,
            readback,
            matched,
        }
    }

    /// Log the three buffers of a mismatch as hex dumps
    pub fn log_mismatch(&self) {
        match self.read_index {
            Some(index) => log::warn!(
                "Iteration {}: mismatch at read index {} (frame size {})",
                self.iteration,
                index,
                self.expected.size()
            ),
            None => log::warn!(
                "Iteration {}: size prefix not found in readback (frame size {})",
                self.iteration,
                self.expected.size()
            ),
        }
        log::warn!("  expected: {}", HexBytes(self.expected.as_bytes()));
        log::warn!("  observed: {}", HexBytes(&self.observed));
        log::warn!("  readback: {}", HexBytes(&self.readback));
    }
}

/// Ordered results of a self-test run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelfTestReport {
    results: Vec<ValidationResult>,
}

impl SelfTestReport {
    /// All results, in iteration order
    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    /// Results that did not match
    pub fn mismatches(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| !r.matched)
    }

    /// Number of matching iterations
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.matched).count()
    }

    /// Number of iterations run
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no iterations were run
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Whether every iteration matched
    pub fn all_matched(&self) -> bool {
        self.results.iter().all(|r| r.matched)
    }
}

/// Draw a frame size uniformly from `MIN_FRAME_SIZE..=MAX_FRAME_SIZE`
pub fn random_size<R: Rng + ?Sized>(rng: &mut R) -> usize {
    MIN_FRAME_SIZE + rng.gen_range(0..=MAX_FRAME_SIZE - MIN_FRAME_SIZE)
}

/// Send one frame of `size` bytes and validate the readback
pub fn run_iteration<P: AdapterPort>(
    session: &mut BusSession<P>,
    iteration: usize,
    size: usize,
) -> Result<ValidationResult> {
    let frame = Frame::new(size)?;

    let readback = session.transaction(|s| {
        s.write(frame.as_bytes())?;
        s.read(frame.readback_len())
    })?;

    let result = ValidationResult::check(iteration, frame, readback);
    if !result.matched {
        result.log_mismatch();
    }
    Ok(result)
}

/// Run `iterations` self-test transactions
pub fn run<P, R>(
    session: &mut BusSession<P>,
    iterations: usize,
    rng: &mut R,
) -> Result<SelfTestReport>
where
    P: AdapterPort,
    R: Rng + ?Sized,
{
    run_with_observer(session, iterations, rng, |_| {})
}

/// Like [`run`], calling `observe` after every iteration
pub fn run_with_observer<P, R, F>(
    session: &mut BusSession<P>,
    iterations: usize,
    rng: &mut R,
    mut observe: F,
) -> Result<SelfTestReport>
where
    P: AdapterPort,
    R: Rng + ?Sized,
    F: FnMut(&ValidationResult),
{
    let mut report = SelfTestReport {
        results: Vec::with_capacity(iterations),
    };

    for iteration in 0..iterations {
        let size = random_size(rng);
        log::trace!("Iteration {}: frame size {}", iteration, size);
        let result = run_iteration(session, iteration, size)?;
        observe(&result);
        report.results.push(result);
    }

    log::debug!(
        "Self-test: {} of {} frames matched",
        report.passed(),
        report.len()
    );
    Ok(report)
}
