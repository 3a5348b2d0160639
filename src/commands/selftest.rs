//! Frame round-trip self-test command

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use spiraw_core::adapter::AdapterPort;
use spiraw_core::selftest;
use spiraw_core::session::BusSession;

use crate::error::Result;

/// Run the self-test `iterations` times and print a summary
///
/// Mismatches are reported but do not fail the command.
pub fn run<P: AdapterPort>(session: &mut BusSession<P>, iterations: usize) -> Result<()> {
    let mut rng = StdRng::from_entropy();

    let pb = ProgressBar::new(iterations as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );

    let mut mismatches = 0usize;
    let result = selftest::run_with_observer(session, iterations, &mut rng, |outcome| {
        if !outcome.matched {
            mismatches += 1;
            pb.set_message(format!("({} mismatched)", mismatches));
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    let report = result?;
    println!(
        "Self-test: {}/{} frames matched",
        report.passed(),
        report.len()
    );
    for mismatch in report.mismatches() {
        match mismatch.read_index {
            Some(index) => println!(
                "  iteration {}: {} byte frame mismatched at read index {}",
                mismatch.iteration,
                mismatch.expected.size(),
                index
            ),
            None => println!(
                "  iteration {}: {} byte frame not found in readback",
                mismatch.iteration,
                mismatch.expected.size()
            ),
        }
    }

    Ok(())
}
