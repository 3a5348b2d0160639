//! spiraw - Raw SPI bus exerciser
//!
//! Drives a USB serial engine (an FTDI MPSSE chip, or the in-memory
//! loop-back adapter) as an SPI master and offers a few raw operations on
//! the bus:
//!
//! - **Transfer**: write a file and/or read a number of bytes into a file,
//!   inside one chip-select bracket
//! - **Self-test**: send random length-prefixed frames and check that they
//!   come back (with MOSI wired to MISO, or an echoing target)
//! - **Clock**: keep the clock running with chip select asserted, either for
//!   a fixed byte count or until Ctrl-C

mod adapters;
mod cli;
mod commands;
mod error;
mod interrupt;

use clap::error::ErrorKind;
use clap::Parser;
use cli::{Action, Cli};
use error::{AppError, Result};
use spiraw_core::adapter::BoxedPort;
use spiraw_core::session::{BusSession, WriteTrace};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // RUST_LOG still overrides the verbosity flags
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_filter(cli.verbose)),
    )
    .init();

    if let Err(e) = run(&cli) {
        match e {
            AppError::Usage(msg) => eprintln!("{}\n\nFor more information, try '--help'.", msg),
            e => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}

/// Log filter used when RUST_LOG is unset
fn default_log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn run(cli: &Cli) -> Result<()> {
    match cli.action().map_err(AppError::Usage)? {
        Action::PinMappings => {
            commands::print_pin_mappings();
            Ok(())
        }
        Action::ListAdapters => {
            commands::list_adapters();
            Ok(())
        }
        Action::SelfTest { iterations } => {
            with_session(cli, |session| commands::selftest::run(session, iterations))
        }
        Action::Transfer { write, read } => with_session(cli, |session| {
            commands::transfer::run(
                session,
                write.as_deref(),
                read.as_ref().map(|(path, size)| (path.as_path(), *size)),
            )
        }),
        Action::Clock { count } => {
            with_session(cli, |session| commands::clock::run(session, count))
        }
    }
}

/// Open the selected adapter, run `f`, then close the bus whatever `f` returned
fn with_session<F>(cli: &Cli, f: F) -> Result<()>
where
    F: FnOnce(&mut BusSession<BoxedPort>) -> Result<()>,
{
    let mut session = adapters::open_session(&cli.adapter, cli.frequency, cli.mode)?;
    if cli.verbose >= 2 {
        session.set_write_trace(WriteTrace::Every);
    }
    println!(
        "{} initialized at {} hertz",
        session.description(),
        session.clock_hz()
    );

    let result = f(&mut session);
    let closed = session.close();
    result?;
    closed?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_selects_log_filter() {
        assert_eq!(default_log_filter(0), "info");
        assert_eq!(default_log_filter(1), "debug");
        assert_eq!(default_log_filter(2), "trace");
        assert_eq!(default_log_filter(5), "trace");
    }

    #[test]
    fn test_write_trace_visible_at_debug_filter() {
        // The hex write diagnostic is a debug record
        let filter: log::LevelFilter = default_log_filter(1).parse().unwrap();
        assert!(log::Level::Debug <= filter);
        let filter: log::LevelFilter = default_log_filter(0).parse().unwrap();
        assert!(log::Level::Debug > filter);
    }
}
