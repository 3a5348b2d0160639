//! CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spiraw")]
#[command(author, version, about = "Raw SPI bus exerciser for USB serial engines", long_about = None)]
pub struct Cli {
    /// SPI clock frequency in Hz (0: 15 MHz)
    #[arg(short, long, value_name = "HZ", default_value_t = 0)]
    pub frequency: u32,

    /// SPI mode (0-3)
    #[arg(
        short,
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=3)
    )]
    pub mode: u8,

    /// Run the frame round-trip self-test N times
    #[arg(short = 'l', long = "loop", value_name = "N", conflicts_with_all = ["read", "write"])]
    pub iterations: Option<usize>,

    /// Read --size bytes from the bus into FILE
    #[arg(short, long, value_name = "FILE")]
    pub read: Option<PathBuf>,

    /// Number of bytes for --read and --clock
    #[arg(short, long, value_name = "BYTES")]
    pub size: Option<usize>,

    /// Write the contents of FILE to the bus
    #[arg(short, long, value_name = "FILE")]
    pub write: Option<PathBuf>,

    /// Keep clocking with chip select asserted (stop after SIZE bytes if given)
    #[arg(
        short,
        long,
        value_name = "SIZE",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "0",
        conflicts_with_all = ["read", "write", "iterations"]
    )]
    pub clock: Option<usize>,

    /// Print the adapter pin mappings and exit
    #[arg(short, long)]
    pub pin_mappings: bool,

    /// Adapter to use, with options (e.g. "ftdi:type=2232h,port=B")
    #[arg(short, long, value_name = "NAME[:KEY=VALUE,...]", default_value = "ftdi")]
    pub adapter: String,

    /// List the adapters compiled into this build and exit
    #[arg(long)]
    pub list_adapters: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// What a validated command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Print the pin table
    PinMappings,
    /// Print the compiled-in adapters
    ListAdapters,
    /// Run the round-trip self-test
    SelfTest { iterations: usize },
    /// Write a file, read into a file, or both (write first) in one transaction
    Transfer {
        write: Option<PathBuf>,
        read: Option<(PathBuf, usize)>,
    },
    /// Clock the bus, either a fixed byte count or until interrupted
    Clock { count: Option<usize> },
}

impl Cli {
    /// Resolve the flags into a single action
    ///
    /// Exclusivity between `--clock`, `--loop` and the transfer flags is
    /// enforced by clap; this checks the rules clap cannot express.
    pub fn action(&self) -> Result<Action, String> {
        if self.pin_mappings {
            return Ok(Action::PinMappings);
        }
        if self.list_adapters {
            return Ok(Action::ListAdapters);
        }

        if let Some(inline) = self.clock {
            let count = Some(inline)
                .filter(|n| *n > 0)
                .or(self.size.filter(|n| *n > 0));
            return Ok(Action::Clock { count });
        }

        if let Some(iterations) = self.iterations {
            if iterations == 0 {
                return Err("--loop needs at least one iteration".to_string());
            }
            return Ok(Action::SelfTest { iterations });
        }

        let read = match &self.read {
            Some(path) => match self.size {
                Some(size) if size > 0 => Some((path.clone(), size)),
                _ => return Err("--read requires a non-zero --size".to_string()),
            },
            None => None,
        };

        if read.is_none() && self.write.is_none() {
            return Err(
                "nothing to do: specify one of --read, --write, --clock or --loop".to_string(),
            );
        }

        Ok(Action::Transfer {
            write: self.write.clone(),
            read,
        })
    }
}
