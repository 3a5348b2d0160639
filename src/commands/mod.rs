//! Command implementations

pub mod clock;
pub mod selftest;
pub mod transfer;

use crate::adapters;

/// Print how the bus signals map onto the adapter pins
pub fn print_pin_mappings() {
    println!();
    println!("              Pin mappings for raw SPI mode");
    println!("-----------------------------------------------------------");
    println!("| Description | FTDI pin      | C232HM Cable Color Code   |");
    println!("-----------------------------------------------------------");
    println!("| CS          | ADBUS3        |        Brown              |");
    println!("| MISO        | ADBUS2        |        Green              |");
    println!("| WP          | ADBUS4 (L0)   |        Grey               |");
    println!("| GND         | GND           |        Black              |");
    println!("| MOSI        | ADBUS1        |       Yellow              |");
    println!("| CLK         | ADBUS0        |       Orange              |");
    println!("| HOLD        | ADBUS5 (L1)   |        Purple             |");
    println!("| Vcc         | VCC           |         Red               |");
    println!("-----------------------------------------------------------");
    println!();
}

/// List all adapters compiled into this build
pub fn list_adapters() {
    println!("Available adapters:");
    println!();

    for info in adapters::available_adapters() {
        let aliases = if info.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", info.aliases.join(", "))
        };
        println!("  {:<8} - {}{}", info.name, info.description, aliases);
    }

    #[cfg(feature = "ftdi")]
    list_ftdi_devices();
}

#[cfg(feature = "ftdi")]
fn list_ftdi_devices() {
    match spiraw_ftdi::list_devices() {
        Ok(devices) if !devices.is_empty() => {
            println!();
            println!("Connected FTDI devices:");
            for device in devices {
                println!("  {}", device);
            }
        }
        Ok(_) => log::debug!("No FTDI devices connected"),
        Err(e) => log::warn!("Could not enumerate USB devices: {}", e),
    }
}
