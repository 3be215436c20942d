//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a hex byte (no 0x prefix, matching the board documentation)
pub fn parse_hex_u8(s: &str) -> Result<u8, String> {
    u8::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| format!("Invalid hex value '{}': {}", s, e))
}

/// Parse RS485 ids as "LOCAL" or "LOCAL:REMOTE" (decimal)
pub fn parse_rs485(s: &str) -> Result<(u8, Option<u8>), String> {
    let (local, remote) = match s.split_once(':') {
        Some((l, r)) => (l, Some(r)),
        None => (s, None),
    };
    let local = local
        .parse::<u8>()
        .map_err(|e| format!("Invalid RS485 local id '{}': {}", local, e))?;
    let remote = match remote {
        Some(r) => Some(
            r.parse::<u8>()
                .map_err(|e| format!("Invalid RS485 remote id '{}': {}", r, e))?,
        ),
        None => None,
    };
    Ok((local, remote))
}

#[derive(Parser)]
#[command(name = "bwtool")]
#[command(author, version, about = "Control BitWizard SPI/I2C expansion boards", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Bus device path (default depends on the selected bus)
    #[arg(short = 'D', long, global = true)]
    pub device: Option<String>,

    /// Target board address in hex (write address, R/W bit clear)
    #[arg(short, long, global = true, value_parser = parse_hex_u8, default_value = "82")]
    pub addr: u8,

    /// SPI clock speed in Hz (reads are clamped to 100 kHz)
    #[arg(short, long, global = true)]
    pub speed: Option<u32>,

    /// SPI inter-word delay in microseconds
    #[arg(short = 'd', long, global = true, default_value_t = 20)]
    pub delay: u16,

    /// Use the raw I2C transport (default device /dev/i2c-0)
    #[arg(short = 'I', long, global = true)]
    pub i2c: bool,

    /// Use a USB serial bridge carrying SPI (default device /dev/ttyACM0)
    #[arg(short = 'u', long = "usbspi", global = true)]
    pub usb_spi: bool,

    /// Use a USB serial bridge carrying I2C (default device /dev/ttyACM0)
    #[arg(short = 'U', long = "usbi2c", global = true)]
    pub usb_i2c: bool,

    /// Reliable transactions: transaction id, CRC16 and busy retry
    #[arg(short = '2', long, global = true)]
    pub mode2: bool,

    /// Transaction-id counter file (default $HOME/.tid)
    #[arg(short = 'T', long, global = true)]
    pub tid_file: Option<PathBuf>,

    /// RS485 forwarding ids as LOCAL:REMOTE (USB SPI bridge only)
    #[arg(long = "rs485-ids", global = true, value_parser = parse_rs485)]
    pub rs485_ids: Option<(u8, Option<u8>)>,

    /// Flag read values whose bus echo looks dead with a '?'
    #[arg(short = 'x', long = "xtend", global = true)]
    pub extended_validation: bool,

    /// Print values in decimal (registers remain hex)
    #[arg(short = '1', long, global = true)]
    pub decimal: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write 8-bit register values
    Write8 {
        /// REG:VAL pairs, register in hex
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Write typed register values
    Write {
        /// REG:VAL[:TYPE] with TYPE one of b/s/i/l (1/2/4/8 bytes)
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Read registers
    Read {
        /// REG[:TYPE] with TYPE one of b/s/i/l (1/2/4/8 bytes)
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Print the identification string of the target board
    Identify,

    /// Scan the bus for responding boards
    Scan,

    /// Dump the board EEPROM
    Eeprom,

    /// Send text to a display board
    Text {
        /// Target register (hex); text is 0xFF-terminated when given
        #[arg(short, long, value_parser = parse_hex_u8)]
        reg: Option<u8>,

        /// Words to send, joined with spaces
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Clear a display board
    Cls,

    /// Send raw hex bytes and dump the wire echo
    Raw {
        /// Bytes in hex
        #[arg(required = true)]
        bytes: Vec<String>,
    },

    /// Push lines of a file to a 4x20 display whenever the file changes
    Monitor {
        /// File to watch
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u8() {
        assert_eq!(parse_hex_u8("82"), Ok(0x82));
        assert_eq!(parse_hex_u8("0x82"), Ok(0x82));
        assert!(parse_hex_u8("zz").is_err());
    }

    #[test]
    fn test_parse_rs485() {
        assert_eq!(parse_rs485("2:7"), Ok((2, Some(7))));
        assert_eq!(parse_rs485("2"), Ok((2, None)));
        assert!(parse_rs485("x:7").is_err());
    }
}
