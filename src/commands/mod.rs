//! Command implementations

pub mod display;
pub mod ident;
pub mod read;
pub mod write;

use bwtool_core::frame::hex_dump;
use bwtool_core::{BusTransport, Engine, ReadSpec, Width, WriteSpec};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Parse a value in the selected radix (hex unless --decimal)
fn parse_value(s: &str, decimal: bool) -> Result<u64, String> {
    let parsed = if decimal {
        s.parse::<u64>()
    } else {
        u64::from_str_radix(s.trim_start_matches("0x"), 16)
    };
    parsed.map_err(|e| format!("Invalid value '{}': {}", s, e))
}

fn parse_width(s: &str) -> Result<Width, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => {
            Width::from_type_char(c).ok_or_else(|| format!("Don't understand the type '{}'", c))
        }
        _ => Err(format!("Don't understand the type '{}'", s)),
    }
}

/// Parse "REG[:TYPE]" (register in hex, type defaults to byte)
pub fn parse_read_item(s: &str) -> Result<ReadSpec, String> {
    let (reg, width) = match s.split_once(':') {
        Some((reg, ty)) => (reg, parse_width(ty)?),
        None => (s, Width::Byte),
    };
    let reg = u8::from_str_radix(reg, 16)
        .map_err(|_| format!("don't understand reg:type in: {}", s))?;
    Ok(ReadSpec { reg, width })
}

/// Parse "REG:VAL[:TYPE]" (register in hex, type defaults to byte)
pub fn parse_write_item(s: &str, decimal: bool) -> Result<WriteSpec, String> {
    let mut parts = s.splitn(3, ':');
    let (reg, val) = match (parts.next(), parts.next()) {
        (Some(reg), Some(val)) => (reg, val),
        _ => return Err(format!("don't understand reg:val:type in: {}", s)),
    };
    let width = match parts.next() {
        Some(ty) => parse_width(ty)?,
        None => Width::Byte,
    };
    let reg = u8::from_str_radix(reg, 16)
        .map_err(|_| format!("don't understand reg:val:type in: {}", s))?;
    let value = parse_value(val, decimal)?;
    Ok(WriteSpec { reg, width, value })
}

/// Format a value for output: width-zero-padded hex, or plain decimal
pub fn format_value(value: u64, width: Width, decimal: bool) -> String {
    if decimal {
        return value.to_string();
    }
    format!("{:0pad$x}", value, pad = width.len() * 2)
}

/// Send caller-supplied hex bytes and dump the wire echo
pub fn run_raw<T: BusTransport>(engine: &mut Engine<T>, bytes: &[String]) -> CmdResult {
    let frame = bytes
        .iter()
        .map(|s| {
            u8::from_str_radix(s.trim_start_matches("0x"), 16)
                .map_err(|e| format!("Invalid hex byte '{}': {}", s, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    println!("send: {}", hex_dump(&frame));
    let echo = engine.exchange_raw(&frame)?;
    println!("got:  {}", hex_dump(&echo));
    Ok(())
}
