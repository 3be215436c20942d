//! Identify, scan and EEPROM dump commands

use super::CmdResult;
use bwtool_core::{BusTransport, Engine};

/// Print the identification string of the configured target
pub fn run_identify<T: BusTransport>(engine: &mut Engine<T>) -> CmdResult {
    if let Some(text) = engine.identify()? {
        println!("{}", text);
    }
    Ok(())
}

/// Probe every even address and list the boards that answered
pub fn run_scan<T: BusTransport>(engine: &mut Engine<T>) -> CmdResult {
    for hit in engine.scan()? {
        println!("{:02x}: {}", hit.addr, hit.text);
    }
    Ok(())
}

/// Hex dump of the board EEPROM, 16 bytes per row
pub fn run_eeprom<T: BusTransport>(engine: &mut Engine<T>) -> CmdResult {
    let dump = engine.read_eeprom()?;
    for (row, chunk) in dump.chunks(16).enumerate() {
        let bytes = chunk
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{:04x}:  {}", row * 16, bytes);
    }
    Ok(())
}
