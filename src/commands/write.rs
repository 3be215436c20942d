//! Register write commands

use super::{parse_value, parse_write_item, CmdResult};
use bwtool_core::{BusTransport, Capabilities, Engine, Width};

/// Write 8-bit values, one basic transaction per register
pub fn run_write8<T: BusTransport>(
    engine: &mut Engine<T>,
    items: &[String],
    decimal: bool,
) -> CmdResult {
    for item in items {
        let (reg, val) = item
            .split_once(':')
            .ok_or_else(|| format!("dont understand reg:val in: {}", item))?;
        let reg = u8::from_str_radix(reg, 16)
            .map_err(|_| format!("dont understand reg:val in: {}", item))?;
        let value = parse_value(val, decimal)?;
        log::debug!("writing register 0x{:02X} val 0x{:02X}", reg, value);
        engine.write_reg(reg, value, Width::Byte)?;
    }
    Ok(())
}

/// Write typed values.
///
/// With mode2 the whole list becomes one reliable transaction; otherwise
/// each register is a separate basic write.
pub fn run_write<T: BusTransport>(
    engine: &mut Engine<T>,
    items: &[String],
    decimal: bool,
) -> CmdResult {
    let specs = items
        .iter()
        .map(|s| parse_write_item(s, decimal))
        .collect::<Result<Vec<_>, _>>()?;

    if engine.capabilities().contains(Capabilities::MODE2) {
        engine.mode2_write(&specs)?;
        return Ok(());
    }

    for spec in &specs {
        log::debug!(
            "writing register 0x{:02X} val 0x{:08X}",
            spec.reg,
            spec.value
        );
        engine.write_reg(spec.reg, spec.value, spec.width)?;
    }
    Ok(())
}
