//! Register read command

use super::{format_value, parse_read_item, CmdResult};
use bwtool_core::{BusTransport, Capabilities, Engine};

/// Read the listed registers and print the values on one line.
///
/// With mode2 all registers go out in one reliable transaction; otherwise
/// each register is a separate basic read.
pub fn run_read<T: BusTransport>(
    engine: &mut Engine<T>,
    items: &[String],
    decimal: bool,
) -> CmdResult {
    let specs = items
        .iter()
        .map(|s| parse_read_item(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(specs.len());

    if engine.capabilities().contains(Capabilities::MODE2) {
        let values = engine.mode2_read(&specs)?;
        for (spec, value) in specs.iter().zip(values) {
            out.push(format_value(value, spec.width, decimal));
        }
    } else {
        let extended = engine
            .capabilities()
            .contains(Capabilities::EXTENDED_VALIDATION);
        for spec in &specs {
            log::debug!("reading register 0x{:02X}", spec.reg);
            let value = engine.read_reg(spec.reg, spec.width)?;
            let mut text = format_value(value, spec.width, decimal);
            if extended && !engine.last_read_valid() {
                text.insert(0, '?');
            }
            out.push(text);
        }
    }

    println!("{}", out.join(" "));
    Ok(())
}
