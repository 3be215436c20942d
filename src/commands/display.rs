//! Display board commands: text, clear, file monitor

use super::CmdResult;
use bwtool_core::{BusTransport, Engine, Width};

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime};

/// Display command register; writing 0xAA clears the screen
const REG_LCD_CMD: u8 = 0x10;
const LCD_CMD_CLS: u64 = 0xAA;
/// Cursor position register; line number goes in bits 5..7
const REG_LCD_CURSOR: u8 = 0x11;

/// Lines and columns of the supported character displays
const LCD_LINES: usize = 4;
const LCD_COLS: usize = 20;

/// Send the words, joined with spaces, as display text
pub fn run_text<T: BusTransport>(
    engine: &mut Engine<T>,
    reg: Option<u8>,
    words: &[String],
) -> CmdResult {
    engine.send_text(reg, &words.join(" "))?;
    Ok(())
}

/// Clear the display
pub fn run_cls<T: BusTransport>(engine: &mut Engine<T>) -> CmdResult {
    engine.write_reg(REG_LCD_CMD, LCD_CMD_CLS, Width::Byte)?;
    Ok(())
}

/// Keep pushing the first four lines of `file` to the display.
///
/// Polls the file's mtime at 250 ms and rewrites only lines that changed,
/// padded to the display width. Runs until interrupted.
pub fn run_monitor<T: BusTransport>(engine: &mut Engine<T>, file: &Path) -> CmdResult {
    let mut last_mtime = None;
    let mut shown: [String; LCD_LINES] = Default::default();

    log::info!("monitoring {}", file.display());
    loop {
        wait_for_change(file, &mut last_mtime)?;

        let content = fs::read_to_string(file)?;
        for (i, line) in content.lines().take(LCD_LINES).enumerate() {
            let mut line = line.to_string();
            while line.len() < LCD_COLS {
                line.push(' ');
            }
            line.truncate(LCD_COLS);

            if shown[i] != line {
                engine.write_reg(REG_LCD_CURSOR, (i << 5) as u64, Width::Byte)?;
                engine.send_text(None, &line)?;
                shown[i] = line;
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

/// Block until the file's modification time changes
fn wait_for_change(file: &Path, last: &mut Option<SystemTime>) -> std::io::Result<()> {
    loop {
        let mtime = fs::metadata(file)?.modified()?;
        if *last != Some(mtime) {
            *last = Some(mtime);
            return Ok(());
        }
        thread::sleep(Duration::from_millis(250));
    }
}
