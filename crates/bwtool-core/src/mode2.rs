//! The mode2 reliability overlay
//!
//! On short bus runs the basic protocol is fine, but SPI links of a meter or
//! more see enough bit errors that blind trust stops working. mode2 wraps
//! each transaction with a per-session transaction id and a CRC16 trailer,
//! polls for the reply, and re-polls while the target reports busy.
//!
//! Validation mismatches (address echo, tid echo, checksum) are logged as
//! warnings and never abort the process: the data is decoded best-effort and
//! the operator judges success from the output. Only transport failures are
//! fatal.

use crate::crc::crc16;
use crate::engine::{Engine, REG_IDENT};
use crate::error::Result;
use crate::frame::{ascii_until_nul, get_le, put_le, ReadSpec, WriteSpec};
use crate::transport::BusTransport;
use std::thread;
use std::time::Duration;

/// Read-request opcode
pub const OP_READ: u8 = 0xC1;
/// Write-request opcode
pub const OP_WRITE: u8 = 0xC2;
/// Ack status on read and identify replies
pub const ACK_READ: u8 = 0xAA;
/// Ack status on write replies
pub const ACK_WRITE: u8 = 0xCC;
/// Target is still assembling the reply
pub const STATUS_BUSY: u8 = 0xBB;
/// Target saw a checksum mismatch on our request
pub const STATUS_BAD_CRC: u8 = 0xEE;

/// Poll attempts per read before giving up on a busy target
const MAX_TRIES: u32 = 5;
/// Identify payload length
const IDENT_LEN: usize = 0x18;
/// Frames past this size may overrun the target's transaction buffer
const TARGET_BUF_HINT: usize = 32;

// Reply layout, counting from the start of the poll buffer. Offset 0 is the
// echo slot of the poll's own address byte; the target's answer starts at 1.
const R_ADDR: usize = 1;
const R_STATUS: usize = 2;
const R_TID: usize = 3;
const R_PAYLOAD: usize = 4;

impl<T: BusTransport> Engine<T> {
    /// Read a list of registers in one reliable transaction.
    ///
    /// Request: `[addr][0xC1][tid]{[len][reg]}*[crc16]`. The reply is
    /// polled after a short settle delay and re-polled while the target
    /// answers busy. Decoded values come back in request order.
    pub fn mode2_read(&mut self, specs: &[ReadSpec]) -> Result<Vec<u64>> {
        let tid = self.session_tid()?;
        let mut frame = vec![self.addr, OP_READ, tid];
        let mut rlen = 0;
        for spec in specs {
            rlen += spec.width.len();
            frame.push(spec.width.len() as u8);
            frame.push(spec.reg);
        }
        append_crc(&mut frame);
        warn_oversize(frame.len());
        let flen = frame.len();
        self.transfer(&mut frame, flen, 0)?;

        let mut reply = vec![0u8; rlen + 6];
        let mut tries = 0;
        loop {
            thread::sleep(Duration::from_micros(100));
            reply.fill(0);
            reply[0] = self.addr | 1;
            let rl = reply.len();
            self.transfer(&mut reply, rl, 0)?;
            tries += 1;
            if reply[R_STATUS] != STATUS_BUSY || tries >= MAX_TRIES {
                break;
            }
        }
        if tries > 1 {
            log::warn!("required {} tries", tries);
        }
        warn_oversize(reply.len());

        if reply[R_ADDR] != self.addr {
            log::warn!("didn't return addr: {:02x}", reply[R_ADDR]);
        }
        if reply[R_STATUS] != ACK_READ {
            log::warn!("didn't get ack response: {:02x}", reply[R_STATUS]);
        }
        if reply[R_TID] != tid {
            log::warn!("didn't get tid back: {:02x}/{:02x}", reply[R_TID], tid);
        }
        let crc = crc16(0, &reply[R_ADDR..R_PAYLOAD + rlen]);
        let wire_crc = get_le(&reply[R_PAYLOAD + rlen..R_PAYLOAD + rlen + 2]);
        if wire_crc != u64::from(crc) {
            log::warn!("bad crc: {:04x}/{:04x}", wire_crc, crc);
        }

        let mut values = Vec::with_capacity(specs.len());
        let mut bp = R_PAYLOAD;
        for spec in specs {
            values.push(get_le(&reply[bp..bp + spec.width.len()]));
            bp += spec.width.len();
        }
        Ok(values)
    }

    /// Write a list of registers in one reliable transaction.
    ///
    /// Request: `[addr][0xC2][tid]{[len][reg][value]}*[crc16]`. The 8-byte
    /// write-ack is validated but, like all mode2 mismatches, failures only
    /// warn.
    pub fn mode2_write(&mut self, specs: &[WriteSpec]) -> Result<()> {
        let tid = self.session_tid()?;
        let mut frame = vec![self.addr, OP_WRITE, tid];
        for spec in specs {
            frame.push(spec.width.len() as u8);
            frame.push(spec.reg);
            let start = frame.len();
            frame.resize(start + spec.width.len(), 0);
            put_le(&mut frame[start..], spec.value);
        }
        append_crc(&mut frame);
        warn_oversize(frame.len());
        let flen = frame.len();
        self.transfer(&mut frame, flen, 0)?;

        thread::sleep(Duration::from_micros(100));
        let mut reply = [0u8; 8];
        reply[0] = self.addr | 1;
        self.transfer(&mut reply, 8, 0)?;

        if reply[R_ADDR] != self.addr {
            log::warn!("didn't return addr: {:02x}", reply[R_ADDR]);
        }
        if reply[R_TID] != tid {
            log::warn!("didn't get tid back: {:02x}/{:02x}", reply[R_TID], tid);
        }
        match reply[R_STATUS] {
            ACK_WRITE => {
                let crc = crc16(0, &reply[R_ADDR..R_ADDR + 3]);
                let wire_crc = get_le(&reply[4..6]);
                if wire_crc != u64::from(crc) {
                    log::warn!("invalid checksum on write-ack: {:04x}/{:04x}", crc, wire_crc);
                }
            }
            STATUS_BAD_CRC => {
                log::warn!(
                    "target rejected request checksum, expected {:02x}{:02x}",
                    reply[4],
                    reply[3]
                );
            }
            other => log::warn!("unexpected reply type: {:02x}", other),
        }
        Ok(())
    }

    /// Reliable identify of an arbitrary address.
    ///
    /// Used directly for `identify` (with `report` set, so mismatches warn)
    /// and by the mode2 scan (silent; a validation failure just means the
    /// address is absent). Returns `None` when the reply failed validation.
    pub(crate) fn mode2_identify(&mut self, addr: u8, report: bool) -> Result<Option<String>> {
        let tid = self.session_tid()?;
        let mut frame = vec![addr, OP_READ, tid, IDENT_LEN as u8, REG_IDENT];
        append_crc(&mut frame);
        let flen = frame.len();
        self.transfer(&mut frame, flen, 0)?;

        // Ident takes the target noticeably longer than a register fetch
        thread::sleep(Duration::from_micros(700));
        let mut reply = vec![0u8; IDENT_LEN + 7];
        reply[0] = addr | 1;
        let rl = reply.len();
        self.transfer(&mut reply, rl, 0)?;

        if reply[R_ADDR] != addr {
            if report {
                log::warn!("ident: didn't get addr back: {:02x}", reply[R_ADDR]);
            }
            return Ok(None);
        }
        if reply[R_STATUS] != ACK_READ {
            if report {
                log::warn!("ident: didn't get read ack: {:02x}", reply[R_STATUS]);
            }
            return Ok(None);
        }
        if reply[R_TID] != tid {
            if report {
                log::warn!("ident: didn't get tid: {:02x}/{:02x}", reply[R_TID], tid);
            }
            return Ok(None);
        }
        let crc = crc16(0, &reply[R_ADDR..R_PAYLOAD + IDENT_LEN]);
        let wire_crc = get_le(&reply[R_PAYLOAD + IDENT_LEN..R_PAYLOAD + IDENT_LEN + 2]);
        if wire_crc != u64::from(crc) {
            if report {
                log::warn!("ident: invalid crc: {:04x}/{:04x}", wire_crc, crc);
            }
            return Ok(None);
        }

        Ok(Some(ascii_until_nul(
            &reply[R_PAYLOAD..R_PAYLOAD + IDENT_LEN],
        )))
    }
}

/// Append the CRC16 of the frame so far, low byte first
fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(0, frame);
    frame.push(crc as u8);
    frame.push((crc >> 8) as u8);
}

/// Old board firmware has a 32-byte transaction buffer
fn warn_oversize(len: usize) {
    if len > TARGET_BUF_HINT + 1 {
        log::warn!("transfer of {} > 32 bytes; target may not support this", len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Capabilities, EngineConfig};
    use crate::frame::Width;
    use crate::test_bus::MockBus;

    /// Engine config with mode2 on and a pinned tid of 5
    fn config(dir: &tempfile::TempDir) -> EngineConfig {
        let tid_file = dir.path().join("tid");
        std::fs::write(&tid_file, "5\n").unwrap();
        EngineConfig::new(0x82)
            .with_caps(Capabilities::MODE2)
            .with_tid_file(tid_file)
    }

    /// A validated read reply carrying `payload`
    fn read_reply(tid: u8, payload: &[u8]) -> Vec<u8> {
        let mut reply = vec![0u8];
        reply.extend_from_slice(&[0x82, ACK_READ, tid]);
        reply.extend_from_slice(payload);
        let crc = crc16(0, &reply[1..]);
        reply.push(crc as u8);
        reply.push((crc >> 8) as u8);
        reply
    }

    #[test]
    fn test_identify_request_is_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let mut bus = MockBus::full_duplex();
        bus.push_reply(&[]);
        let mut ident = vec![0u8; IDENT_LEN + 7];
        ident[1] = 0x82;
        ident[2] = ACK_READ;
        ident[3] = 5;
        ident[4..11].copy_from_slice(b"dio 1.4");
        let crc = crc16(0, &ident[1..IDENT_LEN + 4]);
        ident[IDENT_LEN + 4] = crc as u8;
        ident[IDENT_LEN + 5] = (crc >> 8) as u8;
        bus.push_reply(&ident);

        {
            let mut engine = Engine::new(&mut bus, config(&dir));
            let text = engine.identify().unwrap();
            assert_eq!(text.as_deref(), Some("dio 1.4"));
        }
        // Known-good wire trace: addr, opcode, tid, len, reg, crc16 LE
        assert_eq!(bus.sent[0], [0x82, 0xC1, 0x05, 0x18, 0x01, 0x5D, 0x94]);
        assert_eq!(bus.sent[1][0], 0x83);
    }

    #[test]
    fn test_identify_rejects_wrong_tid() {
        let dir = tempfile::tempdir().unwrap();
        let mut bus = MockBus::full_duplex();
        bus.push_reply(&[]);
        let mut ident = read_reply(6, &[b'x'; IDENT_LEN]);
        ident.push(0);
        bus.push_reply(&ident);

        let mut engine = Engine::new(&mut bus, config(&dir));
        assert_eq!(engine.identify().unwrap(), None);
    }

    #[test]
    fn test_write_request_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut bus = MockBus::full_duplex();
        bus.push_reply(&[]);
        let mut ack = vec![0u8, 0x82, ACK_WRITE, 5];
        let crc = crc16(0, &ack[1..4]);
        ack.push(crc as u8);
        ack.push((crc >> 8) as u8);
        ack.extend_from_slice(&[0, 0]);
        bus.push_reply(&ack);

        {
            let mut engine = Engine::new(&mut bus, config(&dir));
            engine
                .mode2_write(&[WriteSpec {
                    reg: 0x10,
                    width: Width::Byte,
                    value: 0xAA,
                }])
                .unwrap();
        }

        let frame = &bus.sent[0];
        assert_eq!(frame[..6], [0x82, 0xC2, 0x05, 0x01, 0x10, 0xAA]);
        // CRC of the reference write request, low byte first
        assert_eq!(&frame[6..], [0x7D, 0xDA]);

        // Decoding the request recovers the (register, value) pair
        let (len, reg) = (frame[3] as usize, frame[4]);
        assert_eq!((reg, get_le(&frame[5..5 + len])), (0x10, 0xAA));
        // The trailer matches a recomputation over the body
        assert_eq!(
            get_le(&frame[6..8]),
            u64::from(crc16(0, &frame[..6]))
        );
    }

    #[test]
    fn test_read_decodes_in_request_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut bus = MockBus::full_duplex();
        bus.push_reply(&[]);
        bus.push_reply(&read_reply(5, &[0x11, 0x22, 0x33]));

        let mut engine = Engine::new(&mut bus, config(&dir));
        let values = engine
            .mode2_read(&[
                ReadSpec {
                    reg: 0x10,
                    width: Width::Byte,
                },
                ReadSpec {
                    reg: 0x20,
                    width: Width::Word,
                },
            ])
            .unwrap();
        assert_eq!(values, [0x11, 0x3322]);
    }

    #[test]
    fn test_busy_retry_succeeds_within_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut bus = MockBus::full_duplex();
        bus.push_reply(&[]);
        for _ in 0..4 {
            bus.push_reply(&[0, 0x82, STATUS_BUSY, 5, 0, 0, 0]);
        }
        bus.push_reply(&read_reply(5, &[0x2A]));

        {
            let mut engine = Engine::new(&mut bus, config(&dir));
            let values = engine
                .mode2_read(&[ReadSpec {
                    reg: 0x20,
                    width: Width::Byte,
                }])
                .unwrap();
            assert_eq!(values, [0x2A]);
        }
        // One request plus exactly five polls
        assert_eq!(bus.sent.len(), 6);
    }

    #[test]
    fn test_busy_forever_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let mut bus = MockBus::full_duplex();
        bus.push_reply(&[]);
        for _ in 0..8 {
            bus.push_reply(&[0, 0x82, STATUS_BUSY, 5, 0, 0, 0]);
        }

        {
            let mut engine = Engine::new(&mut bus, config(&dir));
            // Soft failure: warnings only, decoded best-effort
            engine
                .mode2_read(&[ReadSpec {
                    reg: 0x20,
                    width: Width::Byte,
                }])
                .unwrap();
        }
        // The poll loop stops at the 5-try budget
        assert_eq!(bus.sent.len(), 6);
    }

    #[test]
    fn test_scan_reports_only_validated_replies() {
        let dir = tempfile::tempdir().unwrap();
        let mut bus = MockBus::full_duplex();
        // 128 probes, two exchanges each; answer only for address 0x04
        // (probe index 2), and with a corrupt checksum for address 0x06
        for i in 0..128u16 {
            bus.push_reply(&[]);
            if i == 2 {
                let mut ident = vec![0u8; IDENT_LEN + 7];
                ident[1] = 0x04;
                ident[2] = ACK_READ;
                ident[3] = 5;
                ident[4..7].copy_from_slice(b"fet");
                let crc = crc16(0, &ident[1..IDENT_LEN + 4]);
                ident[IDENT_LEN + 4] = crc as u8;
                ident[IDENT_LEN + 5] = (crc >> 8) as u8;
                bus.push_reply(&ident);
            } else if i == 3 {
                let mut ident = vec![0u8; IDENT_LEN + 7];
                ident[1] = 0x06;
                ident[2] = ACK_READ;
                ident[3] = 5;
                bus.push_reply(&ident);
            } else {
                bus.push_reply(&[]);
            }
        }

        let mut engine = Engine::new(&mut bus, config(&dir));
        let hits = engine.scan().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].addr, 0x04);
        assert_eq!(hits[0].text, "fet");
    }
}
