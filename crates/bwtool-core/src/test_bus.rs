//! Scripted in-memory transport for engine tests

use crate::error::TransportError;
use crate::transport::BusTransport;
use std::collections::VecDeque;

/// Replays queued replies, one per exchange, recording every sent frame.
///
/// Full-duplex instances overwrite the buffer from offset 0 the way a real
/// SPI echo would; half-duplex instances place the reply after the written
/// frame. An exhausted queue leaves the buffer untouched (an absent board).
pub(crate) struct MockBus {
    full_duplex: bool,
    pub(crate) sent: Vec<Vec<u8>>,
    replies: VecDeque<Vec<u8>>,
}

impl MockBus {
    pub(crate) fn full_duplex() -> Self {
        Self {
            full_duplex: true,
            sent: Vec::new(),
            replies: VecDeque::new(),
        }
    }

    pub(crate) fn half_duplex() -> Self {
        Self {
            full_duplex: false,
            ..Self::full_duplex()
        }
    }

    pub(crate) fn push_reply(&mut self, bytes: &[u8]) {
        self.replies.push_back(bytes.to_vec());
    }
}

impl BusTransport for MockBus {
    fn exchange(
        &mut self,
        buf: &mut [u8],
        wlen: usize,
        rlen: usize,
    ) -> Result<(), TransportError> {
        self.sent.push(buf[..wlen].to_vec());
        if let Some(reply) = self.replies.pop_front() {
            if self.full_duplex {
                let n = reply.len().min(wlen + rlen);
                buf[..n].copy_from_slice(&reply[..n]);
            } else {
                let n = reply.len().min(rlen);
                buf[wlen..wlen + n].copy_from_slice(&reply[..n]);
            }
        }
        Ok(())
    }

    fn is_full_duplex(&self) -> bool {
        self.full_duplex
    }
}
