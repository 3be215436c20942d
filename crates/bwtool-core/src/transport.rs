//! Physical transport abstraction
//!
//! Every supported medium (raw spidev, raw i2c-dev, USB-bridged SPI or I2C)
//! reduces to one primitive: exchange a fixed number of bytes with the
//! target. The engine builds frames into a buffer and hands it to the
//! transport together with the write and read lengths.

use crate::error::TransportError;

/// Largest frame the engine will put on a raw bus
pub const MAX_FRAME: usize = 0x100;

/// One physical binding to a bus
///
/// The convention mirrors SPI full-duplex semantics even on media that are
/// not full duplex: `buf[..wlen]` holds the outgoing frame, and after a
/// successful exchange the reply occupies `buf[wlen..wlen + rlen]`. Full
/// duplex transports overwrite the whole `buf[..wlen + rlen]` region with
/// the wire echo instead, so reply bytes land at the same offsets either
/// way.
///
/// Failures at this level are hard errors. Short reads and writes are never
/// retried here; a bus that drops bytes points at a wiring or configuration
/// fault, not a transient condition.
pub trait BusTransport {
    /// Exchange `wlen` outgoing and `rlen` incoming bytes through `buf`.
    ///
    /// `buf` must be at least `wlen + rlen` bytes; `rlen` may be 0.
    fn exchange(&mut self, buf: &mut [u8], wlen: usize, rlen: usize)
        -> Result<(), TransportError>;

    /// Whether the reply overwrites the transmit region (SPI-style echo)
    fn is_full_duplex(&self) -> bool;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn exchange(
        &mut self,
        buf: &mut [u8],
        wlen: usize,
        rlen: usize,
    ) -> Result<(), TransportError> {
        (**self).exchange(buf, wlen, rlen)
    }

    fn is_full_duplex(&self) -> bool {
        (**self).is_full_duplex()
    }
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn exchange(
        &mut self,
        buf: &mut [u8],
        wlen: usize,
        rlen: usize,
    ) -> Result<(), TransportError> {
        (**self).exchange(buf, wlen, rlen)
    }

    fn is_full_duplex(&self) -> bool {
        (**self).is_full_duplex()
    }
}
