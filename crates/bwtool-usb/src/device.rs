//! USB bridge device implementations
//!
//! Both bus flavors share the same serial port setup (raw 8N1, no flow
//! control) and the same bounded-read helper; they differ in framing only.

use crate::error::{Result, UsbError};
use crate::protocol::*;

use bwtool_core::{BusTransport, TransportError};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Default baud rate; CDC-ACM bridges ignore it but the port needs one
const DEFAULT_BAUD: u32 = 115_200;

/// Configuration for opening a bridge
#[derive(Debug, Clone)]
pub struct UsbConfig {
    /// Serial device path (e.g., "/dev/ttyACM0")
    pub device: String,
    /// Baud rate (default 115200)
    pub baud: u32,
    /// RS485 addressing (SPI bridge only)
    pub rs485: Rs485Ids,
}

impl UsbConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud: DEFAULT_BAUD,
            rs485: Rs485Ids::default(),
        }
    }

    /// Set the RS485 forwarding ids
    pub fn with_rs485(mut self, rs485: Rs485Ids) -> Self {
        self.rs485 = rs485;
        self
    }
}

fn open_port(config: &UsbConfig) -> Result<Box<dyn SerialPort>> {
    if config.device.is_empty() {
        return Err(UsbError::NoDevice);
    }

    let port = serialport::new(&config.device, config.baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(READ_TIMEOUT_MS))
        .open()
        .map_err(|e| UsbError::OpenFailed {
            path: config.device.clone(),
            source: e,
        })?;

    log::info!("usb: opened {}", config.device);
    Ok(port)
}

/// Read exactly `buf.len()` bytes within the port timeout.
///
/// A timeout mid-frame surfaces as a short read; the bridge protocol treats
/// that as fatal, there is no way to resynchronize a half-received frame.
fn read_exact_bounded(port: &mut dyn SerialPort, buf: &mut [u8]) -> std::result::Result<(), TransportError> {
    let mut nread = 0;
    while nread < buf.len() {
        match port.read(&mut buf[nread..]) {
            Ok(0) => break,
            Ok(n) => nread += n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
            Err(e) => return Err(TransportError::Io(e)),
        }
    }
    if nread != buf.len() {
        return Err(TransportError::Short {
            dir: "read",
            got: nread,
            want: buf.len(),
        });
    }
    Ok(())
}

/// SPI transactions relayed through the serial bridge
pub struct UsbSpiBus {
    port: Box<dyn SerialPort>,
    rs485: Rs485Ids,
}

impl UsbSpiBus {
    /// Open a bridge carrying SPI with the given configuration
    pub fn open(config: &UsbConfig) -> Result<Self> {
        let port = open_port(config)?;
        if let Some(remote) = config.rs485.remote {
            log::debug!(
                "usb: forwarding via RS485 {} -> {}",
                config.rs485.local,
                remote
            );
        }
        Ok(Self {
            port,
            rs485: config.rs485,
        })
    }
}

impl BusTransport for UsbSpiBus {
    fn exchange(
        &mut self,
        buf: &mut [u8],
        wlen: usize,
        rlen: usize,
    ) -> std::result::Result<(), TransportError> {
        let len = wlen + rlen;
        let header = spi_request_header(self.rs485, len as u8);
        self.port.write_all(&header).map_err(TransportError::Io)?;
        self.port.write_all(&buf[..len]).map_err(TransportError::Io)?;

        let mut hdr = [0u8; 4];
        read_exact_bounded(self.port.as_mut(), &mut hdr)?;
        check_spi_response_header(&hdr, len as u8)?;

        // The bridge returns the full-duplex echo of the whole frame
        read_exact_bounded(self.port.as_mut(), &mut buf[..len])?;
        Ok(())
    }

    fn is_full_duplex(&self) -> bool {
        true
    }
}

/// I2C transactions relayed through the serial bridge
pub struct UsbI2cBus {
    port: Box<dyn SerialPort>,
}

impl UsbI2cBus {
    /// Open a bridge carrying I2C with the given configuration
    pub fn open(config: &UsbConfig) -> Result<Self> {
        Ok(Self {
            port: open_port(config)?,
        })
    }
}

impl BusTransport for UsbI2cBus {
    fn exchange(
        &mut self,
        buf: &mut [u8],
        wlen: usize,
        rlen: usize,
    ) -> std::result::Result<(), TransportError> {
        let header = i2c_request_header(wlen as u8, rlen as u8);
        self.port.write_all(&header).map_err(TransportError::Io)?;
        self.port
            .write_all(&buf[..wlen])
            .map_err(TransportError::Io)?;

        let mut hdr = [0u8; 3];
        read_exact_bounded(self.port.as_mut(), &mut hdr)?;
        check_i2c_response_header(&hdr, rlen as u8)?;

        read_exact_bounded(self.port.as_mut(), &mut buf[wlen..wlen + rlen])?;
        Ok(())
    }

    fn is_full_duplex(&self) -> bool {
        false
    }
}
