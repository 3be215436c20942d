//! i2c-dev device implementation
//!
//! The frame's leading address byte is consumed by the `I2C_SLAVE` ioctl
//! rather than transmitted; the kernel puts the address (and the R/W bit)
//! on the wire itself. The reply, when requested, is a separate blocking
//! read.

use crate::error::{I2cDevError, Result};

use bwtool_core::{BusTransport, TransportError};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

mod ioctl {
    use nix::ioctl_write_int_bad;
    use nix::libc;

    /// I2C_SLAVE from linux/i2c-dev.h
    const I2C_SLAVE: libc::c_int = 0x0703;

    ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);
}

/// Configuration for opening an i2c-dev device
#[derive(Debug, Clone)]
pub struct I2cDevConfig {
    /// Device path (e.g., "/dev/i2c-0")
    pub device: String,
}

impl I2cDevConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

/// Directly wired I2C bus via the i2c-dev interface
pub struct I2cDevBus {
    file: File,
    /// Last address programmed into the adapter; skips the ioctl when the
    /// target has not changed between transactions
    last_slave: Option<u8>,
}

impl I2cDevBus {
    /// Open an i2c-dev device with the given configuration
    pub fn open(config: &I2cDevConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(I2cDevError::NoDevice);
        }

        log::debug!("linux_i2c: opening {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| I2cDevError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        log::info!("linux_i2c: opened {}", config.device);

        Ok(Self {
            file,
            last_slave: None,
        })
    }

    fn set_slave(&mut self, addr_byte: u8) -> std::result::Result<(), TransportError> {
        if self.last_slave == Some(addr_byte) {
            return Ok(());
        }
        let fd = self.file.as_raw_fd();
        unsafe {
            ioctl::i2c_set_slave(fd, libc::c_int::from(addr_byte >> 1)).map_err(|e| {
                TransportError::Io(std::io::Error::from_raw_os_error(e as i32))
            })?;
        }
        self.last_slave = Some(addr_byte);
        Ok(())
    }
}

impl BusTransport for I2cDevBus {
    fn exchange(
        &mut self,
        buf: &mut [u8],
        wlen: usize,
        rlen: usize,
    ) -> std::result::Result<(), TransportError> {
        self.set_slave(buf[0])?;

        let fd = self.file.as_raw_fd();

        // Leading address byte is not transmitted; the adapter sends it
        let out = &buf[1..wlen];
        let written =
            unsafe { libc::write(fd, out.as_ptr() as *const libc::c_void, out.len()) };
        if written < 0 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        if written as usize != out.len() {
            return Err(TransportError::Short {
                dir: "write",
                got: written as usize,
                want: out.len(),
            });
        }

        if rlen > 0 {
            let dst = &mut buf[wlen..wlen + rlen];
            let got =
                unsafe { libc::read(fd, dst.as_mut_ptr() as *mut libc::c_void, dst.len()) };
            if got < 0 {
                return Err(TransportError::Io(std::io::Error::last_os_error()));
            }
            if got as usize != rlen {
                return Err(TransportError::Short {
                    dir: "read",
                    got: got as usize,
                    want: rlen,
                });
            }
        }

        Ok(())
    }

    fn is_full_duplex(&self) -> bool {
        false
    }
}
