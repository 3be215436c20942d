//! spidev device implementation
//!
//! Exchanges are a single full-duplex `SPI_IOC_MESSAGE` transfer with the
//! transmit and receive pointers aimed at the same buffer, so the reply
//! overwrites the frame in place. That is exactly the wire convention the
//! expansion boards expect.

use crate::error::{Result, SpidevError};

use bwtool_core::{BusTransport, TransportError};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Default SPI clock speed in Hz (100 kHz; the boards are slow)
const DEFAULT_SPEED_HZ: u32 = 100_000;

/// Default inter-word delay in microseconds
const DEFAULT_DELAY_USECS: u16 = 20;

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of struct spi_ioc_transfer (64-bit systems)
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate the ioctl number for SPI_IOC_MESSAGE(n)
    ///
    /// _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(struct spi_ioc_transfer)])
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        // _IOC(dir, type, nr, size) = (dir << 30) | (size << 16) | (type << 8) | nr
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    _pad: u8,
}

/// Configuration for opening a spidev device
#[derive(Debug, Clone)]
pub struct SpidevConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// SPI clock speed in Hz (default: 100 kHz)
    pub speed_hz: u32,
    /// Inter-word delay in microseconds (default: 20)
    pub delay_usecs: u16,
    /// SPI mode (0-3, default: 0)
    pub mode: u8,
}

impl Default for SpidevConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            speed_hz: DEFAULT_SPEED_HZ,
            delay_usecs: DEFAULT_DELAY_USECS,
            mode: 0,
        }
    }
}

impl SpidevConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the inter-word delay in microseconds
    pub fn with_delay(mut self, delay_usecs: u16) -> Self {
        self.delay_usecs = delay_usecs;
        self
    }
}

/// Directly wired SPI bus via the spidev interface
pub struct SpidevBus {
    file: File,
    speed_hz: u32,
    delay_usecs: u16,
}

impl SpidevBus {
    /// Open a spidev device with the given configuration
    pub fn open(config: &SpidevConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(SpidevError::NoDevice);
        }

        log::debug!("linux_spi: opening {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| SpidevError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        let fd = file.as_raw_fd();

        let mode = config.mode;
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode).map_err(|e| SpidevError::SetModeFailed {
                mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                SpidevError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        let speed = config.speed_hz;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(|e| SpidevError::SetSpeedFailed {
                speed,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        log::info!(
            "linux_spi: opened {} (mode={}, speed={} kHz, delay={} us)",
            config.device,
            mode,
            speed / 1000,
            config.delay_usecs
        );

        Ok(Self {
            file,
            speed_hz: speed,
            delay_usecs: config.delay_usecs,
        })
    }
}

impl BusTransport for SpidevBus {
    fn exchange(
        &mut self,
        buf: &mut [u8],
        wlen: usize,
        rlen: usize,
    ) -> std::result::Result<(), TransportError> {
        let len = wlen + rlen;
        let transfer = SpiIocTransfer {
            tx_buf: buf.as_ptr() as u64,
            rx_buf: buf.as_mut_ptr() as u64,
            len: len as u32,
            speed_hz: self.speed_hz,
            delay_usecs: self.delay_usecs,
            bits_per_word: 8,
            ..Default::default()
        };

        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                ioctl::spi_ioc_message(1),
                &transfer as *const SpiIocTransfer,
            )
        };
        if ret < 1 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }

        Ok(())
    }

    fn is_full_duplex(&self) -> bool {
        true
    }
}
