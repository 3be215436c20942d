//! Bus selection and opening
//!
//! Maps CLI flags (or the device path, when no flag forces a transport) to
//! one of the four physical bindings and returns it boxed for the engine.

use crate::cli::Cli;
use bwtool_core::BusTransport;

/// The four physical bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Spi,
    I2c,
    UsbSpi,
    UsbI2c,
}

impl BusKind {
    /// Device path used when none is given
    pub fn default_device(self) -> &'static str {
        match self {
            BusKind::Spi => "/dev/spidev0.0",
            BusKind::I2c => "/dev/i2c-0",
            BusKind::UsbSpi | BusKind::UsbI2c => "/dev/ttyACM0",
        }
    }
}

/// Pick the raw transport from a device path: anything mentioning i2c is
/// I2C, everything else SPI
pub fn auto_kind(path: &str) -> BusKind {
    if path.contains("i2c") {
        BusKind::I2c
    } else {
        BusKind::Spi
    }
}

/// Resolve the transport: explicit flags win over path sniffing
pub fn select_kind(cli: &Cli) -> BusKind {
    if cli.usb_spi {
        BusKind::UsbSpi
    } else if cli.usb_i2c {
        BusKind::UsbI2c
    } else if cli.i2c {
        BusKind::I2c
    } else if let Some(device) = &cli.device {
        auto_kind(device)
    } else {
        BusKind::Spi
    }
}

/// Open the selected transport.
///
/// `speed` is the effective SPI clock after any read clamping by the caller.
pub fn open_bus(
    cli: &Cli,
    speed: Option<u32>,
) -> Result<Box<dyn BusTransport>, Box<dyn std::error::Error>> {
    let kind = select_kind(cli);
    let device = cli
        .device
        .clone()
        .unwrap_or_else(|| kind.default_device().to_string());

    match kind {
        #[cfg(feature = "linux-spi")]
        BusKind::Spi => {
            use bwtool_linux_spi::{SpidevBus, SpidevConfig};

            let mut config = SpidevConfig::new(device).with_delay(cli.delay);
            if let Some(speed) = speed {
                config = config.with_speed(speed);
            }
            let bus = SpidevBus::open(&config).map_err(|e| {
                format!(
                    "Failed to open SPI device: {}\n\
                     Make sure the device exists and you have read/write permissions.",
                    e
                )
            })?;
            Ok(Box::new(bus))
        }

        #[cfg(feature = "linux-i2c")]
        BusKind::I2c => {
            use bwtool_linux_i2c::{I2cDevBus, I2cDevConfig};

            let bus = I2cDevBus::open(&I2cDevConfig::new(device)).map_err(|e| {
                format!(
                    "Failed to open I2C device: {}\n\
                     Make sure the device exists and you have read/write permissions.",
                    e
                )
            })?;
            Ok(Box::new(bus))
        }

        #[cfg(feature = "usb")]
        BusKind::UsbSpi => {
            use bwtool_usb::{Rs485Ids, UsbConfig, UsbSpiBus};

            let (local, remote) = cli.rs485_ids.unwrap_or((0, None));
            let config = UsbConfig::new(device).with_rs485(Rs485Ids { local, remote });
            let bus = UsbSpiBus::open(&config)
                .map_err(|e| format!("Failed to open USB bridge: {}", e))?;
            Ok(Box::new(bus))
        }

        #[cfg(feature = "usb")]
        BusKind::UsbI2c => {
            use bwtool_usb::{UsbConfig, UsbI2cBus};

            let bus = UsbI2cBus::open(&UsbConfig::new(device))
                .map_err(|e| format!("Failed to open USB bridge: {}", e))?;
            Ok(Box::new(bus))
        }

        #[allow(unreachable_patterns)]
        other => Err(format!(
            "{:?} support not compiled in (recompile with the matching feature)",
            other
        )
        .into()),
    }
}
