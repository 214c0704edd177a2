/*
 * This file is part of Valvemon.
 *
 * Copyright (C) 2025 Valvemon contributors
 *
 * Valvemon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Valvemon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Valvemon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Hardware access
//!
//! - `gpio` - pin drivers (sysfs, no-op) and physical pin translation
//! - `spi` - the spidev bus carrying the resistor chain streams
//!
//! [`Hardware`] is the single handle through which the process reaches real
//! devices. Dropping it releases every exported pin and closes the bus.

pub mod gpio;
pub mod spi;

use std::path::PathBuf;

use tracing::info;

use crate::error::Result;

pub use gpio::{phys_pin_to_gpio, Gpio, Level, NullGpio, PinMode, SysfsGpio};
pub use spi::{SpiBus, Spidev};

/// Where to find the devices
#[derive(Debug, Clone)]
pub struct HardwareConfig {
    pub gpio_root: PathBuf,
    pub spi_channel: u8,
    pub spi_speed_hz: u32,
}

/// Live GPIO and SPI devices
pub struct Hardware {
    pub gpio: SysfsGpio,
    pub spi: Spidev,
}

impl Hardware {
    /// Open the GPIO class and the SPI bus. Either failing is fatal to startup.
    pub fn open(config: &HardwareConfig) -> Result<Self> {
        let gpio = SysfsGpio::with_root(&config.gpio_root)?;
        let spi = Spidev::open(config.spi_channel, config.spi_speed_hz)?;
        info!(
            "Hardware ready: GPIO at {}, SPI {} at {} Hz",
            gpio.root().display(),
            spi.path().display(),
            config.spi_speed_hz
        );
        Ok(Self { gpio, spi })
    }
}
