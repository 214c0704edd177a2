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

//! Constants and configuration values for Valvemon
//!
//! Centralizes magic numbers, device paths and command-line defaults.

/// Resistor ladder (digital potentiometer) encoding
pub mod dac {
    /// Comparator reference voltage at a wiper setting of zero
    pub const FULL_SCALE_VOLTS: f32 = 5.0;

    /// Largest wiper code
    pub const MAX_CODE: f32 = 255.0;

    /// High nibble of every "write data" command byte; the low bits carry the stream tag
    pub const WRITE_COMMAND: u8 = 0x10;

    /// Bytes clocked into each chip of a daisy chain (command + data)
    pub const BYTES_PER_CHIP: usize = 2;

    /// Longest daisy chain addressable from the wiring file
    pub const MAX_RESISTOR_CHIPS: usize = 64;
}

/// GPIO pin levels and sysfs layout
pub mod gpio {
    use crate::hw::gpio::Level;

    /// Hold pin level that freezes the sample-and-hold latch
    pub const HOLD_LEVEL: Level = Level::High;

    /// Hold pin level that opens the sampling window
    pub const SAMPLE_LEVEL: Level = Level::Low;

    /// Linux sysfs GPIO class directory
    pub const SYSFS_ROOT: &str = "/sys/class/gpio";

    /// Highest physical pin on the 40-pin header
    pub const MAX_PHYSICAL_PIN: i64 = 40;
}

/// SPI bus used for the resistor chains
pub mod spi {
    pub const DEFAULT_CHANNEL: u8 = 0;

    /// Bus clock in Hz
    pub const DEFAULT_SPEED_HZ: u32 = 50_000;

    pub const BITS_PER_WORD: u8 = 8;

    /// Clock polarity/phase mode 0
    pub const MODE: u8 = 0;

    pub fn device_path(channel: u8) -> std::path::PathBuf {
        std::path::PathBuf::from(format!("/dev/spidev0.{}", channel))
    }
}

/// Input limits
pub mod limits {
    /// Largest configuration document accepted (1 MB)
    pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

    /// Largest replay file accepted (64 MB)
    pub const MAX_REPLAY_FILE_SIZE: u64 = 64 * 1024 * 1024;

    /// Longest test point name accepted in a chassis file
    pub const MAX_TP_NAME_LEN: usize = 64;
}

/// Monitor loop tuning
pub mod monitor {
    /// Consecutive sample failures between repeated warnings
    pub const MAX_CONSECUTIVE_ERRORS: u32 = 1000;
}

/// Command-line defaults
pub mod defaults {
    pub const CONFIG_DIR: &str = "config";
    pub const CHASSIS_FILE: &str = "circuit.json";
    pub const WIRING_FILE: &str = "wiring.json";
    pub const CALIBRATION_FILE: &str = "calibrate.json";
    pub const TX_ADDRESS: &str = "127.0.0.1";
    pub const TX_PORT: u16 = 2000;

    /// Environment variable holding the tracing filter
    pub const LOG_ENV: &str = "VALVEMON_LOG";
    pub const LOG_LEVEL: &str = "info";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spi_device_path() {
        assert_eq!(spi::device_path(0), std::path::PathBuf::from("/dev/spidev0.0"));
        assert_eq!(spi::device_path(1), std::path::PathBuf::from("/dev/spidev0.1"));
    }

    #[test]
    fn test_hold_and_sample_levels_differ() {
        assert_ne!(gpio::HOLD_LEVEL, gpio::SAMPLE_LEVEL);
    }
}
