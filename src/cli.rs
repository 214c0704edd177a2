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

//! Command Line Interface

use std::path::PathBuf;

use clap::Parser;

use crate::constants::{defaults, gpio, spi};
use crate::hw::HardwareConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "valvemon")]
#[command(version)]
#[command(about = "Valvemon - test point monitor for valve computer replicas")]
#[command(long_about = "Valvemon - test point monitor for valve computer replicas

Writes comparator thresholds to the resistor ladder chains, then samples every
test point through the sample-and-hold latch and checks each change against the
chassis truth table. Failures are sent to the monitoring station or echoed.

EXAMPLES:
    valvemon                                   Monitor live hardware
    valvemon --no-up-network                   Monitor, printing alerts
    valvemon --read-config                     Print the parsed configuration
    valvemon --test-sample-file run.csv --no-up-network
                                               Replay recorded samples

ENVIRONMENT VARIABLES:
    VALVEMON_LOG=debug     Log level (trace, debug, info, warn, error)")]
pub struct Options {
    /// The directory in which to look for configuration files
    #[arg(long, value_name = "DIRECTORY", default_value = defaults::CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// The chassis (test points and truth table) file within the configuration directory
    #[arg(long, value_name = "FILENAME", default_value = defaults::CHASSIS_FILE)]
    pub chassis_file: PathBuf,

    /// The wiring file within the configuration directory
    #[arg(long, value_name = "FILENAME", default_value = defaults::WIRING_FILE)]
    pub wiring_file: PathBuf,

    /// The calibration file within the configuration directory
    #[arg(long, value_name = "FILENAME", default_value = defaults::CALIBRATION_FILE)]
    pub calibration_file: PathBuf,

    /// The IP address of the monitoring station
    #[arg(long, value_name = "ADDRESS", default_value = defaults::TX_ADDRESS)]
    pub tx_addr: String,

    /// The UDP port of the monitoring station
    #[arg(long, value_name = "PORT", default_value_t = defaults::TX_PORT)]
    pub tx_port: u16,

    /// Do not relay any error messages to the monitoring station and simply echo them
    #[arg(long)]
    pub no_up_network: bool,

    /// Echo the parsed contents of the configuration files and exit
    #[arg(long)]
    pub read_config: bool,

    /// A CSV file of samples to replay instead of sampling the GPIO pins
    #[arg(long, value_name = "FILENAME")]
    pub test_sample_file: Option<PathBuf>,

    /// SPI chip select carrying the resistor chains
    #[arg(long, value_name = "CHANNEL", default_value_t = spi::DEFAULT_CHANNEL)]
    pub spi_channel: u8,

    /// SPI clock in Hz
    #[arg(long, value_name = "HZ", default_value_t = spi::DEFAULT_SPEED_HZ)]
    pub spi_speed: u32,

    /// sysfs GPIO class directory
    #[arg(long, value_name = "DIRECTORY", default_value = gpio::SYSFS_ROOT)]
    pub gpio_root: PathBuf,

    /// Append structured JSON events (alerts, startup, shutdown) to this file
    #[arg(long, value_name = "FILE")]
    pub event_log: Option<PathBuf>,
}

impl Options {
    pub fn chassis_path(&self) -> PathBuf {
        self.config_dir.join(&self.chassis_file)
    }

    pub fn wiring_path(&self) -> PathBuf {
        self.config_dir.join(&self.wiring_file)
    }

    pub fn calibration_path(&self) -> PathBuf {
        self.config_dir.join(&self.calibration_file)
    }

    pub fn is_replay(&self) -> bool {
        self.test_sample_file.is_some()
    }

    pub fn hardware_config(&self) -> HardwareConfig {
        HardwareConfig {
            gpio_root: self.gpio_root.clone(),
            spi_channel: self.spi_channel,
            spi_speed_hz: self.spi_speed,
        }
    }
}
