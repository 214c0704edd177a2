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

//! GPIO access
//!
//! Pins are addressed by their BCM (logical) number. Configuration files use
//! physical header numbering, translated with [`phys_pin_to_gpio`].
//!
//! The Linux backend drives the sysfs GPIO class:
//! - `export` / `unexport` claim and release a pin
//! - `gpioN/direction` takes `in`, `low` or `high` (the latter two select output
//!   and set the initial level without a glitch)
//! - `gpioN/value` reads or writes `0` / `1`

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::constants;
use crate::error::{Result, ValvemonError};

/// Attempts to open a freshly exported pin while udev fixes up permissions
const EXPORT_RETRIES: u32 = 20;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn as_bit(self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output { initial: Level },
}

/// Digital pin driver
#[cfg_attr(test, mockall::automock)]
pub trait Gpio {
    fn set_mode(&mut self, pin: u32, mode: PinMode) -> Result<()>;
    fn write(&mut self, pin: u32, level: Level) -> Result<()>;
    fn read(&mut self, pin: u32) -> Result<Level>;
}

/// BCM numbers for physical pins 1..=40 of the Raspberry Pi header (index 0 unused).
/// `None` marks power and ground pins.
const PHYS_TO_GPIO: [Option<u32>; 41] = [
    None,
    None, None,         // 1: 3.3V, 2: 5V
    Some(2), None,      // 3, 4: 5V
    Some(3), None,      // 5, 6: GND
    Some(4), Some(14),  // 7, 8
    None, Some(15),     // 9: GND, 10
    Some(17), Some(18), // 11, 12
    Some(27), None,     // 13, 14: GND
    Some(22), Some(23), // 15, 16
    None, Some(24),     // 17: 3.3V, 18
    Some(10), None,     // 19, 20: GND
    Some(9), Some(25),  // 21, 22
    Some(11), Some(8),  // 23, 24
    None, Some(7),      // 25: GND, 26
    Some(0), Some(1),   // 27, 28: ID EEPROM
    Some(5), None,      // 29, 30: GND
    Some(6), Some(12),  // 31, 32
    Some(13), None,     // 33, 34: GND
    Some(19), Some(16), // 35, 36
    Some(26), Some(20), // 37, 38
    None, Some(21),     // 39: GND, 40
];

/// Translate a physical header pin number to its BCM GPIO number
pub fn phys_pin_to_gpio(phys: i64) -> Option<u32> {
    if !(1..=constants::gpio::MAX_PHYSICAL_PIN).contains(&phys) {
        return None;
    }
    PHYS_TO_GPIO[phys as usize]
}

/// Pin driver that touches nothing. Used for replay runs and configuration dumps.
#[derive(Debug, Default)]
pub struct NullGpio;

impl Gpio for NullGpio {
    fn set_mode(&mut self, _pin: u32, _mode: PinMode) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, _pin: u32, _level: Level) -> Result<()> {
        Ok(())
    }

    fn read(&mut self, _pin: u32) -> Result<Level> {
        Ok(Level::Low)
    }
}

/// Linux sysfs GPIO driver. On drop, output pins are returned to the level they
/// were configured with and every pin exported through it is unexported.
pub struct SysfsGpio {
    root: PathBuf,
    exported: Vec<u32>,
    outputs: Vec<(u32, Level)>,
    values: HashMap<u32, File>,
}

impl SysfsGpio {
    pub fn new() -> Result<Self> {
        Self::with_root(constants::gpio::SYSFS_ROOT)
    }

    /// Open a GPIO class directory other than the system one
    pub fn with_root(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.join("export").exists() {
            return Err(ValvemonError::FileNotFound(root.join("export")));
        }
        Ok(Self {
            root,
            exported: Vec::new(),
            outputs: Vec::new(),
            values: HashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    fn export(&mut self, pin: u32) -> Result<()> {
        if self.pin_dir(pin).exists() {
            return Ok(());
        }
        fs::write(self.root.join("export"), pin.to_string())
            .map_err(|e| ValvemonError::gpio(pin, format!("export failed: {}", e)))?;
        self.exported.push(pin);
        debug!("Exported GPIO {}", pin);
        Ok(())
    }

    fn write_direction(&self, pin: u32, direction: &str) -> Result<()> {
        let path = self.pin_dir(pin).join("direction");
        let mut last_err = None;
        for _ in 0..EXPORT_RETRIES {
            match fs::write(&path, direction) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_err = Some(e);
                    thread::sleep(EXPORT_RETRY_DELAY);
                }
            }
        }
        let reason = last_err.map(|e| e.to_string()).unwrap_or_default();
        Err(ValvemonError::gpio(pin, format!("failed to set direction {}: {}", direction, reason)))
    }

    fn value_file(&mut self, pin: u32) -> Result<&mut File> {
        if !self.values.contains_key(&pin) {
            let path = self.pin_dir(pin).join("value");
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|e| ValvemonError::gpio(pin, format!("cannot open {}: {}", path.display(), e)))?;
            self.values.insert(pin, file);
        }
        self.values
            .get_mut(&pin)
            .ok_or_else(|| ValvemonError::gpio(pin, "value file not open"))
    }
}

impl Gpio for SysfsGpio {
    fn set_mode(&mut self, pin: u32, mode: PinMode) -> Result<()> {
        self.export(pin)?;
        let direction = match mode {
            PinMode::Input => "in",
            PinMode::Output { initial: Level::Low } => "low",
            PinMode::Output { initial: Level::High } => "high",
        };
        self.write_direction(pin, direction)?;
        self.value_file(pin)?;
        self.outputs.retain(|&(p, _)| p != pin);
        if let PinMode::Output { initial } = mode {
            self.outputs.push((pin, initial));
        }
        Ok(())
    }

    fn write(&mut self, pin: u32, level: Level) -> Result<()> {
        let file = self.value_file(pin)?;
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(if level == Level::High { b"1" } else { b"0" }))
            .map_err(|e| ValvemonError::gpio(pin, format!("write failed: {}", e)))
    }

    fn read(&mut self, pin: u32) -> Result<Level> {
        let file = self.value_file(pin)?;
        let mut buf = [0u8; 2];
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read(&mut buf))
            .map_err(|e| ValvemonError::gpio(pin, format!("read failed: {}", e)))
            .and_then(|n| match (n, buf[0]) {
                (0, _) => Err(ValvemonError::gpio(pin, "empty value file")),
                (_, b'0') => Ok(Level::Low),
                (_, b'1') => Ok(Level::High),
                (_, other) => Err(ValvemonError::gpio(
                    pin,
                    format!("unexpected value {:?}", other as char),
                )),
            })
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        for (pin, level) in std::mem::take(&mut self.outputs) {
            if let Err(e) = self.write(pin, level) {
                warn!("Failed to restore GPIO {}: {}", pin, e);
            }
        }
        self.values.clear();
        for pin in self.exported.drain(..) {
            if let Err(e) = fs::write(self.root.join("unexport"), pin.to_string()) {
                warn!("Failed to unexport GPIO {}: {}", pin, e);
            }
        }
    }
}
