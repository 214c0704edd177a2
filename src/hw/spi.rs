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

//! SPI bus access through the Linux spidev driver

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants;
use crate::error::{Result, ValvemonError};

// ioctl request codes from <linux/spi/spidev.h>: _IOW('k', nr, size)
const SPI_IOC_WR_MODE: u32 = 0x4001_6B01;
const SPI_IOC_WR_BITS_PER_WORD: u32 = 0x4001_6B03;
const SPI_IOC_WR_MAX_SPEED_HZ: u32 = 0x4004_6B04;
/// SPI_IOC_MESSAGE(1)
const SPI_IOC_MESSAGE_1: u32 = 0x4020_6B00;

/// One entry of an SPI_IOC_MESSAGE array (`struct spi_ioc_transfer`)
#[repr(C)]
#[derive(Debug, Default)]
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
    pad: u8,
}

/// Byte-oriented bus. `transfer` is full duplex: the buffer is clocked out and
/// overwritten with whatever the bus clocked back in.
#[cfg_attr(test, mockall::automock)]
pub trait SpiBus {
    fn transfer(&mut self, data: &mut [u8]) -> Result<()>;
}

/// `/dev/spidev0.<channel>` opened in mode 0 with 8-bit words
pub struct Spidev {
    file: File,
    path: PathBuf,
    speed_hz: u32,
}

impl Spidev {
    pub fn open(channel: u8, speed_hz: u32) -> Result<Self> {
        Self::open_path(constants::spi::device_path(channel), speed_hz)
    }

    pub fn open_path(path: impl Into<PathBuf>, speed_hz: u32) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ValvemonError::spi(&path, format!("open failed: {}", e)))?;
        let dev = Self { file, path, speed_hz };

        dev.ioctl_write(SPI_IOC_WR_MODE, &constants::spi::MODE, "set mode")?;
        dev.ioctl_write(SPI_IOC_WR_BITS_PER_WORD, &constants::spi::BITS_PER_WORD, "set bits per word")?;
        dev.ioctl_write(SPI_IOC_WR_MAX_SPEED_HZ, &speed_hz, "set speed")?;

        debug!("Opened {} at {} Hz", dev.path.display(), speed_hz);
        Ok(dev)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ioctl_write<T>(&self, request: u32, value: &T, what: &str) -> Result<()> {
        // SAFETY: the fd is owned by self.file and stays open for the call; `value`
        // points to a live value of the size encoded in `request`.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, value as *const T) };
        if rc < 0 {
            return Err(ValvemonError::spi(
                &self.path,
                format!("{} failed: {}", what, std::io::Error::last_os_error()),
            ));
        }
        Ok(())
    }
}

impl SpiBus for Spidev {
    fn transfer(&mut self, data: &mut [u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let len = u32::try_from(data.len()).map_err(|_| {
            ValvemonError::spi(&self.path, format!("transfer of {} bytes is too long", data.len()))
        })?;
        let xfer = SpiIocTransfer {
            tx_buf: data.as_ptr() as u64,
            rx_buf: data.as_mut_ptr() as u64,
            len,
            speed_hz: self.speed_hz,
            bits_per_word: constants::spi::BITS_PER_WORD,
            ..Default::default()
        };
        self.ioctl_write(SPI_IOC_MESSAGE_1, &xfer, "transfer")
    }
}
