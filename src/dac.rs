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

//! Resistor ladder encoding and the calibration writer
//!
//! The digital potentiometers form two daisy chains (streams A and B) on one SPI
//! bus. Each chip takes a command byte and a data byte; the first pair clocked
//! out ends up in the chip furthest down the chain, so chip 0 occupies the end
//! of the buffer.

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::calibration::CalibrationModel;
use crate::constants::dac;
use crate::error::Result;
use crate::hw::spi::SpiBus;
use crate::wiring::{Stream, WiringModel};

/// Wiper code for a threshold voltage. The ladder inverts: 0 V is full scale.
pub fn resistance_byte(threshold: f32, attenuation: f32) -> u8 {
    let fraction = 1.0 - (threshold / attenuation) / dac::FULL_SCALE_VOLTS;
    (fraction * dac::MAX_CODE).round().clamp(0.0, dac::MAX_CODE) as u8
}

/// Build the bus buffer for one stream. Chips with no threshold on this stream
/// get a zero command/data pair.
pub fn encode_stream(wiring: &WiringModel, calibration: &CalibrationModel, stream: Stream) -> Vec<u8> {
    let chips = wiring.resistor_chip_count();
    let mut data = vec![0u8; chips * dac::BYTES_PER_CHIP];
    let command = dac::WRITE_COMMAND | stream.tag();

    for threshold in calibration.thresholds() {
        let Some(wire) = wiring.wire(threshold.wire_index) else {
            continue;
        };
        if wire.resistor.stream != stream {
            continue;
        }
        let from_end = chips - 1 - wire.resistor.chip;
        let offset = from_end * dac::BYTES_PER_CHIP;
        data[offset] = command;
        data[offset + 1] = resistance_byte(threshold.value, wire.attenuation);
    }
    data
}

/// Sends calibration to the resistor chains. Every transmit holds the bus lock.
pub struct DacWriter<S: SpiBus> {
    bus: Mutex<S>,
}

impl<S: SpiBus> DacWriter<S> {
    pub fn new(bus: S) -> Self {
        Self { bus: Mutex::new(bus) }
    }

    /// Encode and transmit one stream as a single bus transaction
    pub fn write_stream(
        &self,
        wiring: &WiringModel,
        calibration: &CalibrationModel,
        stream: Stream,
    ) -> Result<()> {
        let mut data = encode_stream(wiring, calibration, stream);
        debug!("Stream {}: {:02x?}", stream, data);
        self.bus.lock().transfer(&mut data)
    }

    /// Transmit stream A, then stream B
    pub fn write_out_calibration(&self, wiring: &WiringModel, calibration: &CalibrationModel) -> Result<()> {
        for stream in Stream::ALL {
            self.write_stream(wiring, calibration, stream)?;
        }
        info!(
            "Calibration written: {} thresholds across {} resistor chips",
            calibration.thresholds().len(),
            wiring.resistor_chip_count()
        );
        Ok(())
    }

    /// Update one threshold and retransmit only the stream it lives on. A rejected
    /// update transmits nothing.
    pub fn set_and_write_threshold(
        &self,
        wiring: &WiringModel,
        calibration: &mut CalibrationModel,
        tp_index: usize,
        value: f32,
    ) -> Result<()> {
        let stream = calibration.set_threshold(wiring, tp_index, value)?;
        self.write_stream(wiring, calibration, stream)
    }
}
