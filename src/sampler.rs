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

//! Test point vector sources

use crate::constants::gpio::{HOLD_LEVEL, SAMPLE_LEVEL};
use crate::error::Result;
use crate::hw::gpio::Gpio;
use crate::wiring::WiringModel;

/// Something that produces test point vectors
pub trait TpSource {
    /// Fill `dest` (indexed by test point) with the next vector. Returns `false`
    /// once the source is exhausted; `dest` is then left untouched.
    fn next_vector(&mut self, dest: &mut [u8]) -> Result<bool>;
}

/// Reads live test points through the sample-and-hold latch.
///
/// The exclusive borrow of the pin driver keeps anything else off the pins for
/// as long as the sampler exists.
pub struct HardwareSampler<'a, G: Gpio + ?Sized> {
    wiring: &'a WiringModel,
    gpio: &'a mut G,
}

impl<'a, G: Gpio + ?Sized> HardwareSampler<'a, G> {
    pub fn new(wiring: &'a WiringModel, gpio: &'a mut G) -> Self {
        Self { wiring, gpio }
    }

    /// Open the window, read every wire, close the window
    pub fn sample(&mut self, dest: &mut [u8]) -> Result<()> {
        self.gpio.write(self.wiring.hold_pin(), SAMPLE_LEVEL)?;
        let read = self.read_wires(dest);
        // Re-latch even when a read failed
        let hold = self.gpio.write(self.wiring.hold_pin(), HOLD_LEVEL);
        read.and(hold)
    }

    fn read_wires(&mut self, dest: &mut [u8]) -> Result<()> {
        for wire in self.wiring.wires() {
            let level = self.gpio.read(wire.pin)?;
            if let Some(slot) = dest.get_mut(wire.tp_index) {
                *slot = level.as_bit();
            }
        }
        Ok(())
    }
}

impl<G: Gpio + ?Sized> TpSource for HardwareSampler<'_, G> {
    fn next_vector(&mut self, dest: &mut [u8]) -> Result<bool> {
        self.sample(dest)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValvemonError;
    use crate::hw::gpio::{Level, MockGpio, NullGpio};
    use crate::test_utils::{two_tp_circuit, two_tp_wiring_document};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn wiring() -> WiringModel {
        let mut doc = two_tp_wiring_document();
        // X2 listed first so wire order differs from test point order
        doc.tps.reverse();
        WiringModel::build(&doc, &two_tp_circuit(), &mut NullGpio).unwrap()
    }

    #[test]
    fn test_sample_sequence_and_tp_ordering() {
        let wiring = wiring();
        let mut gpio = MockGpio::new();
        let mut seq = Sequence::new();
        gpio.expect_write()
            .with(eq(17), eq(Level::Low))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        // wire 0 is X2 on BCM 3, wire 1 is X1 on BCM 2
        gpio.expect_read()
            .with(eq(3))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Level::Low));
        gpio.expect_read()
            .with(eq(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Level::High));
        gpio.expect_write()
            .with(eq(17), eq(Level::High))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let mut sampler = HardwareSampler::new(&wiring, &mut gpio);
        let mut dest = [9u8; 2];
        assert!(sampler.next_vector(&mut dest).unwrap());
        assert_eq!(dest, [1, 0]);
    }

    #[test]
    fn test_failed_read_still_relatches() {
        let wiring = wiring();
        let mut gpio = MockGpio::new();
        let mut seq = Sequence::new();
        gpio.expect_write()
            .with(eq(17), eq(Level::Low))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        gpio.expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|pin| Err(ValvemonError::gpio(pin, "read failed")));
        gpio.expect_write()
            .with(eq(17), eq(Level::High))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let mut sampler = HardwareSampler::new(&wiring, &mut gpio);
        let mut dest = [0u8; 2];
        let err = sampler.next_vector(&mut dest).unwrap_err();
        assert!(matches!(err, ValvemonError::Gpio { pin: 3, .. }));
    }
}
