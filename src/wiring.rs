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

//! Wiring between test points, GPIO pins and resistor ladder chips
//!
//! The wiring document names the hold pin and, for every test point, the header
//! pin it is read on, an optional attenuation and the resistor address that sets
//! its comparator threshold. Validation stops at the first problem; nothing is
//! returned and no pin is touched unless the whole document is valid.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::load_document;
use crate::constants;
use crate::error::{Result, ValvemonError};
use crate::hw::gpio::{phys_pin_to_gpio, Gpio, PinMode};
use crate::model::BehaviouralModel;

/// One of the two daisy chains sharing the SPI bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    A,
    B,
}

impl Stream {
    pub const ALL: [Stream; 2] = [Stream::A, Stream::B];

    /// Tag carried in the low bits of the command byte
    pub fn tag(self) -> u8 {
        match self {
            Stream::A => 1,
            Stream::B => 2,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Stream::A => 'A',
            Stream::B => 'B',
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Position of a wire's resistor in the chains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResistorAddress {
    pub chip: usize,
    pub stream: Stream,
}

impl ResistorAddress {
    /// Parse `<chip><letter>`, e.g. `0A` or `12b`. `A`/`a` selects stream A;
    /// any other letter selects stream B.
    pub fn parse(text: &str) -> Option<Self> {
        let digits_end = text
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)?;
        if digits_end == 0 {
            return None;
        }
        let chip = text[..digits_end].parse().ok()?;
        let mut rest = text[digits_end..].chars();
        let letter = rest.next()?;
        if !letter.is_ascii_alphabetic() || rest.next().is_some() {
            return None;
        }
        let stream = if letter.eq_ignore_ascii_case(&'a') {
            Stream::A
        } else {
            Stream::B
        };
        Some(Self { chip, stream })
    }
}

impl fmt::Display for ResistorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.chip, self.stream)
    }
}

/// One test point to pin connection
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    pub tp_index: usize,
    /// BCM GPIO number
    pub pin: u32,
    pub attenuation: f32,
    pub resistor: ResistorAddress,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WiringDocument {
    pub hold_pin: Option<i64>,
    #[serde(default)]
    pub tps: Vec<WiringEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WiringEntry {
    pub id: Option<String>,
    pub pin: Option<i64>,
    pub attenuation: Option<f32>,
    pub resistor: Option<String>,
}

fn translate_pin(raw: i64, what: &str) -> Result<u32> {
    if raw <= 0 {
        return Err(ValvemonError::config(format!(
            "{} {} is not a positive pin number",
            what, raw
        )));
    }
    phys_pin_to_gpio(raw).ok_or_else(|| {
        ValvemonError::config(format!("{} {} refers to an invalid pin", what, raw))
    })
}

/// Accumulates validated wires. Dropping it on any error discards the partial state.
pub struct WiringBuilder<'m> {
    model: &'m dyn BehaviouralModel,
    hold_pin: Option<u32>,
    wires: Vec<Wire>,
    by_tp: Vec<Option<usize>>,
}

impl<'m> WiringBuilder<'m> {
    pub fn new(model: &'m dyn BehaviouralModel) -> Self {
        Self {
            model,
            hold_pin: None,
            wires: Vec::with_capacity(model.tp_count()),
            by_tp: vec![None; model.tp_count()],
        }
    }

    pub fn hold_pin(&mut self, raw: Option<i64>) -> Result<&mut Self> {
        let raw = raw.ok_or_else(|| ValvemonError::config("wiring has no hold_pin attribute"))?;
        self.hold_pin = Some(translate_pin(raw, "hold_pin")?);
        Ok(self)
    }

    pub fn add(&mut self, position: usize, entry: &WiringEntry) -> Result<&mut Self> {
        let id = entry.id.as_deref().ok_or_else(|| {
            ValvemonError::config(format!("wiring entry {} has no id", position))
        })?;
        let raw_pin = entry.pin.ok_or_else(|| {
            ValvemonError::config(format!("wiring entry {} ({}) has no pin", position, id))
        })?;
        let raw_resistor = entry.resistor.as_deref().ok_or_else(|| {
            ValvemonError::config(format!("wiring entry {} ({}) has no resistor", position, id))
        })?;

        let tp_index = self.model.tp_index(id).ok_or_else(|| {
            ValvemonError::config(format!(
                "wiring entry {} refers to unknown test point {}",
                position, id
            ))
        })?;
        if self.by_tp[tp_index].is_some() {
            return Err(ValvemonError::config(format!(
                "wiring entry {} wires test point {} a second time",
                position, id
            )));
        }

        let pin = translate_pin(raw_pin, &format!("wiring entry {} ({}) pin", position, id))?;

        let attenuation = match entry.attenuation {
            None => 1.0,
            Some(a) if a.is_finite() && a > 0.0 => a,
            Some(a) => {
                return Err(ValvemonError::config(format!(
                    "wiring entry {} ({}) has invalid attenuation {}",
                    position, id, a
                )))
            }
        };

        let resistor = ResistorAddress::parse(raw_resistor).ok_or_else(|| {
            ValvemonError::config(format!(
                "wiring entry {} ({}) resistor {:?} could not be parsed",
                position, id, raw_resistor
            ))
        })?;
        if resistor.chip >= constants::dac::MAX_RESISTOR_CHIPS {
            return Err(ValvemonError::config(format!(
                "wiring entry {} ({}) resistor chip {} is beyond the last chip ({})",
                position,
                id,
                resistor.chip,
                constants::dac::MAX_RESISTOR_CHIPS - 1
            )));
        }

        self.by_tp[tp_index] = Some(self.wires.len());
        self.wires.push(Wire {
            tp_index,
            pin,
            attenuation,
            resistor,
        });
        Ok(self)
    }

    /// Check completeness, then configure the pins. The hold pin becomes an
    /// output at its hold level and every wire pin an input.
    pub fn finish<G: Gpio + ?Sized>(self, gpio: &mut G) -> Result<WiringModel> {
        let hold_pin = self
            .hold_pin
            .ok_or_else(|| ValvemonError::config("wiring has no hold_pin attribute"))?;
        if self.wires.len() != self.model.tp_count() {
            return Err(ValvemonError::config(format!(
                "wiring covers {} test points but the chassis defines {}",
                self.wires.len(),
                self.model.tp_count()
            )));
        }

        let resistor_chip_count = self
            .wires
            .iter()
            .map(|w| w.resistor.chip + 1)
            .max()
            .unwrap_or(0);

        gpio.set_mode(
            hold_pin,
            PinMode::Output {
                initial: constants::gpio::HOLD_LEVEL,
            },
        )?;
        for wire in &self.wires {
            gpio.set_mode(wire.pin, PinMode::Input)?;
        }

        debug!(
            "Wiring ready: {} wires, {} resistor chips, hold on GPIO {}",
            self.wires.len(),
            resistor_chip_count,
            hold_pin
        );

        Ok(WiringModel {
            wires: self.wires,
            hold_pin,
            resistor_chip_count,
            by_tp: self.by_tp,
        })
    }
}

/// Validated wiring, read-only once built
#[derive(Debug, Clone)]
pub struct WiringModel {
    wires: Vec<Wire>,
    hold_pin: u32,
    resistor_chip_count: usize,
    by_tp: Vec<Option<usize>>,
}

impl WiringModel {
    pub fn load<G: Gpio + ?Sized>(
        path: &Path,
        model: &dyn BehaviouralModel,
        gpio: &mut G,
    ) -> Result<Self> {
        let doc: WiringDocument = load_document(path)?;
        Self::build(&doc, model, gpio)
    }

    pub fn build<G: Gpio + ?Sized>(
        doc: &WiringDocument,
        model: &dyn BehaviouralModel,
        gpio: &mut G,
    ) -> Result<Self> {
        let mut builder = WiringBuilder::new(model);
        builder.hold_pin(doc.hold_pin)?;
        for (position, entry) in doc.tps.iter().enumerate() {
            builder.add(position, entry)?;
        }
        builder.finish(gpio)
    }

    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    pub fn wire(&self, index: usize) -> Option<&Wire> {
        self.wires.get(index)
    }

    pub fn len(&self) -> usize {
        self.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }

    /// BCM number of the sample-and-hold control pin
    pub fn hold_pin(&self) -> u32 {
        self.hold_pin
    }

    /// One more than the highest chip index used by any wire
    pub fn resistor_chip_count(&self) -> usize {
        self.resistor_chip_count
    }

    /// Position of the wire serving test point `tp_index`
    pub fn wire_index_for_tp(&self, tp_index: usize) -> Option<usize> {
        self.by_tp.get(tp_index).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::gpio::{Level, MockGpio, NullGpio};
    use crate::test_utils::{two_tp_circuit, two_tp_wiring_document, wiring_entry};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn build(doc: &WiringDocument) -> Result<WiringModel> {
        WiringModel::build(doc, &two_tp_circuit(), &mut NullGpio)
    }

    fn config_message(result: Result<WiringModel>) -> String {
        match result {
            Err(ValvemonError::ConfigValidation(msg)) => msg,
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("wiring unexpectedly valid"),
        }
    }

    #[test]
    fn test_resistor_address_parse() {
        assert_eq!(
            ResistorAddress::parse("0A"),
            Some(ResistorAddress { chip: 0, stream: Stream::A })
        );
        assert_eq!(
            ResistorAddress::parse("12a"),
            Some(ResistorAddress { chip: 12, stream: Stream::A })
        );
        assert_eq!(
            ResistorAddress::parse("3b"),
            Some(ResistorAddress { chip: 3, stream: Stream::B })
        );
        // Any letter other than A selects stream B
        assert_eq!(
            ResistorAddress::parse("1Z"),
            Some(ResistorAddress { chip: 1, stream: Stream::B })
        );
        assert_eq!(ResistorAddress::parse("A"), None);
        assert_eq!(ResistorAddress::parse("4"), None);
        assert_eq!(ResistorAddress::parse("4AB"), None);
        assert_eq!(ResistorAddress::parse("4-"), None);
        assert_eq!(ResistorAddress::parse("-1A"), None);
        assert_eq!(ResistorAddress::parse(""), None);
    }

    #[test]
    fn test_resistor_address_display() {
        let addr = ResistorAddress { chip: 7, stream: Stream::B };
        assert_eq!(addr.to_string(), "7B");
        assert_eq!(Stream::A.tag(), 1);
        assert_eq!(Stream::B.tag(), 2);
    }

    #[test]
    fn test_valid_wiring() {
        let wiring = build(&two_tp_wiring_document()).unwrap();
        assert_eq!(wiring.len(), 2);
        assert_eq!(wiring.hold_pin(), 17);
        assert_eq!(wiring.resistor_chip_count(), 1);
        assert_eq!(wiring.wire(0).unwrap().pin, 2);
        assert_eq!(wiring.wire(1).unwrap().pin, 3);
        assert_eq!(wiring.wire(0).unwrap().attenuation, 1.0);
    }

    #[test]
    fn test_wire_index_is_bijection() {
        let mut doc = two_tp_wiring_document();
        doc.tps.reverse();
        let wiring = build(&doc).unwrap();
        assert_eq!(wiring.wire_index_for_tp(0), Some(1));
        assert_eq!(wiring.wire_index_for_tp(1), Some(0));
        assert_eq!(wiring.wire_index_for_tp(2), None);
        for (index, wire) in wiring.wires().iter().enumerate() {
            assert_eq!(wiring.wire_index_for_tp(wire.tp_index), Some(index));
        }
    }

    #[test]
    fn test_chip_count_uses_highest_chip() {
        let mut doc = two_tp_wiring_document();
        doc.tps[1].resistor = Some("4b".into());
        let wiring = build(&doc).unwrap();
        assert_eq!(wiring.resistor_chip_count(), 5);
    }

    #[test]
    fn test_hold_pin_required_and_valid() {
        let mut doc = two_tp_wiring_document();
        doc.hold_pin = None;
        assert!(config_message(build(&doc)).contains("hold_pin"));

        doc.hold_pin = Some(0);
        assert!(config_message(build(&doc)).contains("positive"));

        doc.hold_pin = Some(6); // ground
        assert!(config_message(build(&doc)).contains("invalid pin"));
    }

    #[test]
    fn test_missing_attributes() {
        let mut doc = two_tp_wiring_document();
        doc.tps[0].id = None;
        assert!(config_message(build(&doc)).contains("has no id"));

        let mut doc = two_tp_wiring_document();
        doc.tps[1].pin = None;
        assert!(config_message(build(&doc)).contains("has no pin"));

        let mut doc = two_tp_wiring_document();
        doc.tps[1].resistor = None;
        assert!(config_message(build(&doc)).contains("has no resistor"));
    }

    #[test]
    fn test_unknown_and_duplicate_tp() {
        let mut doc = two_tp_wiring_document();
        doc.tps[1] = wiring_entry("X9", 5, "0B");
        assert!(config_message(build(&doc)).contains("unknown test point X9"));

        let mut doc = two_tp_wiring_document();
        doc.tps[1] = wiring_entry("X1", 5, "0B");
        assert!(config_message(build(&doc)).contains("second time"));
    }

    #[test]
    fn test_bad_pin_and_attenuation() {
        let mut doc = two_tp_wiring_document();
        doc.tps[0].pin = Some(-2);
        assert!(config_message(build(&doc)).contains("not a positive pin"));

        let mut doc = two_tp_wiring_document();
        doc.tps[0].pin = Some(41);
        assert!(config_message(build(&doc)).contains("invalid pin"));

        for bad in [0.0, -1.5, f32::NAN] {
            let mut doc = two_tp_wiring_document();
            doc.tps[0].attenuation = Some(bad);
            assert!(config_message(build(&doc)).contains("attenuation"));
        }
    }

    #[test]
    fn test_malformed_resistor() {
        let mut doc = two_tp_wiring_document();
        doc.tps[0].resistor = Some("A0".into());
        assert!(config_message(build(&doc)).contains("could not be parsed"));
    }

    #[test]
    fn test_resistor_chip_out_of_range() {
        for resistor in ["18446744073709551615A", "3000000000A", "64B"] {
            let mut doc = two_tp_wiring_document();
            doc.tps[1].resistor = Some(resistor.into());
            let msg = config_message(build(&doc));
            assert!(msg.contains("wiring entry 1 (X2)"), "{}", msg);
            assert!(msg.contains("beyond the last chip (63)"), "{}", msg);
        }

        let mut doc = two_tp_wiring_document();
        doc.tps[1].resistor = Some("63B".into());
        assert_eq!(build(&doc).unwrap().resistor_chip_count(), 64);
    }

    #[test]
    fn test_wire_count_mismatch() {
        let mut doc = two_tp_wiring_document();
        doc.tps.pop();
        assert!(config_message(build(&doc)).contains("covers 1 test points"));
    }

    #[test]
    fn test_validation_order_reports_first_problem() {
        // Missing pin on entry 0 wins over the unknown id on entry 1
        let mut doc = two_tp_wiring_document();
        doc.tps[0].pin = None;
        doc.tps[1].id = Some("nope".into());
        assert!(config_message(build(&doc)).contains("entry 0"));
    }

    #[test]
    fn test_invalid_wiring_touches_no_pins() {
        let mut gpio = MockGpio::new();
        gpio.expect_set_mode().never();
        let mut doc = two_tp_wiring_document();
        doc.tps.pop();
        assert!(WiringModel::build(&doc, &two_tp_circuit(), &mut gpio).is_err());
    }

    #[test]
    fn test_finish_configures_hold_then_wires() {
        let mut gpio = MockGpio::new();
        let mut seq = Sequence::new();
        gpio.expect_set_mode()
            .with(eq(17), eq(PinMode::Output { initial: Level::High }))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        gpio.expect_set_mode()
            .with(eq(2), eq(PinMode::Input))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        gpio.expect_set_mode()
            .with(eq(3), eq(PinMode::Input))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        WiringModel::build(&two_tp_wiring_document(), &two_tp_circuit(), &mut gpio).unwrap();
    }

    #[test]
    fn test_gpio_failure_aborts_construction() {
        let mut gpio = MockGpio::new();
        gpio.expect_set_mode()
            .returning(|pin, _| Err(ValvemonError::gpio(pin, "busy")));
        let err = WiringModel::build(&two_tp_wiring_document(), &two_tp_circuit(), &mut gpio)
            .unwrap_err();
        assert!(err.is_hardware());
    }

    #[test]
    fn test_document_rejects_unknown_fields() {
        let json = r#"{"hold_pin": 11, "tps": [], "extra": 1}"#;
        assert!(serde_json::from_str::<WiringDocument>(json).is_err());
        let json = r#"{"hold_pin": 11, "tps": [{"id": "X1", "pin": 3, "resistor": "0A", "colour": "red"}]}"#;
        assert!(serde_json::from_str::<WiringDocument>(json).is_err());
    }
}
