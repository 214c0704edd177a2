/*
 * Test utilities for Valvemon
 *
 * Shared fixtures: a two test point chassis, matching wiring and calibration
 * documents, and helpers for writing them to temporary files.
 */

use std::collections::BTreeMap;
use std::io::Write;

use tempfile::NamedTempFile;

use crate::calibration::{CalibrationDocument, CalibrationEntry};
use crate::circuit::{CircuitDocument, CircuitModel, TruthRowDocument};
use crate::model::TestPoint;
use crate::wiring::{WiringDocument, WiringEntry};

/// A test point accepting thresholds across the full 0..5 V range
pub fn tp(name: &str, valve: u32, input: bool) -> TestPoint {
    TestPoint {
        name: name.to_string(),
        valve,
        min: 0.0,
        max: 5.0,
        input,
    }
}

/// X1 is an input (valve 3), X2 an output (valve 7) that must be the inverse of X1
pub fn two_tp_document() -> CircuitDocument {
    CircuitDocument {
        test_points: vec![tp("X1", 3, true), tp("X2", 7, false)],
        truth_table: vec![
            TruthRowDocument {
                inputs: BTreeMap::from([("X1".to_string(), 1)]),
                outputs: BTreeMap::from([("X2".to_string(), 0)]),
            },
            TruthRowDocument {
                inputs: BTreeMap::from([("X1".to_string(), 0)]),
                outputs: BTreeMap::from([("X2".to_string(), 1)]),
            },
        ],
    }
}

pub fn two_tp_circuit() -> CircuitModel {
    CircuitModel::from_document(two_tp_document()).unwrap()
}

pub fn wiring_entry(id: &str, pin: i64, resistor: &str) -> WiringEntry {
    WiringEntry {
        id: Some(id.to_string()),
        pin: Some(pin),
        attenuation: None,
        resistor: Some(resistor.to_string()),
    }
}

/// Hold on physical pin 11 (BCM 17); X1 on pin 3 (BCM 2) at chip 0 stream A;
/// X2 on pin 5 (BCM 3) at chip 0 stream B
pub fn two_tp_wiring_document() -> WiringDocument {
    WiringDocument {
        hold_pin: Some(11),
        tps: vec![wiring_entry("X1", 3, "0A"), wiring_entry("X2", 5, "0B")],
    }
}

pub fn calibration_entry(id: &str, threshold: f32) -> CalibrationEntry {
    CalibrationEntry {
        id: Some(id.to_string()),
        threshold: Some(threshold),
    }
}

/// X1 at 2.5 V, X2 at 1.0 V
pub fn two_tp_calibration_document() -> CalibrationDocument {
    CalibrationDocument {
        tps: vec![calibration_entry("X1", 2.5), calibration_entry("X2", 1.0)],
    }
}

/// Write `contents` to a fresh temporary file
pub fn temp_file_with(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
