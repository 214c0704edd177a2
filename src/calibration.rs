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

//! Comparator thresholds, one per wire

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::load_document;
use crate::error::{Result, ValvemonError};
use crate::model::BehaviouralModel;
use crate::wiring::{Stream, WiringModel};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalibrationDocument {
    #[serde(default)]
    pub tps: Vec<CalibrationEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalibrationEntry {
    pub id: Option<String>,
    pub threshold: Option<f32>,
}

/// Threshold voltage for the wire at `wire_index`
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub wire_index: usize,
    pub value: f32,
    /// Bounds declared for the test point, kept for runtime updates
    min: f32,
    max: f32,
}

impl Threshold {
    fn accepts(&self, volts: f32) -> bool {
        volts.is_finite() && volts >= self.min && volts <= self.max
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationModel {
    thresholds: Vec<Threshold>,
}

impl CalibrationModel {
    pub fn load(path: &Path, model: &dyn BehaviouralModel, wiring: &WiringModel) -> Result<Self> {
        let doc: CalibrationDocument = load_document(path)?;
        Self::from_document(&doc, model, wiring)
    }

    pub fn from_document(
        doc: &CalibrationDocument,
        model: &dyn BehaviouralModel,
        wiring: &WiringModel,
    ) -> Result<Self> {
        let mut thresholds: Vec<Threshold> = Vec::with_capacity(doc.tps.len());

        for (position, entry) in doc.tps.iter().enumerate() {
            let id = entry.id.as_deref().ok_or_else(|| {
                ValvemonError::config(format!("calibration entry {} has no id", position))
            })?;
            let value = entry.threshold.ok_or_else(|| {
                ValvemonError::config(format!(
                    "calibration entry {} ({}) has no threshold",
                    position, id
                ))
            })?;
            let tp_index = model.tp_index(id).ok_or_else(|| {
                ValvemonError::config(format!(
                    "calibration entry {} refers to unknown test point {}",
                    position, id
                ))
            })?;
            let wire_index = wiring.wire_index_for_tp(tp_index).ok_or_else(|| {
                ValvemonError::config(format!(
                    "calibration entry {} refers to test point {} which is not wired",
                    position, id
                ))
            })?;
            if thresholds.iter().any(|t| t.wire_index == wire_index) {
                return Err(ValvemonError::config(format!(
                    "calibration entry {} sets test point {} a second time",
                    position, id
                )));
            }
            let tp = model.test_point(tp_index).ok_or_else(|| {
                ValvemonError::config(format!("test point {} has no definition", id))
            })?;
            if !tp.accepts_threshold(value) {
                return Err(ValvemonError::config(format!(
                    "calibration entry {} ({}) threshold {} is outside [{}, {}]",
                    position, id, value, tp.min, tp.max
                )));
            }

            thresholds.push(Threshold {
                wire_index,
                value,
                min: tp.min,
                max: tp.max,
            });
        }

        if thresholds.len() != model.tp_count() {
            return Err(ValvemonError::config(format!(
                "calibration sets {} thresholds but the chassis defines {} test points",
                thresholds.len(),
                model.tp_count()
            )));
        }

        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// Current threshold for the wire at `wire_index`
    pub fn value_for_wire(&self, wire_index: usize) -> Option<f32> {
        self.thresholds
            .iter()
            .find(|t| t.wire_index == wire_index)
            .map(|t| t.value)
    }

    /// Replace the threshold for test point `tp_index`. The value must lie
    /// within the bounds the test point declared when the model was built.
    /// Returns the stream that now needs flushing.
    pub fn set_threshold(&mut self, wiring: &WiringModel, tp_index: usize, value: f32) -> Result<Stream> {
        let wire_index = wiring.wire_index_for_tp(tp_index).ok_or_else(|| {
            ValvemonError::config(format!("test point index {} is not wired", tp_index))
        })?;
        let wire = wiring.wire(wire_index).ok_or_else(|| {
            ValvemonError::config(format!("wire {} does not exist", wire_index))
        })?;
        let threshold = self
            .thresholds
            .iter_mut()
            .find(|t| t.wire_index == wire_index)
            .ok_or_else(|| {
                ValvemonError::config(format!(
                    "test point index {} has no calibrated threshold",
                    tp_index
                ))
            })?;
        if !threshold.accepts(value) {
            return Err(ValvemonError::config(format!(
                "threshold {} for test point index {} is outside [{}, {}]",
                value, tp_index, threshold.min, threshold.max
            )));
        }
        threshold.value = value;
        Ok(wire.resistor.stream)
    }
}
