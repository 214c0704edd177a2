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

//! Plain-text tables for `--read-config`

use crate::calibration::CalibrationModel;
use crate::circuit::CircuitModel;
use crate::model::BehaviouralModel;
use crate::wiring::WiringModel;

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &w)| format!("{:<w$}", cell, w = w))
        .collect();
    padded.join("  ").trim_end().to_string()
}

/// Left-aligned columns separated by two spaces, with a rule under the header
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = render_line(headers.iter().copied(), &widths);
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in rows {
        out.push_str(&render_line(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }
    out
}

fn tp_name(model: &dyn BehaviouralModel, index: usize) -> String {
    model
        .test_point(index)
        .map(|tp| tp.name.clone())
        .unwrap_or_else(|| format!("#{}", index))
}

pub fn test_points_table(model: &CircuitModel) -> String {
    let rows: Vec<Vec<String>> = model
        .test_points()
        .iter()
        .map(|tp| {
            vec![
                tp.name.clone(),
                tp.valve.to_string(),
                if tp.input { "input" } else { "output" }.to_string(),
                format!("{:.2}", tp.min),
                format!("{:.2}", tp.max),
            ]
        })
        .collect();
    format!(
        "Test points: {} ({} inputs)\n{}",
        model.tp_count(),
        model.input_count(),
        format_table(&["TP", "Valve", "Role", "Min V", "Max V"], &rows)
    )
}

pub fn truth_table(model: &CircuitModel) -> String {
    let side = |pairs: &[(usize, u8)]| -> String {
        pairs
            .iter()
            .map(|&(index, bit)| format!("{}={}", tp_name(model, index), bit))
            .collect::<Vec<_>>()
            .join(" ")
    };
    let rows: Vec<Vec<String>> = model
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| vec![i.to_string(), side(&row.inputs), side(&row.outputs)])
        .collect();
    format!(
        "Truth table: {} rows\n{}",
        rows.len(),
        format_table(&["Row", "Inputs", "Expected outputs"], &rows)
    )
}

pub fn wiring_table(model: &dyn BehaviouralModel, wiring: &WiringModel) -> String {
    let rows: Vec<Vec<String>> = wiring
        .wires()
        .iter()
        .map(|wire| {
            vec![
                tp_name(model, wire.tp_index),
                wire.pin.to_string(),
                wire.resistor.to_string(),
                format!("{:.3}", wire.attenuation),
            ]
        })
        .collect();
    format!(
        "Wiring. Hold GPIO pin: {}, resistor chips: {}\n{}",
        wiring.hold_pin(),
        wiring.resistor_chip_count(),
        format_table(&["TP", "BCM Pin", "Resistor", "Attenuation"], &rows)
    )
}

pub fn calibration_table(
    model: &dyn BehaviouralModel,
    wiring: &WiringModel,
    calibration: &CalibrationModel,
) -> String {
    let rows: Vec<Vec<String>> = calibration
        .thresholds()
        .iter()
        .map(|t| {
            let name = wiring
                .wire(t.wire_index)
                .map(|w| tp_name(model, w.tp_index))
                .unwrap_or_else(|| format!("wire {}", t.wire_index));
            vec![name, format!("{:.3}", t.value)]
        })
        .collect();
    format!(
        "Calibration\n{}",
        format_table(&["TP", "Threshold V"], &rows)
    )
}
