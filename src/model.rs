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

//! Behavioural model interface
//!
//! The model owns the ordered test point table and judges whether a sampled
//! vector is consistent with the machine's logic. Everything else in the crate
//! refers to test points by their index in that table.

use serde::{Deserialize, Serialize};

/// One named observation point of the machine under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPoint {
    pub name: String,
    /// Valve whose failure this test point reveals
    pub valve: u32,
    /// Lowest comparator threshold accepted for this point, in volts
    pub min: f32,
    /// Highest comparator threshold accepted for this point, in volts
    pub max: f32,
    /// Inputs drive the logic; the rest are checked against it
    #[serde(default)]
    pub input: bool,
}

impl TestPoint {
    pub fn accepts_threshold(&self, volts: f32) -> bool {
        volts.is_finite() && volts >= self.min && volts <= self.max
    }
}

/// A test point vector: one 0/1 entry per test point, in table order
pub type TpVector = Vec<u8>;

pub trait BehaviouralModel {
    /// Number of test points in the table
    fn tp_count(&self) -> usize;

    /// Number of test points that are inputs
    fn input_count(&self) -> usize;

    fn test_point(&self, index: usize) -> Option<&TestPoint>;

    /// Index of the test point with this name
    fn tp_index(&self, name: &str) -> Option<usize>;

    /// Judge a full vector. `errors` is cleared, then receives the index of every
    /// test point found in error.
    fn check(&self, vector: &[u8], errors: &mut Vec<usize>);
}
