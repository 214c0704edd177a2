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

//! Valvemon - test point monitor for valve computer replicas
//!
//! This library calibrates the comparator thresholds of a testbed's resistor
//! ladders, samples its test points through a sample-and-hold latch (or replays
//! recorded samples), and checks every change against a behavioural model.

pub mod alert;
pub mod calibration;
pub mod circuit;
pub mod cli;
pub mod config;
pub mod constants;
pub mod dac;
pub mod display;
pub mod error;
pub mod hw;
pub mod logger;
pub mod model;
pub mod monitor;
pub mod sampler;
pub mod samples;
pub mod wiring;

#[cfg(test)]
pub mod test_utils;

pub use alert::{Alert, Alerter, EchoAlerter, NetworkAlerter};
pub use calibration::CalibrationModel;
pub use circuit::CircuitModel;
pub use dac::DacWriter;
pub use error::{Result, ValvemonError};
pub use model::{BehaviouralModel, TestPoint, TpVector};
pub use monitor::{MonitorLoop, MonitorSummary};
pub use sampler::{HardwareSampler, TpSource};
pub use samples::SampleFileSource;
pub use wiring::WiringModel;
