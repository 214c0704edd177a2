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

//! The monitor loop
//!
//! Pulls vectors from a source, and whenever a vector differs from the one
//! before it, asks the model to judge it and raises one alert per test point
//! in error. The baseline before the first vector is all zeros.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::alert::{Alert, Alerter};
use crate::constants::monitor::MAX_CONSECUTIVE_ERRORS;
use crate::error::Result;
use crate::logger::log_event;
use crate::model::{BehaviouralModel, TpVector};
use crate::sampler::TpSource;

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSummary {
    /// Vectors obtained from the source
    pub iterations: u64,
    /// Model checks triggered by a change
    pub checks: u64,
    pub alerts_sent: u64,
    pub alert_failures: u64,
    /// Failed attempts to obtain a vector
    pub source_errors: u64,
}

pub struct MonitorLoop<'a> {
    model: &'a dyn BehaviouralModel,
    alerter: &'a mut dyn Alerter,
    current: TpVector,
    previous: TpVector,
    errors: Vec<usize>,
    shutdown: Option<&'a AtomicBool>,
    summary: MonitorSummary,
    consecutive_errors: u32,
}

impl<'a> MonitorLoop<'a> {
    pub fn new(model: &'a dyn BehaviouralModel, alerter: &'a mut dyn Alerter) -> Self {
        let n = model.tp_count();
        Self {
            model,
            alerter,
            current: vec![0; n],
            previous: vec![0; n],
            errors: Vec::with_capacity(n),
            shutdown: None,
            summary: MonitorSummary::default(),
            consecutive_errors: 0,
        }
    }

    /// Stop at the next iteration once `flag` is set
    pub fn with_shutdown(mut self, flag: &'a AtomicBool) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn summary(&self) -> &MonitorSummary {
        &self.summary
    }

    /// The most recently observed vector
    pub fn last_vector(&self) -> &[u8] {
        &self.previous
    }

    /// Run one iteration. Returns `false` when the source is exhausted.
    pub fn step(&mut self, source: &mut dyn TpSource) -> Result<bool> {
        if !source.next_vector(&mut self.current)? {
            return Ok(false);
        }
        self.summary.iterations += 1;

        if self.current != self.previous {
            self.summary.checks += 1;
            self.model.check(&self.current, &mut self.errors);
            if !self.errors.is_empty() {
                self.dispatch();
            }
        }

        mem::swap(&mut self.current, &mut self.previous);
        Ok(true)
    }

    fn dispatch(&mut self) {
        debug!("Vector {:?}: {} test points in error", self.current, self.errors.len());
        self.alerter.begin_batch(&self.current, self.errors.len());

        for &tp_index in &self.errors {
            let Some(tp) = self.model.test_point(tp_index) else {
                warn!("Model reported unknown test point index {}", tp_index);
                continue;
            };
            let alert = Alert::for_test_point(tp_index, tp);
            match self.alerter.send(&alert) {
                Ok(()) => {
                    self.summary.alerts_sent += 1;
                    info!("{}", alert.message);
                    log_event(
                        "alert",
                        json!({"valve": alert.valve, "tp": alert.tp_name, "message": alert.message}),
                    );
                }
                Err(e) => {
                    self.summary.alert_failures += 1;
                    warn!("Failed to deliver alert for valve {}: {}", alert.valve, e);
                    log_event(
                        "alert_failed",
                        json!({"valve": alert.valve, "tp": alert.tp_name, "error": e.to_string()}),
                    );
                }
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Loop until the source is exhausted or shutdown is requested. Failures to
    /// obtain a vector are logged and the loop carries on.
    pub fn run(&mut self, source: &mut dyn TpSource) -> MonitorSummary {
        loop {
            if self.shutdown_requested() {
                info!("Shutdown requested, stopping monitor");
                break;
            }
            match self.step(source) {
                Ok(true) => {
                    if self.consecutive_errors > 0 {
                        info!("Sampling recovered after {} errors", self.consecutive_errors);
                        self.consecutive_errors = 0;
                    }
                }
                Ok(false) => {
                    info!("Sample source exhausted");
                    break;
                }
                Err(e) => {
                    self.summary.source_errors += 1;
                    self.consecutive_errors = self.consecutive_errors.saturating_add(1);
                    if self.consecutive_errors == 1 || self.consecutive_errors % MAX_CONSECUTIVE_ERRORS == 0 {
                        warn!("Sampling failed (count: {}): {}", self.consecutive_errors, e);
                    }
                }
            }
        }

        info!(
            "Monitor stopped: {} vectors, {} checks, {} alerts sent, {} failed",
            self.summary.iterations,
            self.summary.checks,
            self.summary.alerts_sent,
            self.summary.alert_failures
        );
        log_event(
            "monitor_stopped",
            serde_json::to_value(&self.summary).unwrap_or_default(),
        );
        self.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValvemonError;
    use crate::test_utils::two_tp_circuit;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct RecordingAlerter {
        batches: Vec<(Vec<u8>, usize)>,
        sent: Vec<Alert>,
        fail: bool,
    }

    impl Alerter for RecordingAlerter {
        fn begin_batch(&mut self, vector: &[u8], count: usize) {
            self.batches.push((vector.to_vec(), count));
        }

        fn send(&mut self, alert: &Alert) -> Result<()> {
            if self.fail {
                return Err(ValvemonError::alert_dispatch("station unreachable"));
            }
            self.sent.push(alert.clone());
            Ok(())
        }
    }

    /// Replays queued results, then reports exhaustion
    struct ScriptedSource {
        script: VecDeque<Result<Vec<u8>>>,
    }

    impl ScriptedSource {
        fn vectors<const N: usize>(vectors: &[[u8; N]]) -> Self {
            Self {
                script: vectors.iter().map(|v| Ok(v.to_vec())).collect(),
            }
        }
    }

    impl TpSource for ScriptedSource {
        fn next_vector(&mut self, dest: &mut [u8]) -> Result<bool> {
            match self.script.pop_front() {
                None => Ok(false),
                Some(Ok(v)) => {
                    dest.copy_from_slice(&v);
                    Ok(true)
                }
                Some(Err(e)) => Err(e),
            }
        }
    }

    #[test]
    fn test_constant_vector_never_checked() {
        let model = two_tp_circuit();
        let mut alerter = RecordingAlerter::default();
        let mut monitor = MonitorLoop::new(&model, &mut alerter);
        let mut source = ScriptedSource::vectors(&[[0, 0]; 25]);
        let summary = monitor.run(&mut source);
        assert_eq!(summary.iterations, 25);
        assert_eq!(summary.checks, 0);
    }

    #[test]
    fn test_single_change_checked_once() {
        let model = two_tp_circuit();
        let mut alerter = RecordingAlerter::default();
        let mut monitor = MonitorLoop::new(&model, &mut alerter);
        let mut source =
            ScriptedSource::vectors(&[[0, 0], [0, 0], [0, 1], [0, 1], [0, 1]]);
        let summary = monitor.run(&mut source);
        assert_eq!(summary.checks, 1);
        assert_eq!(summary.alerts_sent, 0);
    }

    #[test]
    fn test_alert_on_erroneous_vector_only() {
        let model = two_tp_circuit();
        let mut alerter = RecordingAlerter::default();
        {
            let mut monitor = MonitorLoop::new(&model, &mut alerter);
            let mut source = ScriptedSource::vectors(&[[1, 0], [1, 1], [0, 1]]);
            let summary = monitor.run(&mut source);
            assert_eq!(summary.checks, 3);
            assert_eq!(summary.alerts_sent, 1);
        }
        assert_eq!(alerter.batches, vec![(vec![1, 1], 1)]);
        assert_eq!(alerter.sent.len(), 1);
        assert_eq!(alerter.sent[0].valve, 7);
        assert_eq!(alerter.sent[0].tp_name, "X2");
    }

    #[test]
    fn test_step_reports_exhaustion() {
        let model = two_tp_circuit();
        let mut alerter = RecordingAlerter::default();
        let mut monitor = MonitorLoop::new(&model, &mut alerter);
        let mut source = ScriptedSource::vectors(&[[1, 0]]);
        assert!(monitor.step(&mut source).unwrap());
        assert_eq!(monitor.last_vector(), &[1, 0]);
        assert!(!monitor.step(&mut source).unwrap());
        assert_eq!(monitor.summary().iterations, 1);
    }

    #[test]
    fn test_alert_failures_do_not_stop_the_loop() {
        let model = two_tp_circuit();
        let mut alerter = RecordingAlerter {
            fail: true,
            ..Default::default()
        };
        let mut monitor = MonitorLoop::new(&model, &mut alerter);
        let mut source = ScriptedSource::vectors(&[[1, 1], [0, 0], [1, 1]]);
        let summary = monitor.run(&mut source);
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.alert_failures, 3);
        assert_eq!(summary.alerts_sent, 0);
    }

    #[test]
    fn test_source_errors_are_counted_and_skipped() {
        let model = two_tp_circuit();
        let mut alerter = RecordingAlerter::default();
        let mut monitor = MonitorLoop::new(&model, &mut alerter);
        let mut source = ScriptedSource {
            script: VecDeque::from(vec![
                Ok(vec![1, 0]),
                Err(ValvemonError::gpio(2, "read failed")),
                Err(ValvemonError::gpio(2, "read failed")),
                Ok(vec![1, 0]),
            ]),
        };
        let summary = monitor.run(&mut source);
        assert_eq!(summary.source_errors, 2);
        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.checks, 1);
    }

    #[test]
    fn test_shutdown_flag_stops_before_sampling() {
        let model = two_tp_circuit();
        let mut alerter = RecordingAlerter::default();
        let stop = AtomicBool::new(true);
        let mut monitor = MonitorLoop::new(&model, &mut alerter).with_shutdown(&stop);
        let mut source = ScriptedSource::vectors(&[[1, 1]]);
        let summary = monitor.run(&mut source);
        assert_eq!(summary, MonitorSummary::default());
        assert_eq!(source.script.len(), 1);
    }
}
