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

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};

use valvemon::cli::Options;
use valvemon::constants::defaults;
use valvemon::display;
use valvemon::hw::{Hardware, NullGpio};
use valvemon::logger::{self, log_event};
use valvemon::{
    Alerter, CalibrationModel, CircuitModel, DacWriter, EchoAlerter, HardwareSampler, MonitorLoop,
    MonitorSummary, NetworkAlerter, SampleFileSource, WiringModel,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Set by the signal handler; the monitor stops at its next iteration
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Log to the systemd journal when it is available, otherwise to stdout.
/// Returns true when the journal is in use.
fn init_tracing() -> bool {
    let log_level = std::env::var(defaults::LOG_ENV).unwrap_or_else(|_| defaults::LOG_LEVEL.to_string());

    if Path::new("/run/systemd/journal/socket").exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
                return true;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(&log_level)
        .init();
    false
}

fn print_config(
    model: &CircuitModel,
    wiring: &WiringModel,
    calibration: &CalibrationModel,
) {
    println!("{}", display::test_points_table(model));
    println!("{}", display::truth_table(model));
    println!("{}", display::wiring_table(model, wiring));
    println!("{}", display::calibration_table(model, wiring, calibration));
}

fn open_alerter(opts: &Options) -> anyhow::Result<Box<dyn Alerter>> {
    if opts.no_up_network {
        info!("Echoing alerts to stdout");
        return Ok(Box::new(EchoAlerter::new(io::stdout())));
    }
    let alerter = NetworkAlerter::connect(&opts.tx_addr, opts.tx_port).with_context(|| {
        format!(
            "Failed to open network sender on {}:{}",
            opts.tx_addr, opts.tx_port
        )
    })?;
    info!("Sending alerts to {}", alerter.target());
    Ok(Box::new(alerter))
}

fn run_replay(
    opts: &Options,
    sample_file: &Path,
    model: &CircuitModel,
) -> anyhow::Result<MonitorSummary> {
    let wiring = WiringModel::load(&opts.wiring_path(), model, &mut NullGpio)
        .with_context(|| format!("Invalid wiring file {}", opts.wiring_path().display()))?;
    let _calibration = CalibrationModel::load(&opts.calibration_path(), model, &wiring)
        .with_context(|| format!("Invalid calibration file {}", opts.calibration_path().display()))?;

    let mut alerter = open_alerter(opts)?;
    let mut source = SampleFileSource::from_file(sample_file, model)
        .with_context(|| format!("Samples file {} parsing failed", sample_file.display()))?;

    info!("Replaying {} samples from {}", source.len(), sample_file.display());
    let summary = MonitorLoop::new(model, alerter.as_mut())
        .with_shutdown(&SHUTDOWN)
        .run(&mut source);
    Ok(summary)
}

fn run_hardware(opts: &Options, model: &CircuitModel) -> anyhow::Result<MonitorSummary> {
    let Hardware { mut gpio, spi } =
        Hardware::open(&opts.hardware_config()).context("Failed to open GPIO/SPI hardware")?;

    let wiring = WiringModel::load(&opts.wiring_path(), model, &mut gpio)
        .with_context(|| format!("Invalid wiring file {}", opts.wiring_path().display()))?;
    let calibration = CalibrationModel::load(&opts.calibration_path(), model, &wiring)
        .with_context(|| format!("Invalid calibration file {}", opts.calibration_path().display()))?;

    let mut alerter = open_alerter(opts)?;

    let dac = DacWriter::new(spi);
    dac.write_out_calibration(&wiring, &calibration)
        .context("Failed to write calibration to the resistor chains")?;
    log_event(
        "calibration_written",
        json!({
            "thresholds": calibration.thresholds().len(),
            "chips": wiring.resistor_chip_count(),
        }),
    );

    let mut sampler = HardwareSampler::new(&wiring, &mut gpio);
    info!("Monitoring {} test points", wiring.len());
    let summary = MonitorLoop::new(model, alerter.as_mut())
        .with_shutdown(&SHUTDOWN)
        .run(&mut sampler);
    Ok(summary)
}

fn run(opts: &Options) -> anyhow::Result<()> {
    let chassis = opts.chassis_path();
    let model = CircuitModel::load(&chassis)
        .with_context(|| format!("Invalid chassis file {}", chassis.display()))?;
    info!(
        "Chassis loaded: {} test points, {} truth table rows",
        model.test_points().len(),
        model.rows().len()
    );

    if opts.read_config {
        let wiring = WiringModel::load(&opts.wiring_path(), &model, &mut NullGpio)
            .with_context(|| format!("Invalid wiring file {}", opts.wiring_path().display()))?;
        let calibration = CalibrationModel::load(&opts.calibration_path(), &model, &wiring)
            .with_context(|| {
                format!("Invalid calibration file {}", opts.calibration_path().display())
            })?;
        print_config(&model, &wiring, &calibration);
        return Ok(());
    }

    if let Err(e) = ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not be clean.", e);
    }

    let summary = match &opts.test_sample_file {
        Some(sample_file) => run_replay(opts, sample_file, &model)?,
        None => run_hardware(opts, &model)?,
    };

    if SHUTDOWN.load(Ordering::SeqCst) {
        info!("SHUTDOWN: stopped by signal");
    }
    if summary.alert_failures > 0 {
        warn!("{} alerts could not be delivered", summary.alert_failures);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let opts = Options::parse();
    let use_journald = init_tracing();

    if let Some(path) = &opts.event_log {
        if let Err(e) = logger::init_event_log(path) {
            warn!("Cannot open event log {}: {}", path.display(), e);
        }
    }

    info!("STARTUP: valvemon {} starting", VERSION);
    info!("STARTUP: Logging to {}", if use_journald { "systemd journal" } else { "stdout" });
    log_event(
        "startup",
        json!({
            "version": VERSION,
            "mode": if opts.read_config {
                "read_config"
            } else if opts.is_replay() {
                "replay"
            } else {
                "hardware"
            },
            "config_dir": opts.config_dir.display().to_string(),
        }),
    );

    let result = run(&opts);
    if let Err(e) = &result {
        error!("{:#}", e);
        log_event("fatal_error", json!({ "error": format!("{:#}", e) }));
    }
    logger::close_event_log();
    result
}
