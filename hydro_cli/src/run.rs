//! Config mapping, capability assembly, and command execution.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use hydro_config::Config;
use hydro_core::arbiter::ResourceArbiter;
use hydro_core::corrector::{BoundedCorrector, CorrectorCfg};
use hydro_core::reader::{ReaderCfg, StableReader};
use hydro_core::runner::{self, RunnerCfg};
use hydro_core::schedule::{ScheduleRule, Scheduler};
use hydro_core::telemetry::{CycleReport, NoTelemetry, TelemetryPort};
use hydro_telemetry::HttpTelemetry;
use hydro_traits::clock::MonotonicClock;
use hydro_traits::{Actuator, AnalogSensor, Clock, Positioner};

use crate::cli::{Cli, Commands};

type BoxSensor = Box<dyn AnalogSensor + Send>;
type BoxPositioner = Box<dyn Positioner + Send>;
type BoxActuator = Box<dyn Actuator + Send>;

struct Capabilities {
    sensor: BoxSensor,
    probe: BoxPositioner,
    dose_up: BoxActuator,
    dose_down: BoxActuator,
    mix: BoxActuator,
}

pub fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = hydro_config::load_toml(&text)
        .wrap_err_with(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(not(feature = "hardware"))]
fn build_capabilities(_cfg: &Config) -> eyre::Result<Capabilities> {
    use hydro_hardware::{SimulatedActuator, SimulatedPositioner, SimulatedSensor, SimulatedTank};

    // Start slightly acidic so a sim run demonstrates a correction.
    let tank = SimulatedTank::new(6.0);
    tracing::info!(tank = tank.value(), "simulated capability set");
    Ok(Capabilities {
        sensor: Box::new(SimulatedSensor::new(tank.clone())),
        probe: Box::new(SimulatedPositioner::new()),
        dose_up: Box::new(SimulatedActuator::new(tank.clone(), "dose_up", 0.4)),
        dose_down: Box::new(SimulatedActuator::new(tank.clone(), "dose_down", -0.4)),
        mix: Box::new(SimulatedActuator::new(tank, "mix", 0.0)),
    })
}

#[cfg(feature = "hardware")]
fn build_capabilities(cfg: &Config) -> eyre::Result<Capabilities> {
    use hydro_hardware::gpio::{Ads1115Sensor, RelayActuator, ServoPositioner};

    let pins = &cfg.pins;
    tracing::info!(?pins, "gpio capability set");
    Ok(Capabilities {
        sensor: Box::new(
            Ads1115Sensor::new(pins.sensor_channel).wrap_err("opening ADS1115")?,
        ),
        probe: Box::new(ServoPositioner::new(pins.probe_servo).wrap_err("opening probe servo")?),
        dose_up: Box::new(
            RelayActuator::new(pins.dose_up, "dose_up").wrap_err("opening dose-up relay")?,
        ),
        dose_down: Box::new(
            RelayActuator::new(pins.dose_down, "dose_down").wrap_err("opening dose-down relay")?,
        ),
        mix: Box::new(RelayActuator::new(pins.mix, "mix").wrap_err("opening mix relay")?),
    })
}

fn build_corrector(
    cfg: &Config,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<BoundedCorrector<BoxSensor, BoxPositioner>> {
    let caps = build_capabilities(cfg)?;
    let reader = StableReader::new(
        caps.sensor,
        caps.probe,
        ReaderCfg::from_config(&cfg.stability, &cfg.probe, &cfg.hardware),
        Arc::clone(&clock),
        Arc::clone(&shutdown),
    );
    let arbiter = ResourceArbiter::new(Arc::clone(&shutdown));
    Ok(BoundedCorrector::new(
        reader,
        caps.dose_up,
        caps.dose_down,
        caps.mix,
        arbiter,
        CorrectorCfg::from(&cfg.correction),
        clock,
        shutdown,
    ))
}

fn install_signal_handler(shutdown: &Arc<AtomicBool>) -> eyre::Result<()> {
    let flag = Arc::clone(shutdown);
    ctrlc::set_handler(move || {
        tracing::info!("shutdown requested");
        flag.store(true, Ordering::SeqCst);
    })
    .wrap_err("installing signal handler")
}

fn telemetry_configured(cfg: &Config) -> bool {
    cfg.telemetry.endpoint.is_some() || cfg.telemetry.command_endpoint.is_some()
}

fn print_report(report: &CycleReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "timestamp": report.timestamp,
                "value": report.value,
                "stable": report.stable,
                "adjustment_made": report.adjustment_made,
                "device_id": report.device_id,
            })
        );
    } else {
        println!(
            "cycle complete: value {:.2} ({}), adjustment {}",
            report.value,
            if report.stable { "stable" } else { "degraded" },
            if report.adjustment_made { "made" } else { "not needed" },
        );
    }
}

pub fn dispatch(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let shutdown = Arc::new(AtomicBool::new(false));

    match &cli.cmd {
        Commands::Run => {
            install_signal_handler(&shutdown)?;
            let corrector = build_corrector(cfg, Arc::clone(&clock), Arc::clone(&shutdown))?;
            let scheduler = Scheduler::new(
                cfg.schedule.rules.iter().map(ScheduleRule::from).collect(),
            );
            let runner_cfg = RunnerCfg::from_config(cfg);
            if telemetry_configured(cfg) {
                let port = HttpTelemetry::new(&cfg.telemetry)?;
                runner::run(corrector, scheduler, port, runner_cfg, clock, shutdown)
            } else {
                tracing::warn!("no telemetry endpoints configured, running dark");
                runner::run(corrector, scheduler, NoTelemetry, runner_cfg, clock, shutdown)
            }
        }
        Commands::Cycle {
            primary_budget_ms,
            retry_budget_ms,
        } => {
            install_signal_handler(&shutdown)?;
            let mut corrector = build_corrector(cfg, Arc::clone(&clock), shutdown)?;
            let mut runner_cfg = RunnerCfg::from_config(cfg);
            if let Some(ms) = primary_budget_ms {
                runner_cfg.acquire_primary = Duration::from_millis(*ms);
            }
            if let Some(ms) = retry_budget_ms {
                runner_cfg.acquire_retry = Duration::from_millis(*ms);
            }
            let report = runner::run_cycle(&mut corrector, &runner_cfg)?;
            if cfg.telemetry.endpoint.is_some() {
                let mut port = HttpTelemetry::new(&cfg.telemetry)?;
                if let Err(e) = port.push(&report) {
                    tracing::warn!(error = %e, "report not delivered");
                }
            }
            print_report(&report, cli.json);
            Ok(())
        }
        Commands::SelfCheck => {
            let mut caps = build_capabilities(cfg)?;
            let timeout = Duration::from_millis(cfg.hardware.sensor_read_timeout_ms);
            let value = caps
                .sensor
                .sample(timeout)
                .map_err(|e| eyre::eyre!("sensor check failed: {e}"))?;
            caps.probe
                .move_to(cfg.probe.withdraw_angle)
                .map_err(|e| eyre::eyre!("probe servo check failed: {e}"))?;
            if cli.json {
                println!("{}", serde_json::json!({ "status": "ok", "value": value }));
            } else {
                println!("self-check: OK (reading {value:.2})");
            }
            Ok(())
        }
    }
}
