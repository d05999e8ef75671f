//! Thread orchestration: the control loop and the telemetry loop.
//!
//! The caller's thread becomes the control thread; it owns the corrector
//! (and through it every actuator) so hardware access never crosses
//! threads. A second thread owns the telemetry port, drains cycle reports
//! and forwards polled remote commands back over a bounded channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use eyre::WrapErr;
use hydro_traits::{AnalogSensor, Clock, Positioner};
use tracing::{error, info, warn};

use crate::command::RemoteCommand;
use crate::corrector::{BoundedCorrector, CorrectionOutcome, Direction};
use crate::error::{ControlError, Result};
use crate::schedule::Scheduler;
use crate::telemetry::{CycleReport, TelemetryPort};
use crate::util::{SHUTDOWN_POLL, sleep_interruptible};

const REPORT_QUEUE: usize = 8;
const COMMAND_QUEUE: usize = 4;

#[derive(Debug, Clone)]
pub struct RunnerCfg {
    /// Scheduler evaluation cadence.
    pub tick: Duration,
    /// Initial acquisition budgets for each cycle.
    pub acquire_primary: Duration,
    pub acquire_retry: Duration,
    /// Remote command polling cadence on the telemetry thread.
    pub poll_interval: Duration,
    pub device_id: String,
}

impl RunnerCfg {
    pub fn from_config(cfg: &hydro_config::Config) -> Self {
        Self {
            tick: Duration::from_millis(cfg.schedule.tick_ms),
            acquire_primary: Duration::from_millis(cfg.stability.primary_budget_ms),
            acquire_retry: Duration::from_millis(cfg.stability.retry_budget_ms),
            poll_interval: Duration::from_millis(cfg.telemetry.poll_interval_ms),
            device_id: cfg.telemetry.device_id.clone(),
        }
    }
}

/// Run one read-and-correct cycle and build its report.
///
/// `SensorUnavailable` propagates so the caller can decide whether the
/// loop continues; shutdown propagates as `ControlError::Shutdown`.
pub fn run_cycle<S: AnalogSensor, P: Positioner>(
    corrector: &mut BoundedCorrector<S, P>,
    cfg: &RunnerCfg,
) -> Result<CycleReport> {
    let reading = corrector
        .acquire(cfg.acquire_primary, cfg.acquire_retry)
        .wrap_err("cycle acquisition failed")?;

    let mut adjustment_made = false;
    if corrector.in_band(reading.value) {
        info!(value = reading.value, stable = reading.stable, "reading in band, no action");
    } else {
        match corrector.correct(reading)? {
            CorrectionOutcome::Converged { attempts } => {
                adjustment_made = attempts > 0;
                info!(attempts, "correction converged");
            }
            CorrectionOutcome::Exhausted {
                attempts,
                last_reading,
                fault,
            } => {
                adjustment_made = true;
                warn!(attempts, last_reading, ?fault, "correction exhausted");
            }
        }
    }

    Ok(CycleReport {
        timestamp: Local::now().to_rfc3339(),
        value: reading.value,
        stable: reading.stable,
        adjustment_made,
        device_id: cfg.device_id.clone(),
    })
}

fn execute_command<S: AnalogSensor, P: Positioner>(
    corrector: &mut BoundedCorrector<S, P>,
    cmd: RemoteCommand,
) -> Result<()> {
    info!(?cmd, "executing remote command");
    match cmd {
        RemoteCommand::AdjustUp { dose } => corrector.one_shot(Direction::Raise, dose),
        RemoteCommand::AdjustDown { dose } => corrector.one_shot(Direction::Lower, dose),
        RemoteCommand::SetTiming { on, off } => {
            corrector.set_timing(on, off);
            Ok(())
        }
        RemoteCommand::SetServoAngle { target, angle } => match target.as_str() {
            "probe" | "ph_sensor" => corrector.position_probe(angle),
            other => {
                warn!(target = other, "unknown servo target, ignoring");
                Ok(())
            }
        },
    }
}

fn is_shutdown(report: &eyre::Report) -> bool {
    matches!(
        report.downcast_ref::<ControlError>(),
        Some(ControlError::Shutdown)
    )
}

fn telemetry_loop<T: TelemetryPort>(
    mut port: T,
    report_rx: &Receiver<CycleReport>,
    cmd_tx: &Sender<RemoteCommand>,
    poll_interval: Duration,
    clock: &Arc<dyn Clock + Send + Sync>,
    shutdown: &Arc<AtomicBool>,
) {
    let mut last_poll = clock.now();
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match report_rx.recv_timeout(SHUTDOWN_POLL) {
            Ok(report) => {
                if let Err(e) = port.push(&report) {
                    warn!(error = %e, "cycle report dropped");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if clock.ms_since(last_poll) >= poll_interval.as_millis() as u64 {
            last_poll = clock.now();
            if let Some(cmd) = port.poll_commands() {
                if cmd_tx.try_send(cmd).is_err() {
                    warn!("command queue full, dropping remote command");
                }
            }
        }
    }
}

/// Run the control loop until shutdown. Blocks the calling thread.
pub fn run<S, P, T>(
    mut corrector: BoundedCorrector<S, P>,
    mut scheduler: Scheduler,
    telemetry: T,
    cfg: RunnerCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
) -> Result<()>
where
    S: AnalogSensor + Send + 'static,
    P: Positioner + Send + 'static,
    T: TelemetryPort + Send + 'static,
{
    let (report_tx, report_rx) = bounded::<CycleReport>(REPORT_QUEUE);
    let (cmd_tx, cmd_rx) = bounded::<RemoteCommand>(COMMAND_QUEUE);

    let tele_clock = Arc::clone(&clock);
    let tele_shutdown = Arc::clone(&shutdown);
    let poll_interval = cfg.poll_interval;
    let tele_handle = thread::Builder::new()
        .name("hydro-telemetry".into())
        .spawn(move || {
            telemetry_loop(
                telemetry,
                &report_rx,
                &cmd_tx,
                poll_interval,
                &tele_clock,
                &tele_shutdown,
            );
        })
        .wrap_err("spawning telemetry thread")?;

    let epoch = clock.now();
    info!(tick_ms = cfg.tick.as_millis() as u64, "control loop started");

    while !shutdown.load(Ordering::SeqCst) {
        while let Ok(cmd) = cmd_rx.try_recv() {
            if let Err(e) = execute_command(&mut corrector, cmd) {
                if is_shutdown(&e) {
                    break;
                }
                error!(error = %e, "remote command failed");
            }
        }

        let due = scheduler.due(Local::now().naive_local(), clock.ms_since(epoch));
        if !due.is_empty() {
            match run_cycle(&mut corrector, &cfg) {
                Ok(report) => {
                    if report_tx.try_send(report).is_err() {
                        warn!("report queue full, dropping cycle report");
                    }
                }
                Err(e) if is_shutdown(&e) => break,
                Err(e) => {
                    // Sensor trouble skips this cycle; the schedule decides
                    // when to try again.
                    error!(error = %e, "cycle failed");
                }
            }
        }

        if sleep_interruptible(&*clock, cfg.tick, &shutdown) {
            break;
        }
    }

    shutdown.store(true, Ordering::SeqCst);
    drop(report_tx);
    drop(cmd_rx);
    if tele_handle.join().is_err() {
        error!("telemetry thread panicked");
    }
    info!("control loop stopped");
    Ok(())
}
