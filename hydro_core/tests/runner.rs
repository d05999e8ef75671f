//! End-to-end control loop tests with real threads and a real clock.
//! Durations are millisecond-scale so the suite stays fast.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use hydro_core::arbiter::ResourceArbiter;
use hydro_core::command::RemoteCommand;
use hydro_core::corrector::{BoundedCorrector, CorrectorCfg};
use hydro_core::error::ControlError;
use hydro_core::mocks::{
    RecordingActuator, RecordingPositioner, StepActuator, Tank, TankSensor,
};
use hydro_core::reader::{Reading, ReaderCfg, StableReader};
use hydro_core::runner::{self, RunnerCfg};
use hydro_core::schedule::{ScheduleRule, Scheduler};
use hydro_core::telemetry::{CycleReport, TelemetryPort};
use hydro_traits::clock::MonotonicClock;

struct FakePort {
    pushes: Arc<Mutex<Vec<CycleReport>>>,
    commands: Arc<Mutex<VecDeque<RemoteCommand>>>,
}

impl TelemetryPort for FakePort {
    fn push(&mut self, report: &CycleReport) -> Result<(), ControlError> {
        self.pushes.lock().unwrap().push(report.clone());
        Ok(())
    }

    fn poll_commands(&mut self) -> Option<RemoteCommand> {
        self.commands.lock().unwrap().pop_front()
    }
}

fn fast_reader_cfg() -> ReaderCfg {
    ReaderCfg {
        window_size: 2,
        stddev_threshold: 0.3,
        sample_interval: Duration::from_millis(1),
        probe_settle: Duration::ZERO,
        sample_timeout: Duration::from_millis(10),
        engage_angle: 80.0,
        withdraw_angle: 20.0,
    }
}

fn fast_corrector_cfg() -> CorrectorCfg {
    CorrectorCfg {
        band_low: 6.5,
        band_high: 7.5,
        max_attempts: 5,
        dose: Duration::from_millis(2),
        mix: Duration::from_millis(2),
        settle: Duration::from_millis(2),
        recheck_primary: Duration::from_millis(50),
        recheck_retry: Duration::from_millis(20),
    }
}

fn runner_cfg() -> RunnerCfg {
    RunnerCfg {
        tick: Duration::from_millis(10),
        acquire_primary: Duration::from_millis(100),
        acquire_retry: Duration::from_millis(50),
        poll_interval: Duration::from_millis(10),
        device_id: "test_rig".into(),
    }
}

#[test]
fn loop_reports_cycles_and_executes_remote_commands() {
    let tank = Tank::new(7.0);
    let shutdown = Arc::new(AtomicBool::new(false));
    let clock = Arc::new(MonotonicClock::new());
    let arbiter = ResourceArbiter::new(shutdown.clone());
    let log = Arc::new(Mutex::new(Vec::new()));

    let probe = RecordingPositioner::new();
    let angles = probe.angles_handle();
    let reader = StableReader::new(
        TankSensor::new(tank.clone()),
        probe,
        fast_reader_cfg(),
        clock.clone(),
        shutdown.clone(),
    );
    let corrector = BoundedCorrector::new(
        reader,
        Box::new(RecordingActuator::new("up", log.clone())),
        Box::new(RecordingActuator::new("down", log.clone())),
        Box::new(RecordingActuator::new("mix", log.clone())),
        arbiter,
        fast_corrector_cfg(),
        clock.clone(),
        shutdown.clone(),
    );
    let scheduler = Scheduler::new(vec![ScheduleRule::Interval {
        every: Duration::from_millis(30),
    }]);

    let pushes = Arc::new(Mutex::new(Vec::new()));
    let commands = Arc::new(Mutex::new(VecDeque::from([
        RemoteCommand::SetServoAngle {
            target: "probe".into(),
            angle: 45.0,
        },
        RemoteCommand::AdjustUp {
            dose: Some(Duration::from_millis(1)),
        },
    ])));
    let port = FakePort {
        pushes: pushes.clone(),
        commands: commands.clone(),
    };

    let handle = {
        let shutdown = shutdown.clone();
        thread::spawn(move || {
            runner::run(corrector, scheduler, port, runner_cfg(), clock, shutdown)
        })
    };

    thread::sleep(Duration::from_millis(400));
    shutdown.store(true, Ordering::SeqCst);
    handle.join().unwrap().unwrap();

    let pushes = pushes.lock().unwrap();
    assert!(pushes.len() >= 2, "only {} reports pushed", pushes.len());
    for report in pushes.iter() {
        assert_eq!(report.device_id, "test_rig");
        assert!((report.value - 7.0).abs() < 1e-9);
        assert!(!report.adjustment_made);
        assert!(report.stable);
    }

    assert!(commands.lock().unwrap().is_empty(), "commands not polled");
    assert!(angles.lock().unwrap().contains(&45.0), "servo command skipped");
    let log = log.lock().unwrap();
    assert!(
        log.iter().any(|e| e == "up on"),
        "one-shot dose never ran: {log:?}"
    );
}

#[test]
fn run_cycle_corrects_out_of_band_reading() {
    let tank = Tank::new(5.5);
    let shutdown = Arc::new(AtomicBool::new(false));
    let clock = Arc::new(MonotonicClock::new());
    let arbiter = ResourceArbiter::new(shutdown.clone());
    let log = Arc::new(Mutex::new(Vec::new()));

    let reader = StableReader::new(
        TankSensor::new(tank.clone()),
        RecordingPositioner::new(),
        fast_reader_cfg(),
        clock.clone(),
        shutdown.clone(),
    );
    let mut corrector = BoundedCorrector::new(
        reader,
        Box::new(StepActuator::new(tank.clone(), 1.0)),
        Box::new(RecordingActuator::new("down", log.clone())),
        Box::new(RecordingActuator::new("mix", log.clone())),
        arbiter,
        fast_corrector_cfg(),
        clock,
        shutdown,
    );

    let report = runner::run_cycle(&mut corrector, &runner_cfg()).unwrap();
    assert!(report.adjustment_made);
    assert!((report.value - 5.5).abs() < 1e-9);
    assert!((tank.get() - 6.5).abs() < 1e-9, "tank at {}", tank.get());
}

#[test]
fn shutdown_mid_settle_deenergizes_and_frees_the_lease() {
    let tank = Tank::new(5.0);
    let shutdown = Arc::new(AtomicBool::new(false));
    let clock = Arc::new(MonotonicClock::new());
    let arbiter = ResourceArbiter::new(shutdown.clone());
    let log = Arc::new(Mutex::new(Vec::new()));

    let up = RecordingActuator::new("up", log.clone());
    let up_energized = up.energized_flag();
    let mixer = RecordingActuator::new("mix", log.clone());
    let mix_energized = mixer.energized_flag();

    let mut cfg = fast_corrector_cfg();
    cfg.settle = Duration::from_secs(30);

    let reader = StableReader::new(
        TankSensor::new(tank.clone()),
        RecordingPositioner::new(),
        fast_reader_cfg(),
        clock.clone(),
        shutdown.clone(),
    );
    let mut corrector = BoundedCorrector::new(
        reader,
        Box::new(up),
        Box::new(RecordingActuator::new("down", log.clone())),
        Box::new(mixer),
        arbiter.clone(),
        cfg,
        clock,
        shutdown.clone(),
    );

    let handle = thread::spawn(move || {
        corrector.correct(Reading {
            value: 5.0,
            stable: true,
        })
    });

    // Let dose + mix finish; the thread is then deep in the settle sleep.
    thread::sleep(Duration::from_millis(100));
    shutdown.store(true, Ordering::SeqCst);
    let start = Instant::now();
    let err = handle.join().unwrap().unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(1), "settle not interrupted");
    assert!(matches!(
        err.downcast_ref::<ControlError>(),
        Some(ControlError::Shutdown)
    ));

    assert!(!up_energized.load(Ordering::SeqCst));
    assert!(!mix_energized.load(Ordering::SeqCst));
    // Lease released before the settle period began.
    shutdown.store(false, Ordering::SeqCst);
    assert!(arbiter.acquire(Some(Duration::ZERO)).is_ok());
}
