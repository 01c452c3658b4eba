//! Pre-built station scenarios

use stromwater_core::{DeviceConfig, PublishScheduler};

use super::{RecordingActuator, ScriptedSensorSource, ScriptedTransport};

/// Scheduler type used throughout the integration tests
pub type TestScheduler<'a> =
    PublishScheduler<'a, ScriptedTransport, ScriptedSensorSource, RecordingActuator>;

/// Default station with a reachable broker and nominal sensors
pub fn healthy_station(config: &DeviceConfig) -> TestScheduler<'_> {
    PublishScheduler::new(
        config,
        ScriptedTransport::default(),
        ScriptedSensorSource::nominal(config),
        RecordingActuator::default(),
    )
}

/// Station whose broker never answers
pub fn isolated_station(config: &DeviceConfig) -> TestScheduler<'_> {
    PublishScheduler::new(
        config,
        ScriptedTransport::unreachable(),
        ScriptedSensorSource::nominal(config),
        RecordingActuator::default(),
    )
}

/// Tick every `step_ms` from `from` (inclusive) to `to` (exclusive)
pub fn run(scheduler: &mut TestScheduler<'_>, from: u64, to: u64, step_ms: u64) {
    let mut now = from;
    while now < to {
        scheduler.tick(now).expect("watchdog fed");
        now += step_ms;
    }
}
