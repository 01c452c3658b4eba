//! Sample, publish and heartbeat loop
//!
//! ## Overview
//!
//! [`PublishScheduler`] owns every stateful component of the node and is
//! driven by a single `tick(now)` call from the main loop. Three cadences
//! run off the same clock, each firing on the first tick:
//!
//! | Action    | Interval                  | Needs network |
//! |-----------|---------------------------|---------------|
//! | Sample    | `sensor_read_interval_ms` | no            |
//! | Publish   | `publish_interval_ms`     | yes           |
//! | Heartbeat | `heartbeat_interval_ms`   | yes           |
//!
//! A sample cycle reads every channel, calibrates, filters, evaluates
//! alerts, regulates the pumps and assembles a fresh record. Completing it
//! feeds the watchdog. Every publish assembles the record again from the
//! latest samples and the alerts still pending, so an alert is sent once
//! and a payload never repeats an old timestamp.
//!
//! ## Connection state machine
//!
//! ```text
//!  Disconnected ──connect ok──► Connected ──publish fails / link lost──┐
//!       │                          ▲                                   │
//!       │ connect fails            │ connect ok                        ▼
//!       └──────────────────► Reconnecting{n} ◄───── every reconnect_delay_ms
//!                                  │
//!                                  │ n == max_reconnect_attempts
//!                                  ▼
//!                            Degraded{since} ──reset_network() / degraded_reset_ms──► Disconnected
//! ```
//!
//! Degraded keeps sampling, alerting and pump control running; it only
//! stops network operations. Alerts queued while offline are bounded and
//! the oldest are dropped first.
//!
//! A connect attempt is not started when the watchdog deadline is closer
//! than `network_timeout_ms`: a blocked connect must never be the reason
//! the watchdog fires.

use alloc::string::String;

use heapless::Vec;

use crate::alert::{AlertEvaluator, AlertEvent, PhaseImbalanceMonitor};
use crate::calibration::{CalibratedSample, CalibrationMapper, RawSample};
use crate::config::DeviceConfig;
use crate::constants::buffers::{MAX_CHANNELS, MAX_PENDING_ALERTS, PHASES};
use crate::errors::{TelemetryError, TelemetryResult};
use crate::filter::OutlierFilter;
use crate::pump::{PumpController, PumpId, PumpStates};
use crate::telemetry::{Heartbeat, TelemetryAssembler, TelemetryRecord};
use crate::time::{Interval, Timestamp};
use crate::traits::{PumpActuator, SensorSource, Transport};
use crate::watchdog::Watchdog;

/// Publish path state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected yet, or reset after degraded mode
    Disconnected,
    /// Transport is up
    Connected,
    /// Connection lost; `attempts` consecutive connects have failed
    Reconnecting {
        /// Failed attempts so far
        attempts: u32,
    },
    /// Retry budget spent; no network operations
    Degraded {
        /// Time degraded mode was entered
        since: Timestamp,
    },
}

impl ConnectionState {
    /// Name used in heartbeats and logs
    pub const fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting { .. } => "reconnecting",
            ConnectionState::Degraded { .. } => "degraded",
        }
    }

    /// Whether network operations are suspended
    pub fn is_degraded(&self) -> bool {
        matches!(self, ConnectionState::Degraded { .. })
    }

    fn failed_attempts(&self) -> u32 {
        match self {
            ConnectionState::Reconnecting { attempts } => *attempts,
            _ => 0,
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// A sample cycle completed
    pub sampled: bool,
    /// Alert events raised during the sample cycle
    pub alerts_raised: usize,
    /// A telemetry record was published
    pub published: bool,
    /// A heartbeat was published
    pub heartbeat: bool,
    /// A connect was attempted
    pub connect_attempted: bool,
}

/// Counters since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Completed sample cycles
    pub samples: u32,
    /// Failed channel reads
    pub sensor_faults: u32,
    /// Spikes rejected by the filter
    pub rejections: u32,
    /// Successful telemetry publishes
    pub publishes: u32,
    /// Failed publishes (telemetry or heartbeat)
    pub publish_failures: u32,
    /// Connect attempts
    pub connect_attempts: u32,
    /// Successful connects
    pub reconnects: u32,
    /// Alerts dropped from a full queue
    pub dropped_alerts: u32,
}

/// Cooperative scheduler for one station
pub struct PublishScheduler<'a, T, S, P> {
    config: &'a DeviceConfig,
    transport: T,
    source: S,
    pumps: PumpController<P>,

    mapper: CalibrationMapper,
    filter: OutlierFilter,
    evaluator: AlertEvaluator,
    imbalance: Option<PhaseImbalanceMonitor>,
    assembler: TelemetryAssembler<'a>,
    level_index: Option<usize>,

    latest: Vec<Option<CalibratedSample>, MAX_CHANNELS>,
    pending: Vec<AlertEvent, MAX_PENDING_ALERTS>,
    record: Option<TelemetryRecord<'a>>,

    sample_interval: Interval,
    publish_interval: Interval,
    heartbeat_interval: Interval,
    reconnect_interval: Interval,
    watchdog: Option<Watchdog>,
    started_at: Option<Timestamp>,

    state: ConnectionState,
    stats: SchedulerStats,
    data_topic: String,
    status_topic: String,
}

impl<'a, T, S, P> PublishScheduler<'a, T, S, P>
where
    T: Transport,
    S: SensorSource,
    P: PumpActuator,
{
    /// Scheduler over a validated config
    ///
    /// Pumps are switched off here; the watchdog is armed on the first tick.
    pub fn new(config: &'a DeviceConfig, transport: T, source: S, actuator: P) -> Self {
        let timing = &config.timing;

        let mut latest = Vec::new();
        for _ in config.channels.iter().take(MAX_CHANNELS) {
            let _ = latest.push(None);
        }

        Self {
            config,
            transport,
            source,
            pumps: PumpController::new(config, actuator),
            mapper: CalibrationMapper::new(&config.adc),
            filter: OutlierFilter::from_config(config),
            evaluator: AlertEvaluator::from_config(config),
            imbalance: PhaseImbalanceMonitor::from_config(config),
            assembler: TelemetryAssembler::new(config),
            level_index: config.level_channel().and_then(|c| config.channel_index(&c.id)),
            latest,
            pending: Vec::new(),
            record: None,
            sample_interval: Interval::new(timing.sensor_read_interval_ms),
            publish_interval: Interval::new(timing.publish_interval_ms),
            heartbeat_interval: Interval::new(timing.heartbeat_interval_ms),
            reconnect_interval: Interval::new(timing.reconnect_delay_ms),
            watchdog: None,
            started_at: None,
            state: ConnectionState::Disconnected,
            stats: SchedulerStats::default(),
            data_topic: config.data_topic(),
            status_topic: config.status_topic(),
        }
    }

    /// Run whatever is due at `now`
    ///
    /// The only error is [`TelemetryError::WatchdogExpired`]; the caller
    /// must restart the device.
    pub fn tick(&mut self, now: Timestamp) -> TelemetryResult<TickReport> {
        let timeout = self.config.timing.watchdog_timeout_ms;
        self.started_at.get_or_insert(now);
        let watchdog = *self.watchdog.get_or_insert(Watchdog::new(timeout, now));

        if let Err(e) = watchdog.check(now) {
            log_error!("{}", e);
            return Err(e);
        }

        let mut report = TickReport::default();

        if self.sample_interval.poll(now) {
            self.sample_cycle(now, &mut report);
        }

        self.service_network(now, &mut report);

        Ok(report)
    }

    /// Leave degraded mode and resume connect attempts on the next tick
    pub fn reset_network(&mut self) {
        if self.state == ConnectionState::Connected {
            return;
        }
        log_info!("network reset from {}", self.state.name());
        self.state = ConnectionState::Disconnected;
        self.reconnect_interval.reset();
    }

    /// Manual pump command
    pub fn manual_pump(&mut self, pump: PumpId, on: bool) -> TelemetryResult<()> {
        self.pumps.manual(pump, on)
    }

    /// Return a pump to automatic control
    pub fn release_pump(&mut self, pump: PumpId) {
        self.pumps.release(pump);
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Counters since start
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats { rejections: self.filter.total_rejections(), ..self.stats }
    }

    /// Record assembled by the last sample cycle or publish
    pub fn latest_record(&self) -> Option<&TelemetryRecord<'a>> {
        self.record.as_ref()
    }

    /// Alerts not yet published
    pub fn pending_alerts(&self) -> &[AlertEvent] {
        &self.pending
    }

    /// Current pump states
    pub fn pump_states(&self) -> PumpStates {
        self.pumps.states()
    }

    /// Milliseconds until the watchdog fires; full timeout before the first tick
    pub fn watchdog_remaining(&self, now: Timestamp) -> u64 {
        self.watchdog
            .map(|w| w.remaining(now))
            .unwrap_or(self.config.timing.watchdog_timeout_ms)
    }

    /// Transport, for inspection
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Transport, for maintenance commands
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sensor source, for scripting in tests and simulations
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Pump actuator, for inspection
    pub fn actuator(&self) -> &P {
        self.pumps.actuator()
    }

    fn sample_cycle(&mut self, now: Timestamp, report: &mut TickReport) {
        let config = self.config;

        for (index, channel) in config.channels.iter().enumerate().take(MAX_CHANNELS) {
            let raw = match self.source.read_raw(channel) {
                Ok(raw) => raw,
                Err(fault) => {
                    log_warn!(
                        "{}",
                        TelemetryError::SensorFault { channel: channel.id, reason: fault.reason }
                    );
                    self.stats.sensor_faults = self.stats.sensor_faults.saturating_add(1);
                    self.latest[index] = None;
                    continue;
                }
            };

            let sample = self.mapper.calibrate(
                channel,
                &RawSample { channel: channel.id, raw, timestamp: now },
            );

            if config.features.print_raw_sensor_data {
                log_debug!(
                    "{} ({}) raw={} pin={} -> {} {}",
                    channel.id,
                    channel.kind.name(),
                    raw,
                    channel.pin,
                    sample.value,
                    channel.kind.unit()
                );
            }

            let outcome = self.filter.accept(index, sample.value);
            if outcome.rejected {
                // Rejected readings never enter the buffer
                let last = self.filter.state(index).and_then(|s| s.last_accepted());
                log_debug!(
                    "{}",
                    TelemetryError::FilterRejection {
                        channel: channel.id,
                        delta: libm::fabsf(sample.value - last.unwrap_or(sample.value)),
                        max_change: channel.max_change.unwrap_or(0.0),
                    }
                );
            }

            self.latest[index] = Some(CalibratedSample { value: outcome.value, ..sample });

            if let Some(event) = self.evaluator.evaluate(index, outcome.value, now) {
                self.queue_alert(event);
                report.alerts_raised += 1;
            }
        }

        if let Some(event) = self.evaluate_imbalance(now) {
            self.queue_alert(event);
            report.alerts_raised += 1;
        }

        if let Some(index) = self.level_index {
            self.pumps.regulate(self.evaluator.level(index));
        }

        self.assemble(now);

        if let Some(watchdog) = self.watchdog.as_mut() {
            watchdog.feed(now);
        }
        self.stats.samples = self.stats.samples.saturating_add(1);
        report.sampled = true;
    }

    fn assemble(&mut self, now: Timestamp) -> &TelemetryRecord<'a> {
        self.record.insert(self.assembler.assemble(
            &self.latest,
            &self.evaluator,
            &self.pending,
            self.pumps.states(),
            now,
        ))
    }

    fn evaluate_imbalance(&mut self, now: Timestamp) -> Option<AlertEvent> {
        let monitor = self.imbalance.as_mut()?;

        let mut currents = [0.0f32; PHASES];
        for (slot, index) in currents.iter_mut().zip(monitor.indices().iter()) {
            *slot = self.latest.get(*index).copied().flatten()?.value;
        }

        monitor.evaluate(&currents, now)
    }

    fn queue_alert(&mut self, event: AlertEvent) {
        if self.pending.is_full() {
            let dropped = self.pending.remove(0);
            self.stats.dropped_alerts = self.stats.dropped_alerts.saturating_add(1);
            log_warn!("alert queue full, dropping {} {}", dropped.channel, dropped.level);
        }
        let _ = self.pending.push(event);
    }

    fn service_network(&mut self, now: Timestamp, report: &mut TickReport) {
        match self.state {
            ConnectionState::Degraded { since } => {
                let expired = self
                    .config
                    .timing
                    .degraded_reset_ms
                    .is_some_and(|reset| now.saturating_sub(since) >= reset);

                if !expired {
                    if self.publish_interval.poll(now) {
                        self.hold_locally(now);
                    }
                    return;
                }
                log_info!("degraded timeout elapsed, retrying network");
                self.reset_network();
            }
            ConnectionState::Connected if !self.transport.is_connected() => {
                log_warn!("{}", TelemetryError::TransportDisconnected);
                self.state = ConnectionState::Reconnecting { attempts: 0 };
                self.reconnect_interval.reset();
            }
            _ => {}
        }

        if self.state != ConnectionState::Connected {
            if self.reconnect_interval.is_due(now) {
                self.try_connect(now, report);
            }
            if self.state != ConnectionState::Connected {
                return;
            }
        }

        if self.publish_interval.poll(now) {
            self.publish_record(now, report);
        }

        if self.state == ConnectionState::Connected && self.heartbeat_interval.poll(now) {
            self.publish_heartbeat(now, report);
        }
    }

    fn try_connect(&mut self, now: Timestamp, report: &mut TickReport) {
        let remaining = self.watchdog_remaining(now);
        if remaining < self.config.timing.network_timeout_ms {
            log_debug!("connect skipped, watchdog due in {} ms", remaining);
            return;
        }

        self.reconnect_interval.restart(now);
        report.connect_attempted = true;
        self.stats.connect_attempts = self.stats.connect_attempts.saturating_add(1);

        match self.transport.connect() {
            Ok(()) => {
                log_info!("connected to {}:{}", self.config.network.broker, self.config.network.port);
                self.state = ConnectionState::Connected;
                self.stats.reconnects = self.stats.reconnects.saturating_add(1);
                self.publish_interval.reset();
            }
            Err(e) => {
                let attempts = self.state.failed_attempts().saturating_add(1);
                let max = self.config.network.max_reconnect_attempts;

                if attempts >= max {
                    log_error!("{}", TelemetryError::ReconnectExhausted { attempts });
                    self.transport.disconnect();
                    self.state = ConnectionState::Degraded { since: now };
                } else {
                    log_warn!("connect attempt {}/{} failed: {:?}", attempts, max, e);
                    self.state = ConnectionState::Reconnecting { attempts };
                }
            }
        }
    }

    fn publish_record(&mut self, now: Timestamp, report: &mut TickReport) {
        if self.stats.samples == 0 {
            return;
        }

        let payload = match self.assemble(now).encode() {
            Ok(payload) => payload,
            Err(e) => {
                log_error!("{}", e);
                return;
            }
        };

        if self.config.features.print_payload {
            log_debug!("{} <- {}", self.data_topic, core::str::from_utf8(&payload).unwrap_or(""));
        }

        match self.transport.publish(&self.data_topic, &payload) {
            Ok(()) => {
                self.stats.publishes = self.stats.publishes.saturating_add(1);
                self.pending.clear();
                report.published = true;
            }
            Err(e) => self.on_publish_failure(e),
        }
    }

    fn publish_heartbeat(&mut self, now: Timestamp, report: &mut TickReport) {
        let stats = self.stats();
        let beat = Heartbeat {
            device_id: &self.config.identity.device_id,
            uptime_ms: now.saturating_sub(self.started_at.unwrap_or(now)),
            state: self.state.name(),
            samples: stats.samples,
            publishes: stats.publishes,
            rejections: stats.rejections,
            reconnects: stats.reconnects,
            alert_level: self.evaluator.worst_level(),
            firmware: crate::VERSION,
        };

        let payload = match beat.encode() {
            Ok(payload) => payload,
            Err(e) => {
                log_error!("{}", e);
                return;
            }
        };

        match self.transport.publish(&self.status_topic, &payload) {
            Ok(()) => report.heartbeat = true,
            Err(e) => self.on_publish_failure(e),
        }
    }

    fn on_publish_failure(&mut self, error: crate::traits::TransportError) {
        log_warn!("{}: {:?}", TelemetryError::TransportDisconnected, error);
        self.stats.publish_failures = self.stats.publish_failures.saturating_add(1);
        self.state = ConnectionState::Reconnecting { attempts: 0 };
        self.reconnect_interval.reset();
    }

    fn hold_locally(&mut self, now: Timestamp) {
        if self.config.features.print_payload && self.stats.samples > 0 {
            if let Ok(payload) = self.assemble(now).encode() {
                log_debug!("offline: {}", core::str::from_utf8(&payload).unwrap_or(""));
            }
        }
        if !self.pending.is_empty() {
            log_info!("offline: discarding {} alerts", self.pending.len());
            self.pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ActuatorError, SensorFault, TransportError};
    use crate::ChannelConfig;

    struct FixedAdc(u16);

    impl SensorSource for FixedAdc {
        fn read_raw(&mut self, _channel: &ChannelConfig) -> Result<u16, SensorFault> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct Link {
        up: bool,
        refuse: bool,
        connects: u32,
        published: std::vec::Vec<std::string::String>,
    }

    impl Transport for Link {
        fn connect(&mut self) -> Result<(), TransportError> {
            self.connects += 1;
            if self.refuse {
                return Err(TransportError::Refused);
            }
            self.up = true;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.up
        }

        fn publish(&mut self, topic: &str, _payload: &[u8]) -> Result<(), TransportError> {
            if !self.up {
                return Err(TransportError::NotConnected);
            }
            self.published.push(topic.into());
            Ok(())
        }

        fn disconnect(&mut self) {
            self.up = false;
        }
    }

    struct NoRelays;

    impl PumpActuator for NoRelays {
        fn set_pump_state(&mut self, _pump: PumpId, _on: bool) -> Result<(), ActuatorError> {
            Ok(())
        }
    }

    #[test]
    fn first_tick_samples_connects_and_publishes() {
        let config = DeviceConfig::default();
        let mut scheduler = PublishScheduler::new(&config, Link::default(), FixedAdc(1000), NoRelays);

        let report = scheduler.tick(0).unwrap();
        assert!(report.sampled);
        assert!(report.connect_attempted);
        assert!(report.published);
        assert!(report.heartbeat);
        assert_eq!(scheduler.state(), ConnectionState::Connected);
        assert_eq!(
            scheduler.transport().published,
            vec!["devices/StromWater_Device_1/data", "devices/StromWater_Device_1/status"]
        );
    }

    #[test]
    fn cadences_follow_intervals() {
        let config = DeviceConfig::default();
        let mut scheduler = PublishScheduler::new(&config, Link::default(), FixedAdc(1000), NoRelays);
        scheduler.tick(0).unwrap();

        let report = scheduler.tick(500).unwrap();
        assert!(!report.sampled && !report.published);

        let report = scheduler.tick(1_000).unwrap();
        assert!(report.sampled && !report.published);

        let report = scheduler.tick(5_000).unwrap();
        assert!(report.published && !report.heartbeat);
        assert_eq!(scheduler.stats().samples, 3);
    }

    #[test]
    fn lost_link_triggers_reconnect() {
        let config = DeviceConfig::default();
        let mut scheduler = PublishScheduler::new(&config, Link::default(), FixedAdc(1000), NoRelays);
        scheduler.tick(0).unwrap();

        scheduler.transport.up = false;

        let report = scheduler.tick(1_000).unwrap();
        assert!(report.connect_attempted);
        assert_eq!(scheduler.state(), ConnectionState::Connected);
        assert_eq!(scheduler.stats().reconnects, 2);
    }

    #[test]
    fn degraded_after_budget_and_timed_reset() {
        let mut config = DeviceConfig::default();
        config.timing.degraded_reset_ms = Some(60_000);
        config.timing.watchdog_timeout_ms = 600_000;
        let link = Link { refuse: true, ..Default::default() };
        let mut scheduler = PublishScheduler::new(&config, link, FixedAdc(1000), NoRelays);

        let mut now = 0;
        for _ in 0..config.network.max_reconnect_attempts {
            scheduler.tick(now).unwrap();
            now += config.timing.reconnect_delay_ms;
        }
        assert!(scheduler.state().is_degraded());
        let connects = scheduler.transport().connects;

        scheduler.tick(now).unwrap();
        assert_eq!(scheduler.transport().connects, connects);

        let report = scheduler.tick(now + 60_000).unwrap();
        assert!(report.connect_attempted);
    }

    #[test]
    fn watchdog_blocks_late_connect() {
        let mut config = DeviceConfig::default();
        config.timing.watchdog_timeout_ms = 40_000;
        config.timing.sensor_read_interval_ms = 100_000;
        let link = Link { refuse: true, ..Default::default() };
        let mut scheduler = PublishScheduler::new(&config, link, FixedAdc(1000), NoRelays);

        scheduler.tick(0).unwrap();
        assert_eq!(scheduler.transport().connects, 1);

        // 30 s timeout does not fit in the 20 s left
        let report = scheduler.tick(20_000).unwrap();
        assert!(!report.connect_attempted);

        assert!(matches!(
            scheduler.tick(40_001),
            Err(TelemetryError::WatchdogExpired { last_fed: 0, .. })
        ));
    }
}
