//! Pump control
//!
//! Two relays, driven from the water level channel's alert level when
//! automatic control is enabled:
//!
//! | Level    | Pump 1 | Pump 2 |
//! |----------|--------|--------|
//! | High     | on     | -      |
//! | Critical | on     | on     |
//! | Low      | off    | off    |
//! | Normal   | -      | -      |
//!
//! Pumps start above the high mark and keep running until the sump drops
//! below the low mark, which gives the hysteresis band between the two.
//!
//! The controller remembers its last decision per pump and re-applies it
//! every sample cycle, so a relay write that failed is retried until the
//! relay follows.
//!
//! A manual command pins a pump until it is released; automatic decisions
//! never touch a pinned pump. Manual always wins.

use crate::alert::AlertLevel;
use crate::config::DeviceConfig;
use crate::errors::{TelemetryError, TelemetryResult};
use crate::traits::PumpActuator;

/// Pump relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PumpId {
    /// Duty pump
    Pump1,
    /// Assist pump
    Pump2,
}

impl PumpId {
    /// Both pumps, in payload order
    pub const ALL: [PumpId; 2] = [PumpId::Pump1, PumpId::Pump2];

    /// Position in state arrays
    pub const fn index(&self) -> usize {
        match self {
            PumpId::Pump1 => 0,
            PumpId::Pump2 => 1,
        }
    }

    /// Payload field carrying this pump's state
    pub const fn status_field(&self) -> &'static str {
        match self {
            PumpId::Pump1 => "pump_1_status",
            PumpId::Pump2 => "pump_2_status",
        }
    }
}

/// On/off state of both pumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpStates {
    on: [bool; 2],
}

impl PumpStates {
    /// Whether `pump` runs
    pub fn is_on(&self, pump: PumpId) -> bool {
        self.on[pump.index()]
    }

    /// Whether any pump runs
    pub fn any_on(&self) -> bool {
        self.on.iter().any(|on| *on)
    }

    fn set(&mut self, pump: PumpId, on: bool) {
        self.on[pump.index()] = on;
    }
}

/// Automatic and manual pump control over one actuator
pub struct PumpController<A> {
    actuator: A,
    states: PumpStates,
    pinned: [bool; 2],
    decided: [Option<bool>; 2],
    auto_enabled: bool,
    manual_enabled: bool,
}

impl<A: PumpActuator> PumpController<A> {
    /// Controller with both pumps switched off
    pub fn new(config: &DeviceConfig, actuator: A) -> Self {
        let mut controller = Self {
            actuator,
            states: PumpStates::default(),
            pinned: [false; 2],
            decided: [None; 2],
            auto_enabled: config.features.auto_pump,
            manual_enabled: config.features.manual_override,
        };

        for pump in PumpId::ALL {
            if let Err(e) = controller.actuator.set_pump_state(pump, false) {
                log_error!("{:?}: initial off failed: {}", pump, e.reason);
            }
        }
        controller
    }

    /// Apply the current water level and retry any relay that lags
    /// behind the last decision
    pub fn regulate(&mut self, level: AlertLevel) {
        if !self.auto_enabled {
            return;
        }

        match level {
            AlertLevel::High => self.decide(PumpId::Pump1, true),
            AlertLevel::Critical => {
                self.decide(PumpId::Pump1, true);
                self.decide(PumpId::Pump2, true);
            }
            AlertLevel::Low => {
                self.decide(PumpId::Pump1, false);
                self.decide(PumpId::Pump2, false);
            }
            AlertLevel::Normal => {}
        }

        for pump in PumpId::ALL {
            if let Some(on) = self.decided[pump.index()] {
                self.drive(pump, on);
            }
        }
    }

    /// Pin `pump` to a state until [`release`](Self::release)
    pub fn manual(&mut self, pump: PumpId, on: bool) -> TelemetryResult<()> {
        if !self.manual_enabled {
            return Err(TelemetryError::ManualOverrideDisabled);
        }

        self.actuator
            .set_pump_state(pump, on)
            .map_err(|e| TelemetryError::ActuatorFault { reason: e.reason })?;

        self.states.set(pump, on);
        self.pinned[pump.index()] = true;
        log_info!("{:?}: manual {}", pump, if on { "ON" } else { "OFF" });
        Ok(())
    }

    /// Hand `pump` back to automatic control from the next
    /// [`regulate`](Self::regulate) call
    pub fn release(&mut self, pump: PumpId) {
        self.pinned[pump.index()] = false;
    }

    /// Whether `pump` is under manual control
    pub fn is_pinned(&self, pump: PumpId) -> bool {
        self.pinned[pump.index()]
    }

    /// Current pump states
    pub fn states(&self) -> PumpStates {
        self.states
    }

    /// Actuator, for inspection
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    fn decide(&mut self, pump: PumpId, on: bool) {
        self.decided[pump.index()] = Some(on);
    }

    fn drive(&mut self, pump: PumpId, on: bool) {
        if self.is_pinned(pump) || self.states.is_on(pump) == on {
            return;
        }

        match self.actuator.set_pump_state(pump, on) {
            Ok(()) => {
                self.states.set(pump, on);
                log_info!("{:?}: auto {}", pump, if on { "ON" } else { "OFF" });
            }
            Err(e) => {
                log_error!("{:?}: switch failed: {}", pump, e.reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ActuatorError;

    #[derive(Default)]
    struct Relays {
        writes: std::vec::Vec<(PumpId, bool)>,
        broken: bool,
        stuck_on_writes: u32,
    }

    impl PumpActuator for Relays {
        fn set_pump_state(&mut self, pump: PumpId, on: bool) -> Result<(), ActuatorError> {
            if self.broken {
                return Err(ActuatorError { reason: "relay stuck" });
            }
            if on && self.stuck_on_writes > 0 {
                self.stuck_on_writes -= 1;
                return Err(ActuatorError { reason: "contactor did not pull in" });
            }
            self.writes.push((pump, on));
            Ok(())
        }
    }

    fn config(auto: bool, manual: bool) -> DeviceConfig {
        let mut config = DeviceConfig::default();
        config.features.auto_pump = auto;
        config.features.manual_override = manual;
        config
    }

    #[test]
    fn starts_with_pumps_off() {
        let controller = PumpController::new(&config(true, false), Relays::default());
        assert_eq!(
            controller.actuator().writes,
            vec![(PumpId::Pump1, false), (PumpId::Pump2, false)]
        );
        assert!(!controller.states().any_on());
    }

    #[test]
    fn auto_follows_water_level() {
        let mut controller = PumpController::new(&config(true, false), Relays::default());

        controller.regulate(AlertLevel::High);
        assert!(controller.states().is_on(PumpId::Pump1));
        assert!(!controller.states().is_on(PumpId::Pump2));

        controller.regulate(AlertLevel::Critical);
        assert!(controller.states().is_on(PumpId::Pump2));

        // Back inside the band: keep pumping
        controller.regulate(AlertLevel::Normal);
        assert!(controller.states().any_on());

        controller.regulate(AlertLevel::Low);
        assert!(!controller.states().any_on());
    }

    #[test]
    fn auto_disabled_ignores_alerts() {
        let mut controller = PumpController::new(&config(false, false), Relays::default());
        controller.regulate(AlertLevel::Critical);
        assert!(!controller.states().any_on());
    }

    #[test]
    fn manual_override_wins_over_auto() {
        let mut controller = PumpController::new(&config(true, true), Relays::default());

        controller.manual(PumpId::Pump1, false).unwrap();
        controller.regulate(AlertLevel::Critical);

        assert!(!controller.states().is_on(PumpId::Pump1));
        assert!(controller.states().is_on(PumpId::Pump2));

        controller.release(PumpId::Pump1);
        controller.regulate(AlertLevel::High);
        assert!(controller.states().is_on(PumpId::Pump1));
    }

    #[test]
    fn manual_requires_flag() {
        let mut controller = PumpController::new(&config(true, false), Relays::default());
        assert_eq!(
            controller.manual(PumpId::Pump2, true),
            Err(TelemetryError::ManualOverrideDisabled)
        );
    }

    #[test]
    fn failed_switch_keeps_state() {
        let relays = Relays { broken: true, ..Default::default() };
        let mut controller = PumpController::new(&config(true, false), relays);
        controller.regulate(AlertLevel::High);
        assert!(!controller.states().is_on(PumpId::Pump1));
    }

    #[test]
    fn failed_switch_is_retried_while_level_holds() {
        let relays = Relays { stuck_on_writes: 2, ..Default::default() };
        let mut controller = PumpController::new(&config(true, false), relays);

        controller.regulate(AlertLevel::High);
        controller.regulate(AlertLevel::High);
        assert!(!controller.states().is_on(PumpId::Pump1));

        controller.regulate(AlertLevel::High);
        assert!(controller.states().is_on(PumpId::Pump1));
        assert_eq!(controller.actuator().writes.last(), Some(&(PumpId::Pump1, true)));
    }

    #[test]
    fn normal_band_keeps_last_decision() {
        let relays = Relays { stuck_on_writes: 1, ..Default::default() };
        let mut controller = PumpController::new(&config(true, false), relays);

        controller.regulate(AlertLevel::High);
        assert!(!controller.states().is_on(PumpId::Pump1));

        // Level dropped into the band before the relay followed
        controller.regulate(AlertLevel::Normal);
        assert!(controller.states().is_on(PumpId::Pump1));

        controller.regulate(AlertLevel::Low);
        controller.regulate(AlertLevel::Normal);
        assert!(!controller.states().any_on());
    }
}
