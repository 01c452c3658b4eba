//! Software pump station for bench runs
//!
//! A sump fills at a constant inflow and is drained by whichever pumps run.
//! Supply voltage wobbles around 400 V, phase current ramps toward the
//! running pumps' load and an occasional glitch is injected on the R phase
//! so the outlier filter has something to reject.
//!
//! The load ramp stays below the current channels' `max_change`: a motor
//! start modelled as a single step would be rejected by the outlier filter
//! on every later read.
//!
//! The sensor and relay handles share one plant model, so pumps switched by
//! the scheduler show up in the next water level reading.

use std::cell::RefCell;
use std::rc::Rc;

use stromwater_core::{
    config::{ids, AdcConfig, ChannelConfig},
    traits::{ActuatorError, PumpActuator, SensorFault, SensorSource},
    ChannelKind, DeviceConfig, PumpId,
};

/// Level removed per read by one running pump, in metres
const PUMP_DRAIN_M: f32 = 0.01;

/// Phase current drawn per running pump, in amperes
const PUMP_LOAD_A: f32 = 28.0;

/// Largest load change between two reads of the R phase, in amperes
const LOAD_RAMP_A: f32 = 6.0;

/// One glitch every this many reads of the R phase
const GLITCH_PERIOD: u32 = 250;

#[derive(Debug)]
struct Plant {
    adc: AdcConfig,
    level_m: f32,
    inflow_m: f32,
    pumps: [bool; 2],
    load_a: f32,
    seed: u32,
    r_phase_reads: u32,
}

impl Plant {
    /// Uniform noise in [-1, 1]
    fn noise(&mut self) -> f32 {
        self.seed = self.seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((self.seed >> 16) & 0x7fff) as f32 / 16_383.5 - 1.0
    }

    fn running(&self) -> f32 {
        self.pumps.iter().filter(|on| **on).count() as f32
    }

    fn physical(&mut self, channel: &ChannelConfig) -> f32 {
        match channel.kind {
            ChannelKind::WaterLevel => {
                let drained = self.running() * PUMP_DRAIN_M;
                self.level_m = (self.level_m + self.inflow_m - drained).clamp(0.0, channel.max_physical);
                self.level_m + 0.02 * self.noise()
            }
            ChannelKind::Voltage => {
                let mut volts = 400.0 + 4.0 * self.noise();
                if channel.id == ids::VOLTAGE_R {
                    self.r_phase_reads = self.r_phase_reads.wrapping_add(1);
                    if self.r_phase_reads % GLITCH_PERIOD == 0 {
                        volts -= 150.0;
                    }
                }
                volts
            }
            ChannelKind::Current => {
                if channel.id == ids::CURRENT_R {
                    let target = self.running() * PUMP_LOAD_A;
                    self.load_a += (target - self.load_a).clamp(-LOAD_RAMP_A, LOAD_RAMP_A);
                }
                self.load_a + 0.3 + 0.5 * self.noise()
            }
            ChannelKind::Temperature => 32.0 + 4.0 * self.running() + 0.2 * self.noise(),
        }
    }

    /// Invert the channel calibration
    fn to_raw(&self, channel: &ChannelConfig, physical: f32) -> u16 {
        let max_raw = self.adc.max_raw() as f32;
        let sensor_volts = channel.min_voltage + (physical - channel.min_physical) / channel.effective_scale();
        let pin_volts = sensor_volts / channel.divider;
        (pin_volts / self.adc.reference_voltage * max_raw).round().clamp(0.0, max_raw) as u16
    }
}

/// Shared plant model handing out sensor and relay handles
#[derive(Debug, Clone)]
pub struct SimulatedStation {
    plant: Rc<RefCell<Plant>>,
}

impl SimulatedStation {
    /// Station at half level with `inflow_m` added per level read
    pub fn new(config: &DeviceConfig, inflow_m: f32) -> Self {
        let start = config
            .level_channel()
            .map(|c| (c.min_physical + c.max_physical) / 2.0)
            .unwrap_or(5.0);

        Self {
            plant: Rc::new(RefCell::new(Plant {
                adc: config.adc,
                level_m: start,
                inflow_m,
                pumps: [false; 2],
                load_a: 0.0,
                seed: 42,
                r_phase_reads: 0,
            })),
        }
    }

    /// Sensor handle for the scheduler
    pub fn sensors(&self) -> SimulatedAdc {
        SimulatedAdc { plant: Rc::clone(&self.plant) }
    }

    /// Relay handle for the scheduler
    pub fn relays(&self) -> SimulatedRelays {
        SimulatedRelays { plant: Rc::clone(&self.plant) }
    }

    /// True sump level, without sensor noise
    pub fn level_m(&self) -> f32 {
        self.plant.borrow().level_m
    }

    /// Whether `pump` runs
    pub fn pump_running(&self, pump: PumpId) -> bool {
        self.plant.borrow().pumps[pump.index()]
    }
}

/// ADC view of the simulated station
#[derive(Debug)]
pub struct SimulatedAdc {
    plant: Rc<RefCell<Plant>>,
}

impl SensorSource for SimulatedAdc {
    fn read_raw(&mut self, channel: &ChannelConfig) -> Result<u16, SensorFault> {
        let mut plant = self.plant.try_borrow_mut().map_err(|_| SensorFault { reason: "plant busy" })?;
        let physical = plant.physical(channel);
        Ok(plant.to_raw(channel, physical))
    }
}

/// Relay view of the simulated station
#[derive(Debug)]
pub struct SimulatedRelays {
    plant: Rc<RefCell<Plant>>,
}

impl PumpActuator for SimulatedRelays {
    fn set_pump_state(&mut self, pump: PumpId, on: bool) -> Result<(), ActuatorError> {
        let mut plant = self.plant.try_borrow_mut().map_err(|_| ActuatorError { reason: "plant busy" })?;
        plant.pumps[pump.index()] = on;
        log::info!("{:?} relay {}", pump, if on { "closed" } else { "open" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stromwater_core::{CalibrationMapper, OutlierFilter};

    fn hydro(config: &DeviceConfig) -> &ChannelConfig {
        config.level_channel().unwrap()
    }

    #[test]
    fn sump_fills_without_pumps() {
        let config = DeviceConfig::default();
        let station = SimulatedStation::new(&config, 0.05);
        let mut adc = station.sensors();

        let start = station.level_m();
        for _ in 0..10 {
            adc.read_raw(hydro(&config)).unwrap();
        }
        assert!(station.level_m() > start + 0.4);
    }

    #[test]
    fn pumps_drain_the_sump() {
        let config = DeviceConfig::default();
        let station = SimulatedStation::new(&config, 0.0);
        let mut adc = station.sensors();
        let mut relays = station.relays();

        relays.set_pump_state(PumpId::Pump1, true).unwrap();
        relays.set_pump_state(PumpId::Pump2, true).unwrap();
        assert!(station.pump_running(PumpId::Pump2));

        let start = station.level_m();
        for _ in 0..10 {
            adc.read_raw(hydro(&config)).unwrap();
        }
        assert!((start - station.level_m() - 0.2).abs() < 1e-3);
    }

    #[test]
    fn readings_calibrate_back_to_plant_values() {
        let config = DeviceConfig::default();
        let station = SimulatedStation::new(&config, 0.0);
        let mut adc = station.sensors();
        let mapper = CalibrationMapper::new(&config.adc);

        let channel = &config.channels[config.channel_index(&ids::VOLTAGE_Y).unwrap()];
        let raw = adc.read_raw(channel).unwrap();
        let (volts, flagged) = mapper.to_physical(channel, raw);
        assert!(!flagged);
        assert!((volts - 400.0).abs() < 6.0);

        let channel = &config.channels[config.channel_index(&ids::CURRENT_R).unwrap()];
        let (amps, _) = mapper.to_physical(channel, adc.read_raw(channel).unwrap());
        assert!(amps < 2.0);
    }

    #[test]
    fn pump_start_ramps_without_filter_rejections() {
        let config = DeviceConfig::default();
        let station = SimulatedStation::new(&config, 0.0);
        let mut adc = station.sensors();
        let mut relays = station.relays();
        let mapper = CalibrationMapper::new(&config.adc);
        let mut filter = OutlierFilter::from_config(&config);

        let currents: Vec<usize> = [ids::CURRENT_R, ids::CURRENT_Y, ids::CURRENT_B]
            .iter()
            .map(|id| config.channel_index(id).unwrap())
            .collect();

        let mut read_all = |filter: &mut OutlierFilter| {
            let mut values = Vec::new();
            for &index in &currents {
                let channel = &config.channels[index];
                let (amps, _) = mapper.to_physical(channel, adc.read_raw(channel).unwrap());
                values.push(filter.accept(index, amps).value);
            }
            values
        };

        for _ in 0..config.filter.window {
            read_all(&mut filter);
        }

        relays.set_pump_state(PumpId::Pump1, true).unwrap();
        relays.set_pump_state(PumpId::Pump2, true).unwrap();
        let mut last = Vec::new();
        for _ in 0..30 {
            last = read_all(&mut filter);
        }

        assert_eq!(filter.total_rejections(), 0);
        for amps in last {
            assert!((amps - 2.0 * PUMP_LOAD_A).abs() < 2.0, "filtered load {amps} A");
        }
    }

    #[test]
    fn noise_stays_bounded() {
        let config = DeviceConfig::default();
        let station = SimulatedStation::new(&config, 0.0);
        let mut plant = station.plant.borrow_mut();
        for _ in 0..1_000 {
            let n = plant.noise();
            assert!((-1.0..=1.0).contains(&n));
        }
    }
}
