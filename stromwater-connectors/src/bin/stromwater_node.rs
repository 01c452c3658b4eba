//! Host runner for a StromWater node
//!
//! Wires the simulated station and the MQTT transport into the core
//! scheduler and runs the cooperative loop until the watchdog fires or the
//! optional run time is reached.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use stromwater_connectors::{MqttTransport, SimulatedStation};
use stromwater_core::{
    time::{MonotonicClock, TimeSource},
    DeviceConfig, PublishScheduler,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON station configuration; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the broker host
    #[arg(long)]
    broker: Option<String>,

    /// Override the broker password
    #[arg(long, env = "STROMWATER_MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Loop period in milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Stop after this many seconds
    #[arg(long)]
    run_secs: Option<u64>,

    /// Simulated sump inflow per level read, in metres
    #[arg(long, default_value_t = 0.005)]
    inflow: f32,
}

fn load_config(args: &Args) -> anyhow::Result<DeviceConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("reading {}", path.display()))?;
            DeviceConfig::from_json(&bytes).with_context(|| format!("parsing {}", path.display()))?
        }
        None => DeviceConfig::default(),
    };

    if let Some(broker) = &args.broker {
        config.network.broker = broker.clone();
    }
    if let Some(password) = &args.password {
        config.network.password = password.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();
    let config = load_config(&args)?;

    log::info!(
        "{} ({}) -> {}:{} as {}",
        config.identity.name,
        config.identity.device_id,
        config.network.broker,
        config.network.port,
        config.network.client_id
    );

    let station = SimulatedStation::new(&config, args.inflow);
    let transport = MqttTransport::from_config(&config)?;
    let mut scheduler = PublishScheduler::new(&config, transport, station.sensors(), station.relays());

    let clock = MonotonicClock::new();
    let limit_ms = args.run_secs.map(|secs| secs * 1_000);

    loop {
        let now = clock.now();
        let report = scheduler
            .tick(now)
            .context("main loop stalled, restart required")?;

        if report.published {
            log::debug!("published, sump at {:.2} m", station.level_m());
        }
        if limit_ms.is_some_and(|limit| now >= limit) {
            break;
        }

        thread::sleep(Duration::from_millis(args.tick_ms));
    }

    let stats = scheduler.stats();
    log::info!(
        "stopped: {} samples, {} publishes, {} rejections, {} reconnects, state {}",
        stats.samples,
        stats.publishes,
        stats.rejections,
        stats.reconnects,
        scheduler.state().name()
    );
    Ok(())
}
