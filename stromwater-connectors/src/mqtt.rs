//! MQTT transport for StromWater nodes
//!
//! Wraps the synchronous `rumqttc` client. The scheduler calls into this
//! from its single loop, so the client's event loop is only driven while a
//! connect or publish is waiting for its acknowledgement, and every such
//! wait is bounded by `network_timeout_ms`.

use std::time::{Duration, Instant};

use rumqttc::{Client, ConnectReturnCode, Connection, Event, LastWill, MqttOptions, Outgoing, Packet, QoS};
use stromwater_core::{
    traits::{Transport, TransportError},
    DeviceConfig,
};

use crate::{ConnectionStats, ConnectorError};

/// Outstanding requests buffered between client and event loop
const REQUEST_CAPACITY: usize = 10;

/// Shortest keep-alive the client accepts
const MIN_KEEP_ALIVE_SECS: u16 = 5;

/// Broker connection implementing the core [`Transport`]
pub struct MqttTransport {
    options: MqttOptions,
    qos: QoS,
    timeout: Duration,
    client: Option<Client>,
    connection: Option<Connection>,
    connected: bool,
    stats: ConnectionStats,
}

impl MqttTransport {
    /// Transport for the station's broker settings
    ///
    /// Registers a retained `offline` status as last will on the status
    /// topic.
    pub fn from_config(config: &DeviceConfig) -> Result<Self, ConnectorError> {
        let net = &config.network;

        if net.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(ConnectorError::ConfigError(format!(
                "keep alive must be at least {MIN_KEEP_ALIVE_SECS} s"
            )));
        }
        let qos = qos_from_level(net.qos)?;

        let mut options = MqttOptions::new(&net.client_id, &net.broker, net.port);
        options.set_keep_alive(Duration::from_secs(u64::from(net.keep_alive_secs)));
        options.set_clean_session(true);
        if !net.username.is_empty() {
            options.set_credentials(&net.username, &net.password);
        }

        let will = serde_json::json!({
            "device_id": config.identity.device_id,
            "state": "offline",
        });
        options.set_last_will(LastWill::new(config.status_topic(), will.to_string(), qos, true));

        Ok(Self {
            options,
            qos,
            timeout: Duration::from_millis(config.timing.network_timeout_ms),
            client: None,
            connection: None,
            connected: false,
            stats: ConnectionStats::default(),
        })
    }

    /// QoS used for every publish
    pub fn qos(&self) -> QoS {
        self.qos
    }

    /// Connection statistics
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    fn open(&mut self) -> Result<(), ConnectorError> {
        self.close();

        let (client, connection) = Client::new(self.options.clone(), REQUEST_CAPACITY);
        self.client = Some(client);
        self.connection = Some(connection);

        self.pump_until(|event| match event {
            Event::Incoming(Packet::ConnAck(ack)) if ack.code == ConnectReturnCode::Success => Ok(true),
            Event::Incoming(Packet::ConnAck(ack)) => Err(ConnectorError::Refused(format!("{:?}", ack.code))),
            _ => Ok(false),
        })?;

        self.connected = true;
        self.stats.connections += 1;
        Ok(())
    }

    fn send(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectorError> {
        let client = match self.client.as_mut() {
            Some(client) if self.connected => client,
            _ => return Err(ConnectorError::NotConnected),
        };

        client
            .try_publish(topic, self.qos, false, payload.to_vec())
            .map_err(|e| ConnectorError::ProtocolError(e.to_string()))?;

        let qos = self.qos;
        self.pump_until(|event| {
            Ok(matches!(
                (qos, event),
                (QoS::AtMostOnce, Event::Outgoing(Outgoing::Publish(_)))
                    | (QoS::AtLeastOnce, Event::Incoming(Packet::PubAck(_)))
                    | (QoS::ExactlyOnce, Event::Incoming(Packet::PubComp(_)))
            ))
        })
    }

    /// Drive the event loop until `done` accepts an event or the network
    /// timeout elapses
    fn pump_until<F>(&mut self, mut done: F) -> Result<(), ConnectorError>
    where
        F: FnMut(&Event) -> Result<bool, ConnectorError>,
    {
        let timeout_ms = self.timeout.as_millis() as u64;
        let deadline = Instant::now() + self.timeout;
        let connection = self.connection.as_mut().ok_or(ConnectorError::NotConnected)?;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ConnectorError::Timeout(timeout_ms));
            }

            match connection.recv_timeout(remaining) {
                Ok(Ok(event)) => {
                    log::trace!("mqtt event: {:?}", event);
                    if done(&event)? {
                        return Ok(());
                    }
                }
                Ok(Err(e)) => return Err(ConnectorError::ProtocolError(e.to_string())),
                Err(_) => return Err(ConnectorError::Timeout(timeout_ms)),
            }
        }
    }

    fn close(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = client.try_disconnect();
        }
        self.connection = None;
        self.connected = false;
    }
}

impl Transport for MqttTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        match self.open() {
            Ok(()) => {
                log::info!("MQTT session open as {}", self.options.client_id());
                Ok(())
            }
            Err(e) => {
                log::warn!("MQTT connect failed: {}", e);
                self.stats.last_error = Some(e.to_string());
                self.close();
                Err(TransportError::from(&e))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        match self.send(topic, payload) {
            Ok(()) => {
                self.stats.record_sent(payload.len());
                Ok(())
            }
            Err(e) => {
                log::warn!("MQTT publish to {} failed: {}", topic, e);
                self.stats.record_failure(&e);
                self.close();
                Err(TransportError::from(&e))
            }
        }
    }

    fn disconnect(&mut self) {
        self.close();
    }
}

fn qos_from_level(level: u8) -> Result<QoS, ConnectorError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(ConnectorError::ConfigError(format!("invalid QoS level {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_transport() {
        let transport = MqttTransport::from_config(&DeviceConfig::default()).unwrap();
        assert_eq!(transport.qos(), QoS::AtLeastOnce);
        assert!(!transport.is_connected());
    }

    #[test]
    fn rejects_invalid_settings() {
        let mut config = DeviceConfig::default();
        config.network.qos = 3;
        assert!(matches!(
            MqttTransport::from_config(&config),
            Err(ConnectorError::ConfigError(_))
        ));

        let mut config = DeviceConfig::default();
        config.network.keep_alive_secs = 1;
        assert!(MqttTransport::from_config(&config).is_err());
    }

    #[test]
    fn publish_before_connect_fails() {
        let mut transport = MqttTransport::from_config(&DeviceConfig::default()).unwrap();
        assert_eq!(transport.publish("devices/x/data", b"{}"), Err(TransportError::NotConnected));
        assert_eq!(transport.stats().messages_failed, 1);
    }

    #[test]
    fn unreachable_broker_fails_within_timeout() {
        let mut config = DeviceConfig::default();
        config.network.broker = "127.0.0.1".into();
        config.network.port = 1;
        config.timing.network_timeout_ms = 500;
        let mut transport = MqttTransport::from_config(&config).unwrap();

        let started = Instant::now();
        assert!(transport.connect().is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!transport.is_connected());
    }
}
