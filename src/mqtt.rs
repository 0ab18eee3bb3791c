use anyhow::{bail, Context, Result};
use rumqttc::{Client, MqttOptions, QoS};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    host: String,
    #[serde(default = "MqttConfig::default_port")]
    port: u16,
    username: Option<String>,
    password: Option<String>,
    #[serde(default = "MqttConfig::default_topic")]
    topic: String,
    #[serde(default = "MqttConfig::default_qos")]
    qos: u8,
    #[serde(default = "MqttConfig::default_client_id")]
    client_id: String,
    #[serde(
        default = "MqttConfig::default_keep_alive_interval",
        with = "humantime_serde"
    )]
    keep_alive_interval: Duration,
    #[serde(
        default = "MqttConfig::default_reconnect_interval",
        with = "humantime_serde"
    )]
    reconnect_interval: Duration,
}

impl MqttConfig {
    fn default_port() -> u16 {
        1883
    }

    fn default_topic() -> String {
        "bmsmon".into()
    }

    fn default_qos() -> u8 {
        0
    }

    fn generate_random_string(len: usize) -> String {
        use rand::distributions::Alphanumeric;
        use rand::Rng;

        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    fn default_client_id() -> String {
        format!("bmsmon-{}", Self::generate_random_string(8))
    }

    fn default_keep_alive_interval() -> Duration {
        Duration::from_secs(30)
    }

    fn default_reconnect_interval() -> Duration {
        Duration::from_secs(5)
    }

    pub const DEFAULT_CONFIG_FILE: &str = "mqtt.yaml";

    pub fn load(config_file_path: &str) -> Result<Self> {
        log::debug!("Loading config file from {config_file_path:?}");
        let config_file = std::fs::File::open(config_file_path)
            .with_context(|| format!("Cannot open MQTT config file {config_file_path:?}"))?;
        let config: Self = serde_yaml::from_reader(&config_file)
            .with_context(|| format!("Cannot read MQTT config from file: {config_file_path:?}"))?;
        config.qos()?;
        if !config.keep_alive_interval.is_zero()
            && config.keep_alive_interval < Duration::from_secs(1)
        {
            bail!(
                "Invalid MQTT keep alive interval {:?}, expected 0 or at least 1s",
                config.keep_alive_interval
            );
        }
        Ok(config)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn qos(&self) -> Result<QoS> {
        Ok(match self.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            other => bail!("Invalid MQTT QoS {other}, expected 0, 1 or 2"),
        })
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options
            .set_keep_alive(self.keep_alive_interval)
            .set_clean_session(true);
        match (&self.username, &self.password) {
            (Some(username), password) => {
                options.set_credentials(username, password.as_deref().unwrap_or_default());
            }
            (None, Some(_)) => log::warn!("MQTT password given without username, ignoring it"),
            (None, None) => {}
        }
        options
    }

    /// Creates the client and drives its connection on a background thread.
    pub fn create_client(&self) -> Result<Client> {
        log::info!(
            "Connecting to MQTT broker: {}:{} with client_id: {}",
            self.host,
            self.port,
            self.client_id
        );
        let (client, mut connection) = Client::new(self.options(), 64);
        let reconnect_interval = self.reconnect_interval;
        std::thread::Builder::new()
            .name("mqtt-connection".into())
            .spawn(move || {
                for notification in connection.iter() {
                    match notification {
                        Ok(event) => log::trace!("MQTT event: {event:?}"),
                        Err(err) => {
                            log::warn!("MQTT connection error: {err}, reconnecting");
                            std::thread::sleep(reconnect_interval);
                        }
                    }
                }
            })
            .with_context(|| "Cannot spawn MQTT connection thread")?;
        Ok(client)
    }
}

pub struct MqttPublisher {
    client: Client,
    config: MqttConfig,
    qos: QoS,
}

impl MqttPublisher {
    pub fn new(config: MqttConfig) -> Result<Self> {
        let qos = config.qos()?;
        let client = config.create_client()?;
        Ok(Self {
            client,
            config,
            qos,
        })
    }

    pub fn topic(&self) -> &str {
        self.config.topic()
    }

    pub fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        log::debug!(
            "Publishing to MQTT: Topic='{}', Payload='{payload}', QoS={:?}",
            topic,
            self.qos
        );

        self.client
            .publish(topic, self.qos, false, payload.as_bytes().to_vec())
            .with_context(|| format!("Failed to publish message to MQTT topic: {}", topic))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_with_defaults() {
        let file = config_file("host: broker.local\n");
        let config = MqttConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.host, "broker.local");
        assert_eq!(config.port, 1883);
        assert_eq!(config.topic(), "bmsmon");
        assert_eq!(config.qos().unwrap(), QoS::AtMostOnce);
        assert!(config.client_id.starts_with("bmsmon-"));
        assert_eq!(config.client_id.len(), "bmsmon-".len() + 8);
        assert_eq!(config.keep_alive_interval, Duration::from_secs(30));
    }

    #[test]
    fn load_full_config() {
        let file = config_file(
            "host: 10.0.0.2\n\
             port: 8883\n\
             username: bms\n\
             password: secret\n\
             topic: garage/battery\n\
             qos: 1\n\
             client_id: garage-bms\n\
             keep_alive_interval: 1m\n\
             reconnect_interval: 500ms\n",
        );
        let config = MqttConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port, 8883);
        assert_eq!(config.username.as_deref(), Some("bms"));
        assert_eq!(config.topic(), "garage/battery");
        assert_eq!(config.qos().unwrap(), QoS::AtLeastOnce);
        assert_eq!(config.client_id, "garage-bms");
        assert_eq!(config.keep_alive_interval, Duration::from_secs(60));
        assert_eq!(config.reconnect_interval, Duration::from_millis(500));
    }

    #[test]
    fn invalid_qos_is_rejected() {
        let file = config_file("host: broker.local\nqos: 3\n");
        assert!(MqttConfig::load(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn sub_second_keep_alive_is_rejected() {
        let file = config_file("host: broker.local\nkeep_alive_interval: 500ms\n");
        assert!(MqttConfig::load(file.path().to_str().unwrap()).is_err());

        let file = config_file("host: broker.local\nkeep_alive_interval: 0s\n");
        let config = MqttConfig::load(file.path().to_str().unwrap()).unwrap();
        assert!(config.keep_alive_interval.is_zero());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        assert!(MqttConfig::load(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn random_client_ids_differ() {
        assert_ne!(
            MqttConfig::default_client_id(),
            MqttConfig::default_client_id()
        );
    }
}
