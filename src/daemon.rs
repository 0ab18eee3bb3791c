use anyhow::{Context, Result};
use bmsmon_lib::energy::EnergyMeter;
use bmsmon_lib::{BmsSession, PollError};
use log::{error, info, warn};
use serde_json::json;
use std::time::{Duration, Instant};

use crate::commandline::{DaemonOutput, MqttFormat, OutputFormat};
use crate::mqtt;
use crate::output::{self, CsvLayout, Sample};

/// Polling period that backs off while the BMS does not answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl PollInterval {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = Duration::max(base, max);
        Self {
            base,
            max,
            current: base,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn success(&mut self) -> Duration {
        self.current = self.base;
        self.current
    }

    /// Doubles the period, capped at the maximum.
    pub fn failure(&mut self) -> Duration {
        self.current = self.current.saturating_mul(2).min(self.max);
        if self.current.is_zero() {
            self.current = self.max;
        }
        self.current
    }
}

enum Sink {
    Console {
        format: OutputFormat,
        csv: Option<CsvLayout>,
    },
    Mqtt {
        publisher: mqtt::MqttPublisher,
        format: MqttFormat,
    },
}

fn publish_simple_format(
    publisher: &mut mqtt::MqttPublisher,
    base_topic: &str,
    value: &serde_json::Value,
) {
    fn publish_recursive(
        publisher: &mut mqtt::MqttPublisher,
        topic: &str,
        val: &serde_json::Value,
    ) {
        let payload = match val {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    let sub_topic = format!("{topic}/{k}");
                    publish_recursive(publisher, &sub_topic, v);
                }
                return;
            }
            serde_json::Value::Array(arr) => {
                for (i, v) in arr.iter().enumerate() {
                    let sub_topic = format!("{topic}/{}", i + 1);
                    publish_recursive(publisher, &sub_topic, v);
                }
                return;
            }
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            // Do not publish null values
            serde_json::Value::Null => return,
        };
        if let Err(e) = publisher.publish(topic, &payload) {
            error!("Failed to publish message to topic {topic}: {e}");
        }
    }
    publish_recursive(publisher, base_topic, value);
}

impl Sink {
    fn open(output: DaemonOutput) -> Result<Self> {
        Ok(match output {
            DaemonOutput::Console { format } => Sink::Console { format, csv: None },
            DaemonOutput::Mqtt {
                config_file,
                format,
            } => {
                let config = mqtt::MqttConfig::load(&config_file).with_context(|| {
                    format!("Failed to open MQTT config file at '{config_file}'")
                })?;
                info!("Successfully loaded MQTT config from {config_file}: {config:?}");
                let publisher = mqtt::MqttPublisher::new(config)
                    .with_context(|| "Failed to create MQTT publisher")?;
                info!("MQTT Publisher created successfully.");
                Sink::Mqtt { publisher, format }
            }
        })
    }

    fn snapshot(&mut self, sample: &Sample) -> Result<()> {
        match self {
            Sink::Console { format, csv } => match format {
                OutputFormat::Human => println!("{}", output::human_sample(sample)),
                OutputFormat::Csv => {
                    let layout = match csv {
                        Some(layout) => *layout,
                        None => {
                            let layout = CsvLayout::for_snapshot(sample.snapshot);
                            println!("{}", layout.header());
                            *csv = Some(layout);
                            layout
                        }
                    };
                    println!("{}", layout.row(sample));
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string(&output::json_value(sample)?)?)
                }
            },
            Sink::Mqtt { publisher, format } => {
                let mut value = output::json_value(sample)?;
                if let serde_json::Value::Object(map) = &mut value {
                    map.insert("comm_ok".to_string(), json!(true));
                    map.insert(
                        "timestamp".to_string(),
                        json!(chrono::Utc::now().to_rfc3339()),
                    );
                }
                let base_topic = publisher.topic().to_string();
                match format {
                    MqttFormat::Json => {
                        let json_payload = serde_json::to_string(&value)?;
                        publisher.publish(&base_topic, &json_payload)?;
                    }
                    MqttFormat::Simple => publish_simple_format(publisher, &base_topic, &value),
                }
            }
        }
        Ok(())
    }

    fn comm_fault(&mut self, err: &PollError) -> Result<()> {
        match self {
            Sink::Console { .. } => {}
            Sink::Mqtt { publisher, format } => {
                let base_topic = publisher.topic().to_string();
                match format {
                    MqttFormat::Json => {
                        let payload = json!({
                            "timestamp": chrono::Utc::now().to_rfc3339(),
                            "comm_ok": false,
                            "error": err.to_string(),
                        });
                        publisher.publish(&base_topic, &payload.to_string())?;
                    }
                    MqttFormat::Simple => {
                        publisher.publish(&format!("{base_topic}/comm_ok"), "false")?;
                        publisher.publish(&format!("{base_topic}/error"), &err.to_string())?;
                    }
                }
            }
        }
        Ok(())
    }
}

pub fn run(
    mut session: BmsSession,
    output: DaemonOutput,
    interval: Duration,
    max_interval: Duration,
) -> Result<()> {
    info!(
        "Starting daemon mode: vendor={}, output={output:?}, interval={interval:?}, max_interval={max_interval:?}",
        session.vendor()
    );
    let mut sink = Sink::open(output)?;
    let mut pacing = PollInterval::new(interval, max_interval);
    let mut energy = EnergyMeter::new();

    loop {
        match session.poll() {
            Ok(snapshot) => {
                let now = Instant::now();
                let energy_wh = energy.sample(snapshot.power, now);
                let sample = Sample {
                    snapshot: &snapshot,
                    elapsed: energy.elapsed(now),
                    energy_wh,
                };
                if let Err(e) = sink.snapshot(&sample) {
                    error!("Failed to output snapshot: {e:#}");
                }
                if pacing.current() != interval {
                    info!("Communication restored");
                }
                pacing.success();
            }
            Err(err) => {
                error!("Communication fault: {err}");
                if let Err(e) = sink.comm_fault(&err) {
                    error!("Failed to report communication fault: {e:#}");
                }
                let next = pacing.failure();
                warn!("Next poll in {}", humantime::format_duration(next));
            }
        }
        std::thread::sleep(pacing.current());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_backs_off_and_recovers() {
        let mut pacing = PollInterval::new(Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(pacing.current(), Duration::from_secs(1));
        assert_eq!(pacing.failure(), Duration::from_secs(2));
        assert_eq!(pacing.failure(), Duration::from_secs(4));
        assert_eq!(pacing.failure(), Duration::from_secs(8));
        assert_eq!(pacing.failure(), Duration::from_secs(10));
        assert_eq!(pacing.failure(), Duration::from_secs(10));
        assert_eq!(pacing.success(), Duration::from_secs(1));
    }

    #[test]
    fn max_never_below_base() {
        let mut pacing = PollInterval::new(Duration::from_secs(10), Duration::from_secs(1));
        assert_eq!(pacing.failure(), Duration::from_secs(10));
    }
}
