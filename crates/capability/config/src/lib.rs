//! 代理运行配置加载。
//!
//! 配置来源是 `KEY=VALUE` 形式的 properties 文件（键可包含 `.`），
//! 读取后放入键值表，再由 [`AgentConfig::from_properties`] 校验并补齐默认值。

use domain::{DeviceIdentity, TopicSet, topics};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

pub const KEY_COMMAND_PROCESSOR: &str = "command.processor.classname";
pub const KEY_TENANT: &str = "tenant";
pub const KEY_DEVICE_TOKEN: &str = "device.token";
pub const KEY_AREA_TOKEN: &str = "area.token";
pub const KEY_CUSTOMER_TOKEN: &str = "customer.token";
pub const KEY_DEVICE_TYPE_TOKEN: &str = "device.type.token";
pub const KEY_MQTT_HOSTNAME: &str = "mqtt.hostname";
pub const KEY_MQTT_PORT: &str = "mqtt.port";
pub const KEY_MQTT_CLIENT_ID: &str = "mqtt.client.id";
pub const KEY_MQTT_USERNAME: &str = "mqtt.username";
pub const KEY_MQTT_PASSWORD: &str = "mqtt.password";
pub const KEY_MQTT_KEEPALIVE: &str = "mqtt.keepalive.seconds";
pub const KEY_OUTBOUND_TOPIC: &str = "mqtt.outbound.sitewhere.topic";
pub const KEY_INBOUND_SYSTEM_TOPIC: &str = "mqtt.inbound.sitewhere.topic";
pub const KEY_INBOUND_COMMAND_TOPIC: &str = "mqtt.inbound.command.topic";

pub const DEFAULT_MQTT_HOSTNAME: &str = "localhost";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_MQTT_KEEPALIVE_SECS: u64 = 30;

/// 默认配置文件路径。
pub const DEFAULT_CONFIG_PATH: &str = "config.properties";

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required property: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("unable to read properties from {0}: {1}")]
    Io(String, String),
}

/// MQTT 连接参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub hostname: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
}

/// 代理运行配置（启动后只读）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub command_processor: String,
    pub tenant: String,
    pub device_token: String,
    pub area_token: String,
    pub customer_token: String,
    pub device_type_token: String,
    pub mqtt: MqttSettings,
    pub topics: TopicSet,
}

impl AgentConfig {
    /// 读取 properties 文件并校验。
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let properties = load_properties(path)?;
        Self::from_properties(&properties)
    }

    /// 从键值表构建配置。
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let command_processor = read_required(properties, KEY_COMMAND_PROCESSOR)?;
        let tenant = read_required(properties, KEY_TENANT)?;
        let device_token = read_required(properties, KEY_DEVICE_TOKEN)?;
        let area_token = read_required(properties, KEY_AREA_TOKEN)?;
        let customer_token = read_required(properties, KEY_CUSTOMER_TOKEN)?;
        let device_type_token = read_required(properties, KEY_DEVICE_TYPE_TOKEN)?;

        let hostname = read_with_default(properties, KEY_MQTT_HOSTNAME, || {
            DEFAULT_MQTT_HOSTNAME.to_string()
        });
        let port = read_u16_with_default(properties, KEY_MQTT_PORT, DEFAULT_MQTT_PORT)?;
        let client_id = read_with_default(properties, KEY_MQTT_CLIENT_ID, || {
            format!("sitewhere-agent-{}", device_token)
        });
        let username = read_optional(properties, KEY_MQTT_USERNAME);
        let password = read_optional(properties, KEY_MQTT_PASSWORD);
        let keep_alive_secs =
            read_u64_with_default(properties, KEY_MQTT_KEEPALIVE, DEFAULT_MQTT_KEEPALIVE_SECS)?;

        let topics = TopicSet {
            outbound: read_with_default(properties, KEY_OUTBOUND_TOPIC, || {
                topics::default_outbound_topic(&tenant)
            }),
            inbound_system: read_with_default(properties, KEY_INBOUND_SYSTEM_TOPIC, || {
                topics::default_inbound_system_topic(&tenant, &device_token)
            }),
            inbound_command: read_with_default(properties, KEY_INBOUND_COMMAND_TOPIC, || {
                topics::default_inbound_command_topic(&tenant, &device_token)
            }),
        };

        Ok(Self {
            command_processor,
            tenant,
            device_token,
            area_token,
            customer_token,
            device_type_token,
            mqtt: MqttSettings {
                hostname,
                port,
                client_id,
                username,
                password,
                keep_alive_secs,
            },
            topics,
        })
    }

    /// 设备身份。
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(
            self.device_token.clone(),
            self.area_token.clone(),
            self.customer_token.clone(),
            self.device_type_token.clone(),
        )
    }

    /// 输出已解析的配置（密码不输出）。
    pub fn log_resolved(&self) {
        info!(
            target: "agent.config",
            command_processor = %self.command_processor,
            tenant = %self.tenant,
            device_token = %self.device_token,
            area_token = %self.area_token,
            customer_token = %self.customer_token,
            device_type_token = %self.device_type_token,
            "config_resolved"
        );
        info!(
            target: "agent.config",
            hostname = %self.mqtt.hostname,
            port = self.mqtt.port,
            client_id = %self.mqtt.client_id,
            username = self.mqtt.username.as_deref().unwrap_or("-"),
            has_password = self.mqtt.password.is_some(),
            keep_alive_secs = self.mqtt.keep_alive_secs,
            "mqtt_config_resolved"
        );
        info!(
            target: "agent.config",
            outbound = %self.topics.outbound,
            inbound_system = %self.topics.inbound_system,
            inbound_command = %self.topics.inbound_command,
            "topics_resolved"
        );
    }
}

/// 读取 properties 文件为键值表。
pub fn load_properties(path: impl AsRef<Path>) -> Result<HashMap<String, String>, ConfigError> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let iter = dotenvy::from_path_iter(path)
        .map_err(|err| ConfigError::Io(source.clone(), err.to_string()))?;
    collect_properties(iter, &source)
}

/// 从任意读取源解析 properties 键值表。
pub fn parse_properties<R: Read>(reader: R) -> Result<HashMap<String, String>, ConfigError> {
    collect_properties(dotenvy::from_read_iter(reader), "<reader>")
}

fn collect_properties<I>(iter: I, source: &str) -> Result<HashMap<String, String>, ConfigError>
where
    I: Iterator<Item = dotenvy::Result<(String, String)>>,
{
    let mut properties = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|err| ConfigError::Io(source.to_string(), err.to_string()))?;
        properties.insert(key, value.trim().to_string());
    }
    Ok(properties)
}

fn read_required(properties: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    match properties.get(key) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(ConfigError::Missing(key.to_string())),
    }
}

fn read_optional(properties: &HashMap<String, String>, key: &str) -> Option<String> {
    match properties.get(key) {
        Some(value) if !value.is_empty() => Some(value.clone()),
        _ => None,
    }
}

fn read_with_default(
    properties: &HashMap<String, String>,
    key: &str,
    default: impl FnOnce() -> String,
) -> String {
    match read_optional(properties, key) {
        Some(value) => value,
        None => {
            let value = default();
            warn!(target: "agent.config", key, value = %value, "using default");
            value
        }
    }
}

fn read_u16_with_default(
    properties: &HashMap<String, String>,
    key: &str,
    default: u16,
) -> Result<u16, ConfigError> {
    let value = match read_optional(properties, key) {
        Some(value) => value,
        None => {
            warn!(target: "agent.config", key, value = default, "using default");
            return Ok(default);
        }
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(
    properties: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let value = match read_optional(properties, key) {
        Some(value) => value,
        None => {
            warn!(target: "agent.config", key, value = default, "using default");
            return Ok(default);
        }
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// 收集日志输出，用于断言告警内容。
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs.contents())
    }

    #[test]
    fn defaulted_keepalive_is_logged() {
        let properties = HashMap::new();
        let (value, logs) = with_captured_logs(|| {
            read_u64_with_default(&properties, KEY_MQTT_KEEPALIVE, DEFAULT_MQTT_KEEPALIVE_SECS)
        });

        assert_eq!(value.ok(), Some(DEFAULT_MQTT_KEEPALIVE_SECS));
        assert!(logs.contains("using default"), "{logs}");
        assert!(logs.contains("mqtt.keepalive.seconds"), "{logs}");
    }

    #[test]
    fn explicit_keepalive_is_not_logged() {
        let mut properties = HashMap::new();
        properties.insert(KEY_MQTT_KEEPALIVE.to_string(), "90".to_string());
        let (value, logs) = with_captured_logs(|| {
            read_u64_with_default(&properties, KEY_MQTT_KEEPALIVE, DEFAULT_MQTT_KEEPALIVE_SECS)
        });

        assert_eq!(value.ok(), Some(90));
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn empty_required_value_is_missing() {
        let mut properties = HashMap::new();
        properties.insert(KEY_TENANT.to_string(), String::new());
        assert!(matches!(
            read_required(&properties, KEY_TENANT),
            Err(ConfigError::Missing(key)) if key == KEY_TENANT
        ));
    }

    #[test]
    fn keepalive_must_be_numeric() {
        let mut properties = HashMap::new();
        properties.insert(KEY_MQTT_KEEPALIVE.to_string(), "soon".to_string());
        assert!(matches!(
            read_u64_with_default(&properties, KEY_MQTT_KEEPALIVE, 30),
            Err(ConfigError::Invalid(_, value)) if value == "soon"
        ));
    }
}
