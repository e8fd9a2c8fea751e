use agent_config::{AgentConfig, ConfigError, parse_properties};

const BASE: &str = "\
# agent settings
command.processor.classname=example
tenant=acme
device.token=dev-1
area.token=area-1
customer.token=customer-1
device.type.token=raspberrypi
";

fn config_from(text: &str) -> Result<AgentConfig, ConfigError> {
    let properties = parse_properties(text.as_bytes())?;
    AgentConfig::from_properties(&properties)
}

#[test]
fn defaults_follow_tenant_and_device() {
    let config = config_from(BASE).expect("config");

    assert_eq!(config.topics.outbound, "SiteWhere/acme/input/protobuf");
    assert_eq!(config.topics.inbound_system, "SiteWhere/acme/system/dev-1");
    assert_eq!(config.topics.inbound_command, "SiteWhere/acme/command/dev-1");
    assert_eq!(config.mqtt.hostname, "localhost");
    assert_eq!(config.mqtt.port, 1883);
    assert_eq!(config.mqtt.client_id, "sitewhere-agent-dev-1");
    assert_eq!(config.mqtt.keep_alive_secs, 30);
    assert!(config.mqtt.username.is_none());
}

#[test]
fn device_type_token_has_its_own_key() {
    let config = config_from(BASE).expect("config");
    assert_eq!(config.customer_token, "customer-1");
    assert_eq!(config.device_type_token, "raspberrypi");
    assert_eq!(config.identity().device_type_token, "raspberrypi");
}

#[test]
fn explicit_values_override_defaults() {
    let text = format!(
        "{}mqtt.hostname=broker.local\nmqtt.port=8883\nmqtt.username=agent\nmqtt.password=secret\n\
         mqtt.outbound.sitewhere.topic=custom/out\nmqtt.inbound.sitewhere.topic=custom/system\n\
         mqtt.inbound.command.topic=custom/command\n",
        BASE
    );
    let config = config_from(&text).expect("config");

    assert_eq!(config.mqtt.hostname, "broker.local");
    assert_eq!(config.mqtt.port, 8883);
    assert_eq!(config.mqtt.username.as_deref(), Some("agent"));
    assert_eq!(config.mqtt.password.as_deref(), Some("secret"));
    assert_eq!(config.topics.outbound, "custom/out");
    assert_eq!(config.topics.inbound_system, "custom/system");
    assert_eq!(config.topics.inbound_command, "custom/command");
}

#[test]
fn each_required_key_is_enforced() {
    for key in [
        "command.processor.classname",
        "tenant",
        "device.token",
        "area.token",
        "customer.token",
        "device.type.token",
    ] {
        let text: String = BASE
            .lines()
            .filter(|line| !line.starts_with(&format!("{}=", key)))
            .map(|line| format!("{}\n", line))
            .collect();
        let result = config_from(&text);
        assert!(
            matches!(&result, Err(ConfigError::Missing(missing)) if missing == key),
            "expected missing {}, got {:?}",
            key,
            result
        );
    }
}

#[test]
fn non_numeric_port_is_invalid() {
    let text = format!("{}mqtt.port=mqtt\n", BASE);
    assert!(matches!(
        config_from(&text),
        Err(ConfigError::Invalid(key, value)) if key == "mqtt.port" && value == "mqtt"
    ));

    let text = format!("{}mqtt.port=70000\n", BASE);
    assert!(matches!(config_from(&text), Err(ConfigError::Invalid(_, _))));
}

#[test]
fn missing_file_is_io_error() {
    let result = AgentConfig::from_path("/nonexistent/agent/config.properties");
    assert!(matches!(result, Err(ConfigError::Io(_, _))));
}
