use domain::{DeviceCommand, Originator, ParamType, ParamValue, TopicSet};

#[test]
fn default_topics_follow_tenant_and_device() {
    let topics = TopicSet::defaults("acme", "dev-1");

    assert_eq!(topics.outbound, "SiteWhere/acme/input/protobuf");
    assert_eq!(topics.inbound_system, "SiteWhere/acme/system/dev-1");
    assert_eq!(topics.inbound_command, "SiteWhere/acme/command/dev-1");
}

#[test]
fn command_signature_uses_runtime_types() {
    let command = DeviceCommand::new(
        "helloWorld",
        vec![ParamValue::from("hi"), ParamValue::from(true), ParamValue::from(2.0)],
    )
    .with_originator(Originator::new("evt-1"));

    assert_eq!(
        command.signature(),
        vec![ParamType::String, ParamType::Bool, ParamType::Double]
    );
    assert_eq!(command.originator.as_ref().map(|o| o.event_id.as_str()), Some("evt-1"));
}

#[test]
fn numeric_values_keep_their_encoding() {
    assert_eq!(ParamValue::from(1_i64).param_type(), ParamType::Int);
    assert_eq!(ParamValue::from(1.0).param_type(), ParamType::Double);
    assert!(ParamValue::from(1_i64).as_f64().is_none());
}
