use agent_codec::{CodecError, decode_device_command, encode_device_command};
use domain::{DeviceCommand, Originator, ParamType, ParamValue};

#[test]
fn invocation_preserves_order_types_and_originator() {
    let command = DeviceCommand::new(
        "helloWorld",
        vec![
            ParamValue::from("hello"),
            ParamValue::from(true),
            ParamValue::from(3_i64),
            ParamValue::from(3.0),
            ParamValue::Bytes(vec![1, 2, 3]),
        ],
    )
    .with_originator(Originator::new("evt-42"));

    let bytes = encode_device_command(&command).expect("encode");
    let decoded = decode_device_command(&bytes).expect("decode");

    assert_eq!(decoded, command);
    assert_eq!(
        decoded.signature(),
        vec![
            ParamType::String,
            ParamType::Bool,
            ParamType::Int,
            ParamType::Double,
            ParamType::Bytes,
        ]
    );
}

#[test]
fn invocation_without_originator_decodes_as_none() {
    let command = DeviceCommand::new("ping", Vec::new());
    let bytes = encode_device_command(&command).expect("encode");

    let decoded = decode_device_command(&bytes).expect("decode");
    assert!(decoded.originator.is_none());
    assert!(decoded.parameters.is_empty());
}

#[test]
fn garbage_invocation_is_codec_error() {
    assert!(matches!(
        decode_device_command(&[]),
        Err(CodecError::Truncated("invocation"))
    ));
    assert!(matches!(
        decode_device_command(&[0x0a, 0x0a, 0x01]),
        Err(CodecError::Decode(_))
    ));
}
