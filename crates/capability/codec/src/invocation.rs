//! 设备类型命令调用记录编解码。
//!
//! 调用记录是单条长度前缀记录：命令名、有序参数、可选发起者。
//! 每个参数的类型由发送方选择的 oneof 分支决定，不做数值类型推断。

use crate::error::CodecError;
use domain::wire::{DeviceCommandInvocation, OriginatorRecord, ParameterValue, parameter_value::Kind};
use domain::{DeviceCommand, Originator, ParamValue};
use prost::Message;

/// 编码调用记录（平台侧方向，用于模拟与测试）。
pub fn encode_device_command(command: &DeviceCommand) -> Result<Vec<u8>, CodecError> {
    let record = DeviceCommandInvocation {
        command: command.name.clone(),
        parameters: command.parameters.iter().map(to_wire).collect(),
        originator: command.originator.as_ref().map(|originator| OriginatorRecord {
            event_id: originator.event_id.clone(),
        }),
    };
    let mut buf = Vec::with_capacity(record.encoded_len() + 4);
    record.encode_length_delimited(&mut buf)?;
    Ok(buf)
}

/// 解码调用记录。
pub fn decode_device_command(bytes: &[u8]) -> Result<DeviceCommand, CodecError> {
    let mut cursor = bytes;
    if cursor.is_empty() {
        return Err(CodecError::Truncated("invocation"));
    }
    let record = DeviceCommandInvocation::decode_length_delimited(&mut cursor)?;
    if record.command.is_empty() {
        return Err(CodecError::MissingCommandName);
    }
    let parameters = record
        .parameters
        .into_iter()
        .enumerate()
        .map(|(index, value)| from_wire(index, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DeviceCommand {
        name: record.command,
        parameters,
        originator: record
            .originator
            .map(|originator| Originator::new(originator.event_id)),
    })
}

fn to_wire(value: &ParamValue) -> ParameterValue {
    let kind = match value {
        ParamValue::String(value) => Kind::StringValue(value.clone()),
        ParamValue::Double(value) => Kind::DoubleValue(*value),
        ParamValue::Int(value) => Kind::IntValue(*value),
        ParamValue::Bool(value) => Kind::BoolValue(*value),
        ParamValue::Bytes(value) => Kind::BytesValue(value.clone()),
    };
    ParameterValue { kind: Some(kind) }
}

fn from_wire(index: usize, value: ParameterValue) -> Result<ParamValue, CodecError> {
    match value.kind {
        Some(Kind::StringValue(value)) => Ok(ParamValue::String(value)),
        Some(Kind::DoubleValue(value)) => Ok(ParamValue::Double(value)),
        Some(Kind::IntValue(value)) => Ok(ParamValue::Int(value)),
        Some(Kind::BoolValue(value)) => Ok(ParamValue::Bool(value)),
        Some(Kind::BytesValue(value)) => Ok(ParamValue::Bytes(value)),
        None => Err(CodecError::EmptyParameter(index)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_parameter_is_rejected() {
        let record = DeviceCommandInvocation {
            command: "ping".to_string(),
            parameters: vec![ParameterValue { kind: None }],
            originator: None,
        };
        let mut buf = Vec::new();
        record.encode_length_delimited(&mut buf).expect("encode");

        assert!(matches!(
            decode_device_command(&buf),
            Err(CodecError::EmptyParameter(0))
        ));
    }

    #[test]
    fn missing_name_is_rejected() {
        let record = DeviceCommandInvocation::default();
        let mut buf = Vec::new();
        record.encode_length_delimited(&mut buf).expect("encode");

        assert!(matches!(
            decode_device_command(&buf),
            Err(CodecError::MissingCommandName)
        ));
    }
}
