//! 双记录帧（Header + Body）编解码。

use crate::error::CodecError;
use domain::{
    DeviceAcknowledge, DeviceAlert, DeviceEventHeader, DeviceLocation, DeviceMeasurement,
    DeviceRegistrationRequest, EventCommand, OptionalString, SystemHeader,
};
use prost::Message;

/// 编码出站帧。
///
/// 先写帧头再写事件体，二者均带长度前缀。`originator` 为 `None` 时字段完全省略，
/// 与空字符串在线上可区分。整帧在本地缓冲区完成后才返回，失败时不产生半帧。
pub fn encode_frame<B: Message>(
    command: EventCommand,
    device_token: &str,
    originator: Option<&str>,
    body: &B,
) -> Result<Vec<u8>, CodecError> {
    let header = DeviceEventHeader {
        command: command as i32,
        device_token: Some(OptionalString::from(device_token)),
        originator: originator.map(OptionalString::from),
    };
    let header_len = header.encoded_len();
    let body_len = body.encoded_len();
    let mut buf = Vec::with_capacity(
        prost::length_delimiter_len(header_len)
            + header_len
            + prost::length_delimiter_len(body_len)
            + body_len,
    );
    header.encode_length_delimited(&mut buf)?;
    body.encode_length_delimited(&mut buf)?;
    Ok(buf)
}

/// 编码系统帧（平台侧方向，用于模拟与测试）。
pub fn encode_system_frame<B: Message>(
    header: &SystemHeader,
    body: &B,
) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    header.encode_length_delimited(&mut buf)?;
    body.encode_length_delimited(&mut buf)?;
    Ok(buf)
}

/// 解码出站帧头，返回帧头与剩余字节。
pub fn decode_header(bytes: &[u8]) -> Result<(DeviceEventHeader, &[u8]), CodecError> {
    let mut cursor = bytes;
    if cursor.is_empty() {
        return Err(CodecError::Truncated("header"));
    }
    let header = DeviceEventHeader::decode_length_delimited(&mut cursor)?;
    if header.device_token.is_none() {
        return Err(CodecError::MissingDeviceToken);
    }
    Ok((header, cursor))
}

/// 解码系统帧头，返回帧头与剩余字节。
///
/// 未知命令标签不是错误，由调用方按无操作处理。
pub fn decode_system_header(bytes: &[u8]) -> Result<(SystemHeader, &[u8]), CodecError> {
    let mut cursor = bytes;
    if cursor.is_empty() {
        return Err(CodecError::Truncated("header"));
    }
    let header = SystemHeader::decode_length_delimited(&mut cursor)?;
    Ok((header, cursor))
}

/// 按指定记录类型解码帧体（帧头之后的字节）。
pub fn decode_body<M: Message + Default>(bytes: &[u8]) -> Result<M, CodecError> {
    let mut cursor = bytes;
    if cursor.is_empty() {
        return Err(CodecError::Truncated("body"));
    }
    Ok(M::decode_length_delimited(&mut cursor)?)
}

/// 按帧头命令解析出的设备事件。
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Registration(DeviceRegistrationRequest),
    Acknowledge(DeviceAcknowledge),
    Measurement(DeviceMeasurement),
    Location(DeviceLocation),
    Alert(DeviceAlert),
}

/// 完整解码的出站帧。
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    pub header: DeviceEventHeader,
    pub event: DeviceEvent,
}

/// 解码完整出站帧：先读帧头，再按帧头命令选择事件体类型。
pub fn decode_event_frame(bytes: &[u8]) -> Result<EventFrame, CodecError> {
    let (header, rest) = decode_header(bytes)?;
    let command = EventCommand::try_from(header.command)
        .map_err(|_| CodecError::UnexpectedCommand(header.command))?;
    let event = match command {
        EventCommand::SendRegistration => DeviceEvent::Registration(decode_body(rest)?),
        EventCommand::SendAcknowledgement => DeviceEvent::Acknowledge(decode_body(rest)?),
        EventCommand::SendMeasurement => DeviceEvent::Measurement(decode_body(rest)?),
        EventCommand::SendLocation => DeviceEvent::Location(decode_body(rest)?),
        EventCommand::SendAlert => DeviceEvent::Alert(decode_body(rest)?),
    };
    Ok(EventFrame { header, event })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_written_before_body() {
        let ack = DeviceAcknowledge {
            message: Some("ok".into()),
        };
        let bytes = encode_frame(EventCommand::SendAcknowledgement, "dev-1", None, &ack)
            .expect("encode");

        let (header, rest) = decode_header(&bytes).expect("header");
        assert_eq!(header.command, EventCommand::SendAcknowledgement as i32);
        let body: DeviceAcknowledge = decode_body(rest).expect("body");
        assert_eq!(body, ack);
    }

    #[test]
    fn empty_input_is_truncated() {
        assert!(matches!(decode_header(&[]), Err(CodecError::Truncated("header"))));
        assert!(matches!(
            decode_system_header(&[]),
            Err(CodecError::Truncated("header"))
        ));
        assert!(matches!(
            decode_body::<DeviceAcknowledge>(&[]),
            Err(CodecError::Truncated("body"))
        ));
    }
}
