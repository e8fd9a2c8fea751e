//! 编解码错误类型定义

/// 帧或调用记录编解码错误（作用域为单条消息）。
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// 缺少某个记录（字节流被截断）
    #[error("truncated frame: missing {0}")]
    Truncated(&'static str),

    /// protobuf 解码错误（长度越界、字段损坏等）
    #[error("malformed record: {0}")]
    Decode(#[from] prost::DecodeError),

    /// protobuf 编码错误
    #[error("encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    /// 出站帧头缺少设备 token
    #[error("header missing device token")]
    MissingDeviceToken,

    /// 帧头命令与期望的记录类型不匹配
    #[error("command {0} does not match any expected body type")]
    UnexpectedCommand(i32),

    /// 调用记录缺少命令名
    #[error("invocation record missing command name")]
    MissingCommandName,

    /// 调用参数未设置任何值
    #[error("parameter {0} has no value")]
    EmptyParameter(usize),
}
