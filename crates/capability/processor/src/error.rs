use agent_codec::CodecError;
use agent_dispatch::DispatchError;
use domain::ParamType;

/// 命令处理错误。
///
/// 除 `UnknownProcessor` 外均只影响单条消息，由路由边界记录后丢弃。
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// 帧或调用记录解码失败。
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// 设备事件编码或发布失败。
    #[error("event dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
    /// 命令名与参数签名均无匹配的处理函数。
    #[error("no handler registered for {command}({signature})")]
    DispatchResolution { command: String, signature: String },
    /// 处理函数执行失败。
    #[error("handler for {command} failed: {message}")]
    HandlerInvocation { command: String, message: String },
    /// 参数类型与读取方式不符。
    #[error("argument {index} is not {expected}")]
    ArgumentType { index: usize, expected: ParamType },
    /// 配置的处理器名称未注册。
    #[error("unknown command processor: {0}")]
    UnknownProcessor(String),
}
