//! # 命令处理能力模块
//!
//! 命令处理器按设备类型实现，接收两条独立入站路径：
//!
//! - 系统路径：解码帧头与帧体，按固定命令标签调用内部处理函数
//! - 设备类型路径：解码调用记录，按命令名与参数类型签名在 [`CommandRegistry`] 中解析处理函数，
//!   先尝试带发起者的注册项，再回退到不带发起者的注册项
//!
//! 处理函数通过 [`EventSender`] 发送设备事件。

mod error;
mod example;
mod factory;
mod host;
mod registry;
mod sender;

pub use error::AgentError;
pub use example::ExampleCommandProcessor;
pub use factory::ProcessorFactory;
pub use host::{CommandProcessor, InboundCommandHandler, ProcessorHost};
pub use registry::{CommandArgs, CommandRegistry, CommandSignature};
pub use sender::EventSender;
