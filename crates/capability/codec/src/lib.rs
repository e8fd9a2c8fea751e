//! # 帧编解码能力模块
//!
//! 出站设备事件与入站系统命令使用同一种双记录帧：
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬──────────────┐
//! │ varint 长度  │ Header       │ varint 长度  │ Body         │
//! └──────────────┴──────────────┴──────────────┴──────────────┘
//! ```
//!
//! 每条记录自带长度前缀，读取方无需外部长度字段即可定位边界。
//! 设备类型命令不走帧头，而是单条自描述调用记录，见 [`decode_device_command`]。

mod error;
mod frame;
mod invocation;

pub use error::CodecError;
pub use frame::{
    DeviceEvent, EventFrame, decode_body, decode_event_frame, decode_header, decode_system_header,
    encode_frame, encode_system_frame,
};
pub use invocation::{decode_device_command, encode_device_command};
