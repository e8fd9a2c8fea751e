//! 设备代理共享的领域模型：线上记录、命令参数与主题集合。

pub mod command;
pub mod topics;
pub mod wire;

pub use command::{DeviceCommand, Originator, ParamType, ParamValue};
pub use topics::TopicSet;
pub use wire::{
    DeviceAcknowledge, DeviceAlert, DeviceEventHeader, DeviceLocation, DeviceMeasurement,
    DeviceRegistrationRequest, EventCommand, Metadata, OptionalDouble, OptionalFixed64,
    OptionalString, RegistrationAck, RegistrationAckError, RegistrationAckState, SystemCommand,
    SystemCommandTag, SystemHeader,
};

/// 设备身份：代理代表的设备及其归属（区域、客户、设备类型）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_token: String,
    pub area_token: String,
    pub customer_token: String,
    pub device_type_token: String,
}

impl DeviceIdentity {
    pub fn new(
        device_token: impl Into<String>,
        area_token: impl Into<String>,
        customer_token: impl Into<String>,
        device_type_token: impl Into<String>,
    ) -> Self {
        Self {
            device_token: device_token.into(),
            area_token: area_token.into(),
            customer_token: customer_token.into(),
            device_type_token: device_type_token.into(),
        }
    }
}
