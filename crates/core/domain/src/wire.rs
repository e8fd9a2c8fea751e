//! 线上记录定义（protobuf）。
//!
//! 字段编号与平台侧 SiteWhere 协议保持一致。可选标量使用包装消息，
//! 以便区分“未设置”与“空字符串/零值”。

/// 可选字符串包装。
#[derive(Clone, PartialEq, prost::Message)]
pub struct OptionalString {
    #[prost(string, tag = "1")]
    pub value: String,
}

impl From<&str> for OptionalString {
    fn from(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

impl From<String> for OptionalString {
    fn from(value: String) -> Self {
        Self { value }
    }
}

/// 可选浮点包装。
#[derive(Clone, PartialEq, prost::Message)]
pub struct OptionalDouble {
    #[prost(double, tag = "1")]
    pub value: f64,
}

impl From<f64> for OptionalDouble {
    fn from(value: f64) -> Self {
        Self { value }
    }
}

/// 可选 fixed64 包装（事件时间，毫秒）。
#[derive(Clone, PartialEq, prost::Message)]
pub struct OptionalFixed64 {
    #[prost(fixed64, tag = "1")]
    pub value: u64,
}

/// 事件附加元数据。
#[derive(Clone, PartialEq, prost::Message)]
pub struct Metadata {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

// ============================================
// 出站：设备事件
// ============================================

/// 出站帧头中的命令标签。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EventCommand {
    SendRegistration = 0,
    SendAcknowledgement = 1,
    SendMeasurement = 2,
    SendLocation = 3,
    SendAlert = 4,
}

impl EventCommand {
    /// 日志中使用的短标签。
    pub fn label(self) -> &'static str {
        match self {
            Self::SendRegistration => "registration",
            Self::SendAcknowledgement => "ack",
            Self::SendMeasurement => "measurement",
            Self::SendLocation => "location",
            Self::SendAlert => "alert",
        }
    }
}

/// 出站帧头。
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceEventHeader {
    #[prost(enumeration = "EventCommand", tag = "1")]
    pub command: i32,
    #[prost(message, optional, tag = "2")]
    pub device_token: Option<OptionalString>,
    #[prost(message, optional, tag = "3")]
    pub originator: Option<OptionalString>,
}

impl DeviceEventHeader {
    pub fn device_token_value(&self) -> Option<&str> {
        self.device_token.as_ref().map(|token| token.value.as_str())
    }

    pub fn originator_value(&self) -> Option<&str> {
        self.originator.as_ref().map(|originator| originator.value.as_str())
    }
}

/// 设备注册请求。
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceRegistrationRequest {
    #[prost(message, optional, tag = "1")]
    pub device_type_token: Option<OptionalString>,
    #[prost(message, optional, tag = "2")]
    pub area_token: Option<OptionalString>,
    #[prost(message, optional, tag = "3")]
    pub customer_token: Option<OptionalString>,
    #[prost(message, repeated, tag = "4")]
    pub metadata: Vec<Metadata>,
}

/// 设备确认。
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceAcknowledge {
    #[prost(message, optional, tag = "1")]
    pub message: Option<OptionalString>,
}

/// 设备测量值。
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceMeasurement {
    #[prost(message, optional, tag = "1")]
    pub measurement_name: Option<OptionalString>,
    #[prost(message, optional, tag = "2")]
    pub measurement_value: Option<OptionalDouble>,
    #[prost(message, optional, tag = "3")]
    pub event_date: Option<OptionalFixed64>,
    #[prost(message, repeated, tag = "4")]
    pub metadata: Vec<Metadata>,
}

/// 设备位置。
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceLocation {
    #[prost(message, optional, tag = "1")]
    pub latitude: Option<OptionalDouble>,
    #[prost(message, optional, tag = "2")]
    pub longitude: Option<OptionalDouble>,
    #[prost(message, optional, tag = "3")]
    pub elevation: Option<OptionalDouble>,
    #[prost(message, optional, tag = "4")]
    pub event_date: Option<OptionalFixed64>,
    #[prost(message, repeated, tag = "5")]
    pub metadata: Vec<Metadata>,
}

/// 设备告警。
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceAlert {
    #[prost(message, optional, tag = "1")]
    pub alert_type: Option<OptionalString>,
    #[prost(message, optional, tag = "2")]
    pub alert_message: Option<OptionalString>,
    #[prost(message, optional, tag = "3")]
    pub event_date: Option<OptionalFixed64>,
    #[prost(message, repeated, tag = "4")]
    pub metadata: Vec<Metadata>,
}

// ============================================
// 入站：系统命令
// ============================================

/// 系统帧头中的命令标签（线上值）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SystemCommandTag {
    RegistrationAck = 0,
    DeviceStreamAck = 1,
    ReceiveDeviceStreamData = 2,
}

/// 系统命令（解码后）。未知标签保留原始数值，按无操作处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    RegistrationAck,
    DeviceStreamAck,
    ReceiveDeviceStreamData,
    Unrecognized(i32),
}

impl From<i32> for SystemCommand {
    fn from(value: i32) -> Self {
        match SystemCommandTag::try_from(value) {
            Ok(SystemCommandTag::RegistrationAck) => Self::RegistrationAck,
            Ok(SystemCommandTag::DeviceStreamAck) => Self::DeviceStreamAck,
            Ok(SystemCommandTag::ReceiveDeviceStreamData) => Self::ReceiveDeviceStreamData,
            Err(_) => Self::Unrecognized(value),
        }
    }
}

/// 系统帧头。
#[derive(Clone, PartialEq, prost::Message)]
pub struct SystemHeader {
    #[prost(enumeration = "SystemCommandTag", tag = "1")]
    pub command: i32,
    #[prost(message, optional, tag = "2")]
    pub originator: Option<OptionalString>,
    #[prost(message, optional, tag = "3")]
    pub nested_path: Option<OptionalString>,
    #[prost(message, optional, tag = "4")]
    pub nested_spec: Option<OptionalString>,
}

impl SystemHeader {
    pub fn system_command(&self) -> SystemCommand {
        SystemCommand::from(self.command)
    }

    pub fn originator_value(&self) -> Option<&str> {
        self.originator.as_ref().map(|originator| originator.value.as_str())
    }
}

/// 注册确认状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum RegistrationAckState {
    NewRegistration = 0,
    AlreadyRegistered = 1,
    RegistrationError = 2,
}

/// 注册失败原因。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum RegistrationAckError {
    Unspecified = 0,
    InvalidSpecification = 1,
    SiteTokenRequired = 2,
    NewDevicesNotAllowed = 3,
}

/// 注册确认。
#[derive(Clone, PartialEq, prost::Message)]
pub struct RegistrationAck {
    #[prost(enumeration = "RegistrationAckState", tag = "1")]
    pub state: i32,
    #[prost(enumeration = "RegistrationAckError", tag = "2")]
    pub error_type: i32,
    #[prost(message, optional, tag = "3")]
    pub error_message: Option<OptionalString>,
}

// ============================================
// 入站：设备类型命令调用记录
// ============================================

/// 设备类型命令调用记录（单条长度前缀记录，不带帧头）。
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceCommandInvocation {
    #[prost(string, tag = "1")]
    pub command: String,
    #[prost(message, repeated, tag = "2")]
    pub parameters: Vec<ParameterValue>,
    #[prost(message, optional, tag = "3")]
    pub originator: Option<OriginatorRecord>,
}

/// 单个调用参数；所选分支即参数的运行时类型。
#[derive(Clone, PartialEq, prost::Message)]
pub struct ParameterValue {
    #[prost(oneof = "parameter_value::Kind", tags = "1, 2, 3, 4, 5")]
    pub kind: Option<parameter_value::Kind>,
}

pub mod parameter_value {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(string, tag = "1")]
        StringValue(String),
        #[prost(double, tag = "2")]
        DoubleValue(f64),
        #[prost(sint64, tag = "3")]
        IntValue(i64),
        #[prost(bool, tag = "4")]
        BoolValue(bool),
        #[prost(bytes = "vec", tag = "5")]
        BytesValue(Vec<u8>),
    }
}

/// 调用发起者引用。
#[derive(Clone, PartialEq, prost::Message)]
pub struct OriginatorRecord {
    #[prost(string, tag = "1")]
    pub event_id: String,
}
