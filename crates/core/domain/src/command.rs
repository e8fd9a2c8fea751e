//! 设备类型命令：参数值、参数类型与调用发起者。

use std::fmt;

/// 参数类型。命令签名由参数类型的有序列表构成。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    String,
    Double,
    Int,
    Bool,
    Bytes,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Double => "double",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 参数值。类型取自发送方选择的编码，不做数值类型之间的转换。
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Double(f64),
    Int(i64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::String(_) => ParamType::String,
            Self::Double(_) => ParamType::Double,
            Self::Int(_) => ParamType::Int,
            Self::Bool(_) => ParamType::Bool,
            Self::Bytes(_) => ParamType::Bytes,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// 调用发起者：平台侧命令调用事件的 ID，用于回执关联。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Originator {
    pub event_id: String,
}

impl Originator {
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
        }
    }
}

/// 解码后的设备类型命令调用。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCommand {
    pub name: String,
    pub parameters: Vec<ParamValue>,
    pub originator: Option<Originator>,
}

impl DeviceCommand {
    pub fn new(name: impl Into<String>, parameters: Vec<ParamValue>) -> Self {
        Self {
            name: name.into(),
            parameters,
            originator: None,
        }
    }

    pub fn with_originator(mut self, originator: Originator) -> Self {
        self.originator = Some(originator);
        self
    }

    /// 参数类型签名（按顺序）。
    pub fn signature(&self) -> Vec<ParamType> {
        self.parameters.iter().map(ParamValue::param_type).collect()
    }
}
