//! 设备类型命令注册表。
//!
//! 键为（命令名，参数类型签名）。同一签名可分别注册带发起者与不带发起者的处理函数，
//! 解析时先查带发起者的表，未命中再查不带发起者的表（此时丢弃发起者）。

use crate::error::AgentError;
use crate::sender::EventSender;
use domain::{DeviceCommand, Originator, ParamType, ParamValue};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

type OriginatorHandler = Arc<
    dyn Fn(EventSender, CommandArgs, Option<Originator>) -> BoxFuture<'static, Result<(), AgentError>>
        + Send
        + Sync,
>;
type BareHandler =
    Arc<dyn Fn(EventSender, CommandArgs) -> BoxFuture<'static, Result<(), AgentError>> + Send + Sync>;

/// 命令签名：命令名加有序参数类型。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandSignature {
    pub name: String,
    pub parameters: Vec<ParamType>,
}

impl CommandSignature {
    pub fn new(name: impl Into<String>, parameters: &[ParamType]) -> Self {
        Self {
            name: name.into(),
            parameters: parameters.to_vec(),
        }
    }

    /// 参数类型列表，如 `string, bool`。
    pub fn parameter_list(&self) -> String {
        self.parameters
            .iter()
            .map(|param| param.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for CommandSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_list())
    }
}

/// 处理函数收到的参数列表，按位置读取。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandArgs {
    values: Vec<ParamValue>,
}

impl CommandArgs {
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn string(&self, index: usize) -> Result<&str, AgentError> {
        self.values
            .get(index)
            .and_then(ParamValue::as_str)
            .ok_or(AgentError::ArgumentType {
                index,
                expected: ParamType::String,
            })
    }

    pub fn double(&self, index: usize) -> Result<f64, AgentError> {
        self.values
            .get(index)
            .and_then(ParamValue::as_f64)
            .ok_or(AgentError::ArgumentType {
                index,
                expected: ParamType::Double,
            })
    }

    pub fn int(&self, index: usize) -> Result<i64, AgentError> {
        self.values
            .get(index)
            .and_then(ParamValue::as_i64)
            .ok_or(AgentError::ArgumentType {
                index,
                expected: ParamType::Int,
            })
    }

    pub fn bool(&self, index: usize) -> Result<bool, AgentError> {
        self.values
            .get(index)
            .and_then(ParamValue::as_bool)
            .ok_or(AgentError::ArgumentType {
                index,
                expected: ParamType::Bool,
            })
    }

    pub fn bytes(&self, index: usize) -> Result<&[u8], AgentError> {
        self.values
            .get(index)
            .and_then(ParamValue::as_bytes)
            .ok_or(AgentError::ArgumentType {
                index,
                expected: ParamType::Bytes,
            })
    }
}

/// 设备类型命令注册表，由处理器在构造时填充。
#[derive(Default)]
pub struct CommandRegistry {
    with_originator: HashMap<CommandSignature, OriginatorHandler>,
    bare: HashMap<CommandSignature, BareHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册带发起者的处理函数：以（参数..., 发起者）调用，发起者可能为 `None`。
    pub fn register_with_originator<F, Fut>(&mut self, name: &str, parameters: &[ParamType], handler: F)
    where
        F: Fn(EventSender, CommandArgs, Option<Originator>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AgentError>> + Send + 'static,
    {
        let signature = CommandSignature::new(name, parameters);
        let handler: OriginatorHandler =
            Arc::new(move |sender, args, originator| handler(sender, args, originator).boxed());
        if self.with_originator.insert(signature.clone(), handler).is_some() {
            warn!(
                target: "agent.processor",
                signature = %signature,
                "command_handler_replaced"
            );
        }
    }

    /// 注册不带发起者的处理函数。
    pub fn register<F, Fut>(&mut self, name: &str, parameters: &[ParamType], handler: F)
    where
        F: Fn(EventSender, CommandArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AgentError>> + Send + 'static,
    {
        let signature = CommandSignature::new(name, parameters);
        let handler: BareHandler = Arc::new(move |sender, args| handler(sender, args).boxed());
        if self.bare.insert(signature.clone(), handler).is_some() {
            warn!(
                target: "agent.processor",
                signature = %signature,
                "command_handler_replaced"
            );
        }
    }

    /// 签名是否有任一形式的注册项。
    pub fn contains(&self, signature: &CommandSignature) -> bool {
        self.with_originator.contains_key(signature) || self.bare.contains_key(signature)
    }

    /// 注册项总数（两种形式分别计数）。
    pub fn len(&self) -> usize {
        self.with_originator.len() + self.bare.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 全部注册项的可读签名，带发起者的形式以 `originator` 结尾，按字典序排列。
    pub fn signatures(&self) -> Vec<String> {
        let mut signatures: Vec<String> = self
            .with_originator
            .keys()
            .map(|signature| {
                if signature.parameters.is_empty() {
                    format!("{}(originator)", signature.name)
                } else {
                    format!("{}({}, originator)", signature.name, signature.parameter_list())
                }
            })
            .chain(self.bare.keys().map(|signature| signature.to_string()))
            .collect();
        signatures.sort();
        signatures
    }

    /// 解析并执行设备类型命令。
    pub async fn dispatch(&self, sender: &EventSender, command: DeviceCommand) -> Result<(), AgentError> {
        let signature = CommandSignature {
            parameters: command.signature(),
            name: command.name,
        };
        let args = CommandArgs::new(command.parameters);

        let result = if let Some(handler) = self.with_originator.get(&signature) {
            handler(sender.clone(), args, command.originator).await
        } else if let Some(handler) = self.bare.get(&signature) {
            if let Some(originator) = command.originator.as_ref() {
                debug!(
                    target: "agent.processor",
                    signature = %signature,
                    originator = %originator.event_id,
                    "originator_discarded"
                );
            }
            handler(sender.clone(), args).await
        } else {
            return Err(AgentError::DispatchResolution {
                signature: signature.parameter_list(),
                command: signature.name,
            });
        };

        result.map_err(|err| AgentError::HandlerInvocation {
            command: signature.name,
            message: err.to_string(),
        })
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("signatures", &self.signatures())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_renders_parameter_types() {
        let signature = CommandSignature::new("helloWorld", &[ParamType::String, ParamType::Bool]);
        assert_eq!(signature.to_string(), "helloWorld(string, bool)");
        assert_eq!(CommandSignature::new("ping", &[]).to_string(), "ping()");
    }

    #[test]
    fn signatures_differ_by_parameter_types() {
        let mut keys = std::collections::HashSet::new();
        keys.insert(CommandSignature::new("setLevel", &[ParamType::Double]));
        keys.insert(CommandSignature::new("setLevel", &[ParamType::Int]));
        keys.insert(CommandSignature::new("setLevel", &[ParamType::Double]));

        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&CommandSignature::new("setLevel", &[ParamType::Int])));
    }

    #[test]
    fn args_reject_wrong_type() {
        let args = CommandArgs::new(vec![ParamValue::Int(3)]);
        assert_eq!(args.int(0).ok(), Some(3));
        assert!(matches!(
            args.double(0),
            Err(AgentError::ArgumentType {
                index: 0,
                expected: ParamType::Double
            })
        ));
        assert!(matches!(
            args.string(4),
            Err(AgentError::ArgumentType { index: 4, .. })
        ));
    }

    #[test]
    fn duplicate_registration_replaces_entry() {
        let mut registry = CommandRegistry::new();
        registry.register("ping", &[], |_, _| async { Ok::<(), AgentError>(()) });
        registry.register("ping", &[], |_, _| async { Ok::<(), AgentError>(()) });
        registry.register_with_originator("ping", &[], |_, _, _| async { Ok::<(), AgentError>(()) });

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.signatures(), vec!["ping()", "ping(originator)"]);
    }
}
