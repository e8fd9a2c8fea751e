//! 命令处理器接口与入站入口。

use crate::error::AgentError;
use crate::registry::CommandRegistry;
use crate::sender::EventSender;
use agent_codec::{decode_body, decode_device_command, decode_system_header};
use agent_telemetry::{record_device_command, record_system_command};
use async_trait::async_trait;
use domain::{RegistrationAck, SystemCommand, SystemHeader};
use std::sync::Arc;
use tracing::{debug, info};

/// 设备类型命令处理器。
#[async_trait]
pub trait CommandProcessor: Send + Sync {
    /// 日志中使用的处理器名称。
    fn name(&self) -> &str;

    /// 设备类型命令注册表。
    fn commands(&self) -> &CommandRegistry;

    /// 订阅完成后执行一次。
    async fn execute_startup_logic(&self, _sender: &EventSender) -> Result<(), AgentError> {
        Ok(())
    }

    /// 收到注册确认。
    async fn handle_registration_ack(
        &self,
        _sender: &EventSender,
        _header: &SystemHeader,
        _ack: &RegistrationAck,
    ) -> Result<(), AgentError> {
        Ok(())
    }
}

/// 路由使用的入站入口。
#[async_trait]
pub trait InboundCommandHandler: Send + Sync {
    /// 处理系统主题上的帧。
    async fn process_system_command(&self, payload: &[u8]) -> Result<(), AgentError>;

    /// 处理设备类型命令主题上的调用记录。
    async fn process_device_command(&self, payload: &[u8]) -> Result<(), AgentError>;
}

/// 处理器宿主：持有处理器与事件发送器，实现两条入站路径。
#[derive(Clone)]
pub struct ProcessorHost {
    processor: Arc<dyn CommandProcessor>,
    sender: EventSender,
}

impl ProcessorHost {
    pub fn new(processor: Arc<dyn CommandProcessor>, sender: EventSender) -> Self {
        Self { processor, sender }
    }

    /// 执行处理器的启动逻辑。
    pub async fn execute_startup_logic(&self) -> Result<(), AgentError> {
        self.processor.execute_startup_logic(&self.sender).await
    }
}

#[async_trait]
impl InboundCommandHandler for ProcessorHost {
    async fn process_system_command(&self, payload: &[u8]) -> Result<(), AgentError> {
        let (header, body) = decode_system_header(payload)?;
        record_system_command();
        match header.system_command() {
            SystemCommand::RegistrationAck => {
                let ack: RegistrationAck = decode_body(body)?;
                info!(
                    target: "agent.processor",
                    processor = self.processor.name(),
                    state = ?ack.state(),
                    originator = header.originator_value().unwrap_or("-"),
                    "registration_ack_received"
                );
                self.processor
                    .handle_registration_ack(&self.sender, &header, &ack)
                    .await
                    .map_err(|err| AgentError::HandlerInvocation {
                        command: "registrationAck".to_string(),
                        message: err.to_string(),
                    })
            }
            SystemCommand::DeviceStreamAck | SystemCommand::ReceiveDeviceStreamData => {
                debug!(
                    target: "agent.processor",
                    command = ?header.system_command(),
                    "system_command_ignored"
                );
                Ok(())
            }
            SystemCommand::Unrecognized(tag) => {
                debug!(target: "agent.processor", tag, "system_command_unrecognized");
                Ok(())
            }
        }
    }

    async fn process_device_command(&self, payload: &[u8]) -> Result<(), AgentError> {
        let command = decode_device_command(payload)?;
        record_device_command();
        debug!(
            target: "agent.processor",
            processor = self.processor.name(),
            command = %command.name,
            parameters = command.parameters.len(),
            originator = command
                .originator
                .as_ref()
                .map(|originator| originator.event_id.as_str())
                .unwrap_or("-"),
            "device_command_received"
        );
        self.processor
            .commands()
            .dispatch(&self.sender, command)
            .await
    }
}
