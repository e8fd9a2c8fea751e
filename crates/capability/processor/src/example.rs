//! 内置示例处理器，演示注册、确认与事件发送。

use crate::error::AgentError;
use crate::host::CommandProcessor;
use crate::registry::{CommandArgs, CommandRegistry};
use crate::sender::EventSender;
use async_trait::async_trait;
use domain::{Originator, ParamType, RegistrationAck, RegistrationAckState, SystemHeader};
use tracing::{info, warn};

/// 示例设备类型处理器。
#[derive(Debug)]
pub struct ExampleCommandProcessor {
    commands: CommandRegistry,
}

impl ExampleCommandProcessor {
    pub const NAME: &'static str = "example";

    pub fn new() -> Self {
        let mut commands = CommandRegistry::new();
        commands.register_with_originator(
            "helloWorld",
            &[ParamType::String, ParamType::Bool],
            hello_world,
        );
        commands.register_with_originator("ping", &[], ping);
        commands.register_with_originator("testEvents", &[], test_events);
        commands.register("serialPrintln", &[ParamType::String], serial_println);
        Self { commands }
    }
}

impl Default for ExampleCommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandProcessor for ExampleCommandProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    async fn execute_startup_logic(&self, sender: &EventSender) -> Result<(), AgentError> {
        sender.send_registration(sender.identity()).await?;
        info!(
            target: "agent.example",
            device_token = sender.device_token(),
            "registration_sent"
        );
        Ok(())
    }

    async fn handle_registration_ack(
        &self,
        sender: &EventSender,
        _header: &SystemHeader,
        ack: &RegistrationAck,
    ) -> Result<(), AgentError> {
        match ack.state() {
            RegistrationAckState::NewRegistration | RegistrationAckState::AlreadyRegistered => {
                info!(
                    target: "agent.example",
                    device_token = sender.device_token(),
                    state = ?ack.state(),
                    "device_registered"
                );
                sender
                    .send_ack(sender.device_token(), "Registered with SiteWhere.", None)
                    .await
            }
            RegistrationAckState::RegistrationError => {
                warn!(
                    target: "agent.example",
                    device_token = sender.device_token(),
                    error_type = ?ack.error_type(),
                    error_message = ack
                        .error_message
                        .as_ref()
                        .map(|message| message.value.as_str())
                        .unwrap_or("-"),
                    "registration_failed"
                );
                Ok(())
            }
        }
    }
}

async fn hello_world(
    sender: EventSender,
    args: CommandArgs,
    originator: Option<Originator>,
) -> Result<(), AgentError> {
    let greeting = args.string(0)?;
    let loud = args.bool(1)?;
    let mut response = format!("Hello World from {}", greeting);
    if loud {
        response = response.to_uppercase();
    }
    info!(target: "agent.example", response = %response, "hello_world");
    sender
        .send_ack(sender.device_token(), &response, originator.as_ref())
        .await
}

async fn ping(
    sender: EventSender,
    _args: CommandArgs,
    originator: Option<Originator>,
) -> Result<(), AgentError> {
    sender
        .send_ack(sender.device_token(), "Acknowledged.", originator.as_ref())
        .await
}

async fn test_events(
    sender: EventSender,
    _args: CommandArgs,
    originator: Option<Originator>,
) -> Result<(), AgentError> {
    let device_token = sender.device_token();
    let originator = originator.as_ref();
    sender
        .send_measurement(device_token, "engine.temp", 170.0, originator)
        .await?;
    sender
        .send_location(device_token, 33.7550, -84.3900, 0.0, originator)
        .await?;
    sender
        .send_alert(device_token, "engine.overheat", "Engine is overheating!", originator)
        .await
}

async fn serial_println(_sender: EventSender, args: CommandArgs) -> Result<(), AgentError> {
    let message = args.string(0)?;
    info!(target: "agent.example", line = message, "serial_println");
    Ok(())
}
