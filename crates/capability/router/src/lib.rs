//! # 命令路由能力模块
//!
//! 单消费者接收循环：逐条接收入站消息，先向传输层确认，再按主题全等匹配分类：
//!
//! - 系统主题 → [`InboundCommandHandler::process_system_command`]
//! - 设备类型命令主题 → [`InboundCommandHandler::process_device_command`]
//! - 其他主题 → 记录后丢弃
//!
//! 单条消息的错误与 panic 在此处捕获并记录，循环继续；取消令牌触发或入站源关闭时循环结束。

use agent_processor::{AgentError, InboundCommandHandler};
use agent_telemetry::{record_dropped_unknown_topic, record_inbound_message, record_message_failure};
use agent_transport::{InboundMessage, InboundSource};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 单条消息处理错误。
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error(transparent)]
    Processing(#[from] AgentError),
    /// 处理过程中发生 panic。
    #[error("message handler panicked: {0}")]
    Panicked(String),
}

/// 路由使用的入站主题。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterTopics {
    pub system: String,
    pub command: String,
}

/// 主题分类结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    System,
    Command,
    Unknown,
}

/// 接收循环结束原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterExit {
    Cancelled,
    SourceClosed,
}

/// 主题到处理入口的映射。
#[derive(Clone)]
pub struct InboundRoutes {
    topics: RouterTopics,
    handler: Arc<dyn InboundCommandHandler>,
}

impl InboundRoutes {
    pub fn new(topics: RouterTopics, handler: Arc<dyn InboundCommandHandler>) -> Self {
        Self { topics, handler }
    }

    /// 按主题全等匹配分类。
    pub fn classify(&self, topic: &str) -> TopicKind {
        if topic == self.topics.system {
            TopicKind::System
        } else if topic == self.topics.command {
            TopicKind::Command
        } else {
            TopicKind::Unknown
        }
    }

    /// 处理单条消息。未知主题丢弃并返回 `Ok`。
    pub async fn route(&self, message: &InboundMessage) -> Result<(), RouterError> {
        let handling = match self.classify(&message.topic) {
            TopicKind::System => self.handler.process_system_command(&message.payload),
            TopicKind::Command => self.handler.process_device_command(&message.payload),
            TopicKind::Unknown => {
                record_dropped_unknown_topic();
                warn!(
                    target: "agent.router",
                    topic = %message.topic,
                    payload_size = message.payload.len(),
                    "inbound_message_dropped"
                );
                return Ok(());
            }
        };
        debug!(target: "agent.router", topic = %message.topic, "inbound_message_routed");
        match AssertUnwindSafe(handling).catch_unwind().await {
            Ok(result) => result.map_err(RouterError::from),
            Err(panic) => Err(RouterError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

/// 命令路由：持有唯一入站源并运行接收循环。
pub struct CommandRouter {
    routes: InboundRoutes,
    source: Box<dyn InboundSource>,
}

impl CommandRouter {
    pub fn new(
        topics: RouterTopics,
        source: Box<dyn InboundSource>,
        handler: Arc<dyn InboundCommandHandler>,
    ) -> Self {
        Self {
            routes: InboundRoutes::new(topics, handler),
            source,
        }
    }

    pub fn routes(&self) -> &InboundRoutes {
        &self.routes
    }

    /// 运行接收循环直至取消或入站源关闭。
    pub async fn run(mut self, cancel: CancellationToken) -> RouterExit {
        info!(
            target: "agent.router",
            system_topic = %self.routes.topics.system,
            command_topic = %self.routes.topics.command,
            "command_router_started"
        );
        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(target: "agent.router", "command_router_cancelled");
                    return RouterExit::Cancelled;
                }
                message = self.source.receive() => message,
            };
            let Some(message) = message else {
                info!(target: "agent.router", "inbound_source_closed");
                return RouterExit::SourceClosed;
            };
            record_inbound_message();

            // 确认与处理结果解耦：处理失败的消息不会被重投。
            if let Err(err) = self.source.ack(&message).await {
                warn!(
                    target: "agent.router",
                    topic = %message.topic,
                    error = %err,
                    "inbound_ack_failed"
                );
            }

            if let Err(err) = self.routes.route(&message).await {
                record_message_failure();
                match &err {
                    RouterError::Panicked(_) => error!(
                        target: "agent.router",
                        topic = %message.topic,
                        payload_size = message.payload.len(),
                        error = %err,
                        "inbound_message_panicked"
                    ),
                    RouterError::Processing(_) => warn!(
                        target: "agent.router",
                        topic = %message.topic,
                        payload_size = message.payload.len(),
                        error = %err,
                        "inbound_message_failed"
                    ),
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
