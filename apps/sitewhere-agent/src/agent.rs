//! 代理运行时装配
//!
//! 启动顺序：创建处理器 → 连接 broker → 订阅两个入站主题 → 启动命令路由任务 → 执行处理器启动逻辑。
//! 任一步失败时不留下运行中的任务。

use agent_config::{AgentConfig, ConfigError};
use agent_dispatch::OutboundEventDispatcher;
use agent_processor::{AgentError, CommandProcessor, EventSender, ProcessorFactory, ProcessorHost};
use agent_router::{CommandRouter, RouterExit, RouterTopics};
use agent_telemetry::metrics;
use agent_transport::{InboundSource, MqttSession, MqttSessionConfig, Publisher, Qos, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 等待事件循环在 DISCONNECT 后自行结束的时长。
const DRIVER_STOP_GRACE: Duration = Duration::from_secs(5);

/// 启动错误。
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// 配置缺失、非法或处理器名称未注册。
    #[error("configuration error: {0}")]
    Configuration(String),
    /// 无法连接或订阅。
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),
    /// 处理器启动逻辑失败。
    #[error("startup logic failed: {0}")]
    StartupLogic(#[source] AgentError),
}

impl From<ConfigError> for StartupError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// MQTT 事件循环任务。
pub struct EventLoopDriver {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
    grace: Duration,
}

impl EventLoopDriver {
    fn new(handle: JoinHandle<()>, cancel: CancellationToken) -> Self {
        Self {
            handle,
            cancel,
            grace: DRIVER_STOP_GRACE,
        }
    }

    async fn stop(mut self) {
        if tokio::time::timeout(self.grace, &mut self.handle)
            .await
            .is_err()
        {
            self.cancel.cancel();
            if let Err(err) = self.handle.await {
                warn!(target: "agent.runtime", error = %err, "mqtt_eventloop_join_failed");
            }
        }
    }
}

/// 运行中的代理。
pub struct RunningAgent {
    cancel: CancellationToken,
    router: JoinHandle<RouterExit>,
    publisher: Arc<dyn Publisher>,
    driver: Option<EventLoopDriver>,
    host: ProcessorHost,
}

impl RunningAgent {
    /// 取消命令路由、等待其退出并断开连接。断开失败只记录。
    pub async fn shutdown(self) {
        self.cancel.cancel();
        match self.router.await {
            Ok(exit) => info!(target: "agent.runtime", ?exit, "command_router_stopped"),
            Err(err) => warn!(target: "agent.runtime", error = %err, "command_router_join_failed"),
        }
        if let Err(err) = self.publisher.close().await {
            warn!(target: "agent.runtime", error = %err, "disconnect_failed");
        }
        if let Some(driver) = self.driver {
            driver.stop().await;
        }
        metrics().snapshot().log();
        info!(target: "agent.runtime", "agent_stopped");
    }
}

fn session_config(config: &AgentConfig) -> MqttSessionConfig {
    MqttSessionConfig {
        host: config.mqtt.hostname.clone(),
        port: config.mqtt.port,
        client_id: config.mqtt.client_id.clone(),
        username: config.mqtt.username.clone(),
        password: config.mqtt.password.clone(),
        keep_alive_secs: config.mqtt.keep_alive_secs,
    }
}

/// 连接 MQTT broker 并启动代理。
pub async fn start(
    config: &AgentConfig,
    factory: &ProcessorFactory,
) -> Result<RunningAgent, StartupError> {
    let processor = factory
        .create(&config.command_processor)
        .map_err(|err| StartupError::Configuration(err.to_string()))?;

    let mut session = MqttSession::connect(&session_config(config)).await?;
    session
        .subscribe(
            &[
                config.topics.inbound_system.as_str(),
                config.topics.inbound_command.as_str(),
            ],
            Qos::AtLeastOnce,
        )
        .await?;

    let driver_cancel = CancellationToken::new();
    let (publisher, inbound, handle) = session.start(driver_cancel.clone());
    let driver = EventLoopDriver::new(handle, driver_cancel);
    launch(config, processor, Arc::new(publisher), Box::new(inbound), Some(driver)).await
}

/// 在已建立的传输之上装配发送器、处理器宿主与命令路由，并执行启动逻辑。
pub async fn launch(
    config: &AgentConfig,
    processor: Arc<dyn CommandProcessor>,
    publisher: Arc<dyn Publisher>,
    inbound: Box<dyn InboundSource>,
    driver: Option<EventLoopDriver>,
) -> Result<RunningAgent, StartupError> {
    let dispatcher = Arc::new(OutboundEventDispatcher::new(
        publisher.clone(),
        config.topics.outbound.clone(),
    ));
    let sender = EventSender::new(dispatcher, config.identity());
    let host = ProcessorHost::new(processor.clone(), sender);
    info!(
        target: "agent.runtime",
        processor = processor.name(),
        commands = ?processor.commands().signatures(),
        "command_processor_ready"
    );

    let router = CommandRouter::new(
        RouterTopics {
            system: config.topics.inbound_system.clone(),
            command: config.topics.inbound_command.clone(),
        },
        inbound,
        Arc::new(host.clone()),
    );
    let cancel = CancellationToken::new();
    let router = tokio::spawn(router.run(cancel.clone()));

    let agent = RunningAgent {
        cancel,
        router,
        publisher,
        driver,
        host,
    };

    if let Err(err) = agent.host.execute_startup_logic().await {
        warn!(target: "agent.runtime", error = %err, "startup_logic_failed");
        agent.shutdown().await;
        return Err(StartupError::StartupLogic(err));
    }

    info!(
        target: "agent.runtime",
        device_token = %config.device_token,
        outbound = %config.topics.outbound,
        "agent_started"
    );
    Ok(agent)
}
