//! SiteWhere 设备侧代理入口。

mod agent;

use agent::{StartupError, start};
use agent_config::{AgentConfig, DEFAULT_CONFIG_PATH};
use agent_processor::ProcessorFactory;
use agent_telemetry::init_tracing;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "sitewhere-agent",
    version,
    about = "Device-side agent bridging a device to SiteWhere over MQTT"
)]
struct Cli {
    /// properties 配置文件路径
    #[arg(value_name = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    // 初始化结构化日志
    init_tracing();
    let cli = Cli::parse();

    let agent = match run(&cli).await {
        Ok(agent) => agent,
        Err(err) => {
            // 启动失败只记录，不强制退出进程
            error!(target: "agent.runtime", error = %err, "agent_startup_failed");
            return;
        }
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target: "agent.runtime", error = %err, "ctrl_c_listen_failed");
    }
    info!(target: "agent.runtime", "shutdown_requested");
    agent.shutdown().await;
}

async fn run(cli: &Cli) -> Result<agent::RunningAgent, StartupError> {
    info!(
        target: "agent.runtime",
        config = %cli.config.display(),
        "loading_configuration"
    );
    let config = AgentConfig::from_path(&cli.config)?;
    config.log_resolved();
    let factory = ProcessorFactory::with_builtin();
    start(&config, &factory).await
}
