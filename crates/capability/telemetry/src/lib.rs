//! 追踪初始化与进程级计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub inbound_messages: u64,
    pub system_commands: u64,
    pub device_commands: u64,
    pub dropped_unknown_topic: u64,
    pub message_failures: u64,
    pub frames_published: u64,
    pub publish_failures: u64,
    pub encode_failures: u64,
}

impl MetricsSnapshot {
    /// 两次快照之间的增量，便于在共享进程中比较。
    pub fn since(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            inbound_messages: self.inbound_messages - earlier.inbound_messages,
            system_commands: self.system_commands - earlier.system_commands,
            device_commands: self.device_commands - earlier.device_commands,
            dropped_unknown_topic: self.dropped_unknown_topic - earlier.dropped_unknown_topic,
            message_failures: self.message_failures - earlier.message_failures,
            frames_published: self.frames_published - earlier.frames_published,
            publish_failures: self.publish_failures - earlier.publish_failures,
            encode_failures: self.encode_failures - earlier.encode_failures,
        }
    }

    /// 以一条 info 事件输出全部计数。
    pub fn log(&self) {
        info!(
            target: "agent.metrics",
            inbound_messages = self.inbound_messages,
            system_commands = self.system_commands,
            device_commands = self.device_commands,
            dropped_unknown_topic = self.dropped_unknown_topic,
            message_failures = self.message_failures,
            frames_published = self.frames_published,
            publish_failures = self.publish_failures,
            encode_failures = self.encode_failures,
            "metrics_snapshot"
        );
    }
}

/// 代理计数指标。
pub struct AgentMetrics {
    inbound_messages: AtomicU64,
    system_commands: AtomicU64,
    device_commands: AtomicU64,
    dropped_unknown_topic: AtomicU64,
    message_failures: AtomicU64,
    frames_published: AtomicU64,
    publish_failures: AtomicU64,
    encode_failures: AtomicU64,
}

impl AgentMetrics {
    pub fn new() -> Self {
        Self {
            inbound_messages: AtomicU64::new(0),
            system_commands: AtomicU64::new(0),
            device_commands: AtomicU64::new(0),
            dropped_unknown_topic: AtomicU64::new(0),
            message_failures: AtomicU64::new(0),
            frames_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inbound_messages: self.inbound_messages.load(Ordering::Relaxed),
            system_commands: self.system_commands.load(Ordering::Relaxed),
            device_commands: self.device_commands.load(Ordering::Relaxed),
            dropped_unknown_topic: self.dropped_unknown_topic.load(Ordering::Relaxed),
            message_failures: self.message_failures.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<AgentMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static AgentMetrics {
    METRICS.get_or_init(AgentMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录入站消息接收次数。
pub fn record_inbound_message() {
    metrics().inbound_messages.fetch_add(1, Ordering::Relaxed);
}

/// 记录系统命令处理次数。
pub fn record_system_command() {
    metrics().system_commands.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备类型命令处理次数。
pub fn record_device_command() {
    metrics().device_commands.fetch_add(1, Ordering::Relaxed);
}

/// 记录未知主题丢弃次数。
pub fn record_dropped_unknown_topic() {
    metrics()
        .dropped_unknown_topic
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录单条消息处理失败次数（解码、分发、处理函数失败）。
pub fn record_message_failure() {
    metrics().message_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录出站帧发布成功次数。
pub fn record_frame_published() {
    metrics().frames_published.fetch_add(1, Ordering::Relaxed);
}

/// 记录出站帧发布失败次数。
pub fn record_publish_failure() {
    metrics().publish_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录出站帧编码失败次数。
pub fn record_encode_failure() {
    metrics().encode_failures.fetch_add(1, Ordering::Relaxed);
}
