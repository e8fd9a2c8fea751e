//! # 传输能力模块
//!
//! 定义代理与 broker 之间的两个接缝：
//!
//! - [`Publisher`]：出站发布，可被多个调用方并发使用，每次调用发布一条完整载荷
//! - [`InboundSource`]：入站接收，单消费者，逐条接收并确认
//!
//! 提供 `rumqttc` 实现（[`MqttSession`]）与内存实现（[`MemoryPublisher`]、[`memory_inbound`]）。

mod memory;
mod mqtt;

use async_trait::async_trait;

pub use memory::{MemoryInbound, MemoryInboundHandle, MemoryPublisher, PublishedFrame, memory_inbound};
pub use mqtt::{MqttInbound, MqttPublisher, MqttSession, MqttSessionConfig};

/// 传输错误。
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 无法连接或认证。
    #[error("connection failed: {0}")]
    Connection(String),
    /// 订阅被拒绝或中断。
    #[error("subscribe failed: {0}")]
    Subscribe(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("ack failed: {0}")]
    Ack(String),
    /// 连接已关闭。
    #[error("transport closed")]
    Closed,
}

/// 传输层服务质量。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// 入站消息。
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    publish: Option<rumqttc::Publish>,
}

impl InboundMessage {
    /// 构造不关联 broker 报文的消息（内存传输与测试）。
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            publish: None,
        }
    }

    pub(crate) fn from_publish(publish: rumqttc::Publish) -> Self {
        Self {
            topic: publish.topic.clone(),
            payload: publish.payload.to_vec(),
            publish: Some(publish),
        }
    }

    pub(crate) fn publish(&self) -> Option<&rumqttc::Publish> {
        self.publish.as_ref()
    }
}

/// 出站发布接口。
///
/// 实现必须允许并发调用；每次调用要么完整发布整条载荷，要么返回错误。
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: Qos) -> Result<(), TransportError>;

    /// 关闭底层连接。
    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// 入站消息源（单消费者）。
#[async_trait]
pub trait InboundSource: Send {
    /// 等待下一条消息；源关闭后返回 `None`。
    async fn receive(&mut self) -> Option<InboundMessage>;

    /// 向传输层确认已收到消息。
    async fn ack(&mut self, message: &InboundMessage) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_maps_to_mqtt_levels() {
        assert_eq!(rumqttc::QoS::from(Qos::AtMostOnce), rumqttc::QoS::AtMostOnce);
        assert_eq!(rumqttc::QoS::from(Qos::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
        assert_eq!(rumqttc::QoS::from(Qos::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }

    #[test]
    fn plain_message_has_no_broker_packet() {
        let message = InboundMessage::new("SiteWhere/acme/system/dev-1", vec![1, 2]);
        assert!(message.publish().is_none());
        assert_eq!(message.payload, vec![1, 2]);
    }
}
