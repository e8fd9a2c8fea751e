//! # 事件发送能力模块
//!
//! 把设备事件封装为 Header + Body 帧，发布到出站主题。
//! 每次调用恰好一次发布，不合并、不重试；编码或发布失败同步返回给调用方。

use agent_codec::{CodecError, encode_frame};
use agent_telemetry::{record_encode_failure, record_frame_published, record_publish_failure};
use agent_transport::{Publisher, Qos, TransportError};
use async_trait::async_trait;
use domain::{
    DeviceAcknowledge, DeviceAlert, DeviceLocation, DeviceMeasurement, DeviceRegistrationRequest,
    EventCommand,
};
use prost::Message;
use std::sync::Arc;
use tracing::{debug, warn};

/// 事件发送错误。
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// 帧编码失败，未发布任何字节。
    #[error("encode failed: {0}")]
    Encode(#[from] CodecError),
    /// 传输层发布失败。
    #[error("publish failed: {0}")]
    Publish(#[from] TransportError),
}

/// 设备事件发送接口。
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn register_device(
        &self,
        request: &DeviceRegistrationRequest,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError>;

    async fn acknowledge(
        &self,
        ack: &DeviceAcknowledge,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError>;

    async fn send_measurement(
        &self,
        measurement: &DeviceMeasurement,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError>;

    async fn send_location(
        &self,
        location: &DeviceLocation,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError>;

    async fn send_alert(
        &self,
        alert: &DeviceAlert,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError>;
}

/// 基于 [`Publisher`] 的出站事件发送器。
#[derive(Clone)]
pub struct OutboundEventDispatcher {
    publisher: Arc<dyn Publisher>,
    topic: String,
}

impl OutboundEventDispatcher {
    pub fn new(publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }

    async fn send<B: Message>(
        &self,
        command: EventCommand,
        body: &B,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError> {
        let payload = match encode_frame(command, device_token, originator, body) {
            Ok(payload) => payload,
            Err(err) => {
                record_encode_failure();
                warn!(
                    target: "agent.dispatch",
                    command = command.label(),
                    device_token,
                    error = %err,
                    "frame_encode_failed"
                );
                return Err(err.into());
            }
        };
        let payload_size = payload.len();
        if let Err(err) = self
            .publisher
            .publish(&self.topic, payload, Qos::ExactlyOnce)
            .await
        {
            record_publish_failure();
            warn!(
                target: "agent.dispatch",
                command = command.label(),
                device_token,
                topic = %self.topic,
                error = %err,
                "frame_publish_failed"
            );
            return Err(err.into());
        }
        record_frame_published();
        debug!(
            target: "agent.dispatch",
            command = command.label(),
            device_token,
            originator = originator.unwrap_or("-"),
            topic = %self.topic,
            payload_size,
            "frame_published"
        );
        Ok(())
    }
}

#[async_trait]
impl EventDispatcher for OutboundEventDispatcher {
    async fn register_device(
        &self,
        request: &DeviceRegistrationRequest,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError> {
        self.send(EventCommand::SendRegistration, request, device_token, originator)
            .await
    }

    async fn acknowledge(
        &self,
        ack: &DeviceAcknowledge,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError> {
        self.send(EventCommand::SendAcknowledgement, ack, device_token, originator)
            .await
    }

    async fn send_measurement(
        &self,
        measurement: &DeviceMeasurement,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError> {
        self.send(EventCommand::SendMeasurement, measurement, device_token, originator)
            .await
    }

    async fn send_location(
        &self,
        location: &DeviceLocation,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError> {
        self.send(EventCommand::SendLocation, location, device_token, originator)
            .await
    }

    async fn send_alert(
        &self,
        alert: &DeviceAlert,
        device_token: &str,
        originator: Option<&str>,
    ) -> Result<(), DispatchError> {
        self.send(EventCommand::SendAlert, alert, device_token, originator)
            .await
    }
}
