//! 设备事件便捷发送。

use crate::error::AgentError;
use agent_dispatch::EventDispatcher;
use domain::{
    DeviceAcknowledge, DeviceAlert, DeviceIdentity, DeviceLocation, DeviceMeasurement,
    DeviceRegistrationRequest, Originator,
};
use std::sync::Arc;

/// 便捷发送器：构造事件记录并交给事件发送器。
///
/// 不做业务校验；发起者取其事件 ID，缺省时帧头不带发起者字段。
#[derive(Clone)]
pub struct EventSender {
    dispatcher: Arc<dyn EventDispatcher>,
    identity: Arc<DeviceIdentity>,
}

impl EventSender {
    pub fn new(dispatcher: Arc<dyn EventDispatcher>, identity: DeviceIdentity) -> Self {
        Self {
            dispatcher,
            identity: Arc::new(identity),
        }
    }

    /// 代理所代表的设备身份。
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn device_token(&self) -> &str {
        &self.identity.device_token
    }

    /// 发送注册请求（不带发起者）。
    pub async fn send_registration(&self, identity: &DeviceIdentity) -> Result<(), AgentError> {
        let request = DeviceRegistrationRequest {
            device_type_token: Some(identity.device_type_token.as_str().into()),
            area_token: Some(identity.area_token.as_str().into()),
            customer_token: Some(identity.customer_token.as_str().into()),
            metadata: Vec::new(),
        };
        self.dispatcher
            .register_device(&request, &identity.device_token, None)
            .await?;
        Ok(())
    }

    pub async fn send_ack(
        &self,
        device_token: &str,
        message: &str,
        originator: Option<&Originator>,
    ) -> Result<(), AgentError> {
        let ack = DeviceAcknowledge {
            message: Some(message.into()),
        };
        self.dispatcher
            .acknowledge(&ack, device_token, event_id(originator))
            .await?;
        Ok(())
    }

    pub async fn send_measurement(
        &self,
        device_token: &str,
        name: &str,
        value: f64,
        originator: Option<&Originator>,
    ) -> Result<(), AgentError> {
        let measurement = DeviceMeasurement {
            measurement_name: Some(name.into()),
            measurement_value: Some(value.into()),
            ..Default::default()
        };
        self.dispatcher
            .send_measurement(&measurement, device_token, event_id(originator))
            .await?;
        Ok(())
    }

    pub async fn send_location(
        &self,
        device_token: &str,
        latitude: f64,
        longitude: f64,
        elevation: f64,
        originator: Option<&Originator>,
    ) -> Result<(), AgentError> {
        let location = DeviceLocation {
            latitude: Some(latitude.into()),
            longitude: Some(longitude.into()),
            elevation: Some(elevation.into()),
            ..Default::default()
        };
        self.dispatcher
            .send_location(&location, device_token, event_id(originator))
            .await?;
        Ok(())
    }

    pub async fn send_alert(
        &self,
        device_token: &str,
        alert_type: &str,
        message: &str,
        originator: Option<&Originator>,
    ) -> Result<(), AgentError> {
        let alert = DeviceAlert {
            alert_type: Some(alert_type.into()),
            alert_message: Some(message.into()),
            ..Default::default()
        };
        self.dispatcher
            .send_alert(&alert, device_token, event_id(originator))
            .await?;
        Ok(())
    }
}

fn event_id(originator: Option<&Originator>) -> Option<&str> {
    originator.map(|originator| originator.event_id.as_str())
}
