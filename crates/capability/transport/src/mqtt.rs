//! `rumqttc` 传输实现。
//!
//! 网络 I/O 由独立的事件循环任务驱动：收到的 publish 转入通道交给单一消费者，
//! 出站发布经 `AsyncClient` 的请求队列串行写出。处理入站消息期间出站发布不受阻塞。
//!
//! `AsyncClient::publish` 只负责入队。发布调用随后等待事件循环确认投递：
//! QoS 0 在写出时完成，QoS 1 在 PUBACK 时完成，QoS 2 在 PUBCOMP 时完成。
//! 连接出错时所有未完成的发布立即失败，事件循环结束后新的发布返回 `Closed`。

use crate::{InboundMessage, InboundSource, Publisher, Qos, TransportError};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, SubscribeReasonCode};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// MQTT 会话配置。
#[derive(Debug, Clone)]
pub struct MqttSessionConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
}

impl MqttSessionConfig {
    /// 构造客户端选项（启用手动确认）。
    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        options.set_manual_acks(true);
        if let (Some(username), Some(password)) = (self.username.as_ref(), self.password.as_ref()) {
            options.set_credentials(username, password);
        }
        options
    }
}

type Delivery = oneshot::Sender<Result<(), TransportError>>;

/// 已入队、尚未写出的发布。
struct QueuedPublish {
    qos: Qos,
    done: Delivery,
}

/// 出站发布的投递跟踪。
///
/// 请求队列按 FIFO 处理，`Outgoing::Publish` 事件与入队顺序一一对应。
/// 已失败的入队项保留为空槽，直到对应的写出事件到达。
#[derive(Default)]
struct DeliveryTracker {
    queued: VecDeque<Option<QueuedPublish>>,
    in_flight: HashMap<u16, Delivery>,
    // 重连后会按原 pkid 重发，这些重发不对应新的入队项
    abandoned: HashSet<u16>,
    closed: bool,
}

impl DeliveryTracker {
    fn enqueue(&mut self, qos: Qos, done: Delivery) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.queued.push_back(Some(QueuedPublish { qos, done }));
        Ok(())
    }

    /// 撤回最后一个入队项（请求未能进入客户端队列）。
    fn withdraw_last(&mut self) {
        self.queued.pop_back();
    }

    fn written(&mut self, pkid: u16) {
        if pkid != 0 && self.abandoned.contains(&pkid) {
            return;
        }
        let Some(Some(publish)) = self.queued.pop_front() else {
            return;
        };
        match publish.qos {
            Qos::AtMostOnce => {
                let _ = publish.done.send(Ok(()));
            }
            Qos::AtLeastOnce | Qos::ExactlyOnce => {
                self.in_flight.insert(pkid, publish.done);
            }
        }
    }

    fn completed(&mut self, pkid: u16) {
        self.abandoned.remove(&pkid);
        if let Some(done) = self.in_flight.remove(&pkid) {
            let _ = done.send(Ok(()));
        }
    }

    fn fail_outstanding(&mut self, reason: &str) {
        for slot in self.queued.iter_mut() {
            if let Some(publish) = slot.take() {
                let _ = publish.done.send(Err(TransportError::Publish(reason.to_string())));
            }
        }
        for (pkid, done) in self.in_flight.drain() {
            self.abandoned.insert(pkid);
            let _ = done.send(Err(TransportError::Publish(reason.to_string())));
        }
    }

    fn close(&mut self) {
        self.closed = true;
        for publish in self.queued.drain(..).flatten() {
            let _ = publish.done.send(Err(TransportError::Closed));
        }
        for (_, done) in self.in_flight.drain() {
            let _ = done.send(Err(TransportError::Closed));
        }
    }
}

fn lock(tracker: &Mutex<DeliveryTracker>) -> MutexGuard<'_, DeliveryTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 已连接、尚未开始转发的 MQTT 会话。
pub struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
    pending: VecDeque<rumqttc::Publish>,
}

impl MqttSession {
    /// 连接 broker，等待 CONNACK。
    pub async fn connect(config: &MqttSessionConfig) -> Result<Self, TransportError> {
        let (client, mut eventloop) = AsyncClient::new(config.mqtt_options(), 10);
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(
                        target: "agent.transport",
                        host = %config.host,
                        port = config.port,
                        client_id = %config.client_id,
                        session_present = ack.session_present,
                        "mqtt_connected"
                    );
                    break;
                }
                Ok(_) => {}
                Err(err) => return Err(TransportError::Connection(err.to_string())),
            }
        }
        Ok(Self {
            client,
            eventloop,
            pending: VecDeque::new(),
        })
    }

    /// 订阅主题并等待全部 SUBACK。等待期间到达的 publish 暂存，启动后优先转发。
    pub async fn subscribe(&mut self, topics: &[&str], qos: Qos) -> Result<(), TransportError> {
        for topic in topics {
            self.client
                .subscribe(*topic, qos.into())
                .await
                .map_err(|err| TransportError::Subscribe(err.to_string()))?;
        }
        let mut remaining = topics.len();
        while remaining > 0 {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(TransportError::Subscribe(format!(
                            "broker rejected subscription (pkid {})",
                            ack.pkid
                        )));
                    }
                    remaining = remaining.saturating_sub(1);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => self.pending.push_back(publish),
                Ok(_) => {}
                Err(err) => return Err(TransportError::Subscribe(err.to_string())),
            }
        }
        info!(target: "agent.transport", topics = ?topics, ?qos, "mqtt_subscribed");
        Ok(())
    }

    /// 启动事件循环任务，拆分为发布端与入站端。
    ///
    /// 事件循环在取消令牌触发、客户端发出 DISCONNECT 或入站端被丢弃后结束。
    pub fn start(
        self,
        cancel: CancellationToken,
    ) -> (MqttPublisher, MqttInbound, JoinHandle<()>) {
        let Self {
            client,
            mut eventloop,
            pending,
        } = self;
        // 入站通道不设上限，事件循环不因路由处理而停止轮询。
        let (sender, receiver) = mpsc::unbounded_channel();
        for publish in pending {
            let _ = sender.send(InboundMessage::from_publish(publish));
        }
        let deliveries = Arc::new(Mutex::new(DeliveryTracker::default()));
        let tracker = deliveries.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = eventloop.poll() => match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            debug!(
                                target: "agent.transport",
                                topic = %publish.topic,
                                payload_size = publish.payload.len(),
                                "mqtt_publish_received"
                            );
                            if sender.send(InboundMessage::from_publish(publish)).is_err() {
                                break;
                            }
                        }
                        Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                            lock(&tracker).written(pkid);
                        }
                        Ok(Event::Incoming(Packet::PubAck(ack))) => {
                            lock(&tracker).completed(ack.pkid);
                        }
                        Ok(Event::Incoming(Packet::PubComp(comp))) => {
                            lock(&tracker).completed(comp.pkid);
                        }
                        Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                        Ok(_) => {}
                        Err(err) => {
                            warn!(target: "agent.transport", error = %err, "mqtt_eventloop_error");
                            lock(&tracker).fail_outstanding(&err.to_string());
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
            lock(&tracker).close();
            info!(target: "agent.transport", "mqtt_eventloop_stopped");
        });
        (
            MqttPublisher {
                client: client.clone(),
                deliveries,
                order: Arc::new(tokio::sync::Mutex::new(())),
            },
            MqttInbound { client, receiver },
            handle,
        )
    }
}

/// MQTT 发布端，可克隆、可并发使用。
///
/// 每次发布在 broker 完成对应 QoS 的确认后才返回。
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    deliveries: Arc<Mutex<DeliveryTracker>>,
    // 入队跟踪项与写入请求队列必须保持同一顺序
    order: Arc<tokio::sync::Mutex<()>>,
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: Qos) -> Result<(), TransportError> {
        let (done, delivered) = oneshot::channel();
        {
            let _order = self.order.lock().await;
            lock(&self.deliveries).enqueue(qos, done)?;
            if let Err(err) = self.client.publish(topic, qos.into(), false, payload).await {
                lock(&self.deliveries).withdraw_last();
                return Err(TransportError::Publish(err.to_string()));
            }
        }
        delivered.await.map_err(|_| TransportError::Closed)?
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|err| TransportError::Connection(err.to_string()))
    }
}

/// MQTT 入站端。
pub struct MqttInbound {
    client: AsyncClient,
    receiver: mpsc::UnboundedReceiver<InboundMessage>,
}

#[async_trait]
impl InboundSource for MqttInbound {
    async fn receive(&mut self) -> Option<InboundMessage> {
        self.receiver.recv().await
    }

    async fn ack(&mut self, message: &InboundMessage) -> Result<(), TransportError> {
        match message.publish() {
            Some(publish) => self
                .client
                .ack(publish)
                .await
                .map_err(|err| TransportError::Ack(err.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MqttSessionConfig {
        MqttSessionConfig {
            host: "broker.local".to_string(),
            port: 1884,
            client_id: "sitewhere-agent-dev-1".to_string(),
            username: Some("agent".to_string()),
            password: None,
            keep_alive_secs: 45,
        }
    }

    #[test]
    fn options_carry_broker_and_keepalive() {
        let options = config().mqtt_options();
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(options.client_id(), "sitewhere-agent-dev-1");
        assert_eq!(options.keep_alive(), Duration::from_secs(45));
        assert!(options.manual_acks());
    }

    #[test]
    fn credentials_need_both_parts() {
        let options = config().mqtt_options();
        assert!(options.credentials().is_none());

        let mut full = config();
        full.password = Some("secret".to_string());
        assert_eq!(
            full.mqtt_options().credentials(),
            Some(("agent".to_string(), "secret".to_string()))
        );
    }

    fn queue(tracker: &mut DeliveryTracker, qos: Qos) -> oneshot::Receiver<Result<(), TransportError>> {
        let (done, delivered) = oneshot::channel();
        tracker.enqueue(qos, done).expect("enqueue");
        delivered
    }

    #[test]
    fn exactly_once_completes_on_pubcomp_only() {
        let mut tracker = DeliveryTracker::default();
        let mut delivered = queue(&mut tracker, Qos::ExactlyOnce);

        tracker.written(7);
        assert!(delivered.try_recv().is_err());

        tracker.completed(7);
        assert!(matches!(delivered.try_recv(), Ok(Ok(()))));
    }

    #[test]
    fn at_most_once_completes_when_written() {
        let mut tracker = DeliveryTracker::default();
        let mut delivered = queue(&mut tracker, Qos::AtMostOnce);

        tracker.written(0);
        assert!(matches!(delivered.try_recv(), Ok(Ok(()))));
    }

    #[test]
    fn connection_error_fails_queued_and_in_flight() {
        let mut tracker = DeliveryTracker::default();
        let mut in_flight = queue(&mut tracker, Qos::ExactlyOnce);
        let mut queued = queue(&mut tracker, Qos::ExactlyOnce);
        tracker.written(1);

        tracker.fail_outstanding("connection reset");
        assert!(matches!(in_flight.try_recv(), Ok(Err(TransportError::Publish(_)))));
        assert!(matches!(queued.try_recv(), Ok(Err(TransportError::Publish(_)))));

        // 重连后：重发的 pkid 1 被忽略，失败入队项的写出事件消耗空槽
        let mut next = queue(&mut tracker, Qos::ExactlyOnce);
        tracker.written(1);
        tracker.written(2);
        tracker.written(3);
        tracker.completed(1);
        tracker.completed(3);
        assert!(matches!(next.try_recv(), Ok(Ok(()))));
    }

    #[test]
    fn closed_tracker_rejects_new_publishes() {
        let mut tracker = DeliveryTracker::default();
        let mut pending = queue(&mut tracker, Qos::AtLeastOnce);
        tracker.close();

        assert!(matches!(pending.try_recv(), Ok(Err(TransportError::Closed))));
        let (done, _delivered) = oneshot::channel();
        assert!(matches!(
            tracker.enqueue(Qos::ExactlyOnce, done),
            Err(TransportError::Closed)
        ));
    }
}
