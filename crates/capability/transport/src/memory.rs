//! 内存传输实现（单元测试与本地演练）。

use crate::{InboundMessage, InboundSource, Publisher, Qos, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// 已发布的一条完整载荷。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFrame {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
}

/// 记录每次发布的内存发布端。
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    frames: Mutex<Vec<PublishedFrame>>,
    failing: bool,
    closed: AtomicBool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次发布都失败的发布端。
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// 按发布顺序返回已发布载荷。
    pub fn published(&self) -> Vec<PublishedFrame> {
        match self.frames.lock() {
            Ok(frames) => frames.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: Qos) -> Result<(), TransportError> {
        if self.failing {
            return Err(TransportError::Publish("memory publisher configured to fail".to_string()));
        }
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| TransportError::Publish("memory publisher lock poisoned".to_string()))?;
        frames.push(PublishedFrame {
            topic: topic.to_string(),
            payload,
            qos,
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// 内存入站源的投递端。全部投递端被丢弃后，入站源返回 `None`。
#[derive(Debug, Clone)]
pub struct MemoryInboundHandle {
    sender: mpsc::UnboundedSender<InboundMessage>,
    acked: Arc<Mutex<Vec<String>>>,
}

impl MemoryInboundHandle {
    /// 投递一条消息；入站源已丢弃时返回 `false`。
    pub fn push(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> bool {
        self.sender.send(InboundMessage::new(topic, payload)).is_ok()
    }

    /// 已确认消息的主题（按确认顺序）。
    pub fn acked(&self) -> Vec<String> {
        match self.acked.lock() {
            Ok(acked) => acked.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// 内存入站源。
#[derive(Debug)]
pub struct MemoryInbound {
    receiver: mpsc::UnboundedReceiver<InboundMessage>,
    acked: Arc<Mutex<Vec<String>>>,
}

/// 创建一对内存入站投递端与入站源。
pub fn memory_inbound() -> (MemoryInboundHandle, MemoryInbound) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let acked = Arc::new(Mutex::new(Vec::new()));
    (
        MemoryInboundHandle {
            sender,
            acked: acked.clone(),
        },
        MemoryInbound { receiver, acked },
    )
}

#[async_trait]
impl InboundSource for MemoryInbound {
    async fn receive(&mut self) -> Option<InboundMessage> {
        self.receiver.recv().await
    }

    async fn ack(&mut self, message: &InboundMessage) -> Result<(), TransportError> {
        let mut acked = self
            .acked
            .lock()
            .map_err(|_| TransportError::Ack("memory inbound lock poisoned".to_string()))?;
        acked.push(message.topic.clone());
        Ok(())
    }
}
