use agent_processor::{AgentError, InboundCommandHandler};
use agent_router::{CommandRouter, RouterError, RouterExit, RouterTopics, TopicKind};
use agent_transport::{InboundMessage, MemoryInboundHandle, memory_inbound};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SYSTEM: &str = "SiteWhere/acme/system/dev-1";
const COMMAND: &str = "SiteWhere/acme/command/dev-1";

/// 记录调用的入站处理器；载荷首字节决定行为：1 失败，2 panic，其他成功。
#[derive(Default)]
struct RecordingHandler {
    calls: Mutex<Vec<(String, Vec<u8>, usize)>>,
    inbound: Mutex<Option<MemoryInboundHandle>>,
}

impl RecordingHandler {
    fn watching(inbound: MemoryInboundHandle) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            inbound: Mutex::new(Some(inbound)),
        }
    }

    fn record(&self, path: &str, payload: &[u8]) -> Result<(), AgentError> {
        let acked = self
            .inbound
            .lock()
            .expect("lock")
            .as_ref()
            .map(|inbound| inbound.acked().len())
            .unwrap_or_default();
        self.calls
            .lock()
            .expect("lock")
            .push((path.to_string(), payload.to_vec(), acked));
        match payload.first() {
            Some(1) => Err(AgentError::DispatchResolution {
                command: "missing".to_string(),
                signature: String::new(),
            }),
            Some(2) => panic!("handler exploded"),
            _ => Ok(()),
        }
    }

    fn calls(&self) -> Vec<(String, Vec<u8>, usize)> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl InboundCommandHandler for RecordingHandler {
    async fn process_system_command(&self, payload: &[u8]) -> Result<(), AgentError> {
        self.record("system", payload)
    }

    async fn process_device_command(&self, payload: &[u8]) -> Result<(), AgentError> {
        self.record("command", payload)
    }
}

fn topics() -> RouterTopics {
    RouterTopics {
        system: SYSTEM.to_string(),
        command: COMMAND.to_string(),
    }
}

#[test]
fn topics_are_matched_exactly() {
    let (_, inbound) = memory_inbound();
    let router = CommandRouter::new(
        topics(),
        Box::new(inbound),
        Arc::new(RecordingHandler::default()),
    );
    let routes = router.routes();
    assert_eq!(routes.classify(SYSTEM), TopicKind::System);
    assert_eq!(routes.classify(COMMAND), TopicKind::Command);
    assert_eq!(routes.classify("SiteWhere/acme/system/dev-10"), TopicKind::Unknown);
    assert_eq!(routes.classify("SiteWhere/acme/system/+"), TopicKind::Unknown);
}

#[tokio::test]
async fn loop_survives_failures_and_panics() {
    let (handle, inbound) = memory_inbound();
    let handler = Arc::new(RecordingHandler::default());
    let router = CommandRouter::new(topics(), Box::new(inbound), handler.clone());
    let cancel = CancellationToken::new();
    let task = tokio::spawn(router.run(cancel.clone()));

    handle.push(COMMAND, vec![1]);
    handle.push(SYSTEM, vec![2]);
    handle.push("SiteWhere/acme/other", vec![0]);
    handle.push(COMMAND, vec![0, 9]);
    tokio::time::timeout(Duration::from_secs(5), async {
        while handler.calls().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("loop kept running");

    let calls = handler.calls();
    let paths: Vec<&str> = calls.iter().map(|(path, _, _)| path.as_str()).collect();
    assert_eq!(paths, vec!["command", "system", "command"]);
    assert_eq!(calls[2].1, vec![0, 9]);
    assert_eq!(handle.acked().len(), 4);

    cancel.cancel();
    assert_eq!(task.await.expect("join"), RouterExit::Cancelled);
}

#[tokio::test]
async fn closed_source_ends_loop() {
    let (handle, inbound) = memory_inbound();
    let handler = Arc::new(RecordingHandler::default());
    let router = CommandRouter::new(topics(), Box::new(inbound), handler.clone());

    handle.push(SYSTEM, vec![0]);
    drop(handle);

    let exit = router.run(CancellationToken::new()).await;
    assert_eq!(exit, RouterExit::SourceClosed);
    assert_eq!(handler.calls().len(), 1);
}

#[tokio::test]
async fn messages_are_acked_before_processing() {
    let (handle, inbound) = memory_inbound();
    let handler = Arc::new(RecordingHandler::watching(handle.clone()));
    let router = CommandRouter::new(topics(), Box::new(inbound), handler.clone());
    let cancel = CancellationToken::new();
    let task = tokio::spawn(router.run(cancel.clone()));

    handle.push(SYSTEM, vec![0]);
    handle.push(COMMAND, vec![1]);
    tokio::time::timeout(Duration::from_secs(5), async {
        while handler.calls().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("both messages handled");

    let acked_at_call: Vec<usize> = handler.calls().iter().map(|(_, _, acked)| *acked).collect();
    assert_eq!(acked_at_call, vec![1, 2]);

    cancel.cancel();
    assert_eq!(task.await.expect("join"), RouterExit::Cancelled);
}

#[tokio::test]
async fn cancellation_stops_idle_loop() {
    let (_handle, inbound) = memory_inbound();
    let router = CommandRouter::new(
        topics(),
        Box::new(inbound),
        Arc::new(RecordingHandler::default()),
    );
    let cancel = CancellationToken::new();
    let task = tokio::spawn(router.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    let exit = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("router exits")
        .expect("join");
    assert_eq!(exit, RouterExit::Cancelled);
}

#[tokio::test]
async fn route_reports_errors_per_message() {
    let (_, inbound) = memory_inbound();
    let router = CommandRouter::new(
        topics(),
        Box::new(inbound),
        Arc::new(RecordingHandler::default()),
    );
    let routes = router.routes();

    assert!(matches!(
        routes.route(&InboundMessage::new(COMMAND, vec![1])).await,
        Err(RouterError::Processing(AgentError::DispatchResolution { .. }))
    ));
    assert!(matches!(
        routes.route(&InboundMessage::new(SYSTEM, vec![2])).await,
        Err(RouterError::Panicked(message)) if message == "handler exploded"
    ));
    assert!(routes.route(&InboundMessage::new("elsewhere", vec![1])).await.is_ok());
}
