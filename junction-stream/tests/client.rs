//! End-to-end behaviour of the stream client against the simulated engine.

use junction_auth::{EnvAuthProvider, StaticAuthProvider};
use junction_dispatch::{DispatchConfig, Dispatcher};
use junction_registry::HandlerRegistry;
use junction_stream::channel::{ChannelTransport, EngineConnection, SimulatedEngine};
use junction_stream::{
    ClientFrame, EngineFrame, ReconnectPolicy, SessionState, StreamClient, StreamConfig,
    StreamError,
};
use junction_types::test_utils::{BumpProcessor, RecordingProcessor, processor_event};
use junction_types::{ErrorCode, ResultStatus};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn policy() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
        max_attempts: 5,
    }
}

fn config() -> StreamConfig {
    StreamConfig {
        member_id: "m1".into(),
        tags: vec!["blue".into()],
        reconnect: policy(),
        drain_timeout: Duration::from_millis(200),
    }
}

fn registry() -> HandlerRegistry {
    HandlerRegistry::builder()
        .processor("bump", BumpProcessor)
        .processor("quick", RecordingProcessor::new(Duration::from_millis(50)))
        .processor("stuck", RecordingProcessor::new(Duration::from_secs(10)))
        .build()
        .unwrap()
}

async fn within<T>(what: &str, fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

struct Running {
    engine: SimulatedEngine,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
    task: JoinHandle<(StreamClient, Result<(), StreamError>)>,
}

impl Running {
    fn start(client: StreamClient, engine: SimulatedEngine) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::new(registry()),
            client.result_sink(),
            DispatchConfig::default(),
        );
        let shutdown = CancellationToken::new();
        let task = {
            let dispatcher = dispatcher.clone();
            let shutdown = shutdown.clone();
            let mut client = client;
            tokio::spawn(async move {
                let result = client.run(&dispatcher, &shutdown).await;
                (client, result)
            })
        };
        Self {
            engine,
            dispatcher,
            shutdown,
            task,
        }
    }

    async fn accept(&mut self) -> EngineConnection {
        let mut conn = within("a connection", self.engine.accept())
            .await
            .expect("transport dropped");
        within("the join frame", conn.recv_join()).await.unwrap();
        conn
    }

    async fn stop(self) -> (StreamClient, Result<(), StreamError>) {
        self.shutdown.cancel();
        within("the client to stop", self.task).await.unwrap()
    }

    async fn wait_in_flight(&self, n: usize) {
        within("work to be in flight", async {
            while self.dispatcher.in_flight().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
    }
}

fn start() -> Running {
    let (transport, engine) = ChannelTransport::pair();
    let client = StreamClient::new(
        Arc::new(transport),
        Arc::new(StaticAuthProvider::new("tok")),
        config(),
    );
    Running::start(client, engine)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handshake and routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn joins_then_answers_events() {
    let mut run = start();
    let mut conn = within("a connection", run.engine.accept()).await.unwrap();

    let join = within("join", conn.recv_join()).await.unwrap();
    assert_eq!(join.member_id, "m1");
    assert_eq!(join.token, "tok");
    assert_eq!(join.tags, vec!["blue"]);

    conn.send(&EngineFrame::Greet {
        member_id: "m1".into(),
    });
    conn.send_event(processor_event("1", "e1", "bump", json!({"value": 5})));
    let result = within("a result", conn.recv_result()).await.unwrap();
    assert_eq!(result.event_id.as_str(), "1");
    assert_eq!(result.status, ResultStatus::Ok);
    assert_eq!(result.payload, Some(json!({"value": 6})));

    let (client, outcome) = run.stop().await;
    outcome.unwrap();
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(within("close", conn.recv()).await.is_none());
}

#[tokio::test]
async fn keep_alive_is_acknowledged() {
    let mut run = start();
    let mut conn = run.accept().await;

    conn.send(&EngineFrame::KeepAlive { id: json!("ka-1") });
    let frame = within("an ack", conn.recv()).await.unwrap();
    assert_eq!(frame, ClientFrame::KeepAliveAck { id: json!("ka-1") });

    run.stop().await.1.unwrap();
}

#[tokio::test]
async fn undecodable_frames_are_skipped() {
    let mut run = start();
    let mut conn = run.accept().await;

    conn.send_raw("this is not json");
    conn.send_raw(r#"{"type":"event","event_id":"no-fields"}"#);
    conn.send_event(processor_event("2", "e1", "bump", json!({"value": 1})));

    let result = within("a result", conn.recv_result()).await.unwrap();
    assert_eq!(result.event_id.as_str(), "2");
    run.stop().await.1.unwrap();
}

#[tokio::test]
async fn unknown_handler_is_reported_not_found() {
    let mut run = start();
    let mut conn = run.accept().await;

    conn.send_event(processor_event("1", "e1", "nope", json!({})));
    conn.send_event(processor_event("2", "e1", "bump", json!({"value": 0})));

    let first = within("a result", conn.recv_result()).await.unwrap();
    let second = within("a result", conn.recv_result()).await.unwrap();
    assert_eq!(first.status, ResultStatus::NotFound);
    assert_eq!(second.status, ResultStatus::Ok);
    run.stop().await.1.unwrap();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconnection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn transport_failure_reconnects_and_reports_in_flight_work() {
    let mut run = start();
    let conn = run.accept().await;

    conn.send_event(processor_event("1", "e1", "stuck", json!({})));
    run.wait_in_flight(1).await;

    let lost_at = Instant::now();
    conn.fail();
    let mut conn = run.accept().await;
    assert!(lost_at.elapsed() <= policy().total_budget() + Duration::from_secs(1));
    assert_eq!(run.engine.connections(), 2);

    let cancelled = within("the cancelled result", conn.recv_result()).await.unwrap();
    assert_eq!(cancelled.event_id.as_str(), "1");
    assert_eq!(cancelled.error_code, Some(ErrorCode::TransportError));

    conn.send_event(processor_event("2", "e1", "bump", json!({"value": 1})));
    let resumed = within("a result", conn.recv_result()).await.unwrap();
    assert_eq!(resumed.event_id.as_str(), "2");
    assert!(resumed.is_ok());

    run.stop().await.1.unwrap();
}

#[tokio::test]
async fn exhausted_reconnects_are_fatal() {
    let mut run = start();
    let conn = run.accept().await;

    run.engine.refuse_next(usize::MAX);
    conn.fail();

    let (client, outcome) = within("the client to give up", run.task).await.unwrap();
    match outcome {
        Err(StreamError::ReconnectExhausted { attempts, .. }) => assert_eq!(attempts, 5),
        other => panic!("expected exhausted reconnects, got {other:?}"),
    }
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn initial_connect_retries_with_backoff() {
    let (transport, engine) = ChannelTransport::pair();
    engine.refuse_next(2);
    let client = StreamClient::new(
        Arc::new(transport),
        Arc::new(StaticAuthProvider::new("tok")),
        config(),
    );
    let mut states = client.subscribe_state();
    let run = Running::start(client, engine);

    within("connected", states.wait_for(|s| *s == SessionState::Connected))
        .await
        .unwrap();
    assert_eq!(run.engine.connections(), 1);
    run.stop().await.1.unwrap();
}

#[tokio::test]
async fn missing_credentials_exhaust_the_initial_connect() {
    let (transport, engine) = ChannelTransport::pair();
    let client = StreamClient::new(
        Arc::new(transport),
        Arc::new(EnvAuthProvider::new("JUNCTION_TEST_STREAM_TOKEN_UNSET")),
        config(),
    );
    let run = Running::start(client, engine);

    let (_client, outcome) = within("the client to give up", run.task).await.unwrap();
    let err = outcome.unwrap_err();
    assert!(matches!(err, StreamError::ReconnectExhausted { .. }));
    assert!(err.to_string().contains("JUNCTION_TEST_STREAM_TOKEN_UNSET"));
    assert_eq!(run.engine.connections(), 0);
}

#[tokio::test]
async fn exhausted_initial_connect_is_final() {
    let (transport, engine) = ChannelTransport::pair();
    engine.refuse_next(usize::MAX);
    let client = StreamClient::new(
        Arc::new(transport),
        Arc::new(StaticAuthProvider::new("tok")),
        config(),
    );
    let run = Running::start(client, engine);

    let (mut client, outcome) = within("the client to give up", run.task).await.unwrap();
    assert!(matches!(outcome, Err(StreamError::ReconnectExhausted { .. })));
    assert_eq!(client.state(), SessionState::Disconnected);

    let dispatcher = Dispatcher::new(
        Arc::new(registry()),
        client.result_sink(),
        DispatchConfig::default(),
    );
    let again = within("the second run", client.run(&dispatcher, &CancellationToken::new())).await;
    assert!(matches!(again, Err(StreamError::IllegalTransition { .. })));
    assert_eq!(run.engine.connections(), 0);
}

#[tokio::test]
async fn shutdown_while_reconnecting_ends_cleanly() {
    let mut run = start();
    let conn = run.accept().await;
    run.engine.refuse_next(usize::MAX);
    conn.fail();

    tokio::time::sleep(Duration::from_millis(15)).await;

    let (client, outcome) = run.stop().await;
    outcome.unwrap();
    assert_eq!(client.state(), SessionState::Disconnected);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shutdown
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn drain_delivers_in_flight_results_before_closing() {
    let mut run = start();
    let mut conn = run.accept().await;

    for i in 1..=3 {
        conn.send_event(processor_event(&i.to_string(), &format!("e{i}"), "quick", json!({})));
    }
    run.wait_in_flight(3).await;

    let (client, outcome) = run.stop().await;
    outcome.unwrap();

    let mut delivered = Vec::new();
    while let Some(frame) = within("frames", conn.recv()).await {
        if let ClientFrame::Result(result) = frame {
            assert!(result.is_ok());
            delivered.push(result.event_id.to_string());
        }
    }
    delivered.sort();
    assert_eq!(delivered, vec!["1", "2", "3"]);
    assert!(client.outbox().is_empty());
}

#[tokio::test]
async fn drain_timeout_reports_shutdown_errors() {
    let mut run = start();
    let mut conn = run.accept().await;

    conn.send_event(processor_event("1", "e1", "stuck", json!({})));
    run.wait_in_flight(1).await;

    let started = Instant::now();
    run.stop().await.1.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    let result = within("the forced result", conn.recv_result()).await.unwrap();
    assert_eq!(result.error_code, Some(ErrorCode::ShutdownError));
    assert!(within("close", conn.recv()).await.is_none());
}

#[tokio::test]
async fn run_after_shutdown_is_rejected() {
    let mut run = start();
    let _conn = run.accept().await;
    let (mut client, outcome) = run.stop().await;
    outcome.unwrap();

    assert!(matches!(
        client.connect().await,
        Err(StreamError::IllegalTransition { .. })
    ));
}
