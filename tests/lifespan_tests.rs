#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use anyhow::Context;
use std::sync::{Arc, Mutex};
use tramline::dispatcher::DispatchError;
use tramline::router::{Lifespan, LifespanState, Router};
use tramline::server::{Channel, MemoryChannel, Message, Scope};

type Journal = Arc<Mutex<Vec<&'static str>>>;

fn record(journal: &Journal, entry: &'static str) -> impl Fn() -> anyhow::Result<()> + Send + Sync {
    let journal = Arc::clone(journal);
    move || {
        journal.lock().unwrap().push(entry);
        Ok(())
    }
}

fn handshake(router: &Router) -> (Result<(), DispatchError>, Vec<Message>) {
    let (mut app, mut transport) = MemoryChannel::pair();
    transport.send(Message::LifecycleStart).unwrap();
    transport.send(Message::LifecycleStop).unwrap();
    let outcome = router.dispatch(Scope::lifecycle(), &mut app);
    (outcome, transport.drain())
}

#[test]
fn test_handlers_run_in_registration_order() {
    let journal: Journal = Arc::default();
    let router = Router::builder()
        .on_startup(record(&journal, "open db"))
        .on_startup(record(&journal, "warm cache"))
        .on_shutdown(record(&journal, "flush"))
        .on_shutdown(record(&journal, "close db"))
        .build();
    assert_eq!(router.lifespan().state(), LifespanState::Created);

    let (outcome, messages) = handshake(&router);
    outcome.unwrap();
    assert_eq!(
        messages,
        vec![Message::LifecycleStartComplete, Message::LifecycleStopComplete]
    );
    assert_eq!(
        *journal.lock().unwrap(),
        vec!["open db", "warm cache", "flush", "close db"]
    );
    assert_eq!(router.lifespan().state(), LifespanState::Stopped);
}

#[test]
fn test_empty_lifespan_completes_handshake() {
    let router = Router::builder().build();
    let (outcome, messages) = handshake(&router);
    outcome.unwrap();
    assert_eq!(
        messages,
        vec![Message::LifecycleStartComplete, Message::LifecycleStopComplete]
    );
}

#[test]
fn test_startup_failure_stops_remaining_handlers() {
    let journal: Journal = Arc::default();
    let router = Router::builder()
        .on_startup(record(&journal, "first"))
        .on_startup(|| {
            Err::<(), _>(anyhow::anyhow!("connection refused")).context("database unreachable")
        })
        .on_startup(record(&journal, "never"))
        .on_shutdown(record(&journal, "shutdown"))
        .build();

    let (outcome, messages) = handshake(&router);
    match outcome {
        Err(DispatchError::StartupFailed { detail }) => {
            assert_eq!(detail, "database unreachable: connection refused");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        messages,
        vec![Message::LifecycleStartFailed {
            detail: "database unreachable: connection refused".to_string()
        }]
    );
    assert_eq!(*journal.lock().unwrap(), vec!["first"]);
    assert_eq!(router.lifespan().state(), LifespanState::Failed);
}

#[test]
fn test_shutdown_failures_do_not_skip_later_handlers() {
    let journal: Journal = Arc::default();
    let router = Router::builder()
        .on_shutdown(|| anyhow::bail!("flush failed"))
        .on_shutdown(record(&journal, "close db"))
        .on_shutdown(|| anyhow::bail!("socket busy"))
        .build();

    let (outcome, messages) = handshake(&router);
    match outcome {
        Err(DispatchError::ShutdownFailed { failures }) => {
            assert_eq!(failures, vec!["flush failed", "socket busy"]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        messages,
        vec![Message::LifecycleStartComplete, Message::LifecycleStopComplete]
    );
    assert_eq!(*journal.lock().unwrap(), vec!["close db"]);
    assert_eq!(router.lifespan().state(), LifespanState::Stopped);
}

#[test]
fn test_unexpected_first_message_is_a_protocol_error() {
    let router = Router::builder().build();
    let (mut app, mut transport) = MemoryChannel::pair();
    transport.send(Message::LifecycleStop).unwrap();

    let outcome = router.dispatch(Scope::lifecycle(), &mut app);
    assert!(matches!(
        outcome,
        Err(DispatchError::Protocol { expected: "lifecycle.start", .. })
    ));
    assert!(transport.drain().is_empty());
}

#[test]
fn test_state_is_running_between_start_and_stop() {
    let lifespan = Lifespan::new().on_startup(|| Ok(()));
    let (mut app, mut transport) = MemoryChannel::pair();

    lifespan.startup(&mut app).unwrap();
    assert_eq!(lifespan.state(), LifespanState::Running);
    assert_eq!(transport.drain(), vec![Message::LifecycleStartComplete]);

    lifespan.shutdown(&mut app).unwrap();
    assert_eq!(lifespan.state(), LifespanState::Stopped);
    assert_eq!(transport.drain(), vec![Message::LifecycleStopComplete]);
}

#[test]
fn test_prebuilt_lifespan_is_shared_by_clones() {
    let lifespan = Lifespan::new().on_startup(|| Ok(()));
    let router = Router::builder().lifespan(lifespan.clone()).build();
    let (outcome, _) = handshake(&router);
    outcome.unwrap();
    assert_eq!(lifespan.state(), LifespanState::Stopped);
}
