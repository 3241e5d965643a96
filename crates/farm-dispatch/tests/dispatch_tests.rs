//! Dispatch client against in-memory and TCP engines

use farm_dispatch::{
    DispatchAction, DispatchClient, DispatchConfig, DispatchError, DispatchStep, EngineError,
    InMemoryEngine, TcpEngine,
};
use farm_graph::{Command, Instance, Job, Task};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn sample_job() -> Job {
    Job::new("Render shot", 10.0).with_child(
        Task::new("Render Job")
            .serial()
            .with_child(Task::new("Frame 1").with_command(Command::new(["prman", "f1.rib"]))),
    )
}

fn config(timeout_secs: u64) -> DispatchConfig {
    DispatchConfig {
        timeout_secs,
        ..DispatchConfig::default()
    }
}

#[tokio::test]
async fn submit_runs_every_step() {
    let engine = Arc::new(InMemoryEngine::new());
    let client = DispatchClient::new(engine.clone(), config(5));

    let outcome = client
        .run(sample_job().with_owner("120988"), DispatchAction::Submit, None)
        .await
        .unwrap();

    assert!(outcome.validated);
    let jobs = engine.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(Some(&jobs[0].id), outcome.job_id.as_ref());
    assert_eq!(jobs[0].owner, "120988");
    assert_eq!(jobs[0].graph, outcome.built.graph);
}

#[tokio::test]
async fn configured_owner_used_when_job_has_none() {
    let engine = Arc::new(InMemoryEngine::new());
    let client = DispatchClient::new(engine.clone(), config(5));
    client.run(sample_job(), DispatchAction::Submit, None).await.unwrap();
    assert_eq!(engine.jobs()[0].owner, "pixar");
}

#[tokio::test]
async fn build_only_never_touches_engine() {
    let engine = Arc::new(InMemoryEngine::new().failing_validate("unused"));
    let client = DispatchClient::new(engine.clone(), config(5));

    let outcome = client.run(sample_job(), DispatchAction::Build, None).await.unwrap();
    assert!(!outcome.validated);
    assert!(outcome.job_id.is_none());
    assert_eq!(outcome.built.graph.task_count, 2);
}

#[tokio::test]
async fn validation_failure_stops_before_submit() {
    let engine = Arc::new(InMemoryEngine::new().failing_validate("unknown service"));
    let client = DispatchClient::new(engine.clone(), config(5));

    let err = client.run(sample_job(), DispatchAction::Submit, None).await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::StepFailed {
            step: DispatchStep::Validate,
            source: EngineError::Rejected("unknown service".into()),
        }
    );
    assert!(!err.is_recoverable());
    assert!(engine.jobs().is_empty());
}

#[tokio::test]
async fn invalid_graph_fails_at_build() {
    let client = DispatchClient::new(Arc::new(InMemoryEngine::new()), config(5));
    let job = Job::new("broken", 1.0).with_child(Instance::new("nowhere"));

    let err = client.run(job, DispatchAction::Submit, None).await.unwrap_err();
    assert_eq!(err.step(), DispatchStep::Build);
}

#[tokio::test(start_paused = true)]
async fn deadline_covers_the_whole_run() {
    let engine = Arc::new(InMemoryEngine::new().with_latency(Duration::from_secs(40)));
    let client = DispatchClient::new(engine.clone(), config(60));

    // Validate fits in the deadline, submit does not.
    let err = client.run(sample_job(), DispatchAction::Submit, None).await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::DeadlineExceeded {
            step: DispatchStep::Submit
        }
    );
    assert!(err.is_recoverable());
    assert!(engine.jobs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_reports_the_step() {
    let engine = Arc::new(InMemoryEngine::new().with_latency(Duration::from_secs(10)));
    let client = DispatchClient::new(engine, config(60));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = client
        .run(sample_job(), DispatchAction::Validate, Some(cancel))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::Cancelled {
            step: DispatchStep::Validate
        }
    );
}

#[tokio::test]
async fn already_cancelled_stops_at_build() {
    let client = DispatchClient::new(Arc::new(InMemoryEngine::new()), config(5));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client
        .run(sample_job(), DispatchAction::Build, Some(cancel))
        .await
        .unwrap_err();
    assert_eq!(err.step(), DispatchStep::Build);
}

/// Serve `replies.len()` connections, capturing each request header and body
async fn fake_engine(replies: Vec<&'static str>) -> (u16, tokio::task::JoinHandle<Vec<(String, String)>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for reply in replies {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut reader = BufReader::new(read);
            let mut header = String::new();
            reader.read_line(&mut header).await.unwrap();
            let len: usize = header.trim().rsplit(' ').next().unwrap().parse().unwrap();
            let mut body = vec![0; len];
            reader.read_exact(&mut body).await.unwrap();
            write.write_all(reply.as_bytes()).await.unwrap();
            seen.push((header.trim().to_string(), String::from_utf8(body).unwrap()));
        }
        seen
    });
    (port, handle)
}

#[tokio::test]
async fn tcp_engine_validates_and_spools() {
    let (port, server) = fake_engine(vec!["OK\n", "OK 4711\n"]).await;
    let client = DispatchClient::new(Arc::new(TcpEngine::new("127.0.0.1", port)), config(5));

    let outcome = client
        .run(sample_job().with_owner("120988"), DispatchAction::Submit, None)
        .await
        .unwrap();
    assert_eq!(outcome.job_id.unwrap().0, "4711");

    let seen = server.await.unwrap();
    let text = &outcome.built.graph.text;
    assert_eq!(seen[0], (format!("VALIDATE {}", text.len()), text.clone()));
    assert_eq!(seen[1], (format!("SPOOL 120988 {}", text.len()), text.clone()));
}

#[tokio::test]
async fn tcp_engine_rejection() {
    let (port, _server) = fake_engine(vec!["ERR no such service\n"]).await;
    let client = DispatchClient::new(Arc::new(TcpEngine::new("127.0.0.1", port)), config(5));

    let err = client.run(sample_job(), DispatchAction::Validate, None).await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::StepFailed {
            step: DispatchStep::Validate,
            source: EngineError::Rejected("no such service".into()),
        }
    );
}

#[tokio::test]
async fn tcp_engine_unreachable() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = DispatchClient::new(Arc::new(TcpEngine::new("127.0.0.1", port)), config(5));

    let err = client.run(sample_job(), DispatchAction::Validate, None).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::StepFailed {
            step: DispatchStep::Validate,
            source: EngineError::Connect { .. },
        }
    ));
    assert!(err.is_recoverable());
}
