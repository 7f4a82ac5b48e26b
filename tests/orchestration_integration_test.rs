//! Integration test for the request orchestrator
//!
//! Drives complete generation sequences against a scripted inference client,
//! with tokio's clock paused so retry delays elapse instantly.

use anyhow::Result;
use async_trait::async_trait;
use avagen::config::RetryConfig;
use avagen::observability::Logger;
use avagen::orchestration::{
    GenerationOutcome, Notice, OrchestrationError, RequestOrchestrator, SequencePhase,
    SubmitDisposition,
};
use avagen::provider::{GenerationError, GenerationRequest, GenerationResult, InferenceClient, RawResponse};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// Mock inference service for testing
struct MockClient {
    responses: Arc<Mutex<Vec<GenerationResult<RawResponse>>>>,
    requests: Arc<Mutex<Vec<(Instant, String)>>>,
}

impl MockClient {
    fn new(responses: Vec<GenerationResult<RawResponse>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    fn inputs(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, input)| input.clone())
            .collect()
    }
}

#[async_trait]
impl InferenceClient for MockClient {
    async fn send(&self, request: &GenerationRequest) -> GenerationResult<RawResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((Instant::now(), request.input_text.clone()));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(loading_response(1.0))
        } else {
            responses.remove(0)
        }
    }

    fn endpoint(&self) -> &str {
        "mock://generate"
    }
}

fn loading_response(estimated_time: f64) -> RawResponse {
    RawResponse::json(503, &json!({ "error": "Model is loading", "estimated_time": estimated_time }))
}

fn loading(estimated_time: f64) -> GenerationResult<RawResponse> {
    Ok(loading_response(estimated_time))
}

fn image(url: &str) -> GenerationResult<RawResponse> {
    Ok(RawResponse::json(200, &json!({ "image": url })))
}

#[tokio::test(start_paused = true)]
async fn test_immediate_success() -> Result<()> {
    let client = MockClient::new(vec![image("url1")]);
    let orchestrator = RequestOrchestrator::new(client.clone());

    let report = orchestrator.run("jagonzalr astronaut").await?;

    assert_eq!(
        report.outcome,
        GenerationOutcome::Success {
            image_ref: "url1".to_string(),
            echoed_prompt: "jagonzalr astronaut".to_string(),
        }
    );
    assert_eq!(report.attempts, 1);
    assert_eq!(client.call_count(), 1);

    let snapshot = orchestrator.snapshot().await;
    assert_eq!(snapshot.phase, SequencePhase::Terminal);
    assert!(!snapshot.is_generating);
    assert_eq!(snapshot.current_image.as_deref(), Some("url1"));
    assert_eq!(snapshot.echoed_prompt.as_deref(), Some("jagonzalr astronaut"));
    assert_eq!(snapshot.input, "");
    assert_eq!(snapshot.retry.remaining_retries, 20);
    assert_eq!(snapshot.retry.pending_delay, None);
    assert_eq!(snapshot.last_notice, None);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_one_retry_after_suggested_delay() -> Result<()> {
    let client = MockClient::new(vec![loading(5.0), image("url2")]);
    let orchestrator = RequestOrchestrator::new(client.clone());

    let handle = orchestrator
        .submit("p")
        .await?
        .into_handle()
        .expect("sequence should start");

    tokio::time::sleep(Duration::from_secs(1)).await;
    let waiting = orchestrator.snapshot().await;
    assert_eq!(waiting.phase, SequencePhase::AwaitingRetryDelay);
    assert!(waiting.is_generating);
    assert_eq!(waiting.retry.remaining_retries, 20);
    assert_eq!(waiting.retry.pending_delay, Some(Duration::from_secs(5)));
    assert_eq!(client.call_count(), 1);

    let report = handle.finished().await.expect("sequence should finish");
    assert!(report.is_success());
    assert_eq!(report.attempts, 2);
    assert_eq!(report.retries_used, 1);
    assert_eq!(report.remaining_retries, 19);

    let times = client.call_times();
    assert_eq!(times.len(), 2);
    let gap = times[1] - times[0];
    assert!(gap >= Duration::from_secs(5));
    assert!(gap < Duration::from_secs(6));

    // Retries re-send the prompt captured at submission
    assert_eq!(client.inputs(), vec!["p".to_string(), "p".to_string()]);

    let snapshot = orchestrator.snapshot().await;
    assert_eq!(snapshot.current_image.as_deref(), Some("url2"));
    assert!(snapshot.retry.is_initial());
    assert!(!snapshot.is_generating);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhausted() -> Result<()> {
    let client = MockClient::new((0..30).map(|_| loading(1.0)).collect());
    let orchestrator = RequestOrchestrator::new(client.clone());

    let report = orchestrator.run("p").await?;

    assert_eq!(report.outcome, GenerationOutcome::BudgetExhausted);
    assert_eq!(report.attempts, 21);
    assert_eq!(report.retries_used, 20);
    assert_eq!(report.remaining_retries, 0);
    assert_eq!(client.call_count(), 21);

    let snapshot = orchestrator.snapshot().await;
    assert_eq!(snapshot.phase, SequencePhase::Terminal);
    assert!(!snapshot.is_generating);
    assert_eq!(snapshot.retry.remaining_retries, 20);
    assert_eq!(snapshot.retry.pending_delay, None);
    assert_eq!(
        snapshot.last_notice,
        Some(Notice::BudgetExhausted { max_retries: 20 })
    );
    assert_eq!(snapshot.current_image, None);
    assert_eq!(
        snapshot.last_notice.map(|notice| notice.message()).as_deref(),
        Some("Model still loading after 20 retries. Try request again in 5 minutes.")
    );

    // No call is made after exhaustion
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(client.call_count(), 21);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_terminal_error_from_service() -> Result<()> {
    let client = MockClient::new(vec![Ok(RawResponse::json(
        400,
        &json!({ "error": "Input is too long" }),
    ))]);
    let orchestrator = RequestOrchestrator::new(client.clone());

    let report = orchestrator.run("p").await?;

    assert_eq!(
        report.outcome,
        GenerationOutcome::Failure {
            message: "Input is too long".to_string()
        }
    );
    assert_eq!(client.call_count(), 1);

    let snapshot = orchestrator.snapshot().await;
    assert!(!snapshot.is_generating);
    assert!(snapshot.retry.is_initial());
    assert_eq!(snapshot.input, "p");
    assert_eq!(
        snapshot.last_notice,
        Some(Notice::Failure {
            message: "Input is too long".to_string()
        })
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_malformed_response_is_terminal() -> Result<()> {
    let client = MockClient::new(vec![Ok(RawResponse::new(503, "<html>busy</html>"))]);
    let orchestrator = RequestOrchestrator::new(client.clone());

    let report = orchestrator.run("p").await?;

    assert!(matches!(report.outcome, GenerationOutcome::Failure { .. }));
    assert_eq!(report.attempts, 1);
    assert_eq!(client.call_count(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_mid_sequence() -> Result<()> {
    let client = MockClient::new(vec![
        loading(2.0),
        Err(GenerationError::Network("connection reset".to_string())),
    ]);
    let orchestrator = RequestOrchestrator::new(client.clone());

    let report = orchestrator.run("p").await?;

    assert_eq!(
        report.outcome,
        GenerationOutcome::Failure {
            message: "Network error: connection reset".to_string()
        }
    );
    assert_eq!(report.attempts, 2);
    assert!(orchestrator.snapshot().await.retry.is_initial());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_submit_while_in_flight_is_ignored() -> Result<()> {
    let client = MockClient::new(vec![loading(10.0), image("url1")]);
    let orchestrator = RequestOrchestrator::new(client.clone());

    let handle = orchestrator
        .submit("first")
        .await?
        .into_handle()
        .expect("sequence should start");
    tokio::time::sleep(Duration::from_secs(1)).await;

    let second = orchestrator.submit("second").await?;
    assert!(matches!(second, SubmitDisposition::Ignored));
    assert!(matches!(
        orchestrator.run("third").await,
        Err(OrchestrationError::SequenceInFlight)
    ));
    assert_eq!(client.call_count(), 1);

    let report = handle.finished().await.expect("sequence should finish");
    assert!(report.is_success());
    assert_eq!(client.inputs(), vec!["first".to_string(), "first".to_string()]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancel_pending_retry() -> Result<()> {
    let client = MockClient::new(vec![loading(60.0), image("url1")]);
    let orchestrator = RequestOrchestrator::new(client.clone());

    assert!(!orchestrator.cancel().await);

    let handle = orchestrator
        .submit("p")
        .await?
        .into_handle()
        .expect("sequence should start");
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(orchestrator.cancel().await);

    let snapshot = orchestrator.snapshot().await;
    assert_eq!(snapshot.phase, SequencePhase::Terminal);
    assert!(!snapshot.is_generating);
    assert!(snapshot.retry.is_initial());
    assert_eq!(snapshot.last_notice, Some(Notice::Cancelled));

    let report = handle.finished().await.expect("sequence should finish");
    assert_eq!(report.outcome, GenerationOutcome::Cancelled);
    assert_eq!(report.attempts, 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(client.call_count(), 1);
    assert!(!orchestrator.cancel().await);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_new_sequence_after_terminal_state() -> Result<()> {
    let client = MockClient::new(vec![
        Ok(RawResponse::json(500, &json!({ "error": "boom" }))),
        image("url1"),
    ]);
    let orchestrator = RequestOrchestrator::new(client.clone());

    let first = orchestrator.run("p").await?;
    assert!(!first.is_success());

    let second = orchestrator.run("p again").await?;
    assert!(second.is_success());
    assert_ne!(first.sequence_id, second.sequence_id);
    assert_eq!(second.attempts, 1);

    let snapshot = orchestrator.snapshot().await;
    assert_eq!(snapshot.last_notice, None);
    assert_eq!(snapshot.sequence_id.as_deref(), Some(second.sequence_id.as_str()));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_independent_sessions() -> Result<()> {
    let first_client = MockClient::new(vec![loading(30.0), image("url1")]);
    let second_client = MockClient::new(vec![image("url2")]);
    let first = RequestOrchestrator::new(first_client.clone());
    let second = RequestOrchestrator::new(second_client.clone());

    let handle = first
        .submit("a")
        .await?
        .into_handle()
        .expect("sequence should start");
    tokio::time::sleep(Duration::from_secs(1)).await;

    let report = second.run("b").await?;
    assert!(report.is_success());
    assert!(first.snapshot().await.is_generating);

    assert!(handle.finished().await.expect("sequence should finish").is_success());
    assert_eq!(first_client.call_count(), 2);
    assert_eq!(second_client.call_count(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_custom_budget_and_delay_cap() -> Result<()> {
    let client = MockClient::new(vec![loading(3_600.0), loading(3_600.0), loading(3_600.0)]);
    let orchestrator = RequestOrchestrator::builder(client.clone())
        .retry_config(RetryConfig {
            max_retries: 2,
            max_retry_delay_seconds: 10.0,
            ..RetryConfig::default()
        })
        .build();

    let started = Instant::now();
    let report = orchestrator.run("p").await?;

    assert_eq!(report.outcome, GenerationOutcome::BudgetExhausted);
    assert_eq!(report.attempts, 3);
    assert!(started.elapsed() < Duration::from_secs(21));
    assert_eq!(
        orchestrator.snapshot().await.last_notice,
        Some(Notice::BudgetExhausted { max_retries: 2 })
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_observe_transitions() -> Result<()> {
    let client = MockClient::new(vec![loading(1.0), loading(1.0), image("url1")]);
    let orchestrator = RequestOrchestrator::new(client.clone());
    let mut updates = orchestrator.subscribe();
    let mut was_generating = updates.borrow_and_update().is_generating;
    assert!(!was_generating);

    let handle = orchestrator
        .submit("p")
        .await?
        .into_handle()
        .expect("sequence should start");

    let mut phases = Vec::new();
    let mut rising_edges = 0;
    let mut falling_edges = 0;
    let mut budgets = Vec::new();
    loop {
        updates.changed().await?;
        let snapshot = updates.borrow_and_update().clone();

        if phases.last() != Some(&snapshot.phase) {
            phases.push(snapshot.phase);
        }
        match (was_generating, snapshot.is_generating) {
            (false, true) => rising_edges += 1,
            (true, false) => falling_edges += 1,
            _ => {}
        }
        was_generating = snapshot.is_generating;
        if snapshot.is_generating {
            budgets.push(snapshot.retry.remaining_retries);
        }

        if snapshot.phase == SequencePhase::Terminal {
            break;
        }
    }
    handle.finished().await.expect("sequence should finish");

    assert_eq!(rising_edges, 1);
    assert_eq!(falling_edges, 1);
    assert!(budgets.windows(2).all(|pair| pair[1] <= pair[0]));
    assert!(budgets.contains(&20));
    assert!(budgets.contains(&19));
    assert!(phases.contains(&SequencePhase::AwaitingRetryDelay));
    assert_eq!(phases.last(), Some(&SequencePhase::Terminal));

    // Nothing changes after the terminal update
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!updates.has_changed()?);
    assert_eq!(client.call_count(), 3);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sequence_log_written() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("sequence.md");
    let logger = Logger::new(Some(log_path.as_path()), Some("INFO"))?;

    let client = MockClient::new(vec![loading(5.0), image("url1")]);
    let orchestrator = RequestOrchestrator::builder(client)
        .logger(Arc::new(logger))
        .build();

    orchestrator.run("jagonzalr astronaut").await?;

    let content = std::fs::read_to_string(&log_path)?;
    assert!(content.contains("# Avatar Generation Log"));
    assert!(content.contains("**Prompt:** jagonzalr astronaut"));
    assert!(content.contains("Trying again in 5.0 seconds (20 retries left)."));
    assert!(content.contains("**Image:** url1"));
    assert!(content.contains("**Attempts:** 2"));

    Ok(())
}
