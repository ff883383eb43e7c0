//! End-to-end tests of the Boardroom flows against a scripted backend.
//!
//! Validates:
//! - The board meeting summary and its cost
//! - Join failure when an advisor never answers
//! - Memory is extended only by successful asks
//! - The email flow rewrites, guards and falls back
//! - Poem streams restart and report interruptions
//! - Configuration files drive the wiring

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

mod common;

use std::error::Error;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;

use boardroom::boardroom_core::{BoardroomConfig, SessionId};
use boardroom::boardroom_orchestrator::{self as orchestrator, WorkerError};
use boardroom::{Boardroom, EmailRequest, EmailSender, Question};
use common::{ScriptedBackend, fast_config};

fn board(config: &BoardroomConfig, backend: &Arc<ScriptedBackend>) -> Boardroom {
    let backend: Arc<dyn boardroom::boardroom_backend::CompletionBackend> = backend.clone();
    Boardroom::new(config, backend).unwrap()
}

fn advisors() -> ScriptedBackend {
    ScriptedBackend::new()
        .reply_when("financial perspective", "Cut costs")
        .reply_when("technical perspective", "Ship it")
        .reply_when("business perspective", "Grow")
}

#[tokio::test]
async fn test_meeting_summary_and_cost() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(advisors());
    let boardroom = board(&fast_config(0), &backend);
    let session = SessionId::new("meeting")?;

    let summary = boardroom.run("Open an office in Zurich", &session).await?;

    assert_eq!(
        summary,
        "Topic: Open an office in Zurich\nCFO Input: Cut costs\nCTO Input: Ship it\nCEO Input: Grow"
    );
    assert_eq!(backend.calls(), 3);
    assert_eq!(boardroom.cost(&session)?.to_string(), "$1.2");
    Ok(())
}

#[tokio::test]
async fn test_meeting_retries_a_flaky_advisor() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(advisors().fail_when("financial perspective", 1));
    let boardroom = board(&fast_config(2), &backend);
    let session = SessionId::new("flaky")?;

    let summary = boardroom.run("Hire two engineers", &session).await?;

    assert!(summary.contains("CFO Input: Cut costs"));
    assert_eq!(backend.calls(), 4);
    Ok(())
}

#[tokio::test]
async fn test_meeting_join_failure_names_the_advisor() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(advisors().fail_when("technical perspective", usize::MAX));
    let boardroom = board(&fast_config(1), &backend);
    let session = SessionId::new("join")?;

    let err = boardroom.run("Rewrite everything", &session).await.unwrap_err();

    match err {
        boardroom::Error::Orchestrator(e @ orchestrator::Error::JoinFailed { .. }) => {
            assert_eq!(e.failed_workers(), vec!["Chief Technical Officer"]);
        }
        other => panic!("expected a join failure, got {other}"),
    }
    // the two advisors that answered are still charged
    assert_eq!(boardroom.cost(&session)?.to_string(), "$0.8");
    Ok(())
}

#[tokio::test]
async fn test_ask_with_memory_carries_history() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(ScriptedBackend::new());
    let boardroom = board(&fast_config(0), &backend);
    let session = SessionId::new("memory")?;
    let question = |text: &str| Question {
        system_message: "You are a helpful assistant".to_string(),
        text: text.to_string(),
    };

    boardroom.ask_with_memory(&session, &question("My name is Ada")).await?;
    let answer = boardroom.ask_with_memory(&session, &question("What is my name?")).await?;

    assert_eq!(answer, "echo: What is my name?");
    let requests = backend.requests();
    let contents: Vec<&str> = requests[1]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(
        contents,
        vec![
            "You are a helpful assistant",
            "My name is Ada",
            "echo: My name is Ada",
            "What is my name?",
        ]
    );
    assert_eq!(boardroom.memory().snapshot(&session).len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_ask_without_memory_leaves_window_untouched() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(ScriptedBackend::new());
    let boardroom = board(&fast_config(0), &backend);
    let session = SessionId::new("stateless")?;
    let question = Question {
        system_message: "You are a helpful assistant".to_string(),
        text: "Hello".to_string(),
    };

    assert_eq!(boardroom.ask(&session, &question).await?, "echo: Hello");
    assert!(boardroom.memory().snapshot(&session).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_ask_is_not_remembered() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(ScriptedBackend::new().fail_when("helpful", usize::MAX));
    let boardroom = board(&fast_config(1), &backend);
    let session = SessionId::new("failed")?;
    let question = Question {
        system_message: "You are a helpful assistant".to_string(),
        text: "Hello".to_string(),
    };

    let err = boardroom.ask_with_memory(&session, &question).await.unwrap_err();

    assert!(matches!(
        err,
        boardroom::Error::Orchestrator(orchestrator::Error::Exhausted { attempts: 2, .. })
    ));
    assert!(boardroom.memory().snapshot(&session).is_empty());
    assert!(boardroom.cost(&session)?.is_zero());
    Ok(())
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<EmailRequest>>,
    fail: bool,
}

impl RecordingSender {
    fn sent(&self) -> Vec<EmailRequest> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, email: &EmailRequest) -> Result<String, WorkerError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.clone());
        if self.fail {
            Err(WorkerError::failed("mail server unavailable"))
        } else {
            Ok("Email sent successfully".to_string())
        }
    }
}

fn mail_board(config: &BoardroomConfig, backend: ScriptedBackend, sender: &Arc<RecordingSender>) -> Boardroom {
    let sender: Arc<dyn EmailSender> = sender.clone();
    Boardroom::with_email_sender(config, Arc::new(backend), sender).unwrap()
}

#[tokio::test]
async fn test_email_body_is_rewritten_before_sending() -> Result<(), Box<dyn Error>> {
    let backend = ScriptedBackend::new().reply_when("clown", "Why did the budget cross the road?");
    let sender = Arc::new(RecordingSender::default());
    let boardroom = mail_board(&fast_config(0), backend, &sender);
    let session = SessionId::new("mail")?;

    let outcome = boardroom
        .send_email(&session, EmailRequest::new("cfo@example.com", "Budget", "Numbers attached."))
        .await?;

    assert_eq!(outcome, "Email sent successfully");
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, "Why did the budget cross the road?");
    assert_eq!(sent[0].subject, "Budget");
    // the rewrite is charged to the session
    assert_eq!(boardroom.cost(&session)?.to_string(), "$0.4");
    Ok(())
}

#[tokio::test]
async fn test_email_guardrail_rejection_falls_back() -> Result<(), Box<dyn Error>> {
    let mut config = fast_config(1);
    config.mail.rewrite_body = false;
    let sender = Arc::new(RecordingSender::default());
    let boardroom = mail_board(&config, ScriptedBackend::new(), &sender);
    let session = SessionId::new("guarded")?;

    let outcome = boardroom
        .send_email(&session, EmailRequest::new("not-an-address", "Hi", "Body"))
        .await?;

    assert_eq!(
        outcome,
        "FALLBACK: Failed to send email to not-an-address with subject Hi and body Body"
    );
    assert!(sender.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_email_sender_failure_retries_then_falls_back() -> Result<(), Box<dyn Error>> {
    let mut config = fast_config(1);
    config.mail.rewrite_body = false;
    let sender = Arc::new(RecordingSender {
        fail: true,
        ..RecordingSender::default()
    });
    let boardroom = mail_board(&config, ScriptedBackend::new(), &sender);
    let session = SessionId::new("bounced")?;

    let outcome = boardroom
        .send_email(&session, EmailRequest::new("ceo@example.com", "Hi", "Body"))
        .await?;

    assert!(outcome.starts_with("FALLBACK: Failed to send email to ceo@example.com"));
    assert_eq!(sender.sent().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_poem_streams_and_restarts() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(
        ScriptedBackend::new().reply_when("professional poet", "Roses are red violets are blue"),
    );
    let boardroom = board(&fast_config(0), &backend);
    let session = SessionId::new("poem")?;

    let poem = boardroom.write_poem(&session, "flowers", 2);
    assert_eq!(backend.calls(), 0);

    for _ in 0..2 {
        let chunks: Vec<String> = poem.stream().map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks.concat(), "Roses are red violets are blue");
    }

    assert_eq!(backend.calls(), 2);
    assert_eq!(boardroom.cost(&session)?.to_string(), "$0.8");
    let requests = backend.requests();
    assert_eq!(
        requests[0].messages[1].content,
        "Write a poem about flowers.\nThe poem should be 2 lines long."
    );
    Ok(())
}

#[tokio::test]
async fn test_poem_cut_off_is_an_interruption() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(
        ScriptedBackend::new()
            .reply_when("professional poet", "one two three four")
            .cut_streams_after(2),
    );
    let boardroom = board(&fast_config(0), &backend);
    let session = SessionId::new("cut")?;

    let items: Vec<_> = boardroom.write_poem(&session, "numbers", 4).stream().collect().await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_deref().ok(), Some("one "));
    assert_eq!(items[1].as_deref().ok(), Some("two "));
    assert!(matches!(
        items[2],
        Err(orchestrator::Error::StreamInterrupted { delivered: 2, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_config_file_drives_memory_capacity() -> Result<(), Box<dyn Error>> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        "[memory]\ncapacity = 2\n\n[resilience]\nmax_retries = 0\ndelay_ms = 1\njitter_ms = 0"
    )?;

    let config = BoardroomConfig::from_file(file.path())?;
    assert_eq!(config.memory.capacity, 2);

    let backend = Arc::new(ScriptedBackend::new());
    let boardroom = board(&config, &backend);
    let session = SessionId::new("small")?;
    let question = Question {
        system_message: "You are a helpful assistant".to_string(),
        text: "Hello".to_string(),
    };

    boardroom.ask_with_memory(&session, &question).await?;
    boardroom.ask_with_memory(&session, &question).await?;

    let window = boardroom.memory().snapshot(&session);
    assert_eq!(window.len(), 2);
    assert_eq!(window[0].content, "Hello");
    assert_eq!(window[1].content, "echo: Hello");
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_is_rejected() -> Result<(), Box<dyn Error>> {
    let config = BoardroomConfig::from_toml_str("[memory]\ncapacity = 0\n")?;
    let backend: Arc<dyn boardroom::boardroom_backend::CompletionBackend> = Arc::new(ScriptedBackend::new());

    assert!(matches!(
        Boardroom::new(&config, backend),
        Err(boardroom::Error::Core(_))
    ));
    Ok(())
}
