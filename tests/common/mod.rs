//! Shared utilities for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use gated_pipeline::audit::{AuditSink, MemoryLedger};
use gated_pipeline::gate::{DecisionContext, DecisionEngine, DecisionError};
use gated_pipeline::pipeline::{EffectError, EffectReport, GatedOperation, OperationError};
use gated_pipeline::resilience::{AttemptResult, Backoff, BackoffPolicy, RecordingSleeper, RetryExecutor};
use gated_pipeline::validation::{FieldKind, FieldRule, OperationRequest, RequestSchema, ValidatedRequest};

/// Where the scripted operation misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    AcquireTransient,
    AcquireFatal,
    PanicInAttempt,
    PanicInExecute,
    ExecuteFails,
    HealthCheckFails,
    ReleaseFails,
}

/// Call counters shared with the test body.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub acquires: Arc<AtomicU32>,
    pub releases: Arc<AtomicU32>,
    pub attempts: Arc<AtomicU32>,
    pub executes: Arc<AtomicU32>,
}

impl Counters {
    pub fn acquires(&self) -> u32 {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> u32 {
        self.executes.load(Ordering::SeqCst)
    }
}

/// An artifact-producing operation driven by a script of attempt results.
///
/// Once the script runs out every attempt succeeds. A request whose
/// `behavior` field is `"fatal"` or `"transient"` fails that way on every
/// attempt regardless of the script.
pub struct ScriptedOperation {
    script: Mutex<VecDeque<AttemptResult<String>>>,
    fault: Fault,
    pub counters: Counters,
}

impl ScriptedOperation {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fault: Fault::None,
            counters: Counters::default(),
        }
    }

    /// Fail the first `n` attempts transiently.
    pub fn failing_first(self, n: usize) -> Self {
        self.with_script((0..n).map(|i| AttemptResult::TransientFailure(format!("connection reset #{}", i + 1))))
    }

    pub fn with_script(self, script: impl IntoIterator<Item = AttemptResult<String>>) -> Self {
        self.script.lock().unwrap().extend(script);
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }
}

#[async_trait]
impl GatedOperation for ScriptedOperation {
    type Resource = String;
    type Payload = String;

    fn name(&self) -> &str {
        "mint"
    }

    fn schema(&self) -> RequestSchema {
        RequestSchema::new("mint")
            .field(FieldRule::required("artist_id", FieldKind::Text))
            .field(FieldRule::required("user_id", FieldKind::Text))
    }

    async fn acquire(&self) -> Result<String, OperationError> {
        self.counters.acquires.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::AcquireTransient => Err(OperationError::Transient("session pool exhausted".into())),
            Fault::AcquireFatal => Err(OperationError::Fatal("credentials rejected".into())),
            _ => Ok("session".to_string()),
        }
    }

    async fn release(&self, _resource: String) -> Result<(), OperationError> {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        if self.fault == Fault::ReleaseFails {
            return Err(OperationError::Fatal("stop failed".into()));
        }
        Ok(())
    }

    async fn attempt(&self, _resource: &String, request: &ValidatedRequest<'_>) -> AttemptResult<String> {
        let n = self.counters.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fault == Fault::PanicInAttempt {
            panic!("attempt {} blew up", n);
        }
        match request.text("behavior") {
            Some("fatal") => return AttemptResult::FatalFailure("artifact rejected".into()),
            Some("transient") => return AttemptResult::TransientFailure("service unavailable".into()),
            _ => {}
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| AttemptResult::Success(format!("artifact-{}", request.id())))
    }

    fn decision_context(&self, request: &ValidatedRequest<'_>, payload: &String) -> DecisionContext {
        let mut fields = BTreeMap::new();
        for name in ["artist_id", "user_id"] {
            if let Some(value) = request.field(name) {
                fields.insert(name.to_string(), value.clone());
            }
        }
        DecisionContext {
            operation: "mint".into(),
            operation_id: request.id().to_string(),
            fields,
            payload: json!({ "artifact": payload }),
        }
    }

    async fn execute(
        &self,
        _resource: &String,
        _request: &ValidatedRequest<'_>,
        payload: String,
    ) -> Result<EffectReport, EffectError> {
        self.counters.executes.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::PanicInExecute => panic!("executor crashed"),
            Fault::ExecuteFails => Err(EffectError::before_effect("transaction rejected")),
            Fault::HealthCheckFails => Err(EffectError::after_effect("post-mint health check failed")),
            _ => Ok(EffectReport::new(json!({ "artifact": payload }))),
        }
    }
}

/// Decision engine returning a fixed verdict and counting calls.
#[derive(Clone)]
pub struct CountingEngine {
    verdict: Option<String>,
    pub calls: Arc<AtomicU32>,
    pub seen: Arc<Mutex<Vec<DecisionContext>>>,
}

impl CountingEngine {
    pub fn new(verdict: &str) -> Self {
        Self {
            verdict: Some(verdict.to_string()),
            calls: Arc::new(AtomicU32::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An engine that is always unreachable.
    pub fn unavailable() -> Self {
        Self {
            verdict: None,
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionEngine for CountingEngine {
    async fn process_decision(&self, context: &DecisionContext) -> Result<String, DecisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(context.clone());
        self.verdict
            .clone()
            .ok_or_else(|| DecisionError::Transport("connection refused".into()))
    }
}

/// Retry executor matching production defaults but never sleeping.
pub fn instant_retry(max_attempts: u32) -> (RetryExecutor, RecordingSleeper) {
    let sleeper = RecordingSleeper::new();
    let executor = RetryExecutor::new(max_attempts, Backoff::new(BackoffPolicy::fixed(Duration::from_secs(2))))
        .unwrap()
        .with_sleeper(sleeper.clone());
    (executor, sleeper)
}

pub fn memory_audit() -> (AuditSink, MemoryLedger) {
    let ledger = MemoryLedger::new();
    (AuditSink::new(Arc::new(ledger.clone())), ledger)
}

pub fn mint_request(id: &str, artist_id: &str, user_id: &str) -> OperationRequest {
    OperationRequest::new(id)
        .with_field("artist_id", artist_id)
        .with_field("user_id", user_id)
}

/// A request seen by the programmable backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// The handler receives every request and answers with (status, body).
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<Mutex<Vec<RecordedRequest>>>)
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let log = recorded.clone();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        log.lock().unwrap().push(request.clone());
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, recorded)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body_end = buf.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();
    Some(RecordedRequest { method, path, body })
}
