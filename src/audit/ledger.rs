//! Append-only ledgers backing the audit sink.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::audit::record::AuditRecord;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Durable, append-only store. Records are never updated or deleted.
#[async_trait]
pub trait AuditLedger: Send + Sync {
    /// Record a performed side effect.
    async fn log_transaction(&self, category: &str, record: &AuditRecord) -> Result<(), LedgerError>;

    /// Record any terminal outcome.
    async fn store_audit(&self, category: &str, record: &AuditRecord) -> Result<(), LedgerError>;
}

/// One JSON line per record, one file per category and kind:
/// `<dir>/<category>.audit.jsonl` and `<dir>/<category>.transactions.jsonl`.
#[derive(Debug)]
pub struct JsonlLedger {
    directory: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlLedger {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn audit_path(&self, category: &str) -> PathBuf {
        self.directory.join(format!("{}.audit.jsonl", sanitize(category)))
    }

    pub fn transactions_path(&self, category: &str) -> PathBuf {
        self.directory.join(format!("{}.transactions.jsonl", sanitize(category)))
    }

    async fn append(&self, path: PathBuf, record: &AuditRecord) -> Result<(), LedgerError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let io_err = |source| LedgerError::Io {
            path: path.clone(),
            source,
        };

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.directory).await.map_err(io_err)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(&line).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }
}

fn sanitize(category: &str) -> String {
    category
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl AuditLedger for JsonlLedger {
    async fn log_transaction(&self, category: &str, record: &AuditRecord) -> Result<(), LedgerError> {
        self.append(self.transactions_path(category), record).await
    }

    async fn store_audit(&self, category: &str, record: &AuditRecord) -> Result<(), LedgerError> {
        self.append(self.audit_path(category), record).await
    }
}

/// In-process ledger, keyed by category.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    audits: Arc<DashMap<String, Vec<AuditRecord>>>,
    transactions: Arc<DashMap<String, Vec<AuditRecord>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger whose writes fail until [`MemoryLedger::set_failing`] clears it.
    pub fn failing() -> Self {
        let ledger = Self::default();
        ledger.set_failing(true);
        ledger
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn audits(&self, category: &str) -> Vec<AuditRecord> {
        self.audits.get(category).map(|r| r.value().clone()).unwrap_or_default()
    }

    pub fn transactions(&self, category: &str) -> Vec<AuditRecord> {
        self.transactions.get(category).map(|r| r.value().clone()).unwrap_or_default()
    }

    /// Audit records across every category.
    pub fn all_audits(&self) -> Vec<AuditRecord> {
        self.audits.iter().flat_map(|entry| entry.value().clone()).collect()
    }

    fn check(&self) -> Result<(), LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(LedgerError::Unavailable("memory ledger set to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AuditLedger for MemoryLedger {
    async fn log_transaction(&self, category: &str, record: &AuditRecord) -> Result<(), LedgerError> {
        self.check()?;
        self.transactions.entry(category.to_string()).or_default().push(record.clone());
        Ok(())
    }

    async fn store_audit(&self, category: &str, record: &AuditRecord) -> Result<(), LedgerError> {
        self.check()?;
        self.audits.entry(category.to_string()).or_default().push(record.clone());
        Ok(())
    }
}
