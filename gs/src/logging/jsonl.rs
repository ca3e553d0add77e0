//! JSONL log sink
//!
//! Appends every event and exception that reaches it as one JSON line, for
//! history and offline inspection of dispatch traffic.

use std::error::Error;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use eyre::Context;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::chain::LogHandler;

/// Kind of a logged record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRecordKind {
    Event,
    Exception,
}

/// One line of the JSONL log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub kind: LogRecordKind,
    pub source: String,
    /// Event name, or the error message for exceptions
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,
}

/// Log handler appending records to a JSONL file
pub struct JsonlLogger {
    identity: String,
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlLogger {
    /// Open (or create) the log file in append mode
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "JsonlLogger::open: called");

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("Failed to create log directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(format!("Failed to open event log {}", path.display()))?;

        Ok(Self {
            identity: format!("JsonlLogger:{}", path.display()),
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, record: &LogRecord) -> eyre::Result<()> {
        let json = serde_json::to_string(record)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    fn append(&self, kind: LogRecordKind, source: &str, name: String, properties: &Value) {
        let record = LogRecord {
            timestamp: Utc::now(),
            kind,
            source: source.to_string(),
            name,
            properties: properties.clone(),
        };
        if let Err(e) = self.write_record(&record) {
            error!(path = ?self.path, error = %e, "JsonlLogger: failed to write record");
        }
    }
}

impl LogHandler for JsonlLogger {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn process_event(&self, source: &str, event_name: &str, properties: &Value) {
        self.append(LogRecordKind::Event, source, event_name.to_string(), properties);
    }

    fn process_exception(&self, source: &str, err: &(dyn Error + 'static), properties: &Value) {
        self.append(LogRecordKind::Exception, source, err.to_string(), properties);
    }
}

/// Read back every record of a JSONL log; unparsable lines are skipped
pub fn read_records(path: impl AsRef<Path>) -> eyre::Result<Vec<LogRecord>> {
    let path = path.as_ref();
    debug!(?path, "read_records: reading log file");

    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let mut records = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(line, error = %e, "read_records: failed to parse line");
            }
        }
    }

    debug!(count = records.len(), "read_records: loaded records");
    Ok(records)
}
