use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Number of log lines requested and retained per call.
pub const DEFAULT_TAIL_LINES: usize = 100;

/// One container log line as streamed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogEntry {
    /// The backend closes a finite stream with an empty `last: true` entry.
    pub fn is_end_marker(&self) -> bool {
        self.last == Some(true) && self.content.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct StreamLine {
    #[serde(default)]
    result: Option<LogEntry>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Error)]
pub enum LogStreamError {
    #[error("Invalid log stream line: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Log stream failed: {0}")]
    Backend(String),
}

/// Accumulates a newline-delimited `{ "result": LogEntry }` stream into a
/// finite list, stopping once `limit` entries have been collected.
///
/// Chunks may split lines anywhere; incomplete trailing bytes are held until
/// the next chunk or [`LogCollector::finish`].
#[derive(Debug)]
pub struct LogCollector {
    pending: Vec<u8>,
    entries: Vec<LogEntry>,
    limit: usize,
}

impl LogCollector {
    pub fn new(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            entries: Vec::new(),
            limit,
        }
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.limit
    }

    /// Feeds one chunk. Returns `Ok(true)` once the limit is reached, after
    /// which the caller should stop reading.
    pub fn push(&mut self, chunk: &[u8]) -> Result<bool, LogStreamError> {
        if self.is_full() {
            return Ok(true);
        }
        self.pending.extend_from_slice(chunk);
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.accept_line(&line)?;
            if self.is_full() {
                self.pending.clear();
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Consumes the collector, decoding any unterminated final line.
    pub fn finish(mut self) -> Result<Vec<LogEntry>, LogStreamError> {
        if !self.is_full() && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.accept_line(&rest)?;
        }
        Ok(self.entries)
    }

    fn accept_line(&mut self, line: &[u8]) -> Result<(), LogStreamError> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return Ok(());
        }
        let record: StreamLine = serde_json::from_slice(line)?;
        if let Some(error) = record.error.filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(LogStreamError::Backend(message));
        }
        if let Some(entry) = record.result {
            if !entry.is_end_marker() {
                self.entries.push(entry);
            }
        }
        Ok(())
    }
}
