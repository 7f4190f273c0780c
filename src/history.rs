//! Request/response log kept per bridge for diagnostics.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

/// Direction of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MessageType {
    /// A request body on its way to the bridge (`null` for GET/DELETE).
    Send,
    /// A decoded reply.
    Receive,
}

/// One logged message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub msg_type: MessageType,
    /// `METHOD path` of the request
    pub request: String,
    pub message: Value,
    pub at: DateTime<Utc>,
}

/// A request that produced no usable reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRequest {
    pub request: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// The most recent exchanges with a bridge, oldest first.
///
/// Only the last `max_entries` messages are kept; failures are counted for
/// the lifetime of the history.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    entries: VecDeque<HistoryEntry>,
    max_entries: usize,
    failures: usize,
    last_failure: Option<FailedRequest>,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHistory {
    pub const DEFAULT_MAX_ENTRIES: usize = 100;

    pub fn new() -> Self {
        Self::with_max_entries(Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        MessageHistory {
            entries: VecDeque::with_capacity(max_entries.min(Self::DEFAULT_MAX_ENTRIES)),
            max_entries,
            failures: 0,
            last_failure: None,
        }
    }

    pub fn record(&mut self, msg_type: MessageType, request: &str, message: &Value) {
        if self.max_entries == 0 {
            return;
        }
        while self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            msg_type,
            request: request.to_string(),
            message: message.clone(),
            at: Utc::now(),
        });
    }

    pub fn record_error(&mut self, request: &str, error: &str) {
        self.failures += 1;
        self.last_failure = Some(FailedRequest {
            request: request.to_string(),
            error: error.to_string(),
            at: Utc::now(),
        });
    }

    /// Message of the most recent failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_failure.as_ref().map(|f| f.error.as_str())
    }

    pub fn last_failure(&self) -> Option<&FailedRequest> {
        self.last_failure.as_ref()
    }

    /// The newest retained message of `msg_type` for a `METHOD path` label.
    pub fn latest(&self, msg_type: MessageType, request: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.msg_type == msg_type && e.request == request)
            .map(|e| &e.message)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.failures = 0;
        self.last_failure = None;
    }

    pub fn summary(&self) -> HistorySummary {
        let count = |t: MessageType| self.entries.iter().filter(|e| e.msg_type == t).count();
        HistorySummary {
            sent: count(MessageType::Send),
            received: count(MessageType::Receive),
            failures: self.failures,
            last_error: self.last_error().map(String::from),
        }
    }
}

/// Counts over a [`MessageHistory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    /// Retained requests
    pub sent: usize,
    /// Retained replies
    pub received: usize,
    /// Failed requests since creation or the last clear
    pub failures: usize,
    pub last_error: Option<String>,
}
