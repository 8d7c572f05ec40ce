//! Bounded, queryable log of engine operations.
//!
//! Every entry is also emitted as a `tracing` event, so the same record
//! reaches the process log and the operator console.

use fanpay_sdk::objects::{
    LogEntryResponse, LogQuery, LogSummaryResponse, Severity, SeverityCounts,
};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Ids an entry can be correlated by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Correlation {
    pub payer_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
    pub payout_id: Option<Uuid>,
    pub failover_id: Option<Uuid>,
}

impl Correlation {
    fn matches(&self, id: Uuid) -> bool {
        [
            self.payer_id,
            self.creator_id,
            self.transaction_id,
            self.payout_id,
            self.failover_id,
        ]
        .contains(&Some(id))
    }
}

/// An entry to be recorded.
#[derive(Debug, Clone)]
pub struct LogEvent {
    severity: Severity,
    operation: &'static str,
    message: String,
    correlation: Correlation,
    metadata: Map<String, Value>,
}

impl LogEvent {
    pub fn new(severity: Severity, operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            operation,
            message: message.into(),
            correlation: Correlation::default(),
            metadata: Map::new(),
        }
    }

    pub fn debug(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Debug, operation, message)
    }

    pub fn info(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, operation, message)
    }

    pub fn warn(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, operation, message)
    }

    pub fn error(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, operation, message)
    }

    pub fn critical(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, operation, message)
    }

    pub fn payer(mut self, id: Uuid) -> Self {
        self.correlation.payer_id = Some(id);
        self
    }

    pub fn creator(mut self, id: impl Into<Option<Uuid>>) -> Self {
        self.correlation.creator_id = id.into();
        self
    }

    pub fn transaction(mut self, id: Uuid) -> Self {
        self.correlation.transaction_id = Some(id);
        self
    }

    pub fn payout(mut self, id: Uuid) -> Self {
        self.correlation.payout_id = Some(id);
        self
    }

    pub fn failover(mut self, id: Uuid) -> Self {
        self.correlation.failover_id = Some(id);
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub sequence: u64,
    pub severity: Severity,
    pub operation: &'static str,
    pub message: String,
    pub correlation: Correlation,
    pub metadata: Map<String, Value>,
    pub timestamp: OffsetDateTime,
}

impl From<LogEntry> for LogEntryResponse {
    fn from(e: LogEntry) -> Self {
        Self {
            sequence: e.sequence,
            severity: e.severity,
            operation: e.operation.to_string(),
            message: e.message,
            payer_id: e.correlation.payer_id,
            creator_id: e.correlation.creator_id,
            transaction_id: e.correlation.transaction_id,
            payout_id: e.correlation.payout_id,
            failover_id: e.correlation.failover_id,
            metadata: Value::Object(e.metadata),
            timestamp: e.timestamp.unix_timestamp(),
        }
    }
}

/// Query filter. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub severity: Option<Severity>,
    pub min_severity: Option<Severity>,
    pub operation: Option<String>,
    pub correlation_id: Option<Uuid>,
    pub since: Option<OffsetDateTime>,
    pub until: Option<OffsetDateTime>,
    pub limit: Option<u32>,
}

impl LogFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        self.severity.is_none_or(|s| entry.severity == s)
            && self.min_severity.is_none_or(|s| entry.severity >= s)
            && self
                .operation
                .as_deref()
                .is_none_or(|op| entry.operation == op)
            && self
                .correlation_id
                .is_none_or(|id| entry.correlation.matches(id))
            && self.since.is_none_or(|t| entry.timestamp >= t)
            && self.until.is_none_or(|t| entry.timestamp <= t)
    }
}

impl From<LogQuery> for LogFilter {
    fn from(q: LogQuery) -> Self {
        let ts = |s: i64| OffsetDateTime::from_unix_timestamp(s).ok();
        Self {
            severity: q.severity,
            min_severity: q.min_severity,
            operation: q.operation,
            correlation_id: q.correlation_id,
            since: q.since.and_then(ts),
            until: q.until.and_then(ts),
            limit: q.limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSummary {
    pub total: u64,
    pub capacity: u64,
    pub by_severity: SeverityCounts,
    pub errors_last_24h: u64,
    pub critical_last_24h: u64,
    pub oldest_at: Option<OffsetDateTime>,
}

impl From<LogSummary> for LogSummaryResponse {
    fn from(s: LogSummary) -> Self {
        Self {
            total: s.total,
            capacity: s.capacity,
            by_severity: s.by_severity,
            errors_last_24h: s.errors_last_24h,
            critical_last_24h: s.critical_last_24h,
            oldest_at: s.oldest_at.map(OffsetDateTime::unix_timestamp),
        }
    }
}

#[derive(Debug, Default)]
struct Buffer {
    entries: VecDeque<LogEntry>,
    next_sequence: u64,
}

#[derive(Debug)]
pub struct OperationLog {
    capacity: usize,
    query_cap: u32,
    buffer: Mutex<Buffer>,
}

impl OperationLog {
    pub fn new(capacity: usize, query_cap: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            query_cap: query_cap.max(1),
            buffer: Mutex::new(Buffer::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an entry, dropping the oldest one at capacity.
    pub fn record(&self, event: LogEvent) -> u64 {
        emit(&event);
        let mut buffer = self.lock();
        let sequence = buffer.next_sequence;
        buffer.next_sequence += 1;
        if buffer.entries.len() >= self.capacity {
            buffer.entries.pop_front();
        }
        buffer.entries.push_back(LogEntry {
            sequence,
            severity: event.severity,
            operation: event.operation,
            message: event.message,
            correlation: event.correlation,
            metadata: event.metadata,
            timestamp: OffsetDateTime::now_utc(),
        });
        sequence
    }

    /// Matching entries, newest first.
    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        let limit = fanpay_sdk::objects::clamp_limit(filter.limit, self.query_cap) as usize;
        self.lock()
            .entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> LogSummary {
        let buffer = self.lock();
        let cutoff = OffsetDateTime::now_utc() - Duration::hours(24);
        let mut counts = SeverityCounts {
            debug: 0,
            info: 0,
            warn: 0,
            error: 0,
            critical: 0,
        };
        let mut errors_last_24h = 0;
        let mut critical_last_24h = 0;
        for entry in &buffer.entries {
            match entry.severity {
                Severity::Debug => counts.debug += 1,
                Severity::Info => counts.info += 1,
                Severity::Warn => counts.warn += 1,
                Severity::Error => counts.error += 1,
                Severity::Critical => counts.critical += 1,
            }
            if entry.timestamp >= cutoff {
                match entry.severity {
                    Severity::Error => errors_last_24h += 1,
                    Severity::Critical => critical_last_24h += 1,
                    _ => {}
                }
            }
        }
        LogSummary {
            total: buffer.entries.len() as u64,
            capacity: self.capacity as u64,
            by_severity: counts,
            errors_last_24h,
            critical_last_24h,
            oldest_at: buffer.entries.front().map(|e| e.timestamp),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn emit(event: &LogEvent) {
    let c = &event.correlation;
    let metadata = Value::Object(event.metadata.clone());
    macro_rules! emit_at {
        ($level:ident $(, $extra:ident = $val:expr)?) => {
            tracing::$level!(
                operation = event.operation,
                payer_id = ?c.payer_id,
                creator_id = ?c.creator_id,
                transaction_id = ?c.transaction_id,
                payout_id = ?c.payout_id,
                failover_id = ?c.failover_id,
                %metadata,
                $($extra = $val,)?
                "{}",
                event.message
            )
        };
    }
    match event.severity {
        Severity::Debug => emit_at!(debug),
        Severity::Info => emit_at!(info),
        Severity::Warn => emit_at!(warn),
        Severity::Error => emit_at!(error),
        Severity::Critical => emit_at!(error, critical = true),
    }
}
