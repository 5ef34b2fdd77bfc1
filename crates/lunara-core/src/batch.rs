//! Partial-success results for per-entry batch operations.
//!
//! Batch decrypts (store reads, reshare packaging, package opening) never
//! abort on a single bad entry. They collect successes and failures here and
//! the call site decides whether failures are dropped or surfaced.

use std::fmt;

use crate::error::Error;

/// Why one entry of a batch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInfo {
    /// Record id or entry id of the failed item.
    pub key: String,
    /// Rendered error message.
    pub reason: String,
    /// Whether the failure came from the DecryptionFailed family.
    pub decryption: bool,
}

impl FailureInfo {
    pub fn new(key: impl Into<String>, error: &Error) -> Self {
        Self {
            key: key.into(),
            reason: error.to_string(),
            decryption: error.is_decryption_failure(),
        }
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

/// Successes and failures of a batch operation, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<FailureInfo>,
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchResult<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&mut self, value: T) {
        self.succeeded.push(value);
    }

    pub fn push_err(&mut self, key: impl Into<String>, error: &Error) {
        self.failed.push(FailureInfo::new(key, error));
    }

    /// Record the outcome of one entry.
    pub fn record(&mut self, key: impl Into<String>, outcome: Result<T, Error>) {
        match outcome {
            Ok(value) => self.push_ok(value),
            Err(e) => self.push_err(key, &e),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Drop policy: keep the successes, discard failures.
    pub fn into_succeeded(self) -> Vec<T> {
        self.succeeded
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> BatchResult<U> {
        BatchResult {
            succeeded: self.succeeded.into_iter().map(f).collect(),
            failed: self.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_splits_outcomes() {
        let mut batch = BatchResult::new();
        batch.record("a", Ok(1));
        batch.record("b", Err(Error::Decryption("bad tag".into())));
        batch.record("c", Ok(3));

        assert_eq!(batch.succeeded, vec![1, 3]);
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].key, "b");
        assert!(batch.failed[0].decryption);
        assert_eq!(batch.total(), 3);
        assert!(!batch.is_complete());
    }

    #[test]
    fn test_into_succeeded_drops_failures() {
        let mut batch: BatchResult<&str> = BatchResult::new();
        batch.push_err("x", &Error::Storage("io".into()));
        batch.push_ok("y");
        assert_eq!(batch.into_succeeded(), vec!["y"]);
    }

    #[test]
    fn test_map_keeps_failures() {
        let mut batch = BatchResult::new();
        batch.push_ok(2);
        batch.push_err("k", &Error::Storage("io".into()));
        let mapped = batch.map(|v| v * 10);
        assert_eq!(mapped.succeeded, vec![20]);
        assert_eq!(mapped.failed.len(), 1);
        assert!(!mapped.failed[0].decryption);
    }
}
