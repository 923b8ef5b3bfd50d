//! Usage - Ledger record types
//!
//! A `UsageEvent` is one immutable record of token consumption for a single
//! generation request. `UsageAggregate` is derived from events on demand and
//! never persisted.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A usage event as stored in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Store-assigned identifier
    pub id: i64,
    /// Opaque user identifier
    pub user_id: String,
    /// Model the tokens were consumed on
    pub model_name: String,
    /// Prompt-side token count
    pub input_tokens: i64,
    /// Completion-side token count
    pub output_tokens: i64,
    /// Store-assigned write time
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied de-duplication token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl UsageEvent {
    /// Sum of input and output tokens, `None` if it does not fit in `i64`
    #[must_use]
    pub fn total_tokens(&self) -> Option<i64> {
        self.input_tokens.checked_add(self.output_tokens)
    }
}

/// Per-model token totals for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageAggregate {
    /// User the totals belong to
    pub user_id: String,
    /// Model the totals belong to
    pub model_name: String,
    /// Sum of `input_tokens` over the user's events for this model
    pub input_tokens: i64,
    /// Sum of `output_tokens` over the user's events for this model
    pub output_tokens: i64,
    /// Number of events folded into the sums
    pub request_count: i64,
}

/// A usage record awaiting persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUsage {
    /// Opaque user identifier, non-empty
    pub user_id: String,
    /// Model identifier, non-empty
    pub model_name: String,
    /// Prompt-side token count, non-negative
    pub input_tokens: i64,
    /// Completion-side token count, non-negative
    pub output_tokens: i64,
    /// Optional de-duplication token
    pub idempotency_key: Option<String>,
}

impl NewUsage {
    /// Create a new usage record
    pub fn new(
        user_id: impl Into<String>,
        model_name: impl Into<String>,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            model_name: model_name.into(),
            input_tokens,
            output_tokens,
            idempotency_key: None,
        }
    }

    /// Attach an idempotency key
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Check the input constraints shared by every write path
    pub fn validate(&self) -> Result<()> {
        require_identifier("user_id", &self.user_id)?;
        require_identifier("model_name", &self.model_name)?;

        if self.input_tokens < 0 {
            return Err(Error::InvalidArgument(format!(
                "input_tokens must be non-negative, got {}",
                self.input_tokens
            )));
        }
        if self.output_tokens < 0 {
            return Err(Error::InvalidArgument(format!(
                "output_tokens must be non-negative, got {}",
                self.output_tokens
            )));
        }
        if let Some(key) = &self.idempotency_key {
            require_identifier("idempotency_key", key)?;
        }

        Ok(())
    }

    /// Accept a stored event found under this record's idempotency key.
    ///
    /// A key replayed with a different user, model or token counts is
    /// rejected instead of returning someone else's event.
    pub(crate) fn accept_replay(&self, stored: UsageEvent) -> Result<UsageEvent> {
        let same_payload = stored.user_id == self.user_id
            && stored.model_name == self.model_name
            && stored.input_tokens == self.input_tokens
            && stored.output_tokens == self.output_tokens;

        if !same_payload {
            return Err(Error::InvalidArgument(format!(
                "idempotency key {} reused with a different payload",
                self.idempotency_key.as_deref().unwrap_or_default()
            )));
        }
        Ok(stored)
    }

    /// Turn into a stored event once the store has assigned id and timestamp
    pub(crate) fn into_event(self, id: i64, timestamp: DateTime<Utc>) -> UsageEvent {
        UsageEvent {
            id,
            user_id: self.user_id,
            model_name: self.model_name,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            timestamp,
            idempotency_key: self.idempotency_key,
        }
    }
}

/// Reject a `recent` limit that is not positive
pub(crate) fn require_positive_limit(limit: i64) -> Result<()> {
    if limit <= 0 {
        return Err(Error::InvalidArgument(format!(
            "limit must be positive, got {limit}"
        )));
    }
    Ok(())
}

/// Reject empty or whitespace-only identifiers
pub(crate) fn require_identifier(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usage() {
        let usage = NewUsage::new("u1", "gpt-4", 10, 50);
        assert!(usage.validate().is_ok());
        assert!(usage.idempotency_key.is_none());
    }

    #[test]
    fn test_zero_tokens_are_valid() {
        assert!(NewUsage::new("u1", "gpt-4", 0, 0).validate().is_ok());
    }

    #[test]
    fn test_empty_user_rejected() {
        let err = NewUsage::new("", "gpt-4", 5, 5).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("user_id")));

        let err = NewUsage::new("   ", "gpt-4", 5, 5).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_model_rejected() {
        let err = NewUsage::new("u1", "", 5, 5).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("model_name")));
    }

    #[test]
    fn test_negative_tokens_rejected() {
        let err = NewUsage::new("u1", "gpt-4", -1, 5).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("input_tokens")));

        let err = NewUsage::new("u1", "gpt-4", 5, -1).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("output_tokens")));
    }

    #[test]
    fn test_blank_idempotency_key_rejected() {
        let usage = NewUsage::new("u1", "gpt-4", 1, 1).with_idempotency_key("");
        assert!(matches!(usage.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_into_event_keeps_fields() {
        let ts = Utc::now();
        let event = NewUsage::new("u1", "gpt-3", 2, 3)
            .with_idempotency_key("req-1")
            .into_event(7, ts);

        assert_eq!(event.id, 7);
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.model_name, "gpt-3");
        assert_eq!(event.total_tokens(), Some(5));
        assert_eq!(event.timestamp, ts);
        assert_eq!(event.idempotency_key.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_total_tokens_overflow_is_none() {
        let event = NewUsage::new("u1", "gpt-4", i64::MAX, 1).into_event(1, Utc::now());
        assert_eq!(event.total_tokens(), None);
    }

    #[test]
    fn test_replay_with_same_payload_is_accepted() {
        let usage = NewUsage::new("A", "gpt-4", 10, 50).with_idempotency_key("k");
        let stored = usage.clone().into_event(1, Utc::now());
        assert_eq!(usage.accept_replay(stored.clone()).unwrap(), stored);
    }

    #[test]
    fn test_replay_with_other_payload_is_rejected() {
        let stored = NewUsage::new("A", "gpt-4", 10, 50)
            .with_idempotency_key("k")
            .into_event(1, Utc::now());

        let other_user = NewUsage::new("B", "gpt-4", 10, 50).with_idempotency_key("k");
        let err = other_user.accept_replay(stored.clone()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("reused")));

        let other_tokens = NewUsage::new("A", "gpt-4", 10, 51).with_idempotency_key("k");
        assert!(other_tokens.accept_replay(stored).is_err());
    }

    #[test]
    fn test_non_positive_limit_rejected() {
        assert!(require_positive_limit(1).is_ok());
        assert!(matches!(require_positive_limit(0), Err(Error::InvalidArgument(_))));
        assert!(matches!(require_positive_limit(-1), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_event_serialization_skips_missing_key() {
        let event = NewUsage::new("u1", "gpt-4", 1, 2).into_event(1, Utc::now());
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"model_name\":\"gpt-4\""));
        assert!(!json.contains("idempotency_key"));
    }
}
