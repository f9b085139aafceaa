//! Shared contract error metadata types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured metadata for surfaced contract violations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Stable identifier that maps to a runbook entry.
    pub code: String,
    /// Human-readable description of the issue.
    pub summary: String,
    /// Optional remediation guidance that can be surfaced to users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    /// Arbitrary structured data that helps downstream tooling render rich errors.
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: BTreeMap::new(),
        }
    }

    /// Adds a fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds context data.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Contract error codes.
pub mod codes {
    /// A required envelope field is missing or null.
    pub const MISSING_ENVELOPE: &str = "HANDOFF-001-MISSING_ENVELOPE";
    /// The payload is not a JSON object.
    pub const NOT_AN_OBJECT: &str = "HANDOFF-002-NOT_AN_OBJECT";
}
