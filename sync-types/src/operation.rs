//! Queued mutation intents.
//!
//! A [`SyncOperation`] is what the offline queue persists: one
//! create/update/delete aimed at a single remote endpoint, together with
//! its retry bookkeeping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{OperationId, SyncError};

/// Retry budget given to operations when none is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// HTTP method used to replay an operation against its endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Create a resource.
    Post,
    /// Replace/update a resource.
    Put,
    /// Delete a resource.
    Delete,
}

impl HttpMethod {
    /// Canonical upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The kind of mutation an operation carries.
///
/// Persisted as a lower-case string. A stored value outside the known set
/// is preserved as [`OperationKind::Unknown`] instead of failing the whole
/// queue decode; the manager treats it as a contract fault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    /// Create a new resource (POST).
    Create,
    /// Update an existing resource (PUT).
    Update,
    /// Delete a resource (DELETE).
    Delete,
    /// A kind this build does not understand.
    Unknown(String),
}

impl OperationKind {
    /// HTTP method for this kind, `None` for unknown kinds.
    pub fn method(&self) -> Option<HttpMethod> {
        match self {
            OperationKind::Create => Some(HttpMethod::Post),
            OperationKind::Update => Some(HttpMethod::Put),
            OperationKind::Delete => Some(HttpMethod::Delete),
            OperationKind::Unknown(_) => None,
        }
    }

    /// Wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Unknown(name) => name,
        }
    }
}

impl From<String> for OperationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "create" => OperationKind::Create,
            "update" => OperationKind::Update,
            "delete" => OperationKind::Delete,
            _ => OperationKind::Unknown(value),
        }
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl FromStr for OperationKind {
    type Err = SyncError;

    /// Strict parse used for user input: unknown names are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match OperationKind::from(s.to_ascii_lowercase()) {
            OperationKind::Unknown(name) => Err(SyncError::UnknownKind(name)),
            kind => Ok(kind),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Dispatch priority. Variants are declared in dispatch order, so the
/// derived `Ord` sorts `High < Medium < Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Dispatched first.
    High,
    /// Dispatched after all high-priority work.
    Medium,
    /// Dispatched last.
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl FromStr for Priority {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(SyncError::UnknownPriority(other.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.pad(name)
    }
}

/// A queued mutation waiting to reach the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// Unique identifier assigned at enqueue time.
    pub id: OperationId,
    /// Mutation kind (selects the HTTP method).
    pub kind: OperationKind,
    /// Remote path, e.g. `/teachers/42`.
    pub endpoint: String,
    /// Request body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Milliseconds since the Unix epoch when the operation was queued.
    pub enqueued_at: u64,
    /// Failed dispatches so far.
    #[serde(default)]
    pub attempts: u32,
    /// Failed dispatches allowed before the operation is dropped.
    pub max_attempts: u32,
    /// Dispatch priority.
    #[serde(default)]
    pub priority: Priority,
}

impl SyncOperation {
    /// Create a fresh operation with a new id and zero attempts.
    pub fn new(
        kind: OperationKind,
        endpoint: impl Into<String>,
        payload: Option<serde_json::Value>,
        priority: Priority,
        enqueued_at: u64,
    ) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            endpoint: endpoint.into(),
            payload,
            enqueued_at,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            priority,
        }
    }

    /// Set the retry budget. Values below one are clamped to one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Whether the retry budget is used up.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_op(kind: OperationKind) -> SyncOperation {
        SyncOperation::new(kind, "/teachers", Some(json!({"name": "Ada"})), Priority::High, 1_000)
    }

    #[test]
    fn kinds_map_to_methods() {
        assert_eq!(OperationKind::Create.method(), Some(HttpMethod::Post));
        assert_eq!(OperationKind::Update.method(), Some(HttpMethod::Put));
        assert_eq!(OperationKind::Delete.method(), Some(HttpMethod::Delete));
        assert_eq!(OperationKind::Unknown("patch".into()).method(), None);
    }

    #[test]
    fn persisted_shape_is_camel_case() {
        let op = make_op(OperationKind::Create);
        let value = serde_json::to_value(&op).unwrap();

        assert_eq!(value["kind"], "create");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["enqueuedAt"], 1_000);
        assert_eq!(value["maxAttempts"], DEFAULT_MAX_ATTEMPTS);
        assert_eq!(value["attempts"], 0);
    }

    #[test]
    fn unknown_kind_survives_decode() {
        let op = make_op(OperationKind::Create);
        let mut value = serde_json::to_value(&op).unwrap();
        value["kind"] = json!("merge");

        let decoded: SyncOperation = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.kind, OperationKind::Unknown("merge".into()));
        assert_eq!(decoded.kind.to_string(), "merge");
    }

    #[test]
    fn strict_kind_parse_rejects_unknown() {
        assert_eq!("Create".parse::<OperationKind>().unwrap(), OperationKind::Create);
        assert!(matches!(
            "merge".parse::<OperationKind>(),
            Err(SyncError::UnknownKind(_))
        ));
    }

    #[test]
    fn priority_orders_high_first() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn missing_payload_is_omitted() {
        let op = SyncOperation::new(OperationKind::Delete, "/users/1", None, Priority::Low, 5);
        let value = serde_json::to_value(&op).unwrap();
        assert!(value.get("payload").is_none());
    }

    #[test]
    fn max_attempts_is_at_least_one() {
        let op = make_op(OperationKind::Update).with_max_attempts(0);
        assert_eq!(op.max_attempts, 1);
    }

    #[test]
    fn exhaustion_tracks_attempts() {
        let mut op = make_op(OperationKind::Update).with_max_attempts(2);
        assert!(!op.is_exhausted());
        op.attempts = 2;
        assert!(op.is_exhausted());
    }
}
