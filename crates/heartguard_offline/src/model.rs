//! Records persisted by the durable queue and values surfaced to the UI.

use crate::error::OfflineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for a queued mutation.
///
/// Assigned at enqueue time and never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(Uuid);

impl MutationId {
    /// Creates a new random mutation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MutationId({})", self.0)
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MutationId {
    type Err = OfflineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| OfflineError::Codec(format!("invalid mutation id {s:?}: {e}")))
    }
}

/// HTTP method of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Create a resource.
    Post,
    /// Replace a resource.
    Put,
    /// Delete a resource.
    Delete,
}

impl HttpMethod {
    /// Returns the method name as sent on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = OfflineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(OfflineError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// A mutation waiting to be applied remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    /// Unique ID assigned at enqueue time.
    pub id: MutationId,
    /// API endpoint, e.g. `/api/log/1`.
    pub endpoint: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// JSON body sent as-is.
    pub payload: serde_json::Value,
    /// Enqueue time in milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Number of failed sync attempts so far.
    pub sync_attempts: u32,
}

impl PendingMutation {
    /// Creates a mutation with a fresh ID, stamped with the current time.
    pub fn new(endpoint: impl Into<String>, method: HttpMethod, payload: serde_json::Value) -> Self {
        Self {
            id: MutationId::new(),
            endpoint: endpoint.into(),
            method,
            payload,
            created_at: now_millis(),
            sync_attempts: 0,
        }
    }
}

/// A cached response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAsset {
    /// URL the content was fetched from. Unique key.
    pub url: String,
    /// Serialized response body.
    pub content: String,
    /// Cache time in milliseconds since the Unix epoch.
    pub cached_at: u64,
}

/// Snapshot of the current session's sync progress.
///
/// `total == synced + pending` holds for every snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Mutations queued during this session.
    pub total: u64,
    /// Mutations successfully applied remotely.
    pub synced: u64,
    /// Mutations still in the queue.
    pub pending: u64,
}

/// Status object consumed by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineStatus {
    /// Current connectivity.
    pub is_online: bool,
    /// Current session progress.
    pub sync_status: SyncStatus,
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mutation_ids_are_unique() {
        assert_ne!(MutationId::new(), MutationId::new());
    }

    #[test]
    fn mutation_id_parses_its_display() {
        let id = MutationId::new();
        let parsed: MutationId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<MutationId>().is_err());
    }

    #[test]
    fn method_parsing_is_case_insensitive() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("Put".parse::<HttpMethod>().unwrap(), HttpMethod::Put);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!(matches!(
            "PATCH".parse::<HttpMethod>(),
            Err(OfflineError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn pending_mutation_json_shape() {
        let mutation = PendingMutation::new("/api/log", HttpMethod::Post, json!({"a": 1}));
        let value = serde_json::to_value(&mutation).unwrap();

        assert_eq!(value["method"], "POST");
        assert_eq!(value["endpoint"], "/api/log");
        assert_eq!(value["syncAttempts"], 0);
        assert!(value["createdAt"].as_u64().unwrap() > 0);
        assert_eq!(value["id"], mutation.id.to_string());
    }

    #[test]
    fn offline_status_json_shape() {
        let status = OfflineStatus {
            is_online: true,
            sync_status: SyncStatus {
                total: 2,
                synced: 1,
                pending: 1,
            },
        };
        let value = serde_json::to_value(status).unwrap();
        assert_eq!(value["isOnline"], true);
        assert_eq!(value["syncStatus"]["pending"], 1);
    }
}
