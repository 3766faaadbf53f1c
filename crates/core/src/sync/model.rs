//! Sync wire models, Sync Log entries and Sync Conflicts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::Record;

/// Operation requested for one pushed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncOperation {
    Sync,
    Create,
    Update,
    Delete,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Sync => "SYNC",
            SyncOperation::Create => "CREATE",
            SyncOperation::Update => "UPDATE",
            SyncOperation::Delete => "DELETE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SYNC" => Some(SyncOperation::Sync),
            "CREATE" => Some(SyncOperation::Create),
            "UPDATE" => Some(SyncOperation::Update),
            "DELETE" => Some(SyncOperation::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of a push batch, as sent by the mobile client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushItem {
    #[serde(default, alias = "store_name", alias = "doctype")]
    pub store_name: Option<String>,
    #[serde(default, alias = "record_id")]
    pub record_id: Option<Value>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default, alias = "doc")]
    pub payload: Option<Value>,
    #[serde(default)]
    pub force: bool,
    #[serde(default, alias = "last_modified")]
    pub last_modified: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushStatus {
    Success,
    Deleted,
    Conflict,
    Error,
}

/// Per-record push outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushItemResult {
    pub status: PushStatus,
    pub doctype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One record of a legacy bulk sync batch. `doc` is already canonical.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BulkSyncItem {
    #[serde(default)]
    pub doctype: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkSyncStatus {
    Success,
    NotFound,
    Error,
}

/// Per-record bulk sync outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSyncResult {
    pub doctype: Option<String>,
    pub operation: Option<String>,
    pub status: BulkSyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Batch envelope: per-record results, or a single batch-level error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> BatchResponse<T> {
    pub fn completed(results: Vec<T>) -> Self {
        Self {
            success: true,
            results,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }
}

pub type PushResponse = BatchResponse<PushItemResult>;
pub type BulkSyncResponse = BatchResponse<BulkSyncResult>;

/// Normalized Sync Log status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncLogStatus {
    Success,
    Conflict,
    Failed,
}

impl SyncLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLogStatus::Success => "Success",
            SyncLogStatus::Conflict => "Conflict",
            SyncLogStatus::Failed => "Failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Success" => Some(SyncLogStatus::Success),
            "Conflict" => Some(SyncLogStatus::Conflict),
            "Failed" => Some(SyncLogStatus::Failed),
            _ => None,
        }
    }
}

/// Append-only audit row, one per attempted sync operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub name: String,
    pub user: String,
    pub entity_type: String,
    pub record_id: Option<String>,
    pub operation: String,
    pub status: SyncLogStatus,
    pub error_message: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictStatus {
    Pending,
    Resolved,
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Pending => "Pending",
            ConflictStatus::Resolved => "Resolved",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            s if s.eq_ignore_ascii_case("pending") => Some(ConflictStatus::Pending),
            s if s.eq_ignore_ascii_case("resolved") => Some(ConflictStatus::Resolved),
            _ => None,
        }
    }
}

/// A rejected push, with both versions kept verbatim for manual resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub name: String,
    pub entity_type: String,
    pub record_id: String,
    pub user: String,
    pub client_data: Value,
    pub server_data: Value,
    pub client_modified: Option<String>,
    pub server_modified: Option<String>,
    pub status: ConflictStatus,
    pub creation: String,
}

/// Identity of the caller, as established by the host's auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSession {
    pub user: String,
}

impl SyncSession {
    pub const GUEST: &'static str = "Guest";

    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    pub fn guest() -> Self {
        Self::new(Self::GUEST)
    }
}

/// `getSyncData` parameters. Unrecognized keys are kept as identity hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(default, alias = "lastSync")]
    pub last_sync: Option<String>,
    #[serde(default, alias = "officerRegion")]
    pub officer_region: Option<String>,
    #[serde(default)]
    pub doctype: Option<String>,
    #[serde(default)]
    pub month: Option<Value>,
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(flatten)]
    pub hints: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    pub data: BTreeMap<String, Vec<Record>>,
    pub server_time: String,
    pub last_sync: Option<String>,
}

/// `getModifiedRecords` parameters. `doctypes` may be a list or a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifiedRecordsRequest {
    #[serde(default, alias = "since")]
    pub last_sync_timestamp: Option<String>,
    #[serde(default)]
    pub doctypes: Option<Value>,
    #[serde(default)]
    pub doctype: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedRecordsResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_records: Option<BTreeMap<String, Vec<Record>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDataResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_data: Option<BTreeMap<String, Vec<Record>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_data: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
