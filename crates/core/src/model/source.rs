//! Records as returned by the source (Autotask-style) API.
//!
//! Every record keeps the fields it does not model in `extra`, so a snapshot
//! read from disk and written back only changes where a stage sets a field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Note type code for a plain comment.
pub const NOTE_TYPE_COMMENT: i64 = 1;

/// A customer contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub primary_contact: Option<bool>,
    #[serde(default)]
    pub create_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A technician/agent account in the source system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A ticket, optionally carrying the notes attached by the notes stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub issue_type: Option<i64>,
    #[serde(default)]
    pub ticket_type: Option<i64>,
    #[serde(rename = "contactID", default)]
    pub contact_id: Option<i64>,
    #[serde(rename = "assignedResourceID", default)]
    pub assigned_resource_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Ticket {
    /// Notes attached to this ticket, empty if none were fetched.
    pub fn notes(&self) -> &[Note] {
        self.notes.as_deref().unwrap_or(&[])
    }
}

/// A ticket note. `creator_resource_id` and `created_by_contact_id`
/// describe who wrote it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub note_type: Option<i64>,
    #[serde(default)]
    pub create_date_time: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "creatorResourceID", default)]
    pub creator_resource_id: Option<i64>,
    #[serde(rename = "createdByContactID", default)]
    pub created_by_contact_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Note {
    pub fn is_comment(&self) -> bool {
        self.note_type == Some(NOTE_TYPE_COMMENT)
    }
}

/// One entry of a picklist reference snapshot (priorities, statuses).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PicklistEntry {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PicklistEntry {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            extra: Map::new(),
        }
    }
}
