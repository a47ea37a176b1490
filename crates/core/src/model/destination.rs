//! Records and payloads for the destination (Atera-style) API.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::source::Contact;

/// Identifier issued by the destination. Snapshots carry these either as
/// JSON numbers or strings; the original form is kept on the way back out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DestinationId {
    Number(i64),
    Text(String),
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationId::Number(n) => write!(f, "{}", n),
            DestinationId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for DestinationId {
    fn from(value: i64) -> Self {
        DestinationId::Number(value)
    }
}

impl From<&str> for DestinationId {
    fn from(value: &str) -> Self {
        DestinationId::Text(value.to_string())
    }
}

/// An end-user contact already present at the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationContact {
    #[serde(rename = "EndUserID")]
    pub end_user_id: DestinationId,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A technician account at the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationTechnician {
    #[serde(rename = "$id")]
    pub id: DestinationId,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for creating a destination contact. Source fields without a
/// counterpart here are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DestinationContactPayload {
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub is_contact_person: bool,
    pub created_on: Option<String>,
}

impl From<&Contact> for DestinationContactPayload {
    fn from(contact: &Contact) -> Self {
        Self {
            email: contact.email_address.clone(),
            firstname: contact.first_name.clone(),
            lastname: contact.last_name.clone(),
            job_title: contact.title.clone(),
            phone: contact.phone.clone(),
            mobile_phone: contact.mobile_phone.clone(),
            is_contact_person: contact.primary_contact.unwrap_or(false),
            created_on: contact.create_date.clone(),
        }
    }
}

/// How a ticket names its end user: either an existing destination
/// contact, or the raw identity so the destination can create one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndUserRef {
    Existing {
        #[serde(rename = "EndUserID")]
        end_user_id: DestinationId,
    },
    New {
        #[serde(
            rename = "EndUserFirstName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        first_name: Option<String>,
        #[serde(
            rename = "EndUserLastName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        last_name: Option<String>,
        #[serde(
            rename = "EndUserEmail",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        email: Option<String>,
    },
}

/// Ticket body posted to the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPayload {
    #[serde(rename = "TicketTitle")]
    pub title: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "TicketPriority")]
    pub priority: String,
    #[serde(rename = "TicketImpact")]
    pub impact: String,
    #[serde(rename = "TicketStatus")]
    pub status: String,
    #[serde(rename = "TicketType")]
    pub ticket_type: String,
    #[serde(
        rename = "TechnicianContactID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub technician_contact_id: Option<DestinationId>,
    #[serde(flatten)]
    pub end_user: Option<EndUserRef>,
    #[serde(default)]
    pub comments: Vec<CommentPayload>,
}

impl TicketPayload {
    /// Title used in logs and error artifacts.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("<untitled>")
    }
}

/// Comment body posted under a destination ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPayload {
    #[serde(rename = "CommentTimestampUTC")]
    pub timestamp_utc: Option<String>,
    #[serde(rename = "CommentText")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub author: CommentAuthor,
}

/// Exactly one author detail block per comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommentAuthor {
    #[serde(rename = "TechnicianCommentDetails")]
    Technician(TechnicianCommentDetails),
    #[serde(rename = "EnduserCommentDetails")]
    EndUser(EnduserCommentDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicianCommentDetails {
    #[serde(
        rename = "TechnicianId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub technician_id: Option<DestinationId>,
    #[serde(rename = "IsInternal")]
    pub is_internal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnduserCommentDetails {
    #[serde(rename = "EnduserId", default, skip_serializing_if = "Option::is_none")]
    pub enduser_id: Option<DestinationId>,
}
