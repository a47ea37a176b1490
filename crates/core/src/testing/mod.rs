//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the source and destination
//! traits and a sleeper that never waits, allowing whole stages to be run
//! without network access or real delays.
//!
//! # Example
//!
//! ```rust,ignore
//! use deskmigrate_core::testing::{MockDestination, MockSourceApi, RecordingSleeper};
//!
//! let source = MockSourceApi::new();
//! source.set_items("Contacts isActive=1", vec![fixtures::contact_json(1, "a@example.com")]);
//! let destination = MockDestination::new();
//! let sleeper = RecordingSleeper::new();
//! ```

mod mock_destination;
mod mock_source;

pub use mock_destination::MockDestination;
pub use mock_source::{MockPageSource, MockSourceApi};

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::retry::Sleeper;

/// Sleeper that returns at once and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Map, Value};

    use crate::model::{
        Contact, DestinationContact, DestinationId, DestinationTechnician, Note, PicklistEntry,
        Resource, Ticket,
    };

    /// Create a source contact with an email and a name derived from it.
    pub fn contact(id: i64, email: &str) -> Contact {
        let local = email.split('@').next().unwrap_or(email);
        Contact {
            id,
            first_name: Some(capitalize(local)),
            last_name: Some("Tester".to_string()),
            email_address: Some(email.to_string()),
            ..Default::default()
        }
    }

    /// The same contact as the source API would send it.
    pub fn contact_json(id: i64, email: &str) -> Value {
        serde_json::to_value(contact(id, email)).unwrap_or(Value::Null)
    }

    /// Create a source resource (technician account).
    pub fn resource(id: i64, email: &str) -> Resource {
        Resource {
            id,
            first_name: Some("Tech".to_string()),
            last_name: Some(id.to_string()),
            email: Some(email.to_string()),
            extra: Map::new(),
        }
    }

    pub fn destination_contact(end_user_id: i64, email: &str) -> DestinationContact {
        DestinationContact {
            end_user_id: DestinationId::Number(end_user_id),
            email: Some(email.to_string()),
            extra: Map::new(),
        }
    }

    pub fn destination_technician(id: &str, email: &str) -> DestinationTechnician {
        DestinationTechnician {
            id: DestinationId::from(id),
            email: Some(email.to_string()),
            extra: Map::new(),
        }
    }

    /// Standard priority picklist: 1 High, 2 Medium, 3 Low, 4 Critical.
    pub fn priorities() -> Vec<PicklistEntry> {
        vec![
            PicklistEntry::new(1, "High"),
            PicklistEntry::new(2, "Medium"),
            PicklistEntry::new(3, "Low"),
            PicklistEntry::new(4, "Critical"),
        ]
    }

    /// Standard status picklist: 1 New, 5 Complete, 8 In Progress.
    pub fn statuses() -> Vec<PicklistEntry> {
        vec![
            PicklistEntry::new(1, "New"),
            PicklistEntry::new(5, "Complete"),
            PicklistEntry::new(8, "In Progress"),
        ]
    }

    /// Create a ticket with a title and the given codes.
    pub fn ticket(id: i64, title: &str, contact_id: Option<i64>, resource_id: Option<i64>) -> Ticket {
        Ticket {
            id: Some(id),
            title: Some(title.to_string()),
            description: Some(format!("{} description", title)),
            priority: Some(2),
            status: Some(1),
            issue_type: Some(3),
            ticket_type: Some(2),
            contact_id,
            assigned_resource_id: resource_id,
            ..Default::default()
        }
    }

    pub fn ticket_json(id: i64, title: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "description": format!("{} description", title),
            "priority": 2,
            "status": 1,
            "issueType": 3,
            "ticketType": 2,
            "contactID": null,
            "assignedResourceID": null,
            "companyID": 0
        })
    }

    /// A comment note written by a contact.
    pub fn contact_note(contact_id: i64, text: &str) -> Note {
        Note {
            note_type: Some(crate::model::NOTE_TYPE_COMMENT),
            create_date_time: Some("2023-04-01T09:30:00Z".to_string()),
            description: Some(text.to_string()),
            creator_resource_id: None,
            created_by_contact_id: Some(contact_id),
            ..Default::default()
        }
    }

    /// A comment note written by a resource.
    pub fn resource_note(resource_id: i64, text: &str) -> Note {
        Note {
            note_type: Some(crate::model::NOTE_TYPE_COMMENT),
            create_date_time: Some("2023-04-02T14:00:00Z".to_string()),
            description: Some(text.to_string()),
            creator_resource_id: Some(resource_id),
            created_by_contact_id: None,
            ..Default::default()
        }
    }

    fn capitalize(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
