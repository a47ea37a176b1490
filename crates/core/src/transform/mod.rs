//! Ticket payload transformer.
//!
//! Turns source tickets, with their notes attached, into destination
//! ticket payloads. Pure: everything it needs comes from the
//! [`ReferenceSet`].

mod tables;

pub use tables::{
    resolve_ticket_impact, resolve_ticket_type, DEFAULT_IMPACT, DEFAULT_TYPE, TICKET_IMPACTS,
    TICKET_TYPES,
};

use crate::model::{
    CommentAuthor, CommentPayload, EndUserRef, EnduserCommentDetails, Note, TechnicianCommentDetails,
    Ticket, TicketPayload,
};
use crate::reference::ReferenceSet;

/// Build the destination payload for one ticket.
pub fn transform_ticket(ticket: &Ticket, refs: &ReferenceSet) -> TicketPayload {
    let end_user = refs.resolve_end_user(ticket.contact_id);
    let end_user_ref = end_user.map(|user| {
        match refs.resolve_destination_enduser_id(user.email.as_deref()) {
            Some(id) => EndUserRef::Existing {
                end_user_id: id.clone(),
            },
            None => EndUserRef::New {
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                email: user.email.clone(),
            },
        }
    });

    let technician_contact_id = refs
        .resolve_resource(ticket.assigned_resource_id)
        .and_then(|resource| refs.resolve_destination_technician_id(resource.email.as_deref()))
        .cloned();

    TicketPayload {
        title: ticket.title.clone(),
        description: ticket.description.clone(),
        priority: refs.resolve_priority(ticket.priority),
        impact: resolve_ticket_impact(ticket.issue_type).to_string(),
        status: refs.resolve_status(ticket.status),
        ticket_type: resolve_ticket_type(ticket.ticket_type).to_string(),
        technician_contact_id,
        end_user: end_user_ref,
        comments: transform_comments(ticket.notes(), refs),
    }
}

/// Convert comment notes, in order, skipping every other note type.
///
/// A note with no creating resource was written by a contact and is sent
/// as a technician comment, resolved through the contact's email. A note
/// with a creating resource is sent as an end-user comment, resolved
/// through the resource's email.
pub fn transform_comments(notes: &[Note], refs: &ReferenceSet) -> Vec<CommentPayload> {
    notes
        .iter()
        .filter(|note| note.is_comment())
        .map(|note| CommentPayload {
            timestamp_utc: note.create_date_time.clone(),
            text: note.description.clone(),
            author: comment_author(note, refs),
        })
        .collect()
}

fn comment_author(note: &Note, refs: &ReferenceSet) -> CommentAuthor {
    match note.creator_resource_id {
        None => {
            let email = refs
                .resolve_end_user(note.created_by_contact_id)
                .and_then(|user| user.email.as_deref());
            CommentAuthor::Technician(TechnicianCommentDetails {
                technician_id: refs.resolve_destination_technician_id(email).cloned(),
                is_internal: false,
            })
        }
        Some(resource_id) => {
            let email = refs
                .resolve_resource(Some(resource_id))
                .and_then(|resource| resource.email.as_deref());
            CommentAuthor::EndUser(EnduserCommentDetails {
                enduser_id: refs.resolve_destination_enduser_id(email).cloned(),
            })
        }
    }
}

/// Transform every ticket, preserving input order.
pub fn transform_all(tickets: &[Ticket], refs: &ReferenceSet) -> Vec<TicketPayload> {
    tickets
        .iter()
        .map(|ticket| transform_ticket(ticket, refs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DestinationId, PicklistEntry};
    use crate::testing::fixtures;
    use serde_json::json;

    fn refs() -> ReferenceSet {
        ReferenceSet::new(
            vec![
                fixtures::contact(1, "known@example.com"),
                fixtures::contact(2, "newcomer@example.com"),
                fixtures::contact(3, "staff@example.com"),
            ],
            vec![
                fixtures::resource(10, "tech@example.com"),
                fixtures::resource(11, "known@example.com"),
            ],
            fixtures::priorities(),
            vec![PicklistEntry::new(1, "Open")],
            vec![
                fixtures::destination_technician("T10", "tech@example.com"),
                fixtures::destination_technician("T3", "staff@example.com"),
            ],
            vec![fixtures::destination_contact(900, "known@example.com")],
        )
    }

    #[test]
    fn test_maps_codes_through_tables() {
        let mut ticket = fixtures::ticket(1, "VPN down", None, None);
        ticket.priority = Some(1);
        ticket.issue_type = Some(4);
        ticket.ticket_type = Some(3);

        let payload = transform_ticket(&ticket, &refs());

        assert_eq!(payload.title.as_deref(), Some("VPN down"));
        assert_eq!(payload.priority, "High");
        assert_eq!(payload.status, "Open");
        assert_eq!(payload.impact, "Crisis");
        assert_eq!(payload.ticket_type, "Problem");
    }

    #[test]
    fn test_unknown_codes_use_defaults() {
        let mut ticket = fixtures::ticket(1, "Odd", None, None);
        ticket.priority = Some(99);
        ticket.status = None;
        ticket.issue_type = Some(42);
        ticket.ticket_type = None;

        let payload = transform_ticket(&ticket, &refs());

        assert_eq!(payload.priority, "Low");
        assert_eq!(payload.status, "New");
        assert_eq!(payload.impact, "Minor");
        assert_eq!(payload.ticket_type, "Incident");
    }

    #[test]
    fn test_existing_end_user_is_referenced_by_id() {
        let ticket = fixtures::ticket(1, "Known", Some(1), Some(10));
        let payload = transform_ticket(&ticket, &refs());

        assert_eq!(
            payload.end_user,
            Some(EndUserRef::Existing {
                end_user_id: DestinationId::Number(900)
            })
        );
        assert_eq!(
            payload.technician_contact_id,
            Some(DestinationId::from("T10"))
        );

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["EndUserID"], json!(900));
        assert!(value.get("EndUserEmail").is_none());
    }

    #[test]
    fn test_new_end_user_carries_identity() {
        let ticket = fixtures::ticket(1, "New", Some(2), None);
        let payload = transform_ticket(&ticket, &refs());

        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("EndUserID").is_none());
        assert_eq!(value["EndUserFirstName"], json!("Newcomer"));
        assert_eq!(value["EndUserEmail"], json!("newcomer@example.com"));
        assert!(value.get("TechnicianContactID").is_none());
    }

    #[test]
    fn test_unknown_contact_emits_no_end_user() {
        let ticket = fixtures::ticket(1, "Orphan", Some(404), None);
        let payload = transform_ticket(&ticket, &refs());

        assert!(payload.end_user.is_none());
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("EndUserID").is_none());
        assert!(value.get("EndUserEmail").is_none());
    }

    #[test]
    fn test_only_comment_notes_kept_in_order() {
        let mut status_change = fixtures::contact_note(1, "status changed");
        status_change.note_type = Some(3);
        let notes = vec![
            fixtures::contact_note(3, "first"),
            status_change,
            fixtures::resource_note(11, "second"),
        ];

        let comments = transform_comments(&notes, &refs());

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text.as_deref(), Some("first"));
        assert_eq!(comments[1].text.as_deref(), Some("second"));
    }

    #[test]
    fn test_comment_authorship_is_exclusive() {
        let notes = vec![
            fixtures::contact_note(3, "from contact"),
            fixtures::resource_note(11, "from resource"),
        ];

        let comments = transform_comments(&notes, &refs());

        // Contact-authored note becomes a technician comment
        assert_eq!(
            comments[0].author,
            CommentAuthor::Technician(TechnicianCommentDetails {
                technician_id: Some(DestinationId::from("T3")),
                is_internal: false,
            })
        );
        // Resource-authored note becomes an end-user comment
        assert_eq!(
            comments[1].author,
            CommentAuthor::EndUser(EnduserCommentDetails {
                enduser_id: Some(DestinationId::Number(900)),
            })
        );

        for comment in &comments {
            let value = serde_json::to_value(comment).unwrap();
            let has_tech = value.get("TechnicianCommentDetails").is_some();
            let has_user = value.get("EnduserCommentDetails").is_some();
            assert!(has_tech ^ has_user);
        }
    }

    #[test]
    fn test_unresolved_comment_author_keeps_block() {
        let notes = vec![fixtures::resource_note(77, "ghost")];
        let comments = transform_comments(&notes, &refs());

        let value = serde_json::to_value(&comments[0]).unwrap();
        assert_eq!(value["EnduserCommentDetails"], json!({}));
    }

    #[test]
    fn test_transform_all_preserves_order() {
        let tickets = vec![
            fixtures::ticket(3, "c", None, None),
            fixtures::ticket(1, "a", None, None),
            fixtures::ticket(2, "b", None, None),
        ];
        let payloads = transform_all(&tickets, &refs());
        let titles: Vec<_> = payloads.iter().map(|p| p.display_title()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }
}
