//! Reference joiner.
//!
//! Resolves ids and emails against snapshots fetched by earlier stages.
//! Every lookup index is built once from the snapshot lists; when a list
//! holds duplicates the first entry wins. A lookup that finds nothing
//! returns `None` (or the documented default) and is never an error.

use std::collections::HashMap;
use std::path::Path;

use crate::model::{
    Contact, DestinationContact, DestinationId, DestinationTechnician, PicklistEntry, Resource,
};
use crate::snapshot::{read_snapshot, SnapshotError};

/// Snapshot file names inside the data directory.
pub const CONTACTS_FILE: &str = "all_contacts.json";
pub const RESOURCES_FILE: &str = "all_resources.json";
pub const PRIORITIES_FILE: &str = "all_priority.json";
pub const STATUSES_FILE: &str = "all_status.json";
pub const TECHNICIANS_FILE: &str = "atera_technicians.json";
pub const DESTINATION_CONTACTS_FILE: &str = "atera_contacts.json";

/// Priority name used when a ticket's priority code is unknown.
pub const DEFAULT_PRIORITY: &str = "Low";
/// Status name used when a ticket's status code is unknown.
pub const DEFAULT_STATUS: &str = "New";

/// Identity of the source contact a ticket belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndUser {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

/// Identity of the source resource a ticket is assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedResource {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

/// All reference snapshots, indexed for lookup.
#[derive(Debug, Default, Clone)]
pub struct ReferenceSet {
    contacts: HashMap<i64, EndUser>,
    resources: HashMap<i64, AssignedResource>,
    priorities: HashMap<i64, String>,
    statuses: HashMap<i64, String>,
    technicians_by_email: HashMap<String, DestinationId>,
    end_users_by_email: HashMap<String, DestinationId>,
}

fn first_wins<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> HashMap<K, V>
where
    K: std::hash::Hash + Eq,
{
    let mut map = HashMap::new();
    for (key, value) in entries {
        map.entry(key).or_insert(value);
    }
    map
}

impl ReferenceSet {
    pub fn new(
        contacts: Vec<Contact>,
        resources: Vec<Resource>,
        priorities: Vec<PicklistEntry>,
        statuses: Vec<PicklistEntry>,
        technicians: Vec<DestinationTechnician>,
        destination_contacts: Vec<DestinationContact>,
    ) -> Self {
        Self {
            contacts: first_wins(contacts.into_iter().map(|c| {
                (
                    c.id,
                    EndUser {
                        id: c.id,
                        first_name: c.first_name,
                        last_name: c.last_name,
                        email: c.email_address,
                    },
                )
            })),
            resources: first_wins(resources.into_iter().map(|r| {
                (
                    r.id,
                    AssignedResource {
                        id: r.id,
                        first_name: r.first_name,
                        last_name: r.last_name,
                        email: r.email,
                    },
                )
            })),
            priorities: first_wins(priorities.into_iter().map(|p| (p.id, p.name))),
            statuses: first_wins(statuses.into_iter().map(|s| (s.id, s.name))),
            technicians_by_email: first_wins(
                technicians
                    .into_iter()
                    .filter_map(|t| t.email.map(|email| (email, t.id))),
            ),
            end_users_by_email: first_wins(
                destination_contacts
                    .into_iter()
                    .filter_map(|c| c.email.map(|email| (email, c.end_user_id))),
            ),
        }
    }

    /// Read the six reference snapshots from `dir`.
    pub fn load(dir: &Path) -> Result<Self, SnapshotError> {
        Ok(Self::new(
            read_snapshot(&dir.join(CONTACTS_FILE))?,
            read_snapshot(&dir.join(RESOURCES_FILE))?,
            read_snapshot(&dir.join(PRIORITIES_FILE))?,
            read_snapshot(&dir.join(STATUSES_FILE))?,
            read_snapshot(&dir.join(TECHNICIANS_FILE))?,
            read_snapshot(&dir.join(DESTINATION_CONTACTS_FILE))?,
        ))
    }

    pub fn resolve_priority(&self, priority_id: Option<i64>) -> String {
        priority_id
            .and_then(|id| self.priorities.get(&id))
            .cloned()
            .unwrap_or_else(|| DEFAULT_PRIORITY.to_string())
    }

    pub fn resolve_status(&self, status_id: Option<i64>) -> String {
        status_id
            .and_then(|id| self.statuses.get(&id))
            .cloned()
            .unwrap_or_else(|| DEFAULT_STATUS.to_string())
    }

    pub fn resolve_end_user(&self, contact_id: Option<i64>) -> Option<&EndUser> {
        contact_id.and_then(|id| self.contacts.get(&id))
    }

    pub fn resolve_resource(&self, resource_id: Option<i64>) -> Option<&AssignedResource> {
        resource_id.and_then(|id| self.resources.get(&id))
    }

    /// Destination technician id for an email. A missing email never matches.
    pub fn resolve_destination_technician_id(&self, email: Option<&str>) -> Option<&DestinationId> {
        email.and_then(|e| self.technicians_by_email.get(e))
    }

    /// Destination end-user id for an email. A missing email never matches.
    pub fn resolve_destination_enduser_id(&self, email: Option<&str>) -> Option<&DestinationId> {
        email.and_then(|e| self.end_users_by_email.get(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::write_snapshot;
    use crate::testing::fixtures;
    use serde_json::Map;
    use tempfile::TempDir;

    fn refs() -> ReferenceSet {
        ReferenceSet::new(
            vec![
                fixtures::contact(1, "ada@example.com"),
                fixtures::contact(1, "shadow@example.com"),
                fixtures::contact(2, "grace@example.com"),
            ],
            vec![fixtures::resource(10, "tech@example.com")],
            fixtures::priorities(),
            fixtures::statuses(),
            vec![
                fixtures::destination_technician("t-1", "tech@example.com"),
                DestinationTechnician {
                    id: DestinationId::from("t-null"),
                    email: None,
                    extra: Map::new(),
                },
            ],
            vec![fixtures::destination_contact(501, "ada@example.com")],
        )
    }

    #[test]
    fn test_picklists_with_defaults() {
        let refs = refs();
        assert_eq!(refs.resolve_priority(Some(1)), "High");
        assert_eq!(refs.resolve_priority(Some(99)), "Low");
        assert_eq!(refs.resolve_priority(None), "Low");
        assert_eq!(refs.resolve_status(Some(5)), "Complete");
        assert_eq!(refs.resolve_status(Some(42)), "New");
    }

    #[test]
    fn test_first_match_wins() {
        let refs = refs();
        let user = refs.resolve_end_user(Some(1)).unwrap();
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_unknown_ids_resolve_to_none() {
        let refs = refs();
        assert!(refs.resolve_end_user(Some(404)).is_none());
        assert!(refs.resolve_end_user(None).is_none());
        assert!(refs.resolve_resource(Some(11)).is_none());
    }

    #[test]
    fn test_email_lookups() {
        let refs = refs();
        assert_eq!(
            refs.resolve_destination_technician_id(Some("tech@example.com")),
            Some(&DestinationId::from("t-1"))
        );
        assert_eq!(
            refs.resolve_destination_enduser_id(Some("ada@example.com")),
            Some(&DestinationId::Number(501))
        );
        assert!(refs
            .resolve_destination_enduser_id(Some("grace@example.com"))
            .is_none());
    }

    #[test]
    fn test_missing_email_never_matches() {
        let refs = refs();
        assert!(refs.resolve_destination_technician_id(None).is_none());
        assert!(refs.resolve_destination_enduser_id(None).is_none());
    }

    #[test]
    fn test_load_from_snapshot_dir() {
        let dir = TempDir::new().unwrap();
        let d = dir.path();
        write_snapshot(&d.join(CONTACTS_FILE), &[fixtures::contact(3, "x@example.com")]).unwrap();
        write_snapshot(&d.join(RESOURCES_FILE), &[fixtures::resource(4, "r@example.com")]).unwrap();
        write_snapshot(&d.join(PRIORITIES_FILE), &fixtures::priorities()).unwrap();
        write_snapshot(&d.join(STATUSES_FILE), &fixtures::statuses()).unwrap();
        write_snapshot(
            &d.join(TECHNICIANS_FILE),
            &[fixtures::destination_technician("9", "r@example.com")],
        )
        .unwrap();
        write_snapshot::<DestinationContact>(&d.join(DESTINATION_CONTACTS_FILE), &[]).unwrap();

        let refs = ReferenceSet::load(d).unwrap();

        assert_eq!(refs.resolve_priority(Some(4)), "Critical");
        assert!(refs.resolve_end_user(Some(3)).is_some());
        let resource = refs.resolve_resource(Some(4)).unwrap();
        assert_eq!(
            refs.resolve_destination_technician_id(resource.email.as_deref()),
            Some(&DestinationId::from("9"))
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = ReferenceSet::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONTACTS_FILE));
    }
}
