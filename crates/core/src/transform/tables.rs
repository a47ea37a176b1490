//! Fixed code tables for ticket fields that have no reference snapshot.

/// Source issue type code to destination impact.
pub const TICKET_IMPACTS: [(i64, &str); 5] = [
    (1, "NoImpact"),
    (2, "Minor"),
    (3, "Major"),
    (4, "Crisis"),
    (5, "SiteDown"),
];
pub const DEFAULT_IMPACT: &str = "Minor";

/// Source ticket type code to destination type.
pub const TICKET_TYPES: [(i64, &str); 4] = [
    (1, "Request"),
    (2, "Incident"),
    (3, "Problem"),
    (4, "Change"),
];
pub const DEFAULT_TYPE: &str = "Incident";

fn lookup(table: &[(i64, &'static str)], code: Option<i64>, default: &'static str) -> &'static str {
    code.and_then(|code| table.iter().find(|(c, _)| *c == code))
        .map(|(_, name)| *name)
        .unwrap_or(default)
}

pub fn resolve_ticket_impact(issue_type: Option<i64>) -> &'static str {
    lookup(&TICKET_IMPACTS, issue_type, DEFAULT_IMPACT)
}

pub fn resolve_ticket_type(ticket_type: Option<i64>) -> &'static str {
    lookup(&TICKET_TYPES, ticket_type, DEFAULT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_table() {
        assert_eq!(resolve_ticket_impact(Some(1)), "NoImpact");
        assert_eq!(resolve_ticket_impact(Some(3)), "Major");
        assert_eq!(resolve_ticket_impact(Some(5)), "SiteDown");
        assert_eq!(resolve_ticket_impact(Some(0)), "Minor");
        assert_eq!(resolve_ticket_impact(None), "Minor");
    }

    #[test]
    fn test_type_table() {
        assert_eq!(resolve_ticket_type(Some(1)), "Request");
        assert_eq!(resolve_ticket_type(Some(4)), "Change");
        assert_eq!(resolve_ticket_type(Some(7)), "Incident");
        assert_eq!(resolve_ticket_type(None), "Incident");
    }
}
