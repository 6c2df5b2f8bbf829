//! Data types exchanged with the matchmaking frontend.
//!
//! These are transport-neutral: the gRPC client converts them to and
//! from its protobuf messages, and test doubles use them directly.

use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// TicketId
// ---------------------------------------------------------------------------

/// Opaque identifier of a ticket, assigned by the service on creation.
///
/// Newtype over `String` so a ticket id can't be confused with an
/// endpoint or a connection string in function signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketId(String);

impl TicketId {
    /// Wraps a raw id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TicketId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TicketId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Ticket template
// ---------------------------------------------------------------------------

/// Search metadata the service's match functions filter on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFields {
    /// Free-form tags (e.g. a game mode such as `mode.session`).
    pub tags: Vec<String>,
    /// Numeric attributes (skill, latency, ...).
    pub double_args: HashMap<String, f64>,
    /// String attributes (region, ...).
    pub string_args: HashMap<String, String>,
}

/// The template sent with `CreateTicket`.
///
/// Only the search fields are caller-controlled; the id, assignment and
/// timestamps belong to the service.
///
/// ```rust
/// use matchforge_frontend::Ticket;
///
/// let ticket = Ticket::new()
///     .with_tag("mode.session")
///     .with_double_arg("skill", 1.2)
///     .with_string_arg("region", "asia-northeast1");
/// assert_eq!(ticket.search_fields.tags, vec!["mode.session".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ticket {
    /// Search metadata for this ticket.
    pub search_fields: SearchFields,
}

impl Ticket {
    /// An empty template: no tags, no attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.search_fields.tags.push(tag.into());
        self
    }

    /// Sets a numeric search attribute.
    pub fn with_double_arg(mut self, key: impl Into<String>, value: f64) -> Self {
        self.search_fields.double_args.insert(key.into(), value);
        self
    }

    /// Sets a string search attribute.
    pub fn with_string_arg(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.search_fields.string_args.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// Where the client should connect for its match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    /// Connection string, typically `host:port`.
    pub connection: String,
}

/// One element of a `WatchAssignments` stream.
///
/// The service may push updates that carry no assignment yet, or an
/// assignment with an empty connection string. Neither counts as a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentUpdate {
    /// The assignment, if the service attached one.
    pub assignment: Option<Assignment>,
}

impl AssignmentUpdate {
    /// An update carrying the given connection string.
    pub fn with_connection(connection: impl Into<String>) -> Self {
        Self {
            assignment: Some(Assignment {
                connection: connection.into(),
            }),
        }
    }

    /// Returns the connection string if this update is a usable
    /// assignment (present and non-empty).
    pub fn connection(&self) -> Option<&str> {
        self.assignment
            .as_ref()
            .map(|a| a.connection.as_str())
            .filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_id_display_is_raw_id() {
        let id = TicketId::new("c5qn0ar4bbv3");
        assert_eq!(id.to_string(), "c5qn0ar4bbv3");
        assert_eq!(id.as_str(), "c5qn0ar4bbv3");
    }

    #[test]
    fn test_ticket_builder_sets_search_fields() {
        let ticket = Ticket::new()
            .with_tag("mode.session")
            .with_double_arg("skill", 0.5)
            .with_string_arg("region", "eu");

        let fields = &ticket.search_fields;
        assert_eq!(fields.tags, vec!["mode.session".to_string()]);
        assert_eq!(fields.double_args.get("skill"), Some(&0.5));
        assert_eq!(fields.string_args.get("region").map(String::as_str), Some("eu"));
    }

    #[test]
    fn test_update_connection_requires_non_empty_string() {
        assert_eq!(
            AssignmentUpdate::with_connection("10.0.0.5:7777").connection(),
            Some("10.0.0.5:7777")
        );
        assert_eq!(AssignmentUpdate::with_connection("").connection(), None);
        assert_eq!(AssignmentUpdate::default().connection(), None);
    }
}
