pub mod loader;
pub mod normalize;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The kinds of repository activity the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Commit,
    Issue,
    PullRequest,
    IssueComment,
    PullRequestComment,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Commit,
        EventKind::Issue,
        EventKind::PullRequest,
        EventKind::IssueComment,
        EventKind::PullRequestComment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Commit => "commit",
            EventKind::Issue => "issue",
            EventKind::PullRequest => "pull_request",
            EventKind::IssueComment => "issue_comment",
            EventKind::PullRequestComment => "pull_request_comment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// File-name stem used by the extraction layer for this kind's shards.
    pub fn shard_stem(&self) -> &'static str {
        match self {
            EventKind::Commit => "commits",
            EventKind::Issue => "issues",
            EventKind::PullRequest => "pulls",
            EventKind::IssueComment => "issues_comments",
            EventKind::PullRequestComment => "pulls_comments",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which timestamp of an event a window test should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    CreatedAt,
    ClosedAt,
}

/// One commit, issue, pull request or comment.
///
/// `actor` is empty when the source row had no usable identifier. Timestamps
/// that failed to parse are `None` and never fall inside any window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityEvent {
    pub actor: String,
    /// Issue or pull request number, when the event is one.
    pub number: Option<i64>,
    /// Number of the issue or pull request a comment belongs to.
    pub parent_number: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl ActivityEvent {
    pub fn new(actor: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            actor: actor.into(),
            created_at: Some(created_at),
            ..Default::default()
        }
    }

    pub fn with_number(mut self, number: i64) -> Self {
        self.number = Some(number);
        self
    }

    pub fn with_parent(mut self, parent_number: i64) -> Self {
        self.parent_number = Some(parent_number);
        self
    }

    pub fn with_closed_at(mut self, ts: DateTime<Utc>) -> Self {
        self.closed_at = Some(ts);
        self
    }

    pub fn with_merged_at(mut self, ts: DateTime<Utc>) -> Self {
        self.merged_at = Some(ts);
        self
    }

    pub fn timestamp(&self, field: TimestampField) -> Option<DateTime<Utc>> {
        match field {
            TimestampField::CreatedAt => self.created_at,
            TimestampField::ClosedAt => self.closed_at,
        }
    }

    pub fn has_actor(&self) -> bool {
        !self.actor.is_empty()
    }
}

/// A normalized, read-only table of events of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    pub kind: EventKind,
    pub events: Vec<ActivityEvent>,
}

impl EventTable {
    pub fn new(kind: EventKind, events: Vec<ActivityEvent>) -> Self {
        Self { kind, events }
    }

    /// An absent source table is an empty table, never an error.
    pub fn empty(kind: EventKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Concatenate same-shaped tables. Row order is preserved across tables
    /// and duplicates are kept.
    pub fn concat(kind: EventKind, tables: impl IntoIterator<Item = EventTable>) -> Self {
        let mut events = Vec::new();
        for table in tables {
            events.extend(table.events);
        }
        Self::new(kind, events)
    }

    pub fn as_slice(&self) -> &[ActivityEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Every event table for one organization/repository pair.
#[derive(Debug, Clone)]
pub struct RepoEvents {
    pub commits: EventTable,
    pub issues: EventTable,
    pub pulls: EventTable,
    pub issue_comments: EventTable,
    pub pull_comments: EventTable,
}

impl Default for RepoEvents {
    fn default() -> Self {
        Self {
            commits: EventTable::empty(EventKind::Commit),
            issues: EventTable::empty(EventKind::Issue),
            pulls: EventTable::empty(EventKind::PullRequest),
            issue_comments: EventTable::empty(EventKind::IssueComment),
            pull_comments: EventTable::empty(EventKind::PullRequestComment),
        }
    }
}

impl RepoEvents {
    pub fn table(&self, kind: EventKind) -> &EventTable {
        match kind {
            EventKind::Commit => &self.commits,
            EventKind::Issue => &self.issues,
            EventKind::PullRequest => &self.pulls,
            EventKind::IssueComment => &self.issue_comments,
            EventKind::PullRequestComment => &self.pull_comments,
        }
    }

    /// Replace the table of `table.kind`.
    pub fn set(&mut self, table: EventTable) {
        let slot = match table.kind {
            EventKind::Commit => &mut self.commits,
            EventKind::Issue => &mut self.issues,
            EventKind::PullRequest => &mut self.pulls,
            EventKind::IssueComment => &mut self.issue_comments,
            EventKind::PullRequestComment => &mut self.pull_comments,
        };
        *slot = table;
    }

    /// Issue and pull request comments as one table, PR comments first.
    pub fn all_comments(&self) -> Vec<ActivityEvent> {
        self.pull_comments
            .events
            .iter()
            .chain(self.issue_comments.events.iter())
            .cloned()
            .collect()
    }

    pub fn total_events(&self) -> usize {
        EventKind::ALL.iter().map(|k| self.table(*k).len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("release"), None);
    }

    #[test]
    fn test_concat_preserves_order_and_duplicates() {
        let a = EventTable::new(
            EventKind::Commit,
            vec![ActivityEvent::new("alice", ts(1)), ActivityEvent::new("bob", ts(2))],
        );
        let b = EventTable::new(
            EventKind::Commit,
            vec![ActivityEvent::new("alice", ts(1)), ActivityEvent::new("carol", ts(3))],
        );
        let merged = EventTable::concat(EventKind::Commit, [a, b]);
        let actors: Vec<&str> = merged.events.iter().map(|e| e.actor.as_str()).collect();
        assert_eq!(actors, vec!["alice", "bob", "alice", "carol"]);
    }

    #[test]
    fn test_missing_tables_are_empty() {
        let repo = RepoEvents::default();
        for kind in EventKind::ALL {
            assert!(repo.table(kind).is_empty());
            assert_eq!(repo.table(kind).kind, kind);
        }
        assert_eq!(repo.total_events(), 0);
    }

    #[test]
    fn test_set_replaces_matching_table() {
        let mut repo = RepoEvents::default();
        repo.set(EventTable::new(
            EventKind::IssueComment,
            vec![ActivityEvent::new("dave", ts(4)).with_parent(7)],
        ));
        assert_eq!(repo.issue_comments.len(), 1);
        assert_eq!(repo.all_comments()[0].parent_number, Some(7));
        assert_eq!(repo.total_events(), 1);
    }
}
