use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use crate::date_util::start_of_day;
use crate::events::{ActivityEvent, EventKind, EventTable};

static RE_NON_PRINTABLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\x20-\x7E]").unwrap());

/// One untyped row as produced by the extraction layer.
pub type RawRecord = Map<String, Value>;

/// Loosely-typed rows from one or more shards of the same kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(rows: Vec<RawRecord>) -> Self {
        Self { rows }
    }

    /// Append another shard. Order is preserved, nothing is deduplicated.
    pub fn append(&mut self, other: RawTable) {
        self.rows.extend(other.rows);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Timestamp,
}

/// A column every row of a table must carry after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnSpec {
    ColumnSpec { name, ty }
}

const COMMIT_COLUMNS: &[ColumnSpec] = &[
    col("user", ColumnType::Text),
    col("created_at", ColumnType::Timestamp),
];

const ISSUE_COLUMNS: &[ColumnSpec] = &[
    col("user", ColumnType::Text),
    col("number", ColumnType::Integer),
    col("created_at", ColumnType::Timestamp),
    col("closed_at", ColumnType::Timestamp),
];

const PULL_COLUMNS: &[ColumnSpec] = &[
    col("user", ColumnType::Text),
    col("number", ColumnType::Integer),
    col("created_at", ColumnType::Timestamp),
    col("closed_at", ColumnType::Timestamp),
    col("merged_at", ColumnType::Timestamp),
];

const ISSUE_COMMENT_COLUMNS: &[ColumnSpec] = &[
    col("user", ColumnType::Text),
    col("issue_number", ColumnType::Integer),
    col("created_at", ColumnType::Timestamp),
];

const PULL_COMMENT_COLUMNS: &[ColumnSpec] = &[
    col("user", ColumnType::Text),
    col("pr_number", ColumnType::Integer),
    col("created_at", ColumnType::Timestamp),
];

/// Identifier columns, first non-null wins.
const ACTOR_COLUMNS: &[&str] = &["user", "author", "login"];
const PARENT_COLUMNS: &[&str] = &["issue_number", "pr_number", "parent_number"];

/// Columns guaranteed present for a kind of event.
pub fn required_columns(kind: EventKind) -> &'static [ColumnSpec] {
    match kind {
        EventKind::Commit => COMMIT_COLUMNS,
        EventKind::Issue => ISSUE_COLUMNS,
        EventKind::PullRequest => PULL_COLUMNS,
        EventKind::IssueComment => ISSUE_COMMENT_COLUMNS,
        EventKind::PullRequestComment => PULL_COMMENT_COLUMNS,
    }
}

/// Make sure every row has each required column. Absent columns are
/// created as nulls.
pub fn ensure_columns(table: &mut RawTable, required: &[ColumnSpec]) {
    for row in &mut table.rows {
        for spec in required {
            row.entry(spec.name).or_insert(Value::Null);
        }
    }
}

/// Normalize raw rows into a typed table of `kind`. Timestamps that cannot be
/// parsed become `None` instead of failing the load.
pub fn normalize(mut raw: RawTable, kind: EventKind) -> EventTable {
    ensure_columns(&mut raw, required_columns(kind));

    let mut unparsable = 0usize;
    let events: Vec<ActivityEvent> = raw
        .rows
        .iter()
        .map(|row| {
            let event = to_event(row);
            if event.created_at.is_none() {
                unparsable += 1;
            }
            event
        })
        .collect();

    if unparsable > 0 {
        log::debug!("{kind}: {unparsable} of {} rows have no usable created_at", events.len());
    }
    EventTable::new(kind, events)
}

fn to_event(row: &RawRecord) -> ActivityEvent {
    ActivityEvent {
        actor: first_present(row, ACTOR_COLUMNS)
            .map(|v| clean_text(&text_value(v)))
            .unwrap_or_default(),
        number: row.get("number").and_then(parse_integer),
        parent_number: first_present(row, PARENT_COLUMNS).and_then(parse_integer),
        created_at: row.get("created_at").and_then(parse_timestamp),
        closed_at: row.get("closed_at").and_then(parse_timestamp),
        merged_at: row.get("merged_at").and_then(parse_timestamp),
    }
}

fn first_present<'a>(row: &'a RawRecord, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| row.get(*name))
        .find(|v| !v.is_null())
}

fn text_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Strip characters outside printable ASCII.
pub fn clean_text(s: &str) -> String {
    RE_NON_PRINTABLE.replace_all(s, "").trim().to_string()
}

/// Coerce a cell into a UTC instant. Returns `None` for nulls and for anything
/// that does not parse.
pub fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(start_of_day(date));
    }
    log::debug!("Unparsable timestamp: {s:?}");
    None
}

fn parse_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(v: Value) -> RawRecord {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_ensure_columns_adds_nulls() {
        let mut table = RawTable::new(vec![row(json!({"user": "alice"}))]);
        ensure_columns(&mut table, required_columns(EventKind::PullRequest));
        let r = &table.rows[0];
        for name in ["user", "number", "created_at", "closed_at", "merged_at"] {
            assert!(r.contains_key(name), "missing {name}");
        }
        assert_eq!(r["user"], json!("alice"));
        assert!(r["merged_at"].is_null());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        for s in [
            "2024-05-06T07:08:09Z",
            "2024-05-06T09:08:09+02:00",
            "2024-05-06 07:08:09+00:00",
            "2024-05-06 07:08:09",
            "2024-05-06T07:08:09",
        ] {
            assert_eq!(parse_timestamp(&json!(s)), Some(expected), "{s}");
        }
        assert_eq!(
            parse_timestamp(&json!("2024-05-06")),
            Some(Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp(&json!(expected.timestamp())), Some(expected));
    }

    #[test]
    fn test_unparsable_timestamps_become_none() {
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!("")), None);
        assert_eq!(parse_timestamp(&Value::Null), None);
        assert_eq!(parse_timestamp(&json!(true)), None);
    }

    #[test]
    fn test_normalize_issue_rows() {
        let raw = RawTable::new(vec![
            row(json!({
                "author": "alice",
                "number": 12,
                "created_at": "2024-01-01T00:00:00Z",
                "closed_at": "2024-01-03T00:00:00Z",
                "title": "ignored",
            })),
            row(json!({"user": "bob", "number": "13", "created_at": "not a date"})),
        ]);
        let table = normalize(raw, EventKind::Issue);
        assert_eq!(table.kind, EventKind::Issue);
        assert_eq!(table.len(), 2);

        let first = &table.events[0];
        assert_eq!(first.actor, "alice");
        assert_eq!(first.number, Some(12));
        assert!(first.closed_at.is_some());
        assert!(first.merged_at.is_none());

        let second = &table.events[1];
        assert_eq!(second.actor, "bob");
        assert_eq!(second.number, Some(13));
        assert!(second.created_at.is_none());
    }

    #[test]
    fn test_normalize_comment_parent_aliases() {
        let raw = RawTable::new(vec![
            row(json!({"user": "carol", "pr_number": 4, "created_at": "2024-01-01"})),
            row(json!({"user": "dave", "issue_number": 9.0, "created_at": "2024-01-01"})),
        ]);
        let table = normalize(raw, EventKind::PullRequestComment);
        assert_eq!(table.events[0].parent_number, Some(4));
        assert_eq!(table.events[1].parent_number, Some(9));
    }

    #[test]
    fn test_missing_actor_is_empty() {
        let raw = RawTable::new(vec![row(json!({"created_at": "2024-01-01"}))]);
        let table = normalize(raw, EventKind::Commit);
        assert!(!table.events[0].has_actor());
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("al\u{00e9}ice\n"), "alice");
        assert_eq!(clean_text("  bob "), "bob");
    }

    #[test]
    fn test_append_preserves_order() {
        let mut a = RawTable::new(vec![row(json!({"user": "a"}))]);
        a.append(RawTable::new(vec![row(json!({"user": "b"})), row(json!({"user": "a"}))]));
        let users: Vec<&Value> = a.rows.iter().map(|r| &r["user"]).collect();
        assert_eq!(users, vec![&json!("a"), &json!("b"), &json!("a")]);
    }
}
