use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::events::{ActivityEvent, EventKind, EventTable, RepoEvents};

/// Canonical key of an organization/repository pair.
pub fn repo_key(org: &str, repo: &str) -> String {
    format!("{}/{}", org.to_lowercase(), repo.to_lowercase())
}

// ── Repositories ───────────────────────────────────────────────────

pub fn upsert_repository(conn: &Connection, org: &str, repo: &str) -> Result<String, rusqlite::Error> {
    let key = repo_key(org, repo);
    conn.execute(
        "INSERT INTO dim_repositories (repo_key, org, repo)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(repo_key) DO UPDATE SET org = excluded.org, repo = excluded.repo",
        params![key, org, repo],
    )?;
    Ok(key)
}

pub fn mark_repository_ingested(conn: &Connection, repo_key: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE dim_repositories SET ingested_at = datetime('now') WHERE repo_key = ?1",
        params![repo_key],
    )?;
    Ok(())
}

pub fn repository_exists(conn: &Connection, repo_key: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT 1 FROM dim_repositories WHERE repo_key = ?1",
        params![repo_key],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

#[derive(Debug, Clone)]
pub struct RepositoryStatus {
    pub repo_key: String,
    pub org: String,
    pub repo: String,
    pub ingested_at: Option<String>,
    pub event_counts: Vec<(EventKind, i64)>,
    pub last_job_status: Option<String>,
}

impl RepositoryStatus {
    pub fn total_events(&self) -> i64 {
        self.event_counts.iter().map(|(_, n)| n).sum()
    }
}

pub fn list_repositories(conn: &Connection) -> Result<Vec<RepositoryStatus>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT r.repo_key, r.org, r.repo, r.ingested_at,
                (SELECT status FROM ingest_jobs j WHERE j.repo_key = r.repo_key
                 ORDER BY j.id DESC LIMIT 1)
         FROM dim_repositories r ORDER BY r.repo_key",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(RepositoryStatus {
            repo_key: row.get(0)?,
            org: row.get(1)?,
            repo: row.get(2)?,
            ingested_at: row.get(3)?,
            event_counts: Vec::new(),
            last_job_status: row.get(4)?,
        })
    })?;
    let mut repos = rows.collect::<Result<Vec<_>, _>>()?;
    for status in &mut repos {
        status.event_counts = event_counts(conn, &status.repo_key)?;
    }
    Ok(repos)
}

/// Stored events per kind, every kind listed.
pub fn event_counts(conn: &Connection, repo_key: &str) -> Result<Vec<(EventKind, i64)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM fact_events WHERE repo_key = ?1 AND kind = ?2")?;
    let mut counts = Vec::with_capacity(EventKind::ALL.len());
    for kind in EventKind::ALL {
        let n: i64 = stmt.query_row(params![repo_key, kind.as_str()], |row| row.get(0))?;
        counts.push((kind, n));
    }
    Ok(counts)
}

// ── Events ─────────────────────────────────────────────────────────

fn encode_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn decode_ts(text: Option<String>) -> Option<DateTime<Utc>> {
    let text = text?;
    match DateTime::parse_from_rfc3339(&text) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            log::debug!("Stored timestamp {text:?} does not parse: {e}");
            None
        }
    }
}

/// Replace the stored events of every kind in `tables` for one repository,
/// all in one transaction. Kinds not present in `tables` are left alone.
/// Rows keep their input order.
pub fn replace_events(
    conn: &mut Connection,
    repo_key: &str,
    tables: &[EventTable],
) -> Result<usize, rusqlite::Error> {
    let tx = conn.transaction()?;
    let mut written = 0;
    for table in tables {
        tx.execute(
            "DELETE FROM fact_events WHERE repo_key = ?1 AND kind = ?2",
            params![repo_key, table.kind.as_str()],
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO fact_events (
                repo_key, kind, actor, number, parent_number,
                created_at, closed_at, merged_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for event in &table.events {
            stmt.execute(params![
                repo_key,
                table.kind.as_str(),
                event.actor,
                event.number,
                event.parent_number,
                encode_ts(event.created_at),
                encode_ts(event.closed_at),
                encode_ts(event.merged_at),
            ])?;
        }
        written += table.len();
    }
    tx.commit()?;
    Ok(written)
}

/// Events of one kind in insertion order.
pub fn load_events(conn: &Connection, repo_key: &str, kind: EventKind) -> Result<EventTable, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT actor, number, parent_number, created_at, closed_at, merged_at
         FROM fact_events WHERE repo_key = ?1 AND kind = ?2 ORDER BY event_id",
    )?;
    let rows = stmt.query_map(params![repo_key, kind.as_str()], |row| {
        Ok(ActivityEvent {
            actor: row.get(0)?,
            number: row.get(1)?,
            parent_number: row.get(2)?,
            created_at: decode_ts(row.get(3)?),
            closed_at: decode_ts(row.get(4)?),
            merged_at: decode_ts(row.get(5)?),
        })
    })?;
    Ok(EventTable::new(kind, rows.collect::<Result<Vec<_>, _>>()?))
}

pub fn load_repo_events(conn: &Connection, repo_key: &str) -> Result<RepoEvents, rusqlite::Error> {
    let mut events = RepoEvents::default();
    for kind in EventKind::ALL {
        events.set(load_events(conn, repo_key, kind)?);
    }
    Ok(events)
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Ingest Jobs ────────────────────────────────────────────────────

pub fn insert_ingest_job(conn: &Connection, repo_key: &str) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO ingest_jobs (repo_key, status, started_at)
         VALUES (?1, 'running', datetime('now'))",
        params![repo_key],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_ingest_job(
    conn: &Connection,
    job_id: i64,
    status: &str,
    rows_loaded: u64,
    rows_skipped: u64,
    error_message: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE ingest_jobs SET
            status = ?2, completed_at = datetime('now'),
            rows_loaded = ?3, rows_skipped = ?4, error_message = ?5
         WHERE id = ?1",
        params![job_id, status, rows_loaded as i64, rows_skipped as i64, error_message],
    )?;
    Ok(())
}
