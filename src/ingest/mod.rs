use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::events::loader::{find_shards, load_shards};
use crate::events::{EventKind, EventTable};
use crate::storage::{repository, Database};

/// Callbacks for long-running ingests.
pub trait IngestProgress: Send + Sync {
    fn on_table_start(&self, kind: EventKind, shards: usize);
    fn on_shard_loaded(&self, kind: EventKind, path: &Path, rows: usize);
    fn on_table_complete(&self, report: &TableReport);
}

/// Progress reporter that discards every event.
pub struct NoopProgress;

impl IngestProgress for NoopProgress {
    fn on_table_start(&self, _kind: EventKind, _shards: usize) {}
    fn on_shard_loaded(&self, _kind: EventKind, _path: &Path, _rows: usize) {}
    fn on_table_complete(&self, _report: &TableReport) {}
}

/// Outcome for one event kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub kind: EventKind,
    pub shards: usize,
    pub rows_loaded: usize,
    pub rows_without_created_at: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IngestStatus {
    Success,
    /// No shard of any kind was found.
    Empty,
    Failed,
}

/// Report returned after an ingest completes.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub repo_key: String,
    pub status: IngestStatus,
    pub tables: Vec<TableReport>,
    pub error: Option<String>,
}

impl IngestReport {
    pub fn rows_loaded(&self) -> usize {
        self.tables.iter().map(|t| t.rows_loaded).sum()
    }

    pub fn rows_without_created_at(&self) -> usize {
        self.tables.iter().map(|t| t.rows_without_created_at).sum()
    }
}

/// Load every shard of one repository from `dir` and replace its stored
/// events. All five tables are read before anything is written, and they
/// are replaced in one transaction: a shard that cannot be read fails the
/// ingest and leaves the previous snapshot untouched.
pub async fn ingest_repository(
    db: &Database,
    dir: &Path,
    org: &str,
    repo: &str,
    progress: &dyn IngestProgress,
) -> Result<IngestReport> {
    let (repo_key, job_id) = db
        .writer()
        .call({
            let org = org.to_string();
            let repo = repo.to_string();
            move |conn| {
                let key = repository::upsert_repository(conn, &org, &repo)?;
                let job = repository::insert_ingest_job(conn, &key)?;
                Ok::<_, rusqlite::Error>((key, job))
            }
        })
        .await?;

    log::info!("Ingesting {repo_key} from {}", dir.display());

    let mut report = IngestReport {
        repo_key,
        status: IngestStatus::Success,
        tables: Vec::new(),
        error: None,
    };
    match load_tables(dir, org, repo, progress) {
        Ok(loaded) => {
            let (tables, table_reports): (Vec<EventTable>, Vec<TableReport>) = loaded.into_iter().unzip();
            let written = db
                .writer()
                .call({
                    let repo_key = report.repo_key.clone();
                    move |conn| repository::replace_events(conn, &repo_key, &tables)
                })
                .await;
            match written {
                Ok(rows) => {
                    log::debug!("Stored {rows} events for {}", report.repo_key);
                    report.tables = table_reports;
                }
                Err(e) => {
                    log::error!("Failed to store events for {}: {e}", report.repo_key);
                    report.error = Some(e.to_string());
                }
            }
        }
        Err(e) => {
            log::error!("Failed to load shards for {}: {e}", report.repo_key);
            report.error = Some(e.to_string());
        }
    }

    report.status = if report.error.is_some() {
        IngestStatus::Failed
    } else if report.tables.iter().all(|t| t.shards == 0) {
        IngestStatus::Empty
    } else {
        IngestStatus::Success
    };

    db.writer()
        .call({
            let repo_key = report.repo_key.clone();
            let status = match report.status {
                IngestStatus::Failed => "failed",
                _ => "completed",
            };
            let loaded = report.rows_loaded() as u64;
            let skipped = report.rows_without_created_at() as u64;
            let error = report.error.clone();
            move |conn| {
                repository::update_ingest_job(conn, job_id, status, loaded, skipped, error.as_deref())?;
                if error.is_none() {
                    repository::mark_repository_ingested(conn, &repo_key)?;
                }
                Ok::<(), rusqlite::Error>(())
            }
        })
        .await?;

    Ok(report)
}

/// Read and normalize every kind, reporting progress as each table completes.
fn load_tables(
    dir: &Path,
    org: &str,
    repo: &str,
    progress: &dyn IngestProgress,
) -> Result<Vec<(EventTable, TableReport)>> {
    let mut loaded = Vec::with_capacity(EventKind::ALL.len());
    for kind in EventKind::ALL {
        let shards = find_shards(dir, org, repo, kind)?;
        progress.on_table_start(kind, shards.len());

        let table = load_shards(kind, &shards, |path, rows| {
            progress.on_shard_loaded(kind, path, rows)
        })?;
        let report = TableReport {
            kind,
            shards: shards.len(),
            rows_loaded: table.len(),
            rows_without_created_at: table.events.iter().filter(|e| e.created_at.is_none()).count(),
        };
        progress.on_table_complete(&report);
        loaded.push((table, report));
    }
    Ok(loaded)
}
