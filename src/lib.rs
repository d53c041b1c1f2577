pub mod config;
pub mod date_util;
pub mod error;
pub mod events;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod report;
pub mod storage;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use events::{ActivityEvent, EventKind, EventTable, RepoEvents};
pub use ingest::{IngestProgress, IngestReport, IngestStatus, NoopProgress, TableReport};
pub use metrics::{GranularSeries, MetricSeries, MetricValue, Point};
pub use query::period::{Granularity, Period};
pub use report::{MetricFamily, Report};
pub use storage::Database;

// Re-export repository types needed by the binary crate, but not the module itself
pub use storage::repository::RepositoryStatus;

use storage::repository;

/// Main entry point: an event store plus the metric families computed from it.
pub struct RepoPulse {
    db: Database,
}

impl RepoPulse {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ── Ingest ─────────────────────────────────────────────────────

    pub async fn ingest(
        &self,
        dir: &Path,
        org: &str,
        repo: &str,
        progress: &dyn IngestProgress,
    ) -> Result<IngestReport> {
        ingest::ingest_repository(&self.db, dir, org, repo, progress).await
    }

    /// Stored events for one repository. Unknown repositories are an error
    /// so a typo does not silently produce all-empty metrics.
    pub async fn repo_events(&self, org: &str, repo: &str) -> Result<RepoEvents> {
        let key = repository::repo_key(org, repo);
        let events = self
            .db
            .reader()
            .call({
                let key = key.clone();
                move |conn| {
                    if !repository::repository_exists(conn, &key)? {
                        return Ok(None);
                    }
                    repository::load_repo_events(conn, &key).map(Some)
                }
            })
            .await?;
        events.ok_or_else(|| Error::NotFound(format!("{key} (run `repopulse ingest` first)")))
    }

    // ── Metrics ────────────────────────────────────────────────────

    pub async fn engine_config(&self) -> Result<EngineConfig> {
        EngineConfig::load(&self.db).await
    }

    pub async fn compute_family(
        &self,
        family: MetricFamily,
        org: &str,
        repo: &str,
        now: DateTime<Utc>,
    ) -> Result<Report> {
        let config = self.engine_config().await?;
        let events = self.repo_events(org, repo).await?;
        report::compute(family, &events, &config, now)
    }

    /// Compute and write every family in `families`, returning the written
    /// paths. `out_dir` overrides the configured output directory.
    pub async fn write_families(
        &self,
        families: &[MetricFamily],
        org: &str,
        repo: &str,
        now: DateTime<Utc>,
        out_dir: Option<&Path>,
    ) -> Result<Vec<PathBuf>> {
        let config = self.engine_config().await?;
        let out_dir = out_dir.map(Path::to_path_buf).unwrap_or_else(|| config.output_dir.clone());
        let events = self.repo_events(org, repo).await?;

        let mut written = Vec::with_capacity(families.len());
        for family in families {
            let doc = report::compute(*family, &events, &config, now)?;
            written.push(report::write_report(&out_dir, org, repo, *family, &doc)?);
        }
        Ok(written)
    }

    // ── Status ─────────────────────────────────────────────────────

    pub async fn status(&self) -> Result<Vec<RepositoryStatus>> {
        self.db
            .reader()
            .call(|conn| repository::list_repositories(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Store a setting. Known engine keys are validated before they are
    /// written.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        if config::CONFIG_KEYS.contains(&key) {
            EngineConfig::from_pairs(&[(key.to_string(), value.to_string())])?;
        }
        self.db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}
