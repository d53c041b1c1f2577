use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "repopulse", about = "Community-health metrics for repository activity")]
struct Cli {
    /// Database path (default: ~/.repopulse/repopulse.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Progress reporter that writes to stderr.
struct StderrProgress;

impl repopulse::IngestProgress for StderrProgress {
    fn on_table_start(&self, kind: repopulse::EventKind, shards: usize) {
        eprintln!("Loading {kind} ({shards} shards)...");
    }

    fn on_shard_loaded(&self, _kind: repopulse::EventKind, path: &Path, rows: usize) {
        eprintln!("  {}: {} rows", path.display(), rows);
    }

    fn on_table_complete(&self, report: &repopulse::TableReport) {
        if report.rows_without_created_at > 0 {
            eprintln!(
                "  Done: {} rows stored ({} without a usable created_at)",
                report.rows_loaded, report.rows_without_created_at
            );
        } else {
            eprintln!("  Done: {} rows stored", report.rows_loaded);
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load shard files for a repository into the event store
    Ingest {
        /// Organization or user name
        org: String,
        /// Repository name
        repo: String,
        /// Directory holding <org>_<repo>_<kind>.json shards
        #[arg(long, default_value = "files")]
        dir: PathBuf,
    },
    /// Compute metric families and write them as JSON
    Metrics {
        /// newcomers, engagement, issues, pulls or all
        family: String,
        org: String,
        repo: String,
        /// Compute as of the start of this UTC day (YYYY-MM-DD) instead of now
        #[arg(long)]
        as_of: Option<String>,
        /// Output directory (default: the output_dir setting)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print JSON to stdout instead of writing files
        #[arg(long)]
        stdout: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show event store status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

fn parse_families(family: &str) -> anyhow::Result<Vec<repopulse::MetricFamily>> {
    if family.eq_ignore_ascii_case("all") {
        return Ok(repopulse::MetricFamily::ALL.to_vec());
    }
    Ok(vec![repopulse::MetricFamily::parse(family)?])
}

fn parse_now(as_of: Option<&str>) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    match as_of {
        None => Ok(chrono::Utc::now()),
        Some(s) => repopulse::date_util::parse_as_of(s)
            .ok_or_else(|| anyhow::anyhow!("Invalid --as-of date '{s}' (expected YYYY-MM-DD)")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => repopulse::Database::open_at(path).await?,
        None => repopulse::Database::open().await?,
    };
    let pulse = repopulse::RepoPulse::new(db);

    match cli.command {
        Commands::Ingest { org, repo, dir } => {
            let report = pulse.ingest(&dir, &org, &repo, &StderrProgress).await?;
            match report.status {
                repopulse::IngestStatus::Success => {
                    println!("Ingested {} rows for {}", report.rows_loaded(), report.repo_key);
                }
                repopulse::IngestStatus::Empty => {
                    println!(
                        "No shards found for {} in {}; stored empty tables",
                        report.repo_key,
                        dir.display()
                    );
                }
                repopulse::IngestStatus::Failed => {
                    anyhow::bail!(
                        "Ingest of {} failed: {}",
                        report.repo_key,
                        report.error.unwrap_or_default()
                    );
                }
            }
        }
        Commands::Metrics {
            family,
            org,
            repo,
            as_of,
            out,
            stdout,
        } => {
            let families = parse_families(&family)?;
            let now = parse_now(as_of.as_deref())?;
            if stdout {
                for family in families {
                    let report = pulse.compute_family(family, &org, &repo, now).await?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            } else {
                let written = pulse
                    .write_families(&families, &org, &repo, now, out.as_deref())
                    .await?;
                for path in written {
                    println!("Wrote {}", path.display());
                }
            }
        }
        Commands::Config { action } => {
            handle_config(&pulse, action).await?;
        }
        Commands::Status => {
            print_status(&pulse).await?;
        }
    }

    Ok(())
}

async fn print_status(pulse: &repopulse::RepoPulse) -> anyhow::Result<()> {
    let repos = pulse.status().await?;
    println!("Event Store Status");
    if repos.is_empty() {
        println!("  No repositories ingested.");
        return Ok(());
    }
    for repo in repos {
        println!("  {}", repo.repo_key);
        for (kind, count) in &repo.event_counts {
            println!("    {:<22}{count}", kind.as_str());
        }
        println!(
            "    Last ingest: {} ({})",
            repo.ingested_at.as_deref().unwrap_or("never"),
            repo.last_job_status.as_deref().unwrap_or("no jobs")
        );
    }
    Ok(())
}

async fn handle_config(pulse: &repopulse::RepoPulse, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match pulse.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            pulse.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = pulse.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}
