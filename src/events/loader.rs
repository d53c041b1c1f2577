use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::events::normalize::{normalize, RawTable};
use crate::events::{EventKind, EventTable};

/// File-name prefix of every shard of `kind` for one repository, e.g.
/// `rust-lang_cargo_pulls`.
pub fn shard_prefix(org: &str, repo: &str, kind: EventKind) -> String {
    format!(
        "{}_{}_{}",
        org.to_lowercase(),
        repo.to_lowercase(),
        kind.shard_stem()
    )
}

/// Shards of one kind in `dir`, sorted by file name. A shard is
/// `<prefix>.json` or `<prefix>-<suffix>.json`. A missing directory yields no
/// shards.
pub fn find_shards(dir: &Path, org: &str, repo: &str, kind: EventKind) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        log::warn!("Shard directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let prefix = shard_prefix(org, repo, kind);
    let suffixed = format!("{prefix}-");
    let mut shards = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stem) = name.strip_suffix(".json") else {
            continue;
        };
        if stem == prefix || stem.starts_with(&suffixed) {
            shards.push(path);
        }
    }
    shards.sort();
    Ok(shards)
}

/// Read one shard: a JSON array of objects.
pub fn load_shard(path: &Path) -> Result<RawTable> {
    let ingest_err = |message: String| Error::Ingest {
        path: path.display().to_string(),
        message,
    };

    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text).map_err(|e| ingest_err(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ingest_err("expected a JSON array of rows".into()));
    };

    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => rows.push(map),
            other => return Err(ingest_err(format!("row {i} is not an object: {other}"))),
        }
    }
    Ok(RawTable::new(rows))
}

/// Read and normalize `shards` (as found by [`find_shards`]) into one table
/// of `kind`. `on_shard` sees each path and its row count as it is read.
pub fn load_shards(
    kind: EventKind,
    shards: &[PathBuf],
    mut on_shard: impl FnMut(&Path, usize),
) -> Result<EventTable> {
    let mut raw = RawTable::default();
    for path in shards {
        let shard = load_shard(path)?;
        log::debug!("Loaded {} rows from {}", shard.len(), path.display());
        on_shard(path, shard.len());
        raw.append(shard);
    }
    Ok(normalize(raw, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_shard_prefix_lowercases() {
        assert_eq!(
            shard_prefix("Rust-Lang", "Cargo", EventKind::PullRequestComment),
            "rust-lang_cargo_pulls_comments"
        );
    }

    #[test]
    fn test_find_shards_does_not_confuse_kinds() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "acme_app_pulls.json", "[]");
        write(tmp.path(), "acme_app_pulls-2.json", "[]");
        write(tmp.path(), "acme_app_pulls_comments.json", "[]");
        write(tmp.path(), "acme_app_pulls.xlsx", "");
        write(tmp.path(), "other_app_pulls.json", "[]");

        let pulls = find_shards(tmp.path(), "acme", "app", EventKind::PullRequest).unwrap();
        let names: Vec<String> = pulls
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["acme_app_pulls-2.json", "acme_app_pulls.json"]);

        let comments = find_shards(tmp.path(), "acme", "app", EventKind::PullRequestComment).unwrap();
        assert_eq!(comments.len(), 1);
    }

    #[test]
    fn test_load_shards_concatenates_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "acme_app_commits-1.json",
            r#"[{"user": "alice", "created_at": "2024-01-01T00:00:00Z"},
                {"user": "bob", "created_at": "2024-01-02T00:00:00Z"}]"#,
        );
        write(
            tmp.path(),
            "acme_app_commits-2.json",
            r#"[{"user": "alice", "created_at": "2024-01-01T00:00:00Z"}]"#,
        );

        let shards = find_shards(tmp.path(), "acme", "app", EventKind::Commit).unwrap();
        let mut seen = Vec::new();
        let table = load_shards(EventKind::Commit, &shards, |_, rows| seen.push(rows)).unwrap();
        assert_eq!(seen, vec![2, 1]);
        let actors: Vec<&str> = table.events.iter().map(|e| e.actor.as_str()).collect();
        assert_eq!(actors, vec!["alice", "bob", "alice"]);
    }

    #[test]
    fn test_missing_inputs_are_empty_tables() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(find_shards(tmp.path(), "acme", "app", EventKind::Issue).unwrap().is_empty());
        assert!(find_shards(&tmp.path().join("nope"), "acme", "app", EventKind::Issue)
            .unwrap()
            .is_empty());

        let table = load_shards(EventKind::Issue, &[], |_, _| {}).unwrap();
        assert_eq!(table.kind, EventKind::Issue);
        assert!(table.is_empty());
    }

    #[test]
    fn test_non_tabular_shard_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "acme_app_issues.json", r#"{"user": "alice"}"#);
        let shards = find_shards(tmp.path(), "acme", "app", EventKind::Issue).unwrap();
        let err = load_shards(EventKind::Issue, &shards, |_, _| {}).unwrap_err();
        assert!(matches!(err, Error::Ingest { .. }));

        write(tmp.path(), "acme_app_issues.json", r#"[1, 2]"#);
        assert!(load_shards(EventKind::Issue, &shards, |_, _| {}).is_err());
    }
}
