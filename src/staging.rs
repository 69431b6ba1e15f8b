//! Staging of loose content documents.
//!
//! Scans a source directory for content documents, runs the identity
//! extractor on each, and fills the run-scoped staging table. The load is
//! all-or-nothing: one bad file aborts the whole load and removes every
//! row already inserted for the run.

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::identity::extract_module;
use crate::models::{ModuleIdentity, StagedModule};

/// Finds the single structure document in `dir` by filename prefix.
pub fn locate_structure_file(dir: &Path, prefix: &str) -> Result<PathBuf> {
    let mut matches: Vec<PathBuf> = list_files_with_prefix(dir, prefix)?;
    matches.sort();

    match matches.len() {
        0 => Err(IngestError::StructureNotFound {
            prefix: prefix.to_string(),
            dir: dir.display().to_string(),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(IngestError::AmbiguousStructure {
            prefix: prefix.to_string(),
            dir: dir.display().to_string(),
            count,
        }),
    }
}

/// Loads every content document in `dir` into the staging table under
/// `run_id`. Returns the number of staged modules.
///
/// Duplicate identities are staged as-is; ambiguity is detected later,
/// when a leaf reference resolves against them.
pub async fn load_staging(
    pool: &SqlitePool,
    run_id: &str,
    dir: &Path,
    content_prefix: &str,
) -> Result<usize> {
    let mut files = list_files_with_prefix(dir, content_prefix)?;
    files.sort();

    let mut staged = 0usize;
    for path in &files {
        match stage_file(pool, run_id, path).await {
            Ok(()) => staged += 1,
            Err(err) => {
                // All-or-nothing: drop whatever this run already staged.
                clear_staging(pool, run_id).await?;
                let file = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                return Err(IngestError::MissingIdentity {
                    file,
                    source: Box::new(err),
                });
            }
        }
    }

    debug!(staged, run_id, "staging load complete");
    Ok(staged)
}

async fn stage_file(pool: &SqlitePool, run_id: &str, path: &Path) -> Result<()> {
    let xml = std::fs::read_to_string(path)?;
    let extracted = extract_module(&xml)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    sqlx::query(
        "INSERT INTO staging_modules (run_id, tech_name, issue_number, content_xml, file_name) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(run_id)
    .bind(&extracted.identity.tech_name)
    .bind(&extracted.identity.issue_number)
    .bind(&extracted.content_xml)
    .bind(&file_name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Loads this run's staged modules into the resolution map the
/// materializer threads through its recursive walk. Identities staged
/// more than once keep all their entries so resolution can report
/// ambiguity.
pub async fn staged_modules(
    pool: &SqlitePool,
    run_id: &str,
) -> Result<HashMap<ModuleIdentity, Vec<StagedModule>>> {
    let rows = sqlx::query(
        "SELECT tech_name, issue_number, content_xml, file_name \
         FROM staging_modules WHERE run_id = ? ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<ModuleIdentity, Vec<StagedModule>> = HashMap::new();
    for row in rows {
        let identity = ModuleIdentity {
            tech_name: row.get("tech_name"),
            issue_number: row.get("issue_number"),
        };
        map.entry(identity.clone()).or_default().push(StagedModule {
            identity,
            content_xml: row.get("content_xml"),
            file_name: row.get("file_name"),
        });
    }
    Ok(map)
}

/// Bulk-deletes every staging row for the run. Called on success and on
/// failure; staging must never leak between runs.
pub async fn clear_staging(pool: &SqlitePool, run_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM staging_modules WHERE run_id = ?")
        .bind(run_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

fn list_files_with_prefix(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(prefix) {
            out.push(entry.path());
        }
    }
    Ok(out)
}
