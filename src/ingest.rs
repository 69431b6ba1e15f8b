//! Ingestion pipeline orchestration.
//!
//! Runs the full flow for one source directory: structure location →
//! staging load → publication creation + tree materialization (one
//! transaction) → content normalization → tree serialization. The stages
//! run strictly in sequence; staging rows for the run are removed whether
//! or not materialization succeeds.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::IngestError;
use crate::materialize::{materialize_into, MaterializeStats};
use crate::normalize::{normalize_publication, MediaIndex};
use crate::serialize::serialize_publication;
use crate::staging;
use crate::structure::{parse_structure, ParsedStructure};

/// Outcome of one completed ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub publication_id: i64,
    pub code: String,
    pub title: String,
    pub structure_file: String,
    pub staged: usize,
    pub categories: usize,
    pub leaves: usize,
    pub normalized: usize,
    pub normalize_failed: usize,
    pub tree_bytes: usize,
}

/// CLI entry point: ingests one publication directory and prints a summary.
pub async fn run_ingest(config: &Config, dir: &Path) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = ingest_publication(&pool, config, dir).await;
    pool.close().await;
    let report = result?;

    println!("ingest {}", dir.display());
    println!("  structure: {}", report.structure_file);
    println!("  publication: '{}' code {}", report.title, report.code);
    println!("  staged modules: {}", report.staged);
    println!(
        "  nodes created: {} ({} categories, {} leaves)",
        report.categories + report.leaves,
        report.categories,
        report.leaves
    );
    println!(
        "  normalized: {} ({} failed)",
        report.normalized, report.normalize_failed
    );
    println!("  tree cached: {} bytes", report.tree_bytes);
    println!("ok");

    Ok(())
}

/// Runs the pipeline against an open pool. Materialization failures abort
/// the run and roll back the publication; staging rows are cleaned up on
/// every exit path.
pub async fn ingest_publication(
    pool: &SqlitePool,
    config: &Config,
    dir: &Path,
) -> Result<IngestReport, IngestError> {
    let structure_path = staging::locate_structure_file(dir, &config.ingest.structure_prefix)?;
    let structure_file = structure_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!(file = %structure_file, "parsing structure document");

    let xml = std::fs::read_to_string(&structure_path)?;
    let parsed = parse_structure(&xml, config.ingest.max_depth)?;

    let run_id = Uuid::new_v4().to_string();
    let staged_count =
        staging::load_staging(pool, &run_id, dir, &config.ingest.content_prefix).await?;
    info!(staged = staged_count, "staging load complete");

    let materialized = create_publication(pool, &parsed, &structure_path, &run_id).await;

    // Staging never outlives the run, success or failure.
    if let Err(err) = staging::clear_staging(pool, &run_id).await {
        warn!(error = %err, run_id = %run_id, "staging cleanup failed");
    }
    let (publication_id, stats) = materialized?;
    info!(
        categories = stats.categories,
        leaves = stats.leaves,
        publication_id,
        "tree materialized"
    );

    let media = MediaIndex::scan(dir, &config.ingest.media_dir)?;
    let norm = normalize_publication(pool, publication_id, &media).await?;
    if norm.failed > 0 {
        warn!(failed = norm.failed, "some leaves failed normalization");
    }

    let tree_json = serialize_publication(pool, publication_id).await?;

    Ok(IngestReport {
        publication_id,
        code: parsed.props.code,
        title: parsed.props.title,
        structure_file,
        staged: staged_count,
        categories: stats.categories,
        leaves: stats.leaves,
        normalized: norm.normalized,
        normalize_failed: norm.failed,
        tree_bytes: tree_json.len(),
    })
}

/// Loads the run's resolution map, then inserts the publication row and
/// materializes its tree in a single transaction, so a failing subtree
/// leaves no trace of the publication. Errors here still reach the
/// caller's staging cleanup.
async fn create_publication(
    pool: &SqlitePool,
    parsed: &ParsedStructure,
    structure_path: &Path,
    run_id: &str,
) -> Result<(i64, MaterializeStats), IngestError> {
    let staged = staging::staged_modules(pool, run_id).await?;
    let file_stem = structure_path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut tx = pool.begin().await?;

    let publication_id = sqlx::query(
        "INSERT INTO publications (title, code, file_name, issue_number, content_xml) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&parsed.props.title)
    .bind(&parsed.props.code)
    .bind(&file_stem)
    .bind(&parsed.props.issue_number)
    .bind(&parsed.props.content_xml)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let stats = materialize_into(&mut *tx, publication_id, &parsed.children, &staged).await?;

    tx.commit().await?;
    Ok((publication_id, stats))
}
