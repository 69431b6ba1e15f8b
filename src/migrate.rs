use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Applies the schema to an already-open pool. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // One row per ingested publication; code is the externally unique
    // business identifier.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            file_name TEXT NOT NULL,
            issue_number TEXT NOT NULL,
            content_xml TEXT NOT NULL,
            structure_json TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Categories carry only a title; leaves carry identity, raw markup,
    // and (after normalization) a display record.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            is_category INTEGER NOT NULL DEFAULT 0,
            title TEXT NOT NULL,
            tech_name TEXT,
            issue_number TEXT,
            content_xml TEXT,
            content_json TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One link per node: the UNIQUE node_id keeps the hierarchy a tree.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS node_links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            publication_id INTEGER NOT NULL,
            node_id INTEGER NOT NULL UNIQUE,
            parent_id INTEGER,
            order_in_parent INTEGER NOT NULL,
            FOREIGN KEY (publication_id) REFERENCES publications(id) ON DELETE CASCADE,
            FOREIGN KEY (node_id) REFERENCES nodes(id),
            FOREIGN KEY (parent_id) REFERENCES nodes(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Run-scoped scratch rows; bulk-deleted by run_id when a run finishes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staging_modules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            tech_name TEXT NOT NULL,
            issue_number TEXT NOT NULL,
            content_xml TEXT NOT NULL,
            file_name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_node_links_publication ON node_links(publication_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_node_links_parent ON node_links(parent_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_staging_run ON staging_modules(run_id)")
        .execute(pool)
        .await?;

    Ok(())
}
