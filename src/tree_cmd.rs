//! Publication and node lookups.
//!
//! Fetches the materialized data the read surfaces expose: the cached tree
//! snapshot of a publication by business code, and a single node by id.
//! Used by both the `tpub tree` / `tpub get` CLI commands and the HTTP
//! server.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::models::NodeRow;

/// Publication lookup response: `{title, code, structure_json}`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PublicationView {
    pub title: String,
    pub code: String,
    pub structure_json: serde_json::Value,
}

/// Node lookup response.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeView {
    pub id: i64,
    pub technical_name: Option<String>,
    pub title: String,
    pub issue_number: Option<String>,
    pub content_json: Option<serde_json::Value>,
    pub is_category: bool,
}

pub async fn fetch_publication(pool: &SqlitePool, code: &str) -> Result<Option<PublicationView>> {
    let row = sqlx::query("SELECT title, code, structure_json FROM publications WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| {
        let raw: String = row.get("structure_json");
        PublicationView {
            title: row.get("title"),
            code: row.get("code"),
            structure_json: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
        }
    }))
}

pub async fn fetch_node(pool: &SqlitePool, id: i64) -> Result<Option<NodeView>> {
    let row = sqlx::query_as::<_, NodeRow>(
        "SELECT id, is_category, title, tech_name, issue_number, content_xml, content_json \
         FROM nodes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|node| NodeView {
        id: node.id,
        technical_name: node.tech_name,
        title: node.title,
        issue_number: node.issue_number,
        content_json: node
            .content_json
            .and_then(|s| serde_json::from_str(&s).ok()),
        is_category: node.is_category,
    }))
}

/// CLI entry point — prints a publication's cached tree snapshot.
pub async fn run_tree(config: &Config, code: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let publication = fetch_publication(&pool, code).await?;
    pool.close().await;

    let Some(publication) = publication else {
        bail!("publication not found: {}", code);
    };

    println!("--- Publication ---");
    println!("title: {}", publication.title);
    println!("code:  {}", publication.code);
    println!();
    println!("{}", serde_json::to_string_pretty(&publication.structure_json)?);

    Ok(())
}

/// CLI entry point — prints one node's identity and display record.
pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let node = fetch_node(&pool, id).await?;
    pool.close().await;

    let Some(node) = node else {
        bail!("node not found: {}", id);
    };

    println!("--- Node ---");
    println!("id:           {}", node.id);
    println!("title:        {}", node.title);
    println!(
        "kind:         {}",
        if node.is_category { "category" } else { "leaf" }
    );
    if let Some(ref name) = node.technical_name {
        println!("tech_name:    {}", name);
    }
    if let Some(ref issue) = node.issue_number {
        println!("issue_number: {}", issue);
    }
    if let Some(ref content) = node.content_json {
        println!();
        println!("{}", serde_json::to_string_pretty(content)?);
    }

    Ok(())
}
