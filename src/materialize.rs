//! Tree materialization: persisting the parsed structure as ordered nodes.
//!
//! The walk resolves each leaf reference against the run's staging map and
//! writes nodes plus parent links inside a single transaction per
//! publication, so a failing subtree leaves nothing behind. Leaf references
//! and categories keep independent 1-based sibling counters per parent.

use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::error::{IngestError, NodePosition, Result};
use crate::models::{ModuleIdentity, StagedModule, StructureChild};

#[derive(Debug, Default, Clone, Copy)]
pub struct MaterializeStats {
    pub leaves: usize,
    pub categories: usize,
}

/// Persists the structure tree for `publication_id` in its own
/// transaction. Rolls back entirely on any resolution or write failure.
pub async fn materialize_tree(
    pool: &SqlitePool,
    publication_id: i64,
    children: &[StructureChild],
    staged: &HashMap<ModuleIdentity, Vec<StagedModule>>,
) -> Result<MaterializeStats> {
    let mut tx = pool.begin().await?;
    let stats = materialize_into(&mut *tx, publication_id, children, staged).await?;
    tx.commit().await?;
    Ok(stats)
}

/// Persists the structure tree on an existing connection, letting the
/// caller scope the transaction (the pipeline wraps publication creation
/// and materialization together).
pub async fn materialize_into(
    conn: &mut SqliteConnection,
    publication_id: i64,
    children: &[StructureChild],
    staged: &HashMap<ModuleIdentity, Vec<StagedModule>>,
) -> Result<MaterializeStats> {
    let mut stats = MaterializeStats::default();
    walk(conn, publication_id, children, None, None, staged, &mut stats).await?;
    debug!(
        leaves = stats.leaves,
        categories = stats.categories,
        publication_id,
        "materialization complete"
    );
    Ok(stats)
}

/// Depth-first persistence of one sibling list. Boxed future because the
/// recursion is async.
fn walk<'a>(
    conn: &'a mut SqliteConnection,
    publication_id: i64,
    children: &'a [StructureChild],
    parent_id: Option<i64>,
    parent_title: Option<&'a str>,
    staged: &'a HashMap<ModuleIdentity, Vec<StagedModule>>,
    stats: &'a mut MaterializeStats,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut leaf_count = 0usize;
        let mut category_count = 0usize;

        for child in children {
            match child {
                StructureChild::LeafRef { identity } => {
                    leaf_count += 1;
                    let module = resolve(staged, identity, leaf_count, parent_title)?;
                    let node_id = insert_leaf(conn, module)
                        .await
                        .map_err(|e| e.in_node(leaf_count, parent_title))?;
                    insert_link(conn, publication_id, node_id, parent_id, leaf_count as i64)
                        .await
                        .map_err(|e| e.in_node(leaf_count, parent_title))?;
                    stats.leaves += 1;
                }
                StructureChild::Category { title, children } => {
                    category_count += 1;
                    let node_id = insert_category(conn, title)
                        .await
                        .map_err(|e| e.in_node(category_count, parent_title))?;
                    insert_link(
                        conn,
                        publication_id,
                        node_id,
                        parent_id,
                        category_count as i64,
                    )
                    .await
                    .map_err(|e| e.in_node(category_count, parent_title))?;
                    stats.categories += 1;

                    walk(
                        conn,
                        publication_id,
                        children,
                        Some(node_id),
                        Some(title),
                        staged,
                        stats,
                    )
                    .await
                    .map_err(|e| e.in_node(category_count, parent_title))?;
                }
            }
        }

        Ok(())
    })
}

fn resolve<'a>(
    staged: &'a HashMap<ModuleIdentity, Vec<StagedModule>>,
    identity: &ModuleIdentity,
    position: usize,
    parent_title: Option<&str>,
) -> Result<&'a StagedModule> {
    let at = NodePosition {
        position,
        parent: parent_title.map(|s| s.to_string()),
    };
    match staged.get(identity).map(Vec::as_slice) {
        None | Some([]) => Err(IngestError::UnresolvedLeaf {
            at,
            tech_name: identity.tech_name.clone(),
            issue_number: identity.issue_number.clone(),
        }),
        Some([module]) => Ok(module),
        Some(matches) => Err(IngestError::AmbiguousLeaf {
            at,
            tech_name: identity.tech_name.clone(),
            issue_number: identity.issue_number.clone(),
            matches: matches.len(),
        }),
    }
}

async fn insert_leaf(conn: &mut SqliteConnection, module: &StagedModule) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO nodes (is_category, title, tech_name, issue_number, content_xml) \
         VALUES (0, ?, ?, ?, ?)",
    )
    .bind(&module.identity.tech_name)
    .bind(&module.identity.tech_name)
    .bind(&module.identity.issue_number)
    .bind(&module.content_xml)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn insert_category(conn: &mut SqliteConnection, title: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO nodes (is_category, title) VALUES (1, ?)")
        .bind(title)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_rowid())
}

async fn insert_link(
    conn: &mut SqliteConnection,
    publication_id: i64,
    node_id: i64,
    parent_id: Option<i64>,
    order_in_parent: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO node_links (publication_id, node_id, parent_id, order_in_parent) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(publication_id)
    .bind(node_id)
    .bind(parent_id)
    .bind(order_in_parent)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
