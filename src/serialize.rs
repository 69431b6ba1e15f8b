//! Tree serialization into the externally consumed JSON envelope.
//!
//! The persisted links of a publication are walked from the null-parent
//! roots and emitted as the fixed `{"core":{"data":[...]}}` shape the UI
//! tree widget expects. The result is cached as a string on the
//! publication row; it is not recomputed when the tree changes later.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::future::Future;
use std::pin::Pin;

use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeEnvelope {
    pub core: TreeCore,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeCore {
    pub data: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeNode {
    pub id: i64,
    pub text: String,
    pub a_attr: LinkAttr,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkAttr {
    pub href: i64,
}

/// Builds the tree envelope for a publication from its persisted links.
pub async fn build_tree(pool: &SqlitePool, publication_id: i64) -> Result<TreeEnvelope> {
    let data = children_of(pool, publication_id, None).await?;
    Ok(TreeEnvelope {
        core: TreeCore { data },
    })
}

/// Builds the tree, stores it on the publication row, and returns the
/// serialized snapshot.
pub async fn serialize_publication(pool: &SqlitePool, publication_id: i64) -> Result<String> {
    let envelope = build_tree(pool, publication_id).await?;
    let json = serde_json::to_string(&envelope)
        .map_err(|e| IngestError::MalformedDocument(format!("tree encoding: {e}")))?;

    sqlx::query("UPDATE publications SET structure_json = ? WHERE id = ?")
        .bind(&json)
        .bind(publication_id)
        .execute(pool)
        .await?;

    Ok(json)
}

/// Fetches and recursively expands the ordered children of one parent
/// slot. Categories precede leaves; within a kind the recorded sibling
/// order applies.
fn children_of(
    pool: &SqlitePool,
    publication_id: i64,
    parent_id: Option<i64>,
) -> Pin<Box<dyn Future<Output = Result<Vec<TreeNode>>> + Send + '_>> {
    Box::pin(async move {
        let rows = sqlx::query(
            "SELECT n.id, n.title FROM node_links l \
             JOIN nodes n ON n.id = l.node_id \
             WHERE l.publication_id = ? AND l.parent_id IS ? \
             ORDER BY n.is_category DESC, l.order_in_parent ASC",
        )
        .bind(publication_id)
        .bind(parent_id)
        .fetch_all(pool)
        .await?;

        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let children = children_of(pool, publication_id, Some(id)).await?;
            nodes.push(TreeNode {
                id,
                text: row.get("title"),
                a_attr: LinkAttr { href: id },
                children,
            });
        }
        Ok(nodes)
    })
}
