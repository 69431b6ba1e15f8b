//! Content normalization: the second pass over persisted leaf nodes.
//!
//! Each leaf's raw markup is parsed into a [`DisplayRecord`] — metadata,
//! images with resolved media paths and hotspot overlays, and part
//! listings — serialized to JSON on the node. Leaves are normalized
//! independently: a failing leaf is reported and skipped, never aborting
//! the pass for its siblings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{IngestError, Result};
use crate::models::NodeRow;
use crate::xml::Element;

/// Normalized display record persisted as a leaf node's `content_json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayRecord {
    pub issue_number: String,
    pub in_work: bool,
    pub issue_date: NaiveDate,
    pub tech_title: String,
    pub images: Vec<ImageRecord>,
    pub parts: Vec<PartRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    /// Path of the matched media file, relative to the source directory.
    pub path: String,
    pub hotspots: Vec<BTreeMap<String, String>>,
}

/// Raw attribute set of one part reference, passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartRecord {
    pub attributes: BTreeMap<String, String>,
}

/// Lookup of media files by entity name (file stem, extension-agnostic).
#[derive(Debug, Clone)]
pub struct MediaIndex {
    by_stem: HashMap<String, String>,
    dir: String,
}

impl MediaIndex {
    /// Scans the media directory once. A missing directory yields an empty
    /// index, since publications without images carry no media folder.
    pub fn scan(source_dir: &Path, media_dir_name: &str) -> Result<MediaIndex> {
        let dir = source_dir.join(media_dir_name);
        let mut by_stem = HashMap::new();

        if dir.is_dir() {
            for entry in WalkDir::new(&dir) {
                let entry = entry.map_err(|e| {
                    IngestError::MalformedDocument(format!("media scan failed: {e}"))
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let stem = entry
                    .path()
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let relative = entry
                    .path()
                    .strip_prefix(source_dir)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .into_owned();
                by_stem.entry(stem).or_insert(relative);
            }
        }

        Ok(MediaIndex {
            by_stem,
            dir: dir.display().to_string(),
        })
    }

    fn resolve(&self, entity: &str) -> Result<String> {
        self.by_stem
            .get(entity)
            .cloned()
            .ok_or_else(|| IngestError::MediaNotFound {
                entity: entity.to_string(),
                dir: self.dir.clone(),
            })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizeStats {
    pub normalized: usize,
    pub failed: usize,
}

/// Normalizes every leaf node of the publication, isolating per-leaf
/// failures. Returns how many leaves were normalized and how many failed.
pub async fn normalize_publication(
    pool: &SqlitePool,
    publication_id: i64,
    media: &MediaIndex,
) -> Result<NormalizeStats> {
    let nodes = sqlx::query_as::<_, NodeRow>(
        "SELECT n.id, n.is_category, n.title, n.tech_name, n.issue_number, \
                n.content_xml, n.content_json \
         FROM nodes n \
         JOIN node_links l ON l.node_id = n.id \
         WHERE l.publication_id = ? AND n.is_category = 0 \
         ORDER BY n.id",
    )
    .bind(publication_id)
    .fetch_all(pool)
    .await?;

    let mut stats = NormalizeStats::default();
    for node in nodes {
        match normalize_markup(node.content_xml.as_deref().unwrap_or_default(), media) {
            Ok(record) => {
                let json = serde_json::to_string(&record).map_err(|e| {
                    IngestError::MalformedDocument(format!("display record encoding: {e}"))
                })?;
                sqlx::query("UPDATE nodes SET content_json = ? WHERE id = ?")
                    .bind(&json)
                    .bind(node.id)
                    .execute(pool)
                    .await?;
                stats.normalized += 1;
            }
            Err(err) => {
                warn!(
                    node_id = node.id,
                    tech_name = node.tech_name.as_deref().unwrap_or("?"),
                    error = %err,
                    "skipping leaf: normalization failed"
                );
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

/// Parses one leaf's raw markup into its display record. Pure given the
/// markup and the media index, so re-running it yields an identical record.
pub fn normalize_markup(xml: &str, media: &MediaIndex) -> Result<DisplayRecord> {
    let root = Element::parse(xml)?;

    let address = root
        .find(&["identAndStatusSection", "dmAddress"])
        .ok_or_else(|| IngestError::MalformedDocument("leaf has no dmAddress".to_string()))?;

    let issue_info = address
        .find(&["dmIdent", "issueInfo"])
        .ok_or_else(|| IngestError::MalformedDocument("leaf has no issueInfo".to_string()))?;
    let issue_number = issue_info
        .attr("issueNumber")
        .unwrap_or_default()
        .to_string();
    let in_work = issue_info
        .attr("inWork")
        .map(|v| v != "00" && !v.is_empty())
        .unwrap_or(false);

    let issue_date = address
        .find(&["dmAddressItems", "issueDate"])
        .and_then(parse_issue_date)
        .ok_or_else(|| {
            IngestError::MalformedDocument("leaf has no parsable issueDate".to_string())
        })?;

    let tech_title = address
        .find(&["dmAddressItems", "dmTitle", "techName"])
        .map(|e| e.text())
        .unwrap_or_default();

    let mut images = Vec::new();
    for graphic in root.descendants_named("graphic") {
        let entity = graphic.attr("infoEntityIdent").ok_or_else(|| {
            IngestError::MalformedDocument("graphic has no infoEntityIdent".to_string())
        })?;
        let hotspots = graphic
            .children_named("hotspot")
            .map(attribute_map)
            .collect();
        images.push(ImageRecord {
            id: graphic.attr("id").unwrap_or_default().to_string(),
            path: media.resolve(entity)?,
            hotspots,
        });
    }

    let parts = root
        .descendants_named("partRef")
        .into_iter()
        .map(|e| PartRecord {
            attributes: attribute_map(e),
        })
        .collect();

    Ok(DisplayRecord {
        issue_number,
        in_work,
        issue_date,
        tech_title,
        images,
        parts,
    })
}

fn parse_issue_date(elem: &Element) -> Option<NaiveDate> {
    let year: i32 = elem.attr("year")?.parse().ok()?;
    let month: u32 = elem.attr("month")?.parse().ok()?;
    let day: u32 = elem.attr("day")?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn attribute_map(elem: &Element) -> BTreeMap<String, String> {
    elem.attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
