//! Core data models used throughout the ingestion pipeline.
//!
//! These types represent the identities, structure entries, and persisted
//! rows that flow from the source directory into the content tree.

/// The (technical name, issue number) pair identifying one content
/// document. Leaf references in the structure document resolve against
/// staged modules by exact equality on this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleIdentity {
    pub tech_name: String,
    pub issue_number: String,
}

/// Identity plus re-serialized markup, as produced by the identity
/// extractor for one content document.
#[derive(Debug, Clone)]
pub struct ExtractedModule {
    pub identity: ModuleIdentity,
    pub content_xml: String,
}

/// Publication properties parsed from the structure document's
/// identity/status section.
#[derive(Debug, Clone)]
pub struct PublicationProps {
    pub title: String,
    /// Eleven coded attributes joined by hyphens, in fixed order.
    pub code: String,
    pub issue_number: String,
    pub content_xml: String,
}

/// One staged content document, scoped to a single ingestion run.
#[derive(Debug, Clone)]
pub struct StagedModule {
    pub identity: ModuleIdentity,
    pub content_xml: String,
    pub file_name: String,
}

/// A parsed child of the structure document's content tree, before
/// anything is persisted. Parsing and persistence stay separate: the
/// materializer consumes this typed tree.
#[derive(Debug, Clone)]
pub enum StructureChild {
    /// A grouping entry with a display title and nested children.
    Category {
        title: String,
        children: Vec<StructureChild>,
    },
    /// A reference to a content document by identity.
    LeafRef { identity: ModuleIdentity },
}

/// A persisted tree node row, as read back for normalization and lookups.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NodeRow {
    pub id: i64,
    pub is_category: bool,
    pub title: String,
    pub tech_name: Option<String>,
    pub issue_number: Option<String>,
    pub content_xml: Option<String>,
    pub content_json: Option<String>,
}
