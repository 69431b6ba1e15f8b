//! Error types for the ingestion pipeline.
//!
//! Every failure inside the recursive materialization walk is re-wrapped
//! with positional context ([`IngestError::InNode`]) as it unwinds, so the
//! top-level caller receives a single message identifying the exact failing
//! branch of the structure tree.

use thiserror::Error;

/// Where a failing structure entry sits: 1-based position among its
/// same-kind siblings, plus the parent category title (if any).
#[derive(Debug, Clone)]
pub struct NodePosition {
    pub position: usize,
    pub parent: Option<String>,
}

impl std::fmt::Display for NodePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.parent {
            Some(title) => write!(f, "entry #{} under '{}'", self.position, title),
            None => write!(f, "entry #{} (no parent)", self.position),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// A content document is missing its technical name or issue number.
    #[error("incomplete document: missing {missing}")]
    IncompleteDocument { missing: &'static str },

    /// A content document in the source directory failed identity extraction.
    #[error("could not extract identity from '{file}': {source}")]
    MissingIdentity {
        file: String,
        #[source]
        source: Box<IngestError>,
    },

    /// No structure document found in the source directory.
    #[error("could not find a '{prefix}' structure file in {dir}")]
    StructureNotFound { prefix: String, dir: String },

    /// More than one structure document found in the source directory.
    #[error("found {count} '{prefix}' structure files in {dir}, expected exactly one")]
    AmbiguousStructure {
        prefix: String,
        dir: String,
        count: usize,
    },

    /// The structure document's identity/status section is missing a
    /// required publication property.
    #[error("incomplete publication: missing {missing}")]
    IncompletePublication { missing: &'static str },

    /// A leaf reference matched no staged content document.
    #[error("unresolved leaf reference {at}: no staged module named '{tech_name}' issue {issue_number}")]
    UnresolvedLeaf {
        at: NodePosition,
        tech_name: String,
        issue_number: String,
    },

    /// A leaf reference matched more than one staged content document.
    #[error("ambiguous leaf reference {at}: {matches} staged modules named '{tech_name}' issue {issue_number}")]
    AmbiguousLeaf {
        at: NodePosition,
        tech_name: String,
        issue_number: String,
        matches: usize,
    },

    /// A category entry has no title.
    #[error("category {at} has no title")]
    MissingCategoryTitle { at: NodePosition },

    /// An image reference matched no file in the media directory.
    #[error("no media file found for entity '{entity}' in {dir}")]
    MediaNotFound { entity: String, dir: String },

    /// A required element or attribute could not be parsed.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Structure nesting exceeded the configured depth limit.
    #[error("structure nesting exceeds the configured maximum depth of {max}")]
    TooDeep { max: usize },

    /// Positional context wrapped around a failure deeper in the walk.
    #[error("while materializing {at}: {source}")]
    InNode {
        at: NodePosition,
        #[source]
        source: Box<IngestError>,
    },

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Wraps `self` with the position of the structure entry being
    /// materialized when the failure occurred.
    pub fn in_node(self, position: usize, parent: Option<&str>) -> Self {
        IngestError::InNode {
            at: NodePosition {
                position,
                parent: parent.map(|s| s.to_string()),
            },
            source: Box::new(self),
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_display_with_and_without_parent() {
        let at = NodePosition {
            position: 3,
            parent: Some("Engine".to_string()),
        };
        assert_eq!(at.to_string(), "entry #3 under 'Engine'");

        let root = NodePosition {
            position: 1,
            parent: None,
        };
        assert_eq!(root.to_string(), "entry #1 (no parent)");
    }

    #[test]
    fn wrapping_renders_the_failing_branch() {
        let inner = IngestError::UnresolvedLeaf {
            at: NodePosition {
                position: 2,
                parent: Some("Maintenance".to_string()),
            },
            tech_name: "Oil pump".to_string(),
            issue_number: "001".to_string(),
        };
        let wrapped = inner.in_node(1, None);
        let msg = format!("{}", wrapped);
        assert!(msg.contains("entry #1 (no parent)"));
        let cause = std::error::Error::source(&wrapped).unwrap();
        assert!(cause.to_string().contains("entry #2 under 'Maintenance'"));
        assert!(cause.to_string().contains("Oil pump"));
    }
}
