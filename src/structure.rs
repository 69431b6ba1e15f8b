//! Structure document parsing.
//!
//! Two concerns, kept separate from persistence: extracting the
//! publication's properties from the identity/status section, and turning
//! the nested content graph into the typed [`StructureChild`] tree the
//! materializer consumes.

use crate::error::{IngestError, Result};
use crate::models::{ModuleIdentity, PublicationProps, StructureChild};
use crate::xml::Element;

/// The coded attributes of the status section's dmCode element, joined by
/// hyphens in exactly this order to form the publication's business code.
/// The order and separator are load-bearing: codes already stored by
/// earlier versions of the pipeline must keep matching.
const CODE_ATTRS: [&str; 11] = [
    "modelIdentCode",
    "systemDiffCode",
    "systemCode",
    "subSystemCode",
    "subSubSystemCode",
    "assyCode",
    "disassyCode",
    "disassyCodeVariant",
    "infoCode",
    "infoCodeVariant",
    "itemLocationCode",
];

/// A fully parsed structure document.
#[derive(Debug, Clone)]
pub struct ParsedStructure {
    pub props: PublicationProps,
    pub children: Vec<StructureChild>,
}

/// Parses the structure document: publication properties plus the typed
/// content tree, depth-limited to `max_depth`.
pub fn parse_structure(xml: &str, max_depth: usize) -> Result<ParsedStructure> {
    let root = Element::parse(xml)?;
    let props = props_from_root(&root)?;
    let content = root.child("content").ok_or_else(|| {
        IngestError::MalformedDocument("structure document has no content element".to_string())
    })?;
    let children = parse_children(content, None, 1, max_depth)?;
    Ok(ParsedStructure { props, children })
}

/// Extracts title, business code, and issue number from the structure
/// document's identity/status section.
pub fn publication_props(xml: &str) -> Result<PublicationProps> {
    props_from_root(&Element::parse(xml)?)
}

fn props_from_root(root: &Element) -> Result<PublicationProps> {
    let section = root
        .child("identAndStatusSection")
        .ok_or(IngestError::IncompletePublication {
            missing: "identAndStatusSection",
        })?;

    let title = section
        .find(&["pmAddress", "pmAddressItems", "pmTitle"])
        .map(|e| e.text())
        .filter(|t| !t.is_empty())
        .ok_or(IngestError::IncompletePublication { missing: "pmTitle" })?;

    let issue_number = section
        .find(&["pmAddress", "pmIdent", "issueInfo"])
        .and_then(|e| e.attr("issueNumber"))
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .ok_or(IngestError::IncompletePublication {
            missing: "issueInfo issueNumber",
        })?;

    let dm_code = section
        .find(&["pmStatus", "brexDmRef", "dmRef", "dmRefIdent", "dmCode"])
        .ok_or(IngestError::IncompletePublication {
            missing: "pmStatus dmCode",
        })?;

    let mut parts = Vec::with_capacity(CODE_ATTRS.len());
    for attr in CODE_ATTRS {
        let value = dm_code
            .attr(attr)
            .filter(|v| !v.is_empty())
            .ok_or(IngestError::IncompletePublication { missing: attr })?;
        parts.push(value);
    }

    Ok(PublicationProps {
        title,
        code: parts.join("-"),
        issue_number,
        content_xml: root.to_xml(),
    })
}

/// Recursively parses the children of a content or category element into
/// the tagged variant tree, in document order. Leaf references and
/// categories keep independent 1-based sibling counters, matching how
/// they are later persisted.
fn parse_children(
    node: &Element,
    parent_title: Option<&str>,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<StructureChild>> {
    if depth > max_depth {
        return Err(IngestError::TooDeep { max: max_depth });
    }

    let mut children = Vec::new();
    let mut leaf_count = 0usize;
    let mut category_count = 0usize;

    for child in node.elements() {
        match child.name.as_str() {
            "dmRef" => {
                leaf_count += 1;
                let identity = leaf_ref_identity(child)
                    .map_err(|e| e.in_node(leaf_count, parent_title))?;
                children.push(StructureChild::LeafRef { identity });
            }
            "pmEntry" => {
                category_count += 1;
                let title = child
                    .child("pmEntryTitle")
                    .map(|e| e.text())
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| IngestError::MissingCategoryTitle {
                        at: crate::error::NodePosition {
                            position: category_count,
                            parent: parent_title.map(|s| s.to_string()),
                        },
                    })?;
                let nested = parse_children(child, Some(&title), depth + 1, max_depth)
                    .map_err(|e| e.in_node(category_count, parent_title))?;
                children.push(StructureChild::Category {
                    title,
                    children: nested,
                });
            }
            _ => {} // entry titles and any non-structural markup
        }
    }

    Ok(children)
}

fn leaf_ref_identity(dm_ref: &Element) -> Result<ModuleIdentity> {
    let tech_name = dm_ref
        .find(&["dmRefAddressItems", "dmTitle", "techName"])
        .map(|e| e.text())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            IngestError::MalformedDocument("leaf reference has no techName".to_string())
        })?;

    let issue_number = dm_ref
        .find(&["dmRefIdent", "issueInfo"])
        .and_then(|e| e.attr("issueNumber"))
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            IngestError::MalformedDocument("leaf reference has no issue number".to_string())
        })?;

    Ok(ModuleIdentity {
        tech_name,
        issue_number,
    })
}
