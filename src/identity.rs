//! Identity extraction for content documents (data modules).
//!
//! A data module's identity is its technical name (under the address/title
//! section) plus the issue number attribute of its issue-info element. The
//! same pair is what leaf references in the structure document carry, so
//! both grammars must agree on it exactly.

use crate::error::{IngestError, Result};
use crate::models::{ExtractedModule, ModuleIdentity};
use crate::xml::Element;

/// Parses one content document and extracts its identity along with a
/// deterministic re-serialization of the markup for persistence.
pub fn extract_module(xml: &str) -> Result<ExtractedModule> {
    let root = Element::parse(xml)?;
    let identity = module_identity(&root)?;
    Ok(ExtractedModule {
        identity,
        content_xml: root.to_xml(),
    })
}

fn module_identity(root: &Element) -> Result<ModuleIdentity> {
    let address = root
        .find(&["identAndStatusSection", "dmAddress"])
        .ok_or(IngestError::IncompleteDocument {
            missing: "identAndStatusSection/dmAddress",
        })?;

    let tech_name = address
        .find(&["dmAddressItems", "dmTitle", "techName"])
        .map(|e| e.text())
        .filter(|t| !t.is_empty())
        .ok_or(IngestError::IncompleteDocument {
            missing: "techName",
        })?;

    let issue_number = address
        .find(&["dmIdent", "issueInfo"])
        .and_then(|e| e.attr("issueNumber"))
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .ok_or(IngestError::IncompleteDocument {
            missing: "issueInfo issueNumber",
        })?;

    Ok(ModuleIdentity {
        tech_name,
        issue_number,
    })
}
