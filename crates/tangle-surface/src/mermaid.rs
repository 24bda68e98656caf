//! Mermaid flowchart export.
//!
//! Pure, deterministic serialization of the graph for clipboard or file
//! interchange. Byte-identical output for identical input sequences; since
//! the store materializes sequences in id order, converged peers export
//! identical text.

use std::fmt::Write;

use tangle_core::{EdgeRecord, NodeRecord};

/// Mermaid identifiers allow only alphanumerics here; everything else
/// becomes an underscore.
fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Double quotes and line breaks would terminate the label string early;
/// each becomes a single space.
fn sanitize_label(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '"' | '\n' | '\r' => ' ',
            c => c,
        })
        .collect()
}

/// Render the graph as a top-down mermaid flowchart.
pub fn to_mermaid(nodes: &[NodeRecord], edges: &[EdgeRecord]) -> String {
    let mut out = String::from("graph TD\n");

    for node in nodes {
        let id = sanitize_id(node.id.as_str());
        let label = if node.attributes.label.is_empty() {
            "Empty".to_string()
        } else {
            sanitize_label(&node.attributes.label)
        };
        let _ = writeln!(out, "    {id}[\"{label}\"]");
    }

    for edge in edges {
        let source = sanitize_id(edge.source.as_str());
        let target = sanitize_id(edge.target.as_str());
        let _ = writeln!(out, "    {source} --> {target}");
    }

    out
}
