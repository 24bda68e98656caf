//! Graph record values.
//!
//! NodeRecord and EdgeRecord are the two replicated value types. They are
//! plain data: every update replaces the whole record, because the map layer
//! merges at key granularity, not field granularity. Two peers editing
//! different fields of the same record concurrently resolve to one peer's
//! full write.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::InvalidShape;
use super::identity::{EdgeId, NodeId};

/// Canvas position in logical units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Node shape tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    #[default]
    Pill,
    Circle,
    Diamond,
    Rectangle,
    RoundedRectangle,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Pill => "pill",
            Shape::Circle => "circle",
            Shape::Diamond => "diamond",
            Shape::Rectangle => "rectangle",
            Shape::RoundedRectangle => "rounded-rectangle",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidShape> {
        match raw {
            "pill" => Ok(Shape::Pill),
            "circle" => Ok(Shape::Circle),
            "diamond" => Ok(Shape::Diamond),
            "rectangle" => Ok(Shape::Rectangle),
            "rounded-rectangle" => Ok(Shape::RoundedRectangle),
            _ => Err(InvalidShape { raw: raw.into() }),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display attributes of a node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub label: String,
    #[serde(default)]
    pub shape: Shape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A node in the shared graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub position: Position,
    pub kind: String,
    pub attributes: NodeAttributes,
}

impl NodeRecord {
    pub fn new(id: NodeId, position: Position, kind: impl Into<String>) -> Self {
        Self {
            id,
            position,
            kind: kind.into(),
            attributes: NodeAttributes::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.attributes.label = label.into();
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.attributes.shape = shape;
        self
    }
}

/// Display attributes of an edge.
///
/// Color mirrors the source node's color; the store keeps it in sync
/// procedurally via `recolor_outgoing`, not automatically.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A directed edge between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: String,
    pub attributes: EdgeAttributes,
}

impl EdgeRecord {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, kind: impl Into<String>) -> Self {
        Self {
            id,
            source,
            target,
            kind: kind.into(),
            attributes: EdgeAttributes::default(),
        }
    }
}
