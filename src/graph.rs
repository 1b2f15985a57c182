//! Wire data model for the `GET /node_data` endpoint.
//!
//! The backend serializes one graph context: a flat element list (nodes and
//! the edges between them), icons for the ancestor contexts shown in the
//! breadcrumb bar, the file's playback range and a session id.

use std::collections::HashMap;

use serde::Deserialize;

/// Everything the backend reports for one context.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextPayload {
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Ancestor context name to icon data URI.
    #[serde(default)]
    pub parent_icons: HashMap<String, String>,
    /// Playback range; Houdini reports frames as floats.
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub session_id: Option<String>,
    /// Node type category of the context (e.g. "Sop").
    pub category: Option<String>,
    /// Whether the whole context can be cooked with one submission.
    #[serde(default)]
    pub can_cook_all: bool,
}

impl ContextPayload {
    /// Nodes only, in payload order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.elements.iter().filter_map(|e| match e {
            Element::Node { data } => Some(data),
            Element::Edge { .. } => None,
        })
    }

    /// Look up a node by its absolute path.
    pub fn node(&self, path: &str) -> Option<&NodeData> {
        self.nodes().find(|n| n.path == path)
    }

    pub fn default_start(&self) -> Option<i32> {
        self.start.map(|f| f.round() as i32)
    }

    pub fn default_end(&self) -> Option<i32> {
        self.end.map(|f| f.round() as i32)
    }
}

/// One graph element. Edges carry endpoints, nodes carry a path; the
/// untagged match keys off those required fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Element {
    Edge { data: EdgeData },
    Node { data: NodeData },
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeData {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeData {
    /// Node name, unique within its context.
    pub id: String,
    /// Absolute `/`-delimited node path.
    pub path: String,
    pub node_type: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    /// Icon data URI.
    pub icon: Option<String>,
    /// Last cook time known to the backend, if the node ever cooked.
    pub cooktime: Option<String>,
    /// Whether double-clicking enters the node as a child context.
    #[serde(default)]
    pub can_enter: bool,
    /// Cookability flag with a reason when denied.
    #[serde(default)]
    pub can_cook: CanCook,
}

/// `[bool, reason]` pair from the wire. The reason is only meaningful when
/// the flag is false.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CanCook(pub bool, pub String);

impl Default for CanCook {
    fn default() -> Self {
        CanCook(true, String::new())
    }
}

impl CanCook {
    pub fn allowed(&self) -> bool {
        self.0
    }

    pub fn reason(&self) -> &str {
        &self.1
    }
}
