//! Session state store: single source of truth for navigation and render state.
//!
//! One instance per session (browser-tab equivalent). Holds the active file
//! identity, the active graph context, the per-node state cache, the
//! per-context view cache and the render registry. No UI knowledge; the
//! navigator, inspector and render channel all mutate it through typed
//! methods.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, error};
use uuid::Uuid;

/// Context shown when a scene file is first loaded.
pub const DEFAULT_CONTEXT: &str = "/obj";

/// Fallback playback range until the backend reports the file's own.
pub const FILE_DEFAULT_START: i32 = 1;
pub const FILE_DEFAULT_END: i32 = 240;

/// Cached per-node state. Poppers are ephemeral, so the fields a panel
/// displays survive here between open/close cycles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeState {
    /// Human-readable completion time of the last finished cook.
    pub last_cooked: Option<String>,
    /// Thumbnail URL for the latest render output of this node.
    pub thumbnail: Option<String>,
    pub has_cooked: bool,
    /// User-entered frame range, written through on every edit.
    pub start_frame: Option<i32>,
    pub end_frame: Option<i32>,
}

/// Closed schema of writable [`NodeState`] fields.
///
/// Wire-facing writes name fields as strings; parsing them through this enum
/// keeps the reject-unknown contract while giving internal call sites a
/// compile-time checked setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeField {
    LastCooked,
    Thumbnail,
    HasCooked,
    StartFrame,
    EndFrame,
}

impl NodeField {
    /// Parse a wire-side field name. Returns `None` for anything outside the
    /// fixed schema.
    pub fn parse(name: &str) -> Option<NodeField> {
        match name {
            "lastCooked" => Some(NodeField::LastCooked),
            "thumbnail" => Some(NodeField::Thumbnail),
            "has_cooked" => Some(NodeField::HasCooked),
            "startFrame" => Some(NodeField::StartFrame),
            "endFrame" => Some(NodeField::EndFrame),
            _ => None,
        }
    }
}

/// Graph camera framing for one context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub zoom: f64,
    pub pan: Pan,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pan {
    pub x: f64,
    pub y: f64,
}

/// One completed render output.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRecord {
    pub node_path: String,
    pub frame_range: (i32, i32),
}

/// Session-wide mutable state.
///
/// The render registry is append-only and unbounded for the lifetime of the
/// session; nothing here is persisted, a reload starts clean.
#[derive(Debug)]
pub struct Session {
    active_file: Option<Uuid>,
    active_context: String,
    session_id: Option<String>,
    latest_render: Option<String>,

    node_states: HashMap<String, NodeState>,
    views: HashMap<String, ViewState>,
    renders: IndexMap<String, RenderRecord>,

    file_default_start: i32,
    file_default_end: i32,
    global_default_start: Option<i32>,
    global_default_end: Option<i32>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            active_file: None,
            active_context: DEFAULT_CONTEXT.to_string(),
            session_id: None,
            latest_render: None,
            node_states: HashMap::new(),
            views: HashMap::new(),
            renders: IndexMap::new(),
            file_default_start: FILE_DEFAULT_START,
            file_default_end: FILE_DEFAULT_END,
            global_default_start: None,
            global_default_end: None,
        }
    }

    // ========== File identity ==========

    /// Replace the active file and clear the node-state cache.
    ///
    /// Always clears, even for the same id: cached state may be stale from
    /// an in-progress upload of the same file.
    pub fn set_active_file(&mut self, file: Uuid) {
        debug!("Active file set to {file}, clearing node state cache");
        self.active_file = Some(file);
        self.node_states.clear();
    }

    pub fn active_file(&self) -> Option<Uuid> {
        self.active_file
    }

    /// Backend session id, captured from the first payload that carries one.
    pub fn set_session_id(&mut self, id: &str) {
        if self.session_id.is_none() {
            self.session_id = Some(id.to_string());
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    // ========== Context & view cache ==========

    /// Record a confirmed context switch. The navigator only calls this
    /// after a successful fetch; no path validation happens here.
    pub fn set_context(&mut self, path: &str) {
        self.active_context = path.to_string();
    }

    pub fn active_context(&self) -> &str {
        &self.active_context
    }

    /// Capture the view the user is leaving behind, keyed by the outgoing
    /// context.
    pub fn cache_view(&mut self, context: &str, view: ViewState) {
        self.views.insert(context.to_string(), view);
    }

    /// Cached framing for a context, if the user ever navigated away from
    /// it. Callers supply the layout default on a miss.
    pub fn view(&self, context: &str) -> Option<ViewState> {
        self.views.get(context).copied()
    }

    // ========== Node state cache ==========

    pub fn node_state(&self, path: &str) -> Option<&NodeState> {
        self.node_states.get(path)
    }

    fn state_entry(&mut self, path: &str) -> &mut NodeState {
        self.node_states.entry(path.to_string()).or_default()
    }

    pub fn cache_start_frame(&mut self, path: &str, frame: i32) {
        self.state_entry(path).start_frame = Some(frame);
    }

    pub fn cache_end_frame(&mut self, path: &str, frame: i32) {
        self.state_entry(path).end_frame = Some(frame);
    }

    pub fn cache_thumbnail(&mut self, path: &str, url: &str) {
        self.state_entry(path).thumbnail = Some(url.to_string());
    }

    /// Flag a node as cooked and stamp its completion time.
    pub fn mark_cooked(&mut self, path: &str, stamp: &str) {
        let state = self.state_entry(path);
        state.has_cooked = true;
        state.last_cooked = Some(stamp.to_string());
    }

    /// Loosely-typed write for data still arriving with wire field names.
    ///
    /// Unknown fields and uncoercible values are rejected with a logged
    /// diagnostic and leave the cache untouched. Never panics: malformed
    /// input must not break the calling UI path.
    pub fn update_node_field(&mut self, path: &str, field: &str, value: &serde_json::Value) -> bool {
        let Some(field) = NodeField::parse(field) else {
            error!("Invalid node state update for {field} : {value}");
            return false;
        };
        match field {
            NodeField::LastCooked => match value.as_str() {
                Some(s) => self.state_entry(path).last_cooked = Some(s.to_string()),
                None => return Self::reject(path, "lastCooked", value),
            },
            NodeField::Thumbnail => match value.as_str() {
                Some(s) => self.cache_thumbnail(path, s),
                None => return Self::reject(path, "thumbnail", value),
            },
            NodeField::HasCooked => match value.as_bool() {
                Some(b) => self.state_entry(path).has_cooked = b,
                None => return Self::reject(path, "has_cooked", value),
            },
            NodeField::StartFrame => match coerce_frame(value) {
                Some(f) => self.cache_start_frame(path, f),
                None => return Self::reject(path, "startFrame", value),
            },
            NodeField::EndFrame => match coerce_frame(value) {
                Some(f) => self.cache_end_frame(path, f),
                None => return Self::reject(path, "endFrame", value),
            },
        }
        true
    }

    fn reject(path: &str, field: &str, value: &serde_json::Value) -> bool {
        error!("Rejected node state value for {path}.{field}: {value}");
        false
    }

    // ========== Render registry ==========

    /// Insert a completed render; the newest entry also becomes the latest
    /// render key.
    pub fn record_render(&mut self, output_key: &str, node_path: &str, frame_range: (i32, i32)) {
        self.renders.insert(
            output_key.to_string(),
            RenderRecord { node_path: node_path.to_string(), frame_range },
        );
        self.latest_render = Some(output_key.to_string());
    }

    pub fn render(&self, output_key: &str) -> Option<&RenderRecord> {
        self.renders.get(output_key)
    }

    pub fn latest_render(&self) -> Option<&str> {
        self.latest_render.as_deref()
    }

    pub fn render_count(&self) -> usize {
        self.renders.len()
    }

    // ========== Frame range defaults ==========

    /// Playback range reported by the backend on the initial context load.
    pub fn set_file_defaults(&mut self, start: i32, end: i32) {
        self.file_default_start = start;
        self.file_default_end = end;
    }

    /// User-set overrides; `None` falls back to the file defaults.
    pub fn set_global_default_start(&mut self, frame: Option<i32>) {
        self.global_default_start = frame;
    }

    pub fn set_global_default_end(&mut self, frame: Option<i32>) {
        self.global_default_end = frame;
    }

    pub fn default_start(&self) -> i32 {
        self.global_default_start.unwrap_or(self.file_default_start)
    }

    pub fn default_end(&self) -> i32 {
        self.global_default_end.unwrap_or(self.file_default_end)
    }
}

/// Frame inputs arrive either as JSON numbers or as raw text-field strings.
fn coerce_frame(value: &serde_json::Value) -> Option<i32> {
    if let Some(n) = value.as_i64() {
        return i32::try_from(n).ok();
    }
    value.as_str()?.trim().parse().ok()
}
