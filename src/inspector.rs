//! Per-node inspector panels (the graph "poppers").
//!
//! Panels are ephemeral UI; everything worth keeping lives in the session
//! cache. A panel is created on first click, toggled on repeat clicks of
//! the same node, and deactivated (hidden, listeners off, DOM kept) when a
//! different node is clicked. At most one panel is interactive at a time.
//!
//! Overlay positioning and lifecycle belong to the [`OverlayHost`]
//! collaborator; this module only decides what a panel shows and when.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::channel::{PanelSink, RenderChannel, SubmitError};
use crate::graph::NodeData;
use crate::session::Session;

/// Status shown when a node has never cooked.
pub const UNCOOKED_LABEL: &str = "Uncooked";

/// Everything an overlay needs to render one panel.
///
/// `disabled_reason` selects the reduced variant: identity plus the reason,
/// no frame inputs, no submit control.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelContent {
    pub node_name: String,
    pub node_path: String,
    pub disabled_reason: Option<String>,
    pub last_cooked: String,
    pub thumbnail: Option<String>,
    pub start_frame: i32,
    pub end_frame: i32,
    /// Renders the progress bar full for already-cooked nodes.
    pub has_cooked: bool,
}

/// Incremental update pushed into an existing panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelUpdate {
    Progress(f32),
    /// `None` hides the thumbnail (a fresh submission invalidates it).
    Thumbnail(Option<String>),
    LastCooked(String),
}

/// Overlay collaborator: attach a surface near a graph node, reposition it
/// as the anchor moves, tear it down on request. Positioning math is out of
/// scope here.
pub trait OverlayHost {
    type Handle;

    fn open(&mut self, anchor_node: &str, content: PanelContent) -> Self::Handle;
    fn set_visible(&mut self, handle: &Self::Handle, visible: bool);
    /// Enable or disable the overlay's event listeners without destroying
    /// its surface.
    fn set_interactive(&mut self, handle: &Self::Handle, interactive: bool);
    fn apply(&mut self, handle: &Self::Handle, update: PanelUpdate);
    fn destroy(&mut self, handle: Self::Handle);
}

struct Panel<T> {
    handle: T,
    node_path: String,
    cookable: bool,
    visible: bool,
}

pub struct PanelManager<H: OverlayHost> {
    host: H,
    session: Arc<Mutex<Session>>,
    /// Node id to panel; populated lazily, cleared on context switches.
    panels: HashMap<String, Panel<H::Handle>>,
    active: Option<String>,
}

impl<H: OverlayHost> PanelManager<H> {
    pub fn new(host: H, session: Arc<Mutex<Session>>) -> Self {
        Self { host, session, panels: HashMap::new(), active: None }
    }

    /// Handle a click on a graph node.
    ///
    /// Same node: toggle visibility. Different node: deactivate the previous
    /// panel first, then show (or create) this one as the sole active panel.
    pub fn click(&mut self, node: &NodeData) {
        if let Some(previous) = self.active.clone() {
            if previous == node.id {
                self.toggle(&node.id);
                return;
            }
            self.deactivate(&previous);
        }
        self.active = Some(node.id.clone());
        self.activate(node);
    }

    fn toggle(&mut self, node_id: &str) {
        if let Some(panel) = self.panels.get_mut(node_id) {
            panel.visible = !panel.visible;
            self.host.set_visible(&panel.handle, panel.visible);
        }
    }

    fn deactivate(&mut self, node_id: &str) {
        if let Some(panel) = self.panels.get_mut(node_id) {
            panel.visible = false;
            self.host.set_interactive(&panel.handle, false);
            self.host.set_visible(&panel.handle, false);
        }
    }

    fn activate(&mut self, node: &NodeData) {
        if let Some(panel) = self.panels.get_mut(&node.id) {
            // Re-toggle: surface survives deactivation, just wake it up
            panel.visible = true;
            self.host.set_interactive(&panel.handle, true);
            self.host.set_visible(&panel.handle, true);
            return;
        }

        let content = self.build_content(node);
        let handle = self.host.open(&node.id, content);
        self.panels.insert(
            node.id.clone(),
            Panel {
                handle,
                node_path: node.path.clone(),
                cookable: node.can_cook.allowed(),
                visible: true,
            },
        );
        debug!("Opened inspector panel for {}", node.path);
    }

    /// Populate from the session cache, falling back to backend data and
    /// session defaults for fields never touched.
    fn build_content(&self, node: &NodeData) -> PanelContent {
        let session = self.session.lock().expect("lock");
        let cache = session.node_state(&node.path);

        let disabled_reason = if node.can_cook.allowed() {
            None
        } else {
            Some(node.can_cook.reason().to_string())
        };
        let last_cooked = cache
            .and_then(|c| c.last_cooked.clone())
            .or_else(|| node.cooktime.clone())
            .unwrap_or_else(|| UNCOOKED_LABEL.to_string());

        PanelContent {
            node_name: node.id.clone(),
            node_path: node.path.clone(),
            disabled_reason,
            last_cooked,
            thumbnail: cache.and_then(|c| c.thumbnail.clone()),
            start_frame: cache
                .and_then(|c| c.start_frame)
                .unwrap_or_else(|| session.default_start()),
            end_frame: cache
                .and_then(|c| c.end_frame)
                .unwrap_or_else(|| session.default_end()),
            has_cooked: cache.map(|c| c.has_cooked).unwrap_or(false),
        }
    }

    /// Frame edits persist immediately, not on submit, so a reopened panel
    /// reflects the user's last intent.
    pub fn edit_start_frame(&mut self, node_id: &str, frame: i32) {
        if let Some(panel) = self.panels.get(node_id) {
            self.session
                .lock()
                .expect("lock")
                .cache_start_frame(&panel.node_path, frame);
        } else {
            warn!("Frame edit for unknown panel {node_id}");
        }
    }

    pub fn edit_end_frame(&mut self, node_id: &str, frame: i32) {
        if let Some(panel) = self.panels.get(node_id) {
            self.session
                .lock()
                .expect("lock")
                .cache_end_frame(&panel.node_path, frame);
        } else {
            warn!("Frame edit for unknown panel {node_id}");
        }
    }

    /// Submit a render for the panel's node using its cached frame range
    /// (session defaults when never edited). On acceptance the stale
    /// thumbnail is hidden until the new one arrives.
    pub fn submit(
        &mut self,
        node_id: &str,
        channel: &mut RenderChannel,
    ) -> Result<String, SubmitError> {
        let (path, cookable) = match self.panels.get(node_id) {
            Some(panel) => (panel.node_path.clone(), panel.cookable),
            None => return Err(SubmitError::PanelMissing(node_id.to_string())),
        };
        if !cookable {
            return Err(SubmitError::NotCookable(path));
        }

        let (start, end) = {
            let session = self.session.lock().expect("lock");
            let cache = session.node_state(&path);
            (
                cache.and_then(|c| c.start_frame).unwrap_or_else(|| session.default_start()),
                cache.and_then(|c| c.end_frame).unwrap_or_else(|| session.default_end()),
            )
        };

        let message = channel.submit_render(&path, start, end)?;
        self.hide_thumbnail(&path);
        info!("Render accepted for {path}: {message}");
        Ok(message)
    }

    /// Destroy every panel. Called when the displayed context changes;
    /// panels from the old context have no anchors in the new one.
    pub fn clear(&mut self) {
        for (_, panel) in self.panels.drain() {
            self.host.destroy(panel.handle);
        }
        self.active = None;
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_open(&self, node_id: &str) -> bool {
        self.panels.contains_key(node_id)
    }

    pub fn is_visible(&self, node_id: &str) -> bool {
        self.panels.get(node_id).map(|p| p.visible).unwrap_or(false)
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

/// Panels are keyed by node id; push events address node paths, so the
/// sink scans for a match.
fn find_by_path<'a, T>(
    panels: &'a HashMap<String, Panel<T>>,
    node_path: &str,
) -> Option<&'a Panel<T>> {
    panels.values().find(|p| p.node_path == node_path)
}

/// Push-event surface: updates apply only when a panel for the path exists,
/// absent targets are silently ignored.
impl<H: OverlayHost> PanelSink for PanelManager<H> {
    fn set_progress(&mut self, node_path: &str, progress: f32) {
        if let Some(panel) = find_by_path(&self.panels, node_path) {
            self.host.apply(&panel.handle, PanelUpdate::Progress(progress));
        }
    }

    fn set_thumbnail(&mut self, node_path: &str, url: &str) {
        if let Some(panel) = find_by_path(&self.panels, node_path) {
            self.host
                .apply(&panel.handle, PanelUpdate::Thumbnail(Some(url.to_string())));
        }
    }

    fn set_last_cooked(&mut self, node_path: &str, stamp: &str) {
        if let Some(panel) = find_by_path(&self.panels, node_path) {
            self.host
                .apply(&panel.handle, PanelUpdate::LastCooked(stamp.to_string()));
        }
    }

    fn hide_thumbnail(&mut self, node_path: &str) {
        if let Some(panel) = find_by_path(&self.panels, node_path) {
            self.host.apply(&panel.handle, PanelUpdate::Thumbnail(None));
        }
    }
}
