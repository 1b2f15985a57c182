//! 3D viewer boundary.
//!
//! The viewer itself (mesh loading, lighting, camera) is an external
//! collaborator; the session core only ever hands it an output key and a
//! frame range looked up from the render registry.

use log::debug;

use crate::session::Session;

/// Shown when the session has no completed render yet.
pub const PLACEHOLDER_MODEL: &str = "placeholder.glb";

/// Frame range for outputs the registry knows nothing about.
pub const FALLBACK_FRAME_RANGE: (i32, i32) = (1, 240);

pub trait ViewerBridge {
    fn load_model(&mut self, output_key: &str, frame_range: (i32, i32));
    fn is_displaying(&self) -> bool;
}

/// Load a render output into the viewer: the requested key if given, else
/// the session's latest render, else the placeholder. The frame range comes
/// from the registry, with a fixed fallback for unknown keys.
pub fn display_model(session: &Session, viewer: &mut dyn ViewerBridge, requested: Option<&str>) {
    let key = requested
        .or_else(|| session.latest_render())
        .unwrap_or(PLACEHOLDER_MODEL)
        .to_string();
    let frame_range = session
        .render(&key)
        .map(|r| r.frame_range)
        .unwrap_or(FALLBACK_FRAME_RANGE);

    debug!("Displaying model {key} with frame range {frame_range:?}");
    viewer.load_model(&key, frame_range);
}
