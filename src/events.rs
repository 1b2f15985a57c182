//! Typed payloads for the realtime render channel.
//!
//! The backend pushes events on named channels; payloads are deserialized
//! into these types before the render channel applies them. Delivery order
//! across channel names is not guaranteed, so every payload stands alone.

use serde::{Deserialize, Serialize};

/// Outbound submission event name.
pub const SUBMIT_RENDER_TASK: &str = "submit_render_task";

pub const RENDER_PROGRESS_CHANNEL: &str = "node_render_progress_channel";
pub const THUMB_PROGRESS_CHANNEL: &str = "node_thumb_progress_channel";
pub const THUMB_FINISH_CHANNEL: &str = "node_thumb_finish_channel";
pub const RENDER_FINISH_CHANNEL: &str = "node_render_finish_channel";

/// Render submission payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitRequest {
    pub start: i32,
    pub end: i32,
    pub step: i32,
    pub path: String,
    pub file: String,
}

/// Server acknowledgement of a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAck {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RenderProgress {
    #[serde(rename = "nodePath")]
    pub node_path: String,
    /// Percentage, 0 to 100.
    pub progress: f32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ThumbFinish {
    #[serde(rename = "nodePath")]
    pub node_path: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "hipFile")]
    pub hip_file: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RenderFinish {
    #[serde(rename = "nodePath")]
    pub node_path: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "frameRange")]
    pub frame_range: (i32, i32),
}

/// One inbound push event, dispatched by channel name.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    RenderProgress(RenderProgress),
    /// Opaque thumbnail progress, logged only.
    ThumbProgress(serde_json::Value),
    ThumbFinish(ThumbFinish),
    RenderFinish(RenderFinish),
}

impl ChannelEvent {
    /// Decode a raw `(channel, payload)` pair. Unknown channel names and
    /// malformed payloads yield `None`; the pump logs and moves on.
    pub fn decode(channel: &str, payload: serde_json::Value) -> Option<ChannelEvent> {
        match channel {
            RENDER_PROGRESS_CHANNEL => serde_json::from_value(payload)
                .ok()
                .map(ChannelEvent::RenderProgress),
            THUMB_PROGRESS_CHANNEL => Some(ChannelEvent::ThumbProgress(payload)),
            THUMB_FINISH_CHANNEL => serde_json::from_value(payload)
                .ok()
                .map(ChannelEvent::ThumbFinish),
            RENDER_FINISH_CHANNEL => serde_json::from_value(payload)
                .ok()
                .map(ChannelEvent::RenderFinish),
            _ => None,
        }
    }
}
