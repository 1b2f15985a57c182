//! HIPGRAPH - Houdini scene node-graph session core
//!
//! Client-side state and protocol layer for a Houdini scene browser: fetch
//! a context's node graph from the render backend, cache per-node state and
//! per-context camera framing across navigations, drive per-node inspector
//! panels, and submit renders over a realtime channel that pushes progress,
//! thumbnail and completion events back out of band.
//!
//! Graph canvas, overlay positioning and the 3D viewer are collaborators
//! behind traits ([`GraphView`], [`OverlayHost`], [`ViewerBridge`]); the
//! crate ships the session logic, not a rendering stack.
//!
//! Typical wiring: construct one shared [`Session`], hand it to a
//! [`ContextNavigator`], a [`PanelManager`] and a [`RenderChannel`], call
//! [`RenderChannel::pump`] from the main loop, and clear the panel manager
//! whenever the navigator switches contexts.

pub mod backend;
pub mod channel;
pub mod cli;
pub mod events;
pub mod graph;
pub mod inspector;
pub mod navigator;
pub mod session;
pub mod viewer;

// Re-export the types most integrations touch
pub use backend::{GraphSource, HttpBackend};
pub use channel::{ACK_TIMEOUT, NoPanels, PanelSink, RenderChannel, RenderSocket, SubmitError};
pub use events::{ChannelEvent, SubmitAck, SubmitRequest};
pub use graph::{ContextPayload, Element, NodeData};
pub use inspector::{OverlayHost, PanelContent, PanelManager, PanelUpdate};
pub use navigator::{Breadcrumb, ContextNavigator, GraphView, breadcrumb_trail};
pub use session::{NodeField, NodeState, Pan, Session, ViewState};
pub use viewer::{ViewerBridge, display_model};
