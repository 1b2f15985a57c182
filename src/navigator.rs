//! Context navigation: moving between hierarchy contexts and repopulating
//! the displayed graph.
//!
//! Each navigation is a fetch-then-swap: the element set is replaced
//! wholesale on success (contexts are disjoint subgraphs, no diffing), the
//! breadcrumb trail is regenerated, layout reruns and a previously cached
//! view is restored if the user has been in that context before. A failed
//! fetch leaves the previous context fully intact.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use log::{debug, error, info};
use uuid::Uuid;

use crate::backend::GraphSource;
use crate::graph::{ContextPayload, Element, NodeData};
use crate::session::{Session, ViewState};

/// Graph canvas collaborator (the cytoscape-equivalent). The navigator only
/// needs wholesale repopulation, layout and camera framing.
pub trait GraphView {
    fn clear(&mut self);
    fn add_elements(&mut self, elements: &[Element]);
    fn run_layout(&mut self);
    /// Current camera framing, captured when leaving a context.
    fn view(&self) -> ViewState;
    fn restore_view(&mut self, view: ViewState);
}

/// One clickable segment of the context path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub label: String,
    /// Accumulated ancestor path this segment navigates to.
    pub target: String,
}

/// Split a context path into breadcrumbs, one per non-empty segment, each
/// targeting the path accumulated so far.
pub fn breadcrumb_trail(path: &str) -> Vec<Breadcrumb> {
    let mut running = String::new();
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            running.push('/');
            running.push_str(segment);
            Breadcrumb { label: segment.to_string(), target: running.clone() }
        })
        .collect()
}

pub struct ContextNavigator<S: GraphSource, V: GraphView> {
    source: S,
    view: V,
    session: Arc<Mutex<Session>>,
    /// Elements of the currently displayed context.
    elements: Vec<Element>,
    breadcrumbs: Vec<Breadcrumb>,
    can_cook_all: bool,
    /// Monotonic navigation counter; responses carrying a stale token are
    /// discarded instead of clobbering a newer context.
    nav_seq: u64,
}

impl<S: GraphSource, V: GraphView> ContextNavigator<S, V> {
    pub fn new(source: S, view: V, session: Arc<Mutex<Session>>) -> Self {
        Self {
            source,
            view,
            session,
            elements: Vec::new(),
            breadcrumbs: Vec::new(),
            can_cook_all: false,
            nav_seq: 0,
        }
    }

    /// Load a freshly uploaded file: set the file identity (clearing the
    /// node-state cache), enter the default context without capturing a
    /// view, and store the file's playback range.
    pub fn initialize(&mut self, file: Uuid, default_context: &str) -> Result<()> {
        self.session.lock().unwrap().set_active_file(file);

        let payload = self.switch_context(default_context, false)?;
        if let Some(payload) = payload {
            let mut session = self.session.lock().unwrap();
            if let (Some(start), Some(end)) = (payload.default_start(), payload.default_end()) {
                session.set_file_defaults(start, end);
            }
        }
        info!("Initialized node graph for {file} at {default_context}");
        Ok(())
    }

    /// Navigate to a context, capturing the outgoing context's view first.
    pub fn navigate(&mut self, target: &str) -> Result<()> {
        self.switch_context(target, true).map(|_| ())
    }

    /// Double-click entry. Only nodes the backend flagged as enterable
    /// respond; returns whether a navigation happened.
    pub fn enter_node(&mut self, path: &str) -> Result<bool> {
        let can_enter = self
            .displayed_nodes()
            .find(|n| n.path == path)
            .map(|n| n.can_enter);
        match can_enter {
            Some(true) => {
                self.navigate(path)?;
                Ok(true)
            }
            Some(false) => {
                debug!("Node {path} is not enterable");
                Ok(false)
            }
            None => {
                debug!("Node {path} is not in the displayed context");
                Ok(false)
            }
        }
    }

    /// Capture the current view before the graph is hidden for the 3D
    /// viewer. Keyed by the current context so returning restores framing.
    pub fn leave_for_viewer(&mut self) {
        let view = self.view.view();
        let mut session = self.session.lock().unwrap();
        let context = session.active_context().to_string();
        session.cache_view(&context, view);
    }

    /// Return from the viewer to the last-known context (the default
    /// context if none). No view capture: [`leave_for_viewer`] already did.
    ///
    /// [`leave_for_viewer`]: ContextNavigator::leave_for_viewer
    pub fn reenter_last_context(&mut self) -> Result<()> {
        let target = self.session.lock().unwrap().active_context().to_string();
        self.switch_context(&target, false).map(|_| ())
    }

    fn switch_context(&mut self, target: &str, capture_view: bool) -> Result<Option<ContextPayload>> {
        let file = match self.session.lock().unwrap().active_file() {
            Some(file) => file,
            None => bail!("No scene file loaded; upload one before navigating"),
        };

        self.nav_seq += 1;
        let token = self.nav_seq;

        let payload = self
            .source
            .fetch(file, target)
            .with_context(|| format!("Error fetching node data for {target}"))
            .inspect_err(|e| error!("{e:#}"))?;

        if token != self.nav_seq {
            debug!("Discarding stale navigation response for {target}");
            return Ok(None);
        }

        {
            let mut session = self.session.lock().unwrap();
            // Capture the outgoing view before the context switch; the
            // cache is keyed by the context being left behind.
            if capture_view {
                let outgoing = session.active_context().to_string();
                session.cache_view(&outgoing, self.view.view());
            }
            session.set_context(target);
            if let Some(id) = &payload.session_id {
                session.set_session_id(id);
            }
        }

        self.view.clear();
        self.view.add_elements(&payload.elements);
        self.view.run_layout();
        if let Some(cached) = self.session.lock().unwrap().view(target) {
            self.view.restore_view(cached);
        }

        self.elements = payload.elements.clone();
        self.breadcrumbs = breadcrumb_trail(target);
        self.can_cook_all = payload.can_cook_all;
        debug!("Displayed context {target} ({} elements)", self.elements.len());
        Ok(Some(payload))
    }

    pub fn breadcrumbs(&self) -> &[Breadcrumb] {
        &self.breadcrumbs
    }

    pub fn displayed_nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.elements.iter().filter_map(|e| match e {
            Element::Node { data } => Some(data),
            Element::Edge { .. } => None,
        })
    }

    /// Whether the current context supports a whole-context render.
    pub fn can_cook_all(&self) -> bool {
        self.can_cook_all
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Pan;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeSource {
        payloads: HashMap<String, String>,
        fail: bool,
        fetches: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new() -> Self {
            let mut payloads = HashMap::new();
            payloads.insert(
                "/obj".to_string(),
                r#"{"elements": [
                    {"data": {"id": "geo1", "path": "/obj/geo1", "can_enter": true}},
                    {"data": {"id": "cam1", "path": "/obj/cam1", "can_enter": false}}
                ], "start": 1.0, "end": 120.0, "session_id": "s1", "can_cook_all": true}"#
                    .to_string(),
            );
            payloads.insert(
                "/obj/geo1".to_string(),
                r#"{"elements": [
                    {"data": {"id": "box1", "path": "/obj/geo1/box1"}}
                ]}"#
                .to_string(),
            );
            Self { payloads, fail: false, fetches: RefCell::new(Vec::new()) }
        }
    }

    impl GraphSource for FakeSource {
        fn fetch(&self, _file: Uuid, context: &str) -> Result<ContextPayload> {
            self.fetches.borrow_mut().push(context.to_string());
            if self.fail {
                bail!("HTTP 500");
            }
            let body = self
                .payloads
                .get(context)
                .with_context(|| format!("HTTP 404 for {context}"))?;
            Ok(serde_json::from_str(body)?)
        }
    }

    #[derive(Default)]
    struct FakeView {
        current: Option<ViewState>,
        elements: Vec<Element>,
        restored: Vec<ViewState>,
        layouts: usize,
    }

    impl GraphView for FakeView {
        fn clear(&mut self) {
            self.elements.clear();
        }
        fn add_elements(&mut self, elements: &[Element]) {
            self.elements.extend_from_slice(elements);
        }
        fn run_layout(&mut self) {
            self.layouts += 1;
        }
        fn view(&self) -> ViewState {
            self.current
                .unwrap_or(ViewState { zoom: 1.0, pan: Pan::default() })
        }
        fn restore_view(&mut self, view: ViewState) {
            self.restored.push(view);
        }
    }

    fn navigator() -> ContextNavigator<FakeSource, FakeView> {
        ContextNavigator::new(
            FakeSource::new(),
            FakeView::default(),
            Arc::new(Mutex::new(Session::new())),
        )
    }

    #[test]
    fn test_breadcrumb_trail_accumulates_paths() {
        let crumbs = breadcrumb_trail("/obj/geo1/subnet2");
        assert_eq!(crumbs.len(), 3);
        assert_eq!(crumbs[0], Breadcrumb { label: "obj".into(), target: "/obj".into() });
        assert_eq!(crumbs[1].target, "/obj/geo1");
        assert_eq!(crumbs[2].target, "/obj/geo1/subnet2");
    }

    #[test]
    fn test_breadcrumb_trail_discards_empty_segments() {
        assert!(breadcrumb_trail("/").is_empty());
        assert_eq!(breadcrumb_trail("//obj//geo1").len(), 2);
    }

    #[test]
    fn test_initialize_sets_defaults_and_session_id() {
        let mut nav = navigator();
        let session = Arc::clone(&nav.session);
        nav.initialize(Uuid::new_v4(), "/obj").unwrap();

        let session = session.lock().unwrap();
        assert_eq!(session.active_context(), "/obj");
        assert_eq!(session.default_start(), 1);
        assert_eq!(session.default_end(), 120);
        assert_eq!(session.session_id(), Some("s1"));
        assert_eq!(nav.breadcrumbs().len(), 1);
        assert!(nav.can_cook_all());
        assert_eq!(nav.displayed_nodes().count(), 2);
    }

    #[test]
    fn test_initialize_does_not_capture_view() {
        let mut nav = navigator();
        let session = Arc::clone(&nav.session);
        nav.initialize(Uuid::new_v4(), "/obj").unwrap();
        // First entry: nothing was left behind, nothing cached
        assert!(session.lock().unwrap().view("/obj").is_none());
        assert!(nav.view().restored.is_empty());
    }

    #[test]
    fn test_navigate_away_and_back_restores_view() {
        let mut nav = navigator();
        let session = Arc::clone(&nav.session);
        nav.initialize(Uuid::new_v4(), "/obj").unwrap();

        let framing = ViewState { zoom: 2.5, pan: Pan { x: 40.0, y: -7.0 } };
        nav.view_mut().current = Some(framing);

        // Leaving /obj captures its view, keyed by the outgoing context
        nav.navigate("/obj/geo1").unwrap();
        assert_eq!(session.lock().unwrap().view("/obj"), Some(framing));
        assert_eq!(session.lock().unwrap().active_context(), "/obj/geo1");
        // geo1 was never left, so entering it uses layout defaults
        assert!(nav.view().restored.is_empty());

        // Coming back restores the captured framing
        nav.navigate("/obj").unwrap();
        assert_eq!(nav.view().restored, vec![framing]);
    }

    #[test]
    fn test_failed_navigation_leaves_state_untouched() {
        let mut nav = navigator();
        let session = Arc::clone(&nav.session);
        nav.initialize(Uuid::new_v4(), "/obj").unwrap();

        nav.source.fail = true;
        assert!(nav.navigate("/obj/geo1").is_err());

        let session = session.lock().unwrap();
        assert_eq!(session.active_context(), "/obj");
        // No view captured for a navigation that never happened
        assert!(session.view("/obj").is_none());
        assert_eq!(nav.displayed_nodes().count(), 2);
        assert_eq!(nav.breadcrumbs().len(), 1);
    }

    #[test]
    fn test_navigate_without_file_fails() {
        let mut nav = navigator();
        assert!(nav.navigate("/obj").is_err());
        assert!(nav.source.fetches.borrow().is_empty());
    }

    #[test]
    fn test_enter_node_respects_enterable_flag() {
        let mut nav = navigator();
        nav.initialize(Uuid::new_v4(), "/obj").unwrap();

        assert!(!nav.enter_node("/obj/cam1").unwrap());
        assert!(!nav.enter_node("/obj/unknown").unwrap());
        assert_eq!(nav.session.lock().unwrap().active_context(), "/obj");

        assert!(nav.enter_node("/obj/geo1").unwrap());
        assert_eq!(nav.session.lock().unwrap().active_context(), "/obj/geo1");
        assert_eq!(nav.displayed_nodes().count(), 1);
    }

    #[test]
    fn test_leave_and_reenter_round_trip() {
        let mut nav = navigator();
        let session = Arc::clone(&nav.session);
        nav.initialize(Uuid::new_v4(), "/obj").unwrap();
        nav.navigate("/obj/geo1").unwrap();

        let framing = ViewState { zoom: 0.5, pan: Pan { x: 3.0, y: 4.0 } };
        nav.view_mut().current = Some(framing);
        nav.leave_for_viewer();
        assert_eq!(session.lock().unwrap().view("/obj/geo1"), Some(framing));

        nav.view_mut().restored.clear();
        nav.reenter_last_context().unwrap();
        assert_eq!(session.lock().unwrap().active_context(), "/obj/geo1");
        assert_eq!(nav.view().restored, vec![framing]);
    }
}
