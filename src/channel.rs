//! Realtime render channel: submission with acknowledgement timeout and
//! out-of-band progress/completion events.
//!
//! One connection per session, established lazily on the first submission.
//! Inbound events are queued by the socket and drained by [`RenderChannel::pump`]
//! from the main loop; each event updates the session store and any live
//! panel for the affected node path. Handlers are idempotent with respect to
//! panel absence: the panel that originated a request may be long gone by
//! the time its events arrive.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};

use crate::events::{ChannelEvent, SubmitAck, SubmitRequest};
use crate::session::Session;

/// How long a submission waits for the server to acknowledge.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Backend route serving rendered thumbnails.
pub const THUMBNAIL_ROUTE: &str = "/get_thumbnail/";

/// Transport for the realtime channel (the socket.io-equivalent).
///
/// `submit` delivers the acknowledgement on the returned receiver; a sender
/// dropped without replying reads as no acknowledgement. `inbound` hands out
/// the push-event stream as raw `(channel, payload)` pairs.
pub trait RenderSocket {
    fn submit(&mut self, request: &SubmitRequest) -> Receiver<SubmitAck>;
    fn inbound(&self) -> Receiver<(String, serde_json::Value)>;
}

/// Lazily establishes the socket on first use.
pub type SocketConnector = Box<dyn FnMut() -> Result<Box<dyn RenderSocket>> + Send>;

/// Submission failure taxonomy. Validation failures abort before any
/// network traffic; timeout and rejection are distinct conditions (no
/// response at all vs. an explicit server no).
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitError {
    InvalidRange { start: i32, end: i32 },
    NoActiveFile,
    NotConnected(String),
    AckTimeout,
    Rejected(String),
    PanelMissing(String),
    NotCookable(String),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::InvalidRange { start, end } => {
                write!(f, "Start frame must be less than end frame ({start} >= {end})")
            }
            SubmitError::NoActiveFile => write!(f, "No scene file loaded"),
            SubmitError::NotConnected(msg) => write!(f, "Render channel unavailable: {msg}"),
            SubmitError::AckTimeout => write!(f, "Server didn't acknowledge render event"),
            SubmitError::Rejected(msg) => write!(f, "Render submission rejected: {msg}"),
            SubmitError::PanelMissing(id) => write!(f, "No inspector panel for node {id}"),
            SubmitError::NotCookable(reason) => write!(f, "Node cannot cook: {reason}"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Live panel surface the channel pushes updates into. Implementations
/// ignore paths with no visible target.
pub trait PanelSink {
    fn set_progress(&mut self, node_path: &str, progress: f32);
    fn set_thumbnail(&mut self, node_path: &str, url: &str);
    fn set_last_cooked(&mut self, node_path: &str, stamp: &str);
    fn hide_thumbnail(&mut self, node_path: &str);
}

/// Sink for headless use: every update has no visible target.
pub struct NoPanels;

impl PanelSink for NoPanels {
    fn set_progress(&mut self, _node_path: &str, _progress: f32) {}
    fn set_thumbnail(&mut self, _node_path: &str, _url: &str) {}
    fn set_last_cooked(&mut self, _node_path: &str, _stamp: &str) {}
    fn hide_thumbnail(&mut self, _node_path: &str) {}
}

pub struct RenderChannel {
    session: Arc<Mutex<Session>>,
    connector: SocketConnector,
    socket: Option<Box<dyn RenderSocket>>,
    inbound: Option<Receiver<(String, serde_json::Value)>>,
    /// Seconds east of UTC applied to completion stamps. 0 until the
    /// host supplies the viewer's zone.
    clock_offset: i64,
}

impl RenderChannel {
    pub fn new(session: Arc<Mutex<Session>>, connector: SocketConnector) -> Self {
        Self { session, connector, socket: None, inbound: None, clock_offset: 0 }
    }

    /// Shift completion stamps into the viewer's time zone. The process
    /// itself has no zone source; the embedding UI does.
    pub fn set_clock_offset(&mut self, secs_east_of_utc: i64) {
        self.clock_offset = secs_east_of_utc;
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn ensure_connected(&mut self) -> Result<&mut Box<dyn RenderSocket>, SubmitError> {
        if self.socket.is_none() {
            let socket =
                (self.connector)().map_err(|e| SubmitError::NotConnected(e.to_string()))?;
            self.inbound = Some(socket.inbound());
            self.socket = Some(socket);
            info!("Render channel connected");
        }
        Ok(self.socket.as_mut().expect("connected above"))
    }

    /// Submit a render for a node path or whole context.
    ///
    /// Validates locally, connects lazily, then waits up to [`ACK_TIMEOUT`]
    /// for the acknowledgement. Returns the server's message on success.
    pub fn submit_render(
        &mut self,
        path: &str,
        start: i32,
        end: i32,
    ) -> Result<String, SubmitError> {
        if start >= end {
            let err = SubmitError::InvalidRange { start, end };
            error!("{err}");
            return Err(err);
        }
        let file = self
            .session
            .lock()
            .expect("lock")
            .active_file()
            .ok_or(SubmitError::NoActiveFile)?;

        let socket = self.ensure_connected()?;
        let request = SubmitRequest {
            start,
            end,
            step: 1,
            path: path.to_string(),
            file: file.to_string(),
        };
        debug!("Submitting render task: {request:?}");

        let ack = socket.submit(&request);
        match ack.recv_timeout(ACK_TIMEOUT) {
            Err(_) => {
                error!("Server didn't acknowledge render event for {path}");
                Err(SubmitError::AckTimeout)
            }
            Ok(SubmitAck { success: false, message }) => {
                error!("Render submission for {path} rejected: {message}");
                Err(SubmitError::Rejected(message))
            }
            Ok(SubmitAck { message, .. }) => {
                info!("Render submitted for {path}: {message}");
                Ok(message)
            }
        }
    }

    /// Whole-context submission with the session's default frame range.
    pub fn submit_active_context(&mut self) -> Result<String, SubmitError> {
        let (context, start, end) = {
            let session = self.session.lock().expect("lock");
            (
                session.active_context().to_string(),
                session.default_start(),
                session.default_end(),
            )
        };
        self.submit_render(&context, start, end)
    }

    /// Drain pending push events and apply them. Returns the number of
    /// events processed.
    pub fn pump(&mut self, panels: &mut dyn PanelSink) -> usize {
        let Some(rx) = self.inbound.as_ref() else {
            return 0;
        };
        let pending: Vec<_> = rx.try_iter().collect();
        let count = pending.len();
        for (channel, payload) in pending {
            match ChannelEvent::decode(&channel, payload) {
                Some(event) => self.apply(event, panels),
                None => warn!("Ignoring unrecognized event on channel {channel}"),
            }
        }
        count
    }

    fn apply(&mut self, event: ChannelEvent, panels: &mut dyn PanelSink) {
        match event {
            ChannelEvent::RenderProgress(progress) => {
                panels.set_progress(&progress.node_path, progress.progress);
            }
            ChannelEvent::ThumbProgress(payload) => {
                debug!("Thumbnail progress: {payload}");
            }
            ChannelEvent::ThumbFinish(thumb) => {
                let url = format!("{THUMBNAIL_ROUTE}{}", thumb.file_name);
                self.session
                    .lock()
                    .expect("lock")
                    .cache_thumbnail(&thumb.node_path, &url);
                panels.set_thumbnail(&thumb.node_path, &url);
            }
            ChannelEvent::RenderFinish(finish) => {
                let stamp = cook_stamp(self.clock_offset);
                {
                    let mut session = self.session.lock().expect("lock");
                    session.record_render(&finish.file_name, &finish.node_path, finish.frame_range);
                    session.mark_cooked(&finish.node_path, &stamp);
                }
                panels.set_last_cooked(&finish.node_path, &stamp);
            }
        }
    }
}

/// Completion stamp shown in the panel status line. Wall clock at the
/// given offset from UTC.
fn cook_stamp(offset_secs: i64) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format_clock(secs_of_day(secs as i64, offset_secs))
}

fn secs_of_day(epoch_secs: i64, offset_secs: i64) -> u64 {
    (epoch_secs + offset_secs).rem_euclid(86_400) as u64
}

/// 12-hour `HH:MM:SS AM/PM` from seconds since midnight.
fn format_clock(secs_of_day: u64) -> String {
    let hours24 = secs_of_day / 3600;
    let minutes = (secs_of_day % 3600) / 60;
    let seconds = secs_of_day % 60;
    let am_pm = if hours24 >= 12 { "PM" } else { "AM" };
    let hours = match hours24 % 12 {
        0 => 12,
        h => h,
    };
    format!("{hours:02}:{minutes:02}:{seconds:02} {am_pm}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RENDER_FINISH_CHANNEL, RENDER_PROGRESS_CHANNEL, THUMB_FINISH_CHANNEL};
    use crossbeam_channel::{Sender, bounded, unbounded};
    use serde_json::json;
    use uuid::Uuid;

    /// Scripted socket: pops one ack disposition per submission.
    /// `None` means the server never answers (the ack sender is dropped).
    struct FakeSocket {
        acks: Vec<Option<SubmitAck>>,
        submitted: Arc<Mutex<Vec<SubmitRequest>>>,
        inbound_rx: Receiver<(String, serde_json::Value)>,
    }

    impl RenderSocket for FakeSocket {
        fn submit(&mut self, request: &SubmitRequest) -> Receiver<SubmitAck> {
            self.submitted.lock().unwrap().push(request.clone());
            let (tx, rx) = bounded(1);
            match self.acks.remove(0) {
                Some(ack) => tx.send(ack).unwrap(),
                None => drop(tx),
            }
            rx
        }

        fn inbound(&self) -> Receiver<(String, serde_json::Value)> {
            self.inbound_rx.clone()
        }
    }

    struct Fixture {
        channel: RenderChannel,
        session: Arc<Mutex<Session>>,
        submitted: Arc<Mutex<Vec<SubmitRequest>>>,
        push_tx: Sender<(String, serde_json::Value)>,
        connects: Arc<Mutex<usize>>,
    }

    fn fixture(acks: Vec<Option<SubmitAck>>) -> Fixture {
        let session = Arc::new(Mutex::new(Session::new()));
        session.lock().unwrap().set_active_file(Uuid::new_v4());

        let submitted = Arc::new(Mutex::new(Vec::new()));
        let (push_tx, push_rx) = unbounded();
        let connects = Arc::new(Mutex::new(0));

        let socket_submitted = Arc::clone(&submitted);
        let socket_connects = Arc::clone(&connects);
        let mut acks = Some(acks);
        let connector: SocketConnector = Box::new(move || {
            *socket_connects.lock().unwrap() += 1;
            Ok(Box::new(FakeSocket {
                acks: acks.take().expect("single connection per fixture"),
                submitted: Arc::clone(&socket_submitted),
                inbound_rx: push_rx.clone(),
            }))
        });

        Fixture {
            channel: RenderChannel::new(Arc::clone(&session), connector),
            session,
            submitted,
            push_tx,
            connects,
        }
    }

    fn ok_ack(message: &str) -> Option<SubmitAck> {
        Some(SubmitAck { success: true, message: message.into() })
    }

    #[test]
    fn test_invalid_range_rejected_before_any_network() {
        let mut fx = fixture(vec![]);
        let err = fx.channel.submit_render("/obj/geo1", 10, 5).unwrap_err();
        assert_eq!(err, SubmitError::InvalidRange { start: 10, end: 5 });
        // Never connected, never submitted
        assert!(!fx.channel.is_connected());
        assert_eq!(*fx.connects.lock().unwrap(), 0);
        assert!(fx.submitted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_lazy_singleton_connection() {
        let mut fx = fixture(vec![ok_ack("queued"), ok_ack("queued")]);
        assert!(!fx.channel.is_connected());

        fx.channel.submit_render("/obj/geo1", 1, 10).unwrap();
        assert!(fx.channel.is_connected());
        fx.channel.submit_render("/obj/geo2", 1, 10).unwrap();
        assert_eq!(*fx.connects.lock().unwrap(), 1);
    }

    #[test]
    fn test_submit_payload_shape() {
        let mut fx = fixture(vec![ok_ack("ok")]);
        fx.channel.submit_render("/obj/geo1", 3, 9).unwrap();

        let submitted = fx.submitted.lock().unwrap();
        let file = fx.session.lock().unwrap().active_file().unwrap().to_string();
        assert_eq!(
            submitted[0],
            SubmitRequest { start: 3, end: 9, step: 1, path: "/obj/geo1".into(), file }
        );
    }

    #[test]
    fn test_no_ack_is_timeout_not_rejection() {
        let mut fx = fixture(vec![None]);
        let err = fx.channel.submit_render("/obj/geo1", 1, 10).unwrap_err();
        assert_eq!(err, SubmitError::AckTimeout);
    }

    #[test]
    fn test_rejected_submission_carries_server_message() {
        let mut fx = fixture(vec![Some(SubmitAck {
            success: false,
            message: "Farm is full".into(),
        })]);
        let err = fx.channel.submit_render("/obj/geo1", 1, 10).unwrap_err();
        assert_eq!(err, SubmitError::Rejected("Farm is full".into()));
    }

    #[test]
    fn test_failed_connect_reported_as_not_connected() {
        let session = Arc::new(Mutex::new(Session::new()));
        session.lock().unwrap().set_active_file(Uuid::new_v4());
        let connector: SocketConnector = Box::new(|| anyhow::bail!("refused"));
        let mut channel = RenderChannel::new(session, connector);

        let err = channel.submit_render("/obj/geo1", 1, 10).unwrap_err();
        assert_eq!(err, SubmitError::NotConnected("refused".into()));
    }

    #[test]
    fn test_submit_active_context_uses_defaults() {
        let mut fx = fixture(vec![ok_ack("ok")]);
        {
            let mut session = fx.session.lock().unwrap();
            session.set_context("/obj/geo1");
            session.set_file_defaults(1001, 1050);
        }
        fx.channel.submit_active_context().unwrap();

        let submitted = fx.submitted.lock().unwrap();
        assert_eq!(submitted[0].path, "/obj/geo1");
        assert_eq!((submitted[0].start, submitted[0].end), (1001, 1050));
    }

    #[test]
    fn test_render_finish_updates_session_without_panel() {
        let mut fx = fixture(vec![ok_ack("ok")]);
        fx.channel.submit_render("/obj/geo1", 1, 10).unwrap();

        fx.push_tx
            .send((
                RENDER_FINISH_CHANNEL.to_string(),
                json!({"nodePath": "/obj/geo1", "fileName": "out.glb", "frameRange": [1, 10]}),
            ))
            .unwrap();
        assert_eq!(fx.channel.pump(&mut NoPanels), 1);

        let session = fx.session.lock().unwrap();
        assert_eq!(session.latest_render(), Some("out.glb"));
        assert_eq!(session.render("out.glb").unwrap().node_path, "/obj/geo1");
        let state = session.node_state("/obj/geo1").unwrap();
        assert!(state.has_cooked);
        assert!(state.last_cooked.is_some());
    }

    #[test]
    fn test_thumb_finish_caches_routed_url() {
        let mut fx = fixture(vec![ok_ack("ok")]);
        fx.channel.submit_render("/obj/geo1", 1, 10).unwrap();

        fx.push_tx
            .send((
                THUMB_FINISH_CHANNEL.to_string(),
                json!({"nodePath": "/obj/geo1", "fileName": "thumb.png", "hipFile": "u1"}),
            ))
            .unwrap();
        fx.channel.pump(&mut NoPanels);

        let session = fx.session.lock().unwrap();
        let state = session.node_state("/obj/geo1").unwrap();
        assert_eq!(state.thumbnail.as_deref(), Some("/get_thumbnail/thumb.png"));
    }

    #[test]
    fn test_completion_before_progress_is_fine() {
        // Delivery order across channel names is not guaranteed
        struct Recorder(Vec<String>);
        impl PanelSink for Recorder {
            fn set_progress(&mut self, path: &str, p: f32) {
                self.0.push(format!("progress {path} {p}"));
            }
            fn set_thumbnail(&mut self, _: &str, _: &str) {}
            fn set_last_cooked(&mut self, path: &str, _: &str) {
                self.0.push(format!("cooked {path}"));
            }
            fn hide_thumbnail(&mut self, _: &str) {}
        }

        let mut fx = fixture(vec![ok_ack("ok")]);
        fx.channel.submit_render("/obj/geo1", 1, 10).unwrap();

        fx.push_tx
            .send((
                RENDER_FINISH_CHANNEL.to_string(),
                json!({"nodePath": "/obj/geo1", "fileName": "a.glb", "frameRange": [1, 10]}),
            ))
            .unwrap();
        fx.push_tx
            .send((
                RENDER_PROGRESS_CHANNEL.to_string(),
                json!({"nodePath": "/obj/geo1", "progress": 80.0}),
            ))
            .unwrap();

        let mut recorder = Recorder(Vec::new());
        assert_eq!(fx.channel.pump(&mut recorder), 2);
        assert_eq!(recorder.0[0], "cooked /obj/geo1");
        assert!(fx.session.lock().unwrap().node_state("/obj/geo1").unwrap().has_cooked);
    }

    #[test]
    fn test_unknown_channel_ignored() {
        let mut fx = fixture(vec![ok_ack("ok")]);
        fx.channel.submit_render("/obj/geo1", 1, 10).unwrap();
        fx.push_tx
            .send(("mystery_channel".to_string(), json!({})))
            .unwrap();
        // Counted as drained, but nothing applied and nothing panics
        assert_eq!(fx.channel.pump(&mut NoPanels), 1);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "12:00:00 AM");
        assert_eq!(format_clock(12 * 3600), "12:00:00 PM");
        assert_eq!(format_clock(15 * 3600 + 4 * 60 + 5), "03:04:05 PM");
        assert_eq!(format_clock(11 * 3600 + 59 * 60 + 59), "11:59:59 AM");
    }

    #[test]
    fn test_clock_offset_shifts_and_wraps() {
        // UTC midnight seen from UTC-5 is the previous evening
        assert_eq!(format_clock(secs_of_day(86_400, -5 * 3600)), "07:00:00 PM");
        // And from UTC+5:30, mid-morning
        assert_eq!(format_clock(secs_of_day(86_400, 5 * 3600 + 1800)), "05:30:00 AM");
        assert_eq!(secs_of_day(86_400, 0), 0);
    }
}
