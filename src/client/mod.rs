//! Request/reply and frame-subscription client for the camera broker
//!
//! Requests ride a DEALER socket as `[topic, correlation-id, payload]`
//! multipart frames; replies come back `[correlation-id, payload]` and are
//! matched against the ids this client issued, discarding anything else.
//! Camera frames are published as `[topic, jpeg-bytes]` on a PUB endpoint
//! one port above the request endpoint.
//!
//! There is no cancellation for in-flight requests; deadlines are the only
//! bound on waiting.

use crate::config::{CameraConfigurations, Configuration};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("messaging error: {0}")]
    Zmq(#[from] zmq::Error),

    #[error("payload serialization error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid broker uri: {0}")]
    InvalidUri(String),

    #[error("collected {got} of {want} replies before the deadline")]
    IncompleteReplies { got: usize, want: usize },

    #[error(transparent)]
    Persist(#[from] crate::config::ConfigError),
}

/// Correlation id of one issued request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    fn new(topic: &str, seq: u64) -> Self {
        Self(format!("{topic}#{seq}"))
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the frame PUB endpoint from the request endpoint (port + 1).
fn derive_frames_endpoint(uri: &str) -> Result<String, ClientError> {
    let (base, port) = uri
        .rsplit_once(':')
        .ok_or_else(|| ClientError::InvalidUri(uri.to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| ClientError::InvalidUri(uri.to_string()))?;
    let port = port
        .checked_add(1)
        .ok_or_else(|| ClientError::InvalidUri(uri.to_string()))?;
    Ok(format!("{base}:{port}"))
}

fn poll_timeout_ms(deadline: Instant) -> Option<i64> {
    let remaining = deadline.checked_duration_since(Instant::now())?;
    Some((remaining.as_millis() as i64).max(1))
}

/// Request/reply client for one broker connection.
///
/// Not shareable across threads; a background thread opens its own client,
/// the way the refresh loop in `slider-configure` does.
pub struct Client {
    _context: zmq::Context,
    socket: zmq::Socket,
    uri: String,
    next_seq: u64,
}

impl Client {
    /// Connects the request socket to the broker.
    pub fn connect(uri: &str) -> Result<Self, ClientError> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::DEALER)?;
        socket.set_linger(0)?;
        socket.connect(uri)?;
        debug!(uri = %uri, "connected request socket");
        Ok(Self {
            _context: context,
            socket,
            uri: uri.to_string(),
            next_seq: 0,
        })
    }

    /// Issues one request and returns its correlation id without waiting.
    pub fn request<T: Serialize>(
        &mut self,
        topic: &str,
        payload: &T,
    ) -> Result<RequestId, ClientError> {
        let id = RequestId::new(topic, self.next_seq);
        self.next_seq += 1;
        let body = serde_json::to_vec(payload)?;
        self.socket
            .send_multipart([topic.as_bytes(), id.as_bytes(), body.as_slice()], 0)?;
        debug!(topic = %topic, id = %id, "request sent");
        Ok(id)
    }

    /// Absorbs whatever replies arrive within the window, uncorrelated.
    ///
    /// Used where the tools fire requests and only care that the broker had
    /// a chance to acknowledge them. Returns the number of messages drained.
    pub fn drain_for(&self, window: Duration) -> Result<usize, ClientError> {
        let deadline = Instant::now() + window;
        let mut drained = 0;
        while let Some(timeout) = poll_timeout_ms(deadline) {
            if self.socket.poll(zmq::POLLIN, timeout)? == 0 {
                break;
            }
            self.socket.recv_multipart(0)?;
            drained += 1;
        }
        Ok(drained)
    }

    /// Collects replies matching `ids` until the deadline, discarding
    /// unrelated in-flight replies. Returns whatever arrived in time.
    pub fn receive_until(
        &self,
        deadline: Instant,
        ids: &[RequestId],
    ) -> Result<HashMap<RequestId, Vec<u8>>, ClientError> {
        let mut pending: Vec<&RequestId> = ids.iter().collect();
        let mut replies = HashMap::new();

        while !pending.is_empty() {
            let Some(timeout) = poll_timeout_ms(deadline) else {
                break;
            };
            if self.socket.poll(zmq::POLLIN, timeout)? == 0 {
                break;
            }
            let frames = self.socket.recv_multipart(0)?;
            if frames.len() != 2 {
                debug!(frames = frames.len(), "discarding malformed reply");
                continue;
            }
            let id = String::from_utf8_lossy(&frames[0]).into_owned();
            match pending.iter().position(|pending_id| pending_id.0 == id) {
                Some(index) => {
                    let id = pending.swap_remove(index).clone();
                    replies.insert(id, frames[1].clone());
                }
                None => debug!(id = %id, "discarding unrelated reply"),
            }
        }
        Ok(replies)
    }

    /// Waits for the single reply to `id`, decoding it as `T`.
    /// `None` on timeout.
    pub fn receive_reply<T: DeserializeOwned>(
        &self,
        id: &RequestId,
        timeout: Duration,
    ) -> Result<Option<T>, ClientError> {
        let replies = self.receive_until(Instant::now() + timeout, std::slice::from_ref(id))?;
        match replies.get(id) {
            Some(body) => Ok(Some(serde_json::from_slice(body)?)),
            None => Ok(None),
        }
    }

    /// Asks one camera for its current configuration, fire-and-forget.
    pub fn request_configuration(&mut self, camera: &str) -> Result<RequestId, ClientError> {
        self.request(&format!("{camera}.get_configuration"), &0)
    }

    /// Sends a configuration delta to one camera and waits briefly for the
    /// acknowledgement. No retry; a missed ack is logged and dropped.
    pub fn set_configuration(
        &mut self,
        camera: &str,
        configuration: &Configuration,
        window: Duration,
    ) -> Result<(), ClientError> {
        let id = self.request(&format!("{camera}.set_configuration"), configuration)?;
        if self
            .receive_reply::<serde_json::Value>(&id, window)?
            .is_none()
        {
            warn!(camera = %camera, "set_configuration not acknowledged in time");
        }
        Ok(())
    }

    /// Fetches every camera's configuration in one round: all requests are
    /// issued up front, then replies are collected until the deadline.
    ///
    /// All-or-nothing: an incomplete reply set is an error and yields no
    /// partial mapping.
    pub fn collect_configurations(
        &mut self,
        cameras: &[String],
        window: Duration,
    ) -> Result<CameraConfigurations, ClientError> {
        let mut ids = Vec::with_capacity(cameras.len());
        for camera in cameras {
            ids.push((camera.clone(), self.request_configuration(camera)?));
        }

        let id_list: Vec<RequestId> = ids.iter().map(|(_, id)| id.clone()).collect();
        let mut replies = self.receive_until(Instant::now() + window, &id_list)?;
        if replies.len() != cameras.len() {
            return Err(ClientError::IncompleteReplies {
                got: replies.len(),
                want: cameras.len(),
            });
        }

        let mut configurations = CameraConfigurations::new();
        for (camera, id) in ids {
            // The length check above guarantees every id is present.
            let body = replies.remove(&id).ok_or(ClientError::IncompleteReplies {
                got: replies.len(),
                want: cameras.len(),
            })?;
            let configuration: Configuration = serde_json::from_slice(&body)?;
            configurations.insert(camera, configuration);
        }
        Ok(configurations)
    }

    /// Fetches every camera's configuration and writes the snapshot to
    /// `path`. On an incomplete reply set the file is left untouched.
    pub fn snapshot_configurations<P: AsRef<Path>>(
        &mut self,
        cameras: &[String],
        window: Duration,
        path: P,
    ) -> Result<CameraConfigurations, ClientError> {
        let configurations = self.collect_configurations(cameras, window)?;
        crate::config::save_configurations(path, &configurations)?;
        Ok(configurations)
    }

    /// The frame PUB endpoint paired with this client's request endpoint.
    pub fn frames_endpoint(&self) -> Result<String, ClientError> {
        derive_frames_endpoint(&self.uri)
    }

    /// Subscribes to frame topics on the paired PUB endpoint.
    pub fn subscribe(&self, topics: &[String]) -> Result<Subscription, ClientError> {
        Subscription::connect(&self.frames_endpoint()?, topics)
    }
}

/// SUB-socket subscription to a set of frame topics.
pub struct Subscription {
    _context: zmq::Context,
    socket: zmq::Socket,
    topics: Vec<String>,
}

impl Subscription {
    /// Connects and subscribes to every topic at an explicit endpoint.
    pub fn connect(endpoint: &str, topics: &[String]) -> Result<Self, ClientError> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::SUB)?;
        socket.set_linger(0)?;
        socket.connect(endpoint)?;
        for topic in topics {
            socket.set_subscribe(topic.as_bytes())?;
        }
        debug!(endpoint = %endpoint, topics = topics.len(), "subscribed to frame topics");
        Ok(Self {
            _context: context,
            socket,
            topics: topics.to_vec(),
        })
    }

    /// Gathers one frame per subscribed topic for the current tick.
    ///
    /// Returns frames in subscription order once every topic has delivered;
    /// `Ok(None)` when the deadline passes with an incomplete set, in which
    /// case the partial tick is dropped and the caller should skip it.
    pub fn consume_sync(
        &self,
        window: Duration,
    ) -> Result<Option<Vec<(String, Vec<u8>)>>, ClientError> {
        let deadline = Instant::now() + window;
        let mut frames: HashMap<String, Vec<u8>> = HashMap::new();

        while frames.len() < self.topics.len() {
            let Some(timeout) = poll_timeout_ms(deadline) else {
                break;
            };
            if self.socket.poll(zmq::POLLIN, timeout)? == 0 {
                break;
            }
            let parts = self.socket.recv_multipart(0)?;
            if parts.len() != 2 {
                debug!(frames = parts.len(), "discarding malformed frame message");
                continue;
            }
            let topic = String::from_utf8_lossy(&parts[0]).into_owned();
            if !self.topics.contains(&topic) {
                continue;
            }
            // Keep the first frame per topic for this tick.
            frames.entry(topic).or_insert_with(|| parts[1].clone());
        }

        if frames.len() < self.topics.len() {
            debug!(
                got = frames.len(),
                want = self.topics.len(),
                "incomplete frame set, skipping tick"
            );
            return Ok(None);
        }

        let ordered = self
            .topics
            .iter()
            .map(|topic| {
                let data = frames.remove(topic).unwrap_or_default();
                (topic.clone(), data)
            })
            .collect();
        Ok(Some(ordered))
    }
}
