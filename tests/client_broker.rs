//! Client tests against an in-process mock broker
//!
//! The broker side is a ROUTER (requests) and a PUB (frames) socket bound
//! to loopback wildcard ports, speaking the same multipart envelopes the
//! real middleware does.

use camera_tools::client::{Client, ClientError, Subscription};
use camera_tools::config::{Configuration, Gain};
use std::time::Duration;

/// Mock request/reply broker endpoint.
struct MockBroker {
    _context: zmq::Context,
    router: zmq::Socket,
    endpoint: String,
}

impl MockBroker {
    fn bind() -> Self {
        let context = zmq::Context::new();
        let router = context.socket(zmq::ROUTER).unwrap();
        router.set_rcvtimeo(2000).unwrap();
        router.bind("tcp://127.0.0.1:*").unwrap();
        let endpoint = router.get_last_endpoint().unwrap().unwrap();
        Self {
            _context: context,
            router,
            endpoint,
        }
    }

    /// Receives one request, returning (identity, topic, correlation id).
    fn recv_request(&self) -> (Vec<u8>, String, Vec<u8>) {
        let frames = self.router.recv_multipart(0).expect("no request arrived");
        assert_eq!(frames.len(), 4, "request envelope should be 4 frames");
        let topic = String::from_utf8(frames[1].clone()).unwrap();
        (frames[0].clone(), topic, frames[2].clone())
    }

    fn reply(&self, identity: &[u8], id: &[u8], body: &[u8]) {
        self.router.send_multipart([identity, id, body], 0).unwrap();
    }
}

fn gain_only_configuration(percent: f32) -> Configuration {
    Configuration {
        gain: Some(Gain {
            percent: Some(percent),
            db: None,
            auto_mode: Some(false),
        }),
        ..Default::default()
    }
}

#[test]
fn test_collect_configurations_correlates_by_id() {
    let broker = MockBroker::bind();
    let mut client = Client::connect(&broker.endpoint).unwrap();

    let cameras = vec!["ptgrey.0".to_string(), "ptgrey.1".to_string()];

    let broker_thread = std::thread::spawn(move || {
        let mut pending = Vec::new();
        for _ in 0..2 {
            let (identity, topic, id) = broker.recv_request();
            pending.push((identity, topic, id));
        }
        // Answer in reverse order with a distinguishing gain value, plus an
        // unrelated reply the client must discard.
        broker.reply(&pending[1].0, b"stale-request#7", b"{}");
        for (identity, topic, id) in pending.iter().rev() {
            let percent = if topic.starts_with("ptgrey.0") { 10.0 } else { 20.0 };
            let body = serde_json::to_vec(&gain_only_configuration(percent)).unwrap();
            broker.reply(identity, id, &body);
        }
    });

    let configurations = client
        .collect_configurations(&cameras, Duration::from_secs(2))
        .unwrap();
    broker_thread.join().unwrap();

    assert_eq!(configurations.len(), 2);
    let gain0 = configurations["ptgrey.0"].gain.as_ref().unwrap();
    let gain1 = configurations["ptgrey.1"].gain.as_ref().unwrap();
    assert_eq!(gain0.percent, Some(10.0));
    assert_eq!(gain1.percent, Some(20.0));
}

#[test]
fn test_incomplete_reply_set_is_an_error() {
    let broker = MockBroker::bind();
    let mut client = Client::connect(&broker.endpoint).unwrap();

    let cameras = vec!["ptgrey.0".to_string(), "ptgrey.1".to_string()];

    let broker_thread = std::thread::spawn(move || {
        let mut pending = Vec::new();
        for _ in 0..2 {
            pending.push(broker.recv_request());
        }
        // Only one camera answers.
        let (identity, _, id) = &pending[0];
        let body = serde_json::to_vec(&gain_only_configuration(5.0)).unwrap();
        broker.reply(identity, id, &body);
    });

    let result = client.collect_configurations(&cameras, Duration::from_millis(500));
    broker_thread.join().unwrap();

    match result {
        Err(ClientError::IncompleteReplies { got, want }) => {
            assert_eq!(got, 1);
            assert_eq!(want, 2);
        }
        other => panic!("expected IncompleteReplies, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_snapshot_with_missing_reply_writes_no_file() {
    let broker = MockBroker::bind();
    let mut client = Client::connect(&broker.endpoint).unwrap();

    let cameras = vec!["ptgrey.0".to_string(), "ptgrey.1".to_string()];
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configuration.yaml");

    let broker_thread = std::thread::spawn(move || {
        let mut pending = Vec::new();
        for _ in 0..2 {
            pending.push(broker.recv_request());
        }
        // Only one camera answers.
        let (identity, _, id) = &pending[0];
        let body = serde_json::to_vec(&gain_only_configuration(5.0)).unwrap();
        broker.reply(identity, id, &body);
    });

    let result = client.snapshot_configurations(&cameras, Duration::from_millis(500), &path);
    broker_thread.join().unwrap();

    assert!(matches!(
        result,
        Err(ClientError::IncompleteReplies { got: 1, want: 2 })
    ));
    assert!(!path.exists(), "no partial snapshot should be written");
}

#[test]
fn test_snapshot_with_full_reply_set_persists_every_camera() {
    let broker = MockBroker::bind();
    let mut client = Client::connect(&broker.endpoint).unwrap();

    let cameras = vec!["ptgrey.0".to_string(), "ptgrey.1".to_string()];
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configuration.yaml");

    let broker_thread = std::thread::spawn(move || {
        for _ in 0..2 {
            let (identity, topic, id) = broker.recv_request();
            let percent = if topic.starts_with("ptgrey.0") { 10.0 } else { 20.0 };
            let body = serde_json::to_vec(&gain_only_configuration(percent)).unwrap();
            broker.reply(&identity, &id, &body);
        }
    });

    client
        .snapshot_configurations(&cameras, Duration::from_secs(2), &path)
        .unwrap();
    broker_thread.join().unwrap();

    let saved = camera_tools::config::load_configurations(&path).unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved["ptgrey.1"].gain.as_ref().unwrap().percent, Some(20.0));
}

#[test]
fn test_receive_reply_times_out_as_none() {
    let broker = MockBroker::bind();
    let mut client = Client::connect(&broker.endpoint).unwrap();

    let id = client.request_configuration("ptgrey.0").unwrap();
    let reply: Option<Configuration> = client
        .receive_reply(&id, Duration::from_millis(200))
        .unwrap();
    assert!(reply.is_none());

    // The request still reached the broker.
    let (_, topic, _) = broker.recv_request();
    assert_eq!(topic, "ptgrey.0.get_configuration");
}

#[test]
fn test_drain_for_absorbs_uncorrelated_acks() {
    let broker = MockBroker::bind();
    let mut client = Client::connect(&broker.endpoint).unwrap();

    for camera in ["ptgrey.0", "ptgrey.1", "ptgrey.2"] {
        client
            .request(&format!("{camera}.configure"), &Configuration::default())
            .unwrap();
    }

    let broker_thread = std::thread::spawn(move || {
        for _ in 0..3 {
            let (identity, _, id) = broker.recv_request();
            broker.reply(&identity, &id, b"{}");
        }
    });

    let drained = client.drain_for(Duration::from_secs(1)).unwrap();
    broker_thread.join().unwrap();
    assert_eq!(drained, 3);
}

#[test]
fn test_consume_sync_delivers_one_frame_per_topic_in_order() {
    let context = zmq::Context::new();
    let publisher = context.socket(zmq::PUB).unwrap();
    publisher.bind("tcp://127.0.0.1:*").unwrap();
    let endpoint = publisher.get_last_endpoint().unwrap().unwrap();

    let topics = vec!["ptgrey.0.frame".to_string(), "ptgrey.1.frame".to_string()];
    let subscription = Subscription::connect(&endpoint, &topics).unwrap();

    // Give the subscription time to register before publishing.
    std::thread::sleep(Duration::from_millis(200));

    publisher
        .send_multipart([b"ptgrey.1.frame".as_slice(), b"frame-b".as_slice()], 0)
        .unwrap();
    publisher
        .send_multipart([b"ptgrey.0.frame".as_slice(), b"frame-a".as_slice()], 0)
        .unwrap();

    let frames = subscription
        .consume_sync(Duration::from_secs(2))
        .unwrap()
        .expect("expected a complete tick");

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].0, "ptgrey.0.frame");
    assert_eq!(frames[0].1, b"frame-a");
    assert_eq!(frames[1].0, "ptgrey.1.frame");
    assert_eq!(frames[1].1, b"frame-b");
}

#[test]
fn test_consume_sync_skips_incomplete_tick() {
    let context = zmq::Context::new();
    let publisher = context.socket(zmq::PUB).unwrap();
    publisher.bind("tcp://127.0.0.1:*").unwrap();
    let endpoint = publisher.get_last_endpoint().unwrap().unwrap();

    let topics = vec!["ptgrey.0.frame".to_string(), "ptgrey.1.frame".to_string()];
    let subscription = Subscription::connect(&endpoint, &topics).unwrap();
    std::thread::sleep(Duration::from_millis(200));

    // Only one of the two cameras delivers this tick.
    publisher
        .send_multipart([b"ptgrey.0.frame".as_slice(), b"frame-a".as_slice()], 0)
        .unwrap();

    let tick = subscription.consume_sync(Duration::from_millis(300)).unwrap();
    assert!(tick.is_none());
}
