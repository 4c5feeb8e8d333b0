//! End-to-end relay tests
//!
//! Drive the public API the way a deployment does: a registry over a mock
//! upstream source, the admission gate, and the WebSocket server with real
//! client sockets.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use live_relay::auth::{AdmissionGate, BackendError, KeyStore, SubscriptionRecord};
use live_relay::event::{RawChat, RawEvent, RawGift, GIFT_TYPE_STREAKABLE};
use live_relay::registry::ChannelRegistry;
use live_relay::server::{RelayServer, ServerConfig};
use live_relay::upstream::{ConnectOptions, LiveConnection, LiveSource, UpstreamError};
use live_relay::ChannelId;

/// Scriptable upstream source: connects succeed unless the channel name
/// starts with "offline", and the test pushes raw events by hand.
struct ScriptedSource {
    connects: AtomicUsize,
    senders: Mutex<HashMap<ChannelId, mpsc::Sender<RawEvent>>>,
}

impl ScriptedSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            senders: Mutex::new(HashMap::new()),
        })
    }

    fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    async fn wait_connected(&self, channel: &ChannelId) {
        for _ in 0..200 {
            if self.senders.lock().unwrap().contains_key(channel) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("upstream never connected for {}", channel);
    }

    async fn push(&self, channel: &ChannelId, event: RawEvent) {
        let sender = {
            let senders = self.senders.lock().unwrap();
            senders.get(channel).cloned().expect("channel connected")
        };
        sender.send(event).await.unwrap();
    }
}

#[async_trait]
impl LiveSource for ScriptedSource {
    async fn connect(
        &self,
        channel: &ChannelId,
        _options: &ConnectOptions,
    ) -> Result<LiveConnection, UpstreamError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if channel.as_str().starts_with("offline") {
            return Err(UpstreamError::ChannelOffline(channel.to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        self.senders.lock().unwrap().insert(channel.clone(), tx);
        Ok(LiveConnection::new(rx))
    }
}

/// Backend with one valid key and a live subscription
struct OneUserStore;

#[async_trait]
impl KeyStore for OneUserStore {
    async fn principal_for_key(&self, api_key: &str) -> Result<Option<String>, BackendError> {
        Ok((api_key == "lvt_good").then(|| "user1".to_string()))
    }

    async fn subscription(
        &self,
        principal: &str,
    ) -> Result<Option<SubscriptionRecord>, BackendError> {
        Ok((principal == "user1").then(|| SubscriptionRecord {
            expires_at: chrono::Utc::now() + chrono::Duration::days(7),
        }))
    }
}

/// Opt-in test logging, driven by RUST_LOG
fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn free_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn start_server(registry: Arc<ChannelRegistry>) -> SocketAddr {
    init_logging();
    let addr = free_addr();
    let config = ServerConfig::with_addr(addr).auth_error_close_delay(Duration::from_millis(20));
    let server = RelayServer::new(config, registry);
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

async fn connect_client(
    addr: SocketAddr,
) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let url = format!("ws://{}", addr);
    for _ in 0..100 {
        if let Ok((ws, _)) = tokio_tungstenite::connect_async(&url).await {
            return ws;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("could not connect to relay server");
}

fn set_channel_frame(channel: &str, api_key: Option<&str>) -> Message {
    let data = match api_key {
        Some(key) => serde_json::json!({"channelId": channel, "apiKey": key}),
        None => serde_json::json!({"channelId": channel}),
    };
    Message::Text(
        serde_json::json!({"event": "set_channel", "data": data}).to_string(),
    )
}

async fn next_json<S>(ws: &mut S) -> serde_json::Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("frame before timeout")
            .expect("socket open")
            .expect("socket healthy");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

fn chat(user: &str, msg: &str) -> RawEvent {
    RawEvent::Chat(RawChat {
        unique_id: user.into(),
        comment: msg.into(),
        timestamp_ms: 0,
    })
}

#[tokio::test]
async fn subscriber_receives_relayed_events_over_websocket() {
    let source = ScriptedSource::new();
    let registry = Arc::new(ChannelRegistry::new(
        Arc::clone(&source) as Arc<dyn LiveSource>,
        AdmissionGate::bypass(),
    ));
    let addr = start_server(Arc::clone(&registry)).await;
    let channel = ChannelId::new("streamer");

    let mut ws = connect_client(addr).await;
    ws.send(set_channel_frame("@streamer", None)).await.unwrap();
    source.wait_connected(&channel).await;

    source.push(&channel, chat("viewer1", "hello")).await;

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "chat");
    assert_eq!(frame["data"]["user"], "viewer1");
    assert_eq!(frame["data"]["msg"], "hello");
}

#[tokio::test]
async fn streak_gift_arrives_once_with_final_coins() {
    let source = ScriptedSource::new();
    let registry = Arc::new(ChannelRegistry::new(
        Arc::clone(&source) as Arc<dyn LiveSource>,
        AdmissionGate::bypass(),
    ));
    let addr = start_server(Arc::clone(&registry)).await;
    let channel = ChannelId::new("streamer");

    let mut ws = connect_client(addr).await;
    ws.send(set_channel_frame("streamer", None)).await.unwrap();
    source.wait_connected(&channel).await;

    let gift = |repeat_count: u32, repeat_end: bool| {
        RawEvent::Gift(RawGift {
            unique_id: "viewer1".into(),
            gift_id: Some(5655),
            gift_name: "Rose".into(),
            diamond_count: 1,
            repeat_count,
            gift_type: GIFT_TYPE_STREAKABLE,
            repeat_end,
            gift_picture_url: None,
            timestamp_ms: 0,
        })
    };

    // Interim repeats are held back; only the final report is relayed
    source.push(&channel, gift(1, false)).await;
    source.push(&channel, gift(2, false)).await;
    source.push(&channel, gift(3, true)).await;
    source.push(&channel, chat("viewer1", "done")).await;

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "game_event");
    assert_eq!(frame["data"]["type"], "gift");
    assert_eq!(frame["data"]["coins"], 3);
    assert_eq!(frame["data"]["amount"], 3);

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "chat");
}

#[tokio::test]
async fn invalid_key_gets_auth_error_and_no_upstream_connect() {
    let source = ScriptedSource::new();
    let gate = AdmissionGate::new(Arc::new(OneUserStore));
    let registry = Arc::new(ChannelRegistry::new(
        Arc::clone(&source) as Arc<dyn LiveSource>,
        gate,
    ));
    let addr = start_server(Arc::clone(&registry)).await;

    let mut ws = connect_client(addr).await;
    ws.send(set_channel_frame("streamer", Some("wrong_key")))
        .await
        .unwrap();

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "auth_error");
    assert_eq!(frame["data"]["msg"], "invalid API key");

    assert_eq!(source.connect_count(), 0);
    assert_eq!(registry.channel_count().await, 0);
}

#[tokio::test]
async fn valid_key_is_admitted() {
    let source = ScriptedSource::new();
    let gate = AdmissionGate::new(Arc::new(OneUserStore));
    let registry = Arc::new(ChannelRegistry::new(
        Arc::clone(&source) as Arc<dyn LiveSource>,
        gate,
    ));
    let addr = start_server(Arc::clone(&registry)).await;
    let channel = ChannelId::new("streamer");

    let mut ws = connect_client(addr).await;
    ws.send(set_channel_frame("streamer", Some("lvt_good")))
        .await
        .unwrap();
    source.wait_connected(&channel).await;

    source.push(&channel, chat("viewer1", "in")).await;
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "chat");
}

#[tokio::test]
async fn connect_failure_is_isolated_per_channel() {
    let source = ScriptedSource::new();
    let registry = Arc::new(ChannelRegistry::new(
        Arc::clone(&source) as Arc<dyn LiveSource>,
        AdmissionGate::bypass(),
    ));
    let addr = start_server(Arc::clone(&registry)).await;
    let live = ChannelId::new("live_streamer");

    let mut healthy = connect_client(addr).await;
    healthy
        .send(set_channel_frame("live_streamer", None))
        .await
        .unwrap();
    source.wait_connected(&live).await;

    let mut unlucky = connect_client(addr).await;
    unlucky
        .send(set_channel_frame("offline_streamer", None))
        .await
        .unwrap();

    let frame = next_json(&mut unlucky).await;
    assert_eq!(frame["event"], "connect_error");

    // The healthy channel keeps relaying
    source.push(&live, chat("viewer1", "still here")).await;
    let frame = next_json(&mut healthy).await;
    assert_eq!(frame["event"], "chat");
    assert_eq!(frame["data"]["msg"], "still here");
}

#[tokio::test]
async fn stream_end_notifies_and_allows_rejoin() {
    let source = ScriptedSource::new();
    let registry = Arc::new(ChannelRegistry::new(
        Arc::clone(&source) as Arc<dyn LiveSource>,
        AdmissionGate::bypass(),
    ));
    let addr = start_server(Arc::clone(&registry)).await;
    let channel = ChannelId::new("streamer");

    let mut ws = connect_client(addr).await;
    ws.send(set_channel_frame("streamer", None)).await.unwrap();
    source.wait_connected(&channel).await;

    source.push(&channel, RawEvent::StreamEnd).await;

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "game_event");
    assert_eq!(frame["data"]["type"], "stream_end");

    // Entry is gone; rejoining on the same socket starts a fresh connect
    for _ in 0..200 {
        if registry.channel_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(registry.channel_count().await, 0);

    // The old sender is stale now; clear it so wait_connected sees the new one
    source.senders.lock().unwrap().remove(&channel);

    ws.send(set_channel_frame("streamer", None)).await.unwrap();
    source.wait_connected(&channel).await;
    assert_eq!(source.connect_count(), 2);

    source.push(&channel, chat("viewer1", "round two")).await;
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "chat");
    assert_eq!(frame["data"]["msg"], "round two");
}

#[tokio::test]
async fn disconnect_tears_down_last_subscriber_channel() {
    let source = ScriptedSource::new();
    let registry = Arc::new(ChannelRegistry::new(
        Arc::clone(&source) as Arc<dyn LiveSource>,
        AdmissionGate::bypass(),
    ));
    let addr = start_server(Arc::clone(&registry)).await;
    let channel = ChannelId::new("streamer");

    let mut ws = connect_client(addr).await;
    ws.send(set_channel_frame("streamer", None)).await.unwrap();
    source.wait_connected(&channel).await;
    assert_eq!(registry.channel_count().await, 1);

    // Abrupt disconnect is an implicit leave
    drop(ws);

    for _ in 0..200 {
        if registry.channel_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(registry.channel_count().await, 0);
}

#[tokio::test]
async fn forced_teardown_sends_end_marker_to_subscriber() {
    let source = ScriptedSource::new();
    let registry = Arc::new(ChannelRegistry::new(
        Arc::clone(&source) as Arc<dyn LiveSource>,
        AdmissionGate::bypass(),
    ));
    let addr = start_server(Arc::clone(&registry)).await;
    let channel = ChannelId::new("streamer");

    let mut ws = connect_client(addr).await;
    ws.send(set_channel_frame("streamer", None)).await.unwrap();
    source.wait_connected(&channel).await;

    // Yank the membership out from under the session; the entry is torn
    // down without an end event ever reaching the session's receiver
    registry.leave(1, &channel).await;

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "game_event");
    assert_eq!(frame["data"]["type"], "stream_end");
    assert_eq!(registry.channel_count().await, 0);
}

#[tokio::test]
async fn concurrent_joins_share_one_upstream_connection() {
    init_logging();
    let source = ScriptedSource::new();
    let registry = Arc::new(ChannelRegistry::new(
        Arc::clone(&source) as Arc<dyn LiveSource>,
        AdmissionGate::bypass(),
    ));
    let channel = ChannelId::new("streamer");

    let mut joins = Vec::new();
    for session_id in 0..50u64 {
        let registry = Arc::clone(&registry);
        let channel = channel.clone();
        joins.push(tokio::spawn(async move {
            registry.request_join(session_id, &channel, None).await
        }));
    }

    for join in joins {
        assert!(join.await.unwrap().is_admitted());
    }

    assert_eq!(source.connect_count(), 1);
    let stats = registry.channel_stats(&channel).await.unwrap();
    assert_eq!(stats.subscriber_count, 50);
}
