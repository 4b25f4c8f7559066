//! Integration tests for the Hearth server: full envelope flow from the
//! read topic, through the workers, to the publish topic.

use std::sync::Arc;
use std::time::Duration;

use hearth::prelude::*;
use hearth_transport::MemorySubscriber;
use serde_json::Value;
use tokio::task::JoinHandle;

const READ_TOPIC: &str = "glc-daemon";
const PUBLISH_TOPIC: &str = "glc-gamestate";

// =========================================================================
// Harness
// =========================================================================

struct Harness {
    bus: MemoryBus,
    outbound: MemorySubscriber,
    registry: RegistryHandle,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), HearthError>>,
}

impl Harness {
    fn start(store: MemoryStore) -> Self {
        let bus = MemoryBus::new();
        let outbound = bus.subscribe(PUBLISH_TOPIC);
        let server = HearthServerBuilder::new()
            .publish_topic(PUBLISH_TOPIC)
            .build(bus.subscribe(READ_TOPIC), bus.clone(), Arc::new(store));
        let registry = server.registry();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(server.run(cancel.clone()));

        Self {
            bus,
            outbound,
            registry,
            cancel,
            task,
        }
    }

    async fn send(&self, json: &str) {
        self.bus
            .publish(READ_TOPIC, json.as_bytes())
            .await
            .expect("bus should be open");
    }

    /// Next envelope on the publish topic, as raw JSON.
    async fn next(&mut self) -> Value {
        let bytes = tokio::time::timeout(Duration::from_secs(2), self.outbound.next_message())
            .await
            .expect("timed out waiting for outbound envelope")
            .unwrap()
            .expect("publish topic ended");
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Asserts nothing more is published for a short while.
    async fn assert_quiet(&mut self) {
        let result =
            tokio::time::timeout(Duration::from_millis(100), self.outbound.next_message()).await;
        assert!(result.is_err(), "unexpected envelope: {result:?}");
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.task.await.unwrap().unwrap();
    }
}

fn heartbeat(id: &str, status: &str) -> String {
    format!(r#"{{"ClientId":"{id}","Type":"heartbeat","Data":{{"Status":"{status}"}}}}"#)
}

fn seeded_store() -> MemoryStore {
    MemoryStore::from_json(
        r#"{
            "users": [ { "user": "alice", "password": "correct" } ],
            "zones": [ { "zone": "meadow" }, { "zone": "cave" } ]
        }"#,
    )
    .unwrap()
}

// =========================================================================
// Presence
// =========================================================================

#[tokio::test]
async fn test_heartbeats_announce_only_status_changes() {
    let mut h = Harness::start(MemoryStore::new());

    h.send(&heartbeat("alice", "ACTIVE")).await;
    h.send(&heartbeat("alice", "ACTIVE")).await;
    h.send(&heartbeat("alice", "AWAY")).await;
    h.send(r#"{"ClientId":"bob","Type":"knock"}"#).await;

    let created = h.next().await;
    assert_eq!(created["Type"], "playerHeartbeat");
    assert_eq!(created["ClientId"], "alice");
    assert_eq!(created["Data"]["Status"], "ACTIVE");

    let away = h.next().await;
    assert_eq!(away["Type"], "playerHeartbeat");
    assert_eq!(away["Data"]["Status"], "AWAY");

    // The repeated ACTIVE produced nothing; next up is the roster reply.
    let roster = h.next().await;
    assert_eq!(roster["Type"], "knock");
    assert_eq!(roster["ClientId"], "bob");
    assert_eq!(roster["Data"][0]["ClientId"], "alice");

    h.stop().await;
}

#[tokio::test]
async fn test_quit_removes_session_and_is_announced_once() {
    let mut h = Harness::start(MemoryStore::new());

    h.send(&heartbeat("alice", "ACTIVE")).await;
    h.send(&heartbeat("alice", "QUIT")).await;
    h.send(&heartbeat("ghost", "QUIT")).await;

    assert_eq!(h.next().await["Data"]["Status"], "ACTIVE");
    let quit = h.next().await;
    assert_eq!(quit["ClientId"], "alice");
    assert_eq!(quit["Data"]["Status"], "QUIT");
    h.assert_quiet().await;

    assert_eq!(h.registry.len().await.unwrap(), 0);
    h.stop().await;
}

// =========================================================================
// State, auth, chat
// =========================================================================

#[tokio::test]
async fn test_player_state_is_echoed_under_sender_id() {
    let mut h = Harness::start(MemoryStore::new());

    h.send(r#"{"ClientId":"alice","Type":"playerState","Data":{"ClientId":"mallory","X":4,"Y":2,"AvatarId":"fox"}}"#)
        .await;

    let echo = h.next().await;
    assert_eq!(echo["Type"], "playerState");
    assert_eq!(echo["ClientId"], "alice");
    assert_eq!(echo["Data"]["ClientId"], "alice");
    assert_eq!(echo["Data"]["X"], 4.0);
    assert_eq!(echo["Data"]["AvatarId"], "fox");

    h.stop().await;
}

#[tokio::test]
async fn test_login_flips_authenticated_flag() {
    let mut h = Harness::start(seeded_store());
    let alice = ClientId::from("alice");

    h.send(&heartbeat("alice", "ACTIVE")).await;
    h.next().await;
    h.send(r#"{"ClientId":"alice","Type":"playerAuth","Data":{"Name":"alice","Password":"wrong"}}"#)
        .await;
    h.send(r#"{"ClientId":"alice","Type":"playerAuth","Data":{"Name":"alice","Password":"correct"}}"#)
        .await;

    let mut authenticated = false;
    for _ in 0..200 {
        let session = h.registry.session(&alice).await.unwrap().unwrap();
        if session.authenticated {
            authenticated = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(authenticated, "session never became authenticated");

    h.stop().await;
}

#[tokio::test]
async fn test_login_for_unknown_user_creates_nothing() {
    let h = Harness::start(seeded_store());

    h.send(r#"{"ClientId":"bob","Type":"playerAuth","Data":{"Name":"bob","Password":"x"}}"#)
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(h.registry.session(&ClientId::from("bob")).await.unwrap().is_none());
    h.stop().await;
}

#[tokio::test]
async fn test_chat_is_relayed_verbatim() {
    let mut h = Harness::start(MemoryStore::new());

    h.send(r#"{"ClientId":"alice","Type":"chat","Data":{"Message":"hello","Channel":7}}"#)
        .await;

    let chat = h.next().await;
    assert_eq!(chat["Type"], "chat");
    assert_eq!(chat["ClientId"], "alice");
    assert_eq!(chat["Data"]["Message"], "hello");
    assert_eq!(chat["Data"]["Channel"], 7);

    h.stop().await;
}

// =========================================================================
// Zones
// =========================================================================

#[tokio::test]
async fn test_connected_publishes_every_zone() {
    let mut h = Harness::start(seeded_store());

    h.send(r#"{"ClientId":"alice","Type":"connected"}"#).await;

    let first = h.next().await;
    let second = h.next().await;
    assert_eq!(first["Type"], "updateZone");
    assert_eq!(first["ClientId"], "alice");
    assert_eq!(first["Data"]["zone"], "meadow");
    assert_eq!(second["Data"]["zone"], "cave");
    h.assert_quiet().await;

    h.stop().await;
}

#[tokio::test]
async fn test_connected_without_zones_publishes_error() {
    let mut h = Harness::start(MemoryStore::new());

    h.send(r#"{"ClientId":"alice","Type":"connected"}"#).await;

    let reply = h.next().await;
    assert_eq!(reply["Type"], "error");
    assert_eq!(reply["Data"], "No zones found");

    h.stop().await;
}

#[tokio::test]
async fn test_update_zone_publishes_patched_document() {
    let mut h = Harness::start(seeded_store());

    h.send(r#"{"ClientId":"alice","Type":"updateZone","Data":{"Name":"cave","Patch":{"torches":3}}}"#)
        .await;

    let reply = h.next().await;
    assert_eq!(reply["Type"], "updateZone");
    assert_eq!(reply["Data"]["zone"], "cave");
    assert_eq!(reply["Data"]["torches"], 3);

    h.stop().await;
}

// =========================================================================
// Robustness and lifecycle
// =========================================================================

#[tokio::test]
async fn test_malformed_payload_does_not_stop_routing() {
    let mut h = Harness::start(MemoryStore::new());

    h.send(r#"{"ClientId":"alice","Type":"playerState","Data":{"X":"north"}}"#)
        .await;
    h.send("{ not json").await;
    h.send(r#"{"ClientId":"alice","Type":"teleport"}"#).await;
    h.send(r#"{"ClientId":"alice","Type":"chat","Data":"still here"}"#)
        .await;

    let chat = h.next().await;
    assert_eq!(chat["Type"], "chat");
    assert_eq!(chat["Data"], "still here");

    h.stop().await;
}

#[tokio::test]
async fn test_run_returns_after_cancel() {
    let h = Harness::start(MemoryStore::new());

    h.cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), h.task)
        .await
        .expect("server did not stop");
    assert!(result.unwrap().is_ok());
}

#[tokio::test]
async fn test_run_stops_when_inbound_subscription_ends() {
    let h = Harness::start(MemoryStore::new());

    h.bus.close();

    let result = tokio::time::timeout(Duration::from_secs(2), h.task)
        .await
        .expect("server did not stop");
    assert!(result.unwrap().is_ok());
}

#[tokio::test]
async fn test_zero_queue_capacity_from_config_still_routes() {
    let bus = MemoryBus::new();
    let mut outbound = bus.subscribe(PUBLISH_TOPIC);
    let config = HearthConfig::from_toml(&format!(
        "[transport]\npublish_topic = \"{PUBLISH_TOPIC}\"\n\n[dispatch]\nqueue_capacity = 0\n"
    ))
    .unwrap();
    let server = HearthServerBuilder::from_config(&config).build(
        bus.subscribe(READ_TOPIC),
        bus.clone(),
        Arc::new(MemoryStore::new()),
    );
    let cancel = CancellationToken::new();
    let task = tokio::spawn(server.run(cancel.clone()));

    bus.publish(READ_TOPIC, heartbeat("alice", "ACTIVE").as_bytes())
        .await
        .unwrap();
    let bytes = tokio::time::timeout(Duration::from_secs(2), outbound.next_message())
        .await
        .expect("timed out waiting for outbound envelope")
        .unwrap()
        .expect("publish topic ended");
    let notice: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(notice["ClientId"], "alice");

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_zero_session_timings_run_until_cancel() {
    let bus = MemoryBus::new();
    let server = HearthServerBuilder::new()
        .session_config(SessionConfig {
            sweep_interval: Duration::ZERO,
            command_capacity: 0,
            ..SessionConfig::default()
        })
        .build(
            bus.subscribe(READ_TOPIC),
            bus.clone(),
            Arc::new(MemoryStore::new()),
        );
    let registry = server.registry();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(server.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(registry.len().await.unwrap(), 0);

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("server did not stop");
    assert!(result.unwrap().is_ok());
}
