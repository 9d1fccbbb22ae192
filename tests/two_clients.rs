use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use syncwatch::client::sync::LocalAction;
use syncwatch::client::{ClientEvent, EngineOptions, EventSink, Room, SyncEngine, User};
use syncwatch::player::{events, ActivePlayer, HeadlessFactory, PlayerKind};
use syncwatch::store::{FileRoomStore, MemoryBackend, RoomStore};
use syncwatch::utils::now_millis;

const URL: &str = "https://example.com/movie.mp4";

fn engine(
    store: Arc<dyn RoomStore>,
    user: User,
    room: Room,
) -> (SyncEngine, UnboundedReceiver<ClientEvent>) {
    let (player_tx, _player_rx) = events::channel();
    let player = ActivePlayer::new(Box::new(HeadlessFactory::default()), player_tx);
    let (sink, rx) = EventSink::channel();
    let engine = SyncEngine::new(store, player, user, room, EngineOptions::default(), sink);
    (engine, rx)
}

fn shared_room(alice: &User, bob: &User) -> Room {
    let mut room = Room::new("WATCH1", alice.clone());
    room.users.push(bob.clone());
    room.video_state.url = URL.to_string();
    room.video_state.player_type = Some(PlayerKind::Native);
    room.video_state.last_update = now_millis();
    room
}

fn chat_contents(rx: &mut UnboundedReceiver<ClientEvent>) -> Vec<String> {
    let mut contents = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ClientEvent::Chat(message) = event {
            contents.push(message.content);
        }
    }
    contents
}

#[tokio::test]
async fn test_follower_tracks_leader() {
    let backend = MemoryBackend::new();
    let (alice, bob) = (User::new("alice"), User::new("bob"));
    let room = shared_room(&alice, &bob);
    let store_a = backend.connect();
    store_a.put("WATCH1", &room).await.unwrap();
    let store_b = backend.connect();
    let mut sub_b = store_b.subscribe();

    let (mut a, _) = engine(Arc::new(store_a), alice, room.clone());
    let (mut b, _) = engine(Arc::new(store_b), bob, room);
    a.reconcile();
    b.reconcile();
    assert!(b.player().is_ready());

    a.apply_local_action(LocalAction::Seek(40.0)).await.unwrap();
    a.apply_local_action(LocalAction::Play).await.unwrap();

    while let Some(event) = sub_b.try_recv() {
        b.handle_store_event(&event);
    }
    assert!(b.player().is_playing());
    assert!((b.player().current_time() - 40.0).abs() < 0.5);

    a.apply_local_action(LocalAction::Pause).await.unwrap();
    let event = sub_b.try_recv().unwrap();
    b.handle_store_event(&event);
    assert!(!b.player().is_playing());
}

#[tokio::test]
async fn test_concurrent_writes_lose_one_update() {
    let backend = MemoryBackend::new();
    let (alice, bob) = (User::new("alice"), User::new("bob"));
    let room = shared_room(&alice, &bob);
    let store_a = backend.connect();
    store_a.put("WATCH1", &room).await.unwrap();
    let store_b = backend.connect();
    let observer = backend.connect();

    let (mut a, _) = engine(Arc::new(store_a), alice, room.clone());
    let (mut b, _) = engine(Arc::new(store_b), bob, room);
    a.reconcile();
    b.reconcile();

    // Both act from the same snapshot; bob's write lands last
    a.send_message("did anyone else hear that?").await.unwrap();
    b.apply_local_action(LocalAction::Play).await.unwrap();

    let stored = observer.get("WATCH1").await.unwrap().unwrap();
    assert!(stored.video_state.playing);
    assert!(stored.messages.is_empty());
}

#[tokio::test]
async fn test_messages_replayed_once_across_clients() {
    let backend = MemoryBackend::new();
    let (alice, bob) = (User::new("alice"), User::new("bob"));
    let room = shared_room(&alice, &bob);
    let store_a = backend.connect();
    store_a.put("WATCH1", &room).await.unwrap();
    let store_b = backend.connect();
    let mut sub_a = store_a.subscribe();
    let mut sub_b = store_b.subscribe();

    let (mut a, mut a_events) = engine(Arc::new(store_a), alice, room.clone());
    let (mut b, mut b_events) = engine(Arc::new(store_b), bob, room);

    a.send_message("first").await.unwrap();
    a.send_message("second").await.unwrap();
    assert_eq!(chat_contents(&mut a_events), vec!["first", "second"]);

    while let Some(event) = sub_b.try_recv() {
        b.handle_store_event(&event);
    }
    assert_eq!(chat_contents(&mut b_events), vec!["first", "second"]);

    b.send_message("third").await.unwrap();
    assert_eq!(chat_contents(&mut b_events), vec!["third"]);

    while let Some(event) = sub_a.try_recv() {
        a.handle_store_event(&event);
    }
    assert_eq!(chat_contents(&mut a_events), vec!["third"]);
    assert_eq!(a.room().messages.len(), 3);
}

#[tokio::test]
async fn test_file_store_between_processes() {
    let dir = TempDir::new().unwrap();
    let (alice, bob) = (User::new("alice"), User::new("bob"));
    let room = shared_room(&alice, &bob);

    let store_a = Arc::new(FileRoomStore::open(dir.path(), None).unwrap());
    store_a.put("WATCH1", &room).await.unwrap();
    let store_b = Arc::new(FileRoomStore::open(dir.path(), None).unwrap());
    let mut sub_b = store_b.subscribe();

    let (mut a, _) = engine(store_a.clone(), alice, room.clone());
    let (mut b, _) = engine(store_b.clone(), bob, room);
    a.reconcile();
    b.reconcile();

    a.apply_local_action(LocalAction::Seek(25.0)).await.unwrap();
    assert_eq!(store_a.scan().await.unwrap(), 0);
    assert_eq!(store_b.scan().await.unwrap(), 1);

    let event = sub_b.try_recv().unwrap();
    b.handle_store_event(&event);
    assert!((b.player().current_time() - 25.0).abs() < 0.01);
    assert_eq!(b.room().video_state.current_time, 25.0);
}

#[tokio::test]
async fn test_leave_removes_member() {
    let backend = MemoryBackend::new();
    let (alice, bob) = (User::new("alice"), User::new("bob"));
    let room = shared_room(&alice, &bob);
    let store = backend.connect();
    store.put("WATCH1", &room).await.unwrap();

    let (mut b, _) = engine(Arc::new(backend.connect()), bob, room);
    b.leave().await.unwrap();

    let stored = store.get("WATCH1").await.unwrap().unwrap();
    assert_eq!(stored.users, vec![alice]);
}
