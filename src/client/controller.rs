use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::sync::{LocalAction, SyncEngine};
use crate::error::Result;
use crate::player::events::PlayerEventReceiver;

/// Request from the UI to the sync loop
#[derive(Debug, Clone, PartialEq)]
pub enum LocalCommand {
    Load(String),
    Play,
    Pause,
    Toggle,
    Seek(f64),
    Volume(f64),
    Duration(f64),
    Send(String),
    Voice(String),
    Status,
    Leave,
}

pub type CommandSender = mpsc::UnboundedSender<LocalCommand>;
pub type CommandReceiver = mpsc::UnboundedReceiver<LocalCommand>;

/// Start the loop on the current runtime; the handle yields the engine once the user leaves
pub fn spawn_sync_loop(
    engine: SyncEngine,
    player_events: PlayerEventReceiver,
    period: Duration,
) -> (CommandSender, JoinHandle<SyncEngine>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_sync_loop(engine, rx, player_events, period));
    (tx, handle)
}

/// Drive one client: the periodic poll, store notifications, player events
/// and local commands all run on this task, one at a time.
pub async fn run_sync_loop(
    mut engine: SyncEngine,
    mut commands: CommandReceiver,
    mut player_events: PlayerEventReceiver,
    period: Duration,
) -> SyncEngine {
    let mut subscription = engine.subscribe();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    engine.start();
    info!("Sync loop started for room {}", engine.room().code);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = engine.poll().await {
                    engine.report(&e);
                }
            }
            Some(event) = subscription.recv() => {
                debug!("Store change for {}", event.key);
                engine.handle_store_event(&event);
            }
            Some(event) = player_events.recv() => {
                engine.handle_player_event(event).await;
            }
            command = commands.recv() => match command {
                Some(LocalCommand::Leave) | None => {
                    if let Err(e) = engine.leave().await {
                        engine.report(&e);
                    }
                    break;
                }
                Some(command) => {
                    if let Err(e) = apply_command(&mut engine, command).await {
                        engine.report(&e);
                    }
                }
            },
        }
    }

    info!("Sync loop stopped");
    engine
}

async fn apply_command(engine: &mut SyncEngine, command: LocalCommand) -> Result<()> {
    match command {
        LocalCommand::Load(url) => engine.apply_local_action(LocalAction::Load(url)).await,
        LocalCommand::Play => engine.apply_local_action(LocalAction::Play).await,
        LocalCommand::Pause => engine.apply_local_action(LocalAction::Pause).await,
        LocalCommand::Toggle => {
            let action = if engine.player().is_playing() {
                LocalAction::Pause
            } else {
                LocalAction::Play
            };
            engine.apply_local_action(action).await
        }
        LocalCommand::Seek(time) => engine.apply_local_action(LocalAction::Seek(time)).await,
        LocalCommand::Volume(level) => {
            engine.set_volume(level);
            Ok(())
        }
        LocalCommand::Duration(seconds) => engine.set_duration(seconds),
        LocalCommand::Send(text) => engine.send_message(&text).await,
        LocalCommand::Voice(payload) => engine.send_voice(payload).await,
        LocalCommand::Status => {
            let status = engine.status_line();
            engine.events().system(status);
            Ok(())
        }
        LocalCommand::Leave => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::events::{ClientEvent, EventSink, NotificationLevel};
    use crate::client::room::{Room, User};
    use crate::client::sync::EngineOptions;
    use crate::player::events;
    use crate::player::slot::{ActivePlayer, HeadlessFactory};
    use crate::store::{MemoryBackend, RoomStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_loop_survives_failed_pass_and_leaves() {
        let backend = MemoryBackend::new();
        let store = backend.connect();
        let alice = User::new("alice");
        let room = Room::new("LOOP01", alice.clone());
        store.put("LOOP01", &room).await.unwrap();

        let (player_tx, player_rx) = events::channel();
        let player = ActivePlayer::new(Box::new(HeadlessFactory::default()), player_tx);
        let (sink, mut client_events) = EventSink::channel();
        let engine = SyncEngine::new(
            Arc::new(store.clone()),
            player,
            alice,
            room,
            EngineOptions::default(),
            sink,
        );
        let (commands, handle) = spawn_sync_loop(engine, player_rx, Duration::from_millis(20));

        // Rejected before the player is ready; the loop keeps going
        commands.send(LocalCommand::Play).unwrap();
        commands
            .send(LocalCommand::Load("https://example.com/a.mp4".into()))
            .unwrap();
        commands.send(LocalCommand::Play).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        commands.send(LocalCommand::Leave).unwrap();
        let engine = handle.await.unwrap();

        assert!(engine.room().users.is_empty());
        let stored = store.get("LOOP01").await.unwrap().unwrap();
        assert!(stored.users.is_empty());
        assert!(stored.video_state.playing);
        assert_eq!(stored.video_state.url, "https://example.com/a.mp4");

        let mut saw_not_ready = false;
        while let Ok(event) = client_events.try_recv() {
            if let ClientEvent::Notification {
                level: NotificationLevel::Error,
                message,
            } = event
            {
                saw_not_ready |= message.contains("not ready");
            }
        }
        assert!(saw_not_ready);
    }

    #[tokio::test]
    async fn test_timer_keeps_running_after_failed_reads() {
        let backend = MemoryBackend::new();
        let store = backend.connect();
        let alice = User::new("alice");
        let room = Room::new("LOOP02", alice.clone());
        store.put("LOOP02", &room).await.unwrap();

        // Written before the loop subscribes, so only a periodic read can see it
        let mut updated = room.clone();
        updated.video_state.url = "https://example.com/b.mp4".into();
        updated.video_state.current_time = 30.0;
        store.put("LOOP02", &updated).await.unwrap();

        let (player_tx, player_rx) = events::channel();
        let player = ActivePlayer::new(Box::new(HeadlessFactory::default()), player_tx);
        let (sink, mut client_events) = EventSink::channel();
        let engine = SyncEngine::new(
            Arc::new(backend.connect()),
            player,
            alice,
            room,
            EngineOptions::default(),
            sink,
        );

        backend.set_reads_failing(true);
        let (commands, handle) = spawn_sync_loop(engine, player_rx, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;

        let mut failed_passes = 0;
        while let Ok(event) = client_events.try_recv() {
            match event {
                ClientEvent::Notification {
                    level: NotificationLevel::Error,
                    message,
                } if message.contains("cannot be read") => failed_passes += 1,
                ClientEvent::Syncing(status) => assert!(!status.starts_with("Loading")),
                _ => {}
            }
        }
        assert!(failed_passes >= 2, "only {} failed passes", failed_passes);

        backend.set_reads_failing(false);
        tokio::time::sleep(Duration::from_millis(80)).await;
        let mut loaded = false;
        while let Ok(event) = client_events.try_recv() {
            loaded |= event == ClientEvent::Syncing("Loading https://example.com/b.mp4".into());
        }
        assert!(loaded);

        commands.send(LocalCommand::Leave).unwrap();
        handle.await.unwrap();
    }
}
