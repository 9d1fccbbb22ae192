//! Terminal client: create or join a room and watch in sync.
//!
//! ```bash
//! # Start a room with a video
//! syncwatch --username alice --video https://example.com/movie.mp4
//!
//! # Join it from another terminal sharing the same store directory
//! syncwatch --username bob --room AB12CD
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use parking_lot::Mutex;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use syncwatch::client::chat::ChatCommand;
use syncwatch::client::{
    spawn_sync_loop, ClientEvent, EngineOptions, EventSink, LocalCommand, MessageKind,
    NotificationLevel, Room, SessionManager, SyncEngine, User,
};
use syncwatch::error::JoinError;
use syncwatch::config::load_config;
use syncwatch::player::{events, ActivePlayer, HeadlessFactory};
use syncwatch::store::{FileRoomStore, RoomStore};
use syncwatch::utils::{room_code_from_link, room_link};

/// SyncWatch
///
/// Watch a video together: every member's player follows the room's shared
/// playback state.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Display name (max 20 characters)
    #[arg(short, long, env = "SYNCWATCH_USERNAME")]
    username: Option<String>,

    /// Room code to join; a new room is created when omitted
    #[arg(short, long)]
    room: Option<String>,

    /// Share link carrying `?room=<code>`
    #[arg(long, conflicts_with = "room")]
    link: Option<String>,

    /// Video to load after entering the room
    #[arg(long)]
    video: Option<String>,

    /// Config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shared store directory, overrides the config
    #[arg(long, env = "SYNCWATCH_STORE_DIR")]
    store_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "syncwatch=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref()).context("Failed to load config")?;
    if let Some(dir) = args.store_dir {
        config.store.directory = dir;
    }

    let store: Arc<dyn RoomStore> = Arc::new(
        FileRoomStore::open(&config.store.directory, Some(config.store.poll_interval()))
            .with_context(|| format!("Failed to open store {}", config.store.directory.display()))?,
    );
    let sessions = SessionManager::new(store.clone(), config.room.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let username = match args.username.or_else(|| config.user.username.clone()) {
        Some(name) => name,
        None => prompt(&mut lines, "Username: ").await?,
    };
    let user = match sessions.register_user(&username) {
        Ok(user) => user,
        Err(e) => {
            println!("[error] {}", e);
            prompt_user(&sessions, &mut lines).await?
        }
    };

    let code = args
        .room
        .or_else(|| args.link.as_deref().and_then(room_code_from_link));
    let (room, user, initial_video) =
        enter_room(&sessions, user, code, args.video, &mut lines).await?;
    info!("In room {} as {}", room.code, user.username);
    println!("Room code: {}", room.code);
    if let Some(link) = room_link(&config.user.share_base_url, &room.code) {
        println!("Share link: {}", link);
    }

    let (player_tx, player_rx) = events::channel();
    let mut player = ActivePlayer::new(
        Box::new(HeadlessFactory::new(config.player.embed_init_delay())),
        player_tx,
    );
    player.set_volume(config.player.default_volume);
    player.set_ready_timeout(config.player.ready_timeout());

    let members = Arc::new(Mutex::new(room.users.clone()));
    let (sink, client_events) = EventSink::channel();
    let printer = tokio::spawn(print_events(client_events, members.clone()));

    let code = room.code.clone();
    let engine = SyncEngine::new(
        store,
        player,
        user,
        room,
        EngineOptions::from(&config),
        sink,
    );
    let (commands, handle) = spawn_sync_loop(engine, player_rx, config.sync.interval());
    if let Some(url) = initial_video {
        let _ = commands.send(LocalCommand::Load(url));
    }
    println!("Type /help for commands");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let command = match ChatCommand::parse(&line) {
            None if line.trim().is_empty() => continue,
            None => LocalCommand::Send(line),
            Some(ChatCommand::Load(url)) => LocalCommand::Load(url),
            Some(ChatCommand::Play) => LocalCommand::Play,
            Some(ChatCommand::Pause) => LocalCommand::Pause,
            Some(ChatCommand::Toggle) => LocalCommand::Toggle,
            Some(ChatCommand::Seek(time)) => LocalCommand::Seek(time),
            Some(ChatCommand::Volume(level)) => LocalCommand::Volume(level),
            Some(ChatCommand::Duration(seconds)) => LocalCommand::Duration(seconds),
            Some(ChatCommand::Status) => LocalCommand::Status,
            Some(ChatCommand::Quit) => break,
            Some(ChatCommand::Users) => {
                let names: Vec<String> = members
                    .lock()
                    .iter()
                    .map(|u| u.username.clone())
                    .collect();
                println!("Users ({}): {}", names.len(), names.join(", "));
                continue;
            }
            Some(ChatCommand::Link) => {
                match room_link(&config.user.share_base_url, &code) {
                    Some(link) => println!("{}", link),
                    None => println!("Room code: {}", code),
                }
                continue;
            }
            Some(ChatCommand::Help) => {
                println!("{}", ChatCommand::help_text());
                continue;
            }
            Some(ChatCommand::Usage(usage)) => {
                println!("Usage: {}", usage);
                continue;
            }
            Some(ChatCommand::Unknown(name)) => {
                println!("Unknown command /{} (try /help)", name);
                continue;
            }
        };
        if commands.send(command).is_err() {
            break;
        }
    }

    let _ = commands.send(LocalCommand::Leave);
    let engine = handle.await.context("Sync loop panicked")?;
    info!("Left room {}", engine.room().code);
    printer.abort();
    Ok(())
}

async fn prompt<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    question: &str,
) -> anyhow::Result<String> {
    print!("{}", question);
    std::io::stdout().flush()?;
    match lines.next_line().await? {
        Some(line) => Ok(line.trim().to_string()),
        None => bail!("Input closed"),
    }
}

async fn prompt_user<R: AsyncBufRead + Unpin>(
    sessions: &SessionManager,
    lines: &mut Lines<R>,
) -> anyhow::Result<User> {
    loop {
        let name = prompt(lines, "Username: ").await?;
        match sessions.register_user(&name) {
            Ok(user) => return Ok(user),
            Err(e) => println!("[error] {}", e),
        }
    }
}

/// Join `code`, or create a room when there is none. A refused join asks
/// for a new username or room code instead of exiting.
/// Returns the room, the member who entered it and any video still to load.
async fn enter_room<R: AsyncBufRead + Unpin>(
    sessions: &SessionManager,
    mut user: User,
    mut code: Option<String>,
    video: Option<String>,
    lines: &mut Lines<R>,
) -> anyhow::Result<(Room, User, Option<String>)> {
    loop {
        let Some(current) = code.take() else {
            let room = sessions.create_room(user.clone(), video.as_deref()).await?;
            return Ok((room, user, None));
        };
        match sessions.join_room(&current, user.clone()).await {
            Ok(room) => return Ok((room, user, video)),
            Err(JoinError::Persistence(e)) => {
                return Err(e).context("Failed to join room");
            }
            Err(e @ JoinError::UsernameTaken(_)) => {
                warn!("{}", e);
                println!("[error] {}", e);
                user = prompt_user(sessions, lines).await?;
                code = Some(current);
            }
            Err(e) => {
                warn!("{}", e);
                println!("[error] {}", e);
                let next = prompt(lines, "Room code (empty to create a new room): ").await?;
                code = Some(next).filter(|c| !c.is_empty());
            }
        }
    }
}

async fn print_events(
    mut events: tokio::sync::mpsc::UnboundedReceiver<ClientEvent>,
    members: Arc<Mutex<Vec<User>>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Notification { level, message } => {
                let tag = match level {
                    NotificationLevel::Info => "info",
                    NotificationLevel::Success => "ok",
                    NotificationLevel::Warning => "warn",
                    NotificationLevel::Error => "error",
                };
                println!("[{}] {}", tag, message);
            }
            ClientEvent::System(text) => println!("* {}", text),
            ClientEvent::Chat(message) => match message.kind {
                MessageKind::Voice => println!("<{}> (voice message)", message.username),
                _ => println!("<{}> {}", message.username, message.content),
            },
            ClientEvent::Users(users) => {
                let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
                println!("* Users: {}", names.join(", "));
                *members.lock() = users;
            }
            ClientEvent::Syncing(status) => println!("~ {}", status),
        }
    }
}
