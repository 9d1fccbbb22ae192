use crate::utils::{parse_time, split_command_arguments};

/// Slash command typed into the chat line
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    Load(String),
    Play,
    Pause,
    Toggle,
    Seek(f64),
    /// Volume as a 0.0-1.0 level
    Volume(f64),
    /// Length of the loaded video, for end detection
    Duration(f64),
    Users,
    Status,
    Link,
    Help,
    Quit,
    /// Recognized command with missing or bad arguments
    Usage(&'static str),
    Unknown(String),
}

impl ChatCommand {
    /// `None` when the line is plain chat text
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let rest = input.strip_prefix('/')?;
        let args = split_command_arguments(rest);
        let (name, args) = args.split_first()?;

        let command = match name.to_ascii_lowercase().as_str() {
            "load" | "l" => match args.first() {
                Some(url) => ChatCommand::Load(url.clone()),
                None => ChatCommand::Usage("/load <url>"),
            },
            "play" => ChatCommand::Play,
            "pause" => ChatCommand::Pause,
            "toggle" | "t" => ChatCommand::Toggle,
            "seek" | "s" => match args.first().and_then(|t| parse_time(t)) {
                Some(time) => ChatCommand::Seek(time),
                None => ChatCommand::Usage("/seek <seconds|mm:ss|hh:mm:ss>"),
            },
            "volume" | "vol" => match args.first().and_then(|v| v.parse::<f64>().ok()) {
                Some(percent) if (0.0..=100.0).contains(&percent) => {
                    ChatCommand::Volume(percent / 100.0)
                }
                _ => ChatCommand::Usage("/volume <0-100>"),
            },
            "duration" => match args.first().and_then(|t| parse_time(t)) {
                Some(time) if time > 0.0 => ChatCommand::Duration(time),
                _ => ChatCommand::Usage("/duration <seconds|mm:ss|hh:mm:ss>"),
            },
            "users" | "u" => ChatCommand::Users,
            "status" => ChatCommand::Status,
            "link" => ChatCommand::Link,
            "help" | "h" | "?" => ChatCommand::Help,
            "quit" | "q" | "leave" => ChatCommand::Quit,
            other => ChatCommand::Unknown(other.to_string()),
        };
        Some(command)
    }

    pub fn help_text() -> String {
        [
            "Available commands:",
            "  /load <url>      - Load a video for everyone",
            "  /play, /pause    - Control playback",
            "  /toggle          - Toggle play/pause",
            "  /seek <time>     - Seek (90, 1:30 or 1:01:30)",
            "  /volume <0-100>  - Set local volume",
            "  /duration <time> - Set the local video length",
            "  /users           - List users in the room",
            "  /status          - Show local playback status",
            "  /link            - Show the share link",
            "  /help            - Show this help",
            "  /quit            - Leave the room",
            "Anything else is sent as a chat message.",
        ]
        .join("\n")
    }
}
