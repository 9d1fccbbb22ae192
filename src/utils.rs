use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use url::Url;

const ID_RANDOM_LENGTH: usize = 9;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Random base-36 prefix followed by the base-36 millisecond clock
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    let prefix: String = (0..ID_RANDOM_LENGTH)
        .map(|_| std::char::from_digit(rng.gen_range(0..36), 36).unwrap_or('0'))
        .collect();
    format!("{}{}", prefix, to_base36(now_millis().max(0) as u64))
}

pub fn generate_room_code(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

pub fn normalize_room_code(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(std::char::from_digit((value % 36) as u32, 36).unwrap_or('0'));
        value /= 36;
    }
    digits.iter().rev().collect()
}

/// Shareable link carrying the room code as `?room=`
pub fn room_link(base: &str, code: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    url.query_pairs_mut().clear().append_pair("room", code);
    Some(url.to_string())
}

pub fn room_code_from_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "room")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Short content fingerprint used to recognise our own writes
pub fn content_digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{:x}", digest);
    hex.chars().take(16).collect()
}

pub fn split_command_arguments(value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    shell_words::split(value)
        .unwrap_or_else(|_| value.split_whitespace().map(|s| s.to_string()).collect())
}

pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Accepts `90`, `90.5`, `1:30` or `1:01:30`
pub fn parse_time(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for part in value.split(':') {
        let number: f64 = part.parse().ok()?;
        if !number.is_finite() || number < 0.0 {
            return None;
        }
        total = total * 60.0 + number;
    }
    Some(total)
}

pub fn truncate_text(value: &str, max_length: usize) -> String {
    value.chars().take(max_length).collect()
}
