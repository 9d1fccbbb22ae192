use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use super::backend::PlayerKind;

const VIDEO_EXTENSIONS: [&str; 5] = [".mp4", ".webm", ".ogg", ".mov", ".m3u8"];
const MEDIA_DOMAINS: [&str; 3] = ["googleapis.com", "cloudflare.com", "sample-videos.com"];
const YOUTUBE_HOSTS: [&str; 2] = ["youtube.com", "youtube-nocookie.com"];
const YOUTUBE_PATH_PREFIXES: [&str; 4] = ["embed", "shorts", "live", "v"];

/// What a URL resolves to for playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Native { url: String },
    Youtube { id: String },
    Vimeo { id: String },
    Unrecognized,
}

impl MediaSource {
    pub fn kind(&self) -> Option<PlayerKind> {
        match self {
            Self::Native { .. } => Some(PlayerKind::Native),
            Self::Youtube { .. } => Some(PlayerKind::Youtube),
            Self::Vimeo { .. } => Some(PlayerKind::Vimeo),
            Self::Unrecognized => None,
        }
    }
}

fn youtube_id_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("invalid youtube id regex"))
}

fn vimeo_id_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[0-9]+$").expect("invalid vimeo id regex"))
}

/// Pick the backend for a URL.
///
/// Embed patterns are tried before the generic native heuristics. Never fails:
/// anything that is not a usable http(s) URL comes back as `Unrecognized`.
pub fn classify(url: &str) -> MediaSource {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return MediaSource::Unrecognized;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return MediaSource::Unrecognized;
    }
    let Some(host) = parsed.host_str().map(|h| h.to_ascii_lowercase()) else {
        return MediaSource::Unrecognized;
    };
    let host = strip_subdomain(&host);

    if host == "youtu.be" || YOUTUBE_HOSTS.contains(&host) {
        return youtube_id(&parsed, host)
            .map(|id| MediaSource::Youtube { id })
            .unwrap_or(MediaSource::Unrecognized);
    }
    if host == "vimeo.com" || host == "player.vimeo.com" {
        return vimeo_id(&parsed)
            .map(|id| MediaSource::Vimeo { id })
            .unwrap_or(MediaSource::Unrecognized);
    }
    MediaSource::Native {
        url: parsed.to_string(),
    }
}

/// Whether the URL looks like a direct video or a known media host
pub fn is_known_video_url(url: &str) -> bool {
    match classify(url) {
        MediaSource::Youtube { .. } | MediaSource::Vimeo { .. } => true,
        MediaSource::Native { url } => {
            let Ok(parsed) = Url::parse(&url) else {
                return false;
            };
            let path = parsed.path().to_ascii_lowercase();
            let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
            VIDEO_EXTENSIONS.iter().any(|ext| path.contains(ext))
                || MEDIA_DOMAINS.iter().any(|domain| host.contains(domain))
        }
        MediaSource::Unrecognized => false,
    }
}

fn strip_subdomain(host: &str) -> &str {
    for prefix in ["www.", "m.", "music."] {
        if let Some(rest) = host.strip_prefix(prefix) {
            return rest;
        }
    }
    host
}

fn youtube_id(url: &Url, host: &str) -> Option<String> {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let candidate = if host == "youtu.be" {
        segments.first().map(|s| s.to_string())
    } else if segments.first() == Some(&"watch") {
        url.query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
    } else if segments.len() >= 2 && YOUTUBE_PATH_PREFIXES.contains(&segments[0]) {
        Some(segments[1].to_string())
    } else {
        None
    };

    candidate.filter(|id| youtube_id_regex().is_match(id))
}

fn vimeo_id(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|seg| vimeo_id_regex().is_match(seg))
        .last()
        .map(|seg| seg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_youtube_variants() {
        let expected = MediaSource::Youtube {
            id: "dQw4w9WgXcQ".to_string(),
        };
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&t=42",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
        ] {
            assert_eq!(classify(url), expected, "{url}");
        }
    }

    #[test]
    fn test_classify_youtube_without_id_is_unrecognized() {
        assert_eq!(
            classify("https://www.youtube.com/feed/trending"),
            MediaSource::Unrecognized
        );
        assert_eq!(
            classify("https://www.youtube.com/watch?v=short"),
            MediaSource::Unrecognized
        );
    }

    #[test]
    fn test_classify_vimeo() {
        assert_eq!(
            classify("https://vimeo.com/76979871"),
            MediaSource::Vimeo {
                id: "76979871".to_string()
            }
        );
        assert_eq!(
            classify("https://player.vimeo.com/video/76979871"),
            MediaSource::Vimeo {
                id: "76979871".to_string()
            }
        );
        assert_eq!(classify("https://vimeo.com/about"), MediaSource::Unrecognized);
    }

    #[test]
    fn test_classify_native() {
        let url = "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4";
        assert_eq!(
            classify(url),
            MediaSource::Native {
                url: url.to_string()
            }
        );
        assert_eq!(
            classify("http://example.com/stream").kind(),
            Some(PlayerKind::Native)
        );
    }

    #[test]
    fn test_classify_malformed_is_unrecognized() {
        for url in ["", "not a url", "ftp://example.com/a.mp4", "file:///tmp/a.mp4", "http://"] {
            assert_eq!(classify(url), MediaSource::Unrecognized, "{url}");
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        let url = "https://youtu.be/dQw4w9WgXcQ";
        assert_eq!(classify(url), classify(url));
        assert_eq!(classify("%%%"), classify("%%%"));
    }

    #[test]
    fn test_is_known_video_url() {
        assert!(is_known_video_url("https://example.com/movie.webm"));
        assert!(is_known_video_url("https://cdn.cloudflare.com/x"));
        assert!(is_known_video_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(!is_known_video_url("https://example.com/index.html"));
        assert!(!is_known_video_url("garbage"));
    }
}
