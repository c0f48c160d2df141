//! Fetch backends that turn user queries into local audio files.
//!
//! [`YtDlpFetcher`] is the production [`Fetcher`](crate::resolver::Fetcher):
//! it downloads through `yt-dlp` and can translate Spotify track links into
//! searches with [`SpotifyClient`].

pub mod spotify;
pub mod ytdlp;

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

pub use spotify::SpotifyClient;
pub use ytdlp::YtDlpFetcher;

/// Path of an `open.spotify.com` track link, optionally localised.
static SPOTIFY_TRACK_PATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^/(?:intl-[A-Za-z-]+/)?track/([A-Za-z0-9]+)/?$").ok());

/// What a user query points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    YouTube(Url),
    /// Spotify track id.
    SpotifyTrack(String),
    /// Any other link; handed to yt-dlp as is.
    OtherUrl(Url),
    /// Free text to search for.
    Search(String),
}

pub fn classify(query: &str) -> QueryKind {
    let query = query.trim();

    if let Some(id) = query.strip_prefix("spotify:track:") {
        return QueryKind::SpotifyTrack(id.to_string());
    }

    let Ok(url) = Url::parse(query) else {
        return QueryKind::Search(query.to_string());
    };

    if !matches!(url.scheme(), "http" | "https") {
        return QueryKind::Search(query.to_string());
    }

    match url.host_str() {
        Some(host) if is_youtube_host(host) => QueryKind::YouTube(url),
        Some("open.spotify.com") => match spotify_track_id(url.path()) {
            Some(id) => QueryKind::SpotifyTrack(id),
            None => QueryKind::OtherUrl(url),
        },
        _ => QueryKind::OtherUrl(url),
    }
}

fn spotify_track_id(path: &str) -> Option<String> {
    let caps = SPOTIFY_TRACK_PATH.as_ref()?.captures(path)?;
    Some(caps[1].to_string())
}

fn is_youtube_host(host: &str) -> bool {
    let host = host.strip_prefix("www.").unwrap_or(host);
    matches!(
        host,
        "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be"
    )
}
