use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::resolver::FetchError;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";

/// Tokens are renewed this long before Spotify says they expire.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
pub struct Track {
    name: String,
    artists: Vec<Artist>,
}

impl Track {
    /// "track artist", the text searched for on YouTube.
    pub fn search_query(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} {}", self.name, artist.name),
            None => self.name.clone(),
        }
    }
}

struct AccessToken {
    value: String,
    valid_until: Instant,
}

/// Minimal Spotify Web API client using the client credentials flow.
pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, FetchError> {
        let mut token = self.token.lock().await;

        if let Some(current) = token.as_ref() {
            if Instant::now() < current.valid_until {
                return Ok(current.value.clone());
            }
        }

        debug!("🔑 Solicitando token de Spotify");
        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body("grant_type=client_credentials")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_MARGIN);
        *token = Some(AccessToken {
            value: response.access_token.clone(),
            valid_until: Instant::now() + lifetime,
        });

        Ok(response.access_token)
    }

    pub async fn track(&self, id: &str) -> Result<Track, FetchError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .get(format!("{}/tracks/{}", API_URL, id))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND
            || response.status() == reqwest::StatusCode::BAD_REQUEST
        {
            return Err(FetchError::Unresolvable(format!("spotify:track:{}", id)));
        }

        let track: Track = response.error_for_status()?.json().await?;
        info!("🎧 Spotify: {}", track.search_query());
        Ok(track)
    }
}
