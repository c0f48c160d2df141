use anyhow::{Context, Result};
use std::{path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Cola y resolución
    pub resolver_workers: usize,
    pub resolve_timeout: Duration,
    pub max_queue_size: usize,

    // Descargas
    pub download_dir: PathBuf,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: Option<PathBuf>,

    // Fuentes
    pub enable_youtube: bool,
    pub enable_spotify: bool,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            discord_token: var("DISCORD_TOKEN").context("falta DISCORD_TOKEN")?,
            application_id: var("APPLICATION_ID")
                .context("falta APPLICATION_ID")?
                .trim()
                .parse()
                .context("APPLICATION_ID inválido")?,
            guild_id: var("GUILD_ID").and_then(|s| s.trim().parse().ok()),

            resolver_workers: parse_or(var("RESOLVER_WORKERS"), defaults.resolver_workers)
                .context("RESOLVER_WORKERS inválido")?,
            resolve_timeout: match var("RESOLVE_TIMEOUT") {
                Some(raw) => parse_timeout(&raw).context("RESOLVE_TIMEOUT inválido")?,
                None => defaults.resolve_timeout,
            },
            max_queue_size: parse_or(var("MAX_QUEUE_SIZE"), defaults.max_queue_size)
                .context("MAX_QUEUE_SIZE inválido")?,

            download_dir: var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            ytdlp_path: var("YTDLP_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ytdlp_path),
            ffmpeg_path: var("FFMPEG_PATH").map(PathBuf::from),

            enable_youtube: parse_or(var("ENABLE_YOUTUBE"), defaults.enable_youtube)
                .context("ENABLE_YOUTUBE inválido")?,
            enable_spotify: parse_or(var("ENABLE_SPOTIFY"), defaults.enable_spotify)
                .context("ENABLE_SPOTIFY inválido")?,
            spotify_client_id: var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: var("SPOTIFY_CLIENT_SECRET"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// - At least one resolver worker and one queue slot
    /// - A non-zero resolve timeout
    /// - Spotify credentials present when Spotify is enabled
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.is_empty() {
            anyhow::bail!("DISCORD_TOKEN no puede estar vacío");
        }

        if self.resolver_workers == 0 {
            anyhow::bail!("Resolver workers must be greater than 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.enable_spotify
            && (self.spotify_client_id.is_none() || self.spotify_client_secret.is_none())
        {
            anyhow::bail!("ENABLE_SPOTIFY requiere SPOTIFY_CLIENT_ID y SPOTIFY_CLIENT_SECRET");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Tokens and secrets are left out.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Resolver: {} workers, {} timeout\n  \
            Queue: {} items max\n  \
            Downloads: {} (yt-dlp: {})\n  \
            Sources: YouTube={}, Spotify={}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.resolver_workers,
            humantime::format_duration(self.resolve_timeout),
            self.max_queue_size,
            self.download_dir.display(),
            self.ytdlp_path.display(),
            self.enable_youtube,
            self.enable_spotify
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            resolver_workers: num_cpus::get().clamp(1, 4),
            resolve_timeout: Duration::from_secs(300),
            max_queue_size: 1000,

            download_dir: "downloads".into(),
            ytdlp_path: "yt-dlp".into(),
            ffmpeg_path: None,

            enable_youtube: true,
            enable_spotify: false,
            spotify_client_id: None,
            spotify_client_secret: None,
        }
    }
}

fn parse_or<T>(raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => Ok(raw.trim().to_ascii_lowercase().parse()?),
        None => Ok(default),
    }
}

/// Accepts plain seconds (`300`) or a humantime duration (`5m`, `1m 30s`).
fn parse_timeout(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    Ok(humantime::parse_duration(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [("DISCORD_TOKEN", "token"), ("APPLICATION_ID", "42")];

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.application_id, 42);
        assert_eq!(config.guild_id, None);
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.resolve_timeout, Duration::from_secs(300));
        assert!((1..=4).contains(&config.resolver_workers));
        assert!(config.enable_youtube);
        assert!(!config.enable_spotify);
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(load(&[("APPLICATION_ID", "42")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "  "), ("APPLICATION_ID", "42")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("RESOLVER_WORKERS", "3"),
            ("RESOLVE_TIMEOUT", "2m 30s"),
            ("MAX_QUEUE_SIZE", "50"),
            ("ENABLE_YOUTUBE", "FALSE"),
            ("DOWNLOAD_DIR", "/srv/musica"),
            ("GUILD_ID", "123"),
        ]);

        let config = load(&pairs).unwrap();
        assert_eq!(config.resolver_workers, 3);
        assert_eq!(config.resolve_timeout, Duration::from_secs(150));
        assert_eq!(config.max_queue_size, 50);
        assert!(!config.enable_youtube);
        assert_eq!(config.download_dir, PathBuf::from("/srv/musica"));
        assert_eq!(config.guild_id, Some(123));
    }

    #[test]
    fn timeout_accepts_plain_seconds() {
        assert_eq!(parse_timeout("45").unwrap(), Duration::from_secs(45));
        assert!(parse_timeout("pronto").is_err());
    }

    #[test]
    fn zero_workers_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RESOLVER_WORKERS", "0"));
        assert!(load(&pairs).is_err());
    }

    #[test]
    fn spotify_requires_credentials() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ENABLE_SPOTIFY", "true"));
        assert!(load(&pairs).is_err());

        pairs.extend([("SPOTIFY_CLIENT_ID", "id"), ("SPOTIFY_CLIENT_SECRET", "secreto")]);
        assert!(load(&pairs).unwrap().enable_spotify);
    }

    #[test]
    fn summary_hides_secrets() {
        let mut config = load(&REQUIRED).unwrap();
        config.spotify_client_secret = Some("supersecreto".to_string());

        let summary = config.summary();
        assert!(!summary.contains("token"));
        assert!(!summary.contains("supersecreto"));
        assert!(summary.contains("1000 items"));
    }
}
