use async_trait::async_trait;
use std::{
    io,
    path::PathBuf,
    process::Stdio,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::{classify, QueryKind, SpotifyClient};
use crate::{
    audio::queue::MediaHandle,
    config::Config,
    resolver::{FetchError, FetchedMedia, Fetcher},
};

/// Downloads audio as mp3 files through `yt-dlp` + `ffmpeg`.
///
/// Every download gets its own file name, so the same video requested twice
/// (by one guild or several) never shares a file.
pub struct YtDlpFetcher {
    ytdlp: PathBuf,
    ffmpeg: Option<PathBuf>,
    download_dir: PathBuf,
    enable_youtube: bool,
    enable_spotify: bool,
    spotify: Option<SpotifyClient>,
    downloads: AtomicU64,
}

impl YtDlpFetcher {
    #[cfg(test)]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp: PathBuf::from("yt-dlp"),
            ffmpeg: None,
            download_dir: download_dir.into(),
            enable_youtube: true,
            enable_spotify: false,
            spotify: None,
            downloads: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let spotify = match (&config.spotify_client_id, &config.spotify_client_secret) {
            (Some(id), Some(secret)) if config.enable_spotify => {
                Some(SpotifyClient::new(id.clone(), secret.clone()))
            }
            _ => None,
        };

        Self {
            ytdlp: config.ytdlp_path.clone(),
            ffmpeg: config.ffmpeg_path.clone(),
            download_dir: config.download_dir.clone(),
            enable_youtube: config.enable_youtube,
            enable_spotify: config.enable_spotify,
            spotify,
            downloads: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    pub fn with_sources(mut self, youtube: bool, spotify: bool) -> Self {
        self.enable_youtube = youtube;
        self.enable_spotify = spotify;
        self
    }

    #[cfg(test)]
    pub fn with_binary(mut self, ytdlp: impl Into<PathBuf>) -> Self {
        self.ytdlp = ytdlp.into();
        self
    }

    /// Verifica que yt-dlp y ffmpeg estén disponibles
    pub async fn verify_dependencies(&self) -> anyhow::Result<()> {
        match Command::new(&self.ytdlp).arg("--version").output().await {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("✅ yt-dlp versión: {}", version.trim());
            }
            _ => {
                error!("❌ yt-dlp no encontrado. Instala con: pip install yt-dlp");
                anyhow::bail!("yt-dlp no disponible en {}", self.ytdlp.display());
            }
        }

        let ffmpeg = self
            .ffmpeg
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        match Command::new(&ffmpeg).arg("-version").output().await {
            Ok(output) if output.status.success() => info!("✅ ffmpeg disponible"),
            _ => {
                error!("❌ ffmpeg no encontrado. Instala con: sudo apt install ffmpeg");
                anyhow::bail!("ffmpeg no disponible en {}", ffmpeg.display());
            }
        }

        Ok(())
    }

    /// Creates the download directory and removes mp3 files left over from
    /// a previous run.
    pub async fn purge_downloads(&self) -> std::io::Result<usize> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.download_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "mp3") {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("No se pudo borrar {}: {}", path.display(), e),
                }
            }
        }

        if removed > 0 {
            info!("🧹 {} descargas antiguas eliminadas", removed);
        }
        Ok(removed)
    }

    /// Maps a query to the argument given to yt-dlp.
    async fn target(&self, query: &str) -> Result<String, FetchError> {
        match classify(query) {
            QueryKind::SpotifyTrack(id) => {
                if !self.enable_spotify {
                    return Err(FetchError::Disallowed("Spotify".to_string()));
                }
                let Some(spotify) = &self.spotify else {
                    return Err(FetchError::Disallowed(
                        "Spotify (faltan credenciales)".to_string(),
                    ));
                };
                let track = spotify.track(&id).await?;
                Ok(format!("ytsearch1:{}", track.search_query()))
            }
            _ if !self.enable_youtube => Err(FetchError::Disallowed("YouTube".to_string())),
            QueryKind::YouTube(url) | QueryKind::OtherUrl(url) => Ok(url.to_string()),
            QueryKind::Search(text) if text.is_empty() => {
                Err(FetchError::Unresolvable(text))
            }
            QueryKind::Search(text) => Ok(format!("ytsearch1:{}", text)),
        }
    }

    /// `-o` template for the next download.
    fn output_template(&self) -> PathBuf {
        let n = self.downloads.fetch_add(1, Ordering::Relaxed);
        self.download_dir.join(format!("%(id)s-{}.%(ext)s", n))
    }

    async fn download(&self, target: &str) -> Result<FetchedMedia, FetchError> {
        debug!("⬇️ Descargando con yt-dlp: {}", target);

        let mut cmd = Command::new(&self.ytdlp);
        cmd.args([
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "192K",
            "--no-playlist",
            "--restrict-filenames",
            "--force-ipv4",
            "--no-warnings",
            "--no-simulate",
            "--print",
            "after_move:title",
            "--print",
            "after_move:filepath",
        ]);
        if let Some(ffmpeg) = &self.ffmpeg {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }
        cmd.arg("-o")
            .arg(self.output_template())
            .arg(target)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("yt-dlp terminó con error")
                .to_string();
            return Err(FetchError::Process(reason));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some((title, path)) = parse_printed(&stdout) else {
            return Err(FetchError::Unresolvable(target.to_string()));
        };

        if tokio::fs::metadata(&path).await.is_err() {
            return Err(FetchError::Process(format!(
                "yt-dlp no generó {}",
                path.display()
            )));
        }

        Ok(FetchedMedia {
            title,
            media: MediaHandle::new(path),
        })
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    async fn resolve(&self, query: &str) -> Result<FetchedMedia, FetchError> {
        let target = self.target(query).await?;
        self.download(&target).await
    }

    fn discard(&self, media: &MediaHandle) {
        let path = media.path().to_path_buf();
        if !path.starts_with(&self.download_dir) {
            debug!("{} no es una descarga propia, se conserva", path.display());
            return;
        }

        tokio::spawn(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("🗑️ Descarga eliminada: {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("No se pudo borrar {}: {}", path.display(), e),
            }
        });
    }
}

/// Reads the `title` and `filepath` lines printed after the mp3 conversion.
fn parse_printed(stdout: &str) -> Option<(String, PathBuf)> {
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
    let path = lines.next_back()?;
    let title = lines.next_back()?;
    Some((title.to_string(), PathBuf::from(path)))
}
