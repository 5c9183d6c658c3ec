use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{sync::OnceLock, time::Duration};
use tracing::{debug, info};

use super::{MediaDescriptor, MusicSource, VideoMeta};

/// Cliente de YouTube respaldado por yt-dlp: solo metadata. El streaming
/// lo hace el input `YoutubeDl` de songbird cuando la pista se resuelve.
pub struct YouTubeClient {
    // Limitar procesos yt-dlp concurrentes para evitar rate limiting
    rate_limiter: tokio::sync::Semaphore,
}

/// Información extraída de yt-dlp (--dump-json)
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: String,
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    is_live: Option<bool>,
    playlist: Option<String>,
}

impl YtDlpEntry {
    fn into_video_meta(self) -> VideoMeta {
        let page_url = self
            .webpage_url
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", self.id));
        let is_live = self.is_live.unwrap_or(false);

        VideoMeta {
            title: self.title,
            page_url,
            artist: self.uploader.or(self.channel),
            duration: self
                .duration
                .filter(|_| !is_live)
                .map(Duration::from_secs_f64),
            thumbnail: self.thumbnail,
            is_live,
        }
    }
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            rate_limiter: tokio::sync::Semaphore::new(3),
        }
    }

    /// Detecta URLs de YouTube (youtube.com, youtu.be, music.youtube.com).
    pub fn is_youtube_url(url: &str) -> bool {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"^https?://(www\.|m\.|music\.)?(youtube\.com|youtu\.be)/").unwrap()
        });
        re.is_match(url)
    }

    /// true si la URL apunta a una playlist.
    #[allow(dead_code)]
    pub fn is_playlist_url(url: &str) -> bool {
        Self::is_youtube_url(url) && (url.contains("list=") || url.contains("/playlist"))
    }

    async fn run_ytdlp(&self, args: &[&str]) -> Result<String> {
        let _permit = self.rate_limiter.acquire().await?;

        let output = Command::new("yt-dlp")
            .args(args)
            .output()
            .await
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn parse_entries(stdout: &str) -> Vec<YtDlpEntry> {
        stdout
            .lines()
            .filter_map(|line| serde_json::from_str::<YtDlpEntry>(line).ok())
            .collect()
    }
}

#[async_trait]
impl MusicSource for YouTubeClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaDescriptor>> {
        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch{}:{}", limit, query);
        let stdout = self
            .run_ytdlp(&[
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                &search_query,
            ])
            .await?;

        let results: Vec<MediaDescriptor> = Self::parse_entries(&stdout)
            .into_iter()
            .map(|entry| MediaDescriptor::Video(entry.into_video_meta()))
            .collect();

        debug!("🔍 {} resultados para: {}", results.len(), query);
        Ok(results)
    }

    async fn get_track(&self, url: &str) -> Result<MediaDescriptor> {
        debug!("📊 Obteniendo info de: {}", url);

        let stdout = self
            .run_ytdlp(&["--no-playlist", "--dump-json", "--no-warnings", url])
            .await?;

        let entry: YtDlpEntry = serde_json::from_str(stdout.trim())
            .context("Error al parsear respuesta de yt-dlp")?;

        Ok(MediaDescriptor::Video(entry.into_video_meta()))
    }

    async fn get_playlist(&self, url: &str) -> Result<Vec<MediaDescriptor>> {
        info!("📃 Cargando playlist: {}", url);

        let stdout = self
            .run_ytdlp(&[
                "--yes-playlist",
                "--flat-playlist",
                "--dump-json",
                "--no-warnings",
                url,
            ])
            .await?;

        let entries = Self::parse_entries(&stdout);
        if entries.is_empty() {
            anyhow::bail!("La playlist no tiene entradas reproducibles");
        }

        Ok(entries
            .into_iter()
            .map(|mut entry| {
                let playlist_title = entry.playlist.take();
                MediaDescriptor::PlaylistEntry {
                    video: entry.into_video_meta(),
                    playlist_title,
                }
            })
            .collect())
    }

    fn is_valid_url(&self, url: &str) -> bool {
        Self::is_youtube_url(url)
    }

    fn source_name(&self) -> &'static str {
        "YouTube"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YouTubeClient::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YouTubeClient::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YouTubeClient::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(!YouTubeClient::is_youtube_url("https://example.com/video"));
    }

    #[test]
    fn test_playlist_url_detection() {
        assert!(YouTubeClient::is_playlist_url(
            "https://www.youtube.com/playlist?list=PL123"
        ));
        assert!(YouTubeClient::is_playlist_url(
            "https://www.youtube.com/watch?v=abc&list=PL123"
        ));
        assert!(!YouTubeClient::is_playlist_url(
            "https://www.youtube.com/watch?v=abc"
        ));
    }

    #[test]
    fn test_parse_dump_json_line() {
        let line = r#"{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","duration":213.0,"uploader":"Rick Astley","channel":"Rick Astley","thumbnail":"https://i.ytimg.com/vi/dQw4w9WgXcQ/hq720.jpg","webpage_url":"https://www.youtube.com/watch?v=dQw4w9WgXcQ","is_live":false}"#;

        let entries = YouTubeClient::parse_entries(line);
        assert_eq!(entries.len(), 1);

        let meta = entries.into_iter().next().unwrap().into_video_meta();
        assert_eq!(meta.title, "Never Gonna Give You Up");
        assert_eq!(meta.artist.as_deref(), Some("Rick Astley"));
        assert_eq!(meta.duration, Some(Duration::from_secs(213)));
        assert!(!meta.is_live);
    }

    #[test]
    fn test_flat_entry_without_webpage_url_builds_watch_link() {
        let line = r#"{"id":"abc123","title":"t","playlist":"Mi lista"}"#;

        let mut entry = YouTubeClient::parse_entries(line).into_iter().next().unwrap();
        assert_eq!(entry.playlist.take().as_deref(), Some("Mi lista"));

        let meta = entry.into_video_meta();
        assert_eq!(meta.page_url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(meta.duration, None);
    }

    #[test]
    fn test_live_entry_has_no_duration() {
        let line = r#"{"id":"x","title":"directo","duration":0.0,"is_live":true}"#;

        let meta = YouTubeClient::parse_entries(line)
            .into_iter()
            .next()
            .unwrap()
            .into_video_meta();
        assert!(meta.is_live);
        assert_eq!(meta.duration, None);
    }
}
