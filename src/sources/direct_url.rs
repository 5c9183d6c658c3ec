use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use super::{MediaDescriptor, MusicSource};

const AUDIO_EXTENSIONS: [&str; 6] = [".mp3", ".wav", ".ogg", ".flac", ".m4a", ".opus"];

/// Fuente para URLs directas a archivos o streams de audio.
pub struct DirectUrlClient {}

impl DirectUrlClient {
    pub fn new() -> Self {
        Self {}
    }

    /// Deriva un título legible del último segmento del path.
    fn title_from_url(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
        let name = segment.rsplit_once('.').map(|(base, _)| base).unwrap_or(segment);
        if name.is_empty() {
            None
        } else {
            Some(name.replace(['_', '-'], " "))
        }
    }
}

#[async_trait]
impl MusicSource for DirectUrlClient {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<MediaDescriptor>> {
        anyhow::bail!("Las URLs directas no soportan búsqueda")
    }

    async fn get_track(&self, url: &str) -> Result<MediaDescriptor> {
        if !self.is_valid_url(url) {
            anyhow::bail!("La URL no parece apuntar a un audio: {}", url);
        }

        Ok(MediaDescriptor::DirectUrl {
            url: url.to_string(),
            title: Self::title_from_url(url),
        })
    }

    async fn get_playlist(&self, _url: &str) -> Result<Vec<MediaDescriptor>> {
        anyhow::bail!("Las URLs directas no soportan playlists")
    }

    fn is_valid_url(&self, url: &str) -> bool {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return false;
        }

        let url_lower = url.to_lowercase();
        AUDIO_EXTENSIONS.iter().any(|ext| url_lower.ends_with(ext))
    }

    fn source_name(&self) -> &'static str {
        "direct"
    }
}
