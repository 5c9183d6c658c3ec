pub mod direct_url;
pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::UserId;
use songbird::input::{HttpRequest, Input, YoutubeDl};
use std::{sync::Arc, time::Duration};
use tracing::debug;

pub use direct_url::DirectUrlClient;
pub use youtube::YouTubeClient;

use crate::audio::track::{SourceProducer, Track, TrackInfo};

/// Trait común para todas las fuentes de música. Las fuentes devuelven
/// descriptores ya resueltos; la construcción de pistas es uniforme a
/// partir de ellos (ver [`build_track`]).
#[async_trait]
pub trait MusicSource {
    /// Busca en la fuente y devuelve hasta `limit` descriptores.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaDescriptor>>;

    /// Resuelve una URL concreta de la fuente.
    async fn get_track(&self, url: &str) -> Result<MediaDescriptor>;

    /// Resuelve todas las entradas de una playlist.
    async fn get_playlist(&self, url: &str) -> Result<Vec<MediaDescriptor>>;

    /// true si la URL pertenece a esta fuente.
    fn is_valid_url(&self, url: &str) -> bool;

    #[allow(dead_code)]
    fn source_name(&self) -> &'static str;
}

/// Metadata de un vídeo resuelto por el catálogo.
#[derive(Debug, Clone)]
pub struct VideoMeta {
    pub title: String,
    pub page_url: String,
    pub artist: Option<String>,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
    pub is_live: bool,
}

/// Descriptor común de medio resuelto: la entrada única de la fábrica de
/// pistas, venga el medio de donde venga. Variantes etiquetadas en lugar
/// de un constructor de Track por cada forma de origen.
#[derive(Debug, Clone)]
pub enum MediaDescriptor {
    /// Vídeo suelto del catálogo.
    Video(VideoMeta),
    /// Entrada de una playlist del catálogo.
    PlaylistEntry {
        video: VideoMeta,
        playlist_title: Option<String>,
    },
    /// URL directa a un archivo o stream de audio.
    DirectUrl {
        url: String,
        title: Option<String>,
    },
}

/// Fábrica única de pistas: descriptor etiquetado dentro, `Track` uniforme
/// fuera. La clausura productora captura lo justo para construir el input
/// de songbird en el momento de la resolución; aquí no se toca la red.
pub fn build_track(descriptor: MediaDescriptor, requested_by: UserId) -> Track {
    match descriptor {
        MediaDescriptor::Video(video) | MediaDescriptor::PlaylistEntry { video, .. } => {
            let mut info = TrackInfo::new(video.title, requested_by)
                .with_url(video.page_url.clone());
            if let Some(artist) = video.artist {
                info = info.with_artist(artist);
            }
            if let Some(thumbnail) = video.thumbnail {
                info = info.with_thumbnail(thumbnail);
            }
            if let Some(duration) = video.duration.filter(|_| !video.is_live) {
                info = info.with_duration(duration);
            }

            let page_url = video.page_url;
            let producer: SourceProducer = Arc::new(move || {
                let page_url = page_url.clone();
                Box::pin(async move {
                    debug!("🎛️ Creando input de catálogo para {}", page_url);
                    let client = http_client()?;
                    Ok(Input::from(YoutubeDl::new(client, page_url)))
                })
            });
            Track::new(info, producer)
        }

        MediaDescriptor::DirectUrl { url, title } => {
            let title = title.unwrap_or_else(|| url.clone());
            let info = TrackInfo::new(title, requested_by).with_url(url.clone());

            let producer: SourceProducer = Arc::new(move || {
                let url = url.clone();
                Box::pin(async move {
                    debug!("🎛️ Creando input directo para {}", url);
                    let client = http_client()?;
                    Ok(Input::from(HttpRequest::new(client, url)))
                })
            });
            Track::new(info, producer)
        }
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(Into::into)
}
