use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serenity::model::id::UserId;
use songbird::input::Input;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::debug;

use super::error::PlaybackError;

/// Función productora del recurso de audio de una pista.
///
/// Se invoca como mucho una vez por ciclo de resolución; `reset()` rearma
/// la pista para un ciclo nuevo (repetición en loop).
pub type SourceProducer =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Input>> + Send + Sync>;

/// Metadata de una pista, separada del recurso de audio.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub title: String,
    pub url: Option<String>,
    pub artist: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<Duration>,
    pub requested_by: UserId,
    #[allow(dead_code)]
    pub added_at: DateTime<Utc>,
}

impl TrackInfo {
    pub fn new(title: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            title: title.into(),
            url: None,
            artist: None,
            thumbnail: None,
            duration: None,
            requested_by,
            added_at: Utc::now(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Estado del recurso de audio de la pista.
enum ResourceState {
    /// Sin intento de resolución.
    Unresolved,
    /// Resolución en marcha en segundo plano, todavía sin esperar.
    Preparing(JoinHandle<anyhow::Result<Input>>),
    /// Input listo para entregarse al transporte.
    Resolved(Input),
    /// El input ya se entregó; no puede reutilizarse sin `reset()`.
    Ended,
}

/// Unidad reproducible con recurso de resolución perezosa.
///
/// Construir una pista no dispara red ni disco; solo `prepare()`/`resolve()`
/// invocan la función productora.
pub struct Track {
    info: TrackInfo,
    producer: SourceProducer,
    state: ResourceState,
}

impl Track {
    pub fn new(info: TrackInfo, producer: SourceProducer) -> Self {
        Self {
            info,
            producer,
            state: ResourceState::Unresolved,
        }
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    /// Arranca la resolución en segundo plano. Idempotente: si ya está en
    /// marcha, resuelta o terminada, no hace nada.
    pub fn prepare(&mut self) {
        if !matches!(self.state, ResourceState::Unresolved) {
            return;
        }

        debug!("🎛️ Preparando recurso de: {}", self.info.title);
        let producer = self.producer.clone();
        let task = tokio::spawn(async move { producer().await });
        self.state = ResourceState::Preparing(task);
    }

    /// Entrega el input reproducible, esperando la preparación en vuelo o
    /// arrancándola si nunca empezó. Entregar el input marca la pista como
    /// terminada: el recurso no es reutilizable sin `reset()`.
    pub async fn resolve(&mut self) -> Result<Input, PlaybackError> {
        self.prepare();

        if let ResourceState::Preparing(task) = &mut self.state {
            let outcome = match task.await {
                Ok(Ok(input)) => Ok(input),
                Ok(Err(e)) => Err(PlaybackError::resource(e)),
                Err(e) => Err(PlaybackError::resource(e)),
            };
            self.state = match outcome {
                Ok(input) => ResourceState::Resolved(input),
                Err(e) => {
                    // ciclo fallido: la pista queda rearmada por si se reintenta
                    self.state = ResourceState::Unresolved;
                    return Err(e);
                }
            };
        }

        match std::mem::replace(&mut self.state, ResourceState::Ended) {
            ResourceState::Resolved(input) => Ok(input),
            _ => Err(PlaybackError::AlreadyEnded),
        }
    }

    /// true desde que la preparación arrancó (en vuelo o completada).
    #[allow(dead_code)]
    pub fn is_prepared(&self) -> bool {
        matches!(
            self.state,
            ResourceState::Preparing(_) | ResourceState::Resolved(_)
        )
    }

    /// true solo cuando el input está listo para reproducirse.
    #[allow(dead_code)]
    pub fn is_resolved(&self) -> bool {
        match &self.state {
            ResourceState::Resolved(_) => true,
            ResourceState::Preparing(task) => task.is_finished(),
            _ => false,
        }
    }

    /// Descarta el recurso actual y vuelve a `Unresolved`, permitiendo
    /// reproducir la misma pista otra vez. Una preparación en vuelo sigue
    /// corriendo desatendida; su resultado se descarta.
    pub fn reset(&mut self) {
        self.state = ResourceState::Unresolved;
    }
}
