use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{input::Input, Call, Event, Songbird, TrackEvent};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::events::TrackEndRelay;

/// Aviso de fin de pista. El transporte lo dispara cuando la pista que
/// acompañaba a este aviso deja de sonar (fin natural o stop manual).
pub type EndNotifier = Arc<dyn Fn() + Send + Sync>;

/// Eventos de ciclo de vida de la conexión de voz, traducidos desde el
/// transporte concreto hacia el player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// El driver (re)estableció la conexión.
    Ready,
    /// El driver perdió la conexión; puede reintentar.
    Disconnected,
    /// La sesión terminó de forma definitiva (expulsión, leave).
    Destroyed,
}

/// Superficie de comandos sobre la pista en reproducción. Calca los
/// comandos no bloqueantes de `songbird::tracks::TrackHandle`.
#[cfg_attr(test, mockall::automock)]
pub trait PlaybackHandle: Send + Sync {
    fn pause(&self) -> Result<()>;
    fn resume(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn set_volume(&self, volume: f32) -> Result<()>;
}

/// Conexión de voz vista desde el player: arrancar reproducción, parar
/// todo y reintentar la conexión. Una conexión pertenece como mucho a un
/// player a la vez.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// true si hay una conexión establecida capaz de reproducir.
    async fn is_ready(&self) -> bool;

    /// Reproduce `input` y devuelve el mando de la pista; `on_end` debe
    /// dispararse exactamente cuando esa pista deje de sonar.
    async fn play(&self, input: Input, on_end: EndNotifier) -> Result<Box<dyn PlaybackHandle>>;

    /// Detiene cualquier reproducción en curso.
    async fn stop(&self) -> Result<()>;

    /// Reintenta establecer la conexión de voz.
    async fn reconnect(&self) -> Result<()>;
}

/// Implementación sobre songbird: un `Call` compartido más el manager para
/// poder re-unirse al canal en una reconexión.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
    call: Arc<Mutex<Call>>,
}

impl SongbirdTransport {
    pub fn new(
        manager: Arc<Songbird>,
        guild_id: GuildId,
        channel_id: ChannelId,
        call: Arc<Mutex<Call>>,
    ) -> Self {
        Self {
            manager,
            guild_id,
            channel_id,
            call,
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn is_ready(&self) -> bool {
        self.call.lock().await.current_channel().is_some()
    }

    async fn play(&self, input: Input, on_end: EndNotifier) -> Result<Box<dyn PlaybackHandle>> {
        let mut call = self.call.lock().await;
        let handle = call.play_input(input);

        handle
            .add_event(Event::Track(TrackEvent::End), TrackEndRelay::new(on_end))
            .map_err(|e| anyhow::anyhow!("no se pudo registrar el evento de fin: {e}"))?;

        Ok(Box::new(SongbirdHandle { inner: handle }))
    }

    async fn stop(&self) -> Result<()> {
        self.call.lock().await.stop();
        Ok(())
    }

    async fn reconnect(&self) -> Result<()> {
        debug!(
            "🔄 Reintentando unión al canal {} en guild {}",
            self.channel_id, self.guild_id
        );
        self.manager
            .join(self.guild_id, self.channel_id)
            .await
            .map_err(|e| anyhow::anyhow!("re-join falló: {e}"))?;
        info!("🔊 Conexión de voz restablecida en guild {}", self.guild_id);
        Ok(())
    }
}

struct SongbirdHandle {
    inner: songbird::tracks::TrackHandle,
}

impl PlaybackHandle for SongbirdHandle {
    fn pause(&self) -> Result<()> {
        self.inner
            .pause()
            .map_err(|e| anyhow::anyhow!("pause rechazado: {e}"))
    }

    fn resume(&self) -> Result<()> {
        self.inner
            .play()
            .map_err(|e| anyhow::anyhow!("resume rechazado: {e}"))
    }

    fn stop(&self) -> Result<()> {
        self.inner
            .stop()
            .map_err(|e| anyhow::anyhow!("stop rechazado: {e}"))
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        self.inner
            .set_volume(volume)
            .map_err(|e| anyhow::anyhow!("set_volume rechazado: {e}"))
    }
}

/// Espera exponencial acotada entre reintentos de reconexión. El exponente
/// se satura para que el último tramo no se dispare.
pub struct Backoff {
    attempt: u32,
    max_attempts: u32,
    base: Duration,
}

impl Backoff {
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            base,
        }
    }

    /// Devuelve la espera del siguiente intento y lo consume.
    pub fn next(&mut self) -> Duration {
        self.attempt += 1;
        self.base * 2u32.pow((self.attempt - 1).min(3))
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let mut backoff = Backoff::new(6, Duration::from_millis(100));

        assert_eq!(backoff.next(), Duration::from_millis(100));
        assert_eq!(backoff.next(), Duration::from_millis(200));
        assert_eq!(backoff.next(), Duration::from_millis(400));
        assert_eq!(backoff.next(), Duration::from_millis(800));
        // el exponente satura
        assert_eq!(backoff.next(), Duration::from_millis(800));
        assert!(!backoff.is_exhausted());
        backoff.next();
        assert!(backoff.is_exhausted());
    }

    #[test]
    fn test_backoff_exhausts_after_ceiling() {
        let mut backoff = Backoff::new(2, Duration::from_millis(50));
        assert!(!backoff.is_exhausted());
        backoff.next();
        assert!(!backoff.is_exhausted());
        backoff.next();
        assert!(backoff.is_exhausted());
    }
}
