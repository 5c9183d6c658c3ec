use parking_lot::RwLock;
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;

use super::{
    error::PlaybackError,
    events::PlayerEvent,
    queue::TrackQueue,
    track::{Track, TrackInfo},
    transport::{Backoff, ConnectionEvent, EndNotifier, PlaybackHandle, VoiceTransport},
};

/// Estado mutable del player. Todo acceso pasa por el mutex del `Player`,
/// que serializa las operaciones mutantes: dos comandos concurrentes sobre
/// la misma sesión nunca se entrelazan a mitad de transición.
struct PlayerInner {
    transport: Option<Arc<dyn VoiceTransport>>,
    now_playing: Option<Track>,
    handle: Option<Box<dyn PlaybackHandle>>,
    queue: TrackQueue,
    looping: bool,
    paused: bool,
    volume: f32,
    /// Contador de reproducciones: los avisos de fin que llegan con una
    /// secuencia vieja se descartan (evita el doble avance tras un skip).
    play_seq: u64,
}

/// Máquina de estados de reproducción de una sesión de voz.
///
/// Una instancia por guild; sobrevive entre pistas durante toda la vida de
/// la sesión. Idle (sin pista) → Playing → {Paused ⇄ Playing} → Idle.
pub struct Player {
    guild_id: GuildId,
    max_queue_size: usize,
    reconnect_attempts: u32,
    reconnect_base: Duration,
    inner: Mutex<PlayerInner>,
    /// Espejo de la pista actual para lecturas baratas desde la UI sin
    /// tocar el mutex asíncrono.
    now_playing_info: RwLock<Option<TrackInfo>>,
    events_tx: flume::Sender<PlayerEvent>,
    events_rx: flume::Receiver<PlayerEvent>,
}

impl Player {
    pub fn new(guild_id: GuildId, config: &Config) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            guild_id,
            max_queue_size: config.max_queue_size,
            reconnect_attempts: config.reconnect_attempts,
            reconnect_base: Duration::from_millis(config.reconnect_backoff_ms),
            inner: Mutex::new(PlayerInner {
                transport: None,
                now_playing: None,
                handle: None,
                queue: TrackQueue::new(),
                looping: false,
                paused: false,
                volume: config.default_volume,
                play_seq: 0,
            }),
            now_playing_info: RwLock::new(None),
            events_tx,
            events_rx,
        }
    }

    /// Receptor de notificaciones del player (flume es mpmc: cada
    /// suscriptor compite por los mensajes de su receiver clonado).
    pub fn subscribe(&self) -> flume::Receiver<PlayerEvent> {
        self.events_rx.clone()
    }

    // ---- comandos -------------------------------------------------------

    /// Encola una pista. Si el player está en reposo la reproduce ya y
    /// devuelve posición 0; si no, la añade a la cola y devuelve su
    /// posición 1-based. La primera pista encolada empieza a prepararse en
    /// segundo plano de inmediato.
    pub async fn enqueue(self: &Arc<Self>, track: Track) -> Result<usize, PlaybackError> {
        let mut inner = self.inner.lock().await;

        if inner.now_playing.is_none() {
            self.play_track(&mut inner, track).await?;
            return Ok(0);
        }

        if inner.queue.len() >= self.max_queue_size {
            return Err(PlaybackError::QueueFull {
                max: self.max_queue_size,
            });
        }

        let position = inner.queue.push(track);
        if position == 1 {
            // única pista pendiente: es la nueva cabeza, arranca su preparación
            if let Some(head) = inner.queue.front_mut() {
                head.prepare();
            }
        }
        Ok(position)
    }

    /// Pausa la pista actual. `false` si no hay pista o ya estaba pausada.
    pub async fn pause(&self) -> Result<bool, PlaybackError> {
        let mut inner = self.inner.lock().await;
        if inner.now_playing.is_none() || inner.paused {
            return Ok(false);
        }
        let Some(handle) = inner.handle.as_ref() else {
            return Ok(false);
        };
        handle.pause().map_err(|e| {
            warn!("⚠️ El transporte rechazó pause: {e:#}");
            PlaybackError::TransportCommandFailed
        })?;
        inner.paused = true;
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        Ok(true)
    }

    /// Reanuda la pista actual. `false` si no hay pista o no estaba pausada.
    pub async fn unpause(&self) -> Result<bool, PlaybackError> {
        let mut inner = self.inner.lock().await;
        if inner.now_playing.is_none() || !inner.paused {
            return Ok(false);
        }
        let Some(handle) = inner.handle.as_ref() else {
            return Ok(false);
        };
        handle.resume().map_err(|e| {
            warn!("⚠️ El transporte rechazó resume: {e:#}");
            PlaybackError::TransportCommandFailed
        })?;
        inner.paused = false;
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        Ok(true)
    }

    /// Salta la pista actual: apaga el loop y avanza como si la pista
    /// hubiera terminado, esté pausada o no. La pista saltada nunca se
    /// vuelve a reproducir.
    pub async fn skip(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        inner.looping = false;
        if let Some(handle) = inner.handle.take() {
            let _ = handle.stop();
        }
        if inner.now_playing.take().is_some() {
            self.advance_locked(&mut inner).await;
        }
    }

    /// Parada total: limpia cola, pista actual y loop, y detiene el
    /// transporte. Se usa tanto para el comando stop como para fallos de
    /// transporte irrecuperables.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await;
    }

    async fn stop_locked(&self, inner: &mut PlayerInner) {
        inner.queue.clear();
        inner.now_playing = None;
        inner.looping = false;
        inner.paused = false;
        if let Some(handle) = inner.handle.take() {
            let _ = handle.stop();
        }
        if let Some(transport) = inner.transport.clone() {
            let _ = transport.stop().await;
        }
        *self.now_playing_info.write() = None;
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
    }

    // ---- conexión -------------------------------------------------------

    /// Adjunta una conexión de voz. Cualquier transporte anterior se
    /// detiene y se suelta primero: una conexión pertenece como mucho a un
    /// player. Adjuntar un transporte ya terminado equivale a desconectar
    /// y devuelve `TransportUnavailable`.
    pub async fn attach_connection(
        &self,
        transport: Arc<dyn VoiceTransport>,
    ) -> Result<(), PlaybackError> {
        if !transport.is_ready().await {
            warn!(
                "⚠️ Transporte terminal adjuntado en guild {}, tratándolo como desconexión",
                self.guild_id
            );
            self.detach_connection().await;
            return Err(PlaybackError::TransportUnavailable);
        }

        let mut inner = self.inner.lock().await;
        if let Some(old) = inner.transport.take() {
            if let Some(handle) = inner.handle.take() {
                let _ = handle.stop();
            }
            let _ = old.stop().await;
            debug!("🔌 Transporte anterior liberado en guild {}", self.guild_id);
        }
        inner.transport = Some(transport);
        info!("🔊 Conexión de voz adjuntada en guild {}", self.guild_id);
        Ok(())
    }

    /// Suelta la conexión actual, deteniendo la reproducción.
    pub async fn detach_connection(&self) {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await;
        inner.transport = None;
    }

    /// Punto de entrada de los eventos de ciclo de vida del transporte.
    pub async fn on_connection_event(self: &Arc<Self>, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Ready => {
                debug!("✅ Conexión de voz lista en guild {}", self.guild_id);
            }
            ConnectionEvent::Destroyed => {
                warn!("🔌 Sesión de voz destruida en guild {}", self.guild_id);
                self.detach_connection().await;
                let _ = self.events_tx.send(PlayerEvent::ConnectionLost);
            }
            ConnectionEvent::Disconnected => {
                self.reconnect_with_backoff().await;
            }
        }
    }

    /// Reintento acotado con backoff exponencial, durmiendo entre intentos
    /// en lugar de girar sobre el hilo. Si se agotan los intentos la sesión
    /// se da por perdida.
    async fn reconnect_with_backoff(self: &Arc<Self>) {
        let transport = { self.inner.lock().await.transport.clone() };
        let Some(transport) = transport else {
            return;
        };

        warn!("🔄 Conexión de voz perdida en guild {}", self.guild_id);
        let mut backoff = Backoff::new(self.reconnect_attempts, self.reconnect_base);
        loop {
            if backoff.is_exhausted() {
                error!(
                    "❌ Reconexión agotada tras {} intentos en guild {}",
                    self.reconnect_attempts, self.guild_id
                );
                self.detach_connection().await;
                let _ = self.events_tx.send(PlayerEvent::ConnectionLost);
                return;
            }

            let delay = backoff.next();
            debug!("⏳ Reintento de conexión en {:?}", delay);
            tokio::time::sleep(delay).await;

            match transport.reconnect().await {
                Ok(()) => {
                    info!("✅ Reconectado en guild {}", self.guild_id);
                    return;
                }
                Err(e) => warn!("⚠️ Reintento de conexión fallido: {e:#}"),
            }
        }
    }

    // ---- transiciones internas ------------------------------------------

    /// Aviso de fin de pista del transporte. Los avisos con secuencia vieja
    /// o que llegan sin pista en curso se ignoran: las transiciones las
    /// decide la contabilidad del player, no el evento crudo.
    pub async fn on_track_end(self: &Arc<Self>, seq: u64) {
        let mut inner = self.inner.lock().await;
        if seq != inner.play_seq || inner.now_playing.is_none() {
            debug!("🔁 Aviso de fin obsoleto (seq {seq}) en guild {}, ignorado", self.guild_id);
            return;
        }
        inner.handle = None;
        self.advance_locked(&mut inner).await;
    }

    /// Decide y reproduce la siguiente pista: la misma si el loop está
    /// activo, la cabeza de la cola si no, o reposo si no queda nada. Las
    /// pistas cuyo recurso falla se saltan sin dejar al player colgado.
    async fn advance_locked(self: &Arc<Self>, inner: &mut PlayerInner) {
        let mut candidate = if inner.looping {
            inner.now_playing.take().map(|mut track| {
                debug!("🔂 Repitiendo pista: {}", track.info().title);
                track.reset();
                track
            })
        } else {
            None
        };

        loop {
            let track = match candidate.take() {
                Some(track) => track,
                None => match inner.queue.shift() {
                    Ok(track) => track,
                    Err(_) => {
                        // cola agotada: a reposo
                        inner.now_playing = None;
                        inner.handle = None;
                        inner.paused = false;
                        *self.now_playing_info.write() = None;
                        info!("📭 Cola vacía en guild {}, player en reposo", self.guild_id);
                        let _ = self.events_tx.send(PlayerEvent::Advanced { next: None });
                        return;
                    }
                },
            };

            match self.play_track(inner, track).await {
                Ok(()) => {
                    let next = self.now_playing_info.read().clone();
                    let _ = self.events_tx.send(PlayerEvent::Advanced { next });
                    return;
                }
                Err(PlaybackError::ResourceUnavailable(_)) | Err(PlaybackError::AlreadyEnded) => {
                    // la pista se saltó; probar con la siguiente
                    continue;
                }
                Err(_) => {
                    // fallo de transporte: play_track ya dejó el estado limpio
                    return;
                }
            }
        }
    }

    /// Arranca la reproducción de una pista concreta: resuelve su recurso
    /// (esperando la preparación en vuelo), aplica el volumen vigente,
    /// lanza el transporte y deja preparándose la nueva cabeza de la cola
    /// (exactamente una pista de prebuffer, nunca más).
    async fn play_track(
        self: &Arc<Self>,
        inner: &mut PlayerInner,
        mut track: Track,
    ) -> Result<(), PlaybackError> {
        let transport = match inner.transport.clone() {
            Some(t) if t.is_ready().await => t,
            _ => {
                // sin conexión utilizable no hay nada que reproducir
                inner.queue.clear();
                inner.now_playing = None;
                inner.handle = None;
                inner.paused = false;
                *self.now_playing_info.write() = None;
                return Err(PlaybackError::TransportUnavailable);
            }
        };

        let input = match track.resolve().await {
            Ok(input) => input,
            Err(err) => {
                warn!(
                    "⚠️ Recurso no disponible para {}: {}",
                    track.info().title,
                    err
                );
                let _ = self.events_tx.send(PlayerEvent::TrackFailed {
                    track: track.info().clone(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        inner.play_seq += 1;
        let notify = self.end_notifier(inner.play_seq);

        let handle = match transport.play(input, notify).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("❌ El transporte rechazó la reproducción: {e:#}");
                self.stop_locked(inner).await;
                return Err(PlaybackError::TransportUnavailable);
            }
        };
        let _ = handle.set_volume(inner.volume);

        let info = track.info().clone();
        info!("🎵 Reproduciendo: {} en guild {}", info.title, self.guild_id);
        inner.handle = Some(handle);
        inner.paused = false;
        inner.now_playing = Some(track);
        *self.now_playing_info.write() = Some(info.clone());

        // prebuffer de exactamente una pista: la nueva cabeza de la cola
        if let Some(head) = inner.queue.front_mut() {
            head.prepare();
        }

        let _ = self.events_tx.send(PlayerEvent::TrackStarted(info));
        Ok(())
    }

    fn end_notifier(self: &Arc<Self>, seq: u64) -> EndNotifier {
        let player = Arc::downgrade(self);
        Arc::new(move || {
            let Some(player) = player.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                player.on_track_end(seq).await;
            });
        })
    }

    // ---- predicados y accesores -----------------------------------------

    pub async fn is_playing(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.now_playing.is_some() && !inner.paused
    }

    #[allow(dead_code)]
    pub async fn is_paused(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.now_playing.is_some() && inner.paused
    }

    pub async fn is_ready(&self) -> bool {
        let transport = { self.inner.lock().await.transport.clone() };
        match transport {
            Some(t) => t.is_ready().await,
            None => false,
        }
    }

    /// Pista actual, desde el espejo síncrono.
    pub fn now_playing(&self) -> Option<TrackInfo> {
        self.now_playing_info.read().clone()
    }

    #[allow(dead_code)]
    pub async fn is_looping(&self) -> bool {
        self.inner.lock().await.looping
    }

    pub async fn set_looping(&self, enabled: bool) {
        self.inner.lock().await.looping = enabled;
    }

    pub async fn toggle_looping(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.looping = !inner.looping;
        inner.looping
    }

    #[allow(dead_code)]
    pub async fn volume(&self) -> f32 {
        self.inner.lock().await.volume
    }

    /// Fija el volumen (saturado a 0.0–2.0). Se propaga al instante a la
    /// pista en curso si la hay; si no, se aplica en la próxima resolución.
    pub async fn set_volume(&self, volume: f32) -> f32 {
        let clamped = volume.clamp(0.0, 2.0);
        let mut inner = self.inner.lock().await;
        inner.volume = clamped;
        if let Some(handle) = inner.handle.as_ref() {
            let _ = handle.set_volume(clamped);
        }
        clamped
    }

    // ---- operaciones de cola (capa de comandos) --------------------------

    #[allow(dead_code)]
    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn queue_duration(&self) -> Duration {
        self.inner.lock().await.queue.duration()
    }

    pub async fn queue_snapshot(&self) -> Vec<TrackInfo> {
        let inner = self.inner.lock().await;
        inner.queue.iter().map(|t| t.info().clone()).collect()
    }

    /// Quita la pista en `index` y devuelve su metadata. Si la cabeza
    /// cambió, la nueva cabeza empieza a prepararse.
    pub async fn queue_remove(&self, index: usize) -> Result<TrackInfo, PlaybackError> {
        let mut inner = self.inner.lock().await;
        let removed = inner.queue.remove(index)?;
        let info = removed.info().clone();
        // soltar la pista cancela por abandono cualquier preparación suya
        drop(removed);
        if index == 0 {
            if let Some(head) = inner.queue.front_mut() {
                head.prepare();
            }
        }
        Ok(info)
    }

    pub async fn queue_move(&self, src: usize, dst: usize) -> Result<(), PlaybackError> {
        let mut inner = self.inner.lock().await;
        inner.queue.move_track(src, dst)?;
        if src == 0 || dst == 0 {
            if let Some(head) = inner.queue.front_mut() {
                head.prepare();
            }
        }
        Ok(())
    }

    pub async fn queue_shuffle(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.queue.shuffle();
        if let Some(head) = inner.queue.front_mut() {
            head.prepare();
        }
        inner.queue.len()
    }

    pub async fn queue_clear(&self) -> usize {
        self.inner.lock().await.queue.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::SourceProducer;
    use crate::audio::transport::MockPlaybackHandle;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use songbird::input::{File, Input};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Transporte falso: registra reproducciones y captura los avisos de
    /// fin para que los tests los disparen a voluntad.
    struct FakeTransport {
        ready: AtomicBool,
        plays: AtomicUsize,
        fail_play: AtomicBool,
        reconnect_ok: AtomicBool,
        reconnects: AtomicUsize,
        end_notifiers: parking_lot::Mutex<Vec<EndNotifier>>,
    }

    impl FakeTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                ready: AtomicBool::new(true),
                plays: AtomicUsize::new(0),
                fail_play: AtomicBool::new(false),
                reconnect_ok: AtomicBool::new(true),
                reconnects: AtomicUsize::new(0),
                end_notifiers: parking_lot::Mutex::new(Vec::new()),
            })
        }

        fn fire_end(&self, index: usize) {
            let notify = self.end_notifiers.lock()[index].clone();
            notify();
        }
    }

    #[async_trait]
    impl VoiceTransport for FakeTransport {
        async fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn play(
            &self,
            _input: Input,
            on_end: EndNotifier,
        ) -> anyhow::Result<Box<dyn PlaybackHandle>> {
            if self.fail_play.load(Ordering::SeqCst) {
                anyhow::bail!("driver caído");
            }
            self.plays.fetch_add(1, Ordering::SeqCst);
            self.end_notifiers.lock().push(on_end);

            let mut handle = MockPlaybackHandle::new();
            handle.expect_pause().returning(|| Ok(()));
            handle.expect_resume().returning(|| Ok(()));
            handle.expect_stop().returning(|| Ok(()));
            handle.expect_set_volume().returning(|_| Ok(()));
            Ok(Box::new(handle))
        }

        async fn stop(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn reconnect(&self) -> anyhow::Result<()> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            if self.reconnect_ok.load(Ordering::SeqCst) {
                Ok(())
            } else {
                anyhow::bail!("sin gateway")
            }
        }
    }

    fn test_config() -> Config {
        Config {
            reconnect_attempts: 3,
            reconnect_backoff_ms: 10,
            ..Config::default()
        }
    }

    async fn player_with_transport() -> (Arc<Player>, Arc<FakeTransport>) {
        let player = Arc::new(Player::new(GuildId::new(1), &test_config()));
        let transport = FakeTransport::new();
        player
            .attach_connection(transport.clone())
            .await
            .expect("attach");
        (player, transport)
    }

    fn producer() -> SourceProducer {
        Arc::new(|| Box::pin(async { Ok(Input::from(File::new("/dev/null"))) }))
    }

    fn counting_producer(counter: Arc<AtomicUsize>) -> SourceProducer {
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Input::from(File::new("/dev/null")))
            })
        })
    }

    fn track(title: &str) -> Track {
        Track::new(TrackInfo::new(title, UserId::new(7)), producer())
    }

    fn failing_track(title: &str) -> Track {
        Track::new(
            TrackInfo::new(title, UserId::new(7)),
            Arc::new(|| Box::pin(async { anyhow::bail!("recurso roto") })),
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn test_enqueue_into_idle_plays_immediately() {
        let (player, transport) = player_with_transport().await;

        let position = player.enqueue(track("a")).await.unwrap();

        assert_eq!(position, 0);
        assert_eq!(player.now_playing().unwrap().title, "a");
        assert!(player.is_playing().await);
        assert_eq!(transport.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enqueue_into_playing_queues_and_prepares_sole_entry() {
        let (player, transport) = player_with_transport().await;
        player.enqueue(track("a")).await.unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let queued = Track::new(
            TrackInfo::new("b", UserId::new(7)),
            counting_producer(counter.clone()),
        );
        let position = player.enqueue(queued).await.unwrap();

        assert_eq!(position, 1);
        assert_eq!(player.now_playing().unwrap().title, "a");
        assert_eq!(player.queue_len().await, 1);
        assert_eq!(transport.plays.load(Ordering::SeqCst), 1);

        // la cabeza recién encolada arrancó su preparación en segundo plano
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_track_end_advances_to_queue_head() {
        let (player, transport) = player_with_transport().await;
        player.enqueue(track("a")).await.unwrap();
        player.enqueue(track("b")).await.unwrap();

        transport.fire_end(0);
        settle().await;

        assert_eq!(player.now_playing().unwrap().title, "b");
        assert_eq!(player.queue_len().await, 0);
        assert_eq!(transport.plays.load(Ordering::SeqCst), 2);

        // sin más pistas, el siguiente fin deja el player en reposo
        transport.fire_end(1);
        settle().await;
        assert!(player.now_playing().is_none());
        assert!(!player.is_playing().await);
    }

    #[tokio::test]
    async fn test_loop_replays_the_same_track() {
        let (player, transport) = player_with_transport().await;
        let counter = Arc::new(AtomicUsize::new(0));
        let looped = Track::new(
            TrackInfo::new("a", UserId::new(7)),
            counting_producer(counter.clone()),
        );
        player.enqueue(looped).await.unwrap();
        player.set_looping(true).await;

        transport.fire_end(0);
        settle().await;

        assert_eq!(player.now_playing().unwrap().title, "a");
        // el productor corrió otra vez: reset() rearmó el ciclo
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(player.is_looping().await);
    }

    #[tokio::test]
    async fn test_skip_clears_loop_and_never_replays() {
        let (player, transport) = player_with_transport().await;
        player.enqueue(track("a")).await.unwrap();
        player.enqueue(track("b")).await.unwrap();
        player.set_looping(true).await;

        player.skip().await;

        assert!(!player.is_looping().await);
        assert_eq!(player.now_playing().unwrap().title, "b");
        assert_eq!(transport.plays.load(Ordering::SeqCst), 2);

        // skip con cola vacía deja el player en reposo
        player.skip().await;
        assert!(player.now_playing().is_none());
    }

    #[tokio::test]
    async fn test_pause_and_unpause_noops() {
        let (player, _transport) = player_with_transport().await;

        // sin pista no hay nada que pausar
        assert!(!player.pause().await.unwrap());

        player.enqueue(track("a")).await.unwrap();

        assert!(player.pause().await.unwrap());
        assert!(player.is_paused().await);
        // pausar dos veces es un no-op
        assert!(!player.pause().await.unwrap());

        assert!(player.unpause().await.unwrap());
        assert!(player.is_playing().await);
        assert!(!player.unpause().await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_end_event_is_ignored() {
        let (player, transport) = player_with_transport().await;
        player.enqueue(track("a")).await.unwrap();
        player.enqueue(track("b")).await.unwrap();

        // skip avanza a "b"; el fin de "a" llega tarde
        player.skip().await;
        assert_eq!(player.now_playing().unwrap().title, "b");

        transport.fire_end(0);
        settle().await;

        // el aviso obsoleto no provocó un doble avance
        assert_eq!(player.now_playing().unwrap().title, "b");
        assert_eq!(transport.plays.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_enqueue_without_usable_transport_stops_and_fails() {
        let (player, transport) = player_with_transport().await;
        player.enqueue(track("a")).await.unwrap();
        player.enqueue(track("b")).await.unwrap();

        transport.ready.store(false, Ordering::SeqCst);
        transport.fire_end(0);
        settle().await;

        // el avance encontró el transporte caído: estado limpio
        assert!(player.now_playing().is_none());
        assert_eq!(player.queue_len().await, 0);

        let err = player.enqueue(track("c")).await.unwrap_err();
        assert!(matches!(err, PlaybackError::TransportUnavailable));
    }

    #[tokio::test]
    async fn test_resource_failure_skips_to_next_track() {
        let (player, transport) = player_with_transport().await;
        let events = player.subscribe();

        player.enqueue(track("a")).await.unwrap();
        player.enqueue(failing_track("mala")).await.unwrap();
        player.enqueue(track("c")).await.unwrap();

        transport.fire_end(0);
        settle().await;

        // la pista rota se saltó y "c" quedó sonando
        assert_eq!(player.now_playing().unwrap().title, "c");
        assert_eq!(transport.plays.load(Ordering::SeqCst), 2);

        let failed = events
            .drain()
            .filter(|e| matches!(e, PlayerEvent::TrackFailed { .. }))
            .count();
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn test_enqueue_failing_track_into_idle_surfaces_error() {
        let (player, _transport) = player_with_transport().await;

        let err = player.enqueue(failing_track("mala")).await.unwrap_err();
        assert!(matches!(err, PlaybackError::ResourceUnavailable(_)));
        assert!(player.now_playing().is_none());

        // el player no quedó colgado: la siguiente pista suena normal
        let position = player.enqueue(track("a")).await.unwrap();
        assert_eq!(position, 0);
        assert_eq!(player.now_playing().unwrap().title, "a");
    }

    #[tokio::test]
    async fn test_destroyed_connection_resets_everything() {
        let (player, _transport) = player_with_transport().await;
        player.enqueue(track("a")).await.unwrap();
        player.enqueue(track("b")).await.unwrap();
        player.set_looping(true).await;

        player
            .on_connection_event(ConnectionEvent::Destroyed)
            .await;

        assert!(player.now_playing().is_none());
        assert_eq!(player.queue_len().await, 0);
        assert!(!player.is_looping().await);
        assert!(!player.is_ready().await);
    }

    #[tokio::test]
    async fn test_disconnect_retries_with_bounded_backoff() {
        let (player, transport) = player_with_transport().await;
        player.enqueue(track("a")).await.unwrap();

        transport.reconnect_ok.store(false, Ordering::SeqCst);
        player
            .on_connection_event(ConnectionEvent::Disconnected)
            .await;

        // techo de intentos respetado y sesión dada por perdida
        assert_eq!(transport.reconnects.load(Ordering::SeqCst), 3);
        assert!(player.now_playing().is_none());
        assert!(!player.is_ready().await);
    }

    #[tokio::test]
    async fn test_disconnect_recovers_on_successful_retry() {
        let (player, transport) = player_with_transport().await;
        player.enqueue(track("a")).await.unwrap();

        player
            .on_connection_event(ConnectionEvent::Disconnected)
            .await;

        assert_eq!(transport.reconnects.load(Ordering::SeqCst), 1);
        // la sesión sigue viva
        assert_eq!(player.now_playing().unwrap().title, "a");
    }

    #[tokio::test]
    async fn test_queue_ops_rearm_head_preparation() {
        let (player, _transport) = player_with_transport().await;
        player.enqueue(track("a")).await.unwrap();

        let counter_b = Arc::new(AtomicUsize::new(0));
        let counter_c = Arc::new(AtomicUsize::new(0));
        player
            .enqueue(Track::new(
                TrackInfo::new("b", UserId::new(7)),
                counting_producer(counter_b.clone()),
            ))
            .await
            .unwrap();
        player
            .enqueue(Track::new(
                TrackInfo::new("c", UserId::new(7)),
                counting_producer(counter_c.clone()),
            ))
            .await
            .unwrap();

        // quitar la cabeza promociona a "c", que debe empezar a prepararse
        let removed = player.queue_remove(0).await.unwrap();
        assert_eq!(removed.title, "b");
        settle().await;
        assert_eq!(counter_c.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queue_full_rejects_enqueue() {
        let config = Config {
            max_queue_size: 1,
            ..test_config()
        };
        let player = Arc::new(Player::new(GuildId::new(1), &config));
        let transport = FakeTransport::new();
        player.attach_connection(transport).await.unwrap();

        player.enqueue(track("a")).await.unwrap(); // suena
        player.enqueue(track("b")).await.unwrap(); // encolada

        let err = player.enqueue(track("c")).await.unwrap_err();
        assert!(matches!(err, PlaybackError::QueueFull { max: 1 }));
    }

    #[tokio::test]
    async fn test_volume_is_clamped_and_persists() {
        let (player, _transport) = player_with_transport().await;

        assert_eq!(player.set_volume(5.0).await, 2.0);
        assert_eq!(player.volume().await, 2.0);
        assert_eq!(player.set_volume(-1.0).await, 0.0);
    }
}
