use serenity::async_trait;
use songbird::{Call, CoreEvent, Event, EventContext, EventHandler as VoiceEventHandler};
use std::sync::Arc;
use tracing::debug;

use super::{
    player::Player,
    track::TrackInfo,
    transport::{ConnectionEvent, EndNotifier},
};

/// Notificaciones que el player escribe en su canal para los observadores
/// (auto-desconexión por inactividad, logging). Sustituyen al clásico
/// emitter de eventos por nombre.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Empezó a sonar una pista.
    TrackStarted(TrackInfo),
    /// El player transicionó de pista; `None` significa que quedó en reposo.
    Advanced { next: Option<TrackInfo> },
    /// El recurso de una pista falló y la pista se saltó.
    TrackFailed { track: TrackInfo, reason: String },
    /// La conexión de voz se perdió sin posibilidad de recuperación.
    ConnectionLost,
}

/// Relé de fin de pista: se registra sobre el handle concreto de songbird
/// y dispara el aviso que el player asoció a esa reproducción.
pub struct TrackEndRelay {
    notify: EndNotifier,
}

impl TrackEndRelay {
    pub fn new(notify: EndNotifier) -> Self {
        Self { notify }
    }
}

#[async_trait]
impl VoiceEventHandler for TrackEndRelay {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("🎵 Pista terminada, avisando al player");
        (self.notify)();
        None
    }
}

/// Relé de eventos del driver de voz hacia el ciclo de vida del player.
struct DriverLifecycleRelay {
    player: Arc<Player>,
    event: ConnectionEvent,
}

#[async_trait]
impl VoiceEventHandler for DriverLifecycleRelay {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let player = self.player.clone();
        let event = self.event;
        // la reconexión duerme entre intentos; no bloquear la tarea de
        // eventos del driver
        tokio::spawn(async move {
            player.on_connection_event(event).await;
        });
        None
    }
}

/// Registra sobre un `Call` los relés de ciclo de vida que alimentan al
/// player. Los eventos de fin de pista se registran por-handle en el
/// transporte, no aquí.
pub fn register_voice_events(call: &mut Call, player: &Arc<Player>) {
    call.add_global_event(
        Event::Core(CoreEvent::DriverConnect),
        DriverLifecycleRelay {
            player: player.clone(),
            event: ConnectionEvent::Ready,
        },
    );

    call.add_global_event(
        Event::Core(CoreEvent::DriverReconnect),
        DriverLifecycleRelay {
            player: player.clone(),
            event: ConnectionEvent::Ready,
        },
    );

    call.add_global_event(
        Event::Core(CoreEvent::DriverDisconnect),
        DriverLifecycleRelay {
            player: player.clone(),
            event: ConnectionEvent::Disconnected,
        },
    );
}
