//! # Bot Module
//!
//! Capa de comandos de Discord sobre el motor de reproducción.
//!
//! [`TempoBot`] implementa el [`EventHandler`] de serenity: registra los
//! comandos slash, despacha interacciones hacia [`handlers`] y traduce los
//! cambios de estado de voz (expulsiones) en eventos de ciclo de vida del
//! player. Las conexiones de voz se crean aquí: un `Call` de songbird se
//! envuelve en [`SongbirdTransport`] y se adjunta al player de la guild,
//! junto con un observador de inactividad que desconecta el bot cuando la
//! cola se agota.

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use songbird::Songbird;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{
        events::{register_voice_events, PlayerEvent},
        transport::{ConnectionEvent, SongbirdTransport},
        Player, PlayerRegistry,
    },
    config::Config,
};

pub struct TempoBot {
    /// Configuración cargada del entorno
    config: Arc<Config>,
    /// Un player por guild, creados bajo demanda
    pub registry: Arc<PlayerRegistry>,
    /// Observadores de inactividad por guild
    watchers: DashMap<GuildId, tokio::task::JoinHandle<()>>,
}

impl TempoBot {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(PlayerRegistry::new(config.clone()));

        Self {
            config,
            registry,
            watchers: DashMap::new(),
        }
    }

    /// Registra los comandos slash, globales o por guild según configuración.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                info!("🏠 Registrando comandos para guild: {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await?;
            }
        }
        Ok(())
    }

    /// Conecta el bot a un canal de voz y deja el player de la guild
    /// adjuntado a la conexión nueva.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| anyhow::anyhow!("Error al conectar al canal de voz: {e}"))?;

        let player = self.registry.get_or_create(guild_id);

        {
            let mut guard = call.lock().await;
            register_voice_events(&mut guard, &player);
        }

        let transport = Arc::new(SongbirdTransport::new(
            manager.clone(),
            guild_id,
            channel_id,
            call,
        ));
        player
            .attach_connection(transport)
            .await
            .map_err(|_| anyhow::anyhow!("La conexión de voz terminó antes de poder usarse"))?;

        self.spawn_idle_watcher(manager, guild_id, player);

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);
        Ok(())
    }

    /// Desconecta el bot del canal de voz de la guild.
    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<()> {
        if let Some(player) = self.registry.get(guild_id) {
            player.detach_connection().await;
        }

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;
        manager.remove(guild_id).await?;

        if let Some((_, watcher)) = self.watchers.remove(&guild_id) {
            watcher.abort();
        }

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }

    /// Observa las notificaciones del player y abandona el canal cuando la
    /// sesión lleva demasiado tiempo en reposo.
    fn spawn_idle_watcher(&self, manager: Arc<Songbird>, guild_id: GuildId, player: Arc<Player>) {
        let idle_timeout = Duration::from_secs(self.config.idle_timeout_secs);
        let events = player.subscribe();

        let watcher = tokio::spawn(async move {
            let mut idle = false;
            loop {
                if idle {
                    tokio::select! {
                        event = events.recv_async() => match event {
                            Ok(PlayerEvent::Advanced { next }) => idle = next.is_none(),
                            Ok(PlayerEvent::TrackStarted(_)) => idle = false,
                            Ok(PlayerEvent::ConnectionLost) | Err(_) => return,
                            Ok(_) => {}
                        },
                        _ = tokio::time::sleep(idle_timeout) => {
                            if !player.is_playing().await {
                                info!(
                                    "🚪 Auto-desconexión por inactividad en guild {}",
                                    guild_id
                                );
                                player.detach_connection().await;
                                let _ = manager.remove(guild_id).await;
                            }
                            return;
                        }
                    }
                } else {
                    match events.recv_async().await {
                        Ok(PlayerEvent::Advanced { next }) => idle = next.is_none(),
                        Ok(PlayerEvent::ConnectionLost) | Err(_) => return,
                        Ok(_) => {}
                    }
                }
            }
        });

        if let Some(old) = self.watchers.insert(guild_id, watcher) {
            old.abort();
        }
    }
}

#[async_trait]
impl EventHandler for TempoBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        info!("⚙️ {}", self.config.summary());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// La expulsión del bot de un canal es, para el player, la destrucción
    /// de su sesión de voz.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                warn!("🔌 Bot desconectado del canal de voz en guild {}", guild_id);

                if let Some((_, watcher)) = self.watchers.remove(&guild_id) {
                    watcher.abort();
                }

                if let Some(player) = self.registry.get(guild_id) {
                    player.on_connection_event(ConnectionEvent::Destroyed).await;
                }
            }
        }
    }
}
