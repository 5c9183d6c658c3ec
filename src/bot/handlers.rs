use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use crate::{
    audio::PlaybackError,
    bot::TempoBot,
    sources::{build_track, DirectUrlClient, MediaDescriptor, MusicSource, YouTubeClient},
    ui::embeds,
};

const QUEUE_PAGE_SIZE: usize = 10;

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &TempoBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot).await?,
        "playlist" => handle_playlist(ctx, command, bot).await?,
        "pause" => handle_pause(ctx, command, bot).await?,
        "resume" => handle_resume(ctx, command, bot).await?,
        "skip" => handle_skip(ctx, command, bot).await?,
        "stop" => handle_stop(ctx, command, bot).await?,
        "queue" => handle_queue(ctx, command, bot).await?,
        "nowplaying" => handle_nowplaying(ctx, command, bot).await?,
        "shuffle" => handle_shuffle(ctx, command, bot).await?,
        "loop" => handle_loop(ctx, command, bot).await?,
        "volume" => handle_volume(ctx, command, bot).await?,
        "move" => handle_move(ctx, command, bot).await?,
        "remove" => handle_remove(ctx, command, bot).await?,
        "clear" => handle_clear(ctx, command, bot).await?,
        "join" => handle_join(ctx, command, bot).await?,
        "leave" => handle_leave(ctx, command, bot).await?,
        "help" => handle_help(ctx, command).await?,
        _ => {
            respond_text(ctx, &command, "❌ Comando no reconocido").await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let query = option_str(&command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer la respuesta ya que resolver el catálogo puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    if let Err(e) = ensure_connected(ctx, bot, guild_id, command.user.id).await {
        edit_with_embed(ctx, &command, embeds::create_error_embed(&e.to_string())).await?;
        return Ok(());
    }

    let descriptor = match resolve_query(&query).await {
        Ok(descriptor) => descriptor,
        Err(e) => {
            edit_with_embed(ctx, &command, embeds::create_error_embed(&e.to_string())).await?;
            return Ok(());
        }
    };

    let track = build_track(descriptor, command.user.id);
    let info = track.info().clone();
    let player = bot.registry.get_or_create(guild_id);

    let embed = match player.enqueue(track).await {
        Ok(0) => embeds::create_now_playing_embed(&info),
        Ok(position) => embeds::create_track_added_embed(&info, position),
        Err(e) => embeds::create_error_embed(&playback_error_message(&e)),
    };

    edit_with_embed(ctx, &command, embed).await?;
    Ok(())
}

async fn handle_playlist(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let url = option_str(&command, "url")
        .ok_or_else(|| anyhow::anyhow!("URL no proporcionada"))?
        .to_string();

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    if let Err(e) = ensure_connected(ctx, bot, guild_id, command.user.id).await {
        edit_with_embed(ctx, &command, embeds::create_error_embed(&e.to_string())).await?;
        return Ok(());
    }

    let youtube = YouTubeClient::new();
    let descriptors = match youtube.get_playlist(&url).await {
        Ok(descriptors) => descriptors,
        Err(e) => {
            edit_with_embed(ctx, &command, embeds::create_error_embed(&e.to_string())).await?;
            return Ok(());
        }
    };

    let player = bot.registry.get_or_create(guild_id);
    let mut added = 0usize;
    let mut dropped = 0usize;
    for descriptor in descriptors {
        let track = build_track(descriptor, command.user.id);
        match player.enqueue(track).await {
            Ok(_) => added += 1,
            Err(PlaybackError::QueueFull { .. }) => {
                dropped += 1;
                break;
            }
            Err(_) => dropped += 1,
        }
    }

    let message = if dropped > 0 {
        format!("📃 {} canciones agregadas ({} descartadas)", added, dropped)
    } else {
        format!("📃 {} canciones agregadas a la cola", added)
    };
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(message))
        .await?;
    Ok(())
}

async fn handle_pause(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let message = match bot.registry.get(guild_id) {
        Some(player) => match player.pause().await {
            Ok(true) => "⏸️ Reproducción pausada".to_string(),
            Ok(false) => "⚠️ No hay nada que pausar".to_string(),
            Err(e) => playback_error_message(&e),
        },
        None => "⚠️ No hay nada sonando en este servidor".to_string(),
    };

    respond_text(ctx, &command, &message).await
}

async fn handle_resume(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let message = match bot.registry.get(guild_id) {
        Some(player) => match player.unpause().await {
            Ok(true) => "▶️ Reproducción reanudada".to_string(),
            Ok(false) => "⚠️ La reproducción no estaba pausada".to_string(),
            Err(e) => playback_error_message(&e),
        },
        None => "⚠️ No hay nada sonando en este servidor".to_string(),
    };

    respond_text(ctx, &command, &message).await
}

async fn handle_skip(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let message = match bot.registry.get(guild_id) {
        Some(player) if player.now_playing().is_some() => {
            player.skip().await;
            match player.now_playing() {
                Some(next) => format!("⏭️ Saltada. Ahora suena: **{}**", next.title),
                None => "⏭️ Saltada. La cola quedó vacía".to_string(),
            }
        }
        _ => "⚠️ No hay nada que saltar".to_string(),
    };

    respond_text(ctx, &command, &message).await
}

async fn handle_stop(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    if let Some(player) = bot.registry.get(guild_id) {
        player.stop().await;
    }
    bot.leave_voice_channel(ctx, guild_id).await.ok();

    respond_text(ctx, &command, "⏹️ Reproducción detenida y cola limpiada").await
}

async fn handle_queue(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let page = option_int(&command, "page").unwrap_or(1).max(1) as usize;

    let embed = match bot.registry.get(guild_id) {
        Some(player) => {
            let now_playing = player.now_playing();
            let snapshot = player.queue_snapshot().await;
            let total = player.queue_duration().await;
            embeds::create_queue_embed(now_playing.as_ref(), &snapshot, page, QUEUE_PAGE_SIZE, total)
        }
        None => embeds::create_queue_embed(None, &[], 1, QUEUE_PAGE_SIZE, Default::default()),
    };

    respond_embed(ctx, &command, embed).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &TempoBot,
) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    match bot.registry.get(guild_id).and_then(|p| p.now_playing()) {
        Some(track) => respond_embed(ctx, &command, embeds::create_now_playing_embed(&track)).await,
        None => respond_text(ctx, &command, "📭 No hay nada sonando ahora mismo").await,
    }
}

async fn handle_shuffle(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let message = match bot.registry.get(guild_id) {
        Some(player) => {
            let len = player.queue_shuffle().await;
            format!("🔀 Cola mezclada ({} pistas)", len)
        }
        None => "⚠️ No hay cola que mezclar".to_string(),
    };

    respond_text(ctx, &command, &message).await
}

async fn handle_loop(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let player = bot.registry.get_or_create(guild_id);

    let enabled = match option_bool(&command, "enabled") {
        Some(value) => {
            player.set_looping(value).await;
            value
        }
        None => player.toggle_looping().await,
    };

    let message = if enabled {
        "🔂 Repetición activada"
    } else {
        "➡️ Repetición desactivada"
    };
    respond_text(ctx, &command, message).await
}

async fn handle_volume(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let level = option_int(&command, "level")
        .ok_or_else(|| anyhow::anyhow!("Nivel de volumen no proporcionado"))?;

    let player = bot.registry.get_or_create(guild_id);
    let applied = player.set_volume(level as f32 / 100.0).await;

    respond_text(
        ctx,
        &command,
        &format!("🔊 Volumen ajustado a {}%", (applied * 100.0) as u32),
    )
    .await
}

async fn handle_move(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let from = option_int(&command, "from").unwrap_or(0);
    let to = option_int(&command, "to").unwrap_or(0);

    let message = match bot.registry.get(guild_id) {
        Some(player) if from >= 1 && to >= 1 => {
            match player.queue_move(from as usize - 1, to as usize - 1).await {
                Ok(()) => format!("📍 Pista movida de la posición {} a la {}", from, to),
                Err(e) => playback_error_message(&e),
            }
        }
        Some(_) => "⚠️ Las posiciones empiezan en 1".to_string(),
        None => "⚠️ No hay cola en este servidor".to_string(),
    };

    respond_text(ctx, &command, &message).await
}

async fn handle_remove(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let position = option_int(&command, "position").unwrap_or(0);

    let message = match bot.registry.get(guild_id) {
        Some(player) if position >= 1 => {
            match player.queue_remove(position as usize - 1).await {
                Ok(removed) => format!("❌ **{}** quitada de la cola", removed.title),
                Err(e) => playback_error_message(&e),
            }
        }
        Some(_) => "⚠️ Las posiciones empiezan en 1".to_string(),
        None => "⚠️ No hay cola en este servidor".to_string(),
    };

    respond_text(ctx, &command, &message).await
}

async fn handle_clear(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let message = match bot.registry.get(guild_id) {
        Some(player) => {
            let cleared = player.queue_clear().await;
            format!("🗑️ Cola limpiada: {} pistas quitadas", cleared)
        }
        None => "⚠️ No hay cola en este servidor".to_string(),
    };

    respond_text(ctx, &command, &message).await
}

async fn handle_join(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let message = match ensure_connected(ctx, bot, guild_id, command.user.id).await {
        Ok(()) => "🔊 Conectado al canal de voz".to_string(),
        Err(e) => e.to_string(),
    };

    respond_text(ctx, &command, &message).await
}

async fn handle_leave(ctx: &Context, command: CommandInteraction, bot: &TempoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    if let Some(player) = bot.registry.get(guild_id) {
        player.stop().await;
    }
    bot.leave_voice_channel(ctx, guild_id).await?;

    respond_text(ctx, &command, "👋 Desconectado del canal de voz").await
}

async fn handle_help(ctx: &Context, command: CommandInteraction) -> Result<()> {
    let embed = CreateEmbed::default()
        .title("🎵 Tempo Bot")
        .description("Comandos disponibles")
        .color(embeds::colors::INFO_BLUE)
        .field(
            "Reproducción",
            "`/play` `/playlist` `/pause` `/resume` `/skip` `/stop` `/volume` `/loop`",
            false,
        )
        .field(
            "Cola",
            "`/queue` `/nowplaying` `/shuffle` `/move` `/remove` `/clear`",
            false,
        )
        .field("Conexión", "`/join` `/leave`", false);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

// Funciones auxiliares

/// Resuelve el texto del usuario a un descriptor de medio: URL de YouTube,
/// URL directa de audio, o búsqueda con el primer resultado.
async fn resolve_query(query: &str) -> Result<MediaDescriptor> {
    let youtube = YouTubeClient::new();

    if YouTubeClient::is_youtube_url(query) {
        return youtube.get_track(query).await;
    }

    let direct = DirectUrlClient::new();
    if direct.is_valid_url(query) {
        return direct.get_track(query).await;
    }

    youtube
        .search(query, 1)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No se encontraron resultados para: {}", query))
}

/// Conecta el bot al canal de voz del usuario si aún no hay conexión útil.
async fn ensure_connected(
    ctx: &Context,
    bot: &TempoBot,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<()> {
    if let Some(player) = bot.registry.get(guild_id) {
        if player.is_ready().await {
            return Ok(());
        }
    }

    let channel_id = get_user_voice_channel(ctx, guild_id, user_id).await?;
    bot.join_voice_channel(ctx, guild_id, channel_id).await
}

async fn get_user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))?;

    Ok(channel_id)
}

fn playback_error_message(err: &PlaybackError) -> String {
    match err {
        PlaybackError::TransportUnavailable => {
            "❌ Perdí la conexión de voz; vuelve a invitarme con /join".to_string()
        }
        PlaybackError::ResourceUnavailable(_) => {
            "❌ Esa canción no se pudo reproducir y fue saltada".to_string()
        }
        other => format!("❌ {}", other),
    }
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_int(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn option_bool(command: &CommandInteraction, name: &str) -> Option<bool> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_bool())
}

async fn respond_text(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;
    Ok(())
}

async fn edit_with_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}
