use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::track::TrackInfo;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Tempo Bot";

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &TrackInfo) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field(
            "🎤 Artista",
            track.artist.clone().unwrap_or_else(|| "Desconocido".to_string()),
            true,
        );

    if let Some(duration) = track.duration {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    } else {
        embed = embed.field("⏱️ Duración", "🔴 En vivo", true);
    }

    embed = embed.field(
        "👤 Solicitado por",
        format!("<@{}>", track.requested_by),
        true,
    );

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail.clone());
    }
    if let Some(url) = &track.url {
        embed = embed.url(url.clone());
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción a la cola
pub fn create_track_added_embed(track: &TrackInfo, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**{}**", track.title))
        .color(colors::INFO_BLUE)
        .field("📍 Posición en cola", position.to_string(), true);

    if let Some(duration) = track.duration {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    } else {
        embed = embed.field("⏱️ Duración", "🔴 En vivo", true);
    }

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail.clone());
    }
    if let Some(url) = &track.url {
        embed = embed.url(url.clone());
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed con una página de la cola
pub fn create_queue_embed(
    now_playing: Option<&TrackInfo>,
    queue: &[TrackInfo],
    page: usize,
    per_page: usize,
    total_duration: Duration,
) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📃 Cola de Reproducción")
        .color(colors::MUSIC_PURPLE);

    match now_playing {
        Some(track) => {
            embed = embed.field(
                "🎵 Sonando",
                format!(
                    "**{}** ({})",
                    track.title,
                    track
                        .duration
                        .map(format_duration)
                        .unwrap_or_else(|| "en vivo".to_string())
                ),
                false,
            );
        }
        None => {
            embed = embed.field("🎵 Sonando", "Nada por ahora", false);
        }
    }

    if queue.is_empty() {
        embed = embed.description("La cola está vacía");
    } else {
        let safe_page = page.max(1);
        let start = (safe_page - 1) * per_page;
        let end = (start + per_page).min(queue.len());
        let total_pages = (queue.len() + per_page - 1) / per_page;

        let lines: Vec<String> = if start < queue.len() {
            queue[start..end]
                .iter()
                .enumerate()
                .map(|(i, track)| {
                    format!(
                        "`{}.` **{}** ({})",
                        start + i + 1,
                        track.title,
                        track
                            .duration
                            .map(format_duration)
                            .unwrap_or_else(|| "en vivo".to_string())
                    )
                })
                .collect()
        } else {
            vec!["No hay pistas en esta página".to_string()]
        };

        embed = embed.description(lines.join("\n")).footer(CreateEmbedFooter::new(
            format!(
                "Página {}/{} • {} pistas • {} total",
                safe_page.min(total_pages),
                total_pages,
                queue.len(),
                format_duration(total_duration)
            ),
        ));
    }

    embed.timestamp(Timestamp::now())
}

/// Crea un embed de error estandarizado
pub fn create_error_embed(message: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(message.to_string())
        .color(colors::ERROR_RED)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Formatea una duración como h:mm:ss o m:ss
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(213)), "3:33");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1:01:01");
    }
}
