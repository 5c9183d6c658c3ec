use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproducción
    pub default_volume: f32,
    pub max_queue_size: usize,

    // Recuperación de conexión
    pub reconnect_attempts: u32,
    pub reconnect_backoff_ms: u64,

    // Auto-desconexión por inactividad
    pub idle_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Reproducción
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            // Recuperación de conexión
            reconnect_attempts: std::env::var("RECONNECT_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            reconnect_backoff_ms: std::env::var("RECONNECT_BACKOFF_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,

            // Inactividad
            idle_timeout_secs: std::env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string()) // 5 minutos
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Comprobaciones de sanidad sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0.0 y 2.0, recibido: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("El tamaño máximo de cola debe ser mayor que 0");
        }

        if self.reconnect_attempts == 0 {
            anyhow::bail!("Hace falta al menos 1 intento de reconexión");
        }

        if self.reconnect_backoff_ms == 0 {
            anyhow::bail!("El backoff de reconexión no puede ser 0 ms");
        }

        Ok(())
    }

    /// Resumen apto para logs (sin el token).
    pub fn summary(&self) -> String {
        format!(
            "Config: app {} (guild: {}), vol {}%, cola máx {}, reconexión {}x/{}ms, idle {}s",
            self.application_id,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.reconnect_attempts,
            self.reconnect_backoff_ms,
            self.idle_timeout_secs,
        )
    }
}

/// Valores por defecto; los de Discord no tienen default y deben venir del
/// entorno.
impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 1000,

            reconnect_attempts: 5,
            reconnect_backoff_ms: 500,

            idle_timeout_secs: 300, // 5 minutos
        }
    }
}
