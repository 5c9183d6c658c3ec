use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;

use crate::config::Config;

use super::player::Player;

/// Registro explícito de players por guild, pasado a quien lo necesita en
/// lugar de vivir como estado global del módulo.
///
/// Los players se crean en el primer uso y no se destruyen nunca: la
/// sesión se recrea bajo demanda por id. En procesos muy longevos con
/// muchas guilds efímeras esto retiene un `Arc<Player>` por guild; no hay
/// política de desalojo definida.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<Player>>,
    config: Arc<Config>,
}

impl PlayerRegistry {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            players: DashMap::new(),
            config,
        }
    }

    /// Player de la guild, creándolo si es la primera vez.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<Player> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Player::new(guild_id, &self.config)))
            .clone()
    }

    /// Player existente, sin crear.
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Player>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.players.len()
    }
}
