use thiserror::Error;

/// Errores que expone el motor de reproducción.
///
/// `TransportUnavailable` es el único fatal: fuerza un `stop()` del player.
/// El resto son recuperables o errores de uso del caller que no mutan estado.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no hay conexión de voz utilizable")]
    TransportUnavailable,

    #[error("no se pudo obtener el audio de la pista: {0}")]
    ResourceUnavailable(String),

    #[error("el transporte rechazó el comando de reproducción")]
    TransportCommandFailed,

    #[error("la cola está vacía")]
    EmptyQueue,

    #[error("posición {index} fuera de rango (la cola tiene {len} pistas)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("la pista ya terminó y su recurso no puede reutilizarse")]
    AlreadyEnded,

    #[error("origen y destino son la misma posición")]
    SamePosition,

    #[error("la cola está llena (máximo {max} canciones)")]
    QueueFull { max: usize },
}

impl PlaybackError {
    /// Construye `ResourceUnavailable` desde cualquier error del productor.
    pub fn resource(err: impl std::fmt::Display) -> Self {
        Self::ResourceUnavailable(err.to_string())
    }
}
