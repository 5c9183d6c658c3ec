//! # Audio Module
//!
//! Motor de reproducción del bot: decide qué suena después, cuánto audio
//! se prepara por adelantado y cómo se recupera la sesión ante fallos del
//! transporte de voz.
//!
//! ## Arquitectura
//!
//! Tres piezas, de hoja a raíz:
//!
//! ### [`track`] - Pista
//! - Unidad reproducible con recurso de resolución perezosa
//! - La función productora se invoca como mucho una vez por ciclo
//!
//! ### [`queue`] - Cola
//! - Secuencia ordenada con mutación por índice (move/remove/shuffle)
//! - La cabeza siempre tiene su preparación arrancada (invariante que
//!   mantiene el player)
//!
//! ### [`player`] - Player
//! - Máquina de estados por guild: Idle → Playing → {Paused ⇄ Playing}
//! - Prebuffer de exactamente una pista por delante de la actual
//! - Traduce los fallos de recurso en "pista saltada", nunca en una
//!   sesión colgada
//!
//! El transporte de voz queda detrás del seam de [`transport`]; las
//! notificaciones de transición salen por el canal de [`events`]; el
//! [`registry`] mantiene un player por guild.

pub mod error;
pub mod events;
pub mod player;
pub mod queue;
pub mod registry;
pub mod track;
pub mod transport;

pub use error::PlaybackError;
pub use events::PlayerEvent;
pub use player::Player;
pub use registry::PlayerRegistry;
pub use track::{Track, TrackInfo};
