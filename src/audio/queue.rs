use rand::Rng;
use std::{collections::VecDeque, time::Duration};
use tracing::debug;

use super::{error::PlaybackError, track::Track};

/// Cola de reproducción de una sesión: secuencia ordenada de pistas donde
/// el orden de inserción es el orden de reproducción.
///
/// La cola no dispara preparaciones por su cuenta: mantener la invariante
/// "la cabeza siempre está preparándose" es responsabilidad del `Player`,
/// que conoce los momentos en que la cabeza cambia.
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Añade al final y devuelve la nueva longitud.
    pub fn push(&mut self, track: Track) -> usize {
        debug!("➕ Agregado a la cola: {}", track.info().title);
        self.items.push_back(track);
        self.items.len()
    }

    /// Saca y devuelve la cabeza.
    pub fn shift(&mut self) -> Result<Track, PlaybackError> {
        self.items.pop_front().ok_or(PlaybackError::EmptyQueue)
    }

    #[allow(dead_code)]
    pub fn get(&self, index: usize) -> Result<&Track, PlaybackError> {
        self.items.get(index).ok_or(PlaybackError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    /// Reemplaza la pista en `index` y devuelve la anterior.
    #[allow(dead_code)]
    pub fn set(&mut self, index: usize, track: Track) -> Result<Track, PlaybackError> {
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or(PlaybackError::IndexOutOfRange { index, len })?;
        Ok(std::mem::replace(slot, track))
    }

    pub fn remove(&mut self, index: usize) -> Result<Track, PlaybackError> {
        let len = self.items.len();
        self.items
            .remove(index)
            .ok_or(PlaybackError::IndexOutOfRange { index, len })
    }

    /// Reubica una pista. Ambos índices se validan antes de mutar nada;
    /// mover una posición sobre sí misma es un error sin efecto.
    pub fn move_track(&mut self, src: usize, dst: usize) -> Result<(), PlaybackError> {
        let len = self.items.len();
        if src >= len {
            return Err(PlaybackError::IndexOutOfRange { index: src, len });
        }
        if dst >= len {
            return Err(PlaybackError::IndexOutOfRange { index: dst, len });
        }
        if src == dst {
            return Err(PlaybackError::SamePosition);
        }

        let track = self
            .items
            .remove(src)
            .ok_or(PlaybackError::IndexOutOfRange { index: src, len })?;
        self.items.insert(dst, track);
        debug!("📍 Pista movida de posición {} a {}", src, dst);
        Ok(())
    }

    /// Permutación uniforme Fisher–Yates: recorre desde el final hacia la
    /// cabeza intercambiando cada posición con una anterior-o-igual elegida
    /// uniformemente.
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        for i in (1..self.items.len()).rev() {
            let j = rng.gen_range(0..=i);
            self.items.swap(i, j);
        }
        debug!("🔀 Cola mezclada ({} pistas)", self.items.len());
    }

    /// Vacía la cola sin tocar el estado de resolución de ninguna pista.
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        cleared
    }

    /// Duración agregada; las pistas sin duración conocida cuentan cero.
    pub fn duration(&self) -> Duration {
        self.items.iter().filter_map(|t| t.info().duration).sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn front_mut(&mut self) -> Option<&mut Track> {
        self.items.front_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::{SourceProducer, TrackInfo};
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use songbird::input::{File, Input};
    use std::sync::Arc;

    fn producer() -> SourceProducer {
        Arc::new(|| Box::pin(async { Ok(Input::from(File::new("/dev/null"))) }))
    }

    fn track(title: &str, duration_ms: u64) -> Track {
        let info = TrackInfo::new(title, UserId::new(1))
            .with_duration(Duration::from_millis(duration_ms));
        Track::new(info, producer())
    }

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue.iter().map(|t| t.info().title.clone()).collect()
    }

    #[test]
    fn test_push_and_shift_keep_insertion_order() {
        let mut queue = TrackQueue::new();
        assert_eq!(queue.push(track("a", 0)), 1);
        assert_eq!(queue.push(track("b", 0)), 2);
        assert_eq!(queue.push(track("c", 0)), 3);

        assert_eq!(queue.shift().unwrap().info().title, "a");
        assert_eq!(queue.shift().unwrap().info().title, "b");
        assert_eq!(queue.shift().unwrap().info().title, "c");
        assert!(matches!(
            queue.shift().err().unwrap(),
            PlaybackError::EmptyQueue
        ));
    }

    #[test]
    fn test_get_and_set_are_bounds_checked() {
        let mut queue = TrackQueue::new();
        queue.push(track("a", 0));

        assert_eq!(queue.get(0).unwrap().info().title, "a");
        assert!(matches!(
            queue.get(1).err().unwrap(),
            PlaybackError::IndexOutOfRange { index: 1, len: 1 }
        ));

        let old = queue.set(0, track("b", 0)).unwrap();
        assert_eq!(old.info().title, "a");
        assert_eq!(queue.get(0).unwrap().info().title, "b");
        assert!(queue.set(5, track("c", 0)).is_err());
    }

    #[test]
    fn test_move_validates_both_indices_before_mutating() {
        let mut queue = TrackQueue::new();
        queue.push(track("a", 0));
        queue.push(track("b", 0));
        queue.push(track("c", 0));

        assert!(matches!(
            queue.move_track(3, 0).unwrap_err(),
            PlaybackError::IndexOutOfRange { index: 3, len: 3 }
        ));
        assert!(matches!(
            queue.move_track(0, 3).unwrap_err(),
            PlaybackError::IndexOutOfRange { index: 3, len: 3 }
        ));
        assert!(matches!(
            queue.move_track(1, 1).unwrap_err(),
            PlaybackError::SamePosition
        ));
        // nada cambió
        assert_eq!(titles(&queue), vec!["a", "b", "c"]);

        queue.move_track(2, 0).unwrap();
        assert_eq!(titles(&queue), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_remove_returns_the_removed_track() {
        let mut queue = TrackQueue::new();
        queue.push(track("a", 0));
        queue.push(track("b", 0));

        let removed = queue.remove(1).unwrap();
        assert_eq!(removed.info().title, "b");
        assert_eq!(queue.len(), 1);
        assert!(queue.remove(1).is_err());
    }

    #[test]
    fn test_duration_aggregates_known_durations() {
        let mut queue = TrackQueue::new();
        queue.push(track("a", 1000));
        queue.push(track("b", 2000));
        queue.push(track("c", 3000));

        assert_eq!(queue.duration(), Duration::from_millis(6000));

        // una pista sin duración cuenta cero
        queue.push(Track::new(TrackInfo::new("live", UserId::new(1)), producer()));
        assert_eq!(queue.duration(), Duration::from_millis(6000));
    }

    #[test]
    fn test_shuffle_preserves_contents() {
        let mut queue = TrackQueue::new();
        for i in 0..20 {
            queue.push(track(&format!("t{i}"), 0));
        }

        queue.shuffle();

        let mut shuffled = titles(&queue);
        shuffled.sort();
        let mut expected: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
        expected.sort();
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn test_clear_reports_how_many_were_dropped() {
        let mut queue = TrackQueue::new();
        queue.push(track("a", 0));
        queue.push(track("b", 0));

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }
}
