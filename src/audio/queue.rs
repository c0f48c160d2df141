use rand::seq::SliceRandom;
use std::{
    collections::VecDeque,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

use crate::error::{JukeboxError, Result};

/// Opaque reference to a playable local resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaHandle(PathBuf);

impl MediaHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Result of resolving a play request.
///
/// A missing `media` is a regular value: it marks a request the fetch
/// backend could not turn into a playable file, and `title` then carries a
/// readable description of the failure.
#[derive(Debug, Clone)]
pub struct ResolvedItem {
    pub title: String,
    pub media: Option<MediaHandle>,
}

impl ResolvedItem {
    pub fn playable(title: impl Into<String>, media: MediaHandle) -> Self {
        Self {
            title: title.into(),
            media: Some(media),
        }
    }

    pub fn failed(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            media: None,
        }
    }

    pub fn is_playable(&self) -> bool {
        self.media.is_some()
    }
}

/// Direction requested by the last skip, consumed by the next transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkipDirection {
    #[default]
    Next,
    Back,
}

impl FromStr for SkipDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "next" => Ok(Self::Next),
            "back" | "prev" | "previous" => Ok(Self::Back),
            other => Err(format!("Dirección desconocida: {}", other)),
        }
    }
}

/// Ordered queue of one tenant.
///
/// The head is the item currently playing (or about to play). Every
/// change to the order after a playback ends goes through [`TenantQueue::advance`].
///
/// Media of items that leave the queue for good is collected until
/// [`TenantQueue::take_discarded`] picks it up.
#[derive(Debug)]
pub struct TenantQueue {
    items: VecDeque<ResolvedItem>,
    repeat_queue: bool,
    repeat_song: bool,
    max_size: usize,
    discarded: Vec<MediaHandle>,
}

impl TenantQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            repeat_queue: false,
            repeat_song: false,
            max_size,
            discarded: Vec::new(),
        }
    }

    /// Agrega un item al final de la cola
    pub fn enqueue(&mut self, item: ResolvedItem) -> Result<()> {
        if self.items.len() >= self.max_size {
            self.discard(item);
            return Err(JukeboxError::QueueFull(self.max_size));
        }

        info!("➕ Agregado a la cola: {}", item.title);
        self.items.push_back(item);
        Ok(())
    }

    /// Vacía la cola por completo
    pub fn clear(&mut self) {
        let items: Vec<_> = self.items.drain(..).collect();
        items.into_iter().for_each(|item| self.discard(item));
        debug!("🗑️ Cola vaciada");
    }

    /// Drops every item except the head.
    pub fn clear_upcoming(&mut self) -> usize {
        let keep = self.items.len().min(1);
        let upcoming: Vec<_> = self.items.drain(keep..).collect();
        let removed = upcoming.len();
        upcoming.into_iter().for_each(|item| self.discard(item));
        if removed > 0 {
            info!("🗑️ Eliminadas {} canciones de la cola", removed);
        }
        removed
    }

    /// Permutes every item behind the head; the head never moves.
    pub fn shuffle(&mut self) {
        if self.items.len() <= 2 {
            return;
        }

        let mut rest: Vec<_> = self.items.drain(1..).collect();
        rest.shuffle(&mut rand::thread_rng());
        self.items.extend(rest);
        info!("🔀 Cola mezclada");
    }

    pub fn peek_head(&self) -> Option<&ResolvedItem> {
        self.items.front()
    }

    pub fn remove_head(&mut self) -> Option<ResolvedItem> {
        let item = self.items.pop_front()?;
        if let Some(media) = &item.media {
            self.discarded.push(media.clone());
        }
        Some(item)
    }

    /// Media of every item removed since the last call.
    pub fn take_discarded(&mut self) -> Vec<MediaHandle> {
        std::mem::take(&mut self.discarded)
    }

    fn discard(&mut self, item: ResolvedItem) {
        if let Some(media) = item.media {
            self.discarded.push(media);
        }
    }

    /// Applies the transition that follows the end of the head's playback.
    ///
    /// | repeat song | repeat queue | direction | effect                              |
    /// |-------------|--------------|-----------|-------------------------------------|
    /// | on          | any          | any       | head unchanged                      |
    /// | off         | on           | Next      | head moves to the tail              |
    /// | off         | on           | Back      | tail moves to the head              |
    /// | off         | off          | Next      | head removed                        |
    /// | off         | off          | Back      | head removed, then tail to the head |
    pub fn advance(&mut self, direction: SkipDirection) {
        if self.repeat_song {
            debug!("🔂 Repitiendo la misma canción");
            return;
        }

        match (self.repeat_queue, direction) {
            (true, SkipDirection::Next) => {
                if let Some(played) = self.items.pop_front() {
                    self.items.push_back(played);
                }
            }
            (true, SkipDirection::Back) => {
                if let Some(last) = self.items.pop_back() {
                    self.items.push_front(last);
                }
            }
            (false, SkipDirection::Next) => {
                self.remove_head();
            }
            (false, SkipDirection::Back) => {
                self.remove_head();
                if let Some(last) = self.items.pop_back() {
                    self.items.push_front(last);
                }
            }
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &ResolvedItem> {
        self.items.iter()
    }

    pub fn titles(&self) -> Vec<String> {
        self.items.iter().map(|item| item.title.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn repeat_song(&self) -> bool {
        self.repeat_song
    }

    pub fn repeat_queue(&self) -> bool {
        self.repeat_queue
    }

    pub fn toggle_repeat_song(&mut self) -> bool {
        self.repeat_song = !self.repeat_song;
        if self.repeat_song {
            info!("🔂 Repetir canción activado");
        } else {
            info!("➡️ Repetir canción desactivado");
        }
        self.repeat_song
    }

    pub fn toggle_repeat_queue(&mut self) -> bool {
        self.repeat_queue = !self.repeat_queue;
        if self.repeat_queue {
            info!("🔁 Repetir cola activado");
        } else {
            info!("➡️ Repetir cola desactivado");
        }
        self.repeat_queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn item(title: &str) -> ResolvedItem {
        ResolvedItem::playable(title, MediaHandle::new(format!("/tmp/{}.mp3", title)))
    }

    fn queue_of(titles: &[&str]) -> TenantQueue {
        let mut queue = TenantQueue::new(100);
        for title in titles {
            queue.enqueue(item(title)).unwrap();
        }
        queue
    }

    #[test]
    fn repeat_song_keeps_head_regardless_of_other_flags() {
        for repeat_queue in [false, true] {
            for direction in [SkipDirection::Next, SkipDirection::Back] {
                let mut queue = queue_of(&["A", "B", "C"]);
                queue.toggle_repeat_song();
                if repeat_queue {
                    queue.toggle_repeat_queue();
                }
                for _ in 0..5 {
                    queue.advance(direction);
                    assert_eq!(queue.titles(), vec!["A", "B", "C"]);
                }
            }
        }
    }

    #[test]
    fn repeat_queue_next_rotates_head_to_tail() {
        let mut queue = queue_of(&["A", "B", "C"]);
        queue.toggle_repeat_queue();
        queue.advance(SkipDirection::Next);
        assert_eq!(queue.titles(), vec!["B", "C", "A"]);
    }

    #[test]
    fn repeat_queue_back_rotates_tail_to_head() {
        let mut queue = queue_of(&["A", "B", "C"]);
        queue.toggle_repeat_queue();
        queue.advance(SkipDirection::Back);
        assert_eq!(queue.titles(), vec!["C", "A", "B"]);
    }

    #[test]
    fn next_without_repeat_drops_head() {
        let mut queue = queue_of(&["A", "B", "C"]);
        queue.advance(SkipDirection::Next);
        assert_eq!(queue.titles(), vec!["B", "C"]);
    }

    #[test]
    fn back_without_repeat_drops_head_then_rotates_tail() {
        let mut queue = queue_of(&["A", "B", "C"]);
        queue.advance(SkipDirection::Back);
        assert_eq!(queue.titles(), vec!["C", "B"]);
    }

    #[test]
    fn advance_on_empty_queue_is_harmless() {
        let mut queue = TenantQueue::new(10);
        queue.advance(SkipDirection::Next);
        queue.advance(SkipDirection::Back);
        assert!(queue.is_empty());
    }

    #[test]
    fn shuffle_keeps_head_and_items() {
        let titles = ["A", "B", "C", "D", "E", "F", "G"];
        for _ in 0..50 {
            let mut queue = queue_of(&titles);
            queue.shuffle();
            let shuffled = queue.titles();
            assert_eq!(shuffled[0], "A");

            let mut counts: HashMap<String, usize> = HashMap::new();
            for title in &shuffled[1..] {
                *counts.entry(title.clone()).or_default() += 1;
            }
            let expected: HashMap<String, usize> =
                titles[1..].iter().map(|t| (t.to_string(), 1)).collect();
            assert_eq!(counts, expected);
        }
    }

    #[test]
    fn enqueue_rejects_items_past_capacity() {
        let mut queue = TenantQueue::new(2);
        queue.enqueue(item("A")).unwrap();
        queue.enqueue(item("B")).unwrap();
        assert_eq!(queue.enqueue(item("C")), Err(JukeboxError::QueueFull(2)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn clear_upcoming_keeps_only_head() {
        let mut queue = queue_of(&["A", "B", "C"]);
        assert_eq!(queue.clear_upcoming(), 2);
        assert_eq!(queue.titles(), vec!["A"]);
    }

    fn discarded_titles(queue: &mut TenantQueue) -> Vec<String> {
        queue
            .take_discarded()
            .iter()
            .map(|media| media.path().display().to_string())
            .collect()
    }

    #[test]
    fn only_items_leaving_for_good_are_discarded() {
        let mut queue = queue_of(&["A", "B", "C"]);
        queue.toggle_repeat_queue();
        queue.advance(SkipDirection::Next);
        queue.advance(SkipDirection::Back);
        assert!(queue.take_discarded().is_empty());

        queue.toggle_repeat_queue();
        queue.advance(SkipDirection::Next);
        assert_eq!(discarded_titles(&mut queue), vec!["/tmp/A.mp3"]);

        queue.advance(SkipDirection::Back);
        assert_eq!(discarded_titles(&mut queue), vec!["/tmp/B.mp3"]);
        assert_eq!(queue.titles(), vec!["C"]);
    }

    #[test]
    fn clearing_and_overflow_discard_media() {
        let mut queue = TenantQueue::new(3);
        for title in ["A", "B", "C"] {
            queue.enqueue(item(title)).unwrap();
        }
        assert!(queue.enqueue(item("D")).is_err());
        assert_eq!(discarded_titles(&mut queue), vec!["/tmp/D.mp3"]);

        queue.clear_upcoming();
        assert_eq!(discarded_titles(&mut queue), vec!["/tmp/B.mp3", "/tmp/C.mp3"]);

        queue.enqueue(ResolvedItem::failed("sin archivo")).unwrap();
        queue.clear();
        assert_eq!(discarded_titles(&mut queue), vec!["/tmp/A.mp3"]);
    }

    #[test]
    fn skip_direction_parses_user_input() {
        assert_eq!("back".parse::<SkipDirection>(), Ok(SkipDirection::Back));
        assert_eq!(" Next ".parse::<SkipDirection>(), Ok(SkipDirection::Next));
        assert_eq!("".parse::<SkipDirection>(), Ok(SkipDirection::Next));
        assert!("sideways".parse::<SkipDirection>().is_err());
    }
}
