//! # Audio Module
//!
//! Playback building blocks for one tenant at a time.
//!
//! ## Architecture
//!
//! ### [`queue`] - Queue Management
//! - Ordered list of resolved items, head is the one playing
//! - Repeat song / repeat queue flags and the skip transition table
//! - Shuffle that never moves the playing item
//!
//! ### [`player`] - Playback Driver
//! - `Idle` / `Playing` / `Paused` state machine
//! - Reacts to completions and skips by advancing the queue
//! - Drops unplayable items and reports them
//!
//! ### [`output`] - Audio Output Seam
//! - [`output::AudioOutput`] abstracts the sink that actually plays media
//! - Completions are tagged so late ones can be recognised and ignored
//!
//! ### [`voice`] - Discord Voice
//! - [`voice::SongbirdOutput`] plays local files through a songbird call
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use open_jukebox::audio::queue::{MediaHandle, ResolvedItem, SkipDirection, TenantQueue};
//!
//! let mut queue = TenantQueue::new(100);
//! queue.enqueue(ResolvedItem::playable("A", MediaHandle::new("a.mp3"))).unwrap();
//! queue.enqueue(ResolvedItem::playable("B", MediaHandle::new("b.mp3"))).unwrap();
//!
//! queue.advance(SkipDirection::Next);
//! assert_eq!(queue.titles(), vec!["B"]);
//! ```

pub mod output;
pub mod player;
pub mod queue;
pub mod voice;
