//! Session Track Cache -- the process-local shelf of playable results.
//!
//! Tracks exist only for the lifetime of the session; the product
//! deliberately does not retain audio, so there is no eviction policy, no
//! capacity bound, and no persistence. A page refresh starts empty.

use cadenza_storage::GenerationRecord;
use serde::{Deserialize, Serialize};

/// A playable result of one completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTrack {
    /// Same id as the generation record that produced it.
    pub generation_id: String,
    pub title: String,
    /// Transient artifact reference; dead once the session ends.
    pub audio_url: String,
    pub request: GenerationRecord,
}

/// Insertion-ordered track collection, most recent first, with an active
/// selection pointer.
#[derive(Debug, Default)]
pub struct SessionTrackCache {
    tracks: Vec<SessionTrack>,
    active: Option<String>,
}

impl SessionTrackCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a track and make it the active selection, matching the
    /// studio surface where a finished generation starts playing.
    pub fn add(&mut self, track: SessionTrack) {
        self.active = Some(track.generation_id.clone());
        self.tracks.insert(0, track);
    }

    /// Point the active selection at `generation_id`. Returns false (and
    /// leaves the selection alone) if no such track exists.
    pub fn select(&mut self, generation_id: &str) -> bool {
        if self.tracks.iter().any(|t| t.generation_id == generation_id) {
            self.active = Some(generation_id.to_string());
            true
        } else {
            false
        }
    }

    pub fn active(&self) -> Option<&SessionTrack> {
        let id = self.active.as_deref()?;
        self.tracks.iter().find(|t| t.generation_id == id)
    }

    pub fn get(&self, generation_id: &str) -> Option<&SessionTrack> {
        self.tracks.iter().find(|t| t.generation_id == generation_id)
    }

    /// Tracks, most recent first.
    pub fn tracks(&self) -> &[SessionTrack] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Drop everything, e.g. on session end.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.active = None;
    }
}
