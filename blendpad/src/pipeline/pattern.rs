// Patterns, corners, and the shared active-pattern snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::shared::{CornerId, NUM_CORNERS, STEPS_PER_PATTERN, TrackId};

pub type Steps = [bool; STEPS_PER_PATTERN];

/// One 16-step drum pattern over the fixed kick/snare/hat track set.
/// Serializes as `{"kick": [..16], "snare": [..16], "hat": [..16]}`; arrays
/// of any other length are rejected by serde.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub kick: Steps,
    pub snare: Steps,
    pub hat: Steps,
}

impl Pattern {
    pub fn empty() -> Self {
        Self::default()
    }

    // build from lists of "on" step indices; out-of-range indices are ignored
    pub fn from_steps(kick: &[usize], snare: &[usize], hat: &[usize]) -> Self {
        let mut p = Self::empty();
        for (track, steps) in [(TrackId::Kick, kick), (TrackId::Snare, snare), (TrackId::Hat, hat)] {
            for &s in steps {
                if let Some(cell) = p.track_mut(track).get_mut(s) {
                    *cell = true;
                }
            }
        }
        p
    }

    pub fn track(&self, track: TrackId) -> &Steps {
        match track {
            TrackId::Kick => &self.kick,
            TrackId::Snare => &self.snare,
            TrackId::Hat => &self.hat,
        }
    }

    pub fn track_mut(&mut self, track: TrackId) -> &mut Steps {
        match track {
            TrackId::Kick => &mut self.kick,
            TrackId::Snare => &mut self.snare,
            TrackId::Hat => &mut self.hat,
        }
    }

    pub fn is_on(&self, track: TrackId, step: usize) -> bool {
        self.track(track).get(step).copied().unwrap_or(false)
    }

    pub fn toggle(&mut self, track: TrackId, step: usize) {
        if let Some(cell) = self.track_mut(track).get_mut(step) {
            *cell = !*cell;
        }
    }

    /// Tracks that fire at a grid column.
    pub fn tracks_at(&self, column: usize) -> TrackSet {
        let mut set = TrackSet::default();
        for track in TrackId::ALL {
            if self.is_on(track, column) {
                set.insert(track);
            }
        }
        set
    }

    #[cfg(test)]
    pub fn count_on(&self) -> usize {
        TrackId::ALL
            .iter()
            .map(|&t| self.track(t).iter().filter(|&&on| on).count())
            .sum()
    }
}

/// Small copyable set of tracks, so the audio thread can pass "what fires
/// on this step" around without allocating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackSet(u8);

impl TrackSet {
    pub fn insert(&mut self, track: TrackId) {
        self.0 |= 1 << track.index();
    }

    pub fn contains(self, track: TrackId) -> bool {
        self.0 & (1 << track.index()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = TrackId> {
        TrackId::ALL.into_iter().filter(move |&t| self.contains(t))
    }
}

/// The four patterns anchoring the pad corners.
/// Only ever changed by swapping a whole corner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corners {
    #[serde(rename = "A")]
    pub a: Pattern,
    #[serde(rename = "B")]
    pub b: Pattern,
    #[serde(rename = "C")]
    pub c: Pattern,
    #[serde(rename = "D")]
    pub d: Pattern,
}

impl Corners {
    pub fn new(patterns: [Pattern; NUM_CORNERS]) -> Self {
        let [a, b, c, d] = patterns;
        Self { a, b, c, d }
    }

    pub fn get(&self, id: CornerId) -> &Pattern {
        match id {
            CornerId::A => &self.a,
            CornerId::B => &self.b,
            CornerId::C => &self.c,
            CornerId::D => &self.d,
        }
    }

    pub fn replace(&mut self, id: CornerId, pattern: Pattern) {
        let slot = match id {
            CornerId::A => &mut self.a,
            CornerId::B => &mut self.b,
            CornerId::C => &mut self.c,
            CornerId::D => &mut self.d,
        };
        *slot = pattern;
    }
}

/// The pattern currently being played.
///
/// Written by the blend coordinator, read by the audio thread once per
/// block. Readers always see a whole pattern; `version` counts stores.
pub struct ActivePattern {
    current: ArcSwap<Pattern>,
    version: AtomicU64,
}

impl ActivePattern {
    pub fn new(initial: Pattern) -> Arc<Self> {
        Arc::new(Self {
            current: ArcSwap::from_pointee(initial),
            version: AtomicU64::new(0),
        })
    }

    pub fn load(&self) -> Arc<Pattern> {
        self.current.load_full()
    }

    /// For the audio callback; no refcount change per read.
    pub fn snapshot(&self) -> arc_swap::Guard<Arc<Pattern>> {
        self.current.load()
    }

    pub fn store(&self, pattern: Pattern) {
        self.current.store(Arc::new(pattern));
        self.version.fetch_add(1, Ordering::Release);
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
