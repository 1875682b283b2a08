use crate::engine::interpolate::Interpolate;

/// A single timestamped value. Time is measured in ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Key<V> {
    pub time: f64,
    pub value: V,
}

/// Keys for a single attribute, always sorted by time.
#[derive(Clone, Debug, Default)]
pub struct Track<V: Interpolate> {
    keys: Vec<Key<V>>,
}

impl<V: Interpolate> Track<V> {
    pub fn from_keys(keys: impl IntoIterator<Item = (f64, V)>) -> Self {
        let mut track = Self { keys: Vec::new() };
        for (time, value) in keys {
            track.insert(time, value);
        }
        track
    }

    #[inline]
    pub fn keys(&self) -> &[Key<V>] {
        &self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Return the time of the last key.
    #[inline]
    pub fn last_time(&self) -> Option<f64> {
        self.keys.last().map(|k| k.time)
    }

    pub fn insert(&mut self, time: f64, value: V) {
        match self.keys.binary_search_by(|k| k.time.total_cmp(&time)) {
            Ok(i) => self.keys[i].value = value,                // last wins
            Err(i) => self.keys.insert(i, Key { time, value }), // keep sorted
        }
    }

    /// Start walking the keys of this track in time order. `total_ticks` is the length of the
    /// clip the track belongs to and `fallback` is returned when the track has no keys at all.
    pub fn cursor(&self, total_ticks: f64, fallback: V) -> TrackCursor<'_, V> {
        TrackCursor {
            keys: &self.keys,
            index: 0,
            total_ticks,
            fallback,
        }
    }
}

/// Walks a [Track] key by key while it is merged with other tracks.
///
/// The cursor points at the "current" key, the next one that has not been reached yet. The
/// "previous" key is the one before it, wrapping around to the last key of the track when the
/// cursor is at the start, so the clip is treated as cyclic.
pub struct TrackCursor<'a, V> {
    keys: &'a [Key<V>],
    index: usize,
    total_ticks: f64,
    fallback: V,
}

impl<V: Interpolate> TrackCursor<'_, V> {
    /// Time of the current key. Tracks with a single key (or none) hold their value and report
    /// the end of the clip, as does a track that has been walked to the end.
    pub fn current_time(&self) -> f64 {
        if self.keys.len() <= 1 || self.index >= self.keys.len() {
            self.total_ticks
        } else {
            self.keys[self.index].time
        }
    }

    /// No more keys to reach.
    pub fn is_finished(&self) -> bool {
        self.keys.len() <= 1 || self.index >= self.keys.len()
    }

    /// Interpolation factor between the previous and current key at `time`, computed from this
    /// track's own key spacing.
    pub fn factor(&self, time: f64) -> f64 {
        let len = self.keys.len();
        if len <= 1 {
            return 0.0;
        }

        let current = self.index.min(len - 1);
        let previous = (current + len - 1) % len;

        let previous_time = self.keys[previous].time;

        let mut span = self.keys[current].time - previous_time;
        if span < 0.0 {
            span += self.total_ticks;
        }

        let mut elapsed = time - previous_time;
        if elapsed < 0.0 {
            elapsed += self.total_ticks;
        }

        if span <= 0.0 {
            1.0
        } else {
            (elapsed / span).clamp(0.0, 1.0)
        }
    }

    /// Value of the track at `time`.
    pub fn sample(&self, time: f64) -> V {
        match self.keys.len() {
            0 => self.fallback,
            1 => self.keys[0].value,
            len => {
                let current = self.index.min(len - 1);
                let previous = (current + len - 1) % len;
                V::interpolate(
                    self.keys[previous].value,
                    self.keys[current].value,
                    self.factor(time) as f32,
                )
            }
        }
    }

    /// Move past the current key if it has been reached at `time`.
    pub fn advance(&mut self, time: f64) {
        if self.index < self.keys.len() && self.keys[self.index].time <= time {
            self.index += 1;
        }
    }
}
