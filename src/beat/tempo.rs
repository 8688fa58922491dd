use tracing::debug;

use super::BeatPos;
use crate::error::ChartError;

/// One row of the tempo map: a contiguous run of constant BPM and time
/// signature starting at `beat_pos`.
///
/// `abs_beat_start` and `abs_time_start` are derived from the preceding
/// segment and are recomputed by [`TempoMap::recalculate`] after every
/// structural change; they are never assigned independently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoSegment {
    pub beat_pos: BeatPos,
    pub beats_per_measure: i32,
    pub bpm: f64,
    /// Beats before `abs_beat_start` over which the BPM ramps from the
    /// previous segment's value to this one's. Zero means an instant change.
    pub interpolate_beat_duration: f64,
    pub abs_beat_start: f64,
    pub abs_time_start: f64,
}

/// Fallback used when a chart carries no tempo rows: 4/4 at 120 BPM from the origin.
const FALLBACK_SEGMENT: TempoSegment = TempoSegment {
    beat_pos: BeatPos::ZERO,
    beats_per_measure: 4,
    bpm: 120.0,
    interpolate_beat_duration: 0.0,
    abs_beat_start: 0.0,
    abs_time_start: 0.0,
};

impl TempoSegment {
    pub fn new(
        beat_pos: BeatPos,
        beats_per_measure: i32,
        bpm: f64,
        interpolate_beat_duration: f64,
    ) -> Self {
        Self {
            beat_pos,
            beats_per_measure,
            bpm,
            interpolate_beat_duration,
            abs_beat_start: 0.0,
            abs_time_start: 0.0,
        }
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }
}

/// Ordered tempo map. Invariant: segments strictly increasing by `beat_pos`,
/// derived fields consistent with that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TempoMap {
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from unsorted rows. Fails on duplicate positions and on
    /// rows whose numbers make the derived fields meaningless.
    pub fn from_segments(mut segments: Vec<TempoSegment>) -> Result<Self, ChartError> {
        for seg in &segments {
            if !seg.bpm.is_finite() || seg.bpm <= 0.0 {
                return Err(ChartError::InvalidTempoMap(format!(
                    "bpm must be positive, got {} at measure {}",
                    seg.bpm, seg.beat_pos.measure
                )));
            }
            if seg.beats_per_measure <= 0 {
                return Err(ChartError::InvalidTempoMap(format!(
                    "beats per measure must be positive, got {} at measure {}",
                    seg.beats_per_measure, seg.beat_pos.measure
                )));
            }
            if !seg.interpolate_beat_duration.is_finite() || seg.interpolate_beat_duration < 0.0 {
                return Err(ChartError::InvalidTempoMap(format!(
                    "interpolation window must be non-negative, got {} at measure {}",
                    seg.interpolate_beat_duration, seg.beat_pos.measure
                )));
            }
        }
        segments.sort_by(|a, b| a.beat_pos.cmp(&b.beat_pos));
        for pair in segments.windows(2) {
            if pair[0].beat_pos == pair[1].beat_pos {
                return Err(ChartError::InvalidTempoMap(format!(
                    "duplicate segment at measure {} ({}/{})",
                    pair[1].beat_pos.measure, pair[1].beat_pos.split, pair[1].beat_pos.measure_split
                )));
            }
        }
        let mut map = Self { segments };
        map.recalculate();
        Ok(map)
    }

    /// Insert a segment, replacing any existing one at the same position.
    pub fn insert(&mut self, segment: TempoSegment) {
        if let Some(existing) = self
            .segments
            .iter_mut()
            .find(|s| s.beat_pos == segment.beat_pos)
        {
            *existing = segment;
        } else {
            self.segments.push(segment);
            self.segments.sort_by(|a, b| a.beat_pos.cmp(&b.beat_pos));
        }
        self.recalculate();
        debug!(
            bpm = segment.bpm,
            measure = segment.beat_pos.measure,
            "tempo segment updated"
        );
    }

    /// Remove the segment at `pos`, if any. The first segment cannot be removed.
    pub fn remove(&mut self, pos: BeatPos) -> Option<TempoSegment> {
        let idx = self.segments.iter().position(|s| s.beat_pos == pos)?;
        if idx == 0 {
            return None;
        }
        let removed = self.segments.remove(idx);
        self.recalculate();
        Some(removed)
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Recompute each segment's absolute beat/time baseline from its predecessor.
    fn recalculate(&mut self) {
        for i in 0..self.segments.len() {
            if i == 0 {
                self.segments[0].abs_beat_start = 0.0;
                self.segments[0].abs_time_start = 0.0;
                continue;
            }
            let prev = self.segments[i - 1];
            let seg = &mut self.segments[i];
            let measures = (seg.beat_pos - prev.beat_pos).as_measures();
            seg.abs_beat_start = prev.abs_beat_start + measures * prev.beats_per_measure as f64;
            seg.abs_time_start = prev.abs_time_start
                + (seg.abs_beat_start - prev.abs_beat_start) * prev.seconds_per_beat();
        }
    }
}

/// Absolute beat of `pos` under the given tempo map.
///
/// Walks the segment list, accumulating `beats_per_measure`-scaled measure
/// distance while `pos` lies at or past the next segment; the remainder uses
/// the last segment entered.
pub fn calculate_abs_beat(pos: BeatPos, segments: &[TempoSegment]) -> f64 {
    let mut prev = segments.first().unwrap_or(&FALLBACK_SEGMENT);
    let mut abs_beat = 0.0;
    for seg in segments.iter().skip(1) {
        if pos >= seg.beat_pos {
            abs_beat += (seg.beat_pos - prev.beat_pos).as_measures() * prev.beats_per_measure as f64;
            prev = seg;
        } else {
            break;
        }
    }
    abs_beat + (pos - prev.beat_pos).as_measures() * prev.beats_per_measure as f64
}

/// Inverse of [`calculate_abs_beat`]: resolve an absolute beat into a
/// position at the `beat_split` denominator.
///
/// The sub-measure split rounds half up (`+0.5` then floor); this matches the
/// snap behavior editors rely on for grid placement, so keep it exact.
pub fn calculate_beat_pos(abs_beat: f64, beat_split: i64, segments: &[TempoSegment]) -> BeatPos {
    let mut prev = segments.first().unwrap_or(&FALLBACK_SEGMENT);
    for seg in segments.iter().skip(1) {
        if abs_beat >= seg.abs_beat_start {
            prev = seg;
        } else {
            break;
        }
    }
    let measures_in =
        (abs_beat - prev.abs_beat_start) / prev.beats_per_measure as f64 + prev.beat_pos.as_measures();
    let measure = measures_in.floor();
    let split = ((measures_in - measure) * beat_split as f64 + 0.5).floor() as i64;
    BeatPos::new(measure as i64, beat_split, split)
}
