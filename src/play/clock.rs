use tracing::debug;

use crate::beat::TempoMap;
use crate::chart::{ItemKind, TimelineItem};
use crate::traits::{SystemTimeProvider, TimeProvider};

/// Offset subtracted from the raw elapsed time each tick, in milliseconds.
/// Compensates for the fixed latency between the counter epoch and audible
/// playback actually starting.
pub const DEFAULT_OFFSET_MS: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
    Paused,
}

/// A skip extracted from the timeline: `beat_duration` musical beats
/// compressed into `skip_time` wall-clock seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkipEvent {
    pub abs_beat: f64,
    pub beat_duration: f64,
    pub skip_time: f64,
}

impl SkipEvent {
    /// Extract the skip payload from a timeline item; `None` for other kinds.
    pub fn from_item(item: &TimelineItem) -> Option<Self> {
        match item.kind {
            ItemKind::Skip { skip_time } => Some(Self {
                abs_beat: item.abs_beat,
                beat_duration: item.beat_duration(),
                skip_time,
            }),
            _ => None,
        }
    }
}

/// Skip sub-state while a skip window is open. `compressed_spb` is the
/// seconds-per-beat used during the time-warping phase; `end_time` is when
/// the window closes and the normal formula takes over again.
#[derive(Debug, Clone, Copy)]
struct ActiveSkip {
    start_time: f64,
    start_beat: f64,
    beat_duration: f64,
    skip_time: f64,
    compressed_spb: f64,
    end_time: f64,
}

/// Converts wall-clock samples into musical beat position under a tempo map,
/// applying active skips and BPM-interpolation windows.
///
/// The host polls [`PlaybackClock::update`] once per frame while running.
/// Single-writer: owned by exactly one edit session, no internal locking.
pub struct PlaybackClock<T: TimeProvider = SystemTimeProvider> {
    time: T,
    state: ClockState,
    epoch_us: i64,
    pause_epoch_us: i64,
    offset_ms: f64,

    abs_time: f64,
    abs_beat: f64,

    current_section: usize,
    seconds_per_beat: f64,
    prev_section_beats: f64,
    prev_section_time: f64,

    bpm_interpolating: bool,
    bpm_interpolate_start: f64,
    bpm_interpolate_end: f64,

    skips: Vec<SkipEvent>,
    current_skip: usize,
    active_skip: Option<ActiveSkip>,
}

impl Default for PlaybackClock<SystemTimeProvider> {
    fn default() -> Self {
        Self::new(SystemTimeProvider::new())
    }
}

impl<T: TimeProvider> PlaybackClock<T> {
    pub fn new(time: T) -> Self {
        Self {
            time,
            state: ClockState::Stopped,
            epoch_us: 0,
            pause_epoch_us: 0,
            offset_ms: DEFAULT_OFFSET_MS,
            abs_time: 0.0,
            abs_beat: 0.0,
            current_section: 0,
            seconds_per_beat: 0.5,
            prev_section_beats: 0.0,
            prev_section_time: 0.0,
            bpm_interpolating: false,
            bpm_interpolate_start: 0.0,
            bpm_interpolate_end: 0.0,
            skips: Vec::new(),
            current_skip: 0,
            active_skip: None,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn abs_time(&self) -> f64 {
        self.abs_time
    }

    pub fn abs_beat(&self) -> f64 {
        self.abs_beat
    }

    pub fn current_section(&self) -> usize {
        self.current_section
    }

    pub fn is_skipping(&self) -> bool {
        self.active_skip.is_some()
    }

    pub fn set_offset_ms(&mut self, offset_ms: f64) {
        self.offset_ms = offset_ms;
    }

    pub fn time_provider(&self) -> &T {
        &self.time
    }

    /// Replace the active skip list (typically collected from the timeline's
    /// skip lane). The list is sorted by `abs_beat` and the cursor re-resolved.
    pub fn set_skips(&mut self, mut skips: Vec<SkipEvent>) {
        skips.sort_by(|a, b| a.abs_beat.total_cmp(&b.abs_beat));
        self.skips = skips;
        self.reset_current_skip();
    }

    /// Reset the clock epoch to now and begin running from the chart origin.
    pub fn start(&mut self, map: &TempoMap) {
        self.epoch_us = self.time.now_us();
        self.state = ClockState::Running;
        self.abs_time = 0.0;
        self.abs_beat = 0.0;
        self.current_section = 0;
        self.prev_section_beats = 0.0;
        self.prev_section_time = 0.0;
        self.seconds_per_beat = map
            .segments()
            .first()
            .map(|s| s.seconds_per_beat())
            .unwrap_or(0.5);
        self.bpm_interpolating = false;
        self.active_skip = None;
        self.current_skip = 0;
        self.reset_current_skip();
        debug!("playback started");
    }

    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
        self.active_skip = None;
        debug!("playback stopped");
    }

    /// Freeze the clock. `abs_time` stops advancing until unpaused.
    pub fn pause(&mut self) {
        if self.state == ClockState::Running {
            self.pause_epoch_us = self.time.now_us();
            self.state = ClockState::Paused;
        }
    }

    /// Resume after a pause, shifting the epoch by the pause duration so the
    /// time computation never sees the gap.
    pub fn unpause(&mut self) {
        if self.state == ClockState::Paused {
            self.epoch_us += self.time.now_us() - self.pause_epoch_us;
            self.state = ClockState::Running;
        }
    }

    /// One polling tick. Recomputes `abs_time`/`abs_beat`, commits tempo
    /// section switches, and opens skip windows as their beats are passed.
    /// Returns the current absolute beat.
    pub fn update(&mut self, map: &TempoMap) -> f64 {
        if self.state != ClockState::Running {
            return self.abs_beat;
        }

        self.abs_time = self.time.elapsed_secs(self.epoch_us) - self.offset_ms / 1000.0;

        self.update_beat();
        self.advance_section(map);
        self.activate_skip();

        self.abs_beat
    }

    /// The BPM in effect right now, linearly ramped while inside the next
    /// segment's interpolation window.
    pub fn current_bpm(&self, map: &TempoMap) -> f64 {
        let segments = map.segments();
        let Some(current) = segments.get(self.current_section) else {
            return 60.0 / self.seconds_per_beat;
        };
        if !self.bpm_interpolating {
            return current.bpm;
        }
        let Some(next) = segments.get(self.current_section + 1) else {
            return current.bpm;
        };
        let window_start = next.abs_beat_start - next.interpolate_beat_duration;
        let progress =
            ((self.abs_beat - window_start) / next.interpolate_beat_duration).clamp(0.0, 1.0);
        self.bpm_interpolate_start + (self.bpm_interpolate_end - self.bpm_interpolate_start) * progress
    }

    /// Seek to an absolute song time. The epoch is recomputed so subsequent
    /// ticks behave as if playback had proceeded naturally to this point.
    pub fn set_song_time_position(&mut self, abs_time: f64, map: &TempoMap) {
        let now = self.time.now_us();
        self.epoch_us = now - ((abs_time + self.offset_ms / 1000.0) * 1_000_000.0) as i64;
        if self.state == ClockState::Paused {
            self.pause_epoch_us = now;
        }
        self.abs_time = abs_time;

        let segments = map.segments();
        self.current_section = segments
            .partition_point(|s| s.abs_time_start <= abs_time)
            .saturating_sub(1);
        if let Some(seg) = segments.get(self.current_section) {
            self.prev_section_beats = seg.abs_beat_start;
            self.prev_section_time = seg.abs_time_start;
            self.seconds_per_beat = seg.seconds_per_beat();
        }
        self.bpm_interpolating = false;
        self.abs_beat =
            self.prev_section_beats + (self.abs_time - self.prev_section_time) / self.seconds_per_beat;
        self.active_skip = None;
        self.reset_current_skip();
        debug!(abs_time, abs_beat = self.abs_beat, "seeked by time");
    }

    /// Seek to an absolute beat by mapping it through the tempo map.
    pub fn set_song_beat_position(&mut self, abs_beat: f64, map: &TempoMap) {
        let segments = map.segments();
        let idx = segments
            .partition_point(|s| s.abs_beat_start <= abs_beat)
            .saturating_sub(1);
        let abs_time = match segments.get(idx) {
            Some(seg) => {
                seg.abs_time_start + (abs_beat - seg.abs_beat_start) * seg.seconds_per_beat()
            }
            None => abs_beat * self.seconds_per_beat,
        };
        self.set_song_time_position(abs_time, map);
    }

    /// Re-resolve the skip cursor to the first skip at or past the current
    /// beat, discarding any open skip window.
    pub fn reset_current_skip(&mut self) {
        let beat = self.abs_beat;
        self.current_skip = self.skips.partition_point(|s| s.abs_beat < beat);
        self.active_skip = None;
    }

    fn update_beat(&mut self) {
        if let Some(skip) = self.active_skip {
            let into = self.abs_time - skip.start_time;
            if into < skip.skip_time {
                // Time-warping phase: beats advance at the compressed rate.
                self.abs_beat = skip.start_beat + into / skip.compressed_spb;
                return;
            }
            if self.abs_time < skip.end_time {
                // Time-warped phase: hold at the skip's end beat until the
                // window's natural duration has fully elapsed.
                self.abs_beat = skip.start_beat + skip.beat_duration;
                return;
            }
            self.active_skip = None;
        }
        self.abs_beat =
            self.prev_section_beats + (self.abs_time - self.prev_section_time) / self.seconds_per_beat;
    }

    fn advance_section(&mut self, map: &TempoMap) {
        let segments = map.segments();
        while self.current_section + 1 < segments.len() {
            let next = segments[self.current_section + 1];

            if !self.bpm_interpolating
                && next.interpolate_beat_duration > 0.0
                && self.abs_beat >= next.abs_beat_start - next.interpolate_beat_duration
            {
                self.bpm_interpolating = true;
                self.bpm_interpolate_start = segments[self.current_section].bpm;
                self.bpm_interpolate_end = next.bpm;
            }

            if self.abs_time >= next.abs_time_start {
                self.current_section += 1;
                self.prev_section_beats = next.abs_beat_start;
                self.prev_section_time = next.abs_time_start;
                self.seconds_per_beat = next.seconds_per_beat();
                self.bpm_interpolating = false;
                debug!(section = self.current_section, bpm = next.bpm, "tempo section committed");
            } else {
                break;
            }
        }
    }

    fn activate_skip(&mut self) {
        if self.active_skip.is_some() || self.current_skip >= self.skips.len() {
            return;
        }
        let event = self.skips[self.current_skip];
        if self.abs_beat < event.abs_beat {
            return;
        }

        // Natural duration of the spanned beats; the declared skip time may
        // not exceed it, only compress it.
        let natural = event.beat_duration * self.seconds_per_beat;
        let skip_time = event.skip_time.clamp(0.0, natural);
        let compressed_spb = if event.beat_duration > 0.0 {
            skip_time / event.beat_duration
        } else {
            0.0
        };
        // Freeze the reference wall-time at the skip's declared beat rather
        // than the polling instant, so the window closes exactly where the
        // normal formula resumes.
        let start_time = self.prev_section_time
            + (event.abs_beat - self.prev_section_beats) * self.seconds_per_beat;
        self.active_skip = Some(ActiveSkip {
            start_time,
            start_beat: event.abs_beat,
            beat_duration: event.beat_duration,
            skip_time,
            compressed_spb,
            end_time: start_time + natural,
        });
        self.current_skip += 1;
        debug!(beat = event.abs_beat, skip_time, "skip window opened");
    }
}
