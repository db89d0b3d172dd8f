use std::sync::Arc;

use crate::animation::clip::{AnimationClip, ClipEvent, RootMotion};
use crate::animation::tracks::KeyframeCursor;
use crate::transform::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Play to the boundary, stop and report completion.
    Once,
    /// Wrap around, carrying the overshoot into the next cycle.
    Loop,
    /// Reverse direction at each boundary.
    PingPong,
    /// Hold the boundary pose while staying in the playing state.
    ClampForever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Blend towards the sample, weighted against the running pose.
    Replace,
    /// Add the sample's offset from bind pose on top of the running pose.
    Additive,
}

/// Upper bound on full cycles scanned for markers in a single tick.
const MAX_MARKER_WRAPS: u32 = 4;

/// Notification produced by [`AnimationInstance::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Completed,
    Marker { name: String, time: f32 },
}

/// One playback cursor over a shared clip.
#[derive(Debug, Clone)]
pub struct AnimationInstance {
    name: String,
    clip: Arc<AnimationClip>,

    time: f32,
    speed: f32,
    weight: f32,
    state: PlaybackState,

    pub loop_mode: LoopMode,
    pub blend_mode: BlendMode,
    pub layer: i32,
    pub priority: i32,

    /// Markers registered on this instance only; the shared clip stays untouched
    events: Vec<ClipEvent>,
    pending: Vec<PlaybackEvent>,
    /// Set after clamping onto a boundary, so a marker there is not fired twice
    exclude_start: bool,

    root_motion_enabled: bool,
    root_motion_delta: RootMotion,

    pub(crate) track_cursors: Vec<KeyframeCursor>,
}

impl AnimationInstance {
    #[must_use]
    pub fn new(name: impl Into<String>, clip: Arc<AnimationClip>) -> Self {
        let track_count = clip.tracks().len();
        let loop_mode = if clip.is_looping() {
            LoopMode::Loop
        } else {
            LoopMode::Once
        };
        Self {
            name: name.into(),
            clip,
            time: 0.0,
            speed: 1.0,
            weight: 1.0,
            state: PlaybackState::Stopped,
            loop_mode,
            blend_mode: BlendMode::Replace,
            layer: 0,
            priority: 0,
            events: Vec::new(),
            pending: Vec::new(),
            exclude_start: false,
            root_motion_enabled: false,
            root_motion_delta: RootMotion::IDENTITY,
            // One cursor per track
            track_cursors: vec![KeyframeCursor::default(); track_count],
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    #[inline]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Current time divided by clip duration (0 for empty clips).
    pub fn normalized_time(&self) -> f32 {
        let duration = self.clip.duration();
        if duration > 0.0 { self.time / duration } else { 0.0 }
    }

    // ========================================================================
    // Playback control
    // ========================================================================

    /// Resumes from the current time.
    pub fn play(&mut self) {
        self.state = PlaybackState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Rewinds to 0 and stops.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.time = 0.0;
        self.exclude_start = false;
        self.root_motion_delta = RootMotion::IDENTITY;
    }

    /// Jumps to `time`, clamped to the clip range.
    pub fn set_time(&mut self, time: f32) {
        self.time = time.clamp(0.0, self.clip.duration());
        self.exclude_start = false;
    }

    /// Sets the signed playback speed. Negative values play in reverse.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Sets the blend weight, clamped to [0, 1].
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    /// Registers a marker on this instance.
    pub fn register_event(&mut self, time: f32, name: impl Into<String>) {
        let at = self.events.partition_point(|e| e.time <= time);
        self.events.insert(
            at,
            ClipEvent {
                name: name.into(),
                time,
            },
        );
    }

    pub fn set_root_motion_enabled(&mut self, enabled: bool) {
        self.root_motion_enabled = enabled;
        if !enabled {
            self.root_motion_delta = RootMotion::IDENTITY;
        }
    }

    #[inline]
    pub fn root_motion_enabled(&self) -> bool {
        self.root_motion_enabled
    }

    /// Root motion extracted during the last update.
    #[inline]
    pub fn root_motion_delta(&self) -> RootMotion {
        self.root_motion_delta
    }

    /// Hands the notifications produced since the last call to the owner.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, PlaybackEvent> {
        self.pending.drain(..)
    }

    // ========================================================================
    // Core logic: advance time
    // ========================================================================

    pub fn update(&mut self, dt: f32) {
        self.root_motion_delta = RootMotion::IDENTITY;
        if self.state != PlaybackState::Playing {
            return;
        }

        let duration = self.clip.duration();
        if duration <= 0.0 {
            return;
        }

        let old = self.time;
        let step = dt * self.speed;
        let mut new = old + step;
        let mut traveled = step;
        let exclude_start = std::mem::take(&mut self.exclude_start);

        if step >= 0.0 {
            if new >= duration && self.loop_mode != LoopMode::Loop {
                self.collect_forward(old, duration, exclude_start, old < duration);
                traveled = duration - old;
                new = duration;
                self.on_boundary();
            } else if new >= duration {
                let wraps = (new / duration).floor().max(1.0);
                let mut cursor = old;
                let mut skip = exclude_start;
                for _ in 0..(wraps as u32).min(MAX_MARKER_WRAPS) {
                    self.collect_forward(cursor, duration, skip, false);
                    skip = false;
                    cursor = 0.0;
                }
                // Keep the overshoot so uneven steps do not judder
                new = (new - duration * wraps).max(0.0);
                self.collect_forward(cursor, new, skip, false);
            } else {
                self.collect_forward(old, new, exclude_start, false);
            }
        } else if new <= 0.0 && self.loop_mode != LoopMode::Loop {
            self.collect_backward(0.0, old, exclude_start, old > 0.0);
            traveled = -old;
            new = 0.0;
            self.on_boundary();
        } else if new < 0.0 {
            let wraps = (-new / duration).ceil().max(1.0);
            let mut cursor = old;
            let mut skip = exclude_start;
            for _ in 0..(wraps as u32).min(MAX_MARKER_WRAPS) {
                self.collect_backward(0.0, cursor, skip, true);
                // `duration` and 0 are the same point on a loop; 0 already fired
                skip = true;
                cursor = duration;
            }
            new = (new + duration * wraps).min(duration);
            self.collect_backward(new, cursor, skip, false);
        } else {
            self.collect_backward(new, old, exclude_start, false);
        }

        self.time = new;

        if self.root_motion_enabled {
            if let Some(total) = self.clip.root_motion() {
                self.root_motion_delta = total.scaled(traveled / duration);
            }
        }
    }

    /// Applies the loop policy after the cursor was clamped onto a boundary.
    fn on_boundary(&mut self) {
        self.exclude_start = true;
        match self.loop_mode {
            LoopMode::Once => {
                self.state = PlaybackState::Stopped;
                self.pending.push(PlaybackEvent::Completed);
            }
            LoopMode::PingPong => {
                self.speed = -self.speed;
            }
            LoopMode::ClampForever | LoopMode::Loop => {}
        }
    }

    /// Markers in `[from, to)`, or `(from, to)` when `exclude_from`, plus `to`
    /// itself when `include_to`. Emitted in ascending time order.
    fn collect_forward(&mut self, from: f32, to: f32, exclude_from: bool, include_to: bool) {
        let hit = |t: f32| {
            let after_start = if exclude_from { t > from } else { t >= from };
            after_start && (t < to || (include_to && t == to))
        };
        let mut fired: Vec<&ClipEvent> = self
            .clip
            .events()
            .iter()
            .chain(self.events.iter())
            .filter(|e| hit(e.time))
            .collect();
        fired.sort_by(|a, b| a.time.total_cmp(&b.time));
        let fired: Vec<PlaybackEvent> = fired
            .into_iter()
            .map(|e| PlaybackEvent::Marker {
                name: e.name.clone(),
                time: e.time,
            })
            .collect();
        self.pending.extend(fired);
    }

    /// Markers in `(from, to]`, or `(from, to)` when `exclude_to`, plus `from`
    /// itself when `include_from`. Emitted in descending time order.
    fn collect_backward(&mut self, from: f32, to: f32, exclude_to: bool, include_from: bool) {
        let hit = |t: f32| {
            let before_start = if exclude_to { t < to } else { t <= to };
            before_start && (t > from || (include_from && t == from))
        };
        let mut fired: Vec<&ClipEvent> = self
            .clip
            .events()
            .iter()
            .chain(self.events.iter())
            .filter(|e| hit(e.time))
            .collect();
        fired.sort_by(|a, b| b.time.total_cmp(&a.time));
        let fired: Vec<PlaybackEvent> = fired
            .into_iter()
            .map(|e| PlaybackEvent::Marker {
                name: e.name.clone(),
                time: e.time,
            })
            .collect();
        self.pending.extend(fired);
    }

    /// Samples track `track_index` of the clip at the current time.
    ///
    /// Returns the targeted bone and the sampled local transform.
    pub fn sample_track(&mut self, track_index: usize) -> Option<(usize, Transform)> {
        let track = self.clip.tracks().get(track_index)?;
        let cursor = self.track_cursors.get_mut(track_index)?;
        Some((track.bone(), track.sample_with_cursor(self.time, cursor)))
    }
}
