use glam::{Quat, Vec3};

use crate::animation::tracks::BoneTrack;
use crate::errors::{AnimationError, Result};
use crate::skeleton::Skeleton;

/// A named marker on the clip timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipEvent {
    pub name: String,
    pub time: f32,
}

/// Translation/rotation delta, either accumulated over a whole clip or
/// extracted for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMotion {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl RootMotion {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[must_use]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation: rotation.normalize(),
        }
    }

    /// Portion of this delta covered by `fraction` of the clip. Negative
    /// fractions (reverse playback) produce the inverse motion.
    #[must_use]
    pub fn scaled(&self, fraction: f32) -> Self {
        let rotation = if fraction >= 0.0 {
            Quat::IDENTITY.slerp(self.rotation, fraction)
        } else {
            Quat::IDENTITY.slerp(self.rotation.inverse(), -fraction)
        };
        Self {
            translation: self.translation * fraction,
            rotation: rotation.normalize(),
        }
    }

    /// Appends `other` after `self`.
    #[must_use]
    pub fn then(&self, other: &Self) -> Self {
        Self {
            translation: self.translation + other.translation,
            rotation: (other.rotation * self.rotation).normalize(),
        }
    }
}

impl Default for RootMotion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Immutable, shareable animation data.
///
/// Clips are created once by the loading collaborator and handed around as
/// `Arc<AnimationClip>`. Bones without a track keep their bind pose.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    name: String,
    duration: f32,
    /// Authoring frame rate. Metadata only: sampling is time-based
    frame_rate: f32,
    looping: bool,
    tracks: Vec<BoneTrack>,
    events: Vec<ClipEvent>,
    root_motion: Option<RootMotion>,
}

impl AnimationClip {
    /// Creates a clip whose duration is the latest keyframe across all tracks.
    pub fn new(name: impl Into<String>, tracks: Vec<BoneTrack>) -> Self {
        let duration = tracks
            .iter()
            .map(BoneTrack::end_time)
            .fold(0.0_f32, f32::max);

        Self {
            name: name.into(),
            duration,
            frame_rate: 30.0,
            looping: false,
            tracks,
            events: Vec::new(),
            root_motion: None,
        }
    }

    /// Overrides the derived duration.
    pub fn with_duration(mut self, duration: f32) -> Result<Self> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(AnimationError::InvalidDuration {
                name: self.name,
                duration,
            });
        }
        self.duration = duration;
        Ok(self)
    }

    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: f32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    #[must_use]
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Adds a timeline marker, keeping markers sorted by time.
    #[must_use]
    pub fn with_event(mut self, name: impl Into<String>, time: f32) -> Self {
        let at = self.events.partition_point(|e| e.time <= time);
        self.events.insert(
            at,
            ClipEvent {
                name: name.into(),
                time,
            },
        );
        self
    }

    #[must_use]
    pub fn with_root_motion(mut self, root_motion: RootMotion) -> Self {
        self.root_motion = Some(root_motion);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    #[inline]
    pub fn tracks(&self) -> &[BoneTrack] {
        &self.tracks
    }

    #[inline]
    pub fn events(&self) -> &[ClipEvent] {
        &self.events
    }

    #[inline]
    pub fn root_motion(&self) -> Option<&RootMotion> {
        self.root_motion.as_ref()
    }

    /// Checks that every track targets a bone of `skeleton`.
    pub fn validate_for(&self, skeleton: &Skeleton) -> Result<()> {
        let count = skeleton.len();
        match self.tracks.iter().find(|t| t.bone() >= count) {
            Some(track) => Err(AnimationError::BoneOutOfRange {
                index: track.bone(),
                count,
            }),
            None => Ok(()),
        }
    }
}
