use glam::{Quat, Vec3};

use crate::animation::values::{HermiteInterpolatable, Interpolatable};
use crate::errors::{AnimationError, Result};
use crate::transform::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    /// No interpolation: holds the earlier keyframe until the next one.
    Step,
    Linear,
    /// Hermite on position/scale using per-key tangents. Rotation stays spherical.
    CubicHermite,
}

/// In/out tangents for cubic Hermite interpolation, in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeyframeTangents {
    pub in_position: Vec3,
    pub out_position: Vec3,
    pub in_scale: Vec3,
    pub out_scale: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub tangents: Option<KeyframeTangents>,
}

impl Keyframe {
    #[must_use]
    pub fn new(time: f32, position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            time,
            position,
            rotation,
            scale,
            tangents: None,
        }
    }

    #[must_use]
    pub fn from_transform(time: f32, transform: Transform) -> Self {
        Self::new(time, transform.position, transform.rotation, transform.scale)
    }

    #[must_use]
    pub fn with_tangents(mut self, tangents: KeyframeTangents) -> Self {
        self.tangents = Some(tangents);
        self
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation, self.scale)
    }
}

const MAX_SCAN_OFFSET: usize = 3;

/// Remembers the last keyframe interval so sequential sampling is O(1).
#[derive(Debug, Clone, Default)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

/// All keyframes animating one bone.
#[derive(Debug, Clone)]
pub struct BoneTrack {
    bone: usize,
    times: Vec<f32>,
    keys: Vec<Keyframe>,
    interpolation: InterpolationMode,
}

impl BoneTrack {
    /// Validates and builds a track.
    ///
    /// Rejects empty tracks and times that are not finite and strictly ascending.
    /// Rotations are normalized.
    pub fn new(bone: usize, mut keys: Vec<Keyframe>, interpolation: InterpolationMode) -> Result<Self> {
        if keys.is_empty() {
            return Err(AnimationError::EmptyTrack { bone });
        }

        for (index, key) in keys.iter().enumerate() {
            if !key.time.is_finite() {
                return Err(AnimationError::NonFiniteKeyframe { bone, index });
            }
            if index > 0 && key.time <= keys[index - 1].time {
                return Err(AnimationError::UnsortedKeyframes {
                    bone,
                    index,
                    time: key.time,
                });
            }
        }

        for key in &mut keys {
            key.rotation = key.rotation.normalize();
        }

        Ok(Self {
            bone,
            times: keys.iter().map(|k| k.time).collect(),
            keys,
            interpolation,
        })
    }

    #[inline]
    pub fn bone(&self) -> usize {
        self.bone
    }

    #[inline]
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keys
    }

    #[inline]
    pub fn interpolation(&self) -> InterpolationMode {
        self.interpolation
    }

    /// Time of the last keyframe.
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Stateless sampling (binary search).
    #[must_use]
    pub fn sample(&self, time: f32) -> Transform {
        if self.keys.len() == 1 {
            return self.keys[0].transform();
        }
        // partition_point finds the first index where t > time, i.e. next_index
        let next_idx = self.times.partition_point(|&t| t <= time);
        self.sample_at_frame(next_idx.saturating_sub(1), time)
    }

    /// Sampling with cursor: a short local scan around the last interval, falling
    /// back to binary search for large jumps (scrubbing, loop resets).
    pub fn sample_with_cursor(&self, time: f32, cursor: &mut KeyframeCursor) -> Transform {
        let len = self.times.len();
        // Fast path: static data (single keyframe)
        if len == 1 {
            return self.keys[0].transform();
        }

        let i = cursor.last_index.min(len - 1);
        let t_curr = self.times[i];

        let found_index = if time >= t_curr {
            // Forward playback: check [i, i+1), [i+1, i+2)...
            let mut res = None;
            for offset in 0..=MAX_SCAN_OFFSET {
                let idx = i + offset;
                if idx >= len - 1 {
                    if time >= self.times[len - 1] {
                        res = Some(len - 1);
                    }
                    break;
                }
                if time < self.times[idx + 1] {
                    res = Some(idx);
                    break;
                }
            }
            res
        } else {
            // Reverse playback: time < times[i], walk left until times[idx] <= time
            let mut res = None;
            for offset in 1..=MAX_SCAN_OFFSET {
                if i < offset {
                    break;
                }
                let idx = i - offset;
                if time >= self.times[idx] {
                    res = Some(idx);
                    break;
                }
            }
            res
        };

        let final_index = found_index.unwrap_or_else(|| {
            let next_idx = self.times.partition_point(|&t| t <= time);
            next_idx.saturating_sub(1)
        });
        cursor.last_index = final_index;

        self.sample_at_frame(final_index, time)
    }

    fn sample_at_frame(&self, index: usize, time: f32) -> Transform {
        let len = self.keys.len();

        // No next frame available: clamp to the last key
        if index >= len - 1 {
            return self.keys[len - 1].transform();
        }

        let k0 = &self.keys[index];
        let k1 = &self.keys[index + 1];
        let dt = k1.time - k0.time;

        // Zero-length or inverted intervals resolve to the earlier key
        let t = if dt > 1e-6 { (time - k0.time) / dt } else { 0.0 };
        let t = t.clamp(0.0, 1.0);

        match self.interpolation {
            InterpolationMode::Step => k0.transform(),
            InterpolationMode::Linear => Transform {
                position: Vec3::interpolate_linear(k0.position, k1.position, t),
                rotation: Quat::interpolate_linear(k0.rotation, k1.rotation, t),
                scale: Vec3::interpolate_linear(k0.scale, k1.scale, t),
            },
            InterpolationMode::CubicHermite => {
                let out0 = k0.tangents.unwrap_or_default();
                let in1 = k1.tangents.unwrap_or_default();
                Transform {
                    position: Vec3::interpolate_hermite(
                        k0.position,
                        out0.out_position,
                        in1.in_position,
                        k1.position,
                        t,
                        dt,
                    ),
                    rotation: Quat::interpolate_linear(k0.rotation, k1.rotation, t),
                    scale: Vec3::interpolate_hermite(k0.scale, out0.out_scale, in1.in_scale, k1.scale, t, dt),
                }
            }
        }
    }
}
