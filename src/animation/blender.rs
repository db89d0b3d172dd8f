//! Pose blending.
//!
//! Folds sampled clips into a per-bone local pose. Contributors are applied in
//! order and each one is weighted against the pose accumulated so far
//! (progressive blend), so a cross-fade whose weights move in opposite
//! directions stays continuous without a renormalization pass.

use crate::animation::clip::AnimationClip;
use crate::animation::instance::{AnimationInstance, BlendMode, PlaybackState};
use crate::skeleton::Skeleton;
use crate::transform::Transform;

/// One local transform per bone.
#[derive(Debug, Clone, Default)]
pub struct Pose {
    transforms: Vec<Transform>,
}

impl Pose {
    /// The skeleton's bind pose.
    #[must_use]
    pub fn bind(skeleton: &Skeleton) -> Self {
        let mut pose = Self::default();
        pose.reset_to_bind(skeleton);
        pose
    }

    /// Resizes to the skeleton and writes every bone's bind transform.
    pub fn reset_to_bind(&mut self, skeleton: &Skeleton) {
        self.transforms.clear();
        self.transforms
            .extend(skeleton.bones().iter().map(|bone| *bone.bind()));
    }

    /// Copies the skeleton's current local transforms.
    pub fn capture(&mut self, skeleton: &Skeleton) {
        self.transforms.clear();
        self.transforms
            .extend(skeleton.bones().iter().map(|bone| bone.local));
    }

    pub fn copy_from(&mut self, other: &Pose) {
        self.transforms.clear();
        self.transforms.extend_from_slice(&other.transforms);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    #[inline]
    pub fn get(&self, bone: usize) -> Option<&Transform> {
        self.transforms.get(bone)
    }

    #[inline]
    pub fn get_mut(&mut self, bone: usize) -> Option<&mut Transform> {
        self.transforms.get_mut(bone)
    }

    #[inline]
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }
}

/// Reusable scratch poses for nested blends.
///
/// Owned by whoever drives evaluation and passed down explicitly, so separate
/// skeletons never share buffers.
#[derive(Debug, Default)]
pub struct PosePool {
    free: Vec<Pose>,
}

impl PosePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a pose initialized to `skeleton`'s bind pose.
    pub fn acquire(&mut self, skeleton: &Skeleton) -> Pose {
        let mut pose = self.free.pop().unwrap_or_default();
        pose.reset_to_bind(skeleton);
        pose
    }

    pub fn release(&mut self, pose: Pose) {
        self.free.push(pose);
    }
}

pub struct PoseBlender;

impl PoseBlender {
    /// Folds one sampled bone transform into the running pose.
    pub fn blend_sample(
        pose: &mut Pose,
        skeleton: &Skeleton,
        bone: usize,
        sample: &Transform,
        weight: f32,
        mode: BlendMode,
    ) {
        let (Some(current), Some(bind)) = (pose.get_mut(bone), skeleton.bone(bone)) else {
            return;
        };
        *current = match mode {
            BlendMode::Replace => current.lerp(sample, weight),
            BlendMode::Additive => current.additive(sample, bind.bind(), weight),
        };
    }

    /// Samples every track of `clip` at `time` (stateless) and folds it in.
    pub fn apply_clip(
        pose: &mut Pose,
        skeleton: &Skeleton,
        clip: &AnimationClip,
        time: f32,
        weight: f32,
        mode: BlendMode,
    ) {
        for track in clip.tracks() {
            let sample = track.sample(time);
            Self::blend_sample(pose, skeleton, track.bone(), &sample, weight, mode);
        }
    }

    /// Samples one instance through its track cursors and folds it in.
    pub fn apply_instance(pose: &mut Pose, skeleton: &Skeleton, instance: &mut AnimationInstance) {
        let weight = instance.weight();
        let mode = instance.blend_mode;
        for track_index in 0..instance.clip().tracks().len() {
            if let Some((bone, sample)) = instance.sample_track(track_index) {
                Self::blend_sample(pose, skeleton, bone, &sample, weight, mode);
            }
        }
    }

    /// Blends the active instances into `pose`.
    ///
    /// Instances are ordered by layer, then priority (ascending, stable), so the
    /// highest-priority contributor of the top layer is applied last. Stopped
    /// and zero-weight instances are skipped; paused ones hold their pose.
    pub fn blend_instances(
        pose: &mut Pose,
        skeleton: &Skeleton,
        instances: &mut [&mut AnimationInstance],
    ) {
        instances.sort_by_key(|instance| (instance.layer, instance.priority));

        for instance in instances.iter_mut() {
            if instance.state() == PlaybackState::Stopped || instance.weight() <= 0.0 {
                continue;
            }
            Self::apply_instance(pose, skeleton, instance);
        }
    }

    /// Moves every bone of `target` towards `other` by `weight`.
    pub fn blend_poses(target: &mut Pose, other: &Pose, weight: f32) {
        for (current, sample) in target.transforms.iter_mut().zip(&other.transforms) {
            *current = current.lerp(sample, weight);
        }
    }

    /// Weighted average of whole poses, computed progressively: the i-th source
    /// is blended with `wᵢ / Σⱼ≤ᵢ wⱼ`. Zero weights are skipped, so `(1, 0)` and
    /// `(0, 1)` reproduce the respective source exactly. When every weight is
    /// zero, `target` is left untouched.
    pub fn blend_weighted(target: &mut Pose, sources: &[(&Pose, f32)]) {
        let mut total = 0.0_f32;
        for &(source, weight) in sources {
            if weight <= 0.0 {
                continue;
            }
            if total <= 0.0 {
                target.copy_from(source);
                total = weight;
                continue;
            }
            total += weight;
            Self::blend_poses(target, source, weight / total);
        }
    }
}
