//! Inverse kinematics on a parent-linked bone chain.
//!
//! Solvers run on the blended pose: they read current world transforms, rotate
//! chain bones in place (local rotation plus world transform of the chain
//! bones only) and leave the rest of the hierarchy to the caller. Run
//! [`Skeleton::update_world_transforms`] afterwards to bring descendants of the
//! chain up to date.

use std::f32::consts::PI;

use glam::{Quat, Vec3};
use smallvec::SmallVec;

use crate::errors::{AnimationError, Result};
use crate::skeleton::Skeleton;

pub const DEFAULT_TOLERANCE: f32 = 0.01;
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Below this, lengths and angles are treated as zero.
const DEGENERATE_EPSILON: f32 = 1e-6;

type Joints = SmallVec<[Vec3; 8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IkSolverKind {
    /// Analytic law-of-cosines solve for exactly two links.
    TwoBone,
    /// Cyclic coordinate descent.
    #[default]
    Ccd,
    /// Forward and backward reaching.
    Fabrik,
}

/// Result of one [`IkChain::solve`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkOutcome {
    /// Solver passes performed (the analytic solver always reports 1).
    pub iterations: u32,
    /// Remaining distance between end effector and target.
    pub distance: f32,
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct IkChain {
    /// Chain bones from the chain root to the last bone; each one is the
    /// parent of the next.
    bones: SmallVec<[usize; 8]>,
    /// End effector offset in the last bone's space. Adds one link when set.
    effector_offset: Option<Vec3>,

    pub kind: IkSolverKind,
    /// Chains without a target are left alone by [`Self::solve`].
    pub target: Option<Vec3>,
    pub tolerance: f32,
    pub max_iterations: u32,
    /// CCD: largest rotation applied to one joint per pass, in radians.
    pub max_step: f32,
}

impl IkChain {
    /// Validates a chain against `skeleton`.
    ///
    /// The chain needs at least two bones, each one the direct parent of the
    /// next. `effector_offset` places the end effector in the last bone's
    /// local space and adds one link; without it the last bone is the
    /// effector. The chain starts without a target.
    pub fn new(
        skeleton: &Skeleton,
        bones: &[usize],
        kind: IkSolverKind,
        effector_offset: Option<Vec3>,
    ) -> Result<Self> {
        if bones.len() < 2 {
            return Err(AnimationError::ChainTooShort(bones.len()));
        }
        for &bone in bones {
            if bone >= skeleton.len() {
                return Err(AnimationError::BoneOutOfRange {
                    index: bone,
                    count: skeleton.len(),
                });
            }
        }
        for pair in bones.windows(2) {
            let (parent, child) = (pair[0], pair[1]);
            if skeleton.bones()[child].parent() != Some(parent) {
                return Err(AnimationError::ChainNotConnected { parent, child });
            }
        }

        let chain = Self {
            bones: bones.iter().copied().collect(),
            effector_offset,
            kind,
            target: None,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_step: PI,
        };
        chain.check_link_count()?;
        Ok(chain)
    }

    #[must_use]
    pub fn with_target(mut self, target: Vec3) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[inline]
    pub fn bones(&self) -> &[usize] {
        &self.bones
    }

    #[inline]
    pub fn effector_offset(&self) -> Option<Vec3> {
        self.effector_offset
    }

    /// Number of rigid segments between joints, including the effector link.
    /// Equals the number of chain bones whose rotation moves the effector.
    pub fn link_count(&self) -> usize {
        self.bones.len() - 1 + usize::from(self.effector_offset.is_some())
    }

    fn check_link_count(&self) -> Result<()> {
        if self.kind == IkSolverKind::TwoBone && self.link_count() != 2 {
            return Err(AnimationError::TwoBoneLinkCount(self.link_count()));
        }
        Ok(())
    }

    pub fn effector_position(&self, skeleton: &Skeleton) -> Vec3 {
        let last = &skeleton.bones()[self.bones[self.bones.len() - 1]];
        match self.effector_offset {
            Some(offset) => last.world().transform_point3(offset),
            None => last.world_position(),
        }
    }

    /// World positions of every joint plus the effector.
    fn joints(&self, skeleton: &Skeleton) -> Joints {
        let mut joints: Joints = self
            .bones
            .iter()
            .map(|&bone| skeleton.bones()[bone].world_position())
            .collect();
        if self.effector_offset.is_some() {
            joints.push(self.effector_position(skeleton));
        }
        joints
    }

    /// Moves the chain towards [`Self::target`].
    ///
    /// Expects current world transforms on the chain bones. Without a target
    /// the pose is left untouched and the outcome reports zero iterations.
    pub fn solve(&self, skeleton: &mut Skeleton) -> IkOutcome {
        const SKIPPED: IkOutcome = IkOutcome {
            iterations: 0,
            distance: f32::INFINITY,
            converged: false,
        };

        let Some(target) = self.target else {
            return SKIPPED;
        };
        if self.bones.iter().any(|&bone| bone >= skeleton.len()) {
            log::warn!("IK chain does not fit skeleton '{}', skipping", skeleton.name());
            return SKIPPED;
        }

        let start = self.effector_position(skeleton).distance(target);
        if start <= self.tolerance {
            return self.outcome(skeleton, target, 0);
        }

        match self.kind {
            IkSolverKind::TwoBone => self.solve_two_bone(skeleton, target),
            IkSolverKind::Ccd => self.solve_ccd(skeleton, target),
            IkSolverKind::Fabrik => self.solve_fabrik(skeleton, target),
        }
    }

    fn outcome(&self, skeleton: &Skeleton, target: Vec3, iterations: u32) -> IkOutcome {
        let distance = self.effector_position(skeleton).distance(target);
        IkOutcome {
            iterations,
            distance,
            converged: distance <= self.tolerance,
        }
    }

    // ========================================================================
    // Two-bone analytic
    // ========================================================================

    fn solve_two_bone(&self, skeleton: &mut Skeleton, target: Vec3) -> IkOutcome {
        let joints = self.joints(skeleton);
        let (a, b, c) = (joints[0], joints[1], joints[2]);

        let upper = a.distance(b);
        let lower = b.distance(c);
        if upper < DEGENERATE_EPSILON || lower < DEGENERATE_EPSILON {
            log::debug!("Two-bone IK on a zero-length link, leaving pose as is");
            return self.outcome(skeleton, target, 1);
        }

        // Unreachable targets clamp to full extension (or full fold)
        let reach = a
            .distance(target)
            .clamp((upper - lower).abs(), upper + lower);

        let cos_desired =
            ((upper * upper + lower * lower - reach * reach) / (2.0 * upper * lower)).clamp(-1.0, 1.0);
        let desired = cos_desired.acos();
        let current = angle_between(a - b, c - b);

        let axis = bend_axis(a, b, c, target);
        let bend = Quat::from_axis_angle(axis, current - desired);
        self.rotate_link(skeleton, 1, bend);

        // Swing the whole chain so the effector points at the target
        let effector = self.effector_position(skeleton);
        if let (Some(from), Some(to)) = ((effector - a).try_normalize(), (target - a).try_normalize()) {
            self.rotate_link(skeleton, 0, Quat::from_rotation_arc(from, to));
        }

        self.outcome(skeleton, target, 1)
    }

    // ========================================================================
    // CCD
    // ========================================================================

    fn solve_ccd(&self, skeleton: &mut Skeleton, target: Vec3) -> IkOutcome {
        let mut iterations = 0;

        while iterations < self.max_iterations {
            if self.effector_position(skeleton).distance(target) <= self.tolerance {
                break;
            }
            iterations += 1;

            for link in (0..self.link_count()).rev() {
                let joint = skeleton.bones()[self.bones[link]].world_position();
                let to_effector = self.effector_position(skeleton) - joint;
                let to_target = target - joint;

                let length_product = to_effector.length() * to_target.length();
                if length_product < DEGENERATE_EPSILON {
                    continue;
                }

                let cos = (to_effector.dot(to_target) / length_product).clamp(-1.0, 1.0);
                let angle = cos.acos().min(self.max_step);
                if angle < DEGENERATE_EPSILON {
                    continue;
                }

                let axis = to_effector
                    .cross(to_target)
                    .try_normalize()
                    .unwrap_or_else(|| to_effector.normalize().any_orthonormal_vector());
                self.rotate_link(skeleton, link, Quat::from_axis_angle(axis, angle));
            }
        }

        self.outcome(skeleton, target, iterations)
    }

    // ========================================================================
    // FABRIK
    // ========================================================================

    fn solve_fabrik(&self, skeleton: &mut Skeleton, target: Vec3) -> IkOutcome {
        let mut joints = self.joints(skeleton);
        let last = joints.len() - 1;

        let lengths: SmallVec<[f32; 8]> = joints.windows(2).map(|p| p[0].distance(p[1])).collect();
        // Used when two joints collapse onto each other
        let rest_dirs: Joints = joints
            .windows(2)
            .map(|p| (p[1] - p[0]).try_normalize().unwrap_or(Vec3::Y))
            .collect();
        let total: f32 = lengths.iter().sum();
        let root = joints[0];

        let mut iterations = 0;
        if root.distance(target) >= total {
            // Out of reach: lay the chain out straight towards the target
            let dir = (target - root).try_normalize().unwrap_or(rest_dirs[0]);
            for i in 0..last {
                joints[i + 1] = joints[i] + dir * lengths[i];
            }
            iterations = 1;
        } else {
            while iterations < self.max_iterations {
                if joints[last].distance(target) <= self.tolerance {
                    break;
                }
                iterations += 1;

                // Backward: pin the effector to the target
                joints[last] = target;
                for i in (0..last).rev() {
                    let dir = (joints[i] - joints[i + 1])
                        .try_normalize()
                        .unwrap_or(-rest_dirs[i]);
                    joints[i] = joints[i + 1] + dir * lengths[i];
                }

                // Forward: pin the root back
                joints[0] = root;
                for i in 0..last {
                    let dir = (joints[i + 1] - joints[i])
                        .try_normalize()
                        .unwrap_or(rest_dirs[i]);
                    joints[i + 1] = joints[i] + dir * lengths[i];
                }
            }
        }

        // Turn solved positions into rotations, root first
        for link in 0..self.link_count() {
            let pivot = skeleton.bones()[self.bones[link]].world_position();
            let child = self.joint_position(skeleton, link + 1);
            let from = (child - pivot).try_normalize();
            let to = (joints[link + 1] - pivot).try_normalize();
            if let (Some(from), Some(to)) = (from, to) {
                self.rotate_link(skeleton, link, Quat::from_rotation_arc(from, to));
            }
        }

        self.outcome(skeleton, target, iterations)
    }

    /// Current world position of joint `index` (the effector is the last joint).
    fn joint_position(&self, skeleton: &Skeleton, index: usize) -> Vec3 {
        match self.bones.get(index) {
            Some(&bone) => skeleton.bones()[bone].world_position(),
            None => self.effector_position(skeleton),
        }
    }

    /// Applies a world-space rotation to chain bone `link` and refreshes the
    /// world transforms of it and every chain bone below it.
    fn rotate_link(&self, skeleton: &mut Skeleton, link: usize, delta: Quat) {
        let bone_index = self.bones[link];
        let bone = &skeleton.bones()[bone_index];
        let world_rotation = bone.world_rotation();
        let parent_rotation = bone
            .parent()
            .map_or(Quat::IDENTITY, |parent| skeleton.bones()[parent].world_rotation());

        let local = (parent_rotation.inverse() * delta * world_rotation).normalize();
        if let Some(bone) = skeleton.bone_mut(bone_index) {
            bone.local.rotation = local;
        }
        for &bone in &self.bones[link..] {
            skeleton.refresh_bone_world(bone);
        }
    }
}

/// Angle between two vectors, 0 when either is degenerate.
fn angle_between(a: Vec3, b: Vec3) -> f32 {
    match (a.try_normalize(), b.try_normalize()) {
        (Some(a), Some(b)) => a.dot(b).clamp(-1.0, 1.0).acos(),
        _ => 0.0,
    }
}

/// Axis about which rotating the lower link opens the elbow at `b`.
///
/// Uses the plane of the current bend; a straight chain falls back to the
/// plane containing the target, then to any perpendicular.
fn bend_axis(a: Vec3, b: Vec3, c: Vec3, target: Vec3) -> Vec3 {
    (c - b)
        .cross(a - b)
        .try_normalize()
        .or_else(|| (c - a).cross(target - a).try_normalize())
        .unwrap_or_else(|| (c - a).normalize_or(Vec3::X).any_orthonormal_vector())
}
