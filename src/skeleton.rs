use glam::{Affine3A, Mat4, Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::animation::blender::Pose;
use crate::errors::{AnimationError, Result};
use crate::transform::Transform;

/// Bone description handed in by the asset pipeline.
#[derive(Debug, Clone)]
pub struct BoneDesc {
    pub name: String,
    pub parent: Option<usize>,
    /// Rest pose, relative to the parent bone
    pub bind: Transform,
    /// Precomputed inverse bind matrix. Derived from the bind hierarchy when `None`.
    pub inverse_bind: Option<Affine3A>,
}

impl BoneDesc {
    #[must_use]
    pub fn new(name: impl Into<String>, parent: Option<usize>, bind: Transform) -> Self {
        Self {
            name: name.into(),
            parent,
            bind,
            inverse_bind: None,
        }
    }

    #[must_use]
    pub fn with_inverse_bind(mut self, inverse_bind: Affine3A) -> Self {
        self.inverse_bind = Some(inverse_bind);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Bone {
    pub(crate) name: String,
    pub(crate) parent: Option<usize>,
    pub(crate) bind: Transform,
    pub(crate) inverse_bind: Affine3A,
    pub(crate) children: Vec<usize>,

    // === Runtime Data ===
    /// Current local pose, written by the blender and IK solvers
    pub local: Transform,
    pub(crate) world: Affine3A,
}

impl Bone {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[inline]
    pub fn bind(&self) -> &Transform {
        &self.bind
    }

    #[inline]
    pub fn inverse_bind(&self) -> &Affine3A {
        &self.inverse_bind
    }

    #[inline]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    #[inline]
    pub fn world(&self) -> &Affine3A {
        &self.world
    }

    #[inline]
    pub fn world_position(&self) -> Vec3 {
        self.world.translation.into()
    }

    pub fn world_rotation(&self) -> Quat {
        self.world.to_scale_rotation_translation().1
    }
}

/// Bone hierarchy stored as a flat, parent-before-child array.
///
/// Topology is fixed at construction. Only the local/world transforms and the
/// skinning matrices change from frame to frame.
#[derive(Debug, Clone)]
pub struct Skeleton {
    name: String,
    bones: Vec<Bone>,
    bone_index: FxHashMap<String, usize>,

    // Final skinning matrices (`world * inverse_bind`), one per bone.
    // Data flow: data here -> renderer uploads it as-is
    joint_matrices: Vec<Mat4>,
}

impl Skeleton {
    /// Builds a skeleton from bone descriptions.
    ///
    /// Bone 0 must be the only root and every other bone must reference a parent
    /// with a lower index, so hierarchy updates run in a single forward pass.
    pub fn new(name: impl Into<String>, descs: Vec<BoneDesc>) -> Result<Self> {
        let name = name.into();
        if descs.is_empty() {
            return Err(AnimationError::EmptySkeleton(name));
        }

        let mut bone_index = FxHashMap::default();
        let mut bones: Vec<Bone> = Vec::with_capacity(descs.len());
        let mut bind_worlds: Vec<Affine3A> = Vec::with_capacity(descs.len());

        for (index, desc) in descs.into_iter().enumerate() {
            match (index, desc.parent) {
                (0, Some(_)) => {
                    return Err(AnimationError::InvalidRoot {
                        bone: desc.name,
                        index,
                        expectation: "be the root (no parent)",
                    });
                }
                (0, None) => {}
                (_, None) => {
                    return Err(AnimationError::InvalidRoot {
                        bone: desc.name,
                        index,
                        expectation: "have a parent (only bone 0 may be the root)",
                    });
                }
                (_, Some(parent)) if parent >= index => {
                    return Err(AnimationError::InvalidParent {
                        bone: desc.name,
                        index,
                        parent,
                    });
                }
                (_, Some(_)) => {}
            }

            if bone_index.insert(desc.name.clone(), index).is_some() {
                return Err(AnimationError::DuplicateBoneName(desc.name));
            }

            let local_bind = desc.bind.to_affine();
            let bind_world = match desc.parent {
                Some(parent) => bind_worlds[parent] * local_bind,
                None => local_bind,
            };
            bind_worlds.push(bind_world);

            if let Some(parent) = desc.parent {
                bones[parent].children.push(index);
            }

            bones.push(Bone {
                inverse_bind: desc.inverse_bind.unwrap_or_else(|| bind_world.inverse()),
                name: desc.name,
                parent: desc.parent,
                bind: desc.bind,
                children: Vec::new(),
                local: desc.bind,
                world: bind_world,
            });
        }

        let count = bones.len();
        let mut skeleton = Self {
            name,
            bones,
            bone_index,
            joint_matrices: vec![Mat4::IDENTITY; count],
        };
        skeleton.update_world_transforms();

        log::debug!("Built skeleton '{}' with {} bones", skeleton.name, count);
        Ok(skeleton)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Root bone index (always 0).
    #[inline]
    pub fn root(&self) -> usize {
        0
    }

    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    #[inline]
    pub fn bone_mut(&mut self, index: usize) -> Option<&mut Bone> {
        self.bones.get_mut(index)
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bone_index.get(name).copied()
    }

    pub fn world_position(&self, index: usize) -> Option<Vec3> {
        self.bones.get(index).map(Bone::world_position)
    }

    /// Current world-space distance between a bone and its parent.
    pub fn bone_length(&self, index: usize) -> Option<f32> {
        let bone = self.bones.get(index)?;
        let parent = self.bones.get(bone.parent?)?;
        Some(bone.world_position().distance(parent.world_position()))
    }

    /// Restores every bone's local transform to its bind pose.
    pub fn reset_to_bind_pose(&mut self) {
        for bone in &mut self.bones {
            bone.local = bone.bind;
        }
    }

    /// Copies a blended pose into the bones' local transforms.
    ///
    /// Extra entries in `pose` are ignored; missing ones keep their current value.
    pub fn apply_pose(&mut self, pose: &Pose) {
        for (bone, transform) in self.bones.iter_mut().zip(pose.transforms()) {
            bone.local = *transform;
        }
    }

    /// Propagates local transforms down the hierarchy and rebuilds skinning matrices.
    pub fn update_world_transforms(&mut self) {
        for i in 0..self.bones.len() {
            self.refresh_bone_world(i);
        }
    }

    /// Recomputes one bone's world transform from its parent's current world
    /// transform, and its skinning matrix.
    pub(crate) fn refresh_bone_world(&mut self, index: usize) {
        let local = self.bones[index].local.to_affine();
        let world = match self.bones[index].parent {
            Some(parent) => self.bones[parent].world * local,
            None => local,
        };
        let bone = &mut self.bones[index];
        bone.world = world;
        self.joint_matrices[index] = Mat4::from(world * bone.inverse_bind);
    }

    /// Final bone matrices, one per bone in array order.
    #[inline]
    pub fn bone_matrices(&self) -> &[Mat4] {
        &self.joint_matrices
    }

    /// Raw bytes of [`Self::bone_matrices`], ready for a GPU buffer upload.
    #[inline]
    pub fn bone_matrix_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.joint_matrices)
    }
}
