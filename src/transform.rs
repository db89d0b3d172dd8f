use glam::{Affine3A, Mat4, Quat, Vec3};

/// Local TRS transform of a bone.
///
/// Bind poses, sampled keyframes and blended poses all use this
/// representation. Matrices are only built when the hierarchy is propagated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    #[inline]
    #[must_use]
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    #[inline]
    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Decomposes an affine matrix.
    ///
    /// Shear is lost during decomposition.
    #[must_use]
    pub fn from_affine(mat: &Affine3A) -> Self {
        let (scale, rotation, position) = mat.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Interpolates towards `other`: lerp for position/scale, slerp for rotation.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.slerp(other.rotation, t).normalize(),
            scale: self.scale.lerp(other.scale, t),
        }
    }

    /// Layers the delta between `sample` and `reference` on top of `self`.
    ///
    /// Position adds the offset, rotation post-multiplies `reference⁻¹ · sample`,
    /// scale multiplies by the per-axis ratio. All three are scaled by `weight`.
    #[must_use]
    pub fn additive(&self, sample: &Self, reference: &Self, weight: f32) -> Self {
        let position = self.position + (sample.position - reference.position) * weight;

        let delta_rotation = (reference.rotation.inverse() * sample.rotation).normalize();
        let rotation =
            (self.rotation * Quat::IDENTITY.slerp(delta_rotation, weight)).normalize();

        let ratio = safe_ratio(sample.scale, reference.scale);
        let scale = self.scale * Vec3::ONE.lerp(ratio, weight);

        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Checks that every component is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn safe_ratio(num: Vec3, den: Vec3) -> Vec3 {
    let axis = |n: f32, d: f32| if d.abs() > f32::EPSILON { n / d } else { 1.0 };
    Vec3::new(axis(num.x, den.x), axis(num.y, den.y), axis(num.z, den.z))
}
