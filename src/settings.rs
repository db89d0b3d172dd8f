use std::f32::consts::PI;

use crate::ik::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};

/// Engine-wide defaults for [`AnimationSystem`](crate::AnimationSystem).
///
/// # Example
///
/// ```rust
/// use ossein::AnimationSettings;
///
/// // Tighter IK for a close-up camera
/// let settings = AnimationSettings {
///     ik_tolerance: 0.001,
///     ik_max_iterations: 32,
///     ..Default::default()
/// };
/// assert!(settings.resolve_ik_after_blend);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSettings {
    // === IK ===
    /// Distance at which an IK chain counts as converged.
    ///
    /// Applied to chains created through the system.
    ///
    /// Default: `0.01`
    pub ik_tolerance: f32,

    /// Upper bound on solver passes per chain and tick.
    ///
    /// Default: `10`
    pub ik_max_iterations: u32,

    /// Largest rotation a CCD pass may apply to a single joint, in radians.
    ///
    /// Default: `π` (unclamped)
    pub ccd_max_step: f32,

    /// Run attached IK chains at the end of every `update`.
    ///
    /// When `false`, chains only move through explicit `solve_ik` calls.
    ///
    /// Default: `true`
    pub resolve_ik_after_blend: bool,

    // === State machines ===
    /// Cross-fade length used by forced transitions without an explicit duration.
    ///
    /// Default: `0.25`
    pub default_transition_duration: f32,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            ik_tolerance: DEFAULT_TOLERANCE,
            ik_max_iterations: DEFAULT_MAX_ITERATIONS,
            ccd_max_step: PI,
            resolve_ik_after_blend: true,
            default_transition_duration: 0.25,
        }
    }
}

impl AnimationSettings {
    #[must_use]
    pub fn with_ik_tolerance(mut self, tolerance: f32) -> Self {
        self.ik_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_ik_max_iterations(mut self, iterations: u32) -> Self {
        self.ik_max_iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_ccd_max_step(mut self, radians: f32) -> Self {
        self.ccd_max_step = radians;
        self
    }

    #[must_use]
    pub fn with_default_transition_duration(mut self, seconds: f32) -> Self {
        self.default_transition_duration = seconds;
        self
    }

    #[must_use]
    pub fn with_ik_after_blend(mut self, enabled: bool) -> Self {
        self.resolve_ik_after_blend = enabled;
        self
    }
}
