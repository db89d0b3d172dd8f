//! Error Types
//!
//! This module defines the error type used for malformed animation data.
//!
//! # Overview
//!
//! [`AnimationError`] is only produced by constructors and registration calls
//! (skeleton building, track and clip construction, blend tree assembly, state
//! machine wiring and IK chain creation). Data is rejected once, at load time,
//! so the per-frame path never has to re-validate it.
//!
//! Per-frame lookups through [`AnimationSystem`](crate::AnimationSystem) do
//! not use this type: they return `Option`/`bool` and log a warning instead.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ossein::errors::{AnimationError, Result};
//!
//! fn build_rig() -> Result<()> {
//!     // Constructors that may reject data return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The error type for rejected animation data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    // ========================================================================
    // Skeleton Errors
    // ========================================================================
    /// A skeleton must contain at least one bone.
    #[error("Skeleton '{0}' has no bones")]
    EmptySkeleton(String),

    /// Bone 0 must be the root (no parent), and no other bone may be a root.
    #[error("Bone '{bone}' (index {index}) must {expectation}")]
    InvalidRoot {
        bone: String,
        index: usize,
        expectation: &'static str,
    },

    /// A parent index does not precede its child in the bone array.
    #[error("Bone '{bone}' (index {index}) has invalid parent index {parent}")]
    InvalidParent {
        bone: String,
        index: usize,
        parent: usize,
    },

    /// Two bones share the same name.
    #[error("Duplicate bone name: {0}")]
    DuplicateBoneName(String),

    /// A bone index is outside the skeleton.
    #[error("Bone index {index} out of range (skeleton has {count} bones)")]
    BoneOutOfRange { index: usize, count: usize },

    // ========================================================================
    // Track & Clip Errors
    // ========================================================================
    /// A track must hold at least one keyframe.
    #[error("Track for bone {bone} has no keyframes")]
    EmptyTrack { bone: usize },

    /// Keyframe times must be finite and strictly ascending.
    #[error("Track for bone {bone}: keyframe {index} at time {time} is not strictly after the previous key")]
    UnsortedKeyframes { bone: usize, index: usize, time: f32 },

    /// Keyframe time is NaN or infinite.
    #[error("Track for bone {bone}: keyframe {index} has a non-finite time")]
    NonFiniteKeyframe { bone: usize, index: usize },

    /// Clip duration must be finite and non-negative.
    #[error("Clip '{name}' has invalid duration {duration}")]
    InvalidDuration { name: String, duration: f32 },

    // ========================================================================
    // Blend Tree Errors
    // ========================================================================
    /// A blend node needs at least one child.
    #[error("Blend node over '{0}' has no children")]
    EmptyBlendNode(String),

    /// 1D thresholds must be strictly ascending.
    #[error("Blend1D over '{parameter}': threshold {threshold} at child {index} is not ascending")]
    UnsortedThresholds {
        parameter: String,
        index: usize,
        threshold: f32,
    },

    /// 2D child positions must be finite.
    #[error("Blend2D over '{parameters}': child {index} has a non-finite position")]
    NonFinitePosition { parameters: String, index: usize },

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// State name is not registered.
    #[error("Unknown animation state: {0}")]
    UnknownState(String),

    /// State name already registered.
    #[error("Duplicate animation state: {0}")]
    DuplicateState(String),

    // ========================================================================
    // IK Errors
    // ========================================================================
    /// IK chains need at least two bones.
    #[error("IK chain needs at least 2 bones, got {0}")]
    ChainTooShort(usize),

    /// Each chain bone must be the parent of the next one.
    #[error("IK chain is broken: bone {child} is not a child of bone {parent}")]
    ChainNotConnected { parent: usize, child: usize },

    /// The analytic two-bone solver needs exactly two links.
    #[error("Two-bone IK needs exactly 2 links, chain has {0}")]
    TwoBoneLinkCount(usize),
}

/// Alias for `Result<T, AnimationError>`.
pub type Result<T> = std::result::Result<T, AnimationError>;
