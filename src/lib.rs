#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod settings;
pub mod transform;
pub mod skeleton;
pub mod animation;
pub mod ik;
pub mod system;

pub use errors::{AnimationError, Result};
pub use settings::AnimationSettings;
pub use transform::Transform;
pub use skeleton::{Bone, BoneDesc, Skeleton};
pub use animation::{
    AnimationClip, AnimationCommand, AnimationEvent, AnimationInstance, AnimationState,
    AnimationStateMachine, BlendLayer, BlendMode, BlendNode, BoneTrack, InterpolationMode,
    Keyframe, LoopMode, Pose, PoseBlender, RootMotion, Transition,
};
pub use ik::{IkChain, IkOutcome, IkSolverKind};
pub use system::{AnimationSystem, ChainKey, InstanceKey, MachineKey, SkeletonKey};
