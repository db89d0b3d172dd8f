mod values;
pub mod tracks;
pub mod clip;
pub mod instance;
pub mod parameters;
pub mod blender;
pub mod blend_tree;
pub mod state_machine;
pub mod events;

pub use tracks::{BoneTrack, InterpolationMode, Keyframe, KeyframeCursor, KeyframeTangents};
pub use clip::{AnimationClip, ClipEvent, RootMotion};
pub use instance::{AnimationInstance, BlendMode, LoopMode, PlaybackEvent, PlaybackState};
pub use parameters::{ParamValue, Parameters};
pub use blender::{Pose, PoseBlender, PosePool};
pub use blend_tree::{BlendContext, BlendLayer, BlendNode};
pub use state_machine::{AnimationState, AnimationStateMachine, StateMachineEvent, StateMotion, Transition};
pub use events::{AnimationCommand, AnimationEvent, CommandQueue, EventHooks, HookId};
