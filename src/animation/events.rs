//! Notifications and deferred commands.
//!
//! Instances and state machines only push [`AnimationEvent`]s into an outbox
//! while they update. The owner dispatches them to [`EventHooks`] after the
//! blend pass, and hooks answer with [`AnimationCommand`]s that are applied
//! once dispatch has finished. Nothing reenters the pipeline mid-tick.

use crate::system::{InstanceKey, MachineKey};

#[derive(Debug, Clone, PartialEq)]
pub enum AnimationEvent {
    /// A `LoopMode::Once` instance reached its end.
    Completed { instance: InstanceKey },
    /// A timeline marker was crossed.
    Marker {
        instance: InstanceKey,
        name: String,
        time: f32,
    },
    StateEntered { machine: MachineKey, state: String },
    StateExited { machine: MachineKey, state: String },
    TransitionStarted {
        machine: MachineKey,
        from: String,
        to: String,
    },
}

impl AnimationEvent {
    pub fn instance(&self) -> Option<InstanceKey> {
        match self {
            Self::Completed { instance } | Self::Marker { instance, .. } => Some(*instance),
            _ => None,
        }
    }

    pub fn machine(&self) -> Option<MachineKey> {
        match self {
            Self::StateEntered { machine, .. }
            | Self::StateExited { machine, .. }
            | Self::TransitionStarted { machine, .. } => Some(*machine),
            _ => None,
        }
    }
}

/// Control request queued by a hook.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationCommand {
    Play(InstanceKey),
    Pause(InstanceKey),
    Stop(InstanceKey),
    SetTime(InstanceKey, f32),
    SetSpeed(InstanceKey, f32),
    SetWeight(InstanceKey, f32),
    SetFloat {
        machine: MachineKey,
        name: String,
        value: f32,
    },
    SetBool {
        machine: MachineKey,
        name: String,
        value: bool,
    },
    SetTrigger { machine: MachineKey, name: String },
    ForceTransition {
        machine: MachineKey,
        state: String,
        duration: f32,
    },
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<AnimationCommand>,
}

impl CommandQueue {
    pub fn push(&mut self, command: AnimationCommand) {
        self.commands.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<AnimationCommand> {
        std::mem::take(&mut self.commands)
    }
}

pub type HookPredicate = Box<dyn Fn(&AnimationEvent) -> bool + Send>;
pub type HookAction = Box<dyn FnMut(&AnimationEvent, &mut CommandQueue) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

struct EventHook {
    id: HookId,
    predicate: HookPredicate,
    action: HookAction,
}

/// Ordered (predicate, action) pairs.
#[derive(Default)]
pub struct EventHooks {
    hooks: Vec<EventHook>,
    next_id: u64,
}

impl EventHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        predicate: impl Fn(&AnimationEvent) -> bool + Send + 'static,
        action: impl FnMut(&AnimationEvent, &mut CommandQueue) + Send + 'static,
    ) -> HookId {
        let id = HookId(self.next_id);
        self.next_id += 1;
        self.hooks.push(EventHook {
            id,
            predicate: Box::new(predicate),
            action: Box::new(action),
        });
        id
    }

    pub fn remove(&mut self, id: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|hook| hook.id != id);
        self.hooks.len() != before
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every matching hook for every event, in registration order.
    pub fn dispatch(&mut self, events: &[AnimationEvent], queue: &mut CommandQueue) {
        for event in events {
            for hook in &mut self.hooks {
                if (hook.predicate)(event) {
                    (hook.action)(event, queue);
                }
            }
        }
    }
}

impl std::fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHooks")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
