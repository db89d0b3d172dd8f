//! Name-addressed facade over skeletons, clips, instances, state machines and
//! IK chains.
//!
//! Lookups by name never fail loudly: unknown names yield `None`/`false` and a
//! `warn!` log line, since gameplay code queries these every frame.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::animation::blender::{Pose, PoseBlender, PosePool};
use crate::animation::clip::{AnimationClip, RootMotion};
use crate::animation::events::{
    AnimationCommand, AnimationEvent, CommandQueue, EventHooks, HookId,
};
use crate::animation::instance::{AnimationInstance, BlendMode, PlaybackEvent};
use crate::animation::state_machine::{AnimationStateMachine, StateMachineEvent};
use crate::ik::{IkChain, IkOutcome, IkSolverKind};
use crate::settings::AnimationSettings;
use crate::skeleton::Skeleton;

new_key_type! {
    pub struct SkeletonKey;
    pub struct InstanceKey;
    pub struct MachineKey;
    pub struct ChainKey;
}

struct SkeletonSlot {
    skeleton: Skeleton,
    /// Blend target, reused every tick
    pose: Pose,
}

struct InstanceSlot {
    skeleton: SkeletonKey,
    instance: AnimationInstance,
    /// Creation order; ties between equal (layer, priority) blend in this order
    sequence: u64,
}

struct MachineSlot {
    skeleton: SkeletonKey,
    machine: AnimationStateMachine,
}

struct ChainSlot {
    skeleton: SkeletonKey,
    chain: IkChain,
    enabled: bool,
    last_outcome: Option<IkOutcome>,
}

/// Owns every animation object and runs the per-tick pipeline.
///
/// Per skeleton, [`AnimationSystem::update`] runs: state machine update →
/// instance time advance → reset to bind pose → machine pose as base →
/// instances blended on top → hierarchy propagation → IK → hierarchy refresh.
/// Events collected along the way are then dispatched to hooks, and the
/// commands those hooks queued are applied last.
#[derive(Default)]
pub struct AnimationSystem {
    settings: AnimationSettings,

    skeletons: SlotMap<SkeletonKey, SkeletonSlot>,
    skeleton_names: FxHashMap<String, SkeletonKey>,

    clips: FxHashMap<String, Arc<AnimationClip>>,

    instances: SlotMap<InstanceKey, InstanceSlot>,
    instance_names: FxHashMap<String, InstanceKey>,
    next_instance_sequence: u64,

    machines: SlotMap<MachineKey, MachineSlot>,
    machine_names: FxHashMap<String, MachineKey>,

    chains: SlotMap<ChainKey, ChainSlot>,
    chain_names: FxHashMap<String, ChainKey>,

    hooks: EventHooks,
    commands: CommandQueue,
    /// Events of the tick in progress
    pending: Vec<AnimationEvent>,
    /// Events dispatched by the last update
    dispatched: Vec<AnimationEvent>,

    pool: PosePool,
}

impl AnimationSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: AnimationSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    #[inline]
    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    #[inline]
    pub fn settings_mut(&mut self) -> &mut AnimationSettings {
        &mut self.settings
    }

    // ========================================================================
    // Skeletons
    // ========================================================================

    /// Registers a skeleton under its own name, replacing (and tearing down)
    /// any previous skeleton with that name.
    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> SkeletonKey {
        let name = skeleton.name().to_string();
        if self.skeleton_names.contains_key(&name) {
            log::info!("Replacing skeleton '{name}'");
            self.remove_skeleton(&name);
        }

        let pose = Pose::bind(&skeleton);
        let key = self.skeletons.insert(SkeletonSlot { skeleton, pose });
        log::info!("Added skeleton '{name}'");
        self.skeleton_names.insert(name, key);
        key
    }

    pub fn skeleton_key(&self, name: &str) -> Option<SkeletonKey> {
        let key = self.skeleton_names.get(name).copied();
        if key.is_none() {
            log::warn!("Skeleton '{name}' not found");
        }
        key
    }

    pub fn skeleton(&self, name: &str) -> Option<&Skeleton> {
        let key = self.skeleton_key(name)?;
        self.skeletons.get(key).map(|slot| &slot.skeleton)
    }

    pub fn skeleton_mut(&mut self, name: &str) -> Option<&mut Skeleton> {
        let key = self.skeleton_key(name)?;
        self.skeletons.get_mut(key).map(|slot| &mut slot.skeleton)
    }

    /// Removes a skeleton together with the instances, state machines and IK
    /// chains bound to it.
    pub fn remove_skeleton(&mut self, name: &str) -> bool {
        let Some(key) = self.skeleton_names.remove(name) else {
            log::warn!("Cannot remove skeleton '{name}': not found");
            return false;
        };
        self.skeletons.remove(key);

        self.instances.retain(|_, slot| slot.skeleton != key);
        self.instance_names
            .retain(|_, instance| self.instances.contains_key(*instance));
        self.machines.retain(|_, slot| slot.skeleton != key);
        self.machine_names
            .retain(|_, machine| self.machines.contains_key(*machine));
        self.chains.retain(|_, slot| slot.skeleton != key);
        self.chain_names
            .retain(|_, chain| self.chains.contains_key(*chain));

        log::info!("Removed skeleton '{name}'");
        true
    }

    /// Final skinning matrices of a skeleton, one per bone in array order.
    pub fn bone_matrices(&self, skeleton: &str) -> Option<&[Mat4]> {
        self.skeleton(skeleton).map(Skeleton::bone_matrices)
    }

    // ========================================================================
    // Clips
    // ========================================================================

    /// Registers a clip under its own name and returns the shared handle.
    pub fn add_clip(&mut self, clip: impl Into<Arc<AnimationClip>>) -> Arc<AnimationClip> {
        let clip = clip.into();
        let name = clip.name().to_string();
        if self.clips.insert(name.clone(), Arc::clone(&clip)).is_some() {
            log::info!("Replaced clip '{name}'");
        } else {
            log::info!("Added clip '{name}' ({:.3}s)", clip.duration());
        }
        clip
    }

    pub fn clip(&self, name: &str) -> Option<Arc<AnimationClip>> {
        let clip = self.clips.get(name).cloned();
        if clip.is_none() {
            log::warn!("Clip '{name}' not found");
        }
        clip
    }

    /// Unregisters a clip. Instances already playing it keep their handle.
    pub fn remove_clip(&mut self, name: &str) -> bool {
        if self.clips.remove(name).is_some() {
            log::info!("Removed clip '{name}'");
            true
        } else {
            log::warn!("Cannot remove clip '{name}': not found");
            false
        }
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Creates a stopped instance of `clip` bound to `skeleton`.
    pub fn create_instance(&mut self, name: &str, clip: &str, skeleton: &str) -> Option<InstanceKey> {
        if self.instance_names.contains_key(name) {
            log::warn!("Instance '{name}' already exists");
            return None;
        }
        let clip = self.clip(clip)?;
        let skeleton_key = self.skeleton_key(skeleton)?;

        if let Err(e) = clip.validate_for(&self.skeletons[skeleton_key].skeleton) {
            log::error!("Cannot bind clip '{}' to skeleton '{skeleton}': {e}", clip.name());
            return None;
        }

        let key = self.instances.insert(InstanceSlot {
            skeleton: skeleton_key,
            instance: AnimationInstance::new(name, clip),
            sequence: self.next_instance_sequence,
        });
        self.next_instance_sequence += 1;
        self.instance_names.insert(name.to_string(), key);
        log::info!("Created animation instance '{name}'");
        Some(key)
    }

    pub fn instance_key(&self, name: &str) -> Option<InstanceKey> {
        let key = self.instance_names.get(name).copied();
        if key.is_none() {
            log::warn!("Animation instance '{name}' not found");
        }
        key
    }

    pub fn instance(&self, name: &str) -> Option<&AnimationInstance> {
        let key = self.instance_key(name)?;
        self.instances.get(key).map(|slot| &slot.instance)
    }

    pub fn instance_mut(&mut self, name: &str) -> Option<&mut AnimationInstance> {
        let key = self.instance_key(name)?;
        self.instances.get_mut(key).map(|slot| &mut slot.instance)
    }

    /// Removes the instance; it no longer contributes from the next blend on.
    pub fn destroy_instance(&mut self, name: &str) -> bool {
        let Some(key) = self.instance_names.remove(name) else {
            log::warn!("Cannot destroy animation instance '{name}': not found");
            return false;
        };
        self.instances.remove(key);
        log::info!("Destroyed animation instance '{name}'");
        true
    }

    fn with_instance(&mut self, name: &str, f: impl FnOnce(&mut AnimationInstance)) -> bool {
        match self.instance_mut(name) {
            Some(instance) => {
                f(instance);
                true
            }
            None => false,
        }
    }

    pub fn play(&mut self, name: &str) -> bool {
        self.with_instance(name, AnimationInstance::play)
    }

    pub fn pause(&mut self, name: &str) -> bool {
        self.with_instance(name, AnimationInstance::pause)
    }

    pub fn stop(&mut self, name: &str) -> bool {
        self.with_instance(name, AnimationInstance::stop)
    }

    pub fn set_time(&mut self, name: &str, time: f32) -> bool {
        self.with_instance(name, |i| i.set_time(time))
    }

    pub fn set_speed(&mut self, name: &str, speed: f32) -> bool {
        self.with_instance(name, |i| i.set_speed(speed))
    }

    pub fn set_weight(&mut self, name: &str, weight: f32) -> bool {
        self.with_instance(name, |i| i.set_weight(weight))
    }

    pub fn set_blend_mode(&mut self, name: &str, mode: BlendMode) -> bool {
        self.with_instance(name, |i| i.blend_mode = mode)
    }

    /// Assigns weights to several instances at once and starts those that
    /// are not playing. Both slices must have the same length.
    pub fn blend_animations(&mut self, names: &[&str], weights: &[f32]) -> bool {
        if names.len() != weights.len() {
            log::error!(
                "blend_animations: {} instance names but {} weights",
                names.len(),
                weights.len()
            );
            return false;
        }

        let mut all_found = true;
        for (name, &weight) in names.iter().zip(weights) {
            all_found &= self.with_instance(name, |i| {
                i.set_weight(weight);
                if !i.is_playing() {
                    i.play();
                }
            });
        }
        all_found
    }

    pub fn enable_root_motion(&mut self, name: &str, enabled: bool) -> bool {
        self.with_instance(name, |i| i.set_root_motion_enabled(enabled))
    }

    /// Root motion extracted by the instance during the last update.
    pub fn root_motion_delta(&self, name: &str) -> Option<RootMotion> {
        self.instance(name).map(AnimationInstance::root_motion_delta)
    }

    /// Adds a named marker at `time` on one instance's timeline.
    pub fn register_event(&mut self, instance: &str, time: f32, marker: &str) -> bool {
        self.with_instance(instance, |i| i.register_event(time, marker))
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Registers a generic hook. `action` runs for every event accepted by
    /// `predicate`, after the blend pass of the tick that produced it.
    pub fn add_hook(
        &mut self,
        predicate: impl Fn(&AnimationEvent) -> bool + Send + 'static,
        action: impl FnMut(&AnimationEvent, &mut CommandQueue) + Send + 'static,
    ) -> HookId {
        self.hooks.add(predicate, action)
    }

    pub fn remove_hook(&mut self, id: HookId) -> bool {
        self.hooks.remove(id)
    }

    /// Runs `action` whenever `instance` crosses the marker `marker`.
    pub fn on_event(
        &mut self,
        instance: &str,
        marker: &str,
        action: impl FnMut(&AnimationEvent, &mut CommandQueue) + Send + 'static,
    ) -> Option<HookId> {
        let key = self.instance_key(instance)?;
        let marker = marker.to_string();
        Some(self.hooks.add(
            move |event| {
                matches!(event, AnimationEvent::Marker { instance, name, .. }
                    if *instance == key && *name == marker)
            },
            action,
        ))
    }

    /// Runs `action` when a play-once `instance` reaches its end.
    pub fn on_complete(
        &mut self,
        instance: &str,
        action: impl FnMut(&AnimationEvent, &mut CommandQueue) + Send + 'static,
    ) -> Option<HookId> {
        let key = self.instance_key(instance)?;
        Some(self.hooks.add(
            move |event| matches!(event, AnimationEvent::Completed { instance } if *instance == key),
            action,
        ))
    }

    /// Events dispatched during the last [`Self::update`].
    pub fn last_events(&self) -> &[AnimationEvent] {
        &self.dispatched
    }

    // ========================================================================
    // State machines
    // ========================================================================

    /// Creates an empty state machine driving `skeleton`'s base pose. A
    /// skeleton is driven by at most one machine.
    pub fn create_state_machine(&mut self, name: &str, skeleton: &str) -> Option<MachineKey> {
        if self.machine_names.contains_key(name) {
            log::warn!("State machine '{name}' already exists");
            return None;
        }
        let skeleton_key = self.skeleton_key(skeleton)?;
        if self.machines.values().any(|slot| slot.skeleton == skeleton_key) {
            log::warn!("Skeleton '{skeleton}' already has a state machine");
            return None;
        }

        let key = self.machines.insert(MachineSlot {
            skeleton: skeleton_key,
            machine: AnimationStateMachine::new(name),
        });
        self.machine_names.insert(name.to_string(), key);
        log::info!("Created state machine '{name}' on skeleton '{skeleton}'");
        Some(key)
    }

    pub fn machine_key(&self, name: &str) -> Option<MachineKey> {
        let key = self.machine_names.get(name).copied();
        if key.is_none() {
            log::warn!("State machine '{name}' not found");
        }
        key
    }

    pub fn state_machine(&self, name: &str) -> Option<&AnimationStateMachine> {
        let key = self.machine_key(name)?;
        self.machines.get(key).map(|slot| &slot.machine)
    }

    pub fn state_machine_mut(&mut self, name: &str) -> Option<&mut AnimationStateMachine> {
        let key = self.machine_key(name)?;
        self.machines.get_mut(key).map(|slot| &mut slot.machine)
    }

    pub fn remove_state_machine(&mut self, name: &str) -> bool {
        let Some(key) = self.machine_names.remove(name) else {
            log::warn!("Cannot remove state machine '{name}': not found");
            return false;
        };
        self.machines.remove(key);
        log::info!("Removed state machine '{name}'");
        true
    }

    /// Switches a machine's state immediately.
    pub fn set_state_machine_state(&mut self, machine: &str, state: &str) -> bool {
        let Some(m) = self.state_machine_mut(machine) else {
            return false;
        };
        match m.set_state(state) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("State machine '{machine}': {e}");
                false
            }
        }
    }

    /// Cross-fades a machine to `state`, using the configured default duration
    /// when `duration` is `None`.
    pub fn force_transition(&mut self, machine: &str, state: &str, duration: Option<f32>) -> bool {
        let duration = duration.unwrap_or(self.settings.default_transition_duration);
        let Some(m) = self.state_machine_mut(machine) else {
            return false;
        };
        match m.force_transition(state, duration) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("State machine '{machine}': {e}");
                false
            }
        }
    }

    fn with_machine(&mut self, name: &str, f: impl FnOnce(&mut AnimationStateMachine)) -> bool {
        match self.state_machine_mut(name) {
            Some(machine) => {
                f(machine);
                true
            }
            None => false,
        }
    }

    pub fn set_parameter_float(&mut self, machine: &str, name: &str, value: f32) -> bool {
        self.with_machine(machine, |m| m.set_float(name, value))
    }

    pub fn set_parameter_bool(&mut self, machine: &str, name: &str, value: bool) -> bool {
        self.with_machine(machine, |m| m.set_bool(name, value))
    }

    pub fn set_parameter_int(&mut self, machine: &str, name: &str, value: i32) -> bool {
        self.with_machine(machine, |m| m.set_int(name, value))
    }

    pub fn set_parameter_trigger(&mut self, machine: &str, name: &str) -> bool {
        self.with_machine(machine, |m| m.set_trigger(name))
    }

    // ========================================================================
    // IK
    // ========================================================================

    /// Builds a chain from bone names, root of the chain first, using the
    /// configured tolerance, iteration limit and CCD step.
    ///
    /// `effector_offset` is the end effector in the last bone's local space.
    /// The chain is not solved until it gets a target.
    pub fn create_ik_chain(
        &mut self,
        name: &str,
        skeleton: &str,
        bones: &[&str],
        kind: IkSolverKind,
        effector_offset: Option<Vec3>,
    ) -> Option<ChainKey> {
        let skeleton_key = self.skeleton_key(skeleton)?;
        let target = &self.skeletons[skeleton_key].skeleton;

        let mut indices: SmallVec<[usize; 8]> = SmallVec::with_capacity(bones.len());
        for bone in bones {
            let Some(index) = target.find_bone(bone) else {
                log::warn!("IK chain '{name}': bone '{bone}' not found in skeleton '{skeleton}'");
                return None;
            };
            indices.push(index);
        }

        match IkChain::new(target, &indices, kind, effector_offset) {
            Ok(chain) => self.add_ik_chain(name, skeleton, chain),
            Err(e) => {
                log::error!("IK chain '{name}' rejected: {e}");
                None
            }
        }
    }

    /// Registers a prebuilt chain. Tolerance, iteration limit and CCD step are
    /// overwritten with the configured values.
    pub fn add_ik_chain(&mut self, name: &str, skeleton: &str, mut chain: IkChain) -> Option<ChainKey> {
        if self.chain_names.contains_key(name) {
            log::warn!("IK chain '{name}' already exists");
            return None;
        }
        let skeleton_key = self.skeleton_key(skeleton)?;
        let skeleton_len = self.skeletons[skeleton_key].skeleton.len();
        if chain.bones().iter().any(|&bone| bone >= skeleton_len) {
            log::error!("IK chain '{name}' does not fit skeleton '{skeleton}'");
            return None;
        }

        chain.tolerance = self.settings.ik_tolerance;
        chain.max_iterations = self.settings.ik_max_iterations;
        chain.max_step = self.settings.ccd_max_step;

        let key = self.chains.insert(ChainSlot {
            skeleton: skeleton_key,
            chain,
            enabled: true,
            last_outcome: None,
        });
        self.chain_names.insert(name.to_string(), key);
        log::info!("Created IK chain '{name}' on skeleton '{skeleton}'");
        Some(key)
    }

    fn chain_key(&self, name: &str) -> Option<ChainKey> {
        let key = self.chain_names.get(name).copied();
        if key.is_none() {
            log::warn!("IK chain '{name}' not found");
        }
        key
    }

    pub fn ik_chain(&self, name: &str) -> Option<&IkChain> {
        let key = self.chain_key(name)?;
        self.chains.get(key).map(|slot| &slot.chain)
    }

    pub fn ik_chain_mut(&mut self, name: &str) -> Option<&mut IkChain> {
        let key = self.chain_key(name)?;
        self.chains.get_mut(key).map(|slot| &mut slot.chain)
    }

    pub fn remove_ik_chain(&mut self, name: &str) -> bool {
        let Some(key) = self.chain_names.remove(name) else {
            log::warn!("Cannot remove IK chain '{name}': not found");
            return false;
        };
        self.chains.remove(key);
        log::info!("Removed IK chain '{name}'");
        true
    }

    pub fn set_ik_target(&mut self, name: &str, target: Vec3) -> bool {
        match self.ik_chain_mut(name) {
            Some(chain) => {
                chain.target = Some(target);
                true
            }
            None => false,
        }
    }

    /// Drops the target; the chain stops overriding the animated pose.
    pub fn clear_ik_target(&mut self, name: &str) -> bool {
        match self.ik_chain_mut(name) {
            Some(chain) => {
                chain.target = None;
                true
            }
            None => false,
        }
    }

    /// Includes or excludes a chain from the automatic solve in `update`.
    pub fn set_ik_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let Some(key) = self.chain_key(name) else {
            return false;
        };
        self.chains[key].enabled = enabled;
        true
    }

    /// Outcome of the chain's most recent solve.
    pub fn ik_outcome(&self, name: &str) -> Option<IkOutcome> {
        let key = self.chain_key(name)?;
        self.chains.get(key).and_then(|slot| slot.last_outcome)
    }

    /// Solves one chain right away on the skeleton's current pose and
    /// refreshes the hierarchy.
    pub fn solve_ik(&mut self, name: &str) -> Option<IkOutcome> {
        let key = self.chain_key(name)?;
        let slot = self.chains.get_mut(key)?;
        let skeleton = &mut self.skeletons.get_mut(slot.skeleton)?.skeleton;

        let outcome = slot.chain.solve(skeleton);
        skeleton.update_world_transforms();
        slot.last_outcome = Some(outcome);
        if !outcome.converged {
            log::debug!("IK chain '{name}' stopped {:.4} from its target", outcome.distance);
        }
        Some(outcome)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    pub fn update(&mut self, dt: f32) {
        // 1. State machines
        for (key, slot) in &mut self.machines {
            slot.machine.update(dt);
            self.pending.extend(
                slot.machine
                    .drain_events()
                    .map(|event| machine_event(key, event)),
            );
        }

        // 2. Instance clocks
        for (key, slot) in &mut self.instances {
            slot.instance.update(dt);
            self.pending.extend(
                slot.instance
                    .drain_events()
                    .map(|event| playback_event(key, event)),
            );
        }

        // 3. Poses, per skeleton
        for (skeleton_key, slot) in &mut self.skeletons {
            let SkeletonSlot { skeleton, pose } = slot;

            match self
                .machines
                .values_mut()
                .find(|m| m.skeleton == skeleton_key)
            {
                Some(m) => m.machine.evaluate(skeleton, &mut self.pool, pose),
                None => pose.reset_to_bind(skeleton),
            }

            let mut slots: SmallVec<[&mut InstanceSlot; 8]> = self
                .instances
                .values_mut()
                .filter(|i| i.skeleton == skeleton_key)
                .collect();
            slots.sort_unstable_by_key(|i| i.sequence);
            let mut active: SmallVec<[&mut AnimationInstance; 8]> =
                slots.into_iter().map(|i| &mut i.instance).collect();
            PoseBlender::blend_instances(pose, skeleton, &mut active);

            skeleton.apply_pose(pose);
            skeleton.update_world_transforms();

            if self.settings.resolve_ik_after_blend {
                let mut solved = false;
                for chain in self
                    .chains
                    .values_mut()
                    .filter(|c| {
                        c.enabled && c.skeleton == skeleton_key && c.chain.target.is_some()
                    })
                {
                    chain.last_outcome = Some(chain.chain.solve(skeleton));
                    solved = true;
                }
                if solved {
                    skeleton.update_world_transforms();
                }
            }
        }

        // 4. Hooks, then whatever they queued
        let events = std::mem::take(&mut self.pending);
        self.hooks.dispatch(&events, &mut self.commands);
        self.pending = std::mem::replace(&mut self.dispatched, events);
        self.pending.clear();

        for command in self.commands.take() {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: AnimationCommand) {
        match command {
            AnimationCommand::Play(key) => self.instance_by_key(key, AnimationInstance::play),
            AnimationCommand::Pause(key) => self.instance_by_key(key, AnimationInstance::pause),
            AnimationCommand::Stop(key) => self.instance_by_key(key, AnimationInstance::stop),
            AnimationCommand::SetTime(key, time) => self.instance_by_key(key, |i| i.set_time(time)),
            AnimationCommand::SetSpeed(key, speed) => {
                self.instance_by_key(key, |i| i.set_speed(speed));
            }
            AnimationCommand::SetWeight(key, weight) => {
                self.instance_by_key(key, |i| i.set_weight(weight));
            }
            AnimationCommand::SetFloat {
                machine,
                name,
                value,
            } => self.machine_by_key(machine, |m| m.set_float(name, value)),
            AnimationCommand::SetBool {
                machine,
                name,
                value,
            } => self.machine_by_key(machine, |m| m.set_bool(name, value)),
            AnimationCommand::SetTrigger { machine, name } => {
                self.machine_by_key(machine, |m| m.set_trigger(name));
            }
            AnimationCommand::ForceTransition {
                machine,
                state,
                duration,
            } => self.machine_by_key(machine, |m| {
                if let Err(e) = m.force_transition(&state, duration) {
                    log::warn!("Queued transition on '{}' failed: {e}", m.name());
                }
            }),
        }
    }

    fn instance_by_key(&mut self, key: InstanceKey, f: impl FnOnce(&mut AnimationInstance)) {
        match self.instances.get_mut(key) {
            Some(slot) => f(&mut slot.instance),
            None => log::warn!("Queued command for a destroyed animation instance"),
        }
    }

    fn machine_by_key(&mut self, key: MachineKey, f: impl FnOnce(&mut AnimationStateMachine)) {
        match self.machines.get_mut(key) {
            Some(slot) => f(&mut slot.machine),
            None => log::warn!("Queued command for a removed state machine"),
        }
    }
}

fn machine_event(machine: MachineKey, event: StateMachineEvent) -> AnimationEvent {
    match event {
        StateMachineEvent::Entered(state) => AnimationEvent::StateEntered { machine, state },
        StateMachineEvent::Exited(state) => AnimationEvent::StateExited { machine, state },
        StateMachineEvent::TransitionStarted { from, to } => {
            AnimationEvent::TransitionStarted { machine, from, to }
        }
    }
}

fn playback_event(instance: InstanceKey, event: PlaybackEvent) -> AnimationEvent {
    match event {
        PlaybackEvent::Completed => AnimationEvent::Completed { instance },
        PlaybackEvent::Marker { name, time } => AnimationEvent::Marker {
            instance,
            name,
            time,
        },
    }
}
