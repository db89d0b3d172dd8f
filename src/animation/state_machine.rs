use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::animation::blend_tree::{BlendContext, BlendNode};
use crate::animation::blender::{Pose, PoseBlender, PosePool};
use crate::animation::clip::AnimationClip;
use crate::animation::instance::BlendMode;
use crate::animation::parameters::Parameters;
use crate::errors::{AnimationError, Result};
use crate::skeleton::Skeleton;

pub type TransitionCondition = Box<dyn Fn(&Parameters) -> bool + Send + Sync>;

/// What a state plays.
#[derive(Debug, Clone)]
pub enum StateMotion {
    Clip(Arc<AnimationClip>),
    BlendTree(BlendNode),
}

impl StateMotion {
    /// Length of one cycle in seconds.
    pub fn duration(&self, parameters: &Parameters) -> f32 {
        match self {
            Self::Clip(clip) => clip.duration(),
            Self::BlendTree(node) => node.duration(parameters),
        }
    }

    fn evaluate(&self, ctx: &mut BlendContext<'_>, phase: f32, out: &mut Pose) {
        match self {
            Self::Clip(clip) => {
                let time = phase * clip.duration();
                PoseBlender::apply_clip(out, ctx.skeleton, clip, time, 1.0, BlendMode::Replace);
            }
            Self::BlendTree(node) => node.evaluate(ctx, phase, out),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationState {
    pub name: String,
    pub motion: StateMotion,
    pub speed: f32,
    pub looping: bool,
}

impl AnimationState {
    /// A state playing one clip, looping when the clip does.
    #[must_use]
    pub fn clip(name: impl Into<String>, clip: Arc<AnimationClip>) -> Self {
        let looping = clip.is_looping();
        Self {
            name: name.into(),
            motion: StateMotion::Clip(clip),
            speed: 1.0,
            looping,
        }
    }

    /// A looping state driven by a blend tree.
    #[must_use]
    pub fn blend_tree(name: impl Into<String>, node: BlendNode) -> Self {
        Self {
            name: name.into(),
            motion: StateMotion::BlendTree(node),
            speed: 1.0,
            looping: true,
        }
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

/// Edge of the transition table.
///
/// Fires when its condition holds (no condition means always) and, if an exit
/// time is set, once the source state's normalized time reached it.
pub struct Transition {
    pub from: String,
    pub to: String,
    /// Cross-fade length in seconds
    pub duration: f32,
    condition: Option<TransitionCondition>,
    pub exit_time: Option<f32>,
    pub can_interrupt: bool,
}

impl Transition {
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, duration: f32) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            duration,
            condition: None,
            exit_time: None,
            can_interrupt: false,
        }
    }

    #[must_use]
    pub fn when(mut self, condition: impl Fn(&Parameters) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    /// Normalized time of the source state after which the transition may fire.
    #[must_use]
    pub fn with_exit_time(mut self, exit_time: f32) -> Self {
        self.exit_time = Some(exit_time);
        self
    }

    #[must_use]
    pub fn interruptible(mut self, can_interrupt: bool) -> Self {
        self.can_interrupt = can_interrupt;
        self
    }

    fn condition_holds(&self, parameters: &Parameters) -> bool {
        self.condition
            .as_ref()
            .is_none_or(|condition| condition(parameters))
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("duration", &self.duration)
            .field("conditional", &self.condition.is_some())
            .field("exit_time", &self.exit_time)
            .field("can_interrupt", &self.can_interrupt)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateMachineEvent {
    Entered(String),
    Exited(String),
    TransitionStarted { from: String, to: String },
}

#[derive(Debug)]
struct RegisteredTransition {
    from: usize,
    to: usize,
    transition: Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outgoing {
    State(usize),
    /// Frozen pose captured when a cross-fade was interrupted
    Snapshot,
}

#[derive(Debug, Clone, Copy)]
struct ActiveTransition {
    outgoing: Outgoing,
    target: usize,
    elapsed: f32,
    duration: f32,
    can_interrupt: bool,
    /// Registration index; only earlier transitions may interrupt
    rank: usize,
}

impl ActiveTransition {
    fn progress(&self) -> f32 {
        if self.duration > 0.0 {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

/// Named states joined by timed cross-fades.
///
/// Each state keeps an unwrapped normalized clock (cycles played since the
/// state was entered). The machine produces a base pose; instances played on
/// the same skeleton are layered on top by the owner.
pub struct AnimationStateMachine {
    name: String,
    states: Vec<AnimationState>,
    state_index: FxHashMap<String, usize>,
    clocks: Vec<f32>,
    transitions: Vec<RegisteredTransition>,
    pub parameters: Parameters,

    current: Option<usize>,
    active: Option<ActiveTransition>,

    snapshot: Pose,
    last_pose: Pose,
    pending: Vec<StateMachineEvent>,
}

impl AnimationStateMachine {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            state_index: FxHashMap::default(),
            clocks: Vec::new(),
            transitions: Vec::new(),
            parameters: Parameters::new(),
            current: None,
            active: None,
            snapshot: Pose::default(),
            last_pose: Pose::default(),
            pending: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a state. The first state becomes the current one.
    pub fn add_state(&mut self, state: AnimationState) -> Result<()> {
        if self.state_index.contains_key(&state.name) {
            return Err(AnimationError::DuplicateState(state.name));
        }
        let index = self.states.len();
        self.state_index.insert(state.name.clone(), index);
        self.states.push(state);
        self.clocks.push(0.0);
        if self.current.is_none() {
            self.current = Some(index);
        }
        Ok(())
    }

    /// Appends to the transition table. Order matters: the first matching
    /// transition wins.
    pub fn add_transition(&mut self, transition: Transition) -> Result<()> {
        let from = self.index_of(&transition.from)?;
        let to = self.index_of(&transition.to)?;
        self.transitions.push(RegisteredTransition {
            from,
            to,
            transition,
        });
        Ok(())
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.state_index
            .get(name)
            .copied()
            .ok_or_else(|| AnimationError::UnknownState(name.to_string()))
    }

    pub fn state(&self, name: &str) -> Option<&AnimationState> {
        self.state_index.get(name).map(|&i| &self.states[i])
    }

    pub fn states(&self) -> &[AnimationState] {
        &self.states
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.state_index.contains_key(name)
    }

    /// Whether a direct transition `from -> to` is registered.
    pub fn can_transition(&self, from: &str, to: &str) -> bool {
        let (Some(&from), Some(&to)) = (self.state_index.get(from), self.state_index.get(to)) else {
            return false;
        };
        self.transitions.iter().any(|t| t.from == from && t.to == to)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn current_state(&self) -> Option<&str> {
        self.current.map(|i| self.states[i].name.as_str())
    }

    /// State being faded in, if a transition is running.
    pub fn target_state(&self) -> Option<&str> {
        self.active.map(|a| self.states[a.target].name.as_str())
    }

    #[inline]
    pub fn is_transitioning(&self) -> bool {
        self.active.is_some()
    }

    /// Cross-fade progress in [0, 1].
    pub fn progress(&self) -> Option<f32> {
        self.active.map(|a| a.progress())
    }

    /// Weight of the side being faded out (0 when no transition is running).
    pub fn outgoing_weight(&self) -> f32 {
        self.active.map_or(0.0, |a| 1.0 - a.progress())
    }

    /// Weight of the side being faded in (0 when no transition is running).
    pub fn incoming_weight(&self) -> f32 {
        self.active.map_or(0.0, |a| a.progress())
    }

    /// Contribution of a named state to the output pose.
    pub fn state_weight(&self, name: &str) -> f32 {
        let Some(&index) = self.state_index.get(name) else {
            return 0.0;
        };
        match self.active {
            None => {
                if self.current == Some(index) { 1.0 } else { 0.0 }
            }
            Some(active) => {
                let p = active.progress();
                let mut weight = 0.0;
                if active.target == index {
                    weight += p;
                }
                if active.outgoing == Outgoing::State(index) {
                    weight += 1.0 - p;
                }
                weight
            }
        }
    }

    /// Unwrapped normalized time (cycles since the state was entered).
    pub fn state_normalized_time(&self, name: &str) -> Option<f32> {
        self.state_index.get(name).map(|&i| self.clocks[i])
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, StateMachineEvent> {
        self.pending.drain(..)
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Switches immediately, cancelling any running transition.
    pub fn set_state(&mut self, name: &str) -> Result<()> {
        let index = self.index_of(name)?;
        if let Some(active) = self.active.take() {
            if active.target != index && self.current != Some(active.target) {
                self.pending
                    .push(StateMachineEvent::Exited(self.states[active.target].name.clone()));
            }
        }
        self.clocks[index] = 0.0;
        if self.current != Some(index) {
            if let Some(old) = self.current {
                self.pending
                    .push(StateMachineEvent::Exited(self.states[old].name.clone()));
            }
            self.pending
                .push(StateMachineEvent::Entered(self.states[index].name.clone()));
            self.current = Some(index);
        }
        Ok(())
    }

    /// Starts a cross-fade to `name` regardless of the transition table.
    ///
    /// A running transition is replaced and its blended pose frozen as the new
    /// outgoing side. Forcing the current state while idle does nothing.
    pub fn force_transition(&mut self, name: &str, duration: f32) -> Result<()> {
        let target = self.index_of(name)?;
        let Some(current) = self.current else {
            return self.set_state(name);
        };
        let outgoing = match self.active {
            None if target == current => return Ok(()),
            None => Outgoing::State(current),
            Some(_) => self.freeze_outgoing(),
        };
        self.begin(outgoing, target, duration, false, usize::MAX);
        Ok(())
    }

    pub fn set_float(&mut self, name: impl Into<String>, value: f32) {
        self.parameters.set_float(name, value);
    }

    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.parameters.set_bool(name, value);
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i32) {
        self.parameters.set_int(name, value);
    }

    pub fn set_trigger(&mut self, name: impl Into<String>) {
        self.parameters.set_trigger(name);
    }

    // ========================================================================
    // Core logic
    // ========================================================================

    /// Advances state clocks, then starts, interrupts or commits transitions.
    /// Triggers are consumed at the end of every update.
    pub fn update(&mut self, dt: f32) {
        let Some(current) = self.current else {
            return;
        };

        match self.active {
            None => self.advance_clock(current, dt),
            Some(active) => {
                if let Outgoing::State(state) = active.outgoing {
                    self.advance_clock(state, dt);
                }
                if active.outgoing != Outgoing::State(active.target) {
                    self.advance_clock(active.target, dt);
                }
            }
        }

        if let Some(mut active) = self.active {
            active.elapsed += dt;
            self.active = Some(active);

            if active.can_interrupt {
                if let Some(rank) = self.find_interrupt(&active) {
                    let outgoing = self.freeze_outgoing();
                    self.start(rank, outgoing);
                }
            }

            if let Some(active) = self.active {
                if active.progress() >= 1.0 {
                    self.commit(active.target);
                }
            }
        } else if let Some(rank) = self.find_transition(current) {
            self.start(rank, Outgoing::State(current));
        }

        self.parameters.reset_triggers();
    }

    /// Writes the machine's pose into `out`, starting from bind pose.
    pub fn evaluate(&mut self, skeleton: &Skeleton, pool: &mut PosePool, out: &mut Pose) {
        out.reset_to_bind(skeleton);
        let Some(current) = self.current else {
            return;
        };

        let mut ctx = BlendContext {
            skeleton,
            parameters: &self.parameters,
            pool,
        };

        match self.active {
            None => {
                self.states[current]
                    .motion
                    .evaluate(&mut ctx, self.phase(current), out);
            }
            Some(active) => {
                let p = active.progress();

                let mut from = ctx.pool.acquire(skeleton);
                match active.outgoing {
                    Outgoing::State(state) => {
                        self.states[state]
                            .motion
                            .evaluate(&mut ctx, self.phase(state), &mut from);
                    }
                    Outgoing::Snapshot => from.copy_from(&self.snapshot),
                }

                let mut to = ctx.pool.acquire(skeleton);
                self.states[active.target]
                    .motion
                    .evaluate(&mut ctx, self.phase(active.target), &mut to);

                PoseBlender::blend_weighted(out, &[(&from, 1.0 - p), (&to, p)]);
                ctx.pool.release(from);
                ctx.pool.release(to);
            }
        }

        self.last_pose.copy_from(out);
    }

    fn advance_clock(&mut self, state: usize, dt: f32) {
        let duration = self.states[state].motion.duration(&self.parameters);
        if duration > f32::EPSILON {
            self.clocks[state] += dt * self.states[state].speed / duration;
        }
    }

    /// Phase in [0, 1] used for sampling.
    fn phase(&self, state: usize) -> f32 {
        let clock = self.clocks[state];
        if self.states[state].looping {
            clock.rem_euclid(1.0)
        } else {
            clock.clamp(0.0, 1.0)
        }
    }

    fn fires(&self, registered: &RegisteredTransition) -> bool {
        let transition = &registered.transition;
        let exit_reached = transition
            .exit_time
            .is_none_or(|exit| self.clocks[registered.from] >= exit);
        exit_reached && transition.condition_holds(&self.parameters)
    }

    fn find_transition(&self, current: usize) -> Option<usize> {
        self.transitions
            .iter()
            .position(|t| t.from == current && t.to != current && self.fires(t))
    }

    /// Earlier-registered transition leaving either side of the running
    /// cross-fade.
    fn find_interrupt(&self, active: &ActiveTransition) -> Option<usize> {
        self.transitions
            .iter()
            .take(active.rank)
            .position(|t| {
                let leaves = t.from == active.target || active.outgoing == Outgoing::State(t.from);
                leaves && t.to != active.target && self.fires(t)
            })
    }

    /// Captures the last output pose as a frozen outgoing side. Falls back to
    /// the current state when nothing was evaluated yet.
    fn freeze_outgoing(&mut self) -> Outgoing {
        if self.last_pose.is_empty() {
            return self.current.map_or(Outgoing::Snapshot, Outgoing::State);
        }
        self.snapshot.copy_from(&self.last_pose);
        Outgoing::Snapshot
    }

    fn start(&mut self, rank: usize, outgoing: Outgoing) {
        let registered = &self.transitions[rank];
        let (target, duration, can_interrupt) = (
            registered.to,
            registered.transition.duration,
            registered.transition.can_interrupt,
        );
        self.begin(outgoing, target, duration, can_interrupt, rank);
    }

    fn begin(&mut self, outgoing: Outgoing, target: usize, duration: f32, can_interrupt: bool, rank: usize) {
        let Some(current) = self.current else {
            return;
        };

        // A fade that gets replaced abandons its incoming state
        if let Some(previous) = self.active.take() {
            if previous.target != target && previous.target != current {
                self.pending
                    .push(StateMachineEvent::Exited(self.states[previous.target].name.clone()));
            }
        }

        log::debug!(
            "State machine '{}': {} -> {} over {:.3}s",
            self.name,
            self.states[current].name,
            self.states[target].name,
            duration
        );

        self.clocks[target] = 0.0;
        self.pending.push(StateMachineEvent::TransitionStarted {
            from: self.states[current].name.clone(),
            to: self.states[target].name.clone(),
        });
        if target != current {
            self.pending
                .push(StateMachineEvent::Entered(self.states[target].name.clone()));
        }

        if duration <= 0.0 {
            self.commit(target);
            return;
        }

        self.active = Some(ActiveTransition {
            outgoing,
            target,
            elapsed: 0.0,
            duration,
            can_interrupt,
            rank,
        });
    }

    fn commit(&mut self, target: usize) {
        self.active = None;
        if let Some(old) = self.current {
            if old != target {
                self.pending
                    .push(StateMachineEvent::Exited(self.states[old].name.clone()));
            }
        }
        self.current = Some(target);
    }
}
