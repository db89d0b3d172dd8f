//! Parameter-driven blend trees.
//!
//! Every node is evaluated at a shared normalized phase so that clips of
//! different lengths stay in step (a walk and a run blended 50/50 keep their
//! foot contacts aligned).

use std::sync::Arc;

use glam::Vec2;
use smallvec::SmallVec;

use crate::animation::blender::{Pose, PoseBlender, PosePool};
use crate::animation::clip::AnimationClip;
use crate::animation::instance::BlendMode;
use crate::animation::parameters::Parameters;
use crate::errors::{AnimationError, Result};
use crate::skeleton::Skeleton;

/// Per-child weights of a single node.
pub type NodeWeights = SmallVec<[f32; 8]>;

type BoneMask = SmallVec<[bool; 128]>;

/// A layer stacked on top of a [`BlendNode::Layer`] base.
#[derive(Debug, Clone)]
pub struct BlendLayer {
    pub node: BlendNode,
    pub weight: f32,
    pub mode: BlendMode,
}

impl BlendLayer {
    #[must_use]
    pub fn new(node: BlendNode, weight: f32, mode: BlendMode) -> Self {
        Self { node, weight, mode }
    }
}

#[derive(Debug, Clone)]
pub enum BlendNode {
    Clip(Arc<AnimationClip>),
    /// Children keyed by ascending thresholds on one float parameter.
    Blend1D {
        parameter: String,
        children: Vec<(f32, BlendNode)>,
    },
    /// Children placed on a plane addressed by two float parameters.
    Blend2D {
        parameter_x: String,
        parameter_y: String,
        children: Vec<(Vec2, BlendNode)>,
    },
    /// A base node with weighted layers applied in order.
    Layer {
        base: Box<BlendNode>,
        layers: Vec<BlendLayer>,
    },
}

/// Everything a node needs while evaluating.
pub struct BlendContext<'a> {
    pub skeleton: &'a Skeleton,
    pub parameters: &'a Parameters,
    pub pool: &'a mut PosePool,
}

impl BlendNode {
    #[must_use]
    pub fn clip(clip: Arc<AnimationClip>) -> Self {
        Self::Clip(clip)
    }

    /// Builds a 1D node. Thresholds must be finite and strictly ascending.
    pub fn blend_1d(parameter: impl Into<String>, children: Vec<(f32, BlendNode)>) -> Result<Self> {
        let parameter = parameter.into();
        if children.is_empty() {
            return Err(AnimationError::EmptyBlendNode(parameter));
        }
        for index in 0..children.len() {
            let threshold = children[index].0;
            let ascending = index == 0 || threshold > children[index - 1].0;
            if !threshold.is_finite() || !ascending {
                return Err(AnimationError::UnsortedThresholds {
                    parameter,
                    index,
                    threshold,
                });
            }
        }
        Ok(Self::Blend1D {
            parameter,
            children,
        })
    }

    pub fn blend_2d(
        parameter_x: impl Into<String>,
        parameter_y: impl Into<String>,
        children: Vec<(Vec2, BlendNode)>,
    ) -> Result<Self> {
        let parameter_x = parameter_x.into();
        let parameter_y = parameter_y.into();
        if children.is_empty() {
            return Err(AnimationError::EmptyBlendNode(format!(
                "{parameter_x}/{parameter_y}"
            )));
        }
        if let Some(index) = children.iter().position(|(position, _)| !position.is_finite()) {
            return Err(AnimationError::NonFinitePosition {
                parameters: format!("{parameter_x}/{parameter_y}"),
                index,
            });
        }
        Ok(Self::Blend2D {
            parameter_x,
            parameter_y,
            children,
        })
    }

    #[must_use]
    pub fn layered(base: BlendNode, layers: Vec<BlendLayer>) -> Self {
        Self::Layer {
            base: Box::new(base),
            layers,
        }
    }

    /// Weights of the immediate children for the current parameters.
    ///
    /// 1D nodes interpolate linearly between the two bracketing thresholds and
    /// clamp outside the range. Non-finite parameter values count as 0 on
    /// both node kinds. 2D nodes use inverse distance `1 / (1 + d)`,
    /// normalized to sum to 1. Clips report `[1]`; layer nodes report their
    /// base followed by each layer weight.
    pub fn weights(&self, parameters: &Parameters) -> NodeWeights {
        match self {
            Self::Clip(_) => smallvec::smallvec![1.0],
            Self::Blend1D {
                parameter,
                children,
            } => {
                let value = finite_or_zero(parameters.float(parameter));
                let mut weights: NodeWeights = smallvec::smallvec![0.0; children.len()];
                let last = children.len() - 1;

                if value <= children[0].0 {
                    weights[0] = 1.0;
                } else if value >= children[last].0 {
                    weights[last] = 1.0;
                } else {
                    let upper = children
                        .partition_point(|(threshold, _)| *threshold <= value)
                        .clamp(1, last);
                    let (lo, hi) = (children[upper - 1].0, children[upper].0);
                    let t = (value - lo) / (hi - lo);
                    weights[upper - 1] = 1.0 - t;
                    weights[upper] = t;
                }
                weights
            }
            Self::Blend2D {
                parameter_x,
                parameter_y,
                children,
            } => {
                let point = Vec2::new(
                    finite_or_zero(parameters.float(parameter_x)),
                    finite_or_zero(parameters.float(parameter_y)),
                );
                let mut weights: NodeWeights = children
                    .iter()
                    .map(|(position, _)| 1.0 / (1.0 + point.distance(*position)))
                    .collect();
                let total: f32 = weights.iter().sum();
                if total > 0.0 {
                    for w in &mut weights {
                        *w /= total;
                    }
                }
                weights
            }
            Self::Layer { layers, .. } => std::iter::once(1.0)
                .chain(layers.iter().map(|layer| layer.weight))
                .collect(),
        }
    }

    /// Cycle length in seconds: the weighted sum of child durations.
    pub fn duration(&self, parameters: &Parameters) -> f32 {
        match self {
            Self::Clip(clip) => clip.duration(),
            Self::Blend1D { children, .. } => {
                let weights = self.weights(parameters);
                children
                    .iter()
                    .zip(&weights)
                    .map(|((_, child), w)| child.duration(parameters) * w)
                    .sum()
            }
            Self::Blend2D { children, .. } => {
                let weights = self.weights(parameters);
                children
                    .iter()
                    .zip(&weights)
                    .map(|((_, child), w)| child.duration(parameters) * w)
                    .sum()
            }
            Self::Layer { base, .. } => base.duration(parameters),
        }
    }

    /// Writes the node's pose at normalized `phase` into `out`.
    ///
    /// `out` is expected to hold the bind pose on entry.
    pub fn evaluate(&self, ctx: &mut BlendContext<'_>, phase: f32, out: &mut Pose) {
        match self {
            Self::Clip(clip) => {
                let time = phase * clip.duration();
                PoseBlender::apply_clip(out, ctx.skeleton, clip, time, 1.0, BlendMode::Replace);
            }
            Self::Blend1D { children, .. } => {
                let weights = self.weights(ctx.parameters);
                let nodes = children.iter().map(|(_, node)| node);
                Self::evaluate_weighted(ctx, phase, nodes, &weights, out);
            }
            Self::Blend2D { children, .. } => {
                let weights = self.weights(ctx.parameters);
                let nodes = children.iter().map(|(_, node)| node);
                Self::evaluate_weighted(ctx, phase, nodes, &weights, out);
            }
            Self::Layer { base, layers } => {
                base.evaluate(ctx, phase, out);
                let mut mask: BoneMask = smallvec::smallvec![false; ctx.skeleton.len()];
                for layer in layers {
                    if layer.weight <= 0.0 {
                        continue;
                    }
                    let mut scratch = ctx.pool.acquire(ctx.skeleton);
                    layer.node.evaluate(ctx, phase, &mut scratch);

                    mask.fill(false);
                    layer.node.mark_bones(&mut mask);
                    for (bone, sample) in scratch.transforms().iter().enumerate() {
                        if mask[bone] {
                            PoseBlender::blend_sample(
                                out,
                                ctx.skeleton,
                                bone,
                                sample,
                                layer.weight,
                                layer.mode,
                            );
                        }
                    }
                    ctx.pool.release(scratch);
                }
            }
        }
    }

    fn evaluate_weighted<'n>(
        ctx: &mut BlendContext<'_>,
        phase: f32,
        nodes: impl Iterator<Item = &'n BlendNode>,
        weights: &[f32],
        out: &mut Pose,
    ) {
        let mut total = 0.0_f32;
        for (node, &weight) in nodes.zip(weights) {
            if weight <= 0.0 {
                continue;
            }
            let mut scratch = ctx.pool.acquire(ctx.skeleton);
            node.evaluate(ctx, phase, &mut scratch);
            if total <= 0.0 {
                out.copy_from(&scratch);
                total = weight;
            } else {
                total += weight;
                PoseBlender::blend_poses(out, &scratch, weight / total);
            }
            ctx.pool.release(scratch);
        }
    }

    /// Flags every bone animated by a clip below this node.
    fn mark_bones(&self, mask: &mut [bool]) {
        match self {
            Self::Clip(clip) => {
                for track in clip.tracks() {
                    if let Some(slot) = mask.get_mut(track.bone()) {
                        *slot = true;
                    }
                }
            }
            Self::Blend1D { children, .. } => {
                for (_, child) in children {
                    child.mark_bones(mask);
                }
            }
            Self::Blend2D { children, .. } => {
                for (_, child) in children {
                    child.mark_bones(mask);
                }
            }
            Self::Layer { base, layers } => {
                base.mark_bones(mask);
                for layer in layers {
                    layer.node.mark_bones(mask);
                }
            }
        }
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}
