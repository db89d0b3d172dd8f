//! Headless walkthrough: an arm idles under a state machine, a wave plays on
//! top, and an IK chain keeps the hand on a moving target.
//!
//! Run with `RUST_LOG=debug cargo run --example ik_reach` to see the pipeline logs.

use anyhow::{Context, Result};
use glam::{Quat, Vec3};

use ossein::{
    AnimationClip, AnimationCommand, AnimationEvent, AnimationState, AnimationSystem, BoneDesc,
    BoneTrack, IkSolverKind, InterpolationMode, Keyframe, Skeleton, Transform, Transition,
};

fn build_arm() -> Result<Skeleton> {
    let skeleton = Skeleton::new(
        "arm",
        vec![
            BoneDesc::new("shoulder", None, Transform::IDENTITY),
            BoneDesc::new("elbow", Some(0), Transform::from_position(Vec3::X)),
            BoneDesc::new("wrist", Some(1), Transform::from_position(Vec3::X)),
            BoneDesc::new("hand", Some(2), Transform::from_position(Vec3::X * 0.25)),
        ],
    )?;
    Ok(skeleton)
}

fn breathe() -> Result<AnimationClip> {
    let keys = [0.0, 1.0, 2.0]
        .iter()
        .map(|&t: &f32| {
            let angle = 0.1 * (t * std::f32::consts::PI).sin();
            Keyframe::new(t, Vec3::ZERO, Quat::from_rotation_z(angle), Vec3::ONE)
        })
        .collect();
    let track = BoneTrack::new(0, keys, InterpolationMode::Linear)?;
    Ok(AnimationClip::new("breathe", vec![track]).with_looping(true))
}

fn wave() -> Result<AnimationClip> {
    let track = BoneTrack::new(
        2,
        vec![
            Keyframe::new(0.0, Vec3::X, Quat::IDENTITY, Vec3::ONE),
            Keyframe::new(0.5, Vec3::X, Quat::from_rotation_z(0.8), Vec3::ONE),
            Keyframe::new(1.0, Vec3::X, Quat::IDENTITY, Vec3::ONE),
        ],
        InterpolationMode::CubicHermite,
    )?;
    Ok(AnimationClip::new("wave", vec![track]).with_event("peak", 0.5))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut system = AnimationSystem::new();
    system.add_skeleton(build_arm()?);
    let breathe = system.add_clip(breathe()?);
    system.add_clip(wave()?);

    let machine = system
        .create_state_machine("arm_brain", "arm")
        .context("state machine")?;
    {
        let brain = system
            .state_machine_mut("arm_brain")
            .context("state machine lookup")?;
        brain.add_state(AnimationState::clip("rest", breathe.clone()))?;
        brain.add_state(AnimationState::clip("alert", breathe).with_speed(3.0))?;
        brain.add_transition(Transition::new("rest", "alert", 0.3).when(|p| p.bool("alert")))?;
    }

    system.create_instance("wave", "wave", "arm").context("wave instance")?;
    system
        .on_event("wave", "peak", move |_, queue| {
            queue.push(AnimationCommand::SetBool {
                machine,
                name: "alert".into(),
                value: true,
            });
        })
        .context("peak hook")?;
    system.add_hook(
        |event| matches!(event, AnimationEvent::StateEntered { .. }),
        |event, _| log::info!("{event:?}"),
    );
    system.play("wave");

    system
        .create_ik_chain(
            "reach",
            "arm",
            &["shoulder", "elbow", "wrist"],
            IkSolverKind::Fabrik,
            None,
        )
        .context("IK chain")?;

    let dt = 1.0 / 30.0;
    for frame in 0..90 {
        let t = frame as f32 * dt;
        let target = Vec3::new(1.2 + 0.4 * t.cos(), 0.8 * t.sin(), 0.2);
        system.set_ik_target("reach", target);
        system.update(dt);

        if frame % 15 == 0 {
            let skeleton = system.skeleton("arm").context("skeleton")?;
            let wrist = skeleton.world_position(2).context("wrist")?;
            let outcome = system.ik_outcome("reach").context("outcome")?;
            println!(
                "frame {frame:>2}: target {target:.3} wrist {wrist:.3} error {:.4} ({} iterations)",
                outcome.distance, outcome.iterations
            );
        }
    }

    let brain = system.state_machine("arm_brain").context("state machine")?;
    println!("final state: {:?}", brain.current_state());
    Ok(())
}
