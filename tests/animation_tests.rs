//! Animation Tests
//!
//! Tests for:
//! - BoneTrack linear/step/cubic sampling, clamping and cursor agreement
//! - AnimationClip duration, events and validation
//! - AnimationInstance loop modes, markers and root motion
//! - PoseBlender ordering, weights and additive layers
//! - BlendNode 1D/2D weights, durations and layer masks

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::{Quat, Vec2, Vec3};

use ossein::animation::blend_tree::BlendContext;
use ossein::animation::instance::PlaybackEvent;
use ossein::animation::parameters::Parameters;
use ossein::animation::tracks::{KeyframeCursor, KeyframeTangents};
use ossein::animation::{PlaybackState, PosePool};
use ossein::{
    AnimationClip, AnimationError, AnimationInstance, BlendLayer, BlendMode, BlendNode,
    BoneDesc, BoneTrack, InterpolationMode, Keyframe, LoopMode, Pose, PoseBlender, RootMotion,
    Skeleton, Transform,
};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn approx_vec(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn key(time: f32, position: Vec3) -> Keyframe {
    Keyframe::new(time, position, Quat::IDENTITY, Vec3::ONE)
}

fn rig() -> Skeleton {
    Skeleton::new(
        "rig",
        vec![
            BoneDesc::new("root", None, Transform::IDENTITY),
            BoneDesc::new("child", Some(0), Transform::from_position(Vec3::X)),
        ],
    )
    .unwrap()
}

/// Linear move of one bone from `from` to `to` over `duration`.
fn moving_clip(name: &str, bone: usize, from: Vec3, to: Vec3, duration: f32) -> AnimationClip {
    let track = BoneTrack::new(
        bone,
        vec![key(0.0, from), key(duration, to)],
        InterpolationMode::Linear,
    )
    .unwrap();
    AnimationClip::new(name, vec![track])
}

/// One bone held at `position` for `duration`.
fn static_clip(name: &str, bone: usize, position: Vec3, duration: f32) -> AnimationClip {
    let track = BoneTrack::new(bone, vec![key(0.0, position)], InterpolationMode::Linear).unwrap();
    AnimationClip::new(name, vec![track])
        .with_duration(duration)
        .unwrap()
}

fn playing(clip: AnimationClip) -> AnimationInstance {
    let mut instance = AnimationInstance::new("test", Arc::new(clip));
    instance.play();
    instance
}

fn markers(instance: &mut AnimationInstance) -> Vec<String> {
    instance
        .drain_events()
        .filter_map(|e| match e {
            PlaybackEvent::Marker { name, .. } => Some(name),
            PlaybackEvent::Completed => None,
        })
        .collect()
}

// ============================================================================
// BoneTrack: Construction
// ============================================================================

#[test]
fn track_rejects_empty_keyframes() {
    let err = BoneTrack::new(3, vec![], InterpolationMode::Linear).unwrap_err();
    assert_eq!(err, AnimationError::EmptyTrack { bone: 3 });
}

#[test]
fn track_rejects_unsorted_and_duplicate_times() {
    let unsorted = BoneTrack::new(
        0,
        vec![key(0.0, Vec3::ZERO), key(1.0, Vec3::X), key(0.5, Vec3::Y)],
        InterpolationMode::Linear,
    );
    assert!(matches!(
        unsorted,
        Err(AnimationError::UnsortedKeyframes { index: 2, .. })
    ));

    let duplicate = BoneTrack::new(
        0,
        vec![key(0.0, Vec3::ZERO), key(0.0, Vec3::X)],
        InterpolationMode::Linear,
    );
    assert!(matches!(
        duplicate,
        Err(AnimationError::UnsortedKeyframes { index: 1, .. })
    ));
}

#[test]
fn track_rejects_non_finite_time() {
    let result = BoneTrack::new(
        0,
        vec![key(0.0, Vec3::ZERO), key(f32::NAN, Vec3::X)],
        InterpolationMode::Linear,
    );
    assert!(matches!(
        result,
        Err(AnimationError::NonFiniteKeyframe { bone: 0, index: 1 })
    ));
}

#[test]
fn track_normalizes_rotations() {
    let raw = Quat::from_xyzw(0.0, 0.0, 2.0, 2.0);
    let track = BoneTrack::new(
        0,
        vec![Keyframe::new(0.0, Vec3::ZERO, raw, Vec3::ONE)],
        InterpolationMode::Linear,
    )
    .unwrap();
    assert!(approx(track.keyframes()[0].rotation.length(), 1.0));
}

// ============================================================================
// BoneTrack: Sampling
// ============================================================================

#[test]
fn track_single_keyframe_is_constant() {
    let only = Keyframe::new(
        0.5,
        Vec3::new(1.0, 2.0, 3.0),
        Quat::from_rotation_y(0.3),
        Vec3::splat(2.0),
    );
    let track = BoneTrack::new(0, vec![only], InterpolationMode::CubicHermite).unwrap();
    let stored = track.keyframes()[0].transform();
    assert!(approx_vec(stored.position, only.position));

    let mut cursor = KeyframeCursor::default();
    for time in [-100.0, -0.1, 0.0, 0.5, 7.0, 1.0e6] {
        assert_eq!(track.sample(time), stored, "time {time}");
        assert_eq!(track.sample_with_cursor(time, &mut cursor), stored);
    }
}

#[test]
fn track_linear_midpoint() {
    let track = BoneTrack::new(
        0,
        vec![key(0.0, Vec3::ZERO), key(1.0, Vec3::new(10.0, 0.0, 0.0))],
        InterpolationMode::Linear,
    )
    .unwrap();

    let sample = track.sample(0.5);
    assert!(approx(sample.position.x, 5.0), "got {}", sample.position.x);
}

#[test]
fn track_clamps_outside_key_range() {
    let track = BoneTrack::new(
        0,
        vec![key(1.0, Vec3::X), key(2.0, Vec3::Y)],
        InterpolationMode::Linear,
    )
    .unwrap();

    assert!(approx_vec(track.sample(-3.0).position, Vec3::X));
    assert!(approx_vec(track.sample(0.999).position, Vec3::X));
    assert!(approx_vec(track.sample(2.0).position, Vec3::Y));
    assert!(approx_vec(track.sample(50.0).position, Vec3::Y));
}

#[test]
fn track_step_holds_earlier_key() {
    let track = BoneTrack::new(
        0,
        vec![key(0.0, Vec3::ZERO), key(1.0, Vec3::splat(10.0))],
        InterpolationMode::Step,
    )
    .unwrap();

    assert!(approx_vec(track.sample(0.0).position, Vec3::ZERO));
    assert!(approx_vec(track.sample(0.99).position, Vec3::ZERO));
    assert!(approx_vec(track.sample(1.0).position, Vec3::splat(10.0)));
}

#[test]
fn track_rotation_stays_unit_length() {
    let track = BoneTrack::new(
        0,
        vec![
            Keyframe::new(0.0, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
            Keyframe::new(1.0, Vec3::ZERO, Quat::from_rotation_z(FRAC_PI_2), Vec3::ONE),
            Keyframe::new(2.0, Vec3::ZERO, Quat::from_rotation_x(3.0), Vec3::ONE),
        ],
        InterpolationMode::Linear,
    )
    .unwrap();

    for i in 0..=40 {
        let time = i as f32 * 0.05;
        let rotation = track.sample(time).rotation;
        assert!(
            (rotation.length() - 1.0).abs() < 1e-4,
            "time {time}: |q| = {}",
            rotation.length()
        );
    }

    let half = track.sample(0.5).rotation;
    let expected = Quat::from_rotation_z(FRAC_PI_2 * 0.5);
    assert!(half.dot(expected).abs() > 1.0 - 1e-4);
}

#[test]
fn track_cubic_without_tangents_eases() {
    let track = BoneTrack::new(
        0,
        vec![key(0.0, Vec3::ZERO), key(1.0, Vec3::new(10.0, 0.0, 0.0))],
        InterpolationMode::CubicHermite,
    )
    .unwrap();

    // Zero tangents: h01(t) = 3t² - 2t³
    assert!(approx(track.sample(0.0).position.x, 0.0));
    assert!(approx(track.sample(0.5).position.x, 5.0));
    assert!(approx(track.sample(0.25).position.x, 1.5625));
    assert!(approx(track.sample(1.0).position.x, 10.0));
}

#[test]
fn track_cubic_uses_tangents() {
    let slope = KeyframeTangents {
        in_position: Vec3::new(10.0, 0.0, 0.0),
        out_position: Vec3::new(10.0, 0.0, 0.0),
        ..Default::default()
    };
    let track = BoneTrack::new(
        0,
        vec![
            key(0.0, Vec3::ZERO).with_tangents(slope),
            key(1.0, Vec3::new(10.0, 0.0, 0.0)).with_tangents(slope),
        ],
        InterpolationMode::CubicHermite,
    )
    .unwrap();

    // Tangents matching the linear slope reproduce the straight line
    for t in [0.1, 0.25, 0.6, 0.9] {
        assert!(approx(track.sample(t).position.x, 10.0 * t), "t = {t}");
    }
}

#[test]
fn cursor_sampling_matches_binary_search() {
    let keys: Vec<Keyframe> = (0..20)
        .map(|i| key(i as f32 * 0.1, Vec3::new((i * i) as f32, i as f32, 0.0)))
        .collect();
    let track = BoneTrack::new(0, keys, InterpolationMode::Linear).unwrap();

    let mut cursor = KeyframeCursor::default();
    // Forward, a large jump back, then reverse playback
    let times = [0.0, 0.05, 0.12, 0.31, 0.33, 1.85, 0.02, 1.5, 1.42, 1.21, 1.2, 0.7];
    for time in times {
        let a = track.sample(time).position;
        let b = track.sample_with_cursor(time, &mut cursor).position;
        assert!(approx_vec(a, b), "time {time}: {a} vs {b}");
    }
}

// ============================================================================
// AnimationClip
// ============================================================================

#[test]
fn clip_duration_is_latest_key() {
    let short = BoneTrack::new(0, vec![key(0.0, Vec3::ZERO), key(1.0, Vec3::X)], InterpolationMode::Linear).unwrap();
    let long = BoneTrack::new(1, vec![key(0.0, Vec3::ZERO), key(2.5, Vec3::X)], InterpolationMode::Linear).unwrap();
    let clip = AnimationClip::new("walk", vec![short, long]);
    assert!(approx(clip.duration(), 2.5));
}

#[test]
fn clip_rejects_negative_duration() {
    let clip = static_clip("idle", 0, Vec3::ZERO, 1.0);
    assert!(matches!(
        clip.with_duration(-1.0),
        Err(AnimationError::InvalidDuration { .. })
    ));
}

#[test]
fn clip_events_are_sorted() {
    let clip = static_clip("walk", 0, Vec3::ZERO, 1.0)
        .with_event("right_foot", 0.75)
        .with_event("left_foot", 0.25);
    let names: Vec<&str> = clip.events().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["left_foot", "right_foot"]);
}

#[test]
fn clip_validation_checks_bone_range() {
    let skeleton = rig();
    assert!(static_clip("ok", 1, Vec3::ZERO, 1.0).validate_for(&skeleton).is_ok());
    assert_eq!(
        static_clip("bad", 5, Vec3::ZERO, 1.0).validate_for(&skeleton),
        Err(AnimationError::BoneOutOfRange { index: 5, count: 2 })
    );
}

// ============================================================================
// AnimationInstance: Playback
// ============================================================================

#[test]
fn instance_starts_stopped_and_play_resumes() {
    let mut instance = AnimationInstance::new("a", Arc::new(static_clip("idle", 0, Vec3::ZERO, 2.0)));
    assert_eq!(instance.state(), PlaybackState::Stopped);

    instance.update(0.5);
    assert!(approx(instance.time(), 0.0), "stopped instances do not advance");

    instance.play();
    instance.update(0.5);
    instance.pause();
    instance.update(0.5);
    assert!(approx(instance.time(), 0.5));
    assert_eq!(instance.state(), PlaybackState::Paused);

    instance.play();
    instance.update(0.25);
    assert!(approx(instance.time(), 0.75));

    instance.stop();
    assert_eq!(instance.state(), PlaybackState::Stopped);
    assert!(approx(instance.time(), 0.0));
}

#[test]
fn instance_once_clamps_and_completes_once() {
    let mut instance = playing(static_clip("attack", 0, Vec3::ZERO, 1.0));
    assert_eq!(instance.loop_mode, LoopMode::Once);

    instance.update(0.6);
    assert!(approx(instance.time(), 0.6));
    instance.update(0.6);
    assert!(approx(instance.time(), 1.0));
    assert_eq!(instance.state(), PlaybackState::Stopped);

    instance.update(0.6);
    let completions = instance
        .drain_events()
        .filter(|e| *e == PlaybackEvent::Completed)
        .count();
    assert_eq!(completions, 1);
}

#[test]
fn instance_loop_keeps_overshoot() {
    let clip = static_clip("walk", 0, Vec3::ZERO, 2.0).with_looping(true);
    let mut instance = playing(clip);
    assert_eq!(instance.loop_mode, LoopMode::Loop);

    instance.set_time(1.9);
    instance.update(0.2);
    assert!(approx(instance.time(), 0.1), "got {}", instance.time());
    assert_eq!(instance.state(), PlaybackState::Playing);
}

#[test]
fn instance_loop_handles_multiple_wraps() {
    let clip = static_clip("spin", 0, Vec3::ZERO, 1.0).with_looping(true);
    let mut instance = playing(clip);
    instance.update(2.5);
    assert!(approx(instance.time(), 0.5), "got {}", instance.time());
}

#[test]
fn instance_loop_reverse_wraps_to_end() {
    let clip = static_clip("walk", 0, Vec3::ZERO, 2.0).with_looping(true);
    let mut instance = playing(clip);
    instance.set_speed(-1.0);
    instance.set_time(0.1);
    instance.update(0.3);
    assert!(approx(instance.time(), 1.8), "got {}", instance.time());
}

#[test]
fn loop_wrap_is_continuous() {
    let clip = moving_clip("slide", 0, Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), 2.0).with_looping(true);
    let mut instance = playing(clip.clone());
    instance.set_time(1.95);
    instance.update(0.1);

    let (_, sample) = instance.sample_track(0).unwrap();
    let expected = clip.tracks()[0].sample(0.05);
    assert!(approx_vec(sample.position, expected.position));
}

#[test]
fn instance_ping_pong_reverses_at_boundaries() {
    let mut instance = playing(static_clip("wave", 0, Vec3::ZERO, 1.0));
    instance.loop_mode = LoopMode::PingPong;

    instance.set_time(0.8);
    instance.update(0.4);
    assert!(approx(instance.time(), 1.0));
    assert!(approx(instance.speed(), -1.0));

    instance.update(0.3);
    assert!(approx(instance.time(), 0.7));

    instance.update(1.0);
    assert!(approx(instance.time(), 0.0));
    assert!(approx(instance.speed(), 1.0));
    assert_eq!(instance.state(), PlaybackState::Playing);
}

#[test]
fn instance_clamp_forever_holds_last_pose() {
    let mut instance = playing(static_clip("pose", 0, Vec3::ZERO, 1.0));
    instance.loop_mode = LoopMode::ClampForever;

    instance.update(5.0);
    assert!(approx(instance.time(), 1.0));
    assert_eq!(instance.state(), PlaybackState::Playing);
    assert_eq!(instance.drain_events().count(), 0);
}

#[test]
fn instance_zero_duration_clip_does_not_advance() {
    let track = BoneTrack::new(0, vec![key(0.0, Vec3::X)], InterpolationMode::Linear).unwrap();
    let mut instance = playing(AnimationClip::new("still", vec![track]));
    instance.update(1.0);
    assert!(approx(instance.time(), 0.0));
    assert_eq!(instance.state(), PlaybackState::Playing);
}

#[test]
fn instance_weight_is_clamped() {
    let mut instance = playing(static_clip("idle", 0, Vec3::ZERO, 1.0));
    instance.set_weight(1.5);
    assert!(approx(instance.weight(), 1.0));
    instance.set_weight(-0.2);
    assert!(approx(instance.weight(), 0.0));
}

// ============================================================================
// AnimationInstance: Markers & Root Motion
// ============================================================================

#[test]
fn markers_fire_when_crossed() {
    let clip = static_clip("walk", 0, Vec3::ZERO, 1.0).with_event("step", 0.5);
    let mut instance = playing(clip);

    instance.update(0.4);
    assert!(markers(&mut instance).is_empty());

    instance.update(0.2);
    assert_eq!(markers(&mut instance), ["step"]);

    instance.update(0.2);
    assert!(markers(&mut instance).is_empty());
}

#[test]
fn markers_fire_across_loop_wrap() {
    let clip = static_clip("walk", 0, Vec3::ZERO, 1.0)
        .with_looping(true)
        .with_event("start", 0.0)
        .with_event("late", 0.9);
    let mut instance = playing(clip);

    instance.update(0.5);
    assert_eq!(markers(&mut instance), ["start"]);

    instance.update(0.6);
    assert_eq!(markers(&mut instance), ["late", "start"]);
}

#[test]
fn marker_on_end_boundary_fires_once() {
    let clip = static_clip("attack", 0, Vec3::ZERO, 1.0).with_event("end", 1.0);
    let mut instance = playing(clip);
    instance.loop_mode = LoopMode::ClampForever;

    instance.update(2.0);
    assert_eq!(markers(&mut instance), ["end"]);
    instance.update(1.0);
    assert!(markers(&mut instance).is_empty());
}

#[test]
fn instance_events_do_not_touch_shared_clip() {
    let clip = Arc::new(static_clip("walk", 0, Vec3::ZERO, 1.0));
    let mut instance = AnimationInstance::new("a", Arc::clone(&clip));
    instance.register_event(0.3, "footstep");
    instance.play();

    instance.update(0.5);
    assert_eq!(markers(&mut instance), ["footstep"]);
    assert!(clip.events().is_empty());
}

#[test]
fn root_motion_scales_with_progress() {
    let clip = static_clip("walk", 0, Vec3::ZERO, 1.0)
        .with_root_motion(RootMotion::new(Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY));
    let mut instance = playing(clip);

    instance.update(0.25);
    assert_eq!(instance.root_motion_delta(), RootMotion::IDENTITY, "disabled by default");

    instance.set_root_motion_enabled(true);
    instance.update(0.25);
    assert!(approx_vec(instance.root_motion_delta().translation, Vec3::new(0.5, 0.0, 0.0)));
}

// ============================================================================
// PoseBlender
// ============================================================================

#[test]
fn blend_weighted_reproduces_endpoints() {
    let skeleton = rig();
    let mut a = Pose::bind(&skeleton);
    let mut b = Pose::bind(&skeleton);
    a.get_mut(1).unwrap().position = Vec3::new(1.0, 0.0, 0.0);
    b.get_mut(1).unwrap().position = Vec3::new(3.0, 0.0, 0.0);

    let mut out = Pose::bind(&skeleton);
    PoseBlender::blend_weighted(&mut out, &[(&a, 1.0), (&b, 0.0)]);
    assert_eq!(out.get(1), a.get(1));

    PoseBlender::blend_weighted(&mut out, &[(&a, 0.0), (&b, 1.0)]);
    assert_eq!(out.get(1), b.get(1));

    PoseBlender::blend_weighted(&mut out, &[(&a, 0.5), (&b, 0.5)]);
    assert!(approx_vec(out.get(1).unwrap().position, Vec3::new(2.0, 0.0, 0.0)));

    // Weights need not be normalized
    PoseBlender::blend_weighted(&mut out, &[(&a, 3.0), (&b, 1.0)]);
    assert!(approx_vec(out.get(1).unwrap().position, Vec3::new(1.5, 0.0, 0.0)));
}

#[test]
fn higher_priority_is_applied_last() {
    let skeleton = rig();
    let mut low = playing(static_clip("low", 1, Vec3::new(2.0, 0.0, 0.0), 1.0));
    let mut high = playing(static_clip("high", 1, Vec3::new(5.0, 0.0, 0.0), 1.0));
    low.priority = 0;
    high.priority = 1;

    let mut pose = Pose::bind(&skeleton);
    PoseBlender::blend_instances(&mut pose, &skeleton, &mut [&mut high, &mut low]);
    assert!(approx_vec(pose.get(1).unwrap().position, Vec3::new(5.0, 0.0, 0.0)));
}

#[test]
fn layer_orders_before_priority() {
    let skeleton = rig();
    let mut base = playing(static_clip("base", 1, Vec3::new(2.0, 0.0, 0.0), 1.0));
    let mut upper = playing(static_clip("upper", 1, Vec3::new(4.0, 0.0, 0.0), 1.0));
    base.priority = 100;
    upper.layer = 1;
    upper.priority = -5;

    let mut pose = Pose::bind(&skeleton);
    PoseBlender::blend_instances(&mut pose, &skeleton, &mut [&mut upper, &mut base]);
    assert!(approx_vec(pose.get(1).unwrap().position, Vec3::new(4.0, 0.0, 0.0)));
}

#[test]
fn partial_weight_blends_towards_bind() {
    let skeleton = rig();
    let mut instance = playing(static_clip("reach", 1, Vec3::new(3.0, 0.0, 0.0), 1.0));
    instance.set_weight(0.5);

    let mut pose = Pose::bind(&skeleton);
    PoseBlender::blend_instances(&mut pose, &skeleton, &mut [&mut instance]);
    // Bind x = 1, sample x = 3
    assert!(approx_vec(pose.get(1).unwrap().position, Vec3::new(2.0, 0.0, 0.0)));
}

#[test]
fn stopped_and_zero_weight_instances_are_skipped() {
    let skeleton = rig();
    let mut stopped = AnimationInstance::new("s", Arc::new(static_clip("s", 1, Vec3::splat(9.0), 1.0)));
    let mut silent = playing(static_clip("z", 1, Vec3::splat(7.0), 1.0));
    silent.set_weight(0.0);

    let mut pose = Pose::bind(&skeleton);
    PoseBlender::blend_instances(&mut pose, &skeleton, &mut [&mut stopped, &mut silent]);
    assert_eq!(pose.get(1), Some(&Transform::from_position(Vec3::X)));
}

#[test]
fn additive_adds_offset_from_bind() {
    let skeleton = rig();
    let mut base = playing(static_clip("base", 1, Vec3::new(2.0, 0.0, 0.0), 1.0));
    // Bind is (1, 0, 0): the additive sample carries a +1 Y offset
    let mut breathe = playing(static_clip("breathe", 1, Vec3::new(1.0, 1.0, 0.0), 1.0));
    breathe.blend_mode = BlendMode::Additive;
    breathe.set_weight(0.5);
    breathe.layer = 1;

    let mut pose = Pose::bind(&skeleton);
    PoseBlender::blend_instances(&mut pose, &skeleton, &mut [&mut base, &mut breathe]);
    assert!(approx_vec(pose.get(1).unwrap().position, Vec3::new(2.0, 0.5, 0.0)));
}

#[test]
fn additive_rotation_composes() {
    let skeleton = rig();
    let turn = Quat::from_rotation_y(0.4);
    let track = BoneTrack::new(
        1,
        vec![Keyframe::new(0.0, Vec3::X, turn, Vec3::ONE)],
        InterpolationMode::Linear,
    )
    .unwrap();
    let clip = AnimationClip::new("turn", vec![track]).with_duration(1.0).unwrap();

    let mut pose = Pose::bind(&skeleton);
    pose.get_mut(1).unwrap().rotation = Quat::from_rotation_x(0.2);
    PoseBlender::apply_clip(&mut pose, &skeleton, &clip, 0.0, 1.0, BlendMode::Additive);

    let expected = Quat::from_rotation_x(0.2) * turn;
    assert!(pose.get(1).unwrap().rotation.dot(expected).abs() > 1.0 - 1e-5);
}

// ============================================================================
// Blend Trees
// ============================================================================

fn locomotion() -> BlendNode {
    BlendNode::blend_1d(
        "speed",
        vec![
            (0.0, BlendNode::clip(Arc::new(static_clip("idle", 1, Vec3::new(0.0, 0.0, 0.0), 1.0)))),
            (1.0, BlendNode::clip(Arc::new(static_clip("walk", 1, Vec3::new(2.0, 0.0, 0.0), 1.0)))),
            (2.0, BlendNode::clip(Arc::new(static_clip("run", 1, Vec3::new(4.0, 0.0, 0.0), 3.0)))),
        ],
    )
    .unwrap()
}

#[test]
fn blend_1d_weights_are_piecewise_linear() {
    let node = locomotion();
    let mut params = Parameters::new();

    let cases = [
        (-1.0, [1.0, 0.0, 0.0]),
        (0.0, [1.0, 0.0, 0.0]),
        (0.5, [0.5, 0.5, 0.0]),
        (1.0, [0.0, 1.0, 0.0]),
        (1.75, [0.0, 0.25, 0.75]),
        (9.0, [0.0, 0.0, 1.0]),
    ];
    for (speed, expected) in cases {
        params.set_float("speed", speed);
        let weights = node.weights(&params);
        for (w, e) in weights.iter().zip(expected) {
            assert!(approx(*w, e), "speed {speed}: {weights:?}");
        }
    }
}

#[test]
fn blend_1d_rejects_unsorted_thresholds() {
    let clip = || BlendNode::clip(Arc::new(static_clip("c", 0, Vec3::ZERO, 1.0)));
    let result = BlendNode::blend_1d("speed", vec![(1.0, clip()), (1.0, clip())]);
    assert!(matches!(
        result,
        Err(AnimationError::UnsortedThresholds { index: 1, .. })
    ));
    assert!(matches!(
        BlendNode::blend_1d("speed", vec![]),
        Err(AnimationError::EmptyBlendNode(_))
    ));
}

#[test]
fn blend_1d_rejects_non_finite_thresholds() {
    let clip = || BlendNode::clip(Arc::new(static_clip("c", 0, Vec3::ZERO, 1.0)));
    assert!(matches!(
        BlendNode::blend_1d("speed", vec![(f32::NAN, clip()), (1.0, clip())]),
        Err(AnimationError::UnsortedThresholds { index: 0, .. })
    ));
    assert!(matches!(
        BlendNode::blend_1d("speed", vec![(0.0, clip()), (f32::INFINITY, clip())]),
        Err(AnimationError::UnsortedThresholds { index: 1, .. })
    ));
}

#[test]
fn blend_1d_non_finite_parameter_counts_as_zero() {
    let skeleton = rig();
    let node = locomotion();
    let mut params = Parameters::new();

    for speed in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        params.set_float("speed", speed);
        let weights = node.weights(&params);
        assert_eq!(weights.as_slice(), &[1.0, 0.0, 0.0], "speed {speed}");
        assert!(approx(node.duration(&params), 1.0));

        let mut pool = PosePool::new();
        let mut out = Pose::bind(&skeleton);
        let mut ctx = BlendContext {
            skeleton: &skeleton,
            parameters: &params,
            pool: &mut pool,
        };
        node.evaluate(&mut ctx, 0.5, &mut out);
        assert!(approx_vec(out.get(1).unwrap().position, Vec3::ZERO));
    }
}

#[test]
fn blend_1d_evaluates_between_children() {
    let skeleton = rig();
    let node = locomotion();
    let mut params = Parameters::new();
    params.set_float("speed", 0.25);

    let mut pool = PosePool::new();
    let mut out = Pose::bind(&skeleton);
    let mut ctx = BlendContext {
        skeleton: &skeleton,
        parameters: &params,
        pool: &mut pool,
    };
    node.evaluate(&mut ctx, 0.0, &mut out);
    assert!(approx_vec(out.get(1).unwrap().position, Vec3::new(0.5, 0.0, 0.0)));
}

#[test]
fn blend_duration_is_weighted_sum() {
    let node = locomotion();
    let mut params = Parameters::new();
    params.set_float("speed", 1.5);
    // walk 1s and run 3s at 50/50
    assert!(approx(node.duration(&params), 2.0));
}

#[test]
fn blend_2d_prefers_nearest_child() {
    let clip = |x: f32| BlendNode::clip(Arc::new(static_clip("c", 1, Vec3::new(x, 0.0, 0.0), 1.0)));
    let node = BlendNode::blend_2d(
        "x",
        "y",
        vec![
            (Vec2::new(0.0, 0.0), clip(0.0)),
            (Vec2::new(1.0, 0.0), clip(1.0)),
            (Vec2::new(0.0, 1.0), clip(2.0)),
        ],
    )
    .unwrap();

    let mut params = Parameters::new();
    params.set_float("x", 0.9);
    params.set_float("y", 0.0);
    let weights = node.weights(&params);

    assert!(approx(weights.iter().sum::<f32>(), 1.0));
    assert!(weights[1] > weights[0] && weights[1] > weights[2], "{weights:?}");
}

#[test]
fn blend_2d_handles_non_finite_input() {
    let clip = || BlendNode::clip(Arc::new(static_clip("c", 1, Vec3::ZERO, 1.0)));
    assert!(matches!(
        BlendNode::blend_2d("x", "y", vec![(Vec2::new(f32::NAN, 0.0), clip())]),
        Err(AnimationError::NonFinitePosition { index: 0, .. })
    ));

    let node = BlendNode::blend_2d(
        "x",
        "y",
        vec![(Vec2::ZERO, clip()), (Vec2::new(4.0, 0.0), clip())],
    )
    .unwrap();
    let mut params = Parameters::new();
    params.set_float("x", f32::NAN);
    params.set_float("y", f32::INFINITY);
    let weights = node.weights(&params);
    assert!(weights.iter().all(|w| w.is_finite()), "{weights:?}");
    assert!(approx(weights.iter().sum::<f32>(), 1.0));
    // Read as the origin, so the child sitting there wins
    assert!(weights[0] > weights[1]);
}

#[test]
fn layer_replace_only_touches_animated_bones() {
    let skeleton = rig();
    let base = BlendNode::clip(Arc::new(static_clip("base", 0, Vec3::new(0.0, 5.0, 0.0), 1.0)));
    let arm = BlendNode::clip(Arc::new(static_clip("arm", 1, Vec3::new(3.0, 0.0, 0.0), 1.0)));
    let node = BlendNode::layered(base, vec![BlendLayer::new(arm, 1.0, BlendMode::Replace)]);

    let params = Parameters::new();
    let mut pool = PosePool::new();
    let mut out = Pose::bind(&skeleton);
    let mut ctx = BlendContext {
        skeleton: &skeleton,
        parameters: &params,
        pool: &mut pool,
    };
    node.evaluate(&mut ctx, 0.0, &mut out);

    assert!(approx_vec(out.get(0).unwrap().position, Vec3::new(0.0, 5.0, 0.0)));
    assert!(approx_vec(out.get(1).unwrap().position, Vec3::new(3.0, 0.0, 0.0)));
}
