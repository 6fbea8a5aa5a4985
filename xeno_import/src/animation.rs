use tracing::{debug, warn};

use xeno_bc::Animation;

use crate::{
    transform::{axis_correction, decode_transform},
    AnimationTrack, ImportSession, Interpolation, KeySpace, SceneSink, TimeResolution,
    TransformKey,
};

/// Longest animation sampled, in host frames.
pub const MAX_SAMPLED_FRAMES: i64 = 1 << 16;

/// Snaps the length of an animation to whole frames of the host.
/// Returns the last frame's tick, the range starts at 0.
#[must_use]
pub fn animation_end(frame_time: f32, frame_count: u32, resolution: TimeResolution) -> i64 {
    let ticks_per_frame = i64::from(resolution.ticks_per_frame).max(1);
    let mut ticks =
        (frame_time * frame_count as f32 * resolution.ticks_per_second as f32).trunc() as i64;

    let remainder = ticks % ticks_per_frame;
    if remainder > ticks_per_frame / 2 {
        ticks += ticks_per_frame - remainder;
    } else {
        ticks -= remainder;
    }

    ticks - ticks_per_frame
}

/// Like [`animation_end`], but never past [`MAX_SAMPLED_FRAMES`] frames.
#[must_use]
pub fn sampled_end(frame_time: f32, frame_count: u32, resolution: TimeResolution) -> i64 {
    let ticks_per_frame = i64::from(resolution.ticks_per_frame).max(1);
    let end = animation_end(frame_time, frame_count, resolution);
    let limit = (MAX_SAMPLED_FRAMES - 1) * ticks_per_frame;

    if end > limit {
        warn!(
            "animation is {} frames long, sampling the first {}",
            end / ticks_per_frame + 1,
            MAX_SAMPLED_FRAMES
        );
        limit
    } else {
        end
    }
}

/// Ticks of every frame boundary in `[0, end]`.
fn sample_ticks(end: i64, resolution: TimeResolution) -> Vec<i64> {
    let step = i64::from(resolution.ticks_per_frame).max(1);
    (0..=end.max(0)).step_by(step as usize).collect()
}

/// Samples every animated bone once per host frame and hands the tracks to the sink.
///
/// Bones are matched by the index tagged in [`crate::skeleton::load_skeleton`].
pub fn load_animation<S: SceneSink>(
    sink: &mut S,
    session: &ImportSession<S>,
    animation: &Animation,
) {
    let settings = &session.settings;
    let resolution = sink.time_resolution();

    let end = sampled_end(animation.frame_time(), animation.frame_count(), resolution);
    sink.set_animation_range(0, end.max(0));

    let ticks = sample_ticks(end, resolution);
    let mut animated = 0;

    for (bone_index, &track_index) in animation.bone_table().iter().enumerate() {
        if track_index < 0 {
            continue;
        }

        let node = match sink.find_bone(bone_index) {
            Some(node) => node,
            None => {
                warn!("couldn't find node of bone {}", bone_index);
                continue;
            }
        };
        let is_root = sink.parent(&node).is_none();

        let keys = ticks
            .iter()
            .filter_map(|&tick| {
                let seconds = tick as f32 / resolution.ticks_per_second as f32;
                let frame = animation.sample(track_index as usize, seconds)?;
                let sampled = decode_transform(
                    frame.translation,
                    frame.rotation,
                    frame.scale,
                    settings.unit_scale,
                );

                let transform = if settings.global_frames || is_root {
                    axis_correction() * sampled
                } else {
                    sampled
                };

                Some(TransformKey { tick, transform })
            })
            .collect();

        let linear = AnimationTrack {
            space: if settings.global_frames {
                KeySpace::World
            } else {
                KeySpace::Local
            },
            interpolation: Interpolation::Linear,
            keys,
        };

        // keys are sampled on every frame, so only the interpolator changes
        let smooth = AnimationTrack {
            interpolation: Interpolation::Smooth,
            ..linear
        };

        sink.set_track(&node, smooth);
        animated += 1;
    }

    debug!("animated {} bones over {} frames", animated, ticks.len());
}
