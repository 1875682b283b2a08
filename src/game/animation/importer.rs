use glam::{Quat, Vec3};

use crate::engine::{
    assets::{BoneChannel, ImportedClip},
    pose::Pose,
    track::TrackCursor,
};

use super::{Animation, AnimationNode, BoneIndex, DEFAULT_TICKS_PER_SECOND, NameLookup};

/// Converts imported clips into [Animation]s for a specific skeleton.
///
/// Every bone's position, rotation and scale tracks are merged into a single list of poses, and
/// those lists are laid side by side into the clip's nodes. Bones that need fewer samples than
/// the densest bone repeat their last pose in the remaining nodes.
pub struct ClipImporter<'a> {
    name_lookup: &'a NameLookup,
    rest_poses: &'a [Pose],
    fallback_ticks_per_second: f64,
}

impl<'a> ClipImporter<'a> {
    pub fn new(name_lookup: &'a NameLookup, rest_poses: &'a [Pose]) -> Self {
        Self {
            name_lookup,
            rest_poses,
            fallback_ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }

    pub fn with_fallback_ticks_per_second(mut self, ticks_per_second: f64) -> Self {
        if ticks_per_second > 0.0 {
            self.fallback_ticks_per_second = ticks_per_second;
        } else {
            tracing::warn!("Ignoring non-positive fallback ticks per second ({ticks_per_second}).");
        }
        self
    }

    #[inline]
    fn bone_count(&self) -> usize {
        self.rest_poses.len()
    }

    pub fn import(&self, clip: &ImportedClip) -> Animation {
        let ticks_per_second = if clip.ticks_per_second > 0.0 {
            clip.ticks_per_second
        } else {
            self.fallback_ticks_per_second
        };

        let total_ticks = if clip.duration_ticks > 0.0 {
            clip.duration_ticks
        } else {
            let last_key = clip
                .channels
                .iter()
                .flat_map(|c| {
                    [
                        c.positions.last_time(),
                        c.rotations.last_time(),
                        c.scales.last_time(),
                    ]
                })
                .flatten()
                .fold(0.0_f64, f64::max);
            tracing::debug!(
                "Clip \"{}\" has no duration, using its last key ({last_key}).",
                clip.name
            );
            last_key
        };

        let mut bone_samples: Vec<(BoneIndex, Vec<(f64, Pose)>)> = Vec::new();

        for channel in clip.channels.iter() {
            let Some(&bone_index) = self.name_lookup.get(&channel.bone_name) else {
                tracing::warn!(
                    "Clip \"{}\": discarding track for unknown bone \"{}\".",
                    clip.name,
                    channel.bone_name
                );
                continue;
            };

            if bone_index as usize >= self.bone_count() {
                tracing::warn!(
                    "Clip \"{}\": bone \"{}\" ({bone_index}) is out of range.",
                    clip.name,
                    channel.bone_name
                );
                continue;
            }

            let samples = merge_channel(channel, self.rest_poses[bone_index as usize], total_ticks);
            if samples.is_empty() {
                continue;
            }

            match bone_samples.iter_mut().find(|(index, _)| *index == bone_index) {
                Some(existing) => {
                    tracing::warn!(
                        "Clip \"{}\": bone \"{}\" has more than one track, using the last.",
                        clip.name,
                        channel.bone_name
                    );
                    existing.1 = samples;
                }
                None => bone_samples.push((bone_index, samples)),
            }
        }

        let animation_nodes = self.lay_out_nodes(&clip.name, &mut bone_samples);

        if animation_nodes.is_empty() {
            tracing::warn!("Clip \"{}\" animates none of the skeleton's bones.", clip.name);
        }

        Animation {
            name: clip.name.clone(),
            total_ticks,
            ticks_per_second,
            duration: (total_ticks / ticks_per_second) as f32,
            animation_nodes,
        }
    }

    /// Lay the merged samples of every bone side by side. The bone with the most samples (the
    /// lowest index on a tie) provides the node times. Bones with fewer samples repeat their last
    /// pose in the remaining nodes.
    fn lay_out_nodes(
        &self,
        clip_name: &str,
        bone_samples: &mut [(BoneIndex, Vec<(f64, Pose)>)],
    ) -> Vec<AnimationNode> {
        bone_samples.sort_by(|(a_index, a), (b_index, b)| {
            b.len().cmp(&a.len()).then(a_index.cmp(b_index))
        });

        let Some((timeline_bone, timeline)) = bone_samples.first() else {
            return Vec::new();
        };

        let sparsest = bone_samples.last().map_or(0, |(_, samples)| samples.len());
        if sparsest < timeline.len() {
            tracing::warn!(
                "Clip \"{clip_name}\": bone {timeline_bone} needs {} nodes, the sparsest bone \
                 only {}. Sparser bones repeat their last pose.",
                timeline.len(),
                sparsest
            );
        }

        let mut nodes = timeline
            .iter()
            .map(|&(time, _)| AnimationNode {
                time,
                bones: self.rest_poses.to_vec(),
            })
            .collect::<Vec<_>>();

        for (bone_index, samples) in bone_samples.iter() {
            let Some(&(_, last_pose)) = samples.last() else {
                continue;
            };
            for (slot, node) in nodes.iter_mut().enumerate() {
                node.bones[*bone_index as usize] =
                    samples.get(slot).map_or(last_pose, |(_, pose)| *pose);
            }
        }

        nodes
    }
}

/// Walk the position, rotation and scale tracks of a bone together, producing one pose at every
/// time any of the tracks has a key. Each attribute is interpolated between its own keys.
fn merge_channel(channel: &BoneChannel, rest_pose: Pose, total_ticks: f64) -> Vec<(f64, Pose)> {
    let mut positions = channel.positions.cursor(total_ticks, rest_pose.position);
    let mut rotations = channel.rotations.cursor(total_ticks, rest_pose.orientation);
    let mut scales = channel.scales.cursor(total_ticks, rest_pose.scale);

    // Nothing to interpolate, the bone holds a single pose for the whole clip.
    if all_finished(&positions, &rotations, &scales) {
        return vec![(0.0, sample_pose(0.0, &positions, &rotations, &scales))];
    }

    // Every step passes at least one key, unless the keys lie beyond the end of the clip.
    let max_steps = channel.positions.len() + channel.rotations.len() + channel.scales.len();

    let mut samples = Vec::with_capacity(channel.max_key_count());
    while !all_finished(&positions, &rotations, &scales) && samples.len() < max_steps {
        let time = positions
            .current_time()
            .min(rotations.current_time())
            .min(scales.current_time());

        samples.push((time, sample_pose(time, &positions, &rotations, &scales)));

        positions.advance(time);
        rotations.advance(time);
        scales.advance(time);
    }

    samples
}

fn sample_pose(
    time: f64,
    positions: &TrackCursor<Vec3>,
    rotations: &TrackCursor<Quat>,
    scales: &TrackCursor<Vec3>,
) -> Pose {
    Pose::new(
        positions.sample(time),
        rotations.sample(time),
        scales.sample(time),
    )
}

fn all_finished(
    positions: &TrackCursor<Vec3>,
    rotations: &TrackCursor<Quat>,
    scales: &TrackCursor<Vec3>,
) -> bool {
    positions.is_finished() && rotations.is_finished() && scales.is_finished()
}
