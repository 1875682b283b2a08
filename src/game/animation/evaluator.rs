use glam::Mat4;

use crate::engine::pose::Pose;

use super::{Animation, Skeleton};

/// Move the play head of a looping clip forward by `delta_time` seconds. The result is always in
/// `[0, total_ticks)`.
pub fn advance_ticks(current_ticks: f64, delta_time: f32, animation: &Animation) -> f64 {
    if animation.total_ticks <= 0.0 {
        return 0.0;
    }

    let ticks =
        (current_ticks + delta_time as f64 * animation.ticks_per_second) % animation.total_ticks;
    if ticks < 0.0 {
        ticks + animation.total_ticks
    } else {
        ticks
    }
}

/// The pair of nodes surrounding `ticks` and the interpolation factor between them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeBracket {
    pub first: usize,
    pub second: usize,
    pub factor: f32,
}

/// Find the last node at or before `ticks` and the one after it. The node after the last node is
/// the first one, so the clip loops without a seam.
pub fn find_bracket(animation: &Animation, ticks: f64) -> Option<NodeBracket> {
    let nodes = &animation.animation_nodes;
    if nodes.is_empty() {
        return None;
    }

    let mut first = 0;
    while first < nodes.len() - 1 && nodes[first + 1].time <= ticks {
        first += 1;
    }
    let second = (first + 1) % nodes.len();

    let mut time_diff = nodes[second].time - nodes[first].time;
    if time_diff < 0.0 {
        time_diff += animation.total_ticks;
    }

    let factor = if time_diff > 0.0 {
        ((ticks - nodes[first].time) / time_diff) as f32
    } else {
        0.0
    };

    Some(NodeBracket {
        first,
        second,
        factor,
    })
}

/// Evaluate the clip at `ticks` into the skeleton's bone transformations, leaving the final
/// skinning matrices (`inverse_global * world * bone_offset`) in
/// [Skeleton::bone_transformations].
///
/// Returns false and leaves the transformations untouched if the clip can not drive this
/// skeleton.
pub fn evaluate_pose(
    skeleton: &mut Skeleton,
    animation: &Animation,
    ticks: f64,
    inverse_global_transformation: &Mat4,
) -> bool {
    let Some(bracket) = find_bracket(animation, ticks) else {
        return false;
    };

    let first = &animation.animation_nodes[bracket.first];
    let second = &animation.animation_nodes[bracket.second];

    let bone_count = skeleton.bone_count();
    if first.bones.len() < bone_count || second.bones.len() < bone_count {
        tracing::trace!(
            "Clip \"{}\" has poses for {} bones, skeleton has {bone_count}.",
            animation.name,
            first.bones.len().min(second.bones.len())
        );
        return false;
    }

    // Parents always come before their children, so the parent's world transform is ready by
    // the time a child needs it.
    for index in 0..bone_count {
        let local = Pose::interpolate(&first.bones[index], &second.bones[index], bracket.factor)
            .transformation_matrix();

        let parent = skeleton.bones()[index]
            .parent
            .map(|parent| skeleton.bone_transformations[parent as usize])
            .unwrap_or(Mat4::IDENTITY);

        skeleton.bone_transformations[index] = parent * local;
    }

    for index in 0..bone_count {
        let bone_offset = skeleton.bones()[index].bone_offset;
        let world = skeleton.bone_transformations[index];
        skeleton.bone_transformations[index] = *inverse_global_transformation * world * bone_offset;
    }

    true
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::game::animation::{AnimationNode, BoneNode, test_utils::approx_mat4};

    fn node(time: f64, bones: Vec<Pose>) -> AnimationNode {
        AnimationNode { time, bones }
    }

    fn clip(total_ticks: f64, ticks_per_second: f64, nodes: Vec<AnimationNode>) -> Animation {
        Animation {
            name: "test".to_string(),
            total_ticks,
            ticks_per_second,
            duration: (total_ticks / ticks_per_second) as f32,
            animation_nodes: nodes,
        }
    }

    fn chain(length: usize) -> Skeleton {
        let bones = (0..length)
            .map(|i| BoneNode {
                bone_offset: Mat4::IDENTITY,
                parent: i.checked_sub(1).map(|p| p as u32),
                children: if i + 1 < length {
                    vec![i as u32 + 1]
                } else {
                    vec![]
                },
            })
            .collect();
        Skeleton::new(bones).unwrap()
    }

    #[test]
    fn looping_a_full_clip_lands_on_the_same_tick() {
        let animation = clip(
            8.0,
            4.0,
            vec![node(0.0, vec![Pose::IDENTITY]), node(4.0, vec![Pose::IDENTITY])],
        );

        let start = 2.0;
        let before = find_bracket(&animation, start).unwrap();

        // 2 seconds at 4 ticks per second is exactly one loop.
        let ticks = advance_ticks(start, 2.0, &animation);
        assert_eq!(ticks, start);
        assert_eq!(find_bracket(&animation, ticks).unwrap(), before);
    }

    #[test]
    fn last_node_wraps_to_first() {
        let animation = clip(
            8.0,
            1.0,
            vec![node(0.0, vec![Pose::IDENTITY]), node(4.0, vec![Pose::IDENTITY])],
        );

        let bracket = find_bracket(&animation, 6.0).unwrap();
        assert_eq!(bracket.first, 1);
        assert_eq!(bracket.second, 0);
        // 0 - 4 + 8 = 4 ticks between the nodes, 2 of them have passed.
        assert!((bracket.factor - 0.5).abs() < 1e-6);

        let bracket = find_bracket(&animation, 4.0).unwrap();
        assert_eq!((bracket.first, bracket.second), (1, 0));
        assert_eq!(bracket.factor, 0.0);
    }

    #[test]
    fn negative_time_wraps_backwards() {
        let animation = clip(10.0, 1.0, vec![node(0.0, vec![Pose::IDENTITY])]);
        assert_eq!(advance_ticks(1.0, -3.0, &animation), 8.0);
    }

    #[test]
    fn empty_clip_is_not_evaluated() {
        let mut skeleton = chain(2);
        skeleton.bone_transformations[1] = Mat4::from_translation(Vec3::X);

        let animation = clip(10.0, 1.0, vec![]);
        assert!(!evaluate_pose(&mut skeleton, &animation, 0.0, &Mat4::IDENTITY));
        assert_eq!(skeleton.bone_transformations[1], Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn clip_for_a_smaller_skeleton_is_not_evaluated() {
        let mut skeleton = chain(3);
        let animation = clip(10.0, 1.0, vec![node(0.0, vec![Pose::IDENTITY; 2])]);
        assert!(!evaluate_pose(&mut skeleton, &animation, 0.0, &Mat4::IDENTITY));
    }

    #[test]
    fn transforms_compose_down_the_hierarchy() {
        let mut skeleton = chain(3);
        let step = Pose::from_position(Vec3::X);
        let animation = clip(10.0, 1.0, vec![node(0.0, vec![step; 3])]);

        assert!(evaluate_pose(&mut skeleton, &animation, 0.0, &Mat4::IDENTITY));

        let transforms = &skeleton.bone_transformations;
        assert!(approx_mat4(&transforms[0], &Mat4::from_translation(Vec3::X)));
        assert!(approx_mat4(&transforms[1], &Mat4::from_translation(Vec3::X * 2.0)));
        assert!(approx_mat4(&transforms[2], &Mat4::from_translation(Vec3::X * 3.0)));
    }

    #[test]
    fn offsets_and_global_inverse_are_applied_after_composition() {
        let bones = vec![
            BoneNode {
                bone_offset: Mat4::IDENTITY,
                parent: None,
                children: vec![1],
            },
            BoneNode {
                bone_offset: Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
                parent: Some(0),
                children: vec![],
            },
        ];
        let mut skeleton = Skeleton::new(bones).unwrap();

        let root = Pose::from_orientation(glam::Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let arm = Pose::from_position(Vec3::new(0.0, 1.0, 0.0));
        let animation = clip(10.0, 1.0, vec![node(0.0, vec![root, arm])]);

        let inverse_global = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        assert!(evaluate_pose(&mut skeleton, &animation, 0.0, &inverse_global));

        let world_arm = root.transformation_matrix() * arm.transformation_matrix();
        let expected =
            inverse_global * world_arm * Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0));
        assert!(approx_mat4(&skeleton.bone_transformations[1], &expected));

        // A vertex sitting on the arm in the bind pose follows the root's rotation.
        let vertex = skeleton.bone_transformations[1].transform_point3(Vec3::new(0.0, 1.0, 0.0));
        assert!(vertex.abs_diff_eq(Vec3::new(-1.0, 0.0, -5.0), 1e-5));
    }

    #[test]
    fn interpolates_between_bracketing_nodes() {
        let mut skeleton = chain(1);
        let animation = clip(
            20.0,
            1.0,
            vec![
                node(0.0, vec![Pose::IDENTITY]),
                node(10.0, vec![Pose::from_position(Vec3::new(10.0, 0.0, 0.0))]),
            ],
        );

        assert!(evaluate_pose(&mut skeleton, &animation, 5.0, &Mat4::IDENTITY));
        assert!(approx_mat4(
            &skeleton.bone_transformations[0],
            &Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))
        ));

        // Past the last node the pose blends back to the first one.
        assert!(evaluate_pose(&mut skeleton, &animation, 15.0, &Mat4::IDENTITY));
        assert!(approx_mat4(
            &skeleton.bone_transformations[0],
            &Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))
        ));
    }
}
