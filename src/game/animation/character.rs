use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::Mat4;

use crate::engine::pose::Pose;

use super::{AnimationSet, Skeleton, advance_ticks, evaluate_pose};

/// Which clip a character plays and how far into it it is.
#[derive(Clone, Debug)]
pub struct CharacterAnimationData {
    pub current_animation_index: usize,
    /// Play head inside the current clip, in ticks.
    pub current_ticks: f64,
    pub animations: Arc<AnimationSet>,
}

impl CharacterAnimationData {
    pub fn new(animations: Arc<AnimationSet>) -> Self {
        Self {
            current_animation_index: 0,
            current_ticks: 0.0,
            animations,
        }
    }
}

/// An animated character. Owns its skeleton, so characters can be ticked independently.
#[derive(Component, Clone, Debug)]
pub struct CharacterData {
    /// Placement of the character in the world.
    pub character_orientation: Pose,
    pub inverse_global_transformation: Mat4,
    pub skeleton: Skeleton,
    pub animation_data: CharacterAnimationData,
}

impl CharacterData {
    pub fn new(
        character_orientation: Pose,
        inverse_global_transformation: Mat4,
        skeleton: Skeleton,
        animations: Arc<AnimationSet>,
    ) -> Self {
        Self {
            character_orientation,
            inverse_global_transformation,
            skeleton,
            animation_data: CharacterAnimationData::new(animations),
        }
    }

    /// Switch to another clip, starting it from the beginning. Indices past the model's clips are
    /// ignored.
    pub fn play(&mut self, index: usize) -> bool {
        let Some(animation) = self.animation_data.animations.get(index) else {
            tracing::warn!(
                "No animation {index}, the model has {}.",
                self.animation_data.animations.len()
            );
            return false;
        };

        tracing::debug!("Playing animation {index} ({}).", animation.name);
        self.animation_data.current_animation_index = index;
        self.animation_data.current_ticks = 0.0;
        true
    }

    /// Advance the current clip by `delta_time` seconds and pose the skeleton. Characters without
    /// a usable clip keep their last pose.
    pub fn advance_animation(&mut self, delta_time: f32) {
        let animation_data = &mut self.animation_data;
        let Some(animation) = animation_data
            .animations
            .get(animation_data.current_animation_index)
        else {
            return;
        };

        if animation.is_empty() {
            return;
        }

        animation_data.current_ticks =
            advance_ticks(animation_data.current_ticks, delta_time, animation);

        evaluate_pose(
            &mut self.skeleton,
            animation,
            animation_data.current_ticks,
            &self.inverse_global_transformation,
        );
    }

    /// The skinning matrices produced by the last [Self::advance_animation], one per bone.
    #[inline]
    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.skeleton.bone_transformations
    }

    #[inline]
    pub fn model_matrix(&self) -> Mat4 {
        self.character_orientation.transformation_matrix()
    }
}
