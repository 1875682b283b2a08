use crate::engine::pose::Pose;

use super::MAX_ANIMATIONS;

/// A snapshot of every bone's local pose at a single point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationNode {
    /// Time in ticks.
    pub time: f64,
    /// Indexed by [super::BoneIndex].
    pub bones: Vec<Pose>,
}

/// A looping clip, resampled so that every node holds a pose for every bone.
#[derive(Clone, Debug, Default)]
pub struct Animation {
    pub name: String,
    pub total_ticks: f64,
    pub ticks_per_second: f64,
    /// Length of the clip in seconds.
    pub duration: f32,
    /// Sorted by time.
    pub animation_nodes: Vec<AnimationNode>,
}

impl Animation {
    /// A clip without nodes can not be evaluated and leaves characters in their last pose.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.animation_nodes.is_empty()
    }
}

/// The clips of a single model, shared between all characters using it.
#[derive(Clone, Debug, Default)]
pub struct AnimationSet {
    animations: Vec<Animation>,
}

impl AnimationSet {
    pub fn new(animations: impl IntoIterator<Item = Animation>) -> Self {
        let mut set = Self::default();
        for animation in animations {
            set.push(animation);
        }
        set
    }

    /// Add a clip, returning its index. Returns `None` when the set is full.
    pub fn push(&mut self, animation: Animation) -> Option<usize> {
        if self.animations.len() >= MAX_ANIMATIONS {
            tracing::warn!(
                "Only {MAX_ANIMATIONS} animations are supported, dropping \"{}\".",
                animation.name
            );
            return None;
        }
        self.animations.push(animation);
        Some(self.animations.len() - 1)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Animation> {
        self.animations.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Animation> {
        self.animations.iter()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.animations.iter().position(|a| a.name == name)
    }
}
