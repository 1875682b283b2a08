use std::collections::VecDeque;

use ahash::{HashMap, HashMapExt};
use glam::Mat4;

use crate::engine::{assets::SceneNode, pose::Pose};

use super::{BoneIndex, CONTROL_NODE_MARKER, MAX_BONES, NameLookup};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SkeletonError {
    #[error("Skeleton has no bones")]
    Empty,

    #[error("Root bone has a parent ({0})")]
    RootHasParent(BoneIndex),

    #[error("Bone {0} has no parent, only the root may")]
    MultipleRoots(BoneIndex),

    #[error("Bone {bone} references parent {parent} which is not built before it")]
    ParentNotBuilt { bone: BoneIndex, parent: BoneIndex },

    #[error("Bone {bone} references invalid child {child}")]
    InvalidChild { bone: BoneIndex, child: BoneIndex },

    #[error("Skeleton has {0} bones, at most {max} are supported", max = MAX_BONES)]
    TooManyBones(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoneNode {
    /// Inverse bind pose of the bone.
    pub bone_offset: Mat4,
    /// `None` only for the root.
    pub parent: Option<BoneIndex>,
    pub children: Vec<BoneIndex>,
}

/// A validated bone hierarchy where every parent comes before its children.
#[derive(Clone, Debug)]
pub struct Skeleton {
    /// Composed transform of each bone, rewritten every evaluation.
    pub bone_transformations: Vec<Mat4>,
    bones: Vec<BoneNode>,
}

impl Skeleton {
    pub fn new(bones: Vec<BoneNode>) -> Result<Self, SkeletonError> {
        let Some(root) = bones.first() else {
            return Err(SkeletonError::Empty);
        };

        if bones.len() > MAX_BONES {
            return Err(SkeletonError::TooManyBones(bones.len()));
        }

        if let Some(parent) = root.parent {
            return Err(SkeletonError::RootHasParent(parent));
        }

        for (index, bone) in bones.iter().enumerate().skip(1) {
            let index = index as BoneIndex;
            match bone.parent {
                None => return Err(SkeletonError::MultipleRoots(index)),
                Some(parent) if parent >= index => {
                    return Err(SkeletonError::ParentNotBuilt {
                        bone: index,
                        parent,
                    });
                }
                Some(_) => {}
            }
        }

        for (index, bone) in bones.iter().enumerate() {
            let index = index as BoneIndex;
            for &child in bone.children.iter() {
                let valid = bones
                    .get(child as usize)
                    .is_some_and(|c| c.parent == Some(index));
                if !valid {
                    return Err(SkeletonError::InvalidChild { bone: index, child });
                }
            }
        }

        Ok(Self {
            bone_transformations: vec![Mat4::IDENTITY; bones.len()],
            bones,
        })
    }

    #[inline]
    pub fn bones(&self) -> &[BoneNode] {
        &self.bones
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }
}

/// Result of walking a scene node tree.
#[derive(Clone, Debug)]
pub struct BuiltSkeleton {
    pub skeleton: Skeleton,
    pub name_lookup: NameLookup,
    /// Local transform of each bone in the scene, used for bones a clip does not animate.
    pub rest_poses: Vec<Pose>,
}

/// Flattens a scene node tree into a [Skeleton] in breadth-first order.
pub struct SkeletonBuilder<'a> {
    control_node_marker: &'a str,
    bone_offsets: HashMap<String, Mat4>,
}

impl Default for SkeletonBuilder<'_> {
    fn default() -> Self {
        Self::new(CONTROL_NODE_MARKER)
    }
}

impl<'a> SkeletonBuilder<'a> {
    pub fn new(control_node_marker: &'a str) -> Self {
        Self {
            control_node_marker,
            bone_offsets: HashMap::new(),
        }
    }

    /// Set the inverse bind pose of the named bone. Bones without one get identity.
    pub fn with_bone_offset(mut self, name: impl Into<String>, offset: Mat4) -> Self {
        self.bone_offsets.insert(name.into(), offset);
        self
    }

    pub fn with_bone_offsets(
        mut self,
        offsets: impl IntoIterator<Item = (String, Mat4)>,
    ) -> Self {
        self.bone_offsets.extend(offsets);
        self
    }

    fn is_control_node(&self, node: &SceneNode) -> bool {
        !self.control_node_marker.is_empty() && node.name.contains(self.control_node_marker)
    }

    fn bone_offset(&self, name: &str) -> Mat4 {
        self.bone_offsets
            .get(name)
            .copied()
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn build(&self, root: &SceneNode) -> Result<BuiltSkeleton, SkeletonError> {
        let mut bones = vec![BoneNode {
            bone_offset: self.bone_offset(&root.name),
            parent: None,
            children: Vec::default(),
        }];
        let mut rest_poses = vec![Pose::from_matrix(&root.transform)];
        let mut name_lookup = NameLookup::default();
        name_lookup.insert(root.name.clone(), 0);

        let mut queue = VecDeque::from([(root, 0 as BoneIndex)]);

        while let Some((node, index)) = queue.pop_front() {
            for child in node.children.iter() {
                if self.is_control_node(child) {
                    tracing::debug!("Skipping control node {} and its children.", child.name);
                    continue;
                }

                let child_index = bones.len() as BoneIndex;
                bones.push(BoneNode {
                    bone_offset: self.bone_offset(&child.name),
                    parent: Some(index),
                    children: Vec::default(),
                });
                bones[index as usize].children.push(child_index);
                rest_poses.push(Pose::from_matrix(&child.transform));

                if name_lookup
                    .insert(child.name.clone(), child_index)
                    .is_some()
                {
                    tracing::warn!(
                        "Duplicate bone name {}, tracks will drive bone {child_index}.",
                        child.name
                    );
                }

                queue.push_back((child, child_index));
            }
        }

        Ok(BuiltSkeleton {
            skeleton: Skeleton::new(bones)?,
            name_lookup,
            rest_poses,
        })
    }
}
