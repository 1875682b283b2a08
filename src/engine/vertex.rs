use std::mem::offset_of;

use renderer::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

/// Maximum number of bones that can influence a single vertex.
pub const MAX_BONES_PER_VERTEX: usize = 4;

bitflags::bitflags! {
    /// The set of attributes a mesh actually provides.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VertexAttributes: u16 {
        const POSITION = 1 << 0;
        const NORMAL = 1 << 1;
        const COLOR = 1 << 2;
        const TEX_COORD = 1 << 3;
        const TANGENT = 1 << 4;
        const BITANGENT = 1 << 5;
        const JOINTS = 1 << 6;
        const WEIGHTS = 1 << 7;
    }
}

/// Every vertex carries all attributes; [VertexAttributes] decides which ones are bound.
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
    pub color: [f32; 4],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub joints: [u32; MAX_BONES_PER_VERTEX],
    pub weights: [f32; MAX_BONES_PER_VERTEX],
}

impl SkinnedVertex {
    /// Add a bone influence to the first free slot. Returns false if all slots are taken.
    pub fn add_bone_influence(&mut self, joint: u32, weight: f32) -> bool {
        match self.weights.iter().position(|w| *w == 0.0) {
            Some(slot) => {
                self.joints[slot] = joint;
                self.weights[slot] = weight;
                true
            }
            None => false,
        }
    }
}

impl VertexAttributes {
    /// Format and offset inside [SkinnedVertex] of a single attribute flag.
    fn format_and_offset(self) -> Option<(VertexFormat, usize)> {
        let table = [
            (Self::POSITION, VertexFormat::Float32x3, offset_of!(SkinnedVertex, position)),
            (Self::NORMAL, VertexFormat::Float32x3, offset_of!(SkinnedVertex, normal)),
            (Self::COLOR, VertexFormat::Float32x4, offset_of!(SkinnedVertex, color)),
            (Self::TEX_COORD, VertexFormat::Float32x2, offset_of!(SkinnedVertex, tex_coord)),
            (Self::TANGENT, VertexFormat::Float32x3, offset_of!(SkinnedVertex, tangent)),
            (Self::BITANGENT, VertexFormat::Float32x3, offset_of!(SkinnedVertex, bitangent)),
            (Self::JOINTS, VertexFormat::Uint32x4, offset_of!(SkinnedVertex, joints)),
            (Self::WEIGHTS, VertexFormat::Float32x4, offset_of!(SkinnedVertex, weights)),
        ];

        table
            .into_iter()
            .find(|(flag, _, _)| *flag == self)
            .map(|(_, format, offset)| (format, offset))
    }

    /// Attribute descriptions for the attributes in this set, in declaration order, with shader
    /// locations assigned sequentially.
    pub fn vertex_attributes(self) -> Vec<VertexAttribute> {
        self.iter()
            .filter_map(VertexAttributes::format_and_offset)
            .enumerate()
            .map(|(location, (format, offset))| {
                VertexAttribute {
                    format,
                    offset: offset as u64,
                    shader_location: location as u32,
                }
            })
            .collect()
    }

    /// Layout of a [SkinnedVertex] buffer exposing only the attributes in this set.
    pub fn vertex_buffer_layout(self) -> VertexBufferLayout {
        let layout = VertexBufferLayout {
            array_stride: std::mem::size_of::<SkinnedVertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: self.vertex_attributes(),
        };
        debug_assert!(layout.fits_stride());
        layout
    }
}
