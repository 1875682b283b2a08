/// Formats of the vertex attributes meshes use.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32x4,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub fn size(self) -> u64 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 | Self::Uint32x4 => 16,
        }
    }

    pub fn to_wgpu(self) -> wgpu::VertexFormat {
        match self {
            Self::Float32x2 => wgpu::VertexFormat::Float32x2,
            Self::Float32x3 => wgpu::VertexFormat::Float32x3,
            Self::Float32x4 => wgpu::VertexFormat::Float32x4,
            Self::Uint32x4 => wgpu::VertexFormat::Uint32x4,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VertexAttribute {
    pub format: VertexFormat,
    /// Byte offset inside the vertex.
    pub offset: u64,
    pub shader_location: u32,
}

impl From<VertexAttribute> for wgpu::VertexAttribute {
    fn from(value: VertexAttribute) -> Self {
        wgpu::VertexAttribute {
            format: value.format.to_wgpu(),
            offset: value.offset,
            shader_location: value.shader_location,
        }
    }
}

pub use wgpu::VertexStepMode;

/// Layout of a single interleaved vertex buffer. Unlike `wgpu::VertexBufferLayout` it owns its
/// attributes, so it can be built at runtime from the attributes a mesh provides.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexBufferLayout {
    /// True if every attribute lies inside the stride.
    pub fn fits_stride(&self) -> bool {
        self.attributes
            .iter()
            .all(|a| a.offset + a.format.size() <= self.array_stride)
    }
}
