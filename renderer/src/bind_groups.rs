/// Description of a single bind group layout entry using renderer-owned types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStages,
    pub ty: BindingType,
}

impl BindGroupLayoutEntry {
    /// Converts this entry into `wgpu::BindGroupLayoutEntry`.
    pub fn to_wgpu(self) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding: self.binding,
            visibility: self.visibility.to_wgpu(),
            ty: self.ty.to_wgpu(),
            count: None,
        }
    }
}

/// Shader stage visibility for a bind group entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShaderStages {
    Vertex,
    Fragment,
    VertexFragment,
    Compute,
}

impl ShaderStages {
    pub fn to_wgpu(self) -> wgpu::ShaderStages {
        match self {
            Self::Vertex => wgpu::ShaderStages::VERTEX,
            Self::Fragment => wgpu::ShaderStages::FRAGMENT,
            Self::VertexFragment => wgpu::ShaderStages::VERTEX_FRAGMENT,
            Self::Compute => wgpu::ShaderStages::COMPUTE,
        }
    }
}

/// Binding type for a bind group entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer { read_only: bool },
}

impl BindingType {
    pub fn to_wgpu(self) -> wgpu::BindingType {
        match self {
            Self::UniformBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            Self::StorageBuffer { read_only } => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        }
    }
}

pub trait AsBindGroup {
    /// Returns the bind group layout entries declared by this type.
    fn layout_entries() -> &'static [BindGroupLayoutEntry];
}
