pub use wgpu::BufferUsages;

/// Handle to a buffer tracked by the renderer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct BufferId(pub generational_arena::Index);

#[derive(Clone, Debug)]
pub struct BufferDescriptor {
    pub label: String,
    pub size: u64,
    pub usages: BufferUsages,
}

impl BufferDescriptor {
    /// Describe a buffer that holds `count` elements of `T`.
    pub fn for_elements<T>(label: impl Into<String>, count: usize, usages: BufferUsages) -> Self {
        Self {
            label: label.into(),
            size: (std::mem::size_of::<T>() * count) as u64,
            usages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_sizes() {
        let descriptor = BufferDescriptor::for_elements::<[f32; 16]>("bones", 50, BufferUsages::STORAGE);
        assert_eq!(descriptor.size, 64 * 50);
        assert_eq!(descriptor.label, "bones");
    }
}
