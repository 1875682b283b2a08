use std::sync::Arc;

use glam::Mat4;
use renderer::{
    AsBindGroup, BindGroupLayoutEntry, BindingType, BufferDescriptor, BufferId, BufferUsages,
    Renderer, ShaderStages,
};

/// Maximum number of bones a skeleton may have. This is the size of the palette the vertex
/// shader indexes into.
pub const MAX_BONES: usize = 50;

/// Receives the skinning matrices of a character once per tick.
///
/// The slice is only borrowed for the duration of the call; it is overwritten on the next tick,
/// so a sink has to copy whatever it wants to keep.
pub trait BonePaletteSink {
    fn consume(&mut self, bone_matrices: &[Mat4]);
}

/// Pads (with identity) or truncates the matrices into a full palette.
pub fn fill_palette(bone_matrices: &[Mat4], palette: &mut [Mat4; MAX_BONES]) {
    if bone_matrices.len() > MAX_BONES {
        tracing::warn!(
            "Palette holds {MAX_BONES} bones, dropping {}.",
            bone_matrices.len() - MAX_BONES
        );
    }

    let count = bone_matrices.len().min(MAX_BONES);
    palette[..count].copy_from_slice(&bone_matrices[..count]);
    palette[count..].fill(Mat4::IDENTITY);
}

/// Keeps a copy of every palette it is handed. Useful for headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: Vec<Vec<Mat4>>,
    /// Keep at most this many frames, dropping the oldest. `None` keeps everything.
    pub limit: Option<usize>,
}

impl RecordingSink {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            frames: Vec::with_capacity(limit),
            limit: Some(limit),
        }
    }

    pub fn last(&self) -> Option<&[Mat4]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl BonePaletteSink for RecordingSink {
    fn consume(&mut self, bone_matrices: &[Mat4]) {
        if let Some(limit) = self.limit {
            if limit == 0 {
                return;
            }
            if self.frames.len() >= limit {
                self.frames.remove(0);
            }
        }
        self.frames.push(bone_matrices.to_vec());
    }
}

/// Bind group layout of the bone palette: one read-only storage buffer visible to the vertex
/// stage.
pub struct BonePaletteBindings;

impl AsBindGroup for BonePaletteBindings {
    fn layout_entries() -> &'static [BindGroupLayoutEntry] {
        &[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::Vertex,
            ty: BindingType::StorageBuffer { read_only: true },
        }]
    }
}

/// A storage buffer holding [MAX_BONES] column-major 4x4 matrices for a single character.
pub struct GpuBonePalette {
    renderer: Arc<Renderer>,
    buffer: BufferId,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,

    palette: Box<[Mat4; MAX_BONES]>,
}

impl GpuBonePalette {
    pub fn new(renderer: Arc<Renderer>, label: &str) -> Option<Self> {
        let buffer = renderer.create_buffer(BufferDescriptor::for_elements::<Mat4>(
            format!("{label}_bone_palette"),
            MAX_BONES,
            BufferUsages::STORAGE,
        ));

        let bind_group_layout =
            renderer.create_bind_group_layout(label, BonePaletteBindings::layout_entries());

        let Some(bind_group) =
            renderer.create_buffer_bind_group(label, &bind_group_layout, &[buffer])
        else {
            renderer.destroy_buffer(buffer);
            return None;
        };

        let palette = Box::new([Mat4::IDENTITY; MAX_BONES]);
        renderer.write_buffer(buffer, 0, bytemuck::cast_slice(&palette[..]));

        Some(Self {
            renderer,
            buffer,
            bind_group_layout,
            bind_group,
            palette,
        })
    }
}

impl BonePaletteSink for GpuBonePalette {
    fn consume(&mut self, bone_matrices: &[Mat4]) {
        fill_palette(bone_matrices, &mut self.palette);
        self.renderer
            .write_buffer(self.buffer, 0, bytemuck::cast_slice(&self.palette[..]));
    }
}

impl Drop for GpuBonePalette {
    fn drop(&mut self) {
        self.renderer.destroy_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn palette_is_padded_with_identity() {
        let mut palette = [Mat4::ZERO; MAX_BONES];
        let matrices = [Mat4::from_translation(Vec3::X); 3];
        fill_palette(&matrices, &mut palette);

        assert!(palette[..3].iter().all(|m| *m == matrices[0]));
        assert!(palette[3..].iter().all(|m| *m == Mat4::IDENTITY));
    }

    #[test]
    fn palette_is_truncated() {
        let mut palette = [Mat4::ZERO; MAX_BONES];
        let matrices = vec![Mat4::from_scale(Vec3::splat(2.0)); MAX_BONES + 5];
        fill_palette(&matrices, &mut palette);
        assert!(palette.iter().all(|m| *m == matrices[0]));
    }

    #[test]
    fn palette_binding_is_a_read_only_storage_buffer() {
        let entries = BonePaletteBindings::layout_entries();
        assert_eq!(entries.len(), 1);

        let entry = entries[0].to_wgpu();
        assert_eq!(entry.visibility, wgpu::ShaderStages::VERTEX);
        assert!(matches!(
            entry.ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                ..
            }
        ));
    }

    #[test]
    fn recording_sink_copies_frames() {
        let mut sink = RecordingSink::default();
        let mut matrices = vec![Mat4::IDENTITY; 2];
        sink.consume(&matrices);

        // The caller reuses the buffer, the sink keeps what it was handed.
        matrices[0] = Mat4::from_translation(Vec3::Y);
        sink.consume(&matrices);

        assert_eq!(sink.frames.len(), 2);
        assert_eq!(sink.frames[0][0], Mat4::IDENTITY);
        assert_eq!(sink.last().unwrap()[0], Mat4::from_translation(Vec3::Y));
    }

    #[test]
    fn recording_sink_limit() {
        let mut sink = RecordingSink::with_limit(2);
        for i in 0..5 {
            sink.consume(&[Mat4::from_translation(Vec3::X * i as f32)]);
        }
        assert_eq!(sink.frames.len(), 2);
        assert_eq!(sink.frames[0][0], Mat4::from_translation(Vec3::X * 3.0));
        assert_eq!(sink.frames[1][0], Mat4::from_translation(Vec3::X * 4.0));
    }
}
