//! A wrapper around `wgpu` primitives used to feed skinning data to the GPU.

mod bind_groups;
mod buffers;
mod vertex_layouts;

pub use bind_groups::*;
pub use buffers::*;
pub use vertex_layouts::*;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use generational_arena::Arena;

/// Owns the `wgpu` device and queue and keeps track of the buffers created through it. Buffers
/// can be created and written through a shared reference, so the renderer can be handed to many
/// consumers behind an `Arc`.
pub struct Renderer {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    buffers: RwLock<Arena<BufferEntry>>,
}

impl Renderer {
    /// Creates a new renderer wrapper around a `wgpu` device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            buffers: RwLock::new(Arena::default()),
        }
    }

    /// Creates a tracked buffer and returns its handle. `COPY_DST` is always added to the usages.
    pub fn create_buffer(&self, descriptor: BufferDescriptor) -> BufferId {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&descriptor.label),
            size: descriptor.size,
            usage: descriptor.usages | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        BufferId(self.write_buffers().insert(BufferEntry { descriptor, buffer }))
    }

    /// Queue a write of `data` into the buffer at `offset`. The data is copied by the queue, so
    /// the caller is free to reuse it right after this returns.
    pub fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) {
        let buffers = self.read_buffers();
        let Some(entry) = buffers.get(id.0) else {
            tracing::warn!("Writing to missing buffer: {:?}", id);
            return;
        };

        if offset + data.len() as u64 > entry.descriptor.size {
            tracing::warn!(
                "Write of {} bytes at offset {} overflows buffer \"{}\" ({} bytes).",
                data.len(),
                offset,
                entry.descriptor.label,
                entry.descriptor.size,
            );
            return;
        }

        self.queue.write_buffer(&entry.buffer, offset, data);
    }

    /// Drop the buffer associated with the handle.
    pub fn destroy_buffer(&self, id: BufferId) {
        if let Some(entry) = self.write_buffers().remove(id.0) {
            entry.buffer.destroy();
        }
    }

    /// Create a `wgpu` bind group layout from renderer-owned layout entries.
    pub fn create_bind_group_layout(
        &self,
        label: &str,
        entries: &[BindGroupLayoutEntry],
    ) -> wgpu::BindGroupLayout {
        let entries = entries
            .iter()
            .copied()
            .map(BindGroupLayoutEntry::to_wgpu)
            .collect::<Vec<_>>();

        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &entries,
            })
    }

    /// Create a bind group that binds each of the given buffers in full, in binding order.
    /// Returns `None` if any of the buffers is missing.
    pub fn create_buffer_bind_group(
        &self,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        buffers: &[BufferId],
    ) -> Option<wgpu::BindGroup> {
        let arena = self.read_buffers();

        let entries = buffers
            .iter()
            .enumerate()
            .map(|(binding, id)| {
                arena.get(id.0).map(|entry| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: entry.buffer.as_entire_binding(),
                })
            })
            .collect::<Option<Vec<_>>>()?;

        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        }))
    }

    fn read_buffers(&self) -> RwLockReadGuard<'_, Arena<BufferEntry>> {
        self.buffers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_buffers(&self) -> RwLockWriteGuard<'_, Arena<BufferEntry>> {
        self.buffers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

struct BufferEntry {
    descriptor: BufferDescriptor,
    buffer: wgpu::Buffer,
}
