// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer allocation and aligned writes.

use core::ops::Range;

use bytemuck::Pod;
use stratum_core::error::SyncError;

/// Buffer sizes, write offsets, and write lengths must be multiples of this
/// ([`wgpu::COPY_BUFFER_ALIGNMENT`]).
const ALIGN: usize = 4;

/// Rounds `bytes` up to the copy alignment; empty buffers get one word so
/// they can still be bound.
pub(crate) fn padded_size(bytes: usize) -> u64 {
    bytes.div_ceil(ALIGN).max(1) as u64 * ALIGN as u64
}

/// Widens a byte range to the copy alignment.
pub(crate) fn aligned(bytes: Range<usize>) -> Range<usize> {
    let start = bytes.start / ALIGN * ALIGN;
    let end = bytes.end.div_ceil(ALIGN) * ALIGN;
    start..end.max(start)
}

/// Creates a storage buffer of at least `bytes` bytes.
pub(crate) fn create_storage(
    device: &wgpu::Device,
    label: &str,
    bytes: usize,
) -> Result<wgpu::Buffer, SyncError> {
    let size = padded_size(bytes);
    let limits = device.limits();
    let limit = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
    if size > limit {
        return Err(SyncError::Allocation(format!(
            "{label}: {size} bytes exceeds the device limit of {limit}"
        )));
    }
    log::debug!("allocating {label}: {size} bytes");
    Ok(device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    }))
}

/// Creates a uniform buffer holding `count` values of `T`.
pub(crate) fn create_uniform<T: Pod>(
    device: &wgpu::Device,
    label: &str,
    count: usize,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: padded_size(size_of::<T>() * count),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Writes `bytes` of `all` into `buffer`, widened to the copy alignment.
///
/// The buffer is assumed to be at least [`padded_size`] of `all.len()`.
/// Bytes past the end of `all` are written as zero.
pub(crate) fn write_range(
    queue: &wgpu::Queue,
    buffer: &wgpu::Buffer,
    bytes: Range<usize>,
    all: &[u8],
) {
    let range = aligned(bytes);
    if range.is_empty() {
        return;
    }
    let Some(head) = all.get(range.start..) else {
        return;
    };
    let offset = range.start as u64;
    if let Some(data) = head.get(..range.len()) {
        queue.write_buffer(buffer, offset, data);
    } else {
        let mut data = head.to_vec();
        data.resize(range.len(), 0);
        queue.write_buffer(buffer, offset, &data);
    }
}

/// A read-only storage buffer binding.
pub(crate) fn storage_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// A uniform buffer binding.
pub(crate) fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Builds an instanced pipeline whose vertex data all comes from bindings.
pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        immediate_size: 0,
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
