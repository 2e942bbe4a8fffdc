// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point cloud storage and drawing.

use core::ops::Range;

use stratum_core::backend::{PointAttribute, PointBackend};
use stratum_core::config::MAX_ITEMS;
use stratum_core::error::SyncError;
use stratum_core::transform::TransformEntry;
use stratum_core::viewport::Viewport;

use crate::buffer::{
    create_pipeline, create_storage, create_uniform, storage_entry, uniform_entry, write_range,
};
use crate::context::GpuContext;
use crate::view::ViewUniform;

const SHADER: &str = include_str!("shaders/points.wgsl");

/// Bindings 0 and 1 are the view and transform uniforms.
const FIRST_ATTRIBUTE_BINDING: u32 = 2;

/// A [`PointBackend`] drawing instanced marker quads.
///
/// Each attribute lives in its own storage buffer, tightly packed, so
/// sub-word attributes are uploaded by widening the dirty range to whole
/// words from the synchronizer's mirror.
#[derive(Debug)]
pub struct WgpuPointBackend {
    context: GpuContext,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    view: wgpu::Buffer,
    transforms: wgpu::Buffer,
    attributes: Vec<wgpu::Buffer>,
    bind_group: wgpu::BindGroup,
    points: usize,
}

impl WgpuPointBackend {
    /// Creates a backend with empty buffers.
    pub fn new(context: &GpuContext) -> Result<Self, SyncError> {
        let device = context.device();
        let mut entries = vec![
            uniform_entry(0, wgpu::ShaderStages::VERTEX),
            uniform_entry(1, wgpu::ShaderStages::VERTEX),
        ];
        entries.extend(
            (FIRST_ATTRIBUTE_BINDING..)
                .take(PointAttribute::ALL.len())
                .map(|binding| storage_entry(binding, wgpu::ShaderStages::VERTEX)),
        );
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stratum.points.layout"),
            entries: &entries,
        });
        let pipeline = create_pipeline(device, "stratum.points", SHADER, &layout, context.format());
        let view = create_uniform::<ViewUniform>(device, "stratum.points.view", 1);
        let transforms =
            create_uniform::<TransformEntry>(device, "stratum.points.transforms", MAX_ITEMS);
        let attributes = allocate(device, 0)?;
        let bind_group = bind(device, &layout, &view, &transforms, &attributes);
        Ok(Self {
            context: context.clone(),
            layout,
            pipeline,
            view,
            transforms,
            attributes,
            bind_group,
            points: 0,
        })
    }

    /// Number of points the buffers are sized for.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points
    }

    /// Are the buffers empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points == 0
    }
}

fn slot(attribute: PointAttribute) -> usize {
    match attribute {
        PointAttribute::X => 0,
        PointAttribute::Y => 1,
        PointAttribute::Size => 2,
        PointAttribute::Color => 3,
        PointAttribute::Marker => 4,
        PointAttribute::TransformIndex => 5,
    }
}

fn allocate(device: &wgpu::Device, points: usize) -> Result<Vec<wgpu::Buffer>, SyncError> {
    PointAttribute::ALL
        .iter()
        .map(|&attribute| {
            let label = format!("stratum.points.{}", attribute.name());
            let bytes = points
                .checked_mul(attribute.element_size())
                .ok_or_else(|| SyncError::Allocation(format!("{label}: {points} points")))?;
            create_storage(device, &label, bytes)
        })
        .collect()
}

fn bind(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::Buffer,
    transforms: &wgpu::Buffer,
    attributes: &[wgpu::Buffer],
) -> wgpu::BindGroup {
    let mut entries = vec![
        wgpu::BindGroupEntry {
            binding: 0,
            resource: view.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
            binding: 1,
            resource: transforms.as_entire_binding(),
        },
    ];
    entries.extend(
        (FIRST_ATTRIBUTE_BINDING..)
            .zip(attributes)
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            }),
    );
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("stratum.points.bind_group"),
        layout,
        entries: &entries,
    })
}

impl PointBackend for WgpuPointBackend {
    type DrawTarget<'a> = wgpu::RenderPass<'a>;

    fn resize(&mut self, points: usize) -> Result<(), SyncError> {
        let device = self.context.device();
        let attributes = allocate(device, points)?;
        self.bind_group = bind(device, &self.layout, &self.view, &self.transforms, &attributes);
        self.attributes = attributes;
        self.points = points;
        Ok(())
    }

    fn upload(&mut self, attribute: PointAttribute, elements: Range<usize>, all: &[u8]) {
        let size = attribute.element_size();
        let Some(buffer) = self.attributes.get(slot(attribute)) else {
            return;
        };
        write_range(
            self.context.queue(),
            buffer,
            elements.start * size..elements.end * size,
            all,
        );
    }

    fn upload_transforms(&mut self, entries: &[TransformEntry]) {
        let entries = &entries[..entries.len().min(MAX_ITEMS)];
        if !entries.is_empty() {
            self.context
                .queue()
                .write_buffer(&self.transforms, 0, bytemuck::cast_slice(entries));
        }
    }

    fn draw(&self, target: &mut Self::DrawTarget<'_>, viewport: &Viewport) {
        let Ok(instances) = u32::try_from(self.points) else {
            log::warn!("{} points exceed one draw call", self.points);
            return;
        };
        if instances == 0 {
            return;
        }
        // Lands before the submission that carries `target`.
        self.context.queue().write_buffer(
            &self.view,
            0,
            bytemuck::bytes_of(&ViewUniform::new(viewport)),
        );
        target.set_pipeline(&self.pipeline);
        target.set_bind_group(0, &self.bind_group, &[]);
        target.draw(0..6, 0..instances);
    }

    fn is_lost(&self) -> bool {
        self.context.is_lost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_slots_follow_buffer_order() {
        for (index, attribute) in PointAttribute::ALL.into_iter().enumerate() {
            assert_eq!(slot(attribute), index);
        }
    }

    #[test]
    fn transform_table_fits_a_uniform_binding() {
        let bytes = (TransformEntry::SIZE * MAX_ITEMS) as u64;
        let limit = wgpu::Limits::downlevel_defaults().max_uniform_buffer_binding_size;
        assert!(bytes <= u64::from(limit));
    }
}
