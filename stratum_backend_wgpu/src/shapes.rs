// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape collection storage and drawing.

use core::ops::Range;

use stratum_core::backend::{ShapeBackend, ShapeItemEntry};
use stratum_core::error::SyncError;
use stratum_core::viewport::Viewport;

use crate::buffer::{
    create_pipeline, create_storage, create_uniform, storage_entry, uniform_entry, write_range,
};
use crate::context::GpuContext;
use crate::view::ViewUniform;

const SHADER: &str = include_str!("shaders/shapes.wgsl");

#[derive(Debug)]
struct Storage {
    words: wgpu::Buffer,
    colors: wgpu::Buffer,
    items: wgpu::Buffer,
    item_capacity: usize,
    bind_group: wgpu::BindGroup,
}

/// A [`ShapeBackend`] rasterizing scanline-encoded polygons in the fragment
/// shader, one instanced quad per item.
#[derive(Debug)]
pub struct WgpuShapeBackend {
    context: GpuContext,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    view: wgpu::Buffer,
    storage: Storage,
    items: usize,
}

impl WgpuShapeBackend {
    /// Creates a backend with empty buffers.
    pub fn new(context: &GpuContext) -> Result<Self, SyncError> {
        let device = context.device();
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stratum.shapes.layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX),
                storage_entry(1, wgpu::ShaderStages::FRAGMENT),
                storage_entry(2, wgpu::ShaderStages::FRAGMENT),
                storage_entry(3, wgpu::ShaderStages::VERTEX_FRAGMENT),
            ],
        });
        let pipeline = create_pipeline(device, "stratum.shapes", SHADER, &layout, context.format());
        let view = create_uniform::<ViewUniform>(device, "stratum.shapes.view", 1);
        let words = create_storage(device, "stratum.shapes.scanlines", 0)?;
        let colors = create_storage(device, "stratum.shapes.colors", 0)?;
        let items = create_storage(device, "stratum.shapes.items", 0)?;
        let bind_group = bind(device, &layout, &view, [&words, &colors, &items]);
        Ok(Self {
            context: context.clone(),
            layout,
            pipeline,
            view,
            storage: Storage {
                words,
                colors,
                items,
                item_capacity: 0,
                bind_group,
            },
            items: 0,
        })
    }

    /// Number of items in the item table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items
    }

    /// Is the item table empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    fn rebind(&mut self) {
        let storage = &self.storage;
        let bind_group = bind(
            self.context.device(),
            &self.layout,
            &self.view,
            [&storage.words, &storage.colors, &storage.items],
        );
        self.storage.bind_group = bind_group;
    }
}

fn bind(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::Buffer,
    [words, colors, items]: [&wgpu::Buffer; 3],
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("stratum.shapes.bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: view.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: words.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: colors.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: items.as_entire_binding(),
            },
        ],
    })
}

fn word_bytes(count: usize, label: &str) -> Result<usize, SyncError> {
    count
        .checked_mul(4)
        .ok_or_else(|| SyncError::Allocation(format!("{label}: {count} words")))
}

impl ShapeBackend for WgpuShapeBackend {
    type DrawTarget<'a> = wgpu::RenderPass<'a>;

    fn resize(&mut self, shapes: usize, words: usize) -> Result<(), SyncError> {
        let device = self.context.device();
        let scanlines = create_storage(
            device,
            "stratum.shapes.scanlines",
            word_bytes(words, "stratum.shapes.scanlines")?,
        )?;
        let colors = create_storage(
            device,
            "stratum.shapes.colors",
            word_bytes(shapes, "stratum.shapes.colors")?,
        )?;
        self.storage.words = scanlines;
        self.storage.colors = colors;
        self.rebind();
        Ok(())
    }

    fn upload_scanlines(&mut self, words: Range<usize>, all: &[u32]) {
        write_range(
            self.context.queue(),
            &self.storage.words,
            words.start * 4..words.end * 4,
            bytemuck::cast_slice(all),
        );
    }

    fn upload_colors(&mut self, shapes: Range<usize>, all: &[u32]) {
        write_range(
            self.context.queue(),
            &self.storage.colors,
            shapes.start * 4..shapes.end * 4,
            bytemuck::cast_slice(all),
        );
    }

    fn upload_items(&mut self, items: &[ShapeItemEntry]) {
        if items.len() > self.storage.item_capacity {
            let bytes = items.len() * ShapeItemEntry::SIZE;
            match create_storage(self.context.device(), "stratum.shapes.items", bytes) {
                Ok(buffer) => {
                    self.storage.items = buffer;
                    self.storage.item_capacity = items.len();
                    self.rebind();
                }
                Err(err) => {
                    log::error!("{err}");
                    self.items = 0;
                    return;
                }
            }
        }
        if !items.is_empty() {
            self.context
                .queue()
                .write_buffer(&self.storage.items, 0, bytemuck::cast_slice(items));
        }
        self.items = items.len();
    }

    fn draw(&self, target: &mut Self::DrawTarget<'_>, viewport: &Viewport) {
        let Ok(instances) = u32::try_from(self.items) else {
            return;
        };
        if instances == 0 {
            return;
        }
        self.context.queue().write_buffer(
            &self.view,
            0,
            bytemuck::bytes_of(&ViewUniform::new(viewport)),
        );
        target.set_pipeline(&self.pipeline);
        target.set_bind_group(0, &self.storage.bind_group, &[]);
        target.draw(0..6, 0..instances);
    }

    fn is_lost(&self) -> bool {
        self.context.is_lost()
    }
}
