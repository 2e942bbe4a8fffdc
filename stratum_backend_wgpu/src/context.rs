// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared device handles and loss detection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The device, queue, and render target format shared by the backends.
///
/// Creating a context installs the device-lost callback, so create one per
/// device and clone it into each backend. After the device is lost every
/// backend built from this context reports
/// [`is_lost`](stratum_core::backend::PointBackend::is_lost); rebuild them
/// from a context on a new device and hand them to `context_restored`.
#[derive(Clone, Debug)]
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    /// Wraps a device. `format` is the color format of the render passes
    /// the backends will draw into.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::warn!("wgpu device lost ({reason:?}): {message}");
            flag.store(true, Ordering::Release);
        });
        Self {
            device,
            queue,
            format,
            lost,
        }
    }

    /// The device.
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The queue.
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Color format of the render target.
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Has the device been lost?
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}
