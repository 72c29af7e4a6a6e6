//! Frame capture: re-renders the composite into an RGBA8 offscreen target,
//! reads it back through a padded staging buffer and encodes the result to
//! disk.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use tracing::info;
use winit::dpi::PhysicalSize;

use crate::gpu::{GpuState, CAPTURE_FORMAT};
use crate::types::CaptureFormat;

/// Offscreen target plus staging buffer for frame readback.
///
/// Invalidated (dropped) whenever the surface is resized; rebuilt lazily at
/// the next capture.
pub(crate) struct CaptureTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    buffer: wgpu::Buffer,
    padded_bytes_per_row: u32,
    size: PhysicalSize<u32>,
}

impl CaptureTarget {
    fn new(device: &wgpu::Device, size: PhysicalSize<u32>) -> Self {
        let padded = padded_bytes_per_row(size.width);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("capture target"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAPTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("capture staging buffer"),
            size: u64::from(padded) * u64::from(size.height.max(1)),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            texture,
            view,
            buffer,
            padded_bytes_per_row: padded,
            size,
        }
    }
}

/// Rows in a texture-to-buffer copy must be 256-byte aligned.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width.max(1) * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

impl GpuState {
    /// Renders the composite once into the capture target, reads the pixels
    /// back and writes them under `dir`. Returns the written path.
    ///
    /// The visible surface already holds the same composited frame; this
    /// re-render exists because swapchains rarely advertise `COPY_SRC`.
    pub(crate) fn capture_frame(
        &mut self,
        dir: &Path,
        prefix: &str,
        format: CaptureFormat,
    ) -> Result<PathBuf> {
        let size = self.size();
        if self
            .capture
            .as_ref()
            .map(|target| target.size != size)
            .unwrap_or(true)
        {
            self.capture = Some(CaptureTarget::new(self.device(), size));
        }
        let target = self.capture.as_ref().expect("capture target just built");

        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("capture encoder"),
            });
        {
            let [frame_group, cycle_group, channel_group] = self.bind_groups();
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("capture composite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.registry().capture_pipeline);
            render_pass.set_bind_group(0, frame_group, &[]);
            render_pass.set_bind_group(1, cycle_group, &[]);
            render_pass.set_bind_group(2, channel_group, &[]);
            render_pass.draw(0..6, 0..1);
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &target.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(target.padded_bytes_per_row),
                    rows_per_image: Some(size.height.max(1)),
                },
            },
            wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
        );
        self.queue().submit(std::iter::once(encoder.finish()));

        let buffer_slice = target.buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device().poll(wgpu::PollType::Wait);
        receiver
            .recv()
            .map_err(|_| anyhow!("capture readback callback dropped"))?
            .context("failed to map capture staging buffer")?;

        let pixels = {
            let data = buffer_slice.get_mapped_range();
            let row_bytes = (size.width * 4) as usize;
            let mut pixels = Vec::with_capacity(row_bytes * size.height as usize);
            for row in 0..size.height as usize {
                let start = row * target.padded_bytes_per_row as usize;
                pixels.extend_from_slice(&data[start..start + row_bytes]);
            }
            pixels
        };
        target.buffer.unmap();

        let image = RgbaImage::from_raw(size.width, size.height, pixels)
            .ok_or_else(|| anyhow!("capture payload did not match surface dimensions"))?;
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let path = dir.join(format!("{prefix}-{stamp}.{}", format.extension()));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create capture directory {}", dir.display()))?;
        match format {
            CaptureFormat::Png => image
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?,
            // JPEG has no alpha channel.
            CaptureFormat::Jpeg => image::DynamicImage::ImageRgba8(image)
                .to_rgb8()
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?,
        }
        info!(path = %path.display(), "captured frame");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_padding_is_256_byte_aligned() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(320), 1280);
        assert_eq!(padded_bytes_per_row(321), 1536);
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(0), 256);
    }

    #[test]
    fn padding_never_shrinks_a_row() {
        for width in [1u32, 2, 63, 64, 65, 1279, 1280, 1921] {
            let padded = padded_bytes_per_row(width);
            assert!(padded >= width * 4);
            assert_eq!(padded % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
        }
    }
}
