use std::time::{Duration, Instant};

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;
use winit::dpi::PhysicalSize;

use scene::Scene;

use crate::runtime::FrameTimes;
use crate::types::{PixelBuffer, RendererConfig};

use super::context::GpuContext;
use super::passes::{PassRegistry, PipelineLayouts};
use super::targets::FeedbackTarget;
use super::uniforms::{CycleUniforms, FrameUniforms};

/// Owns every GPU resource and sequences the per-tick pass algorithm.
///
/// The feedback target and its attachments belong exclusively to this struct
/// during a tick; nothing else reads or writes render targets concurrently
/// with a draw.
pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PipelineLayouts,
    target: FeedbackTarget,
    registry: PassRegistry,
    frame_uniforms: FrameUniforms,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    cycle_buffer: wgpu::Buffer,
    cycle_bind_group: wgpu::BindGroup,
    clear_color: wgpu::Color,
    pub(crate) capture: Option<crate::export::CaptureTarget>,
    last_fps_update: Instant,
    frames_since_last_update: u32,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        config: &RendererConfig,
        seed_noise: &PixelBuffer,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size)?;
        let layouts = PipelineLayouts::new(&context.device)?;
        let feedback_target = FeedbackTarget::create(&context.device, context.size);
        let registry = PassRegistry::new(
            &context.device,
            &context.queue,
            &layouts,
            context.surface_format,
            context.size,
            &config.shader_set,
            seed_noise,
        )?;

        let frame_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniform buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame bind group"),
            layout: &layouts.frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });
        let cycle_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cycle uniform buffer"),
            size: std::mem::size_of::<CycleUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let cycle_bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cycle bind group"),
            layout: &layouts.cycle_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: cycle_buffer.as_entire_binding(),
            }],
        });

        let frame_uniforms = FrameUniforms::new(context.size.width, context.size.height);
        context
            .queue
            .write_buffer(&frame_buffer, 0, bytemuck::bytes_of(&frame_uniforms));

        let [r, g, b] = config.clear_color;
        Ok(Self {
            context,
            layouts,
            target: feedback_target,
            registry,
            frame_uniforms,
            frame_buffer,
            frame_bind_group,
            cycle_buffer,
            cycle_bind_group,
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
            capture: None,
            last_fps_update: Instant::now(),
            frames_since_last_update: 0,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn device(&self) -> &wgpu::Device {
        &self.context.device
    }

    pub(crate) fn queue(&self) -> &wgpu::Queue {
        &self.context.queue
    }

    pub(crate) fn registry(&self) -> &PassRegistry {
        &self.registry
    }

    pub(crate) fn bind_groups(&self) -> [&wgpu::BindGroup; 3] {
        [
            &self.frame_bind_group,
            &self.cycle_bind_group,
            &self.registry.channel_bind_group,
        ]
    }

    pub(crate) fn clear_color(&self) -> wgpu::Color {
        self.clear_color
    }

    /// Reallocates the full render-target set at the new size.
    ///
    /// The target and every pass are resized together; no draw can observe a
    /// partially resized set because this runs between ticks.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.target.resize(&self.context.device, new_size);
        self.registry
            .resize(&self.context.device, &self.layouts, new_size);
        self.frame_uniforms
            .set_resolution(new_size.width, new_size.height);
        self.capture = None;
    }

    pub(crate) fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    /// Runs one full tick: simulation passes with per-pass feedback copies,
    /// then the composite onto the swapchain.
    pub(crate) fn render(
        &mut self,
        scene: &Scene,
        times: FrameTimes,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;

        let now = Instant::now();
        self.frames_since_last_update += 1;
        let since_update = now.saturating_duration_since(self.last_fps_update);
        if since_update >= Duration::from_secs(1) {
            debug!(
                fps = (self.frames_since_last_update as f32 / since_update.as_secs_f32()).round(),
                frame = scene.frame(),
                frame_count = scene.frame_count(),
                "render stats"
            );
            self.frames_since_last_update = 0;
            self.last_fps_update = now;
        }

        self.frame_uniforms.set_tick(times, scene.frame());
        self.context.queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::bytes_of(&self.frame_uniforms),
        );

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("tick encoder"),
                });

        // Frame 0 of a cycle: seed every feedback texture from the current
        // target content and upload the cycle constants. Both happen once per
        // cycle, not per frame.
        if scene.frame() == 0 {
            let cycle = CycleUniforms::new(scene.params(), scene.frame_count());
            self.context
                .queue
                .write_buffer(&self.cycle_buffer, 0, bytemuck::bytes_of(&cycle));
            for pass in &self.registry.passes {
                encoder.copy_texture_to_texture(
                    self.target.copy_src(),
                    pass.copy_dst(),
                    self.target.extent(),
                );
            }
        }

        // Fixed pass order, with each pass's feedback texture refreshed
        // immediately after its draw: later passes in this frame observe
        // earlier passes' new output, while each pass sees its own output
        // from the previous frame only. This tie-break is load-bearing for
        // bit-stable accumulation.
        for pass in &self.registry.passes {
            {
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("simulation pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &self.target.color_view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.target.depth_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                render_pass.set_pipeline(&pass.pipeline);
                render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
                render_pass.set_bind_group(1, &self.cycle_bind_group, &[]);
                render_pass.set_bind_group(2, &self.registry.channel_bind_group, &[]);
                render_pass.draw(0..6, 0..1);
            }
            encoder.copy_texture_to_texture(
                self.target.copy_src(),
                pass.copy_dst(),
                self.target.extent(),
            );
        }

        // Composite the last pass's output onto the visible surface.
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.registry.composite_pipeline);
            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
            render_pass.set_bind_group(1, &self.cycle_bind_group, &[]);
            render_pass.set_bind_group(2, &self.registry.channel_bind_group, &[]);
            render_pass.draw(0..6, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(())
    }
}
