use anyhow::Result;
use winit::dpi::PhysicalSize;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::compile::{
    compile_composite_fragment, compile_pass_fragment, compile_vertex_shader, with_validation,
    ShaderError,
};
use crate::types::{channel_table, ChannelRole, PixelBuffer, ShaderSet, CHANNEL_COUNT};

use super::targets::{COLOR_FORMAT, DEPTH_FORMAT};

/// Format of the offscreen capture target; see `export.rs`.
pub(crate) const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Bind-group layouts and shared modules every pipeline is built from.
///
/// Group 0 is the per-frame uniform block, group 1 the per-cycle block,
/// group 2 the channel textures. The fixed numbering is part of the shader
/// contract in `compile.rs`.
pub(crate) struct PipelineLayouts {
    pub frame_layout: wgpu::BindGroupLayout,
    pub cycle_layout: wgpu::BindGroupLayout,
    pub channel_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    vertex_module: wgpu::ShaderModule,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Result<Self, ShaderError> {
        let frame_layout = uniform_layout(device, "frame uniform layout");
        let cycle_layout = uniform_layout(device, "cycle uniform layout");
        let channel_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("channel layout"),
            entries: &build_channel_layout_entries(),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pass pipeline layout"),
            bind_group_layouts: &[&frame_layout, &cycle_layout, &channel_layout],
            push_constant_ranges: &[],
        });
        let vertex_module = compile_vertex_shader(device)?;
        Ok(Self {
            frame_layout,
            cycle_layout,
            channel_layout,
            pipeline_layout,
            vertex_module,
        })
    }
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Channel slot 0 (uint8 seed noise) is filterable and mipmapped; every other
/// slot carries a float32 feedback surface, which base wgpu cannot filter, so
/// those bindings are declared non-filtering. The two sampling contracts must
/// not be conflated.
fn build_channel_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(CHANNEL_COUNT * 2);
    for slot in 0..CHANNEL_COUNT {
        let filterable = slot == 0;
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: (slot as u32) * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: (slot as u32) * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(if filterable {
                wgpu::SamplerBindingType::Filtering
            } else {
                wgpu::SamplerBindingType::NonFiltering
            }),
            count: None,
        });
    }
    entries
}

struct ChannelResource {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// One simulation pass: its compiled pipeline, the descriptor of its feedback
/// surface, and the feedback texture itself.
///
/// The feedback texture holds either the zero-initialized content from
/// creation/resize or the pass's own output from the most recently completed
/// frame; there is no third state.
pub(crate) struct SimulationPass {
    pub pipeline: wgpu::RenderPipeline,
    pub descriptor: PixelBuffer,
    feedback: wgpu::Texture,
    pub feedback_view: wgpu::TextureView,
}

impl SimulationPass {
    pub(crate) fn copy_dst(&self) -> wgpu::TexelCopyTextureInfo<'_> {
        wgpu::TexelCopyTextureInfo {
            texture: &self.feedback,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        }
    }
}

/// All compiled passes plus the channel resources they sample.
pub(crate) struct PassRegistry {
    pub passes: Vec<SimulationPass>,
    pub composite_pipeline: wgpu::RenderPipeline,
    pub capture_pipeline: wgpu::RenderPipeline,
    pub channel_bind_group: wgpu::BindGroup,
    seed: ChannelResource,
    placeholder: ChannelResource,
    feedback_sampler: wgpu::Sampler,
}

impl PassRegistry {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &PipelineLayouts,
        surface_format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        shader_set: &ShaderSet,
        seed_noise: &PixelBuffer,
    ) -> Result<Self> {
        shader_set.validate()?;

        let seed = create_seed_channel(device, queue, seed_noise);
        let placeholder = create_placeholder_channel(device, queue);
        let feedback_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("feedback sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut passes = Vec::with_capacity(shader_set.passes.len());
        for (index, source) in shader_set.passes.iter().enumerate() {
            let module = compile_pass_fragment(device, index, source)?;
            let pipeline = build_pipeline(
                device,
                layouts,
                &module,
                &format!("pass {index}"),
                COLOR_FORMAT,
                true,
            )?;
            let (feedback, feedback_view) = create_feedback_texture(device, index, size);
            passes.push(SimulationPass {
                pipeline,
                descriptor: PixelBuffer::feedback(size.width, size.height),
                feedback,
                feedback_view,
            });
        }

        let composite_module =
            compile_composite_fragment(device, &shader_set.composite, passes.len())?;
        let composite_pipeline = build_pipeline(
            device,
            layouts,
            &composite_module,
            "composite",
            surface_format,
            false,
        )?;
        let capture_pipeline = build_pipeline(
            device,
            layouts,
            &composite_module,
            "composite capture",
            CAPTURE_FORMAT,
            false,
        )?;

        let channel_bind_group = build_channel_bind_group(
            device,
            layouts,
            &seed,
            &placeholder,
            &feedback_sampler,
            &passes,
        );

        Ok(Self {
            passes,
            composite_pipeline,
            capture_pipeline,
            channel_bind_group,
            seed,
            placeholder,
            feedback_sampler,
        })
    }

    /// Reallocates every feedback texture at the new size and rebinds the
    /// channel table. Old texel contents are dropped: a resize restarts the
    /// feedback simulation, it never resamples.
    pub(crate) fn resize(
        &mut self,
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        size: PhysicalSize<u32>,
    ) {
        for (index, pass) in self.passes.iter_mut().enumerate() {
            let (feedback, feedback_view) = create_feedback_texture(device, index, size);
            pass.feedback = feedback;
            pass.feedback_view = feedback_view;
            pass.descriptor.width = size.width;
            pass.descriptor.height = size.height;
        }
        self.channel_bind_group = build_channel_bind_group(
            device,
            layouts,
            &self.seed,
            &self.placeholder,
            &self.feedback_sampler,
            &self.passes,
        );
    }
}

fn build_channel_bind_group(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    seed: &ChannelResource,
    placeholder: &ChannelResource,
    feedback_sampler: &wgpu::Sampler,
    passes: &[SimulationPass],
) -> wgpu::BindGroup {
    let table = channel_table(passes.len());
    let mut entries = Vec::with_capacity(CHANNEL_COUNT * 2);
    for (slot, role) in table.iter().enumerate() {
        let (view, sampler) = match role {
            ChannelRole::SeedNoise => (&seed.view, &seed.sampler),
            ChannelRole::Feedback(pass) => (&passes[*pass].feedback_view, feedback_sampler),
            ChannelRole::Unused => (&placeholder.view, &placeholder.sampler),
        };
        entries.push(wgpu::BindGroupEntry {
            binding: (slot as u32) * 2,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (slot as u32) * 2 + 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("channel bind group"),
        layout: &layouts.channel_layout,
        entries: &entries,
    })
}

fn build_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    fragment_module: &wgpu::ShaderModule,
    label: &str,
    target_format: wgpu::TextureFormat,
    with_depth: bool,
) -> Result<wgpu::RenderPipeline, ShaderError> {
    let depth_stencil = with_depth.then(|| wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });
    with_validation(device, || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layouts.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &layouts.vertex_module,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    // Passes fully overwrite their target, so no blending;
                    // float32 targets are not blendable on base wgpu anyway.
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        })
    })
    .map_err(|log| ShaderError::Link {
        label: label.to_string(),
        log,
    })
}

fn create_feedback_texture(
    device: &wgpu::Device,
    index: usize,
    size: PhysicalSize<u32>,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&format!("pass {index} feedback texture")),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Uploads the seed-noise texture with a CPU-built mip chain.
///
/// The uint8 sampling contract wants linear filtering over mipmaps; wgpu has
/// no `generateMipmap`, so the chain is box-filtered here and uploaded
/// mip-major in one shot.
fn create_seed_channel(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &PixelBuffer,
) -> ChannelResource {
    let base = buffer
        .data
        .as_deref()
        .expect("seed noise buffer carries a payload");
    let mip_levels = mip_level_count(buffer.width.max(buffer.height));
    let mut data = Vec::with_capacity(base.len() * 4 / 3);
    data.extend_from_slice(base);
    let mut level = base.to_vec();
    let (mut width, mut height) = (buffer.width as usize, buffer.height as usize);
    for _ in 1..mip_levels {
        level = downsample_rgba(&level, width, height);
        width = (width / 2).max(1);
        height = (height / 2).max(1);
        data.extend_from_slice(&level);
    }

    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("seed noise texture"),
            size: wgpu::Extent3d {
                width: buffer.width,
                height: buffer.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::MipMajor,
        &data,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("seed noise sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });
    ChannelResource {
        _texture: texture,
        view,
        sampler,
    }
}

/// 1x1 float32 stand-in bound to channel slots beyond the pass count.
fn create_placeholder_channel(device: &wgpu::Device, queue: &wgpu::Queue) -> ChannelResource {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("placeholder channel texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::MipMajor,
        bytemuck::bytes_of(&[0.0f32; 4]),
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("placeholder channel sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });
    ChannelResource {
        _texture: texture,
        view,
        sampler,
    }
}

pub(crate) fn mip_level_count(size: u32) -> u32 {
    32 - size.max(1).leading_zeros()
}

fn downsample_rgba(src: &[u8], width: usize, height: usize) -> Vec<u8> {
    let out_width = (width / 2).max(1);
    let out_height = (height / 2).max(1);
    let mut out = vec![0u8; out_width * out_height * 4];
    for y in 0..out_height {
        for x in 0..out_width {
            let x0 = (x * 2).min(width - 1);
            let x1 = (x * 2 + 1).min(width - 1);
            let y0 = (y * 2).min(height - 1);
            let y1 = (y * 2 + 1).min(height - 1);
            for channel in 0..4 {
                let sum = src[(y0 * width + x0) * 4 + channel] as u32
                    + src[(y0 * width + x1) * 4 + channel] as u32
                    + src[(y1 * width + x0) * 4 + channel] as u32
                    + src[(y1 * width + x1) * 4 + channel] as u32;
                out[(y * out_width + x) * 4 + channel] = (sum / 4) as u8;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_depth_for_common_sizes() {
        assert_eq!(mip_level_count(256), 9);
        assert_eq!(mip_level_count(1), 1);
        assert_eq!(mip_level_count(2), 2);
        assert_eq!(mip_level_count(0), 1);
    }

    #[test]
    fn downsample_averages_a_2x2_box() {
        // 2x2 single-channel-per-pixel worth of RGBA data.
        let mut src = vec![0u8; 2 * 2 * 4];
        for (pixel, value) in [(0usize, 10u8), (1, 20), (2, 30), (3, 40)] {
            src[pixel * 4] = value;
        }
        let out = downsample_rgba(&src, 2, 2);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 25);
    }

    #[test]
    fn downsample_clamps_odd_edges() {
        let src = vec![100u8; 1 * 3 * 4];
        let out = downsample_rgba(&src, 1, 3);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 100);
    }

    #[test]
    fn mip_chain_total_size_matches_upload_layout() {
        // The upload path concatenates level payloads mip-major; sanity-check
        // the running size for a 4x4 base.
        let mut level = vec![0u8; 4 * 4 * 4];
        let mut total = level.len();
        let (mut w, mut h) = (4usize, 4usize);
        for _ in 1..mip_level_count(4) {
            level = downsample_rgba(&level, w, h);
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            total += level.len();
        }
        assert_eq!(total, (16 + 4 + 1) * 4);
    }
}
