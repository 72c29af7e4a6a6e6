use winit::dpi::PhysicalSize;

/// Color format of the feedback framebuffer and every feedback texture.
pub(crate) const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Depth format of the feedback framebuffer.
pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The single offscreen render target every simulation pass draws into.
///
/// Storage dimensions are immutable post-creation, so a resize recreates both
/// attachments in one step; a partially resized attachment pair is never
/// observable. Contents after create/resize are undefined until the next
/// pass clears, which every pass does.
pub(crate) struct FeedbackTarget {
    color: wgpu::Texture,
    _depth: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth_view: wgpu::TextureView,
    pub size: PhysicalSize<u32>,
}

impl FeedbackTarget {
    pub(crate) fn create(device: &wgpu::Device, size: PhysicalSize<u32>) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("feedback color target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("feedback depth target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            color,
            _depth: depth,
            color_view,
            depth_view,
            size,
        }
    }

    pub(crate) fn resize(&mut self, device: &wgpu::Device, size: PhysicalSize<u32>) {
        *self = Self::create(device, size);
    }

    /// Copy source descriptor for feeding the color attachment into a pass's
    /// feedback texture.
    pub(crate) fn copy_src(&self) -> wgpu::TexelCopyTextureInfo<'_> {
        wgpu::TexelCopyTextureInfo {
            texture: &self.color,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        }
    }

    pub(crate) fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.size.width.max(1),
            height: self.size.height.max(1),
            depth_or_array_layers: 1,
        }
    }
}
