//! Renderer crate for Orrery.
//!
//! Glues the winit window, the `wgpu` multi-pass feedback pipeline and the
//! scene state machine together. The overall flow is:
//!
//! ```text
//!   CLI / orrery
//!        │ RendererConfig
//!        ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ tick()
//!        ▲                                  │
//!        │                                  ├─▶ Scene::advance (wrap → halt/reseed)
//!        │                                  └─▶ GpuState::render
//!                                                 │  pass 0..N-1 ─▶ feedback copy
//!                                                 └─▶ composite ─▶ swapchain
//! ```
//!
//! Each simulation pass draws a full-screen quad into one shared offscreen
//! target; its output is copied into the pass's own feedback texture right
//! after the draw, becoming that pass's `iChannel` input on the next frame.
//! The GLSL pass sources are wrapped at compile time so they can be fed
//! through the naga frontend with the expected uniform blocks and channel
//! bindings.

mod compile;
mod export;
mod gpu;
mod runtime;
mod types;
mod window;

use anyhow::Result;

pub use compile::ShaderError;
pub use runtime::{FrameClock, FrameTimes, PREVIEW_DELAY, RESEED_DEBOUNCE, SIM_TIME_STEP};
pub use types::{
    channel_table, composite_channel, CaptureFormat, ChannelRole, PixelBuffer, PixelFormat,
    RendererConfig, ShaderSet, CHANNEL_COUNT, MAX_SIMULATION_PASSES,
};

/// Thin entry point owning the renderer configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Opens the window and runs the render loop until close or fatal error.
    pub fn run(self) -> Result<()> {
        self.config.shader_set.validate()?;
        window::run_windowed(self.config)
    }
}
