use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use scene::noise::{seed_noise, SEED_NOISE_SIZE};
use scene::{CycleEvent, Scene};

use crate::gpu::GpuState;
use crate::runtime::{FrameClock, PREVIEW_DELAY, RESEED_DEBOUNCE};
use crate::types::{CaptureFormat, PixelBuffer, RendererConfig};

/// Two presses within this window count as a double click.
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);

/// Aggregates the scene, clock and GPU state driven by the event loop.
pub(crate) struct WindowState {
    window: Arc<Window>,
    gpu: GpuState,
    scene: Scene,
    rng: StdRng,
    clock: FrameClock,
    /// Ticks are suppressed until this deadline after a user reseed, letting
    /// the reset state settle before drawing resumes.
    resume_at: Option<Instant>,
    last_click: Option<Instant>,
    /// One-shot preview capture: armed by the config flag, scheduled at the
    /// first cycle completion, then disarmed.
    preview_armed: bool,
    preview_at: Option<Instant>,
    capture_dir: PathBuf,
    capture_prefix: String,
    capture_format: CaptureFormat,
}

impl WindowState {
    pub(crate) fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let noise = PixelBuffer::seed_noise(seed_noise(&mut rng), SEED_NOISE_SIZE);
        let mut scene = Scene::new(&mut rng);
        if config.continuous {
            scene.toggle_continuous();
        }

        let size = window.inner_size();
        let gpu = GpuState::new(window.as_ref(), size, config, &noise)?;

        Ok(Self {
            window,
            gpu,
            scene,
            rng,
            clock: FrameClock::new(),
            resume_at: None,
            last_click: None,
            preview_armed: config.preview,
            preview_at: None,
            capture_dir: config.capture_dir.clone(),
            capture_prefix: config.title.clone(),
            capture_format: config.capture_format,
        })
    }

    pub(crate) fn window(&self) -> &Window {
        self.window.as_ref()
    }

    /// One render tick. Returns `Err` only for unrecoverable GPU failures.
    pub(crate) fn tick(&mut self) -> Result<()> {
        let now = Instant::now();

        if let Some(deadline) = self.preview_at {
            if now >= deadline {
                self.preview_at = None;
                if let Err(error) = self.capture() {
                    warn!(%error, "preview capture failed");
                }
            }
        }

        if let Some(deadline) = self.resume_at {
            if now < deadline {
                return Ok(());
            }
            self.resume_at = None;
        }

        // Resize poll: displayed size vs. last-known render-target size. A
        // change reallocates the whole target set and restarts accumulation;
        // a minimised (zero) surface skips the tick entirely.
        let displayed = self.window.inner_size();
        if displayed.width == 0 || displayed.height == 0 {
            return Ok(());
        }
        if let Some(size) = resize_decision(self.gpu.size(), displayed) {
            debug!(width = size.width, height = size.height, "viewport resized");
            self.gpu.resize(size);
            self.scene.reset_frame();
        }

        if self.scene.is_halted() {
            return Ok(());
        }

        let times = self.clock.tick();
        match self.gpu.render(&self.scene, times) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(anyhow!("surface out of memory; stopping render loop"));
            }
            Err(error) => {
                warn!(?error, "surface frame unavailable; skipping tick");
                return Ok(());
            }
        }

        match self.scene.advance(&mut self.rng) {
            CycleEvent::Accumulating => {}
            CycleEvent::Completed => {
                info!(
                    frame_count = self.scene.frame_count(),
                    "cycle complete; halted until reseed"
                );
                self.schedule_preview(now);
            }
            CycleEvent::Reseeded => {
                debug!(
                    frame_count = self.scene.frame_count(),
                    "cycle complete; reseeded"
                );
                self.schedule_preview(now);
            }
        }
        Ok(())
    }

    fn schedule_preview(&mut self, now: Instant) {
        if self.preview_armed {
            self.preview_armed = false;
            self.preview_at = Some(now + PREVIEW_DELAY);
        }
    }

    fn capture(&mut self) -> Result<PathBuf> {
        let dir = self.capture_dir.clone();
        let prefix = self.capture_prefix.clone();
        self.gpu.capture_frame(&dir, &prefix, self.capture_format)
    }

    pub(crate) fn handle_key(&mut self, key: &Key) {
        match key {
            Key::Named(NamedKey::Space) => {
                self.scene.reseed(&mut self.rng);
                self.scene.toggle_continuous();
                self.resume_at = None;
                info!(
                    continuous = self.scene.continuous(),
                    "reseeded; continuous mode toggled"
                );
            }
            Key::Character(text) if text.as_str() == "s" || text.as_str() == "S" => {
                if let Err(error) = self.capture() {
                    warn!(%error, "frame capture failed");
                }
            }
            _ => {}
        }
    }

    pub(crate) fn handle_click(&mut self) {
        let now = Instant::now();
        let is_double = self
            .last_click
            .map(|at| now.duration_since(at) <= DOUBLE_CLICK_WINDOW)
            .unwrap_or(false);
        if is_double {
            self.last_click = None;
            self.scene.reseed(&mut self.rng);
            self.resume_at = Some(now + RESEED_DEBOUNCE);
            info!("reseeded by double click");
        } else {
            self.last_click = Some(now);
        }
    }
}

/// Returns the size to reallocate render targets at, or `None` when the
/// displayed size already matches (repeated same-size resizes coalesce to
/// nothing).
fn resize_decision(
    current: PhysicalSize<u32>,
    displayed: PhysicalSize<u32>,
) -> Option<PhysicalSize<u32>> {
    (displayed != current && displayed.width > 0 && displayed.height > 0).then_some(displayed)
}

/// Creates the window and runs the render loop until close or fatal error.
pub(crate) fn run_windowed(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.title.as_str())
            .with_inner_size(window_size)
            .build(&event_loop)
            .context("failed to create window")?,
    );

    let mut state = WindowState::new(window, &config)
        .context("failed to initialise the render pipeline")?;

    let run_result = event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        elwt.exit();
                    }
                    WindowEvent::Resized(_) => {
                        // Coalesced: the next tick polls the new size.
                        state.window().request_redraw();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state == ElementState::Pressed && !event.repeat {
                            state.handle_key(&event.logical_key);
                        }
                    }
                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    } => {
                        state.handle_click();
                    }
                    WindowEvent::RedrawRequested => {
                        if let Err(err) = state.tick() {
                            error!(error = %err, "render loop stopped");
                            elwt.exit();
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                state.window().request_redraw();
            }
            _ => {}
        }
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_size_resizes_are_idempotent() {
        let current = PhysicalSize::new(800, 600);
        assert_eq!(resize_decision(current, current), None);
        assert_eq!(
            resize_decision(current, PhysicalSize::new(1024, 768)),
            Some(PhysicalSize::new(1024, 768))
        );
    }

    #[test]
    fn zero_sized_surfaces_never_trigger_reallocation() {
        let current = PhysicalSize::new(800, 600);
        assert_eq!(resize_decision(current, PhysicalSize::new(0, 600)), None);
        assert_eq!(resize_decision(current, PhysicalSize::new(800, 0)), None);
    }
}
