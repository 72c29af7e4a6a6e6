mod context;
mod passes;
mod state;
mod targets;
mod uniforms;

pub(crate) use passes::CAPTURE_FORMAT;
pub(crate) use state::GpuState;
