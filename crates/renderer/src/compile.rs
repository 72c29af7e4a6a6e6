use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::types::composite_channel;

/// Shader build failure. Both variants are startup-fatal: pass sources are
/// static content, so there is nothing to retry.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to compile {stage} shader: {log}")]
    Compile { stage: String, log: String },
    #[error("failed to link pipeline for {label}: {log}")]
    Link { label: String, log: String },
}

/// Runs `build` inside a validation error scope, mapping a captured error to
/// its log text.
pub(crate) fn with_validation<T>(
    device: &wgpu::Device,
    build: impl FnOnce() -> T,
) -> Result<T, String> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(error.to_string()),
        None => Ok(value),
    }
}

/// Compiles the static full-screen quad vertex shader.
pub(crate) fn compile_vertex_shader(
    device: &wgpu::Device,
) -> Result<wgpu::ShaderModule, ShaderError> {
    with_validation(device, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fullscreen quad vertex"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
                stage: ShaderStage::Vertex,
                defines: &[],
            },
        })
    })
    .map_err(|log| ShaderError::Compile {
        stage: "vertex".to_string(),
        log,
    })
}

/// Wraps a simulation pass source with the uniform-contract prelude and
/// compiles it.
pub(crate) fn compile_pass_fragment(
    device: &wgpu::Device,
    index: usize,
    source: &str,
) -> Result<wgpu::ShaderModule, ShaderError> {
    let wrapped = wrap_fragment(source, None);
    compile_fragment(device, &format!("pass {index} fragment"), &wrapped)
}

/// Wraps the composite source, aliasing `blitTex` to the last pass's feedback
/// channel, and compiles it.
pub(crate) fn compile_composite_fragment(
    device: &wgpu::Device,
    source: &str,
    pass_count: usize,
) -> Result<wgpu::ShaderModule, ShaderError> {
    let wrapped = wrap_fragment(source, Some(composite_channel(pass_count)));
    compile_fragment(device, "composite fragment", &wrapped)
}

fn compile_fragment(
    device: &wgpu::Device,
    stage: &str,
    wrapped: &str,
) -> Result<wgpu::ShaderModule, ShaderError> {
    with_validation(device, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(stage),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(wrapped.to_string()),
                stage: ShaderStage::Fragment,
                defines: &[],
            },
        })
    })
    .map_err(|log| ShaderError::Compile {
        stage: stage.to_string(),
        log,
    })
}

/// Produces a self-contained GLSL fragment shader from a raw pass source.
///
/// Strips `#version` directives and contract uniform declarations so our own
/// definitions can be injected, prepends the uniform-block/channel prelude,
/// and appends the footer that remaps `gl_FragCoord` and calls `mainImage`.
/// `blit_channel` aliases `blitTex` for the composite pass.
fn wrap_fragment(source: &str, blit_channel: Option<usize>) -> String {
    const CONTRACT_NAMES: [&str; 11] = [
        "iResolution",
        "iGlobalTime",
        "iTime",
        "iFrame",
        "frameCount",
        "params",
        "iChannel0",
        "iChannel1",
        "iChannel2",
        "iChannel3",
        "iChannel4",
    ];

    let mut sanitized = String::new();
    let mut skipped_version = false;
    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            continue;
        }
        let is_contract_uniform = trimmed.starts_with("uniform ")
            && (trimmed.contains("blitTex")
                || CONTRACT_NAMES.iter().any(|name| trimmed.contains(name)));
        if is_contract_uniform {
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }

    let blit_define = blit_channel
        .map(|channel| {
            format!(
                "#define blitTex sampler2D(orrery_channel{channel}_tex, orrery_channel{channel}_smp)\n"
            )
        })
        .unwrap_or_default();

    format!("{HEADER}{blit_define}\n#line 1\n{sanitized}{FOOTER}")
}

/// GLSL prologue injected ahead of every pass shader.
///
/// The two uniform blocks must match `FrameUniforms` and `CycleUniforms` in
/// `gpu/uniforms.rs`; the channel bindings must match the layout built in
/// `gpu/passes.rs`.
const HEADER: &str = r"#version 450
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform FrameBlock {
    vec4 _iResolution;
    float _iTime;
    float _iGlobalTime;
    int _iFrame;
    float _framePad;
} frame_ubo;

layout(std140, set = 1, binding = 0) uniform CycleBlock {
    vec3 _params[14];
    int _frameCount;
} cycle_ubo;

#define iResolution frame_ubo._iResolution.xyz
#define iTime frame_ubo._iTime
#define iGlobalTime frame_ubo._iGlobalTime
#define iFrame frame_ubo._iFrame
#define frameCount cycle_ubo._frameCount
#define params cycle_ubo._params

layout(set = 2, binding = 0) uniform texture2D orrery_channel0_tex;
layout(set = 2, binding = 1) uniform sampler orrery_channel0_smp;
layout(set = 2, binding = 2) uniform texture2D orrery_channel1_tex;
layout(set = 2, binding = 3) uniform sampler orrery_channel1_smp;
layout(set = 2, binding = 4) uniform texture2D orrery_channel2_tex;
layout(set = 2, binding = 5) uniform sampler orrery_channel2_smp;
layout(set = 2, binding = 6) uniform texture2D orrery_channel3_tex;
layout(set = 2, binding = 7) uniform sampler orrery_channel3_smp;
layout(set = 2, binding = 8) uniform texture2D orrery_channel4_tex;
layout(set = 2, binding = 9) uniform sampler orrery_channel4_smp;

#define iChannel0 sampler2D(orrery_channel0_tex, orrery_channel0_smp)
#define iChannel1 sampler2D(orrery_channel1_tex, orrery_channel1_smp)
#define iChannel2 sampler2D(orrery_channel2_tex, orrery_channel2_smp)
#define iChannel3 sampler2D(orrery_channel3_tex, orrery_channel3_smp)
#define iChannel4 sampler2D(orrery_channel4_tex, orrery_channel4_smp)

vec4 orrery_gl_FragCoord;
#define gl_FragCoord orrery_gl_FragCoord
";

/// GLSL epilogue that remaps coordinates to a bottom-left origin and
/// delegates to `mainImage`.
const FOOTER: &str = r"void main() {
    #undef gl_FragCoord
    vec2 builtinFC = vec2(gl_FragCoord.x, gl_FragCoord.y);
    #define gl_FragCoord orrery_gl_FragCoord
    vec2 fragCoord = vec2(builtinFC.x, iResolution.y - builtinFC.y);
    orrery_gl_FragCoord = vec4(fragCoord, 0.0, 1.0);

    vec4 color = vec4(0.0);
    mainImage(color, fragCoord);
    outColor = color;
}
";

/// Full-screen quad: two triangles, no vertex buffer.
const VERTEX_SHADER_GLSL: &str = r"#version 450
const vec2 positions[6] = vec2[6](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(1.0, 1.0),
    vec2(-1.0, -1.0),
    vec2(1.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    gl_Position = vec4(positions[vertex_index], 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
        #version 300 es
        uniform vec3 iResolution;
        uniform float iTime;
        uniform int frameCount;
        uniform vec3 params[14];
        uniform sampler2D iChannel1;
        void mainImage(out vec4 fragColor, in vec2 fragCoord) {
            fragColor = texture(iChannel1, fragCoord / iResolution.xy) + params[3].xyzz;
        }
    "#;

    #[test]
    fn wrap_strips_contract_uniforms() {
        let wrapped = wrap_fragment(SOURCE, None);
        assert!(!wrapped.contains("uniform vec3 iResolution"));
        assert!(!wrapped.contains("uniform float iTime"));
        assert!(!wrapped.contains("uniform int frameCount"));
        assert!(!wrapped.contains("uniform vec3 params"));
        assert!(!wrapped.contains("uniform sampler2D iChannel1"));
        assert!(wrapped.contains("mainImage"));
        // A single #version remains, the injected one.
        assert_eq!(wrapped.matches("#version").count(), 1);
        assert!(wrapped.starts_with("#version 450"));
    }

    #[test]
    fn wrap_injects_the_full_contract() {
        let wrapped = wrap_fragment(SOURCE, None);
        for name in [
            "_iResolution",
            "_iTime",
            "_iGlobalTime",
            "_iFrame",
            "_frameCount",
            "_params[14]",
        ] {
            assert!(wrapped.contains(name), "missing {name}");
        }
        for channel in 0..crate::types::CHANNEL_COUNT {
            assert!(wrapped.contains(&format!("orrery_channel{channel}_tex")));
        }
        assert!(!wrapped.contains("blitTex"));
    }

    #[test]
    fn composite_wrap_aliases_blit_to_last_feedback_slot() {
        let source = r#"
            uniform sampler2D blitTex;
            void mainImage(out vec4 fragColor, in vec2 fragCoord) {
                fragColor = texture(blitTex, fragCoord / iResolution.xy);
            }
        "#;
        let wrapped = wrap_fragment(source, Some(3));
        assert!(!wrapped.contains("uniform sampler2D blitTex"));
        assert!(wrapped
            .contains("#define blitTex sampler2D(orrery_channel3_tex, orrery_channel3_smp)"));
    }

    #[test]
    fn builtin_shaders_wrap_cleanly() {
        let set = crate::types::ShaderSet::builtin();
        for source in &set.passes {
            let wrapped = wrap_fragment(source, None);
            assert!(wrapped.contains("mainImage"));
        }
        let wrapped = wrap_fragment(&set.composite, Some(set.passes.len()));
        assert!(wrapped.contains("#define blitTex"));
    }
}
