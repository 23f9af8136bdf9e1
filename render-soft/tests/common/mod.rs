//! Shared fixtures for the end-to-end tests: small shaders and device
//! setup driven entirely through the public encoder/device API.
#![allow(dead_code)]

use glint_render::vertex::VertexAttributeDescription;
use glint_render::{
    BufferDesc, BufferHandle, BufferType, Device, PipelineDesc, PipelineHandle, ShaderHandle,
    VertexFormat, VertexInputState,
};
use glint_render_soft::device::DeviceOptions;
use glint_render_soft::shader::{uniform_slot, Fragment, Shader, ShaderContext, VertexInput};
use glint_render_soft::{SoftDevice, Vec4};

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

pub fn make_device(width: u32, height: u32, deferred: bool) -> SoftDevice {
    init_logger();
    SoftDevice::with_options(
        width,
        height,
        DeviceOptions {
            tile_size: 8,
            worker_threads: 2,
            deferred,
        },
    )
}

pub fn bytes_of_f32s(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Converts pixel coordinates to NDC for a framebuffer, so tests can place
/// vertices in screen space. Inverse of the viewport mapping (y-down).
pub fn ndc(sx: f32, sy: f32, fb_w: u32, fb_h: u32) -> (f32, f32) {
    (
        sx / (fb_w as f32 * 0.5) - 1.0,
        1.0 - sy / (fb_h as f32 * 0.5),
    )
}

/// Uploads NDC (x, y, z) triples as a vertex buffer.
pub fn position_buffer(device: &mut SoftDevice, positions: &[f32]) -> BufferHandle {
    device
        .create_buffer(&BufferDesc::with_data(
            BufferType::Vertex,
            &bytes_of_f32s(positions),
        ))
        .unwrap()
}

/// Positions-only layout: location 0 = F32x3 at stride 12.
pub fn position_layout() -> VertexInputState {
    VertexInputState::new(
        12,
        vec![VertexAttributeDescription::new(0, VertexFormat::F32x3, 0)],
    )
}

/// Flat-color shader: clip position from attribute 0, color from uniform
/// slot 0.
#[derive(Default)]
pub struct SolidShader {
    color: [f32; 4],
}

impl Shader for SolidShader {
    fn bind_uniforms(&mut self, data: &[u8]) {
        if let Some(color) = uniform_slot::<[f32; 4]>(data, 0) {
            self.color = color;
        }
    }

    fn vertex(&self, input: &VertexInput, _ctx: &mut ShaderContext) -> Vec4 {
        let p = input.attributes[0];
        Vec4::new(p.x, p.y, p.z, 1.0)
    }

    fn fragment(&self, _frag: &mut Fragment) -> Vec4 {
        Vec4::from_array(self.color)
    }
}

/// Textured shader: position from attribute 0, UV from attribute 1 into
/// varying slot 0, fragment samples texture unit 0.
#[derive(Default)]
pub struct TexturedShader;

impl Shader for TexturedShader {
    fn vertex(&self, input: &VertexInput, ctx: &mut ShaderContext) -> Vec4 {
        let p = input.attributes[0];
        ctx.varyings[0] = input.attributes[1];
        Vec4::new(p.x, p.y, p.z, 1.0)
    }

    fn fragment(&self, frag: &mut Fragment) -> Vec4 {
        let uv = frag.varying(0);
        frag.sample(0, uv.x, uv.y)
    }
}

pub fn solid_pipeline(
    device: &mut SoftDevice,
    shader: ShaderHandle,
    configure: impl FnOnce(&mut PipelineDesc),
) -> PipelineHandle {
    let mut desc = PipelineDesc::new(shader, position_layout());
    desc.cull_mode = glint_render::CullMode::None;
    configure(&mut desc);
    device.create_pipeline(&desc).unwrap()
}

/// Channel-wise readback comparison with a one-step tolerance.
pub fn assert_pixel_near(actual: u32, expected: (u8, u8, u8, u8), ctx: &str) {
    let a = (
        (actual & 0xFF) as u8,
        ((actual >> 8) & 0xFF) as u8,
        ((actual >> 16) & 0xFF) as u8,
        ((actual >> 24) & 0xFF) as u8,
    );
    let close = |x: u8, y: u8| (i32::from(x) - i32::from(y)).abs() <= 1;
    assert!(
        close(a.0, expected.0) && close(a.1, expected.1) && close(a.2, expected.2) && close(a.3, expected.3),
        "{}: got {:?}, expected {:?}",
        ctx,
        a,
        expected
    );
}
