//! Instanced drawing with a divisor-driven per-instance attribute.

mod common;

use common::*;
use glint_render::vertex::VertexAttributeDescription;
use glint_render::{
    BufferDesc, BufferType, CommandEncoder, CullMode, Device, PipelineDesc, RenderPassDesc,
    VertexFormat, VertexInputState,
};
use glint_render_soft::shader::{Fragment, Shader, ShaderContext, VertexInput};
use glint_render_soft::Vec4;

const FB: u32 = 20;
const GRID: u32 = 10;
const CELL: f32 = 2.0;

/// Per-vertex base position in screen pixels (stream 0) plus a
/// per-instance cell origin in screen pixels (stream 1, divisor 1). The
/// instance id drives the red channel.
#[derive(Default)]
struct GridShader;

impl Shader for GridShader {
    fn vertex(&self, input: &VertexInput, ctx: &mut ShaderContext) -> Vec4 {
        let base = input.attributes[0];
        let offset = input.attributes[1];
        let sx = base.x + offset.x;
        let sy = base.y + offset.y;
        ctx.varyings[1] = Vec4::splat(input.instance_id as f32 / 255.0);
        // invert the y-down viewport mapping for a 20x20 target
        Vec4::new(
            sx / (FB as f32 * 0.5) - 1.0,
            1.0 - sy / (FB as f32 * 0.5),
            0.0,
            1.0,
        )
    }

    fn fragment(&self, frag: &mut Fragment) -> Vec4 {
        let id = frag.varying(1).x;
        Vec4::new(id, 0.0, 1.0, 1.0)
    }
}

/// 100 instances of a one-triangle mesh, laid out on a 10x10 grid; the
/// pixel at each instance's cell origin encodes its instance id and no
/// two instances touch the same pixel.
#[test]
fn hundred_instances_color_by_id() {
    let mut device = make_device(FB, FB, false);
    let shader = device.register_shader::<GridShader>();

    let layout = VertexInputState::new(
        0,
        vec![
            VertexAttributeDescription::new(0, VertexFormat::F32x2, 0),
            VertexAttributeDescription::new(1, VertexFormat::F32x2, 0)
                .with_binding(1)
                .per_instance(1),
        ],
    );
    let mut desc = PipelineDesc::new(shader, layout);
    desc.cull_mode = CullMode::None;
    let pipeline = device.create_pipeline(&desc).unwrap();

    // one triangle covering the top-left pixel of a cell
    let base = bytes_of_f32s(&[0.0, 0.0, CELL, 0.0, 0.0, CELL]);
    let base_vbo = device
        .create_buffer(&BufferDesc::with_data(BufferType::Vertex, &base))
        .unwrap();

    let mut offsets = Vec::new();
    for i in 0..GRID * GRID {
        offsets.push((i % GRID) as f32 * CELL);
        offsets.push((i / GRID) as f32 * CELL);
    }
    let offsets_vbo = device
        .create_buffer(&BufferDesc::with_data(
            BufferType::Vertex,
            &bytes_of_f32s(&offsets),
        ))
        .unwrap();

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(pipeline);
    enc.set_vertex_stream(0, base_vbo, 0, 8);
    enc.set_vertex_stream(1, offsets_vbo, 0, 8);
    enc.draw(3, 0, GRID * GRID);
    enc.end_render_pass();
    device.submit(enc.buffer());

    let fb = device.framebuffer();
    for i in 0..GRID * GRID {
        let x = (i % GRID) * CELL as u32;
        let y = (i / GRID) * CELL as u32;
        let pixel = fb.pixel(x, y);
        let r = (pixel & 0xFF) as u32;
        assert!(
            (r as i32 - i as i32).abs() <= 1,
            "instance {} at ({}, {}): red channel {} should encode the id",
            i,
            x,
            y,
            r
        );
        // blue confirms the shader actually ran here
        assert_eq!((pixel >> 16) & 0xFF, 255);
    }
}
