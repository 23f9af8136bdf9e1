//! Texture sampling through the full pipeline: wrap clamping, border
//! color, and mip selection from screen-space derivatives.

mod common;

use common::*;
use glint_render::vertex::VertexAttributeDescription;
use glint_render::{
    BufferDesc, BufferType, CommandEncoder, CullMode, Device, PipelineDesc, RenderPassDesc,
    SamplerDescription, TextureDesc, VertexFormat, VertexInputState, WrapMode,
};

/// Interleaved (pos.xyz, uv.xy) vertices, stride 20.
fn textured_layout() -> VertexInputState {
    VertexInputState::new(
        20,
        vec![
            VertexAttributeDescription::new(0, VertexFormat::F32x3, 0),
            VertexAttributeDescription::new(1, VertexFormat::F32x2, 12),
        ],
    )
}

fn textured_quad(
    device: &mut glint_render_soft::SoftDevice,
    sx0: f32,
    sy0: f32,
    sx1: f32,
    sy1: f32,
    uv: [[f32; 2]; 4],
    fb: (u32, u32),
) -> glint_render::BufferHandle {
    let (x0, y0) = ndc(sx0, sy0, fb.0, fb.1);
    let (x1, y1) = ndc(sx1, sy1, fb.0, fb.1);
    // corners: top-left, top-right, bottom-left, bottom-right
    let v = |x: f32, y: f32, t: [f32; 2]| vec![x, y, 0.0, t[0], t[1]];
    let mut data = Vec::new();
    data.extend(v(x0, y0, uv[0]));
    data.extend(v(x1, y0, uv[1]));
    data.extend(v(x0, y1, uv[2]));
    data.extend(v(x1, y0, uv[1]));
    data.extend(v(x1, y1, uv[3]));
    data.extend(v(x0, y1, uv[2]));
    device
        .create_buffer(&BufferDesc::with_data(
            BufferType::Vertex,
            &bytes_of_f32s(&data),
        ))
        .unwrap()
}

/// 2x2 texture laid out [R G / B W].
fn rgbw_texels() -> Vec<u8> {
    vec![
        255, 0, 0, 255, /* R */ 0, 255, 0, 255, /* G */
        0, 0, 255, 255, /* B */ 255, 255, 255, 255, /* W */
    ]
}

/// Sampling at (1.25, -0.1) clamps to the top-right texel under
/// clamp-to-edge, and returns the border color under clamp-to-border.
#[test]
fn clamp_modes_through_the_pipeline() {
    let mut device = make_device(4, 4, false);
    let shader = device.register_shader::<TexturedShader>();
    let mut desc = PipelineDesc::new(shader, textured_layout());
    desc.cull_mode = CullMode::None;
    let pipeline = device.create_pipeline(&desc).unwrap();

    let mut tex_desc = TextureDesc::new(2, 2);
    tex_desc.sampler = SamplerDescription::nearest().with_wrap(WrapMode::ClampToEdge);
    let texture = device
        .create_texture_with_data(&tex_desc, &rgbw_texels(), glint_render::PixelFormat::Rgba)
        .unwrap();

    // constant UV everywhere: perspective correction must return it exactly
    let uv = [[1.25, -0.1]; 4];
    let vbo = textured_quad(&mut device, 0.0, 0.0, 4.0, 4.0, uv, (4, 4));

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(pipeline);
    enc.set_vertex_buffer(vbo, 0);
    enc.set_texture(0, texture);
    enc.draw(6, 0, 1);
    enc.end_render_pass();
    device.submit(enc.buffer());
    assert_pixel_near(
        device.framebuffer().pixel(2, 2),
        (0, 255, 0, 255),
        "clamp-to-edge picks the top-right texel",
    );

    // same draw with a magenta border
    let border = SamplerDescription::nearest()
        .with_wrap(WrapMode::ClampToBorder)
        .with_border_color([1.0, 0.0, 1.0, 1.0]);
    device.set_sampler(texture, &border);

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(pipeline);
    enc.set_vertex_buffer(vbo, 0);
    enc.set_texture(0, texture);
    enc.draw(6, 0, 1);
    enc.end_render_pass();
    device.submit(enc.buffer());
    assert_pixel_near(
        device.framebuffer().pixel(2, 2),
        (255, 0, 255, 255),
        "clamp-to-border returns the border color",
    );
}

/// A 4x4 red/black checker minified 2:1 samples the level-1 average
/// (half red) under the trilinear default.
#[test]
fn trilinear_minification_hits_level_one() {
    let mut device = make_device(4, 4, false);
    let shader = device.register_shader::<TexturedShader>();
    let mut desc = PipelineDesc::new(shader, textured_layout());
    desc.cull_mode = CullMode::None;
    let pipeline = device.create_pipeline(&desc).unwrap();

    let mut checker = Vec::new();
    for y in 0..4 {
        for x in 0..4 {
            if (x + y) % 2 == 0 {
                checker.extend_from_slice(&[255, 0, 0, 255]);
            } else {
                checker.extend_from_slice(&[0, 0, 0, 255]);
            }
        }
    }
    let texture = device
        .create_texture_with_data(
            &TextureDesc::new(4, 4),
            &checker,
            glint_render::PixelFormat::Rgba,
        )
        .unwrap();
    device.generate_mipmaps(texture);

    // UV spans 0..1 over a 2x2-pixel quad: 2 texels per pixel, lod 1
    let uv = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
    let vbo = textured_quad(&mut device, 0.0, 0.0, 2.0, 2.0, uv, (4, 4));

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(pipeline);
    enc.set_vertex_buffer(vbo, 0);
    enc.set_texture(0, texture);
    enc.draw(6, 0, 1);
    enc.end_render_pass();
    device.submit(enc.buffer());

    let p = device.framebuffer().pixel(1, 1);
    let r = (p & 0xFF) as i32;
    let g = ((p >> 8) & 0xFF) as i32;
    assert!(
        (r - 127).abs() <= 2,
        "expected half red from mip level 1, got r={}",
        r
    );
    assert!(g <= 2, "green channel stays empty, got {}", g);
}

/// Sampling a slot with no texture bound yields the magenta error color.
#[test]
fn unbound_texture_slot_is_magenta() {
    let mut device = make_device(2, 2, false);
    let shader = device.register_shader::<TexturedShader>();
    let mut desc = PipelineDesc::new(shader, textured_layout());
    desc.cull_mode = CullMode::None;
    let pipeline = device.create_pipeline(&desc).unwrap();

    let uv = [[0.5, 0.5]; 4];
    let vbo = textured_quad(&mut device, 0.0, 0.0, 2.0, 2.0, uv, (2, 2));

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(pipeline);
    enc.set_vertex_buffer(vbo, 0);
    enc.draw(6, 0, 1);
    enc.end_render_pass();
    device.submit(enc.buffer());

    assert_pixel_near(
        device.framebuffer().pixel(0, 0),
        (255, 0, 255, 255),
        "error color",
    );
}
