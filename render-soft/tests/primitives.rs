//! Non-triangle topologies and indexed draws through the full pipeline.

mod common;

use common::*;
use glint_render::{
    BufferDesc, BufferType, CommandEncoder, Device, IndexFormat, PrimitiveTopology,
    RenderPassDesc,
};

#[test]
fn line_list_walks_bresenham() {
    let mut device = make_device(8, 8, false);
    let shader = device.register_shader::<SolidShader>();
    let pipeline = solid_pipeline(&mut device, shader, |desc| {
        desc.topology = PrimitiveTopology::Lines;
    });

    // horizontal line across row 4: screen (0.5, 4.5) -> (7.5, 4.5)
    let (x0, y0) = ndc(0.5, 4.5, 8, 8);
    let (x1, y1) = ndc(7.5, 4.5, 8, 8);
    let vbo = position_buffer(&mut device, &[x0, y0, 0.0, x1, y1, 0.0]);

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(pipeline);
    enc.set_vertex_buffer(vbo, 0);
    enc.update_uniform_value(0, &[1.0f32, 1.0, 0.0, 1.0]);
    enc.draw(2, 0, 1);
    enc.end_render_pass();
    device.submit(enc.buffer());

    let fb = device.framebuffer();
    for x in 0..8u32 {
        assert_pixel_near(fb.pixel(x, 4), (255, 255, 0, 255), "line pixel");
        assert_pixel_near(fb.pixel(x, 2), (0, 0, 0, 255), "row above stays clear");
    }
}

#[test]
fn points_hit_single_pixels() {
    let mut device = make_device(8, 8, false);
    let shader = device.register_shader::<SolidShader>();
    let pipeline = solid_pipeline(&mut device, shader, |desc| {
        desc.topology = PrimitiveTopology::Points;
    });

    let mut positions = Vec::new();
    for &(px, py) in &[(1u32, 1u32), (6, 2), (3, 5)] {
        let (x, y) = ndc(px as f32 + 0.25, py as f32 + 0.25, 8, 8);
        positions.extend_from_slice(&[x, y, 0.0]);
    }
    let vbo = position_buffer(&mut device, &positions);

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(pipeline);
    enc.set_vertex_buffer(vbo, 0);
    enc.update_uniform_value(0, &[0.0f32, 1.0, 1.0, 1.0]);
    enc.draw(3, 0, 1);
    enc.end_render_pass();
    device.submit(enc.buffer());

    let fb = device.framebuffer();
    let mut lit = 0;
    for y in 0..8u32 {
        for x in 0..8u32 {
            if fb.pixel(x, y) != 0xFF00_0000 {
                lit += 1;
            }
        }
    }
    assert_eq!(lit, 3);
    assert_pixel_near(fb.pixel(1, 1), (0, 255, 255, 255), "first point");
    assert_pixel_near(fb.pixel(6, 2), (0, 255, 255, 255), "second point");
    assert_pixel_near(fb.pixel(3, 5), (0, 255, 255, 255), "third point");
}

/// Indexed strip with u16 indices: two triangles from four vertices.
#[test]
fn indexed_strip_draws_a_quad() {
    let mut device = make_device(4, 4, false);
    let shader = device.register_shader::<SolidShader>();
    let pipeline = solid_pipeline(&mut device, shader, |desc| {
        desc.topology = PrimitiveTopology::TriangleStrip;
        desc.index_format = IndexFormat::U16;
    });

    let quad = [
        -1.0f32, 1.0, 0.0, //
        1.0, 1.0, 0.0, //
        -1.0, -1.0, 0.0, //
        1.0, -1.0, 0.0,
    ];
    let vbo = position_buffer(&mut device, &quad);
    let indices: Vec<u8> = [0u16, 1, 2, 3]
        .iter()
        .flat_map(|i| i.to_le_bytes().to_vec())
        .collect();
    let ibo = device
        .create_buffer(&BufferDesc::with_data(BufferType::Index, &indices))
        .unwrap();

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(pipeline);
    enc.set_vertex_buffer(vbo, 0);
    enc.set_index_buffer(ibo, 0);
    enc.update_uniform_value(0, &[1.0f32, 0.0, 1.0, 1.0]);
    enc.draw_indexed(4, 0, 0, 1);
    enc.end_render_pass();
    device.submit(enc.buffer());

    let fb = device.framebuffer();
    for y in 0..4u32 {
        for x in 0..4u32 {
            assert_pixel_near(fb.pixel(x, y), (255, 0, 255, 255), "full coverage");
        }
    }
}

/// An indexed draw that would read past the index buffer is rejected
/// whole: nothing is rasterized.
#[test]
fn overflowing_indexed_draw_is_dropped() {
    let mut device = make_device(4, 4, false);
    let shader = device.register_shader::<SolidShader>();
    let pipeline = solid_pipeline(&mut device, shader, |desc| {
        desc.index_format = IndexFormat::U32;
    });

    let vbo = position_buffer(
        &mut device,
        &[-1.0, 1.0, 0.0, 1.0, 1.0, 0.0, -1.0, -1.0, 0.0],
    );
    let indices: Vec<u8> = [0u32, 1, 2]
        .iter()
        .flat_map(|i| i.to_le_bytes().to_vec())
        .collect();
    let ibo = device
        .create_buffer(&BufferDesc::with_data(BufferType::Index, &indices))
        .unwrap();

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(pipeline);
    enc.set_vertex_buffer(vbo, 0);
    enc.set_index_buffer(ibo, 0);
    enc.update_uniform_value(0, &[1.0f32, 0.0, 0.0, 1.0]);
    // asks for 6 indices, the buffer holds 3
    enc.draw_indexed(6, 0, 0, 1);
    enc.end_render_pass();
    device.submit(enc.buffer());

    let fb = device.framebuffer();
    for y in 0..4u32 {
        for x in 0..4u32 {
            assert_pixel_near(fb.pixel(x, y), (0, 0, 0, 255), "nothing drawn");
        }
    }
}
