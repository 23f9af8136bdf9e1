//! Tile-based deferred path vs direct path: identical pixels.

mod common;

use common::*;
use glint_render::{
    ColorBlendState, CommandBuffer, CommandEncoder, Device, RenderPassDesc,
};
use glint_render_soft::SoftDevice;

/// Records a little scene with overlapping, depth-tested and blended
/// triangles crossing several tile boundaries.
fn record_scene(device: &mut SoftDevice) -> CommandBuffer {
    let shader = device.register_shader::<SolidShader>();
    let opaque = solid_pipeline(device, shader, |_| {});
    let blended = solid_pipeline(device, shader, |desc| {
        desc.blend = ColorBlendState::ALPHA_BLENDING;
        desc.depth_stencil.depth_write_enable = false;
    });

    // large triangle spanning many tiles, mid depth
    let big = position_buffer(
        device,
        &[-0.9, 0.9, 0.2, 0.9, 0.9, 0.2, 0.0, -0.9, 0.2],
    );
    // closer triangle overlapping the center
    let near = position_buffer(
        device,
        &[-0.5, 0.5, -0.4, 0.5, 0.5, -0.4, 0.0, -0.5, -0.4],
    );
    // farther triangle, must lose the depth test where covered
    let far = position_buffer(
        device,
        &[-0.7, 0.0, 0.8, 0.7, 0.0, 0.8, 0.0, 0.7, 0.8],
    );
    // transparent overlay
    let overlay = position_buffer(
        device,
        &[-1.0, 1.0, -0.9, 1.0, 1.0, -0.9, -1.0, -1.0, -0.9],
    );

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(opaque);
    enc.set_vertex_buffer(big, 0);
    enc.update_uniform_value(0, &[0.8f32, 0.2, 0.1, 1.0]);
    enc.draw(3, 0, 1);
    enc.set_vertex_buffer(near, 0);
    enc.update_uniform_value(0, &[0.1f32, 0.8, 0.2, 1.0]);
    enc.draw(3, 0, 1);
    enc.set_vertex_buffer(far, 0);
    enc.update_uniform_value(0, &[0.2f32, 0.1, 0.9, 1.0]);
    enc.draw(3, 0, 1);
    enc.set_pipeline(blended);
    enc.set_vertex_buffer(overlay, 0);
    enc.update_uniform_value(0, &[1.0f32, 1.0, 1.0, 0.35]);
    enc.draw(3, 0, 1);
    enc.end_render_pass();
    enc.into_buffer()
}

#[test]
fn deferred_path_matches_direct_path() {
    let mut direct = make_device(48, 48, false);
    let commands = record_scene(&mut direct);
    direct.submit(&commands);

    let mut deferred = make_device(48, 48, true);
    let commands = record_scene(&mut deferred);
    deferred.submit(&commands);

    let a = direct.framebuffer();
    let b = deferred.framebuffer();
    for y in 0..48 {
        for x in 0..48 {
            assert_eq!(
                a.pixel(x, y),
                b.pixel(x, y),
                "pixel ({}, {}) differs between direct and tiled paths",
                x,
                y
            );
            assert!(
                (a.depth_at(x, y) - b.depth_at(x, y)).abs() < 1e-6,
                "depth ({}, {}) differs",
                x,
                y
            );
        }
    }
}

/// Bin replay happens in submission order within a tile: a later draw at
/// equal depth with depth func LessOrEqual overwrites an earlier one.
#[test]
fn submission_order_is_preserved_within_tiles() {
    let mut device = make_device(16, 16, true);
    let shader = device.register_shader::<SolidShader>();
    let pipeline = solid_pipeline(&mut device, shader, |desc| {
        desc.depth_stencil.depth_compare_op = glint_render::CompareOp::LessOrEqual;
    });

    let tri = position_buffer(
        &mut device,
        &[-1.0, 1.0, 0.0, 1.0, 1.0, 0.0, -1.0, -1.0, 0.0],
    );

    let mut enc = CommandEncoder::new();
    enc.begin_render_pass(&RenderPassDesc::default());
    enc.set_pipeline(pipeline);
    enc.set_vertex_buffer(tri, 0);
    enc.update_uniform_value(0, &[1.0f32, 0.0, 0.0, 1.0]);
    enc.draw(3, 0, 1);
    enc.update_uniform_value(0, &[0.0f32, 0.0, 1.0, 1.0]);
    enc.draw(3, 0, 1);
    enc.end_render_pass();
    device.submit(enc.buffer());

    assert_pixel_near(
        device.framebuffer().pixel(2, 2),
        (0, 0, 255, 255),
        "last submitted draw wins the tie",
    );
}
