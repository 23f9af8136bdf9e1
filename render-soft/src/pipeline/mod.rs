//! Pipeline objects.
//!
//! One [ShaderPipeline] exists per user shader type, monomorphized over it
//! and stored behind the [SoftPipeline] trait object in the device's pool.
//! The device dispatches once per draw through the trait; vertex fetch,
//! clipping, binning and rasterization below that point are all inlined
//! over the concrete shader.

use crate::arena::FrameArena;
use crate::assembler::{self, Primitive};
use crate::buffer::BufferObject;
use crate::clip;
use crate::math::Vec4;
use crate::pool::ResourcePool;
use crate::raster::{self, RasterState, Rect, RenderTarget};
use crate::shader::{Shader, ShaderContext, TextureUnits, VertexInput, VertexOut, MAX_VARYINGS};
use crate::tiler::{BinRecord, TileGrid};
use crate::vao::{fetch_attribute, StreamBinding, VertexArrayLayout};
use glint_render::command::UNIFORM_STAGING_SIZE;
use glint_render::image::MAX_TEXTURE_SLOTS;
use glint_render::pipeline::{PipelineDesc, PolygonMode, PrimitiveTopology, Scissor, Viewport};
use glint_render::vertex::{IndexFormat, MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_STREAMS};
use glint_render::{BufferHandle, PipelineHandle, TextureHandle};
use log::{error, warn};
use std::marker::PhantomData;

/// Post-transform triangle record stored in the frame arena: the three
/// screen positions plus a copy of all varyings.
#[derive(Copy, Clone)]
pub struct TriangleData {
    pub screen: [Vec4; 3],
    pub varyings: [[Vec4; MAX_VARYINGS]; 3],
}

impl TriangleData {
    pub fn from_vertices(v0: &VertexOut, v1: &VertexOut, v2: &VertexOut) -> TriangleData {
        TriangleData {
            screen: [v0.screen, v1.screen, v2.screen],
            varyings: [v0.ctx.varyings, v1.ctx.varyings, v2.ctx.varyings],
        }
    }

    pub fn vertex(&self, i: usize) -> VertexOut {
        VertexOut {
            pos: Vec4::ZERO,
            screen: self.screen[i],
            ctx: ShaderContext {
                varyings: self.varyings[i],
            },
        }
    }
}

/// Per-draw state snapshot referenced by bin records: the bound textures,
/// the draw's scissor, and the full uniform staging bytes. Replay needs
/// nothing else from the submission-time device state.
#[derive(Copy, Clone)]
pub struct DrawSnapshot {
    pub textures: [TextureHandle; MAX_TEXTURE_SLOTS],
    pub viewport: Viewport,
    pub scissor: Scissor,
    pub uniforms: [u8; UNIFORM_STAGING_SIZE],
}

#[derive(Copy, Clone, Debug)]
pub struct DrawParams {
    pub vertex_count: u32,
    pub first_vertex: u32,
    pub instance_count: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct DrawIndexedParams {
    pub index_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub instance_count: u32,
}

/// Read-only inputs of the geometry frontend for one draw.
pub struct GeometryState<'a> {
    pub buffers: &'a ResourcePool<BufferObject>,
    pub streams: &'a [StreamBinding; MAX_VERTEX_STREAMS],
    pub index_buffer: BufferHandle,
    pub index_offset: u32,
    pub viewport: Viewport,
    pub uniforms: &'a [u8],
}

/// Raster-side outputs for the direct path.
pub struct RasterEnv<'a> {
    pub target: RenderTarget,
    pub textures: TextureUnits<'a>,
    /// framebuffer ∩ viewport ∩ scissor
    pub bounds: Rect,
}

/// Sink for binned triangles.
pub struct Binner<'a> {
    pub arena: &'a mut FrameArena,
    pub grid: &'a mut TileGrid,
    pub pipeline: PipelineHandle,
    pub snapshot: u32,
}

/// The type-erased pipeline interface the device drives.
pub trait SoftPipeline: Send + Sync {
    /// True when the deferred path can bin this pipeline's output:
    /// triangle topology, filled.
    fn bins_triangles(&self) -> bool;

    /// Frontend for the deferred path: vertex shading, clipping, screen
    /// mapping, then one bin record per covered tile.
    fn process_geometry(&self, gx: &GeometryState, binner: &mut Binner, params: DrawParams);

    fn process_geometry_indexed(
        &self,
        gx: &GeometryState,
        binner: &mut Binner,
        params: DrawIndexedParams,
    );

    /// Backend for the deferred path: re-materializes a binned triangle
    /// and rasterizes it into the tile-clamped bounds.
    fn rasterize_triangle(
        &self,
        target: &RenderTarget,
        textures: &TextureUnits,
        uniforms: &[u8],
        tri: &TriangleData,
        bounds: Rect,
    );

    /// Direct path: the full pipeline inline, no binning.
    fn draw(&self, gx: &GeometryState, env: &RasterEnv, params: DrawParams);

    fn draw_indexed(&self, gx: &GeometryState, env: &RasterEnv, params: DrawIndexedParams);
}

/// Factory registered per shader type.
pub type PipelineFactory = Box<dyn Fn(&PipelineDesc) -> Box<dyn SoftPipeline>>;

pub fn pipeline_factory<S: Shader>() -> PipelineFactory {
    Box::new(|desc: &PipelineDesc| -> Box<dyn SoftPipeline> {
        Box::new(ShaderPipeline::<S>::new(desc))
    })
}

pub struct ShaderPipeline<S: Shader> {
    layout: VertexArrayLayout,
    topology: PrimitiveTopology,
    polygon_mode: PolygonMode,
    index_format: IndexFormat,
    raster: RasterState,
    _marker: PhantomData<fn() -> S>,
}

impl<S: Shader> ShaderPipeline<S> {
    pub fn new(desc: &PipelineDesc) -> ShaderPipeline<S> {
        ShaderPipeline {
            layout: VertexArrayLayout::from_input_state(&desc.input_layout),
            topology: desc.topology,
            polygon_mode: desc.polygon_mode,
            index_format: desc.index_format,
            raster: RasterState {
                cull_mode: desc.cull_mode,
                front_face: desc.front_face,
                depth_test: desc.depth_stencil.depth_test_enable,
                depth_write: desc.depth_stencil.depth_write_enable,
                depth_func: desc.depth_stencil.depth_compare_op,
                stencil: desc.depth_stencil.stencil_test,
                blend: desc.blend,
            },
            _marker: PhantomData,
        }
    }

    fn make_shader(&self, uniforms: &[u8]) -> S {
        let mut shader = S::default();
        shader.bind_uniforms(uniforms);
        shader
    }

    fn run_vertex(&self, gx: &GeometryState, shader: &S, index: u32, instance: u32) -> VertexOut {
        let mut input = VertexInput {
            attributes: [Vec4::UNIT_W; MAX_VERTEX_ATTRIBUTES],
            vertex_id: index,
            instance_id: instance,
        };
        for (location, slot) in self.layout.attributes.iter().enumerate() {
            if let Some(attr) = slot {
                input.attributes[location] =
                    fetch_attribute(gx.buffers, gx.streams, &self.layout, attr, index, instance);
            }
        }
        let mut ctx = ShaderContext::default();
        let pos = shader.vertex(&input, &mut ctx);
        VertexOut::new(pos, ctx)
    }

    /// Runs assembly + vertex stage + clip + screen transform for every
    /// primitive of one instance, handing finished screen-space primitives
    /// to the sinks.
    fn process_instance<G, T, L, P>(
        &self,
        gx: &GeometryState,
        shader: &S,
        count: u32,
        instance: u32,
        get_index: &G,
        tri_sink: &mut T,
        line_sink: &mut L,
        point_sink: &mut P,
    ) where
        G: Fn(u32) -> u32,
        T: FnMut(&VertexOut, &VertexOut, &VertexOut),
        L: FnMut(&VertexOut, &VertexOut),
        P: FnMut(&VertexOut),
    {
        assembler::assemble(self.topology, count, get_index, |prim| match prim {
            Primitive::Triangle(i0, i1, i2) => {
                let v0 = self.run_vertex(gx, shader, i0, instance);
                let v1 = self.run_vertex(gx, shader, i1, instance);
                let v2 = self.run_vertex(gx, shader, i2, instance);

                let mut polygon = clip::clip_triangle(v0, v1, v2);
                if polygon.is_empty() {
                    return;
                }
                for v in polygon.iter_mut() {
                    raster::transform_to_screen(v, &gx.viewport);
                }

                match self.polygon_mode {
                    PolygonMode::Fill => {
                        // fan-triangulate the clipped polygon
                        for k in 1..polygon.len() - 1 {
                            tri_sink(&polygon[0], &polygon[k], &polygon[k + 1]);
                        }
                    }
                    PolygonMode::Line => {
                        for k in 0..polygon.len() {
                            line_sink(&polygon[k], &polygon[(k + 1) % polygon.len()]);
                        }
                    }
                    PolygonMode::Point => {
                        for v in polygon.iter() {
                            point_sink(v);
                        }
                    }
                }
            }
            Primitive::Line(i0, i1) => {
                let v0 = self.run_vertex(gx, shader, i0, instance);
                let v1 = self.run_vertex(gx, shader, i1, instance);
                if let Some(mut clipped) = clip::clip_line(&v0, &v1) {
                    raster::transform_to_screen(&mut clipped[0], &gx.viewport);
                    raster::transform_to_screen(&mut clipped[1], &gx.viewport);
                    line_sink(&clipped[0], &clipped[1]);
                }
            }
            Primitive::Point(i) => {
                let mut v = self.run_vertex(gx, shader, i, instance);
                if clip::point_culled(v.pos) {
                    return;
                }
                raster::transform_to_screen(&mut v, &gx.viewport);
                point_sink(&v);
            }
        });
    }

    /// Resolves and validates the index range of an indexed draw. The
    /// whole draw is rejected on overflow; there is no partial work.
    fn read_indices(&self, gx: &GeometryState, params: &DrawIndexedParams) -> Option<Vec<u32>> {
        let buffer = match gx.buffers.get(gx.index_buffer.raw()) {
            Some(b) => b,
            None => {
                error!("draw_indexed: no valid index buffer bound, draw dropped");
                return None;
            }
        };
        let index_size = self.index_format.byte_size();
        let start = gx.index_offset as usize + params.first_index as usize * index_size;
        let byte_len = params.index_count as usize * index_size;
        let bytes = match buffer.read(start, byte_len) {
            Some(b) => b,
            None => {
                error!(
                    "draw_indexed: index range {}..{} overflows the {}-byte buffer, draw dropped",
                    start,
                    start + byte_len,
                    buffer.len()
                );
                return None;
            }
        };

        let mut indices = Vec::with_capacity(params.index_count as usize);
        match self.index_format {
            IndexFormat::U8 => {
                for &b in bytes.iter() {
                    indices.push(apply_base(u32::from(b), params.base_vertex));
                }
            }
            IndexFormat::U16 => {
                for chunk in bytes.chunks_exact(2) {
                    indices.push(apply_base(
                        u32::from(u16::from_le_bytes([chunk[0], chunk[1]])),
                        params.base_vertex,
                    ));
                }
            }
            IndexFormat::U32 => {
                for chunk in bytes.chunks_exact(4) {
                    indices.push(apply_base(
                        u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                        params.base_vertex,
                    ));
                }
            }
        }
        Some(indices)
    }

    fn bin_polygon_triangle(&self, binner: &mut Binner, v0: &VertexOut, v1: &VertexOut, v2: &VertexOut) {
        let tri = TriangleData::from_vertices(v0, v1, v2);
        let min_x = tri.screen[0].x.min(tri.screen[1].x).min(tri.screen[2].x);
        let max_x = tri.screen[0].x.max(tri.screen[1].x).max(tri.screen[2].x);
        let min_y = tri.screen[0].y.min(tri.screen[1].y).min(tri.screen[2].y);
        let max_y = tri.screen[0].y.max(tri.screen[1].y).max(tri.screen[2].y);
        let offset = binner.arena.alloc(tri);
        binner.grid.bin_triangle(
            min_x,
            min_y,
            max_x,
            max_y,
            BinRecord {
                pipeline: binner.pipeline,
                triangle: offset,
                snapshot: binner.snapshot,
            },
        );
    }
}

fn apply_base(index: u32, base_vertex: i32) -> u32 {
    (i64::from(index) + i64::from(base_vertex)).max(0) as u32
}

impl<S: Shader> SoftPipeline for ShaderPipeline<S> {
    fn bins_triangles(&self) -> bool {
        self.polygon_mode == PolygonMode::Fill
            && match self.topology {
                PrimitiveTopology::Triangles
                | PrimitiveTopology::TriangleStrip
                | PrimitiveTopology::TriangleFan => true,
                _ => false,
            }
    }

    fn process_geometry(&self, gx: &GeometryState, binner: &mut Binner, params: DrawParams) {
        if !self.bins_triangles() {
            warn!("process_geometry on a non-binnable pipeline, draw dropped");
            return;
        }
        let shader = self.make_shader(gx.uniforms);
        let first = params.first_vertex;
        for instance in 0..params.instance_count {
            self.process_instance(
                gx,
                &shader,
                params.vertex_count,
                instance,
                &|i| first + i,
                &mut |v0: &VertexOut, v1: &VertexOut, v2: &VertexOut| {
                    self.bin_polygon_triangle(binner, v0, v1, v2)
                },
                &mut |_: &VertexOut, _: &VertexOut| {},
                &mut |_: &VertexOut| {},
            );
        }
    }

    fn process_geometry_indexed(
        &self,
        gx: &GeometryState,
        binner: &mut Binner,
        params: DrawIndexedParams,
    ) {
        if !self.bins_triangles() {
            warn!("process_geometry_indexed on a non-binnable pipeline, draw dropped");
            return;
        }
        let indices = match self.read_indices(gx, &params) {
            Some(i) => i,
            None => return,
        };
        let shader = self.make_shader(gx.uniforms);
        for instance in 0..params.instance_count {
            self.process_instance(
                gx,
                &shader,
                params.index_count,
                instance,
                &|i| indices[i as usize],
                &mut |v0: &VertexOut, v1: &VertexOut, v2: &VertexOut| {
                    self.bin_polygon_triangle(binner, v0, v1, v2)
                },
                &mut |_: &VertexOut, _: &VertexOut| {},
                &mut |_: &VertexOut| {},
            );
        }
    }

    fn rasterize_triangle(
        &self,
        target: &RenderTarget,
        textures: &TextureUnits,
        uniforms: &[u8],
        tri: &TriangleData,
        bounds: Rect,
    ) {
        let shader = self.make_shader(uniforms);
        let v0 = tri.vertex(0);
        let v1 = tri.vertex(1);
        let v2 = tri.vertex(2);
        raster::draw_triangle(
            target,
            &self.raster,
            bounds,
            &shader,
            textures,
            &v0,
            &v1,
            &v2,
        );
    }

    fn draw(&self, gx: &GeometryState, env: &RasterEnv, params: DrawParams) {
        let shader = self.make_shader(gx.uniforms);
        let first = params.first_vertex;
        let state = &self.raster;
        for instance in 0..params.instance_count {
            self.process_instance(
                gx,
                &shader,
                params.vertex_count,
                instance,
                &|i| first + i,
                &mut |v0: &VertexOut, v1: &VertexOut, v2: &VertexOut| {
                    raster::draw_triangle(
                        &env.target,
                        state,
                        env.bounds,
                        &shader,
                        &env.textures,
                        v0,
                        v1,
                        v2,
                    )
                },
                &mut |v0: &VertexOut, v1: &VertexOut| {
                    raster::draw_line(&env.target, state, env.bounds, &shader, &env.textures, v0, v1)
                },
                &mut |v: &VertexOut| {
                    raster::draw_point(&env.target, state, env.bounds, &shader, &env.textures, v)
                },
            );
        }
    }

    fn draw_indexed(&self, gx: &GeometryState, env: &RasterEnv, params: DrawIndexedParams) {
        let indices = match self.read_indices(gx, &params) {
            Some(i) => i,
            None => return,
        };
        let shader = self.make_shader(gx.uniforms);
        let state = &self.raster;
        for instance in 0..params.instance_count {
            self.process_instance(
                gx,
                &shader,
                params.index_count,
                instance,
                &|i| indices[i as usize],
                &mut |v0: &VertexOut, v1: &VertexOut, v2: &VertexOut| {
                    raster::draw_triangle(
                        &env.target,
                        state,
                        env.bounds,
                        &shader,
                        &env.textures,
                        v0,
                        v1,
                        v2,
                    )
                },
                &mut |v0: &VertexOut, v1: &VertexOut| {
                    raster::draw_line(&env.target, state, env.bounds, &shader, &env.textures, v0, v1)
                },
                &mut |v: &VertexOut| {
                    raster::draw_point(&env.target, state, env.bounds, &shader, &env.textures, v)
                },
            );
        }
    }
}
