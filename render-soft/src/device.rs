//! The software device.
//!
//! Owns every pool, the uniform staging area, the frame arena, the tile
//! grid and the worker pool; consumes command buffers strictly in stream
//! order. In deferred (tile-based) mode, binnable draws run their geometry
//! frontend on the submission thread and the accumulated bins are shaded
//! in parallel at end of pass; everything else takes the direct path.
//!
//! No error escapes `submit`: bad handles, overflowing draws and malformed
//! packets are logged and dropped, and decoding continues.

use crate::arena::FrameArena;
use crate::buffer::BufferObject;
use crate::framebuffer::Framebuffer;
use crate::jobs::JobSystem;
use crate::pipeline::{
    pipeline_factory, Binner, DrawIndexedParams, DrawParams, DrawSnapshot, GeometryState,
    PipelineFactory, RasterEnv, SoftPipeline, TriangleData,
};
use crate::pool::ResourcePool;
use crate::raster::{Rect, RenderTarget};
use crate::shader::{Shader, TextureUnits};
use crate::texture::Texture;
use crate::tiler::{TileGrid, DEFAULT_TILE_SIZE};
use crate::vao::StreamBinding;
use config::Config;
use fxhash::FxHashMap;
use glint_render::command::{UNIFORM_SLOT_COUNT, UNIFORM_SLOT_SIZE, UNIFORM_STAGING_SIZE};
use glint_render::handle::RawHandle;
use glint_render::image::MAX_TEXTURE_SLOTS;
use glint_render::vertex::MAX_VERTEX_STREAMS;
use glint_render::{
    BufferDesc, BufferHandle, ClearFlags, Command, CommandBuffer, Device, Error, LoadOp,
    PipelineDesc, PipelineHandle, PixelFormat, PixelType, RenderPassDesc, RenderRect, Result,
    SamplerDescription, Scissor, ScissorRect, ShaderHandle, TextureDesc, TextureHandle, Viewport,
};
use log::{debug, error, warn};
use std::sync::Arc;

/// Backend tuning knobs.
#[derive(Copy, Clone, Debug)]
pub struct DeviceOptions {
    pub tile_size: u32,
    /// 0 selects the hardware parallelism.
    pub worker_threads: usize,
    /// Tile-based deferred path on or off.
    pub deferred: bool,
}

impl DeviceOptions {
    /// Reads `soft.tile_size`, `soft.worker_threads` and `soft.deferred`,
    /// falling back to the defaults for anything unset.
    pub fn from_config(cfg: &Config) -> DeviceOptions {
        DeviceOptions {
            tile_size: cfg.get::<u32>("soft.tile_size").unwrap_or(DEFAULT_TILE_SIZE),
            worker_threads: cfg.get::<usize>("soft.worker_threads").unwrap_or(0),
            deferred: cfg.get::<bool>("soft.deferred").unwrap_or(true),
        }
    }
}

impl Default for DeviceOptions {
    fn default() -> DeviceOptions {
        DeviceOptions {
            tile_size: DEFAULT_TILE_SIZE,
            worker_threads: 0,
            deferred: true,
        }
    }
}

pub struct SoftDevice {
    framebuffer: Framebuffer,

    buffers: ResourcePool<BufferObject>,
    textures: ResourcePool<Texture>,
    pipelines: ResourcePool<Box<dyn SoftPipeline>>,
    shader_factories: FxHashMap<u32, PipelineFactory>,
    next_shader_id: u32,

    // decode-loop state
    uniforms: Vec<u8>,
    streams: [StreamBinding; MAX_VERTEX_STREAMS],
    index_buffer: BufferHandle,
    index_offset: u32,
    texture_slots: [TextureHandle; MAX_TEXTURE_SLOTS],
    current_pipeline: PipelineHandle,
    viewport: Viewport,
    scissor: Scissor,
    in_pass: bool,

    // deferred path
    deferred: bool,
    arena: FrameArena,
    tiler: TileGrid,
    jobs: JobSystem,
}

/// Everything a tile worker needs, as raw pointers into the device. The
/// submission thread blocks on the job barrier before any of the pointed-to
/// state can change again, and tiles partition the framebuffer pixels.
struct TilePass {
    arena: *const FrameArena,
    tiler: *const TileGrid,
    pipelines: *const ResourcePool<Box<dyn SoftPipeline>>,
    textures: *const ResourcePool<Texture>,
    target: RenderTarget,
    fb_rect: Rect,
}

unsafe impl Send for TilePass {}
unsafe impl Sync for TilePass {}

fn shade_tile(pass: &TilePass, tile_index: usize) {
    let arena = unsafe { &*pass.arena };
    let tiler = unsafe { &*pass.tiler };
    let pipelines = unsafe { &*pass.pipelines };
    let textures = unsafe { &*pass.textures };

    let tile_rect = tiler.tile_rect(tile_index).intersect(&pass.fb_rect);
    for record in tiler.records(tile_index) {
        let pipeline = match pipelines.get(record.pipeline.raw()) {
            Some(p) => p,
            None => continue,
        };
        let tri = arena.get::<TriangleData>(record.triangle);
        let snapshot = arena.get::<DrawSnapshot>(record.snapshot);

        let mut bounds = tile_rect.intersect(&viewport_rect(&snapshot.viewport));
        if let Scissor::Enabled(sc) = snapshot.scissor {
            bounds = bounds.intersect(&Rect::new(sc.x, sc.y, sc.width, sc.height));
        }
        if bounds.is_empty() {
            continue;
        }

        let mut units = TextureUnits::empty();
        for (slot, &handle) in snapshot.textures.iter().enumerate() {
            if !handle.is_null() {
                units.slots[slot] = textures.get(handle.raw());
            }
        }

        pipeline.rasterize_triangle(&pass.target, &units, &snapshot.uniforms, tri, bounds);
    }
}

fn viewport_rect(viewport: &Viewport) -> Rect {
    Rect::new(
        viewport.x.floor() as i32,
        viewport.y.floor() as i32,
        viewport.width.ceil() as i32,
        viewport.height.ceil() as i32,
    )
}

impl SoftDevice {
    pub fn new(width: u32, height: u32) -> SoftDevice {
        SoftDevice::with_options(width, height, DeviceOptions::default())
    }

    pub fn with_config(width: u32, height: u32, cfg: &Config) -> SoftDevice {
        SoftDevice::with_options(width, height, DeviceOptions::from_config(cfg))
    }

    pub fn with_options(width: u32, height: u32, options: DeviceOptions) -> SoftDevice {
        debug!(
            "soft device {}x{}, tile size {}, deferred: {}",
            width, height, options.tile_size, options.deferred
        );
        SoftDevice {
            framebuffer: Framebuffer::new(width, height),
            buffers: ResourcePool::new(),
            textures: ResourcePool::new(),
            pipelines: ResourcePool::new(),
            shader_factories: FxHashMap::default(),
            next_shader_id: 1,
            uniforms: vec![0; UNIFORM_STAGING_SIZE],
            streams: Default::default(),
            index_buffer: BufferHandle::NULL,
            index_offset: 0,
            texture_slots: [TextureHandle::NULL; MAX_TEXTURE_SLOTS],
            current_pipeline: PipelineHandle::NULL,
            viewport: (width, height).into(),
            scissor: Scissor::Disabled,
            in_pass: false,
            deferred: options.deferred,
            arena: FrameArena::new(),
            tiler: TileGrid::new(options.tile_size),
            jobs: JobSystem::new(options.worker_threads),
        }
    }

    /// Registers a shader type; pipelines referencing the returned handle
    /// are monomorphized over `S`.
    pub fn register_shader<S: Shader>(&mut self) -> ShaderHandle {
        let id = self.next_shader_id;
        self.next_shader_id += 1;
        self.shader_factories.insert(id, pipeline_factory::<S>());
        ShaderHandle(RawHandle::new(id, 0))
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        &mut self.framebuffer
    }

    /// Convenience for tests and tools: create + upload + mip in one call.
    pub fn create_texture_with_data(
        &mut self,
        desc: &TextureDesc,
        data: &[u8],
        format: PixelFormat,
    ) -> Result<TextureHandle> {
        let handle = self.create_texture(desc)?;
        self.upload_texture(handle, 0, data, format, PixelType::UnsignedByte)?;
        Ok(handle)
    }

    fn fb_rect(&self) -> Rect {
        Rect::new(
            0,
            0,
            self.framebuffer.width() as i32,
            self.framebuffer.height() as i32,
        )
    }

    fn render_area_rect(area: &RenderRect) -> Option<Rect> {
        if area.is_disabled() {
            None
        } else {
            Some(Rect::new(area.x, area.y, area.w, area.h))
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::SetPipeline { pipeline } => {
                if self.pipelines.get(pipeline.raw()).is_none() {
                    error!("SetPipeline: stale or unknown pipeline handle");
                    self.current_pipeline = PipelineHandle::NULL;
                } else {
                    self.current_pipeline = pipeline;
                }
            }
            Command::SetViewport { viewport } => {
                self.viewport = viewport;
            }
            Command::SetScissor { x, y, w, h } => {
                self.scissor = if w < 0 {
                    Scissor::Disabled
                } else {
                    Scissor::Enabled(ScissorRect {
                        x,
                        y,
                        width: w,
                        height: h,
                    })
                };
            }
            Command::SetVertexStream {
                binding,
                buffer,
                offset,
                stride,
            } => {
                if (binding as usize) < MAX_VERTEX_STREAMS {
                    self.streams[binding as usize] = StreamBinding {
                        buffer,
                        offset,
                        stride,
                    };
                } else {
                    error!("SetVertexStream: binding {} out of range", binding);
                }
            }
            Command::SetIndexBuffer { buffer, offset } => {
                self.index_buffer = buffer;
                self.index_offset = offset;
            }
            Command::SetTexture { slot, texture } => {
                if (slot as usize) < MAX_TEXTURE_SLOTS {
                    self.texture_slots[slot as usize] = texture;
                } else {
                    error!("SetTexture: slot {} out of range", slot);
                }
            }
            Command::UpdateUniform { slot, data } => {
                let slot = slot as usize;
                if slot >= UNIFORM_SLOT_COUNT || data.len() > UNIFORM_SLOT_SIZE {
                    error!("UpdateUniform: slot {} / {} bytes rejected", slot, data.len());
                    return;
                }
                let offset = slot * UNIFORM_SLOT_SIZE;
                self.uniforms[offset..offset + data.len()].copy_from_slice(data);
            }
            Command::Clear {
                color,
                depth,
                stencil,
                flags,
            } => {
                // keep tile replay ordered with respect to the clear
                self.flush_tiles();
                if flags.contains(ClearFlags::COLOR) {
                    self.framebuffer
                        .clear_color(crate::math::Vec4::from_array(color), None);
                }
                if flags.contains(ClearFlags::DEPTH) {
                    self.framebuffer.clear_depth(depth, None);
                }
                if flags.contains(ClearFlags::STENCIL) {
                    self.framebuffer.clear_stencil(stencil, None);
                }
            }
            Command::BeginPass { desc } => self.begin_pass(&desc),
            Command::EndPass => self.end_pass(),
            Command::Draw {
                vertex_count,
                first_vertex,
                instance_count,
            } => self.draw_internal(DrawParams {
                vertex_count,
                first_vertex,
                instance_count: instance_count.max(1),
            }),
            Command::DrawIndexed {
                index_count,
                first_index,
                base_vertex,
                instance_count,
            } => self.draw_indexed_internal(DrawIndexedParams {
                index_count,
                first_index,
                base_vertex,
                instance_count: instance_count.max(1),
            }),
        }
    }

    fn begin_pass(&mut self, desc: &RenderPassDesc) {
        if self.in_pass {
            error!("BeginPass inside an open pass, packet dropped");
            return;
        }
        self.in_pass = true;

        self.viewport = if desc.initial_viewport.is_disabled() {
            (self.framebuffer.width(), self.framebuffer.height()).into()
        } else {
            Viewport {
                x: desc.initial_viewport.x as f32,
                y: desc.initial_viewport.y as f32,
                width: desc.initial_viewport.w as f32,
                height: desc.initial_viewport.h as f32,
            }
        };
        self.scissor = if desc.initial_scissor.is_disabled() {
            Scissor::Disabled
        } else {
            Scissor::Enabled(ScissorRect {
                x: desc.initial_scissor.x,
                y: desc.initial_scissor.y,
                width: desc.initial_scissor.w,
                height: desc.initial_scissor.h,
            })
        };

        let area = Self::render_area_rect(&desc.render_area);
        if desc.color_load_op == LoadOp::Clear {
            self.framebuffer
                .clear_color(crate::math::Vec4::from_array(desc.clear_color), area);
        }
        if desc.depth_load_op == LoadOp::Clear {
            self.framebuffer.clear_depth(desc.clear_depth, area);
            self.framebuffer.clear_stencil(desc.clear_stencil, area);
        }

        if self.deferred {
            self.arena.reset();
            self.tiler
                .begin_frame(self.framebuffer.width(), self.framebuffer.height());
        }
    }

    fn end_pass(&mut self) {
        if !self.in_pass {
            error!("EndPass without an open pass, packet dropped");
            return;
        }
        self.flush_tiles();
        self.in_pass = false;
        if self.deferred {
            // no bin offset survives the pass
            self.arena.reset();
        }
    }

    /// Shades every occupied tile in parallel and drains the bins. Also
    /// called mid-pass when an operation (Clear) must observe the draws
    /// already binned.
    fn flush_tiles(&mut self) {
        if !self.deferred {
            return;
        }
        let occupied = self.tiler.occupied_tiles();
        if occupied.is_empty() {
            return;
        }

        let fb_rect = self.fb_rect();
        let target = self.framebuffer.target();
        let pass = Arc::new(TilePass {
            arena: &self.arena,
            tiler: &self.tiler,
            pipelines: &self.pipelines,
            textures: &self.textures,
            target,
            fb_rect,
        });

        for tile_index in occupied {
            let pass = pass.clone();
            self.jobs.execute(move || shade_tile(&pass, tile_index));
        }
        self.jobs.wait_idle();

        self.tiler
            .begin_frame(self.framebuffer.width(), self.framebuffer.height());
    }

    fn draw_bounds(&self) -> Rect {
        let mut bounds = self.fb_rect().intersect(&viewport_rect(&self.viewport));
        if let Scissor::Enabled(sc) = self.scissor {
            bounds = bounds.intersect(&Rect::new(sc.x, sc.y, sc.width, sc.height));
        }
        bounds
    }

    fn snapshot_draw(&mut self) -> u32 {
        let mut snapshot = DrawSnapshot {
            textures: self.texture_slots,
            viewport: self.viewport,
            scissor: self.scissor,
            uniforms: [0; UNIFORM_STAGING_SIZE],
        };
        snapshot.uniforms.copy_from_slice(&self.uniforms);
        self.arena.alloc(snapshot)
    }

    fn draw_internal(&mut self, params: DrawParams) {
        let pipeline = match self.pipelines.get(self.current_pipeline.raw()) {
            Some(p) => p,
            None => {
                error!("Draw with no valid pipeline bound, dropped");
                return;
            }
        };
        if self.deferred && self.in_pass && pipeline.bins_triangles() {
            let snapshot = self.snapshot_draw();
            let pipeline = self.pipelines.get(self.current_pipeline.raw()).unwrap();
            let gx = GeometryState {
                buffers: &self.buffers,
                streams: &self.streams,
                index_buffer: self.index_buffer,
                index_offset: self.index_offset,
                viewport: self.viewport,
                uniforms: &self.uniforms,
            };
            let mut binner = Binner {
                arena: &mut self.arena,
                grid: &mut self.tiler,
                pipeline: self.current_pipeline,
                snapshot,
            };
            pipeline.process_geometry(&gx, &mut binner, params);
        } else {
            let bounds = self.draw_bounds();
            let mut units = TextureUnits::empty();
            for (slot, &handle) in self.texture_slots.iter().enumerate() {
                if !handle.is_null() {
                    units.slots[slot] = self.textures.get(handle.raw());
                }
            }
            let gx = GeometryState {
                buffers: &self.buffers,
                streams: &self.streams,
                index_buffer: self.index_buffer,
                index_offset: self.index_offset,
                viewport: self.viewport,
                uniforms: &self.uniforms,
            };
            let env = RasterEnv {
                target: self.framebuffer.target(),
                textures: units,
                bounds,
            };
            let pipeline = self.pipelines.get(self.current_pipeline.raw()).unwrap();
            pipeline.draw(&gx, &env, params);
        }
    }

    fn draw_indexed_internal(&mut self, params: DrawIndexedParams) {
        let pipeline = match self.pipelines.get(self.current_pipeline.raw()) {
            Some(p) => p,
            None => {
                error!("DrawIndexed with no valid pipeline bound, dropped");
                return;
            }
        };
        if self.deferred && self.in_pass && pipeline.bins_triangles() {
            let snapshot = self.snapshot_draw();
            let pipeline = self.pipelines.get(self.current_pipeline.raw()).unwrap();
            let gx = GeometryState {
                buffers: &self.buffers,
                streams: &self.streams,
                index_buffer: self.index_buffer,
                index_offset: self.index_offset,
                viewport: self.viewport,
                uniforms: &self.uniforms,
            };
            let mut binner = Binner {
                arena: &mut self.arena,
                grid: &mut self.tiler,
                pipeline: self.current_pipeline,
                snapshot,
            };
            pipeline.process_geometry_indexed(&gx, &mut binner, params);
        } else {
            let bounds = self.draw_bounds();
            let mut units = TextureUnits::empty();
            for (slot, &handle) in self.texture_slots.iter().enumerate() {
                if !handle.is_null() {
                    units.slots[slot] = self.textures.get(handle.raw());
                }
            }
            let gx = GeometryState {
                buffers: &self.buffers,
                streams: &self.streams,
                index_buffer: self.index_buffer,
                index_offset: self.index_offset,
                viewport: self.viewport,
                uniforms: &self.uniforms,
            };
            let env = RasterEnv {
                target: self.framebuffer.target(),
                textures: units,
                bounds,
            };
            let pipeline = self.pipelines.get(self.current_pipeline.raw()).unwrap();
            pipeline.draw_indexed(&gx, &env, params);
        }
    }
}

impl Device for SoftDevice {
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        let mut buffer = BufferObject::new(desc.ty, desc.usage, desc.size);
        buffer.label = desc.label.map(str::to_owned);
        if let Some(data) = desc.initial_data {
            if !buffer.write(0, data) {
                return Err(Error::BufferOverflow);
            }
        }
        let handle = BufferHandle(self.buffers.allocate(buffer));
        debug!("created buffer {:?} ({} bytes)", handle, desc.size);
        Ok(handle)
    }

    fn update_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> Result<()> {
        let buf = self
            .buffers
            .get_mut(buffer.raw())
            .ok_or(Error::InvalidHandle)?;
        if buf.write(offset, data) {
            Ok(())
        } else {
            Err(Error::BufferOverflow)
        }
    }

    fn copy_buffer(
        &mut self,
        src: BufferHandle,
        src_offset: usize,
        dst: BufferHandle,
        dst_offset: usize,
        size: usize,
    ) -> Result<()> {
        let chunk = {
            let src_buf = self.buffers.get(src.raw()).ok_or(Error::InvalidHandle)?;
            src_buf
                .read(src_offset, size)
                .ok_or(Error::BufferOverflow)?
                .to_vec()
        };
        let dst_buf = self.buffers.get_mut(dst.raw()).ok_or(Error::InvalidHandle)?;
        if dst_buf.write(dst_offset, &chunk) {
            Ok(())
        } else {
            Err(Error::BufferOverflow)
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.release(buffer.raw());
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle> {
        let mut tex = Texture::new(desc.width, desc.height, desc.sampler);
        tex.label = desc.label.map(str::to_owned);
        let handle = TextureHandle(self.textures.allocate(tex));
        debug!(
            "created texture {:?} ({}x{})",
            handle, desc.width, desc.height
        );
        Ok(handle)
    }

    fn upload_texture(
        &mut self,
        texture: TextureHandle,
        level: u32,
        data: &[u8],
        format: PixelFormat,
        ty: PixelType,
    ) -> Result<()> {
        let tex = self
            .textures
            .get_mut(texture.raw())
            .ok_or(Error::InvalidHandle)?;
        tex.upload_level(level as usize, data, format, ty)
    }

    fn generate_mipmaps(&mut self, texture: TextureHandle) {
        if let Some(tex) = self.textures.get_mut(texture.raw()) {
            tex.generate_mipmaps();
        } else {
            warn!("generate_mipmaps: stale texture handle");
        }
    }

    fn set_sampler(&mut self, texture: TextureHandle, sampler: &SamplerDescription) {
        if let Some(tex) = self.textures.get_mut(texture.raw()) {
            tex.sampler = *sampler;
        } else {
            warn!("set_sampler: stale texture handle");
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.release(texture.raw());
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineHandle> {
        let factory = self
            .shader_factories
            .get(&desc.shader.raw().index())
            .ok_or_else(|| {
                error!("create_pipeline: unregistered shader handle");
                Error::UnknownShader
            })?;
        let pipeline = factory(desc);
        let handle = PipelineHandle(self.pipelines.allocate(pipeline));
        debug!(
            "created pipeline {:?} ({})",
            handle,
            desc.label.as_deref().unwrap_or("unnamed")
        );
        Ok(handle)
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipelines.release(pipeline.raw());
    }

    fn submit(&mut self, commands: &CommandBuffer) {
        for packet in commands.packets() {
            match packet.decode() {
                Some(command) => self.execute(command),
                None => warn!("skipping unknown or short packet type {}", packet.ty),
            }
        }
    }
}
