//! The user shader contract.
//!
//! A shader is a plain struct implementing [Shader]. The device registers
//! the type once (`register_shader::<S>()`), and every pipeline created
//! against the returned handle is monomorphized over `S`: no dynamic
//! dispatch happens inside the pixel loop, only once per draw when the
//! device calls through the pipeline trait object.

use crate::math::Vec4;
use crate::texture::Texture;
use glint_render::image::MAX_TEXTURE_SLOTS;
use glint_render::vertex::MAX_VERTEX_ATTRIBUTES;

/// Number of interpolated varying slots carried from vertex to fragment
/// stage. All slots are interpolated perspective-correctly, whether the
/// shader uses them or not.
pub const MAX_VARYINGS: usize = 8;

/// Varying storage written by the vertex stage and read, interpolated, by
/// the fragment stage. Slot 0 doubles as the UV source for mip selection.
#[derive(Copy, Clone, Debug)]
pub struct ShaderContext {
    pub varyings: [Vec4; MAX_VARYINGS],
}

impl Default for ShaderContext {
    fn default() -> ShaderContext {
        // zero-initialized, not (0,0,0,1): stale w=1 must not leak into
        // interpolation
        ShaderContext {
            varyings: [Vec4::ZERO; MAX_VARYINGS],
        }
    }
}

/// Input to one vertex shader invocation.
#[derive(Copy, Clone, Debug)]
pub struct VertexInput {
    /// Fetched attributes by shader location; unused slots hold (0,0,0,1).
    pub attributes: [Vec4; MAX_VERTEX_ATTRIBUTES],
    pub vertex_id: u32,
    pub instance_id: u32,
}

/// Output of the vertex stage, input to clipping and rasterization.
#[derive(Copy, Clone, Debug)]
pub struct VertexOut {
    /// Clip-space position, before the perspective divide.
    pub pos: Vec4,
    /// After the screen transform: (x, y) in pixels, z window depth in
    /// [0,1], and w holding 1/w_clip for perspective correction.
    pub screen: Vec4,
    pub ctx: ShaderContext,
}

impl VertexOut {
    pub fn new(pos: Vec4, ctx: ShaderContext) -> VertexOut {
        VertexOut {
            pos,
            screen: Vec4::ZERO,
            ctx,
        }
    }

    /// Linear interpolation of position and all varyings. Used on clip
    /// boundaries; linear interpolation in 4D clip space is
    /// perspective-correct because it happens before the divide.
    pub fn lerp(&self, other: &VertexOut, t: f32) -> VertexOut {
        let mut ctx = ShaderContext::default();
        for k in 0..MAX_VARYINGS {
            ctx.varyings[k] = self.ctx.varyings[k].lerp(other.ctx.varyings[k], t);
        }
        VertexOut {
            pos: self.pos.lerp(other.pos, t),
            screen: Vec4::ZERO,
            ctx,
        }
    }
}

/// The textures bound for a draw, resolved to pool payloads.
#[derive(Copy, Clone)]
pub struct TextureUnits<'a> {
    pub slots: [Option<&'a Texture>; MAX_TEXTURE_SLOTS],
}

impl<'a> TextureUnits<'a> {
    pub fn empty() -> TextureUnits<'a> {
        TextureUnits {
            slots: [None; MAX_TEXTURE_SLOTS],
        }
    }
}

/// Per-fragment state handed to the fragment stage.
pub struct Fragment<'a> {
    /// Perspective-correct interpolated varyings.
    pub ctx: ShaderContext,
    /// (x + 0.5, y + 0.5, window z, 1/w_view).
    pub frag_coord: Vec4,
    pub front_facing: bool,
    /// Screen-space UV footprint of this pixel (0 for lines and points).
    pub rho: f32,
    pub(crate) discard: bool,
    pub(crate) frag_depth: Option<f32>,
    pub(crate) textures: &'a TextureUnits<'a>,
}

impl<'a> Fragment<'a> {
    pub(crate) fn new(textures: &'a TextureUnits<'a>) -> Fragment<'a> {
        Fragment {
            ctx: ShaderContext::default(),
            frag_coord: Vec4::ZERO,
            front_facing: true,
            rho: 0.0,
            discard: false,
            frag_depth: None,
            textures,
        }
    }

    #[inline]
    pub fn varying(&self, slot: usize) -> Vec4 {
        self.ctx.varyings[slot]
    }

    /// Samples the texture bound to `slot`, selecting the mip level from
    /// this pixel's UV footprint: `lod = log2(rho)` with rho rescaled from
    /// normalized UV units to texels of the bound texture.
    pub fn sample(&self, slot: usize, u: f32, v: f32) -> Vec4 {
        match self.textures.slots.get(slot).and_then(|t| *t) {
            Some(texture) => {
                let extent = texture.width().max(texture.height()) as f32;
                let rho_texels = self.rho * extent;
                let lod = if rho_texels > 0.0 {
                    rho_texels.log2()
                } else {
                    0.0
                };
                texture.sample(u, v, lod)
            }
            None => crate::color::COLOR_ERROR,
        }
    }

    /// Samples with an explicit LOD.
    pub fn sample_lod(&self, slot: usize, u: f32, v: f32, lod: f32) -> Vec4 {
        match self.textures.slots.get(slot).and_then(|t| *t) {
            Some(texture) => texture.sample(u, v, lod),
            None => crate::color::COLOR_ERROR,
        }
    }

    /// Drops this fragment; no raster output is produced.
    #[inline]
    pub fn discard(&mut self) {
        self.discard = true;
    }

    /// Overrides the fragment depth, re-running the depth test late.
    #[inline]
    pub fn set_frag_depth(&mut self, z: f32) {
        self.frag_depth = Some(z);
    }
}

/// A programmable vertex/fragment shader pair.
///
/// One instance is created per draw (`Default`), then `bind_uniforms`
/// receives the staging snapshot. `vertex` and `fragment` take `&self` and
/// may run concurrently across tiles.
pub trait Shader: Default + Send + Sync + 'static {
    /// Declares that `fragment` may call
    /// [set_frag_depth](Fragment::set_frag_depth). Early-Z is skipped for
    /// such shaders, because the interpolated depth cannot stand in for
    /// the value the shader will write.
    const WRITES_DEPTH: bool = false;

    /// Receives the full uniform staging snapshot for the draw; slot `s`
    /// starts at byte `s * UNIFORM_SLOT_SIZE`. The default implementation
    /// ignores uniforms.
    fn bind_uniforms(&mut self, _data: &[u8]) {}

    /// Transforms one vertex; returns the clip-space position and fills
    /// whatever varyings the fragment stage needs.
    fn vertex(&self, input: &VertexInput, ctx: &mut ShaderContext) -> Vec4;

    /// Shades one fragment; returns the color.
    fn fragment(&self, frag: &mut Fragment) -> Vec4;
}

/// Reads uniform slot `s` from a staging snapshot as a plain-data value.
/// Returns `None` when the slot does not hold enough bytes.
pub fn uniform_slot<T: Copy>(data: &[u8], slot: usize) -> Option<T> {
    use glint_render::command::UNIFORM_SLOT_SIZE;
    let offset = slot * UNIFORM_SLOT_SIZE;
    let size = std::mem::size_of::<T>();
    if offset + size > data.len() || size > UNIFORM_SLOT_SIZE {
        return None;
    }
    let mut value = std::mem::MaybeUninit::<T>::uninit();
    unsafe {
        std::ptr::copy_nonoverlapping(
            data.as_ptr().add(offset),
            value.as_mut_ptr() as *mut u8,
            size,
        );
        Some(value.assume_init())
    }
}
