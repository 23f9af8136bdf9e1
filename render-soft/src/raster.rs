//! Triangle, line and point rasterization and the per-fragment pipeline.
//!
//! The triangle path walks the clipped screen-space bounding box with
//! incremental edge functions; attributes are interpolated
//! perspective-correctly with a 4-wide FMA chain per varying slot. The
//! fragment back end runs, in order: early-Z, LOD derivation, fragment
//! shader, discard, stencil + late depth, depth write, blend, color write.
//!
//! The `RenderTarget` raw pointers are written without synchronization;
//! callers must guarantee exclusive ownership of every pixel inside the
//! `bounds` rect they pass (the tile grid partitions the framebuffer, the
//! direct path owns it whole).

use crate::math::Vec4;
use crate::shader::{Fragment, Shader, ShaderContext, TextureUnits, VertexOut, MAX_VARYINGS};
use crate::simd::Simd4;
use glint_render::pipeline::{
    BlendFactor, BlendOp, ColorBlendState, CompareOp, CullMode, FrontFace, StencilOp,
    StencilOpState, StencilTest, Viewport,
};

/// Degenerate-triangle rejection threshold on the signed area.
pub const AREA_EPSILON: f32 = 1e-6;
/// Smallest accepted interpolated 1/w.
const W_EPSILON: f32 = 1e-6;
/// Tolerance for the Equal / NotEqual depth comparisons.
const DEPTH_EPSILON: f32 = 1e-5;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Rect {
        Rect { x, y, w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let x1 = (self.x + self.w).min(other.x + other.w);
        let y1 = (self.y + self.h).min(other.y + other.h);
        Rect {
            x,
            y,
            w: x1 - x,
            h: y1 - y,
        }
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }
}

/// Raw pixel pointers of the framebuffer. Pixels are partitioned between
/// workers by disjoint rects, which is what makes the unsynchronized
/// writes sound.
#[derive(Copy, Clone)]
pub struct RenderTarget {
    pub color: *mut u32,
    pub depth: *mut f32,
    pub stencil: *mut u8,
    pub width: i32,
    pub height: i32,
}

unsafe impl Send for RenderTarget {}
unsafe impl Sync for RenderTarget {}

/// Fixed-function raster state for one draw.
#[derive(Copy, Clone)]
pub struct RasterState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: CompareOp,
    pub stencil: StencilTest,
    pub blend: ColorBlendState,
}

impl Default for RasterState {
    fn default() -> RasterState {
        RasterState {
            cull_mode: CullMode::None,
            front_face: FrontFace::CounterClockwise,
            depth_test: true,
            depth_write: true,
            depth_func: CompareOp::Less,
            stencil: StencilTest::Disabled,
            blend: ColorBlendState::Disabled,
        }
    }
}

/// Perspective division and viewport mapping:
/// clip (x, y, z, w) → screen (pixel x, pixel y, window z in [0,1], 1/w).
/// Screen y grows downward.
pub fn transform_to_screen(v: &mut VertexOut, viewport: &Viewport) {
    // w was clipped against the near plane and is strictly positive here
    let rhw = 1.0 / v.pos.w;
    v.screen.x = viewport.x + (v.pos.x * rhw + 1.0) * 0.5 * viewport.width;
    v.screen.y = viewport.y + (1.0 - v.pos.y * rhw) * 0.5 * viewport.height;
    v.screen.z = (v.pos.z * rhw + 1.0) * 0.5;
    v.screen.w = rhw;
}

#[inline]
fn compare(op: CompareOp, new: f32, current: f32) -> bool {
    match op {
        CompareOp::Never => false,
        CompareOp::Less => new < current,
        CompareOp::Equal => (new - current).abs() < DEPTH_EPSILON,
        CompareOp::LessOrEqual => new <= current,
        CompareOp::Greater => new > current,
        CompareOp::NotEqual => (new - current).abs() > DEPTH_EPSILON,
        CompareOp::GreaterOrEqual => new >= current,
        CompareOp::Always => true,
    }
}

#[inline]
fn stencil_compare(ops: &StencilOpState, value: u8) -> bool {
    let reference = ops.reference & ops.compare_mask;
    let value = value & ops.compare_mask;
    match ops.compare_op {
        CompareOp::Never => false,
        CompareOp::Less => reference < value,
        CompareOp::Equal => reference == value,
        CompareOp::LessOrEqual => reference <= value,
        CompareOp::Greater => reference > value,
        CompareOp::NotEqual => reference != value,
        CompareOp::GreaterOrEqual => reference >= value,
        CompareOp::Always => true,
    }
}

#[inline]
fn apply_stencil_op(op: StencilOp, ops: &StencilOpState, value: &mut u8) {
    let new = match op {
        StencilOp::Keep => return,
        StencilOp::Zero => 0,
        StencilOp::Replace => ops.reference,
        StencilOp::IncrementAndClamp => value.saturating_add(1),
        StencilOp::DecrementAndClamp => value.saturating_sub(1),
        StencilOp::Invert => !*value,
        StencilOp::IncrementAndWrap => value.wrapping_add(1),
        StencilOp::DecrementAndWrap => value.wrapping_sub(1),
    };
    *value = (*value & !ops.write_mask) | (new & ops.write_mask);
}

#[inline]
fn color_factor(f: BlendFactor, src: Vec4, dst: Vec4) -> Vec4 {
    match f {
        BlendFactor::Zero => Vec4::ZERO,
        BlendFactor::One => Vec4::splat(1.0),
        BlendFactor::SrcColor => src,
        BlendFactor::OneMinusSrcColor => Vec4::splat(1.0) - src,
        BlendFactor::SrcAlpha => Vec4::splat(src.w),
        BlendFactor::OneMinusSrcAlpha => Vec4::splat(1.0 - src.w),
        BlendFactor::DstColor => dst,
        BlendFactor::OneMinusDstColor => Vec4::splat(1.0) - dst,
        BlendFactor::DstAlpha => Vec4::splat(dst.w),
        BlendFactor::OneMinusDstAlpha => Vec4::splat(1.0 - dst.w),
    }
}

#[inline]
fn alpha_factor(f: BlendFactor, src: Vec4, dst: Vec4) -> f32 {
    match f {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcColor | BlendFactor::SrcAlpha => src.w,
        BlendFactor::OneMinusSrcColor | BlendFactor::OneMinusSrcAlpha => 1.0 - src.w,
        BlendFactor::DstColor | BlendFactor::DstAlpha => dst.w,
        BlendFactor::OneMinusDstColor | BlendFactor::OneMinusDstAlpha => 1.0 - dst.w,
    }
}

#[inline]
fn combine(op: BlendOp, s: f32, d: f32) -> f32 {
    match op {
        BlendOp::Add => s + d,
        BlendOp::Subtract => s - d,
        BlendOp::ReverseSubtract => d - s,
        BlendOp::Min => s.min(d),
        BlendOp::Max => s.max(d),
    }
}

/// Applies the configured blend equation to one pixel.
pub fn blend(state: &ColorBlendState, src: Vec4, dst: Vec4) -> Vec4 {
    match *state {
        ColorBlendState::Disabled => src,
        ColorBlendState::Enabled {
            src_color_blend_factor,
            dst_color_blend_factor,
            color_blend_op,
            src_alpha_blend_factor,
            dst_alpha_blend_factor,
            alpha_blend_op,
        } => {
            let sf = color_factor(src_color_blend_factor, src, dst);
            let df = color_factor(dst_color_blend_factor, src, dst);
            let s = src * sf;
            let d = dst * df;
            let sa = src.w * alpha_factor(src_alpha_blend_factor, src, dst);
            let da = dst.w * alpha_factor(dst_alpha_blend_factor, src, dst);
            Vec4::new(
                combine(color_blend_op, s.x, d.x),
                combine(color_blend_op, s.y, d.y),
                combine(color_blend_op, s.z, d.z),
                combine(alpha_blend_op, sa, da),
            )
        }
    }
}

/// Maximum screen-space rate of change of the UV in varying slot 0,
/// by the chain rule for perspective-correct interpolation:
/// `du/dx = z * (d(u/w)/dx - u * d(1/w)/dx)`.
#[inline]
fn compute_rho(
    z: f32,
    duvw_dx: Vec4,
    duvw_dy: Vec4,
    dzw_dx: f32,
    dzw_dy: f32,
    u: f32,
    v: f32,
) -> f32 {
    let dudx = z * (duvw_dx.x - u * dzw_dx);
    let dvdx = z * (duvw_dx.y - v * dzw_dx);
    let dudy = z * (duvw_dy.x - u * dzw_dy);
    let dvdy = z * (duvw_dy.y - v * dzw_dy);
    let rho_x2 = dudx * dudx + dvdx * dvdx;
    let rho_y2 = dudy * dudy + dvdy * dvdy;
    rho_x2.max(rho_y2).sqrt()
}

/// Runs the fragment shader and raster operations for one covered pixel.
/// `early_z_done` records whether the interpolated depth already passed a
/// read-only test; a shader-written depth invalidates that result.
#[allow(clippy::too_many_arguments)]
#[inline]
fn shade_and_write<S: Shader>(
    target: &RenderTarget,
    state: &RasterState,
    shader: &S,
    textures: &TextureUnits,
    x: i32,
    y: i32,
    z: f32,
    z_inv: f32,
    front_facing: bool,
    rho: f32,
    ctx: ShaderContext,
    early_z_done: bool,
) {
    let pix = (y * target.width + x) as usize;

    let mut frag = Fragment::new(textures);
    frag.ctx = ctx;
    frag.frag_coord = Vec4::new(x as f32 + 0.5, y as f32 + 0.5, z, z_inv);
    frag.front_facing = front_facing;
    frag.rho = rho;

    let color_out = shader.fragment(&mut frag);
    if frag.discard {
        return;
    }

    let final_z = frag.frag_depth.unwrap_or(z);
    // a fragment-written depth invalidates the early test
    let late_depth_test = state.depth_test && (frag.frag_depth.is_some() || !early_z_done);

    let mut depth_pass = true;
    match state.stencil {
        StencilTest::Enabled { front, back } => {
            let ops = if front_facing { front } else { back };
            let stencil = unsafe { &mut *target.stencil.add(pix) };
            if !stencil_compare(&ops, *stencil) {
                apply_stencil_op(ops.fail_op, &ops, stencil);
                return;
            }
            if late_depth_test && !compare(state.depth_func, final_z, unsafe { *target.depth.add(pix) }) {
                apply_stencil_op(ops.depth_fail_op, &ops, stencil);
                depth_pass = false;
            } else {
                apply_stencil_op(ops.pass_op, &ops, stencil);
            }
        }
        StencilTest::Disabled => {
            if late_depth_test && !compare(state.depth_func, final_z, unsafe { *target.depth.add(pix) }) {
                depth_pass = false;
            }
        }
    }
    if !depth_pass {
        return;
    }

    unsafe {
        if state.depth_write {
            *target.depth.add(pix) = final_z;
        }
        let color_ptr = target.color.add(pix);
        let final_color = match state.blend {
            ColorBlendState::Disabled => color_out,
            ref blending => blend(blending, color_out, crate::color::unpack(*color_ptr)),
        };
        *color_ptr = crate::color::pack(final_color);
    }
}

/// Rasterizes one screen-space triangle into `bounds` (already the
/// intersection of framebuffer, viewport, scissor and, on the tile path,
/// the tile rect).
pub fn draw_triangle<S: Shader>(
    target: &RenderTarget,
    state: &RasterState,
    bounds: Rect,
    shader: &S,
    textures: &TextureUnits,
    v0: &VertexOut,
    v1: &VertexOut,
    v2: &VertexOut,
) {
    if bounds.is_empty() {
        return;
    }

    // signed area via the edge function; positive = counter-clockwise
    let mut area = (v1.screen.y - v0.screen.y) * (v2.screen.x - v0.screen.x)
        - (v1.screen.x - v0.screen.x) * (v2.screen.y - v0.screen.y);
    let is_ccw = area > 0.0;
    let is_front = match state.front_face {
        FrontFace::CounterClockwise => is_ccw,
        FrontFace::Clockwise => !is_ccw,
    };
    match state.cull_mode {
        CullMode::None => {}
        CullMode::Front => {
            if is_front {
                return;
            }
        }
        CullMode::Back => {
            if !is_front {
                return;
            }
        }
    }

    // swap v1/v2 when clockwise so the edge math sees positive area
    let swap = area < 0.0;
    let (tv0, tv1, tv2) = if swap { (v0, v2, v1) } else { (v0, v1, v2) };
    if swap {
        area = -area;
    }
    if area <= AREA_EPSILON {
        return;
    }
    let inv_area = 1.0 / area;

    let min_x = bounds.x.max(
        tv0.screen.x.min(tv1.screen.x).min(tv2.screen.x) as i32,
    );
    let max_x = (bounds.x + bounds.w - 1)
        .min(tv0.screen.x.max(tv1.screen.x).max(tv2.screen.x) as i32 + 1);
    let min_y = bounds.y.max(
        tv0.screen.y.min(tv1.screen.y).min(tv2.screen.y) as i32,
    );
    let max_y = (bounds.y + bounds.h - 1)
        .min(tv0.screen.y.max(tv1.screen.y).max(tv2.screen.y) as i32 + 1);
    if min_x > max_x || min_y > max_y {
        return;
    }

    // edge increments: edge k is opposite vertex k
    let a0 = tv2.screen.y - tv1.screen.y;
    let b0 = tv1.screen.x - tv2.screen.x;
    let a1 = tv0.screen.y - tv2.screen.y;
    let b1 = tv2.screen.x - tv0.screen.x;
    let a2 = tv1.screen.y - tv0.screen.y;
    let b2 = tv0.screen.x - tv1.screen.x;

    // varyings pre-multiplied by 1/w for perspective-correct interpolation
    let rhw0 = tv0.screen.w;
    let rhw1 = tv1.screen.w;
    let rhw2 = tv2.screen.w;
    let mut pre0 = [Simd4::splat(0.0); MAX_VARYINGS];
    let mut pre1 = [Simd4::splat(0.0); MAX_VARYINGS];
    let mut pre2 = [Simd4::splat(0.0); MAX_VARYINGS];
    for k in 0..MAX_VARYINGS {
        pre0[k] = Simd4::from_vec4(tv0.ctx.varyings[k]).mul(Simd4::splat(rhw0));
        pre1[k] = Simd4::from_vec4(tv1.ctx.varyings[k]).mul(Simd4::splat(rhw1));
        pre2[k] = Simd4::from_vec4(tv2.ctx.varyings[k]).mul(Simd4::splat(rhw2));
    }

    // per-triangle constants of the UV derivative chain (slot 0 is UV)
    let da_dx = a0 * inv_area;
    let db_dx = a1 * inv_area;
    let dg_dx = a2 * inv_area;
    let da_dy = b0 * inv_area;
    let db_dy = b1 * inv_area;
    let dg_dy = b2 * inv_area;
    let dzw_dx = da_dx * rhw0 + db_dx * rhw1 + dg_dx * rhw2;
    let dzw_dy = da_dy * rhw0 + db_dy * rhw1 + dg_dy * rhw2;
    let uvw0 = tv0.ctx.varyings[0] * rhw0;
    let uvw1 = tv1.ctx.varyings[0] * rhw1;
    let uvw2 = tv2.ctx.varyings[0] * rhw2;
    let duvw_dx = uvw0 * da_dx + uvw1 * db_dx + uvw2 * dg_dx;
    let duvw_dy = uvw0 * da_dy + uvw1 * db_dy + uvw2 * dg_dy;

    let edge = |ax: f32, ay: f32, bx: f32, by: f32, px: f32, py: f32| {
        (by - ay) * (px - ax) - (bx - ax) * (py - ay)
    };
    let start_x = min_x as f32 + 0.5;
    let start_y = min_y as f32 + 0.5;
    let mut w0_row = edge(
        tv1.screen.x, tv1.screen.y, tv2.screen.x, tv2.screen.y, start_x, start_y,
    );
    let mut w1_row = edge(
        tv2.screen.x, tv2.screen.y, tv0.screen.x, tv0.screen.y, start_x, start_y,
    );
    let mut w2_row = edge(
        tv0.screen.x, tv0.screen.y, tv1.screen.x, tv1.screen.y, start_x, start_y,
    );

    let early_z = state.depth_test && !S::WRITES_DEPTH;

    for y in min_y..=max_y {
        let mut w0 = w0_row;
        let mut w1 = w1_row;
        let mut w2 = w2_row;
        let row = (y * target.width) as usize;

        for x in min_x..=max_x {
            if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                let alpha = w0 * inv_area;
                let beta = w1 * inv_area;
                let gamma = w2 * inv_area;

                let z_inv = alpha * rhw0 + beta * rhw1 + gamma * rhw2;
                if z_inv > W_EPSILON {
                    let z = 1.0 / z_inv;

                    let early_pass = !early_z
                        || compare(state.depth_func, z, unsafe {
                            *target.depth.add(row + x as usize)
                        });

                    if early_pass {
                        let z_vec = Simd4::splat(z);
                        let alpha_vec = Simd4::splat(alpha);
                        let beta_vec = Simd4::splat(beta);
                        let gamma_vec = Simd4::splat(gamma);
                        let mut ctx = ShaderContext::default();
                        for k in 0..MAX_VARYINGS {
                            let interp = pre0[k]
                                .mul(alpha_vec)
                                .madd(pre1[k], beta_vec)
                                .madd(pre2[k], gamma_vec)
                                .mul(z_vec);
                            ctx.varyings[k] = interp.to_vec4();
                        }

                        let rho = compute_rho(
                            z,
                            duvw_dx,
                            duvw_dy,
                            dzw_dx,
                            dzw_dy,
                            ctx.varyings[0].x,
                            ctx.varyings[0].y,
                        );

                        shade_and_write(
                            target, state, shader, textures, x, y, z, z_inv, is_front, rho,
                            ctx, early_z,
                        );
                    }
                }
            }
            w0 += a0;
            w1 += a1;
            w2 += a2;
        }
        w0_row += b0;
        w1_row += b1;
        w2_row += b2;
    }
}

/// Bresenham line rasterization between two transformed endpoints.
pub fn draw_line<S: Shader>(
    target: &RenderTarget,
    state: &RasterState,
    bounds: Rect,
    shader: &S,
    textures: &TextureUnits,
    v0: &VertexOut,
    v1: &VertexOut,
) {
    if bounds.is_empty() {
        return;
    }

    let mut x0 = v0.screen.x as i32;
    let mut y0 = v0.screen.y as i32;
    let x1 = v1.screen.x as i32;
    let y1 = v1.screen.y as i32;

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let total = {
        let fx = v1.screen.x - v0.screen.x;
        let fy = v1.screen.y - v0.screen.y;
        let d = (fx * fx + fy * fy).sqrt();
        if d < 1e-5 {
            1.0
        } else {
            d
        }
    };

    let early_z = state.depth_test && !S::WRITES_DEPTH;

    loop {
        if bounds.contains(x0, y0) {
            // parameter along the segment by projected distance
            let fx = x0 as f32 - v0.screen.x;
            let fy = y0 as f32 - v0.screen.y;
            let t = ((fx * fx + fy * fy).sqrt() / total).max(0.0).min(1.0);

            let z_inv = v0.screen.w * (1.0 - t) + v1.screen.w * t;
            if z_inv > W_EPSILON {
                let z = 1.0 / z_inv;
                let pix = (y0 * target.width + x0) as usize;
                let early_pass = !early_z
                    || compare(state.depth_func, z, unsafe { *target.depth.add(pix) });
                if early_pass {
                    let w_t0 = v0.screen.w * (1.0 - t) * z;
                    let w_t1 = v1.screen.w * t * z;
                    let mut ctx = ShaderContext::default();
                    for k in 0..MAX_VARYINGS {
                        ctx.varyings[k] =
                            v0.ctx.varyings[k] * w_t0 + v1.ctx.varyings[k] * w_t1;
                    }
                    shade_and_write(
                        target, state, shader, textures, x0, y0, z, z_inv, true, 0.0, ctx,
                        early_z,
                    );
                }
            }
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// A point covers the single pixel its screen position floors into.
pub fn draw_point<S: Shader>(
    target: &RenderTarget,
    state: &RasterState,
    bounds: Rect,
    shader: &S,
    textures: &TextureUnits,
    v: &VertexOut,
) {
    let x = v.screen.x as i32;
    let y = v.screen.y as i32;
    if !bounds.contains(x, y) {
        return;
    }

    let z = v.screen.z;
    let pix = (y * target.width + x) as usize;
    let early_z = state.depth_test && !S::WRITES_DEPTH;
    let early_pass =
        !early_z || compare(state.depth_func, z, unsafe { *target.depth.add(pix) });
    if !early_pass {
        return;
    }
    shade_and_write(
        target,
        state,
        shader,
        textures,
        x,
        y,
        z,
        v.screen.w,
        true,
        0.0,
        v.ctx,
        early_z,
    );
}
