//! Textures: mip chains, wrapping, filtering, LOD selection.
//!
//! Storage is packed RGBA8888 per level. A texture with no uploaded level
//! is "empty"; sampling it returns the magenta error color instead of
//! reading anything.

use crate::color::{self, COLOR_ERROR};
use crate::math::Vec4;
use glint_render::error::{Error, Result};
use glint_render::image::{
    Filter, MinFilter, PixelFormat, PixelType, SamplerDescription, WrapMode,
};
use log::{error, warn};

pub struct Texture {
    width: u32,
    height: u32,
    /// Level 0 is the base image; each successor halves the extents,
    /// floored to 1.
    levels: Vec<Vec<u32>>,
    pub sampler: SamplerDescription,
    pub label: Option<String>,
}

/// Converts source pixels to the internal packed RGBA8888 layout.
pub fn convert_pixels(
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    ty: PixelType,
) -> Result<Vec<u32>> {
    let count = width as usize * height as usize;
    let channels = match format {
        PixelFormat::Rgba => 4,
        PixelFormat::Rgb => 3,
        PixelFormat::R => 1,
    };
    match ty {
        PixelType::UnsignedByte => {}
    }
    if data.len() < count * channels {
        error!(
            "texture upload: {} bytes supplied, {} required",
            data.len(),
            count * channels
        );
        return Err(Error::BufferOverflow);
    }
    let mut out = Vec::with_capacity(count);
    match format {
        PixelFormat::Rgba => {
            for px in data[..count * 4].chunks_exact(4) {
                out.push(
                    (u32::from(px[3]) << color::SHIFT_A)
                        | (u32::from(px[2]) << color::SHIFT_B)
                        | (u32::from(px[1]) << color::SHIFT_G)
                        | u32::from(px[0]),
                );
            }
        }
        PixelFormat::Rgb => {
            for px in data[..count * 3].chunks_exact(3) {
                out.push(
                    0xFF00_0000
                        | (u32::from(px[2]) << color::SHIFT_B)
                        | (u32::from(px[1]) << color::SHIFT_G)
                        | u32::from(px[0]),
                );
            }
        }
        PixelFormat::R => {
            for &px in data[..count].iter() {
                out.push(0xFF00_0000 | u32::from(px));
            }
        }
    }
    Ok(out)
}

impl Texture {
    pub fn new(width: u32, height: u32, sampler: SamplerDescription) -> Texture {
        Texture {
            width,
            height,
            levels: Vec::new(),
            sampler,
            label: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() || self.levels[0].is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Length of the contiguous, populated chain starting at level 0.
    /// Levels uploaded with holes below them are not sampled.
    fn chain_len(&self) -> usize {
        self.levels
            .iter()
            .position(|l| l.is_empty())
            .unwrap_or(self.levels.len())
    }

    /// Extents of a mip level; halved per level, floored to 1.
    pub fn level_extents(&self, level: usize) -> (u32, u32) {
        (
            (self.width >> level).max(1),
            (self.height >> level).max(1),
        )
    }

    /// Stores converted pixels at a mip level. The source must cover the
    /// level's exact extents.
    pub fn upload_level(
        &mut self,
        level: usize,
        data: &[u8],
        format: PixelFormat,
        ty: PixelType,
    ) -> Result<()> {
        let (w, h) = self.level_extents(level);
        let pixels = convert_pixels(data, w, h, format, ty)?;
        if self.levels.len() <= level {
            self.levels.resize(level + 1, Vec::new());
        }
        self.levels[level] = pixels;
        Ok(())
    }

    /// Rebuilds the chain below level 0 by averaging 2x2 texel blocks with
    /// integer channel arithmetic, halving until both extents reach 1.
    pub fn generate_mipmaps(&mut self) {
        if self.is_empty() {
            warn!("generate_mipmaps on an empty texture");
            return;
        }
        self.levels.truncate(1);
        let mut w = self.width.max(1) as usize;
        let mut h = self.height.max(1) as usize;
        while w > 1 || h > 1 {
            let src = self.levels.last().unwrap();
            let next_w = (w / 2).max(1);
            let next_h = (h / 2).max(1);
            let mut dst = Vec::with_capacity(next_w * next_h);
            for y in 0..next_h {
                for x in 0..next_w {
                    let sx = x * 2;
                    let sy = y * 2;
                    let sx1 = (sx + 1).min(w - 1);
                    let sy1 = (sy + 1).min(h - 1);
                    let c = [
                        src[sy * w + sx],
                        src[sy * w + sx1],
                        src[sy1 * w + sx],
                        src[sy1 * w + sx1],
                    ];
                    let avg = |shift: u32| {
                        (((c[0] >> shift) & 0xFF)
                            + ((c[1] >> shift) & 0xFF)
                            + ((c[2] >> shift) & 0xFF)
                            + ((c[3] >> shift) & 0xFF))
                            / 4
                    };
                    dst.push(
                        (avg(color::SHIFT_A) << color::SHIFT_A)
                            | (avg(color::SHIFT_B) << color::SHIFT_B)
                            | (avg(color::SHIFT_G) << color::SHIFT_G)
                            | avg(color::SHIFT_R),
                    );
                }
            }
            self.levels.push(dst);
            w = next_w;
            h = next_h;
        }
    }

    /// Samples the texture at normalized coordinates with an explicit LOD.
    pub fn sample(&self, u: f32, v: f32, lod: f32) -> Vec4 {
        if self.is_empty() {
            return COLOR_ERROR;
        }
        // Border-clamped axes return the border color for any coordinate
        // outside [0,1], regardless of filter.
        if outside_border(u, self.sampler.wrap_s) || outside_border(v, self.sampler.wrap_t) {
            return self.border_color();
        }

        let lod = {
            let biased = lod + self.sampler.lod_bias.into_inner();
            biased
                .max(self.sampler.min_lod.into_inner())
                .min(self.sampler.max_lod.into_inner())
        };

        // Fast path: power-of-two extents, repeat wrap, nearest, base level.
        if lod == 0.0
            && self.sampler.mag_filter == Filter::Nearest
            && self.sampler.wrap_s == WrapMode::Repeat
            && self.sampler.wrap_t == WrapMode::Repeat
            && self.width.is_power_of_two()
            && self.height.is_power_of_two()
        {
            let x = (u * self.width as f32) as i64 as i32 & (self.width as i32 - 1);
            let y = (v * self.height as f32) as i64 as i32 & (self.height as i32 - 1);
            return color::unpack(self.levels[0][(y as u32 * self.width + x as u32) as usize]);
        }

        // Magnification.
        if lod <= 0.0 {
            return match self.sampler.mag_filter {
                Filter::Nearest => self.sample_nearest(u, v, 0),
                Filter::Linear => self.sample_bilinear(u, v, 0),
            };
        }

        // Minification; clamp to the actual chain for mip access.
        let max_level = (self.chain_len() - 1) as f32;
        let lod = lod.min(max_level);
        match self.sampler.min_filter {
            MinFilter::Nearest => self.sample_nearest(u, v, 0),
            MinFilter::Linear => self.sample_bilinear(u, v, 0),
            MinFilter::NearestMipmapNearest => {
                self.sample_nearest(u, v, lod.round() as usize)
            }
            MinFilter::LinearMipmapNearest => {
                self.sample_bilinear(u, v, lod.round() as usize)
            }
            MinFilter::NearestMipmapLinear => {
                let base = lod.floor();
                let next = (base + 1.0).min(max_level);
                let f = lod - base;
                self.sample_nearest(u, v, base as usize)
                    .lerp(self.sample_nearest(u, v, next as usize), f)
            }
            MinFilter::LinearMipmapLinear => {
                let base = lod.floor();
                let next = (base + 1.0).min(max_level);
                let f = lod - base;
                self.sample_bilinear(u, v, base as usize)
                    .lerp(self.sample_bilinear(u, v, next as usize), f)
            }
        }
    }

    fn border_color(&self) -> Vec4 {
        let c = self.sampler.border_color;
        Vec4::new(
            c[0].into_inner(),
            c[1].into_inner(),
            c[2].into_inner(),
            c[3].into_inner(),
        )
    }

    /// Nearest-neighbor fetch at a mip level.
    fn sample_nearest(&self, u: f32, v: f32, level: usize) -> Vec4 {
        let level = level.min(self.chain_len() - 1);
        let (w, h) = self.level_extents(level);
        let x = (apply_wrap(u, self.sampler.wrap_s) * w as f32).floor() as i32;
        let y = (apply_wrap(v, self.sampler.wrap_t) * h as f32).floor() as i32;
        let x = wrap_index(x, w as i32, self.sampler.wrap_s);
        let y = wrap_index(y, h as i32, self.sampler.wrap_t);
        color::unpack(self.texel(level, x, y))
    }

    /// 2x2 bilinear blend at a mip level.
    fn sample_bilinear(&self, u: f32, v: f32, level: usize) -> Vec4 {
        let level = level.min(self.chain_len() - 1);
        let (w, h) = self.level_extents(level);
        let u_img = apply_wrap(u, self.sampler.wrap_s) * w as f32 - 0.5;
        let v_img = apply_wrap(v, self.sampler.wrap_t) * h as f32 - 0.5;
        let x0 = u_img.floor() as i32;
        let y0 = v_img.floor() as i32;
        let s = u_img - x0 as f32;
        let t = v_img - y0 as f32;

        let x0w = wrap_index(x0, w as i32, self.sampler.wrap_s);
        let x1w = wrap_index(x0 + 1, w as i32, self.sampler.wrap_s);
        let y0w = wrap_index(y0, h as i32, self.sampler.wrap_t);
        let y1w = wrap_index(y0 + 1, h as i32, self.sampler.wrap_t);

        let c = color::unpack4([
            self.texel(level, x0w, y0w),
            self.texel(level, x1w, y0w),
            self.texel(level, x0w, y1w),
            self.texel(level, x1w, y1w),
        ]);
        let top = c[0].lerp(c[1], s);
        let bottom = c[2].lerp(c[3], s);
        top.lerp(bottom, t)
    }

    #[inline]
    fn texel(&self, level: usize, x: i32, y: i32) -> u32 {
        let (w, h) = self.level_extents(level);
        let x = x.max(0).min(w as i32 - 1) as u32;
        let y = y.max(0).min(h as i32 - 1) as u32;
        self.levels[level][(y * w + x) as usize]
    }
}

/// True when a border-clamped axis must return the border color.
#[inline]
fn outside_border(uv: f32, mode: WrapMode) -> bool {
    mode == WrapMode::ClampToBorder && (uv < 0.0 || uv > 1.0)
}

/// Maps a normalized coordinate into [0,1) under the wrap mode. Border
/// clamping was already resolved by the caller; here it only keeps the
/// fetch in range.
#[inline]
fn apply_wrap(v: f32, mode: WrapMode) -> f32 {
    match mode {
        WrapMode::Repeat => v - v.floor(),
        WrapMode::MirroredRepeat => (v - 2.0 * (v / 2.0).floor()).abs() - 1.0,
        WrapMode::ClampToEdge | WrapMode::ClampToBorder => v.max(0.0).min(0.9999),
    }
}

/// Integer index wrap for filter taps that step across a texel boundary.
#[inline]
fn wrap_index(i: i32, n: i32, mode: WrapMode) -> i32 {
    match mode {
        WrapMode::Repeat => ((i % n) + n) % n,
        _ => i.max(0).min(n - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_render::image::SamplerDescription;

    fn solid(width: u32, height: u32, rgba: [u8; 4], sampler: SamplerDescription) -> Texture {
        let mut t = Texture::new(width, height, sampler);
        let data: Vec<u8> = (0..width * height).flat_map(|_| rgba.iter().cloned()).collect();
        t.upload_level(0, &data, PixelFormat::Rgba, PixelType::UnsignedByte)
            .unwrap();
        t
    }

    #[test]
    fn empty_texture_samples_error_color() {
        let t = Texture::new(4, 4, SamplerDescription::default());
        assert_eq!(t.sample(0.5, 0.5, 0.0), COLOR_ERROR);
    }

    #[test]
    fn constant_texture_is_constant_for_all_modes() {
        let wraps = [
            WrapMode::Repeat,
            WrapMode::MirroredRepeat,
            WrapMode::ClampToEdge,
        ];
        let filters = [
            MinFilter::Nearest,
            MinFilter::Linear,
            MinFilter::NearestMipmapNearest,
            MinFilter::LinearMipmapNearest,
            MinFilter::NearestMipmapLinear,
            MinFilter::LinearMipmapLinear,
        ];
        for &wrap in wraps.iter() {
            for &min in filters.iter() {
                let mut sampler = SamplerDescription::default().with_wrap(wrap);
                sampler.min_filter = min;
                let mut t = solid(8, 8, [64, 128, 255, 255], sampler);
                t.generate_mipmaps();
                let c = t.sample(0.3, 0.7, 0.0);
                assert!((c.x - 64.0 / 255.0).abs() < 1.0 / 255.0);
                assert!((c.y - 128.0 / 255.0).abs() < 1.0 / 255.0);
                assert!((c.z - 1.0).abs() < 1.0 / 255.0);
            }
        }
    }

    #[test]
    fn repeat_wraps_u_one_to_zero() {
        // 2x1 texture, red then green
        let mut t = Texture::new(2, 1, SamplerDescription::nearest());
        t.upload_level(
            0,
            &[255, 0, 0, 255, 0, 255, 0, 255],
            PixelFormat::Rgba,
            PixelType::UnsignedByte,
        )
        .unwrap();
        let at0 = t.sample(0.0, 0.5, 0.0);
        let at1 = t.sample(1.0, 0.5, 0.0);
        assert_eq!(at0.to_array(), at1.to_array());
    }

    #[test]
    fn clamp_to_edge_picks_nearest_corner() {
        // [R G / B W]
        let mut sampler = SamplerDescription::nearest().with_wrap(WrapMode::ClampToEdge);
        sampler.min_filter = MinFilter::Nearest;
        let mut t = Texture::new(2, 2, sampler);
        t.upload_level(
            0,
            &[
                255, 0, 0, 255, /* R */ 0, 255, 0, 255, /* G */
                0, 0, 255, 255, /* B */ 255, 255, 255, 255, /* W */
            ],
            PixelFormat::Rgba,
            PixelType::UnsignedByte,
        )
        .unwrap();
        let c = t.sample(1.25, -0.1, 0.0);
        assert_eq!(c.to_array(), [0.0, 1.0, 0.0, 1.0]); // G, top-right
    }

    #[test]
    fn clamp_to_border_returns_border_outside_unit_range() {
        let sampler = SamplerDescription::nearest()
            .with_wrap(WrapMode::ClampToBorder)
            .with_border_color([1.0, 0.0, 1.0, 1.0]);
        let t = solid(2, 2, [0, 255, 0, 255], sampler);
        assert_eq!(t.sample(-0.001, 0.5, 0.0).to_array(), [1.0, 0.0, 1.0, 1.0]);
        assert_eq!(t.sample(1.001, 0.5, 0.0).to_array(), [1.0, 0.0, 1.0, 1.0]);
        // inside the unit range it samples normally
        assert_eq!(t.sample(0.5, 0.5, 0.0).to_array(), [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn trilinear_checker_averages_at_lod_one() {
        // 4x4 red/black checker; level 1 is the red/black average
        let mut sampler = SamplerDescription::default();
        sampler.min_filter = MinFilter::LinearMipmapLinear;
        let mut t = Texture::new(4, 4, sampler);
        let mut data = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                if (x + y) % 2 == 0 {
                    data.extend_from_slice(&[255, 0, 0, 255]);
                } else {
                    data.extend_from_slice(&[0, 0, 0, 255]);
                }
            }
        }
        t.upload_level(0, &data, PixelFormat::Rgba, PixelType::UnsignedByte)
            .unwrap();
        t.generate_mipmaps();
        assert_eq!(t.level_count(), 3);
        let c = t.sample(0.5, 0.5, 1.0);
        assert!((c.x - 0.5).abs() < 2.0 / 255.0, "got {:?}", c);
        assert!(c.y.abs() < 2.0 / 255.0);
        assert!(c.z.abs() < 2.0 / 255.0);
    }

    #[test]
    fn mip_extents_floor_to_one() {
        let mut t = solid(8, 2, [10, 20, 30, 255], SamplerDescription::default());
        t.generate_mipmaps();
        assert_eq!(t.level_count(), 4);
        assert_eq!(t.level_extents(1), (4, 1));
        assert_eq!(t.level_extents(3), (1, 1));
    }

    #[test]
    fn rgb_upload_gets_opaque_alpha() {
        let mut t = Texture::new(1, 1, SamplerDescription::nearest());
        t.upload_level(0, &[7, 8, 9], PixelFormat::Rgb, PixelType::UnsignedByte)
            .unwrap();
        let c = t.sample(0.5, 0.5, 0.0);
        assert!((c.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn short_upload_is_rejected_and_texture_stays_empty() {
        let mut t = Texture::new(2, 2, SamplerDescription::nearest());
        let r = t.upload_level(0, &[0; 3], PixelFormat::Rgba, PixelType::UnsignedByte);
        assert!(r.is_err());
        assert!(t.is_empty());
    }
}
