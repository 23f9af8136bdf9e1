//! Texture descriptors and sampler state.

use ordered_float::NotNan;

/// Number of texture binding slots visible to a draw.
pub const MAX_TEXTURE_SLOTS: usize = 8;

/// Texture coordinate wrapping, per axis.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    /// Outside [0,1] the sampler returns the border color, regardless of
    /// the active filter.
    ClampToBorder,
}

/// Magnification filter.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Minification filter. The four mipmap variants compose the in-level
/// filter with the filter across the two surrounding levels.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    /// Trilinear; the default.
    LinearMipmapLinear,
}

/// Complete sampler state carried by every texture.
///
/// Float fields are `NotNan` so descriptions stay `Eq + Hash` and can key
/// caches.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct SamplerDescription {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub min_filter: MinFilter,
    pub mag_filter: Filter,
    pub border_color: [NotNan<f32>; 4],
    pub min_lod: NotNan<f32>,
    pub max_lod: NotNan<f32>,
    pub lod_bias: NotNan<f32>,
}

impl SamplerDescription {
    pub fn linear_mipmap_linear() -> SamplerDescription {
        SamplerDescription {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            min_filter: MinFilter::LinearMipmapLinear,
            mag_filter: Filter::Linear,
            border_color: [0.0.into(), 0.0.into(), 0.0.into(), 0.0.into()],
            min_lod: (-1000.0).into(),
            max_lod: 1000.0.into(),
            lod_bias: 0.0.into(),
        }
    }

    pub fn nearest() -> SamplerDescription {
        SamplerDescription {
            min_filter: MinFilter::Nearest,
            mag_filter: Filter::Nearest,
            ..SamplerDescription::linear_mipmap_linear()
        }
    }

    pub fn with_wrap(mut self, wrap: WrapMode) -> SamplerDescription {
        self.wrap_s = wrap;
        self.wrap_t = wrap;
        self
    }

    pub fn with_border_color(mut self, color: [f32; 4]) -> SamplerDescription {
        self.border_color = [
            color[0].into(),
            color[1].into(),
            color[2].into(),
            color[3].into(),
        ];
        self
    }
}

impl Default for SamplerDescription {
    fn default() -> SamplerDescription {
        SamplerDescription::linear_mipmap_linear()
    }
}

/// Channel layout of source pixel data passed to texture uploads.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Rgba,
    Rgb,
    R,
}

/// Component type of source pixel data.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PixelType {
    UnsignedByte,
}

/// Creation parameters for a 2D texture. Storage is always packed RGBA8888.
#[derive(Clone, Debug)]
pub struct TextureDesc<'a> {
    pub width: u32,
    pub height: u32,
    pub sampler: SamplerDescription,
    pub label: Option<&'a str>,
}

impl<'a> TextureDesc<'a> {
    pub fn new(width: u32, height: u32) -> TextureDesc<'a> {
        TextureDesc {
            width,
            height,
            sampler: SamplerDescription::default(),
            label: None,
        }
    }
}

/// Length of the full mip chain for a base level of the given extents:
/// `1 + floor(log2(max(w, h)))`.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let mut extent = width.max(height).max(1);
    let mut levels = 1;
    while extent > 1 {
        extent /= 2;
        levels += 1;
    }
    levels
}
