//! Render pass descriptions and clear state.

use bitflags::bitflags;

bitflags! {
    /// Which attachments a clear touches.
    #[derive(Default)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LoadOp {
    /// Preserve existing content.
    Load = 0,
    /// Clear to the pass clear value.
    Clear = 1,
    /// Content is undefined at pass start.
    DontCare = 2,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StoreOp {
    Store = 0,
    DontCare = 1,
}

/// Pixel rectangle with a disabled sentinel: a negative width means the
/// rect is unset and the pass falls back to the full framebuffer (viewport,
/// render area) or disables the scissor test.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RenderRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl RenderRect {
    pub const DISABLED: RenderRect = RenderRect {
        x: 0,
        y: 0,
        w: -1,
        h: -1,
    };

    pub fn new(x: i32, y: i32, w: i32, h: i32) -> RenderRect {
        RenderRect { x, y, w, h }
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.w < 0
    }
}

impl Default for RenderRect {
    fn default() -> RenderRect {
        RenderRect::DISABLED
    }
}

/// State applied when a pass begins. The software backend always stores
/// attachment contents, so the store ops are recorded for API symmetry but
/// act as `Store`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderPassDesc {
    pub color_load_op: LoadOp,
    pub color_store_op: StoreOp,
    pub clear_color: [f32; 4],
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub clear_depth: f32,
    pub clear_stencil: u8,
    /// Scissor state installed at pass start; disabled rect turns the
    /// scissor test off.
    pub initial_scissor: RenderRect,
    /// Viewport installed at pass start; disabled rect resets to the full
    /// framebuffer.
    pub initial_viewport: RenderRect,
    /// Restricts the clears performed by the load ops; disabled rect
    /// clears the whole attachment.
    pub render_area: RenderRect,
}

impl Default for RenderPassDesc {
    fn default() -> RenderPassDesc {
        RenderPassDesc {
            color_load_op: LoadOp::Clear,
            color_store_op: StoreOp::Store,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_load_op: LoadOp::Clear,
            depth_store_op: StoreOp::Store,
            clear_depth: 1.0,
            clear_stencil: 0,
            initial_scissor: RenderRect::DISABLED,
            initial_viewport: RenderRect::DISABLED,
            render_area: RenderRect::DISABLED,
        }
    }
}
