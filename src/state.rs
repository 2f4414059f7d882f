//! §4.E Shadow pipeline state.
//!
//! Grounded on the teacher's `queue.rs` `State` struct — "track the current
//! global state... to minimize additional driver calls" — generalized from
//! that struct's four cached fields (vao/index buffer/viewport count/fbo)
//! to the full fixed-function state this renderer shadows, and from a
//! single flat struct to one `dirty` bitmask per logical group so a draw
//! reconcile (`renderer.rs`) only re-emits the GL calls a command actually
//! touched.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::format::Format;

pub const MAX_VIEWPORTS: usize = 16;
pub const MAX_SCISSORS: usize = 16;
pub const MAX_CLIP_PLANES: usize = 8;
pub const MAX_VERTEX_BUFFERS: usize = 32;
pub const MAX_SAMPLERS_PER_STAGE: usize = 32;
pub const MAX_UBO_SLOTS: usize = 15;
pub const MAX_DRAW_BUFFERS: usize = 8;

bitflags! {
    /// One bit per logical state group. Set by command handlers, cleared by
    /// the draw/clear reconcile once the corresponding GL calls are issued
    /// (§4.E "dirty masks").
    pub struct Dirty: u32 {
        const BLEND           = 1 << 0;
        const DSA             = 1 << 1;
        const RASTERIZER      = 1 << 2;
        const SCISSOR         = 1 << 3;
        const VIEWPORT        = 1 << 4;
        const STENCIL_REF     = 1 << 5;
        const POLY_STIPPLE    = 1 << 6;
        const CLIP_PLANES     = 1 << 7;
        const SAMPLE_MASK     = 1 << 8;
        const FRAMEBUFFER     = 1 << 9;
        const VERTEX_ELEMENTS = 1 << 10;
        const VERTEX_BUFFERS  = 1 << 11;
        const INDEX_BUFFER    = 1 << 12;
        const SHADERS         = 1 << 13;
        const CONSTANTS       = 1 << 14;
        const SAMPLER_VIEWS   = 1 << 15;
        const SAMPLER_STATE   = 1 << 16;
        const UBO             = 1 << 17;
        const STREAMOUT       = 1 << 18;
        const DEPTH_RANGE     = 1 << 19;
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlendState {
    pub enabled: bool,
    pub src_rgb: u32,
    pub dst_rgb: u32,
    pub src_alpha: u32,
    pub dst_alpha: u32,
    pub equation_rgb: u32,
    pub equation_alpha: u32,
    pub color_mask: [bool; 4],
    pub dual_src: bool,
    pub logicop_enable: bool,
    pub logicop: u32,
}

impl Default for BlendState {
    fn default() -> Self {
        BlendState {
            enabled: false,
            src_rgb: glow::ONE,
            dst_rgb: glow::ZERO,
            src_alpha: glow::ONE,
            dst_alpha: glow::ZERO,
            equation_rgb: glow::FUNC_ADD,
            equation_alpha: glow::FUNC_ADD,
            color_mask: [true; 4],
            dual_src: false,
            logicop_enable: false,
            logicop: glow::COPY,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DepthStencilState {
    pub depth_enabled: bool,
    pub depth_write: bool,
    pub depth_func: u32,
    pub stencil_enabled: bool,
    pub stencil_func_front: u32,
    pub stencil_func_back: u32,
    pub stencil_mask_read: u32,
    pub stencil_mask_write: u32,
    pub stencil_fail: u32,
    pub stencil_zfail: u32,
    pub stencil_zpass: u32,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        DepthStencilState {
            depth_enabled: true,
            depth_write: true,
            depth_func: glow::LESS,
            stencil_enabled: false,
            stencil_func_front: glow::ALWAYS,
            stencil_func_back: glow::ALWAYS,
            stencil_mask_read: !0,
            stencil_mask_write: !0,
            stencil_fail: glow::KEEP,
            stencil_zfail: glow::KEEP,
            stencil_zpass: glow::KEEP,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RasterizerState {
    pub cull_face: Option<u32>,
    pub front_face_cw: bool,
    pub fill_mode: u32,
    pub scissor_enabled: bool,
    pub multisample: bool,
    pub line_width: f32,
    pub point_size: f32,
    pub flatshade: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        RasterizerState {
            cull_face: None,
            front_face_cw: false,
            fill_mode: glow::FILL,
            scissor_enabled: false,
            multisample: true,
            line_width: 1.0,
            point_size: 1.0,
            flatshade: false,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Scissor {
    pub minx: u32,
    pub miny: u32,
    pub maxx: u32,
    pub maxy: u32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct StencilRefs {
    pub front: u8,
    pub back: u8,
}

/// One bound vertex buffer slot plus the residency bit (§4.E "vbos[32] +
/// residency mask") so unbound slots need no `Option` churn in the hot
/// path — a cleared residency bit means the buffer id is stale.
#[derive(Copy, Clone, Debug, Default)]
pub struct VertexBufferBinding {
    pub buffer: u32,
    pub stride: u32,
    pub offset: u32,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct VertexElement {
    pub vertex_buffer_index: u32,
    pub src_offset: u32,
    pub src_format: Option<Format>,
    pub instance_divisor: u32,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct IndexBufferBinding {
    pub buffer: u32,
    pub index_size: u32,
    pub offset: u32,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct SamplerViewBinding {
    pub resource_handle: u32,
    pub gl_texture: u32,
    pub target: u32,
    pub first_level: u32,
    pub last_level: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct SamplerStateBinding {
    pub min_filter: u32,
    pub mag_filter: u32,
    pub wrap_s: u32,
    pub wrap_t: u32,
    pub wrap_r: u32,
    pub lod_bias: f32,
    pub min_lod: f32,
    pub max_lod: f32,
    pub compare_mode: Option<u32>,
}

impl Default for SamplerStateBinding {
    fn default() -> Self {
        SamplerStateBinding {
            min_filter: glow::NEAREST_MIPMAP_LINEAR,
            mag_filter: glow::LINEAR,
            wrap_s: glow::REPEAT,
            wrap_t: glow::REPEAT,
            wrap_r: glow::REPEAT,
            lod_bias: 0.0,
            min_lod: -1000.0,
            max_lod: 1000.0,
            compare_mode: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct UboBinding {
    pub buffer: u32,
    pub offset: u32,
    pub size: u32,
}

/// Per-stage shadow state: one of these exists for the vertex, fragment,
/// and (optional) geometry stage.
#[derive(Clone, Debug, Default)]
pub struct StageState {
    pub shader_selector: Option<u32>,
    pub constants: Vec<[f32; 4]>,
    pub constants_dirty: bool,
    pub samplers: [Option<SamplerStateBinding>; MAX_SAMPLERS_PER_STAGE],
    pub sampler_views: [Option<SamplerViewBinding>; MAX_SAMPLERS_PER_STAGE],
    pub ubos: [Option<UboBinding>; MAX_UBO_SLOTS],
}

#[derive(Copy, Clone, Debug, Default)]
pub struct FramebufferState {
    pub color_attachments: [Option<u32>; MAX_DRAW_BUFFERS],
    pub depth_attachment: Option<u32>,
    pub num_color_buffers: usize,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct StreamoutState {
    pub targets: [Option<u32>; 4],
    pub append_offsets: [u32; 4],
}

/// The full shadow-state block for one sub-context (§4.E). `dirty` tracks
/// which groups changed since the last reconcile; the reconcile step reads
/// each dirty group, emits the matching GL calls, then clears that bit.
#[derive(Clone, Debug)]
pub struct PipelineState {
    pub blend: BlendState,
    pub depth_stencil: DepthStencilState,
    pub rasterizer: RasterizerState,
    pub scissors: [Scissor; MAX_SCISSORS],
    pub viewports: [Viewport; MAX_VIEWPORTS],
    pub stencil_refs: StencilRefs,
    pub poly_stipple: [u32; 32],
    pub clip_planes: [[f32; 4]; MAX_CLIP_PLANES],
    pub clip_plane_enable: u8,
    pub sample_mask: u32,
    pub framebuffer: FramebufferState,
    pub vertex_elements: SmallVec<[VertexElement; 16]>,
    pub vertex_buffers: [VertexBufferBinding; MAX_VERTEX_BUFFERS],
    pub vertex_buffer_residency: u32,
    pub index_buffer: Option<IndexBufferBinding>,
    pub vs: StageState,
    pub fs: StageState,
    pub gs: Option<StageState>,
    pub streamout: StreamoutState,
    pub depth_range_near: f32,
    pub depth_range_far: f32,
    pub dirty: Dirty,
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState {
            blend: BlendState::default(),
            depth_stencil: DepthStencilState::default(),
            rasterizer: RasterizerState::default(),
            scissors: [Scissor::default(); MAX_SCISSORS],
            viewports: [Viewport::default(); MAX_VIEWPORTS],
            stencil_refs: StencilRefs::default(),
            poly_stipple: [0xFFFF_FFFF; 32],
            clip_planes: [[0.0; 4]; MAX_CLIP_PLANES],
            clip_plane_enable: 0,
            sample_mask: !0,
            framebuffer: FramebufferState::default(),
            vertex_elements: SmallVec::new(),
            vertex_buffers: [VertexBufferBinding::default(); MAX_VERTEX_BUFFERS],
            vertex_buffer_residency: 0,
            index_buffer: None,
            vs: StageState::default(),
            fs: StageState::default(),
            gs: None,
            streamout: StreamoutState::default(),
            depth_range_near: 0.0,
            depth_range_far: 1.0,
            dirty: Dirty::all(),
        }
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces every group dirty, matching the teacher's `State::flush` —
    /// used after `with_gl`-style raw escape hatches or a context switch
    /// (§4.G) where the GL driver's real state may have diverged from the
    /// shadow.
    pub fn flush(&mut self) {
        self.dirty = Dirty::all();
    }

    pub fn mark(&mut self, bits: Dirty) {
        self.dirty.insert(bits);
    }

    pub fn is_dirty(&self, bits: Dirty) -> bool {
        self.dirty.intersects(bits)
    }

    pub fn clear(&mut self, bits: Dirty) {
        self.dirty.remove(bits);
    }

    pub fn bind_vertex_buffer(&mut self, slot: usize, binding: VertexBufferBinding) {
        self.vertex_buffers[slot] = binding;
        self.vertex_buffer_residency |= 1 << slot;
        self.mark(Dirty::VERTEX_BUFFERS);
    }

    pub fn unbind_vertex_buffer(&mut self, slot: usize) {
        self.vertex_buffer_residency &= !(1 << slot);
        self.mark(Dirty::VERTEX_BUFFERS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_fully_dirty() {
        let state = PipelineState::new();
        assert!(state.is_dirty(Dirty::all()));
    }

    #[test]
    fn clearing_a_group_leaves_others_dirty() {
        let mut state = PipelineState::new();
        state.clear(Dirty::BLEND);
        assert!(!state.is_dirty(Dirty::BLEND));
        assert!(state.is_dirty(Dirty::DSA));
    }

    #[test]
    fn vertex_buffer_bind_sets_residency_and_dirty() {
        let mut state = PipelineState::new();
        state.clear(Dirty::all());
        state.bind_vertex_buffer(
            3,
            VertexBufferBinding {
                buffer: 7,
                stride: 32,
                offset: 0,
            },
        );
        assert_eq!(state.vertex_buffer_residency & (1 << 3), 1 << 3);
        assert!(state.is_dirty(Dirty::VERTEX_BUFFERS));
    }

    #[test]
    fn flush_forces_everything_dirty_again() {
        let mut state = PipelineState::new();
        state.clear(Dirty::all());
        state.flush();
        assert_eq!(state.dirty, Dirty::all());
    }
}
