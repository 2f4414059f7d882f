//! §4.H Shader-based blit fallback.
//!
//! Used whenever [`crate::renderer::can_use_hw_blit`] rejects a format
//! pair `glBlitFramebuffer` cannot serve directly (depth↔color, or
//! multisample-resolve combinations the driver refuses). Grounded on the
//! teacher's `device.rs` passthrough-pipeline construction for its
//! internal blit helper (a minimal VS/FS pair plus a quad VBO bound
//! through a dedicated VAO), generalized from a single hardcoded pipeline
//! to a small cache of FS variants keyed by the destination's color/depth/
//! multisample shape.

use fxhash::FxHashMap;

/// Distinguishes which fixed fragment-shader variant a blit destination
/// needs. Depth and depth-multisample targets read through different
/// sampler types; "emulated alpha" covers the `A8Unorm` swizzle-emulation
/// case from `format.rs`, which needs its output routed back through the
/// red channel instead of alpha.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlitVariant {
    Color,
    Depth,
    DepthMultisample,
    EmulatedAlpha,
}

pub fn select_variant(is_depth: bool, is_multisample: bool, needs_alpha_emulation: bool) -> BlitVariant {
    match (is_depth, is_multisample, needs_alpha_emulation) {
        (true, true, _) => BlitVariant::DepthMultisample,
        (true, false, _) => BlitVariant::Depth,
        (false, _, true) => BlitVariant::EmulatedAlpha,
        (false, _, false) => BlitVariant::Color,
    }
}

fn passthrough_vs_source() -> &'static str {
    "#version 130\n\
     in vec2 pos;\n\
     in vec2 uv;\n\
     out vec2 v_uv;\n\
     void main() {\n\
         v_uv = uv;\n\
         gl_Position = vec4(pos, 0.0, 1.0);\n\
     }\n"
}

fn fragment_source(variant: BlitVariant) -> &'static str {
    match variant {
        BlitVariant::Color => {
            "#version 130\n\
             uniform sampler2D src;\n\
             in vec2 v_uv;\n\
             out vec4 color;\n\
             void main() { color = texture(src, v_uv); }\n"
        }
        BlitVariant::Depth => {
            "#version 130\n\
             uniform sampler2D src;\n\
             in vec2 v_uv;\n\
             void main() { gl_FragDepth = texture(src, v_uv).r; }\n"
        }
        BlitVariant::DepthMultisample => {
            "#version 130\n\
             #extension GL_ARB_texture_multisample : enable\n\
             uniform sampler2DMS src;\n\
             uniform int sample_index;\n\
             in vec2 v_uv;\n\
             void main() {\n\
                 ivec2 size = textureSize(src);\n\
                 ivec2 coord = ivec2(v_uv * vec2(size));\n\
                 gl_FragDepth = texelFetch(src, coord, sample_index).r;\n\
             }\n"
        }
        BlitVariant::EmulatedAlpha => {
            "#version 130\n\
             uniform sampler2D src;\n\
             in vec2 v_uv;\n\
             out vec4 color;\n\
             void main() { color = vec4(0.0, 0.0, 0.0, texture(src, v_uv).r); }\n"
        }
    }
}

/// The four corners of an NDC quad, `(position.xy, uv)` interleaved, for
/// the blitter's single static VBO. `flip_y` matches the resource's
/// `y_0_top` flag (§4.A) so a blit from a bottom-left-origin resource into
/// a top-left-origin one doesn't come out upside down.
pub fn quad_vertices(flip_y: bool) -> [[f32; 4]; 4] {
    let (top_v, bottom_v) = if flip_y { (0.0, 1.0) } else { (1.0, 0.0) };
    [
        [-1.0, -1.0, 0.0, bottom_v],
        [1.0, -1.0, 1.0, bottom_v],
        [-1.0, 1.0, 0.0, top_v],
        [1.0, 1.0, 1.0, top_v],
    ]
}

/// A lazily-initialized dedicated GL context and its cached fragment-
/// shader variants, one per [`BlitVariant`]. Kept separate from any
/// sub-context's own GL context per §4.H, since a blit may need to run
/// while an arbitrary sub-context is current.
pub struct Blitter {
    pub gl_context: Option<crate::callbacks::RawGlContext>,
    fs_cache: FxHashMap<BlitVariant, String>,
    pub vao: Option<u32>,
    pub quad_vbo: Option<u32>,
}

impl Default for Blitter {
    fn default() -> Self {
        Blitter {
            gl_context: None,
            fs_cache: FxHashMap::default(),
            vao: None,
            quad_vbo: None,
        }
    }
}

impl Blitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached GLSL source for `variant`, compiling (i.e.
    /// inserting) it into the cache on first use.
    pub fn fragment_source_for(&mut self, variant: BlitVariant) -> &str {
        self.fs_cache
            .entry(variant)
            .or_insert_with(|| fragment_source(variant).to_string())
    }

    pub fn vertex_source() -> &'static str {
        passthrough_vs_source()
    }

    pub fn is_initialized(&self) -> bool {
        self.gl_context.is_some()
    }

    pub fn ensure_initialized(
        &mut self,
        callbacks: &dyn crate::callbacks::HostCallbacks,
        share_with: crate::callbacks::RawGlContext,
    ) -> Result<(), crate::error::FatalError> {
        if self.gl_context.is_none() {
            self.gl_context = Some(callbacks.create_gl_context(Some(share_with))?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_multisample_picks_the_sampler2dms_variant() {
        assert_eq!(select_variant(true, true, false), BlitVariant::DepthMultisample);
    }

    #[test]
    fn color_with_alpha_emulation_overrides_plain_color() {
        assert_eq!(select_variant(false, false, true), BlitVariant::EmulatedAlpha);
    }

    #[test]
    fn fragment_cache_reuses_the_same_source_string() {
        let mut blitter = Blitter::new();
        let first = blitter.fragment_source_for(BlitVariant::Color).to_string();
        let second = blitter.fragment_source_for(BlitVariant::Color).to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn quad_flips_v_coordinate_with_y0_top() {
        let normal = quad_vertices(false);
        let flipped = quad_vertices(true);
        assert_ne!(normal[0][3], flipped[0][3]);
    }

    #[test]
    fn ensure_initialized_is_idempotent() {
        let cb = crate::callbacks::test_support::RecordingCallbacks::default();
        let mut blitter = Blitter::new();
        blitter.ensure_initialized(&cb, 1).unwrap();
        let ctx = blitter.gl_context;
        blitter.ensure_initialized(&cb, 1).unwrap();
        assert_eq!(blitter.gl_context, ctx);
    }
}
