//! 4.A Format table — maps the abstract guest pixel-format enum to the
//! concrete GL internal/external/type triple plus bind and swizzle info.
//!
//! Populated once from a static list (mirroring the teacher's
//! `conv::format_to_gl_format`, generalized from the teacher's handful of
//! vertex formats to the full sampler/render/depth-stencil surface this
//! renderer needs) and never mutated afterwards, so lookups need no
//! synchronization.

use bitflags::bitflags;

/// Abstract guest-side pixel format. Values mirror the subset of
/// `PIPE_FORMAT_*` the guest driver actually emits; unlisted formats are
/// rejected by [`describe`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(u32)]
pub enum Format {
    B8G8R8A8Unorm = 1,
    R8G8B8A8Unorm,
    R8Unorm,
    R8G8Unorm,
    A8Unorm,
    R16Float,
    R16G16Float,
    R16G16B16A16Float,
    R32Float,
    R32G32Float,
    R32G32B32A32Float,
    Z24UnormS8Uint,
    Z24X8Unorm,
    Z32Float,
    S8Uint,
    Dxt1Rgb,
    Dxt5Rgba,
}

bitflags! {
    /// Which pipeline stages a format may bind to.
    pub struct BindFlags: u8 {
        const SAMPLER       = 0b001;
        const RENDER        = 0b010;
        const DEPTH_STENCIL = 0b100;
    }
}

bitflags! {
    pub struct FormatFlags: u8 {
        /// Host GL has no native storage for this format (e.g. alpha-only);
        /// emulate it with a differently-shaped texture plus a swizzle.
        const NEED_SWIZZLE = 0b01;
        /// Format cannot be bound as an FBO color/depth attachment even
        /// though it may be sampled — forces the blit fallback (§4.E).
        const NOT_RENDERABLE = 0b10;
    }
}

/// One swizzle component selector, applied per-channel when reading back a
/// texture through `GL_TEXTURE_SWIZZLE_*`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Swizzle {
    Red,
    Green,
    Blue,
    Alpha,
    Zero,
    One,
}

#[derive(Copy, Clone, Debug)]
pub struct FormatCaps {
    pub internal: u32,
    pub external: u32,
    pub gl_type: u32,
    pub bindings: BindFlags,
    pub flags: FormatFlags,
    pub swizzle: [Swizzle; 4],
}

const IDENTITY_SWIZZLE: [Swizzle; 4] = [Swizzle::Red, Swizzle::Green, Swizzle::Blue, Swizzle::Alpha];

/// Static, read-only after [`FormatTable::new`] — no interior mutability,
/// no locking, matches invariant "read-only after init; no concurrency"
/// from §4.A.
pub struct FormatTable {
    entries: [(Format, FormatCaps); 17],
}

impl FormatTable {
    pub fn new() -> Self {
        use glow::{
            BGRA, COMPRESSED_RGBA_S3TC_DXT5_EXT, COMPRESSED_RGB_S3TC_DXT1_EXT, DEPTH24_STENCIL8,
            DEPTH_COMPONENT32F, DEPTH_STENCIL, FLOAT, HALF_FLOAT, R16F, R32F, RED, RG, RG16F, RGBA, RGBA16F,
            RGBA32F, RGBA8, STENCIL_INDEX8, UNSIGNED_BYTE, UNSIGNED_INT_24_8,
        };
        let rgba = BindFlags::SAMPLER | BindFlags::RENDER;
        let sampler_only = BindFlags::SAMPLER;
        let ds = BindFlags::DEPTH_STENCIL | BindFlags::SAMPLER;
        let entries = [
            (
                Format::B8G8R8A8Unorm,
                FormatCaps {
                    internal: RGBA8,
                    external: BGRA,
                    gl_type: UNSIGNED_BYTE,
                    bindings: rgba,
                    flags: FormatFlags::empty(),
                    swizzle: IDENTITY_SWIZZLE,
                },
            ),
            (
                Format::R8G8B8A8Unorm,
                FormatCaps {
                    internal: RGBA8,
                    external: RGBA,
                    gl_type: UNSIGNED_BYTE,
                    bindings: rgba,
                    flags: FormatFlags::empty(),
                    swizzle: IDENTITY_SWIZZLE,
                },
            ),
            (
                Format::R8Unorm,
                FormatCaps {
                    internal: RED,
                    external: RED,
                    gl_type: UNSIGNED_BYTE,
                    bindings: rgba,
                    flags: FormatFlags::empty(),
                    swizzle: [Swizzle::Red, Swizzle::Zero, Swizzle::Zero, Swizzle::One],
                },
            ),
            (
                Format::R8G8Unorm,
                FormatCaps {
                    internal: RG,
                    external: RG,
                    gl_type: UNSIGNED_BYTE,
                    bindings: rgba,
                    flags: FormatFlags::empty(),
                    swizzle: [Swizzle::Red, Swizzle::Green, Swizzle::Zero, Swizzle::One],
                },
            ),
            (
                // Core profile has no GL_ALPHA internal format: emulate with
                // RED and swizzle alpha from the red channel.
                Format::A8Unorm,
                FormatCaps {
                    internal: RED,
                    external: RED,
                    gl_type: UNSIGNED_BYTE,
                    bindings: sampler_only,
                    flags: FormatFlags::NEED_SWIZZLE,
                    swizzle: [Swizzle::Zero, Swizzle::Zero, Swizzle::Zero, Swizzle::Red],
                },
            ),
            (
                Format::R16Float,
                FormatCaps {
                    internal: R16F,
                    external: RED,
                    gl_type: HALF_FLOAT,
                    bindings: rgba,
                    flags: FormatFlags::empty(),
                    swizzle: [Swizzle::Red, Swizzle::Zero, Swizzle::Zero, Swizzle::One],
                },
            ),
            (
                Format::R16G16Float,
                FormatCaps {
                    internal: RG16F,
                    external: RG,
                    gl_type: HALF_FLOAT,
                    bindings: rgba,
                    flags: FormatFlags::empty(),
                    swizzle: [Swizzle::Red, Swizzle::Green, Swizzle::Zero, Swizzle::One],
                },
            ),
            (
                Format::R16G16B16A16Float,
                FormatCaps {
                    internal: RGBA16F,
                    external: RGBA,
                    gl_type: HALF_FLOAT,
                    bindings: rgba,
                    flags: FormatFlags::empty(),
                    swizzle: IDENTITY_SWIZZLE,
                },
            ),
            (
                Format::R32Float,
                FormatCaps {
                    internal: R32F,
                    external: RED,
                    gl_type: FLOAT,
                    bindings: sampler_only,
                    flags: FormatFlags::NOT_RENDERABLE,
                    swizzle: [Swizzle::Red, Swizzle::Zero, Swizzle::Zero, Swizzle::One],
                },
            ),
            (
                Format::R32G32Float,
                FormatCaps {
                    internal: glow::RG32F,
                    external: RG,
                    gl_type: FLOAT,
                    bindings: sampler_only,
                    flags: FormatFlags::NOT_RENDERABLE,
                    swizzle: [Swizzle::Red, Swizzle::Green, Swizzle::Zero, Swizzle::One],
                },
            ),
            (
                Format::R32G32B32A32Float,
                FormatCaps {
                    internal: RGBA32F,
                    external: RGBA,
                    gl_type: FLOAT,
                    bindings: rgba,
                    flags: FormatFlags::empty(),
                    swizzle: IDENTITY_SWIZZLE,
                },
            ),
            (
                Format::Z24UnormS8Uint,
                FormatCaps {
                    internal: DEPTH24_STENCIL8,
                    external: DEPTH_STENCIL,
                    gl_type: UNSIGNED_INT_24_8,
                    bindings: ds,
                    flags: FormatFlags::empty(),
                    swizzle: IDENTITY_SWIZZLE,
                },
            ),
            (
                // No direct host equivalent: scaled 256x on write, 1/256 on
                // read (§4.E Transfer write/read).
                Format::Z24X8Unorm,
                FormatCaps {
                    internal: DEPTH24_STENCIL8,
                    external: DEPTH_STENCIL,
                    gl_type: UNSIGNED_INT_24_8,
                    bindings: BindFlags::DEPTH_STENCIL,
                    flags: FormatFlags::empty(),
                    swizzle: IDENTITY_SWIZZLE,
                },
            ),
            (
                Format::Z32Float,
                FormatCaps {
                    internal: DEPTH_COMPONENT32F,
                    external: DEPTH_STENCIL,
                    gl_type: FLOAT,
                    bindings: BindFlags::DEPTH_STENCIL,
                    flags: FormatFlags::empty(),
                    swizzle: IDENTITY_SWIZZLE,
                },
            ),
            (
                Format::S8Uint,
                FormatCaps {
                    internal: STENCIL_INDEX8,
                    external: DEPTH_STENCIL,
                    gl_type: UNSIGNED_BYTE,
                    bindings: BindFlags::DEPTH_STENCIL,
                    flags: FormatFlags::empty(),
                    swizzle: IDENTITY_SWIZZLE,
                },
            ),
            (
                Format::Dxt1Rgb,
                FormatCaps {
                    internal: COMPRESSED_RGB_S3TC_DXT1_EXT,
                    external: RGBA,
                    gl_type: UNSIGNED_BYTE,
                    bindings: sampler_only,
                    flags: FormatFlags::NOT_RENDERABLE,
                    swizzle: IDENTITY_SWIZZLE,
                },
            ),
            (
                Format::Dxt5Rgba,
                FormatCaps {
                    internal: COMPRESSED_RGBA_S3TC_DXT5_EXT,
                    external: RGBA,
                    gl_type: UNSIGNED_BYTE,
                    bindings: sampler_only,
                    flags: FormatFlags::NOT_RENDERABLE,
                    swizzle: IDENTITY_SWIZZLE,
                },
            ),
        ];
        FormatTable { entries }
    }

    pub fn describe(&self, format: Format) -> Option<&FormatCaps> {
        self.entries
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, caps)| caps)
    }

    pub fn is_renderable(&self, format: Format) -> bool {
        self.describe(format)
            .map(|caps| {
                caps.bindings.contains(BindFlags::RENDER) || caps.bindings.contains(BindFlags::DEPTH_STENCIL)
            })
            .unwrap_or(false)
            && self
                .describe(format)
                .map(|caps| !caps.flags.contains(FormatFlags::NOT_RENDERABLE))
                .unwrap_or(false)
    }
}

impl Default for FormatTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_only_needs_swizzle_emulation() {
        let table = FormatTable::new();
        let caps = table.describe(Format::A8Unorm).unwrap();
        assert!(caps.flags.contains(FormatFlags::NEED_SWIZZLE));
        assert_eq!(caps.swizzle[3], Swizzle::Red);
    }

    #[test]
    fn r32_float_is_sampler_only() {
        let table = FormatTable::new();
        assert!(!table.is_renderable(Format::R32Float));
        assert!(table.is_renderable(Format::R8G8B8A8Unorm));
    }

    #[test]
    fn compressed_formats_are_not_renderable() {
        let table = FormatTable::new();
        assert!(!table.is_renderable(Format::Dxt1Rgb));
    }
}
