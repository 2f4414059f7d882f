//! The 64-bit shader key (§3 "Shader selector", §4.C "Shader key").
//!
//! Every distinct key produces a distinct compiled [`super::Variant`]; the
//! key packs exactly the per-draw parameters enumerated in the design so
//! that equal keys are guaranteed to produce byte-identical GLSL (testable
//! property 5, "program cache hit").

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AlphaTestFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ShaderKey {
    /// Point-sprite coordinate-replace mask, one bit per generic input.
    pub coord_replace_mask: u32,
    pub invert_fs_origin: bool,
    pub pstipple_from_texture: bool,
    pub alpha_test: Option<(AlphaTestFunc, ordered_ref_bits::RefBits)>,
    pub color_two_side: bool,
    pub clip_plane_enable: u8,
    pub flatshade: bool,
    pub gs_present: bool,
}

/// Alpha-test reference values arrive as `f32` but the key must be
/// `Eq + Hash`; store the bit pattern, matching how the teacher's
/// `ordered-float`-using example repos (`ennis-autograph-ng`) key caches
/// on float state.
pub mod ordered_ref_bits {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct RefBits(u32);

    impl RefBits {
        pub fn from_f32(v: f32) -> Self {
            RefBits(v.to_bits())
        }
        pub fn to_f32(self) -> f32 {
            f32::from_bits(self.0)
        }
    }
}

impl ShaderKey {
    pub fn alpha_test_enabled(&self) -> bool {
        self.alpha_test.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_alpha_test_state_makes_distinct_keys() {
        let a = ShaderKey::default();
        let mut b = ShaderKey::default();
        b.alpha_test = Some((
            AlphaTestFunc::Greater,
            ordered_ref_bits::RefBits::from_f32(0.5),
        ));
        assert_ne!(a, b);
    }

    #[test]
    fn equal_keys_are_equal() {
        let mut a = ShaderKey::default();
        a.clip_plane_enable = 0b11;
        let mut b = ShaderKey::default();
        b.clip_plane_enable = 0b11;
        assert_eq!(a, b);
    }
}
