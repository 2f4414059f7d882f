//! §3 "Shader selector" / §4.C-§4.D: the shader-variant cache.
//!
//! A [`ShaderSelector`] owns the immutable token stream the guest uploaded
//! and an arena of compiled [`Variant`]s keyed by [`ShaderKey`]. The
//! teacher's `native` module keeps a flat `Vec` of GL object ids indexed by
//! a `Handle`; this generalizes that shape to an arena-of-variants so a
//! selector can hold many key-specialized recompiles without a
//! self-referential linked list (the redesign this crate took over the
//! original's intrusive list of variants hanging off the selector).

pub mod key;
pub mod tgsi;
pub mod translate;

use fxhash::FxHashMap;

use crate::error::ErrorKind;
use key::ShaderKey;
use tgsi::{Processor, TokenStream};
use translate::{translate, Reflection};

/// One GLSL recompile of a selector's token stream for a specific
/// [`ShaderKey`]. `gl_shader` is populated by the caller once the source is
/// compiled (§4.D "Program linker"); translation itself never touches GL.
pub struct Variant {
    pub key: ShaderKey,
    pub glsl_source: String,
    pub reflection: Reflection,
    pub gl_shader: Option<u32>,
    /// Linked programs referencing this variant, for cascade-delete on
    /// selector/variant destruction (§4.D back-reference bookkeeping).
    pub linked_programs: Vec<u32>,
}

/// An immutable token stream plus its arena of key-specialized variants.
/// Indices into `variants` are stable for the selector's lifetime — removal
/// is not supported, matching the teacher's append-only shader cache.
pub struct ShaderSelector {
    pub handle: u32,
    pub processor: Processor,
    pub tokens: TokenStream,
    variants: Vec<Variant>,
    by_key: FxHashMap<ShaderKey, usize>,
}

impl ShaderSelector {
    pub fn new(handle: u32, processor: Processor, tokens: TokenStream) -> Self {
        ShaderSelector {
            handle,
            processor,
            tokens,
            variants: Vec::new(),
            by_key: FxHashMap::default(),
        }
    }

    /// Returns the cached variant index for `key`, translating and inserting
    /// a new one if this is the first draw to ask for this key (§4.D
    /// "shader_select": same key ⇒ same GLSL, testable property 5).
    pub fn select(&mut self, key: ShaderKey) -> Result<usize, ErrorKind> {
        if let Some(&index) = self.by_key.get(&key) {
            return Ok(index);
        }
        let translated = translate(&self.tokens, &key, self.processor)?;
        let index = self.variants.len();
        self.variants.push(Variant {
            key,
            glsl_source: translated.glsl_source,
            reflection: translated.reflection,
            gl_shader: None,
            linked_programs: Vec::new(),
        });
        self.by_key.insert(key, index);
        Ok(index)
    }

    pub fn variant(&self, index: usize) -> Option<&Variant> {
        self.variants.get(index)
    }

    pub fn variant_mut(&mut self, index: usize) -> Option<&mut Variant> {
        self.variants.get_mut(index)
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgsi::{Declaration, File, Instruction, Opcode};

    fn trivial_vs_tokens() -> TokenStream {
        TokenStream {
            declarations: vec![Declaration {
                file: File::Output,
                first: 0,
                last: 0,
                semantic: Some((tgsi::Semantic::Position, 0)),
                interpolation: tgsi::Interpolation::Perspective,
                array_id: None,
            }],
            immediates: vec![],
            instructions: vec![Instruction {
                opcode: Opcode::End,
                dst: None,
                src: vec![],
                texture: None,
            }],
            stream_output: vec![],
            write_all_cbufs: false,
        }
    }

    #[test]
    fn same_key_reuses_cached_variant() {
        let mut selector = ShaderSelector::new(1, Processor::Vertex, trivial_vs_tokens());
        let a = selector.select(ShaderKey::default()).unwrap();
        let b = selector.select(ShaderKey::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(selector.variants().len(), 1);
    }

    #[test]
    fn distinct_key_compiles_new_variant() {
        let mut selector = ShaderSelector::new(1, Processor::Vertex, trivial_vs_tokens());
        let a = selector.select(ShaderKey::default()).unwrap();
        let mut key_b = ShaderKey::default();
        key_b.clip_plane_enable = 1;
        let b = selector.select(key_b).unwrap();
        assert_ne!(a, b);
        assert_eq!(selector.variants().len(), 2);
    }
}
