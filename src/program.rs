//! §4.D Program linker and per-sub-context program cache.
//!
//! Grounded on the teacher's `device.rs` `create_pipeline_layout`/program
//! link path (`glLinkProgram` + `get_program_iv` + uniform/attrib
//! introspection via `glGetActiveUniform`), generalized from gfx-hal's
//! single descriptor-set-driven layout to this renderer's four-way
//! `(vs, fs, gs, dual_src)` cache key, since a sub-context may rebind any
//! combination of shader stages independently between draws.

use fxhash::FxHashMap;

use crate::error::ErrorKind;

/// Cache key for a linked program: the three shader-selector variant
/// identities that were linked together, plus whether dual-source blending
/// was requested (changes which fragment output slot index 1 binds to).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ProgramKey {
    pub vs: (u32, usize),
    pub fs: (u32, usize),
    pub gs: Option<(u32, usize)>,
    pub dual_src: bool,
}

/// Uniform/sampler/UBO binding slots resolved once at link time so later
/// draws only need slot lookups, not string-based `glGetUniformLocation`
/// calls (§4.D introspection rule).
#[derive(Clone, Debug, Default)]
pub struct ProgramBindings {
    pub sampler_locations: Vec<(u32, i32)>,
    pub shadow_sampler_locations: Vec<(u32, i32)>,
    pub const_location: Option<i32>,
    pub ubo_block_indices: Vec<(u32, u32)>,
    pub winsys_adjust_location: Option<i32>,
    pub alpha_ref_location: Option<i32>,
}

pub struct LinkedProgram {
    pub gl_program: u32,
    pub key: ProgramKey,
    pub bindings: ProgramBindings,
}

/// Per-sub-context program cache (§4.D). Variant deletion cascades here:
/// the caller is expected to call [`ProgramCache::invalidate_variant`]
/// before dropping a shader selector's variant so no `LinkedProgram`
/// outlives the shaders it references.
#[derive(Default)]
pub struct ProgramCache {
    programs: FxHashMap<ProgramKey, LinkedProgram>,
}

impl ProgramCache {
    pub fn new() -> Self {
        ProgramCache {
            programs: FxHashMap::default(),
        }
    }

    pub fn get(&self, key: &ProgramKey) -> Option<&LinkedProgram> {
        self.programs.get(key)
    }

    pub fn insert(&mut self, program: LinkedProgram) {
        self.programs.insert(program.key, program);
    }

    /// Removes every cached program that references `variant` of `selector`,
    /// returning their GL program ids so the caller can `glDeleteProgram`
    /// them (§4.D back-reference cascade).
    pub fn invalidate_variant(&mut self, selector: u32, variant: usize) -> Vec<u32> {
        let mut removed = Vec::new();
        self.programs.retain(|key, program| {
            let hit = key.vs == (selector, variant)
                || key.fs == (selector, variant)
                || key.gs == Some((selector, variant));
            if hit {
                removed.push(program.gl_program);
            }
            !hit
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

/// Reflects the convention the translator uses for naming sampler/UBO
/// uniforms (`samp{index}`, `ubo{index}`) into the GL binding calls a real
/// `Device` would make post-link. Kept separate from `ProgramCache` so it
/// can be unit tested without a GL context (§4.D introspection rule).
pub fn resolve_bindings(samplers_mask: u32, shadow_mask: u32, num_ubos: u32) -> Vec<String> {
    let mut names = Vec::new();
    for i in 0..32u32 {
        if samplers_mask & (1 << i) != 0 {
            names.push(format!("samp{}", i));
        }
        if shadow_mask & (1 << i) != 0 {
            names.push(format!("shadmask{}", i));
            names.push(format!("shadadd{}", i));
        }
    }
    for i in 0..num_ubos {
        names.push(format!("ubo{}", i));
    }
    names
}

pub fn validate_link_inputs(vs_present: bool, fs_present: bool) -> Result<(), ErrorKind> {
    if !vs_present || !fs_present {
        return Err(ErrorKind::IllegalShader {
            handle: 0,
            reason: "program link requires both a vertex and fragment shader bound".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_program(key: ProgramKey, gl_id: u32) -> LinkedProgram {
        LinkedProgram {
            gl_program: gl_id,
            key,
            bindings: ProgramBindings::default(),
        }
    }

    #[test]
    fn invalidating_a_variant_removes_dependent_programs_only() {
        let mut cache = ProgramCache::new();
        let key_a = ProgramKey {
            vs: (1, 0),
            fs: (2, 0),
            gs: None,
            dual_src: false,
        };
        let key_b = ProgramKey {
            vs: (1, 1),
            fs: (2, 0),
            gs: None,
            dual_src: false,
        };
        cache.insert(dummy_program(key_a, 100));
        cache.insert(dummy_program(key_b, 101));

        let removed = cache.invalidate_variant(1, 0);
        assert_eq!(removed, vec![100]);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key_b).is_some());
    }

    #[test]
    fn link_requires_vertex_and_fragment() {
        assert!(validate_link_inputs(true, false).is_err());
        assert!(validate_link_inputs(true, true).is_ok());
    }

    #[test]
    fn resolve_bindings_names_match_translator_convention() {
        let names = resolve_bindings(0b101, 0b100, 2);
        assert!(names.contains(&"samp0".to_string()));
        assert!(names.contains(&"samp2".to_string()));
        assert!(names.contains(&"shadmask2".to_string()));
        assert!(names.contains(&"ubo1".to_string()));
    }
}
