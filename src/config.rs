//! Ambient stack: renderer configuration.
//!
//! The teacher workspace has no configuration layer of its own (gfx-hal
//! backends are parameterized entirely through their Rust API), so this is
//! enriched from the render-abstraction examples in the retrieval pack
//! that do carry a `config`-crate-based settings layer. Values are loaded
//! from process environment variables under the `VREND_` prefix, falling
//! back to the defaults below.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Dumps every translated GLSL shader to stderr via `log::debug!`
    /// before compiling it — the single most useful lever when a guest's
    /// TGSI produces GLSL the driver rejects.
    pub debug_shader_dump: bool,
    /// Prefer a GL core profile context over compatibility when the
    /// embedder's `HostCallbacks::create_gl_context` supports both.
    pub prefer_core_profile: bool,
    /// Disables the shader-based blit fallback (`blitter.rs`) entirely,
    /// turning an unsupported `glBlitFramebuffer` format pair into a hard
    /// error instead of silently degrading — useful when bisecting
    /// whether a rendering bug lives in the blitter or elsewhere.
    pub disable_blitter: bool,
    /// Upper bound on cached linked programs per sub-context before the
    /// least-recently-used program is evicted (§4.D).
    pub max_cached_programs: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            debug_shader_dump: false,
            prefer_core_profile: true,
            disable_blitter: false,
            max_cached_programs: 4096,
        }
    }
}

impl RendererConfig {
    /// Loads configuration from the process environment under the
    /// `VREND_` prefix (e.g. `VREND_DEBUG_SHADER_DUMP=1`), falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut settings = config::Config::new();
        settings.merge(config::Environment::with_prefix("VREND"))?;
        settings.try_into::<RendererConfig>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_leaves_blitter_enabled() {
        let cfg = RendererConfig::default();
        assert!(!cfg.disable_blitter);
        assert!(cfg.prefer_core_profile);
    }
}
