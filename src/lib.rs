/*!
# Host-side renderer for a paravirtualized OpenGL command stream.

A guest driver emits a TGSI-like command stream over a transport this
crate does not own (see `HostCallbacks` in `callbacks.rs`). This crate
decodes that stream (`decoder.rs`), translates TGSI shaders to GLSL
(`shader/translate.rs`), and replays GL calls through lazily-tracked shadow
state (`state.rs`, `renderer.rs`) so repeated draws with unchanged pipeline
state cost no redundant driver calls.

## Binding model

Each sub-context (`subcontext.rs`) owns one GL context, one VAO, its own
FBOs, and its own linked-program cache (`program.rs`); shader selectors and
their compiled variants (`shader/mod.rs`) are process-global and shared
across sub-contexts keyed by handle. Resources are refcounted
process-globally (`handle.rs::ResourceTable`) and validated per-context
through a non-owning attach table before any command may reference them.
*/

#![allow(clippy::too_many_arguments)]

use std::fmt;
use std::sync::{Arc, Weak};
use std::thread;

pub mod blitter;
pub mod callbacks;
pub mod config;
pub mod decoder;
pub mod error;
pub mod format;
pub mod handle;
pub mod program;
pub mod renderer;
pub mod shader;
pub mod state;
pub mod subcontext;

pub use config::RendererConfig;
pub use error::{ContextError, ErrorKind, FatalError};

/// Single-threaded `Arc`: `Send` even when `T: !Sync`, but panics if
/// dereferenced from any thread other than the one that created it. The GL
/// context objects this renderer shares between sub-contexts are not
/// `Sync`, yet the process-global resource/shader tables that hold clones
/// of them must be `Send` to live behind a `Mutex` alongside callback
/// trait objects — this is the same shape the teacher uses for its shared
/// `Share` handle.
pub struct Starc<T: ?Sized> {
    arc: Arc<T>,
    thread: thread::ThreadId,
}

impl<T> Starc<T> {
    pub fn new(value: T) -> Self {
        Starc {
            arc: Arc::new(value),
            thread: thread::current().id(),
        }
    }
}

impl<T: ?Sized> Starc<T> {
    pub fn downgrade(this: &Starc<T>) -> Wstarc<T> {
        Wstarc {
            weak: Arc::downgrade(&this.arc),
            thread: this.thread,
        }
    }
}

impl<T: ?Sized> Clone for Starc<T> {
    fn clone(&self) -> Self {
        Starc {
            arc: self.arc.clone(),
            thread: self.thread,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Starc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Starc({:?}@{:?})", Arc::as_ptr(&self.arc), self.thread)
    }
}

impl<T: ?Sized> std::ops::Deref for Starc<T> {
    type Target = T;
    fn deref(&self) -> &T {
        assert_eq!(
            thread::current().id(),
            self.thread,
            "Starc accessed from a thread other than the one that created it"
        );
        &*self.arc
    }
}

unsafe impl<T: ?Sized> Send for Starc<T> {}
unsafe impl<T: ?Sized> Sync for Starc<T> {}

pub struct Wstarc<T: ?Sized> {
    weak: Weak<T>,
    thread: thread::ThreadId,
}

impl<T: ?Sized> Wstarc<T> {
    pub fn upgrade(&self) -> Option<Starc<T>> {
        let thread = self.thread;
        self.weak.upgrade().map(|arc| Starc { arc, thread })
    }
}

impl<T: ?Sized> Clone for Wstarc<T> {
    fn clone(&self) -> Self {
        Wstarc {
            weak: self.weak.clone(),
            thread: self.thread,
        }
    }
}

unsafe impl<T: ?Sized> Send for Wstarc<T> {}
unsafe impl<T: ?Sized> Sync for Wstarc<T> {}

/// §6 "Capabilities reply": the fixed set of limits and per-format bitmaps
/// reported to a guest once at context creation. Populated from the real
/// driver's queried limits by the embedder (see `HostCallbacks`); this
/// struct only defines the shape, not where the numbers come from.
#[derive(Copy, Clone, Debug)]
pub struct Capabilities {
    pub max_texture_array_layers: u32,
    pub max_render_targets: u32,
    pub max_samples: u32,
    pub max_dual_source_render_targets: u32,
    pub max_texture_buffer_size: u32,
    pub max_viewports: u32,
    pub max_uniform_blocks: u32,
    pub glsl_level: u32,
    /// Bit `i` set means `Format` variant with discriminant `i` is
    /// renderable/sampleable per `FormatTable::describe`; populated by
    /// `renderer::Renderer::capabilities` rather than stored statically,
    /// since it depends on which GL profile the embedder created.
    pub format_bitmask: u64,
    pub prim_mask: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            max_texture_array_layers: 256,
            max_render_targets: state::MAX_DRAW_BUFFERS as u32,
            max_samples: 4,
            max_dual_source_render_targets: 1,
            max_texture_buffer_size: 1 << 27,
            max_viewports: state::MAX_VIEWPORTS as u32,
            max_uniform_blocks: state::MAX_UBO_SLOTS as u32,
            glsl_level: 140,
            format_bitmask: 0,
            prim_mask: 0x3FF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starc_upgrade_roundtrips() {
        let _ = env_logger::builder().is_test(true).try_init();
        let strong = Starc::new(42i32);
        let weak = Starc::downgrade(&strong);
        assert_eq!(*weak.upgrade().unwrap(), 42);
        drop(strong);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    #[should_panic(expected = "thread")]
    fn starc_panics_off_thread() {
        let strong = Starc::new(1i32);
        let handle = std::thread::spawn(move || {
            let _ = *strong;
        });
        handle.join().unwrap();
    }

    #[test]
    fn default_capabilities_match_state_table_sizes() {
        let caps = Capabilities::default();
        assert_eq!(caps.max_viewports, 16);
        assert_eq!(caps.max_uniform_blocks, 15);
    }
}
