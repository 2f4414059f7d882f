//! Ambient stack: the embedder-provided hooks this crate needs but does
//! not own (§1 Non-goals: transport, presenter, shared-memory ring).
//!
//! Grounded on the teacher's `window::egl` / `window::web` split, which
//! abstracts "how a GL context actually gets created and made current" out
//! of the backend proper — generalized here into an explicit trait so the
//! embedder supplies context lifecycle and fence signaling without this
//! crate depending on any specific windowing crate.

/// Opaque embedder-owned GL context handle. This crate never inspects it,
/// only passes it back to the same `HostCallbacks` impl that produced it.
pub type RawGlContext = u64;

/// Hooks the embedder must provide. `create_gl_context`/`destroy_gl_context`
/// back the two-phase sub-context switch in `subcontext.rs`; `make_current`
/// is called exactly once per finished switch; `write_fence` backs query
/// and streamout completion signaling back to the guest.
pub trait HostCallbacks: Send + Sync {
    /// Creates a new GL context sharing object namespaces with `share_with`
    /// (`None` for the first context created for a renderer instance).
    fn create_gl_context(&self, share_with: Option<RawGlContext>) -> Result<RawGlContext, crate::error::FatalError>;

    fn destroy_gl_context(&self, ctx: RawGlContext);

    /// Makes `ctx` current on the calling thread. Called only from the
    /// thread that owns the renderer, matching `Starc`'s thread-affinity
    /// assertion.
    fn make_current(&self, ctx: RawGlContext) -> Result<(), crate::error::FatalError>;

    /// Signals the guest that `fence_id` has been reached by the GL command
    /// stream (§6). Embedders typically implement this by writing into the
    /// shared-memory ring this crate does not own.
    fn write_fence(&self, fence_id: u32);
}

/// Test/dev-only callback implementation that records calls instead of
/// touching real GL or guest memory.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingCallbacks {
        pub next_ctx: Mutex<u64>,
        pub fences_written: Mutex<Vec<u32>>,
        pub current: Mutex<Option<RawGlContext>>,
    }

    impl HostCallbacks for RecordingCallbacks {
        fn create_gl_context(&self, _share_with: Option<RawGlContext>) -> Result<RawGlContext, crate::error::FatalError> {
            let mut next = self.next_ctx.lock().unwrap();
            *next += 1;
            Ok(*next)
        }

        fn destroy_gl_context(&self, _ctx: RawGlContext) {}

        fn make_current(&self, ctx: RawGlContext) -> Result<(), crate::error::FatalError> {
            *self.current.lock().unwrap() = Some(ctx);
            Ok(())
        }

        fn write_fence(&self, fence_id: u32) {
            self.fences_written.lock().unwrap().push(fence_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingCallbacks;
    use super::*;

    #[test]
    fn recording_callbacks_assign_increasing_context_ids() {
        let cb = RecordingCallbacks::default();
        let a = cb.create_gl_context(None).unwrap();
        let b = cb.create_gl_context(Some(a)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn make_current_updates_recorded_state() {
        let cb = RecordingCallbacks::default();
        let ctx = cb.create_gl_context(None).unwrap();
        cb.make_current(ctx).unwrap();
        assert_eq!(*cb.current.lock().unwrap(), Some(ctx));
    }
}
