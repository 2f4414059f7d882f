//! §4.G Sub-context manager.
//!
//! Grounded on the teacher's `Share`/`Starc` split in `lib.rs` (context
//! object namespaces shared, but each `Device`/`CommandQueue` pair owns its
//! own mutable tracking state) and on `queue.rs`'s state-flush-on-raw-GL-
//! escape idiom, generalized from a single implicit queue per `Share` to a
//! table of many named sub-contexts, each getting its own GL context, VAO,
//! FBO set, and program cache, while sharing one process-global shader/
//! resource table.

use fxhash::FxHashMap;

use crate::callbacks::{HostCallbacks, RawGlContext};
use crate::error::{ErrorKind, FatalError};
use crate::handle::{AttachTable, ObjectTable};
use crate::program::ProgramCache;
use crate::state::PipelineState;

/// GL objects owned exclusively by one sub-context: its context handle, its
/// single VAO (bound once per sub-context per the teacher's `vao: Option
/// <native::VertexArray>` field), a general-purpose FBO used to realize
/// framebuffer state, and a second FBO dedicated to blit/readback so a
/// blit never disturbs the currently-bound draw framebuffer.
pub struct SubContextGlObjects {
    pub gl_context: RawGlContext,
    pub vao: u32,
    pub fbo: u32,
    pub blit_fbo: u32,
}

pub struct SubContext {
    pub id: u32,
    pub gl: SubContextGlObjects,
    pub objects: ObjectTable,
    pub attached: AttachTable,
    pub programs: ProgramCache,
    pub pipeline: PipelineState,
}

impl SubContext {
    fn new(id: u32, gl: SubContextGlObjects) -> Self {
        SubContext {
            id,
            gl,
            objects: ObjectTable::new(),
            attached: AttachTable::new(),
            programs: ProgramCache::new(),
            pipeline: PipelineState::new(),
        }
    }
}

/// Pending two-phase context switch (§4.G): `hw_switch_context` only
/// records which sub-context should become current; the actual
/// `make_current` call happens in `finish_context_switch`, run once at the
/// top of the next command batch so a guest that issues several
/// `SET_SUB_CONTEXT` commands back-to-back pays for exactly one real
/// switch instead of one per command.
#[derive(Default)]
struct PendingSwitch {
    target: Option<u32>,
}

pub struct SubContextManager<'a> {
    callbacks: &'a dyn HostCallbacks,
    contexts: FxHashMap<u32, SubContext>,
    current: Option<u32>,
    pending: PendingSwitch,
}

impl<'a> SubContextManager<'a> {
    /// Creates the manager with sub-context 0 already present, matching
    /// the guest protocol's implicit-default-context convention — a guest
    /// may issue commands before ever sending `CREATE_SUB_CONTEXT`.
    pub fn new(callbacks: &'a dyn HostCallbacks) -> Result<Self, FatalError> {
        let gl_context = callbacks.create_gl_context(None)?;
        let mut contexts = FxHashMap::default();
        contexts.insert(
            0,
            SubContext::new(
                0,
                SubContextGlObjects {
                    gl_context,
                    vao: 0,
                    fbo: 0,
                    blit_fbo: 0,
                },
            ),
        );
        Ok(SubContextManager {
            callbacks,
            contexts,
            current: None,
            pending: PendingSwitch::default(),
        })
    }

    pub fn create(&mut self, id: u32) -> Result<(), ErrorKind> {
        if self.contexts.contains_key(&id) {
            return Err(ErrorKind::IllegalHandle(id));
        }
        let share_with = self.contexts.get(&0).map(|c| c.gl.gl_context);
        let gl_context = self
            .callbacks
            .create_gl_context(share_with)
            .map_err(|_| ErrorKind::IllegalCmdBuffer("sub-context GL context creation failed".into()))?;
        self.contexts.insert(
            id,
            SubContext::new(
                id,
                SubContextGlObjects {
                    gl_context,
                    vao: 0,
                    fbo: 0,
                    blit_fbo: 0,
                },
            ),
        );
        Ok(())
    }

    /// Destroys a sub-context. Requires an explicit existence check before
    /// any lookup (§9 fix over the original's direct array index into
    /// `dec_ctx[handle]`, which could deref a context that was never
    /// created): destroying an unknown handle is `ErrorKind::IllegalHandle`
    /// rather than a host-side crash.
    pub fn destroy(&mut self, id: u32) -> Result<(), ErrorKind> {
        let ctx = self.contexts.remove(&id).ok_or(ErrorKind::IllegalHandle(id))?;
        self.callbacks.destroy_gl_context(ctx.gl.gl_context);
        if self.current == Some(id) {
            self.current = None;
        }
        if self.pending.target == Some(id) {
            self.pending.target = None;
        }
        Ok(())
    }

    /// Records the intent to switch; does not call `make_current` (§4.G
    /// phase 1).
    pub fn hw_switch_context(&mut self, id: u32) -> Result<(), ErrorKind> {
        if !self.contexts.contains_key(&id) {
            return Err(ErrorKind::IllegalHandle(id));
        }
        self.pending.target = Some(id);
        Ok(())
    }

    /// Performs the deferred `make_current` if a switch is pending, then
    /// returns a mutable reference to the now-current sub-context (§4.G
    /// phase 2). A context switch invalidates the destination's shadow
    /// state, since the real GL state may have drifted while it was not
    /// current (mirrors `State::flush` on the teacher's raw-GL escape
    /// hatch).
    pub fn finish_context_switch(&mut self) -> Result<&mut SubContext, ErrorKind> {
        if let Some(target) = self.pending.target.take() {
            let gl_context = self
                .contexts
                .get(&target)
                .ok_or(ErrorKind::IllegalHandle(target))?
                .gl
                .gl_context;
            self.callbacks
                .make_current(gl_context)
                .map_err(|_| ErrorKind::IllegalCmdBuffer("make_current failed".into()))?;
            if self.current != Some(target) {
                if let Some(ctx) = self.contexts.get_mut(&target) {
                    ctx.pipeline.flush();
                }
            }
            self.current = Some(target);
        }
        let current = self.current.unwrap_or(0);
        self.contexts.get_mut(&current).ok_or(ErrorKind::IllegalHandle(current))
    }

    pub fn get(&self, id: u32) -> Option<&SubContext> {
        self.contexts.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut SubContext> {
        self.contexts.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::test_support::RecordingCallbacks;

    #[test]
    fn sub_context_zero_exists_on_construction() {
        let cb = RecordingCallbacks::default();
        let mgr = SubContextManager::new(&cb).unwrap();
        assert!(mgr.get(0).is_some());
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn destroying_unknown_context_is_a_clean_error_not_a_crash() {
        let cb = RecordingCallbacks::default();
        let mut mgr = SubContextManager::new(&cb).unwrap();
        assert!(matches!(mgr.destroy(77), Err(ErrorKind::IllegalHandle(77))));
    }

    #[test]
    fn switch_is_deferred_until_finish_is_called() {
        let cb = RecordingCallbacks::default();
        let mut mgr = SubContextManager::new(&cb).unwrap();
        mgr.create(1).unwrap();
        mgr.hw_switch_context(1).unwrap();
        assert!(cb.current.lock().unwrap().is_none());
        let ctx = mgr.finish_context_switch().unwrap();
        assert_eq!(ctx.id, 1);
        assert!(cb.current.lock().unwrap().is_some());
    }

    #[test]
    fn switching_context_flushes_destination_shadow_state() {
        let cb = RecordingCallbacks::default();
        let mut mgr = SubContextManager::new(&cb).unwrap();
        mgr.create(1).unwrap();
        {
            let ctx0 = mgr.get_mut(0).unwrap();
            ctx0.pipeline.clear(crate::state::Dirty::all());
        }
        mgr.hw_switch_context(1).unwrap();
        let ctx1 = mgr.finish_context_switch().unwrap();
        assert!(ctx1.pipeline.is_dirty(crate::state::Dirty::all()));
    }

    #[test]
    fn switching_to_unknown_context_is_rejected() {
        let cb = RecordingCallbacks::default();
        let mut mgr = SubContextManager::new(&cb).unwrap();
        assert!(matches!(mgr.hw_switch_context(5), Err(ErrorKind::IllegalHandle(5))));
    }
}
