//! 4.B Object / resource tables.
//!
//! Per-context object table: open-addressed hash from `u32` handle to a
//! typed, destructor-bearing slot (generalizes the teacher's
//! `native::*` handle types, which are untyped `GLuint`s disambiguated only
//! by which `hal` trait method created them, into an explicit tagged
//! table since guest handles arrive over the wire with no static type).
//!
//! The resource table is the process-global analogue, keyed by handle only,
//! refcounted per invariant 4 in §3.

use fxhash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::ErrorKind;

/// Tag identifying what kind of object a handle refers to. Mirrors the
/// object kinds enumerated in §3 ("Object").
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ObjectType {
    Blend,
    Dsa,
    Rasterizer,
    VertexElements,
    Surface,
    SamplerView,
    SamplerState,
    ShaderSelector,
    Query,
    StreamoutTarget,
}

/// One entry in a per-context object table: a type tag plus the boxed
/// payload. The destructor is just `Drop` on `payload` — the teacher's
/// dynamic-dispatch destructor-per-kind note in §9 maps naturally onto
/// Rust's `Drop`, so there is no explicit destructor function pointer.
struct Slot {
    ty: ObjectType,
    payload: Box<dyn std::any::Any>,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("ty", &self.ty).finish()
    }
}

/// Per-context handle table. Insert rejects a duplicate `(handle, type)`
/// pair; lookup requires the caller name the expected type and fails with
/// [`ErrorKind::IllegalHandle`] on mismatch or absence.
#[derive(Debug, Default)]
pub struct ObjectTable {
    slots: FxHashMap<u32, Slot>,
}

impl ObjectTable {
    pub fn new() -> Self {
        ObjectTable {
            slots: FxHashMap::default(),
        }
    }

    pub fn insert<T: 'static>(&mut self, handle: u32, ty: ObjectType, value: T) -> Result<(), ErrorKind> {
        if self.slots.contains_key(&handle) {
            return Err(ErrorKind::IllegalHandle(handle));
        }
        self.slots.insert(
            handle,
            Slot {
                ty,
                payload: Box::new(value),
            },
        );
        Ok(())
    }

    pub fn get<T: 'static>(&self, handle: u32, ty: ObjectType) -> Result<&T, ErrorKind> {
        let slot = self
            .slots
            .get(&handle)
            .ok_or(ErrorKind::IllegalHandle(handle))?;
        if slot.ty != ty {
            return Err(ErrorKind::IllegalHandle(handle));
        }
        slot.payload
            .downcast_ref::<T>()
            .ok_or(ErrorKind::IllegalHandle(handle))
    }

    pub fn get_mut<T: 'static>(&mut self, handle: u32, ty: ObjectType) -> Result<&mut T, ErrorKind> {
        let slot = self
            .slots
            .get_mut(&handle)
            .ok_or(ErrorKind::IllegalHandle(handle))?;
        if slot.ty != ty {
            return Err(ErrorKind::IllegalHandle(handle));
        }
        slot.payload
            .downcast_mut::<T>()
            .ok_or(ErrorKind::IllegalHandle(handle))
    }

    /// Removes the slot, running its destructor (`Drop`) as part of the
    /// `Box` being dropped.
    pub fn remove(&mut self, handle: u32) -> Result<(), ErrorKind> {
        self.slots
            .remove(&handle)
            .map(|_| ())
            .ok_or(ErrorKind::IllegalHandle(handle))
    }

    pub fn contains(&self, handle: u32) -> bool {
        self.slots.contains_key(&handle)
    }
}

/// The host-side mirror of a guest buffer or texture (§3 "Resource").
/// Refcounted: attachments and live object references each hold a clone of
/// the `Arc`, and the resource's GL objects are destroyed when the last
/// clone drops (invariant 4).
pub struct Resource {
    pub handle: u32,
    pub target: ResourceTarget,
    pub format: crate::format::Format,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_size: u32,
    pub last_level: u32,
    pub nr_samples: u32,
    pub y_0_top: bool,
    pub gl_object: Option<u32>,
    /// Buffer-texture resources carry a secondary texture id wrapping the
    /// buffer for sampling.
    pub secondary_gl_object: Option<u32>,
    /// Lazily-allocated readback FBOs, keyed by (level, layer).
    pub(crate) readback_fbos: parking_lot::Mutex<FxHashMap<(u32, u32), u32>>,
    refcount: AtomicU32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResourceTarget {
    Buffer,
    Texture1d,
    Texture2d,
    Texture3d,
    TextureCube,
    Texture1dArray,
    Texture2dArray,
    TextureCubeArray,
    TextureRect,
    BufferTexture,
    Texture2dMultisample,
}

impl Resource {
    pub fn new(handle: u32, target: ResourceTarget, format: crate::format::Format) -> Arc<Self> {
        Arc::new(Resource {
            handle,
            target,
            format,
            width: 1,
            height: 1,
            depth: 1,
            array_size: 1,
            last_level: 0,
            nr_samples: 0,
            y_0_top: false,
            gl_object: None,
            secondary_gl_object: None,
            readback_fbos: parking_lot::Mutex::new(FxHashMap::default()),
            refcount: AtomicU32::new(1),
        })
    }

    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }

    pub(crate) fn retain(&self) {
        self.refcount.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release(&self) -> u32 {
        self.refcount.fetch_sub(1, Ordering::AcqRel) - 1
    }
}

/// Process-global resource table (§3, §4.B). Keyed by handle only; holds
/// one strong `Arc` ref dropped on explicit unref, exactly mirroring §9's
/// "no back-edges from resources to objects, so no cycles form" design.
#[derive(Default)]
pub struct ResourceTable {
    resources: parking_lot::RwLock<FxHashMap<u32, Arc<Resource>>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        ResourceTable {
            resources: parking_lot::RwLock::new(FxHashMap::default()),
        }
    }

    pub fn create(&self, resource: Arc<Resource>) {
        self.resources.write().insert(resource.handle, resource);
    }

    pub fn get(&self, handle: u32) -> Option<Arc<Resource>> {
        self.resources.read().get(&handle).cloned()
    }

    /// Drops the table's strong reference. The resource's GL objects are
    /// actually freed only once every attach-table clone has also dropped
    /// (handled by `Arc`'s `Drop`, invariant 4 in §3).
    pub fn unref(&self, handle: u32) {
        self.resources.write().remove(&handle);
    }
}

/// A context's validated view of which resources it may reference (§3
/// "Resource attach"). Holds no ownership — just a cheap clone of the
/// `Arc` for O(1) access without touching the global table's lock on every
/// command (§4.B).
#[derive(Default)]
pub struct AttachTable {
    attached: FxHashMap<u32, Arc<Resource>>,
}

impl AttachTable {
    pub fn new() -> Self {
        AttachTable {
            attached: FxHashMap::default(),
        }
    }

    pub fn attach(&mut self, resource: Arc<Resource>) {
        resource.retain();
        self.attached.insert(resource.handle, resource);
    }

    pub fn detach(&mut self, handle: u32) {
        if let Some(resource) = self.attached.remove(&handle) {
            resource.release();
        }
    }

    /// Validated lookup per invariant 3 in §3: a resource handle appearing
    /// in a command must already be attached, else `ILLEGAL_RESOURCE`.
    pub fn lookup(&self, handle: u32) -> Result<Arc<Resource>, ErrorKind> {
        self.attached
            .get(&handle)
            .cloned()
            .ok_or(ErrorKind::IllegalResource(handle))
    }

    pub fn is_attached(&self, handle: u32) -> bool {
        self.attached.contains_key(&handle)
    }
}

impl Drop for AttachTable {
    fn drop(&mut self) {
        for (_, resource) in self.attached.drain() {
            resource.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    #[test]
    fn duplicate_handle_insert_is_rejected() {
        let mut table = ObjectTable::new();
        table.insert(1, ObjectType::Blend, 42i32).unwrap();
        assert!(matches!(
            table.insert(1, ObjectType::Blend, 7i32),
            Err(ErrorKind::IllegalHandle(1))
        ));
    }

    #[test]
    fn type_mismatch_on_lookup_is_rejected() {
        let mut table = ObjectTable::new();
        table.insert(1, ObjectType::Blend, 42i32).unwrap();
        assert!(table.get::<i32>(1, ObjectType::Dsa).is_err());
        assert_eq!(*table.get::<i32>(1, ObjectType::Blend).unwrap(), 42);
    }

    #[test]
    fn resource_not_attached_fails_validation() {
        let table = ResourceTable::new();
        let resource = Resource::new(1, ResourceTarget::Texture2d, Format::R8G8B8A8Unorm);
        table.create(resource);

        let attach = AttachTable::new();
        assert!(matches!(
            attach.lookup(1),
            Err(ErrorKind::IllegalResource(1))
        ));
    }

    #[test]
    fn attach_then_detach_restores_refcount() {
        let resource = Resource::new(1, ResourceTarget::Texture2d, Format::R8G8B8A8Unorm);
        assert_eq!(resource.refcount(), 1);
        let mut attach = AttachTable::new();
        attach.attach(resource.clone());
        assert_eq!(resource.refcount(), 2);
        attach.detach(1);
        assert_eq!(resource.refcount(), 1);
    }

    #[test]
    fn dropping_attach_table_releases_all_refs() {
        let resource = Resource::new(1, ResourceTarget::Texture2d, Format::R8G8B8A8Unorm);
        {
            let mut attach = AttachTable::new();
            attach.attach(resource.clone());
            assert_eq!(resource.refcount(), 2);
        }
        assert_eq!(resource.refcount(), 1);
    }
}
