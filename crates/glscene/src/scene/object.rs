//! Object identity and edit tracking
//!
//! Every renderable object gets an [`ObjectId`] from a session-owned
//! [`ObjectRegistry`]. Ids are generational: once an object is disposed its
//! id never resolves again, so caches holding stale ids simply miss.
//!
//! Derived GPU data (vertex buffers, textures) is validated against the
//! object's [`EditIndex`] rather than pushed on change.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generational handle for a registered object
    pub struct ObjectId;
}

/// Broad class of a registered object, used for live-count reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A geometry
    Geometry,
    /// A texture image
    Texture,
    /// A draw context
    DrawContext,
    /// An attribute set or shader shared between geometries
    Attribute,
}

/// Session context that owns object identities
///
/// Multiple registries can coexist; nothing here is process-wide.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: SlotMap<ObjectId, ObjectKind>,
}

impl ObjectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a new object
    pub fn register(&mut self, kind: ObjectKind) -> ObjectId {
        self.objects.insert(kind)
    }

    /// Release an id; returns the kind if the id was alive
    pub fn dispose(&mut self, id: ObjectId) -> Option<ObjectKind> {
        self.objects.remove(id)
    }

    /// True while the object has not been disposed
    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    /// Kind of a live object
    pub fn kind(&self, id: ObjectId) -> Option<ObjectKind> {
        self.objects.get(id).copied()
    }

    /// Number of live objects
    pub fn live_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of live objects of one kind
    pub fn live_count_of(&self, kind: ObjectKind) -> usize {
        self.objects.values().filter(|k| **k == kind).count()
    }
}

/// Monotonic mutation counter with an explicit lock flag
///
/// While locked, edits do not advance the counter. Callers use this to
/// batch several mutations that should be observed as one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditIndex {
    value: u32,
    locked: bool,
}

impl EditIndex {
    /// A fresh index starting at zero
    pub const fn new() -> Self {
        Self { value: 0, locked: false }
    }

    /// Current counter value
    pub const fn get(&self) -> u32 {
        self.value
    }

    /// Record a mutation
    pub fn edited(&mut self) {
        if !self.locked {
            self.value = self.value.wrapping_add(1);
        }
    }

    /// Lock or unlock the counter
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Whether edits are currently ignored
    pub const fn is_locked(&self) -> bool {
        self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposed_ids_never_resolve() {
        let mut registry = ObjectRegistry::new();
        let a = registry.register(ObjectKind::Geometry);
        assert!(registry.is_alive(a));

        assert_eq!(registry.dispose(a), Some(ObjectKind::Geometry));
        assert!(!registry.is_alive(a));

        // The slot may be reused, but the old id stays dead
        let b = registry.register(ObjectKind::Geometry);
        assert_ne!(a, b);
        assert!(!registry.is_alive(a));
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_independent_registries() {
        let mut first = ObjectRegistry::new();
        let mut second = ObjectRegistry::new();
        first.register(ObjectKind::Texture);
        first.register(ObjectKind::Geometry);
        second.register(ObjectKind::Geometry);

        assert_eq!(first.live_count(), 2);
        assert_eq!(second.live_count(), 1);
        assert_eq!(first.live_count_of(ObjectKind::Texture), 1);
    }

    #[test]
    fn test_locked_edit_index_does_not_advance() {
        let mut index = EditIndex::new();
        index.edited();
        assert_eq!(index.get(), 1);

        index.set_locked(true);
        index.edited();
        index.edited();
        assert_eq!(index.get(), 1);

        index.set_locked(false);
        index.edited();
        assert_eq!(index.get(), 2);
    }
}
