//! # IDs
//! Every handle the scheduler passes around (nodes, strokes, images) is a `FuzzID<T>`: a number that is
//! unique within this process and within the namespace `T`, and that is never handed out twice.
//!
//! Never reusing a value is what makes the IDs usable as weak handles - an ID whose object is gone simply
//! stops resolving, it can never start pointing at some newer object.

use std::sync::atomic::{AtomicU64, Ordering};

// Next free value per namespace.
static NEXT_IDS: parking_lot::RwLock<
    std::collections::BTreeMap<std::any::TypeId, &'static AtomicU64>,
> = parking_lot::const_rwlock(std::collections::BTreeMap::new());

/// Get the counter for namespace `T`, creating it on first use.
fn counter<T: std::any::Any>() -> &'static AtomicU64 {
    let ty = std::any::TypeId::of::<T>();
    if let Some(counter) = NEXT_IDS.read().get(&ty) {
        return *counter;
    }
    // Only happens once per namespace. Leaked, as namespaces live for the whole program anyway.
    *NEXT_IDS
        .write()
        .entry(ty)
        .or_insert_with(|| Box::leak(Box::new(AtomicU64::new(1))))
}

/// ID that is guarunteed unique within this execution of the program.
/// IDs with different namespaces may share a value but are different types.
pub struct FuzzID<T: std::any::Any> {
    id: std::num::NonZeroU64,
    _namespace: std::marker::PhantomData<fn() -> T>,
}
impl<T: std::any::Any> FuzzID<T> {
    /// Allocate a fresh ID.
    ///
    /// # Panics
    /// If all `u64::MAX - 1` IDs of this namespace have been allocated.
    #[must_use]
    pub fn new() -> Self {
        let id = counter::<T>().fetch_add(1, Ordering::Relaxed);
        let Some(id) = std::num::NonZeroU64::new(id) else {
            // Wrapped all the way around. Nothing sane left to do.
            panic!("{} ID overflow!", std::any::type_name::<T>());
        };
        Self {
            id,
            _namespace: std::marker::PhantomData,
        }
    }
    /// Get the raw numeric value of this ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id.get()
    }
}
impl<T: std::any::Any> Default for FuzzID<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: std::any::Any> Clone for FuzzID<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: std::any::Any> Copy for FuzzID<T> {}
impl<T: std::any::Any> PartialEq for FuzzID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T: std::any::Any> Eq for FuzzID<T> {}
impl<T: std::any::Any> PartialOrd for FuzzID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T: std::any::Any> Ord for FuzzID<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
impl<T: std::any::Any> std::hash::Hash for FuzzID<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl<T: std::any::Any> std::fmt::Display for FuzzID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // rsplit always yields at least one item.
        let name = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or_default();
        write!(f, "{name}#{}", self.id)
    }
}
impl<T: std::any::Any> std::fmt::Debug for FuzzID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
