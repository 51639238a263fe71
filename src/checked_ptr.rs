use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::pin::Pin;
use core::ptr::{self, NonNull};

use crate::counter::CheckedPtrTarget;
use crate::hash::HashTraits;
use crate::ptr::{PackedPtrTraits, PtrTraits, RawPtrTraits};
#[cfg(feature = "debug-registry")]
use crate::registry;
use crate::registry::HandleId;
use crate::CheckedRef;

#[cfg(test)]
mod tests;

/// A nullable, non-owning pointer whose referent verifies at destruction that
/// no `CheckedPtr` still points at it.
///
/// A `CheckedPtr` does not keep its referent alive. It adds one to the
/// referent's live-handle count while it points there, and the referent
/// aborts the process if it is destroyed with a nonzero count. A non-null
/// `CheckedPtr` can therefore always be dereferenced.
///
/// Besides pointing at a referent or being null, a `CheckedPtr` can hold the
/// hash-table deleted sentinel, see [`HashTraits`]. The sentinel is neither
/// null nor dereferenceable and never touches any referent.
///
/// Every reassignment first establishes the new value in a temporary, then
/// swaps it into place, then releases the old value. The handle is never
/// observed half-updated, even if releasing the old value reenters.
///
/// # Pointee types
///
/// The storage strategies hold thin addresses, so `T` must be `Sized`. There
/// is no conversion between pointee types and no unsized pointee:
///
/// ```compile_fail
/// use checkedref::{CheckedPtr, CheckedPtrTarget};
///
/// let _: Option<CheckedPtr<dyn CheckedPtrTarget>> = None;
/// ```
///
/// # Examples
///
/// ```
/// use std::pin::pin;
///
/// use checkedref::{CanMakeCheckedPtr, CheckedPtr, PtrCounter};
///
/// struct Frame {
///     counter: PtrCounter,
/// }
///
/// unsafe impl CanMakeCheckedPtr for Frame {
///     fn ptr_counter(&self) -> &PtrCounter {
///         &self.counter
///     }
/// }
///
/// let frame = pin!(Frame { counter: PtrCounter::new() });
/// let frame = frame.as_ref();
///
/// let mut focused: CheckedPtr<Frame> = CheckedPtr::null();
/// assert!(focused.is_null());
///
/// focused.set(frame);
/// let previous = focused.clone();
/// assert_eq!(frame.counter.ptr_count(), 2);
///
/// let taken = focused.take();
/// assert!(focused.is_null());
/// assert_eq!(taken, previous);
/// assert_eq!(frame.counter.ptr_count(), 2);
/// ```
pub struct CheckedPtr<T, P = RawPtrTraits>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    pub(crate) slot: P::Storage,
    pub(crate) id: HandleId,
    _marker: PhantomData<*const T>,
}

/// A [`CheckedPtr`] stored in 6 unaligned bytes, see [`PackedPtrTraits`].
pub type PackedCheckedPtr<T> = CheckedPtr<T, PackedPtrTraits>;

impl<T, P> CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    /// A null pointer.
    #[inline]
    #[must_use]
    pub fn null() -> Self {
        Self::from_slot(P::EMPTY)
    }

    /// Point at `target`, incrementing its count.
    #[inline]
    #[must_use]
    pub fn new(target: Pin<&T>) -> Self {
        // SAFETY: `target` is pinned, so it stays at this address until its
        // destructor runs, and that destructor aborts while this count is
        // outstanding.
        unsafe { Self::from_raw(ptr::from_ref(target.get_ref())) }
    }

    /// Point at `ptr`, incrementing its count if it is not null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point at a live `T` that will not move or be
    /// deallocated without running its destructor. `ptr` must not be the
    /// storage strategy's deleted sentinel.
    #[inline]
    #[must_use]
    pub unsafe fn from_raw(ptr: *const T) -> Self {
        let this = Self::from_slot(P::wrap(ptr));
        if let Some(target) = this.target() {
            target.increment_ptr_count();
            #[cfg(feature = "debug-registry")]
            target.register_checked_ptr(this.id);
        }
        this
    }

    /// Take over a count already held on `ptr` by the handle `source`.
    ///
    /// # Safety
    ///
    /// The caller must own one count on `ptr` and must not release it.
    #[inline]
    #[cfg_attr(not(feature = "debug-registry"), allow(unused_variables))]
    pub(crate) unsafe fn adopt(ptr: NonNull<T>, source: HandleId) -> Self {
        let this = Self::from_slot(P::wrap(ptr.as_ptr()));
        #[cfg(feature = "debug-registry")]
        if let Some(target) = this.target() {
            target.move_checked_ptr(source, this.id);
        }
        this
    }

    #[inline]
    fn from_slot(slot: P::Storage) -> Self {
        Self {
            slot,
            id: HandleId::next(),
            _marker: PhantomData,
        }
    }

    /// The value used to mark a reclaimed hash-table bucket.
    #[inline]
    #[must_use]
    pub fn hash_table_deleted_value() -> Self {
        Self::from_slot(P::hash_table_deleted_value())
    }

    /// Whether this is the hash-table deleted sentinel.
    #[inline]
    #[must_use]
    pub fn is_hash_table_deleted_value(&self) -> bool {
        P::is_hash_table_deleted_value(self.slot)
    }

    /// Whether this pointer is null.
    ///
    /// The deleted sentinel is not null.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        P::unwrap(self.slot).is_null()
    }

    /// The address this pointer holds.
    ///
    /// For the deleted sentinel this is an address that must not be
    /// dereferenced.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        P::unwrap(self.slot)
    }

    /// The referent, or `None` if this pointer is null or deleted.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.target()
    }

    /// The pinned referent, or `None` if this pointer is null or deleted.
    #[inline]
    #[must_use]
    pub fn as_pin(&self) -> Option<Pin<&T>> {
        // SAFETY: referents are pinned when the first handle is created.
        self.target().map(|target| unsafe { Pin::new_unchecked(target) })
    }

    /// The identity of this handle in its referent's registry.
    #[cfg(feature = "debug-registry")]
    #[inline]
    #[must_use]
    pub fn handle_id(&self) -> HandleId {
        self.id
    }

    #[inline]
    pub(crate) fn target(&self) -> Option<&T> {
        if P::is_hash_table_deleted_value(self.slot) {
            return None;
        }
        // SAFETY: a non-null slot holds a counted pointer, and the referent
        // aborts rather than being destroyed while the count is outstanding.
        unsafe { P::unwrap(self.slot).as_ref() }
    }

    /// Move the value out of this pointer, leaving it null.
    ///
    /// The count moves with the value; the referent's count does not change.
    #[inline]
    #[must_use]
    pub fn take(&mut self) -> Self {
        let mut taken = Self::null();
        taken.swap(self);
        taken
    }

    /// Exchange the values of two pointers without touching either count.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        P::swap(&mut self.slot, &mut other.slot);
        #[cfg(feature = "debug-registry")]
        registry::exchange_registrations(self.target(), self.id, other.target(), other.id);
    }

    // The single reassignment path: `replacement` is fully established before
    // the old value is released.
    #[inline]
    fn replace_with(&mut self, mut replacement: Self) {
        self.swap(&mut replacement);
        drop(replacement);
    }

    /// Make this pointer null, releasing its count.
    #[inline]
    pub fn set_null(&mut self) {
        self.replace_with(Self::null());
    }

    /// Point at `target` instead, releasing the previous count.
    #[inline]
    pub fn set(&mut self, target: Pin<&T>) {
        self.replace_with(Self::new(target));
    }

    /// Point at `ptr` instead, releasing the previous count.
    ///
    /// Assigning the address this pointer already holds leaves the count
    /// unchanged.
    ///
    /// # Safety
    ///
    /// See [`from_raw`](Self::from_raw).
    #[inline]
    pub unsafe fn set_raw(&mut self, ptr: *const T) {
        self.replace_with(Self::from_raw(ptr));
    }

    /// Point where `other` points, releasing the previous count.
    #[inline]
    pub fn assign(&mut self, other: &Self) {
        self.replace_with(other.clone());
    }

    /// Move the value out of `other` into this pointer, leaving `other` null
    /// and releasing this pointer's previous count.
    #[inline]
    pub fn take_from(&mut self, other: &mut Self) {
        self.replace_with(other.take());
    }

    /// Convert into a [`CheckedRef`], leaving this pointer null.
    ///
    /// The count moves to the returned reference, so the referent's count
    /// does not change.
    ///
    /// # Panics
    ///
    /// Panics if this pointer is null or deleted.
    #[must_use]
    pub fn release_non_null(&mut self) -> CheckedRef<T, P> {
        let Some(target) = self.target().map(NonNull::from) else {
            panic!("release_non_null called on a null CheckedPtr");
        };
        let _ = P::exchange(&mut self.slot, ptr::null());
        debug!("checkedref releasing {:p} into a CheckedRef", target);
        // SAFETY: the count held by `self` was just given up by clearing its
        // slot.
        unsafe { CheckedRef::adopt(target, self.id) }
    }
}

impl<T, P> Clone for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn clone(&self) -> Self {
        let copy = Self::from_slot(self.slot);
        if let Some(target) = copy.target() {
            target.increment_ptr_count();
            #[cfg(feature = "debug-registry")]
            target.copy_checked_ptr(self.id, copy.id);
        }
        copy
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T, P> Default for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn default() -> Self {
        Self::null()
    }
}

impl<'a, T, P> From<Pin<&'a T>> for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn from(target: Pin<&'a T>) -> Self {
        Self::new(target)
    }
}

impl<'a, T, P> From<Option<Pin<&'a T>>> for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn from(target: Option<Pin<&'a T>>) -> Self {
        target.map_or_else(Self::null, Self::new)
    }
}

impl<T, P> From<CheckedRef<T, P>> for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn from(reference: CheckedRef<T, P>) -> Self {
        reference.release_ptr()
    }
}

impl<T, P> From<&CheckedRef<T, P>> for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn from(reference: &CheckedRef<T, P>) -> Self {
        let copy = Self::from_slot(P::wrap(reference.as_ptr()));
        let target = &**reference;
        target.increment_ptr_count();
        #[cfg(feature = "debug-registry")]
        target.copy_checked_ptr(reference.id, copy.id);
        copy
    }
}

impl<T, P, Q> PartialEq<CheckedPtr<T, Q>> for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
    Q: PtrTraits<T>,
{
    #[inline]
    fn eq(&self, other: &CheckedPtr<T, Q>) -> bool {
        ptr::eq(self.as_ptr(), other.as_ptr())
    }
}

impl<T, P> Eq for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
}

impl<T, P, Q> PartialEq<CheckedRef<T, Q>> for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
    Q: PtrTraits<T>,
{
    #[inline]
    fn eq(&self, other: &CheckedRef<T, Q>) -> bool {
        ptr::eq(self.as_ptr(), other.as_ptr())
    }
}

impl<T, P> PartialEq<*const T> for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    #[inline]
    fn eq(&self, other: &*const T) -> bool {
        ptr::eq(self.as_ptr(), *other)
    }
}

impl<T, P> Hash for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ptr().hash(state);
    }
}

impl<T, P> fmt::Debug for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_hash_table_deleted_value() {
            return f.write_str("CheckedPtr(<deleted>)");
        }
        f.debug_tuple("CheckedPtr").field(&self.as_ptr()).finish()
    }
}

impl<T, P> fmt::Pointer for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

impl<T, P> HashTraits for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    type PeekType = *const T;

    #[inline]
    fn empty_value() -> Self {
        Self::null()
    }

    #[inline]
    fn is_empty_value(value: &Self) -> bool {
        value.is_null()
    }

    #[inline]
    fn construct_deleted_value(slot: &mut Self) {
        slot.replace_with(Self::hash_table_deleted_value());
    }

    #[inline]
    fn is_deleted_value(value: &Self) -> bool {
        value.is_hash_table_deleted_value()
    }

    #[inline]
    fn peek(value: &Self) -> *const T {
        value.as_ptr()
    }

    fn custom_delete_bucket(slot: &mut Self) {
        assert!(
            !slot.is_hash_table_deleted_value(),
            "bucket is already deleted"
        );
        trace!("checkedref reclaiming hash table bucket holding {:p}", slot.as_ptr());
        let doomed = slot.take();
        drop(doomed);
        Self::construct_deleted_value(slot);
    }
}
