use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ops::Deref;
use core::pin::Pin;
use core::ptr::{self, NonNull};

use crate::counter::CheckedPtrTarget;
use crate::ptr::{PackedPtrTraits, PtrTraits, RawPtrTraits};
#[cfg(feature = "debug-registry")]
use crate::registry;
use crate::registry::HandleId;
use crate::CheckedPtr;

/// A non-null, non-owning reference whose referent verifies at destruction
/// that no handle still points at it.
///
/// `CheckedRef` is the non-nullable sibling of [`CheckedPtr`]. It always
/// points at a live referent and dereferences directly to it. It can be
/// rebound to another referent, but never made null.
///
/// ```
/// use std::pin::pin;
///
/// use checkedref::{CanMakeCheckedPtr, CheckedRef, PtrCounter};
///
/// struct Widget {
///     name: &'static str,
///     counter: PtrCounter,
/// }
///
/// unsafe impl CanMakeCheckedPtr for Widget {
///     fn ptr_counter(&self) -> &PtrCounter {
///         &self.counter
///     }
/// }
///
/// let button = pin!(Widget { name: "button", counter: PtrCounter::new() });
/// let label = pin!(Widget { name: "label", counter: PtrCounter::new() });
/// let (button, label) = (button.as_ref(), label.as_ref());
///
/// let mut parent: CheckedRef<Widget> = CheckedRef::new(button);
/// assert_eq!(parent.name, "button");
///
/// parent.set(label);
/// assert_eq!(parent.name, "label");
/// assert_eq!(button.counter.ptr_count(), 0);
/// assert_eq!(label.counter.ptr_count(), 1);
/// ```
pub struct CheckedRef<T, P = RawPtrTraits>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    slot: P::Storage,
    pub(crate) id: HandleId,
    _marker: PhantomData<*const T>,
}

/// A [`CheckedRef`] stored in 6 unaligned bytes, see [`PackedPtrTraits`].
pub type PackedCheckedRef<T> = CheckedRef<T, PackedPtrTraits>;

impl<T, P> CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    /// Refer to `target`, incrementing its count.
    #[inline]
    #[must_use]
    pub fn new(target: Pin<&T>) -> Self {
        // SAFETY: `target` is pinned and its destructor aborts while this
        // count is outstanding.
        unsafe { Self::from_raw(NonNull::from(target.get_ref())) }
    }

    /// Refer to `ptr`, incrementing its count.
    ///
    /// # Safety
    ///
    /// `ptr` must point at a live `T` that will not move or be deallocated
    /// without running its destructor.
    #[inline]
    #[must_use]
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        let this = Self::from_slot(P::wrap(ptr.as_ptr()));
        T::increment_ptr_count(&this);
        #[cfg(feature = "debug-registry")]
        T::register_checked_ptr(&this, this.id);
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
        T::move_checked_ptr(&this, source, this.id);
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

    /// The address of the referent.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        P::unwrap(self.slot)
    }

    /// The pinned referent.
    #[inline]
    #[must_use]
    pub fn as_pin(&self) -> Pin<&T> {
        // SAFETY: referents are pinned when the first handle is created.
        unsafe { Pin::new_unchecked(&**self) }
    }

    /// The identity of this handle in its referent's registry.
    #[cfg(feature = "debug-registry")]
    #[inline]
    #[must_use]
    pub fn handle_id(&self) -> HandleId {
        self.id
    }

    /// Exchange the referents of two references without touching either
    /// count.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        P::swap(&mut self.slot, &mut other.slot);
        #[cfg(feature = "debug-registry")]
        registry::exchange_registrations(Some(&**self), self.id, Some(&**other), other.id);
    }

    #[inline]
    fn replace_with(&mut self, mut replacement: Self) {
        self.swap(&mut replacement);
        drop(replacement);
    }

    /// Refer to `target` instead, releasing the previous count.
    ///
    /// Rebinding to the current referent leaves its count unchanged.
    #[inline]
    pub fn set(&mut self, target: Pin<&T>) {
        self.replace_with(Self::new(target));
    }

    /// Refer to `ptr` instead, releasing the previous count.
    ///
    /// # Safety
    ///
    /// See [`from_raw`](Self::from_raw).
    #[inline]
    pub unsafe fn set_raw(&mut self, ptr: NonNull<T>) {
        self.replace_with(Self::from_raw(ptr));
    }

    /// Convert into a [`CheckedPtr`] without touching the referent's count.
    #[inline]
    #[must_use]
    pub fn release_ptr(self) -> CheckedPtr<T, P> {
        let this = ManuallyDrop::new(self);
        let target = NonNull::from(&**this);
        debug!("checkedref releasing {:p} into a CheckedPtr", target);
        // SAFETY: `this` is never dropped, so its count is handed over to the
        // returned pointer.
        unsafe { CheckedPtr::adopt(target, this.id) }
    }
}

impl<T, P> Deref for CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: a `CheckedRef` always holds a counted, non-null pointer, and
        // the referent aborts rather than being destroyed while the count is
        // outstanding.
        unsafe { &*P::unwrap(self.slot) }
    }
}

impl<T, P> AsRef<T> for CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T, P> Clone for CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn clone(&self) -> Self {
        let copy = Self::from_slot(self.slot);
        T::increment_ptr_count(&copy);
        #[cfg(feature = "debug-registry")]
        T::copy_checked_ptr(&copy, self.id, copy.id);
        copy
    }

    fn clone_from(&mut self, source: &Self) {
        self.replace_with(source.clone());
    }
}

impl<'a, T, P> From<Pin<&'a T>> for CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn from(target: Pin<&'a T>) -> Self {
        Self::new(target)
    }
}

impl<T, P, Q> PartialEq<CheckedRef<T, Q>> for CheckedRef<T, P>
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

impl<T, P> Eq for CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
}

impl<T, P, Q> PartialEq<CheckedPtr<T, Q>> for CheckedRef<T, P>
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

impl<T, P> PartialEq<*const T> for CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    #[inline]
    fn eq(&self, other: &*const T) -> bool {
        ptr::eq(self.as_ptr(), *other)
    }
}

impl<T, P> Hash for CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ptr().hash(state);
    }
}

impl<T, P> fmt::Debug for CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CheckedRef").field(&self.as_ptr()).finish()
    }
}

impl<T, P> fmt::Pointer for CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}
