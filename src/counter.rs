use core::cell::Cell;
use core::fmt;
use core::marker::{PhantomData, PhantomPinned};
use std::process::abort;

use crate::registry::{HandleId, Registry};

/// An object that can be pointed at by [`CheckedPtr`] and [`CheckedRef`].
///
/// Every handle calls [`increment_ptr_count`] once when it starts pointing at
/// the referent and [`decrement_ptr_count`] once when it stops. The referent
/// checks, when it is destroyed, that the two have balanced out.
///
/// The four registry hooks are only called when the `debug-registry` feature
/// is enabled. They let the referent track exactly which handles point at it.
/// Their default implementations do nothing.
///
/// Most types should not implement this trait directly. Embed a
/// [`PtrCounter`] and implement [`CanMakeCheckedPtr`] instead.
///
/// [`CheckedPtr`]: crate::CheckedPtr
/// [`CheckedRef`]: crate::CheckedRef
/// [`increment_ptr_count`]: Self::increment_ptr_count
/// [`decrement_ptr_count`]: Self::decrement_ptr_count
///
/// # Safety
///
/// Handles dereference their referent without any check, so implementors must
/// guarantee that a referent is never invalidated while it is counted:
///
/// - The destructor must terminate the process, without unwinding, if the
///   count is nonzero.
/// - The type must be `!Unpin`, so a pinned referent cannot be moved out from
///   under its handles.
/// - The type must not give out `&mut Self`, or `&mut` to any of its fields,
///   from a pinned referent. Mutation goes through interior mutability.
/// - The count must not be updated from two threads at once. A type with an
///   unsynchronized count must be `!Send` and `!Sync`.
pub unsafe trait CheckedPtrTarget {
    /// Record that one more handle points at `self`.
    fn increment_ptr_count(&self);

    /// Record that one handle no longer points at `self`.
    ///
    /// # Safety
    ///
    /// The caller must be releasing a count it acquired with
    /// [`increment_ptr_count`](Self::increment_ptr_count). Releasing a count
    /// twice lets the referent be destroyed while a handle still points at it.
    unsafe fn decrement_ptr_count(&self);

    /// A handle with identity `handle` started pointing at `self`.
    #[inline]
    fn register_checked_ptr(&self, handle: HandleId) {
        let _ = handle;
    }

    /// The handle with identity `handle` stopped pointing at `self`.
    #[inline]
    fn unregister_checked_ptr(&self, handle: HandleId) {
        let _ = handle;
    }

    /// `destination` was cloned from `source` and also points at `self`.
    #[inline]
    fn copy_checked_ptr(&self, source: HandleId, destination: HandleId) {
        let _ = (source, destination);
    }

    /// `destination` took over the pointer to `self` held by `source`, which
    /// no longer points here.
    #[inline]
    fn move_checked_ptr(&self, source: HandleId, destination: HandleId) {
        let _ = (source, destination);
    }
}

/// Opt in to [`CheckedPtrTarget`] by delegating to an embedded
/// [`PtrCounter`].
///
/// ```
/// use checkedref::{CanMakeCheckedPtr, PtrCounter};
///
/// struct Node {
///     value: i32,
///     counter: PtrCounter,
/// }
///
/// unsafe impl CanMakeCheckedPtr for Node {
///     fn ptr_counter(&self) -> &PtrCounter {
///         &self.counter
///     }
/// }
/// ```
///
/// # Safety
///
/// `ptr_counter` must always return the same counter, embedded by value in
/// `self`, and the type must uphold the aliasing requirements of
/// [`CheckedPtrTarget`]. Embedding the counter makes the type `!Unpin`,
/// `!Send` and `!Sync`, and gives it the destruction check.
pub unsafe trait CanMakeCheckedPtr {
    /// The counter embedded in `self`.
    fn ptr_counter(&self) -> &PtrCounter;
}

unsafe impl<T> CheckedPtrTarget for T
where
    T: CanMakeCheckedPtr + ?Sized,
{
    #[inline(always)]
    fn increment_ptr_count(&self) {
        self.ptr_counter().increment();
    }

    #[inline(always)]
    unsafe fn decrement_ptr_count(&self) {
        self.ptr_counter().decrement();
    }

    #[cfg(feature = "debug-registry")]
    fn register_checked_ptr(&self, handle: HandleId) {
        self.ptr_counter().registry.register(handle);
    }

    #[cfg(feature = "debug-registry")]
    fn unregister_checked_ptr(&self, handle: HandleId) {
        self.ptr_counter().registry.unregister(handle);
    }

    #[cfg(feature = "debug-registry")]
    fn copy_checked_ptr(&self, source: HandleId, destination: HandleId) {
        self.ptr_counter().registry.copy(source, destination);
    }

    #[cfg(feature = "debug-registry")]
    fn move_checked_ptr(&self, source: HandleId, destination: HandleId) {
        self.ptr_counter().registry.transfer(source, destination);
    }
}

/// Live-handle counter embedded in a referent.
///
/// Dropping a `PtrCounter` whose count is nonzero aborts the process after
/// logging a report of the outstanding handles.
///
/// Fields are dropped in declaration order, so declare the counter after any
/// fields that hold handles to the referent itself.
///
/// The count is not atomic. `PtrCounter` is neither `Send` nor `Sync`, and
/// neither is any referent that embeds it:
///
/// ```compile_fail
/// use checkedref::PtrCounter;
///
/// fn assert_send<T: Send>() {}
/// assert_send::<PtrCounter>();
/// ```
///
/// ```compile_fail
/// use checkedref::PtrCounter;
///
/// fn assert_sync<T: Sync>() {}
/// assert_sync::<PtrCounter>();
/// ```
///
/// ```compile_fail
/// use std::thread;
///
/// use checkedref::{CanMakeCheckedPtr, CheckedPtr, PtrCounter};
///
/// struct Node {
///     counter: PtrCounter,
/// }
///
/// unsafe impl CanMakeCheckedPtr for Node {
///     fn ptr_counter(&self) -> &PtrCounter {
///         &self.counter
///     }
/// }
///
/// let node = Box::pin(Node { counter: PtrCounter::new() });
/// let ptr: CheckedPtr<Node> = CheckedPtr::new(node.as_ref());
/// thread::spawn(move || drop(node));
/// drop(ptr);
/// ```
pub struct PtrCounter {
    count: Cell<usize>,
    pub(crate) registry: Registry,
    _pinned: PhantomPinned,
    _not_thread_safe: PhantomData<*const ()>,
}

impl PtrCounter {
    /// A counter with no outstanding handles.
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: Cell::new(0),
            registry: Registry::default(),
            _pinned: PhantomPinned,
            _not_thread_safe: PhantomData,
        }
    }

    /// The number of handles currently pointing at the owning referent.
    #[inline]
    #[must_use]
    pub fn ptr_count(&self) -> usize {
        self.count.get()
    }

    /// Aborts on overflow.
    #[inline]
    pub(crate) fn increment(&self) {
        let count = self.count.get();
        // A wrapped count would let the referent be destroyed with
        // handles outstanding.
        if count == usize::MAX {
            abort();
        }
        self.count.set(count + 1);
    }

    #[inline]
    pub(crate) fn decrement(&self) {
        let count = self.count.get();
        debug_assert!(count > 0, "checked pointer count underflow");
        self.count.set(count.saturating_sub(1));
    }

    /// The handles currently registered with this counter, ordered by id.
    #[cfg(feature = "debug-registry")]
    #[must_use]
    pub fn registered_handles(&self) -> Vec<(HandleId, crate::Origin)> {
        self.registry.handles()
    }
}

impl Default for PtrCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PtrCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtrCounter")
            .field("count", &self.count.get())
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::PtrCounter;

    #[test]
    fn counts_balance() {
        let counter = PtrCounter::new();
        counter.increment();
        counter.increment();
        assert_eq!(counter.ptr_count(), 2);
        counter.decrement();
        counter.decrement();
        assert_eq!(counter.ptr_count(), 0);
    }

    #[test]
    #[cfg(not(feature = "debug-registry"))]
    fn sizeof_counter() {
        use core::mem::size_of;

        assert_eq!(size_of::<PtrCounter>(), size_of::<usize>());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "checked pointer count underflow")]
    fn underflow_is_caught_in_debug_builds() {
        let counter = PtrCounter::new();
        counter.decrement();
    }
}
