use core::fmt::Write as _;
use std::process::abort;

use log::Level;

use crate::counter::{CheckedPtrTarget, PtrCounter};
use crate::ptr::PtrTraits;
use crate::registry::Registry;
use crate::{CheckedPtr, CheckedRef};

impl<T, P> Drop for CheckedPtr<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    /// Drops the [`CheckedPtr`].
    ///
    /// A pointer that is null or holds the hash-table deleted sentinel does
    /// nothing. Otherwise this unregisters the handle and decrements the
    /// referent's count.
    fn drop(&mut self) {
        if let Some(target) = self.target() {
            #[cfg(feature = "debug-registry")]
            target.unregister_checked_ptr(self.id);
            // SAFETY: a bound pointer owns exactly one count on its referent
            // and this is the only place it is released.
            unsafe {
                target.decrement_ptr_count();
            }
        }
    }
}

impl<T, P> Drop for CheckedRef<T, P>
where
    T: CheckedPtrTarget,
    P: PtrTraits<T>,
{
    /// Drops the [`CheckedRef`], unregistering the handle and decrementing
    /// the referent's count.
    fn drop(&mut self) {
        let target: &T = self;
        #[cfg(feature = "debug-registry")]
        target.unregister_checked_ptr(self.id);
        // SAFETY: a reference owns exactly one count on its referent, and
        // `release_ptr` forgets the reference instead of dropping it.
        unsafe {
            target.decrement_ptr_count();
        }
    }
}

impl Drop for PtrCounter {
    /// Verify that no handle still points at the owning referent.
    ///
    /// If any does, the process aborts. Unwinding is not an option: the
    /// outstanding handles would be dropped against freed memory.
    fn drop(&mut self) {
        let count = self.ptr_count();
        if count == 0 {
            return;
        }
        lifetime_violation(count, &self.registry);
    }
}

#[cold]
#[inline(never)]
fn lifetime_violation(count: usize, registry: &Registry) -> ! {
    let mut report = String::new();
    let _ = writeln!(
        report,
        "checkedref lifetime violation: referent destroyed with {count} outstanding checked pointer{}",
        if count == 1 { "" } else { "s" }
    );
    registry.report(&mut report);
    if log_enabled!(Level::Error) {
        error!("{}", report.trim_end());
    } else {
        // Nothing would record the report before the process dies.
        eprintln!("{}", report.trim_end());
    }
    abort();
}
