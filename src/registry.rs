//! Per-referent bookkeeping of outstanding handles.
//!
//! With the `debug-registry` feature, every handle value has a [`HandleId`]
//! and every [`PtrCounter`] keeps a map from the ids of the handles pointing
//! at it to a record of how each one was created. Without the feature both
//! types are zero-sized and every operation is a no-op.
//!
//! [`PtrCounter`]: crate::PtrCounter

pub use imp::HandleId;
#[cfg(feature = "debug-registry")]
pub use imp::Origin;
pub(crate) use imp::Registry;

#[cfg(feature = "debug-registry")]
mod imp {
    use core::cell::RefCell;
    use core::fmt;
    use core::num::NonZeroU64;
    use core::sync::atomic::{AtomicU64, Ordering};
    use std::backtrace::{Backtrace, BacktraceStatus};

    use crate::hash::HashMap;

    static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

    /// Identity of one handle value.
    ///
    /// Ids are unique for the lifetime of the process. A handle keeps its id
    /// when it is moved and when it is reassigned; copies get a fresh one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct HandleId(NonZeroU64);

    impl HandleId {
        pub(crate) fn next() -> Self {
            let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
            match NonZeroU64::new(id) {
                Some(id) => Self(id),
                // 2^64 handles have been created.
                None => std::process::abort(),
            }
        }

        /// The numeric value of this id.
        #[must_use]
        pub fn get(self) -> u64 {
            self.0.get()
        }
    }

    impl fmt::Display for HandleId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "#{}", self.0)
        }
    }

    /// How a registered handle came to point at its referent.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Origin {
        /// Constructed directly from the referent.
        Constructed,
        /// Cloned from another handle.
        CopiedFrom(HandleId),
        /// Took over the registration of another handle, which no longer
        /// points at this referent.
        MovedFrom(HandleId),
    }

    impl fmt::Display for Origin {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Constructed => f.write_str("constructed"),
                Self::CopiedFrom(source) => write!(f, "copied from {source}"),
                Self::MovedFrom(source) => write!(f, "moved from {source}"),
            }
        }
    }

    struct Registration {
        origin: Origin,
        backtrace: Backtrace,
    }

    impl Registration {
        fn new(origin: Origin) -> Self {
            Self {
                origin,
                backtrace: Backtrace::capture(),
            }
        }
    }

    impl fmt::Debug for Registration {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Registration")
                .field("origin", &self.origin)
                .finish_non_exhaustive()
        }
    }

    #[derive(Default)]
    pub(crate) struct Registry {
        handles: RefCell<HashMap<HandleId, Registration>>,
    }

    impl fmt::Debug for Registry {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Registry")
                .field("handles", &self.handles)
                .finish()
        }
    }

    impl Registry {
        #[inline]
        pub fn register(&self, handle: HandleId) {
            trace!("checkedref registering handle {}", handle);
            let previous = self
                .handles
                .borrow_mut()
                .insert(handle, Registration::new(Origin::Constructed));
            debug_assert!(previous.is_none(), "handle {handle} registered twice");
        }

        #[inline]
        pub fn unregister(&self, handle: HandleId) {
            trace!("checkedref unregistering handle {}", handle);
            let removed = self.handles.borrow_mut().remove(&handle);
            debug_assert!(removed.is_some(), "handle {handle} was not registered");
        }

        #[inline]
        pub fn copy(&self, source: HandleId, destination: HandleId) {
            trace!("checkedref registering handle {} as a copy of {}", destination, source);
            let previous = self
                .handles
                .borrow_mut()
                .insert(destination, Registration::new(Origin::CopiedFrom(source)));
            debug_assert!(previous.is_none(), "handle {destination} registered twice");
        }

        #[inline]
        pub fn transfer(&self, source: HandleId, destination: HandleId) {
            trace!("checkedref moving registration from handle {} to {}", source, destination);
            let mut handles = self.handles.borrow_mut();
            let removed = handles.remove(&source);
            debug_assert!(removed.is_some(), "handle {source} was not registered");
            handles.insert(destination, Registration::new(Origin::MovedFrom(source)));
        }

        pub fn handles(&self) -> Vec<(HandleId, Origin)> {
            let mut handles = self
                .handles
                .borrow()
                .iter()
                .map(|(&id, registration)| (id, registration.origin))
                .collect::<Vec<_>>();
            handles.sort_unstable_by_key(|&(id, _)| id);
            handles
        }

        pub fn report(&self, out: &mut String) {
            use core::fmt::Write as _;

            let handles = self.handles.borrow();
            let mut ids = handles.keys().copied().collect::<Vec<_>>();
            ids.sort_unstable();
            for id in ids {
                let registration = &handles[&id];
                let _ = writeln!(out, "  handle {id} ({})", registration.origin);
                if let BacktraceStatus::Captured = registration.backtrace.status() {
                    let _ = writeln!(out, "{}", registration.backtrace);
                }
            }
        }
    }
}

#[cfg(not(feature = "debug-registry"))]
mod imp {
    /// Identity of one handle value.
    ///
    /// Zero-sized because the `debug-registry` feature is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct HandleId(());

    impl HandleId {
        #[inline(always)]
        pub(crate) fn next() -> Self {
            Self(())
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct Registry;

    impl Registry {
        #[inline(always)]
        pub fn report(&self, _out: &mut String) {}
    }
}

/// After two handles exchanged slots, move each referent's registration onto
/// the handle that now points at it.
///
/// `mine` and `theirs` are the referents the handles point at after the
/// exchange. When both point at the same referent, both ids are already
/// registered there.
#[cfg(feature = "debug-registry")]
pub(crate) fn exchange_registrations<T>(
    mine: Option<&T>,
    mine_id: HandleId,
    theirs: Option<&T>,
    theirs_id: HandleId,
) where
    T: crate::CheckedPtrTarget,
{
    let same = match (mine, theirs) {
        (Some(mine), Some(theirs)) => core::ptr::eq(mine, theirs),
        (None, None) => true,
        _ => false,
    };
    if same {
        return;
    }
    if let Some(target) = mine {
        target.move_checked_ptr(theirs_id, mine_id);
    }
    if let Some(target) = theirs {
        target.move_checked_ptr(mine_id, theirs_id);
    }
}
