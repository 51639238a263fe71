#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::option_if_let_else)]
#![allow(unknown_lints)]
#![warn(missing_copy_implementations)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(unused_qualifications)]
#![warn(variant_size_differences)]

//! Runtime-checked, non-owning pointers.
//!
//! [`CheckedPtr<T>`] and [`CheckedRef<T>`] point at an object without
//! controlling its lifetime. Instead, every handle is counted by its
//! referent, and the referent verifies in its destructor that no handles are
//! still outstanding. If any are, the process aborts with a diagnostic.
//!
//! [`CheckedPtr<T>`]: crate::CheckedPtr
//! [`CheckedRef<T>`]: crate::CheckedRef
//!
//! This is a much cheaper contract than a weak reference: a handle never
//! observes its referent disappearing. A referent that dies while it is still
//! pointed to is a programming error, and it is surfaced at the moment of
//! destruction rather than later as a use after free.
//!
//! Prefer ordinary borrows, [`std::rc::Rc`] or [`std::rc::Weak`] when they can
//! express the shape of your data. Checked pointers are for the shapes the
//! borrow checker cannot express, such as intrusive back references into an
//! object graph owned by some container.
//!
//! # Referents
//!
//! A type opts in to being pointed at by embedding a [`PtrCounter`] and
//! implementing [`CanMakeCheckedPtr`]:
//!
//! ```
//! use std::pin::pin;
//!
//! use checkedref::{CanMakeCheckedPtr, CheckedPtr, CheckedRef, PtrCounter};
//!
//! struct Document {
//!     title: String,
//!     counter: PtrCounter,
//! }
//!
//! unsafe impl CanMakeCheckedPtr for Document {
//!     fn ptr_counter(&self) -> &PtrCounter {
//!         &self.counter
//!     }
//! }
//!
//! let document = pin!(Document {
//!     title: String::from("README"),
//!     counter: PtrCounter::new(),
//! });
//! let document = document.as_ref();
//!
//! let first: CheckedRef<Document> = CheckedRef::new(document);
//! let mut second: CheckedPtr<Document> = CheckedPtr::from(&first);
//! assert_eq!(document.counter.ptr_count(), 2);
//! assert_eq!(second.get().map(|doc| doc.title.as_str()), Some("README"));
//!
//! second.set_null();
//! drop(first);
//! assert_eq!(document.counter.ptr_count(), 0);
//! ```
//!
//! Handles are created from a [`Pin<&T>`](core::pin::Pin) so the referent
//! cannot move while it is being pointed at. [`PtrCounter`] is `!Unpin`, so
//! any type that embeds one is as well.
//!
//! # Lifetime violations
//!
//! Destroying a referent with a nonzero count aborts the process. It does not
//! panic: unwinding would run the destructors of the outstanding handles
//! against the freed referent.
//!
//! # Storage strategies
//!
//! The handles are generic over a [`PtrTraits`] strategy that decides how the
//! address is stored. [`RawPtrTraits`] stores a plain pointer and is the
//! default. [`PackedPtrTraits`] stores a 48-bit address in 6 unaligned bytes,
//! see [`PackedCheckedPtr`].
//!
//! # Debug registry
//!
//! With the `debug-registry` cargo feature enabled, every handle carries a
//! [`HandleId`] and every referent keeps a registry of the handles pointing at
//! it. When a lifetime violation is detected, the report lists each
//! outstanding handle, how it came to exist, and a backtrace of where it was
//! registered (captured when `RUST_BACKTRACE` is set).
//!
//! Without the feature the registry hooks are never called and [`HandleId`]
//! is zero-sized.
//!
//! # Hash tables
//!
//! [`CheckedPtr`] implements [`Hash`](core::hash::Hash) and [`Eq`] by
//! address and can be used as a key in `std` and `hashbrown` collections. For
//! open-addressing tables that manage their own tombstones, [`HashTraits`]
//! exposes the empty and deleted sentinels.
//!
//! Like [`std::rc`], neither the handles nor the referents that embed a
//! [`PtrCounter`] are `Send` or `Sync`.

#![doc(html_root_url = "https://docs.rs/checkedref/0.1.0")]

// Ensure code blocks in README.md compile
#[cfg(doctest)]
#[doc = include_str!("../README.md")]
mod readme {}

#[macro_use]
extern crate log;

mod checked_ptr;
mod checked_ref;
mod counter;
mod drop;
mod hash;
mod ptr;
mod registry;

// Doc modules
#[cfg(any(doctest, docsrs))]
#[path = "doc/intrusive_back_references.rs"]
/// Examples of modelling back references with checked pointers.
pub mod intrusive_back_references;

pub use checked_ptr::{CheckedPtr, PackedCheckedPtr};
pub use checked_ref::{CheckedRef, PackedCheckedRef};
pub use counter::{CanMakeCheckedPtr, CheckedPtrTarget, PtrCounter};
pub use hash::HashTraits;
pub use ptr::{PackedAddress, PackedPtrTraits, PtrTraits, RawPtrTraits};
pub use registry::HandleId;
#[cfg(feature = "debug-registry")]
pub use registry::Origin;
