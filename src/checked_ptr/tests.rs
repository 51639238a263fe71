use core::pin::pin;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::{CanMakeCheckedPtr, CheckedPtr, CheckedRef, HashTraits, PackedCheckedPtr, PtrCounter};

struct Node {
    value: u32,
    counter: PtrCounter,
}

impl Node {
    fn new(value: u32) -> Self {
        Self {
            value,
            counter: PtrCounter::new(),
        }
    }

    fn count(&self) -> usize {
        self.counter.ptr_count()
    }
}

unsafe impl CanMakeCheckedPtr for Node {
    fn ptr_counter(&self) -> &PtrCounter {
        &self.counter
    }
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn null_pointer_has_no_referent() {
    let ptr = CheckedPtr::<Node>::null();
    assert!(ptr.is_null());
    assert!(!ptr.is_hash_table_deleted_value());
    assert!(ptr.get().is_none());
    assert!(ptr.as_pin().is_none());
    assert_eq!(ptr, CheckedPtr::<Node>::default());
}

#[test]
fn construct_clone_drop_balance() {
    let node = pin!(Node::new(1));
    let node = node.as_ref();
    {
        let a = CheckedPtr::<Node>::new(node);
        assert_eq!(node.count(), 1);
        let b = a.clone();
        assert_eq!(node.count(), 2);
        assert_eq!(b.get().map(|node| node.value), Some(1));
        drop(a);
        assert_eq!(node.count(), 1);
    }
    assert_eq!(node.count(), 0);
}

#[test]
fn take_moves_count_with_value() {
    let node = pin!(Node::new(2));
    let node = node.as_ref();
    let mut source = CheckedPtr::<Node>::new(node);
    let taken = source.take();
    assert!(source.is_null());
    assert_eq!(taken, node.get_ref() as *const Node);
    assert_eq!(node.count(), 1);

    let mut destination = CheckedPtr::<Node>::null();
    let mut taken = taken;
    destination.take_from(&mut taken);
    assert!(taken.is_null());
    assert_eq!(node.count(), 1);
}

#[test]
fn set_moves_count_between_referents() {
    let a = pin!(Node::new(1));
    let b = pin!(Node::new(2));
    let (a, b) = (a.as_ref(), b.as_ref());
    let mut ptr = CheckedPtr::<Node>::new(a);
    ptr.set(b);
    assert_eq!(a.count(), 0);
    assert_eq!(b.count(), 1);
    ptr.set_null();
    assert_eq!(b.count(), 0);
    assert!(ptr.is_null());
}

#[test]
fn self_assignment_keeps_count() {
    let node = pin!(Node::new(3));
    let node = node.as_ref();
    let mut ptr = CheckedPtr::<Node>::new(node);

    // SAFETY: the address is the pinned referent `ptr` already points at.
    unsafe { ptr.set_raw(ptr.as_ptr()) };
    assert_eq!(node.count(), 1);

    ptr.set(node);
    assert_eq!(node.count(), 1);

    let alias = ptr.clone();
    ptr.assign(&alias);
    ptr.clone_from(&alias);
    assert_eq!(node.count(), 2);
    assert_eq!(ptr, alias);
}

#[test]
fn swap_leaves_counts_unchanged() {
    let a = pin!(Node::new(1));
    let b = pin!(Node::new(2));
    let (a, b) = (a.as_ref(), b.as_ref());
    let mut first = CheckedPtr::<Node>::new(a);
    let mut second = CheckedPtr::<Node>::new(b);
    first.swap(&mut second);
    assert_eq!(first.get().map(|node| node.value), Some(2));
    assert_eq!(second.get().map(|node| node.value), Some(1));
    assert_eq!(a.count(), 1);
    assert_eq!(b.count(), 1);

    let mut empty = CheckedPtr::<Node>::null();
    empty.swap(&mut first);
    assert!(first.is_null());
    assert_eq!(b.count(), 1);
}

#[test]
fn release_non_null_transfers_count_once() {
    let node = pin!(Node::new(4));
    let node = node.as_ref();
    let mut ptr = CheckedPtr::<Node>::new(node);
    let reference = ptr.release_non_null();
    assert!(ptr.is_null());
    assert_eq!(node.count(), 1);
    assert_eq!(reference.value, 4);
    assert_eq!(ptr, CheckedPtr::<Node>::null());
    drop(reference);
    assert_eq!(node.count(), 0);
}

#[test]
#[should_panic(expected = "release_non_null called on a null CheckedPtr")]
fn release_non_null_of_null_panics() {
    let mut ptr = CheckedPtr::<Node>::null();
    let _ = ptr.release_non_null();
}

#[test]
fn copy_from_reference() {
    let node = pin!(Node::new(5));
    let node = node.as_ref();
    let reference = CheckedRef::<Node>::new(node);
    let ptr: CheckedPtr<Node> = CheckedPtr::from(&reference);
    assert_eq!(node.count(), 2);
    assert_eq!(ptr, reference);
    assert_eq!(reference, ptr);

    let moved: CheckedPtr<Node> = CheckedPtr::from(reference);
    assert_eq!(node.count(), 2);
    assert_eq!(moved, ptr);
}

#[test]
fn from_optional_pin() {
    let node = pin!(Node::new(6));
    let node = node.as_ref();
    let some = CheckedPtr::<Node>::from(Some(node));
    let none = CheckedPtr::<Node>::from(None);
    assert_eq!(node.count(), 1);
    assert!(!some.is_null());
    assert!(none.is_null());
}

#[test]
fn deleted_value_never_touches_counts() {
    let node = pin!(Node::new(7));
    let node = node.as_ref();
    let deleted = CheckedPtr::<Node>::hash_table_deleted_value();
    assert!(deleted.is_hash_table_deleted_value());
    assert!(!deleted.is_null());
    assert!(deleted.get().is_none());

    let copy = deleted.clone();
    assert!(copy.is_hash_table_deleted_value());
    assert_eq!(copy, deleted);
    assert_ne!(copy, CheckedPtr::<Node>::new(node));
    assert_eq!(node.count(), 0);
    assert_eq!(format!("{deleted:?}"), "CheckedPtr(<deleted>)");
}

#[test]
fn equality_and_hash_follow_address() {
    let a = pin!(Node::new(1));
    let b = pin!(Node::new(1));
    let (a, b) = (a.as_ref(), b.as_ref());
    let first = CheckedPtr::<Node>::new(a);
    let second = CheckedPtr::<Node>::new(a);
    let other = CheckedPtr::<Node>::new(b);
    assert_eq!(first, second);
    assert_eq!(hash_of(&first), hash_of(&second));
    assert_ne!(first, other);

    let packed = PackedCheckedPtr::<Node>::new(a);
    assert_eq!(first, packed);
    assert_eq!(packed, first);
    assert_eq!(format!("{first:p}"), format!("{packed:p}"));
}

#[test]
fn custom_delete_bucket_releases_once() {
    let node = pin!(Node::new(8));
    let node = node.as_ref();
    let mut bucket = CheckedPtr::<Node>::new(node);
    let _other = CheckedPtr::<Node>::new(node);
    assert_eq!(node.count(), 2);

    <CheckedPtr<Node> as HashTraits>::custom_delete_bucket(&mut bucket);
    assert!(<CheckedPtr<Node> as HashTraits>::is_deleted_value(&bucket));
    assert_eq!(node.count(), 1);
}

#[test]
#[should_panic(expected = "bucket is already deleted")]
fn custom_delete_bucket_rejects_deleted_bucket() {
    let mut bucket = CheckedPtr::<Node>::hash_table_deleted_value();
    <CheckedPtr<Node> as HashTraits>::custom_delete_bucket(&mut bucket);
}

#[test]
fn hash_traits_sentinels() {
    let node = pin!(Node::new(9));
    let node = node.as_ref();
    let empty = <CheckedPtr<Node> as HashTraits>::empty_value();
    assert!(<CheckedPtr<Node> as HashTraits>::is_empty_value(&empty));
    assert!(<CheckedPtr<Node> as HashTraits>::peek(&empty).is_null());

    let bound = CheckedPtr::<Node>::new(node);
    assert!(!<CheckedPtr<Node> as HashTraits>::is_empty_value(&bound));
    assert_eq!(
        <CheckedPtr<Node> as HashTraits>::peek(&bound),
        node.get_ref() as *const Node
    );
}

#[test]
#[cfg(not(feature = "debug-registry"))]
fn sizeof_pointer() {
    use core::mem::size_of;

    assert_eq!(size_of::<CheckedPtr<Node>>(), size_of::<usize>());
    assert_eq!(size_of::<PackedCheckedPtr<Node>>(), 6);
}

#[cfg(feature = "debug-registry")]
mod registry {
    use core::pin::pin;

    use super::Node;
    use crate::{CheckedPtr, Origin};

    #[test]
    fn clone_is_registered_as_copy() {
        let node = pin!(Node::new(1));
        let node = node.as_ref();
        let a = CheckedPtr::<Node>::new(node);
        let b = a.clone();
        assert_eq!(
            node.counter.registered_handles(),
            vec![
                (a.handle_id(), Origin::Constructed),
                (b.handle_id(), Origin::CopiedFrom(a.handle_id())),
            ]
        );
    }

    #[test]
    fn swap_rekeys_registrations() {
        let x = pin!(Node::new(1));
        let y = pin!(Node::new(2));
        let (x, y) = (x.as_ref(), y.as_ref());
        let mut a = CheckedPtr::<Node>::new(x);
        let mut b = CheckedPtr::<Node>::new(y);
        a.swap(&mut b);
        assert_eq!(
            x.counter.registered_handles(),
            vec![(b.handle_id(), Origin::MovedFrom(a.handle_id()))]
        );
        assert_eq!(
            y.counter.registered_handles(),
            vec![(a.handle_id(), Origin::MovedFrom(b.handle_id()))]
        );
    }

    #[test]
    fn release_rekeys_registration() {
        let node = pin!(Node::new(1));
        let node = node.as_ref();
        let mut ptr = CheckedPtr::<Node>::new(node);
        let reference = ptr.release_non_null();
        assert_eq!(
            node.counter.registered_handles(),
            vec![(reference.handle_id(), Origin::MovedFrom(ptr.handle_id()))]
        );
        drop(reference);
        assert!(node.counter.registered_handles().is_empty());
    }
}
