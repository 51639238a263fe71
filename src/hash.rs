use core::mem;

#[cfg(feature = "debug-registry")]
pub(crate) type HashMap<K, V> =
    hashbrown::HashMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

/// Sentinel protocol for open-addressing hash tables.
///
/// A table that stores values inline in its buckets needs a value for
/// buckets that were never filled (empty) and one for buckets whose value
/// was removed (deleted, a tombstone). Types stored in such a table describe
/// both here.
pub trait HashTraits: Sized {
    /// The raw form used to probe the table without constructing a value.
    type PeekType;

    /// The value of a never-filled bucket.
    fn empty_value() -> Self;

    /// Whether `value` is the empty value.
    fn is_empty_value(value: &Self) -> bool;

    /// Overwrite `slot` with the deleted sentinel.
    ///
    /// The previous value of `slot` is dropped.
    fn construct_deleted_value(slot: &mut Self);

    /// Whether `value` is the deleted sentinel.
    fn is_deleted_value(value: &Self) -> bool;

    /// Project `value` to its lookup key.
    fn peek(value: &Self) -> Self::PeekType;

    /// Reclaim a bucket: destroy its value, then mark it deleted.
    ///
    /// The value is moved out of the bucket before it is dropped, so the
    /// bucket already holds the empty value if the drop reenters the table.
    ///
    /// # Panics
    ///
    /// Panics if the bucket is already deleted.
    fn custom_delete_bucket(slot: &mut Self) {
        assert!(!Self::is_deleted_value(slot), "bucket is already deleted");
        let doomed = mem::replace(slot, Self::empty_value());
        drop(doomed);
        Self::construct_deleted_value(slot);
    }
}
