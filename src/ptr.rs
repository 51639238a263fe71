use core::fmt;
use core::mem::{self, size_of};
use core::ptr;

/// Storage strategy for the address held by a checked handle.
///
/// A strategy decides how the slot inside [`CheckedPtr`] and [`CheckedRef`]
/// encodes its address and how hash-table sentinels are represented.
///
/// [`CheckedPtr`]: crate::CheckedPtr
/// [`CheckedRef`]: crate::CheckedRef
///
/// # Safety
///
/// Implementors must guarantee that:
///
/// - `unwrap(wrap(p)) == p` for every pointer `p` the strategy accepts, and
///   `unwrap(EMPTY)` is null.
/// - The deleted sentinel is distinguishable from [`EMPTY`](Self::EMPTY) and
///   from the wrapped form of every address a live `T` can occupy.
/// - `exchange` and `swap` never lose or duplicate an address.
///
/// Handles decrement referent counts through `unwrap`, so a strategy that
/// violates these rules can cause handles to dereference arbitrary memory.
pub unsafe trait PtrTraits<T> {
    /// The in-handle representation of an address.
    type Storage: Copy;

    /// The storage value of a null handle.
    const EMPTY: Self::Storage;

    /// Encode an address.
    fn wrap(ptr: *const T) -> Self::Storage;

    /// Decode an address.
    ///
    /// The deleted sentinel decodes to an address that must not be
    /// dereferenced.
    fn unwrap(storage: Self::Storage) -> *const T;

    /// Store `ptr` in `slot` and return the address previously stored there.
    #[inline]
    fn exchange(slot: &mut Self::Storage, ptr: *const T) -> *const T {
        <Self as PtrTraits<T>>::unwrap(mem::replace(slot, <Self as PtrTraits<T>>::wrap(ptr)))
    }

    /// Exchange the contents of two slots.
    #[inline]
    fn swap(a: &mut Self::Storage, b: &mut Self::Storage) {
        mem::swap(a, b);
    }

    /// The storage value used to mark a reclaimed hash-table bucket.
    fn hash_table_deleted_value() -> Self::Storage;

    /// Whether `storage` is the deleted sentinel.
    fn is_hash_table_deleted_value(storage: Self::Storage) -> bool;
}

/// Store addresses as plain `*const T` pointers.
///
/// The deleted sentinel is the address `usize::MAX`, which no object can
/// occupy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RawPtrTraits;

unsafe impl<T> PtrTraits<T> for RawPtrTraits {
    type Storage = *const T;

    const EMPTY: *const T = ptr::null();

    #[inline(always)]
    fn wrap(ptr: *const T) -> *const T {
        ptr
    }

    #[inline(always)]
    fn unwrap(storage: *const T) -> *const T {
        storage
    }

    #[inline]
    fn hash_table_deleted_value() -> *const T {
        usize::MAX as *const T
    }

    #[inline]
    fn is_hash_table_deleted_value(storage: *const T) -> bool {
        storage as usize == usize::MAX
    }
}

/// Store addresses in 6 unaligned bytes.
///
/// Handles using this strategy are 6 bytes wide and 1-aligned, so they pack
/// tightly into structs. Only addresses below 2<sup>48</sup> - 1 can be
/// stored, which covers user-space addresses on current 64-bit platforms and
/// every address on 32-bit platforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PackedPtrTraits;

/// A 48-bit little-endian address, see [`PackedPtrTraits`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PackedAddress([u8; PackedAddress::WIDTH]);

impl PackedAddress {
    const WIDTH: usize = 6;

    /// All ones. Reserved for the deleted sentinel.
    const DELETED: u64 = (1 << 48) - 1;

    /// Pack `address`.
    ///
    /// # Panics
    ///
    /// Panics if `address` does not fit in 48 bits or collides with the
    /// deleted sentinel.
    #[must_use]
    pub fn new(address: usize) -> Self {
        let address = address as u64;
        assert!(
            address < Self::DELETED,
            "address {address:#x} does not fit in a packed pointer"
        );
        Self::from_u64(address)
    }

    #[inline]
    fn from_u64(address: u64) -> Self {
        let bytes = address.to_le_bytes();
        let mut packed = [0; Self::WIDTH];
        packed.copy_from_slice(&bytes[..Self::WIDTH]);
        Self(packed)
    }

    /// The unpacked address.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get(self) -> usize {
        let mut bytes = [0; size_of::<u64>()];
        bytes[..Self::WIDTH].copy_from_slice(&self.0);
        // Every packed address came from a `usize`, so this cannot truncate.
        u64::from_le_bytes(bytes) as usize
    }
}

impl fmt::Debug for PackedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedAddress({:#x})", self.get())
    }
}

unsafe impl<T> PtrTraits<T> for PackedPtrTraits {
    type Storage = PackedAddress;

    const EMPTY: PackedAddress = PackedAddress([0; PackedAddress::WIDTH]);

    #[inline]
    fn wrap(ptr: *const T) -> PackedAddress {
        PackedAddress::new(ptr as usize)
    }

    #[inline]
    fn unwrap(storage: PackedAddress) -> *const T {
        storage.get() as *const T
    }

    #[inline]
    fn hash_table_deleted_value() -> PackedAddress {
        PackedAddress::from_u64(PackedAddress::DELETED)
    }

    #[inline]
    fn is_hash_table_deleted_value(storage: PackedAddress) -> bool {
        storage == PackedAddress::from_u64(PackedAddress::DELETED)
    }
}
