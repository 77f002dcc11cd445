//! Compile-time policies plugged into the owning wrappers.
//!
//! A wrapper is instantiated with its policies as type parameters and never switches them at
//! runtime: a [`HandlePolicy`] (or a [`Storage`] for pointers) says how a resource is disposed of
//! and what its null sentinel is, a [`Checking`] policy says whether access to the sentinel
//! faults, and a [`RefCountPolicy`] says how an externally counted resource is shared.

use base::cell::Cell;
#[cfg(feature = "pointer")]
use base::ptr;

#[cfg(feature = "pointer")]
use base::prelude::v1::*;

use crate::error::null_access;

/// Describes an opaque resource type: its null sentinel and how to dispose of it.
///
/// # Examples
///
/// ```
/// use owned_handles::{HandlePolicy, ScopedHandle};
///
/// struct Slot;
///
/// impl HandlePolicy for Slot {
///     type Handle = u32;
///
///     fn null_handle() -> u32 {
///         u32::MAX
///     }
///
///     fn dispose(_slot: u32) {}
/// }
///
/// let slot: ScopedHandle<Slot> = ScopedHandle::new(7);
/// assert_eq!(slot.get(), 7);
/// ```
pub trait HandlePolicy {
    /// The raw resource. Identity is value equality.
    type Handle: Copy + PartialEq;

    /// The reserved value meaning "no resource".
    fn null_handle() -> Self::Handle;

    /// Disposes of `handle`.
    ///
    /// Exclusive owners call this on the null sentinel as well, so implementations must treat
    /// it as a no-op. Shared owners never pass the sentinel. Disposal must not panic: failures
    /// of the underlying release call are swallowed.
    fn dispose(handle: Self::Handle);
}

/// Decides whether accessing an owner that holds the null sentinel faults.
pub trait Checking {
    /// Runs before every checked access. `is_null` tells whether the owner holds the sentinel.
    fn check(is_null: bool);
}

/// Panics on access to the null sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssertCheck;

impl Checking for AssertCheck {
    #[inline]
    #[track_caller]
    fn check(is_null: bool) {
        if is_null {
            null_access()
        }
    }
}

/// Performs no check at all; the access compiles down to a plain read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoChecking;

impl Checking for NoChecking {
    #[inline(always)]
    fn check(_is_null: bool) {}
}

/// A [`Checking`] policy that never returns from `check(true)`.
///
/// Pointer owners only hand out references (`Deref`) under such a policy.
///
/// # Safety
///
/// `check(true)` must diverge.
pub unsafe trait DerefCheck: Checking {}

unsafe impl DerefCheck for AssertCheck {}

/// Disposal policy for pointer-shaped owners.
#[cfg(feature = "pointer")]
pub trait Storage<T: ?Sized> {
    /// Whether the pointee is a contiguous run of items rather than a single item.
    const IS_SEQUENCE: bool;

    /// The null pointer for `T`.
    fn null() -> *mut T;

    /// Disposes of the pointee.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer this storage is able to reclaim, and must not be used
    /// afterwards.
    unsafe fn dispose(ptr: *mut T);
}

/// A [`Storage`] whose `dispose` reclaims pointers produced by `Box::into_raw`.
///
/// # Safety
///
/// Passing the result of `Box::into_raw` to `dispose` must be sound.
#[cfg(feature = "pointer")]
pub unsafe trait BoxedStorage<T: ?Sized>: Storage<T> {}

/// Disposes of a single boxed item.
#[cfg(feature = "pointer")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultStorage;

#[cfg(feature = "pointer")]
impl<T> Storage<T> for DefaultStorage {
    const IS_SEQUENCE: bool = false;

    #[inline]
    fn null() -> *mut T {
        ptr::null_mut()
    }

    unsafe fn dispose(ptr: *mut T) {
        if !ptr.is_null() {
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

#[cfg(feature = "pointer")]
unsafe impl<T> BoxedStorage<T> for DefaultStorage {}

/// Disposes of a boxed slice.
#[cfg(feature = "pointer")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayStorage;

#[cfg(feature = "pointer")]
impl<T> Storage<[T]> for ArrayStorage {
    const IS_SEQUENCE: bool = true;

    #[inline]
    fn null() -> *mut [T] {
        ptr::slice_from_raw_parts_mut(ptr::null_mut(), 0)
    }

    unsafe fn dispose(ptr: *mut [T]) {
        if !ptr.is_null() {
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

#[cfg(feature = "pointer")]
unsafe impl<T> BoxedStorage<[T]> for ArrayStorage {}

/// How an externally counted resource records its owners.
pub trait RefCountPolicy<T: ?Sized> {
    /// Records one more owner. Does nothing for null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live `T`.
    unsafe fn add_ref(ptr: *const T);

    /// Drops one owner and returns `true` if none remain. Returns `false` for null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live `T` holding at least one reference.
    unsafe fn dec_ref(ptr: *const T) -> bool;
}

/// A resource that carries its own owner counter.
pub trait RefCounted {
    /// Records one more owner.
    fn add_ref(&self);

    /// Drops one owner and returns `true` if that was the last one.
    fn dec_ref(&self) -> bool;
}

/// Counts through the pointee's own [`RefCounted`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntrusiveRefCount;

impl<T: ?Sized + RefCounted> RefCountPolicy<T> for IntrusiveRefCount {
    #[inline]
    unsafe fn add_ref(ptr: *const T) {
        if let Some(obj) = unsafe { ptr.as_ref() } {
            obj.add_ref();
        }
    }

    #[inline]
    unsafe fn dec_ref(ptr: *const T) -> bool {
        match unsafe { ptr.as_ref() } {
            Some(obj) => obj.dec_ref(),
            None => false,
        }
    }
}

/// A non-atomic owner counter a resource can embed to implement [`RefCounted`].
///
/// The counter starts at one: the reference held by whoever created the resource.
///
/// # Examples
///
/// ```
/// use owned_handles::{RefCount, RefCounted};
///
/// let count = RefCount::new();
/// count.add_ref();
/// assert_eq!(count.get(), 2);
/// assert!(!count.dec_ref());
/// assert!(count.dec_ref());
/// ```
#[derive(Debug)]
pub struct RefCount {
    strong: Cell<usize>,
}

impl RefCount {
    /// A counter recording the creating reference.
    pub const fn new() -> Self {
        RefCount { strong: Cell::new(1) }
    }

    /// The number of recorded owners.
    #[inline]
    pub fn get(&self) -> usize {
        self.strong.get()
    }
}

impl Default for RefCount {
    fn default() -> Self {
        RefCount::new()
    }
}

impl RefCounted for RefCount {
    #[inline]
    fn add_ref(&self) {
        let strong = self.get();

        // Sharing a dead resource or overflowing the counter aborts instead of wrapping.
        if strong == 0 || strong == usize::MAX {
            panic!("reference count out of range: {}", strong);
        }
        self.strong.set(strong + 1);
    }

    #[inline]
    fn dec_ref(&self) -> bool {
        let strong = self.get();
        debug_assert!(strong > 0, "released a resource with no owners");
        self.strong.set(strong - 1);
        strong == 1
    }
}
