use base::fmt;
use base::marker::PhantomData;
use base::mem;
use base::ptr;
use base::ops::{Deref, DerefMut, Index, IndexMut};

use base::prelude::v1::*;

use crate::error::AccessError;
use crate::policy::{
    ArrayStorage, AssertCheck, BoxedStorage, Checking, DefaultStorage, DerefCheck, Storage,
};

/// The sole owner of a heap object, disposed of through the storage policy `S`.
///
/// Unlike `Box`, the owner may be empty, exposes its raw pointer, and can be reset or released
/// at any time. Dereferencing is only available under a checking policy that faults on null.
///
/// # Examples
///
/// ```
/// use owned_handles::ScopedPointer;
///
/// let mut answer: ScopedPointer<u32> = ScopedPointer::new(41);
/// *answer += 1;
/// assert_eq!(*answer, 42);
///
/// answer.clear();
/// assert!(answer.is_null());
/// ```
pub struct ScopedPointer<T: ?Sized, S: Storage<T> = DefaultStorage, C: Checking = AssertCheck> {
    ptr: *mut T,
    phantom: PhantomData<(Box<T>, S, C)>,
}

/// A [`ScopedPointer`] owning a boxed slice.
pub type ScopedArray<T, C = AssertCheck> = ScopedPointer<[T], ArrayStorage, C>;

impl<T: ?Sized, S: Storage<T>, C: Checking> ScopedPointer<T, S, C> {
    /// An owner of nothing.
    #[inline]
    pub fn null() -> Self {
        ScopedPointer { ptr: S::null(), phantom: PhantomData }
    }

    /// Takes ownership of `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or valid, unaliased, and reclaimable by `S::dispose`.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        ScopedPointer { ptr, phantom: PhantomData }
    }

    /// Takes ownership of a boxed value.
    pub fn from_box(boxed: Box<T>) -> Self
    where
        S: BoxedStorage<T>,
    {
        // Safety: `S` reclaims pointers produced by `Box::into_raw`.
        unsafe { Self::from_raw(Box::into_raw(boxed)) }
    }

    /// Whether the pointee is a run of items rather than a single one.
    #[inline]
    pub const fn is_sequence() -> bool {
        S::IS_SEQUENCE
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.is_null()
    }

    /// Returns the raw pointer without giving up ownership, after running the checking policy.
    #[inline]
    #[track_caller]
    pub fn get(&self) -> *mut T {
        C::check(self.is_null());
        self.ptr
    }

    /// Returns the raw pointer, or [`AccessError::Null`] if nothing is owned.
    pub fn try_get(&self) -> Result<*mut T, AccessError> {
        if self.is_null() {
            Err(AccessError::Null)
        } else {
            Ok(self.ptr)
        }
    }

    /// Borrows the pointee without checking for null.
    ///
    /// # Safety
    ///
    /// The owner must not be null.
    #[inline]
    pub unsafe fn as_ref_unchecked(&self) -> &T {
        unsafe { &*self.ptr }
    }

    /// Mutably borrows the pointee without checking for null.
    ///
    /// # Safety
    ///
    /// The owner must not be null.
    #[inline]
    pub unsafe fn as_mut_unchecked(&mut self) -> &mut T {
        unsafe { &mut *self.ptr }
    }

    /// Gives up ownership without disposing; the caller becomes responsible for the pointee.
    #[inline]
    pub fn release(&mut self) -> *mut T {
        mem::replace(&mut self.ptr, S::null())
    }

    /// Disposes of the current pointee and takes ownership of `ptr`.
    ///
    /// Resetting to the pointer already owned does nothing.
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw`](Self::from_raw).
    pub unsafe fn reset(&mut self, ptr: *mut T) {
        // Identity is the address; slice lengths are not compared.
        if !ptr::addr_eq(self.ptr, ptr) {
            let old = mem::replace(&mut self.ptr, ptr);
            unsafe { S::dispose(old) };
        }
    }

    /// Disposes of the current pointee, if any.
    pub fn clear(&mut self) {
        // Safety: the null pointer is always acceptable.
        unsafe { self.reset(S::null()) }
    }

    /// Moves ownership out into a new owner, leaving this one empty.
    #[inline]
    pub fn take(&mut self) -> Self {
        // Safety: the pointer comes from an owner with the same storage policy.
        unsafe { Self::from_raw(self.release()) }
    }

    /// Exchanges the owned pointers. Nothing is disposed of.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr)
    }

    /// Disposes of the current pointee and exposes the emptied pointer slot, for APIs that
    /// return an allocation through an out-parameter.
    ///
    /// # Safety
    ///
    /// Whatever is written into the slot must satisfy the contract of
    /// [`from_raw`](Self::from_raw).
    pub unsafe fn out_slot(&mut self) -> &mut *mut T {
        self.clear();
        &mut self.ptr
    }

    /// Gives the pointee back as a box, or `None` if nothing is owned.
    pub fn into_box(mut self) -> Option<Box<T>>
    where
        S: BoxedStorage<T>,
    {
        let ptr = self.release();
        if ptr.is_null() {
            None
        } else {
            // Safety: `S` only ever owns pointers it can reclaim as boxes.
            Some(unsafe { Box::from_raw(ptr) })
        }
    }
}

impl<T, S: BoxedStorage<T>, C: Checking> ScopedPointer<T, S, C> {
    /// Boxes `value` and takes ownership of it.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized, S: Storage<T>, C: Checking> Drop for ScopedPointer<T, S, C> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            log::trace!("disposing scoped pointer (sequence: {})", S::IS_SEQUENCE);
        }
        unsafe { S::dispose(self.ptr) }
    }
}

impl<T: ?Sized, S: Storage<T>, C: Checking> Default for ScopedPointer<T, S, C> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized, S: Storage<T>, C: DerefCheck> Deref for ScopedPointer<T, S, C> {
    type Target = T;

    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        C::check(self.is_null());
        // Safety: `C` diverges on null, and the pointee is owned.
        unsafe { &*self.ptr }
    }
}

impl<T: ?Sized, S: Storage<T>, C: DerefCheck> DerefMut for ScopedPointer<T, S, C> {
    #[inline]
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        C::check(self.is_null());
        // Safety: `C` diverges on null, and the pointee is owned exclusively.
        unsafe { &mut *self.ptr }
    }
}

impl<T, S: Storage<[T]>, C: DerefCheck> Index<usize> for ScopedPointer<[T], S, C> {
    type Output = T;

    #[inline]
    #[track_caller]
    fn index(&self, index: usize) -> &T {
        &(**self)[index]
    }
}

impl<T, S: Storage<[T]>, C: DerefCheck> IndexMut<usize> for ScopedPointer<[T], S, C> {
    #[inline]
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut (**self)[index]
    }
}

impl<T: ?Sized, S: Storage<T>, C: Checking> PartialEq<*const T> for ScopedPointer<T, S, C> {
    #[inline]
    fn eq(&self, other: &*const T) -> bool {
        ptr::addr_eq(self.ptr, *other)
    }
}

impl<T: ?Sized, S: Storage<T>, C: Checking> PartialEq<*mut T> for ScopedPointer<T, S, C> {
    #[inline]
    fn eq(&self, other: &*mut T) -> bool {
        ptr::addr_eq(self.ptr, *other)
    }
}

impl<T: ?Sized, S: Storage<T>, C: Checking> fmt::Pointer for ScopedPointer<T, S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&(self.ptr as *const T), f)
    }
}

impl<T: ?Sized, S: Storage<T>, C: Checking> fmt::Debug for ScopedPointer<T, S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedPointer").field(&(self.ptr as *const T)).finish()
    }
}

unsafe impl<T: ?Sized + Send, S: Storage<T>, C: Checking> Send for ScopedPointer<T, S, C> {}
unsafe impl<T: ?Sized + Sync, S: Storage<T>, C: Checking> Sync for ScopedPointer<T, S, C> {}
