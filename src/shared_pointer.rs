use base::fmt;
use base::marker::PhantomData;
use base::mem;
use base::ptr;
use base::ops::Deref;

use base::prelude::v1::*;

use crate::error::AccessError;
use crate::policy::{
    AssertCheck, BoxedStorage, Checking, DefaultStorage, DerefCheck, IntrusiveRefCount,
    RefCountPolicy, Storage,
};

/// A shared owner of a heap object that keeps its own owner counter.
///
/// Sharing and releasing go through the counter policy `R`; when `R` reports that the last
/// owner left, the object is disposed of through `S`. The counter is not atomic, so
/// `SharedPointer` is neither `Send` nor `Sync`.
///
/// # Examples
///
/// ```
/// use owned_handles::{RefCount, RefCounted, SharedPointer};
///
/// struct Texture {
///     count: RefCount,
///     id: u32,
/// }
///
/// impl RefCounted for Texture {
///     fn add_ref(&self) {
///         self.count.add_ref()
///     }
///
///     fn dec_ref(&self) -> bool {
///         self.count.dec_ref()
///     }
/// }
///
/// let texture: SharedPointer<Texture> = SharedPointer::new(Texture { count: RefCount::new(), id: 9 });
/// let other = texture.clone();
/// assert_eq!(other.count.get(), 2);
/// assert_eq!(other.id, 9);
/// assert!(texture == other);
/// ```
pub struct SharedPointer<
    T: ?Sized,
    R: RefCountPolicy<T> = IntrusiveRefCount,
    S: Storage<T> = DefaultStorage,
    C: Checking = AssertCheck,
> {
    ptr: *mut T,
    phantom: PhantomData<(Box<T>, R, S, C)>,
}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: Checking> SharedPointer<T, R, S, C> {
    /// An owner of nothing.
    #[inline]
    pub fn null() -> Self {
        SharedPointer { ptr: S::null(), phantom: PhantomData }
    }

    /// Adopts one existing reference to `ptr`; the counter is not incremented.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live object with a reference the caller gives up, and
    /// the object must be reclaimable by `S::dispose` once its counter reaches zero.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        SharedPointer { ptr, phantom: PhantomData }
    }

    /// Adopts a boxed object whose counter already records its creating reference.
    pub fn from_box(boxed: Box<T>) -> Self
    where
        S: BoxedStorage<T>,
    {
        // Safety: `S` reclaims boxes and the new object carries exactly our reference.
        unsafe { Self::from_raw(Box::into_raw(boxed)) }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.is_null()
    }

    /// Returns the raw pointer without touching the counter, after running the checking policy.
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

    /// Hands this owner's reference to the caller and leaves the owner empty.
    #[inline]
    pub fn release(&mut self) -> *mut T {
        mem::replace(&mut self.ptr, S::null())
    }

    /// Drops one reference to `ptr`, disposing of the object if it was the last.
    ///
    /// Safety: `ptr` must be null or carry a reference owned by the caller.
    unsafe fn release_ref(ptr: *mut T) {
        if unsafe { R::dec_ref(ptr) } {
            log::trace!("last shared pointer released, disposing of the pointee");
            unsafe { S::dispose(ptr) };
        }
    }

    /// Gives up the current reference and adopts `ptr` instead.
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
            unsafe { Self::release_ref(old) };
        }
    }

    /// Gives up the current reference, if any.
    pub fn clear(&mut self) {
        // Safety: the null pointer is always acceptable.
        unsafe { self.reset(S::null()) }
    }

    /// Moves this owner's reference into a new owner, leaving this one empty.
    #[inline]
    pub fn take(&mut self) -> Self {
        // Safety: the reference is moved, not duplicated.
        unsafe { Self::from_raw(self.release()) }
    }

    /// Exchanges the owned pointers. No counter is touched.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr)
    }
}

impl<T, R: RefCountPolicy<T>, S: BoxedStorage<T>, C: Checking> SharedPointer<T, R, S, C> {
    /// Boxes `value`, whose counter must already record its creating reference.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: Checking> Clone
    for SharedPointer<T, R, S, C>
{
    /// Adds a reference to the same object.
    fn clone(&self) -> Self {
        // Safety: we hold a reference, so the object is alive.
        unsafe {
            R::add_ref(self.ptr);
            Self::from_raw(self.ptr)
        }
    }

    fn clone_from(&mut self, source: &Self) {
        // Add before release: both owners may already point at the same object.
        unsafe {
            R::add_ref(source.ptr);
            Self::release_ref(mem::replace(&mut self.ptr, source.ptr));
        }
    }
}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: Checking> Drop
    for SharedPointer<T, R, S, C>
{
    fn drop(&mut self) {
        unsafe { Self::release_ref(self.ptr) }
    }
}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: Checking> Default
    for SharedPointer<T, R, S, C>
{
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: DerefCheck> Deref
    for SharedPointer<T, R, S, C>
{
    type Target = T;

    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        C::check(self.is_null());
        // Safety: `C` diverges on null, and we hold a reference.
        unsafe { &*self.ptr }
    }
}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: Checking> PartialEq
    for SharedPointer<T, R, S, C>
{
    /// Two owners are equal if they point at the same object.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        ptr::addr_eq(self.ptr, other.ptr)
    }
}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: Checking> Eq for SharedPointer<T, R, S, C> {}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: Checking> PartialEq<*const T>
    for SharedPointer<T, R, S, C>
{
    #[inline]
    fn eq(&self, other: &*const T) -> bool {
        ptr::addr_eq(self.ptr, *other)
    }
}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: Checking> PartialEq<*mut T>
    for SharedPointer<T, R, S, C>
{
    #[inline]
    fn eq(&self, other: &*mut T) -> bool {
        ptr::addr_eq(self.ptr, *other)
    }
}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: Checking> fmt::Pointer
    for SharedPointer<T, R, S, C>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&(self.ptr as *const T), f)
    }
}

impl<T: ?Sized, R: RefCountPolicy<T>, S: Storage<T>, C: Checking> fmt::Debug
    for SharedPointer<T, R, S, C>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedPointer").field(&(self.ptr as *const T)).finish()
    }
}
