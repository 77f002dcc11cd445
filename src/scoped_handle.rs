use base::fmt;
use base::marker::PhantomData;
use base::mem;

use crate::error::AccessError;
use crate::policy::{AssertCheck, Checking, HandlePolicy};

/// The sole owner of an opaque handle (file descriptor, socket, lock, ...).
///
/// The handle is disposed of through `P` when the owner is dropped, including when it holds the
/// null sentinel. Ownership moves with the value and cannot be duplicated.
///
/// # Examples
///
/// ```
/// use owned_handles::{HandlePolicy, ScopedHandle};
///
/// struct Ticket;
///
/// impl HandlePolicy for Ticket {
///     type Handle = i32;
///
///     fn null_handle() -> i32 {
///         -1
///     }
///
///     fn dispose(_ticket: i32) {}
/// }
///
/// let mut first: ScopedHandle<Ticket> = ScopedHandle::new(3);
/// let raw = first.release();
/// assert!(first.is_null());
///
/// first.reset(raw);
/// assert!(first == 3);
/// ```
pub struct ScopedHandle<P: HandlePolicy, C: Checking = AssertCheck> {
    handle: P::Handle,
    phantom: PhantomData<(P, C)>,
}

impl<P: HandlePolicy, C: Checking> ScopedHandle<P, C> {
    /// Takes ownership of `handle`.
    #[inline]
    pub fn new(handle: P::Handle) -> Self {
        ScopedHandle { handle, phantom: PhantomData }
    }

    /// An owner holding the null sentinel.
    #[inline]
    pub fn null() -> Self {
        Self::new(P::null_handle())
    }

    /// Whether the owner holds the null sentinel.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.handle == P::null_handle()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.is_null()
    }

    /// Returns the handle without giving up ownership.
    ///
    /// Runs the checking policy first: with [`AssertCheck`] this panics on the null sentinel.
    #[inline]
    #[track_caller]
    pub fn get(&self) -> P::Handle {
        C::check(self.is_null());
        self.handle
    }

    /// Returns the handle, or [`AccessError::Null`] if the owner holds the null sentinel.
    pub fn try_get(&self) -> Result<P::Handle, AccessError> {
        if self.is_null() {
            Err(AccessError::Null)
        } else {
            Ok(self.handle)
        }
    }

    /// Gives up ownership without disposing; the caller becomes responsible for the handle.
    #[inline]
    pub fn release(&mut self) -> P::Handle {
        mem::replace(&mut self.handle, P::null_handle())
    }

    /// Disposes of the current handle and takes ownership of `handle`.
    ///
    /// Resetting to the handle already owned does nothing.
    pub fn reset(&mut self, handle: P::Handle) {
        if self.handle != handle {
            P::dispose(mem::replace(&mut self.handle, handle));
        }
    }

    /// Disposes of the current handle and holds the null sentinel.
    #[inline]
    pub fn clear(&mut self) {
        self.reset(P::null_handle())
    }

    /// Moves ownership out into a new owner, leaving this one holding the null sentinel.
    #[inline]
    pub fn take(&mut self) -> Self {
        Self::new(self.release())
    }

    /// Exchanges the owned handles. Nothing is disposed.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.handle, &mut other.handle)
    }

    /// Disposes of the current handle and exposes the emptied storage.
    ///
    /// Meant for APIs that produce a handle through an out-parameter: the slot holds the null
    /// sentinel on return and whatever is written into it is owned from then on.
    pub fn out_slot(&mut self) -> &mut P::Handle {
        self.clear();
        &mut self.handle
    }

    /// Gives up ownership and consumes the owner.
    #[inline]
    pub fn into_raw(mut self) -> P::Handle {
        self.release()
    }
}

impl<P: HandlePolicy, C: Checking> Drop for ScopedHandle<P, C> {
    fn drop(&mut self) {
        P::dispose(self.handle);
    }
}

impl<P: HandlePolicy, C: Checking> Default for ScopedHandle<P, C> {
    fn default() -> Self {
        Self::null()
    }
}

impl<P: HandlePolicy, C: Checking> PartialEq<P::Handle> for ScopedHandle<P, C> {
    /// Compares the owned handle with a raw one, without running the checking policy.
    #[inline]
    fn eq(&self, other: &P::Handle) -> bool {
        self.handle == *other
    }
}

impl<P: HandlePolicy, C: Checking> fmt::Debug for ScopedHandle<P, C>
where
    P::Handle: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedHandle").field(&self.handle).finish()
    }
}

unsafe impl<P: HandlePolicy, C: Checking> Send for ScopedHandle<P, C> where P::Handle: Send {}
