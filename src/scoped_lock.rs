use base::fmt;
use base::hint;
use base::marker::PhantomData;
use base::mem::ManuallyDrop;
use base::sync::atomic::AtomicBool;
use base::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::error::LockError;

/// Binds a blocking synchronization primitive to [`ScopedLock`].
pub trait LockPolicy {
    /// The primitive itself.
    type Lock;

    /// Creates a primitive in the released state.
    fn initialize() -> Result<Self::Lock, LockError>;

    /// Tears the primitive down.
    ///
    /// The primitive is still held if a guard was leaked with `mem::forget`. Implementations
    /// must then leak whatever cannot be destroyed while held instead of destroying it.
    fn dispose(lock: Self::Lock);

    /// Blocks the calling thread until the primitive is acquired.
    ///
    /// Acquiring again from the thread that holds the primitive must deadlock or panic, never be
    /// undefined.
    ///
    /// # Safety
    ///
    /// The caller must release the primitive on the acquiring thread before it is disposed of.
    unsafe fn acquire(lock: &Self::Lock);

    /// Releases the primitive.
    ///
    /// # Safety
    ///
    /// The calling thread must currently hold it.
    unsafe fn release(lock: &Self::Lock);

    /// Acquires the primitive if that is possible without blocking.
    ///
    /// # Safety
    ///
    /// Same contract as [`acquire`](Self::acquire) when `true` is returned.
    unsafe fn try_acquire(lock: &Self::Lock) -> bool;
}

/// The sole owner of a lock primitive, torn down when the owner is dropped.
///
/// # Examples
///
/// ```
/// use owned_handles::{ScopedLock, SpinLockPolicy};
///
/// let lock: ScopedLock<SpinLockPolicy> = ScopedLock::new().unwrap();
/// {
///     let _guard = lock.lock();
///     assert!(lock.try_lock().is_none());
/// }
/// assert!(lock.try_lock().is_some());
/// ```
pub struct ScopedLock<L: LockPolicy> {
    lock: ManuallyDrop<L::Lock>,
}

impl<L: LockPolicy> ScopedLock<L> {
    /// Creates and owns a new primitive.
    pub fn new() -> Result<Self, LockError> {
        L::initialize().map(Self::from_raw)
    }

    /// Takes ownership of an existing primitive, which must not be held.
    pub fn from_raw(lock: L::Lock) -> Self {
        ScopedLock { lock: ManuallyDrop::new(lock) }
    }

    /// Blocks until the primitive is acquired. Prefer [`lock`](Self::lock).
    ///
    /// # Safety
    ///
    /// The calling thread must call [`release`](Self::release) before the owner is dropped.
    #[inline]
    pub unsafe fn acquire(&self) {
        unsafe { L::acquire(&self.lock) }
    }

    /// Acquires the primitive if that is possible without blocking. Prefer
    /// [`try_lock`](Self::try_lock).
    ///
    /// # Safety
    ///
    /// Same contract as [`acquire`](Self::acquire) when `true` is returned.
    #[inline]
    pub unsafe fn try_acquire(&self) -> bool {
        unsafe { L::try_acquire(&self.lock) }
    }

    /// Releases the primitive.
    ///
    /// # Safety
    ///
    /// The calling thread must hold it, through [`acquire`](Self::acquire) or a successful
    /// [`try_acquire`](Self::try_acquire).
    #[inline]
    pub unsafe fn release(&self) {
        unsafe { L::release(&self.lock) }
    }

    /// Blocks until the primitive is acquired and returns a guard releasing it on drop.
    ///
    /// Locking again on the same thread while the guard is alive deadlocks or panics.
    pub fn lock(&self) -> LockGuard<'_, L> {
        // Safety: the guard borrows the owner, so it is released before the owner is dropped.
        unsafe { self.acquire() };
        LockGuard { owner: self, _not_send: PhantomData }
    }

    /// Like [`lock`](Self::lock), but returns `None` instead of blocking.
    pub fn try_lock(&self) -> Option<LockGuard<'_, L>> {
        // Safety: as for `lock`.
        if unsafe { self.try_acquire() } {
            Some(LockGuard { owner: self, _not_send: PhantomData })
        } else {
            None
        }
    }

    /// The owned primitive.
    #[inline]
    pub fn raw(&self) -> &L::Lock {
        &self.lock
    }
}

impl<L: LockPolicy> Drop for ScopedLock<L> {
    fn drop(&mut self) {
        // Safety: the primitive is never touched again.
        L::dispose(unsafe { ManuallyDrop::take(&mut self.lock) });
    }
}

impl<L: LockPolicy> fmt::Debug for ScopedLock<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedLock").finish_non_exhaustive()
    }
}

/// Holds a [`ScopedLock`] acquired until dropped.
///
/// The guard must be dropped on the thread that acquired the lock, so it is not `Send`:
///
/// ```compile_fail
/// use owned_handles::{LockGuard, SpinLockPolicy};
///
/// fn assert_send<T: Send>() {}
/// assert_send::<LockGuard<'static, SpinLockPolicy>>();
/// ```
#[must_use = "if unused the lock is released immediately"]
pub struct LockGuard<'a, L: LockPolicy> {
    owner: &'a ScopedLock<L>,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<L: LockPolicy> Sync for LockGuard<'_, L> where L::Lock: Sync {}

impl<L: LockPolicy> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        // Safety: the guard only exists while the lock is held.
        unsafe { self.owner.release() }
    }
}

impl<L: LockPolicy> fmt::Debug for LockGuard<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

/// A busy-waiting lock over a single atomic flag. Needs no operating system support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpinLockPolicy;

impl LockPolicy for SpinLockPolicy {
    type Lock = AtomicBool;

    fn initialize() -> Result<AtomicBool, LockError> {
        Ok(AtomicBool::new(false))
    }

    fn dispose(lock: AtomicBool) {
        if lock.into_inner() {
            log::debug!("spin lock disposed while held by a leaked guard");
        }
    }

    unsafe fn acquire(lock: &AtomicBool) {
        while lock.compare_exchange_weak(false, true, Acquire, Relaxed).is_err() {
            // Wait on plain loads so the cache line is not hammered with writes.
            while lock.load(Relaxed) {
                hint::spin_loop();
            }
        }
    }

    unsafe fn release(lock: &AtomicBool) {
        lock.store(false, Release);
    }

    unsafe fn try_acquire(lock: &AtomicBool) -> bool {
        lock.compare_exchange(false, true, Acquire, Relaxed).is_ok()
    }
}
