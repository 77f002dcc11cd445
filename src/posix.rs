//! Policies for unix resources.

use base::cell::UnsafeCell;
use base::mem::{self, MaybeUninit};

use base::prelude::v1::*;

use crate::error::LockError;
use crate::policy::HandlePolicy;
use crate::scoped_handle::ScopedHandle;
use crate::scoped_lock::LockPolicy;
#[cfg(feature = "shared")]
use crate::shared_handle::SharedHandle;

/// Unix file descriptors, sockets included. Disposal closes the descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FdPolicy;

impl HandlePolicy for FdPolicy {
    type Handle = libc::c_int;

    #[inline]
    fn null_handle() -> libc::c_int {
        -1
    }

    fn dispose(fd: libc::c_int) {
        if fd == Self::null_handle() {
            return;
        }
        // Safety: the descriptor is owned and closed exactly once.
        if unsafe { libc::close(fd) } != 0 {
            log::debug!("close({}) failed, descriptor dropped anyway", fd);
        }
    }
}

/// The sole owner of a file descriptor.
pub type ScopedFd = ScopedHandle<FdPolicy>;

/// A shared owner of a file descriptor.
#[cfg(feature = "shared")]
pub type SharedFd = SharedHandle<FdPolicy>;

/// A `pthread_mutex_t` at a fixed heap address.
pub struct PosixMutex(UnsafeCell<libc::pthread_mutex_t>);

unsafe impl Send for PosixMutex {}
unsafe impl Sync for PosixMutex {}

impl PosixMutex {
    #[inline]
    fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.0.get()
    }
}

/// A POSIX mutex of type `PTHREAD_MUTEX_NORMAL`, so that relocking from the owning thread
/// deadlocks instead of being undefined.
///
/// The mutex is boxed so that moving its owner never moves the primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PosixMutexPolicy;

fn check(code: libc::c_int, call: &str) -> Result<(), LockError> {
    if code == 0 {
        Ok(())
    } else {
        log::debug!("{} failed with code {}", call, code);
        Err(LockError::Initialize(code))
    }
}

impl LockPolicy for PosixMutexPolicy {
    type Lock = Box<PosixMutex>;

    fn initialize() -> Result<Box<PosixMutex>, LockError> {
        let mutex = Box::new(PosixMutex(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER)));
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();

        // Safety: `attr` is initialized before use and destroyed on every path after that; the
        // mutex storage is valid, pinned on the heap, and not yet shared.
        unsafe {
            check(libc::pthread_mutexattr_init(attr.as_mut_ptr()), "pthread_mutexattr_init")?;
            let initialized = check(
                libc::pthread_mutexattr_settype(attr.as_mut_ptr(), libc::PTHREAD_MUTEX_NORMAL),
                "pthread_mutexattr_settype",
            )
            .and_then(|()| {
                check(libc::pthread_mutex_init(mutex.raw(), attr.as_ptr()), "pthread_mutex_init")
            });
            libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
            initialized?;
        }
        Ok(mutex)
    }

    fn dispose(lock: Box<PosixMutex>) {
        // Safety: initialized, and nothing else can reach it any more. A mutex locked by a
        // leaked guard must not be destroyed, so it is leaked too.
        unsafe {
            if libc::pthread_mutex_trylock(lock.raw()) == 0 {
                libc::pthread_mutex_unlock(lock.raw());
                libc::pthread_mutex_destroy(lock.raw());
            } else {
                log::debug!("posix mutex disposed while held by a leaked guard, leaking it");
                mem::forget(lock);
            }
        }
    }

    unsafe fn acquire(lock: &Box<PosixMutex>) {
        unsafe { libc::pthread_mutex_lock(lock.raw()) };
    }

    unsafe fn release(lock: &Box<PosixMutex>) {
        unsafe { libc::pthread_mutex_unlock(lock.raw()) };
    }

    unsafe fn try_acquire(lock: &Box<PosixMutex>) -> bool {
        unsafe { libc::pthread_mutex_trylock(lock.raw()) == 0 }
    }
}
