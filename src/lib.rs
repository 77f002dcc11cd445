//! Owners for opaque resources that are disposed of exactly once.
//!
//! A resource is any value whose release must be triggered explicitly: a file descriptor, a
//! socket, a lock, a heap block, an object carrying its own reference count. Each owner type
//! takes such a value, guarantees its disposal on every exit path, and still exposes the raw
//! value for code that has to talk to non-owning APIs.
//!
//! - [`ScopedHandle`] and [`ScopedPointer`] are sole owners.
//! - [`SharedHandle`] shares a handle between owners linked into a ring, without a counter.
//! - [`SharedPointer`] shares a heap object that counts its own owners.
//! - [`ScopedLock`] owns a lock primitive.
//!
//! How a resource is disposed of, what its null value is, and whether access to that null value
//! faults are decided by [policies](policy) chosen as type parameters.
#![no_std]
extern crate maybe_std as base;

pub mod policy;

mod error;
pub use error::*;

pub use policy::{AssertCheck, Checking, DerefCheck, HandlePolicy, NoChecking};
pub use policy::{IntrusiveRefCount, RefCount, RefCountPolicy, RefCounted};
#[cfg(feature = "pointer")]
pub use policy::{ArrayStorage, BoxedStorage, DefaultStorage, Storage};

/// An owner that shares its resource and can tell how many owners share it.
pub trait ReferenceCounted: Clone {
    /// Get the number of owners sharing the resource, this one included.
    ///
    /// Implementations may walk all owners; this is a diagnostic, not a hot-path operation.
    fn reference_count(this: &Self) -> usize;
}

mod scoped_handle;
pub use scoped_handle::*;

mod scoped_lock;
pub use scoped_lock::*;

#[cfg(feature = "shared")]
mod ring;
#[cfg(feature = "shared")]
mod shared_handle;
#[cfg(feature = "shared")]
pub use shared_handle::*;

#[cfg(feature = "pointer")]
mod scoped_pointer;
#[cfg(feature = "pointer")]
pub use scoped_pointer::*;

#[cfg(feature = "pointer")]
mod shared_pointer;
#[cfg(feature = "pointer")]
pub use shared_pointer::*;

#[cfg(all(unix, feature = "unix"))]
mod posix;
#[cfg(all(unix, feature = "unix"))]
pub use posix::*;
