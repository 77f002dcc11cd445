use thiserror::Error;

/// Returned by the fallible accessors of the owning wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The owner holds the null sentinel of its resource type.
    #[error("access through an owner holding the null sentinel")]
    Null,
}

/// Failure to set up a lock primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    /// The underlying primitive refused to initialize, with the code it reported.
    #[error("failed to initialize lock primitive (code {0})")]
    Initialize(i32),
}

/// Aborts the current operation after an access through a null owner.
///
/// Shared by every checking policy that faults, so that all of them report the same message.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn null_access() -> ! {
    panic!("{}", AccessError::Null)
}
