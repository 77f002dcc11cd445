#![allow(dead_code)]

use std::cell::RefCell;

use owned_handles::HandlePolicy;

thread_local! {
    static DISPOSED: RefCell<Vec<i32>> = RefCell::new(Vec::new());
}

/// The null sentinel of [`Tracer`].
pub const NULL: i32 = -1;

/// A handle policy over plain integers that records every disposal on the current thread.
pub struct Tracer;

impl HandlePolicy for Tracer {
    type Handle = i32;

    fn null_handle() -> i32 {
        NULL
    }

    fn dispose(handle: i32) {
        DISPOSED.with(|disposed| disposed.borrow_mut().push(handle));
    }
}

/// Forgets everything recorded so far on this thread.
pub fn reset_trace() {
    DISPOSED.with(|disposed| disposed.borrow_mut().clear());
}

/// Non-null handles disposed of on this thread, in order.
pub fn disposed() -> Vec<i32> {
    DISPOSED.with(|disposed| {
        disposed.borrow().iter().copied().filter(|&handle| handle != NULL).collect()
    })
}

/// How many times `handle` was disposed of on this thread.
pub fn disposals_of(handle: i32) -> usize {
    DISPOSED.with(|disposed| disposed.borrow().iter().filter(|&&h| h == handle).count())
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
    reset_trace();
}
