#![cfg(all(unix, feature = "unix", feature = "shared"))]

use std::sync::{Mutex, MutexGuard};

use owned_handles::{FdPolicy, HandlePolicy, ScopedFd, SharedFd};

// Descriptor numbers are reused as soon as they are closed, so a test observing "closed" could
// see a descriptor opened by a concurrent test.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn pipe() -> (libc::c_int, libc::c_int) {
    let mut fds = [0 as libc::c_int; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    (fds[0], fds[1])
}

fn is_open(fd: libc::c_int) -> bool {
    unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
}

#[test]
fn scoped_fd_closes_on_drop() {
    let _serial = serial();
    let (read, write) = pipe();
    {
        let _r = ScopedFd::new(read);
        let _w = ScopedFd::new(write);
        assert!(is_open(read));
        assert!(is_open(write));
    }
    assert!(!is_open(read));
    assert!(!is_open(write));
}

#[test]
fn release_keeps_the_descriptor_open() {
    let _serial = serial();
    let (read, write) = pipe();
    let mut owner = ScopedFd::new(read);
    let raw = owner.release();
    drop(owner);
    assert!(is_open(raw));

    FdPolicy::dispose(raw);
    FdPolicy::dispose(write);
    assert!(!is_open(raw));
}

#[test]
fn shared_fd_closes_after_last_owner() {
    let _serial = serial();
    let (read, write) = pipe();
    let _w = ScopedFd::new(write);
    let first = SharedFd::new(read);
    let second = first.clone();

    drop(first);
    assert!(is_open(read));
    drop(second);
    assert!(!is_open(read));
}

#[test]
fn out_slot_adopts_a_fresh_descriptor() {
    let _serial = serial();
    let mut read = ScopedFd::null();
    let mut write = ScopedFd::null();
    let mut fds = [FdPolicy::null_handle(); 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    *read.out_slot() = fds[0];
    *write.out_slot() = fds[1];

    let message = b"ring";
    let written = unsafe { libc::write(write.get(), message.as_ptr().cast(), message.len()) };
    assert_eq!(written, message.len() as isize);

    let mut buffer = [0u8; 4];
    let got = unsafe { libc::read(read.get(), buffer.as_mut_ptr().cast(), buffer.len()) };
    assert_eq!(got, 4);
    assert_eq!(&buffer, message);

    let raw = read.get();
    read.clear();
    assert!(!is_open(raw));
}
