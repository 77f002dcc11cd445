//! Intrusive circular doubly-linked list of the owners of one resource.
//!
//! Every node lives in its own heap allocation so that its address stays fixed while the owner
//! that holds it is moved around. The ring is the owner count: a node whose links point back at
//! itself is the sole owner.

use base::cell::Cell;
use base::ptr::NonNull;

use base::prelude::v1::*;

pub(crate) type Link<H> = NonNull<RingNode<H>>;

pub(crate) struct RingNode<H> {
    next: Cell<Link<H>>,
    prev: Cell<Link<H>>,
    handle: Cell<H>,
}

/// Borrows the node behind `link`.
///
/// Safety: the node must be alive for `'a`.
#[inline]
unsafe fn node<'a, H>(link: Link<H>) -> &'a RingNode<H> {
    unsafe { &*link.as_ptr() }
}

impl<H: Copy> RingNode<H> {
    /// Allocates a node forming a singleton ring over `handle`.
    pub(crate) fn alloc(handle: H) -> Link<H> {
        let boxed = Box::new(RingNode {
            next: Cell::new(NonNull::dangling()),
            prev: Cell::new(NonNull::dangling()),
            handle: Cell::new(handle),
        });
        let link = NonNull::from(Box::leak(boxed));
        // Safety: freshly leaked, nobody else sees it yet.
        unsafe { node(link).make_singleton() };
        link
    }

    /// Frees a node previously returned by `alloc`.
    ///
    /// Safety: the node must already be out of every ring other than its own singleton, and
    /// `link` must not be used afterwards.
    pub(crate) unsafe fn free(link: Link<H>) {
        drop(unsafe { Box::from_raw(link.as_ptr()) });
    }

    #[inline]
    fn link(&self) -> Link<H> {
        NonNull::from(self)
    }

    #[inline]
    pub(crate) fn handle(&self) -> H {
        self.handle.get()
    }

    #[inline]
    pub(crate) fn set_handle(&self, handle: H) {
        self.handle.set(handle)
    }

    #[inline]
    pub(crate) fn replace_handle(&self, handle: H) -> H {
        self.handle.replace(handle)
    }

    /// Raw pointer to the handle storage.
    #[inline]
    pub(crate) fn handle_ptr(&self) -> *mut H {
        self.handle.as_ptr()
    }

    #[inline]
    pub(crate) fn is_singleton(&self) -> bool {
        let this = self.link();
        self.next.get() == this && self.prev.get() == this
    }

    /// Points both links back at this node.
    ///
    /// Only valid for a node no other node links to: a fresh one or one just unlinked.
    #[inline]
    pub(crate) fn make_singleton(&self) {
        let this = self.link();
        self.next.set(this);
        self.prev.set(this);
    }

    /// Splices this node into `other`'s ring, right after `other`.
    ///
    /// Safety: this node must not be linked from any ring, and every node of `other`'s ring
    /// must be alive.
    pub(crate) unsafe fn insert_after(&self, other: &Self) {
        let this = self.link();
        let after = other.next.get();

        unsafe { node(after) }.prev.set(this);
        self.next.set(after);
        other.next.set(this);
        self.prev.set(other.link());
    }

    /// Takes this node out of its ring and returns `true` if it was the only member.
    ///
    /// The node's own links are left untouched and are stale afterwards, unless it was a
    /// singleton: callers either relink it or drop it.
    ///
    /// Safety: every node of this node's ring must be alive.
    pub(crate) unsafe fn unlink(&self) -> bool {
        let this = self.link();
        let next = self.next.get();
        let prev = self.prev.get();

        unsafe {
            node(prev).next.set(next);
            node(next).prev.set(prev);
        }
        next == this && prev == this
    }

    /// Moves `src`'s handle and ring position to this node, leaving `src` as a singleton ring
    /// over `null`.
    ///
    /// Safety: this node must not be linked from any ring, it must differ from `src`, and every
    /// node of `src`'s ring must be alive.
    pub(crate) unsafe fn steal_from(&self, src: &Self, null: H) {
        let this = self.link();
        self.handle.set(src.handle.replace(null));

        // When `src` is a singleton its `next` is `src` itself, and the first rewrite below turns
        // `src.next` into `this`. Read it before touching any link.
        let next = src.next.get();

        unsafe {
            node(src.prev.get()).next.set(this);
            node(next).prev.set(this);
        }

        self.next.set(src.next.get());
        self.prev.set(src.prev.get());
        src.make_singleton();
    }

    /// Exchanges the handles and the ring positions of two nodes.
    ///
    /// Works for nodes of different rings, adjacent nodes of one ring, a ring made of just the
    /// two, and singletons. Exchanging a node with itself does nothing.
    ///
    /// Safety: every node of both rings must be alive.
    pub(crate) unsafe fn exchange(&self, other: &Self) {
        let a = self.link();
        let b = other.link();
        if a == b {
            return;
        }

        // Every link is rewritten as if `a` and `b` had traded names. Snapshots that name one of
        // the pair are renamed first, which keeps adjacent and two-member rings consistent: every
        // field written twice below receives the same value both times.
        let rename = |x: Link<H>| {
            if x == a {
                b
            } else if x == b {
                a
            } else {
                x
            }
        };
        let a_prev = rename(self.prev.get());
        let a_next = rename(self.next.get());
        let b_prev = rename(other.prev.get());
        let b_next = rename(other.next.get());

        unsafe {
            node(a_prev).next.set(b);
            node(a_next).prev.set(b);
            node(b_prev).next.set(a);
            node(b_next).prev.set(a);
        }

        self.prev.set(b_prev);
        self.next.set(b_next);
        other.prev.set(a_prev);
        other.next.set(a_next);

        self.handle.swap(&other.handle);
    }

    /// Number of nodes in this node's ring. Walks the whole ring.
    pub(crate) fn len(&self) -> usize {
        let this = self.link();
        let mut count = 1;
        let mut cursor = self.next.get();
        while cursor != this {
            // Safety: ring members are alive as long as any of them is.
            cursor = unsafe { node(cursor) }.next.get();
            count += 1;
        }
        count
    }
}
