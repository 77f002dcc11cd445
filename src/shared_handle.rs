use base::fmt;
use base::marker::PhantomData;

use crate::policy::HandlePolicy;
use crate::ring::{Link, RingNode};
use crate::ReferenceCounted;

/// A shared owner of an opaque handle, counted without a separate counter.
///
/// All owners of one handle form a circular doubly-linked list; each `SharedHandle` is a node of
/// that ring. Cloning splices a new node in, dropping takes one out, and the handle is disposed
/// of when the last node leaves. Owners holding the null sentinel are tracked like any other but
/// never disposed of.
///
/// The ring is not synchronized, so `SharedHandle` is neither `Send` nor `Sync`.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use owned_handles::{HandlePolicy, SharedHandle};
///
/// thread_local!(static CLOSED: Cell<usize> = Cell::new(0));
///
/// struct Socket;
///
/// impl HandlePolicy for Socket {
///     type Handle = i32;
///
///     fn null_handle() -> i32 {
///         -1
///     }
///
///     fn dispose(_socket: i32) {
///         CLOSED.with(|closed| closed.set(closed.get() + 1));
///     }
/// }
///
/// let a: SharedHandle<Socket> = SharedHandle::new(4);
/// let b = a.clone();
/// assert_eq!(b.owner_count(), 2);
///
/// drop(a);
/// assert_eq!(CLOSED.with(Cell::get), 0);
/// drop(b);
/// assert_eq!(CLOSED.with(Cell::get), 1);
/// ```
pub struct SharedHandle<P: HandlePolicy> {
    node: Link<P::Handle>,
    phantom: PhantomData<(RingNode<P::Handle>, P)>,
}

impl<P: HandlePolicy> SharedHandle<P> {
    fn from_node(node: Link<P::Handle>) -> Self {
        SharedHandle { node, phantom: PhantomData }
    }

    #[inline]
    fn node(&self) -> &RingNode<P::Handle> {
        // Safety: the node is owned by this handle and lives until it is dropped.
        unsafe { self.node.as_ref() }
    }

    /// Takes sole ownership of `handle`.
    pub fn new(handle: P::Handle) -> Self {
        Self::from_node(RingNode::alloc(handle))
    }

    /// A sole owner of the null sentinel.
    pub fn null() -> Self {
        Self::new(P::null_handle())
    }

    /// Returns the shared handle. Ownership is unaffected.
    #[inline]
    pub fn get(&self) -> P::Handle {
        self.node().handle()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.get() == P::null_handle()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.is_null()
    }

    /// Whether no other owner shares the handle. Constant time.
    #[inline]
    pub fn is_sole_owner(&self) -> bool {
        self.node().is_singleton()
    }

    /// Number of owners sharing the handle, this one included.
    ///
    /// Walks the whole ring; meant for diagnostics.
    pub fn owner_count(&self) -> usize {
        self.node().len()
    }

    fn dispose(handle: P::Handle) {
        if handle != P::null_handle() {
            log::trace!("last shared owner left, disposing of its handle");
            P::dispose(handle);
        }
    }

    /// Takes this node out of its ring, disposing of the handle if it was the last owner.
    ///
    /// The node's links are stale afterwards.
    fn leave(&mut self) {
        let node = self.node();
        // Safety: all ring members are live handles.
        if unsafe { node.unlink() } {
            Self::dispose(node.handle());
        }
    }

    /// Makes this owner share `other`'s handle.
    ///
    /// If this owner was the last one of its previous handle, that handle is disposed of first.
    /// Assigning an owner to itself does nothing.
    pub fn assign(&mut self, other: &Self) {
        if self.node == other.node {
            return;
        }

        self.leave();
        let node = self.node();
        node.set_handle(other.get());
        // Safety: `leave` took the node out of its ring; `other`'s ring is made of live handles.
        unsafe { node.insert_after(other.node()) };
    }

    /// Moves `other`'s handle and ring position into this owner, leaving `other` holding the null
    /// sentinel on its own.
    ///
    /// This owner gives up its previous handle first, disposing of it if it was the last owner.
    /// The number of owners of `other`'s former handle is unchanged.
    pub fn take_from(&mut self, other: &mut Self) {
        if self.node == other.node {
            return;
        }

        self.leave();
        // Safety: `leave` took the node out of its ring and the nodes differ.
        unsafe { self.node().steal_from(other.node(), P::null_handle()) };
    }

    /// Moves this owner's handle and ring position into a new owner, leaving this one holding the
    /// null sentinel on its own.
    pub fn take(&mut self) -> Self {
        let taken = Self::from_node(RingNode::alloc(P::null_handle()));
        // Safety: the new node is a fresh singleton nobody links to.
        unsafe { taken.node().steal_from(self.node(), P::null_handle()) };
        taken
    }

    /// Replaces the shared handle with `handle` for this owner only.
    ///
    /// If this owner was the last one, the old handle is disposed of. Otherwise the remaining
    /// owners keep it and this owner starts a ring of its own. Resetting to the handle already
    /// shared does nothing.
    pub fn reset(&mut self, handle: P::Handle) {
        if self.get() == handle {
            return;
        }

        self.leave();
        let node = self.node();
        node.make_singleton();
        node.set_handle(handle);
    }

    /// Gives up this owner's share and holds the null sentinel on its own.
    pub fn clear(&mut self) {
        self.reset(P::null_handle())
    }

    /// Detaches this owner and exposes its storage for an out-parameter style API.
    ///
    /// If this owner was the last one, its handle is disposed of. Otherwise it leaves the ring
    /// and the other owners keep the handle. Either way the returned slot is private to this
    /// owner, holds the null sentinel, and whatever is written into it is owned from then on.
    /// Note that this changes the ring topology: a previously shared owner is alone afterwards.
    pub fn out_slot(&mut self) -> &mut P::Handle {
        let node = self.node();
        // Safety: all ring members are live handles.
        if unsafe { node.unlink() } {
            Self::dispose(node.replace_handle(P::null_handle()));
        } else {
            node.set_handle(P::null_handle());
        }
        node.make_singleton();

        // Safety: the node is a singleton now, so nothing but this handle reaches its storage,
        // and the returned borrow keeps `self` borrowed mutably.
        unsafe { &mut *self.node().handle_ptr() }
    }

    /// Exchanges the handles and the ring positions of two owners. Nothing is disposed of and
    /// every ring keeps its size.
    pub fn swap(&mut self, other: &mut Self) {
        // Safety: both rings are made of live handles.
        unsafe { self.node().exchange(other.node()) }
    }
}

impl<P: HandlePolicy> Clone for SharedHandle<P> {
    /// Creates another owner of the same handle, placed right after `self` in the ring.
    fn clone(&self) -> Self {
        let node = RingNode::alloc(self.get());
        // Safety: the new node is a fresh singleton nobody links to.
        unsafe { node.as_ref().insert_after(self.node()) };
        Self::from_node(node)
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source)
    }
}

impl<P: HandlePolicy> Drop for SharedHandle<P> {
    fn drop(&mut self) {
        self.leave();
        // Safety: the node is out of every ring and this handle is its only user.
        unsafe { RingNode::free(self.node) };
    }
}

impl<P: HandlePolicy> Default for SharedHandle<P> {
    fn default() -> Self {
        Self::null()
    }
}

impl<P: HandlePolicy> ReferenceCounted for SharedHandle<P> {
    fn reference_count(this: &Self) -> usize {
        this.owner_count()
    }
}

impl<P: HandlePolicy> PartialEq for SharedHandle<P> {
    /// Two owners are equal if they hold equal handles, whether or not they share a ring.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl<P: HandlePolicy> Eq for SharedHandle<P> where P::Handle: Eq {}

impl<P: HandlePolicy> fmt::Debug for SharedHandle<P>
where
    P::Handle: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedHandle").field(&self.get()).finish()
    }
}
