//! Intrusive Reference Count
//!
//! Every lifecycle-managed object embeds a [`RefCount`] and exposes it
//! through [`RefObj`]. The count starts at zero; the first owner (usually
//! [`Ref::new`](super::Ref::new)) brings it to one.
//!
//! # Operations
//! - increment: always succeeds
//! - decrement-and-maybe-destroy: see [`raw::release`](super::raw::release)
//! - decrement-without-destroy: see [`raw::release_no_destroy`](super::raw::release_no_destroy)
//!
//! # Invariants
//! - The count never goes below zero
//! - The count is exactly zero when the object is destroyed

use core::fmt;
use core::sync::atomic::{fence, AtomicUsize, Ordering};

use crate::contract::contract;

/// Embedded reference counter.
pub struct RefCount {
    count: AtomicUsize,
}

impl RefCount {
    /// Create a counter with no owners.
    pub const fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
        }
    }

    /// Current number of owners. Diagnostics only.
    #[inline]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Add one owner and return the new count.
    #[inline]
    pub fn increment(&self) -> usize {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Add one owner unless there is none left.
    ///
    /// Returns `false` once the count has reached zero: the object is
    /// being destroyed and must not be revived.
    #[inline]
    pub fn try_increment(&self) -> bool {
        let mut current = self.count.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Remove one owner and return the remaining count.
    ///
    /// Returns `None` when there was no owner to remove; the counter is
    /// left at zero in that case. When the result is `Some(0)` the caller
    /// observes every write made by previous owners and may tear the
    /// object down.
    #[inline]
    pub fn decrement(&self) -> Option<usize> {
        let previous = self.count.fetch_sub(1, Ordering::Release);
        if previous == 0 {
            self.count.fetch_add(1, Ordering::Relaxed);
            contract!(false, "reference count underflow");
            return None;
        }
        let remaining = previous - 1;
        if remaining == 0 {
            fence(Ordering::Acquire);
        }
        Some(remaining)
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefCount({})", self.get())
    }
}

impl Drop for RefCount {
    fn drop(&mut self) {
        let count = *self.count.get_mut();
        contract!(count == 0, "object destroyed with {} live references", count);
    }
}

/// A lifecycle-managed object.
///
/// Implementors embed a [`RefCount`] and hand it out here; everything
/// else about ownership is driven by [`Ref`](super::Ref) and the
/// functions in [`raw`](super::raw).
///
/// # Safety
/// `ref_count` must always return the counter embedded in `self`, the
/// same one on every call. [`Ref`](super::Ref) frees the object when
/// that counter reaches zero.
pub unsafe trait RefObj {
    /// The embedded counter.
    fn ref_count(&self) -> &RefCount;

    /// Increment the reference count.
    ///
    /// Every call must eventually be balanced by a release of the same
    /// object, otherwise it is never destroyed.
    #[inline]
    fn add_ref(&self) {
        self.ref_count().increment();
    }
}
