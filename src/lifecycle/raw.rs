//! Raw Lifecycle Operations
//!
//! The three reference operations on a raw object pointer. Application
//! code should not need these: [`Ref`](super::Ref) performs them on
//! clone and drop. They exist for code that hands references across a
//! boundary as bare pointers.
//!
//! Every pointer passed here must come from
//! [`Ref::into_raw`](super::Ref::into_raw) (directly or through
//! [`Ref::as_ptr`](super::Ref::as_ptr) while a handle is alive), i.e. it
//! must address an object allocated by [`Ref::new`](super::Ref::new).

use alloc::boxed::Box;
use core::ptr::NonNull;

use super::refcount::RefObj;

/// Increment the reference count of `ptr`.
///
/// # Safety
/// `ptr` must address a live object allocated by `Ref::new`.
#[inline]
pub unsafe fn retain<T: ?Sized + RefObj>(ptr: NonNull<T>) {
    // SAFETY: the caller guarantees the object is live.
    unsafe { ptr.as_ref() }.add_ref();
}

/// Increment the reference count of `ptr` unless it already reached zero.
///
/// Returns whether a reference was taken. A `false` result means the
/// object is being torn down by its last owner.
///
/// # Safety
/// `ptr` must address an object allocated by `Ref::new` whose memory is
/// not freed for the duration of the call.
#[inline]
pub unsafe fn try_retain<T: ?Sized + RefObj>(ptr: NonNull<T>) -> bool {
    // SAFETY: the caller guarantees the memory is still allocated.
    unsafe { ptr.as_ref() }.ref_count().try_increment()
}

/// Decrement the reference count of `ptr`, destroying the object when it
/// reaches zero.
///
/// Returns `true` when the object was destroyed; the pointer must not be
/// used again in that case.
///
/// # Safety
/// - `ptr` must address a live object allocated by `Ref::new`
/// - the caller must own one of the references being counted
#[inline]
pub unsafe fn release<T: ?Sized + RefObj>(ptr: NonNull<T>) -> bool {
    // SAFETY: the caller owns a reference, so the object is live.
    let remaining = unsafe { ptr.as_ref() }.ref_count().decrement();
    if remaining != Some(0) {
        return false;
    }
    // SAFETY:
    // - the count reached zero, so no other owner can observe the object
    // - the allocation was produced by `Box::into_raw` in `Ref::new`
    drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    true
}

/// Decrement the reference count of `ptr` without ever destroying it.
///
/// Used to give back a reference that was taken only to inspect an object
/// which some other owner keeps alive. If nobody else owns the object it
/// is leaked, never freed.
///
/// # Safety
/// - `ptr` must address a live object allocated by `Ref::new`
/// - the caller must own one of the references being counted
#[inline]
pub unsafe fn release_no_destroy<T: ?Sized + RefObj>(ptr: NonNull<T>) {
    // SAFETY: the caller owns a reference, so the object is live.
    let _ = unsafe { ptr.as_ref() }.ref_count().decrement();
}
