//! Scoped Reference Handle
//!
//! [`Ref<T>`] owns exactly one counted reference to a lifecycle object.
//!
//! # Design
//! - `Ref::new` allocates the object and takes the first reference
//! - Cloning acquires a new reference
//! - Dropping releases it, destroying the object on the last release
//! - Raw pointers can enter (`from_raw`, `from_borrowed`) and leave
//!   (`into_raw`) the scheme explicitly
//!
//! `Ref<T>` is only `Clone` for sized `T`. The erased capability handle
//! `Ref<dyn Interface>` cannot be duplicated; convert it to a typed handle
//! first.
//!
//! ```text
//!  Ref<T> ──ptr──▶ ┌────────────────────┐
//!  Ref<T> ──ptr──▶ │ T { RefCount = 2 } │  heap, freed at count 0
//!                  └────────────────────┘
//! ```

use alloc::boxed::Box;
use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;

use super::raw;
use super::refcount::RefObj;

/// Owning handle to a reference-counted object.
pub struct Ref<T: ?Sized + RefObj> {
    ptr: NonNull<T>,
    _owns: PhantomData<T>,
}

// SAFETY: the counter is atomic, so handles may move between threads as
// long as the object itself may be shared.
unsafe impl<T: ?Sized + RefObj + Send + Sync> Send for Ref<T> {}
// SAFETY: as above; `&Ref<T>` only exposes `&T`.
unsafe impl<T: ?Sized + RefObj + Send + Sync> Sync for Ref<T> {}

impl<T: RefObj> Ref<T> {
    /// Move `value` to the heap and take the first reference to it.
    pub fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        // SAFETY: `ptr` was just allocated by `Box` and is live.
        unsafe { raw::retain(ptr) };
        Self {
            ptr,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized + RefObj> Ref<T> {
    /// Adopt a reference that has already been counted.
    ///
    /// # Safety
    /// - `ptr` must address a live object allocated by `Ref::new`
    /// - the caller transfers ownership of one counted reference
    #[inline]
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self {
            ptr,
            _owns: PhantomData,
        }
    }

    /// Acquire a new reference to an object reached through a borrow.
    ///
    /// This is how an object hands out a counted reference to itself.
    ///
    /// # Safety
    /// `obj` must live inside an allocation made by `Ref::new`; objects
    /// on the stack or in other containers must never be passed here.
    #[inline]
    pub unsafe fn from_borrowed(obj: &T) -> Self {
        let ptr = NonNull::from(obj);
        // SAFETY: the borrow proves the object is live; the caller
        // guarantees it is `Ref`-allocated.
        unsafe {
            raw::retain(ptr);
            Self::from_raw(ptr)
        }
    }

    /// Acquire a new reference unless the object is already being
    /// destroyed.
    ///
    /// Used to follow an uncounted link, which may still point at an
    /// object whose last reference is being released.
    ///
    /// # Safety
    /// `ptr` must address an object allocated by `Ref::new` whose memory
    /// stays allocated for the duration of the call.
    #[inline]
    pub unsafe fn try_from_link(ptr: NonNull<T>) -> Option<Self> {
        // SAFETY: forwarded from the caller.
        if unsafe { raw::try_retain(ptr) } {
            // SAFETY: the reference was counted just above.
            Some(unsafe { Self::from_raw(ptr) })
        } else {
            None
        }
    }

    /// Give up the handle without releasing its reference.
    #[inline]
    pub fn into_raw(this: Self) -> NonNull<T> {
        let ptr = this.ptr;
        core::mem::forget(this);
        ptr
    }

    /// The object pointer. The reference stays owned by `this`.
    #[inline]
    pub fn as_ptr(this: &Self) -> NonNull<T> {
        this.ptr
    }

    /// Address of the object, without pointer metadata.
    #[inline]
    pub fn addr(this: &Self) -> *const () {
        this.ptr.as_ptr() as *const ()
    }

    /// Whether two handles designate the same object.
    #[inline]
    pub fn ptr_eq<U: ?Sized + RefObj>(this: &Self, other: &Ref<U>) -> bool {
        Self::addr(this) == Ref::addr(other)
    }

    /// Current reference count. Diagnostics only.
    #[inline]
    pub fn count(this: &Self) -> usize {
        this.ref_count().get()
    }

    /// Acquire another reference to the same object.
    ///
    /// Unlike `Clone` this is available for unsized targets; the crate
    /// uses it to snapshot member lists.
    #[inline]
    pub(crate) fn share(this: &Self) -> Self {
        // SAFETY: `this` owns a reference, so the object is live and was
        // allocated by `Ref::new`.
        unsafe { Self::from_borrowed(&**this) }
    }

    /// Give back this reference without ever destroying the object.
    ///
    /// Balances a reference taken only to inspect an object that another
    /// owner keeps alive. If this was the last reference the object is
    /// leaked.
    #[inline]
    pub fn release_without_destroy(this: Self) {
        let ptr = Self::into_raw(this);
        // SAFETY: the reference was owned by the consumed handle.
        unsafe { raw::release_no_destroy(ptr) };
    }
}

impl<T: RefObj> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self::share(self)
    }

    /// Retarget this handle, unless it already designates the same object.
    fn clone_from(&mut self, source: &Self) {
        if !Self::ptr_eq(self, source) {
            *self = Self::share(source);
        }
    }
}

impl<T: ?Sized + RefObj> Deref for Ref<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the handle owns a reference, so the object is live.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized + RefObj> Drop for Ref<T> {
    fn drop(&mut self) {
        // SAFETY: the handle owns exactly one reference, released here once.
        unsafe {
            raw::release(self.ptr);
        }
    }
}

impl<T: ?Sized + RefObj + fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
