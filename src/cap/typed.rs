//! Typed Capability Handle
//!
//! A [`Handle<T>`] is the scoped reference an application holds to a
//! capability it discovered by identity. It owns one counted reference to
//! the capability object and dereferences to the object's contract value
//! `T`.
//!
//! # Lifecycle
//! - `query` / `query_iid`: the reference taken by the query is adopted
//! - `clone`: acquires another reference
//! - `clone_from`: releases the old target, acquires the new one, unless
//!   both designate the same object
//! - drop: releases exactly once

use core::any::Any;
use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;

use super::identity::{Declared, Iid};
use super::object::{IRef, Interface};
use crate::lifecycle::Ref;

/// Scoped, typed reference to a discovered capability.
pub struct Handle<T: 'static> {
    object: IRef,
    payload: NonNull<T>,
    _contract: PhantomData<T>,
}

// SAFETY: the payload lives inside the counted object, which is shared
// under the same rules as `Ref`.
unsafe impl<T: Send + Sync + 'static> Send for Handle<T> {}
// SAFETY: as above.
unsafe impl<T: Send + Sync + 'static> Sync for Handle<T> {}

impl<T: Any + Send + Sync> Handle<T> {
    /// Wrap an erased capability whose contract value is a `T`.
    ///
    /// Gives the capability back unchanged otherwise.
    pub fn new(object: IRef) -> Result<Self, IRef> {
        let payload = object.payload().downcast_ref::<T>().map(NonNull::from);
        match payload {
            Some(payload) => Ok(Self {
                object,
                payload,
                _contract: PhantomData,
            }),
            None => Err(object),
        }
    }

    /// Query `from` for the capability declared by `T`.
    pub fn query<I: Interface + ?Sized>(from: &I) -> Option<Self>
    where
        T: Declared,
    {
        Self::query_iid(from, T::IID)
    }

    /// Query `from` for `iid`, expecting a `T` contract value.
    ///
    /// A capability that is found but carries another contract type is
    /// released and reported as missing.
    pub fn query_iid<I: Interface + ?Sized>(from: &I, iid: Iid) -> Option<Self> {
        let found = from.query_interface(iid, None)?;
        match Self::new(found) {
            Ok(handle) => Some(handle),
            Err(other) => {
                log::warn!("[QUERY] {} resolved to an object of another contract type", iid);
                drop(other);
                None
            }
        }
    }

    /// The capability object.
    pub fn object(&self) -> &dyn Interface {
        &*self.object
    }

    /// Give up the typed view, keeping the reference.
    pub fn into_object(self) -> IRef {
        self.object
    }

    /// Whether two handles designate the same object.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Ref::ptr_eq(&this.object, &other.object)
    }
}

impl<T: Any + Send + Sync> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            object: Ref::share(&self.object),
            payload: self.payload,
            _contract: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if !Self::ptr_eq(self, source) {
            *self = source.clone();
        }
    }
}

impl<T: 'static> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: `payload` points into the object kept alive by `object`.
        unsafe { self.payload.as_ref() }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&**self).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cap::{Component, Hosted};

    struct Counter {
        start: u32,
    }
    crate::declare_iid!(Counter);

    struct Other;
    crate::declare_iid!(Other, "Counter");

    #[test]
    fn test_query_adopts_reference() {
        let counter = Hosted::new(Counter { start: 7 });
        let handle = Handle::<Counter>::query(&*counter).expect("local match");
        assert_eq!(handle.start, 7);
        assert_eq!(Ref::count(&counter), 2);
        drop(handle);
        assert_eq!(Ref::count(&counter), 1);
    }

    #[test]
    fn test_clone_and_clone_from() {
        let a = Component::new(Counter { start: 1 });
        let b = Component::new(Counter { start: 2 });
        let ha = Handle::<Counter>::query(&*a).expect("a");
        let mut hb = Handle::<Counter>::query(&*b).expect("b");

        let ha2 = ha.clone();
        assert_eq!(Ref::count(&a), 3);

        hb.clone_from(&ha2);
        assert_eq!(hb.start, 1);
        assert_eq!(Ref::count(&a), 4);
        assert_eq!(Ref::count(&b), 1);

        hb.clone_from(&ha);
        assert_eq!(Ref::count(&a), 4);
    }

    #[test]
    fn test_mismatched_contract_is_released() {
        // Same token, different contract type.
        let other = Component::new(Other);
        assert!(Handle::<Counter>::query(&*other).is_none());
        assert_eq!(Ref::count(&other), 1);
    }
}
