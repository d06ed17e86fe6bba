//! Capability Objects
//!
//! A capability object is a lifecycle-managed value that can be asked, by
//! identity, for a counted reference to itself (or, for bus-aware objects,
//! to something reachable through its host bus).
//!
//! # Variants
//! ```text
//! ┌──────────────────┬────────────────────┬──────────┬─────────────────┐
//! │ wrapper          │ matches            │ bus link │ escalates       │
//! ├──────────────────┼────────────────────┼──────────┼─────────────────┤
//! │ Component<T>     │ T::IID             │ no       │ no              │
//! │ Hosted<T>        │ T::IID             │ yes      │ to host bus     │
//! │ MultiHosted<T>   │ T::provides(iid)   │ yes      │ to host bus     │
//! │ Bus              │ IID_BUS            │ yes      │ to host bus     │
//! └──────────────────┴────────────────────┴──────────┴─────────────────┘
//! ```
//! Every variant also answers to the universal identities of its
//! [`ObjectKind`].
//!
//! # Ownership
//! Wrappers are only constructed through their `new` functions, which
//! return a [`Ref`] holding the first reference. That is what allows an
//! object to hand out counted references to itself.

use core::any::{Any, TypeId};
use core::fmt;
use core::ops::Deref;
use core::ptr::NonNull;

use spin::Mutex;

use super::identity::{Declared, DeclaredSet, Iid, ObjectKind};
use crate::bus::{Bus, QueryState};
use crate::lifecycle::{Ref, RefCount, RefObj};

/// Erased handle to a capability object, as returned by queries.
///
/// Not `Clone`: convert with [`Ref::downcast`] or wrap in a
/// [`Handle`](super::Handle) to duplicate it.
pub type IRef = Ref<dyn Interface>;

/// A capability object.
pub trait Interface: RefObj + Any + Send + Sync {
    /// The well-known identities this object answers to.
    fn kind(&self) -> ObjectKind;

    /// Ask for the capability `iid`.
    ///
    /// On success the returned object has been reference-incremented for
    /// the caller. `state` threads the visited-bus set through a multi-hop
    /// query; pass `None` to start a new query.
    fn query_interface(&self, iid: Iid, state: Option<&mut QueryState>) -> Option<IRef>;

    /// The contract value carried by this object.
    fn payload(&self) -> &dyn Any;

    /// Whether `iid` is reachable from this object.
    ///
    /// The probing reference is given back without destroying anything,
    /// since the found object is kept alive by its host.
    fn supports(&self, iid: Iid) -> bool {
        match self.query_interface(iid, None) {
            Some(found) => {
                Ref::release_without_destroy(found);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for dyn Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("kind", &self.kind())
            .field("refs", &self.ref_count().get())
            .finish()
    }
}

/// A capability object that can be hosted on a bus.
pub trait HostedInterface: Interface {
    /// The owning-bus back-reference.
    fn host(&self) -> &HostSlot;

    /// Match `iid` against this object only, never escalating to the
    /// host bus.
    fn local_query_interface(&self, iid: Iid, state: Option<&mut QueryState>) -> Option<IRef>;
}

/// Non-owning pointer to the hosting bus.
#[derive(Clone, Copy)]
struct BusLink(NonNull<Bus>);

// SAFETY: the link is only dereferenced to take a counted reference, and
// `Bus` is `Send + Sync`. Validity is maintained by the bus, which clears
// the link on disconnect and teardown.
unsafe impl Send for BusLink {}
// SAFETY: as above.
unsafe impl Sync for BusLink {}

/// The owning-bus back-reference of a bus-aware object.
///
/// The link is not counted. It is set and cleared exclusively by the
/// hosting [`Bus`]; dereferencing it after the bus is gone would be a
/// contract violation, which the bus prevents by clearing every member's
/// link before it releases them.
pub struct HostSlot {
    bus: Mutex<Option<BusLink>>,
}

impl HostSlot {
    /// An unattached slot.
    pub const fn new() -> Self {
        Self {
            bus: Mutex::new(None),
        }
    }

    /// Whether the owner is currently hosted.
    pub fn is_attached(&self) -> bool {
        self.bus.lock().is_some()
    }

    /// Whether the owner is hosted on `bus`.
    pub fn is_attached_to(&self, bus: &Bus) -> bool {
        matches!(*self.bus.lock(), Some(link) if core::ptr::eq(link.0.as_ptr(), bus))
    }

    /// A counted reference to the hosting bus, if any.
    ///
    /// Returns `None` while the bus is being torn down, even if the link
    /// has not been cleared yet.
    pub fn bus(&self) -> Option<Ref<Bus>> {
        let guard = self.bus.lock();
        let link = (*guard)?;
        // SAFETY:
        // - a dying bus clears this link, under this lock, before its
        //   memory is freed, so the allocation outlives the guard
        // - every `Bus` is allocated by `Ref::new` in `Bus::new`
        unsafe { Ref::try_from_link(link.0) }
    }

    pub(crate) fn attach(&self, bus: &Bus) {
        *self.bus.lock() = Some(BusLink(NonNull::from(bus)));
    }

    /// Clear the link if it still designates `bus`.
    pub(crate) fn detach_from(&self, bus: &Bus) {
        let mut guard = self.bus.lock();
        if matches!(*guard, Some(link) if core::ptr::eq(link.0.as_ptr(), bus)) {
            *guard = None;
        }
    }
}

impl Default for HostSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HostSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.bus.lock() {
            Some(link) => write!(f, "HostSlot({:p})", link.0.as_ptr()),
            None => f.write_str("HostSlot(none)"),
        }
    }
}

/// Continue a failed local match on the host bus, unless the query has
/// already been there.
pub(crate) fn escalate(host: &HostSlot, iid: Iid, state: Option<&mut QueryState>) -> Option<IRef> {
    let bus = host.bus()?;
    match state {
        Some(state) if state.is_visited(&bus) => None,
        state => bus.query_interface(iid, state),
    }
}

impl<T: Interface> Ref<T> {
    /// Erase the concrete type.
    pub fn into_interface(this: Self) -> IRef {
        let ptr: NonNull<dyn Interface> = Ref::<T>::into_raw(this);
        // SAFETY: same allocation and same counted reference, only the
        // pointer type changes.
        unsafe { Ref::from_raw(ptr) }
    }
}

impl<T: HostedInterface> Ref<T> {
    /// Erase the concrete type, keeping bus awareness.
    pub fn into_hosted(this: Self) -> Ref<dyn HostedInterface> {
        let ptr: NonNull<dyn HostedInterface> = Ref::<T>::into_raw(this);
        // SAFETY: same allocation and same counted reference.
        unsafe { Ref::from_raw(ptr) }
    }
}

impl Ref<dyn Interface> {
    /// Recover the concrete wrapper type.
    ///
    /// Gives the handle back unchanged when the object is not a `W`.
    pub fn downcast<W: Interface>(this: Self) -> Result<Ref<W>, Self> {
        // Dispatched through the vtable, so this is the concrete type.
        if Any::type_id(&*this) != TypeId::of::<W>() {
            return Err(this);
        }
        let ptr = Ref::into_raw(this).cast::<W>();
        // SAFETY: the object is a `W`, checked above; the counted
        // reference moves over unchanged.
        Ok(unsafe { Ref::from_raw(ptr) })
    }
}

/// Single-identity capability object, not bus-aware.
pub struct Component<T> {
    refs: RefCount,
    value: T,
}

impl<T: Declared + Send + Sync + 'static> Component<T> {
    pub fn new(value: T) -> Ref<Self> {
        Ref::new(Self {
            refs: RefCount::new(),
            value,
        })
    }
}

impl<T> Deref for Component<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

// SAFETY: returns the embedded counter.
unsafe impl<T> RefObj for Component<T> {
    fn ref_count(&self) -> &RefCount {
        &self.refs
    }
}

impl<T: Declared + Send + Sync + 'static> Interface for Component<T> {
    fn kind(&self) -> ObjectKind {
        ObjectKind::COMPONENT
    }

    fn query_interface(&self, iid: Iid, _state: Option<&mut QueryState>) -> Option<IRef> {
        if iid != T::IID && !self.kind().answers(iid) {
            return None;
        }
        // SAFETY: `Component` is only built by `Component::new`, inside a `Ref`.
        Some(Ref::into_interface(unsafe { Ref::from_borrowed(self) }))
    }

    fn payload(&self) -> &dyn Any {
        &self.value
    }
}

/// Single-identity, bus-aware capability object.
pub struct Hosted<T> {
    refs: RefCount,
    host: HostSlot,
    value: T,
}

impl<T: Declared + Send + Sync + 'static> Hosted<T> {
    pub fn new(value: T) -> Ref<Self> {
        Ref::new(Self {
            refs: RefCount::new(),
            host: HostSlot::new(),
            value,
        })
    }
}

impl<T> Deref for Hosted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

// SAFETY: returns the embedded counter.
unsafe impl<T> RefObj for Hosted<T> {
    fn ref_count(&self) -> &RefCount {
        &self.refs
    }
}

impl<T: Declared + Send + Sync + 'static> Interface for Hosted<T> {
    fn kind(&self) -> ObjectKind {
        ObjectKind::HOSTED_COMPONENT
    }

    fn query_interface(&self, iid: Iid, mut state: Option<&mut QueryState>) -> Option<IRef> {
        if let Some(found) = self.local_query_interface(iid, state.as_deref_mut()) {
            return Some(found);
        }
        escalate(&self.host, iid, state)
    }

    fn payload(&self) -> &dyn Any {
        &self.value
    }
}

impl<T: Declared + Send + Sync + 'static> HostedInterface for Hosted<T> {
    fn host(&self) -> &HostSlot {
        &self.host
    }

    fn local_query_interface(&self, iid: Iid, _state: Option<&mut QueryState>) -> Option<IRef> {
        if iid != T::IID && !self.kind().answers(iid) {
            return None;
        }
        // SAFETY: `Hosted` is only built by `Hosted::new`, inside a `Ref`.
        Some(Ref::into_interface(unsafe { Ref::from_borrowed(self) }))
    }
}

/// Multi-identity, bus-aware capability object.
pub struct MultiHosted<T> {
    refs: RefCount,
    host: HostSlot,
    value: T,
}

impl<T: DeclaredSet + Send + Sync + 'static> MultiHosted<T> {
    pub fn new(value: T) -> Ref<Self> {
        Ref::new(Self {
            refs: RefCount::new(),
            host: HostSlot::new(),
            value,
        })
    }
}

impl<T> Deref for MultiHosted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

// SAFETY: returns the embedded counter.
unsafe impl<T> RefObj for MultiHosted<T> {
    fn ref_count(&self) -> &RefCount {
        &self.refs
    }
}

impl<T: DeclaredSet + Send + Sync + 'static> Interface for MultiHosted<T> {
    fn kind(&self) -> ObjectKind {
        ObjectKind::HOSTED_COMPONENT
    }

    fn query_interface(&self, iid: Iid, mut state: Option<&mut QueryState>) -> Option<IRef> {
        if let Some(found) = self.local_query_interface(iid, state.as_deref_mut()) {
            return Some(found);
        }
        escalate(&self.host, iid, state)
    }

    fn payload(&self) -> &dyn Any {
        &self.value
    }
}

impl<T: DeclaredSet + Send + Sync + 'static> HostedInterface for MultiHosted<T> {
    fn host(&self) -> &HostSlot {
        &self.host
    }

    fn local_query_interface(&self, iid: Iid, _state: Option<&mut QueryState>) -> Option<IRef> {
        if !T::provides(iid) && !self.kind().answers(iid) {
            return None;
        }
        // SAFETY: `MultiHosted` is only built by `MultiHosted::new`, inside a `Ref`.
        Some(Ref::into_interface(unsafe { Ref::from_borrowed(self) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cap::{IID_BUS, IID_HOSTED, IID_INTERFACE};

    struct Hello;
    crate::declare_iid!(Hello);

    impl Hello {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    struct Reader;
    crate::declare_iid!(Reader);
    struct Writer;
    crate::declare_iid!(Writer);

    struct File;
    crate::declare_interfaces!(File: Reader, Writer);

    #[test]
    fn test_component_matches_own_identity() {
        let hello = Component::new(Hello);
        let found = hello.query_interface(Iid::new("Hello"), None);
        assert!(found.is_some());
        assert_eq!(Ref::count(&hello), 2);
        drop(found);
        assert_eq!(Ref::count(&hello), 1);
    }

    #[test]
    fn test_component_rejects_other_identities() {
        let hello = Component::new(Hello);
        assert!(hello.query_interface(Iid::new("Goodbye"), None).is_none());
        assert!(hello.query_interface(IID_HOSTED, None).is_none());
        assert!(hello.query_interface(IID_INTERFACE, None).is_some());
        assert_eq!(Ref::count(&hello), 1);
    }

    #[test]
    fn test_hosted_answers_universal_identities() {
        let hello = Hosted::new(Hello);
        assert!(hello.supports(IID_INTERFACE));
        assert!(hello.supports(IID_HOSTED));
        assert!(!hello.supports(IID_BUS));
        assert_eq!(Ref::count(&hello), 1);
    }

    #[test]
    fn test_unhosted_object_does_not_escalate() {
        let hello = Hosted::new(Hello);
        let mut state = QueryState::new();
        assert!(hello.query_interface(Iid::new("Missing"), Some(&mut state)).is_none());
        assert_eq!(state.visited_count(), 0);
    }

    #[test]
    fn test_multi_hosted_matches_declared_set() {
        let file = MultiHosted::new(File);
        assert!(file.supports(Reader::IID));
        assert!(file.supports(Writer::IID));
        assert!(!file.supports(Hello::IID));
    }

    #[test]
    fn test_downcast_recovers_wrapper() {
        let hello = Hosted::new(Hello);
        let found = hello.query_interface(Hello::IID, None).expect("local match");
        let found = Ref::downcast::<Component<Hello>>(found)
            .err()
            .expect("not a Component");
        let typed = Ref::downcast::<Hosted<Hello>>(found).expect("is Hosted");
        assert!(Ref::ptr_eq(&typed, &hello));
        assert_eq!(typed.greet(), "hello");
    }

    /// Reports another type's payload.
    struct Impostor {
        refs: RefCount,
        small: u8,
    }

    // SAFETY: returns the embedded counter.
    unsafe impl RefObj for Impostor {
        fn ref_count(&self) -> &RefCount {
            &self.refs
        }
    }

    impl Interface for Impostor {
        fn kind(&self) -> ObjectKind {
            ObjectKind::COMPONENT
        }

        fn query_interface(&self, _iid: Iid, _state: Option<&mut QueryState>) -> Option<IRef> {
            None
        }

        fn payload(&self) -> &dyn Any {
            &Hello
        }
    }

    #[test]
    fn test_downcast_checks_concrete_type() {
        let erased = Ref::into_interface(Ref::new(Impostor {
            refs: RefCount::new(),
            small: 4,
        }));
        assert!(erased.payload().is::<Hello>());

        let erased = Ref::downcast::<Component<Hello>>(erased)
            .err()
            .expect("not a Component");
        let erased = Ref::downcast::<Hosted<Hello>>(erased)
            .err()
            .expect("not Hosted");
        let impostor = Ref::downcast::<Impostor>(erased)
            .ok()
            .expect("is an Impostor");
        assert_eq!(impostor.small, 4);
        assert_eq!(Ref::count(&impostor), 1);
    }

    #[test]
    fn test_payload_is_the_contract_value() {
        let hello = Component::new(Hello);
        assert!(hello.payload().is::<Hello>());
        assert!(!hello.payload().is::<Reader>());
    }
}
