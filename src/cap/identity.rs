//! Capability Identities
//!
//! A capability contract is named by an [`Iid`]: an immutable string
//! token compared by exact equality. There is no prefix, wildcard or
//! version matching.
//!
//! # Well-known identities
//! ```text
//! ┌───────────────┬──────────────────────────────────────┬──────────────┐
//! │ constant      │ token                                │ answered by  │
//! ├───────────────┼──────────────────────────────────────┼──────────────┤
//! │ IID_INTERFACE │ B4FF784E-2DDA-4CA2-BC84-4AAD35FCAAF3 │ every object │
//! │ IID_HOSTED    │ 632B176F-E7B9-4557-9657-15DB3AC94FBC │ bus-aware    │
//! │ IID_BUS       │ B7914714-4159-48C6-BFF3-A21C6F0BB1CA │ buses        │
//! └───────────────┴──────────────────────────────────────┴──────────────┘
//! ```

use core::fmt;

use bitflags::bitflags;

/// Identity of a capability contract.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Iid(&'static str);

impl Iid {
    /// Create an identity from its token.
    ///
    /// # Panics
    /// If `name` is empty (at compile time when used in a `const`).
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        assert!(!name.is_empty(), "capability identity must not be empty");
        Self(name)
    }

    /// The token.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iid({})", self.0)
    }
}

impl fmt::Display for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Universal identity: any lifecycle-managed capability object.
pub const IID_INTERFACE: Iid = Iid::new("B4FF784E-2DDA-4CA2-BC84-4AAD35FCAAF3");

/// Universal identity: any bus-aware capability object.
pub const IID_HOSTED: Iid = Iid::new("632B176F-E7B9-4557-9657-15DB3AC94FBC");

/// Identity of a bus.
pub const IID_BUS: Iid = Iid::new("B7914714-4159-48C6-BFF3-A21C6F0BB1CA");

bitflags! {
    /// The well-known identities an object answers to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ObjectKind: u8 {
        /// Lifecycle-managed capability object.
        const INTERFACE = 1 << 0;
        /// Can be hosted on a bus.
        const HOSTED = 1 << 1;
        /// Is a bus.
        const BUS = 1 << 2;
    }
}

impl ObjectKind {
    /// Plain capability object.
    pub const COMPONENT: Self = Self::INTERFACE;

    /// Bus-aware capability object.
    pub const HOSTED_COMPONENT: Self = Self::INTERFACE.union(Self::HOSTED);

    /// Bus.
    pub const BUS_NODE: Self = Self::HOSTED_COMPONENT.union(Self::BUS);

    /// Whether an object of this kind answers to the well-known `iid`.
    #[inline]
    pub fn answers(self, iid: Iid) -> bool {
        (iid == IID_INTERFACE && self.contains(Self::INTERFACE))
            || (iid == IID_HOSTED && self.contains(Self::HOSTED))
            || (iid == IID_BUS && self.contains(Self::BUS))
    }
}

/// A type that declares a single capability identity.
///
/// Usually implemented with [`declare_iid!`](crate::declare_iid).
pub trait Declared {
    const IID: Iid;
}

/// A type that declares a set of capability identities.
///
/// `provides` is the matching predicate; the default checks membership in
/// `IIDS`. Usually implemented with
/// [`declare_interfaces!`](crate::declare_interfaces).
pub trait DeclaredSet {
    const IIDS: &'static [Iid];

    fn provides(iid: Iid) -> bool {
        Self::IIDS.contains(&iid)
    }
}

/// Identity declared by `T`.
#[inline]
pub const fn iid_of<T: Declared>() -> Iid {
    T::IID
}

/// Declare the capability identity of a type.
///
/// The token defaults to the type name.
///
/// ```ignore
/// struct Hello;
/// declare_iid!(Hello);                    // token "Hello"
/// declare_iid!(Storage, "storage.v2");    // explicit token
/// ```
#[macro_export]
macro_rules! declare_iid {
    ($ty:ty) => {
        impl $crate::cap::Declared for $ty {
            const IID: $crate::cap::Iid = $crate::cap::Iid::new(stringify!($ty));
        }
    };
    ($ty:ty, $name:expr) => {
        impl $crate::cap::Declared for $ty {
            const IID: $crate::cap::Iid = $crate::cap::Iid::new($name);
        }
    };
}

/// Declare the set of contracts a multi-identity type implements.
///
/// Each listed contract must implement `Declared`.
///
/// ```ignore
/// declare_interfaces!(Codec: Encoder, Decoder);
/// ```
#[macro_export]
macro_rules! declare_interfaces {
    ($ty:ty : $($contract:ty),+ $(,)?) => {
        impl $crate::cap::DeclaredSet for $ty {
            const IIDS: &'static [$crate::cap::Iid] =
                &[$(<$contract as $crate::cap::Declared>::IID),+];
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    crate::declare_iid!(Alpha);

    struct Beta;
    crate::declare_iid!(Beta, "beta.v1");

    struct Both;
    crate::declare_interfaces!(Both: Alpha, Beta);

    #[test]
    fn test_identity_is_exact() {
        assert_eq!(Iid::new("IA"), Iid::new("IA"));
        assert_ne!(Iid::new("IA"), Iid::new("IA2"));
        assert_ne!(Iid::new("IA"), Iid::new("ia"));
    }

    #[test]
    fn test_declared_tokens() {
        assert_eq!(iid_of::<Alpha>().as_str(), "Alpha");
        assert_eq!(Beta::IID.as_str(), "beta.v1");
    }

    #[test]
    fn test_declared_set_predicate() {
        assert!(Both::provides(Alpha::IID));
        assert!(Both::provides(Iid::new("beta.v1")));
        assert!(!Both::provides(Iid::new("Beta")));
    }

    #[test]
    fn test_kind_answers_universal_identities() {
        assert!(ObjectKind::COMPONENT.answers(IID_INTERFACE));
        assert!(!ObjectKind::COMPONENT.answers(IID_HOSTED));
        assert!(ObjectKind::HOSTED_COMPONENT.answers(IID_HOSTED));
        assert!(!ObjectKind::HOSTED_COMPONENT.answers(IID_BUS));
        assert!(ObjectKind::BUS_NODE.answers(IID_BUS));
        assert!(!ObjectKind::BUS_NODE.answers(Iid::new("IA")));
    }
}
