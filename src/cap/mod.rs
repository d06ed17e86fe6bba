//! Capability Objects and Identities
//!
//! Implements the COM-style capability model: objects are discovered by a
//! string identity instead of a static type.
//!
//! # Design
//! - An `Iid` names a capability contract
//! - A capability object answers `query_interface(iid)` with a counted
//!   reference, or `None`
//! - Bus-aware objects remember their host bus and continue unanswered
//!   queries there
//!
//! # Security Properties
//! - Matching is exact; there is no wildcard or prefix identity
//! - Every successful match hands out exactly one new reference

pub mod identity;
pub mod object;
pub mod typed;

pub use identity::{
    iid_of, Declared, DeclaredSet, Iid, ObjectKind, IID_BUS, IID_HOSTED, IID_INTERFACE,
};
pub use object::{Component, HostSlot, Hosted, HostedInterface, IRef, Interface, MultiHosted};
pub use typed::Handle;
