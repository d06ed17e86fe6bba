//! capbus - In-Process Capability Broker
//!
//! Components discover each other's capabilities at runtime through a
//! string identity instead of a static type, with explicit reference
//! counting and bus-scoped discovery.
//!
//! # Building Blocks
//! - Intrusive reference counting (`lifecycle`)
//! - Capability identities and objects (`cap`)
//! - Interface buses with security levels (`bus`)
//!
//! # Security Features
//! - Lower bus levels are more secure
//! - Queries never descend into a strictly more secure bus
//! - Every traversal is bounded by a per-query visited set
//!
//! # Example
//! ```
//! use capbus::{declare_iid, Bus, Handle, Hosted};
//!
//! struct Clock {
//!     ticks: u64,
//! }
//! declare_iid!(Clock);
//!
//! struct Logger;
//! declare_iid!(Logger);
//!
//! let bus = Bus::new(0);
//! let clock = Hosted::new(Clock { ticks: 42 });
//! let logger = Hosted::new(Logger);
//! assert!(bus.connect(&clock));
//! assert!(bus.connect(&logger));
//!
//! // The logger finds the clock through its host bus.
//! let found = Handle::<Clock>::query(&*logger).unwrap();
//! assert_eq!(found.ticks, 42);
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

mod contract;

pub mod bus;
pub mod cap;
pub mod lifecycle;

pub use bus::{Bus, BusLevel, ConnectError, QueryState, TOP_SECRET};
pub use cap::{
    iid_of, Component, Declared, DeclaredSet, Handle, HostSlot, Hosted, HostedInterface, IRef,
    Iid, Interface, MultiHosted, ObjectKind, IID_BUS, IID_HOSTED, IID_INTERFACE,
};
pub use lifecycle::{Ref, RefCount, RefObj};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
