//! Interface Buses
//!
//! Buses aggregate capability objects and other buses into a topology
//! that queries can traverse.
//!
//! # Design
//! - A bus owns its members (leaf objects and child buses)
//! - Members hold a non-owning back-reference to their bus
//! - A `QueryState` carries the visited set through one traversal
//!
//! # Security Properties
//! - Buses have a fixed security level; lower is more secure
//! - A bus only accepts child buses at least as secure as itself
//! - Traversal never descends into a strictly more secure child

pub mod state;
pub mod topology;

pub use state::QueryState;
pub use topology::{Bus, BusLevel, ConnectError, TOP_SECRET};
