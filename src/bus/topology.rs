//! Interface Bus
//!
//! A [`Bus`] hosts capability objects and other buses, and answers queries
//! on their behalf.
//!
//! # Topology
//! ```text
//!      BUS1 (level 1): IC, ID ──┐          upward: back-reference
//!                               │ child      (non-owning, uncounted)
//!      BUS0 (level 0): IA, IB ◀─┘
//! ```
//!
//! # Level rules
//! - connect: a child bus is accepted only if `child.level <= self.level`
//! - downward scan: a child bus is searched only if `child.level >= self.level`
//! - upward delegation: always allowed, once per bus per query
//!
//! Level 0 is the most secure. A capability on a secure bus can reach
//! everything on the buses it was connected into; a less secure bus never
//! discovers a strictly more secure child through traversal.

use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use spin::Mutex;

use super::state::QueryState;
use crate::cap::identity::{Declared, Iid, ObjectKind, IID_BUS};
use crate::cap::object::{escalate, HostSlot, HostedInterface, IRef, Interface};
use crate::contract::contract;
use crate::lifecycle::{Ref, RefCount, RefObj};

/// Security level of a bus. Lower is more secure.
pub type BusLevel = i32;

/// The most secure bus level.
pub const TOP_SECRET: BusLevel = 0;

/// Error type for bus connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// The member bus is less secure than this bus.
    LevelViolation {
        /// Level of the bus being connected.
        member: BusLevel,
        /// Level of the hosting bus.
        bus: BusLevel,
    },
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LevelViolation { member, bus } => write!(
                f,
                "bus level {} is less secure than host bus level {}",
                member, bus
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConnectError {}

/// Members of a bus, in connection order.
#[derive(Default)]
struct Members {
    leaves: Vec<Ref<dyn HostedInterface>>,
    buses: Vec<Ref<Bus>>,
}

/// Capability object that aggregates other capability objects and buses.
pub struct Bus {
    refs: RefCount,
    level: BusLevel,
    host: HostSlot,
    members: Mutex<Members>,
}

impl Bus {
    /// Create a standalone bus. The level is fixed for its lifetime.
    pub fn new(level: BusLevel) -> Ref<Bus> {
        log::debug!("[BUS] created bus at level {}", level);
        Ref::new(Self {
            refs: RefCount::new(),
            level,
            host: HostSlot::new(),
            members: Mutex::new(Members::default()),
        })
    }

    /// The security level.
    #[inline]
    pub fn level(&self) -> BusLevel {
        self.level
    }

    /// Connect `member`, returning whether the connection was accepted.
    pub fn connect<T: HostedInterface>(&self, member: &Ref<T>) -> bool {
        self.try_connect(member).is_ok()
    }

    /// Connect `member` to this bus.
    ///
    /// A member that is itself a bus becomes a child bus, provided it is at
    /// least as secure as this bus. Any other member becomes a leaf. Either
    /// way the bus takes a reference to the member and becomes its host.
    pub fn try_connect<T: HostedInterface>(&self, member: &Ref<T>) -> Result<(), ConnectError> {
        // Ask the member itself; its host must not answer for it.
        if let Some(found) = member.local_query_interface(IID_BUS, None) {
            if let Ok(child) = Ref::downcast::<Bus>(found) {
                return self.adopt_bus(child);
            }
        }

        let leaf = Ref::into_hosted(member.clone());
        leaf.host().attach(self);
        self.members.lock().leaves.push(leaf);
        log::debug!("[BUS] level {}: connected leaf", self.level);
        Ok(())
    }

    fn adopt_bus(&self, child: Ref<Bus>) -> Result<(), ConnectError> {
        if child.level > self.level {
            log::warn!(
                "[BUS] level {}: rejected child bus at level {}",
                self.level,
                child.level
            );
            return Err(ConnectError::LevelViolation {
                member: child.level,
                bus: self.level,
            });
        }
        child.host.attach(self);
        log::debug!(
            "[BUS] level {}: connected child bus at level {}",
            self.level,
            child.level
        );
        self.members.lock().buses.push(child);
        Ok(())
    }

    /// Connect `member` only if `iid` is not already reachable from this bus.
    ///
    /// Returns whether `member` was connected.
    pub fn connect_if_absent<T: HostedInterface>(&self, iid: Iid, member: &Ref<T>) -> bool {
        if self.supports(iid) {
            log::debug!("[BUS] level {}: {} already present", self.level, iid);
            return false;
        }
        self.connect(member)
    }

    /// Disconnect `member` from this bus.
    ///
    /// Leaves are searched first, then child buses. The member loses its
    /// host and the bus releases its reference; handles obtained before
    /// the disconnection stay valid. Returns whether `member` was found.
    pub fn disconnect<T: ?Sized + RefObj>(&self, member: &Ref<T>) -> bool {
        let addr = Ref::addr(member);
        let detached = {
            let mut members = self.members.lock();
            if let Some(pos) = members.leaves.iter().position(|m| Ref::addr(m) == addr) {
                Some(members.leaves.remove(pos))
            } else if let Some(pos) = members.buses.iter().position(|b| Ref::addr(b) == addr) {
                Some(Ref::into_hosted(members.buses.remove(pos)))
            } else {
                None
            }
        };

        match detached {
            Some(member) => {
                member.host().detach_from(self);
                log::debug!("[BUS] level {}: disconnected member", self.level);
                true
            }
            None => {
                log::debug!("[BUS] level {}: disconnect of unknown member", self.level);
                false
            }
        }
    }

    /// First directly connected child bus at exactly `level`.
    ///
    /// Grandchildren are not searched.
    pub fn find_first_bus_by_level(&self, level: BusLevel) -> Option<Ref<Bus>> {
        self.members
            .lock()
            .buses
            .iter()
            .find(|bus| bus.level == level)
            .cloned()
    }

    /// Number of directly hosted leaf objects.
    pub fn leaf_count(&self) -> usize {
        self.members.lock().leaves.len()
    }

    /// Number of directly connected child buses.
    pub fn bus_count(&self) -> usize {
        self.members.lock().buses.len()
    }

    /// Counted copies of the leaf list, so no lock is held while recursing.
    fn snapshot_leaves(&self) -> Vec<Ref<dyn HostedInterface>> {
        self.members.lock().leaves.iter().map(Ref::share).collect()
    }

    fn snapshot_buses(&self) -> Vec<Ref<Bus>> {
        self.members.lock().buses.clone()
    }

    fn self_ref(&self) -> IRef {
        // SAFETY: `Bus` is only built by `Bus::new`, inside a `Ref`.
        Ref::into_interface(unsafe { Ref::from_borrowed(self) })
    }
}

impl Declared for Bus {
    const IID: Iid = IID_BUS;
}

// SAFETY: returns the embedded counter.
unsafe impl RefObj for Bus {
    fn ref_count(&self) -> &RefCount {
        &self.refs
    }
}

impl Interface for Bus {
    fn kind(&self) -> ObjectKind {
        ObjectKind::BUS_NODE
    }

    /// Search this bus and what it can see, then its host bus.
    fn query_interface(&self, iid: Iid, state: Option<&mut QueryState>) -> Option<IRef> {
        let mut fresh = None;
        let state = match state {
            Some(state) => state,
            None => fresh.insert(QueryState::new()),
        };
        if let Some(found) = self.local_query_interface(iid, Some(&mut *state)) {
            return Some(found);
        }
        log::trace!("[QUERY] {} not found below level {}, going up", iid, self.level);
        escalate(&self.host, iid, Some(state))
    }

    fn payload(&self) -> &dyn Any {
        self
    }
}

impl HostedInterface for Bus {
    fn host(&self) -> &HostSlot {
        &self.host
    }

    /// Search this bus, its leaves and its visible child buses.
    fn local_query_interface(&self, iid: Iid, state: Option<&mut QueryState>) -> Option<IRef> {
        if self.kind().answers(iid) {
            return Some(self.self_ref());
        }

        let mut fresh = None;
        let state = match state {
            Some(state) => state,
            None => fresh.insert(QueryState::new()),
        };
        state.mark_visited(self);

        for leaf in self.snapshot_leaves() {
            if let Some(found) = leaf.local_query_interface(iid, Some(&mut *state)) {
                log::trace!("[QUERY] {} found on level {}", iid, self.level);
                return Some(found);
            }
        }

        for child in self.snapshot_buses() {
            // Strictly more secure children stay hidden from traversal.
            if child.level < self.level || state.is_visited(&child) {
                continue;
            }
            if let Some(found) = child.local_query_interface(iid, Some(&mut *state)) {
                return Some(found);
            }
        }

        None
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        contract!(
            !self.host.is_attached(),
            "bus at level {} destroyed while still connected",
            self.level
        );

        let members = core::mem::take(self.members.get_mut());
        log::debug!(
            "[BUS] level {}: tearing down ({} leaves, {} buses)",
            self.level,
            members.leaves.len(),
            members.buses.len()
        );
        // Cut every back-reference before the first release, since a
        // member's drop may query through its host.
        for leaf in &members.leaves {
            leaf.host().detach_from(self);
        }
        for child in &members.buses {
            child.host.detach_from(self);
        }
        members.leaves.into_iter().rev().for_each(drop);
        members.buses.into_iter().rev().for_each(drop);
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self.members.lock();
        f.debug_struct("Bus")
            .field("level", &self.level)
            .field("leaves", &members.leaves.len())
            .field("buses", &members.buses.len())
            .field("refs", &self.refs.get())
            .finish()
    }
}
