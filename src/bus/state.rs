//! Query State
//!
//! A [`QueryState`] lives for one logical query and records every bus the
//! query has entered. A bus that is marked is never entered again by the
//! same query, so traversal terminates on cyclic and diamond topologies.
//!
//! Each marked bus is held by a counted reference until the state is
//! dropped, which keeps the buses alive for the duration of the query.

use alloc::vec::Vec;

use super::topology::Bus;
use crate::lifecycle::Ref;

/// Visited-bus set for one query.
#[derive(Default)]
pub struct QueryState {
    visited: Vec<Ref<Bus>>,
}

impl QueryState {
    /// A state with nothing visited.
    pub const fn new() -> Self {
        Self {
            visited: Vec::new(),
        }
    }

    /// Record `bus` as visited for the rest of the query.
    ///
    /// Marking an already visited bus does nothing.
    pub fn mark_visited(&mut self, bus: &Bus) {
        if self.is_visited(bus) {
            return;
        }
        // SAFETY: every `Bus` is allocated by `Ref::new` in `Bus::new`.
        self.visited.push(unsafe { Ref::from_borrowed(bus) });
    }

    /// Whether `bus` has been entered by this query.
    pub fn is_visited(&self, bus: &Bus) -> bool {
        self.visited
            .iter()
            .any(|seen| core::ptr::eq(&**seen, bus))
    }

    /// Number of distinct buses visited so far.
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

impl core::fmt::Debug for QueryState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.visited.iter().map(|bus| bus.level()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_check() {
        let a = Bus::new(0);
        let b = Bus::new(1);
        let mut state = QueryState::new();

        assert!(!state.is_visited(&a));
        state.mark_visited(&a);
        assert!(state.is_visited(&a));
        assert!(!state.is_visited(&b));
    }

    #[test]
    fn test_marking_twice_is_idempotent() {
        let a = Bus::new(0);
        let mut state = QueryState::new();
        state.mark_visited(&a);
        state.mark_visited(&a);
        assert_eq!(state.visited_count(), 1);
        assert_eq!(Ref::count(&a), 2);
    }

    #[test]
    fn test_drop_releases_visited_buses() {
        let a = Bus::new(0);
        {
            let mut state = QueryState::new();
            state.mark_visited(&a);
            assert_eq!(Ref::count(&a), 2);
        }
        assert_eq!(Ref::count(&a), 1);
    }
}
