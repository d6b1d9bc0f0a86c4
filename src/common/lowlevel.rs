use super::State;

use std::cmp::Ordering;

/// Open-list entry of the low-level search.
///
/// In the time-expanded graph every move costs one tick, so `g_cost` always
/// equals `state.time`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LowLevelOpenNode {
    pub(crate) state: State,
    pub(crate) f_open_cost: usize,
    pub(crate) g_cost: usize,
}

impl Ord for LowLevelOpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_open_cost
            .cmp(&other.f_open_cost)
            // Deterministic tie-break: (time, x, y) ascending.
            .then_with(|| self.state.cmp(&other.state))
    }
}

impl PartialOrd for LowLevelOpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
