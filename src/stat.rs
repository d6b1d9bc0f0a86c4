use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub costs: usize,
    pub time_us: usize,
    pub low_level_expand_nodes: usize,
    pub high_level_expand_nodes: usize,
    pub high_level_generated_nodes: usize,
    pub pruned_branches: usize,
    pub duplicate_nodes: usize,
}

impl Stats {
    pub(crate) fn absorb(&mut self, other: &Stats) {
        self.low_level_expand_nodes += other.low_level_expand_nodes;
        self.high_level_expand_nodes += other.high_level_expand_nodes;
        self.high_level_generated_nodes += other.high_level_generated_nodes;
        self.pruned_branches += other.pruned_branches;
        self.duplicate_nodes += other.duplicate_nodes;
    }

    pub fn print(&self) {
        info!(
            "Cost {:?} Time(microseconds) {:?} High level expand nodes number: {:?} High level generated nodes number: {:?} Pruned branches: {:?} Duplicate nodes: {:?} Low level expand nodes number {:?}",
            self.costs,
            self.time_us,
            self.high_level_expand_nodes,
            self.high_level_generated_nodes,
            self.pruned_branches,
            self.duplicate_nodes,
            self.low_level_expand_nodes
        );
    }
}
