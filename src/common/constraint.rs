use super::Position;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Forbids occupying `position` at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexConstraint {
    pub time: usize,
    pub position: Position,
}

/// Forbids the directed move `from` at `time` to `to` at `time + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeConstraint {
    pub time: usize,
    pub from: Position,
    pub to: Position,
}

/// Constraint set of a single agent.
///
/// Sets are ordered so that two stores holding the same constraints compare
/// and hash equal, which is what the high-level search uses as node identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constraints {
    vertex_constraints: BTreeSet<VertexConstraint>,
    edge_constraints: BTreeSet<EdgeConstraint>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vertex(time: usize, position: Position) -> Self {
        let mut constraints = Self::new();
        constraints
            .vertex_constraints
            .insert(VertexConstraint { time, position });
        constraints
    }

    pub fn from_edge(time: usize, from: Position, to: Position) -> Self {
        let mut constraints = Self::new();
        constraints
            .edge_constraints
            .insert(EdgeConstraint { time, from, to });
        constraints
    }

    /// Set union with `other`. Returns whether anything new was added.
    pub fn add_constraint(&mut self, other: &Constraints) -> bool {
        let before = self.len();
        self.vertex_constraints
            .extend(other.vertex_constraints.iter().copied());
        self.edge_constraints
            .extend(other.edge_constraints.iter().copied());
        self.len() > before
    }

    pub fn len(&self) -> usize {
        self.vertex_constraints.len() + self.edge_constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_superset(&self, other: &Constraints) -> bool {
        self.vertex_constraints.is_superset(&other.vertex_constraints)
            && self.edge_constraints.is_superset(&other.edge_constraints)
    }

    pub fn vertex_constraints(&self) -> impl Iterator<Item = &VertexConstraint> {
        self.vertex_constraints.iter()
    }

    pub fn edge_constraints(&self) -> impl Iterator<Item = &EdgeConstraint> {
        self.edge_constraints.iter()
    }

    pub fn forbids_vertex(&self, time: usize, position: Position) -> bool {
        self.vertex_constraints
            .contains(&VertexConstraint { time, position })
    }

    pub fn forbids_edge(&self, time: usize, from: Position, to: Position) -> bool {
        self.edge_constraints
            .contains(&EdgeConstraint { time, from, to })
    }

    /// Whether `position` is forbidden at some tick strictly after `time`.
    /// An agent cannot stop on its goal while this holds.
    pub fn forbids_position_after(&self, position: Position, time: usize) -> bool {
        self.vertex_constraints
            .iter()
            .any(|constraint| constraint.position == position && constraint.time > time)
    }

    /// Last tick any constraint talks about.
    pub fn latest_time(&self) -> usize {
        let vertex = self.vertex_constraints.iter().map(|c| c.time);
        let edge = self.edge_constraints.iter().map(|c| c.time + 1);
        vertex.chain(edge).max().unwrap_or(0)
    }
}
