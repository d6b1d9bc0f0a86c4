mod constraint;
mod highlevel;
mod lowlevel;

pub use constraint::{Constraints, EdgeConstraint, VertexConstraint};
pub use highlevel::{Conflict, ConflictType, HighLevelNode};
pub(crate) use lowlevel::LowLevelOpenNode;

use crate::world::World;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A grid cell. `x` grows to the right, `y` grows upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    pub fn manhattan_distance(&self, other: &Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<(usize, usize)> for Position {
    fn from((x, y): (usize, usize)) -> Self {
        Position { x, y }
    }
}

/// An agent's occupancy of one cell at one tick.
///
/// Ordering is lexicographic on `(time, x, y)`, which is also the tie-break
/// the low-level search uses between open nodes of equal `f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct State {
    pub time: usize,
    pub position: Position,
}

impl State {
    pub fn new(time: usize, position: Position) -> Self {
        State { time, position }
    }

    /// Goal-equality: only the cells are compared.
    pub fn is_equal_except_time(&self, other: &State) -> bool {
        self.position == other.position
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: Position,
    pub goal: Position,
}

impl Agent {
    pub fn new(id: usize, start: impl Into<Position>, goal: impl Into<Position>) -> Self {
        Agent {
            id,
            start: start.into(),
            goal: goal.into(),
        }
    }
}

pub type Path = Vec<State>;

/// State of an agent at `time`. Agents that already finished their path stay
/// parked on its last cell.
pub(crate) fn state_at(path: &[State], time: usize) -> Option<&State> {
    path.get(time).or_else(|| path.last())
}

/// Sum of path lengths, counted in states.
pub fn flowtime(paths: &[Path]) -> usize {
    paths.iter().map(Vec::len).sum()
}

/// A conflict-free joint plan, keyed by agent id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Solution {
    pub paths: BTreeMap<usize, Path>,
}

impl Solution {
    pub(crate) fn from_paths(world: &World, paths: &[Path]) -> Self {
        Solution {
            paths: world
                .agents()
                .iter()
                .zip(paths)
                .map(|(agent, path)| (agent.id, path.clone()))
                .collect(),
        }
    }

    pub fn path(&self, agent_id: usize) -> Option<&Path> {
        self.paths.get(&agent_id)
    }

    pub fn flowtime(&self) -> usize {
        self.paths.values().map(Vec::len).sum()
    }

    /// Plan in the hand-off shape: agent id to `(time, (x, y))` entries.
    pub fn to_plan(&self) -> BTreeMap<usize, Vec<(usize, (usize, usize))>> {
        self.paths
            .iter()
            .map(|(&id, path)| {
                let steps = path
                    .iter()
                    .map(|state| (state.time, (state.position.x, state.position.y)))
                    .collect();
                (id, steps)
            })
            .collect()
    }

    /// Checks every path against the world (start, goal, unit moves, bounds,
    /// obstacles) and the joint plan for residual conflicts.
    pub fn verify(&self, world: &World) -> bool {
        if self.paths.len() != world.agents().len() {
            debug!(
                "solution covers {} agents, world has {}",
                self.paths.len(),
                world.agents().len()
            );
            return false;
        }

        let mut ordered = Vec::with_capacity(world.agents().len());
        for agent in world.agents() {
            let Some(path) = self.paths.get(&agent.id) else {
                debug!("agent {} has no path", agent.id);
                return false;
            };

            let (Some(first), Some(last)) = (path.first(), path.last()) else {
                debug!("agent {} has an empty path", agent.id);
                return false;
            };
            if *first != State::new(0, agent.start) || last.position != agent.goal {
                debug!("agent {} path does not connect start and goal", agent.id);
                return false;
            }

            if path.iter().any(|state| !world.is_passable(state.position)) {
                debug!("agent {} leaves the free space", agent.id);
                return false;
            }

            for step in path.windows(2) {
                if step[1].time != step[0].time + 1
                    || step[0].position.manhattan_distance(&step[1].position) > 1
                {
                    debug!("agent {} has an invalid move {step:?}", agent.id);
                    return false;
                }
            }
            ordered.push(path.clone());
        }

        if let Some(conflict) = world.first_conflict(&ordered) {
            debug!("solution still has conflict {conflict:?}");
            return false;
        }
        true
    }
}
