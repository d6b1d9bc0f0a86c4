mod astar;

pub(crate) use astar::a_star_search;

use std::collections::HashMap;

use crate::common::{Constraints, Path, Position, State};
use crate::world::World;

type Trace = HashMap<State, State>;

/// Manhattan distance. Admissible and consistent on the 4-connected unit grid.
pub(crate) fn heuristic(position: Position, goal: Position) -> usize {
    position.manhattan_distance(&goal)
}

/// Latest tick the low-level search may generate states at.
///
/// After the last constrained tick `T` the agent moves in a static grid, so if
/// the goal is reachable at all it is reachable within `free_cells` further
/// moves. States past that bound can never be on a shortest path.
pub(crate) fn planning_horizon(
    world: &World,
    constraints: &Constraints,
    time_horizon: Option<usize>,
) -> usize {
    let bound = constraints.latest_time() + 1 + world.free_cells();
    time_horizon.map_or(bound, |cap| cap.min(bound))
}

fn construct_path(trace: &Trace, mut current: State) -> Path {
    let mut path = vec![current];
    while let Some(&previous) = trace.get(&current) {
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}
