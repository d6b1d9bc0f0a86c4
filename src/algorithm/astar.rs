use super::{construct_path, heuristic, planning_horizon, Trace};
use crate::common::{Agent, Constraints, LowLevelOpenNode, Path, State};
use crate::config::Config;
use crate::stat::Stats;
use crate::world::World;

use std::collections::{BTreeSet, HashSet};
use tracing::{debug, instrument, trace, warn};

/// Successors of `state` one tick later: wait, then up, down, left, right.
fn get_successors(world: &World, state: &State, constraints: &Constraints) -> Vec<State> {
    let next_time = state.time + 1;
    world
        .get_neighbors(state.position)
        .iter()
        .copied()
        .filter(|&next| !constraints.forbids_vertex(next_time, next))
        .filter(|&next| {
            next == state.position || !constraints.forbids_edge(state.time, state.position, next)
        })
        .map(|next| State::new(next_time, next))
        .collect()
}

/// Shortest path of `agent` in the time-expanded grid under `constraints`.
///
/// Returns `None` when the goal cannot be reached before the planning
/// horizon, or when `max_low_level_expansions` runs out first.
#[instrument(skip_all, name="a_star", fields(agent = agent.id, start = format!("{:?}", agent.start), goal = format!("{:?}", agent.goal)), level = "debug")]
pub(crate) fn a_star_search(
    world: &World,
    agent: &Agent,
    constraints: &Constraints,
    config: &Config,
    stats: &mut Stats,
) -> Option<Path> {
    let horizon = planning_horizon(world, constraints, config.max_time_horizon);
    debug!("constraints: {constraints:?}, horizon: {horizon:?}");

    if constraints.forbids_vertex(0, agent.start) {
        debug!("start cell is forbidden at time 0");
        return None;
    }

    let mut open_list = BTreeSet::new();
    let mut generated = HashSet::new();
    let mut trace = Trace::new();

    let start = State::new(0, agent.start);
    open_list.insert(LowLevelOpenNode {
        state: start,
        f_open_cost: heuristic(agent.start, agent.goal),
        g_cost: 0,
    });
    generated.insert(start);

    let mut expansions = 0;
    while let Some(current) = open_list.pop_first() {
        trace!("expand node: {current:?}");
        stats.low_level_expand_nodes += 1;
        expansions += 1;

        // The agent parks on its goal afterwards, so no later constraint may
        // forbid the goal cell.
        if current.state.position == agent.goal
            && !constraints.forbids_position_after(agent.goal, current.state.time)
        {
            return Some(construct_path(&trace, current.state));
        }

        if config
            .max_low_level_expansions
            .is_some_and(|limit| expansions >= limit)
        {
            warn!("low-level expansion budget of {expansions} exhausted");
            return None;
        }

        if current.state.time >= horizon {
            continue;
        }

        let tentative_g_cost = current.g_cost + 1;
        for neighbor in get_successors(world, &current.state, constraints) {
            // g equals time, so the first time a state is generated is the best.
            if !generated.insert(neighbor) {
                continue;
            }
            trace.insert(neighbor, current.state);
            open_list.insert(LowLevelOpenNode {
                state: neighbor,
                f_open_cost: tentative_g_cost + heuristic(neighbor.position, agent.goal),
                g_cost: tentative_g_cost,
            });
        }
    }

    debug!("cannot find solution");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Position;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::VecDeque;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }

    // . . .
    // . # .
    // . . .
    fn ring_world(start: (usize, usize), goal: (usize, usize)) -> World {
        World::new(3, 3, [Position::new(1, 1)], vec![Agent::new(0, start, goal)]).unwrap()
    }

    fn search(world: &World, constraints: &Constraints) -> Option<Path> {
        let stats = &mut Stats::default();
        a_star_search(world, &world.agents()[0], constraints, &Config::default(), stats)
    }

    fn bfs_distance(world: &World, start: Position, goal: Position) -> Option<usize> {
        let mut distance = vec![vec![usize::MAX; world.height()]; world.width()];
        let mut queue = VecDeque::from([start]);
        distance[start.x][start.y] = 0;
        while let Some(current) = queue.pop_front() {
            if current == goal {
                return Some(distance[current.x][current.y]);
            }
            for &next in world.get_neighbors(current) {
                if distance[next.x][next.y] == usize::MAX {
                    distance[next.x][next.y] = distance[current.x][current.y] + 1;
                    queue.push_back(next);
                }
            }
        }
        None
    }

    // Ideal path
    // [(2, 2), (1, 2), (0, 2), (0, 1), (0, 0)]
    // or
    // [(2, 2), (2, 1), (2, 0), (1, 0), (0, 0)]
    #[test]
    fn test_a_star_no_constraint() {
        init_tracing();
        let world = ring_world((2, 2), (0, 0));
        let path = search(&world, &Constraints::new()).unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path[0], State::new(0, Position::new(2, 2)));
        assert_eq!(path[4], State::new(4, Position::new(0, 0)));
    }

    #[test]
    fn test_a_star_in_path_vertex_constraint_alternative_path() {
        init_tracing();
        let world = ring_world((2, 2), (0, 0));
        let constraints = Constraints::from_vertex(2, Position::new(0, 2));
        let path = search(&world, &constraints).unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path[2].position, Position::new(2, 0));
    }

    #[test]
    fn test_a_star_in_path_vertex_constraint() {
        init_tracing();
        let world = ring_world((2, 2), (0, 0));
        let mut constraints = Constraints::from_vertex(2, Position::new(0, 2));
        constraints.add_constraint(&Constraints::from_vertex(2, Position::new(2, 0)));
        let path = search(&world, &constraints).unwrap();
        assert_eq!(path.len(), 6);
    }

    #[test]
    fn test_a_star_edge_constraint_alternative_path() {
        init_tracing();
        let world = ring_world((2, 2), (0, 0));
        // Forbids the reverse direction only, which the agent never takes.
        let constraints = Constraints::from_edge(1, Position::new(0, 2), Position::new(1, 2));
        let path = search(&world, &constraints).unwrap();
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn test_a_star_edge_constraint() {
        init_tracing();
        let world = ring_world((2, 2), (0, 0));
        let mut constraints = Constraints::from_edge(1, Position::new(1, 2), Position::new(0, 2));
        constraints.add_constraint(&Constraints::from_edge(
            1,
            Position::new(2, 1),
            Position::new(2, 0),
        ));
        let path = search(&world, &constraints).unwrap();
        assert_eq!(path.len(), 6);
    }

    #[test]
    fn test_a_star_goal_constraint_after_arrival() {
        init_tracing();
        let world = World::new(3, 1, [], vec![Agent::new(0, (0, 0), (1, 0))]).unwrap();
        let constraints = Constraints::from_vertex(3, Position::new(1, 0));
        let path = search(&world, &constraints).unwrap();

        // Cannot stop on the goal before tick 3 has passed.
        assert_eq!(path.len(), 5);
        assert_ne!(path[3].position, Position::new(1, 0));
        assert_eq!(path[4], State::new(4, Position::new(1, 0)));
    }

    #[test]
    fn test_a_star_start_forbidden_at_time_zero() {
        init_tracing();
        let world = ring_world((2, 2), (0, 0));
        let constraints = Constraints::from_vertex(0, Position::new(2, 2));
        assert!(search(&world, &constraints).is_none());
    }

    #[test]
    fn test_a_star_unreachable_goal_terminates() {
        init_tracing();
        // Goal (2, 2) is walled off by (1, 2) and (2, 1).
        let world = World::new(
            3,
            3,
            [Position::new(1, 2), Position::new(2, 1)],
            vec![Agent::new(0, (0, 0), (2, 2))],
        )
        .unwrap();
        let stats = &mut Stats::default();
        let path = a_star_search(
            &world,
            &world.agents()[0],
            &Constraints::new(),
            &Config::default(),
            stats,
        );
        assert!(path.is_none());
        assert!(stats.low_level_expand_nodes > 0);
    }

    #[test]
    fn test_a_star_expansion_budget() {
        init_tracing();
        let world = ring_world((2, 2), (0, 0));
        let config = Config {
            max_low_level_expansions: Some(2),
            ..Config::default()
        };
        let stats = &mut Stats::default();
        let path = a_star_search(&world, &world.agents()[0], &Constraints::new(), &config, stats);
        assert!(path.is_none());
        assert_eq!(stats.low_level_expand_nodes, 2);
    }

    #[test]
    fn test_a_star_time_horizon_cap() {
        init_tracing();
        let world = ring_world((2, 2), (0, 0));
        let config = Config {
            max_time_horizon: Some(3),
            ..Config::default()
        };
        let stats = &mut Stats::default();
        let path = a_star_search(&world, &world.agents()[0], &Constraints::new(), &config, stats);
        assert!(path.is_none());
    }

    #[test]
    fn test_heuristic_admissible_against_bfs() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            let (width, height) = (6, 5);
            let obstacles: Vec<Position> = (0..width)
                .flat_map(|x| (0..height).map(move |y| Position::new(x, y)))
                .filter(|_| rng.gen_bool(0.25))
                .collect();

            let free: Vec<Position> = (0..width)
                .flat_map(|x| (0..height).map(move |y| Position::new(x, y)))
                .filter(|position| !obstacles.contains(position))
                .collect();
            if free.len() < 2 {
                continue;
            }

            for _ in 0..10 {
                let start = free[rng.gen_range(0..free.len())];
                let goal = free[rng.gen_range(0..free.len())];
                let world = World::new(
                    width,
                    height,
                    obstacles.iter().copied(),
                    vec![Agent::new(0, start, goal)],
                )
                .unwrap();

                let path = search(&world, &Constraints::new());
                match bfs_distance(&world, start, goal) {
                    Some(distance) => {
                        assert!(heuristic(start, goal) <= distance);
                        assert_eq!(path.unwrap().len(), distance + 1);
                    }
                    None => assert!(path.is_none()),
                }
            }
        }
    }
}
